//! The catalog store: an owned, in-memory map of book records kept in step
//! with the title file.
//!
//! Availability changes live only in memory. Every file write (title file,
//! ledger, audit log) happens before memory is touched, so a failed write
//! leaves the catalog exactly as it was.

use std::{collections::BTreeMap, path::PathBuf};

use serde::Serialize;
use tracing::info;

use crate::{
    clock::{Clock, SystemClock},
    error::{CatalogError, CatalogResult},
    files::{AuditAction, AuditEvent, CatalogFiles, HistoryEntry},
    record::{BookId, BookRecord, BookStatus, Loan},
};

pub const DEFAULT_MAX_TITLE_LEN: usize = 200;

#[derive(Debug, Clone)]
pub struct CatalogOptions {
    /// Longest title accepted by [`Catalog::add`], in characters. `0` disables the check.
    pub max_title_len: usize,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            max_title_len: DEFAULT_MAX_TITLE_LEN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CatalogSummary {
    pub total: usize,
    pub issued: usize,
    pub available: usize,
}

#[derive(Debug, PartialEq)]
pub enum SearchOutcome<'a> {
    Matches(Vec<&'a BookRecord>),
    NoMatch,
}

impl<'a> SearchOutcome<'a> {
    pub fn records(&self) -> &[&'a BookRecord] {
        match self {
            SearchOutcome::Matches(records) => records,
            SearchOutcome::NoMatch => &[],
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum DeleteOutcome {
    Deleted(BookRecord),
    /// The caller did not confirm; nothing changed.
    Cancelled,
}

pub struct Catalog {
    books: BTreeMap<BookId, BookRecord>,
    // High-water mark so ids freed by delete are never handed out again.
    next_id: BookId,
    files: CatalogFiles,
    options: CatalogOptions,
    clock: Box<dyn Clock>,
}

impl Catalog {
    /// Creates any missing backing files and loads the title file, numbering
    /// titles from [`BookId::FIRST`], all available.
    pub fn open(files: CatalogFiles, options: CatalogOptions) -> CatalogResult<Self> {
        files.ensure_exist()?;
        let titles = files.load_titles()?;

        let mut books = BTreeMap::new();
        let mut next_id = BookId::FIRST;
        for title in titles {
            books.insert(next_id, BookRecord::available(next_id, title));
            next_id = next_id.next();
        }

        info!(books = books.len(), path = %files.titles.display(), "catalog loaded");
        Ok(Self {
            books,
            next_id,
            files,
            options,
            clock: Box::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn files(&self) -> &CatalogFiles {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    pub fn get(&self, id: BookId) -> Option<&BookRecord> {
        self.books.get(&id)
    }

    /// Parses user-supplied id text. Text that cannot be an id is reported as
    /// an unknown id rather than a format error.
    pub fn parse_id(raw: &str) -> CatalogResult<BookId> {
        raw.parse().map_err(|_| CatalogError::NotFound {
            id: raw.trim().to_string(),
        })
    }

    /// All records in catalog order, or sorted by title when asked.
    pub fn list(&self, sort_by_title: bool) -> Vec<&BookRecord> {
        let mut records: Vec<&BookRecord> = self.books.values().collect();
        if sort_by_title {
            records.sort_by(|a, b| a.title.cmp(&b.title));
        }
        records
    }

    /// Records whose id equals `query` or whose title contains it, ignoring case.
    pub fn search(&self, query: &str) -> SearchOutcome<'_> {
        let query = query.trim().to_lowercase();
        let matches: Vec<&BookRecord> = self
            .books
            .values()
            .filter(|record| {
                record.id.to_string() == query || record.title.to_lowercase().contains(&query)
            })
            .collect();

        if matches.is_empty() {
            SearchOutcome::NoMatch
        } else {
            SearchOutcome::Matches(matches)
        }
    }

    fn record(&self, id: BookId) -> CatalogResult<&BookRecord> {
        self.books.get(&id).ok_or_else(|| CatalogError::NotFound {
            id: id.to_string(),
        })
    }

    /// Checks that `id` exists and is on the shelf.
    pub fn check_issuable(&self, id: BookId) -> CatalogResult<&BookRecord> {
        let record = self.record(id)?;
        match &record.loan {
            Some(loan) => Err(CatalogError::AlreadyIssued {
                id,
                borrower: loan.borrower.clone(),
                issued_at: loan.issued_at.clone(),
            }),
            None => Ok(record),
        }
    }

    /// Lends `id` to `borrower`, recording it in the ledger and audit log.
    /// Returns the timestamp stamped on the loan.
    pub fn issue(&mut self, id: BookId, borrower: &str) -> CatalogResult<String> {
        let title = self.check_issuable(id)?.title.clone();
        let borrower = borrower.trim();
        if borrower.is_empty() {
            return Err(CatalogError::invalid("borrower name is required"));
        }

        let issued_at = self.clock.now();
        self.files.record_issue(
            id,
            &AuditEvent {
                user: borrower,
                action: AuditAction::Issued,
                book: &title,
                date: &issued_at,
            },
        )?;

        if let Some(record) = self.books.get_mut(&id) {
            record.loan = Some(Loan {
                borrower: borrower.to_string(),
                issued_at: issued_at.clone(),
            });
        }
        info!(%id, borrower, %issued_at, "book issued");
        Ok(issued_at)
    }

    /// Puts `id` back on the shelf, returning the loan that was closed.
    pub fn return_book(&mut self, id: BookId) -> CatalogResult<Loan> {
        let record = self.record(id)?;
        let Some(loan) = &record.loan else {
            return Err(CatalogError::NotIssued { id });
        };

        let returned_at = self.clock.now();
        self.files.append_audit(&AuditEvent {
            user: &loan.borrower,
            action: AuditAction::Returned,
            book: &record.title,
            date: &returned_at,
        })?;

        let loan = self
            .books
            .get_mut(&id)
            .and_then(|record| record.loan.take())
            .ok_or(CatalogError::NotIssued { id })?;
        info!(%id, borrower = %loan.borrower, "book returned");
        Ok(loan)
    }

    fn validate_title(&self, raw: &str) -> CatalogResult<String> {
        let title = raw.trim();
        if title.is_empty() {
            return Err(CatalogError::invalid("empty title not allowed"));
        }
        if title.contains(['\n', '\r']) {
            return Err(CatalogError::invalid("title cannot contain line breaks"));
        }
        let max = self.options.max_title_len;
        if max > 0 && title.chars().count() > max {
            return Err(CatalogError::invalid(format!(
                "title longer than {max} characters"
            )));
        }
        Ok(title.to_string())
    }

    fn allocate_id(&self) -> BookId {
        let after_max = self
            .books
            .keys()
            .next_back()
            .map_or(BookId::FIRST, |max| max.next());
        after_max.max(self.next_id)
    }

    /// Adds an available record for `title` and appends it to the title file.
    pub fn add(&mut self, title: &str) -> CatalogResult<BookId> {
        let title = self.validate_title(title)?;
        let id = self.allocate_id();

        self.files.append_title(&title)?;
        self.books.insert(id, BookRecord::available(id, title));
        self.next_id = id.next();

        info!(%id, "book added");
        Ok(id)
    }

    /// Checks that `id` exists and is not out on loan.
    pub fn check_deletable(&self, id: BookId) -> CatalogResult<&BookRecord> {
        let record = self.record(id)?;
        match &record.loan {
            Some(loan) => Err(CatalogError::CannotDeleteIssued {
                id,
                borrower: loan.borrower.clone(),
            }),
            None => Ok(record),
        }
    }

    /// Permanently removes an available record and rewrites the title file.
    /// Without confirmation this is a no-op.
    pub fn delete(&mut self, id: BookId, confirmed: bool) -> CatalogResult<DeleteOutcome> {
        self.check_deletable(id)?;
        if !confirmed {
            return Ok(DeleteOutcome::Cancelled);
        }

        self.files.rewrite_titles(
            self.books
                .values()
                .filter(|record| record.id != id)
                .map(|record| record.title.as_str()),
        )?;

        let removed = self
            .books
            .remove(&id)
            .ok_or_else(|| CatalogError::NotFound { id: id.to_string() })?;
        info!(%id, "book deleted");
        Ok(DeleteOutcome::Deleted(removed))
    }

    pub fn summary(&self) -> CatalogSummary {
        let (total, issued) = self
            .books
            .values()
            .fold((0, 0), |(total, issued), record| match record.status() {
                BookStatus::Issued => (total + 1, issued + 1),
                BookStatus::Available => (total + 1, issued),
            });
        CatalogSummary {
            total,
            issued,
            available: total - issued,
        }
    }

    /// Overwrites the report file with every record's id, title and status.
    pub fn export_report(&self) -> CatalogResult<PathBuf> {
        self.files.write_report(self.books.values())?;
        info!(path = %self.files.report.display(), "report exported");
        Ok(self.files.report.clone())
    }

    /// Issue and return events from the audit log, newest first.
    pub fn history(&self) -> CatalogResult<Vec<HistoryEntry>> {
        self.files.read_history()
    }
}
