//! Plain-text files that back the catalog.
//!
//! The title file is the only source the catalog is rebuilt from. The ledger
//! and audit log are append-only trails for humans; the report is a snapshot
//! that each export overwrites.

use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use serde::Serialize;
use tracing::{error, warn};

use crate::{
    error::{CatalogError, CatalogResult},
    record::{BookId, BookRecord},
};

pub const TITLES_FILE: &str = "books.csv";
pub const LEDGER_FILE: &str = "issued_books.csv";
pub const AUDIT_LOG_FILE: &str = "issue_log.txt";
pub const REPORT_FILE: &str = "library_report.txt";

#[derive(Debug, Clone)]
pub struct CatalogFiles {
    pub titles: PathBuf,
    pub ledger: PathBuf,
    pub audit_log: PathBuf,
    pub report: PathBuf,
}

impl CatalogFiles {
    /// Default file names placed inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            titles: dir.join(TITLES_FILE),
            ledger: dir.join(LEDGER_FILE),
            audit_log: dir.join(AUDIT_LOG_FILE),
            report: dir.join(REPORT_FILE),
        }
    }

    /// Creates the title file, ledger and audit log when they are missing.
    pub fn ensure_exist(&self) -> CatalogResult<()> {
        for path in [&self.titles, &self.ledger, &self.audit_log] {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| CatalogError::storage(parent, e))?;
            }
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| CatalogError::storage(path, e))?;
        }
        Ok(())
    }

    /// Reads the title file, trimming titles and skipping blank lines.
    ///
    /// A file that is not already one clean title per line (padding, blank
    /// lines, a missing final newline) is rewritten in that form, so later
    /// appends stay line-aligned with the loaded records.
    pub fn load_titles(&self) -> CatalogResult<Vec<String>> {
        let contents = match fs::read_to_string(&self.titles) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CatalogError::storage(&self.titles, e)),
        };

        let titles: Vec<String> = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        let canonical = render_titles(titles.iter().map(String::as_str));
        if canonical != contents {
            warn!(path = %self.titles.display(), "normalising title file");
            self.write_titles(&canonical)?;
        }
        Ok(titles)
    }

    pub fn append_title(&self, title: &str) -> CatalogResult<()> {
        append_line(&self.titles, title)
    }

    /// Replaces the title file with `titles`, one per line, in the given order.
    pub fn rewrite_titles<'a>(&self, titles: impl IntoIterator<Item = &'a str>) -> CatalogResult<()> {
        self.write_titles(&render_titles(titles))
    }

    fn write_titles(&self, contents: &str) -> CatalogResult<()> {
        fs::write(&self.titles, contents).map_err(|e| CatalogError::storage(&self.titles, e))
    }

    /// Records an issue in the ledger and the audit log. If the audit line
    /// cannot be written the ledger is cut back to its previous length, so
    /// neither file mentions an issue that did not happen.
    pub fn record_issue(&self, id: BookId, event: &AuditEvent<'_>) -> CatalogResult<()> {
        let ledger_len = match fs::metadata(&self.ledger) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(CatalogError::storage(&self.ledger, e)),
        };

        self.append_ledger(id, event.user, event.date)?;
        if let Err(err) = self.append_audit(event) {
            let rollback = OpenOptions::new()
                .write(true)
                .open(&self.ledger)
                .and_then(|file| file.set_len(ledger_len));
            if let Err(e) = rollback {
                error!(path = %self.ledger.display(), error = %e, "could not roll back ledger");
            }
            return Err(err);
        }
        Ok(())
    }

    pub fn append_ledger(&self, id: BookId, borrower: &str, timestamp: &str) -> CatalogResult<()> {
        append_line(&self.ledger, &format!("{id},{borrower},{timestamp}"))
    }

    pub fn append_audit(&self, event: &AuditEvent<'_>) -> CatalogResult<()> {
        append_line(&self.audit_log, &event.to_string())
    }

    /// Audit log entries, newest first. Unrecognised lines are skipped.
    pub fn read_history(&self) -> CatalogResult<Vec<HistoryEntry>> {
        let contents = match fs::read_to_string(&self.audit_log) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CatalogError::storage(&self.audit_log, e)),
        };

        let mut entries: Vec<HistoryEntry> = contents.lines().filter_map(HistoryEntry::parse).collect();
        entries.reverse();
        Ok(entries)
    }

    pub fn write_report<'a>(&self, records: impl IntoIterator<Item = &'a BookRecord>) -> CatalogResult<()> {
        let mut contents = String::from("Library Report\n");
        contents.push_str(&"=".repeat(20));
        contents.push('\n');
        for record in records {
            contents.push_str(&format!(
                "{} - {} [{}]\n",
                record.id(),
                record.title(),
                record.status()
            ));
        }
        fs::write(&self.report, contents).map_err(|e| CatalogError::storage(&self.report, e))
    }
}

fn render_titles<'a>(titles: impl IntoIterator<Item = &'a str>) -> String {
    let mut contents = String::new();
    for title in titles {
        contents.push_str(title);
        contents.push('\n');
    }
    contents
}

fn append_line(path: &Path, line: &str) -> CatalogResult<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| CatalogError::storage(path, e))?;
    writeln!(file, "{line}").map_err(|e| CatalogError::storage(path, e))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Issued,
    Returned,
}

impl AuditAction {
    fn as_str(self) -> &'static str {
        match self {
            AuditAction::Issued => "issued",
            AuditAction::Returned => "returned",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A line destined for the audit log: `{user} {action} '{book}' on {date}`.
#[derive(Debug)]
pub struct AuditEvent<'a> {
    pub user: &'a str,
    pub action: AuditAction,
    pub book: &'a str,
    pub date: &'a str,
}

impl std::fmt::Display for AuditEvent<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} '{}' on {}",
            self.user,
            self.action,
            self.book,
            self.date
        )
    }
}

/// An audit log line read back for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub user: String,
    pub action: AuditAction,
    pub book: String,
    pub date: String,
}

impl HistoryEntry {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        [AuditAction::Issued, AuditAction::Returned]
            .into_iter()
            .find_map(|action| {
                let marker = format!(" {} '", action.as_str());
                let (user, rest) = line.split_once(&marker)?;
                // Titles may contain quotes, so split on the last closing marker.
                let (book, date) = rest.rsplit_once("' on ")?;
                Some(HistoryEntry {
                    user: user.to_string(),
                    action,
                    book: book.to_string(),
                    date: date.to_string(),
                })
            })
    }
}
