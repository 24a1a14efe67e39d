//! Book records and the identifiers that key them.

use std::{fmt, num::ParseIntError, str::FromStr};

use serde::{Deserialize, Serialize};

/// Stable identifier of a catalog entry.
///
/// Ids are handed out sequentially starting at [`BookId::FIRST`] and travel
/// over JSON as strings (`"101"`), matching how they are typed at the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct BookId(u32);

impl BookId {
    pub const FIRST: BookId = BookId(101);

    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BookId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl From<BookId> for String {
    fn from(id: BookId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for BookId {
    type Error = ParseIntError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookStatus {
    Available,
    Issued,
}

impl fmt::Display for BookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookStatus::Available => f.write_str("Available"),
            BookStatus::Issued => f.write_str("Issued"),
        }
    }
}

/// Who holds an issued book and since when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loan {
    pub borrower: String,
    pub issued_at: String,
}

/// One catalog entry describing a single book copy and its loan state.
///
/// A record is issued exactly when it carries a [`Loan`], so the borrower and
/// timestamp can never be half-set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookRecord {
    pub(crate) id: BookId,
    pub(crate) title: String,
    pub(crate) loan: Option<Loan>,
}

impl BookRecord {
    pub(crate) fn available(id: BookId, title: String) -> Self {
        Self {
            id,
            title,
            loan: None,
        }
    }

    pub fn id(&self) -> BookId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn status(&self) -> BookStatus {
        match self.loan {
            Some(_) => BookStatus::Issued,
            None => BookStatus::Available,
        }
    }

    pub fn loan(&self) -> Option<&Loan> {
        self.loan.as_ref()
    }

    /// Borrower name, empty while the book is on the shelf.
    pub fn borrower(&self) -> &str {
        self.loan.as_ref().map_or("", |loan| loan.borrower.as_str())
    }

    /// Issue timestamp, empty while the book is on the shelf.
    pub fn issued_at(&self) -> &str {
        self.loan.as_ref().map_or("", |loan| loan.issued_at.as_str())
    }
}
