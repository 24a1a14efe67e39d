//! Interactive text menu over a [`Catalog`].
//!
//! The menu is generic over its input and output streams so the same loop
//! runs against a terminal or against in-memory buffers in tests. Operation
//! failures are printed and the loop carries on; only I/O errors on the
//! streams themselves end the session early.

use std::io;

use anyhow::{Result, anyhow};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error};

use crate::{
    access::AccessPolicy,
    catalog::{Catalog, DeleteOutcome, SearchOutcome},
    error::CatalogError,
    record::BookRecord,
};

const LINE_ENDINGS: &[char] = &['\n', '\r'];

const OPTIONS: &str = "
D - Display Books
T - Display Books by Title
S - Search Books
I - Issue Book
A - Add Book (Admin)
B - Delete Book (Admin)
R - Return Book
C - Summary
E - Export Report
H - Issue History
Q - Quit
";

/// A single menu selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Display,
    DisplaySorted,
    Search,
    Issue,
    Add,
    Delete,
    Return,
    Summary,
    Export,
    History,
    Quit,
}

impl MenuChoice {
    /// Parses a menu selection. Accepts the single letter shown in the menu
    /// or the full word, in any case.
    pub fn parse(line: &str) -> Result<Self> {
        let choice = line.trim().to_lowercase();
        if choice.is_empty() {
            return Err(anyhow!("empty choice"));
        }

        match choice.as_str() {
            "d" | "display" => Ok(MenuChoice::Display),
            "t" | "title" | "sorted" => Ok(MenuChoice::DisplaySorted),
            "s" | "search" => Ok(MenuChoice::Search),
            "i" | "issue" => Ok(MenuChoice::Issue),
            "a" | "add" => Ok(MenuChoice::Add),
            "b" | "delete" => Ok(MenuChoice::Delete),
            "r" | "return" => Ok(MenuChoice::Return),
            "c" | "summary" => Ok(MenuChoice::Summary),
            "e" | "export" => Ok(MenuChoice::Export),
            "h" | "history" => Ok(MenuChoice::History),
            "q" | "quit" | "exit" => Ok(MenuChoice::Quit),
            other => Err(anyhow!("invalid choice '{other}'. Pick one of D, T, S, I, A, B, R, C, E, H, Q")),
        }
    }

    /// Whether the choice is gated behind the admin password.
    pub fn requires_admin(self) -> bool {
        matches!(self, MenuChoice::Add | MenuChoice::Delete)
    }
}

enum Step {
    Continue,
    Quit,
}

pub struct Menu<'a, R, W> {
    catalog: &'a mut Catalog,
    access: &'a dyn AccessPolicy,
    library_name: &'a str,
    input: R,
    output: W,
}

impl<'a, R, W> Menu<'a, R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(
        catalog: &'a mut Catalog,
        access: &'a dyn AccessPolicy,
        library_name: &'a str,
        input: R,
        output: W,
    ) -> Self {
        Self {
            catalog,
            access,
            library_name,
            input,
            output,
        }
    }

    /// Runs until the user quits or input ends.
    pub async fn run(&mut self) -> io::Result<()> {
        loop {
            let banner = format!("\nWelcome to {}\n{OPTIONS}", self.library_name);
            self.say(&banner).await?;

            let Some(line) = self.prompt("Enter choice: ").await? else {
                break;
            };
            let choice = match MenuChoice::parse(&line) {
                Ok(choice) => choice,
                Err(err) => {
                    self.say(&err.to_string()).await?;
                    continue;
                }
            };

            if choice.requires_admin() {
                let Some(password) = self.prompt("Enter admin password: ").await? else {
                    break;
                };
                if !self.access.is_privileged(Some(&password)) {
                    self.say("Wrong password!").await?;
                    continue;
                }
            }

            if let Step::Quit = self.dispatch(choice).await? {
                break;
            }
        }
        Ok(())
    }

    async fn dispatch(&mut self, choice: MenuChoice) -> io::Result<Step> {
        match choice {
            MenuChoice::Display => self.display(false).await,
            MenuChoice::DisplaySorted => self.display(true).await,
            MenuChoice::Search => self.search().await,
            MenuChoice::Issue => self.issue().await,
            MenuChoice::Add => self.add().await,
            MenuChoice::Delete => self.delete().await,
            MenuChoice::Return => self.return_book().await,
            MenuChoice::Summary => self.summary().await,
            MenuChoice::Export => self.export().await,
            MenuChoice::History => self.history().await,
            MenuChoice::Quit => {
                self.say("Thank you!").await?;
                Ok(Step::Quit)
            }
        }
    }

    async fn display(&mut self, sort_by_title: bool) -> io::Result<Step> {
        let mut text = format!("\nID\tTitle\t\t\tStatus\n{}\n", "-".repeat(45));
        for record in self.catalog.list(sort_by_title) {
            text.push_str(&format_record(record));
            text.push('\n');
        }
        self.say(text.trim_end()).await?;
        Ok(Step::Continue)
    }

    async fn search(&mut self) -> io::Result<Step> {
        let Some(query) = self.prompt("Enter Book ID or Title keyword: ").await? else {
            return Ok(Step::Quit);
        };
        let text = match self.catalog.search(&query) {
            SearchOutcome::Matches(records) => records
                .into_iter()
                .map(format_record)
                .collect::<Vec<_>>()
                .join("\n"),
            SearchOutcome::NoMatch => "No matching book found.".to_string(),
        };
        self.say(&text).await?;
        Ok(Step::Continue)
    }

    async fn issue(&mut self) -> io::Result<Step> {
        let Some(raw_id) = self.prompt("Enter book ID: ").await? else {
            return Ok(Step::Quit);
        };
        let id = match Catalog::parse_id(&raw_id)
            .and_then(|id| self.catalog.check_issuable(id).map(|_| id))
        {
            Ok(id) => id,
            Err(err) => return self.fail(err).await,
        };

        let Some(name) = self.prompt("Enter your name: ").await? else {
            return Ok(Step::Quit);
        };
        match self.catalog.issue(id, &name) {
            Ok(issued_at) => {
                self.say(&format!("Book issued successfully on {issued_at}")).await?;
                Ok(Step::Continue)
            }
            Err(err) => self.fail(err).await,
        }
    }

    async fn add(&mut self) -> io::Result<Step> {
        let Some(title) = self.prompt("Enter book title: ").await? else {
            return Ok(Step::Quit);
        };
        match self.catalog.add(&title) {
            Ok(id) => {
                self.say(&format!("Book added successfully! (ID: {id})")).await?;
                Ok(Step::Continue)
            }
            Err(err) => self.fail(err).await,
        }
    }

    async fn delete(&mut self) -> io::Result<Step> {
        let Some(raw_id) = self.prompt("Enter book ID to delete: ").await? else {
            return Ok(Step::Quit);
        };
        let id = match Catalog::parse_id(&raw_id)
            .and_then(|id| self.catalog.check_deletable(id).map(|_| id))
        {
            Ok(id) => id,
            Err(err) => return self.fail(err).await,
        };

        let Some(answer) = self.prompt("Are you sure? (y/n): ").await? else {
            return Ok(Step::Quit);
        };
        let confirmed = answer.trim().eq_ignore_ascii_case("y");
        match self.catalog.delete(id, confirmed) {
            Ok(DeleteOutcome::Deleted(_)) => self.say("Book deleted successfully!").await?,
            Ok(DeleteOutcome::Cancelled) => self.say("Delete cancelled").await?,
            Err(err) => return self.fail(err).await,
        }
        Ok(Step::Continue)
    }

    async fn return_book(&mut self) -> io::Result<Step> {
        let Some(raw_id) = self.prompt("Enter book ID: ").await? else {
            return Ok(Step::Quit);
        };
        let result = Catalog::parse_id(&raw_id).and_then(|id| self.catalog.return_book(id));
        match result {
            Ok(loan) => {
                self.say(&format!("Book returned successfully by {}", loan.borrower))
                    .await?;
                Ok(Step::Continue)
            }
            Err(err) => self.fail(err).await,
        }
    }

    async fn summary(&mut self) -> io::Result<Step> {
        let summary = self.catalog.summary();
        self.say(&format!(
            "Total: {} | Issued: {} | Available: {}",
            summary.total, summary.issued, summary.available
        ))
        .await?;
        Ok(Step::Continue)
    }

    async fn export(&mut self) -> io::Result<Step> {
        match self.catalog.export_report() {
            Ok(path) => {
                self.say(&format!("Report exported to {}", path.display()))
                    .await?;
                Ok(Step::Continue)
            }
            Err(err) => self.fail(err).await,
        }
    }

    async fn history(&mut self) -> io::Result<Step> {
        let entries = match self.catalog.history() {
            Ok(entries) => entries,
            Err(err) => return self.fail(err).await,
        };
        if entries.is_empty() {
            self.say("No history yet.").await?;
            return Ok(Step::Continue);
        }

        let text = entries
            .iter()
            .map(|entry| format!("{}  {} {} '{}'", entry.date, entry.user, entry.action, entry.book))
            .collect::<Vec<_>>()
            .join("\n");
        self.say(&text).await?;
        Ok(Step::Continue)
    }

    async fn fail(&mut self, err: CatalogError) -> io::Result<Step> {
        if err.is_storage() {
            error!(error = %err, "catalog operation failed");
            self.say("Something went wrong: operation failed").await?;
        } else {
            debug!(code = err.code(), "catalog operation rejected");
            self.say(&err.user_message()).await?;
        }
        Ok(Step::Continue)
    }

    async fn prompt(&mut self, prompt: &str) -> io::Result<Option<String>> {
        self.output.write_all(prompt.as_bytes()).await?;
        self.output.flush().await?;

        let mut line = String::new();
        if self.input.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(LINE_ENDINGS).to_string()))
    }

    async fn say(&mut self, text: &str) -> io::Result<()> {
        self.output.write_all(text.as_bytes()).await?;
        self.output.write_all(b"\n").await?;
        self.output.flush().await
    }
}

fn format_record(record: &BookRecord) -> String {
    match record.loan() {
        Some(loan) => format!(
            "{}\t{} [{}] {} since {}",
            record.id(),
            record.title(),
            record.status(),
            loan.borrower,
            loan.issued_at
        ),
        None => format!("{}\t{} [{}]", record.id(), record.title(), record.status()),
    }
}
