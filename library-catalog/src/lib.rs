//! Single-branch library catalog.
//!
//! Keeps a small set of book records loaded from a flat title file and lets a
//! librarian issue, return, add and delete them, either from an interactive
//! text menu or over a JSON API. See `README.md` for usage.
//!
//! - [`catalog`] owns the records and every mutation rule.
//! - [`files`] reads and writes the title file, issue ledger, audit log and report.
//! - [`record`] defines book ids, records and loans.
//! - [`error`] lists the recoverable failures callers are shown.
//! - [`access`] decides who may add and delete.
//! - [`menu`] is the interactive front end; [`http`] is the JSON one.
//! - [`chat`] suggests books from keywords.
//! - [`cli`] parses the command line for both modes.
//!
//! The catalog is an ordinary value: callers construct it, own it, and pass it
//! where it is needed, so tests can run against isolated instances.

pub mod access;
pub mod catalog;
pub mod chat;
pub mod cli;
pub mod clock;
pub mod error;
pub mod files;
pub mod http;
pub mod menu;
pub mod record;
