use std::{net::SocketAddr, path::PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::{
    access::SharedPassword,
    catalog::{CatalogOptions, DEFAULT_MAX_TITLE_LEN},
    files::CatalogFiles,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the interactive text menu on this terminal.
    Menu(MenuArgs),
    /// Serve the catalog as a JSON API.
    Serve(ServeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct MenuArgs {
    #[command(flatten)]
    pub catalog: CatalogArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub catalog: CatalogArgs,

    /// Socket address the API should bind to. Use port 0 for an ephemeral port.
    #[arg(long, env = "LIBRARY_LISTEN", default_value = "127.0.0.1:5000")]
    pub listen: SocketAddr,
}

/// Settings shared by every mode.
#[derive(Args, Debug, Clone)]
pub struct CatalogArgs {
    /// Directory holding the title file, issue ledger, audit log and report.
    #[arg(long, env = "LIBRARY_DATA_DIR", default_value = ".")]
    pub data_dir: PathBuf,

    /// Name shown in the menu banner.
    #[arg(long, default_value = "Central Library UOH")]
    pub library_name: String,

    /// Longest accepted title in characters; 0 removes the limit.
    #[arg(long, default_value_t = DEFAULT_MAX_TITLE_LEN)]
    pub max_title_len: usize,

    /// Password for adding and deleting books.
    #[arg(long, env = "LIBRARY_ADMIN_PASSWORD", default_value = "admin123", hide_env_values = true)]
    pub admin_password: String,
}

impl CatalogArgs {
    pub fn files(&self) -> CatalogFiles {
        CatalogFiles::in_dir(&self.data_dir)
    }

    pub fn options(&self) -> CatalogOptions {
        CatalogOptions {
            max_title_len: self.max_title_len,
        }
    }

    pub fn access_policy(&self) -> SharedPassword {
        SharedPassword::new(self.admin_password.clone())
    }
}
