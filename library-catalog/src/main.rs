use anyhow::{Context, Result};
use clap::Parser;
use tokio::{io::BufReader, net::TcpListener};
use tracing::{info, warn};

use library_catalog::{
    catalog::Catalog,
    cli::{CatalogArgs, Cli, Command},
    http::{AppState, router},
    menu::Menu,
};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout belongs to the menu.
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn open_catalog(args: &CatalogArgs) -> Result<Catalog> {
    Catalog::open(args.files(), args.options())
        .with_context(|| format!("failed to open catalog in {}", args.data_dir.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Menu(args) => {
            let mut catalog = open_catalog(&args.catalog)?;
            let access = args.catalog.access_policy();
            let mut menu = Menu::new(
                &mut catalog,
                &access,
                &args.catalog.library_name,
                BufReader::new(tokio::io::stdin()),
                tokio::io::stdout(),
            );
            menu.run().await?;
        }
        Command::Serve(args) => {
            let catalog = open_catalog(&args.catalog)?;
            let state = AppState::new(catalog, args.catalog.access_policy());

            let listener = TcpListener::bind(args.listen)
                .await
                .with_context(|| format!("failed to bind {}", args.listen))?;
            info!("catalog api listening on {}", listener.local_addr()?);

            axum::serve(listener, router(state))
                .with_graceful_shutdown(async {
                    if let Err(err) = tokio::signal::ctrl_c().await {
                        warn!(error = ?err, "failed to install ctrl-c handler");
                    }
                })
                .await?;
            info!("catalog api shut down");
        }
    }

    Ok(())
}
