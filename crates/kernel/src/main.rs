//! Folio CMS
//!
//! HTTP server plus maintenance commands.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use folio_kernel::{AppState, Config, routes};

/// Actor recorded in the audit log for command-line operations.
const CLI_ACTOR: &str = "cli";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default).
    Serve,

    /// Export a page as XML.
    Export {
        page_id: Uuid,

        /// Output file; stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import a page from an XML export as a new draft.
    Import { file: PathBuf },

    /// Regenerate the rendered cache of a page.
    Refresh { page_id: Uuid },

    /// Rebuild the path resolution cache and report its size.
    RebuildCache,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = Config::from_env().context("failed to load configuration")?;
    let state = AppState::new(config)
        .await
        .context("failed to initialize application state")?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(state).await,
        Command::Export { page_id, output } => {
            let (page, xml) = state.pages().export_xml(page_id).await?;
            match output {
                Some(path) => {
                    std::fs::write(&path, xml)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    info!(page_id = %page.id, file = %path.display(), "page exported");
                }
                None => println!("{xml}"),
            }
            Ok(())
        }
        Command::Import { file } => {
            let xml = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let page = state.pages().import_xml(CLI_ACTOR, &xml).await?;
            println!("{}", page.id);
            Ok(())
        }
        Command::Refresh { page_id } => {
            let sections = state.pages().refresh(CLI_ACTOR, page_id).await?;
            info!(page_id = %page_id, sections, "page refreshed");
            Ok(())
        }
        Command::RebuildCache => {
            let entries = state.pages().cache().rebuild(state.db()).await?;
            println!("{entries}");
            Ok(())
        }
    }
}

async fn serve(state: AppState) -> Result<()> {
    let config = state.config();
    if config.admin_token.is_none() {
        tracing::warn!("ADMIN_TOKEN is not set; the admin surface is open");
    }
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = routes::app(state.clone());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind to address")?;

    info!(%addr, "Server listening");

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,folio_kernel=debug,tower_http=debug,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
