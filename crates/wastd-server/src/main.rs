//! wastd server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens the
//! SQLite store and serves the curation API over HTTP. The batch subcommands
//! run one curation job against the same store and print the result as JSON.
//!
//! ```text
//! wastd serve
//! wastd reconcile --survey <UUID> --actor "Florian"
//! wastd resolve --encounter <UUID>
//! wastd rename --encounter <UUID> --name "Myrtle"
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use wastd_core::{qa::Actor, store::RecordStore};
use wastd_server::ServerConfig;
use wastd_store_sqlite::SqliteStore;

#[derive(Parser)]
#[command(author, version, about = "WAStD curation server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the HTTP API (the default).
  Serve,
  /// Merge the duplicates of a survey into it.
  Reconcile {
    #[arg(long)]
    survey: Uuid,
    #[arg(long)]
    actor:  String,
  },
  /// Print the identity closure of an encounter.
  Resolve {
    #[arg(long)]
    encounter: Uuid,
  },
  /// Name every encounter of an animal.
  Rename {
    #[arg(long)]
    encounter: Uuid,
    #[arg(long)]
    name:      String,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("WASTD"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let reconcile = server_cfg.reconcile_options().with_context(|| {
    format!(
      "local_utc_offset_hours = {} is not a valid offset",
      server_cfg.local_utc_offset_hours
    )
  })?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open SQLite store.
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?
    .with_link_scope(server_cfg.link_scope)
    .with_reconcile_options(reconcile);

  match cli.command.unwrap_or(Command::Serve) {
    Command::Serve => serve(store, &server_cfg).await,
    Command::Reconcile { survey, actor } => {
      let actor = Actor::new(actor)?;
      let report = store.reconcile_duplicates(survey, actor).await?;
      print_json(&report)
    }
    Command::Resolve { encounter } => {
      let closure = store.resolve_identity(encounter).await?;
      print_json(&closure)
    }
    Command::Rename { encounter, name } => {
      let closure = store.propagate_name(encounter, name).await?;
      print_json(&closure)
    }
  }
}

async fn serve(store: SqliteStore, server_cfg: &ServerConfig) -> anyhow::Result<()> {
  let app = wastd_server::app(Arc::new(store));
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
