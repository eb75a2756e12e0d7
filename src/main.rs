mod api;
mod config;
mod error;
mod headers;
mod models;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Parser)]
#[command(name = "plsweep", version, about = "Batch-delete YouTube playlists from the terminal")]
struct Cli {
    /// Override config file path.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Path to a file holding the pasted request headers (overrides the
    /// path stored via `plsweep auth set`).
    #[arg(long)]
    headers: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show which backend the headers select and what is missing.
    Check,
    /// List the account's playlists.
    List {
        /// Print the playlists as JSON instead of lines.
        #[arg(long)]
        json: bool,
    },
    /// Delete the given playlists by id.
    Delete {
        ids: Vec<String>,
    },
    /// Delete every playlist on the account.
    Purge {
        /// Skip the confirmation step and delete immediately.
        #[arg(long)]
        yes: bool,
    },
    /// Remember or forget the default headers file.
    Auth {
        #[command(subcommand)]
        cmd: AuthCommand,
    },
}

#[derive(Debug, Subcommand)]
enum AuthCommand {
    /// Store a headers file path in the config.
    Set { path: std::path::PathBuf },
    /// Clear the stored headers file path.
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref()).context("load config")?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, finishing the in-flight request");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Command::Check => {
            let map = load_headers(&cli, &cfg)?;
            print_classification(&headers::classify(&map));
        }
        Command::List { json } => {
            let map = load_headers(&cli, &cfg)?;
            let adapter = api::PlaylistAdapter::new(&cfg.endpoints)?;
            let playlists = adapter.list_playlists(&map, &cancel).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&playlists)?);
            } else {
                print_playlists(&playlists);
            }
        }
        Command::Delete { ref ids } => {
            anyhow::ensure!(!ids.is_empty(), "no playlist ids given");
            let map = load_headers(&cli, &cfg)?;
            let adapter = api::PlaylistAdapter::new(&cfg.endpoints)?;
            run_batch(&adapter, ids, &map, &cancel).await?;
        }
        Command::Purge { yes } => {
            let map = load_headers(&cli, &cfg)?;
            let adapter = api::PlaylistAdapter::new(&cfg.endpoints)?;
            let playlists = adapter.list_playlists(&map, &cancel).await?;
            if playlists.is_empty() {
                println!("No playlists to delete.");
                return Ok(());
            }
            print_playlists(&playlists);
            if !yes {
                println!(
                    "\nWould delete all {} playlist(s). Re-run with --yes to proceed.",
                    playlists.len()
                );
                return Ok(());
            }
            let ids: Vec<String> = playlists.iter().map(|p| p.id.clone()).collect();
            run_batch(&adapter, &ids, &map, &cancel).await?;
        }
        Command::Auth { cmd } => {
            let mut cfg = cfg;
            match cmd {
                AuthCommand::Set { path } => cfg.auth.headers = Some(path),
                AuthCommand::Clear => cfg.auth.headers = None,
            }
            config::save(&cfg, cli.config.as_deref()).context("save config")?;
            println!("Updated auth settings.");
        }
    }

    Ok(())
}

fn load_headers(cli: &Cli, cfg: &config::Config) -> anyhow::Result<headers::HeaderMap> {
    let path = cli
        .headers
        .clone()
        .or_else(|| cfg.auth.headers.clone())
        .context("no headers file; pass --headers or run `plsweep auth set <path>`")?;
    let raw =
        std::fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let mut map = headers::parse_raw(&raw);
    anyhow::ensure!(!map.is_empty(), "{} contains no headers", path.display());
    headers::derive_session_authorization(&mut map);
    Ok(map)
}

async fn run_batch(
    adapter: &api::PlaylistAdapter,
    ids: &[String],
    map: &headers::HeaderMap,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let total = ids.len();
    let report = adapter
        .delete_playlists(ids, map, cancel, |done, id| {
            println!("[{done}/{total}] deleted {id}");
        })
        .await;

    if report.cancelled() {
        println!(
            "Cancelled after deleting {} of {} playlist(s).",
            report.completed, total
        );
        return Ok(());
    }
    match report.error {
        None => println!("Deleted {} playlist(s).", report.completed),
        Some(err) => {
            println!(
                "Stopped after deleting {} of {} playlist(s).",
                report.completed, total
            );
            return Err(err.into());
        }
    }
    Ok(())
}

fn print_classification(c: &headers::Classification) {
    match (c.backend, c.malformed_authorization) {
        (Some(headers::Backend::Official), _) => println!("Backend: official Data API"),
        (Some(headers::Backend::Internal), _) => println!("Backend: internal web-client API"),
        (None, true) => {
            println!("Backend: none (Authorization is neither a Bearer token nor a SAPISIDHASH)")
        }
        (None, false) => println!("Backend: none"),
    }
    for name in &c.missing {
        println!("Missing required header: {name}");
    }
    for name in &c.advisory {
        println!("Recommended header not set: {name}");
    }
    if c.backend.is_some() && c.missing.is_empty() {
        println!("Headers look usable.");
    }
}

fn print_playlists(playlists: &[models::Playlist]) {
    if playlists.is_empty() {
        println!("No playlists found.");
        return;
    }
    for (i, p) in playlists.iter().enumerate() {
        println!(
            "{:02}. {}  [{}] {} item(s)  (id={})",
            i + 1,
            p.title,
            p.privacy,
            p.item_count,
            p.id
        );
    }
}
