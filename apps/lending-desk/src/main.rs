//! `lending-desk` — lend a small shelf of books to many concurrent readers
//! and print who borrowed what.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, anyhow};
use clap::Parser;
use figment::providers::Serialized;
use nebula_lending_desk::{DeskConfig, LendingDesk, run_readers, shelf};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Command-line flags. Anything left unset falls through to env / file /
/// defaults.
#[derive(Debug, Parser, Serialize)]
#[command(name = "lending-desk", version, about)]
struct Cli {
    /// Config file (TOML). Defaults to ./lending-desk.toml when present.
    #[arg(short, long, env = "LENDING_DESK_CONFIG")]
    #[serde(skip)]
    config: Option<PathBuf>,

    /// Copies of the book on the shelf
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    copies: Option<u32>,

    /// Concurrent readers
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    readers: Option<usize>,

    /// Longest time a reader keeps a book, in milliseconds
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    max_hold_ms: Option<u64>,

    /// Give up on a checkout after this many milliseconds
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    acquire_timeout_ms: Option<u64>,

    /// Log filter, e.g. `info` or `nebula_pool=debug`
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    log: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = DeskConfig::load(cli.config.as_deref(), Serialized::defaults(&cli))
        .context("loading configuration")?;
    init_tracing(&config.log)?;

    let desk = Arc::new(
        LendingDesk::new(
            shelf(&config.author, &config.title, config.copies),
            config.pool_config(),
        )
        .context("opening the lending desk")?,
    );

    tracing::info!(
        copies = config.copies,
        readers = config.readers,
        max_hold_ms = config.max_hold_ms,
        "start"
    );
    let summary = run_readers(Arc::clone(&desk), config.readers, config.max_hold()).await;
    tracing::info!(
        completed = summary.completed,
        failed = summary.failed,
        peak_outstanding = summary.peak_outstanding,
        "all readers done"
    );

    for line in desk.report() {
        println!("{line}");
    }

    let books = desk.close().await;
    tracing::debug!(returned = books.len(), "desk closed");
    Ok(())
}

/// `RUST_LOG` wins over the configured filter when set.
fn init_tracing(filter: &str) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(filter).with_context(|| format!("invalid log filter '{filter}'"))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn unset_flags_do_not_override() {
        let cli = Cli::parse_from(["lending-desk", "--readers", "5"]);
        figment::Jail::expect_with(|_jail| {
            let config = DeskConfig::load(None, Serialized::defaults(&cli)).unwrap();
            assert_eq!(config.readers, 5);
            assert_eq!(config.copies, DeskConfig::default().copies);
            Ok(())
        });
    }
}
