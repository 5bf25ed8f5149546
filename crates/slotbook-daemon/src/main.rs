//! slotbook-daemon: keeps a booking database's holds honest.
//!
//! Opens the database and runs the expiry reaper until the process is killed.
//! `--once` runs a single sweep, prints its report as JSON and exits.
//!
//! ```text
//! slotbook-daemon [--config <file>] [--once]
//! ```

mod settings;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use slotbook_core::{ExpiryReaper, SlotBook};
use tracing::info;
use tracing_subscriber::EnvFilter;

use settings::AppConfig;

#[derive(Debug, Default, PartialEq)]
struct Args {
    config: Option<PathBuf>,
    once: bool,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut parsed = Args::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--once" => parsed.once = true,
            "--config" => {
                let path = args.next().context("--config needs a file path")?;
                parsed.config = Some(PathBuf::from(path));
            }
            other => bail!("unknown argument: {other}"),
        }
    }
    Ok(parsed)
}

fn main() -> Result<()> {
    let args = parse_args(std::env::args().skip(1))?;
    let config = AppConfig::load(args.config.as_deref()).context("failed to load settings")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .init();

    let book = SlotBook::open(&config.database_path, config.engine.clone())
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;

    if args.once {
        let report = book.reap_expired().context("expiry sweep failed")?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let stats = book.stats()?;
    info!(
        database = %config.database_path.display(),
        doctors = stats.doctors,
        slots = stats.slots,
        pending = stats.pending,
        hold_secs = config.engine.hold_duration_secs,
        "slotbook-daemon starting"
    );

    let reaper = ExpiryReaper::start(Arc::new(book));
    reaper.join();
    Ok(())
}
