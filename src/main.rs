use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hotkey_launcher::app;

#[derive(Parser)]
#[command(name = "hotkey-launcher")]
#[command(version)]
#[command(about = "launch programs from global hotkeys, quit from the tray")]
struct Cli {
    /// read hotkeys from this file instead of the default locations
    #[arg(long, value_name = "path")]
    config: Option<PathBuf>,

    /// print the configured hotkeys and exit
    #[arg(long)]
    list: bool,
}

fn main() -> Result<()> {
    // initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("hotkey_launcher=info")),
        )
        .init();

    let cli = Cli::parse();

    if cli.list {
        app::list_bindings(cli.config.as_deref());
        return Ok(());
    }

    info!("starting hotkey-launcher v{}", env!("CARGO_PKG_VERSION"));
    app::run(cli.config.as_deref())
}
