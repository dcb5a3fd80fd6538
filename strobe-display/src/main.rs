//! Strobe display receiver: entry point.
//!
//! ```text
//! strobe-display                    Run with defaults
//! strobe-display --config <path>    Use a custom config TOML
//! strobe-display --bind <addr>      Override the UDP bind address
//! strobe-display --snapshot <path>  Keep the latest frame on disk
//! strobe-display --gen-config       Dump default config and exit
//! ```

use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::Ordering;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use strobe_display::config::StrobeConfig;
use strobe_display::service::DisplayService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "strobe-display", about = "Strobe UDP frame receiver")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "strobe-display.toml")]
    config: PathBuf,

    /// UDP bind address (overrides config). Example: 0.0.0.0:4210
    #[arg(short, long)]
    bind: Option<String>,

    /// Write every rendered frame to this file.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&StrobeConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = StrobeConfig::load(&cli.config);
    if let Some(addr) = cli.bind {
        config.network.bind_address = addr;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    if config.logging.file.is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    } else {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.logging.file)?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    }

    info!("strobe-display v{}", env!("CARGO_PKG_VERSION"));
    info!("bind address: {}", config.network.bind_address);
    info!(
        "max frame: {} bytes in up to {} packets",
        config.engine.max_frame_size, config.engine.max_packets
    );
    info!("target FPS: {}", config.engine.target_fps);

    let service = DisplayService::new(config).with_snapshot(cli.snapshot);
    let stop = service.stop_handle();

    // Ctrl-C handler.
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.store(false, Ordering::SeqCst);
    });

    if let Err(e) = service.run().await {
        error!("display service failed: {e}");
        return Err(e.into());
    }

    Ok(())
}
