//! # bidfx-runner
//!
//! A minimal command-line client for the pricing API: loads an INI
//! configuration file, opens a session, subscribes to one FX subject, and
//! logs every price, subscription, and provider event it receives until
//! interrupted.
//!
//! # Usage
//!
//! ```bash
//! bidfx-runner --config ~/.bidfx/api/config.ini --currency-pair GBPUSD
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use bidfx_core::callbacks::Callbacks;
use bidfx_core::provider::PriceProvider;
use bidfx_pricing::Session;

/// BidFX Pricing API command-line runner.
#[derive(Parser)]
#[command(name = "bidfx-runner", about = "BidFX Pricing API command-line runner")]
struct Cli {
    /// Configuration file path (INI). Defaults to `~/.bidfx/api/config.ini`.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Optional log directory for file output.
    #[arg(long)]
    log_dir: Option<String>,

    /// Currency pair to subscribe to on indicative (shared) FX spot pricing.
    #[arg(long, default_value = "GBPUSD")]
    currency_pair: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    bidfx_core::logging::init_logging(&cli.log_level, cli.log_dir.as_deref(), "bidfx-runner");

    info!(version = Session::version(), currency_pair = %cli.currency_pair, "bidfx-runner starting");

    let callbacks = Callbacks::new()
        .with_on_price(|event| info!(subject = %event.subject, full = event.full, fields = ?event.fields, "price"))
        .with_on_subscription(
            |event| info!(subject = %event.subject, status = ?event.status, message = %event.message, "subscription"),
        )
        .with_on_provider(
            |event| info!(provider = %event.provider_name, status = ?event.status, message = %event.message, "provider"),
        );

    let session = Session::create_from_ini_file(cli.config.as_deref(), callbacks)?;
    let pricing = session.pricing();

    let subject = pricing.build().fx().indicative().spot().currency_pair(cli.currency_pair.as_str())?.build()?;

    pricing.start().await?;
    pricing.subscribe(subject.clone());

    info!("subscribed to {subject} — press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    pricing.unsubscribe(subject);
    if let Err(e) = pricing.stop().await {
        error!("error stopping pricing: {e}");
    }

    info!("goodbye");
    Ok(())
}
