//! cipherlane-server binary
//!
//! Run with:
//! ```bash
//! cargo run -p cipherlane-server -- --admin 0x... --shadow
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use cipherlane_core::Principal;
use cipherlane_server::{ServerBuilder, ServerConfig};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cipherlane-server")]
#[command(about = "Encrypted traffic-lane controller over HTTP")]
struct Args {
    /// JSON server config; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Admin principal (hex), required without --config
    #[arg(long)]
    admin: Option<String>,

    /// Listen address
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Hex key shared with the decryption oracle
    #[arg(long)]
    oracle_key: Option<String>,

    /// Serve shadow encryption and run the in-process oracle relay
    #[arg(long)]
    shadow: bool,

    /// Relay poll interval in milliseconds
    #[arg(long)]
    relay_interval_ms: Option<u64>,

    /// Disable the Prometheus recorder
    #[arg(long)]
    no_metrics: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("cipherlane=info".parse()?))
        .init();

    let args = Args::parse();

    let mut config = match (&args.config, &args.admin) {
        (Some(path), _) => ServerConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        (None, Some(admin)) => {
            let admin: Principal = admin.parse().context("parsing --admin")?;
            ServerConfig::new(admin)
        }
        (None, None) => anyhow::bail!("either --config or --admin is required"),
    };

    if let Some(admin) = &args.admin {
        config.controller.admin = admin.parse().context("parsing --admin")?;
    }
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(key) = args.oracle_key {
        config.oracle_key = key;
    }
    if let Some(ms) = args.relay_interval_ms {
        config.relay_interval_ms = ms;
    }
    config.shadow_mode |= args.shadow;
    config.validate()?;

    let mut builder = ServerBuilder::new(config);
    if !args.no_metrics {
        builder = builder.with_metrics();
    }
    let server = builder.build().await?;

    tracing::info!(addr = %server.addr(), "Server ready");
    server.run().await?;

    Ok(())
}
