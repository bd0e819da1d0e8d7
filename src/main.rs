use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use dns_filter_proxy::config::{BlockMode, CliOverrides, ProxyConfig};
use dns_filter_proxy::server::DnsServer;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "config.json";

#[derive(Parser, Debug)]
#[command(name = "dns-filter-proxy")]
#[command(about = "DNS relay that blocks blacklisted domains")]
struct Args {
    /// JSON configuration file (defaults to ./config.json when present)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Listen address (e.g., 0.0.0.0:1053)
    #[arg(long)]
    listen: Option<String>,

    /// Upstream DNS resolver address (e.g., 8.8.8.8:53)
    #[arg(long)]
    upstream: Option<String>,

    /// Blocking mode: nxdomain, refused or redirect
    #[arg(long)]
    mode: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let overrides = CliOverrides {
        listen: args.listen,
        upstream: args.upstream,
        mode: args.mode.as_deref().map(BlockMode::from),
        log_level: args.log_level,
    };
    let (path, required) = match args.config {
        Some(path) => (path, true),
        None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
    };

    let config = ProxyConfig::load(&path, required, overrides)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

    init_logging(&config.log_level);

    let listen = config.listen;
    info!(
        %listen,
        upstream = %config.upstream,
        mode = %config.mode,
        rules = config.blacklist.len(),
        "Starting DNS proxy"
    );

    let server = DnsServer::bind(config)
        .await
        .with_context(|| format!("Failed to bind to {}", listen))?;

    server.run().await.context("DNS server stopped")
}
