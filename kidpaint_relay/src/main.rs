// CLI entry point for the KidPaint relay.
//
// Starts a standalone relay that canvas clients find over UDP discovery and
// connect to over TCP. The relay keeps the canonical grid and forwards every
// edit and chat line; it runs until the process is killed. See `server.rs`
// for the networking architecture and `session.rs` for the session state.
//
// Settings come from the defaults, then an optional JSON file (`--config`),
// then individual flags.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;
use kidpaint_relay::config::RelayConfig;
use kidpaint_relay::error::RelayError;
use kidpaint_relay::{logging, start_relay};
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "relay", version, about = "Shared canvas relay for KidPaint")]
struct Cli {
    /// JSON file with relay settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind the TCP listener and discovery responder to
    #[arg(long)]
    bind: Option<IpAddr>,

    /// TCP session port (0 picks a free port)
    #[arg(short, long)]
    port: Option<u16>,

    /// UDP discovery port
    #[arg(long)]
    discovery_port: Option<u16>,

    /// Run without answering discovery requests
    #[arg(long, conflicts_with = "discovery_port")]
    no_discovery: bool,

    /// Canvas width in cells
    #[arg(long)]
    width: Option<u32>,

    /// Canvas height in cells
    #[arg(long)]
    height: Option<u32>,

    /// Refuse connections beyond this many participants
    #[arg(long)]
    max_participants: Option<u32>,

    /// Drop a participant whose socket accepts nothing for this long
    #[arg(long)]
    write_timeout_ms: Option<u64>,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn relay_config(&self) -> Result<RelayConfig, RelayError> {
        let mut config = match &self.config {
            Some(path) => RelayConfig::from_json_file(path)?,
            None => RelayConfig::default(),
        };
        if let Some(bind) = self.bind {
            config.bind_address = bind;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(port) = self.discovery_port {
            config.discovery_port = Some(port);
        }
        if self.no_discovery {
            config.discovery_port = None;
        }
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(height) = self.height {
            config.height = height;
        }
        if let Some(max) = self.max_participants {
            config.max_participants = max;
        }
        if let Some(timeout_ms) = self.write_timeout_ms {
            config.write_timeout_ms = timeout_ms;
        }
        Ok(config)
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = match cli.relay_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };
    let (width, height) = (config.width, config.height);

    let (handle, addr) = match start_relay(config) {
        Ok(result) => result,
        Err(e) => {
            error!("failed to start relay: {e}");
            std::process::exit(1);
        }
    };

    info!(%addr, width, height, "relay listening");
    match handle.discovery_addr() {
        Some(discovery) => info!(%discovery, "answering discovery requests"),
        None => info!("discovery disabled"),
    }
    handle.wait();
}
