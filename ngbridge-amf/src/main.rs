//! ngap-bridge - NGAP TCP listener for gNB simulators
//!
//! Accepts gNB connections over TCP and relays them to an AMF over SCTP, or
//! answers NG Setup itself when the AMF cannot be reached.
//!
//! # Usage
//!
//! ```bash
//! ngap-bridge [TCP_ADDR] [TCP_PORT] [SCTP_ADDR] [SCTP_PORT]
//! ngap-bridge -c bridge.yaml --mock-only
//! ngap-bridge --amf-transport udp 127.0.0.4 38412 127.0.0.5 38413
//! ```

use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use ngbridge_amf::AmfBridge;
use ngbridge_common::{init_logging, AmfTransport, BridgeConfig, CliOverrides, LogLevel};

/// ngap-bridge - NGAP over TCP to an SCTP AMF, or a mock AMF
#[derive(Parser, Debug)]
#[command(name = "ngap-bridge")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to listen on for gNB connections
    #[arg(value_name = "TCP_ADDR")]
    tcp_addr: Option<IpAddr>,

    /// Port to listen on for gNB connections
    #[arg(value_name = "TCP_PORT")]
    tcp_port: Option<u16>,

    /// AMF address
    #[arg(value_name = "SCTP_ADDR")]
    sctp_addr: Option<IpAddr>,

    /// AMF SCTP port
    #[arg(value_name = "SCTP_PORT")]
    sctp_port: Option<u16>,

    /// Bridge configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config_file: Option<PathBuf>,

    /// Never contact the AMF; answer every connection locally
    #[arg(long = "mock-only")]
    mock_only: bool,

    /// AMF transport: kernel SCTP, or SCTP over UDP for sctp-proto peers
    #[arg(long = "amf-transport", value_name = "kernel|udp")]
    amf_transport: Option<AmfTransport>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short = 'l', long = "log-level", default_value = "info")]
    log_level: LogLevel,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            tcp_addr: self.tcp_addr,
            tcp_port: self.tcp_port,
            sctp_addr: self.sctp_addr,
            sctp_port: self.sctp_port,
            amf_transport: self.amf_transport,
        }
    }
}

/// Defaults, then the YAML file, then the environment, then the command line
fn load_config(args: &Args) -> Result<BridgeConfig> {
    let mut config = match &args.config_file {
        Some(path) => BridgeConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => BridgeConfig::default(),
    };
    config
        .apply_env()
        .context("Invalid BRIDGE_* environment variable")?;
    config.apply_overrides(&args.overrides());
    if args.mock_only {
        config.mock_only = true;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Completes on Ctrl+C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating shutdown..."),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.log_level);

    match run_bridge(args).await {
        Ok(()) => {
            info!("ngap-bridge exited successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("ngap-bridge failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_bridge(args: Args) -> Result<()> {
    let config = load_config(&args)?;

    println!("ngap-bridge - NGAP TCP/SCTP bridge");
    println!("==================================");
    println!("  gNB side (TCP):  {}", config.tcp_endpoint());
    println!(
        "  AMF side (SCTP): {} ({})",
        config.sctp_endpoint(),
        config.amf_transport
    );
    if config.mock_only {
        println!("  mock-only: AMF will not be contacted");
    }

    let bridge = AmfBridge::new(config);
    let listener = bridge.bind().await.context("Cannot start listener")?;
    bridge.announce_mode().await;

    let runner = {
        let bridge = bridge.clone();
        tokio::spawn(async move { bridge.run(listener).await })
    };

    shutdown_signal().await;
    bridge.stop();

    runner
        .await
        .context("Accept loop panicked")?
        .context("Accept loop failed")?;
    Ok(())
}
