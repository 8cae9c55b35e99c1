//! open5gs-portfix - give every Open5GS SBI server its own port

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Result};
use clap::Parser;
use tracing::{error, info, warn};

use ngbridge_common::{init_logging, LogLevel};
use ngbridge_portfix::{
    fix_additional, fix_service, verify, ADDITIONAL_SERVICES, DEFAULT_CONFIG_DIR, PORT_TABLE,
};

#[derive(Parser, Debug)]
#[command(name = "open5gs-portfix")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Directory holding the Open5GS service YAML files
    #[arg(short = 'd', long = "config-dir", value_name = "DIR", default_value = DEFAULT_CONFIG_DIR)]
    pub config_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long = "log-level", default_value = "info")]
    pub log_level: LogLevel,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.log_level);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let dir = args.config_dir.as_path();
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }

    info!("Fixing Open5GS port configurations in {}", dir.display());

    let mut failures = 0;
    for (service, _) in PORT_TABLE {
        match fix_service(dir, service) {
            Ok(Some(report)) if report.changed() => {
                info!("{}: {} value(s) updated", service, report.changes.len())
            }
            Ok(Some(_)) => info!("{}: already up to date", service),
            Ok(None) => {}
            Err(e) => {
                error!("{}", e);
                failures += 1;
            }
        }
    }

    for service in ADDITIONAL_SERVICES {
        match fix_additional(dir, service) {
            Ok(Some(report)) if report.changed() => {
                info!("{}: {} URL(s) updated", service, report.changes.len())
            }
            Ok(_) => {}
            Err(e) => {
                error!("{}", e);
                failures += 1;
            }
        }
    }

    info!("Port configuration update completed");

    info!("Verifying port assignments:");
    for check in verify(dir) {
        match check.actual {
            Some(port) if check.is_ok() => info!("{}: {}", check.service, port),
            Some(port) => warn!("{}: {} (expected {})", check.service, port, check.expected),
            None => warn!("{}: no SBI server port (expected {})", check.service, check.expected),
        }
    }

    if failures > 0 {
        warn!("{} file(s) could not be processed", failures);
    }
    Ok(())
}
