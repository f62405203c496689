// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the epever-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Main entry point for the EPEver charge controller simulator
use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::signal;

use epever_simulator::config::{self, Config, WritePolicy};
use epever_simulator::daemon::launch_daemon::Daemon;
use epever_simulator::modbus::EpeverModbusServer;

/// Simulated EPEver solar charge controller answering Modbus RTU requests
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Serial port to serve on (e.g. /dev/ttyUSB0)
    #[arg(required_unless_present_any = ["tcp", "dump_registers", "validate_config", "show_config_schema"])]
    port: Option<String>,

    /// Path to configuration file (YAML format)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Serial line speed
    #[arg(long)]
    baud_rate: Option<u32>,

    /// How write requests are answered
    #[arg(long, value_enum)]
    write_policy: Option<WritePolicy>,

    /// Serve Modbus TCP on ADDR:PORT instead of the serial port ([ADDR]:PORT for IPv6)
    #[arg(long, value_name = "ADDR:PORT")]
    tcp: Option<SocketAddr>,

    /// Print the encoded register map and exit
    #[arg(long)]
    dump_registers: bool,

    /// Path to a configuration to validate and exit
    #[arg(long)]
    validate_config: Option<PathBuf>,

    /// Output the configuration schema as JSON and exit
    #[arg(long)]
    show_config_schema: bool,

    /// Enable verbose logging (debug level)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Disable all logging output
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logger with appropriate level based on verbose and quiet flags
    let log_level = if args.quiet {
        log::LevelFilter::Off
    } else if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if args.show_config_schema {
        return config::output_config_schema();
    }

    if let Some(validate_path) = args.validate_config {
        if !validate_path.exists() {
            return Err(anyhow::anyhow!(
                "Configuration file does not exist: {}",
                validate_path.display()
            ));
        }

        Config::from_file(&validate_path)
            .map_err(|err| anyhow::anyhow!("Configuration validation failed: {}", err))?;
        println!("Configuration file is valid: {}", validate_path.display());
        return Ok(());
    }

    // Without --config the built-in defaults are used and nothing is written
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    config.apply_args(args.port, args.baud_rate, args.write_policy, args.tcp);
    config::validate_specific_rules(&config)
        .context("Invalid configuration after command line overrides")?;

    if args.dump_registers {
        let server = EpeverModbusServer::from_config(&config)?;
        for entry in server.register_map().entries() {
            println!("{}", entry);
        }
        return Ok(());
    }

    let mut daemon = Daemon::new();
    daemon.launch(&config).await?;
    info!("EPEver simulator running, press Ctrl+C to stop");

    tokio::select! {
        result = signal::ctrl_c() => {
            result?;
            info!("Received shutdown signal");
        }
        _ = daemon.stopped() => {
            warn!("Modbus server stopped on its own");
        }
    }

    daemon.shutdown();
    daemon.join().await?;
    info!("EPEver simulator stopped");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tcp_listener_argument() {
        let args = Args::try_parse_from(["epever-simulator", "--tcp", "0.0.0.0:1502"]).unwrap();
        assert_eq!(args.tcp, Some("0.0.0.0:1502".parse().unwrap()));

        let args = Args::try_parse_from(["epever-simulator", "--tcp", "[::1]:1502"]).unwrap();
        let listen = args.tcp.unwrap();
        assert!(listen.is_ipv6());
        assert_eq!(listen.port(), 1502);
    }

    #[test]
    fn test_malformed_tcp_listener_is_refused() {
        for value in ["127.0.0.1:abc", "::1", "127.0.0.1", "127.0.0.1:70000"] {
            assert!(
                Args::try_parse_from(["epever-simulator", "--tcp", value]).is_err(),
                "{value} should be refused"
            );
        }
    }

    #[test]
    fn test_port_required_without_tcp() {
        assert!(Args::try_parse_from(["epever-simulator"]).is_err());

        let args = Args::try_parse_from(["epever-simulator", "/dev/ttyUSB0", "-v"]).unwrap();
        assert_eq!(args.port.as_deref(), Some("/dev/ttyUSB0"));
        assert!(args.verbose);
    }
}
