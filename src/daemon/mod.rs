// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the epever-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Daemon Module
//!
//! The daemon module runs the simulated charge controller in the background and
//! shuts it down cleanly on request.
//!
//! ## Components
//!
//! * **Launch Daemon**: starts the Modbus RTU or TCP server, monitors it and
//!   stops it gracefully
//!
//! ## Usage
//!
//! ```no_run
//! use epever_simulator::{config::Config, daemon::launch_daemon::Daemon};
//!
//! async fn run() -> anyhow::Result<()> {
//!     let mut config = Config::from_file("config.yaml")?;
//!     config.apply_args(Some("/dev/ttyUSB0".to_string()), None, None, None);
//!
//!     // Create and launch daemon
//!     let mut daemon = Daemon::new();
//!     daemon.launch(&config).await?;
//!
//!     // Wait for shutdown signal (e.g., Ctrl+C)
//!     tokio::signal::ctrl_c().await?;
//!
//!     // Clean shutdown
//!     daemon.shutdown();
//!     daemon.join().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod launch_daemon;
