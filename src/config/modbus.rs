// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the epever-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus server configuration
//!
//! This module defines how the simulated device answers write requests and the
//! optional Modbus TCP listener used instead of the serial line.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Behaviour of the server when a client tries to write.
///
/// The simulated state is a fixed snapshot, so writes never change what is read
/// back. The policy only decides what the client sees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WritePolicy {
    /// Answer every write function with an `IllegalFunction` exception.
    #[default]
    Reject,
    /// Acknowledge writes to mapped registers and drop the values.
    Discard,
}

/// Configuration for the Modbus TCP listener.
///
/// # Fields
///
/// * `enabled` - Serve Modbus TCP instead of Modbus RTU
/// * `port` - TCP port number for the Modbus server (default: 5020)
/// * `address` - Network address for the Modbus server to bind to (default: 127.0.0.1)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpConfig {
    /// When enabled, the serial port is not opened.
    pub enabled: bool,

    /// The network address the Modbus server will bind to.
    ///
    /// Use "0.0.0.0" to bind to all IPv4 interfaces.
    pub address: String,

    /// The TCP port the Modbus server will listen on.
    ///
    /// 5020 is used rather than the standard 502 so the simulator can run
    /// without elevated privileges.
    pub port: u16,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: "127.0.0.1".to_string(),
            port: 5020,
        }
    }
}

/// Configuration for the Modbus side of the simulator.
///
/// # Example
///
/// ```
/// use epever_simulator::config::{ModbusConfig, WritePolicy};
///
/// let modbus_config = ModbusConfig {
///     write_policy: WritePolicy::Discard,
///     ..ModbusConfig::default()
/// };
/// assert!(!modbus_config.tcp.enabled);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModbusConfig {
    #[serde(default)]
    pub write_policy: WritePolicy,

    #[serde(default)]
    pub tcp: TcpConfig,
}
