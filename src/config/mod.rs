// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the epever-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management for the EPEver simulator
//!
//! This module provides functionality for loading, validating, and applying
//! configuration settings. The configuration is backed by a YAML file and
//! validated against a JSON schema before deserialization.
//!
//! ## Configuration Structure
//!
//! - `serial`: Settings for the RTU serial line
//! - `modbus`: Write policy and the optional Modbus TCP listener
//! - `identity`: Strings returned by the device identification request
//! - `device`: Overrides for the simulated device state
//!
//! Every section is optional and falls back to its defaults.
//!
//! ## Usage
//!
//! ```no_run
//! use epever_simulator::config::{Config, WritePolicy};
//! use std::path::Path;
//!
//! // Load config from file, creates a default if not found
//! let mut config = Config::from_file(Path::new("config.yaml")).unwrap();
//!
//! // Apply command line overrides if needed
//! config.apply_args(
//!     Some("/dev/ttyUSB0".to_string()),    // Serial port
//!     Some(9600),                          // Baud rate
//!     Some(WritePolicy::Discard),          // Write policy
//!     Some("127.0.0.1:5020".parse().unwrap()), // Modbus TCP listener
//! );
//!
//! // Command line values are checked like file values
//! epever_simulator::config::validate_specific_rules(&config).unwrap();
//!
//! println!("Serial speed: {}", config.serial.baud_rate);
//! ```

pub mod identity;
pub mod modbus;
pub mod serial;
pub mod utils;

use std::fs::{self, File};
use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, error};
use serde::{Deserialize, Serialize};

use crate::device::DeviceState;

// Re-export all types for public API
pub use identity::IdentityConfig;
pub use modbus::{ModbusConfig, TcpConfig, WritePolicy};
pub use serial::{SerialConfig, SerialParity};
pub use utils::{output_config_schema, validate_specific_rules};

/// Root configuration structure for the simulator.
///
/// The configuration is designed to be deserialized from and serialized to YAML
/// using the serde framework. The structure is validated against a JSON schema
/// to ensure all fields present have valid types and values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Serial line settings used by the RTU server.
    #[serde(default)]
    pub serial: SerialConfig,

    /// Modbus behaviour: write policy and TCP listener.
    #[serde(default)]
    pub modbus: ModbusConfig,

    /// Identification strings of the simulated device.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// The simulated device state.
    ///
    /// Fields left out take their built-in default value.
    #[serde(default)]
    pub device: DeviceState,
}

impl Config {
    /// Helper method to create a sample config file when validation fails
    fn create_sample_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        let sample_path = path.with_extension("sample.yaml");
        debug!("Creating sample configuration file at {:?}", sample_path);

        // Create parent directories if they don't exist
        if let Some(parent) = sample_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                debug!("Creating parent directory: {:?}", parent);
                fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "Failed to create parent directory for sample config at {:?}",
                        parent
                    )
                })?;
            }
        }

        Self::default()
            .save_to_file(&sample_path)
            .with_context(|| format!("Failed to save sample config to {:?}", sample_path))?;

        error!(
            "Sample configuration file created at {:?}\nPlease edit and rename it",
            sample_path
        );
        Ok(())
    }

    /// Load configuration from a file
    ///
    /// A missing file is created with the default configuration. A file that fails
    /// schema validation, deserialization or the specific rules leaves a
    /// `*.sample.yaml` file with the defaults next to it and returns an error.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "Configuration file not found at {:?}, creating default",
                path
            );
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;

        // First step: convert YAML to a generic Value
        let yaml_value: serde_yml::Value = serde_yml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML configuration from {:?}", path))?;

        // An empty file is a valid configuration with every default
        if yaml_value.is_null() {
            return Ok(Self::default());
        }

        // Convert to JSON Value for validation
        let json_value = serde_json::to_value(&yaml_value).with_context(|| {
            format!("Failed to convert YAML to JSON for validation: {:?}", path)
        })?;

        let validator = utils::schema_validator()?;

        debug!("Validating {} configuration against schema", path.display());
        if let Err(error) = validator.validate(&json_value) {
            error!("Configuration validation error before deserialization");
            Self::create_sample_config(path)?;
            anyhow::bail!("Configuration validation failed: {}", error);
        }

        debug!("Schema validation passed, deserializing into Config structure");
        let config: Config = match serde_yml::from_str(&contents) {
            Ok(config) => config,
            Err(err) => {
                error!("Configuration deserialization error: {}", err);
                if let Err(e) = Self::create_sample_config(path) {
                    error!("Failed to create sample config: {}", e);
                }
                return Err(anyhow::anyhow!(
                    "Failed to deserialize configuration from {}: {}",
                    path.display(),
                    err
                ));
            }
        };

        // Perform additional specific validations
        if let Err(err) = validate_specific_rules(&config) {
            error!("Configuration specific validation error: {}", err);
            Self::create_sample_config(path)?;
            return Err(err);
        }

        Ok(config)
    }

    /// Save the configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Apply command line arguments to override configuration values.
    ///
    /// Only values explicitly provided on the command line override the
    /// configuration. The result is not validated here; run
    /// [`validate_specific_rules`] on the merged configuration before serving.
    ///
    /// # Parameters
    ///
    /// * `port` - Serial device path
    /// * `baud_rate` - Serial line speed
    /// * `write_policy` - How write requests are answered
    /// * `tcp` - Modbus TCP listener address; enables TCP mode
    pub fn apply_args(
        &mut self,
        port: Option<String>,
        baud_rate: Option<u32>,
        write_policy: Option<WritePolicy>,
        tcp: Option<SocketAddr>,
    ) {
        if let Some(port) = port {
            debug!("Overriding serial port from command line: {}", port);
            self.serial.port = Some(port);
        }

        if let Some(baud_rate) = baud_rate {
            debug!("Overriding baud rate from command line: {}", baud_rate);
            self.serial.baud_rate = baud_rate;
        }

        if let Some(policy) = write_policy {
            debug!("Overriding write policy from command line: {:?}", policy);
            self.modbus.write_policy = policy;
        }

        if let Some(listen) = tcp {
            debug!("Serving Modbus TCP on {} from command line", listen);
            self.modbus.tcp.address = listen.ip().to_string();
            self.modbus.tcp.port = listen.port();
            self.modbus.tcp.enabled = true;
        }
    }
}
