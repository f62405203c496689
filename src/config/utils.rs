// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the epever-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration utilities
//!
//! This module provides utility functions for working with configuration
//! settings, including validation and schema management.

use anyhow::{Context, Result};
use log::debug;

use super::Config;
use crate::modbus::identification::MAX_OBJECT_LEN;
use crate::modbus::{epever_register_table, RegisterMap};

const CONFIG_SCHEMA: &str = include_str!("../../resources/config.schema.json");


/// Output the embedded JSON schema to the console.
///
/// This function is called when the `--show-config-schema` flag is provided
/// on the command line.
///
/// # Example
///
/// ```bash
/// ./epever_simulator --show-config-schema > config_schema.json
/// ```
pub fn output_config_schema() -> Result<()> {
    let schema: serde_json::Value =
        serde_json::from_str(CONFIG_SCHEMA).context("Failed to parse JSON schema")?;

    let formatted_schema =
        serde_json::to_string_pretty(&schema).context("Failed to format JSON schema")?;

    println!("{}", formatted_schema);

    Ok(())
}

/// Build the draft 2020-12 validator for the embedded configuration schema.
pub(crate) fn schema_validator() -> Result<jsonschema::Validator> {
    let schema: serde_json::Value = serde_json::from_str(CONFIG_SCHEMA).with_context(|| {
        debug!("JSON schema string: {}", CONFIG_SCHEMA);
        "Failed to parse JSON schema"
    })?;

    let validator = jsonschema::draft202012::options()
        .should_validate_formats(true)
        .build(&schema)?;
    Ok(validator)
}

/// Check if a string is a valid IP address
///
/// Validates that a string represents a valid IPv4 or IPv6 address,
/// or is one of the special values like "localhost" or "0.0.0.0".
pub fn is_valid_ip_address(addr: &str) -> bool {
    if addr.parse::<std::net::IpAddr>().is_ok() {
        return true;
    }

    // Special cases
    matches!(addr, "localhost" | "::" | "::0" | "0.0.0.0")
}

/// Validates the configuration against rules that aren't covered by the JSON schema.
///
/// # Validation Rules
///
/// - **Serial framing**: baud rate above zero, 5 to 8 data bits, 1 or 2 stop bits
/// - **TCP listener**: port and address are usable when TCP mode is enabled
/// - **Identity**: ASCII strings short enough to fit one identification response
/// - **Device state**: every register of the table can be encoded and no two
///   entries overlap
pub fn validate_specific_rules(config: &Config) -> Result<()> {
    debug!("Performing additional validation checks");

    if config.serial.baud_rate == 0 {
        anyhow::bail!("Invalid baud rate: 0");
    }
    if !(5..=8).contains(&config.serial.data_bits) {
        anyhow::bail!("Invalid number of data bits: {}", config.serial.data_bits);
    }
    if !(1..=2).contains(&config.serial.stop_bits) {
        anyhow::bail!("Invalid number of stop bits: {}", config.serial.stop_bits);
    }

    let tcp = &config.modbus.tcp;
    if tcp.enabled {
        if tcp.port == 0 {
            anyhow::bail!("Invalid Modbus TCP port: 0");
        }
        if !is_valid_ip_address(&tcp.address) {
            anyhow::bail!("Invalid Modbus TCP address: {}", tcp.address);
        }
    }

    let identity = &config.identity;
    for (name, value) in [
        ("vendor_name", &identity.vendor_name),
        ("product_code", &identity.product_code),
        ("revision", &identity.revision),
    ] {
        if value.is_empty() || !value.is_ascii() || value.len() > MAX_OBJECT_LEN {
            anyhow::bail!(
                "Identity {} must be 1 to {} ASCII characters",
                name,
                MAX_OBJECT_LEN
            );
        }
    }

    // The register map is rebuilt at startup, but a state that cannot be encoded
    // should be reported while loading the file.
    RegisterMap::build(&epever_register_table(), &config.device)
        .context("Device state cannot be encoded into the register map")?;

    Ok(())
}
