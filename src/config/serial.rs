// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the epever-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Serial line configuration
//!
//! EPEver controllers talk Modbus RTU at 115200 baud, 8 data bits, no parity and
//! one stop bit. Those are the defaults; other settings are accepted so the
//! simulator can stand in for older firmware.

use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Parity checking on the serial line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerialParity {
    #[default]
    None,
    Odd,
    Even,
}

impl From<SerialParity> for tokio_serial::Parity {
    fn from(parity: SerialParity) -> Self {
        match parity {
            SerialParity::None => tokio_serial::Parity::None,
            SerialParity::Odd => tokio_serial::Parity::Odd,
            SerialParity::Even => tokio_serial::Parity::Even,
        }
    }
}

/// Serial port settings for the RTU server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Serial device path, e.g. `/dev/ttyUSB0`. Usually given on the command line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,

    pub baud_rate: u32,

    /// 5 to 8
    pub data_bits: u8,

    pub parity: SerialParity,

    /// 1 or 2
    pub stop_bits: u8,

    /// Read/write timeout of the port in milliseconds
    pub timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: 115_200,
            data_bits: 8,
            parity: SerialParity::None,
            stop_bits: 1,
            timeout_ms: 1000,
        }
    }
}

impl SerialConfig {
    /// Build a `tokio_serial` port builder for `path` from these settings.
    ///
    /// # Errors
    ///
    /// Fails when `data_bits` or `stop_bits` hold a value the serial driver
    /// cannot represent.
    pub fn port_builder(&self, path: &str) -> Result<tokio_serial::SerialPortBuilder> {
        let data_bits = match self.data_bits {
            5 => tokio_serial::DataBits::Five,
            6 => tokio_serial::DataBits::Six,
            7 => tokio_serial::DataBits::Seven,
            8 => tokio_serial::DataBits::Eight,
            other => bail!("Unsupported number of data bits: {}", other),
        };
        let stop_bits = match self.stop_bits {
            1 => tokio_serial::StopBits::One,
            2 => tokio_serial::StopBits::Two,
            other => bail!("Unsupported number of stop bits: {}", other),
        };

        Ok(tokio_serial::new(path, self.baud_rate)
            .data_bits(data_bits)
            .parity(self.parity.into())
            .stop_bits(stop_bits)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(Duration::from_millis(self.timeout_ms)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_line_settings() {
        let serial = SerialConfig::default();
        assert_eq!(serial.baud_rate, 115_200);
        assert_eq!(serial.data_bits, 8);
        assert_eq!(serial.parity, SerialParity::None);
        assert_eq!(serial.stop_bits, 1);
    }

    #[test]
    fn test_port_builder_rejects_bad_framing() {
        let serial = SerialConfig {
            data_bits: 9,
            ..SerialConfig::default()
        };
        assert!(serial.port_builder("/dev/null").is_err());

        let serial = SerialConfig {
            stop_bits: 3,
            ..SerialConfig::default()
        };
        assert!(serial.port_builder("/dev/null").is_err());

        assert!(SerialConfig::default().port_builder("/dev/ttyS0").is_ok());
    }

    #[test]
    fn test_parity_from_yaml() {
        let serial: SerialConfig = serde_yml::from_str(
            "baud_rate: 9600\ndata_bits: 8\nparity: even\nstop_bits: 1\ntimeout_ms: 500\n",
        )
        .unwrap();
        assert_eq!(serial.parity, SerialParity::Even);
        assert_eq!(serial.baud_rate, 9600);
    }
}
