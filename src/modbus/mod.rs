// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the epever-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus communication module
//!
//! This module turns the simulated device state into a Modbus slave, allowing
//! client software to be tested against the EPEver register map without the
//! physical charge controller.
//!
//! ## Key Components
//!
//! - `encoder`: fixed-point encoding of a value into 16-bit words.
//! - `register_map`: the sparse, immutable address → words table and its
//!   build-time overlap checks.
//! - `register_table`: the EPEver address table.
//! - `EpeverModbusServer`: the `tokio-modbus` service answering requests from the
//!   register map.
//!
//! ## Usage
//!
//! ```no_run
//! use epever_simulator::config::Config;
//! use epever_simulator::modbus::EpeverModbusServer;
//!
//! let config = Config::default();
//! let server = EpeverModbusServer::from_config(&config).unwrap();
//! assert_eq!(server.register_map().read(0x3000, 1).unwrap(), vec![0x1770]);
//! ```

pub mod encoder;
pub mod identification;
pub mod modbus_server;
pub mod register_map;
pub mod register_table;

pub use encoder::{decode, encode, EncodeError, RegisterWidth};
pub use identification::DeviceIdentification;
pub use modbus_server::EpeverModbusServer;
pub use register_map::{ConfigurationError, NotMapped, RegisterEntry, RegisterMap, RegisterSpec};
pub use register_table::epever_register_table;
