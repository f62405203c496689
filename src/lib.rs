// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the epever-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! EPEver solar charge controller simulator
//!
//! This library exposes a fixed, configurable device state through the EPEver
//! Modbus register map, so that monitoring software can be developed and tested
//! without the physical controller.

pub mod config;
pub mod daemon;
pub mod device;
pub mod modbus;
