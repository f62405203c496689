// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the epever-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Device identification strings
//!
//! Returned by the Read Device Identification request (function 0x2B / MEI 0x0E).
//! They are not part of the register map.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Object 0x00
    pub vendor_name: String,
    /// Object 0x01
    pub product_code: String,
    /// Object 0x02, MajorMinorRevision
    pub revision: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            vendor_name: "Fake EPever".to_string(),
            product_code: "AN".to_string(),
            revision: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
