// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the epever-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Read Device Identification (function 0x2B, MEI type 0x0E)
//!
//! Only the basic category is implemented: VendorName, ProductCode and
//! MajorMinorRevision. Stream access (read codes 1 to 3) and individual access
//! (read code 4) are supported.

use log::{debug, warn};
use tokio_modbus::ExceptionCode;

use crate::config::IdentityConfig;

/// Function code carried by `Request::Custom` for identification requests.
pub const READ_DEVICE_IDENTIFICATION: u8 = 0x2B;

const MEI_READ_DEVICE_ID: u8 = 0x0E;

/// Basic identification, stream and individual access
const CONFORMITY_LEVEL: u8 = 0x81;

/// Room left for objects in a response PDU after the function code and header.
const OBJECT_BUDGET: usize = 253 - 1 - 6;

/// Longest object value that fits a response on its own, next to its id and
/// length bytes.
pub const MAX_OBJECT_LEN: usize = OBJECT_BUDGET - 2;

/// Object value as served, cut to [`MAX_OBJECT_LEN`] bytes.
fn object_value(name: &str, value: &str) -> Vec<u8> {
    let mut bytes = value.as_bytes().to_vec();
    if bytes.len() > MAX_OBJECT_LEN {
        warn!(
            "Identification {} is {} bytes long, serving the first {}",
            name,
            bytes.len(),
            MAX_OBJECT_LEN
        );
        bytes.truncate(MAX_OBJECT_LEN);
    }
    bytes
}

/// Identification objects served by the simulated device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentification {
    objects: Vec<(u8, Vec<u8>)>,
}

impl From<&IdentityConfig> for DeviceIdentification {
    fn from(identity: &IdentityConfig) -> Self {
        Self {
            objects: vec![
                (0x00, object_value("vendor_name", &identity.vendor_name)),
                (0x01, object_value("product_code", &identity.product_code)),
                (0x02, object_value("revision", &identity.revision)),
            ],
        }
    }
}

impl Default for DeviceIdentification {
    fn default() -> Self {
        Self::from(&IdentityConfig::default())
    }
}

impl DeviceIdentification {
    /// Answer the data part of an identification request.
    ///
    /// `request` is `[MEI type, read device id code, object id]`. The returned
    /// bytes are the response PDU without its function code.
    pub fn respond(&self, request: &[u8]) -> Result<Vec<u8>, ExceptionCode> {
        let &[mei_type, read_code, object_id] = request else {
            return Err(ExceptionCode::IllegalDataValue);
        };
        if mei_type != MEI_READ_DEVICE_ID {
            return Err(ExceptionCode::IllegalFunction);
        }

        let mut response = vec![MEI_READ_DEVICE_ID, read_code, CONFORMITY_LEVEL];
        match read_code {
            // Stream access: basic, regular and extended all resolve to the basic
            // objects since nothing else exists.
            1..=3 => {
                let start = if self.position(object_id).is_some() {
                    object_id
                } else {
                    0x00
                };
                let mut more_follows = 0x00;
                let mut next_object_id = 0x00;
                let mut body = Vec::new();
                let mut count = 0u8;

                for (id, value) in self.objects.iter().filter(|(id, _)| *id >= start) {
                    // The first object always fits, so a page is never empty
                    if count > 0 && body.len() + 2 + value.len() > OBJECT_BUDGET {
                        more_follows = 0xFF;
                        next_object_id = *id;
                        break;
                    }
                    body.push(*id);
                    body.push(value.len() as u8);
                    body.extend_from_slice(value);
                    count += 1;
                }

                response.extend_from_slice(&[more_follows, next_object_id, count]);
                response.extend(body);
            }
            4 => {
                let value = self
                    .position(object_id)
                    .map(|index| &self.objects[index].1)
                    .ok_or(ExceptionCode::IllegalDataAddress)?;
                response.extend_from_slice(&[0x00, 0x00, 1, object_id, value.len() as u8]);
                response.extend_from_slice(value);
            }
            _ => return Err(ExceptionCode::IllegalDataValue),
        }

        debug!(
            "Device identification code {} from object {}: {} bytes",
            read_code,
            object_id,
            response.len()
        );
        Ok(response)
    }

    fn position(&self, object_id: u8) -> Option<usize> {
        self.objects.iter().position(|(id, _)| *id == object_id)
    }
}
