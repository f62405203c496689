// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the epever-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Sparse register map
//!
//! The register map is built once from a [`DeviceState`] and a declarative list of
//! [`RegisterSpec`] entries. Each entry names a start address, a width, a scale and
//! the device field it is sourced from. Building the map encodes every entry and
//! checks that no two entries share a register; once built, the map is immutable
//! and can be shared between connections without locking.
//!
//! Addresses without a covering entry are deliberately left empty. Reading one of
//! them is an error, never a zero.

use std::collections::BTreeMap;
use std::fmt;

use log::{debug, info};
use thiserror::Error;

use crate::device::DeviceState;
use crate::modbus::encoder::{self, EncodeError, RegisterWidth};

/// Fatal problems detected while building the register map.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("register 0x{second:04X} overlaps register 0x{first:04X}")]
    Overlap { first: u16, second: u16 },

    #[error("register 0x{address:04X} ({field}): {source}")]
    Encode {
        address: u16,
        field: &'static str,
        #[source]
        source: EncodeError,
    },

    #[error("register 0x{address:04X} with width {width} runs past the end of the address space")]
    AddressOverflow { address: u16, width: u16 },
}

/// A read touched a register with no backing value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("register 0x{address:04X} is not mapped")]
pub struct NotMapped {
    pub address: u16,
}

/// One entry of the register address table.
#[derive(Clone, Copy)]
pub struct RegisterSpec {
    /// First register address (zero-based)
    pub address: u16,
    pub width: RegisterWidth,
    /// Multiplier applied before truncation
    pub scale: f64,
    pub signed: bool,
    /// Name of the device field, used in logs and error messages
    pub field: &'static str,
    /// Reads the value from the device state
    pub source: fn(&DeviceState) -> f64,
}

impl RegisterSpec {
    /// Unsigned single register with no scaling.
    pub const fn raw(address: u16, field: &'static str, source: fn(&DeviceState) -> f64) -> Self {
        Self {
            address,
            width: RegisterWidth::Single,
            scale: 1.0,
            signed: false,
            field,
            source,
        }
    }

    /// Unsigned single register scaled by 100.
    pub const fn centi(address: u16, field: &'static str, source: fn(&DeviceState) -> f64) -> Self {
        Self {
            address,
            width: RegisterWidth::Single,
            scale: 100.0,
            signed: false,
            field,
            source,
        }
    }

    /// Unsigned register pair scaled by 100.
    pub const fn centi_double(
        address: u16,
        field: &'static str,
        source: fn(&DeviceState) -> f64,
    ) -> Self {
        Self {
            address,
            width: RegisterWidth::Double,
            scale: 100.0,
            signed: false,
            field,
            source,
        }
    }

    /// Last address covered by this entry, or `None` if it would pass 0xFFFF.
    fn last_address(&self) -> Option<u16> {
        self.address.checked_add(self.width.words() - 1)
    }
}

impl fmt::Debug for RegisterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterSpec")
            .field("address", &format_args!("0x{:04X}", self.address))
            .field("width", &self.width)
            .field("scale", &self.scale)
            .field("signed", &self.signed)
            .field("field", &self.field)
            .finish()
    }
}

/// An encoded table entry.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterEntry {
    pub address: u16,
    pub field: &'static str,
    pub signed: bool,
    pub words: Vec<u16>,
}

/// One line of the register dump: address, width, field, raw words and the
/// decoded integer value.
impl fmt::Display for RegisterEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words = self
            .words
            .iter()
            .map(|word| format!("0x{:04X}", word))
            .collect::<Vec<_>>()
            .join(" ");
        write!(
            f,
            "0x{:04X}  {}  {:<40} [{}]",
            self.address,
            self.words.len(),
            self.field,
            words
        )?;
        if let Some(value) = encoder::decode(&self.words, self.signed) {
            write!(f, "  {}", value)?;
        }
        Ok(())
    }
}

/// Immutable mapping from register address to encoded words.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegisterMap {
    /// Encoded entries keyed by start address
    entries: BTreeMap<u16, RegisterEntry>,
    /// Every covered register, including the inner words of multi-word entries
    words: BTreeMap<u16, u16>,
}

impl RegisterMap {
    /// Encode every spec against `state`.
    ///
    /// ### Errors
    ///
    /// Fails on the first entry that overlaps an earlier one, runs past address
    /// 0xFFFF, or whose value cannot be represented in its width.
    pub fn build(specs: &[RegisterSpec], state: &DeviceState) -> Result<Self, ConfigurationError> {
        let mut map = RegisterMap::default();

        for spec in specs {
            let last = spec
                .last_address()
                .ok_or(ConfigurationError::AddressOverflow {
                    address: spec.address,
                    width: spec.width.words(),
                })?;

            // The closest entry starting at or before our last register is the only
            // one that can intersect us, since existing entries never overlap.
            if let Some((&start, existing)) = map.entries.range(..=last).next_back() {
                let existing_last = start + (existing.words.len() as u16 - 1);
                if existing_last >= spec.address {
                    return Err(ConfigurationError::Overlap {
                        first: start,
                        second: spec.address,
                    });
                }
            }

            let value = (spec.source)(state);
            let words = encoder::encode(value, spec.width, spec.scale, spec.signed).map_err(
                |source| ConfigurationError::Encode {
                    address: spec.address,
                    field: spec.field,
                    source,
                },
            )?;
            debug!(
                "Register 0x{:04X} {} = {} -> {:04X?}",
                spec.address, spec.field, value, words
            );

            for (offset, word) in words.iter().enumerate() {
                map.words.insert(spec.address + offset as u16, *word);
            }
            map.entries.insert(
                spec.address,
                RegisterEntry {
                    address: spec.address,
                    field: spec.field,
                    signed: spec.signed,
                    words,
                },
            );
        }

        info!(
            "Register map built with {} entries covering {} registers",
            map.entries.len(),
            map.words.len()
        );
        Ok(map)
    }

    /// Read `count` consecutive registers starting at `address`.
    ///
    /// Reads may start inside a multi-word entry and may span several entries.
    /// The first register without a backing value aborts the read.
    pub fn read(&self, address: u16, count: u16) -> Result<Vec<u16>, NotMapped> {
        (0..count)
            .map(|offset| {
                let reg_addr = address.checked_add(offset).ok_or(NotMapped {
                    address: u16::MAX,
                })?;
                self.word(reg_addr)
            })
            .collect()
    }

    /// Value of a single register.
    pub fn word(&self, address: u16) -> Result<u16, NotMapped> {
        self.words.get(&address).copied().ok_or(NotMapped { address })
    }

    /// Whether every register in `[address, address + count)` has a value.
    pub fn covers(&self, address: u16, count: u16) -> bool {
        (0..count).all(|offset| {
            address
                .checked_add(offset)
                .is_some_and(|reg_addr| self.words.contains_key(&reg_addr))
        })
    }

    /// Entries in ascending address order.
    pub fn entries(&self) -> impl Iterator<Item = &RegisterEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_specs() -> Vec<RegisterSpec> {
        vec![
            RegisterSpec::centi(0x3000, "array_rated_voltage", |s| s.array_rated_voltage),
            RegisterSpec::centi_double(0x3002, "array_rated_power", |s| s.array_rated_power),
            RegisterSpec::raw(0x200C, "is_night", |s| f64::from(u8::from(s.is_night))),
        ]
    }

    #[test]
    fn test_build_and_read_entries() {
        let map = RegisterMap::build(&sample_specs(), &DeviceState::default()).unwrap();

        assert_eq!(map.len(), 3);
        assert_eq!(map.read(0x3000, 1), Ok(vec![0x1770]));
        assert_eq!(map.read(0x3002, 2), Ok(vec![0x0002, 0xBF20]));
        assert_eq!(map.read(0x200C, 1), Ok(vec![0x0000]));
    }

    #[test]
    fn test_entry_dump_line() {
        let map = RegisterMap::build(&sample_specs(), &DeviceState::default()).unwrap();
        let lines: Vec<String> = map.entries().map(ToString::to_string).collect();

        assert_eq!(lines.len(), 3);
        // Entries are listed in address order
        assert!(lines[0].starts_with("0x200C  1  is_night"));
        assert!(lines[2].starts_with("0x3002  2  array_rated_power"));
        assert!(lines[2].ends_with("[0x0002 0xBF20]  180000"));
    }

    #[test]
    fn test_read_inside_multi_word_entry() {
        let map = RegisterMap::build(&sample_specs(), &DeviceState::default()).unwrap();
        assert_eq!(map.read(0x3003, 1), Ok(vec![0xBF20]));
    }

    #[test]
    fn test_read_gap_is_not_mapped() {
        let map = RegisterMap::build(&sample_specs(), &DeviceState::default()).unwrap();

        assert_eq!(map.read(0x9999, 1), Err(NotMapped { address: 0x9999 }));
        // 0x3001 sits between two entries
        assert_eq!(map.read(0x3000, 3), Err(NotMapped { address: 0x3001 }));
        assert!(!map.covers(0x3000, 2));
        assert!(map.covers(0x3002, 2));
    }

    #[test]
    fn test_read_past_end_of_address_space() {
        let specs = [RegisterSpec::raw(0xFFFF, "last", |_| 7.0)];
        let map = RegisterMap::build(&specs, &DeviceState::default()).unwrap();

        assert_eq!(map.read(0xFFFF, 1), Ok(vec![7]));
        assert!(map.read(0xFFFF, 2).is_err());
        assert!(!map.covers(0xFFFF, 2));
    }

    #[test]
    fn test_zero_count_read_is_empty() {
        let map = RegisterMap::build(&sample_specs(), &DeviceState::default()).unwrap();
        assert_eq!(map.read(0x9999, 0), Ok(vec![]));
    }

    #[test]
    fn test_duplicate_address_is_rejected() {
        let specs = [
            RegisterSpec::centi(0x3000, "array_rated_voltage", |s| s.array_rated_voltage),
            RegisterSpec::centi(0x3000, "array_rated_current", |s| s.array_rated_current),
        ];
        assert_eq!(
            RegisterMap::build(&specs, &DeviceState::default()),
            Err(ConfigurationError::Overlap {
                first: 0x3000,
                second: 0x3000
            })
        );
    }

    #[test]
    fn test_partial_overlap_is_rejected_in_both_orders() {
        let wide = RegisterSpec::centi_double(0x3002, "array_rated_power", |s| s.array_rated_power);
        let narrow = RegisterSpec::centi(0x3003, "array_rated_current", |s| s.array_rated_current);
        let before = RegisterSpec::centi_double(0x3001, "battery_rated_power", |s| {
            s.battery_rated_power
        });

        assert_eq!(
            RegisterMap::build(&[wide, narrow], &DeviceState::default()),
            Err(ConfigurationError::Overlap {
                first: 0x3002,
                second: 0x3003
            })
        );
        assert_eq!(
            RegisterMap::build(&[narrow, wide], &DeviceState::default()),
            Err(ConfigurationError::Overlap {
                first: 0x3003,
                second: 0x3002
            })
        );
        assert_eq!(
            RegisterMap::build(&[wide, before], &DeviceState::default()),
            Err(ConfigurationError::Overlap {
                first: 0x3002,
                second: 0x3001
            })
        );
    }

    #[test]
    fn test_adjacent_entries_do_not_overlap() {
        let specs = [
            RegisterSpec::centi_double(0x3002, "array_rated_power", |s| s.array_rated_power),
            RegisterSpec::centi(0x3004, "battery_rated_voltage", |s| s.battery_rated_voltage),
            RegisterSpec::centi(0x3001, "array_rated_current", |s| s.array_rated_current),
        ];
        let map = RegisterMap::build(&specs, &DeviceState::default()).unwrap();
        assert_eq!(map.read(0x3001, 4), Ok(vec![3000, 0x0002, 0xBF20, 1200]));
    }

    #[test]
    fn test_address_overflow_is_rejected() {
        let specs = [RegisterSpec::centi_double(0xFFFF, "wrapped", |_| 1.0)];
        assert_eq!(
            RegisterMap::build(&specs, &DeviceState::default()),
            Err(ConfigurationError::AddressOverflow {
                address: 0xFFFF,
                width: 2
            })
        );
    }

    #[test]
    fn test_unrepresentable_value_is_rejected() {
        let state = DeviceState {
            array_rated_voltage: 700.0,
            ..DeviceState::default()
        };
        let err = RegisterMap::build(&sample_specs(), &state).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::Encode {
                address: 0x3000,
                field: "array_rated_voltage",
                source: EncodeError::OutOfRange { .. }
            }
        ));
        assert!(err.to_string().contains("0x3000"));
    }

    #[test]
    fn test_repeated_reads_are_identical() {
        let map = RegisterMap::build(&sample_specs(), &DeviceState::default()).unwrap();
        let first = map.read(0x3002, 2);
        for _ in 0..10 {
            assert_eq!(map.read(0x3002, 2), first);
        }
    }
}
