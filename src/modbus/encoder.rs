// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the epever-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Fixed-point register encoding
//!
//! Converts a scalar into the 16-bit words the charge controller would serve.
//! The value is multiplied by its scale and truncated toward zero, never rounded:
//! `11.8 * 0.8 = 9.44` becomes `944` and `-1.239` at scale 100 becomes `-123`.
//! Two-word values are emitted high word first.

use thiserror::Error;

/// Number of consecutive registers a value occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterWidth {
    /// One 16-bit register
    Single,
    /// Two registers forming a 32-bit value, high word first
    Double,
}

impl RegisterWidth {
    /// Number of 16-bit words covered by this width.
    pub fn words(self) -> u16 {
        match self {
            RegisterWidth::Single => 1,
            RegisterWidth::Double => 2,
        }
    }

    /// Inclusive integer range representable with this width.
    fn bounds(self, signed: bool) -> (i64, i64) {
        match (self, signed) {
            (RegisterWidth::Single, false) => (0, i64::from(u16::MAX)),
            (RegisterWidth::Single, true) => (i64::from(i16::MIN), i64::from(i16::MAX)),
            (RegisterWidth::Double, false) => (0, i64::from(u32::MAX)),
            (RegisterWidth::Double, true) => (i64::from(i32::MIN), i64::from(i32::MAX)),
        }
    }
}

/// Errors raised while encoding a single value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    #[error("scaled value {value} does not fit in {words} {kind} register(s)", words = .width.words(), kind = signedness(.signed))]
    OutOfRange {
        value: f64,
        width: RegisterWidth,
        signed: bool,
    },

    #[error("value is not a finite number")]
    NonFinite,
}

fn signedness(signed: &bool) -> &'static str {
    if *signed {
        "signed"
    } else {
        "unsigned"
    }
}

/// Encode `value` into register words.
///
/// ### Parameters
///
/// * `value` - The quantity in engineering units
/// * `width` - Number of registers to produce
/// * `scale` - Multiplier applied before truncation (100 keeps two decimals)
/// * `signed` - Whether negative values are allowed (two's complement)
///
/// ### Errors
///
/// Returns [`EncodeError::OutOfRange`] when the truncated value does not fit
/// the width and signedness, and [`EncodeError::NonFinite`] for NaN or infinity.
pub fn encode(
    value: f64,
    width: RegisterWidth,
    scale: f64,
    signed: bool,
) -> Result<Vec<u16>, EncodeError> {
    let scaled = value * scale;
    if !scaled.is_finite() {
        return Err(EncodeError::NonFinite);
    }

    let truncated = scaled.trunc();
    let (min, max) = width.bounds(signed);
    if truncated < min as f64 || truncated > max as f64 {
        return Err(EncodeError::OutOfRange {
            value: truncated,
            width,
            signed,
        });
    }

    let raw = truncated as i64;
    let words = match width {
        RegisterWidth::Single => vec![raw as u16],
        RegisterWidth::Double => {
            let raw = raw as u32;
            vec![(raw >> 16) as u16, raw as u16]
        }
    };
    Ok(words)
}

/// Decode words produced by [`encode`] back into the scaled integer.
///
/// Returns `None` when `words` is neither one nor two registers long.
pub fn decode(words: &[u16], signed: bool) -> Option<i64> {
    match (words, signed) {
        ([word], false) => Some(i64::from(*word)),
        ([word], true) => Some(i64::from(*word as i16)),
        ([high, low], false) => Some(i64::from((u32::from(*high) << 16) | u32::from(*low))),
        ([high, low], true) => Some(i64::from(((u32::from(*high) << 16) | u32::from(*low)) as i32)),
        _ => None,
    }
}
