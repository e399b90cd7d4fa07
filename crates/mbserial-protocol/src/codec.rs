// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Packing characters into 16-bit registers.
//!
//! Two characters per register, first character in the high byte. An odd
//! trailing character leaves the low byte zero.

use crate::error::{ProtocolError, ProtocolResult};

/// Packs characters into registers.
pub fn pack_chars(chars: &[u8]) -> Vec<u16> {
    chars
        .chunks(2)
        .map(|pair| match *pair {
            [hi, lo] => u16::from_be_bytes([hi, lo]),
            [hi] => u16::from_be_bytes([hi, 0]),
            _ => 0,
        })
        .collect()
}

/// Unpacks `n_chars` characters from registers.
///
/// Extra registers are ignored. Fails if there are fewer than
/// `ceil(n_chars / 2)` registers.
pub fn unpack_chars(registers: &[u16], n_chars: usize) -> ProtocolResult<Vec<u8>> {
    let expected = n_chars.div_ceil(2);
    if registers.len() < expected {
        return Err(ProtocolError::InsufficientRegisters {
            chars: n_chars,
            expected,
            actual: registers.len(),
        });
    }

    let mut out = Vec::with_capacity(n_chars);
    for reg in &registers[..expected] {
        out.extend_from_slice(&reg.to_be_bytes());
    }
    out.truncate(n_chars);
    Ok(out)
}
