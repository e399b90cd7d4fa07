// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The packed flow-control status word.
//!
//! The device publishes one 16-bit status register describing both data
//! directions:
//!
//! ```text
//!   15  14                  8   7   6                   0
//! ┌───┬──────────────────────┬───┬──────────────────────┐
//! │ C │  transmit available  │ E │  receive available   │
//! └───┴──────────────────────┴───┴──────────────────────┘
//!   C: media connected
//!   E: transmit buffer empty (Rx/Tx layout only, reserved otherwise)
//! ```
//!
//! [`StatusWord`] is an immutable value. Setters return a new word and
//! silently truncate values that do not fit their field.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A contiguous bit field inside a 16-bit word, identified by its mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusField(u16);

impl StatusField {
    /// Characters waiting to be read from the device.
    pub const RECEIVE_AVAILABLE: Self = Self(0x007F);
    /// Transmit buffer empty (Rx/Tx layout).
    pub const TRANSMIT_EMPTY: Self = Self(0x0080);
    /// Free character slots in the device's transmit buffer.
    pub const TRANSMIT_AVAILABLE: Self = Self(0x7F00);
    /// Serial media connected.
    pub const CONNECTED: Self = Self(0x8000);

    /// Returns the field mask.
    #[inline]
    pub const fn mask(self) -> u16 {
        self.0
    }

    /// Returns the lowest set bit of the mask.
    #[inline]
    pub const fn lsb(self) -> u16 {
        self.0 & self.0.wrapping_neg()
    }

    /// Largest value the field can hold.
    #[inline]
    pub const fn max_value(self) -> u16 {
        self.0 / self.lsb()
    }

    /// Extracts the field value from `word`.
    #[inline]
    pub const fn get(self, word: u16) -> u16 {
        (word & self.0) / self.lsb()
    }

    /// Returns `word` with the field replaced by `value`, truncated to the field width.
    #[inline]
    pub const fn set(self, word: u16, value: u16) -> u16 {
        (word & !self.0) | (value.wrapping_mul(self.lsb()) & self.0)
    }
}

/// The set of status fields a register layout defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusFields {
    /// Receive-available count.
    pub receive_available: StatusField,
    /// Transmit-empty flag, if the layout has one.
    pub transmit_empty: Option<StatusField>,
    /// Transmit-available count.
    pub transmit_available: StatusField,
    /// Connected flag.
    pub connected: StatusField,
}

impl StatusFields {
    /// Fields of the Rx/Tx layout.
    pub const RX_TX: Self = Self {
        receive_available: StatusField::RECEIVE_AVAILABLE,
        transmit_empty: Some(StatusField::TRANSMIT_EMPTY),
        transmit_available: StatusField::TRANSMIT_AVAILABLE,
        connected: StatusField::CONNECTED,
    };

    /// Fields of the Input/Output layout. Bit 7 is reserved.
    pub const INPUT_OUTPUT: Self = Self {
        receive_available: StatusField::RECEIVE_AVAILABLE,
        transmit_empty: None,
        transmit_available: StatusField::TRANSMIT_AVAILABLE,
        connected: StatusField::CONNECTED,
    };

    /// Union of all defined field masks.
    pub fn defined_mask(&self) -> u16 {
        self.receive_available.mask()
            | self.transmit_empty.map_or(0, StatusField::mask)
            | self.transmit_available.mask()
            | self.connected.mask()
    }

    /// Bits not covered by any defined field.
    pub fn reserved_mask(&self) -> u16 {
        !self.defined_mask()
    }
}

/// A decoded view of the status register.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusWord(u16);

impl StatusWord {
    /// Wraps a raw register value.
    #[inline]
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// Returns the raw register value.
    #[inline]
    pub const fn bits(self) -> u16 {
        self.0
    }

    #[inline]
    const fn with_field(self, field: StatusField, value: u16) -> Self {
        Self(field.set(self.0, value))
    }

    // ---- Receive direction ----

    /// Characters waiting to be read (0 to 127).
    #[inline]
    pub const fn receive_available(self) -> u8 {
        StatusField::RECEIVE_AVAILABLE.get(self.0) as u8
    }

    /// Registers to read to collect every waiting character.
    #[inline]
    pub const fn registers_to_read_for_receive(self) -> u16 {
        chars_to_registers(self.receive_available() as u16)
    }

    /// Returns a copy with the receive-available count replaced.
    #[inline]
    pub const fn with_receive_available(self, n: u8) -> Self {
        self.with_field(StatusField::RECEIVE_AVAILABLE, n as u16)
    }

    // ---- Transmit direction ----

    /// Whether the device's transmit buffer has drained.
    ///
    /// Only meaningful for the Rx/Tx layout; see
    /// [`RegisterMap::transmit_empty`](crate::layout::RegisterMap::transmit_empty).
    #[inline]
    pub const fn is_transmit_empty(self) -> bool {
        StatusField::TRANSMIT_EMPTY.get(self.0) != 0
    }

    /// Returns a copy with the transmit-empty flag replaced.
    #[inline]
    pub const fn with_transmit_empty(self, empty: bool) -> Self {
        self.with_field(StatusField::TRANSMIT_EMPTY, empty as u16)
    }

    /// Free character slots in the transmit buffer (0 to 127).
    #[inline]
    pub const fn transmit_available(self) -> u8 {
        StatusField::TRANSMIT_AVAILABLE.get(self.0) as u8
    }

    /// Returns a copy with the transmit-available count replaced.
    #[inline]
    pub const fn with_transmit_available(self, n: u8) -> Self {
        self.with_field(StatusField::TRANSMIT_AVAILABLE, n as u16)
    }

    // ---- Link ----

    /// Whether the serial media is connected.
    #[inline]
    pub const fn is_connected(self) -> bool {
        StatusField::CONNECTED.get(self.0) != 0
    }

    /// Returns a copy with the connected flag replaced.
    #[inline]
    pub const fn with_connected(self, connected: bool) -> Self {
        self.with_field(StatusField::CONNECTED, connected as u16)
    }
}

/// Registers needed to carry `n` characters, two per register.
///
/// Computed as `(n >> 1) + (n & 1)` so that `n = 0xFFFF` yields `0x8000`
/// instead of wrapping.
#[inline]
pub const fn chars_to_registers(n: u16) -> u16 {
    (n >> 1) + (n & 1)
}

impl fmt::Debug for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusWord")
            .field("bits", &format_args!("{:#06x}", self.0))
            .field("receive_available", &self.receive_available())
            .field("transmit_empty", &self.is_transmit_empty())
            .field("transmit_available", &self.transmit_available())
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rx={} tx={} {}",
            self.receive_available(),
            self.transmit_available(),
            if self.is_connected() { "connected" } else { "disconnected" }
        )
    }
}

impl From<u16> for StatusWord {
    fn from(bits: u16) -> Self {
        Self(bits)
    }
}

impl From<StatusWord> for u16 {
    fn from(word: StatusWord) -> Self {
        word.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_FIELDS: [StatusField; 4] = [
        StatusField::RECEIVE_AVAILABLE,
        StatusField::TRANSMIT_EMPTY,
        StatusField::TRANSMIT_AVAILABLE,
        StatusField::CONNECTED,
    ];

    #[test]
    fn test_field_lsb_and_width() {
        assert_eq!(StatusField::RECEIVE_AVAILABLE.lsb(), 0x0001);
        assert_eq!(StatusField::TRANSMIT_EMPTY.lsb(), 0x0080);
        assert_eq!(StatusField::TRANSMIT_AVAILABLE.lsb(), 0x0100);
        assert_eq!(StatusField::CONNECTED.lsb(), 0x8000);
        assert_eq!(StatusField::TRANSMIT_AVAILABLE.max_value(), 127);
        assert_eq!(StatusField::CONNECTED.max_value(), 1);
    }

    #[test]
    fn test_fields_disjoint_and_cover_word() {
        let mut union = 0u16;
        for f in ALL_FIELDS {
            assert_eq!(union & f.mask(), 0, "overlap at {:#06x}", f.mask());
            union |= f.mask();
        }
        assert_eq!(union, 0xFFFF);
        assert_eq!(StatusFields::RX_TX.reserved_mask(), 0);
        assert_eq!(StatusFields::INPUT_OUTPUT.reserved_mask(), 0x0080);
    }

    #[test]
    fn test_decode_example_word() {
        // connected, 10 free slots, empty, 5 waiting
        let w = StatusWord::from_bits(0x8A85);
        assert!(w.is_connected());
        assert_eq!(w.transmit_available(), 10);
        assert!(w.is_transmit_empty());
        assert_eq!(w.receive_available(), 5);
        assert_eq!(w.registers_to_read_for_receive(), 3);
    }

    #[test]
    fn test_get_ignores_neighbouring_bits() {
        let w = StatusWord::from_bits(0xFFFF);
        assert_eq!(w.receive_available(), 127);
        assert_eq!(w.transmit_available(), 127);

        let w = StatusWord::from_bits(0x80FF);
        assert_eq!(w.transmit_available(), 0);
        assert_eq!(w.receive_available(), 127);
    }

    #[test]
    fn test_registers_to_read_for_receive() {
        let rx = |n: u8| StatusWord::default().with_receive_available(n).registers_to_read_for_receive();
        assert_eq!(rx(0), 0);
        assert_eq!(rx(1), 1);
        assert_eq!(rx(2), 1);
        assert_eq!(rx(127), 64);
        for n in 0..=127u8 {
            assert_eq!(rx(n), (n as u16).div_ceil(2));
        }
    }

    #[test]
    fn test_chars_to_registers_does_not_wrap() {
        assert_eq!(chars_to_registers(0xFFFF), 0x8000);
        for n in 0..=u16::MAX {
            assert_eq!(chars_to_registers(n) as u32, (n as u32).div_ceil(2));
        }
    }

    #[test]
    fn test_setters_truncate() {
        let w = StatusWord::default().with_receive_available(200);
        assert_eq!(w.receive_available(), 200 & 0x7F);
        assert!(!w.is_transmit_empty());

        let w = StatusWord::default().with_transmit_available(0xFF);
        assert_eq!(w.transmit_available(), 127);
        assert!(!w.is_connected());
    }

    #[test]
    fn test_field_isolation() {
        let samples = [0x0000u16, 0xFFFF, 0x8A85, 0x5A5A, 0x7F00, 0x007F];
        for field in ALL_FIELDS {
            for &word in &samples {
                for value in [0u16, 1, field.max_value(), 0xFFFF] {
                    let updated = field.set(word, value);
                    assert_eq!(updated & !field.mask(), word & !field.mask());
                    for other in ALL_FIELDS.iter().filter(|o| **o != field) {
                        assert_eq!(other.get(updated), other.get(word));
                    }
                    assert_eq!(field.get(updated), value & field.max_value());
                }
            }
        }
    }

    #[test]
    fn test_typed_setters_preserve_other_fields() {
        let base = StatusWord::from_bits(0x8A85);
        let w = base.with_connected(false);
        assert_eq!(w.bits(), 0x0A85);
        let w = base.with_transmit_empty(false);
        assert_eq!(w.bits(), 0x8A05);
        let w = base.with_transmit_available(1);
        assert_eq!(w.bits(), 0x8185);
        let w = base.with_receive_available(0);
        assert_eq!(w.bits(), 0x8A80);
        // original untouched
        assert_eq!(base.bits(), 0x8A85);
    }

    #[test]
    fn test_display_and_debug() {
        let w = StatusWord::from_bits(0x8A85);
        assert_eq!(w.to_string(), "rx=5 tx=10 connected");
        let dbg = format!("{w:?}");
        assert!(dbg.contains("0x8a85"));
        assert!(dbg.contains("transmit_available: 10"));
        assert_eq!(StatusWord::default().to_string(), "rx=0 tx=0 disconnected");
    }
}
