// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Register identifiers, address translation and data windows.
//!
//! Modbus documentation numbers registers from 1; addresses on the bus
//! start at 0. Every identifier in this module is 1-origin and must go
//! through [`address_of`] before it is put on the wire.
//!
//! ```text
//!  identifier (docs)   1    2    3   ...  1001  1002 ... 1064
//!  address (wire)      0    1    2   ...  1000  1001 ... 1063
//! ```
//!
//! Two layouts exist. The Rx/Tx layout ([`rx_tx`]) carries 63-register
//! windows for each direction plus a trailing single-byte transmit
//! register; the Input/Output layout ([`input_output`]) carries two
//! 64-register blocks.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, ProtocolResult};

/// A 1-origin register identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegisterId(u16);

impl RegisterId {
    /// Wraps a raw identifier.
    ///
    /// No validation is performed; use [`RegisterId::try_new`] for values
    /// that come from outside the crate.
    #[inline]
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    /// Wraps a raw identifier, rejecting 0.
    pub fn try_new(id: u16) -> ProtocolResult<Self> {
        if id == 0 {
            return Err(ProtocolError::ZeroRegisterId);
        }
        Ok(Self(id))
    }

    /// Returns the raw 1-origin identifier.
    #[inline]
    pub const fn get(self) -> u16 {
        self.0
    }

    /// Returns the 0-origin bus address for this identifier.
    #[inline]
    pub const fn address(self) -> u16 {
        address_of(self)
    }

    /// Returns the identifier for a 0-origin bus address.
    #[inline]
    pub const fn from_address(address: u16) -> Self {
        id_from_address(address)
    }

    /// Returns the identifier `n` registers after this one.
    #[inline]
    pub const fn offset(self, n: u16) -> Self {
        Self(self.0.wrapping_add(n))
    }
}

impl fmt::Display for RegisterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u16> for RegisterId {
    type Error = ProtocolError;

    fn try_from(id: u16) -> Result<Self, Self::Error> {
        Self::try_new(id)
    }
}

impl From<RegisterId> for u16 {
    fn from(id: RegisterId) -> Self {
        id.0
    }
}

/// Converts a 1-origin identifier into its 0-origin bus address.
///
/// Identifier 0 is never valid and must not be passed here.
#[inline]
pub const fn address_of(id: RegisterId) -> u16 {
    id.0.wrapping_sub(1)
}

/// Converts a 0-origin bus address into its 1-origin identifier.
#[inline]
pub const fn id_from_address(address: u16) -> RegisterId {
    RegisterId(address.wrapping_add(1))
}

/// A contiguous run of registers reserved for one data direction.
///
/// Deserialized windows go through [`RegisterWindow::try_new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "WindowBounds")]
pub struct RegisterWindow {
    base: RegisterId,
    size: u16,
}

#[derive(Deserialize)]
struct WindowBounds {
    base: RegisterId,
    size: u16,
}

impl TryFrom<WindowBounds> for RegisterWindow {
    type Error = ProtocolError;

    fn try_from(bounds: WindowBounds) -> ProtocolResult<Self> {
        Self::try_new(bounds.base, bounds.size)
    }
}

impl RegisterWindow {
    /// Creates a window, checking that it is non-empty and fits the register space.
    pub fn try_new(base: RegisterId, size: u16) -> ProtocolResult<Self> {
        if size == 0 {
            return Err(ProtocolError::EmptyWindow { base: base.get() });
        }
        if base.get().checked_add(size - 1).is_none() {
            return Err(ProtocolError::WindowOverflow {
                base: base.get(),
                size,
            });
        }
        Ok(Self { base, size })
    }

    const fn fixed(base: u16, size: u16) -> Self {
        Self {
            base: RegisterId(base),
            size,
        }
    }

    /// First identifier of the window.
    #[inline]
    pub const fn base(&self) -> RegisterId {
        self.base
    }

    /// Number of registers in the window.
    #[inline]
    pub const fn size(&self) -> u16 {
        self.size
    }

    /// Last identifier of the window (`base + size - 1`).
    #[inline]
    pub const fn last(&self) -> RegisterId {
        RegisterId(self.base.0 + (self.size - 1))
    }

    /// Number of characters the window can carry.
    #[inline]
    pub const fn char_capacity(&self) -> u32 {
        self.size as u32 * 2
    }

    /// Returns `true` if `id` lies inside the window.
    #[inline]
    pub const fn contains(&self, id: RegisterId) -> bool {
        id.0 >= self.base.0 && id.0 <= self.last().0
    }

    /// Returns the position of `id` relative to the base.
    pub fn offset_of(&self, id: RegisterId) -> Option<u16> {
        self.contains(id).then(|| id.0 - self.base.0)
    }

    /// Iterates the identifiers in the window, lowest first.
    pub fn registers(&self) -> impl Iterator<Item = RegisterId> + use<> {
        (self.base.0..=self.last().0).map(RegisterId)
    }
}

impl fmt::Display for RegisterWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={} ({} registers)", self.base, self.last(), self.size)
    }
}

/// Register definitions for the Rx/Tx layout.
pub mod rx_tx {
    use super::{RegisterId, RegisterWindow};

    /// Number of receive data registers.
    pub const RX_DATA_REGS: u16 = 63;
    /// Number of transmit data registers.
    pub const TX_DATA_REGS: u16 = 63;

    /// Placeholder register at the start of the map.
    pub const DUMMY: RegisterId = RegisterId(1);
    /// Serial baud rate, 32 bits across two registers.
    pub const BAUDRATE: RegisterId = RegisterId(3);

    /// Packed flow-control status word.
    pub const STATUS: RegisterId = RegisterId(1001);

    /// First receive data register.
    pub const RX_DATA: RegisterId = RegisterId(1002);
    /// Last receive data register.
    pub const RX_DATA_LAST: RegisterId = RegisterId(1002 + RX_DATA_REGS - 1);

    /// First transmit data register.
    pub const TX_DATA: RegisterId = RegisterId(2001);
    /// Last transmit data register.
    pub const TX_DATA_LAST: RegisterId = RegisterId(2001 + TX_DATA_REGS - 1);
    /// Single-character transmit register following the window.
    pub const TX_DATA_BYTE: RegisterId = RegisterId(2001 + TX_DATA_REGS);

    /// Receive data window.
    pub const RX_WINDOW: RegisterWindow = RegisterWindow::fixed(1002, RX_DATA_REGS);
    /// Transmit data window.
    pub const TX_WINDOW: RegisterWindow = RegisterWindow::fixed(2001, TX_DATA_REGS);
}

/// Register definitions for the Input/Output layout.
pub mod input_output {
    use super::{RegisterId, RegisterWindow};

    /// Number of input data registers.
    pub const INPUT_DATA_REGS: u16 = 64;
    /// Number of output data registers.
    pub const OUTPUT_DATA_REGS: u16 = 64;

    /// Packed flow-control status word.
    pub const STATUS: RegisterId = RegisterId(1001);

    /// First input (device to host) data register.
    pub const INPUT_DATA: RegisterId = RegisterId(1002);
    /// Last input data register.
    pub const INPUT_DATA_LAST: RegisterId = RegisterId(1002 + INPUT_DATA_REGS - 1);

    /// First output (host to device) data register.
    pub const OUTPUT_DATA: RegisterId = RegisterId(2001);
    /// Last output data register.
    pub const OUTPUT_DATA_LAST: RegisterId = RegisterId(2001 + OUTPUT_DATA_REGS - 1);

    /// Input data window.
    pub const INPUT_WINDOW: RegisterWindow = RegisterWindow::fixed(1002, INPUT_DATA_REGS);
    /// Output data window.
    pub const OUTPUT_WINDOW: RegisterWindow = RegisterWindow::fixed(2001, OUTPUT_DATA_REGS);
}
