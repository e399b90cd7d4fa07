// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Packed protocol version numbers.
//!
//! A version is four 8-bit components packed big-endian into a `u32`, so
//! that plain integer comparison orders versions correctly:
//!
//! ```text
//!  31      24 23      16 15       8 7        0
//! ┌──────────┬──────────┬──────────┬──────────┐
//! │  major   │  minor   │  patch   │  local   │
//! └──────────┴──────────┴──────────┴──────────┘
//! ```
//!
//! # Examples
//!
//! ```
//! use mbserial_protocol::version::{make_version, ProtocolVersion, PROTOCOL_VERSION};
//!
//! const REQUIRED: u32 = make_version(0, 1, 0, 0);
//! const _: () = assert!(PROTOCOL_VERSION.bits() >= REQUIRED);
//!
//! let v = ProtocolVersion::new(1, 2, 3, 4);
//! assert_eq!(v.to_string(), "1.2.3-4");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Version of the register protocol implemented by this crate.
pub const PROTOCOL_VERSION: ProtocolVersion = ProtocolVersion::new(0, 1, 0, 0);

/// Packs four components into a version number.
#[inline]
pub const fn make_version(major: u8, minor: u8, patch: u8, local: u8) -> u32 {
    ((major as u32) << 24) | ((minor as u32) << 16) | ((patch as u32) << 8) | (local as u32)
}

/// Extracts the major component.
#[inline]
pub const fn unpack_major(v: u32) -> u8 {
    (v >> 24) as u8
}

/// Extracts the minor component.
#[inline]
pub const fn unpack_minor(v: u32) -> u8 {
    (v >> 16) as u8
}

/// Extracts the patch component.
#[inline]
pub const fn unpack_patch(v: u32) -> u8 {
    (v >> 8) as u8
}

/// Extracts the local component.
#[inline]
pub const fn unpack_local(v: u32) -> u8 {
    v as u8
}

/// A packed version number with ordering by packed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtocolVersion(u32);

impl ProtocolVersion {
    /// Creates a version from its components.
    pub const fn new(major: u8, minor: u8, patch: u8, local: u8) -> Self {
        Self(make_version(major, minor, patch, local))
    }

    /// Wraps an already packed value.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Returns the packed value.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns the major component.
    pub const fn major(self) -> u8 {
        unpack_major(self.0)
    }

    /// Returns the minor component.
    pub const fn minor(self) -> u8 {
        unpack_minor(self.0)
    }

    /// Returns the patch component.
    pub const fn patch(self) -> u8 {
        unpack_patch(self.0)
    }

    /// Returns the local component.
    pub const fn local(self) -> u8 {
        unpack_local(self.0)
    }

    /// Returns `true` if this version is the same as or newer than `required`.
    pub const fn is_at_least(self, required: ProtocolVersion) -> bool {
        self.0 >= required.0
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major(), self.minor(), self.patch())?;
        if self.local() != 0 {
            write!(f, "-{}", self.local())?;
        }
        Ok(())
    }
}

impl From<u32> for ProtocolVersion {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

impl From<ProtocolVersion> for u32 {
    fn from(v: ProtocolVersion) -> Self {
        v.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_version_layout() {
        assert_eq!(make_version(1, 2, 3, 4), 0x0102_0304);
        assert_eq!(make_version(0xFF, 0, 0, 0), 0xFF00_0000);
        assert_eq!(make_version(0, 0, 0, 0xFF), 0x0000_00FF);
    }

    #[test]
    fn test_round_trip() {
        // Every byte value in each position, with the others held at edge values.
        for x in 0..=u8::MAX {
            for other in [0u8, 1, 0x7F, 0x80, 0xFE, 0xFF] {
                for (a, b, c, d) in [
                    (x, other, other, other),
                    (other, x, other, other),
                    (other, other, x, other),
                    (other, other, other, x),
                ] {
                    let v = make_version(a, b, c, d);
                    assert_eq!(
                        (unpack_major(v), unpack_minor(v), unpack_patch(v), unpack_local(v)),
                        (a, b, c, d)
                    );
                }
            }
        }
    }

    #[test]
    fn test_ordering() {
        assert!(ProtocolVersion::new(0, 2, 0, 0) > ProtocolVersion::new(0, 1, 255, 255));
        assert!(ProtocolVersion::new(1, 0, 0, 0) > ProtocolVersion::new(0, 255, 255, 255));
        assert!(PROTOCOL_VERSION.is_at_least(ProtocolVersion::new(0, 1, 0, 0)));
        assert!(!PROTOCOL_VERSION.is_at_least(ProtocolVersion::new(0, 1, 0, 1)));
    }

    #[test]
    fn test_display() {
        assert_eq!(PROTOCOL_VERSION.to_string(), "0.1.0");
        assert_eq!(ProtocolVersion::new(2, 10, 3, 7).to_string(), "2.10.3-7");
    }

    #[test]
    fn test_serde_is_packed_integer() {
        let json = serde_json::to_string(&ProtocolVersion::new(1, 2, 3, 4)).unwrap();
        assert_eq!(json, "16909060");
        let back: ProtocolVersion = serde_json::from_str(&json).unwrap();
        assert_eq!(back.patch(), 3);
    }
}
