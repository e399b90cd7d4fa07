// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the protocol crate.
//!
//! The register arithmetic itself never fails: status-word setters mask,
//! and address translation is total. Errors only come from the checked
//! constructors and from decoding register payloads.

use thiserror::Error;

/// Errors raised by checked constructors and the character codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Register identifiers are 1-origin; zero is never valid.
    #[error("Register identifier 0 is invalid (identifiers are 1-origin)")]
    ZeroRegisterId,

    /// A register window must span at least one register.
    #[error("Register window at {base} must span at least one register")]
    EmptyWindow {
        /// Base identifier of the window.
        base: u16,
    },

    /// A register window would run past the end of the 16-bit space.
    #[error("Register window at {base} with {size} registers overflows the register space")]
    WindowOverflow {
        /// Base identifier of the window.
        base: u16,
        /// Requested window size.
        size: u16,
    },

    /// Not enough registers to hold the requested number of characters.
    #[error("Need {expected} registers to decode {chars} characters, got {actual}")]
    InsufficientRegisters {
        /// Number of characters requested.
        chars: usize,
        /// Registers required.
        expected: usize,
        /// Registers supplied.
        actual: usize,
    },

    /// Unknown register layout name.
    #[error("Unknown register layout '{name}' (expected: rx_tx, input_output)")]
    UnknownLayout {
        /// The name that failed to parse.
        name: String,
    },
}

impl ProtocolError {
    /// Creates an unknown layout error.
    pub fn unknown_layout(name: impl Into<String>) -> Self {
        Self::UnknownLayout { name: name.into() }
    }
}

/// A Result type with ProtocolError.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert!(ProtocolError::ZeroRegisterId.to_string().contains("1-origin"));

        let err = ProtocolError::WindowOverflow { base: 65530, size: 10 };
        assert!(err.to_string().contains("65530"));

        let err = ProtocolError::unknown_layout("bogus");
        assert!(err.to_string().contains("bogus"));
    }
}
