// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # mbserial-protocol
//!
//! Register protocol for tunnelling a serial byte stream through Modbus
//! holding registers.
//!
//! A device exposes a status register plus two data windows. The host
//! reads the status word, works out how many characters it may send and
//! how many it should collect, and then moves them through the windows
//! two characters per register. This crate holds that arithmetic; it does
//! no I/O.
//!
//! ## Architecture
//!
//! ```text
//!              ┌──────────────────────────────┐
//!              │           Layout             │
//!              │  (rx_tx | input_output)      │
//!              └──────────────┬───────────────┘
//!                             │ register_map()
//!                             ▼
//! ┌──────────────┐   ┌──────────────────────┐   ┌──────────────┐
//! │  StatusWord  │──▶│    Window planner    │◀──│ RegisterMap  │
//! │ (flow bits)  │   │ WindowPlan/ReceivePlan│   │ (windows)    │
//! └──────────────┘   └──────────┬───────────┘   └──────────────┘
//!                               │
//!                               ▼
//!                     ┌──────────────────┐
//!                     │   Char codec     │
//!                     │ (2 per register) │
//!                     └──────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`version`]: packed protocol version numbers
//! - [`register`]: 1-origin identifiers, address translation, windows
//! - [`status`]: the status word and its fields
//! - [`layout`]: tagged layout configuration
//! - [`window`]: transmit and receive planning
//! - [`codec`]: character packing
//!
//! ## Quick Start
//!
//! ```
//! use mbserial_protocol::{Layout, StatusWord, pack_chars};
//!
//! let map = Layout::RxTx.register_map();
//! let status = StatusWord::from_bits(0x8A05); // connected, 10 free, 5 waiting
//!
//! let rx = map.plan_receive(status);
//! assert_eq!((rx.base_register.get(), rx.register_count), (1002, 3));
//!
//! let tx = map.plan_transmit(status, 7);
//! assert_eq!((tx.base_register.get(), tx.register_count), (2059, 4));
//! assert_eq!(pack_chars(b"hello, ").len(), 4);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod codec;
pub mod error;
pub mod layout;
pub mod register;
pub mod status;
pub mod version;
pub mod window;

pub use codec::{pack_chars, unpack_chars};
pub use error::{ProtocolError, ProtocolResult};
pub use layout::{Layout, RegisterMap};
pub use register::{RegisterId, RegisterWindow, address_of, id_from_address, input_output, rx_tx};
pub use status::{StatusField, StatusFields, StatusWord, chars_to_registers};
pub use version::{PROTOCOL_VERSION, ProtocolVersion, make_version};
pub use window::{ReceivePlan, WindowPlan, plan_receive_window, plan_transmit_window};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
