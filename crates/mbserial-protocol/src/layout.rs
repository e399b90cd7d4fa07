// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Register layouts as tagged configuration.
//!
//! A [`Layout`] names one of the supported device register maps. Each
//! layout resolves to a [`RegisterMap`] carrying its window geometry and
//! the status fields it defines, so the tunnel logic is written once and
//! parameterised by the map.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::register::{RegisterId, RegisterWindow, input_output, rx_tx};
use crate::status::{StatusFields, StatusWord};

/// Supported register layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// Rx/Tx windows of 63 registers with a tx-empty flag, trailing byte
    /// register and baud-rate register.
    #[default]
    RxTx,
    /// Input/Output blocks of 64 registers.
    InputOutput,
}

impl Layout {
    /// All layouts.
    pub const ALL: [Layout; 2] = [Layout::RxTx, Layout::InputOutput];

    /// Returns the register map for this layout.
    pub const fn register_map(self) -> RegisterMap {
        match self {
            Layout::RxTx => RegisterMap::RX_TX,
            Layout::InputOutput => RegisterMap::INPUT_OUTPUT,
        }
    }

    /// Returns the canonical configuration name.
    pub const fn name(self) -> &'static str {
        match self {
            Layout::RxTx => "rx_tx",
            Layout::InputOutput => "input_output",
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Layout {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "rx_tx" | "rxtx" => Ok(Layout::RxTx),
            "input_output" | "inputoutput" | "io" => Ok(Layout::InputOutput),
            _ => Err(ProtocolError::unknown_layout(s)),
        }
    }
}

/// Geometry and status fields of one register layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegisterMap {
    /// Layout this map belongs to.
    pub layout: Layout,
    /// Status register.
    pub status: RegisterId,
    /// Device-to-host data window.
    pub receive: RegisterWindow,
    /// Host-to-device data window.
    pub transmit: RegisterWindow,
    /// Single-character transmit register, if present.
    pub transmit_byte: Option<RegisterId>,
    /// First of the two baud-rate registers, if present.
    pub baud_rate: Option<RegisterId>,
    /// Status fields defined by this layout.
    pub fields: StatusFields,
}

impl RegisterMap {
    /// The Rx/Tx register map.
    pub const RX_TX: Self = Self {
        layout: Layout::RxTx,
        status: rx_tx::STATUS,
        receive: rx_tx::RX_WINDOW,
        transmit: rx_tx::TX_WINDOW,
        transmit_byte: Some(rx_tx::TX_DATA_BYTE),
        baud_rate: Some(rx_tx::BAUDRATE),
        fields: StatusFields::RX_TX,
    };

    /// The Input/Output register map.
    pub const INPUT_OUTPUT: Self = Self {
        layout: Layout::InputOutput,
        status: input_output::STATUS,
        receive: input_output::INPUT_WINDOW,
        transmit: input_output::OUTPUT_WINDOW,
        transmit_byte: None,
        baud_rate: None,
        fields: StatusFields::INPUT_OUTPUT,
    };

    /// Transmit-empty flag of `word`, or `None` if this layout has no such flag.
    pub fn transmit_empty(&self, word: StatusWord) -> Option<bool> {
        self.fields
            .transmit_empty
            .map(|field| field.get(word.bits()) != 0)
    }

    /// Last register of the transmit window; transmit plans count down from here.
    #[inline]
    pub const fn last_transmit(&self) -> RegisterId {
        self.transmit.last()
    }

    /// Base register of the receive window; receive plans read up from here.
    #[inline]
    pub const fn receive_base(&self) -> RegisterId {
        self.receive.base()
    }
}

impl Default for RegisterMap {
    fn default() -> Self {
        Layout::default().register_map()
    }
}
