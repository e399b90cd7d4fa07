// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Window planning for both data directions.
//!
//! The two directions fill their windows from opposite ends:
//!
//! ```text
//!  receive:   base ──▶ base+1 ──▶ ...            (read up from the base)
//!  transmit:           ... ◀── last-1 ◀── last    (write down to the last)
//! ```
//!
//! A transmit plan always ends at or next to the window's last register:
//! with an odd register count the base is shifted up by one. The device
//! relies on this placement, so it is kept exactly.
//!
//! ```
//! use mbserial_protocol::{RegisterId, StatusWord};
//!
//! let status = StatusWord::default().with_transmit_available(10);
//! let plan = status.plan_transmit_window(RegisterId::new(2063), 25);
//! assert_eq!((plan.chars_to_send, plan.base_register.get(), plan.register_count), (10, 2059, 5));
//! ```

use serde::{Deserialize, Serialize};

use crate::layout::RegisterMap;
use crate::register::RegisterId;
use crate::status::{StatusWord, chars_to_registers};

/// Where and how much to write for one transmit cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowPlan {
    /// Characters to send this cycle.
    pub chars_to_send: u16,
    /// First register to write.
    pub base_register: RegisterId,
    /// Number of registers to write.
    pub register_count: u16,
}

impl WindowPlan {
    /// Returns `true` if nothing is to be written.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.register_count == 0
    }

    /// Registers covered by the plan, lowest first.
    pub fn registers(&self) -> impl Iterator<Item = RegisterId> + use<> {
        let base = self.base_register;
        (0..self.register_count).map(move |i| base.offset(i))
    }

    /// Last register written, if any.
    pub fn last_register(&self) -> Option<RegisterId> {
        (!self.is_empty()).then(|| self.base_register.offset(self.register_count - 1))
    }
}

/// Plans one transmit cycle.
///
/// Sends `min(transmit_available, requested)` characters, packed two per
/// register, into registers ending at `last_transmit`.
pub fn plan_transmit_window(status: StatusWord, last_transmit: RegisterId, requested: usize) -> WindowPlan {
    let available = status.transmit_available() as u16;
    let chars_to_send = if requested < available as usize {
        requested as u16
    } else {
        available
    };

    let register_count = chars_to_registers(chars_to_send);
    let mut base = last_transmit.get().wrapping_sub(register_count);
    if register_count & 1 == 1 {
        base = base.wrapping_add(1);
    }

    WindowPlan {
        chars_to_send,
        base_register: RegisterId::new(base),
        register_count,
    }
}

impl StatusWord {
    /// Plans one transmit cycle against this status word.
    ///
    /// See [`plan_transmit_window`].
    #[inline]
    pub fn plan_transmit_window(self, last_transmit: RegisterId, requested: usize) -> WindowPlan {
        plan_transmit_window(self, last_transmit, requested)
    }
}

/// Where and how much to read for one receive cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReceivePlan {
    /// First register to read.
    pub base_register: RegisterId,
    /// Number of registers to read.
    pub register_count: u16,
    /// Characters the device reported as waiting.
    pub chars_available: u8,
}

impl ReceivePlan {
    /// Returns `true` if nothing is to be read.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.register_count == 0
    }
}

/// Plans one receive cycle: read from the fixed receive base.
pub fn plan_receive_window(status: StatusWord, receive_base: RegisterId) -> ReceivePlan {
    ReceivePlan {
        base_register: receive_base,
        register_count: status.registers_to_read_for_receive(),
        chars_available: status.receive_available(),
    }
}

impl RegisterMap {
    /// Plans one transmit cycle into this map's transmit window.
    pub fn plan_transmit(&self, status: StatusWord, requested: usize) -> WindowPlan {
        plan_transmit_window(status, self.last_transmit(), requested)
    }

    /// Plans one receive cycle from this map's receive window.
    pub fn plan_receive(&self, status: StatusWord) -> ReceivePlan {
        plan_receive_window(status, self.receive_base())
    }
}
