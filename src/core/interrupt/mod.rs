// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Guest interrupt dispatch
//!
//! The PSP kernel multiplexes each interrupt line into sub-interrupts. A
//! sub-interrupt is a guest function registered by index; it only runs when
//! it has been both registered and enabled. The GE line uses two
//! sub-interrupts per callback slot: one for FINISH, one for SIGNAL.
//!
//! ## Calling convention
//!
//! When a sub-interrupt fires, control transfers to the handler address
//! with three argument registers:
//!
//! ```text
//! Register | Value
//! ---------|-------------------------------------------
//! a0       | list token (low 16 bits)
//! a1       | argument bound at registration
//! a2       | continuation address (0 for legacy SDKs)
//! ```
//!
//! The return address is owned by the interrupt return path, not by the
//! handler setup.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Interrupt line numbers
pub mod interrupts {
    /// GE (graphics engine) interrupt line
    pub const GE: u32 = 25;
}

/// MIPS argument register indices
pub mod regs {
    pub const A0: usize = 4;
    pub const A1: usize = 5;
    pub const A2: usize = 6;
}

/// A registered sub-interrupt handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubIntrHandler {
    /// Guest function address
    pub handler_address: u32,
    /// Argument passed in a1
    pub handler_arg: u32,
    /// Whether the sub-interrupt is enabled
    pub enabled: bool,
}

/// Control transfer into a guest handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerCall {
    /// Handler entry point
    pub address: u32,
    /// a0, a1, a2
    pub args: [u32; 3],
}

impl HandlerCall {
    /// Load the program counter and argument registers
    pub fn apply(&self, cpu: &mut GuestRegisters) {
        cpu.pc = self.address;
        cpu.r[regs::A0] = self.args[0];
        cpu.r[regs::A1] = self.args[1];
        cpu.r[regs::A2] = self.args[2];
    }
}

/// Result of running an interrupt line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntrOutcome {
    /// A guest handler must run; completion is reported later
    Handled(HandlerCall),
    /// Nothing for the guest to do
    NotHandled,
}

/// Minimal guest register file touched by interrupt entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestRegisters {
    pub pc: u32,
    pub r: [u32; 32],
}

/// Sub-interrupt handler table for one interrupt line
///
/// # Example
///
/// ```
/// use psge::core::interrupt::SubIntrTable;
///
/// let mut table = SubIntrTable::new();
/// table.register(1, 0x0880_1000, 42);
/// assert!(table.get(1).is_none()); // registered but not enabled
///
/// table.enable(1);
/// assert_eq!(table.get(1).unwrap().handler_arg, 42);
///
/// table.release(1);
/// assert!(table.get(1).is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct SubIntrTable {
    handlers: BTreeMap<u32, SubIntrHandler>,
}

impl SubIntrTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler (initially disabled)
    ///
    /// Re-registering an index replaces the previous handler.
    ///
    /// # Arguments
    ///
    /// * `sub_intr` - Sub-interrupt index
    /// * `handler_address` - Guest function address
    /// * `handler_arg` - Argument passed in a1
    pub fn register(&mut self, sub_intr: u32, handler_address: u32, handler_arg: u32) {
        self.handlers.insert(
            sub_intr,
            SubIntrHandler {
                handler_address,
                handler_arg,
                enabled: false,
            },
        );
        log::debug!(
            "Sub-interrupt {} registered: handler=0x{:08X} arg=0x{:08X}",
            sub_intr,
            handler_address,
            handler_arg
        );
    }

    /// Enable a registered sub-interrupt
    ///
    /// # Returns
    ///
    /// false if nothing is registered at this index
    pub fn enable(&mut self, sub_intr: u32) -> bool {
        match self.handlers.get_mut(&sub_intr) {
            Some(handler) => {
                handler.enabled = true;
                true
            }
            None => false,
        }
    }

    /// Disable a sub-interrupt without releasing it
    pub fn disable(&mut self, sub_intr: u32) {
        if let Some(handler) = self.handlers.get_mut(&sub_intr) {
            handler.enabled = false;
        }
    }

    /// Release a sub-interrupt
    ///
    /// Releasing an index that was never registered is a no-op.
    pub fn release(&mut self, sub_intr: u32) {
        if self.handlers.remove(&sub_intr).is_some() {
            log::debug!("Sub-interrupt {} released", sub_intr);
        }
    }

    /// Look up an enabled handler
    ///
    /// Negative selectors mean "no sub-interrupt" and never match.
    pub fn get(&self, sub_intr: i32) -> Option<&SubIntrHandler> {
        if sub_intr < 0 {
            return None;
        }
        self.handlers
            .get(&(sub_intr as u32))
            .filter(|handler| handler.enabled)
    }

    /// Whether a handler is registered at this index (enabled or not)
    pub fn is_registered(&self, sub_intr: u32) -> bool {
        self.handlers.contains_key(&sub_intr)
    }

    /// Drop every handler
    pub fn clear(&mut self) {
        self.handlers.clear();
    }
}
