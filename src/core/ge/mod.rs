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

//! GE display-list synchronization
//!
//! This module owns the bookkeeping between guest display lists and the
//! guest interrupt/thread machinery:
//!
//! - [`list`]: display-list model and the list-owner contract
//! - [`controller`]: pending-interrupt FIFO, sync wait-sets, callback slots
//! - [`snapshot`]: persisted controller state (section `sceGe`, v1/v2)
//! - [`state`]: GE register state and the context blob layout
//!
//! ## Interrupt flow
//!
//! ```text
//! list owner ──TriggerInterrupt──▶ pending FIFO ──timeline──▶ run_interrupt
//!                                                              │
//!                           ┌──────────── handler bound ───────┤
//!                           ▼                                  ▼
//!                guest handler runs                   pop + InterruptEnd
//!                           │
//!                           ▼
//!                  handle_result: pop + InterruptEnd
//! ```
//!
//! ## Sub-interrupt numbering
//!
//! Each callback slot `n` owns sub-interrupts `2n` (finish) and `2n + 1`
//! (signal). Lists enqueued with a callback id carry `2 * id` as their
//! sub-interrupt base.

pub mod controller;
pub mod list;
pub mod snapshot;
pub mod state;

#[cfg(test)]
pub(crate) mod tests;

pub use controller::{CallbackData, GeController, GeInterruptData};
pub use list::{
    DisplayList, DisplayListSignal, DisplayListState, GeRequest, ListArgs, ListOwner, SyncType,
};
pub use state::GeRegisterState;

/// SIGNAL command opcode
pub const GE_CMD_SIGNAL: u32 = 0x0E;

/// FINISH command opcode
pub const GE_CMD_FINISH: u32 = 0x0F;

/// Finish sub-interrupt offset within a callback's pair
pub const SUBINTR_FINISH: i32 = 0;

/// Signal sub-interrupt offset within a callback's pair
pub const SUBINTR_SIGNAL: i32 = 1;

/// XOR mask applied to list handles crossing the guest boundary
pub const LIST_ID_MAGIC: u32 = 0x3500_0000;

/// Number of callback slots
pub const CALLBACK_SLOTS: usize = 16;

/// Last SDK version that gets the legacy interrupt semantics
pub const LEGACY_SDK_VERSION_MAX: u32 = 0x0200_0010;

/// Sub-interrupt base for a callback id
///
/// # Example
///
/// ```
/// use psge::core::ge::sub_intr_base;
///
/// assert_eq!(sub_intr_base(3), 6);
/// assert_eq!(sub_intr_base(-1), -2);
/// ```
pub fn sub_intr_base(callback_id: i32) -> i32 {
    callback_id.wrapping_mul(2)
}

/// Guest SDK compatibility mode
///
/// Resolved once per session from the SDK version the guest was built
/// against. Legacy mode changes the handler's third argument and the
/// HANDLER_SUSPEND completion path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SdkCompat {
    /// SDK 2.00.0010 and earlier
    Legacy,
    #[default]
    Current,
}

impl SdkCompat {
    /// Resolve the compatibility mode from a compiled SDK version
    ///
    /// # Example
    ///
    /// ```
    /// use psge::core::ge::SdkCompat;
    ///
    /// assert_eq!(SdkCompat::from_sdk_version(0x0200_0010), SdkCompat::Legacy);
    /// assert_eq!(SdkCompat::from_sdk_version(0x0200_0011), SdkCompat::Current);
    /// ```
    pub fn from_sdk_version(version: u32) -> Self {
        if version <= LEGACY_SDK_VERSION_MAX {
            SdkCompat::Legacy
        } else {
            SdkCompat::Current
        }
    }

    pub fn is_legacy(self) -> bool {
        self == SdkCompat::Legacy
    }
}
