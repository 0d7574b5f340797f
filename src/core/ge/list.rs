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

//! Display-list model and list-owner contract
//!
//! Display lists themselves are executed by the command processor (the
//! "list owner"). This layer only reads and adjusts a few fields of a list
//! while an interrupt is in flight, and forwards the guest API calls.

use crate::core::error::{GeResult, Result};
use crate::core::memory::GuestMemory;

use super::state::GeRegisterState;

/// Display-list lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum DisplayListState {
    #[default]
    None = 0,
    Queued = 1,
    Running = 2,
    Completed = 3,
    Paused = 4,
}

impl DisplayListState {
    /// Decode a raw state word
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(DisplayListState::None),
            1 => Some(DisplayListState::Queued),
            2 => Some(DisplayListState::Running),
            3 => Some(DisplayListState::Completed),
            4 => Some(DisplayListState::Paused),
            _ => None,
        }
    }

    /// NONE or COMPLETED
    pub fn is_terminal(self) -> bool {
        matches!(self, DisplayListState::None | DisplayListState::Completed)
    }
}

/// Behavior attached to the last SIGNAL command of a list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayListSignal {
    #[default]
    None,
    HandlerSuspend,
    HandlerContinue,
    HandlerPause,
    Sync,
    Jump,
    Call,
    Ret,
    Other(u8),
}

impl DisplayListSignal {
    /// Decode the signal byte of a SIGNAL command
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0x00 => DisplayListSignal::None,
            0x01 => DisplayListSignal::HandlerSuspend,
            0x02 => DisplayListSignal::HandlerContinue,
            0x03 => DisplayListSignal::HandlerPause,
            0x08 => DisplayListSignal::Sync,
            0x10 => DisplayListSignal::Jump,
            0x11 => DisplayListSignal::Call,
            0x12 => DisplayListSignal::Ret,
            other => DisplayListSignal::Other(other),
        }
    }

    pub fn raw(self) -> u8 {
        match self {
            DisplayListSignal::None => 0x00,
            DisplayListSignal::HandlerSuspend => 0x01,
            DisplayListSignal::HandlerContinue => 0x02,
            DisplayListSignal::HandlerPause => 0x03,
            DisplayListSignal::Sync => 0x08,
            DisplayListSignal::Jump => 0x10,
            DisplayListSignal::Call => 0x11,
            DisplayListSignal::Ret => 0x12,
            DisplayListSignal::Other(raw) => raw,
        }
    }

    /// Signals that only steer list execution and never reach the guest
    pub fn is_bookkeeping(self) -> bool {
        matches!(
            self,
            DisplayListSignal::Sync
                | DisplayListSignal::Jump
                | DisplayListSignal::Call
                | DisplayListSignal::Ret
        )
    }
}

/// A display list as seen by the interrupt layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayList {
    /// Owner-side list id (not XORed)
    pub id: i32,
    pub start_address: u32,
    pub pc: u32,
    pub stall_address: u32,
    pub state: DisplayListState,
    pub signal: DisplayListSignal,
    /// Sub-interrupt base, negative when the list has no callback
    pub sub_intr_base: i32,
    /// Token delivered to handlers in a0
    pub sub_intr_token: u32,
    pub interrupts_enabled: bool,
}

impl DisplayList {
    /// Create a freshly queued list
    pub fn new(id: i32, start_address: u32, stall_address: u32, sub_intr_base: i32) -> Self {
        Self {
            id,
            start_address,
            pc: start_address,
            stall_address,
            state: DisplayListState::Queued,
            signal: DisplayListSignal::None,
            sub_intr_base,
            sub_intr_token: 0,
            interrupts_enabled: sub_intr_base >= 0,
        }
    }
}

/// Optional parameters passed with an enqueue
///
/// Guest layout: `{ size, context, numStacks, stacks }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListArgs {
    pub size: u32,
    pub context: u32,
    pub num_stacks: u32,
    pub stacks: u32,
}

impl ListArgs {
    /// Read the parameter block from guest memory
    ///
    /// # Returns
    ///
    /// - `Ok(None)` for a null pointer
    /// - `Ok(Some(args))` otherwise; fields beyond `size` bytes read as zero
    pub fn read(memory: &impl GuestMemory, address: u32) -> Result<Option<Self>> {
        if address == 0 {
            return Ok(None);
        }

        let size = memory.read_u32(address)?;
        let field = |offset: u32| -> Result<u32> {
            if size >= offset + 4 {
                memory.read_u32(address + offset)
            } else {
                Ok(0)
            }
        };

        Ok(Some(Self {
            size,
            context: field(4)?,
            num_stacks: field(8)?,
            stacks: field(12)?,
        }))
    }
}

/// Kind of sync condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncType {
    /// All drawing finished
    Draw,
    /// One list finished
    List,
}

impl SyncType {
    pub fn raw(self) -> u32 {
        match self {
            SyncType::Draw => 0,
            SyncType::List => 1,
        }
    }

    /// Decode a sync type, accepting the old wait-type numbering
    ///
    /// Older savestates scheduled sync events with the kernel wait-type
    /// numbers (17 = draw, 18 = list).
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 | 17 => Some(SyncType::Draw),
            1 | 18 => Some(SyncType::List),
            _ => None,
        }
    }
}

/// Work the list owner asks the interrupt layer to do
///
/// The owner runs display lists and discovers FINISH/SIGNAL commands or
/// blocking syncs while doing so. It queues these requests and the session
/// drains them after every owner call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeRequest {
    /// Wake sync waiters at `at_ticks`
    TriggerSync {
        sync_type: SyncType,
        id: i32,
        at_ticks: u64,
    },
    /// Raise a list interrupt at `at_ticks`; `pc` points past the command
    TriggerInterrupt { list_id: i32, pc: u32, at_ticks: u64 },
    /// Suspend the calling thread until the condition resolves
    WaitCurrentThread {
        sync_type: SyncType,
        wait_id: i32,
        reason: &'static str,
    },
}

/// GE command processor contract
///
/// Status-returning calls use [`GeResult`]; `Err(GeError::Code(..))`
/// carries an owner-defined negative status word.
pub trait ListOwner {
    /// Queue a display list, returning its owner-side id
    fn enqueue_list(
        &mut self,
        list_address: u32,
        stall_address: u32,
        sub_intr_base: i32,
        args: Option<ListArgs>,
        head: bool,
    ) -> GeResult<u32>;

    fn dequeue_list(&mut self, list_id: i32) -> GeResult<u32>;

    fn update_stall(&mut self, list_id: i32, stall_address: u32) -> GeResult<u32>;

    /// Mode 0 waits for completion, mode 1 peeks
    fn list_sync(&mut self, list_id: i32, mode: u32) -> GeResult<u32>;

    /// Mode 0 waits for completion, mode 1 peeks
    fn draw_sync(&mut self, mode: u32) -> GeResult<u32>;

    fn continue_lists(&mut self) -> GeResult<u32>;

    /// Mode 0 breaks the current list and returns its id, mode 1 breaks all
    fn break_lists(&mut self, mode: u32) -> GeResult<u32>;

    fn get_stack(&mut self, index: i32, stack_ptr: u32) -> GeResult<u32>;

    /// Whether any list is still executing
    fn busy_drawing(&self) -> bool;

    fn get_list(&self, list_id: i32) -> Option<&DisplayList>;

    fn get_list_mut(&mut self, list_id: i32) -> Option<&mut DisplayList>;

    fn interrupt_start(&mut self, list_id: i32);

    fn interrupt_end(&mut self, list_id: i32);

    fn sync_end(&mut self, sync_type: SyncType, id: i32, woke_threads: bool);

    /// Current GE register state
    fn gfx_state(&self) -> &GeRegisterState;

    fn gfx_state_mut(&mut self) -> &mut GeRegisterState;

    /// Push the whole register state to the backend after a restore
    fn reapply_gfx_state(&mut self);

    /// Take the requests queued since the last drain
    fn drain_requests(&mut self) -> Vec<GeRequest>;
}
