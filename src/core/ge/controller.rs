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

//! Sync and interrupt controller
//!
//! Owns every piece of GE state that outlives a single API call:
//!
//! - the 16 callback slots and the sub-interrupts they register
//! - the pending-interrupt FIFO (one entry per raised list interrupt)
//! - draw-sync and list-sync wait-sets
//! - the three timeline events (`GeSyncEvent`, `GeInterruptEvent` and the
//!   unused `GeCycleEvent` kept for savestate layout)
//!
//! ## Pending interrupt lifecycle
//!
//! ```text
//! Queued ──timeline──▶ Dispatched ──handler bound──▶ HandlerInvoked ──handle_result──▶ popped
//!                           │
//!                           └────── no handler ─────▶ Dropped (popped immediately)
//! ```
//!
//! The command byte of each pending interrupt is captured when it is
//! queued; the word before `pc` may be overwritten before the interrupt
//! runs.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::core::error::{GeError, GeResult};
use crate::core::interrupt::{HandlerCall, IntrOutcome, SubIntrTable};
use crate::core::kernel::{ThreadId, ThreadManager, WaitType};
use crate::core::memory::GuestMemory;
use crate::core::timing::{EventHandle, FiredEvent, TimingEventManager};

use super::list::{DisplayListSignal, DisplayListState, ListOwner, SyncType};
use super::{
    sub_intr_base, SdkCompat, CALLBACK_SLOTS, GE_CMD_FINISH, GE_CMD_SIGNAL, SUBINTR_FINISH,
    SUBINTR_SIGNAL,
};

/// Timeline event names (also used to re-bind handles after a restore)
pub const SYNC_EVENT_NAME: &str = "GeSyncEvent";
pub const INTERRUPT_EVENT_NAME: &str = "GeInterruptEvent";
pub const CYCLE_EVENT_NAME: &str = "GeCycleEvent";

/// Guest callback registration (`PspGeCallbackData`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CallbackData {
    pub signal_func: u32,
    pub signal_arg: u32,
    pub finish_func: u32,
    pub finish_arg: u32,
}

impl CallbackData {
    /// Read the 16-byte registration block from guest memory
    ///
    /// Unreadable words come back as zero, which leaves that channel
    /// unregistered.
    pub fn read(memory: &impl GuestMemory, address: u32) -> Self {
        Self {
            signal_func: memory.read_u32_unchecked(address),
            signal_arg: memory.read_u32_unchecked(address.wrapping_add(4)),
            finish_func: memory.read_u32_unchecked(address.wrapping_add(8)),
            finish_arg: memory.read_u32_unchecked(address.wrapping_add(12)),
        }
    }
}

/// A raised list interrupt waiting to be dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeInterruptData {
    pub list_id: i32,
    /// Address just past the command that raised the interrupt
    pub pc: u32,
    /// Opcode of that command (SIGNAL or FINISH)
    pub cmd: u32,
}

/// Sync and interrupt controller
pub struct GeController {
    pub(super) callbacks: [CallbackData; CALLBACK_SLOTS],
    pub(super) used: [bool; CALLBACK_SLOTS],
    pub(super) pending: VecDeque<GeInterruptData>,
    pub(super) list_waiting: BTreeMap<i32, Vec<ThreadId>>,
    pub(super) draw_waiting: Vec<ThreadId>,
    pub(super) sync_event: EventHandle,
    pub(super) interrupt_event: EventHandle,
    pub(super) cycle_event: EventHandle,
    sub_intrs: SubIntrTable,
    compat: SdkCompat,
    /// Interrupt-line raises not yet run
    raised: u32,
}

impl GeController {
    /// Create a controller and register its timeline events
    ///
    /// # Arguments
    ///
    /// * `timing` - Session timeline
    /// * `compat` - Guest SDK compatibility mode, fixed for the session
    pub fn new(timing: &mut TimingEventManager, compat: SdkCompat) -> Self {
        let sync_event = timing.register_event(SYNC_EVENT_NAME);
        let interrupt_event = timing.register_event(INTERRUPT_EVENT_NAME);
        let cycle_event = timing.register_event(CYCLE_EVENT_NAME);

        Self {
            callbacks: [CallbackData::default(); CALLBACK_SLOTS],
            used: [false; CALLBACK_SLOTS],
            pending: VecDeque::new(),
            list_waiting: BTreeMap::new(),
            draw_waiting: Vec::new(),
            sync_event,
            interrupt_event,
            cycle_event,
            sub_intrs: SubIntrTable::new(),
            compat,
            raised: 0,
        }
    }

    /// Drop all callbacks, pending interrupts and waiters
    pub fn reset(&mut self) {
        self.callbacks = [CallbackData::default(); CALLBACK_SLOTS];
        self.used = [false; CALLBACK_SLOTS];
        self.pending.clear();
        self.list_waiting.clear();
        self.draw_waiting.clear();
        self.sub_intrs.clear();
        self.raised = 0;
    }

    pub fn compat(&self) -> SdkCompat {
        self.compat
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    /// Schedule a sync wakeup
    ///
    /// A draw sync that is already scheduled keeps whichever deadline is
    /// later; it never fires twice or early.
    ///
    /// # Arguments
    ///
    /// * `timing` - Session timeline
    /// * `sync_type` - Draw or list sync
    /// * `id` - List id for list syncs
    /// * `at_ticks` - Absolute tick to fire at
    pub fn trigger_sync(
        &self,
        timing: &mut TimingEventManager,
        sync_type: SyncType,
        id: i32,
        at_ticks: u64,
    ) {
        let userdata = ((id as u32 as u64) << 32) | sync_type.raw() as u64;
        let mut future = at_ticks as i64 - timing.get_ticks() as i64;

        if sync_type == SyncType::Draw {
            if let Some(left) = timing.unschedule(self.sync_event, userdata) {
                future = future.max(left);
            }
        }

        log::trace!(
            "GE: sync {:?}({}) scheduled in {} ticks",
            sync_type,
            id,
            future
        );
        timing.schedule(self.sync_event, future, userdata);
    }

    /// Queue a list interrupt
    ///
    /// # Arguments
    ///
    /// * `timing` - Session timeline
    /// * `memory` - Guest memory holding the display list
    /// * `list_id` - Owner-side list id
    /// * `pc` - Address just past the SIGNAL/FINISH command
    /// * `at_ticks` - Absolute tick to raise the line at
    pub fn trigger_interrupt(
        &mut self,
        timing: &mut TimingEventManager,
        memory: &impl GuestMemory,
        list_id: i32,
        pc: u32,
        at_ticks: u64,
    ) {
        let cmd = memory.read_u32_unchecked(pc.wrapping_sub(4)) >> 24;
        self.pending.push_back(GeInterruptData { list_id, pc, cmd });

        let userdata = ((list_id as u32 as u64) << 32) | pc as u64;
        let delay = at_ticks as i64 - timing.get_ticks() as i64;
        timing.schedule(self.interrupt_event, delay, userdata);

        log::trace!(
            "GE: list {} interrupt queued (pc=0x{:08X}, cmd=0x{:02X}, depth={})",
            list_id,
            pc,
            cmd,
            self.pending.len()
        );
    }

    /// Handle fired timeline events
    ///
    /// Sync events wake their waiters immediately; interrupt events raise
    /// the GE line, which the session runs through [`Self::run_interrupt`].
    pub fn process_events(
        &mut self,
        triggered: &[FiredEvent],
        kernel: &mut impl ThreadManager,
        owner: &mut impl ListOwner,
    ) {
        for event in triggered {
            if event.handle == self.sync_event {
                self.execute_sync(event.userdata, kernel, owner);
            } else if event.handle == self.interrupt_event {
                self.raised += 1;
            }
        }
    }

    /// Take one raise of the GE interrupt line
    pub fn poll_interrupt(&mut self) -> bool {
        if self.raised > 0 {
            self.raised -= 1;
            true
        } else {
            false
        }
    }

    /// Number of line raises not yet run
    pub fn raised_interrupts(&self) -> u32 {
        self.raised
    }

    /// Restore the raise count from a session snapshot
    pub fn set_raised_interrupts(&mut self, raised: u32) {
        self.raised = raised;
    }

    fn execute_sync(
        &mut self,
        userdata: u64,
        kernel: &mut impl ThreadManager,
        owner: &mut impl ListOwner,
    ) {
        let id = (userdata >> 32) as i32;
        let raw_type = userdata as u32;

        match SyncType::from_raw(raw_type) {
            Some(sync_type) => {
                let woke = self.trigger_wait(kernel, sync_type, id);
                owner.sync_end(sync_type, id, woke);
            }
            None => log::error!("[report] GE: sync event with bad wait type {}", raw_type),
        }
    }

    // ========================================================================
    // Waiting
    // ========================================================================

    /// Suspend the current thread on a draw or list condition
    pub fn wait_current_thread(
        &mut self,
        kernel: &mut impl ThreadManager,
        sync_type: SyncType,
        wait_id: i32,
        reason: &str,
    ) {
        let thread = kernel.current_thread();
        let wait_type = match sync_type {
            SyncType::Draw => {
                self.draw_waiting.push(thread);
                WaitType::GeDrawSync
            }
            SyncType::List => {
                self.list_waiting.entry(wait_id).or_default().push(thread);
                WaitType::GeListSync
            }
        };

        kernel.wait_current_thread(wait_type, wait_id, reason);
    }

    /// Resume every thread waiting on a condition
    ///
    /// # Returns
    ///
    /// true if at least one thread was actually resumed
    pub fn trigger_wait(
        &mut self,
        kernel: &mut impl ThreadManager,
        sync_type: SyncType,
        wait_id: i32,
    ) -> bool {
        let (wait_type, threads) = match sync_type {
            SyncType::Draw => (WaitType::GeDrawSync, std::mem::take(&mut self.draw_waiting)),
            SyncType::List => (
                WaitType::GeListSync,
                self.list_waiting.remove(&wait_id).unwrap_or_default(),
            ),
        };

        let mut woke = false;
        for thread in threads {
            woke |= kernel.resume_from_wait(thread, wait_type, wait_id, 0);
        }
        woke
    }

    // ========================================================================
    // Interrupt line
    // ========================================================================

    /// Run the head of the pending-interrupt FIFO
    ///
    /// # Returns
    ///
    /// - `Handled(call)` when a guest handler must run; the entry stays
    ///   queued until [`Self::handle_result`]
    /// - `NotHandled` when the entry was absorbed (already popped)
    pub fn run_interrupt(&mut self, owner: &mut impl ListOwner) -> IntrOutcome {
        let Some(&intr) = self.pending.front() else {
            log::error!("[report] GE: unable to run interrupt, no pending interrupt");
            return IntrOutcome::NotHandled;
        };

        match owner.get_list(intr.list_id) {
            None => {
                log::warn!(
                    "GE: unable to run interrupt, list {} doesn't exist",
                    intr.list_id
                );
                self.pending.pop_front();
                return IntrOutcome::NotHandled;
            }
            Some(list) if !list.interrupts_enabled => {
                log::error!(
                    "[report] GE: unable to run interrupt, list {} has interrupts disabled",
                    intr.list_id
                );
                self.pending.pop_front();
                return IntrOutcome::NotHandled;
            }
            Some(_) => {}
        }

        owner.interrupt_start(intr.list_id);

        let Some(list) = owner.get_list_mut(intr.list_id) else {
            log::warn!("GE: list {} vanished at interrupt start", intr.list_id);
            self.pending.pop_front();
            owner.interrupt_end(intr.list_id);
            return IntrOutcome::NotHandled;
        };

        let sub_intr = select_sub_intr(list.sub_intr_base, list.signal, intr.cmd);

        // Completion happens when the interrupt starts, not when it was queued
        if list.signal != DisplayListSignal::HandlerPause && intr.cmd == GE_CMD_FINISH {
            list.state = DisplayListState::Completed;
        }

        if let Some(handler) = self.sub_intrs.get(sub_intr) {
            let continuation = if self.compat.is_legacy() {
                0
            } else {
                intr.pc.wrapping_add(4)
            };
            log::debug!(
                "GE: entering interrupt handler 0x{:08X} for list {}",
                handler.handler_address,
                intr.list_id
            );
            return IntrOutcome::Handled(HandlerCall {
                address: handler.handler_address,
                args: [list.sub_intr_token & 0xFFFF, handler.handler_arg, continuation],
            });
        }

        if list.signal == DisplayListSignal::HandlerSuspend
            && self.compat.is_legacy()
            && !list.state.is_terminal()
        {
            list.state = DisplayListState::Queued;
        }

        self.pending.pop_front();
        owner.interrupt_end(intr.list_id);

        if sub_intr >= 0 {
            log::debug!(
                "GE: ignoring interrupt for list {}, handler already released",
                intr.list_id
            );
        }
        IntrOutcome::NotHandled
    }

    /// Complete an interrupt whose guest handler has returned
    pub fn handle_result(&mut self, owner: &mut impl ListOwner, memory: &impl GuestMemory) {
        let Some(intr) = self.pending.pop_front() else {
            log::error!("[report] GE: handler returned with no pending interrupt");
            return;
        };

        let Some(list) = owner.get_list_mut(intr.list_id) else {
            log::warn!(
                "GE: list {} disappeared while its handler ran",
                intr.list_id
            );
            owner.interrupt_end(intr.list_id);
            return;
        };

        if !list.interrupts_enabled {
            log::error!(
                "[report] GE: unable to finish interrupt, list {} has interrupts disabled",
                intr.list_id
            );
            // Firmware skips InterruptEnd here
            return;
        }

        if list.signal == DisplayListSignal::HandlerSuspend && self.compat.is_legacy() {
            // Legacy firmware reloads the state from the end command's low byte
            let new_state = memory.read_u32_unchecked(intr.pc.wrapping_sub(4)) & 0xFF;
            if new_state != DisplayListState::Running as u32 {
                log::debug!("GE: interrupt new state might be {}", new_state);
            }

            if !list.state.is_terminal() {
                list.state = DisplayListState::Queued;
            }
        }

        owner.interrupt_end(intr.list_id);
    }

    // ========================================================================
    // Callback slots
    // ========================================================================

    /// Bind a callback to the lowest free slot
    ///
    /// # Returns
    ///
    /// - `Ok(id)` with the slot index
    /// - `Err(GeError::OutOfMemory)` when all 16 slots are taken
    pub fn set_callback(&mut self, data: CallbackData) -> GeResult<u32> {
        let Some(id) = self.used.iter().position(|used| !used) else {
            log::warn!("GE: out of callback ids");
            return Err(GeError::OutOfMemory);
        };

        self.used[id] = true;
        self.callbacks[id] = data;
        self.register_slot(id);

        Ok(id as u32)
    }

    /// Release a callback slot
    ///
    /// Releasing a free slot is tolerated.
    pub fn unset_callback(&mut self, id: u32) -> GeResult<u32> {
        let index = id as usize;
        if index >= CALLBACK_SLOTS {
            log::warn!("GE: unset of invalid callback id {}", id);
            return Err(GeError::InvalidId);
        }

        if self.used[index] {
            let base = sub_intr_base(index as i32);
            self.sub_intrs.release((base | SUBINTR_FINISH) as u32);
            self.sub_intrs.release((base | SUBINTR_SIGNAL) as u32);
        } else {
            log::warn!("GE: ignoring unset of unregistered callback id {}", id);
        }

        self.used[index] = false;
        Ok(0)
    }

    fn register_slot(&mut self, id: usize) {
        let data = self.callbacks[id];
        let base = sub_intr_base(id as i32);

        if data.finish_func != 0 {
            let sub_intr = (base | SUBINTR_FINISH) as u32;
            self.sub_intrs
                .register(sub_intr, data.finish_func, data.finish_arg);
            self.sub_intrs.enable(sub_intr);
        }
        if data.signal_func != 0 {
            let sub_intr = (base | SUBINTR_SIGNAL) as u32;
            self.sub_intrs
                .register(sub_intr, data.signal_func, data.signal_arg);
            self.sub_intrs.enable(sub_intr);
        }
    }

    /// Rebuild the sub-interrupt table from the callback slots
    pub(super) fn rebuild_sub_intrs(&mut self) {
        self.sub_intrs.clear();
        for id in 0..CALLBACK_SLOTS {
            if self.used[id] {
                self.register_slot(id);
            }
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn pending_interrupts(&self) -> impl Iterator<Item = &GeInterruptData> {
        self.pending.iter()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_callback_used(&self, id: usize) -> bool {
        self.used.get(id).copied().unwrap_or(false)
    }

    pub fn callback(&self, id: usize) -> Option<&CallbackData> {
        self.callbacks.get(id)
    }

    pub fn draw_waiting(&self) -> &[ThreadId] {
        &self.draw_waiting
    }

    pub fn list_waiting(&self, list_id: i32) -> &[ThreadId] {
        self.list_waiting
            .get(&list_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn sub_intr_table(&self) -> &SubIntrTable {
        &self.sub_intrs
    }

    pub fn sync_event(&self) -> EventHandle {
        self.sync_event
    }

    pub fn interrupt_event(&self) -> EventHandle {
        self.interrupt_event
    }
}

/// Pick the sub-interrupt a list interrupt is delivered to
///
/// Returns -1 when the interrupt is pure bookkeeping.
fn select_sub_intr(base: i32, signal: DisplayListSignal, cmd: u32) -> i32 {
    if base < 0 {
        return -1;
    }

    match signal {
        s if s.is_bookkeeping() => -1,
        DisplayListSignal::HandlerPause => {
            if cmd == GE_CMD_FINISH {
                base | SUBINTR_SIGNAL
            } else {
                -1
            }
        }
        _ => {
            if cmd == GE_CMD_SIGNAL {
                base | SUBINTR_SIGNAL
            } else {
                base | SUBINTR_FINISH
            }
        }
    }
}
