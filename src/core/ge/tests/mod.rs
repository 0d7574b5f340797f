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

//! Unit tests for the GE controller

mod interrupts;

use std::collections::BTreeMap;

use crate::core::error::{GeError, GeResult};
use crate::core::ge::list::{DisplayList, GeRequest, ListArgs, ListOwner, SyncType};
use crate::core::ge::state::GeRegisterState;
use crate::core::ge::{GE_CMD_FINISH, GE_CMD_SIGNAL};
use crate::core::memory::{GuestMemory, GuestRam};

/// Base address of the test display lists
pub(crate) const LIST_BASE: u32 = 0x0880_0000;

/// Recording list owner
#[derive(Default)]
pub(crate) struct MockListOwner {
    pub lists: BTreeMap<i32, DisplayList>,
    pub next_id: i32,
    pub busy: bool,
    pub interrupt_starts: Vec<i32>,
    pub interrupt_ends: Vec<i32>,
    pub sync_ends: Vec<(SyncType, i32, bool)>,
    pub requests: Vec<GeRequest>,
    pub state: GeRegisterState,
    pub reapplied: usize,
    pub last_args: Option<ListArgs>,
    pub enqueued_at_head: Vec<bool>,
    pub break_result: Option<GeResult<u32>>,
}

impl MockListOwner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a list with interrupts routed to `sub_intr_base`
    pub fn add_list(&mut self, id: i32, sub_intr_base: i32) -> &mut DisplayList {
        self.lists
            .entry(id)
            .or_insert_with(|| DisplayList::new(id, LIST_BASE, 0, sub_intr_base))
    }
}

impl ListOwner for MockListOwner {
    fn enqueue_list(
        &mut self,
        list_address: u32,
        stall_address: u32,
        sub_intr_base: i32,
        args: Option<ListArgs>,
        head: bool,
    ) -> GeResult<u32> {
        let id = self.next_id;
        self.next_id += 1;
        self.lists.insert(
            id,
            DisplayList::new(id, list_address, stall_address, sub_intr_base),
        );
        self.last_args = args;
        self.enqueued_at_head.push(head);
        Ok(id as u32)
    }

    fn dequeue_list(&mut self, list_id: i32) -> GeResult<u32> {
        match self.lists.remove(&list_id) {
            Some(_) => Ok(0),
            None => Err(GeError::Code(GeError::ERROR_INVALID_ID)),
        }
    }

    fn update_stall(&mut self, list_id: i32, stall_address: u32) -> GeResult<u32> {
        match self.lists.get_mut(&list_id) {
            Some(list) => {
                list.stall_address = stall_address;
                Ok(0)
            }
            None => Err(GeError::Code(GeError::ERROR_INVALID_ID)),
        }
    }

    fn list_sync(&mut self, list_id: i32, mode: u32) -> GeResult<u32> {
        let Some(list) = self.lists.get(&list_id) else {
            return Err(GeError::Code(GeError::ERROR_INVALID_ID));
        };
        if mode == 0 && !list.state.is_terminal() {
            self.requests.push(GeRequest::WaitCurrentThread {
                sync_type: SyncType::List,
                wait_id: list_id,
                reason: "list sync",
            });
        }
        Ok(list.state as u32)
    }

    fn draw_sync(&mut self, mode: u32) -> GeResult<u32> {
        if mode == 0 && self.busy {
            self.requests.push(GeRequest::WaitCurrentThread {
                sync_type: SyncType::Draw,
                wait_id: 0,
                reason: "draw sync",
            });
        }
        Ok(self.busy as u32)
    }

    fn continue_lists(&mut self) -> GeResult<u32> {
        Ok(0)
    }

    fn break_lists(&mut self, _mode: u32) -> GeResult<u32> {
        self.break_result.unwrap_or(Ok(0))
    }

    fn get_stack(&mut self, index: i32, _stack_ptr: u32) -> GeResult<u32> {
        Ok(index as u32)
    }

    fn busy_drawing(&self) -> bool {
        self.busy
    }

    fn get_list(&self, list_id: i32) -> Option<&DisplayList> {
        self.lists.get(&list_id)
    }

    fn get_list_mut(&mut self, list_id: i32) -> Option<&mut DisplayList> {
        self.lists.get_mut(&list_id)
    }

    fn interrupt_start(&mut self, list_id: i32) {
        self.interrupt_starts.push(list_id);
    }

    fn interrupt_end(&mut self, list_id: i32) {
        self.interrupt_ends.push(list_id);
    }

    fn sync_end(&mut self, sync_type: SyncType, id: i32, woke_threads: bool) {
        self.sync_ends.push((sync_type, id, woke_threads));
    }

    fn gfx_state(&self) -> &GeRegisterState {
        &self.state
    }

    fn gfx_state_mut(&mut self) -> &mut GeRegisterState {
        &mut self.state
    }

    fn reapply_gfx_state(&mut self) {
        self.reapplied += 1;
    }

    fn drain_requests(&mut self) -> Vec<GeRequest> {
        std::mem::take(&mut self.requests)
    }
}

/// Write a SIGNAL or FINISH command and return the pc just past it
pub(crate) fn write_command(memory: &mut GuestRam, slot: u32, cmd: u32, data: u32) -> u32 {
    let address = LIST_BASE + slot * 4;
    memory
        .write_u32(address, (cmd << 24) | (data & 0x00FF_FFFF))
        .unwrap();
    address + 4
}

pub(crate) fn write_finish(memory: &mut GuestRam, slot: u32) -> u32 {
    write_command(memory, slot, GE_CMD_FINISH, 0)
}

pub(crate) fn write_signal(memory: &mut GuestRam, slot: u32) -> u32 {
    write_command(memory, slot, GE_CMD_SIGNAL, 0)
}
