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

//! Guest-facing `sceGe` calls
//!
//! Each call adapts guest arguments, forwards to the list owner or the
//! controller, charges the guest the documented cycle cost and folds the
//! outcome into a status word via [`crate::core::error::hle_result`].
//!
//! List ids crossing the guest boundary are XORed with
//! [`LIST_ID_MAGIC`] in both directions.

use crate::core::error::{GeError, GeResult};
use crate::core::ge::state::{to_float24, MatrixKind};
use crate::core::ge::{sub_intr_base, CallbackData, ListArgs, ListOwner, LIST_ID_MAGIC};
use crate::core::kernel::ThreadManager;
use crate::core::memory::GuestMemory;
use crate::core::spline::DrawBackend;

use super::GeSystem;

/// Guest address of embedded DRAM
pub const EDRAM_ADDR: u32 = 0x0400_0000;

/// Size of embedded DRAM
pub const EDRAM_SIZE: u32 = 0x0020_0000;

const EDRAM_GET_ADDR_CYCLES: u64 = 150;
const ENQUEUE_CYCLES: u64 = 490;
const ENQUEUE_HEAD_CYCLES: u64 = 480;
const UPDATE_STALL_CYCLES: u64 = 190;
const DRAW_SYNC_CYCLES: u64 = 1240;
const DRAW_SYNC_SLOW_CYCLES: u64 = 500_000;
const CONTINUE_CYCLES: u64 = 220;

impl<L, M, K, B> GeSystem<L, M, K, B>
where
    L: ListOwner,
    M: GuestMemory,
    K: ThreadManager,
    B: DrawBackend,
{
    // ========================================================================
    // EDRAM
    // ========================================================================

    pub fn edram_get_addr(&mut self) -> u32 {
        self.timing.eat_cycles(EDRAM_GET_ADDR_CYCLES);
        EDRAM_ADDR
    }

    pub fn edram_get_size(&self) -> u32 {
        EDRAM_SIZE
    }

    /// Set the EDRAM address translation width
    ///
    /// Accepts 0 or a power of two in `0x200..=0x1000`.
    ///
    /// # Returns
    ///
    /// The previous width
    pub fn edram_set_addr_translation(&mut self, new_size: i32) -> GeResult<u32> {
        let out_of_range = new_size != 0 && !(0x200..=0x1000).contains(&new_size);
        if out_of_range || new_size & new_size.wrapping_sub(1) != 0 {
            log::warn!(
                "sceGeEdramSetAddrTranslation({:#x}): invalid value",
                new_size
            );
            return Err(GeError::InvalidValue);
        }

        log::debug!("sceGeEdramSetAddrTranslation({:#x})", new_size);
        let last = self.edram_width;
        self.edram_width = new_size as u32;
        Ok(last)
    }

    // ========================================================================
    // Display lists
    // ========================================================================

    /// Queue a display list at the tail
    ///
    /// # Arguments
    ///
    /// * `list_addr` - First command of the list
    /// * `stall_addr` - Stall address, 0 for none
    /// * `callback_id` - Callback slot bound to the list's signals, or negative
    /// * `opt_param_addr` - Optional argument block, 0 for none
    ///
    /// # Returns
    ///
    /// The guest-visible list id
    pub fn list_enqueue(
        &mut self,
        list_addr: u32,
        stall_addr: u32,
        callback_id: i32,
        opt_param_addr: u32,
    ) -> GeResult<u32> {
        self.enqueue(list_addr, stall_addr, callback_id, opt_param_addr, false)
    }

    /// Queue a display list ahead of all others
    pub fn list_enqueue_head(
        &mut self,
        list_addr: u32,
        stall_addr: u32,
        callback_id: i32,
        opt_param_addr: u32,
    ) -> GeResult<u32> {
        self.enqueue(list_addr, stall_addr, callback_id, opt_param_addr, true)
    }

    fn enqueue(
        &mut self,
        list_addr: u32,
        stall_addr: u32,
        callback_id: i32,
        opt_param_addr: u32,
        head: bool,
    ) -> GeResult<u32> {
        let args = match ListArgs::read(&self.memory, opt_param_addr) {
            Ok(args) => args,
            Err(e) => {
                log::warn!("GE: ignoring list arguments at 0x{:08X}: {}", opt_param_addr, e);
                None
            }
        };

        let result = self.owner.enqueue_list(
            list_addr,
            stall_addr,
            sub_intr_base(callback_id),
            args,
            head,
        );
        self.pump_requests();

        log::debug!(
            "sceGeListEnQueue{}(addr=0x{:08X}, stall=0x{:08X}, cbid={}, param=0x{:08X}) = {:?}",
            if head { "Head" } else { "" },
            list_addr,
            stall_addr,
            callback_id,
            opt_param_addr,
            result
        );

        self.timing.eat_cycles(if head {
            ENQUEUE_HEAD_CYCLES
        } else {
            ENQUEUE_CYCLES
        });
        self.timing.force_check();

        result.map(|id| id ^ LIST_ID_MAGIC)
    }

    pub fn list_dequeue(&mut self, list_id: u32) -> GeResult<u32> {
        let result = self.owner.dequeue_list(owner_id(list_id));
        self.pump_requests();
        self.kernel.reschedule("dlist dequeued");
        log::debug!("sceGeListDeQueue({:08X}) = {:?}", list_id, result);
        result
    }

    pub fn list_update_stall_addr(&mut self, list_id: u32, stall_addr: u32) -> GeResult<u32> {
        self.timing.eat_cycles(UPDATE_STALL_CYCLES);
        self.timing.force_check();

        let result = self.owner.update_stall(owner_id(list_id), stall_addr);
        self.pump_requests();
        log::debug!(
            "sceGeListUpdateStallAddr({:08X}, 0x{:08X}) = {:?}",
            list_id,
            stall_addr,
            result
        );
        result
    }

    /// Wait for (mode 0) or peek at (mode 1) a list's completion
    pub fn list_sync(&mut self, list_id: u32, mode: u32) -> GeResult<u32> {
        let result = self.owner.list_sync(owner_id(list_id), mode);
        self.pump_requests();
        log::debug!("sceGeListSync({:08X}, {}) = {:?}", list_id, mode, result);
        result
    }

    /// Wait for (mode 0) or peek at (mode 1) completion of all lists
    pub fn draw_sync(&mut self, mode: u32) -> GeResult<u32> {
        self.timing.eat_cycles(if self.config.draw_sync_eat_cycles {
            DRAW_SYNC_SLOW_CYCLES
        } else {
            DRAW_SYNC_CYCLES
        });

        let result = self.owner.draw_sync(mode);
        self.pump_requests();
        log::debug!("sceGeDrawSync({}) = {:?}", mode, result);
        result
    }

    pub fn ge_continue(&mut self) -> GeResult<u32> {
        let result = self.owner.continue_lists();
        self.pump_requests();
        self.timing.eat_cycles(CONTINUE_CYCLES);
        self.kernel.reschedule("ge continue");
        log::debug!("sceGeContinue() = {:?}", result);
        result
    }

    /// Break the current list (mode 0) or all lists (mode 1)
    ///
    /// # Returns
    ///
    /// For mode 0, the guest id of the broken list
    pub fn ge_break(&mut self, mode: u32, param_ptr: u32) -> GeResult<u32> {
        if mode > 1 {
            log::warn!("sceGeBreak({}, 0x{:08X}): invalid mode", mode, param_ptr);
            return Err(GeError::InvalidMode);
        }
        if (param_ptr as i32) < 0 || (param_ptr.wrapping_add(16) as i32) < 0 {
            log::warn!("sceGeBreak({}, 0x{:08X}): bad pointer", mode, param_ptr);
            return Err(GeError::PrivRequired);
        }
        if param_ptr != 0 {
            log::warn!(
                "sceGeBreak({}, 0x{:08X}): unsupported param pointer ({})",
                mode,
                param_ptr,
                if self.memory.is_valid_address(param_ptr) {
                    "valid"
                } else {
                    "invalid"
                }
            );
        }

        let result = self.owner.break_lists(mode);
        self.pump_requests();
        log::debug!("sceGeBreak({}, 0x{:08X}) = {:?}", mode, param_ptr, result);

        if mode == 0 {
            result.map(|id| id ^ LIST_ID_MAGIC)
        } else {
            result
        }
    }

    pub fn get_stack(&mut self, index: i32, stack_ptr: u32) -> GeResult<u32> {
        log::warn!("sceGeGetStack({}, 0x{:08X})", index, stack_ptr);
        let result = self.owner.get_stack(index, stack_ptr);
        self.pump_requests();
        result
    }

    // ========================================================================
    // Callbacks
    // ========================================================================

    /// Register the callback block at `struct_addr`
    ///
    /// # Returns
    ///
    /// The allocated slot
    pub fn set_callback(&mut self, struct_addr: u32) -> GeResult<u32> {
        let data = CallbackData::read(&self.memory, struct_addr);
        log::debug!("sceGeSetCallback(0x{:08X}) <- {:?}", struct_addr, data);
        self.ge.set_callback(data)
    }

    pub fn unset_callback(&mut self, callback_id: u32) -> GeResult<u32> {
        log::debug!("sceGeUnsetCallback({})", callback_id);
        self.ge.unset_callback(callback_id)
    }

    // ========================================================================
    // Register state
    // ========================================================================

    /// Write the register context to guest memory
    pub fn save_context(&mut self, ctx_addr: u32) -> GeResult<u32> {
        if self.owner.busy_drawing() {
            log::warn!("sceGeSaveContext(0x{:08X}): lists in progress", ctx_addr);
            return Err(GeError::ContextBusy);
        }

        if self.memory.is_valid_address(ctx_addr) {
            if let Err(e) = self.owner.gfx_state().save_to(&mut self.memory, ctx_addr) {
                log::warn!("sceGeSaveContext(0x{:08X}): {}", ctx_addr, e);
            }
        }
        Ok(0)
    }

    /// Load the register context from guest memory
    pub fn restore_context(&mut self, ctx_addr: u32) -> GeResult<u32> {
        if self.owner.busy_drawing() {
            log::warn!("sceGeRestoreContext(0x{:08X}): lists in progress", ctx_addr);
            return Err(GeError::Busy);
        }

        if self.memory.is_valid_address(ctx_addr) {
            if let Err(e) = self
                .owner
                .gfx_state_mut()
                .restore_from(&self.memory, ctx_addr)
            {
                log::warn!("sceGeRestoreContext(0x{:08X}): {}", ctx_addr, e);
            }
        }
        self.owner.reapply_gfx_state();
        Ok(0)
    }

    /// Copy a matrix out as 24-bit GE floats
    pub fn get_mtx(&mut self, kind: i32, matrix_ptr: u32) -> GeResult<u32> {
        if !self.memory.is_valid_address(matrix_ptr) {
            log::error!("sceGeGetMtx({}, 0x{:08X}): bad matrix ptr", kind, matrix_ptr);
            return Err(GeError::BadPointer);
        }

        let Some(kind) = MatrixKind::from_raw(kind) else {
            log::error!("sceGeGetMtx({}, 0x{:08X}): invalid type", kind, matrix_ptr);
            return Err(GeError::InvalidIndex);
        };

        log::debug!("sceGeGetMtx({:?}, 0x{:08X})", kind, matrix_ptr);
        let words: Vec<u32> = self
            .owner
            .gfx_state()
            .matrix(kind)
            .iter()
            .map(|&f| to_float24(f))
            .collect();
        for (i, word) in words.into_iter().enumerate() {
            let address = matrix_ptr.wrapping_add(i as u32 * 4);
            if let Err(e) = self.memory.write_u32(address, word) {
                log::warn!("sceGeGetMtx: {}", e);
                break;
            }
        }
        Ok(0)
    }

    /// Read back a raw command word
    pub fn get_cmd(&self, cmd: i32) -> GeResult<u32> {
        match usize::try_from(cmd) {
            Ok(index) if index < 256 => Ok(self.owner.gfx_state().cmdmem[index]),
            _ => Err(GeError::InvalidIndex),
        }
    }
}

fn owner_id(guest_id: u32) -> i32 {
    (guest_id ^ LIST_ID_MAGIC) as i32
}
