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

//! Persisted controller state
//!
//! The controller is saved as a versioned section named `sceGe`:
//!
//! ```text
//! Version | Pending interrupt entry
//! --------|---------------------------
//! 1       | { list_id, pc }
//! 2       | { list_id, pc, cmd }
//! ```
//!
//! Both versions are followed by the three event handles and the wait-sets.
//! Loading version 1 recomputes each command byte from the word before
//! `pc` in guest memory, exactly as it would have been captured when the
//! interrupt was queued.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::error::{EmulatorError, Result};
use crate::core::kernel::ThreadId;
use crate::core::memory::GuestMemory;
use crate::core::timing::{EventHandle, TimingEventManager};

use super::controller::{
    CallbackData, GeController, GeInterruptData, CYCLE_EVENT_NAME, INTERRUPT_EVENT_NAME,
    SYNC_EVENT_NAME,
};
use super::CALLBACK_SLOTS;

/// Section name
pub const SECTION_NAME: &str = "sceGe";

/// Oldest version the loader accepts
pub const MIN_VERSION: u8 = 1;

/// Version written by [`GeController::save_state`]
pub const CURRENT_VERSION: u8 = 2;

#[derive(Debug, Serialize, Deserialize)]
struct SectionHeader {
    name: String,
    version: u8,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct GeInterruptDataV1 {
    list_id: i32,
    pc: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct SectionBody<P> {
    callbacks: [CallbackData; CALLBACK_SLOTS],
    used: [bool; CALLBACK_SLOTS],
    pending: Vec<P>,
    sync_event: EventHandle,
    interrupt_event: EventHandle,
    cycle_event: EventHandle,
    list_waiting: BTreeMap<i32, Vec<ThreadId>>,
    draw_waiting: Vec<ThreadId>,
}

fn config() -> bincode::config::Configuration {
    bincode::config::standard()
}

impl GeController {
    /// Serialize the controller at the current section version
    pub fn save_state(&self) -> Result<Vec<u8>> {
        self.save_state_version(CURRENT_VERSION)
    }

    /// Serialize the controller at a specific section version
    ///
    /// Version 1 drops the captured command bytes.
    pub fn save_state_version(&self, version: u8) -> Result<Vec<u8>> {
        let header = SectionHeader {
            name: SECTION_NAME.to_string(),
            version,
        };
        let mut out = bincode::serde::encode_to_vec(&header, config())?;

        let body = match version {
            1 => {
                let pending = self
                    .pending
                    .iter()
                    .map(|p| GeInterruptDataV1 {
                        list_id: p.list_id,
                        pc: p.pc,
                    })
                    .collect();
                bincode::serde::encode_to_vec(&self.body(pending), config())?
            }
            2 => {
                let pending = self.pending.iter().copied().collect();
                bincode::serde::encode_to_vec(&self.body(pending), config())?
            }
            _ => {
                return Err(EmulatorError::UnsupportedStateVersion {
                    section: SECTION_NAME.to_string(),
                    version,
                })
            }
        };

        out.extend_from_slice(&body);
        log::debug!(
            "GE: saved state v{} ({} bytes, {} pending)",
            version,
            out.len(),
            self.pending.len()
        );
        Ok(out)
    }

    fn body<P>(&self, pending: Vec<P>) -> SectionBody<P> {
        SectionBody {
            callbacks: self.callbacks,
            used: self.used,
            pending,
            sync_event: self.sync_event,
            interrupt_event: self.interrupt_event,
            cycle_event: self.cycle_event,
            list_waiting: self.list_waiting.clone(),
            draw_waiting: self.draw_waiting.clone(),
        }
    }

    /// Restore the controller from a saved section
    ///
    /// Event handles are re-bound to their names on `timing` and the
    /// sub-interrupt table is rebuilt from the restored callback slots.
    ///
    /// # Arguments
    ///
    /// * `data` - Section bytes (may be followed by other sections)
    /// * `timing` - Session timeline
    /// * `memory` - Guest memory, used to upgrade version 1 sections
    ///
    /// # Returns
    ///
    /// Number of bytes consumed
    pub fn load_state(
        &mut self,
        data: &[u8],
        timing: &mut TimingEventManager,
        memory: &impl GuestMemory,
    ) -> Result<usize> {
        let (header, header_len): (SectionHeader, usize) =
            bincode::serde::decode_from_slice(data, config())?;

        if header.name != SECTION_NAME {
            return Err(EmulatorError::StateSection {
                expected: SECTION_NAME.to_string(),
                found: header.name,
            });
        }

        let rest = &data[header_len..];
        let (body, body_len) = match header.version {
            1 => {
                let (body, len): (SectionBody<GeInterruptDataV1>, usize) =
                    bincode::serde::decode_from_slice(rest, config())?;
                let pending = body
                    .pending
                    .iter()
                    .map(|old| GeInterruptData {
                        list_id: old.list_id,
                        pc: old.pc,
                        cmd: memory.read_u32_unchecked(old.pc.wrapping_sub(4)) >> 24,
                    })
                    .collect();
                (upgrade(body, pending), len)
            }
            2 => bincode::serde::decode_from_slice::<SectionBody<GeInterruptData>, _>(
                rest,
                config(),
            )?,
            version => {
                return Err(EmulatorError::UnsupportedStateVersion {
                    section: header.name,
                    version,
                })
            }
        };

        self.callbacks = body.callbacks;
        self.used = body.used;
        self.pending = body.pending.into();
        self.list_waiting = body.list_waiting;
        self.draw_waiting = body.draw_waiting;

        self.sync_event = body.sync_event;
        timing.restore_register_event(self.sync_event, SYNC_EVENT_NAME);
        self.interrupt_event = body.interrupt_event;
        timing.restore_register_event(self.interrupt_event, INTERRUPT_EVENT_NAME);
        self.cycle_event = body.cycle_event;
        timing.restore_register_event(self.cycle_event, CYCLE_EVENT_NAME);

        self.rebuild_sub_intrs();

        log::debug!(
            "GE: loaded state v{} ({} pending)",
            header.version,
            self.pending.len()
        );
        Ok(header_len + body_len)
    }
}

fn upgrade(
    old: SectionBody<GeInterruptDataV1>,
    pending: Vec<GeInterruptData>,
) -> SectionBody<GeInterruptData> {
    SectionBody {
        callbacks: old.callbacks,
        used: old.used,
        pending,
        sync_event: old.sync_event,
        interrupt_event: old.interrupt_event,
        cycle_event: old.cycle_event,
        list_waiting: old.list_waiting,
        draw_waiting: old.draw_waiting,
    }
}
