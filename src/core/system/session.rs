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

//! Session savestates
//!
//! A session snapshot wraps the controller section together with the
//! timeline and the interrupt-line bookkeeping owned by [`GeSystem`]:
//!
//! ```text
//! Field        | Contents
//! -------------|-----------------------------------------
//! version      | session format version
//! timing       | tick counter, registered names, queue
//! cpu          | guest registers
//! interrupted  | registers saved while a handler runs
//! raised       | GE line raises not yet run
//! edram_width  | EDRAM address translation width
//! ge           | `sceGe` controller section
//! ```

use serde::{Deserialize, Serialize};

use crate::core::error::{EmulatorError, Result};
use crate::core::ge::ListOwner;
use crate::core::interrupt::GuestRegisters;
use crate::core::kernel::ThreadManager;
use crate::core::memory::GuestMemory;
use crate::core::spline::DrawBackend;
use crate::core::timing::TimingEventManager;

use super::GeSystem;

const SESSION_SECTION: &str = "GeSession";
const SESSION_VERSION: u8 = 1;

#[derive(Serialize, Deserialize)]
struct SessionState {
    version: u8,
    timing: TimingEventManager,
    cpu: GuestRegisters,
    interrupted: Option<GuestRegisters>,
    raised: u32,
    edram_width: u32,
    ge: Vec<u8>,
}

impl<L, M, K, B> GeSystem<L, M, K, B>
where
    L: ListOwner,
    M: GuestMemory,
    K: ThreadManager,
    B: DrawBackend,
{
    /// Serialize the session
    pub fn save_state(&self) -> Result<Vec<u8>> {
        let state = SessionState {
            version: SESSION_VERSION,
            timing: self.timing.clone(),
            cpu: self.cpu.clone(),
            interrupted: self.interrupted.clone(),
            raised: self.ge.raised_interrupts(),
            edram_width: self.edram_width,
            ge: self.ge.save_state()?,
        };
        let bytes = bincode::serde::encode_to_vec(&state, bincode::config::standard())?;
        log::info!("GE session saved ({} bytes)", bytes.len());
        Ok(bytes)
    }

    /// Restore a session saved by [`Self::save_state`]
    ///
    /// Guest memory, the list owner and the kernel are restored by their
    /// own sections and are expected to be in place already.
    pub fn load_state(&mut self, data: &[u8]) -> Result<()> {
        let (state, _): (SessionState, usize) =
            bincode::serde::decode_from_slice(data, bincode::config::standard())?;

        if state.version != SESSION_VERSION {
            return Err(EmulatorError::UnsupportedStateVersion {
                section: SESSION_SECTION.to_string(),
                version: state.version,
            });
        }

        let mut timing = state.timing;
        self.ge.load_state(&state.ge, &mut timing, &self.memory)?;
        self.ge.set_raised_interrupts(state.raised);

        self.timing = timing;
        self.cpu = state.cpu;
        self.interrupted = state.interrupted;
        self.edram_width = state.edram_width;

        log::info!(
            "GE session restored at tick {} ({} pending interrupts)",
            self.timing.get_ticks(),
            self.ge.pending_count()
        );
        Ok(())
    }
}
