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

//! Session savestate tests

use super::*;
use crate::core::error::EmulatorError;
use crate::core::ge::tests::write_finish;
use crate::core::ge::GeRequest;
use crate::core::interrupt::regs;
use crate::core::system::DEFAULT_EDRAM_WIDTH;

const RESUME_PC: u32 = 0x0880_4000;

fn queue_finish(sys: &mut TestSystem, slot: u32, at_ticks: u64) -> u32 {
    let pc = write_finish(sys.memory_mut(), slot);
    sys.owner_mut().requests.push(GeRequest::TriggerInterrupt {
        list_id: 1,
        pc,
        at_ticks,
    });
    sys.pump_requests();
    pc
}

/// A fresh session sharing the guest memory and list of `sys`
fn restored_from(sys: &TestSystem) -> TestSystem {
    let data = sys.save_state().unwrap();
    let mut restored = system();
    *restored.memory_mut() = sys.memory().clone();
    restored.owner_mut().add_list(1, 0);
    restored.load_state(&data).unwrap();
    restored
}

#[test]
fn test_pending_interrupt_fires_after_restore() {
    let mut sys = system();
    register_callback(&mut sys);
    sys.owner_mut().add_list(1, 0);
    sys.cpu_mut().pc = RESUME_PC;
    let pc = queue_finish(&mut sys, 0, 100);
    sys.advance(50);

    let mut restored = restored_from(&sys);

    assert_eq!(restored.timing().get_ticks(), 50);
    assert_eq!(restored.ge().pending_count(), 1);
    assert!(restored.ge().is_callback_used(0));

    restored.advance(49);
    assert!(!restored.in_interrupt());
    restored.advance(1);
    assert!(restored.in_interrupt());
    assert_eq!(restored.cpu().pc, FINISH_FUNC);
    assert_eq!(restored.cpu().r[regs::A2], pc + 4);
}

#[test]
fn test_running_handler_survives_restore() {
    let mut sys = system();
    register_callback(&mut sys);
    sys.owner_mut().add_list(1, 0);
    sys.cpu_mut().pc = RESUME_PC;
    queue_finish(&mut sys, 0, 10);
    queue_finish(&mut sys, 1, 10);
    sys.advance(10);
    assert!(sys.in_interrupt());
    assert_eq!(sys.ge().raised_interrupts(), 1);

    let mut restored = restored_from(&sys);

    assert!(restored.in_interrupt());
    assert_eq!(restored.cpu().pc, FINISH_FUNC);
    assert_eq!(restored.ge().raised_interrupts(), 1);

    restored.return_from_ge_interrupt();
    assert_eq!(restored.owner().interrupt_starts, vec![1]);
    assert!(restored.in_interrupt());

    restored.return_from_ge_interrupt();
    assert!(!restored.in_interrupt());
    assert_eq!(restored.cpu().pc, RESUME_PC);
    assert_eq!(restored.owner().interrupt_ends, vec![1, 1]);
}

#[test]
fn test_edram_width_is_persisted() {
    let mut sys = system();
    sys.edram_set_addr_translation(0x1000).unwrap();

    let restored = restored_from(&sys);
    assert_eq!(restored.edram_width(), 0x1000);
}

#[test]
fn test_garbage_session_is_rejected() {
    let mut sys = system();
    let result = sys.load_state(&[0xFF; 3]);
    assert!(matches!(result, Err(EmulatorError::StateDecode(_))));
}

#[test]
fn test_reset_clears_handler_and_width() {
    let mut sys = system();
    register_callback(&mut sys);
    sys.owner_mut().add_list(1, 0);
    queue_finish(&mut sys, 0, 0);
    sys.edram_set_addr_translation(0x800).unwrap();
    sys.run_events();
    assert!(sys.in_interrupt());

    sys.reset();

    assert!(!sys.in_interrupt());
    assert_eq!(sys.edram_width(), DEFAULT_EDRAM_WIDTH);
    assert_eq!(sys.ge().pending_count(), 0);
    assert!(!sys.ge().is_callback_used(0));
}
