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

//! Interrupt line tests

use super::*;
use crate::core::ge::controller::{CallbackData, GeController};
use crate::core::ge::list::{DisplayListSignal, DisplayListState};
use crate::core::ge::SdkCompat;
use crate::core::interrupt::{GuestRegisters, IntrOutcome};
use crate::core::timing::TimingEventManager;

struct Fixture {
    timing: TimingEventManager,
    memory: GuestRam,
    owner: MockListOwner,
    ge: GeController,
}

fn fixture(compat: SdkCompat) -> Fixture {
    let mut timing = TimingEventManager::new();
    let ge = GeController::new(&mut timing, compat);
    Fixture {
        timing,
        memory: GuestRam::new(),
        owner: MockListOwner::new(),
        ge,
    }
}

fn callback(finish: u32, signal: u32) -> CallbackData {
    CallbackData {
        signal_func: signal,
        signal_arg: 0x51,
        finish_func: finish,
        finish_arg: 0xF1,
    }
}

// ============================================================================
// FIFO ordering
// ============================================================================

#[test]
fn test_unhandled_interrupts_drain_in_fifo_order() {
    let mut f = fixture(SdkCompat::Current);
    f.owner.add_list(1, 0);
    f.owner.add_list(2, 0);

    let pc_a = write_finish(&mut f.memory, 0);
    let pc_b = write_finish(&mut f.memory, 1);
    f.ge.trigger_interrupt(&mut f.timing, &f.memory, 1, pc_a, 10);
    f.ge.trigger_interrupt(&mut f.timing, &f.memory, 2, pc_b, 10);

    assert_eq!(f.ge.run_interrupt(&mut f.owner), IntrOutcome::NotHandled);
    assert_eq!(f.ge.run_interrupt(&mut f.owner), IntrOutcome::NotHandled);

    assert_eq!(f.owner.interrupt_starts, vec![1, 2]);
    assert_eq!(f.owner.interrupt_ends, vec![1, 2]);
    assert_eq!(f.ge.pending_count(), 0);
}

#[test]
fn test_interrupt_event_raises_line_at_target_tick() {
    let mut f = fixture(SdkCompat::Current);
    let mut kernel = crate::core::kernel::SimpleKernel::new(1);
    f.owner.add_list(1, 0);
    let pc = write_finish(&mut f.memory, 0);
    f.ge.trigger_interrupt(&mut f.timing, &f.memory, 1, pc, 50);

    let fired = f.timing.advance(49);
    f.ge.process_events(&fired, &mut kernel, &mut f.owner);
    assert!(!f.ge.poll_interrupt());

    let fired = f.timing.advance(1);
    f.ge.process_events(&fired, &mut kernel, &mut f.owner);
    assert!(f.ge.poll_interrupt());
    assert!(!f.ge.poll_interrupt());
}

#[test]
fn test_command_byte_captured_at_trigger_time() {
    let mut f = fixture(SdkCompat::Current);
    let pc = write_signal(&mut f.memory, 0);
    f.ge.trigger_interrupt(&mut f.timing, &f.memory, 1, pc, 0);

    // Overwrite the command before the interrupt runs
    write_finish(&mut f.memory, 0);

    let entry = f.ge.pending_interrupts().next().copied().unwrap();
    assert_eq!(entry.cmd, GE_CMD_SIGNAL);
    assert_eq!(entry.pc, pc);
}

// ============================================================================
// Dispatch
// ============================================================================

#[test]
fn test_bound_finish_handler_is_dispatched() {
    let mut f = fixture(SdkCompat::Current);
    let id = f.ge.set_callback(callback(0x0880_4000, 0)).unwrap();
    let list = f.owner.add_list(1, crate::core::ge::sub_intr_base(id as i32));
    list.sub_intr_token = 0x1_2345;
    list.state = DisplayListState::Running;

    let pc = write_finish(&mut f.memory, 0);
    f.ge.trigger_interrupt(&mut f.timing, &f.memory, 1, pc, 0);

    let IntrOutcome::Handled(call) = f.ge.run_interrupt(&mut f.owner) else {
        panic!("expected a handler call");
    };
    assert_eq!(call.address, 0x0880_4000);
    assert_eq!(call.args, [0x2345, 0xF1, pc + 4]);

    let mut cpu = GuestRegisters::default();
    call.apply(&mut cpu);
    assert_eq!(cpu.pc, 0x0880_4000);
    assert_eq!(cpu.r[crate::core::interrupt::regs::A2], pc + 4);

    // Entry stays queued until the handler returns
    assert_eq!(f.ge.pending_count(), 1);
    assert!(f.owner.interrupt_ends.is_empty());
    assert_eq!(f.owner.lists[&1].state, DisplayListState::Completed);

    f.ge.handle_result(&mut f.owner, &f.memory);
    assert_eq!(f.ge.pending_count(), 0);
    assert_eq!(f.owner.interrupt_ends, vec![1]);
}

#[test]
fn test_signal_command_uses_signal_handler() {
    let mut f = fixture(SdkCompat::Current);
    f.ge.set_callback(callback(0x0880_4000, 0x0880_5000)).unwrap();
    f.owner.add_list(1, 0);

    let pc = write_signal(&mut f.memory, 0);
    f.ge.trigger_interrupt(&mut f.timing, &f.memory, 1, pc, 0);

    match f.ge.run_interrupt(&mut f.owner) {
        IntrOutcome::Handled(call) => {
            assert_eq!(call.address, 0x0880_5000);
            assert_eq!(call.args[1], 0x51);
        }
        IntrOutcome::NotHandled => panic!("signal handler not dispatched"),
    }
    assert_eq!(f.owner.lists[&1].state, DisplayListState::Queued);
}

#[test]
fn test_legacy_sdk_passes_zero_continuation() {
    let mut f = fixture(SdkCompat::Legacy);
    f.ge.set_callback(callback(0x0880_4000, 0)).unwrap();
    f.owner.add_list(1, 0);

    let pc = write_finish(&mut f.memory, 0);
    f.ge.trigger_interrupt(&mut f.timing, &f.memory, 1, pc, 0);

    match f.ge.run_interrupt(&mut f.owner) {
        IntrOutcome::Handled(call) => assert_eq!(call.args[2], 0),
        IntrOutcome::NotHandled => panic!("handler not dispatched"),
    }
}

#[test]
fn test_handler_pause_finish_does_not_complete() {
    let mut f = fixture(SdkCompat::Current);
    f.ge.set_callback(callback(0x0880_4000, 0x0880_5000)).unwrap();
    let list = f.owner.add_list(1, 0);
    list.signal = DisplayListSignal::HandlerPause;
    list.state = DisplayListState::Paused;

    let pc = write_finish(&mut f.memory, 0);
    f.ge.trigger_interrupt(&mut f.timing, &f.memory, 1, pc, 0);

    match f.ge.run_interrupt(&mut f.owner) {
        IntrOutcome::Handled(call) => assert_eq!(call.address, 0x0880_5000),
        IntrOutcome::NotHandled => panic!("pause signal not dispatched"),
    }
    assert_eq!(f.owner.lists[&1].state, DisplayListState::Paused);
}

#[test]
fn test_bookkeeping_signal_is_absorbed_but_completes() {
    let mut f = fixture(SdkCompat::Current);
    f.ge.set_callback(callback(0x0880_4000, 0x0880_5000)).unwrap();
    let list = f.owner.add_list(1, 0);
    list.signal = DisplayListSignal::Jump;

    let pc = write_finish(&mut f.memory, 0);
    f.ge.trigger_interrupt(&mut f.timing, &f.memory, 1, pc, 0);

    assert_eq!(f.ge.run_interrupt(&mut f.owner), IntrOutcome::NotHandled);
    assert_eq!(f.owner.lists[&1].state, DisplayListState::Completed);
    assert_eq!(f.owner.interrupt_ends, vec![1]);
}

// ============================================================================
// Anomalies
// ============================================================================

#[test]
fn test_missing_list_is_dropped_from_queue() {
    let mut f = fixture(SdkCompat::Current);
    f.owner.add_list(2, 0);
    let pc = write_finish(&mut f.memory, 0);
    f.ge.trigger_interrupt(&mut f.timing, &f.memory, 1, pc, 0);
    f.ge.trigger_interrupt(&mut f.timing, &f.memory, 2, pc, 0);

    assert_eq!(f.ge.run_interrupt(&mut f.owner), IntrOutcome::NotHandled);
    assert!(f.owner.interrupt_starts.is_empty());
    assert_eq!(f.ge.pending_count(), 1);

    // The next entry resolves normally
    assert_eq!(f.ge.run_interrupt(&mut f.owner), IntrOutcome::NotHandled);
    assert_eq!(f.owner.interrupt_ends, vec![2]);
}

#[test]
fn test_disabled_interrupts_are_dropped() {
    let mut f = fixture(SdkCompat::Current);
    f.owner.add_list(1, -1);
    let pc = write_finish(&mut f.memory, 0);
    f.ge.trigger_interrupt(&mut f.timing, &f.memory, 1, pc, 0);

    assert_eq!(f.ge.run_interrupt(&mut f.owner), IntrOutcome::NotHandled);
    assert_eq!(f.ge.pending_count(), 0);
    assert!(f.owner.interrupt_starts.is_empty());
    assert!(f.owner.interrupt_ends.is_empty());
}

#[test]
fn test_run_with_empty_queue_is_noop() {
    let mut f = fixture(SdkCompat::Current);
    assert_eq!(f.ge.run_interrupt(&mut f.owner), IntrOutcome::NotHandled);
    f.ge.handle_result(&mut f.owner, &f.memory);
    assert!(f.owner.interrupt_ends.is_empty());
}

// ============================================================================
// Legacy HANDLER_SUSPEND
// ============================================================================

#[test]
fn test_legacy_suspend_without_handler_requeues() {
    let mut f = fixture(SdkCompat::Legacy);
    let list = f.owner.add_list(1, 0);
    list.signal = DisplayListSignal::HandlerSuspend;
    list.state = DisplayListState::Running;

    let pc = write_signal(&mut f.memory, 0);
    f.ge.trigger_interrupt(&mut f.timing, &f.memory, 1, pc, 0);

    assert_eq!(f.ge.run_interrupt(&mut f.owner), IntrOutcome::NotHandled);
    assert_eq!(f.owner.lists[&1].state, DisplayListState::Queued);
}

#[test]
fn test_current_sdk_suspend_keeps_state() {
    let mut f = fixture(SdkCompat::Current);
    let list = f.owner.add_list(1, 0);
    list.signal = DisplayListSignal::HandlerSuspend;
    list.state = DisplayListState::Running;

    let pc = write_signal(&mut f.memory, 0);
    f.ge.trigger_interrupt(&mut f.timing, &f.memory, 1, pc, 0);

    assert_eq!(f.ge.run_interrupt(&mut f.owner), IntrOutcome::NotHandled);
    assert_eq!(f.owner.lists[&1].state, DisplayListState::Running);
}

#[test]
fn test_legacy_suspend_handler_return_requeues() {
    let mut f = fixture(SdkCompat::Legacy);
    f.ge.set_callback(callback(0, 0x0880_5000)).unwrap();
    let list = f.owner.add_list(1, 0);
    list.signal = DisplayListSignal::HandlerSuspend;
    list.state = DisplayListState::Running;

    let pc = write_command(&mut f.memory, 0, GE_CMD_SIGNAL, 0x02);
    f.ge.trigger_interrupt(&mut f.timing, &f.memory, 1, pc, 0);

    assert!(matches!(
        f.ge.run_interrupt(&mut f.owner),
        IntrOutcome::Handled(_)
    ));
    f.ge.handle_result(&mut f.owner, &f.memory);

    assert_eq!(f.owner.lists[&1].state, DisplayListState::Queued);
    assert_eq!(f.owner.interrupt_ends, vec![1]);
}

#[test]
fn test_legacy_suspend_leaves_completed_lists_alone() {
    let mut f = fixture(SdkCompat::Legacy);
    f.ge.set_callback(callback(0, 0x0880_5000)).unwrap();
    let list = f.owner.add_list(1, 0);
    list.signal = DisplayListSignal::HandlerSuspend;
    list.state = DisplayListState::Running;

    let pc = write_signal(&mut f.memory, 0);
    f.ge.trigger_interrupt(&mut f.timing, &f.memory, 1, pc, 0);
    assert!(matches!(
        f.ge.run_interrupt(&mut f.owner),
        IntrOutcome::Handled(_)
    ));

    f.owner.lists.get_mut(&1).unwrap().state = DisplayListState::Completed;
    f.ge.handle_result(&mut f.owner, &f.memory);
    assert_eq!(f.owner.lists[&1].state, DisplayListState::Completed);
}
