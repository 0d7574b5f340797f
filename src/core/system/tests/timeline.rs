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

//! Timeline and interrupt line tests

use super::*;
use crate::core::ge::tests::{write_finish, write_signal};
use crate::core::ge::{DisplayListState, GeRequest, SyncType};
use crate::core::interrupt::regs;
use crate::core::spline::{
    ControlIndices, FlatVertexNormalizer, KnotEdges, PatchCommand, PatchPrimType,
};

const RESUME_PC: u32 = 0x0880_4000;

fn queue_interrupt(sys: &mut TestSystem, list_id: i32, pc: u32, at_ticks: u64) {
    sys.owner_mut().requests.push(GeRequest::TriggerInterrupt {
        list_id,
        pc,
        at_ticks,
    });
    sys.pump_requests();
}

// ============================================================================
// Interrupt dispatch
// ============================================================================

#[test]
fn test_interrupt_enters_handler_at_target_tick() {
    let mut sys = system();
    register_callback(&mut sys);
    sys.owner_mut().add_list(1, 0);
    sys.cpu_mut().pc = RESUME_PC;

    let pc = write_finish(sys.memory_mut(), 0);
    queue_interrupt(&mut sys, 1, pc, 100);
    assert_eq!(sys.ge().pending_count(), 1);

    sys.advance(99);
    assert!(!sys.in_interrupt());
    assert_eq!(sys.cpu().pc, RESUME_PC);

    sys.advance(1);
    assert!(sys.in_interrupt());
    assert_eq!(sys.cpu().pc, FINISH_FUNC);
    assert_eq!(sys.cpu().r[regs::A1], 0xF1);
    assert_eq!(sys.cpu().r[regs::A2], pc + 4);
    assert_eq!(sys.owner().interrupt_starts, vec![1]);
    assert_eq!(
        sys.owner().lists[&1].state,
        DisplayListState::Completed
    );
}

#[test]
fn test_handler_return_restores_registers_and_ends_interrupt() {
    let mut sys = system();
    register_callback(&mut sys);
    sys.owner_mut().add_list(1, 0);
    sys.cpu_mut().pc = RESUME_PC;
    sys.cpu_mut().r[regs::A0] = 0x1234;

    let pc = write_signal(sys.memory_mut(), 0);
    queue_interrupt(&mut sys, 1, pc, 10);
    sys.advance(10);
    assert_eq!(sys.cpu().pc, SIGNAL_FUNC);
    assert_eq!(sys.cpu().r[regs::A1], 0x51);

    sys.cpu_mut().r[regs::A0] = 0xDEAD;
    sys.return_from_ge_interrupt();

    assert!(!sys.in_interrupt());
    assert_eq!(sys.cpu().pc, RESUME_PC);
    assert_eq!(sys.cpu().r[regs::A0], 0x1234);
    assert_eq!(sys.owner().interrupt_ends, vec![1]);
    assert_eq!(sys.ge().pending_count(), 0);
}

#[test]
fn test_second_interrupt_waits_for_first_handler() {
    let mut sys = system();
    register_callback(&mut sys);
    sys.owner_mut().add_list(1, 0);
    sys.owner_mut().add_list(2, 0);
    sys.cpu_mut().pc = RESUME_PC;

    let pc_a = write_finish(sys.memory_mut(), 0);
    let pc_b = write_finish(sys.memory_mut(), 1);
    queue_interrupt(&mut sys, 1, pc_a, 10);
    queue_interrupt(&mut sys, 2, pc_b, 10);

    sys.advance(10);
    assert_eq!(sys.owner().interrupt_starts, vec![1]);
    assert_eq!(sys.ge().raised_interrupts(), 1);

    sys.return_from_ge_interrupt();
    assert_eq!(sys.owner().interrupt_starts, vec![1, 2]);
    assert_eq!(sys.owner().interrupt_ends, vec![1]);
    assert!(sys.in_interrupt());
    assert_eq!(sys.cpu().r[regs::A2], pc_b + 4);

    sys.return_from_ge_interrupt();
    assert_eq!(sys.owner().interrupt_ends, vec![1, 2]);
    assert_eq!(sys.cpu().pc, RESUME_PC);
    assert_eq!(sys.ge().pending_count(), 0);
}

#[test]
fn test_interrupt_without_callback_is_absorbed() {
    let mut sys = system();
    sys.owner_mut().add_list(1, 0);
    sys.cpu_mut().pc = RESUME_PC;

    let pc = write_finish(sys.memory_mut(), 0);
    queue_interrupt(&mut sys, 1, pc, 5);
    sys.advance(5);

    assert!(!sys.in_interrupt());
    assert_eq!(sys.cpu().pc, RESUME_PC);
    assert_eq!(sys.owner().interrupt_ends, vec![1]);
    assert_eq!(sys.ge().pending_count(), 0);
}

#[test]
fn test_return_without_handler_is_ignored() {
    let mut sys = system();
    sys.cpu_mut().pc = RESUME_PC;

    sys.return_from_ge_interrupt();

    assert_eq!(sys.cpu().pc, RESUME_PC);
    assert!(sys.owner().interrupt_ends.is_empty());
}

// ============================================================================
// Sync waits
// ============================================================================

#[test]
fn test_draw_sync_wait_resolves_on_timeline() {
    let mut sys = system();
    sys.owner_mut().busy = true;

    assert_eq!(sys.draw_sync(0), Ok(1));
    assert!(sys.kernel().is_waiting(THREAD));
    assert_eq!(sys.ge().draw_waiting(), &[THREAD]);

    let at_ticks = sys.timing().get_ticks() + 500;
    sys.owner_mut().requests.push(GeRequest::TriggerSync {
        sync_type: SyncType::Draw,
        id: 0,
        at_ticks,
    });
    sys.pump_requests();

    sys.advance(499);
    assert!(sys.kernel().is_waiting(THREAD));

    sys.advance(1);
    assert!(!sys.kernel().is_waiting(THREAD));
    assert_eq!(sys.owner().sync_ends, vec![(SyncType::Draw, 0, true)]);
    assert!(sys.ge().draw_waiting().is_empty());
}

#[test]
fn test_list_sync_wait_is_keyed_by_owner_id() {
    let mut sys = system();
    let guest_id = sys.list_enqueue(0x0880_0000, 0, -1, 0).unwrap();

    assert_eq!(sys.list_sync(guest_id, 0), Ok(DisplayListState::Queued as u32));
    assert_eq!(sys.ge().list_waiting(0), &[THREAD]);

    sys.owner_mut().requests.push(GeRequest::TriggerSync {
        sync_type: SyncType::List,
        id: 0,
        at_ticks: 0,
    });
    sys.pump_requests();
    sys.run_events();

    assert!(!sys.kernel().is_waiting(THREAD));
    assert!(sys.ge().list_waiting(0).is_empty());
}

#[test]
fn test_forced_check_runs_events() {
    let mut sys = system();
    sys.list_enqueue(0x0880_0000, 0, -1, 0).unwrap();

    assert!(sys.check_events());
    assert!(!sys.check_events());
}

// ============================================================================
// Patch submission
// ============================================================================

#[test]
fn test_patch_submission_restores_live_uv() {
    let mut sys = system();
    let guest_uv = UvScale {
        u_scale: 2.0,
        v_scale: 2.0,
        u_offset: 0.5,
        v_offset: 0.5,
    };
    sys.owner_mut().state.uv = guest_uv;

    let points: Vec<SimpleVertex> = (0..16)
        .map(|i| SimpleVertex {
            pos: [(i % 4) as f32, (i / 4) as f32, 0.0],
            color_32: 0xFFFF_FFFF,
            ..SimpleVertex::default()
        })
        .collect();
    let cmd = PatchCommand {
        control_points: bytemuck::cast_slice(points.as_slice()),
        indices: ControlIndices::None,
        tess_u: 4,
        tess_v: 4,
        count_u: 4,
        count_v: 4,
        type_u: KnotEdges::OPEN_START | KnotEdges::OPEN_END,
        type_v: KnotEdges::OPEN_START | KnotEdges::OPEN_END,
        prim_type: PatchPrimType::Triangles,
        compute_normals: false,
        patch_facing: false,
        vertex_type: VertexType::SIMPLE,
    };

    let stats = sys.submit_spline(&cmd, &mut FlatVertexNormalizer).unwrap();

    assert_eq!(stats.vertices, 25);
    assert_eq!(sys.backend().draws, vec![(25, 96, UvScale::IDENTITY)]);
    assert_eq!(sys.owner().state.uv, guest_uv);
}
