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

//! Session integration
//!
//! [`GeSystem`] owns the virtual timeline, the GE controller and every
//! collaborator the controller talks to. It is the single actor through
//! which all interrupt and sync state changes flow:
//!
//! ```text
//!              ┌─────────────── GeSystem ────────────────┐
//! guest call ─▶│ sce_ge facade ─▶ ListOwner ─▶ requests  │
//!              │                                  │      │
//!              │ timeline ◀── trigger_sync/intr ◀─┘      │
//!              │    │                                    │
//!              │    └─▶ process_events ─▶ GE line ─▶ cpu │
//!              └─────────────────────────────────────────┘
//! ```
//!
//! The list owner never calls back into the controller; it queues
//! [`GeRequest`]s that are drained after every owner call.

mod sce_ge;
mod session;

#[cfg(test)]
mod tests;

pub use sce_ge::{EDRAM_ADDR, EDRAM_SIZE};

use super::config::GeConfig;
use super::error::Result;
use super::ge::{GeController, GeRequest, ListOwner, SdkCompat};
use super::interrupt::{GuestRegisters, IntrOutcome};
use super::kernel::ThreadManager;
use super::memory::GuestMemory;
use super::spline::{DrawBackend, PatchCommand, SplineDrawEngine, SubmitStats, VertexNormalizer};
use super::timing::TimingEventManager;

/// Initial EDRAM address translation width
pub const DEFAULT_EDRAM_WIDTH: u32 = 0x400;

/// GE session
///
/// Integrates the GE controller with the guest-side collaborators.
///
/// # Components
/// - Timeline: virtual cycle counter driving sync and interrupt events
/// - Controller: pending interrupts, wait-sets, callback slots
/// - List owner: display-list executor
/// - Memory: guest address space
/// - Kernel: thread suspension
/// - Backend: rasterizer receiving tessellated patches
///
/// # Example
/// ```
/// use psge::core::config::GeConfig;
/// use psge::core::ge::SdkCompat;
/// use psge::core::system::GeSystem;
/// # use psge::core::ge::{DisplayList, GeRegisterState, GeRequest, ListArgs, ListOwner, SyncType};
/// # use psge::core::error::GeResult;
/// # use psge::core::kernel::SimpleKernel;
/// # use psge::core::memory::GuestRam;
/// # use psge::core::spline::{DrawBackend, PrimType, SimpleVertex, VertexType};
/// # use psge::core::ge::state::UvScale;
/// # #[derive(Default)]
/// # struct Owner { state: GeRegisterState }
/// # impl ListOwner for Owner {
/// #     fn enqueue_list(&mut self, _: u32, _: u32, _: i32, _: Option<ListArgs>, _: bool) -> GeResult<u32> { Ok(0) }
/// #     fn dequeue_list(&mut self, _: i32) -> GeResult<u32> { Ok(0) }
/// #     fn update_stall(&mut self, _: i32, _: u32) -> GeResult<u32> { Ok(0) }
/// #     fn list_sync(&mut self, _: i32, _: u32) -> GeResult<u32> { Ok(0) }
/// #     fn draw_sync(&mut self, _: u32) -> GeResult<u32> { Ok(0) }
/// #     fn continue_lists(&mut self) -> GeResult<u32> { Ok(0) }
/// #     fn break_lists(&mut self, _: u32) -> GeResult<u32> { Ok(0) }
/// #     fn get_stack(&mut self, _: i32, _: u32) -> GeResult<u32> { Ok(0) }
/// #     fn busy_drawing(&self) -> bool { false }
/// #     fn get_list(&self, _: i32) -> Option<&DisplayList> { None }
/// #     fn get_list_mut(&mut self, _: i32) -> Option<&mut DisplayList> { None }
/// #     fn interrupt_start(&mut self, _: i32) {}
/// #     fn interrupt_end(&mut self, _: i32) {}
/// #     fn sync_end(&mut self, _: SyncType, _: i32, _: bool) {}
/// #     fn gfx_state(&self) -> &GeRegisterState { &self.state }
/// #     fn gfx_state_mut(&mut self) -> &mut GeRegisterState { &mut self.state }
/// #     fn reapply_gfx_state(&mut self) {}
/// #     fn drain_requests(&mut self) -> Vec<GeRequest> { Vec::new() }
/// # }
/// # struct Backend;
/// # impl DrawBackend for Backend {
/// #     fn flush(&mut self) {}
/// #     fn can_use_hardware_transform(&self, _: PrimType) -> bool { false }
/// #     fn send_tess_data(&mut self, _: &[SimpleVertex], _: VertexType) {}
/// #     fn set_num_patches(&mut self, _: u32) {}
/// #     fn submit_prim(&mut self, _: &[SimpleVertex], _: &[u16], _: PrimType, _: VertexType, _: &UvScale) {}
/// # }
///
/// let mut system = GeSystem::new(
///     GeConfig::default(),
///     SdkCompat::from_sdk_version(0x0500_0000),
///     Owner::default(),
///     GuestRam::new(),
///     SimpleKernel::new(1),
///     Backend,
/// );
/// assert_eq!(system.edram_get_addr(), 0x0400_0000);
/// system.advance(1000);
/// ```
pub struct GeSystem<L, M, K, B> {
    /// Timing event manager
    timing: TimingEventManager,
    /// GE controller
    ge: GeController,
    /// Session configuration
    config: GeConfig,
    /// Display-list executor
    owner: L,
    /// Guest memory
    memory: M,
    /// Kernel thread services
    kernel: K,
    /// Rasterizer backend
    backend: B,
    /// Guest registers touched by interrupt entry
    cpu: GuestRegisters,
    /// Registers saved while a GE handler runs
    interrupted: Option<GuestRegisters>,
    /// EDRAM address translation width
    edram_width: u32,
    /// Spline/Bezier submission
    draw: SplineDrawEngine,
}

impl<L, M, K, B> GeSystem<L, M, K, B>
where
    L: ListOwner,
    M: GuestMemory,
    K: ThreadManager,
    B: DrawBackend,
{
    /// Create a session
    ///
    /// # Arguments
    ///
    /// * `config` - Session configuration
    /// * `compat` - Guest SDK compatibility, resolved once from the guest binary
    /// * `owner` - Display-list executor
    /// * `memory` - Guest memory
    /// * `kernel` - Kernel thread services
    /// * `backend` - Rasterizer backend
    pub fn new(
        config: GeConfig,
        compat: SdkCompat,
        owner: L,
        memory: M,
        kernel: K,
        backend: B,
    ) -> Self {
        let mut timing = TimingEventManager::new();
        let ge = GeController::new(&mut timing, compat);
        let draw = SplineDrawEngine::new(&config);

        log::info!(
            "GE session initialized ({:?}, quality {})",
            compat,
            config.spline_quality
        );

        Self {
            timing,
            ge,
            config,
            owner,
            memory,
            kernel,
            backend,
            cpu: GuestRegisters::default(),
            interrupted: None,
            edram_width: DEFAULT_EDRAM_WIDTH,
            draw,
        }
    }

    /// Reset GE state for a new boot
    ///
    /// The timeline keeps running; scheduled events of the old session are
    /// left to fire into an empty controller.
    pub fn reset(&mut self) {
        self.ge.reset();
        self.interrupted = None;
        self.edram_width = DEFAULT_EDRAM_WIDTH;
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn timing(&self) -> &TimingEventManager {
        &self.timing
    }

    pub fn timing_mut(&mut self) -> &mut TimingEventManager {
        &mut self.timing
    }

    pub fn ge(&self) -> &GeController {
        &self.ge
    }

    pub fn ge_mut(&mut self) -> &mut GeController {
        &mut self.ge
    }

    pub fn config(&self) -> &GeConfig {
        &self.config
    }

    /// Replace the configuration
    pub fn set_config(&mut self, config: GeConfig) {
        self.draw.apply_config(&config);
        self.config = config;
    }

    pub fn owner(&self) -> &L {
        &self.owner
    }

    pub fn owner_mut(&mut self) -> &mut L {
        &mut self.owner
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    pub fn kernel_mut(&mut self) -> &mut K {
        &mut self.kernel
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn cpu(&self) -> &GuestRegisters {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut GuestRegisters {
        &mut self.cpu
    }

    /// Current EDRAM address translation width
    pub fn edram_width(&self) -> u32 {
        self.edram_width
    }

    /// Whether a GE handler is running on the guest CPU
    pub fn in_interrupt(&self) -> bool {
        self.interrupted.is_some()
    }

    // ========================================================================
    // Timeline
    // ========================================================================

    /// Route the list owner's queued requests to the controller
    pub fn pump_requests(&mut self) {
        for request in self.owner.drain_requests() {
            match request {
                GeRequest::TriggerSync {
                    sync_type,
                    id,
                    at_ticks,
                } => self
                    .ge
                    .trigger_sync(&mut self.timing, sync_type, id, at_ticks),
                GeRequest::TriggerInterrupt {
                    list_id,
                    pc,
                    at_ticks,
                } => self.ge.trigger_interrupt(
                    &mut self.timing,
                    &self.memory,
                    list_id,
                    pc,
                    at_ticks,
                ),
                GeRequest::WaitCurrentThread {
                    sync_type,
                    wait_id,
                    reason,
                } => self
                    .ge
                    .wait_current_thread(&mut self.kernel, sync_type, wait_id, reason),
            }
        }
    }

    /// Commit pending cycles, fire due events and run the GE line
    pub fn run_events(&mut self) {
        let fired = self.timing.run_events();
        if !fired.is_empty() {
            self.ge
                .process_events(&fired, &mut self.kernel, &mut self.owner);
            self.pump_requests();
        }
        self.dispatch_interrupts();
    }

    /// Run events now if a check was forced since the last run
    ///
    /// # Returns
    ///
    /// true if events were run
    pub fn check_events(&mut self) -> bool {
        if self.timing.take_force_check() {
            self.run_events();
            return true;
        }
        false
    }

    /// Consume cycles and run every event that became due
    pub fn advance(&mut self, cycles: u64) {
        self.timing.eat_cycles(cycles);
        self.run_events();
    }

    /// Run raised GE interrupts until one enters a guest handler
    pub fn dispatch_interrupts(&mut self) {
        while !self.in_interrupt() && self.ge.poll_interrupt() {
            self.run_ge_interrupt();
        }
    }

    // ========================================================================
    // Interrupt line
    // ========================================================================

    /// Run the GE interrupt line once
    ///
    /// When a guest handler is bound, the current registers are saved and
    /// the CPU is pointed at the handler.
    pub fn run_ge_interrupt(&mut self) -> IntrOutcome {
        let outcome = self.ge.run_interrupt(&mut self.owner);
        if let IntrOutcome::Handled(call) = outcome {
            self.interrupted = Some(self.cpu.clone());
            call.apply(&mut self.cpu);
        }
        self.pump_requests();
        outcome
    }

    /// The running GE handler returned
    ///
    /// Restores the interrupted registers, completes the interrupt and
    /// runs the next raised one, if any.
    pub fn return_from_ge_interrupt(&mut self) {
        let Some(saved) = self.interrupted.take() else {
            log::error!("[report] GE: interrupt return with no handler running");
            return;
        };

        self.cpu = saved;
        self.ge.handle_result(&mut self.owner, &self.memory);
        self.pump_requests();
        self.dispatch_interrupts();
    }

    // ========================================================================
    // Patch primitives
    // ========================================================================

    /// Draw a spline patch with the live UV registers
    pub fn submit_spline(
        &mut self,
        cmd: &PatchCommand,
        normalizer: &mut impl VertexNormalizer,
    ) -> Result<SubmitStats> {
        let uv = &mut self.owner.gfx_state_mut().uv;
        self.draw
            .submit_spline(cmd, normalizer, &mut self.backend, uv)
    }

    /// Draw a Bezier mesh with the live UV registers
    pub fn submit_bezier(
        &mut self,
        cmd: &PatchCommand,
        normalizer: &mut impl VertexNormalizer,
    ) -> Result<SubmitStats> {
        let uv = &mut self.owner.gfx_state_mut().uv;
        self.draw
            .submit_bezier(cmd, normalizer, &mut self.backend, uv)
    }
}
