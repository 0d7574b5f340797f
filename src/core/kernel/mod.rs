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

//! Kernel thread/wait contract
//!
//! GE sync calls suspend the calling guest thread until a draw or list
//! condition resolves. Thread scheduling itself belongs to the kernel; the
//! GE layer only needs to park the current thread and later resume it.
//! [`ThreadManager`] is that contract and [`SimpleKernel`] a bookkeeping
//! implementation for sessions without a full kernel.

use std::collections::HashMap;

/// Guest thread identifier
pub type ThreadId = i32;

/// Reasons a thread can wait on the GE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaitType {
    /// sceGeDrawSync
    GeDrawSync,
    /// sceGeListSync
    GeListSync,
}

impl WaitType {
    /// Kernel wait-type number (also used by legacy savestates)
    pub const fn raw(self) -> u32 {
        match self {
            WaitType::GeDrawSync => 17,
            WaitType::GeListSync => 18,
        }
    }
}

/// Kernel services used by the GE layer
pub trait ThreadManager {
    /// Currently running guest thread
    fn current_thread(&self) -> ThreadId;

    /// Suspend the current thread
    fn wait_current_thread(&mut self, wait_type: WaitType, wait_id: i32, reason: &str);

    /// Resume a thread waiting on `(wait_type, wait_id)`
    ///
    /// # Returns
    ///
    /// true if the thread was actually waiting on that condition
    fn resume_from_wait(
        &mut self,
        thread: ThreadId,
        wait_type: WaitType,
        wait_id: i32,
        result: i32,
    ) -> bool;

    /// Ask the scheduler to pick a thread again
    fn reschedule(&mut self, reason: &str);
}

/// Bookkeeping kernel
///
/// Tracks which thread waits on what and the last result delivered to each
/// resumed thread.
///
/// # Example
///
/// ```
/// use psge::core::kernel::{SimpleKernel, ThreadManager, WaitType};
///
/// let mut kernel = SimpleKernel::new(7);
/// kernel.wait_current_thread(WaitType::GeDrawSync, 0, "draw sync");
/// assert!(kernel.is_waiting(7));
///
/// assert!(kernel.resume_from_wait(7, WaitType::GeDrawSync, 0, 0));
/// assert!(!kernel.is_waiting(7));
/// ```
#[derive(Debug, Default)]
pub struct SimpleKernel {
    current: ThreadId,
    waiting: HashMap<ThreadId, (WaitType, i32)>,
    results: HashMap<ThreadId, i32>,
    reschedules: usize,
}

impl SimpleKernel {
    /// Create a kernel whose current thread is `current`
    pub fn new(current: ThreadId) -> Self {
        Self {
            current,
            ..Default::default()
        }
    }

    /// Switch the running thread
    pub fn set_current_thread(&mut self, thread: ThreadId) {
        self.current = thread;
    }

    /// Whether `thread` is suspended
    pub fn is_waiting(&self, thread: ThreadId) -> bool {
        self.waiting.contains_key(&thread)
    }

    /// Result delivered when `thread` was last resumed
    pub fn wait_result(&self, thread: ThreadId) -> Option<i32> {
        self.results.get(&thread).copied()
    }

    /// Number of reschedule requests seen
    pub fn reschedule_count(&self) -> usize {
        self.reschedules
    }
}

impl ThreadManager for SimpleKernel {
    fn current_thread(&self) -> ThreadId {
        self.current
    }

    fn wait_current_thread(&mut self, wait_type: WaitType, wait_id: i32, reason: &str) {
        log::trace!(
            "Thread {} waiting on {:?}({}): {}",
            self.current,
            wait_type,
            wait_id,
            reason
        );
        self.waiting.insert(self.current, (wait_type, wait_id));
    }

    fn resume_from_wait(
        &mut self,
        thread: ThreadId,
        wait_type: WaitType,
        wait_id: i32,
        result: i32,
    ) -> bool {
        match self.waiting.get(&thread) {
            Some(&(ty, id)) if ty == wait_type && id == wait_id => {
                self.waiting.remove(&thread);
                self.results.insert(thread, result);
                true
            }
            _ => false,
        }
    }

    fn reschedule(&mut self, reason: &str) {
        log::trace!("Reschedule requested: {}", reason);
        self.reschedules += 1;
    }
}
