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

//! Virtual timeline
//!
//! All asynchronous GE behavior (sync wakeups, interrupt lines) is driven by
//! events scheduled against a cycle counter rather than wall-clock time.
//! Events are registered once by name and may then be scheduled any number
//! of times, each instance carrying a 64-bit userdata word.
//!
//! # Ordering
//!
//! Scheduled instances fire strictly in target-tick order. Instances with the
//! same target fire in the order they were scheduled.
//!
//! # Cycle accounting
//!
//! Callers "eat" cycles into `pending_ticks`; the counter only moves forward
//! when [`TimingEventManager::run_events`] commits them. This mirrors how an
//! interpreter accumulates cycles between event checks.

use serde::{Deserialize, Serialize};

/// Signed tick delta
pub type TickCount = i64;

/// Handle to a registered event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventHandle(u32);

impl EventHandle {
    /// Raw index of this handle
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One scheduled instance of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct ScheduledEvent {
    handle: EventHandle,
    userdata: u64,
    target: u64,
    seq: u64,
}

/// An event instance that reached its target tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiredEvent {
    pub handle: EventHandle,
    pub userdata: u64,
    /// How many ticks past the target the event was delivered
    pub cycles_late: u64,
}

/// Timing event manager
///
/// # Example
///
/// ```
/// use psge::core::timing::TimingEventManager;
///
/// let mut timing = TimingEventManager::new();
/// let event = timing.register_event("Example");
///
/// timing.schedule(event, 100, 7);
/// assert!(timing.advance(99).is_empty());
///
/// let fired = timing.advance(1);
/// assert_eq!(fired.len(), 1);
/// assert_eq!(fired[0].userdata, 7);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimingEventManager {
    /// Registered event names, indexed by handle
    names: Vec<String>,

    /// Scheduled instances, sorted by (target, seq)
    queue: Vec<ScheduledEvent>,

    /// Committed tick counter
    pub global_tick_counter: u64,

    /// Ticks consumed but not yet committed
    pub pending_ticks: u64,

    next_seq: u64,

    #[serde(skip)]
    force_check: bool,
}

impl TimingEventManager {
    /// Create an empty timeline at tick 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an event type by name
    ///
    /// Registering a name twice returns the existing handle.
    ///
    /// # Arguments
    ///
    /// * `name` - Event name (used for savestate re-binding and logging)
    ///
    /// # Returns
    ///
    /// Handle used to schedule instances of this event
    pub fn register_event(&mut self, name: &str) -> EventHandle {
        if let Some(index) = self.names.iter().position(|n| n == name) {
            return EventHandle(index as u32);
        }

        self.names.push(name.to_string());
        let handle = EventHandle((self.names.len() - 1) as u32);
        log::debug!("Timing: registered event '{}' as {}", name, handle.0);
        handle
    }

    /// Re-bind a handle loaded from a savestate to its event name
    ///
    /// The handle keeps its numeric value; the slot is created if the
    /// current session never registered that many events.
    pub fn restore_register_event(&mut self, handle: EventHandle, name: &str) {
        let index = handle.index();
        while self.names.len() <= index {
            self.names.push(String::new());
        }

        if self.names[index] != name {
            if !self.names[index].is_empty() {
                log::warn!(
                    "Timing: event slot {} was '{}', re-binding to '{}'",
                    index,
                    self.names[index],
                    name
                );
            }
            self.names[index] = name.to_string();
        }
    }

    /// Name of a registered event
    pub fn event_name(&self, handle: EventHandle) -> Option<&str> {
        self.names.get(handle.index()).map(String::as_str)
    }

    /// Current tick, including uncommitted cycles
    pub fn get_ticks(&self) -> u64 {
        self.global_tick_counter + self.pending_ticks
    }

    /// Schedule an event instance
    ///
    /// A negative delay schedules the instance for the next event check.
    ///
    /// # Arguments
    ///
    /// * `handle` - Registered event
    /// * `delay` - Ticks from now
    /// * `userdata` - Opaque word delivered with the event
    pub fn schedule(&mut self, handle: EventHandle, delay: TickCount, userdata: u64) {
        let now = self.get_ticks();
        let target = if delay < 0 {
            now
        } else {
            now.saturating_add(delay as u64)
        };

        let entry = ScheduledEvent {
            handle,
            userdata,
            target,
            seq: self.next_seq,
        };
        self.next_seq += 1;

        // Insert after every instance with the same or earlier target
        let pos = self.queue.partition_point(|e| e.target <= target);
        self.queue.insert(pos, entry);

        log::trace!(
            "Timing: scheduled {} (userdata=0x{:X}) at tick {}",
            handle.0,
            userdata,
            target
        );
    }

    /// Remove a scheduled instance
    ///
    /// # Returns
    ///
    /// Ticks that were left until the instance would have fired, or `None`
    /// if no instance with this handle and userdata was scheduled
    pub fn unschedule(&mut self, handle: EventHandle, userdata: u64) -> Option<TickCount> {
        let pos = self
            .queue
            .iter()
            .position(|e| e.handle == handle && e.userdata == userdata)?;
        let entry = self.queue.remove(pos);
        Some(entry.target as TickCount - self.get_ticks() as TickCount)
    }

    /// Whether an instance with this handle and userdata is scheduled
    pub fn is_scheduled(&self, handle: EventHandle, userdata: u64) -> bool {
        self.queue
            .iter()
            .any(|e| e.handle == handle && e.userdata == userdata)
    }

    /// Number of scheduled instances
    pub fn scheduled_count(&self) -> usize {
        self.queue.len()
    }

    /// Ticks until the next scheduled instance fires
    pub fn ticks_until_next_event(&self) -> Option<u64> {
        self.queue
            .first()
            .map(|e| e.target.saturating_sub(self.get_ticks()))
    }

    /// Consume cycles without running events
    pub fn eat_cycles(&mut self, cycles: u64) {
        self.pending_ticks += cycles;
    }

    /// Request an immediate event check
    ///
    /// Used after operations that may have raised an interrupt out of band.
    pub fn force_check(&mut self) {
        self.force_check = true;
    }

    /// Take the pending force-check request
    pub fn take_force_check(&mut self) -> bool {
        std::mem::take(&mut self.force_check)
    }

    /// Consume cycles and run every event that became due
    pub fn advance(&mut self, cycles: u64) -> Vec<FiredEvent> {
        self.pending_ticks += cycles;
        self.run_events()
    }

    /// Commit pending cycles and pop every due instance in order
    ///
    /// # Returns
    ///
    /// Fired instances, earliest first
    pub fn run_events(&mut self) -> Vec<FiredEvent> {
        self.global_tick_counter += self.pending_ticks;
        self.pending_ticks = 0;
        self.force_check = false;

        let now = self.global_tick_counter;
        let due = self.queue.partition_point(|e| e.target <= now);

        self.queue
            .drain(..due)
            .map(|e| FiredEvent {
                handle: e.handle,
                userdata: e.userdata,
                cycles_late: now - e.target,
            })
            .collect()
    }
}
