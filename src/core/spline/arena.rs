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

//! Per-call scratch budget
//!
//! Patch submission needs temporary storage for normalized control points,
//! the point table and the tessellated mesh. The draw engine keeps those
//! buffers alive between calls; the arena only accounts for how much of the
//! fixed scratch region one submission claims, so an oversized patch fails
//! with [`EmulatorError::ScratchExhausted`] instead of growing without bound.

use crate::core::error::{EmulatorError, Result};

/// Alignment of every allocation
const ALIGN: usize = 16;

/// Bump allocator over a fixed byte budget
#[derive(Debug, Clone)]
pub struct ScratchArena {
    capacity: usize,
    used: usize,
}

impl ScratchArena {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, used: 0 }
    }

    /// Claim room for `count` values of `T`
    ///
    /// # Returns
    ///
    /// Byte offset of the allocation within the scratch region
    pub fn allocate<T>(&mut self, count: usize) -> Result<usize> {
        let bytes = count.saturating_mul(std::mem::size_of::<T>());
        let offset = self.used.next_multiple_of(ALIGN);
        let end = offset.saturating_add(bytes);

        if end > self.capacity {
            let available = self.capacity.saturating_sub(offset);
            log::warn!(
                "Scratch arena exhausted: {} bytes requested, {} available",
                bytes,
                available
            );
            return Err(EmulatorError::ScratchExhausted {
                requested: bytes,
                available,
            });
        }

        self.used = end;
        Ok(offset)
    }

    /// Release every allocation
    pub fn reset(&mut self) {
        self.used = 0;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.used)
    }
}
