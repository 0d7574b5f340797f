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

//! Guest memory access
//!
//! The GE layer touches guest memory in a handful of places: the opcode
//! byte preceding a list's program counter, callback descriptors, context
//! save areas and matrix output buffers. [`GuestMemory`] is the accessor
//! contract; [`GuestRam`] is a flat implementation of the PSP map used by
//! the session and the tests.
//!
//! # Memory Map
//!
//! | Address Range          | Region      | Size |
//! |------------------------|-------------|------|
//! | 0x04000000-0x041FFFFF  | EDRAM (VRAM)| 2MB  |
//! | 0x08000000-0x09FFFFFF  | Main RAM    | 32MB |
//!
//! Bits 30-31 select cached/uncached/kernel mirrors and are ignored.
//!
//! # Example
//!
//! ```
//! use psge::core::memory::{GuestMemory, GuestRam};
//!
//! let mut ram = GuestRam::new();
//!
//! ram.write_u32(0x0880_0000, 0x12345678).unwrap();
//! assert_eq!(ram.read_u32(0x4880_0000).unwrap(), 0x12345678);
//! assert!(ram.read_u32(0x0000_0000).is_err());
//! ```

use crate::core::error::{EmulatorError, Result};

/// Guest memory accessor
pub trait GuestMemory {
    /// Whether `address` maps to backed memory
    fn is_valid_address(&self, address: u32) -> bool;

    /// Read a 32-bit little-endian word
    fn read_u32(&self, address: u32) -> Result<u32>;

    /// Write a 32-bit little-endian word
    fn write_u32(&mut self, address: u32, value: u32) -> Result<()>;

    /// Read a word, yielding 0 for unmapped addresses
    ///
    /// Matches the hardware's tolerance for stale pointers in places where
    /// the GE only peeks at guest memory.
    fn read_u32_unchecked(&self, address: u32) -> u32 {
        self.read_u32(address).unwrap_or_else(|e| {
            log::debug!("Unchecked read failed: {}", e);
            0
        })
    }
}

/// Flat guest RAM covering EDRAM and main memory
#[derive(Clone)]
pub struct GuestRam {
    /// EDRAM (2MB)
    ///
    /// Physical address: 0x04000000-0x041FFFFF
    vram: Vec<u8>,

    /// Main RAM
    ///
    /// Physical address: 0x08000000 onwards
    ram: Vec<u8>,
}

impl GuestRam {
    /// EDRAM base address
    pub const VRAM_START: u32 = 0x0400_0000;
    /// EDRAM size
    pub const VRAM_SIZE: u32 = 0x0020_0000;
    /// Main RAM base address
    pub const RAM_START: u32 = 0x0800_0000;
    /// Main RAM size
    pub const RAM_SIZE: u32 = 0x0200_0000;

    const SEGMENT_MASK: u32 = 0x3FFF_FFFF;

    /// Create zeroed guest memory
    pub fn new() -> Self {
        Self {
            vram: vec![0; Self::VRAM_SIZE as usize],
            ram: vec![0; Self::RAM_SIZE as usize],
        }
    }

    /// Resolve an address to a backing slice and offset
    fn locate(&self, address: u32) -> Option<(&[u8], usize)> {
        let paddr = address & Self::SEGMENT_MASK;
        if (Self::RAM_START..Self::RAM_START + Self::RAM_SIZE).contains(&paddr) {
            Some((self.ram.as_slice(), (paddr - Self::RAM_START) as usize))
        } else if (Self::VRAM_START..Self::VRAM_START + Self::VRAM_SIZE).contains(&paddr) {
            Some((self.vram.as_slice(), (paddr - Self::VRAM_START) as usize))
        } else {
            None
        }
    }

    fn locate_mut(&mut self, address: u32) -> Option<(&mut [u8], usize)> {
        let paddr = address & Self::SEGMENT_MASK;
        if (Self::RAM_START..Self::RAM_START + Self::RAM_SIZE).contains(&paddr) {
            Some((self.ram.as_mut_slice(), (paddr - Self::RAM_START) as usize))
        } else if (Self::VRAM_START..Self::VRAM_START + Self::VRAM_SIZE).contains(&paddr) {
            Some((self.vram.as_mut_slice(), (paddr - Self::VRAM_START) as usize))
        } else {
            None
        }
    }

    /// Copy a block of bytes into guest memory
    ///
    /// # Arguments
    ///
    /// * `address` - Destination address
    /// * `data` - Bytes to copy
    ///
    /// # Returns
    ///
    /// - `Ok(())` if the whole block fit in one region
    /// - `Err(EmulatorError::InvalidMemoryAccess)` otherwise
    pub fn write_bytes(&mut self, address: u32, data: &[u8]) -> Result<()> {
        let (mem, offset) = self
            .locate_mut(address)
            .ok_or(EmulatorError::InvalidMemoryAccess { address })?;
        let end = offset + data.len();
        if end > mem.len() {
            return Err(EmulatorError::InvalidMemoryAccess {
                address: address.wrapping_add(data.len() as u32),
            });
        }
        mem[offset..end].copy_from_slice(data);
        Ok(())
    }
}

impl Default for GuestRam {
    fn default() -> Self {
        Self::new()
    }
}

impl GuestMemory for GuestRam {
    fn is_valid_address(&self, address: u32) -> bool {
        self.locate(address).is_some()
    }

    fn read_u32(&self, address: u32) -> Result<u32> {
        if address & 0x3 != 0 {
            return Err(EmulatorError::UnalignedAccess { address, size: 4 });
        }

        let (mem, offset) = self
            .locate(address)
            .ok_or(EmulatorError::InvalidMemoryAccess { address })?;
        let bytes = [mem[offset], mem[offset + 1], mem[offset + 2], mem[offset + 3]];
        Ok(u32::from_le_bytes(bytes))
    }

    fn write_u32(&mut self, address: u32, value: u32) -> Result<()> {
        if address & 0x3 != 0 {
            return Err(EmulatorError::UnalignedAccess { address, size: 4 });
        }

        let (mem, offset) = self
            .locate_mut(address)
            .ok_or(EmulatorError::InvalidMemoryAccess { address })?;
        mem[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }
}
