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

//! GE register state
//!
//! The command processor keeps the last value written to each of the 256
//! command slots plus the matrix stacks uploaded through the matrix data
//! commands. The guest can snapshot and restore all of it with
//! SaveContext/RestoreContext, read individual words with GetCmd, and read
//! matrices with GetMtx.
//!
//! ## Context blob layout (512 words)
//!
//! ```text
//! Words     | Content
//! ----------|------------------------------------
//! 0..256    | command memory
//! 256..352  | bone matrices 0-7 (4x3 each)
//! 352..364  | world matrix (4x3)
//! 364..376  | view matrix (4x3)
//! 376..392  | projection matrix (4x4)
//! 392..404  | texgen matrix (4x3)
//! 404..511  | zero
//! 511       | layout tag
//! ```
//!
//! Matrix words are stored as raw `f32` bits. Nothing else is inferred from
//! the command words; they are replayed verbatim.

use crate::core::error::Result;
use crate::core::memory::GuestMemory;

/// Number of command slots
pub const CMDMEM_WORDS: usize = 256;

/// Context blob size in words
pub const CONTEXT_WORDS: usize = 512;

/// Value of the last context word for blobs written by this layout
pub const CONTEXT_LAYOUT_TAG: u32 = 0x4745_0001;

const BONE_OFFSET: usize = 256;
const WORLD_OFFSET: usize = 352;
const VIEW_OFFSET: usize = 364;
const PROJ_OFFSET: usize = 376;
const TGEN_OFFSET: usize = 392;
const TAG_OFFSET: usize = CONTEXT_WORDS - 1;

/// Convert a float to the GE's 24-bit float encoding
///
/// The low mantissa byte is dropped.
///
/// # Example
///
/// ```
/// use psge::core::ge::state::to_float24;
///
/// assert_eq!(to_float24(1.0), 0x3F8000);
/// ```
pub fn to_float24(value: f32) -> u32 {
    value.to_bits() >> 8
}

/// Matrix selector accepted by GetMtx
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixKind {
    Bone(u8),
    World,
    View,
    Projection,
    TexGen,
}

impl MatrixKind {
    /// Decode a GetMtx type argument
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0..=7 => Some(MatrixKind::Bone(raw as u8)),
            8 => Some(MatrixKind::World),
            9 => Some(MatrixKind::View),
            10 => Some(MatrixKind::Projection),
            11 => Some(MatrixKind::TexGen),
            _ => None,
        }
    }
}

/// Texture coordinate scale/offset applied by the transform stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvScale {
    pub u_scale: f32,
    pub v_scale: f32,
    pub u_offset: f32,
    pub v_offset: f32,
}

impl UvScale {
    pub const IDENTITY: UvScale = UvScale {
        u_scale: 1.0,
        v_scale: 1.0,
        u_offset: 0.0,
        v_offset: 0.0,
    };
}

impl Default for UvScale {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// GE register state
#[derive(Debug, Clone, PartialEq)]
pub struct GeRegisterState {
    pub cmdmem: [u32; CMDMEM_WORDS],
    pub bone_matrix: [f32; 96],
    pub world_matrix: [f32; 12],
    pub view_matrix: [f32; 12],
    pub proj_matrix: [f32; 16],
    pub tgen_matrix: [f32; 12],
    /// Derived UV transform (not part of the context blob)
    pub uv: UvScale,
}

impl GeRegisterState {
    pub fn new() -> Self {
        Self {
            cmdmem: [0; CMDMEM_WORDS],
            bone_matrix: [0.0; 96],
            world_matrix: [0.0; 12],
            view_matrix: [0.0; 12],
            proj_matrix: [0.0; 16],
            tgen_matrix: [0.0; 12],
            uv: UvScale::IDENTITY,
        }
    }

    /// Matrix words for a GetMtx selector
    pub fn matrix(&self, kind: MatrixKind) -> &[f32] {
        match kind {
            MatrixKind::Bone(n) => {
                let start = n as usize * 12;
                &self.bone_matrix[start..start + 12]
            }
            MatrixKind::World => &self.world_matrix,
            MatrixKind::View => &self.view_matrix,
            MatrixKind::Projection => &self.proj_matrix,
            MatrixKind::TexGen => &self.tgen_matrix,
        }
    }

    /// Serialize into the 512-word context layout
    pub fn to_context_words(&self) -> Vec<u32> {
        let mut words = vec![0u32; CONTEXT_WORDS];
        words[..CMDMEM_WORDS].copy_from_slice(&self.cmdmem);
        store_floats(&mut words[BONE_OFFSET..WORLD_OFFSET], &self.bone_matrix);
        store_floats(&mut words[WORLD_OFFSET..VIEW_OFFSET], &self.world_matrix);
        store_floats(&mut words[VIEW_OFFSET..PROJ_OFFSET], &self.view_matrix);
        store_floats(&mut words[PROJ_OFFSET..TGEN_OFFSET], &self.proj_matrix);
        store_floats(&mut words[TGEN_OFFSET..TGEN_OFFSET + 12], &self.tgen_matrix);
        words[TAG_OFFSET] = CONTEXT_LAYOUT_TAG;
        words
    }

    /// Load from the 512-word context layout
    ///
    /// Blobs carrying an unknown tag are still applied.
    pub fn load_context_words(&mut self, words: &[u32]) {
        if words.len() < CONTEXT_WORDS {
            log::warn!(
                "GE context blob too short ({} words), ignoring",
                words.len()
            );
            return;
        }
        if words[TAG_OFFSET] != CONTEXT_LAYOUT_TAG {
            log::warn!(
                "GE context blob has tag 0x{:08X}, expected 0x{:08X}",
                words[TAG_OFFSET],
                CONTEXT_LAYOUT_TAG
            );
        }

        self.cmdmem.copy_from_slice(&words[..CMDMEM_WORDS]);
        load_floats(&mut self.bone_matrix, &words[BONE_OFFSET..WORLD_OFFSET]);
        load_floats(&mut self.world_matrix, &words[WORLD_OFFSET..VIEW_OFFSET]);
        load_floats(&mut self.view_matrix, &words[VIEW_OFFSET..PROJ_OFFSET]);
        load_floats(&mut self.proj_matrix, &words[PROJ_OFFSET..TGEN_OFFSET]);
        load_floats(&mut self.tgen_matrix, &words[TGEN_OFFSET..TGEN_OFFSET + 12]);
    }

    /// Write the context blob to guest memory
    pub fn save_to(&self, memory: &mut impl GuestMemory, address: u32) -> Result<()> {
        for (i, word) in self.to_context_words().into_iter().enumerate() {
            memory.write_u32(address + (i as u32) * 4, word)?;
        }
        Ok(())
    }

    /// Read a context blob from guest memory
    pub fn restore_from(&mut self, memory: &impl GuestMemory, address: u32) -> Result<()> {
        let words = (0..CONTEXT_WORDS as u32)
            .map(|i| memory.read_u32(address + i * 4))
            .collect::<Result<Vec<u32>>>()?;
        self.load_context_words(&words);
        Ok(())
    }
}

impl Default for GeRegisterState {
    fn default() -> Self {
        Self::new()
    }
}

fn store_floats(dst: &mut [u32], src: &[f32]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d = s.to_bits();
    }
}

fn load_floats(dst: &mut [f32], src: &[u32]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d = f32::from_bits(*s);
    }
}
