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

//! Session integration tests

mod session;
mod timeline;

use crate::core::config::GeConfig;
use crate::core::ge::state::UvScale;
use crate::core::ge::tests::MockListOwner;
use crate::core::ge::SdkCompat;
use crate::core::kernel::SimpleKernel;
use crate::core::memory::{GuestMemory, GuestRam};
use crate::core::spline::{DrawBackend, PrimType, SimpleVertex, VertexType};

use super::GeSystem;

/// Thread the tests run on
pub(super) const THREAD: i32 = 1;

/// Callback registration block
pub(super) const CALLBACK_BLOCK: u32 = 0x0890_0000;
pub(super) const FINISH_FUNC: u32 = 0x0880_1000;
pub(super) const SIGNAL_FUNC: u32 = 0x0880_2000;

/// Recording rasterizer
#[derive(Default)]
pub(super) struct RecordingBackend {
    pub draws: Vec<(usize, usize, UvScale)>,
}

impl DrawBackend for RecordingBackend {
    fn flush(&mut self) {}

    fn can_use_hardware_transform(&self, _prim: PrimType) -> bool {
        false
    }

    fn send_tess_data(&mut self, _points: &[SimpleVertex], _vertex_type: VertexType) {}

    fn set_num_patches(&mut self, _count: u32) {}

    fn submit_prim(
        &mut self,
        vertices: &[SimpleVertex],
        indices: &[u16],
        _prim: PrimType,
        _vertex_type: VertexType,
        uv: &UvScale,
    ) {
        self.draws.push((vertices.len(), indices.len(), *uv));
    }
}

pub(super) type TestSystem = GeSystem<MockListOwner, GuestRam, SimpleKernel, RecordingBackend>;

pub(super) fn system_with(config: GeConfig) -> TestSystem {
    GeSystem::new(
        config,
        SdkCompat::Current,
        MockListOwner::new(),
        GuestRam::new(),
        SimpleKernel::new(THREAD),
        RecordingBackend::default(),
    )
}

pub(super) fn system() -> TestSystem {
    system_with(GeConfig::default())
}

/// Register callback slot 0 with both handlers
pub(super) fn register_callback(sys: &mut TestSystem) -> u32 {
    let memory = sys.memory_mut();
    memory.write_u32(CALLBACK_BLOCK, SIGNAL_FUNC).unwrap();
    memory.write_u32(CALLBACK_BLOCK + 4, 0x51).unwrap();
    memory.write_u32(CALLBACK_BLOCK + 8, FINISH_FUNC).unwrap();
    memory.write_u32(CALLBACK_BLOCK + 12, 0xF1).unwrap();
    sys.set_callback(CALLBACK_BLOCK).unwrap()
}
