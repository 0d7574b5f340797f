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

//! Draw engine tests

use super::raw_grid;
use crate::core::config::GeConfig;
use crate::core::error::EmulatorError;
use crate::core::ge::state::UvScale;
use crate::core::spline::draw::{
    ControlIndices, DrawBackend, FlatVertexNormalizer, PatchCommand, SplineDrawEngine,
};
use crate::core::spline::{KnotEdges, PatchPrimType, PrimType, SimpleVertex, VertexType};

struct Submitted {
    vertices: usize,
    indices: usize,
    prim: PrimType,
    vertex_type: VertexType,
    uv: UvScale,
    first_color: u32,
}

#[derive(Default)]
struct MockBackend {
    hardware: bool,
    flushes: usize,
    tess_points: Vec<SimpleVertex>,
    num_patches: Option<u32>,
    submitted: Vec<Submitted>,
}

impl DrawBackend for MockBackend {
    fn flush(&mut self) {
        self.flushes += 1;
    }

    fn can_use_hardware_transform(&self, _prim: PrimType) -> bool {
        self.hardware
    }

    fn send_tess_data(&mut self, points: &[SimpleVertex], _vertex_type: VertexType) {
        self.tess_points = points.to_vec();
    }

    fn set_num_patches(&mut self, count: u32) {
        self.num_patches = Some(count);
    }

    fn submit_prim(
        &mut self,
        vertices: &[SimpleVertex],
        indices: &[u16],
        prim: PrimType,
        vertex_type: VertexType,
        uv: &UvScale,
    ) {
        self.submitted.push(Submitted {
            vertices: vertices.len(),
            indices: indices.len(),
            prim,
            vertex_type,
            uv: *uv,
            first_color: vertices.first().map_or(0, |v| v.color_32),
        });
    }
}

const GUEST_UV: UvScale = UvScale {
    u_scale: 2.0,
    v_scale: 4.0,
    u_offset: 0.5,
    v_offset: 0.25,
};

fn command(raw: &[u8], count_u: usize, count_v: usize) -> PatchCommand<'_> {
    PatchCommand {
        control_points: raw,
        indices: ControlIndices::None,
        tess_u: 4,
        tess_v: 4,
        count_u,
        count_v,
        type_u: KnotEdges::OPEN_START | KnotEdges::OPEN_END,
        type_v: KnotEdges::OPEN_START | KnotEdges::OPEN_END,
        prim_type: PatchPrimType::Triangles,
        compute_normals: false,
        patch_facing: false,
        vertex_type: VertexType::SIMPLE,
    }
}

fn offload_config() -> GeConfig {
    GeConfig {
        hardware_tessellation: true,
        ..GeConfig::default()
    }
}

// ============================================================================
// CPU path
// ============================================================================

#[test]
fn test_spline_submission_uses_identity_uv() {
    let points = raw_grid(4, 4);
    let raw: &[u8] = bytemuck::cast_slice(points.as_slice());
    let mut engine = SplineDrawEngine::new(&GeConfig::default());
    let mut backend = MockBackend::default();
    let mut uv = GUEST_UV;

    let stats = engine
        .submit_spline(&command(raw, 4, 4), &mut FlatVertexNormalizer, &mut backend, &mut uv)
        .unwrap();

    assert_eq!(stats.bytes_read, 16 * 36);
    assert_eq!(stats.vertices, 25);
    assert_eq!(stats.indices, 96);
    assert!(!stats.hardware);

    assert_eq!(backend.submitted.len(), 1);
    let draw = &backend.submitted[0];
    assert_eq!(draw.uv, UvScale::IDENTITY);
    assert_eq!(draw.prim, PrimType::Triangles);
    assert_eq!(draw.vertex_type.index_format(), 2);
    assert_eq!((draw.vertices, draw.indices), (25, 96));

    assert_eq!(uv, GUEST_UV);
    assert_eq!(backend.flushes, 2);
}

#[test]
fn test_bezier_submission_counts_sub_patches() {
    let points = raw_grid(7, 4);
    let raw: &[u8] = bytemuck::cast_slice(points.as_slice());
    let mut engine = SplineDrawEngine::new(&GeConfig::default());
    let mut backend = MockBackend::default();
    let mut uv = GUEST_UV;

    let mut cmd = command(raw, 7, 4);
    cmd.prim_type = PatchPrimType::Lines;
    let stats = engine
        .submit_bezier(&cmd, &mut FlatVertexNormalizer, &mut backend, &mut uv)
        .unwrap();

    assert_eq!(stats.vertices, 2 * 25);
    assert_eq!(stats.indices, 2 * 96);
    assert_eq!(backend.submitted[0].prim, PrimType::Lines);
    assert_eq!(engine.last_mesh().vertices.len(), 50);
}

#[test]
fn test_too_few_points_submits_nothing() {
    let points = raw_grid(3, 4);
    let raw: &[u8] = bytemuck::cast_slice(points.as_slice());
    let mut engine = SplineDrawEngine::new(&GeConfig::default());
    let mut backend = MockBackend::default();
    let mut uv = GUEST_UV;

    let stats = engine
        .submit_spline(&command(raw, 3, 4), &mut FlatVertexNormalizer, &mut backend, &mut uv)
        .unwrap();

    assert_eq!(stats.bytes_read, 0);
    assert!(backend.submitted.is_empty());
    assert_eq!(backend.flushes, 1);
}

#[test]
fn test_format_without_texcoords_keeps_uv_scale() {
    let points = raw_grid(4, 4);
    let raw: &[u8] = bytemuck::cast_slice(points.as_slice());
    let mut engine = SplineDrawEngine::new(&GeConfig::default());
    let mut backend = MockBackend::default();
    let mut uv = GUEST_UV;

    let mut cmd = command(raw, 4, 4);
    // f32 position only
    cmd.vertex_type = VertexType(3 << 7);
    let stats = engine
        .submit_spline(&cmd, &mut FlatVertexNormalizer, &mut backend, &mut uv)
        .unwrap();

    assert_eq!(stats.bytes_read, 16 * 12);
    assert_eq!(backend.submitted[0].uv, GUEST_UV);
}

// ============================================================================
// Indexed control points
// ============================================================================

#[test]
fn test_indexed_points_resolve_through_table() {
    let points = raw_grid(4, 4);
    let raw: &[u8] = bytemuck::cast_slice(points.as_slice());
    let reversed: Vec<u8> = (0..16).rev().collect();
    let mut engine = SplineDrawEngine::new(&GeConfig::default());
    let mut backend = MockBackend::default();
    let mut uv = GUEST_UV;

    let mut cmd = command(raw, 4, 4);
    cmd.indices = ControlIndices::U8(&reversed);
    // texcoord + position, no color: every vertex takes the first point's color
    cmd.vertex_type = VertexType(3 | (3 << 7));
    engine
        .submit_spline(&cmd, &mut FlatVertexNormalizer, &mut backend, &mut uv)
        .unwrap();

    assert_eq!(backend.submitted[0].first_color, 0xFF00_000F);
    assert!(engine
        .last_mesh()
        .vertices
        .iter()
        .all(|v| v.color_32 == 0xFF00_000F));
    // Reversed grid starts at the far corner
    let first = engine.last_mesh().vertices[0].pos;
    assert!((first[0] - 3.0).abs() < 1e-4 && (first[1] - 3.0).abs() < 1e-4);
}

#[test]
fn test_short_index_list_is_rejected() {
    let points = raw_grid(4, 4);
    let raw: &[u8] = bytemuck::cast_slice(points.as_slice());
    let indices: Vec<u16> = (0..8).collect();
    let mut engine = SplineDrawEngine::new(&GeConfig::default());
    let mut backend = MockBackend::default();
    let mut uv = GUEST_UV;

    let mut cmd = command(raw, 4, 4);
    cmd.indices = ControlIndices::U16(&indices);
    let result = engine.submit_spline(&cmd, &mut FlatVertexNormalizer, &mut backend, &mut uv);

    assert!(matches!(
        result,
        Err(EmulatorError::ControlPointOutOfRange { index: 15, count: 8 })
    ));
    assert!(backend.submitted.is_empty());
}

#[test]
fn test_index_past_guest_data_is_rejected() {
    let points = raw_grid(4, 4);
    let raw: &[u8] = bytemuck::cast_slice(points.as_slice());
    let mut indices: Vec<u16> = (0..16).collect();
    indices[5] = 40;
    let mut engine = SplineDrawEngine::new(&GeConfig::default());
    let mut backend = MockBackend::default();
    let mut uv = GUEST_UV;

    let mut cmd = command(raw, 4, 4);
    cmd.indices = ControlIndices::U16(&indices);
    let result = engine.submit_spline(&cmd, &mut FlatVertexNormalizer, &mut backend, &mut uv);

    assert!(matches!(
        result,
        Err(EmulatorError::ControlPointOutOfRange { index: 40, count: 16 })
    ));
}

#[test]
fn test_scratch_budget_is_enforced() {
    let points = raw_grid(4, 4);
    let raw: &[u8] = bytemuck::cast_slice(points.as_slice());
    let config = GeConfig {
        scratch_bytes: 64,
        ..GeConfig::default()
    };
    let mut engine = SplineDrawEngine::new(&config);
    let mut backend = MockBackend::default();
    let mut uv = GUEST_UV;

    let result = engine.submit_spline(
        &command(raw, 4, 4),
        &mut FlatVertexNormalizer,
        &mut backend,
        &mut uv,
    );
    assert!(matches!(result, Err(EmulatorError::ScratchExhausted { .. })));
    assert_eq!(uv, GUEST_UV);
}

// ============================================================================
// Offloaded path
// ============================================================================

#[test]
fn test_spline_offload_sends_points_and_patch_count() {
    let points = raw_grid(7, 5);
    let raw: &[u8] = bytemuck::cast_slice(points.as_slice());
    let mut engine = SplineDrawEngine::new(&offload_config());
    let mut backend = MockBackend {
        hardware: true,
        ..MockBackend::default()
    };
    let mut uv = GUEST_UV;

    let stats = engine
        .submit_spline(&command(raw, 7, 5), &mut FlatVertexNormalizer, &mut backend, &mut uv)
        .unwrap();

    assert!(stats.hardware);
    assert_eq!(backend.tess_points.len(), 35);
    assert_eq!(backend.num_patches, Some(4 * 2));
    // One unit grid, instanced per patch
    assert_eq!(stats.vertices, 25);
    assert_eq!(engine.last_mesh().vertices[24].pos, [1.0, 1.0, 0.0]);
}

#[test]
fn test_bezier_offload_patch_count() {
    let points = raw_grid(7, 7);
    let raw: &[u8] = bytemuck::cast_slice(points.as_slice());
    let mut engine = SplineDrawEngine::new(&offload_config());
    let mut backend = MockBackend {
        hardware: true,
        ..MockBackend::default()
    };
    let mut uv = GUEST_UV;

    engine
        .submit_bezier(&command(raw, 7, 7), &mut FlatVertexNormalizer, &mut backend, &mut uv)
        .unwrap();

    assert_eq!(backend.num_patches, Some(4));
    assert_eq!(backend.tess_points.len(), 49);
}

#[test]
fn test_offload_needs_backend_support() {
    let points = raw_grid(4, 4);
    let raw: &[u8] = bytemuck::cast_slice(points.as_slice());
    let mut engine = SplineDrawEngine::new(&offload_config());
    let mut backend = MockBackend::default();
    let mut uv = GUEST_UV;

    let stats = engine
        .submit_spline(&command(raw, 4, 4), &mut FlatVertexNormalizer, &mut backend, &mut uv)
        .unwrap();

    assert!(!stats.hardware);
    assert!(backend.tess_points.is_empty());
    assert_eq!(backend.num_patches, None);
}

#[test]
fn test_software_rendering_disables_offload() {
    let points = raw_grid(4, 4);
    let raw: &[u8] = bytemuck::cast_slice(points.as_slice());
    let mut config = offload_config();
    config.software_rendering = true;
    let mut engine = SplineDrawEngine::new(&GeConfig::default());
    engine.apply_config(&config);
    let mut backend = MockBackend {
        hardware: true,
        ..MockBackend::default()
    };
    let mut uv = GUEST_UV;

    let stats = engine
        .submit_spline(&command(raw, 4, 4), &mut FlatVertexNormalizer, &mut backend, &mut uv)
        .unwrap();
    assert!(!stats.hardware);
}
