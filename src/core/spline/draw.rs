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

//! Patch primitive submission
//!
//! [`SplineDrawEngine`] turns one spline or Bezier draw command into a
//! single indexed draw on a [`DrawBackend`]:
//!
//! ```text
//! 1. flush pending geometry
//! 2. scan index bounds, normalize control points lower..=upper
//! 3. resolve the point table (indexed or identity)
//! 4. tessellate on the CPU, or send the points to the backend and emit
//!    a unit grid instanced per patch
//! 5. submit with identity UV scale if the guest format had texcoords
//!    (they were already scaled during normalization), then restore it
//! ```
//!
//! All transient storage is accounted against a [`ScratchArena`]; the
//! buffers themselves are kept between calls.

use bytemuck::Zeroable;

use super::arena::ScratchArena;
use super::bezier::tessellate_bezier_into;
use super::bspline::tessellate_spline_into;
use super::hardware::{build_parametric_grid, GridKind};
use super::math::{Vec2f, Vec3f, Vec4f};
use super::{
    BezierPatch, KnotEdges, PatchPrimType, PrimType, SimpleVertex, SplinePatch, SplineQuality,
    TessOutput, VertexType,
};
use crate::core::config::GeConfig;
use crate::core::error::{EmulatorError, Result};
use crate::core::ge::state::UvScale;

/// Control-point index list of a draw command
#[derive(Debug, Clone, Copy, Default)]
pub enum ControlIndices<'a> {
    #[default]
    None,
    U8(&'a [u8]),
    U16(&'a [u16]),
}

impl ControlIndices<'_> {
    fn len(&self) -> usize {
        match self {
            ControlIndices::None => 0,
            ControlIndices::U8(indices) => indices.len(),
            ControlIndices::U16(indices) => indices.len(),
        }
    }

    fn get(&self, i: usize) -> Option<usize> {
        match self {
            ControlIndices::None => Some(i),
            ControlIndices::U8(indices) => indices.get(i).map(|&idx| idx as usize),
            ControlIndices::U16(indices) => indices.get(i).map(|&idx| idx as usize),
        }
    }

    /// Lowest and highest index among the first `count` entries
    fn bounds(&self, count: usize) -> Result<(usize, usize)> {
        if matches!(self, ControlIndices::None) {
            return Ok((0, count - 1));
        }
        if self.len() < count {
            return Err(EmulatorError::ControlPointOutOfRange {
                index: count - 1,
                count: self.len(),
            });
        }

        let mut lower = usize::MAX;
        let mut upper = 0;
        for idx in (0..count).filter_map(|i| self.get(i)) {
            lower = lower.min(idx);
            upper = upper.max(idx);
        }
        Ok((lower, upper))
    }
}

/// One spline or Bezier draw command as decoded from the command stream
#[derive(Debug, Clone, Copy)]
pub struct PatchCommand<'a> {
    /// Raw guest vertex data
    pub control_points: &'a [u8],
    pub indices: ControlIndices<'a>,
    pub tess_u: usize,
    pub tess_v: usize,
    pub count_u: usize,
    pub count_v: usize,
    /// Knot edges (splines only)
    pub type_u: KnotEdges,
    pub type_v: KnotEdges,
    pub prim_type: PatchPrimType,
    pub compute_normals: bool,
    pub patch_facing: bool,
    /// Guest vertex format of `control_points`
    pub vertex_type: VertexType,
}

/// Decodes raw guest vertices into [`SimpleVertex`] records
pub trait VertexNormalizer {
    /// Decode vertices `lower..=upper` of `raw`
    ///
    /// `out` is resized to `upper + 1` entries, indexed by the guest's
    /// vertex index.
    ///
    /// # Returns
    ///
    /// The vertex format of the decoded records
    fn normalize(
        &mut self,
        raw: &[u8],
        lower: usize,
        upper: usize,
        vertex_type: VertexType,
        out: &mut Vec<SimpleVertex>,
    ) -> Result<VertexType>;
}

/// Normalizer for guest data already laid out as [`SimpleVertex`]
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatVertexNormalizer;

impl VertexNormalizer for FlatVertexNormalizer {
    fn normalize(
        &mut self,
        raw: &[u8],
        lower: usize,
        upper: usize,
        _vertex_type: VertexType,
        out: &mut Vec<SimpleVertex>,
    ) -> Result<VertexType> {
        const STRIDE: usize = std::mem::size_of::<SimpleVertex>();

        let available = raw.len() / STRIDE;
        if upper >= available {
            return Err(EmulatorError::ControlPointOutOfRange {
                index: upper,
                count: available,
            });
        }

        out.clear();
        out.resize(upper + 1, SimpleVertex::zeroed());
        for (i, vert) in out.iter_mut().enumerate().skip(lower) {
            *vert = bytemuck::pod_read_unaligned(&raw[i * STRIDE..(i + 1) * STRIDE]);
        }
        Ok(VertexType::SIMPLE)
    }
}

/// Rasterizer side of patch submission
pub trait DrawBackend {
    /// Draw everything queued so far
    fn flush(&mut self);

    /// Whether the backend transforms this primitive itself
    fn can_use_hardware_transform(&self, prim: PrimType) -> bool;

    /// Upload control points for backend-side evaluation
    fn send_tess_data(&mut self, points: &[SimpleVertex], vertex_type: VertexType);

    /// Instance count for the next backend-evaluated grid
    fn set_num_patches(&mut self, count: u32);

    /// Queue an indexed draw
    fn submit_prim(
        &mut self,
        vertices: &[SimpleVertex],
        indices: &[u16],
        prim: PrimType,
        vertex_type: VertexType,
        uv: &UvScale,
    );
}

/// What one submission produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmitStats {
    /// Guest bytes consumed from the vertex stream
    pub bytes_read: usize,
    pub vertices: usize,
    pub indices: usize,
    /// Geometry is evaluated by the backend
    pub hardware: bool,
}

/// Which evaluator a command goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PatchKind {
    Spline,
    Bezier,
}

/// Control points of one command after normalization
struct Prepared {
    bytes_read: usize,
    vertex_type: VertexType,
    def_color: u32,
}

/// Spline/Bezier submission state
pub struct SplineDrawEngine {
    quality: SplineQuality,
    offload: bool,
    max_vertices: usize,
    arena: ScratchArena,
    decoded: Vec<SimpleVertex>,
    points: Vec<SimpleVertex>,
    pos: Vec<Vec3f>,
    tex: Vec<Vec2f>,
    col: Vec<Vec4f>,
    mesh: TessOutput,
}

impl SplineDrawEngine {
    pub fn new(config: &GeConfig) -> Self {
        Self {
            quality: config.spline_quality,
            offload: config.can_offload_tessellation(),
            max_vertices: config.spline_buffer_vertices,
            arena: ScratchArena::new(config.scratch_bytes),
            decoded: Vec::new(),
            points: Vec::new(),
            pos: Vec::new(),
            tex: Vec::new(),
            col: Vec::new(),
            mesh: TessOutput::new(),
        }
    }

    /// Pick up changed settings
    pub fn apply_config(&mut self, config: &GeConfig) {
        self.quality = config.spline_quality;
        self.offload = config.can_offload_tessellation();
        self.max_vertices = config.spline_buffer_vertices;
        if self.arena.capacity() != config.scratch_bytes {
            self.arena = ScratchArena::new(config.scratch_bytes);
        }
    }

    /// Mesh produced by the last submission
    pub fn last_mesh(&self) -> &TessOutput {
        &self.mesh
    }

    /// Tessellate and draw a spline patch
    ///
    /// # Arguments
    ///
    /// * `cmd` - Decoded draw command
    /// * `normalizer` - Vertex decoder for the guest format
    /// * `backend` - Rasterizer receiving the mesh
    /// * `uv` - Live UV scale registers, restored before returning
    ///
    /// # Returns
    ///
    /// Submission statistics; all zero when either count is below 4
    pub fn submit_spline(
        &mut self,
        cmd: &PatchCommand,
        normalizer: &mut impl VertexNormalizer,
        backend: &mut impl DrawBackend,
        uv: &mut UvScale,
    ) -> Result<SubmitStats> {
        self.submit(PatchKind::Spline, cmd, normalizer, backend, uv)
    }

    /// Tessellate and draw a Bezier mesh
    pub fn submit_bezier(
        &mut self,
        cmd: &PatchCommand,
        normalizer: &mut impl VertexNormalizer,
        backend: &mut impl DrawBackend,
        uv: &mut UvScale,
    ) -> Result<SubmitStats> {
        self.submit(PatchKind::Bezier, cmd, normalizer, backend, uv)
    }

    fn submit(
        &mut self,
        kind: PatchKind,
        cmd: &PatchCommand,
        normalizer: &mut impl VertexNormalizer,
        backend: &mut impl DrawBackend,
        uv: &mut UvScale,
    ) -> Result<SubmitStats> {
        backend.flush();

        if cmd.count_u < 4 || cmd.count_v < 4 {
            log::trace!(
                "{:?} with {}x{} control points draws nothing",
                kind,
                cmd.count_u,
                cmd.count_v
            );
            return Ok(SubmitStats::default());
        }

        let prepared = self.prepare(cmd, normalizer)?;
        let prim = cmd.prim_type.prim();
        let hardware = self.offload && backend.can_use_hardware_transform(prim);
        let orig = cmd.vertex_type;

        if hardware {
            backend.send_tess_data(&self.points, orig);
            let (grid, patches) = match kind {
                PatchKind::Spline => (
                    GridKind::Spline,
                    (cmd.count_u - 3) * (cmd.count_v - 3),
                ),
                PatchKind::Bezier => (
                    GridKind::Bezier,
                    ((cmd.count_u - 1) / 3) * ((cmd.count_v - 1) / 3),
                ),
            };
            build_parametric_grid(
                grid,
                cmd.tess_u,
                cmd.tess_v,
                cmd.prim_type,
                self.max_vertices,
                &mut self.mesh,
            );
            backend.set_num_patches(patches as u32);
        } else {
            self.tessellate(kind, cmd, prepared.def_color)?;
        }

        let stats = SubmitStats {
            bytes_read: prepared.bytes_read,
            vertices: self.mesh.vertices.len(),
            indices: self.mesh.indices.len(),
            hardware,
        };

        if self.mesh.indices.is_empty() {
            return Ok(stats);
        }

        let saved_uv = orig.has_texcoord().then(|| std::mem::replace(uv, UvScale::IDENTITY));

        backend.submit_prim(
            &self.mesh.vertices,
            &self.mesh.indices,
            prim,
            prepared.vertex_type.with_index16(),
            uv,
        );
        backend.flush();

        if let Some(prev) = saved_uv {
            *uv = prev;
        }

        Ok(stats)
    }

    /// Normalize the command's control points into the point table
    fn prepare(
        &mut self,
        cmd: &PatchCommand,
        normalizer: &mut impl VertexNormalizer,
    ) -> Result<Prepared> {
        let count = cmd.count_u * cmd.count_v;
        let (lower, upper) = cmd.indices.bounds(count)?;
        let bytes_read = count * cmd.vertex_type.vertex_size();

        self.arena.reset();
        self.arena.allocate::<SimpleVertex>(upper + 1)?;
        self.arena.allocate::<SimpleVertex>(count)?;
        self.arena.allocate::<usize>(count)?;

        let vertex_type =
            normalizer.normalize(cmd.control_points, lower, upper, cmd.vertex_type, &mut self.decoded)?;
        if vertex_type.vertex_size() != std::mem::size_of::<SimpleVertex>() {
            log::error!(
                "Normalized vertex size {} does not match {}",
                vertex_type.vertex_size(),
                std::mem::size_of::<SimpleVertex>()
            );
        }

        self.points.clear();
        for i in 0..count {
            let src = cmd.indices.get(i).unwrap_or(i);
            let point = self
                .decoded
                .get(src)
                .copied()
                .ok_or_else(|| EmulatorError::ControlPointOutOfRange {
                    index: src,
                    count: self.decoded.len(),
                })?;
            self.points.push(point);
        }

        let def_color = self.points.first().map_or(0, |p| p.color_32);

        Ok(Prepared {
            bytes_read,
            vertex_type,
            def_color,
        })
    }

    /// CPU evaluation of the point table
    fn tessellate(&mut self, kind: PatchKind, cmd: &PatchCommand, def_color: u32) -> Result<()> {
        let count = self.points.len();
        self.arena.allocate::<Vec3f>(count)?;
        self.arena.allocate::<Vec2f>(count)?;
        self.arena.allocate::<Vec4f>(count)?;

        self.pos.clear();
        self.tex.clear();
        self.col.clear();
        for p in &self.points {
            self.pos.push(p.position());
            self.tex.push(p.texcoord());
            self.col.push(p.color());
        }

        let channels = cmd.vertex_type.channels();
        match kind {
            PatchKind::Spline => {
                let patch = SplinePatch {
                    tess_u: cmd.tess_u,
                    tess_v: cmd.tess_v,
                    count_u: cmd.count_u,
                    count_v: cmd.count_v,
                    type_u: cmd.type_u,
                    type_v: cmd.type_v,
                    prim_type: cmd.prim_type,
                    compute_normals: cmd.compute_normals,
                    patch_facing: cmd.patch_facing,
                    def_color,
                    pos: &self.pos,
                    tex: &self.tex,
                    col: &self.col,
                };
                tessellate_spline_into(
                    &patch,
                    channels,
                    self.quality,
                    self.max_vertices,
                    &mut self.mesh,
                );
            }
            PatchKind::Bezier => {
                let patch = BezierPatch {
                    count_u: cmd.count_u,
                    count_v: cmd.count_v,
                    prim_type: cmd.prim_type,
                    compute_normals: cmd.compute_normals,
                    patch_facing: cmd.patch_facing,
                    def_color,
                    pos: &self.pos,
                    tex: &self.tex,
                    col: &self.col,
                };
                tessellate_bezier_into(
                    &patch,
                    cmd.tess_u,
                    cmd.tess_v,
                    channels,
                    self.quality,
                    self.max_vertices,
                    &mut self.mesh,
                );
            }
        }
        Ok(())
    }
}
