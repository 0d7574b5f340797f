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

//! Curved-surface tessellation
//!
//! Expands spline and Bezier patch primitives into indexed triangle or
//! line meshes.
//!
//! ## Pipeline
//!
//! ```text
//! raw control points ─▶ VertexNormalizer ─▶ SimpleVertex[] ─┬─▶ full-quality evaluation ─┐
//!                                                           └─▶ hardware grid + tess data ┤
//!                                                                                         ▼
//!                                                              DrawBackend::submit_prim(vertices, u16 indices)
//! ```
//!
//! ## Modules
//!
//! - [`math`]: small vector types used by the evaluators
//! - [`basis`]: B-spline knot vectors and basis weights, Bernstein blends
//! - [`index`]: quad index topology shared by every path
//! - [`bspline`]: spline patch evaluation
//! - [`bezier`]: Bezier patch evaluation
//! - [`hardware`]: parametric grids for offloaded evaluation
//! - [`arena`]: per-call scratch budget
//! - [`draw`]: submission of patch primitives to a rasterizer backend
//!
//! ## Output budget
//!
//! No path ever produces more vertices than the caller's budget (and never
//! more than a 16-bit index can address). Density is halved until the mesh
//! fits; if even the coarsest mesh does not fit, nothing is produced.

pub mod arena;
pub mod basis;
pub mod bezier;
pub mod bspline;
pub mod draw;
pub mod hardware;
pub mod index;
pub mod math;

#[cfg(test)]
mod tests;

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use math::{Vec2f, Vec3f, Vec4f};

pub use arena::ScratchArena;
pub use bezier::tessellate_bezier;
pub use bspline::tessellate_spline;
pub use draw::{
    ControlIndices, DrawBackend, FlatVertexNormalizer, PatchCommand, SplineDrawEngine,
    SubmitStats, VertexNormalizer,
};

/// Largest vertex count addressable by 16-bit indices
pub const MAX_INDEXED_VERTICES: usize = 1 << 16;

/// Tessellation density
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplineQuality {
    /// Fixed coarse density
    Low,
    /// Half the requested density
    Medium,
    /// Requested density
    #[default]
    High,
}

impl FromStr for SplineQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "0" => Ok(SplineQuality::Low),
            "medium" | "1" => Ok(SplineQuality::Medium),
            "high" | "2" => Ok(SplineQuality::High),
            other => Err(format!("unknown spline quality '{}'", other)),
        }
    }
}

impl fmt::Display for SplineQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SplineQuality::Low => "low",
            SplineQuality::Medium => "medium",
            SplineQuality::High => "high",
        };
        f.write_str(name)
    }
}

/// Primitive kind requested by a patch command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PatchPrimType {
    #[default]
    Triangles,
    Lines,
    Points,
    Unknown,
}

impl PatchPrimType {
    /// Decode the 2-bit patch primitive field
    pub fn from_raw(raw: u32) -> Self {
        match raw & 3 {
            0 => PatchPrimType::Triangles,
            1 => PatchPrimType::Lines,
            2 => PatchPrimType::Points,
            _ => PatchPrimType::Unknown,
        }
    }

    /// Rasterizer primitive used to draw the tessellated mesh
    pub fn prim(self) -> PrimType {
        match self {
            PatchPrimType::Triangles => PrimType::Triangles,
            PatchPrimType::Lines => PrimType::Lines,
            PatchPrimType::Points | PatchPrimType::Unknown => PrimType::Points,
        }
    }
}

/// Rasterizer primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimType {
    Points,
    Lines,
    Triangles,
}

bitflags! {
    /// Which ends of a spline's knot vector are open (clamped)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct KnotEdges: u32 {
        const OPEN_START = 1 << 0;
        const OPEN_END = 1 << 1;
    }
}

bitflags! {
    /// Channels present in the guest's original vertex format
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct VertexChannels: u8 {
        const TEXCOORD = 1 << 0;
        const COLOR = 1 << 1;
        const NORMAL = 1 << 2;
    }
}

/// GE vertex type word
///
/// ```text
/// Bits   | Field
/// -------|-----------------------------------------
/// 0-1    | texcoord (none, u8, u16, f32)
/// 2-4    | color (none, -, -, -, 565, 5551, 4444, 8888)
/// 5-6    | normal (none, s8, s16, f32)
/// 7-8    | position (-, s8, s16, f32)
/// 9-10   | weights (none, u8, u16, f32)
/// 11-12  | index (none, u8, u16)
/// 14-16  | weight count - 1
/// 18-20  | morph count - 1
/// 23     | through mode
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VertexType(pub u32);

impl VertexType {
    pub const TC_MASK: u32 = 3;
    pub const COL_MASK: u32 = 7 << 2;
    pub const NRM_MASK: u32 = 3 << 5;
    pub const POS_MASK: u32 = 3 << 7;
    pub const WEIGHT_MASK: u32 = 3 << 9;
    pub const IDX_MASK: u32 = 3 << 11;
    pub const IDX_8BIT: u32 = 1 << 11;
    pub const IDX_16BIT: u32 = 2 << 11;

    /// Layout of [`SimpleVertex`]: f32 texcoord, 8888 color, f32 normal and position
    pub const SIMPLE: VertexType = VertexType(3 | (7 << 2) | (3 << 5) | (3 << 7));

    /// Channels that drive tessellation
    pub fn channels(self) -> VertexChannels {
        let mut channels = VertexChannels::empty();
        if self.0 & Self::TC_MASK != 0 {
            channels |= VertexChannels::TEXCOORD;
        }
        if self.0 & Self::COL_MASK != 0 {
            channels |= VertexChannels::COLOR;
        }
        if self.0 & Self::NRM_MASK != 0 {
            channels |= VertexChannels::NORMAL;
        }
        channels
    }

    pub fn has_texcoord(self) -> bool {
        self.0 & Self::TC_MASK != 0
    }

    /// Index field (0 none, 1 u8, 2 u16)
    pub fn index_format(self) -> u32 {
        (self.0 & Self::IDX_MASK) >> 11
    }

    /// Same format with 16-bit indices
    pub fn with_index16(self) -> Self {
        VertexType((self.0 & !Self::IDX_MASK) | Self::IDX_16BIT)
    }

    /// Size in bytes of one vertex in guest memory
    ///
    /// Each component is aligned to its own element size and the whole
    /// vertex to the largest alignment; morph targets repeat the vertex.
    pub fn vertex_size(self) -> usize {
        let raw = self.0;
        let mut size = 0usize;
        let mut biggest = 1usize;

        let mut component = |count: usize, elem: usize| {
            size = size.next_multiple_of(elem) + count * elem;
            biggest = biggest.max(elem);
        };

        let weight_count = (((raw >> 14) & 7) + 1) as usize;
        match (raw >> 9) & 3 {
            1 => component(weight_count, 1),
            2 => component(weight_count, 2),
            3 => component(weight_count, 4),
            _ => {}
        }
        match raw & 3 {
            1 => component(2, 1),
            2 => component(2, 2),
            3 => component(2, 4),
            _ => {}
        }
        match (raw >> 2) & 7 {
            4..=6 => component(1, 2),
            7 => component(1, 4),
            _ => {}
        }
        match (raw >> 5) & 3 {
            1 => component(3, 1),
            2 => component(3, 2),
            3 => component(3, 4),
            _ => {}
        }
        match (raw >> 7) & 3 {
            1 => component(3, 1),
            2 => component(3, 2),
            _ => component(3, 4),
        }

        let morph_count = (((raw >> 18) & 7) + 1) as usize;
        size.next_multiple_of(biggest) * morph_count
    }
}

/// Normalized control point / output vertex
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct SimpleVertex {
    pub uv: [f32; 2],
    pub color_32: u32,
    pub nrm: [f32; 3],
    pub pos: [f32; 3],
}

impl SimpleVertex {
    pub fn position(&self) -> Vec3f {
        Vec3f::from(self.pos)
    }

    pub fn texcoord(&self) -> Vec2f {
        Vec2f::from(self.uv)
    }

    pub fn color(&self) -> Vec4f {
        Vec4f::from_rgba(self.color_32)
    }

    pub fn normal(&self) -> Vec3f {
        Vec3f::from(self.nrm)
    }
}

/// Tessellated mesh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TessOutput {
    pub vertices: Vec<SimpleVertex>,
    pub indices: Vec<u16>,
}

impl TessOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty the mesh, keeping its allocations
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.indices.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.indices.is_empty()
    }
}

/// One spline patch
///
/// Control points are row-major: point `(u, v)` lives at `v * count_u + u`.
#[derive(Debug, Clone, Copy)]
pub struct SplinePatch<'a> {
    pub tess_u: usize,
    pub tess_v: usize,
    pub count_u: usize,
    pub count_v: usize,
    pub type_u: KnotEdges,
    pub type_v: KnotEdges,
    pub prim_type: PatchPrimType,
    /// Ignored by the CPU evaluator: spline normals follow
    /// [`VertexChannels::NORMAL`] of the guest format
    pub compute_normals: bool,
    pub patch_facing: bool,
    /// Color used when the format has no color channel
    pub def_color: u32,
    pub pos: &'a [Vec3f],
    pub tex: &'a [Vec2f],
    pub col: &'a [Vec4f],
}

/// One Bezier patch mesh (possibly several 4x4 sub-patches)
#[derive(Debug, Clone, Copy)]
pub struct BezierPatch<'a> {
    pub count_u: usize,
    pub count_v: usize,
    pub prim_type: PatchPrimType,
    pub compute_normals: bool,
    pub patch_facing: bool,
    pub def_color: u32,
    pub pos: &'a [Vec3f],
    pub tex: &'a [Vec2f],
    pub col: &'a [Vec4f],
}

/// Check that every control-point array covers the grid
pub(crate) fn control_arrays_cover(
    count_u: usize,
    count_v: usize,
    pos: &[Vec3f],
    tex: &[Vec2f],
    col: &[Vec4f],
) -> bool {
    let needed = count_u * count_v;
    if pos.len() < needed || tex.len() < needed || col.len() < needed {
        log::warn!(
            "Patch {}x{} needs {} control points (pos={}, tex={}, col={})",
            count_u,
            count_v,
            needed,
            pos.len(),
            tex.len(),
            col.len()
        );
        return false;
    }
    true
}

/// Halve a subdivision pair until `patches` grids of it fit the budget
///
/// # Returns
///
/// The fitted `(div_u, div_v)`, both at least 1, or `None` when even a
/// single quad per patch does not fit
pub(crate) fn fit_budget(
    div_u: usize,
    div_v: usize,
    patches: usize,
    max_vertices: usize,
) -> Option<(usize, usize)> {
    let vertices = |u: usize, v: usize| {
        u.max(1)
            .saturating_add(1)
            .saturating_mul(v.max(1).saturating_add(1))
            .saturating_mul(patches)
    };

    let (mut u, mut v) = (div_u, div_v);
    while vertices(u, v) > max_vertices && (u > 1 || v > 1) {
        u /= 2;
        v /= 2;
    }
    u = u.max(1);
    v = v.max(1);

    if vertices(u, v) > max_vertices {
        log::warn!(
            "Patch budget of {} vertices too small for {} patch(es), drawing nothing",
            max_vertices,
            patches
        );
        return None;
    }

    if (u, v) != (div_u, div_v) {
        log::debug!(
            "Tessellation {}x{} reduced to {}x{} to fit {} vertices",
            div_u,
            div_v,
            u,
            v,
            max_vertices
        );
    }
    Some((u, v))
}
