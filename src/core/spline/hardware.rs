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

//! Parametric grids for offloaded tessellation
//!
//! When the backend evaluates patches itself, only one unit grid is sent,
//! instanced once per patch. Each vertex carries its `(u, v)` in `[0, 1]`
//! as position; spline grids also carry the grid step in the normal so the
//! evaluator can take finite differences. Bezier grids leave the normal
//! zero: the Bezier evaluator derives its tangents analytically and never
//! reads a step.

use super::index::build_index;
use super::{fit_budget, PatchPrimType, SimpleVertex, TessOutput, MAX_INDEXED_VERTICES};

/// Which evaluator the grid is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridKind {
    Spline,
    Bezier,
}

/// Build the unit grid of one patch
///
/// # Arguments
///
/// * `kind` - Evaluator the grid feeds
/// * `tess_u` / `tess_v` - Requested subdivisions (0 means 1)
/// * `prim` - Primitive of the index buffer
/// * `max_vertices` - Output budget
/// * `out` - Mesh buffer, cleared first
///
/// # Returns
///
/// The subdivisions actually used, or `None` if nothing fits
pub fn build_parametric_grid(
    kind: GridKind,
    tess_u: usize,
    tess_v: usize,
    prim: PatchPrimType,
    max_vertices: usize,
    out: &mut TessOutput,
) -> Option<(usize, usize)> {
    out.clear();

    let max_vertices = max_vertices.min(MAX_INDEXED_VERTICES);
    let (tess_u, tess_v) = fit_budget(tess_u.max(1), tess_v.max(1), 1, max_vertices)?;

    let inv_u = 1.0 / tess_u as f32;
    let inv_v = 1.0 / tess_v as f32;
    let step = match kind {
        GridKind::Spline => [inv_u, inv_v, 0.0],
        GridKind::Bezier => [0.0; 3],
    };

    out.vertices.reserve((tess_u + 1) * (tess_v + 1));
    for tile_v in 0..=tess_v {
        for tile_u in 0..=tess_u {
            out.vertices.push(SimpleVertex {
                pos: [tile_u as f32 * inv_u, tile_v as f32 * inv_v, 0.0],
                nrm: step,
                ..SimpleVertex::default()
            });
        }
    }

    build_index(&mut out.indices, tess_u, tess_v, prim, 0);
    Some((tess_u, tess_v))
}
