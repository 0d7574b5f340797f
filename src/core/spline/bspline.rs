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

//! Spline patch evaluation
//!
//! A spline patch of `count_u x count_v` control points is one continuous
//! surface of `(count_u - 3) x (count_v - 3)` segments. The whole surface
//! is sampled on a single grid:
//!
//! ```text
//! div_s = (count_u - 3) * tess_u      (scaled by quality)
//! div_t = (count_v - 3) * tess_v
//! vertices = (div_s + 1) * (div_t + 1)
//! ```
//!
//! Each sample blends the 4x4 control points of the segment it falls in.
//! Channels the guest format lacks are not accumulated: texcoords become
//! the sample's parameter, color becomes the patch default and normals
//! become +Z.

use super::basis::{build_knot_vector, spline_basis, KnotDiv};
use super::index::build_index;
use super::math::{Vec2f, Vec3f, Vec4f};
use super::{
    control_arrays_cover, fit_budget, SimpleVertex, SplinePatch, SplineQuality, TessOutput,
    VertexChannels, MAX_INDEXED_VERTICES,
};

/// Knot vectors for both axes of a patch
struct SplineKnots {
    knots_u: Vec<f32>,
    knots_v: Vec<f32>,
    divs_u: Vec<KnotDiv>,
    divs_v: Vec<KnotDiv>,
}

impl SplineKnots {
    fn new(patch: &SplinePatch) -> Self {
        let mut knots = SplineKnots {
            knots_u: Vec::with_capacity(patch.count_u),
            knots_v: Vec::with_capacity(patch.count_v),
            divs_u: Vec::with_capacity(patch.count_u),
            divs_v: Vec::with_capacity(patch.count_v),
        };
        build_knot_vector(
            patch.count_u - 3,
            patch.type_u,
            &mut knots.knots_u,
            &mut knots.divs_u,
        );
        build_knot_vector(
            patch.count_v - 3,
            patch.type_v,
            &mut knots.knots_v,
            &mut knots.divs_v,
        );
        knots
    }
}

/// Subdivision counts before the budget is applied
fn quality_divisions(patch: &SplinePatch, quality: SplineQuality) -> (usize, usize) {
    let segs_u = patch.count_u - 3;
    let segs_v = patch.count_v - 3;

    match quality {
        SplineQuality::Low => (segs_u * 2, segs_v * 2),
        SplineQuality::Medium => {
            let halve = |d: usize| if d > 2 { d / 2 } else { d };
            (
                halve(segs_u.saturating_mul(patch.tess_u)),
                halve(segs_v.saturating_mul(patch.tess_v)),
            )
        }
        SplineQuality::High => (
            segs_u.saturating_mul(patch.tess_u),
            segs_v.saturating_mul(patch.tess_v),
        ),
    }
}

/// Tessellate a spline patch into a new mesh
///
/// # Arguments
///
/// * `patch` - Patch topology and control points
/// * `channels` - Channels present in the guest's vertex format
/// * `quality` - Density setting
/// * `max_vertices` - Output budget (capped at [`MAX_INDEXED_VERTICES`])
///
/// # Returns
///
/// The mesh, empty when either count is below 4
pub fn tessellate_spline(
    patch: &SplinePatch,
    channels: VertexChannels,
    quality: SplineQuality,
    max_vertices: usize,
) -> TessOutput {
    let mut out = TessOutput::new();
    tessellate_spline_into(patch, channels, quality, max_vertices, &mut out);
    out
}

/// Tessellate a spline patch into a reused mesh buffer
pub fn tessellate_spline_into(
    patch: &SplinePatch,
    channels: VertexChannels,
    quality: SplineQuality,
    max_vertices: usize,
    out: &mut TessOutput,
) {
    out.clear();

    if patch.count_u < 4 || patch.count_v < 4 {
        return;
    }
    if !control_arrays_cover(patch.count_u, patch.count_v, patch.pos, patch.tex, patch.col) {
        return;
    }

    let max_vertices = max_vertices.min(MAX_INDEXED_VERTICES);
    let (div_s, div_t) = quality_divisions(patch, quality);
    let Some((div_s, div_t)) = fit_budget(div_s, div_t, 1, max_vertices) else {
        return;
    };

    let knots = SplineKnots::new(patch);
    let segs_u = patch.count_u - 3;
    let segs_v = patch.count_v - 3;
    let width = segs_u as f32;
    let height = segs_v as f32;
    let inv_s = 1.0 / div_s as f32;
    let inv_t = 1.0 / div_t as f32;

    let sample_tex = channels.contains(VertexChannels::TEXCOORD);
    let sample_col = channels.contains(VertexChannels::COLOR);
    let sample_nrm = channels.contains(VertexChannels::NORMAL);

    log::trace!(
        "Spline {}x{} -> {}x{} quads (channels {:?})",
        patch.count_u,
        patch.count_v,
        div_s,
        div_t,
        channels
    );

    out.vertices.reserve((div_s + 1) * (div_t + 1));

    for tile_v in 0..=div_t {
        let v = (tile_v as f32 * height * inv_t).max(0.0);
        let iv = (v as usize).min(segs_v - 1);
        let basis_v = spline_basis(iv, v, &knots.knots_v, &knots.divs_v[iv]);
        let patch_h = (patch.count_v - iv).min(4);

        for tile_u in 0..=div_s {
            let u = (tile_u as f32 * width * inv_s).max(0.0);
            let iu = (u as usize).min(segs_u - 1);
            let basis_u = spline_basis(iu, u, &knots.knots_u, &knots.divs_u[iu]);
            let patch_w = (patch.count_u - iu).min(4);

            let mut pos = Vec3f::ZERO;
            let mut tex = Vec2f::default();
            let mut col = Vec4f::default();
            let mut du = Vec3f::ZERO;
            let mut dv = Vec3f::ZERO;

            for jj in 0..patch_h {
                for ii in 0..patch_w {
                    let f = basis_u.weights[ii] * basis_v.weights[jj];
                    if f <= 0.0 {
                        continue;
                    }

                    let idx = patch.count_u * (iv + jj) + (iu + ii);
                    let p = patch.pos[idx];
                    pos += p * f;
                    if sample_tex {
                        tex += patch.tex[idx] * f;
                    }
                    if sample_col {
                        col += patch.col[idx] * f;
                    }
                    if sample_nrm {
                        du += p * (basis_u.derivs[ii] * basis_v.weights[jj]);
                        dv += p * (basis_u.weights[ii] * basis_v.derivs[jj]);
                    }
                }
            }

            let uv = if sample_tex {
                tex.to_array()
            } else {
                [width * (tile_u as f32 * inv_s), height * (tile_v as f32 * inv_t)]
            };
            let color_32 = if sample_col {
                col.to_rgba()
            } else {
                patch.def_color
            };
            let nrm = if sample_nrm {
                du.cross(dv).normalized()
            } else {
                Vec3f::UNIT_Z
            };

            out.vertices.push(SimpleVertex {
                uv,
                color_32,
                nrm: nrm.to_array(),
                pos: pos.to_array(),
            });
        }
    }

    build_index(&mut out.indices, div_s, div_t, patch.prim_type, 0);
}
