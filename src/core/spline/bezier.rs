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

//! Bezier patch evaluation
//!
//! A Bezier mesh of `count_u x count_v` control points holds
//! `((count_u - 1) / 3) x ((count_v - 1) / 3)` bicubic sub-patches that
//! share their edge rows. Each sub-patch gets its own
//! `(tess_u + 1) x (tess_v + 1)` vertex grid, laid out in row-major
//! sub-patch order.
//!
//! Per sub-patch, the four row curves are blended along U once per column
//! ([`PrecomputedCurves`]); every sample then only blends those four
//! results along V.

use std::ops::{Add, Mul};

use super::basis::{bernstein3d, bernstein3d_derivative};
use super::index::build_index;
use super::math::{Vec2f, Vec3f, Vec4f};
use super::{
    control_arrays_cover, fit_budget, BezierPatch, SimpleVertex, SplineQuality, TessOutput,
    VertexChannels, MAX_INDEXED_VERTICES,
};

/// Row curves of one sub-patch, sampled along U
struct PrecomputedCurves<T> {
    horiz: [Vec<T>; 4],
}

impl<T> PrecomputedCurves<T>
where
    T: Copy + Default + Add<Output = T> + Mul<f32, Output = T>,
{
    fn new(samples: usize) -> Self {
        Self {
            horiz: std::array::from_fn(|_| vec![T::default(); samples]),
        }
    }

    /// Store the blend of every row at column `i`
    fn fill(&mut self, i: usize, rows: &[[T; 4]; 4], u: f32, blend: fn(T, T, T, T, f32) -> T) {
        for (curve, row) in self.horiz.iter_mut().zip(rows) {
            curve[i] = blend(row[0], row[1], row[2], row[3], u);
        }
    }

    fn bernstein3d(&self, i: usize, v: f32) -> T {
        let [h1, h2, h3, h4] = &self.horiz;
        bernstein3d(h1[i], h2[i], h3[i], h4[i], v)
    }

    fn bernstein3d_derivative(&self, i: usize, v: f32) -> T {
        let [h1, h2, h3, h4] = &self.horiz;
        bernstein3d_derivative(h1[i], h2[i], h3[i], h4[i], v)
    }
}

/// Gather the 4x4 control points of a sub-patch as rows
fn gather<T: Copy>(src: &[T], count_u: usize, patch_u: usize, patch_v: usize) -> [[T; 4]; 4] {
    std::array::from_fn(|row| {
        std::array::from_fn(|col| src[(patch_u * 3 + col) + (patch_v * 3 + row) * count_u])
    })
}

fn quality_divisions(tess_u: usize, tess_v: usize, quality: SplineQuality) -> (usize, usize) {
    match quality {
        SplineQuality::Low => (2, 2),
        SplineQuality::Medium => ((tess_u / 2).max(1), (tess_v / 2).max(1)),
        SplineQuality::High => (tess_u, tess_v),
    }
}

/// Tessellate a Bezier mesh into a new mesh
///
/// # Arguments
///
/// * `patch` - Mesh topology and control points
/// * `tess_u` / `tess_v` - Requested subdivisions per sub-patch (0 means 1)
/// * `channels` - Channels present in the guest's vertex format
/// * `quality` - Density setting
/// * `max_vertices` - Output budget over all sub-patches
pub fn tessellate_bezier(
    patch: &BezierPatch,
    tess_u: usize,
    tess_v: usize,
    channels: VertexChannels,
    quality: SplineQuality,
    max_vertices: usize,
) -> TessOutput {
    let mut out = TessOutput::new();
    tessellate_bezier_into(patch, tess_u, tess_v, channels, quality, max_vertices, &mut out);
    out
}

/// Tessellate a Bezier mesh into a reused mesh buffer
pub fn tessellate_bezier_into(
    patch: &BezierPatch,
    tess_u: usize,
    tess_v: usize,
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

    let num_patches_u = (patch.count_u - 1) / 3;
    let num_patches_v = (patch.count_v - 1) / 3;
    let max_vertices = max_vertices.min(MAX_INDEXED_VERTICES);

    let (tess_u, tess_v) = quality_divisions(tess_u.max(1), tess_v.max(1), quality);
    let Some((tess_u, tess_v)) =
        fit_budget(tess_u, tess_v, num_patches_u * num_patches_v, max_vertices)
    else {
        return;
    };

    let sample_tex = channels.contains(VertexChannels::TEXCOORD);
    let sample_col = channels.contains(VertexChannels::COLOR);
    let compute_normals = patch.compute_normals;

    log::trace!(
        "Bezier {}x{} -> {}x{} patches of {}x{} quads",
        patch.count_u,
        patch.count_v,
        num_patches_u,
        num_patches_v,
        tess_u,
        tess_v
    );

    let samples = tess_u + 1;
    let mut prepos = PrecomputedCurves::<Vec3f>::new(samples);
    let mut precol = PrecomputedCurves::<Vec4f>::new(samples);
    let mut pretex = PrecomputedCurves::<Vec2f>::new(samples);
    let mut prederiv_u = PrecomputedCurves::<Vec3f>::new(samples);

    let inv_u = 1.0 / tess_u as f32;
    let inv_v = 1.0 / tess_v as f32;
    let third = 1.0f32 / 3.0;
    let grid = (tess_u + 1) * (tess_v + 1);

    out.vertices
        .reserve(grid * num_patches_u * num_patches_v);

    for patch_v in 0..num_patches_v {
        for patch_u in 0..num_patches_u {
            let pos = gather(patch.pos, patch.count_u, patch_u, patch_v);
            let col = gather(patch.col, patch.count_u, patch_u, patch_v);
            let tex = gather(patch.tex, patch.count_u, patch_u, patch_v);

            for i in 0..samples {
                let u = i as f32 * inv_u;
                prepos.fill(i, &pos, u, bernstein3d);
                if sample_col {
                    precol.fill(i, &col, u, bernstein3d);
                }
                if sample_tex {
                    pretex.fill(i, &tex, u, bernstein3d);
                }
                if compute_normals {
                    prederiv_u.fill(i, &pos, u, bernstein3d_derivative);
                }
            }

            for tile_v in 0..=tess_v {
                let v = tile_v as f32 * inv_v;
                for tile_u in 0..=tess_u {
                    let u = tile_u as f32 * inv_u;

                    let nrm = if compute_normals {
                        let deriv_u = prederiv_u.bernstein3d(tile_u, v);
                        let deriv_v = prepos.bernstein3d_derivative(tile_u, v);
                        let n = deriv_u.cross(deriv_v).normalized();
                        if patch.patch_facing {
                            -n
                        } else {
                            n
                        }
                    } else {
                        Vec3f::ZERO
                    };

                    let uv = if sample_tex {
                        pretex.bernstein3d(tile_u, v).to_array()
                    } else {
                        let offset = patch_u as f32 * third;
                        [u + offset, v + offset]
                    };

                    let color_32 = if sample_col {
                        precol.bernstein3d(tile_u, v).to_rgba()
                    } else {
                        patch.def_color
                    };

                    out.vertices.push(SimpleVertex {
                        uv,
                        color_32,
                        nrm: nrm.to_array(),
                        pos: prepos.bernstein3d(tile_u, v).to_array(),
                    });
                }
            }

            let patch_index = patch_v * num_patches_u + patch_u;
            build_index(
                &mut out.indices,
                tess_u,
                tess_v,
                patch.prim_type,
                patch_index * grid,
            );
        }
    }
}
