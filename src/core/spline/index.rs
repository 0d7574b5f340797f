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

//! Quad index topology
//!
//! Every tessellation path emits a `(num_u + 1) x (num_v + 1)` vertex grid
//! and connects it with the same per-quad pattern:
//!
//! ```text
//! idx0 ── idx1        triangles: idx0 idx2 idx1 / idx1 idx2 idx3
//!  │       │          lines:     idx0 idx2 / idx1 idx3 / idx1 idx2
//! idx2 ── idx3
//! ```

use super::PatchPrimType;

/// Append the indices of one 4-corner quad
pub fn copy_quad_index(
    out: &mut Vec<u16>,
    prim: PatchPrimType,
    idx0: u16,
    idx1: u16,
    idx2: u16,
    idx3: u16,
) {
    match prim {
        PatchPrimType::Lines => out.extend_from_slice(&[idx0, idx2, idx1, idx3, idx1, idx2]),
        _ => out.extend_from_slice(&[idx0, idx2, idx1, idx1, idx2, idx3]),
    }
}

/// Append the indices of a `num_u x num_v` quad grid
///
/// # Arguments
///
/// * `out` - Index buffer to append to
/// * `num_u` - Quads per row
/// * `num_v` - Quad rows
/// * `prim` - Primitive the indices are for
/// * `total` - Index of the grid's first vertex
///
/// # Example
///
/// ```
/// use psge::core::spline::index::build_index;
/// use psge::core::spline::PatchPrimType;
///
/// let mut indices = Vec::new();
/// build_index(&mut indices, 1, 1, PatchPrimType::Triangles, 0);
/// assert_eq!(indices, vec![0, 2, 1, 1, 2, 3]);
/// ```
pub fn build_index(
    out: &mut Vec<u16>,
    num_u: usize,
    num_v: usize,
    prim: PatchPrimType,
    total: usize,
) {
    out.reserve(num_u * num_v * 6);
    for v in 0..num_v {
        for u in 0..num_u {
            let idx0 = (v * (num_u + 1) + u + total) as u16;
            let idx2 = ((v + 1) * (num_u + 1) + u + total) as u16;
            copy_quad_index(out, prim, idx0, idx0 + 1, idx2, idx2 + 1);
        }
    }
}
