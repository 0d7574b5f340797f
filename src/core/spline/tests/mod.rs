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

//! Tessellation and submission tests

mod draw;

use super::math::{Vec2f, Vec3f, Vec4f};
use super::SimpleVertex;

/// Control points on the z = 0 plane, point `(u, v)` at `(u, v, 0)`
pub(super) struct Grid {
    pub pos: Vec<Vec3f>,
    pub tex: Vec<Vec2f>,
    pub col: Vec<Vec4f>,
}

impl Grid {
    pub fn planar(count_u: usize, count_v: usize) -> Self {
        let mut grid = Grid {
            pos: Vec::new(),
            tex: Vec::new(),
            col: Vec::new(),
        };
        for v in 0..count_v {
            for u in 0..count_u {
                grid.pos.push(Vec3f::new(u as f32, v as f32, 0.0));
                grid.tex.push(Vec2f::new(u as f32 * 0.25, v as f32 * 0.25));
                grid.col.push(Vec4f::from_rgba(0xFF00_00FF));
            }
        }
        grid
    }
}

/// Guest vertices laid out as `SimpleVertex` records
pub(super) fn raw_grid(count_u: usize, count_v: usize) -> Vec<SimpleVertex> {
    (0..count_u * count_v)
        .map(|i| SimpleVertex {
            uv: [0.0, 0.0],
            color_32: 0xFF00_0000 | i as u32,
            nrm: [0.0, 0.0, 1.0],
            pos: [(i % count_u) as f32, (i / count_u) as f32, 0.0],
        })
        .collect()
}

pub(super) fn assert_close(actual: [f32; 3], expected: [f32; 3]) {
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-4, "{:?} != {:?}", actual, expected);
    }
}
