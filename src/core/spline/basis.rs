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

//! Basis functions
//!
//! ## Uniform cubic B-spline
//!
//! A spline with `n + 3` control points along one axis has `n` segments.
//! The knot vector is the integer lattice shifted by -2 and the de Boor
//! recurrence is folded into closed form; the reciprocal knot spans it
//! needs are kept per segment in a [`KnotDiv`]. Clamping an edge ("open"
//! knot vector) only changes the divisors of the first or last two
//! segments.
//!
//! ## Cubic Bernstein
//!
//! ```text
//! B0 = (1-t)^3   B1 = 3t(1-t)^2   B2 = 3t^2(1-t)   B3 = t^3
//! ```
//!
//! [`bernstein3d`] returns its endpoints exactly at `t = 0` and `t = 1`.

use std::ops::{Add, Mul};

use super::KnotEdges;

/// Reciprocal knot spans for one segment
///
/// Field `dAB` is `1 / (knot[i+A] - knot[i+B])` relative to the segment's
/// first knot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KnotDiv {
    pub d30: f32,
    pub d41: f32,
    pub d52: f32,
    pub d31: f32,
    pub d42: f32,
    pub d32: f32,
}

impl Default for KnotDiv {
    fn default() -> Self {
        Self {
            d30: 1.0 / 3.0,
            d41: 1.0 / 3.0,
            d52: 1.0 / 3.0,
            d31: 1.0 / 2.0,
            d42: 1.0 / 2.0,
            d32: 1.0,
        }
    }
}

/// Basis weights and their derivatives for the four points of a segment
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SplineBasis {
    pub weights: [f32; 4],
    pub derivs: [f32; 4],
}

/// Build the knot vector and per-segment divisors for one axis
///
/// # Arguments
///
/// * `segments` - Number of segments (`count - 3`)
/// * `edges` - Which ends are open
/// * `knots` - Receives `segments + 2` knots
/// * `divs` - Receives `segments` divisors
pub fn build_knot_vector(
    segments: usize,
    edges: KnotEdges,
    knots: &mut Vec<f32>,
    divs: &mut Vec<KnotDiv>,
) {
    knots.clear();
    divs.clear();
    if segments == 0 {
        return;
    }

    knots.extend((0..segments + 2).map(|i| i as f32 - 2.0));
    divs.resize(segments, KnotDiv::default());

    if edges.contains(KnotEdges::OPEN_START) {
        knots[0] = 0.0;
        knots[1] = 0.0;

        divs[0].d30 = 1.0;
        divs[0].d41 = 1.0 / 2.0;
        divs[0].d31 = 1.0;
        if segments > 1 {
            divs[1].d30 = 1.0 / 2.0;
        }
    }

    if edges.contains(KnotEdges::OPEN_END) {
        let last = segments - 1;
        divs[last].d41 = 1.0 / 2.0;
        divs[last].d52 = 1.0;
        divs[last].d42 = 1.0;
        if segments > 1 {
            divs[last - 1].d52 = 1.0 / 2.0;
        }
    }
}

/// Evaluate the four basis functions of a segment at parameter `t`
///
/// # Arguments
///
/// * `segment` - Segment index; `t` is expected in `[segment, segment + 1]`
/// * `t` - Global parameter along the axis
/// * `knots` - Knot vector from [`build_knot_vector`]
/// * `div` - Divisors of this segment
///
/// # Returns
///
/// Weights summing to 1 and derivatives summing to 0
pub fn spline_basis(segment: usize, t: f32, knots: &[f32], div: &KnotDiv) -> SplineBasis {
    let knot = &knots[segment..segment + 3];

    let t0 = t - knot[0];
    let t1 = t - knot[1];
    let t2 = t - knot[2];

    let f30 = t0 * div.d30;
    let f41 = t1 * div.d41;
    let f52 = t2 * div.d52;
    let f31 = t1 * div.d31;
    let f42 = t2 * div.d42;
    let f32 = t2 * div.d32;

    let a = (1.0 - f30) * (1.0 - f31);
    let b = f31 * f41;
    let c = (1.0 - f41) * (1.0 - f42);
    let d = f42 * f52;

    let weights = [
        a - a * f32,
        1.0 - a - b + (a + b + c - 1.0) * f32,
        b + (1.0 - b - c - d) * f32,
        d * f32,
    ];

    let i1 = (1.0 - f31) * (1.0 - f32);
    let i2 = f31 * (1.0 - f32) + (1.0 - f42) * f32;
    let i3 = f42 * f32;

    let f130 = i1 * div.d30;
    let f241 = i2 * div.d41;
    let f352 = i3 * div.d52;

    let derivs = [
        3.0 * (0.0 - f130),
        3.0 * (f130 - f241),
        3.0 * (f241 - f352),
        3.0 * (f352 - 0.0),
    ];

    SplineBasis { weights, derivs }
}

/// Cubic Bernstein weights at `x`
pub fn bernstein_weights(x: f32) -> [f32; 4] {
    let ix = 1.0 - x;
    [ix * ix * ix, 3.0 * x * ix * ix, 3.0 * x * x * ix, x * x * x]
}

/// Derivatives of the cubic Bernstein weights at `x`
pub fn bernstein_derivs(x: f32) -> [f32; 4] {
    [
        -3.0 * (x - 1.0) * (x - 1.0),
        9.0 * x * x - 12.0 * x + 3.0,
        3.0 * (2.0 - 3.0 * x) * x,
        3.0 * x * x,
    ]
}

/// Cubic Bezier blend of four values
///
/// # Example
///
/// ```
/// use psge::core::spline::basis::bernstein3d;
/// use psge::core::spline::math::Vec3f;
///
/// let p0 = Vec3f::new(0.1, 0.2, 0.3);
/// let p3 = Vec3f::new(0.7, 0.8, 0.9);
/// assert_eq!(bernstein3d(p0, Vec3f::ZERO, Vec3f::ZERO, p3, 0.0), p0);
/// assert_eq!(bernstein3d(p0, Vec3f::ZERO, Vec3f::ZERO, p3, 1.0), p3);
/// ```
pub fn bernstein3d<T>(p0: T, p1: T, p2: T, p3: T, x: f32) -> T
where
    T: Copy + Add<Output = T> + Mul<f32, Output = T>,
{
    if x == 0.0 {
        return p0;
    }
    if x == 1.0 {
        return p3;
    }

    let [b0, b1, b2, b3] = bernstein_weights(x);
    p0 * b0 + p1 * b1 + p2 * b2 + p3 * b3
}

/// Derivative of [`bernstein3d`] with respect to `x`
pub fn bernstein3d_derivative<T>(p0: T, p1: T, p2: T, p3: T, x: f32) -> T
where
    T: Copy + Add<Output = T> + Mul<f32, Output = T>,
{
    let [d0, d1, d2, d3] = bernstein_derivs(x);
    p0 * d0 + p1 * d1 + p2 * d2 + p3 * d3
}
