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

//! psge: PSP graphics engine (GE) core
//!
//! This crate emulates the command/interrupt dispatch layer of the PSP's
//! graphics engine and the tessellator that expands spline and Bezier
//! patches into drawable meshes.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`core`]: Core emulation components (timeline, interrupt dispatch,
//!   display-list synchronization, curved-surface tessellation)
//!
//! # Example
//!
//! ```
//! use psge::core::spline::{
//!     tessellate_spline, KnotEdges, PatchPrimType, SplinePatch, SplineQuality, VertexChannels,
//! };
//! use psge::core::spline::math::{Vec2f, Vec3f, Vec4f};
//!
//! let pos: Vec<Vec3f> = (0..16)
//!     .map(|i| Vec3f::new((i % 4) as f32, (i / 4) as f32, 0.0))
//!     .collect();
//! let tex = vec![Vec2f::default(); 16];
//! let col = vec![Vec4f::default(); 16];
//!
//! let patch = SplinePatch {
//!     tess_u: 4,
//!     tess_v: 4,
//!     count_u: 4,
//!     count_v: 4,
//!     type_u: KnotEdges::OPEN_START | KnotEdges::OPEN_END,
//!     type_v: KnotEdges::OPEN_START | KnotEdges::OPEN_END,
//!     prim_type: PatchPrimType::Triangles,
//!     compute_normals: true,
//!     patch_facing: false,
//!     def_color: 0xFFFF_FFFF,
//!     pos: &pos,
//!     tex: &tex,
//!     col: &col,
//! };
//!
//! let mesh = tessellate_spline(&patch, VertexChannels::empty(), SplineQuality::High, 1024);
//! assert_eq!(mesh.vertices.len(), 25);
//! assert_eq!(mesh.indices.len(), 4 * 4 * 6);
//! ```
//!
//! # Modules
//!
//! - [`core::timing`]: Virtual cycle timeline with scheduled events
//! - [`core::ge`]: Display lists, sync/interrupt controller, savestates
//! - [`core::system`]: Session integration and the guest-facing `sceGe` calls
//! - [`core::spline`]: Basis evaluation and patch tessellation
//!
//! # Error Handling
//!
//! Host-side fallible operations return [`core::error::Result<T>`] which is an alias for
//! `Result<T, EmulatorError>`. Guest-visible failures are [`core::error::GeError`]
//! values that fold into the status word returned to guest code.

pub mod core;

// Re-export commonly used types
pub use core::error::{EmulatorError, GeError, Result};
