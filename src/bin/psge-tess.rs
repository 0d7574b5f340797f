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

//! psge-tess: tessellate a synthetic control grid and print what came out

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde::Serialize;

use psge::core::config::GeConfig;
use psge::core::spline::math::{Vec2f, Vec3f, Vec4f};
use psge::core::spline::{
    tessellate_bezier, tessellate_spline, BezierPatch, KnotEdges, PatchPrimType, SplinePatch,
    SplineQuality, TessOutput, VertexChannels,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
enum PatchKind {
    Spline,
    Bezier,
}

#[derive(Parser, Debug)]
#[command(
    name = "psge-tess",
    about = "Tessellate a synthetic spline or Bezier control grid"
)]
struct Args {
    /// Surface type
    #[arg(value_enum, default_value_t = PatchKind::Spline)]
    kind: PatchKind,

    /// Control points along u
    #[arg(long, default_value_t = 4)]
    count_u: usize,

    /// Control points along v
    #[arg(long, default_value_t = 4)]
    count_v: usize,

    /// Subdivisions per patch along u
    #[arg(long, default_value_t = 8)]
    tess_u: usize,

    /// Subdivisions per patch along v
    #[arg(long, default_value_t = 8)]
    tess_v: usize,

    /// Override the configured quality (low, medium, high)
    #[arg(long)]
    quality: Option<SplineQuality>,

    /// Emit line indices instead of triangles
    #[arg(long, action = clap::ArgAction::SetTrue)]
    lines: bool,

    /// Leave the u knot vector closed at both ends
    #[arg(long, action = clap::ArgAction::SetTrue)]
    closed_u: bool,

    /// Leave the v knot vector closed at both ends
    #[arg(long, action = clap::ArgAction::SetTrue)]
    closed_v: bool,

    /// TOML configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print the summary as JSON
    #[arg(long, action = clap::ArgAction::SetTrue)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct Summary {
    kind: PatchKind,
    count_u: usize,
    count_v: usize,
    tess_u: usize,
    tess_v: usize,
    quality: SplineQuality,
    vertices: usize,
    indices: usize,
    primitives: usize,
    bounds_min: [f32; 3],
    bounds_max: [f32; 3],
}

/// Control points on a gently folded sheet
struct ControlGrid {
    pos: Vec<Vec3f>,
    tex: Vec<Vec2f>,
    col: Vec<Vec4f>,
}

impl ControlGrid {
    fn new(count_u: usize, count_v: usize) -> Self {
        let span_u = count_u.saturating_sub(1).max(1) as f32;
        let span_v = count_v.saturating_sub(1).max(1) as f32;
        let mut grid = ControlGrid {
            pos: Vec::with_capacity(count_u * count_v),
            tex: Vec::with_capacity(count_u * count_v),
            col: Vec::with_capacity(count_u * count_v),
        };

        for v in 0..count_v {
            for u in 0..count_u {
                let fold = if (u + v) % 2 == 0 { 0.0 } else { 0.5 };
                grid.pos.push(Vec3f::new(u as f32, v as f32, fold));
                grid.tex.push(Vec2f::new(u as f32 / span_u, v as f32 / span_v));
                grid.col.push(Vec4f::from_rgba(0xFFFF_FFFF));
            }
        }
        grid
    }
}

fn edges(closed: bool) -> KnotEdges {
    if closed {
        KnotEdges::empty()
    } else {
        KnotEdges::OPEN_START | KnotEdges::OPEN_END
    }
}

fn bounds(mesh: &TessOutput) -> ([f32; 3], [f32; 3]) {
    if mesh.vertices.is_empty() {
        return ([0.0; 3], [0.0; 3]);
    }

    let mut min = [f32::MAX; 3];
    let mut max = [f32::MIN; 3];
    for vertex in &mesh.vertices {
        for axis in 0..3 {
            min[axis] = min[axis].min(vertex.pos[axis]);
            max[axis] = max[axis].max(vertex.pos[axis]);
        }
    }
    (min, max)
}

fn load_config(args: &Args) -> Result<GeConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading config from {}", path.display());
            GeConfig::load(path)?
        }
        None => GeConfig::default(),
    };
    config.apply_env()?;
    if let Some(quality) = args.quality {
        config.spline_quality = quality;
    }
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let grid = ControlGrid::new(args.count_u, args.count_v);

    let prim_type = if args.lines {
        PatchPrimType::Lines
    } else {
        PatchPrimType::Triangles
    };
    let channels = VertexChannels::TEXCOORD | VertexChannels::COLOR;

    log::debug!(
        "Tessellating {:?} {}x{} at {}x{} ({})",
        args.kind,
        args.count_u,
        args.count_v,
        args.tess_u,
        args.tess_v,
        config.spline_quality
    );

    let mesh = match args.kind {
        PatchKind::Spline => {
            let patch = SplinePatch {
                tess_u: args.tess_u,
                tess_v: args.tess_v,
                count_u: args.count_u,
                count_v: args.count_v,
                type_u: edges(args.closed_u),
                type_v: edges(args.closed_v),
                prim_type,
                compute_normals: true,
                patch_facing: false,
                def_color: 0xFFFF_FFFF,
                pos: &grid.pos,
                tex: &grid.tex,
                col: &grid.col,
            };
            tessellate_spline(
                &patch,
                channels,
                config.spline_quality,
                config.spline_buffer_vertices,
            )
        }
        PatchKind::Bezier => {
            let patch = BezierPatch {
                count_u: args.count_u,
                count_v: args.count_v,
                prim_type,
                compute_normals: true,
                patch_facing: false,
                def_color: 0xFFFF_FFFF,
                pos: &grid.pos,
                tex: &grid.tex,
                col: &grid.col,
            };
            tessellate_bezier(
                &patch,
                args.tess_u,
                args.tess_v,
                channels,
                config.spline_quality,
                config.spline_buffer_vertices,
            )
        }
    };

    let (bounds_min, bounds_max) = bounds(&mesh);
    let per_prim = if args.lines { 2 } else { 3 };
    let summary = Summary {
        kind: args.kind,
        count_u: args.count_u,
        count_v: args.count_v,
        tess_u: args.tess_u,
        tess_v: args.tess_v,
        quality: config.spline_quality,
        vertices: mesh.vertices.len(),
        indices: mesh.indices.len(),
        primitives: mesh.indices.len() / per_prim,
        bounds_min,
        bounds_max,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "{:?} {}x{} control points, tess {}x{}, quality {}",
            summary.kind,
            summary.count_u,
            summary.count_v,
            summary.tess_u,
            summary.tess_v,
            summary.quality
        );
        println!("  vertices:   {}", summary.vertices);
        println!("  indices:    {}", summary.indices);
        println!("  primitives: {}", summary.primitives);
        println!(
            "  bounds:     {:?} .. {:?}",
            summary.bounds_min, summary.bounds_max
        );
    }

    Ok(())
}
