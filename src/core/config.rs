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

//! Session configuration
//!
//! Settings the tessellator and the sync calls read once per call. They are
//! persisted as TOML and can be overridden from `PSGE_*` environment
//! variables.
//!
//! ```toml
//! spline_quality = "medium"
//! hardware_tessellation = false
//! software_rendering = false
//! draw_sync_eat_cycles = false
//! spline_buffer_vertices = 65536
//! scratch_bytes = 4194304
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{EmulatorError, Result};
use crate::core::spline::SplineQuality;

/// GE session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeConfig {
    /// Tessellation density for splines and Bezier patches
    pub spline_quality: SplineQuality,

    /// Offload patch evaluation to the rasterizer backend when possible
    pub hardware_tessellation: bool,

    /// Software rasterizer in use (disables hardware tessellation)
    pub software_rendering: bool,

    /// Compatibility: DrawSync consumes 500000 cycles instead of 1240
    pub draw_sync_eat_cycles: bool,

    /// Maximum vertices a single patch submission may produce
    pub spline_buffer_vertices: usize,

    /// Scratch memory available to one tessellation call
    pub scratch_bytes: usize,
}

impl GeConfig {
    /// Default output-vertex budget (also the 16-bit index limit)
    pub const DEFAULT_SPLINE_BUFFER_VERTICES: usize = 65536;

    /// Default scratch budget per tessellation call
    pub const DEFAULT_SCRATCH_BYTES: usize = 0x40_0000;

    /// Load configuration from a TOML file
    ///
    /// Missing keys take their default values.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// - `Ok(GeConfig)` on success
    /// - `Err(EmulatorError)` if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| EmulatorError::Config(format!("failed to parse config: {}", e)))
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| EmulatorError::Config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply `PSGE_*` environment variable overrides
    ///
    /// Recognized variables: `PSGE_SPLINE_QUALITY`, `PSGE_HARDWARE_TESSELLATION`,
    /// `PSGE_SOFTWARE_RENDERING`, `PSGE_DRAW_SYNC_EAT_CYCLES`,
    /// `PSGE_SPLINE_BUFFER_VERTICES`, `PSGE_SCRATCH_BYTES`.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(value) = lookup("PSGE_SPLINE_QUALITY") {
            self.spline_quality = value.parse().map_err(EmulatorError::Config)?;
        }
        if let Some(value) = lookup("PSGE_HARDWARE_TESSELLATION") {
            self.hardware_tessellation = parse_value("PSGE_HARDWARE_TESSELLATION", &value)?;
        }
        if let Some(value) = lookup("PSGE_SOFTWARE_RENDERING") {
            self.software_rendering = parse_value("PSGE_SOFTWARE_RENDERING", &value)?;
        }
        if let Some(value) = lookup("PSGE_DRAW_SYNC_EAT_CYCLES") {
            self.draw_sync_eat_cycles = parse_value("PSGE_DRAW_SYNC_EAT_CYCLES", &value)?;
        }
        if let Some(value) = lookup("PSGE_SPLINE_BUFFER_VERTICES") {
            self.spline_buffer_vertices = parse_value("PSGE_SPLINE_BUFFER_VERTICES", &value)?;
        }
        if let Some(value) = lookup("PSGE_SCRATCH_BYTES") {
            self.scratch_bytes = parse_value("PSGE_SCRATCH_BYTES", &value)?;
        }
        Ok(())
    }

    /// Whether patch evaluation may be offloaded at all
    pub fn can_offload_tessellation(&self) -> bool {
        self.hardware_tessellation && !self.software_rendering
    }
}

impl Default for GeConfig {
    fn default() -> Self {
        Self {
            spline_quality: SplineQuality::High,
            hardware_tessellation: false,
            software_rendering: false,
            draw_sync_eat_cycles: false,
            spline_buffer_vertices: Self::DEFAULT_SPLINE_BUFFER_VERTICES,
            scratch_bytes: Self::DEFAULT_SCRATCH_BYTES,
        }
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| EmulatorError::Config(format!("{}={:?}: {}", key, value, e)))
}
