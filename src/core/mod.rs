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

//! Core emulation components
//!
//! Everything below this module runs on the single emulated-CPU schedule:
//! the timeline fires events in tick order, the GE controller reacts to
//! them, and the tessellator is a pure computation invoked by the command
//! decoder.

pub mod config;
pub mod error;
pub mod ge;
pub mod interrupt;
pub mod kernel;
pub mod memory;
pub mod spline;
pub mod system;
pub mod timing;

pub use config::GeConfig;
pub use ge::GeController;
pub use system::GeSystem;
