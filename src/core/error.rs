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

//! Error types
//!
//! Two families of errors exist in this crate:
//!
//! - [`EmulatorError`]: host-side failures (bad guest memory access, config
//!   files, savestate decoding). These never reach guest code.
//! - [`GeError`]: guest-visible status codes returned by the `sceGe` calls.
//!   They are folded into the 32-bit return word with [`hle_result`].

use thiserror::Error;

/// Result alias for host-side operations
pub type Result<T> = std::result::Result<T, EmulatorError>;

/// Result alias for guest-facing GE operations
pub type GeResult<T> = std::result::Result<T, GeError>;

/// Host-side emulator errors
#[derive(Debug, Error)]
pub enum EmulatorError {
    #[error("invalid memory access at 0x{address:08X}")]
    InvalidMemoryAccess { address: u32 },

    #[error("unaligned {size}-byte access at 0x{address:08X}")]
    UnalignedAccess { address: u32, size: u32 },

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode savestate: {0}")]
    StateEncode(#[from] bincode::error::EncodeError),

    #[error("failed to decode savestate: {0}")]
    StateDecode(#[from] bincode::error::DecodeError),

    #[error("savestate section mismatch (expected {expected}, found {found})")]
    StateSection { expected: String, found: String },

    #[error("unsupported savestate version {version} for section {section}")]
    UnsupportedStateVersion { section: String, version: u8 },

    #[error("scratch memory exhausted ({requested} bytes requested, {available} available)")]
    ScratchExhausted { requested: usize, available: usize },

    #[error("control point index {index} out of range ({count} normalized points)")]
    ControlPointOutOfRange { index: usize, count: usize },
}

/// Guest-visible GE status codes
///
/// Kernel-style error codes as seen by PSP software. The numeric values
/// come from [`GeError::code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GeError {
    #[error("invalid mode")]
    InvalidMode,

    #[error("privilege required")]
    PrivRequired,

    #[error("out of memory")]
    OutOfMemory,

    #[error("invalid id")]
    InvalidId,

    #[error("invalid index")]
    InvalidIndex,

    #[error("invalid value")]
    InvalidValue,

    #[error("busy")]
    Busy,

    /// SaveContext while lists are drawing (firmware returns a bare -1)
    #[error("context busy")]
    ContextBusy,

    /// GetMtx with an invalid destination pointer (bare -1)
    #[error("bad pointer")]
    BadPointer,

    /// Status code produced by the list owner
    #[error("list owner status 0x{0:08X}")]
    Code(u32),
}

impl GeError {
    pub const ERROR_BUSY: u32 = 0x8000_0021;
    pub const ERROR_OUT_OF_MEMORY: u32 = 0x8000_0022;
    pub const ERROR_PRIV_REQUIRED: u32 = 0x8000_0023;
    pub const ERROR_INVALID_ID: u32 = 0x8000_0100;
    pub const ERROR_INVALID_INDEX: u32 = 0x8000_0102;
    pub const ERROR_INVALID_MODE: u32 = 0x8000_0107;
    pub const ERROR_INVALID_VALUE: u32 = 0x8000_01FE;

    /// Guest return word for this error
    ///
    /// # Example
    ///
    /// ```
    /// use psge::GeError;
    ///
    /// assert_eq!(GeError::InvalidMode.code(), 0x8000_0107);
    /// assert_eq!(GeError::ContextBusy.code(), u32::MAX);
    /// ```
    pub fn code(&self) -> u32 {
        match self {
            GeError::InvalidMode => Self::ERROR_INVALID_MODE,
            GeError::PrivRequired => Self::ERROR_PRIV_REQUIRED,
            GeError::OutOfMemory => Self::ERROR_OUT_OF_MEMORY,
            GeError::InvalidId => Self::ERROR_INVALID_ID,
            GeError::InvalidIndex => Self::ERROR_INVALID_INDEX,
            GeError::InvalidValue => Self::ERROR_INVALID_VALUE,
            GeError::Busy => Self::ERROR_BUSY,
            GeError::ContextBusy | GeError::BadPointer => -1i32 as u32,
            GeError::Code(code) => *code,
        }
    }

    /// Interpret a raw status word from a list owner
    ///
    /// Negative words are errors, everything else is a success value.
    pub fn check(status: u32) -> GeResult<u32> {
        if (status as i32) < 0 {
            Err(GeError::Code(status))
        } else {
            Ok(status)
        }
    }
}

/// Fold a guest-facing result into the 32-bit return word
pub fn hle_result(result: GeResult<u32>) -> u32 {
    match result {
        Ok(value) => value,
        Err(e) => e.code(),
    }
}
