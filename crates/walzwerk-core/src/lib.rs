// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Walzwerk — Core types, configuration presets, and error definitions shared
// across all crates.

pub mod config;
pub mod error;
pub mod types;

pub use config::{CompressionLevel, CompressionSettings, CompressorConfig, GrowthPolicy};
pub use error::{Result, WalzwerkError};
pub use types::*;
