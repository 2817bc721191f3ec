// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Compression configuration: named presets and the orchestrator options.

use serde::{Deserialize, Serialize};

/// Default cap on input size: anything larger is rejected before parsing.
pub const DEFAULT_MAX_INPUT_SIZE: usize = 200 * 1024 * 1024;

/// Named quality/size tradeoff points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CompressionLevel {
    /// Aggressive downscaling for large scans and photo-heavy files.
    SmallSize,
    /// Sensible default.
    #[default]
    Balanced,
    /// Light touch — keeps large dimensions and high JPEG quality.
    HighQuality,
    /// Maximum reduction: heavy downscale plus grayscale conversion.
    Extreme,
}

impl CompressionLevel {
    /// The per-image settings tuple for this level.
    pub fn settings(&self) -> CompressionSettings {
        match self {
            Self::SmallSize => CompressionSettings {
                quality: 0.3,
                threshold: 0.95,
                max_width: 1200,
                max_height: 1200,
                skip_size: 2000,
                scale_factor: 0.8,
                min_dimension: 50,
                grayscale: false,
                try_lossless: true,
                strip_metadata: true,
                use_object_streams: true,
                objects_per_stream: 50,
            },
            Self::Balanced => CompressionSettings {
                quality: 0.5,
                threshold: 0.95,
                max_width: 1800,
                max_height: 1800,
                skip_size: 3000,
                scale_factor: 1.0,
                min_dimension: 50,
                grayscale: false,
                try_lossless: true,
                strip_metadata: true,
                use_object_streams: true,
                objects_per_stream: 50,
            },
            Self::HighQuality => CompressionSettings {
                quality: 0.7,
                threshold: 0.98,
                max_width: 2500,
                max_height: 2500,
                skip_size: 5000,
                scale_factor: 1.0,
                min_dimension: 50,
                grayscale: false,
                try_lossless: true,
                strip_metadata: true,
                use_object_streams: true,
                objects_per_stream: 50,
            },
            Self::Extreme => CompressionSettings {
                quality: 0.1,
                threshold: 0.95,
                max_width: 1000,
                max_height: 1000,
                skip_size: 1000,
                scale_factor: 0.7,
                min_dimension: 30,
                grayscale: true,
                try_lossless: true,
                strip_metadata: true,
                use_object_streams: true,
                objects_per_stream: 100,
            },
        }
    }

    /// Render scale for the full-page rasterization path, as a multiplier on
    /// the page's native point dimensions.
    pub fn raster_scale(&self) -> f32 {
        match self {
            Self::HighQuality => 2.0,
            Self::Balanced => 1.5,
            Self::SmallSize => 1.2,
            Self::Extreme => 1.0,
        }
    }

    /// JPEG quality (0..1) for the full-page rasterization path.
    pub fn raster_quality(&self) -> f32 {
        match self {
            Self::HighQuality => 0.9,
            Self::Balanced => 0.6,
            Self::SmallSize => 0.4,
            Self::Extreme => 0.2,
        }
    }
}

/// Per-image settings driving the in-place engine and the re-encoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionSettings {
    /// Lossy encode quality factor, 0..1.
    pub quality: f32,
    /// Acceptance threshold: a candidate must be smaller than
    /// `original × threshold` to be committed.
    pub threshold: f32,
    /// Maximum target width in pixels after resizing.
    pub max_width: u32,
    /// Maximum target height in pixels after resizing.
    pub max_height: u32,
    /// Encoded payloads below this many bytes are not worth touching.
    pub skip_size: usize,
    /// Uniform pre-scale applied before clamping to the maximum dimensions.
    pub scale_factor: f32,
    /// Images whose post-scale dimensions fall below this are left alone.
    pub min_dimension: u32,
    /// Desaturate before encoding (irreversible).
    pub grayscale: bool,
    /// Also try a lossless FlateDecode candidate alongside JPEG.
    pub try_lossless: bool,
    /// Blank the /Info metadata dictionary before saving.
    pub strip_metadata: bool,
    /// Group small objects into object streams at serialization time.
    pub use_object_streams: bool,
    /// Maximum objects per object stream.
    pub objects_per_stream: usize,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        CompressionLevel::Balanced.settings()
    }
}

impl CompressionSettings {
    /// Quality factor mapped to the 1..=100 scale JPEG encoders expect.
    pub fn jpeg_quality(&self) -> u8 {
        (self.quality * 100.0).clamp(1.0, 100.0) as u8
    }
}

/// What to do when compression fails to shrink the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum GrowthPolicy {
    /// Return the original bytes (ratio 0) whenever the result would be at
    /// least as large as the input.
    #[default]
    NeverGrow,
    /// Return whatever the selected engine produced, even if it grew the
    /// document. This reproduces the historical automatic-fallback behavior.
    AcceptResult,
}

/// Orchestrator-level options, independent of the per-image preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressorConfig {
    /// Inputs larger than this are rejected before parsing.
    pub max_input_size: usize,
    /// Growth handling for the final result envelope.
    pub growth_policy: GrowthPolicy,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            max_input_size: DEFAULT_MAX_INPUT_SIZE,
            growth_policy: GrowthPolicy::NeverGrow,
        }
    }
}
