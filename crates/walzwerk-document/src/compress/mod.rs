// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Compression orchestration over the two engines.

pub mod inplace;
pub mod rasterize;
pub mod render;

use tracing::{info, instrument};

use walzwerk_core::{
    CancelToken, CompressionLevel, CompressionMethod, CompressionReport, CompressionSettings,
    CompressorConfig, GrowthPolicy, Progress, Result, Strategy, WalzwerkError,
};

use inplace::compress_in_place;
use render::{FlattenRenderer, PageRenderer};

/// Entry point tying the engines, the size gate, and the growth policy
/// together. One instance is cheap and reusable across documents.
pub struct Compressor {
    config: CompressorConfig,
    renderer: Box<dyn PageRenderer>,
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new(CompressorConfig::default())
    }
}

impl Compressor {
    pub fn new(config: CompressorConfig) -> Self {
        Self::with_renderer(config, Box::new(FlattenRenderer))
    }

    /// Swap in a different page renderer for the rasterization path.
    pub fn with_renderer(config: CompressorConfig, renderer: Box<dyn PageRenderer>) -> Self {
        Self { config, renderer }
    }

    /// Compresses with the per-image settings of a named level.
    pub fn compress(
        &self,
        input: &[u8],
        level: CompressionLevel,
        strategy: Strategy,
        cancel: &CancelToken,
        progress: impl FnMut(Progress),
    ) -> Result<CompressionReport> {
        self.compress_with(input, &level.settings(), level, strategy, cancel, progress)
    }

    /// Compresses with explicit settings. `level` still drives the
    /// rasterization path's scale and quality maps.
    #[instrument(skip_all, fields(input_len = input.len(), ?level, ?strategy))]
    pub fn compress_with(
        &self,
        input: &[u8],
        settings: &CompressionSettings,
        level: CompressionLevel,
        strategy: Strategy,
        cancel: &CancelToken,
        mut progress: impl FnMut(Progress),
    ) -> Result<CompressionReport> {
        if input.len() > self.config.max_input_size {
            return Err(WalzwerkError::InputTooLarge {
                size: input.len(),
                limit: self.config.max_input_size,
            });
        }

        let mut tick = |p: Progress| progress(p);
        let (bytes, method) = match strategy {
            Strategy::InPlace => (
                compress_in_place(input, settings, cancel, &mut tick)?,
                CompressionMethod::InPlace,
            ),
            Strategy::Rasterize => (
                rasterize::rasterize(input, level, self.renderer.as_ref(), cancel, &mut tick)?,
                CompressionMethod::Rasterize,
            ),
            Strategy::Auto => {
                let inplace = compress_in_place(input, settings, cancel, &mut tick)?;
                if inplace.len() < input.len() {
                    (inplace, CompressionMethod::AutoInPlace)
                } else {
                    info!(
                        inplace_len = inplace.len(),
                        "in-place pass did not shrink the document, rasterizing"
                    );
                    (
                        rasterize::rasterize(
                            input,
                            level,
                            self.renderer.as_ref(),
                            cancel,
                            &mut tick,
                        )?,
                        CompressionMethod::AutoRasterize,
                    )
                }
            }
        };

        let (bytes, method) = match self.config.growth_policy {
            GrowthPolicy::NeverGrow if bytes.len() >= input.len() => {
                info!(
                    result_len = bytes.len(),
                    "result did not shrink, returning original bytes"
                );
                (input.to_vec(), CompressionMethod::Unchanged)
            }
            _ => (bytes, method),
        };

        let report = CompressionReport {
            original_size: input.len(),
            compressed_size: bytes.len(),
            method,
            bytes,
        };
        info!(
            original = report.original_size,
            compressed = report.compressed_size,
            ratio = format!("{:.1}%", report.compression_ratio()),
            method = ?report.method,
            "compression finished"
        );
        Ok(report)
    }
}
