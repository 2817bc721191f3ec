// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Walzwerk compressor.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

/// Which compression path the caller wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Recompress embedded images only, preserving text and vector content.
    InPlace,
    /// Flatten every page to a single bitmap.
    Rasterize,
    /// Try in-place first; fall back to rasterization when it fails to
    /// shrink the document.
    #[default]
    Auto,
}

/// Which path actually produced the returned bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompressionMethod {
    /// Explicit in-place run.
    InPlace,
    /// Explicit rasterization run.
    Rasterize,
    /// Automatic strategy, in-place output kept.
    AutoInPlace,
    /// Automatic strategy, rasterization fallback kept.
    AutoRasterize,
    /// Nothing shrank the document; the original bytes were returned
    /// (only under `GrowthPolicy::NeverGrow`).
    Unchanged,
}

/// Result envelope returned once per compression invocation.
#[derive(Debug, Clone)]
pub struct CompressionReport {
    /// The (possibly identical to input) output document.
    pub bytes: Vec<u8>,
    /// Input size in bytes.
    pub original_size: usize,
    /// Output size in bytes.
    pub compressed_size: usize,
    /// Which path produced `bytes`.
    pub method: CompressionMethod,
}

impl CompressionReport {
    /// Percentage reduction, `(original - final) / original × 100`.
    ///
    /// Negative when the output grew; callers opting into
    /// `GrowthPolicy::AcceptResult` must be prepared for that.
    pub fn compression_ratio(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        (self.original_size as f64 - self.compressed_size as f64) / self.original_size as f64
            * 100.0
    }
}

/// Which engine a progress tick belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStage {
    /// In-place engine, counting image objects.
    Images,
    /// Rasterization engine, counting pages.
    Pages,
}

/// A single progress tick. `completed` is monotonic within one engine run
/// and reaches `total` on completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub stage: ProgressStage,
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    /// Completion fraction in 0..=1. A degenerate run with nothing to do
    /// reports as complete.
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f32 / self.total as f32
        }
    }
}

/// Cooperative cancellation flag, checked at image/page boundaries only.
/// An in-flight single re-encode always runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Takes effect at the next image/page boundary.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
