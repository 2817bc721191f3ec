// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Walzwerk.

use thiserror::Error;

/// Top-level error type for all Walzwerk operations.
///
/// Only the document-level variants (`InputTooLarge`, `Parse`, `Serialize`,
/// `Render`, `Cancelled`, `Io`, `Serialization`) ever surface from a
/// compression run. The per-image variants (`UnsupportedImage`,
/// `UnsupportedCodec`, `ResizeRejected`) are caught inside the in-place
/// engine and demoted to a skipped outcome for that image.
#[derive(Debug, Error)]
pub enum WalzwerkError {
    // -- Document-level (fatal to the operation) --
    #[error("input is {size} bytes, exceeding the configured limit of {limit}")]
    InputTooLarge { size: usize, limit: usize },

    #[error("PDF parse failed: {0}")]
    Parse(String),

    #[error("PDF serialization failed: {0}")]
    Serialize(String),

    #[error("page rasterization failed: {0}")]
    Render(String),

    #[error("operation cancelled")]
    Cancelled,

    // -- Per-image (non-fatal, converted to a skip) --
    #[error("unsupported image: {0}")]
    UnsupportedImage(String),

    #[error("unsupported codec: {0}")]
    UnsupportedCodec(String),

    #[error("resize rejected: {width}x{height} falls below minimum dimension {min}")]
    ResizeRejected { width: u32, height: u32, min: u32 },

    // -- Plumbing --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WalzwerkError {
    /// Whether this error aborts the whole operation, as opposed to being
    /// recoverable per image.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::UnsupportedImage(_) | Self::UnsupportedCodec(_) | Self::ResizeRejected { .. }
        )
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, WalzwerkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_image_errors_are_not_fatal() {
        assert!(!WalzwerkError::UnsupportedImage("cmyk 4bpc".into()).is_fatal());
        assert!(!WalzwerkError::UnsupportedCodec("webp".into()).is_fatal());
        assert!(
            !WalzwerkError::ResizeRejected {
                width: 10,
                height: 10,
                min: 50
            }
            .is_fatal()
        );
    }

    #[test]
    fn document_errors_are_fatal() {
        assert!(WalzwerkError::Parse("no trailer".into()).is_fatal());
        assert!(WalzwerkError::Serialize("xref".into()).is_fatal());
        assert!(WalzwerkError::Cancelled.is_fatal());
        assert!(
            WalzwerkError::InputTooLarge {
                size: 1,
                limit: 0
            }
            .is_fatal()
        );
    }
}
