// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-place engine: re-encodes embedded images inside the existing object
// graph without touching text, vector content, or page structure.

use tracing::{debug, info, instrument};

use walzwerk_core::{
    CancelToken, CompressionSettings, Progress, ProgressStage, Result, WalzwerkError,
};

use crate::image::reencoder::Reencoder;
use crate::pdf::accessor::{ImageHandle, PdfAccessor};

/// What happened to one image object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOutcome {
    /// A candidate cleared the threshold and was committed.
    Accepted,
    /// Candidates were produced but none cleared the threshold.
    Rejected,
    /// The image never reached encoding.
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Encoded payload under the preset's skip size.
    BelowSkipSize,
    /// Target dimensions fell below the minimum.
    ResizeRejected,
    /// Unsupported codec, color space, or a broken stream.
    Undecodable,
}

/// Per-run counters, logged once on completion.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InPlaceSummary {
    pub total: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub skipped: usize,
}

impl InPlaceSummary {
    fn record(&mut self, outcome: ImageOutcome) {
        match outcome {
            ImageOutcome::Accepted => self.accepted += 1,
            ImageOutcome::Rejected => self.rejected += 1,
            ImageOutcome::Skipped(_) => self.skipped += 1,
        }
    }
}

/// Runs the in-place engine over `input` and returns the serialized result.
/// Per-image failures are skips, not errors; the document always comes back
/// structurally intact.
#[instrument(skip_all, fields(input_len = input.len()))]
pub fn compress_in_place(
    input: &[u8],
    settings: &CompressionSettings,
    cancel: &CancelToken,
    progress: &mut dyn FnMut(Progress),
) -> Result<Vec<u8>> {
    let mut accessor = PdfAccessor::from_bytes(input)?;
    if settings.strip_metadata {
        accessor.strip_metadata();
    }

    let handles = accessor.image_objects();
    let total = handles.len();
    let reencoder = Reencoder::new(settings);
    let mut summary = InPlaceSummary {
        total,
        ..Default::default()
    };

    if total == 0 {
        progress(Progress {
            stage: ProgressStage::Images,
            completed: 0,
            total: 0,
        });
    }

    for (index, handle) in handles.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(WalzwerkError::Cancelled);
        }
        let outcome = process_image(&mut accessor, handle, settings, &reencoder);
        debug!(image = ?handle.id, ?outcome, "image processed");
        summary.record(outcome);
        progress(Progress {
            stage: ProgressStage::Images,
            completed: index + 1,
            total,
        });
    }

    info!(
        total = summary.total,
        accepted = summary.accepted,
        rejected = summary.rejected,
        skipped = summary.skipped,
        "in-place pass finished"
    );
    accessor.save(settings.use_object_streams, settings.objects_per_stream)
}

fn process_image(
    accessor: &mut PdfAccessor,
    handle: &ImageHandle,
    settings: &CompressionSettings,
    reencoder: &Reencoder,
) -> ImageOutcome {
    let payload_len = accessor.image_payload_len(handle);
    if payload_len < settings.skip_size {
        return ImageOutcome::Skipped(SkipReason::BelowSkipSize);
    }

    let Some((width, height)) = accessor.image_dimensions(handle) else {
        return ImageOutcome::Skipped(SkipReason::Undecodable);
    };
    let target = match reencoder.plan_resize(width, height) {
        Ok(target) => target,
        Err(e) => {
            debug!(image = ?handle.id, %e, "resize rejected");
            return ImageOutcome::Skipped(SkipReason::ResizeRejected);
        }
    };

    let decoded = match accessor.decode_image(handle) {
        Ok(decoded) => decoded,
        Err(e) => {
            debug!(image = ?handle.id, %e, "decode failed");
            return ImageOutcome::Skipped(SkipReason::Undecodable);
        }
    };

    let candidates = reencoder.reencode(&decoded.image, target, decoded.has_alpha);
    let Some(best) = Reencoder::pick_best(candidates) else {
        return ImageOutcome::Rejected;
    };
    if !reencoder.accepts(&best, decoded.payload_len) {
        return ImageOutcome::Rejected;
    }
    match accessor.replace_image(handle, &best) {
        Ok(()) => ImageOutcome::Accepted,
        Err(e) => {
            debug!(image = ?handle.id, %e, "replacement failed");
            ImageOutcome::Rejected
        }
    }
}
