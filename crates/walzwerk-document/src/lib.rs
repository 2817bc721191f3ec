// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Walzwerk — Document handling: PDF object-graph access, image re-encoding,
// and the two compression engines plus their orchestrator.

pub mod compress;
pub mod image;
pub mod pdf;

#[cfg(test)]
pub(crate) mod testutil;

pub use compress::{Compressor, inplace::compress_in_place, rasterize::rasterize};
pub use compress::render::{FlattenRenderer, PageRenderer};
pub use image::reencoder::{Codec, EncodedImage, Reencoder};
pub use pdf::accessor::{DecodedImage, ImageHandle, PdfAccessor};
