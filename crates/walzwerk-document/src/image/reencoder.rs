// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Resize planning and candidate encoding for the in-place engine.

use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use tracing::debug;

use walzwerk_core::{CompressionSettings, Result, WalzwerkError};

/// PDF stream filter a candidate was encoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Jpeg,
    Flate,
}

impl Codec {
    /// The `/Filter` name to write into the image dictionary.
    pub fn pdf_filter(&self) -> &'static str {
        match self {
            Self::Jpeg => "DCTDecode",
            Self::Flate => "FlateDecode",
        }
    }
}

/// One encoded candidate, ready to be committed over the original object.
/// `alpha`, when present, is a zlib-compressed 8-bit gray plane at the same
/// dimensions, destined for the image's soft mask.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub codec: Codec,
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub grayscale: bool,
    pub alpha: Option<Vec<u8>>,
}

impl EncodedImage {
    /// Bytes this candidate would occupy in the document, mask included.
    /// Acceptance compares this against the original payload so a shrinking
    /// base cannot hide a ballooning mask.
    pub fn total_len(&self) -> usize {
        self.data.len() + self.alpha.as_ref().map_or(0, Vec::len)
    }
}

/// Stateless encoder configured from one settings preset.
pub struct Reencoder {
    quality: u8,
    threshold: f32,
    max_width: u32,
    max_height: u32,
    scale_factor: f32,
    min_dimension: u32,
    grayscale: bool,
    try_lossless: bool,
}

impl Reencoder {
    pub fn new(settings: &CompressionSettings) -> Self {
        Self {
            quality: settings.jpeg_quality(),
            threshold: settings.threshold,
            max_width: settings.max_width,
            max_height: settings.max_height,
            scale_factor: settings.scale_factor,
            min_dimension: settings.min_dimension,
            grayscale: settings.grayscale,
            try_lossless: settings.try_lossless,
        }
    }

    /// Target dimensions: the uniform scale factor first, then a clamp to the
    /// maximum box along the longer edge with aspect ratio preserved.
    /// Rejects targets where either edge falls below the minimum dimension.
    pub fn plan_resize(&self, width: u32, height: u32) -> Result<(u32, u32)> {
        let mut w = (width as f32 * self.scale_factor).floor() as u32;
        let mut h = (height as f32 * self.scale_factor).floor() as u32;
        if w > self.max_width || h > self.max_height {
            let aspect = w as f32 / h.max(1) as f32;
            if w >= h {
                w = w.min(self.max_width);
                h = (w as f32 / aspect).floor() as u32;
            } else {
                h = h.min(self.max_height);
                w = (h as f32 * aspect).floor() as u32;
            }
        }
        if w < self.min_dimension || h < self.min_dimension {
            return Err(WalzwerkError::ResizeRejected {
                width: w,
                height: h,
                min: self.min_dimension,
            });
        }
        Ok((w, h))
    }

    /// Resizes and encodes every applicable candidate. Individual encoder
    /// failures drop that candidate rather than aborting; an empty result
    /// means nothing could be produced for this image.
    pub fn reencode(
        &self,
        image: &DynamicImage,
        target: (u32, u32),
        keep_alpha: bool,
    ) -> Vec<EncodedImage> {
        let (w, h) = target;
        let resized = if (image.width(), image.height()) == (w, h) {
            image.clone()
        } else {
            image.resize_exact(w, h, FilterType::Lanczos3)
        };

        let (alpha, base) = if keep_alpha {
            let rgba = resized.to_rgba8();
            let mut plane = Vec::with_capacity((w * h) as usize);
            let mut rgb = Vec::with_capacity((w * h * 3) as usize);
            for pixel in rgba.pixels() {
                rgb.extend_from_slice(&pixel.0[..3]);
                plane.push(pixel.0[3]);
            }
            let Some(rgb) = RgbImage::from_raw(w, h, rgb) else {
                return Vec::new();
            };
            (Some(plane), DynamicImage::ImageRgb8(rgb))
        } else {
            (None, resized)
        };

        let alpha_payload = alpha.and_then(|plane| match zlib(&plane) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                debug!(error = %e, "alpha plane compression failed");
                None
            }
        });
        if keep_alpha && alpha_payload.is_none() {
            // Transparency must survive; without a mask payload there is no
            // valid candidate.
            return Vec::new();
        }

        let mut candidates = Vec::new();
        match self.encode_jpeg(&base, w, h) {
            Ok(mut candidate) => {
                candidate.alpha = alpha_payload.clone();
                candidates.push(candidate);
            }
            Err(e) => debug!(error = %e, "jpeg candidate failed"),
        }
        if self.try_lossless {
            match self.encode_flate(&base, w, h) {
                Ok(mut candidate) => {
                    candidate.alpha = alpha_payload;
                    candidates.push(candidate);
                }
                Err(e) => debug!(error = %e, "flate candidate failed"),
            }
        }
        candidates
    }

    /// Smallest candidate by committed size.
    pub fn pick_best(candidates: Vec<EncodedImage>) -> Option<EncodedImage> {
        candidates.into_iter().min_by_key(EncodedImage::total_len)
    }

    /// Whether a candidate clears the acceptance threshold against the
    /// original payload size.
    pub fn accepts(&self, candidate: &EncodedImage, original_len: usize) -> bool {
        (candidate.total_len() as f64) < original_len as f64 * self.threshold as f64
    }

    fn encode_jpeg(&self, base: &DynamicImage, w: u32, h: u32) -> Result<EncodedImage> {
        let mut data = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut data, self.quality);
        if self.grayscale {
            base.to_luma8()
                .write_with_encoder(encoder)
                .map_err(|e| WalzwerkError::UnsupportedCodec(format!("jpeg encode: {e}")))?;
        } else {
            base.to_rgb8()
                .write_with_encoder(encoder)
                .map_err(|e| WalzwerkError::UnsupportedCodec(format!("jpeg encode: {e}")))?;
        }
        Ok(EncodedImage {
            codec: Codec::Jpeg,
            data,
            width: w,
            height: h,
            grayscale: self.grayscale,
            alpha: None,
        })
    }

    fn encode_flate(&self, base: &DynamicImage, w: u32, h: u32) -> Result<EncodedImage> {
        let raw = if self.grayscale {
            base.to_luma8().into_raw()
        } else {
            base.to_rgb8().into_raw()
        };
        Ok(EncodedImage {
            codec: Codec::Flate,
            data: zlib(&raw)?,
            width: w,
            height: h,
            grayscale: self.grayscale,
            alpha: None,
        })
    }
}

pub(crate) fn zlib(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|e| WalzwerkError::UnsupportedCodec(format!("flate encode: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use walzwerk_core::CompressionLevel;

    fn reencoder(level: CompressionLevel) -> Reencoder {
        Reencoder::new(&level.settings())
    }

    #[test]
    fn small_images_keep_their_dimensions() {
        let r = reencoder(CompressionLevel::Balanced);
        assert_eq!(r.plan_resize(800, 600).unwrap(), (800, 600));
    }

    #[test]
    fn oversized_square_clamps_to_the_box() {
        // 2000x2000 under a 1200-pixel box lands on 1200x1200.
        let r = reencoder(CompressionLevel::SmallSize);
        let (w, h) = r.plan_resize(2500, 2500).unwrap();
        assert_eq!((w, h), (1200, 1200));
    }

    #[test]
    fn scale_applies_before_the_clamp() {
        // Small-size scales by 0.8 first: 2000 -> 1600, then clamps to 1200.
        let r = reencoder(CompressionLevel::SmallSize);
        let (w, h) = r.plan_resize(2000, 1000).unwrap();
        assert_eq!(w, 1200);
        assert_eq!(h, 600);
    }

    #[test]
    fn aspect_ratio_survives_the_clamp() {
        let r = reencoder(CompressionLevel::Balanced);
        let (w, h) = r.plan_resize(3600, 1800).unwrap();
        assert_eq!((w, h), (1800, 900));
    }

    #[test]
    fn tiny_targets_are_rejected() {
        let r = reencoder(CompressionLevel::Balanced);
        match r.plan_resize(40, 40) {
            Err(WalzwerkError::ResizeRejected { min, .. }) => assert_eq!(min, 50),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn extreme_scale_can_push_below_minimum() {
        // 60 * 0.7 = 42, above the extreme minimum of 30.
        let r = reencoder(CompressionLevel::Extreme);
        assert_eq!(r.plan_resize(60, 60).unwrap(), (42, 42));
        assert!(r.plan_resize(40, 40).is_err());
    }

    #[test]
    fn produces_jpeg_and_flate_candidates() {
        let r = reencoder(CompressionLevel::Balanced);
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(
            64,
            64,
            image::Rgb([120, 30, 200]),
        ));
        let candidates = r.reencode(&img, (64, 64), false);
        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().any(|c| c.codec == Codec::Jpeg));
        assert!(candidates.iter().any(|c| c.codec == Codec::Flate));
        for c in &candidates {
            assert_eq!((c.width, c.height), (64, 64));
            assert!(c.alpha.is_none());
        }
    }

    #[test]
    fn flate_wins_on_flat_synthetic_images() {
        // A solid block zlib-compresses to almost nothing while JPEG still
        // pays its header and entropy overhead.
        let r = reencoder(CompressionLevel::Balanced);
        let img =
            DynamicImage::ImageRgb8(RgbImage::from_pixel(256, 256, image::Rgb([255, 255, 255])));
        let best = Reencoder::pick_best(r.reencode(&img, (256, 256), false)).unwrap();
        assert_eq!(best.codec, Codec::Flate);
    }

    #[test]
    fn alpha_plane_is_carried_through_candidates() {
        let r = reencoder(CompressionLevel::Balanced);
        let img = DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            32,
            32,
            image::Rgba([10, 20, 30, 128]),
        ));
        let candidates = r.reencode(&img, (32, 32), true);
        assert!(!candidates.is_empty());
        for c in &candidates {
            let alpha = c.alpha.as_ref().expect("alpha payload");
            assert!(!alpha.is_empty());
            assert!(c.total_len() > c.data.len());
        }
    }

    #[test]
    fn acceptance_threshold_is_strict() {
        let r = reencoder(CompressionLevel::Balanced);
        let candidate = EncodedImage {
            codec: Codec::Jpeg,
            data: vec![0; 950],
            width: 10,
            height: 10,
            grayscale: false,
            alpha: None,
        };
        // threshold 0.95: 950 is not < 1000 * 0.95.
        assert!(!r.accepts(&candidate, 1000));
        assert!(r.accepts(&candidate, 1001));
    }

    #[test]
    fn grayscale_preset_emits_single_channel_jpeg() {
        let r = reencoder(CompressionLevel::Extreme);
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(
            64,
            64,
            image::Rgb([200, 10, 10]),
        ));
        let candidates = r.reencode(&img, (44, 44), false);
        assert!(candidates.iter().all(|c| c.grayscale));
    }
}
