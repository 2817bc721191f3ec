// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Typed access to the PDF object graph: image enumeration, sample decoding,
// in-place stream replacement, and serialization.

use std::collections::BTreeSet;
use std::io::Read;

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, SaveOptions, Stream};
use tracing::{debug, warn};

use walzwerk_core::{Result, WalzwerkError};

use crate::image::reencoder::EncodedImage;

/// Stable reference to one image XObject, together with its soft mask if the
/// image carries one. The mask is treated as part of the image for payload
/// accounting and replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHandle {
    pub id: ObjectId,
    pub smask: Option<ObjectId>,
}

/// A decoded image sample plus the bookkeeping the engine needs to decide
/// whether a re-encode is worth committing.
pub struct DecodedImage {
    /// Decoded pixels. RGBA when a usable soft mask was merged in.
    pub image: DynamicImage,
    /// Encoded byte size of the payload a replacement would displace: the
    /// base stream, plus the soft mask only when it was merged into `image`.
    pub payload_len: usize,
    /// Whether `image` carries alpha that must survive re-encoding.
    pub has_alpha: bool,
}

/// Wrapper over a parsed document. All mutation goes through here so the
/// engines never touch `lopdf` object plumbing directly.
pub struct PdfAccessor {
    document: Document,
}

impl PdfAccessor {
    /// Parses a document from memory. Encrypted files are tried with the
    /// empty user password; anything else is a parse failure.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Ok(Self {
            document: load_document(data)?,
        })
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Page object ids in page order.
    pub fn page_ids(&self) -> Vec<ObjectId> {
        self.document.get_pages().into_values().collect()
    }

    /// MediaBox dimensions in points, honoring inheritance from ancestor
    /// page-tree nodes.
    pub fn page_size(&self, page_id: ObjectId) -> Result<(f32, f32)> {
        page_size(&self.document, page_id)
    }

    /// Every image XObject reachable from the page tree, in page order and,
    /// within a page, in resource-dictionary insertion order. Images shared
    /// between pages appear once, under the first page that references them.
    pub fn image_objects(&self) -> Vec<ImageHandle> {
        let mut seen = BTreeSet::new();
        let mut handles = Vec::new();
        for page_id in self.page_ids() {
            let Some(resources) = resources_dict(&self.document, page_id) else {
                continue;
            };
            let Some(xobjects) = dict_entry_as_dict(&self.document, &resources, b"XObject")
            else {
                continue;
            };
            for (_, value) in xobjects.iter() {
                let Object::Reference(id) = value else {
                    continue;
                };
                let id = *id;
                if !seen.insert(id) {
                    continue;
                }
                let Ok(stream) = self
                    .document
                    .get_object(id)
                    .and_then(Object::as_stream)
                else {
                    continue;
                };
                if !is_image_subtype(&stream.dict) {
                    continue;
                }
                let smask = match stream.dict.get(b"SMask") {
                    Ok(Object::Reference(mask_id)) => {
                        seen.insert(*mask_id);
                        Some(*mask_id)
                    }
                    _ => None,
                };
                handles.push(ImageHandle { id, smask });
            }
        }
        handles
    }

    /// `/Width` × `/Height` from the image dictionary, without decoding.
    pub fn image_dimensions(&self, handle: &ImageHandle) -> Option<(u32, u32)> {
        let stream = self
            .document
            .get_object(handle.id)
            .and_then(Object::as_stream)
            .ok()?;
        let w = dict_u32(&self.document, &stream.dict, b"Width")?;
        let h = dict_u32(&self.document, &stream.dict, b"Height")?;
        Some((w, h))
    }

    /// Size of the image's own raw encoded payload. This is what the
    /// skip-size gate measures against; the soft mask companion is not
    /// counted here.
    pub fn image_payload_len(&self, handle: &ImageHandle) -> usize {
        self.document
            .get_object(handle.id)
            .and_then(Object::as_stream)
            .map(|s| s.content.len())
            .unwrap_or(0)
    }

    /// Decodes the image sample to pixels. DCTDecode and JPXDecode payloads
    /// go through the image crate; FlateDecode and unfiltered payloads are
    /// interpreted per the declared color space at 8 bits per component.
    pub fn decode_image(&self, handle: &ImageHandle) -> Result<DecodedImage> {
        decode_image_object(&self.document, handle)
    }

    /// Commits a re-encoded candidate over the original image object,
    /// rewriting the stream dictionary to match the new payload. Object ids
    /// are preserved so indirect references stay valid.
    pub fn replace_image(&mut self, handle: &ImageHandle, encoded: &EncodedImage) -> Result<()> {
        let stream = self
            .document
            .get_object_mut(handle.id)
            .and_then(Object::as_stream_mut)
            .map_err(|e| WalzwerkError::Parse(e.to_string()))?;
        stream.dict.set("Width", encoded.width as i64);
        stream.dict.set("Height", encoded.height as i64);
        stream.dict.set("Filter", encoded.codec.pdf_filter());
        stream.dict.set(
            "ColorSpace",
            if encoded.grayscale {
                "DeviceGray"
            } else {
                "DeviceRGB"
            },
        );
        stream.dict.set("BitsPerComponent", 8);
        stream.dict.remove(b"DecodeParms");
        stream.dict.remove(b"Decode");
        stream.set_content(encoded.data.clone());

        if let (Some(alpha), Some(mask_id)) = (&encoded.alpha, handle.smask) {
            let mask = self
                .document
                .get_object_mut(mask_id)
                .and_then(Object::as_stream_mut)
                .map_err(|e| WalzwerkError::Parse(e.to_string()))?;
            mask.dict.set("Width", encoded.width as i64);
            mask.dict.set("Height", encoded.height as i64);
            mask.dict.set("Filter", "FlateDecode");
            mask.dict.set("ColorSpace", "DeviceGray");
            mask.dict.set("BitsPerComponent", 8);
            mask.dict.remove(b"DecodeParms");
            mask.dict.remove(b"Decode");
            mask.set_content(alpha.clone());
        }
        Ok(())
    }

    /// Blanks the standard `/Info` fields. The dictionary itself stays in
    /// place so viewers that expect one do not trip over a dangling ref.
    pub fn strip_metadata(&mut self) {
        let Ok(Object::Reference(info_id)) = self.document.trailer.get(b"Info") else {
            return;
        };
        let info_id = *info_id;
        if let Ok(info) = self
            .document
            .get_object_mut(info_id)
            .and_then(Object::as_dict_mut)
        {
            for key in ["Title", "Author", "Subject", "Keywords", "Creator", "Producer"] {
                if info.has(key.as_bytes()) {
                    info.set(key, Object::string_literal(""));
                }
            }
        }
    }

    /// Serializes the document. With object streams enabled the writer also
    /// emits a cross-reference stream, which forces PDF 1.5.
    pub fn save(&mut self, use_object_streams: bool, objects_per_stream: usize) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        if use_object_streams {
            if self.document.version.as_str() < "1.5" {
                self.document.version = "1.5".to_string();
            }
            let options = SaveOptions::builder()
                .use_object_streams(true)
                .use_xref_streams(true)
                .max_objects_per_stream(objects_per_stream)
                .build();
            self.document
                .save_with_options(&mut buffer, options)
                .map_err(|e| WalzwerkError::Serialize(e.to_string()))?;
        } else {
            self.document
                .save_to(&mut buffer)
                .map_err(|e| WalzwerkError::Serialize(e.to_string()))?;
        }
        Ok(buffer)
    }
}

/// Parse helper shared with the rasterization path, which drives the raw
/// `lopdf::Document` directly.
pub(crate) fn load_document(data: &[u8]) -> Result<Document> {
    let mut document =
        Document::load_mem(data).map_err(|e| WalzwerkError::Parse(e.to_string()))?;
    if document.is_encrypted() {
        document
            .decrypt("")
            .map_err(|e| WalzwerkError::Parse(format!("encrypted document: {e}")))?;
    }
    Ok(document)
}

/// Follows a reference one level; direct objects pass through.
fn resolve_shallow<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

fn dict_u32(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<u32> {
    match resolve_shallow(doc, dict.get(key).ok()?) {
        Object::Integer(i) if *i >= 0 => Some(*i as u32),
        Object::Real(f) if *f >= 0.0 => Some(*f as u32),
        _ => None,
    }
}

fn as_f32(doc: &Document, obj: &Object) -> Option<f32> {
    match resolve_shallow(doc, obj) {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(f) => Some(*f),
        _ => None,
    }
}

fn is_image_subtype(dict: &Dictionary) -> bool {
    matches!(dict.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Image")
}

/// Resolves a dictionary entry that may itself be direct or a reference.
fn dict_entry_as_dict(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<Dictionary> {
    match resolve_shallow(doc, dict.get(key).ok()?) {
        Object::Dictionary(d) => Some(d.clone()),
        _ => None,
    }
}

/// Walks the page-tree `/Parent` chain looking for an inheritable entry.
fn inherited_entry(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = page_id;
    for _ in 0..32 {
        let dict = doc.get_object(current).and_then(Object::as_dict).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(resolve_shallow(doc, value).clone());
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent)) => current = *parent,
            _ => return None,
        }
    }
    None
}

pub(crate) fn resources_dict(doc: &Document, page_id: ObjectId) -> Option<Dictionary> {
    match inherited_entry(doc, page_id, b"Resources")? {
        Object::Dictionary(d) => Some(d),
        _ => None,
    }
}

pub(crate) fn page_size(doc: &Document, page_id: ObjectId) -> Result<(f32, f32)> {
    let media_box = inherited_entry(doc, page_id, b"MediaBox")
        .ok_or_else(|| WalzwerkError::Parse("page has no MediaBox".into()))?;
    let Object::Array(coords) = media_box else {
        return Err(WalzwerkError::Parse("MediaBox is not an array".into()));
    };
    if coords.len() != 4 {
        return Err(WalzwerkError::Parse("MediaBox must hold four numbers".into()));
    }
    let mut n = [0.0f32; 4];
    for (slot, obj) in n.iter_mut().zip(coords.iter()) {
        *slot = as_f32(doc, obj)
            .ok_or_else(|| WalzwerkError::Parse("non-numeric MediaBox entry".into()))?;
    }
    Ok(((n[2] - n[0]).abs(), (n[3] - n[1]).abs()))
}

/// Filter names applied to a stream, references resolved, outermost first.
fn filter_names(doc: &Document, stream: &Stream) -> Vec<String> {
    let Ok(value) = stream.dict.get(b"Filter") else {
        return Vec::new();
    };
    match resolve_shallow(doc, value) {
        Object::Name(n) => vec![String::from_utf8_lossy(n).into_owned()],
        Object::Array(items) => items
            .iter()
            .filter_map(|item| match resolve_shallow(doc, item) {
                Object::Name(n) => Some(String::from_utf8_lossy(n).into_owned()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Decompressed stream bytes, with a manual zlib pass as fallback for
/// FlateDecode streams lopdf declines (predictor quirks and the like).
fn raw_stream_bytes(stream: &Stream, filters: &[String]) -> Result<Vec<u8>> {
    match stream.decompressed_content() {
        Ok(bytes) => Ok(bytes),
        Err(e) if filters.iter().any(|f| f == "FlateDecode") => {
            debug!(error = %e, "lopdf decode failed, retrying with raw zlib");
            let mut decoder = flate2::read::ZlibDecoder::new(stream.content.as_slice());
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|_| WalzwerkError::UnsupportedImage(format!("flate decode: {e}")))?;
            Ok(out)
        }
        Err(e) => Err(WalzwerkError::UnsupportedImage(format!(
            "stream decode: {e}"
        ))),
    }
}

/// Component count for a raw (non-DCT) sample, from the declared color space.
fn component_count(doc: &Document, cs: &Object, pixels: usize, raw_len: usize) -> Result<u8> {
    match resolve_shallow(doc, cs) {
        Object::Name(n) => match n.as_slice() {
            b"DeviceRGB" | b"CalRGB" => Ok(3),
            b"DeviceGray" | b"CalGray" => Ok(1),
            b"DeviceCMYK" => Ok(4),
            other => Err(WalzwerkError::UnsupportedImage(format!(
                "color space {}",
                String::from_utf8_lossy(other)
            ))),
        },
        Object::Array(items) => {
            let family = items.first().map(|o| resolve_shallow(doc, o));
            match family {
                Some(Object::Name(n)) if n == b"ICCBased" => {
                    // Prefer the ICC stream's /N; fall back to a size guess.
                    if let Some(Object::Reference(id)) = items.get(1)
                        && let Ok(icc) = doc.get_object(*id).and_then(Object::as_stream)
                        && let Some(n) = dict_u32(doc, &icc.dict, b"N")
                    {
                        return Ok(n as u8);
                    }
                    if pixels > 0 && raw_len >= pixels * 3 {
                        Ok(3)
                    } else {
                        Ok(1)
                    }
                }
                Some(Object::Name(n)) => Err(WalzwerkError::UnsupportedImage(format!(
                    "color space {}",
                    String::from_utf8_lossy(n)
                ))),
                _ => Err(WalzwerkError::UnsupportedImage("color space array".into())),
            }
        }
        _ => Err(WalzwerkError::UnsupportedImage("missing color space".into())),
    }
}

fn raw_to_dynamic(raw: Vec<u8>, w: u32, h: u32, components: u8) -> Result<DynamicImage> {
    let pixels = (w as usize) * (h as usize);
    let expected = pixels * components as usize;
    if raw.len() < expected {
        return Err(WalzwerkError::UnsupportedImage(format!(
            "payload holds {} bytes, {expected} expected",
            raw.len()
        )));
    }
    match components {
        1 => GrayImage::from_raw(w, h, raw[..expected].to_vec())
            .map(DynamicImage::ImageLuma8)
            .ok_or_else(|| WalzwerkError::UnsupportedImage("gray buffer".into())),
        3 => RgbImage::from_raw(w, h, raw[..expected].to_vec())
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| WalzwerkError::UnsupportedImage("rgb buffer".into())),
        4 => {
            let mut rgb = Vec::with_capacity(pixels * 3);
            for chunk in raw[..expected].chunks_exact(4) {
                let (c, m, y, k) = (
                    chunk[0] as u32,
                    chunk[1] as u32,
                    chunk[2] as u32,
                    chunk[3] as u32,
                );
                rgb.push(((255 - c) * (255 - k) / 255) as u8);
                rgb.push(((255 - m) * (255 - k) / 255) as u8);
                rgb.push(((255 - y) * (255 - k) / 255) as u8);
            }
            RgbImage::from_raw(w, h, rgb)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| WalzwerkError::UnsupportedImage("cmyk buffer".into()))
        }
        n => Err(WalzwerkError::UnsupportedImage(format!("{n} components"))),
    }
}

/// Decodes the soft mask to an 8-bit gray plane, or `None` when it cannot be
/// honored (dimension mismatch, unsupported filter). A dropped mask leaves
/// the original `/SMask` in place, so transparency is preserved at its old
/// resolution rather than lost.
fn decode_soft_mask(doc: &Document, mask_id: ObjectId, w: u32, h: u32) -> Option<GrayImage> {
    let stream = doc.get_object(mask_id).and_then(Object::as_stream).ok()?;
    let mw = dict_u32(doc, &stream.dict, b"Width")?;
    let mh = dict_u32(doc, &stream.dict, b"Height")?;
    if (mw, mh) != (w, h) {
        debug!(mask = ?mask_id, "soft mask dimensions differ from base, leaving it alone");
        return None;
    }
    let filters = filter_names(doc, stream);
    if filters.iter().any(|f| f == "DCTDecode") {
        let bytes = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        let img = image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg).ok()?;
        return Some(img.to_luma8());
    }
    let raw = raw_stream_bytes(stream, &filters).ok()?;
    let expected = (w as usize) * (h as usize);
    if raw.len() < expected {
        return None;
    }
    GrayImage::from_raw(w, h, raw[..expected].to_vec())
}

pub(crate) fn decode_image_object(doc: &Document, handle: &ImageHandle) -> Result<DecodedImage> {
    let stream = doc
        .get_object(handle.id)
        .and_then(Object::as_stream)
        .map_err(|e| WalzwerkError::UnsupportedImage(e.to_string()))?;
    let dict = &stream.dict;
    let w = dict_u32(doc, dict, b"Width")
        .ok_or_else(|| WalzwerkError::UnsupportedImage("missing /Width".into()))?;
    let h = dict_u32(doc, dict, b"Height")
        .ok_or_else(|| WalzwerkError::UnsupportedImage("missing /Height".into()))?;
    let filters = filter_names(doc, stream);
    let mut payload_len = stream.content.len();

    let base = if filters.iter().any(|f| f == "DCTDecode") {
        // Outer filters (typically Flate around the JPEG) are peeled by
        // lopdf; a bare DCT payload comes back untouched.
        let bytes = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg)
            .map_err(|e| WalzwerkError::UnsupportedCodec(format!("DCTDecode: {e}")))?
    } else if filters.iter().any(|f| f == "JPXDecode") {
        image::load_from_memory(&stream.content)
            .map_err(|e| WalzwerkError::UnsupportedCodec(format!("JPXDecode: {e}")))?
    } else if filters.is_empty() || filters.iter().all(|f| f == "FlateDecode") {
        let bits = dict_u32(doc, dict, b"BitsPerComponent").unwrap_or(8);
        if bits != 8 {
            return Err(WalzwerkError::UnsupportedImage(format!(
                "{bits} bits per component"
            )));
        }
        let raw = raw_stream_bytes(stream, &filters)?;
        let cs = dict
            .get(b"ColorSpace")
            .map_err(|_| WalzwerkError::UnsupportedImage("missing color space".into()))?;
        let components =
            component_count(doc, cs, (w as usize) * (h as usize), raw.len())?;
        raw_to_dynamic(raw, w, h, components)?
    } else {
        return Err(WalzwerkError::UnsupportedCodec(filters.join("+")));
    };

    let mut has_alpha = false;
    let mut image = base;
    if let Some(mask_id) = handle.smask {
        if let Some(mask) = decode_soft_mask(doc, mask_id, w, h) {
            // The mask only counts toward the displaced payload when the
            // replacement actually rewrites it; a mask left in place is not
            // part of what acceptance weighs.
            if let Ok(mask_stream) = doc.get_object(mask_id).and_then(Object::as_stream) {
                payload_len += mask_stream.content.len();
            }
            let mut rgba = image.to_rgba8();
            for (pixel, alpha) in rgba.pixels_mut().zip(mask.pixels()) {
                pixel.0[3] = alpha.0[0];
            }
            image = DynamicImage::ImageRgba8(rgba);
            has_alpha = true;
        } else {
            warn!(image = ?handle.id, "soft mask not decodable, treating image as opaque");
        }
    }

    Ok(DecodedImage {
        image,
        payload_len,
        has_alpha,
    })
}
