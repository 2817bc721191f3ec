// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page rendering for the rasterization engine. `FlattenRenderer` is an
// approximation: it composites the page's raster images at their placed
// positions onto a white canvas, which is what scan-style documents need.
// A full vector/text renderer can be plugged in through `PageRenderer`.

use std::collections::HashSet;

use image::imageops::FilterType;
use image::{DynamicImage, RgbImage, Rgba, RgbaImage, imageops};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, trace, warn};

use walzwerk_core::Result;

use crate::pdf::accessor::{self, ImageHandle};

/// Produces a bitmap of one page at `scale` pixels per point.
pub trait PageRenderer {
    fn render_page(&self, document: &Document, page_id: ObjectId, scale: f32) -> Result<RgbImage>;
}

/// 2D affine transform in PDF order: `[a b c d e f]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Matrix {
    pub(crate) fn identity() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: 0.0,
            f: 0.0,
        }
    }

    /// `self × other`, with `self` applied first.
    pub(crate) fn concat(&self, other: &Matrix) -> Self {
        Self {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }
}

/// Renderer that flattens placed image XObjects onto a white page.
/// Vector art and text are not drawn.
#[derive(Debug, Default)]
pub struct FlattenRenderer;

impl PageRenderer for FlattenRenderer {
    fn render_page(&self, document: &Document, page_id: ObjectId, scale: f32) -> Result<RgbImage> {
        let (w_pt, h_pt) = accessor::page_size(document, page_id)?;
        let width = ((w_pt * scale).round() as u32).max(1);
        let height = ((h_pt * scale).round() as u32).max(1);
        let mut canvas = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

        match document.get_and_decode_page_content(page_id) {
            Ok(content) => {
                let resources =
                    accessor::resources_dict(document, page_id).unwrap_or_else(Dictionary::new);
                let mut visited = HashSet::new();
                composite(
                    document,
                    &mut canvas,
                    &content.operations,
                    &resources,
                    Matrix::identity(),
                    scale,
                    &mut visited,
                );
            }
            Err(e) => debug!(page = ?page_id, error = %e, "content stream unreadable, page stays blank"),
        }

        Ok(DynamicImage::ImageRgba8(canvas).to_rgb8())
    }
}

fn operand_f32(op: &Object) -> Option<f32> {
    match op {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(f) => Some(*f),
        _ => None,
    }
}

fn composite(
    doc: &Document,
    canvas: &mut RgbaImage,
    operations: &[Operation],
    resources: &Dictionary,
    base: Matrix,
    scale: f32,
    visited: &mut HashSet<ObjectId>,
) {
    let mut ctm = base;
    let mut stack: Vec<Matrix> = Vec::new();

    for op in operations {
        match op.operator.as_str() {
            "q" => stack.push(ctm),
            "Q" => {
                if let Some(saved) = stack.pop() {
                    ctm = saved;
                }
            }
            "cm" => {
                let n: Vec<f32> = op.operands.iter().filter_map(operand_f32).collect();
                if n.len() == 6 {
                    let m = Matrix {
                        a: n[0],
                        b: n[1],
                        c: n[2],
                        d: n[3],
                        e: n[4],
                        f: n[5],
                    };
                    ctm = m.concat(&ctm);
                }
            }
            "Do" => {
                let Some(Object::Name(name)) = op.operands.first() else {
                    continue;
                };
                draw_xobject(doc, canvas, resources, name, ctm, scale, visited);
            }
            _ => {}
        }
    }
}

fn draw_xobject(
    doc: &Document,
    canvas: &mut RgbaImage,
    resources: &Dictionary,
    name: &[u8],
    ctm: Matrix,
    scale: f32,
    visited: &mut HashSet<ObjectId>,
) {
    let xobjects = match resources.get(b"XObject") {
        Ok(Object::Dictionary(d)) => d.clone(),
        Ok(Object::Reference(id)) => match doc.get_object(*id).and_then(Object::as_dict) {
            Ok(d) => d.clone(),
            Err(_) => return,
        },
        _ => return,
    };
    let Ok(Object::Reference(id)) = xobjects.get(name) else {
        return;
    };
    let id = *id;
    let Ok(stream) = doc.get_object(id).and_then(Object::as_stream) else {
        return;
    };

    match stream.dict.get(b"Subtype") {
        Ok(Object::Name(subtype)) if subtype == b"Image" => {
            let smask = match stream.dict.get(b"SMask") {
                Ok(Object::Reference(mask_id)) => Some(*mask_id),
                _ => None,
            };
            let handle = ImageHandle { id, smask };
            match accessor::decode_image_object(doc, &handle) {
                Ok(decoded) => draw_image(canvas, &decoded.image, ctm, scale),
                Err(e) => trace!(image = ?id, error = %e, "skipping undecodable image"),
            }
        }
        Ok(Object::Name(subtype)) if subtype == b"Form" => {
            if !visited.insert(id) {
                warn!(form = ?id, "recursive form XObject, skipping");
                return;
            }
            let form_matrix = form_matrix(&stream.dict);
            let inner_resources = match stream.dict.get(b"Resources") {
                Ok(Object::Dictionary(d)) => d.clone(),
                Ok(Object::Reference(rid)) => doc
                    .get_object(*rid)
                    .and_then(Object::as_dict)
                    .cloned()
                    .unwrap_or_else(|_| resources.clone()),
                _ => resources.clone(),
            };
            if let Ok(data) = stream.decompressed_content()
                && let Ok(content) = Content::decode(&data)
            {
                composite(
                    doc,
                    canvas,
                    &content.operations,
                    &inner_resources,
                    form_matrix.concat(&ctm),
                    scale,
                    visited,
                );
            }
            visited.remove(&id);
        }
        _ => {}
    }
}

fn form_matrix(dict: &Dictionary) -> Matrix {
    let Ok(Object::Array(items)) = dict.get(b"Matrix") else {
        return Matrix::identity();
    };
    let n: Vec<f32> = items.iter().filter_map(operand_f32).collect();
    if n.len() == 6 {
        Matrix {
            a: n[0],
            b: n[1],
            c: n[2],
            d: n[3],
            e: n[4],
            f: n[5],
        }
    } else {
        Matrix::identity()
    }
}

/// Paints a decoded image under an axis-aligned CTM. Rotated or mirrored
/// placements are skipped rather than drawn wrong.
fn draw_image(canvas: &mut RgbaImage, img: &DynamicImage, ctm: Matrix, scale: f32) {
    if ctm.b.abs() > f32::EPSILON || ctm.c.abs() > f32::EPSILON || ctm.a <= 0.0 || ctm.d <= 0.0 {
        debug!("non-axis-aligned image placement, not composited");
        return;
    }
    let w = ((ctm.a * scale).round() as u32).max(1);
    let h = ((ctm.d * scale).round() as u32).max(1);
    let x = (ctm.e * scale).round() as i64;
    // PDF origin is bottom-left, raster origin is top-left.
    let y = (canvas.height() as f32 - (ctm.f + ctm.d) * scale).round() as i64;
    let placed = img.resize_exact(w, h, FilterType::Triangle).to_rgba8();
    imageops::overlay(canvas, &placed, x, y);
}
