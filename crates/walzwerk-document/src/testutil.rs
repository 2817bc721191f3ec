// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Synthetic PDF builders shared across the test modules.

use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use image::RgbImage;
use image::codecs::jpeg::JpegEncoder;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, SaveOptions, Stream, dictionary};

/// Deterministic xorshift noise: incompressible raw pixel data.
pub(crate) fn noise_rgb(w: u32, h: u32, seed: u32) -> Vec<u8> {
    let mut state = seed.wrapping_mul(2654435761).max(1);
    let mut out = Vec::with_capacity((w * h * 3) as usize);
    for _ in 0..w * h * 3 {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        out.push((state & 0xFF) as u8);
    }
    out
}

/// Smooth two-axis gradient: compresses well as JPEG, poorly as raw zlib.
pub(crate) fn gradient_rgb(w: u32, h: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity((w * h * 3) as usize);
    for y in 0..h {
        for x in 0..w {
            out.push((x * 255 / w.max(1)) as u8);
            out.push((y * 255 / h.max(1)) as u8);
            out.push(((x + y) * 255 / (w + h).max(1)) as u8);
        }
    }
    out
}

pub(crate) fn solid_rgb(w: u32, h: u32, rgb: [u8; 3]) -> Vec<u8> {
    rgb.repeat((w * h) as usize)
}

fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub(crate) fn flate_rgb_stream(w: u32, h: u32, raw: &[u8]) -> Stream {
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => w as i64,
            "Height" => h as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        },
        zlib(raw),
    )
}

pub(crate) fn flate_cmyk_stream(w: u32, h: u32, raw: &[u8]) -> Stream {
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => w as i64,
            "Height" => h as i64,
            "ColorSpace" => "DeviceCMYK",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        },
        zlib(raw),
    )
}

pub(crate) fn jpeg_stream_q(w: u32, h: u32, rgb: &[u8], quality: u8) -> Stream {
    let img = RgbImage::from_raw(w, h, rgb.to_vec()).unwrap();
    let mut jpeg = Vec::new();
    img.write_with_encoder(JpegEncoder::new_with_quality(&mut jpeg, quality))
        .unwrap();
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => w as i64,
            "Height" => h as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        jpeg,
    )
}

pub(crate) fn jpeg_stream(w: u32, h: u32, rgb: &[u8]) -> Stream {
    jpeg_stream_q(w, h, rgb, 90)
}

fn text_operations() -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 24.into()]),
        Operation::new("Td", vec![72.into(), 700.into()]),
        Operation::new("Tj", vec![Object::string_literal("Lorem ipsum dolor sit")]),
        Operation::new("ET", vec![]),
    ]
}

fn assemble(doc: &mut Document, image_streams: Vec<Stream>, page_count: usize) {
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut xobjects = lopdf::Dictionary::new();
    let mut operations = text_operations();
    for (i, stream) in image_streams.into_iter().enumerate() {
        let id = doc.add_object(stream);
        let name = format!("Im{i}");
        xobjects.set(name.clone(), id);
        operations.push(Operation::new("q", vec![]));
        operations.push(Operation::new(
            "cm",
            vec![
                100.into(),
                0.into(),
                0.into(),
                100.into(),
                (72 + 120 * i as i64).into(),
                300.into(),
            ],
        ));
        operations.push(Operation::new("Do", vec![name.as_str().into()]));
        operations.push(Operation::new("Q", vec![]));
    }

    let mut resources = dictionary! { "Font" => dictionary! { "F1" => font_id } };
    if !xobjects.is_empty() {
        resources.set("XObject", xobjects);
    }
    let resources_id = doc.add_object(resources);

    let content = Content { operations };
    let mut kids = Vec::new();
    for _ in 0..page_count {
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
}

fn save_classic(mut doc: Document) -> Vec<u8> {
    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

/// One page carrying the given images, plus a line of text.
pub(crate) fn pdf_with_images(image_streams: Vec<Stream>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    assemble(&mut doc, image_streams, 1);
    save_classic(doc)
}

/// Text-only document with `pages` identical pages.
pub(crate) fn text_pdf(pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    assemble(&mut doc, Vec::new(), pages);
    save_classic(doc)
}

/// Text-only document already saved with object and xref streams, so a
/// classic resave can only grow it.
pub(crate) fn compact_text_pdf(pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    assemble(&mut doc, Vec::new(), pages);
    let mut out = Vec::new();
    let options = SaveOptions::builder()
        .use_object_streams(true)
        .use_xref_streams(true)
        .build();
    doc.save_with_options(&mut out, options).unwrap();
    out
}

/// Text document with a populated /Info dictionary.
pub(crate) fn text_pdf_with_info(title: &str, producer: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    assemble(&mut doc, Vec::new(), 1);
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(title),
        "Producer" => Object::string_literal(producer),
    });
    doc.trailer.set("Info", info_id);
    save_classic(doc)
}

/// One page with a noise image whose soft mask makes the left half fully
/// transparent and the right half opaque.
pub(crate) fn pdf_with_alpha_image(w: u32, h: u32) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");

    let mut mask = Vec::with_capacity((w * h) as usize);
    for _ in 0..h {
        for x in 0..w {
            mask.push(if x < w / 2 { 0 } else { 255 });
        }
    }
    let mask_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => w as i64,
            "Height" => h as i64,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        },
        zlib(&mask),
    ));

    let mut base = flate_rgb_stream(w, h, &noise_rgb(w, h, 42));
    base.dict.set("SMask", mask_id);
    assemble(&mut doc, vec![base], 1);
    save_classic(doc)
}

/// One page with a JPEG image whose soft mask has different dimensions than
/// the base, so the mask cannot be merged and stays in place. The mask is
/// incompressible noise to give it real weight on disk.
pub(crate) fn pdf_with_mismatched_mask(w: u32, h: u32, mask_w: u32, mask_h: u32) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let mask: Vec<u8> = noise_rgb(mask_w, mask_h, 99)
        .into_iter()
        .step_by(3)
        .collect();
    let mask_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => mask_w as i64,
            "Height" => mask_h as i64,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        },
        zlib(&mask),
    ));
    let mut base = jpeg_stream_q(w, h, &gradient_rgb(w, h), 20);
    base.dict.set("SMask", mask_id);
    assemble(&mut doc, vec![base], 1);
    save_classic(doc)
}

/// Single page of the given point size with one image placed by `cm`.
pub(crate) fn single_image_page(
    image: Stream,
    cm: [f32; 6],
    page_w: f32,
    page_h: f32,
) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let image_id = doc.add_object(image);

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    cm[0].into(),
                    cm[1].into(),
                    cm[2].into(),
                    cm[3].into(),
                    cm[4].into(),
                    cm[5].into(),
                ],
            ),
            Operation::new("Do", vec!["Im0".into()]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), page_w.into(), page_h.into()],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    save_classic(doc)
}
