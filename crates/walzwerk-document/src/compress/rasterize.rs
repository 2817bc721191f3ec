// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rasterization engine: renders every page to a bitmap and assembles a new
// document holding one full-page JPEG per page. Destroys text and vector
// content by design; the fallback of last resort.

use image::codecs::jpeg::JpegEncoder;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use tracing::{debug, instrument};

use walzwerk_core::{
    CancelToken, CompressionLevel, Progress, ProgressStage, Result, WalzwerkError,
};

use crate::compress::render::PageRenderer;
use crate::pdf::accessor;

/// Renders `input` page by page and returns a rebuilt document where each
/// page is a single image sized to the original page's point dimensions.
#[instrument(skip_all, fields(input_len = input.len(), ?level))]
pub fn rasterize(
    input: &[u8],
    level: CompressionLevel,
    renderer: &dyn PageRenderer,
    cancel: &CancelToken,
    progress: &mut dyn FnMut(Progress),
) -> Result<Vec<u8>> {
    let source = accessor::load_document(input)?;
    let scale = level.raster_scale();
    let quality = (level.raster_quality() * 100.0).clamp(1.0, 100.0) as u8;

    let pages = source.get_pages();
    let total = pages.len();
    if total == 0 {
        progress(Progress {
            stage: ProgressStage::Pages,
            completed: 0,
            total: 0,
        });
    }

    let mut output = Document::with_version("1.5");
    let pages_id = output.new_object_id();
    let mut kids = Vec::with_capacity(total);

    for (index, (_, page_id)) in pages.into_iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(WalzwerkError::Cancelled);
        }
        let bitmap = renderer.render_page(&source, page_id, scale)?;
        let (px_w, px_h) = (bitmap.width(), bitmap.height());

        let mut jpeg = Vec::new();
        bitmap
            .write_with_encoder(JpegEncoder::new_with_quality(&mut jpeg, quality))
            .map_err(|e| WalzwerkError::Render(format!("page encode: {e}")))?;
        debug!(page = index + 1, px_w, px_h, jpeg_len = jpeg.len(), "page rendered");

        let image_id = output.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => px_w as i64,
                "Height" => px_h as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg,
        ));

        // Page keeps its point size; the bitmap covers it edge to edge.
        let w_pt = px_w as f32 / scale;
        let h_pt = px_h as f32 / scale;
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        w_pt.into(),
                        0.into(),
                        0.into(),
                        h_pt.into(),
                        0.into(),
                        0.into(),
                    ],
                ),
                Operation::new("Do", vec!["Im0".into()]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = output.add_object(Stream::new(
            dictionary! {},
            content
                .encode()
                .map_err(|e| WalzwerkError::Serialize(e.to_string()))?,
        ));

        let page = output.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), w_pt.into(), h_pt.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
        });
        kids.push(page.into());

        progress(Progress {
            stage: ProgressStage::Pages,
            completed: index + 1,
            total,
        });
    }

    output.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => total as i64,
        }),
    );
    let catalog_id = output.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    output.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    output
        .save_to(&mut buffer)
        .map_err(|e| WalzwerkError::Serialize(e.to_string()))?;
    Ok(buffer)
}
