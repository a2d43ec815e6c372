//! Draws detection boxes onto the scanned image for preview.

use std::path::Path;

use anyhow::Context;
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};

use crate::core::detection::Detection;

pub const BOX_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
const BOX_THICKNESS: i32 = 2;
/// Longest edge of a rendered preview.
pub const PREVIEW_MAX_EDGE: u32 = 1024;

/// Copy of `image` with a red outline around every detection.
pub fn annotate(image: &DynamicImage, detections: &[Detection]) -> RgbaImage {
    annotate_scaled(image, detections, image.width(), image.height())
}

/// Like [`annotate`] for an image resized from `source_width` x
/// `source_height`. Boxes are in source pixels.
pub fn annotate_scaled(
    image: &DynamicImage,
    detections: &[Detection],
    source_width: u32,
    source_height: u32,
) -> RgbaImage {
    let mut canvas = image.to_rgba8();
    let (width, height) = canvas.dimensions();
    let (w, h) = (width as f64, height as f64);

    for detection in detections {
        if !detection.bbox.is_well_formed() {
            continue;
        }
        let Some(rel) = detection.bbox.relative_to(source_width, source_height) else {
            continue;
        };
        let x1 = (rel.left * w).round() as i32;
        let y1 = (rel.top * h).round() as i32;
        let x2 = (((rel.left + rel.width) * w).round() as i32).min(width as i32);
        let y2 = (((rel.top + rel.height) * h).round() as i32).min(height as i32);
        for offset in 0..BOX_THICKNESS {
            let bw = x2 - x1 - 2 * offset;
            let bh = y2 - y1 - 2 * offset;
            if bw <= 0 || bh <= 0 {
                break;
            }
            let rect = Rect::at(x1 + offset, y1 + offset).of_size(bw as u32, bh as u32);
            draw_hollow_rect_mut(&mut canvas, rect, BOX_COLOR);
        }
    }
    canvas
}

/// Loads the image at `path`, shrinks it to at most [`PREVIEW_MAX_EDGE`] and
/// annotates it.
pub fn load_annotated(path: &Path, detections: &[Detection]) -> anyhow::Result<RgbaImage> {
    let image = image::open(path).with_context(|| format!("Failed to open image {:?}", path))?;
    let (source_width, source_height) = (image.width(), image.height());
    let preview = if source_width.max(source_height) > PREVIEW_MAX_EDGE {
        image.thumbnail(PREVIEW_MAX_EDGE, PREVIEW_MAX_EDGE)
    } else {
        image
    };
    Ok(annotate_scaled(&preview, detections, source_width, source_height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::detection::BoundingBox;
    use image::{ImageBuffer, Rgb};

    fn detection(coords: [f64; 4]) -> Detection {
        Detection {
            bbox: BoundingBox::from(coords),
            confidence: 0.9,
            label: None,
        }
    }

    fn gray_image() -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_fn(100, 100, |_, _| Rgb([128u8, 128, 128])))
    }

    #[test]
    fn draws_box_edges_only() {
        let out = annotate(&gray_image(), &[detection([10.0, 10.0, 50.0, 50.0])]);

        assert_eq!(*out.get_pixel(10, 10), BOX_COLOR);
        assert_eq!(*out.get_pixel(49, 30), BOX_COLOR);
        assert_eq!(*out.get_pixel(11, 30), BOX_COLOR);
        assert_eq!(*out.get_pixel(30, 30), Rgba([128, 128, 128, 255]));
        assert_eq!(*out.get_pixel(5, 5), Rgba([128, 128, 128, 255]));
    }

    #[test]
    fn skips_malformed_and_clips_to_image() {
        let out = annotate(
            &gray_image(),
            &[detection([60.0, 60.0, 20.0, 20.0]), detection([80.0, 80.0, 150.0, 150.0])],
        );

        assert_eq!(*out.get_pixel(40, 40), Rgba([128, 128, 128, 255]));
        assert_eq!(*out.get_pixel(80, 90), BOX_COLOR);
        assert_eq!(*out.get_pixel(99, 90), BOX_COLOR);
    }

    #[test]
    fn maps_source_boxes_onto_downscaled_preview() {
        let boxes = [detection([20.0, 20.0, 100.0, 100.0])];
        let out = annotate_scaled(&gray_image(), &boxes, 200, 200);

        assert_eq!(*out.get_pixel(10, 10), BOX_COLOR);
        assert_eq!(*out.get_pixel(49, 30), BOX_COLOR);
        assert_eq!(*out.get_pixel(30, 30), Rgba([128, 128, 128, 255]));
        assert_eq!(*out.get_pixel(60, 60), Rgba([128, 128, 128, 255]));
    }

    #[test]
    fn large_images_are_previewed_downscaled() {
        let file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        DynamicImage::ImageRgb8(ImageBuffer::from_fn(2048, 1024, |_, _| Rgb([0u8, 0, 0])))
            .save(file.path())
            .unwrap();

        let out = load_annotated(file.path(), &[detection([200.0, 200.0, 600.0, 600.0])]).unwrap();

        assert_eq!(out.dimensions(), (1024, 512));
        assert_eq!(*out.get_pixel(100, 100), BOX_COLOR);
        assert_eq!(*out.get_pixel(150, 150), Rgba([0, 0, 0, 255]));
    }
}
