//! Raster overlay surface backed by an RGBA image.

use ab_glyph::{FontArc, PxScale};
use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use std::path::Path;

use super::{Rect, Surface, FONT_SIZE};

/// Average advance of a 16px sans-serif glyph, used when no font is loaded.
const FALLBACK_ADVANCE: f64 = FONT_SIZE as f64 * 0.6;
const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

pub struct ImageSurface {
    image: RgbaImage,
    font: Option<FontArc>,
    scale: PxScale,
}

impl ImageSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
            font: None,
            scale: PxScale::from(FONT_SIZE),
        }
    }

    /// Load a TTF/OTF font for label text. Without one, labels get their
    /// background box but no glyphs.
    pub fn with_font_file(mut self, path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("read overlay font {}", path.display()))?;
        let font = FontArc::try_from_vec(bytes)
            .map_err(|err| anyhow::anyhow!("invalid overlay font {}: {}", path.display(), err))?;
        self.font = Some(font);
        Ok(self)
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    pub fn save_png(&self, path: &Path) -> Result<()> {
        self.image
            .save_with_format(path, image::ImageFormat::Png)
            .with_context(|| format!("write overlay {}", path.display()))
    }
}

fn pixel_rect(rect: Rect) -> Option<imageproc::rect::Rect> {
    let width = rect.width.round();
    let height = rect.height.round();
    if width < 1.0 || height < 1.0 {
        return None;
    }
    Some(
        imageproc::rect::Rect::at(rect.x.round() as i32, rect.y.round() as i32)
            .of_size(width as u32, height as u32),
    )
}

impl Surface for ImageSurface {
    fn resize(&mut self, width: u32, height: u32) {
        if self.image.dimensions() != (width, height) {
            self.image = RgbaImage::new(width, height);
        }
    }

    fn clear(&mut self) {
        for pixel in self.image.pixels_mut() {
            *pixel = TRANSPARENT;
        }
    }

    fn stroke_rect(&mut self, rect: Rect, color: Rgba<u8>, line_width: f64) {
        // centred on the edge, like a canvas stroke
        let passes = line_width.round().max(1.0) as i32;
        let inset = f64::from(passes / 2);
        for pass in 0..passes {
            let grow = inset - f64::from(pass);
            let ring = Rect {
                x: rect.x - grow,
                y: rect.y - grow,
                width: rect.width + grow * 2.0,
                height: rect.height + grow * 2.0,
            };
            if let Some(ring) = pixel_rect(ring) {
                draw_hollow_rect_mut(&mut self.image, ring, color);
            }
        }
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba<u8>) {
        if let Some(rect) = pixel_rect(rect) {
            draw_filled_rect_mut(&mut self.image, rect, color);
        }
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64, color: Rgba<u8>) {
        let Some(font) = self.font.as_ref() else {
            return;
        };
        draw_text_mut(
            &mut self.image,
            color,
            x.round() as i32,
            y.round() as i32,
            self.scale,
            font,
            text,
        );
    }

    fn measure_text(&self, text: &str) -> f64 {
        match self.font.as_ref() {
            Some(font) => f64::from(text_size(self.scale, font, text).0),
            None => text.chars().count() as f64 * FALLBACK_ADVANCE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, Detection};
    use crate::overlay::{OverlayRenderer, Viewport, NON_BIODEGRADABLE_COLOR};

    #[test]
    fn draws_box_edges_and_label_background() {
        let mut surface = ImageSurface::new(1, 1);
        let detections = vec![Detection {
            label: "bottle".to_string(),
            confidence: 0.9,
            bounding_box: BoundingBox::new(20.0, 40.0, 60.0, 90.0),
        }];
        let drawn = OverlayRenderer::default().render(
            &mut surface,
            true,
            &detections,
            (100, 100),
            Viewport::new(100.0, 100.0),
        );
        assert_eq!(drawn, 1);
        assert_eq!(surface.image().dimensions(), (100, 100));
        // left edge of the box
        assert_eq!(*surface.image().get_pixel(20, 60), NON_BIODEGRADABLE_COLOR);
        // inside the box stays clear
        assert_eq!(*surface.image().get_pixel(40, 60), TRANSPARENT);
        // label background sits above the box
        assert_eq!(*surface.image().get_pixel(22, 25), NON_BIODEGRADABLE_COLOR);
    }

    #[test]
    fn draws_outline_of_box_with_swapped_corners() {
        let mut surface = ImageSurface::new(100, 100);
        let detections = vec![Detection {
            label: "bottle".to_string(),
            confidence: 0.9,
            bounding_box: BoundingBox::new(60.0, 90.0, 20.0, 40.0),
        }];
        OverlayRenderer::default().render(
            &mut surface,
            true,
            &detections,
            (100, 100),
            Viewport::new(100.0, 100.0),
        );
        assert_eq!(*surface.image().get_pixel(20, 60), NON_BIODEGRADABLE_COLOR);
        assert_eq!(*surface.image().get_pixel(59, 60), NON_BIODEGRADABLE_COLOR);
        assert_eq!(*surface.image().get_pixel(40, 89), NON_BIODEGRADABLE_COLOR);
        assert_eq!(*surface.image().get_pixel(40, 60), TRANSPARENT);
    }

    #[test]
    fn clear_resets_every_pixel() {
        let mut surface = ImageSurface::new(8, 8);
        surface.fill_rect(
            Rect {
                x: 0.0,
                y: 0.0,
                width: 8.0,
                height: 8.0,
            },
            NON_BIODEGRADABLE_COLOR,
        );
        surface.clear();
        assert!(surface.image().pixels().all(|p| *p == TRANSPARENT));
    }

    #[test]
    fn measures_without_a_font() {
        let surface = ImageSurface::new(1, 1);
        assert!(!surface.has_font());
        assert_eq!(surface.measure_text("abcde"), 5.0 * FALLBACK_ADVANCE);
    }

    #[test]
    fn missing_font_file_is_an_error() {
        let result = ImageSurface::new(1, 1).with_font_file(Path::new("/nonexistent/font.ttf"));
        assert!(result.is_err());
    }
}
