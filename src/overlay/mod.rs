//! Bounding-box overlay.
//!
//! Detections arrive in source-frame pixels; the overlay is drawn over the
//! on-screen video rectangle. Each axis is scaled independently
//! (`display / source`), boxes are coloured by waste type and tagged with
//! `"Label (NN%)"` on a filled background placed above the box, or just
//! inside its top edge when there is no room above.

pub mod surface;

pub use surface::ImageSurface;

use image::Rgba;

use crate::detect::{BoundingBox, Detection, WasteType, WasteTypeTable};
use crate::format::{format_confidence, format_label};
use crate::session::SessionSnapshot;

pub const STROKE_WIDTH: f64 = 2.0;
pub const FONT_SIZE: f32 = 16.0;
pub const LABEL_HEIGHT: f64 = 20.0;
pub const LABEL_PADDING: f64 = 4.0;
pub const LABEL_GAP: f64 = 2.0;

pub const BIODEGRADABLE_COLOR: Rgba<u8> = Rgba([0x22, 0xc5, 0x5e, 0xff]);
pub const NON_BIODEGRADABLE_COLOR: Rgba<u8> = Rgba([0xef, 0x44, 0x44, 0xff]);
pub const TEXT_COLOR: Rgba<u8> = Rgba([0xff, 0xff, 0xff, 0xff]);

pub fn overlay_color(waste_type: WasteType) -> Rgba<u8> {
    match waste_type {
        WasteType::Biodegradable => BIODEGRADABLE_COLOR,
        WasteType::NonBiodegradable => NON_BIODEGRADABLE_COLOR,
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// On-screen size of the rendered video.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Drawing target.
pub trait Surface {
    fn resize(&mut self, width: u32, height: u32);
    fn clear(&mut self);
    fn stroke_rect(&mut self, rect: Rect, color: Rgba<u8>, line_width: f64);
    fn fill_rect(&mut self, rect: Rect, color: Rgba<u8>);
    fn fill_text(&mut self, text: &str, x: f64, y: f64, color: Rgba<u8>);
    fn measure_text(&self, text: &str) -> f64;
}

/// One box ready to draw, in display coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayBox {
    pub bounds: BoundingBox,
    pub label: String,
    pub color: Rgba<u8>,
    pub label_rect: Rect,
}

#[derive(Clone, Debug, Default)]
pub struct OverlayRenderer {
    table: WasteTypeTable,
}

impl OverlayRenderer {
    pub fn new(table: WasteTypeTable) -> Self {
        Self { table }
    }

    /// Per-axis scale from source pixels to the viewport. Unknown source
    /// dimensions fall back to the viewport size.
    pub fn scale(source: (u32, u32), viewport: Viewport) -> (f64, f64) {
        let source_w = if source.0 == 0 {
            viewport.width
        } else {
            source.0 as f64
        };
        let source_h = if source.1 == 0 {
            viewport.height
        } else {
            source.1 as f64
        };
        if source_w <= 0.0 || source_h <= 0.0 {
            return (1.0, 1.0);
        }
        (viewport.width / source_w, viewport.height / source_h)
    }

    pub fn plan(
        &self,
        detections: &[Detection],
        source: (u32, u32),
        viewport: Viewport,
        measure: impl Fn(&str) -> f64,
    ) -> Vec<OverlayBox> {
        let (scale_x, scale_y) = Self::scale(source, viewport);
        detections
            .iter()
            .map(|detection| {
                // corner order is not guaranteed by the detector
                let bounds = detection
                    .bounding_box
                    .scaled(scale_x, scale_y)
                    .normalized();
                let label = format!(
                    "{} ({}%)",
                    format_label(&detection.label),
                    format_confidence(detection.confidence)
                );
                let label_y = if bounds.y1 - LABEL_HEIGHT - LABEL_GAP < 0.0 {
                    bounds.y1 + LABEL_GAP
                } else {
                    bounds.y1 - LABEL_HEIGHT - LABEL_GAP
                };
                let label_rect = Rect {
                    x: bounds.x1,
                    y: label_y,
                    width: measure(&label) + LABEL_PADDING * 2.0,
                    height: LABEL_HEIGHT,
                };
                OverlayBox {
                    bounds,
                    color: overlay_color(self.table.lookup(&detection.label)),
                    label,
                    label_rect,
                }
            })
            .collect()
    }

    /// Clear the surface and, for an active session, draw every detection.
    /// Returns the number of boxes drawn.
    pub fn render<S: Surface + ?Sized>(
        &self,
        surface: &mut S,
        active: bool,
        detections: &[Detection],
        source: (u32, u32),
        viewport: Viewport,
    ) -> usize {
        surface.resize(
            viewport.width.max(0.0).round() as u32,
            viewport.height.max(0.0).round() as u32,
        );
        surface.clear();
        if !active {
            return 0;
        }
        let boxes = self.plan(detections, source, viewport, |text| {
            surface.measure_text(text)
        });
        for overlay in &boxes {
            let b = overlay.bounds;
            surface.stroke_rect(
                Rect {
                    x: b.x1,
                    y: b.y1,
                    width: b.width(),
                    height: b.height(),
                },
                overlay.color,
                STROKE_WIDTH,
            );
            surface.fill_rect(overlay.label_rect, overlay.color);
            surface.fill_text(
                &overlay.label,
                overlay.label_rect.x + LABEL_PADDING,
                overlay.label_rect.y + LABEL_GAP,
                TEXT_COLOR,
            );
        }
        boxes.len()
    }
}

#[derive(Clone, Debug, PartialEq)]
struct OverlayInputs {
    active: bool,
    detections: Vec<Detection>,
    source: (u32, u32),
    viewport: Viewport,
}

/// A surface kept in sync with a session: redraws only when the detections,
/// the source dimensions or the viewport change.
pub struct LiveOverlay<S: Surface> {
    renderer: OverlayRenderer,
    surface: S,
    last: Option<OverlayInputs>,
}

impl<S: Surface> LiveOverlay<S> {
    pub fn new(renderer: OverlayRenderer, surface: S) -> Self {
        Self {
            renderer,
            surface,
            last: None,
        }
    }

    /// Returns `true` when the surface was redrawn.
    pub fn update(&mut self, snapshot: &SessionSnapshot, viewport: Viewport) -> bool {
        let inputs = OverlayInputs {
            active: snapshot.is_active(),
            detections: snapshot.detections.clone(),
            source: snapshot.source_dimensions,
            viewport,
        };
        if self.last.as_ref() == Some(&inputs) {
            return false;
        }
        self.renderer.render(
            &mut self.surface,
            inputs.active,
            &inputs.detections,
            inputs.source,
            inputs.viewport,
        );
        self.last = Some(inputs);
        true
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }
}
