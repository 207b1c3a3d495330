// Skeleton overlay rendering and status text
//
// The renderer is stateless: every call clears the surface and draws from its inputs only.

use crate::core::config::Config;
use crate::models::pose::{CocoPart, Detection};
use serde::{Deserialize, Serialize};

/// 8-bit RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Color per COCO part id, also indexed by pose-line position
pub const COCO_COLORS: [Rgb; 18] = [
    Rgb::new(255, 0, 0),
    Rgb::new(255, 85, 0),
    Rgb::new(255, 170, 0),
    Rgb::new(255, 255, 0),
    Rgb::new(170, 255, 0),
    Rgb::new(85, 255, 0),
    Rgb::new(0, 255, 0),
    Rgb::new(0, 255, 85),
    Rgb::new(0, 255, 170),
    Rgb::new(0, 255, 255),
    Rgb::new(0, 170, 255),
    Rgb::new(0, 85, 255),
    Rgb::new(0, 0, 255),
    Rgb::new(85, 0, 255),
    Rgb::new(170, 0, 255),
    Rgb::new(255, 0, 255),
    Rgb::new(255, 0, 170),
    Rgb::new(255, 0, 85),
];

/// 2-D drawing capability the renderer draws onto
pub trait DrawSurface {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /// Erase everything previously drawn
    fn clear(&mut self);

    fn draw_point(&mut self, x: f32, y: f32, radius: f32, color: Rgb);

    fn draw_line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, width: f32, color: Rgb);

    /// Place text centered on (x, y). A surface may keep the string for its
    /// presenter instead of rasterizing glyphs.
    fn fill_text(&mut self, text: &str, x: f32, y: f32);
}

/// Draws keypoint markers and skeleton lines for every detected subject
#[derive(Debug, Clone)]
pub struct OverlayRenderer {
    part_colors: Vec<Rgb>,
    line_colors: Vec<Rgb>,
    allowed_parts: Vec<String>,
    point_radius: f32,
    line_width: f32,
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new(4.0, 2.0)
    }
}

impl OverlayRenderer {
    /// Renderer with the COCO color table and all 18 COCO parts allowed
    pub fn new(point_radius: f32, line_width: f32) -> Self {
        Self {
            part_colors: COCO_COLORS.to_vec(),
            line_colors: COCO_COLORS.to_vec(),
            allowed_parts: CocoPart::ALL.iter().map(|p| p.name().to_string()).collect(),
            point_radius,
            line_width,
        }
    }

    /// Renderer with the configured color tables, allow-list and marker sizes
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.point_radius, config.line_width)
            .with_colors(config.part_colors.clone(), config.line_colors.clone())
            .with_allowed_parts(config.allowed_parts.clone())
    }

    /// Restrict which part names get a marker
    pub fn with_allowed_parts(mut self, parts: Vec<String>) -> Self {
        self.allowed_parts = parts;
        self
    }

    pub fn with_colors(mut self, part_colors: Vec<Rgb>, line_colors: Vec<Rgb>) -> Self {
        self.part_colors = part_colors;
        self.line_colors = line_colors;
        self
    }

    /// Clear the surface, then draw markers and lines for each prediction.
    /// An empty prediction list leaves a cleared surface.
    pub fn render<S: DrawSurface + ?Sized>(&self, surface: &mut S, predictions: &[Detection]) {
        surface.clear();

        for detection in predictions {
            for part in &detection.body_parts {
                if !self.allowed_parts.iter().any(|p| p == &part.part_name) {
                    continue;
                }
                if let Some(color) = Self::color_at(&self.part_colors, part.part_id as usize) {
                    surface.draw_point(part.x, part.y, self.point_radius, color);
                }
            }

            for (index, line) in detection.pose_lines.iter().enumerate() {
                if let Some(color) = Self::color_at(&self.line_colors, index) {
                    surface.draw_line(line.x1, line.y1, line.x2, line.y2, self.line_width, color);
                }
            }
        }
    }

    // Tables wrap around so detectors with more parts/lines than colors still render
    fn color_at(table: &[Rgb], index: usize) -> Option<Rgb> {
        if table.is_empty() {
            None
        } else {
            Some(table[index % table.len()])
        }
    }
}

/// Clear the surface and draw `text` centered on it
pub fn render_status<S: DrawSurface + ?Sized>(surface: &mut S, text: &str) {
    surface.clear();
    let x = surface.width() as f32 / 2.0;
    let y = surface.height() as f32 / 2.0;
    surface.fill_text(text, x, y);
}

/// Timer text: elapsed seconds with one decimal place
pub fn format_timer(elapsed_ms: i64) -> String {
    format!("{:.1} seconds", elapsed_ms as f64 / 1000.0)
}
