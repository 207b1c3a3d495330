// Drawing surfaces: an in-memory raster canvas and a command recorder

use crate::core::overlay::{DrawSurface, Rgb};
use image::{ImageBuffer, Rgba, RgbaImage};
use std::path::Path;

// ==============================================================================
// Raster Surface
// ==============================================================================

/// RGBA canvas backed by the `image` crate.
///
/// Points and lines are rasterized; text is not rendered into pixels and is kept
/// as `last_text` for whoever presents the surface.
pub struct RasterSurface {
    image: RgbaImage,
    last_text: Option<String>,
}

impl RasterSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: ImageBuffer::new(width, height),
            last_text: None,
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn last_text(&self) -> Option<&str> {
        self.last_text.as_deref()
    }

    pub fn save_png(&self, path: &Path) -> Result<(), image::ImageError> {
        self.image.save_with_format(path, image::ImageFormat::Png)
    }

    /// Pixel bounds of a float box intersected with the canvas; `None` when they don't overlap
    fn clip(&self, min_x: f32, max_x: f32, min_y: f32, max_y: f32) -> Option<(i64, i64, i64, i64)> {
        let last_x = self.image.width() as i64 - 1;
        let last_y = self.image.height() as i64 - 1;
        let min_x = (min_x.floor() as i64).max(0);
        let max_x = (max_x.ceil() as i64).min(last_x);
        let min_y = (min_y.floor() as i64).max(0);
        let max_y = (max_y.ceil() as i64).min(last_y);

        if min_x > max_x || min_y > max_y {
            None
        } else {
            Some((min_x, max_x, min_y, max_y))
        }
    }

    fn put(&mut self, x: i64, y: i64, color: Rgb) {
        if x < 0 || y < 0 || x >= self.image.width() as i64 || y >= self.image.height() as i64 {
            return;
        }
        self.image
            .put_pixel(x as u32, y as u32, Rgba([color.r, color.g, color.b, 255]));
    }
}

impl DrawSurface for RasterSurface {
    fn width(&self) -> u32 {
        self.image.width()
    }

    fn height(&self) -> u32 {
        self.image.height()
    }

    fn clear(&mut self) {
        for pixel in self.image.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
        self.last_text = None;
    }

    fn draw_point(&mut self, x: f32, y: f32, radius: f32, color: Rgb) {
        if !(x.is_finite() && y.is_finite() && radius.is_finite()) {
            return;
        }
        let r = radius.max(0.5);
        let Some((min_x, max_x, min_y, max_y)) = self.clip(x - r, x + r, y - r, y + r) else {
            return;
        };

        for py in min_y..=max_y {
            for px in min_x..=max_x {
                let dx = px as f32 - x;
                let dy = py as f32 - y;
                if dx * dx + dy * dy <= r * r {
                    self.put(px, py, color);
                }
            }
        }
    }

    fn draw_line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, width: f32, color: Rgb) {
        if ![x1, y1, x2, y2, width].iter().all(|v| v.is_finite()) {
            return;
        }
        let half = (width / 2.0).max(0.5);
        let Some((min_x, max_x, min_y, max_y)) = self.clip(
            x1.min(x2) - half,
            x1.max(x2) + half,
            y1.min(y2) - half,
            y1.max(y2) + half,
        ) else {
            return;
        };

        for py in min_y..=max_y {
            for px in min_x..=max_x {
                if distance_to_segment(px as f32, py as f32, x1, y1, x2, y2) <= half {
                    self.put(px, py, color);
                }
            }
        }
    }

    fn fill_text(&mut self, text: &str, _x: f32, _y: f32) {
        self.last_text = Some(text.to_string());
    }
}

fn distance_to_segment(px: f32, py: f32, x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
    let (dx, dy) = (x2 - x1, y2 - y1);
    let length_sq = dx * dx + dy * dy;
    let t = if length_sq == 0.0 {
        0.0
    } else {
        (((px - x1) * dx + (py - y1) * dy) / length_sq).clamp(0.0, 1.0)
    };
    let (cx, cy) = (x1 + t * dx, y1 + t * dy);
    ((px - cx).powi(2) + (py - cy).powi(2)).sqrt()
}

// ==============================================================================
// Recording Surface
// ==============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Point { x: f32, y: f32, radius: f32, color: Rgb },
    Line { x1: f32, y1: f32, x2: f32, y2: f32, width: f32, color: Rgb },
    Text { text: String, x: f32, y: f32 },
}

/// Surface that keeps the draw commands issued since the last clear
#[derive(Debug, Clone)]
pub struct RecordingSurface {
    width: u32,
    height: u32,
    commands: Vec<DrawCommand>,
    clears: usize,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            commands: Vec::new(),
            clears: 0,
        }
    }

    /// Commands currently visible (issued after the last clear)
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Text of the most recent text command, if any is visible
    pub fn text(&self) -> Option<&str> {
        self.commands.iter().rev().find_map(|c| match c {
            DrawCommand::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn clears(&self) -> usize {
        self.clears
    }
}

impl DrawSurface for RecordingSurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn clear(&mut self) {
        self.commands.clear();
        self.clears += 1;
    }

    fn draw_point(&mut self, x: f32, y: f32, radius: f32, color: Rgb) {
        self.commands.push(DrawCommand::Point { x, y, radius, color });
    }

    fn draw_line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, width: f32, color: Rgb) {
        self.commands.push(DrawCommand::Line { x1, y1, x2, y2, width, color });
    }

    fn fill_text(&mut self, text: &str, x: f32, y: f32) {
        self.commands.push(DrawCommand::Text {
            text: text.to_string(),
            x,
            y,
        });
    }
}
