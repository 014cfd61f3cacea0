use crate::math::{PixelScale, Vec2, DEFAULT_PIXELS_PER_UNIT};
use crate::scene_graph::Rgba;
use crate::sim::boundary::{default_boundaries, BoundarySpec};
use crate::sim::clock::DEFAULT_STEPS_PER_SECOND;

/// 0x1099bb
pub const DEFAULT_BACKGROUND: Rgba = [0x10, 0x99, 0xbb, 0xff];

/// Initial world parameters and toggle states.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldConfig {
    /// Units per second squared; positive y points down the screen.
    pub gravity: Vec2,
    pub pixels_per_unit: f32,
    pub steps_per_second: u32,
    pub boundaries: Vec<BoundarySpec>,
    pub draw_debug_lines: bool,
    pub use_interpolation: bool,
    pub bullet_mode: bool,
    pub background: Rgba,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: Vec2::new(0.0, 10.0),
            pixels_per_unit: DEFAULT_PIXELS_PER_UNIT,
            steps_per_second: DEFAULT_STEPS_PER_SECOND,
            boundaries: default_boundaries(),
            draw_debug_lines: false,
            use_interpolation: true,
            bullet_mode: false,
            background: DEFAULT_BACKGROUND,
        }
    }
}

impl WorldConfig {
    pub fn pixel_scale(&self) -> PixelScale {
        PixelScale::new(self.pixels_per_unit)
    }
}
