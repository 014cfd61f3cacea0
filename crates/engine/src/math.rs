use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn lerp(self, other: Vec2, t: f32) -> Vec2 {
        Vec2 {
            x: lerp(self.x, other.x, t),
            y: lerp(self.y, other.y, t),
        }
    }

    pub fn rotated(self, angle_radians: f32) -> Vec2 {
        let (sin, cos) = angle_radians.sin_cos();
        Vec2 {
            x: self.x * cos - self.y * sin,
            y: self.x * sin + self.y * cos,
        }
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

pub fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t
}

/// Conversion between screen pixels and physics units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelScale {
    pixels_per_unit: f32,
    units_per_pixel: f32,
}

pub const DEFAULT_PIXELS_PER_UNIT: f32 = 30.0;

impl Default for PixelScale {
    fn default() -> Self {
        Self::new(DEFAULT_PIXELS_PER_UNIT)
    }
}

impl PixelScale {
    /// Non-positive or non-finite inputs fall back to the default scale.
    pub fn new(pixels_per_unit: f32) -> Self {
        let pixels_per_unit = if pixels_per_unit.is_finite() && pixels_per_unit > 0.0 {
            pixels_per_unit
        } else {
            DEFAULT_PIXELS_PER_UNIT
        };
        Self {
            pixels_per_unit,
            units_per_pixel: 1.0 / pixels_per_unit,
        }
    }

    pub fn pixels_per_unit(&self) -> f32 {
        self.pixels_per_unit
    }

    pub fn units_per_pixel(&self) -> f32 {
        self.units_per_pixel
    }

    pub fn to_units(&self, pixels: Vec2) -> Vec2 {
        pixels * self.units_per_pixel
    }

    pub fn to_pixels(&self, units: Vec2) -> Vec2 {
        units * self.pixels_per_unit
    }
}
