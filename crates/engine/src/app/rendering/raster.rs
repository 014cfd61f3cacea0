use crate::math::Vec2;
use crate::scene_graph::{Affine2, Rgba};

use super::sprites::SpriteImage;

const MIN_CIRCLE_SEGMENTS: usize = 12;
const MAX_CIRCLE_SEGMENTS: usize = 96;

/// RGBA8 frame buffer view with clipped drawing helpers.
pub(crate) struct Canvas<'a> {
    frame: &'a mut [u8],
    width: u32,
    height: u32,
}

impl<'a> Canvas<'a> {
    pub(crate) fn new(frame: &'a mut [u8], width: u32, height: u32) -> Self {
        Self {
            frame,
            width,
            height,
        }
    }

    pub(crate) fn width(&self) -> u32 {
        self.width
    }

    pub(crate) fn height(&self) -> u32 {
        self.height
    }

    pub(crate) fn clear(&mut self, color: Rgba) {
        for pixel in self.frame.chunks_exact_mut(4) {
            pixel.copy_from_slice(&color);
        }
    }

    /// Source-over blend of `color` into the pixel at (x, y). Out of range
    /// coordinates are ignored.
    pub(crate) fn blend_pixel(&mut self, x: i32, y: i32, color: Rgba) {
        let Some(offset) = self.byte_offset(x, y) else {
            return;
        };
        let dst = &mut self.frame[offset..offset + 4];
        match color[3] {
            0 => {}
            255 => dst.copy_from_slice(&color),
            alpha => {
                let alpha = alpha as u32;
                let inverse = 255 - alpha;
                for channel in 0..3 {
                    dst[channel] =
                        ((color[channel] as u32 * alpha + dst[channel] as u32 * inverse) / 255) as u8;
                }
                dst[3] = 255;
            }
        }
    }

    pub(crate) fn pixel(&self, x: i32, y: i32) -> Option<Rgba> {
        let offset = self.byte_offset(x, y)?;
        let mut out = [0u8; 4];
        out.copy_from_slice(&self.frame[offset..offset + 4]);
        Some(out)
    }

    fn byte_offset(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        let pixel = (y as usize)
            .checked_mul(self.width as usize)?
            .checked_add(x as usize)?;
        let offset = pixel.checked_mul(4)?;
        (offset + 4 <= self.frame.len()).then_some(offset)
    }

    pub(crate) fn fill_rect(&mut self, x: i32, y: i32, width: i32, height: i32, color: Rgba) {
        let start_x = x.max(0);
        let start_y = y.max(0);
        let end_x = x.saturating_add(width).min(self.width as i32);
        let end_y = y.saturating_add(height).min(self.height as i32);
        for py in start_y..end_y {
            for px in start_x..end_x {
                self.blend_pixel(px, py, color);
            }
        }
    }

    pub(crate) fn stroke_rect(&mut self, x: i32, y: i32, width: i32, height: i32, color: Rgba) {
        if width <= 1 || height <= 1 {
            return;
        }
        self.fill_rect(x, y, width, 1, color);
        self.fill_rect(x, y + height - 1, width, 1, color);
        self.fill_rect(x, y + 1, 1, height - 2, color);
        self.fill_rect(x + width - 1, y + 1, 1, height - 2, color);
    }

    /// Even-odd scanline fill sampled at pixel centers.
    pub(crate) fn fill_polygon(&mut self, points: &[Vec2], color: Rgba) {
        if points.len() < 3 || !points.iter().all(|p| p.x.is_finite() && p.y.is_finite()) {
            return;
        }
        let (min_y, max_y) = points
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), p| (lo.min(p.y), hi.max(p.y)));
        let first_row = ((min_y - 0.5).ceil() as i32).max(0);
        let last_row = ((max_y - 0.5).floor() as i32).min(self.height as i32 - 1);

        let mut crossings = Vec::with_capacity(points.len());
        for row in first_row..=last_row {
            let sample_y = row as f32 + 0.5;
            crossings.clear();
            for index in 0..points.len() {
                let a = points[index];
                let b = points[(index + 1) % points.len()];
                if (a.y <= sample_y) != (b.y <= sample_y) {
                    let t = (sample_y - a.y) / (b.y - a.y);
                    crossings.push(a.x + (b.x - a.x) * t);
                }
            }
            crossings.sort_by(f32::total_cmp);
            for span in crossings.chunks_exact(2) {
                let start = (span[0] - 0.5).ceil() as i32;
                let end = (span[1] - 0.5).ceil() as i32;
                self.fill_span(row, start, end, color);
            }
        }
    }

    pub(crate) fn fill_circle(&mut self, center: Vec2, radius: f32, color: Rgba) {
        if !(radius.is_finite() && radius > 0.0 && center.x.is_finite() && center.y.is_finite()) {
            return;
        }
        let first_row = ((center.y - radius - 0.5).ceil() as i32).max(0);
        let last_row = ((center.y + radius - 0.5).floor() as i32).min(self.height as i32 - 1);
        for row in first_row..=last_row {
            let dy = row as f32 + 0.5 - center.y;
            let half = (radius * radius - dy * dy).max(0.0).sqrt();
            let start = (center.x - half - 0.5).ceil() as i32;
            let end = (center.x + half - 0.5).ceil() as i32;
            self.fill_span(row, start, end, color);
        }
    }

    fn fill_span(&mut self, row: i32, start: i32, end: i32, color: Rgba) {
        let start = start.max(0);
        let end = end.min(self.width as i32);
        for x in start..end {
            self.blend_pixel(x, row, color);
        }
    }

    /// One pixel wide Bresenham line. The segment is clipped to a one pixel
    /// margin around the canvas first, so far-off endpoints stay in `i32`
    /// range and the walk is bounded by the canvas size.
    pub(crate) fn draw_line(&mut self, from: Vec2, to: Vec2, color: Rgba) {
        if !(from.x.is_finite() && from.y.is_finite() && to.x.is_finite() && to.y.is_finite()) {
            return;
        }
        let Some(([x0, y0], [x1, y1])) = self.clip_segment(from, to) else {
            return;
        };
        let (mut x0, mut y0) = (x0.floor() as i32, y0.floor() as i32);
        let (x1, y1) = (x1.floor() as i32, y1.floor() as i32);
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let step_x = if x0 < x1 { 1 } else { -1 };
        let step_y = if y0 < y1 { 1 } else { -1 };
        let mut error = dx + dy;
        loop {
            self.blend_pixel(x0, y0, color);
            if x0 == x1 && y0 == y1 {
                break;
            }
            let doubled = 2 * error;
            if doubled >= dy {
                error += dy;
                x0 += step_x;
            }
            if doubled <= dx {
                error += dx;
                y0 += step_y;
            }
        }
    }

    /// Liang-Barsky clip in `f64`; `None` when the segment misses the canvas.
    fn clip_segment(&self, from: Vec2, to: Vec2) -> Option<([f64; 2], [f64; 2])> {
        let min = [-1.0, -1.0];
        let max = [self.width as f64 + 1.0, self.height as f64 + 1.0];
        let start = [from.x as f64, from.y as f64];
        let delta = [to.x as f64 - start[0], to.y as f64 - start[1]];

        let (mut enter, mut exit) = (0.0_f64, 1.0_f64);
        for axis in 0..2 {
            for (p, q) in [
                (-delta[axis], start[axis] - min[axis]),
                (delta[axis], max[axis] - start[axis]),
            ] {
                if p == 0.0 {
                    if q < 0.0 {
                        return None;
                    }
                    continue;
                }
                let t = q / p;
                if p < 0.0 {
                    enter = enter.max(t);
                } else {
                    exit = exit.min(t);
                }
                if enter > exit {
                    return None;
                }
            }
        }

        let point = |t: f64| {
            [
                (start[0] + delta[0] * t).clamp(min[0], max[0]),
                (start[1] + delta[1] * t).clamp(min[1], max[1]),
            ]
        };
        Some((point(enter), point(exit)))
    }

    pub(crate) fn stroke_polygon(&mut self, points: &[Vec2], color: Rgba) {
        if points.len() < 2 {
            return;
        }
        for index in 0..points.len() {
            self.draw_line(points[index], points[(index + 1) % points.len()], color);
        }
    }

    pub(crate) fn stroke_circle(&mut self, center: Vec2, radius: f32, color: Rgba) {
        if !(radius.is_finite() && radius > 0.0) {
            return;
        }
        let segments = (radius.ceil() as usize).clamp(MIN_CIRCLE_SEGMENTS, MAX_CIRCLE_SEGMENTS);
        let points: Vec<Vec2> = (0..segments)
            .map(|index| {
                let angle = index as f32 / segments as f32 * std::f32::consts::TAU;
                center + Vec2::new(radius, 0.0).rotated(angle)
            })
            .collect();
        self.stroke_polygon(&points, color);
    }

    /// Draws `sprite` stretched over the local rectangle `origin..origin+size`
    /// placed on screen by `to_screen`.
    pub(crate) fn draw_sprite(
        &mut self,
        sprite: &SpriteImage,
        to_screen: &Affine2,
        origin: Vec2,
        size: Vec2,
    ) {
        if size.x <= 0.0 || size.y <= 0.0 || sprite.width() == 0 || sprite.height() == 0 {
            return;
        }
        let Some(to_local) = to_screen.inverse() else {
            return;
        };
        let corners = [
            origin,
            origin + Vec2::new(size.x, 0.0),
            origin + size,
            origin + Vec2::new(0.0, size.y),
        ]
        .map(|corner| to_screen.apply(corner));
        let (min, max) = corners.iter().fold(
            (Vec2::new(f32::MAX, f32::MAX), Vec2::new(f32::MIN, f32::MIN)),
            |(lo, hi), p| {
                (
                    Vec2::new(lo.x.min(p.x), lo.y.min(p.y)),
                    Vec2::new(hi.x.max(p.x), hi.y.max(p.y)),
                )
            },
        );
        let start_x = (min.x.floor() as i32).max(0);
        let start_y = (min.y.floor() as i32).max(0);
        let end_x = (max.x.ceil() as i32).min(self.width as i32);
        let end_y = (max.y.ceil() as i32).min(self.height as i32);

        let texel_scale = Vec2::new(
            sprite.width() as f32 / size.x,
            sprite.height() as f32 / size.y,
        );
        for y in start_y..end_y {
            for x in start_x..end_x {
                let local = to_local.apply(Vec2::new(x as f32 + 0.5, y as f32 + 0.5)) - origin;
                if local.x < 0.0 || local.y < 0.0 || local.x >= size.x || local.y >= size.y {
                    continue;
                }
                let u = (local.x * texel_scale.x) as u32;
                let v = (local.y * texel_scale.y) as u32;
                if let Some(texel) = sprite.texel(u, v) {
                    self.blend_pixel(x, y, texel);
                }
            }
        }
    }
}
