use std::path::PathBuf;
use std::sync::Arc;

use pixels::{Error, Pixels, SurfaceTexture};
use winit::window::Window;

use crate::math::Vec2;
use crate::scene_graph::{Affine2, Primitive, Rgba, SceneGraph};

use super::overlay::{draw_overlay, OverlayData};
use super::raster::Canvas;
use super::sprites::SpriteCache;

/// Software renderer presenting the scene graph through a `pixels` surface.
pub struct Renderer {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    width: u32,
    height: u32,
    sprites: SpriteCache,
}

impl Renderer {
    pub fn new(window: Arc<Window>, asset_root: PathBuf) -> Result<Self, Error> {
        let size = window.inner_size();
        let pixels = Self::build_pixels(Arc::clone(&window), size.width, size.height)?;
        Ok(Self {
            window,
            pixels,
            width: size.width,
            height: size.height,
            sprites: SpriteCache::new(asset_root),
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels = Self::build_pixels(Arc::clone(&self.window), width, height)?;
        self.width = width;
        self.height = height;
        Ok(())
    }

    fn build_pixels(
        window: Arc<Window>,
        width: u32,
        height: u32,
    ) -> Result<Pixels<'static>, Error> {
        let surface = SurfaceTexture::new(width, height, window);
        Pixels::new(width, height, surface)
    }

    /// Surface size in pixels.
    pub fn viewport(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    pub(crate) fn render(
        &mut self,
        graph: &SceneGraph,
        background: Rgba,
        overlay: Option<&OverlayData>,
    ) -> Result<(), Error> {
        let mut canvas = Canvas::new(self.pixels.frame_mut(), self.width, self.height);
        canvas.clear(background);
        draw_scene(&mut canvas, graph, &mut self.sprites);
        if let Some(overlay) = overlay {
            draw_overlay(&mut canvas, overlay);
        }
        self.pixels.render()
    }
}

pub(crate) fn draw_scene(canvas: &mut Canvas<'_>, graph: &SceneGraph, sprites: &mut SpriteCache) {
    graph.for_each_primitive(|transform, primitive| {
        draw_primitive(canvas, sprites, transform, primitive);
    });
}

fn draw_primitive(
    canvas: &mut Canvas<'_>,
    sprites: &mut SpriteCache,
    transform: &Affine2,
    primitive: &Primitive,
) {
    match primitive {
        Primitive::FilledRect {
            origin,
            width,
            height,
            color,
        } => {
            canvas.fill_polygon(&rect_corners(transform, *origin, *width, *height), *color);
        }
        Primitive::FilledCircle {
            center,
            radius,
            color,
        } => {
            canvas.fill_circle(
                transform.apply(*center),
                radius * transform.uniform_scale(),
                *color,
            );
        }
        Primitive::Sprite {
            key,
            origin,
            width,
            height,
            fallback_color,
        } => match sprites.get(key) {
            Some(sprite) => {
                canvas.draw_sprite(sprite, transform, *origin, Vec2::new(*width, *height));
            }
            None => {
                canvas.fill_polygon(
                    &rect_corners(transform, *origin, *width, *height),
                    *fallback_color,
                );
            }
        },
        Primitive::PolygonOutline { points, color } => {
            let points: Vec<Vec2> = points.iter().map(|point| transform.apply(*point)).collect();
            canvas.stroke_polygon(&points, *color);
        }
        Primitive::CircleOutline {
            center,
            radius,
            color,
        } => {
            canvas.stroke_circle(
                transform.apply(*center),
                radius * transform.uniform_scale(),
                *color,
            );
        }
        Primitive::Line { from, to, color } => {
            canvas.draw_line(transform.apply(*from), transform.apply(*to), *color);
        }
    }
}

fn rect_corners(transform: &Affine2, origin: Vec2, width: f32, height: f32) -> [Vec2; 4] {
    [
        origin,
        origin + Vec2::new(width, 0.0),
        origin + Vec2::new(width, height),
        origin + Vec2::new(0.0, height),
    ]
    .map(|corner| transform.apply(corner))
}
