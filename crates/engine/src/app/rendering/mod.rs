mod overlay;
mod raster;
mod renderer;
mod sprites;

pub(crate) use overlay::OverlayData;
pub use renderer::Renderer;
pub use sprites::{validate_sprite_key, SpriteKeyError};
