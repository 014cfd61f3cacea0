use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::ImageReader;
use thiserror::Error;
use tracing::warn;

use crate::scene_graph::Rgba;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpriteKeyError {
    #[error("sprite key must not be empty")]
    Empty,
    #[error("sprite key must not start with '/'")]
    LeadingSlash,
    #[error("sprite key must not contain '..'")]
    ParentTraversal,
    #[error("sprite key contains invalid character '{character}'")]
    InvalidCharacter { character: char },
}

/// Keys are relative paths of lowercase ascii, digits, `_`, `-` and `/`.
pub fn validate_sprite_key(key: &str) -> Result<(), SpriteKeyError> {
    if key.is_empty() {
        return Err(SpriteKeyError::Empty);
    }
    if key.starts_with('/') {
        return Err(SpriteKeyError::LeadingSlash);
    }
    if key.contains("..") {
        return Err(SpriteKeyError::ParentTraversal);
    }
    match key
        .chars()
        .find(|ch| !(ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '_' | '/' | '-')))
    {
        Some(character) => Err(SpriteKeyError::InvalidCharacter { character }),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SpriteImage {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl SpriteImage {
    /// Returns `None` when the buffer does not hold `width * height` pixels.
    pub(crate) fn from_rgba(width: u32, height: u32, rgba: Vec<u8>) -> Option<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(4)?;
        (rgba.len() == expected).then_some(Self {
            width,
            height,
            rgba,
        })
    }

    pub(crate) fn width(&self) -> u32 {
        self.width
    }

    pub(crate) fn height(&self) -> u32 {
        self.height
    }

    pub(crate) fn texel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let mut out = [0u8; 4];
        out.copy_from_slice(&self.rgba[offset..offset + 4]);
        Some(out)
    }
}

/// Lazily loaded PNG sprites under `<asset_root>/image/sprite/`. Failed
/// loads are cached as misses and reported once.
#[derive(Debug)]
pub(crate) struct SpriteCache {
    asset_root: PathBuf,
    entries: HashMap<String, Option<SpriteImage>>,
}

impl SpriteCache {
    pub(crate) fn new(asset_root: PathBuf) -> Self {
        Self {
            asset_root,
            entries: HashMap::new(),
        }
    }

    pub(crate) fn get(&mut self, key: &str) -> Option<&SpriteImage> {
        if !self.entries.contains_key(key) {
            let loaded = match load_sprite(&self.asset_root, key) {
                Ok(sprite) => Some(sprite),
                Err(reason) => {
                    warn!(
                        sprite_key = key,
                        reason = %reason,
                        "sprite_load_failed_using_fallback"
                    );
                    None
                }
            };
            self.entries.insert(key.to_string(), loaded);
        }
        self.entries.get(key).and_then(Option::as_ref)
    }
}

pub(crate) fn sprite_path(asset_root: &Path, key: &str) -> Result<PathBuf, SpriteKeyError> {
    validate_sprite_key(key)?;
    Ok(asset_root
        .join("image")
        .join("sprite")
        .join(format!("{key}.png")))
}

fn load_sprite(asset_root: &Path, key: &str) -> Result<SpriteImage, String> {
    let path = sprite_path(asset_root, key).map_err(|error| format!("invalid_key:{error}"))?;
    let reader = ImageReader::open(&path)
        .map_err(|error| format!("file_open_failed:{}:{error}", path.display()))?;
    let decoded = reader
        .decode()
        .map_err(|error| format!("decode_failed:{error}"))?
        .to_rgba8();
    let (width, height) = decoded.dimensions();
    SpriteImage::from_rgba(width, height, decoded.into_raw())
        .ok_or_else(|| "unexpected_buffer_size".to_string())
}
