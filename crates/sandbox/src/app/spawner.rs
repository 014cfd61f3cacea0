use std::f32::consts::TAU;

use physbox_engine::{EntityParams, Rgba, ShapeKind, ShapeSpawner, SpawnContext, Vec2, VisualKind};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

/// Sprite frames are 64x64 pixels.
const SPRITE_HALF_SIZE: f32 = 32.0;
const SPAWN_BAND_FRACTION: f32 = 0.3;
const MAX_SPIN: f32 = 3.0;
const CALM_FRICTION: f32 = 0.001;
const CALM_RESTITUTION: f32 = 0.001;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct SpawnerSettings {
    /// Fixed seed for reproducible runs; entropy when absent.
    pub(crate) seed: Option<u64>,
    pub(crate) min_half_size: f32,
    pub(crate) max_half_size: f32,
    pub(crate) circle_chance: f64,
    pub(crate) sprite_key: Option<String>,
    pub(crate) sprite_chance: f64,
    /// Largest impulse component given to energetic shapes, in physics units.
    pub(crate) max_impulse: f32,
}

impl Default for SpawnerSettings {
    fn default() -> Self {
        Self {
            seed: None,
            min_half_size: 8.0,
            max_half_size: 30.0,
            circle_chance: 0.3,
            sprite_key: None,
            sprite_chance: 0.0,
            max_impulse: 10.0,
        }
    }
}

/// Randomized shapes for the sandbox controls.
#[derive(Debug)]
pub(crate) struct RandomSpawner {
    rng: StdRng,
    settings: SpawnerSettings,
}

impl RandomSpawner {
    pub(crate) fn new(settings: SpawnerSettings) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng, settings }
    }

    fn base_params(&mut self, context: SpawnContext) -> EntityParams {
        let (shape, visual) = self.pick_look();
        let margin = shape.half_extents();
        let position = context.at.unwrap_or_else(|| {
            Vec2::new(
                self.uniform(margin.x, context.viewport.x - margin.x),
                self.uniform(margin.y, context.viewport.y * SPAWN_BAND_FRACTION),
            )
        });

        EntityParams {
            position,
            angle: 0.0,
            angular_velocity: 0.0,
            shape,
            visual,
            friction: 0.5,
            restitution: 0.3,
            density: 1.0,
            bullet: context.bullet,
            impulse: Vec2::ZERO,
        }
    }

    fn pick_look(&mut self) -> (ShapeKind, VisualKind) {
        if let Some(key) = self.settings.sprite_key.clone() {
            if self.rng.gen_bool(self.settings.sprite_chance) {
                let shape = ShapeKind::Box {
                    half_width: SPRITE_HALF_SIZE,
                    half_height: SPRITE_HALF_SIZE,
                };
                let fallback_color = self.random_color();
                return (shape, VisualKind::Sprite { key, fallback_color });
            }
        }

        let (min, max) = (self.settings.min_half_size, self.settings.max_half_size);
        let shape = if self.rng.gen_bool(self.settings.circle_chance) {
            ShapeKind::Circle {
                radius: self.uniform(min, max),
            }
        } else {
            ShapeKind::Box {
                half_width: self.uniform(min, max),
                half_height: self.uniform(min, max),
            }
        };
        let color = self.random_color();
        (shape, VisualKind::Fill { color })
    }

    fn random_color(&mut self) -> Rgba {
        [self.rng.gen(), self.rng.gen(), self.rng.gen(), 0xff]
    }

    /// Uniform sample that collapses to `low` when the range is empty.
    fn uniform(&mut self, low: f32, high: f32) -> f32 {
        if high > low {
            self.rng.gen_range(low..high)
        } else {
            low
        }
    }
}

impl ShapeSpawner for RandomSpawner {
    fn energetic(&mut self, context: SpawnContext) -> EntityParams {
        let mut params = self.base_params(context);
        let max_impulse = self.settings.max_impulse;
        params.angle = self.uniform(0.0, TAU);
        params.angular_velocity = self.uniform(-MAX_SPIN, MAX_SPIN);
        params.friction = self.uniform(0.2, 0.8);
        params.restitution = self.uniform(0.1, 0.6);
        params.density = self.uniform(0.5, 2.0);
        params.impulse = Vec2::new(
            self.uniform(-max_impulse, max_impulse),
            self.uniform(-max_impulse, 0.0),
        );
        params
    }

    fn calm(&mut self, context: SpawnContext) -> EntityParams {
        let mut params = self.base_params(context);
        params.friction = CALM_FRICTION;
        params.restitution = CALM_RESTITUTION;
        params
    }
}
