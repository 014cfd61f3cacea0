mod input;
mod loop_runner;
mod metrics;
mod rendering;

pub use loop_runner::{run_app, run_app_with_metrics, AppError, LoopConfig, SLOW_FRAME_ENV_VAR};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub(crate) use rendering::OverlayData;
pub use rendering::{validate_sprite_key, Renderer, SpriteKeyError};
