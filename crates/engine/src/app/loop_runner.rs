use std::env;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pixels::Error as PixelsError;
use thiserror::Error;
use tracing::{info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::WindowBuilder;

use crate::sim::clock::normalize_non_zero_duration;
use crate::sim::{
    FrameLoop, FrameLoopError, FrameTiming, PanicPolicy, ShapeSpawner, WorldConfig,
};
use crate::{resolve_app_paths, StartupError};

use super::input::InputCollector;
use super::metrics::MetricsAccumulator;
use super::{MetricsHandle, OverlayData, Renderer};

pub const SLOW_FRAME_ENV_VAR: &str = "PHYSBOX_SLOW_FRAME_MS";

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub window_title: String,
    pub window_width: u32,
    pub window_height: u32,
    pub max_frame_delta: Duration,
    /// Raw frame delta above which the panic policy sheds entities.
    pub panic_threshold: Duration,
    pub metrics_log_interval: Duration,
    pub simulated_slow_frame_ms: u64,
    pub max_render_fps: Option<u32>,
    pub show_overlay: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            window_title: "physbox".to_string(),
            window_width: 1280,
            window_height: 720,
            max_frame_delta: Duration::from_millis(100),
            panic_threshold: Duration::from_millis(100),
            metrics_log_interval: Duration::from_secs(1),
            simulated_slow_frame_ms: 0,
            max_render_fps: None,
            show_overlay: true,
        }
    }
}

impl LoopConfig {
    fn frame_timing(&self) -> FrameTiming {
        let defaults = FrameTiming::default();
        FrameTiming {
            max_frame_delta: normalize_non_zero_duration(
                self.max_frame_delta,
                defaults.max_frame_delta,
            ),
            panic_policy: PanicPolicy {
                threshold: normalize_non_zero_duration(
                    self.panic_threshold,
                    defaults.panic_policy.threshold,
                ),
                ..defaults.panic_policy
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("failed to initialize renderer: {0}")]
    CreateRenderer(#[source] PixelsError),
    #[error("failed to build simulation world: {0}")]
    FrameLoop(#[from] FrameLoopError),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

pub fn run_app(
    config: LoopConfig,
    world: WorldConfig,
    spawner: Box<dyn ShapeSpawner>,
) -> Result<(), AppError> {
    let metrics_handle = MetricsHandle::default();
    run_app_with_metrics(config, world, spawner, metrics_handle)
}

pub fn run_app_with_metrics(
    config: LoopConfig,
    world: WorldConfig,
    spawner: Box<dyn ShapeSpawner>,
    metrics_handle: MetricsHandle,
) -> Result<(), AppError> {
    let app_paths = resolve_app_paths()?;
    info!(
        root = %app_paths.root.display(),
        assets_dir = %app_paths.assets_dir.display(),
        "startup"
    );

    let event_loop = EventLoop::new().map_err(AppError::CreateEventLoop)?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.window_title.clone())
            .with_inner_size(LogicalSize::new(
                config.window_width as f64,
                config.window_height as f64,
            ))
            .build(&event_loop)
            .map_err(AppError::CreateWindow)?,
    );
    let mut renderer = Renderer::new(Arc::clone(&window), app_paths.assets_dir.clone())
        .map_err(AppError::CreateRenderer)?;

    event_loop.set_control_flow(ControlFlow::Poll);

    let timing = config.frame_timing();
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let slow_frame_delay = resolve_slow_frame_delay(config.simulated_slow_frame_ms);
    let effective_render_cap = normalize_render_fps_cap(config.max_render_fps);
    let render_frame_target = target_frame_duration(effective_render_cap);

    let mut frame_loop = FrameLoop::new(&world, timing, renderer.viewport(), spawner)?;
    let mut input_collector = InputCollector::new(frame_loop.sender());

    info!(
        max_frame_delta_ms = timing.max_frame_delta.as_millis() as u64,
        panic_threshold_ms = timing.panic_policy.threshold.as_millis() as u64,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        slow_frame_delay_ms = slow_frame_delay.as_millis() as u64,
        render_fps_cap = %format_render_cap(effective_render_cap),
        "loop_config"
    );

    let mut last_frame_instant = Instant::now();
    let mut last_present_instant = Instant::now();
    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval);
    let mut overlay_visible = config.show_overlay;

    event_loop
        .run(move |event, window_target| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => {
                    input_collector.mark_quit_requested();
                    info!(reason = "window_close", "shutdown_requested");
                    window_target.exit();
                }
                WindowEvent::Resized(new_size) => {
                    if let Err(error) = renderer.resize(new_size.width, new_size.height) {
                        warn!(error = %error, "renderer_resize_failed");
                        window_target.exit();
                    }
                }
                WindowEvent::ScaleFactorChanged { .. } => {
                    let size = window.inner_size();
                    if let Err(error) = renderer.resize(size.width, size.height) {
                        warn!(error = %error, "renderer_resize_failed");
                        window_target.exit();
                    }
                }
                WindowEvent::CursorMoved { position, .. } => {
                    input_collector.set_cursor_position_px(position.x as f32, position.y as f32);
                }
                WindowEvent::CursorLeft { .. } => {
                    input_collector.clear_cursor_position();
                }
                WindowEvent::MouseInput { state, button, .. } => {
                    input_collector.handle_mouse_input(button, state);
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    input_collector.handle_keyboard_input(&event);
                    if input_collector.quit_requested() {
                        info!(reason = "escape_key", "shutdown_requested");
                        window_target.exit();
                    }
                }
                WindowEvent::RedrawRequested => {
                    if input_collector.take_overlay_toggle_pressed() {
                        overlay_visible = !overlay_visible;
                        info!(overlay_visible, "overlay_toggled");
                    }

                    if slow_frame_delay > Duration::ZERO {
                        // Debug perturbation for exercising the panic policy; not the FPS cap.
                        thread::sleep(slow_frame_delay);
                    }

                    let now = Instant::now();
                    let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
                    last_frame_instant = now;

                    let report = frame_loop.run_frame(now, renderer.viewport());
                    metrics_accumulator.record_steps(report.steps);
                    if report.panic_removed > 0 {
                        metrics_accumulator.record_panic_frame();
                    }

                    // Single authoritative FPS cap sleep point for render pacing.
                    let elapsed_since_last_present =
                        Instant::now().saturating_duration_since(last_present_instant);
                    let cap_sleep =
                        compute_cap_sleep(elapsed_since_last_present, render_frame_target);
                    if cap_sleep > Duration::ZERO {
                        thread::sleep(cap_sleep);
                    }

                    let overlay = overlay_visible.then(|| OverlayData {
                        metrics: metrics_handle.snapshot(),
                        render_fps_cap: effective_render_cap,
                        slow_frame_delay_ms: slow_frame_delay.as_millis() as u64,
                        world_lines: frame_loop.diagnostics().lines(),
                    });
                    if let Err(error) = renderer.render(
                        frame_loop.graph(),
                        frame_loop.background(),
                        overlay.as_ref(),
                    ) {
                        warn!(error = %error, "renderer_draw_failed");
                        window_target.exit();
                    }
                    last_present_instant = Instant::now();
                    metrics_accumulator.record_frame(raw_frame_dt);

                    if let Some(snapshot) = metrics_accumulator.maybe_snapshot(now) {
                        metrics_handle.publish(snapshot);
                        info!(
                            fps = snapshot.fps,
                            tps = snapshot.tps,
                            frame_time_ms = snapshot.frame_time_ms,
                            worst_frame_ms = snapshot.worst_frame_ms,
                            panic_frames = snapshot.panic_frames,
                            entity_count = report.entity_count,
                            steps_per_second = frame_loop.steps_per_second(),
                            "loop_metrics"
                        );
                    }
                }
                _ => {}
            },
            Event::AboutToWait => {
                window.request_redraw();
            }
            Event::LoopExiting => {
                info!(entity_count = frame_loop.entity_count(), "shutdown");
            }
            _ => {}
        })
        .map_err(AppError::EventLoopRun)
}

fn normalize_render_fps_cap(cap: Option<u32>) -> Option<u32> {
    cap.filter(|value| *value > 0)
}

fn target_frame_duration(max_render_fps: Option<u32>) -> Option<Duration> {
    max_render_fps.map(|fps| Duration::from_secs_f64(1.0 / fps as f64))
}

fn compute_cap_sleep(elapsed: Duration, target: Option<Duration>) -> Duration {
    match target {
        Some(frame_target) if elapsed < frame_target => frame_target - elapsed,
        _ => Duration::ZERO,
    }
}

fn format_render_cap(cap: Option<u32>) -> String {
    match cap {
        Some(value) => value.to_string(),
        None => "off".to_string(),
    }
}

fn resolve_slow_frame_delay(config_slow_frame_ms: u64) -> Duration {
    match env::var(SLOW_FRAME_ENV_VAR) {
        Ok(value) => parse_slow_frame_ms(&value).unwrap_or_else(|| {
            warn!(
                env_var = SLOW_FRAME_ENV_VAR,
                value = value.as_str(),
                "invalid slow-frame env var value; falling back to config"
            );
            Duration::from_millis(config_slow_frame_ms)
        }),
        Err(env::VarError::NotPresent) => Duration::from_millis(config_slow_frame_ms),
        Err(err) => {
            warn!(
                env_var = SLOW_FRAME_ENV_VAR,
                error = %err,
                "unable to read slow-frame env var; falling back to config"
            );
            Duration::from_millis(config_slow_frame_ms)
        }
    }
}

fn parse_slow_frame_ms(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_timing_uses_configured_threshold() {
        let config = LoopConfig {
            panic_threshold: Duration::from_millis(250),
            max_frame_delta: Duration::from_millis(50),
            ..LoopConfig::default()
        };
        let timing = config.frame_timing();

        assert_eq!(timing.max_frame_delta, Duration::from_millis(50));
        assert_eq!(timing.panic_policy.threshold, Duration::from_millis(250));
        assert_eq!(timing.panic_policy.trim_batch, 10);
    }

    #[test]
    fn frame_timing_replaces_zero_durations() {
        let config = LoopConfig {
            panic_threshold: Duration::ZERO,
            max_frame_delta: Duration::ZERO,
            ..LoopConfig::default()
        };
        assert_eq!(config.frame_timing(), FrameTiming::default());
    }

    #[test]
    fn slow_frame_value_parses_milliseconds() {
        assert_eq!(parse_slow_frame_ms(" 150 "), Some(Duration::from_millis(150)));
        assert_eq!(parse_slow_frame_ms("fast"), None);
        assert_eq!(parse_slow_frame_ms("-3"), None);
    }

    #[test]
    fn target_frame_duration_none_when_cap_off() {
        assert_eq!(target_frame_duration(None), None);
    }

    #[test]
    fn target_frame_duration_for_60hz_is_expected() {
        let duration = target_frame_duration(Some(60)).expect("duration");
        assert!((duration.as_secs_f64() - (1.0 / 60.0)).abs() < 0.000_001);
    }

    #[test]
    fn compute_cap_sleep_zero_when_over_budget() {
        let sleep = compute_cap_sleep(Duration::from_millis(20), target_frame_duration(Some(60)));
        assert_eq!(sleep, Duration::ZERO);
    }

    #[test]
    fn compute_cap_sleep_positive_when_under_budget() {
        let sleep = compute_cap_sleep(Duration::from_millis(5), target_frame_duration(Some(60)));
        assert!(sleep > Duration::ZERO);
    }

    #[test]
    fn normalize_render_fps_cap_disables_zero() {
        assert_eq!(normalize_render_fps_cap(Some(0)), None);
        assert_eq!(normalize_render_fps_cap(Some(60)), Some(60));
        assert_eq!(format_render_cap(None), "off");
    }
}
