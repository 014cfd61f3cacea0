use std::time::{Duration, Instant};

pub const MIN_STEPS_PER_SECOND: u32 = 5;
pub const MAX_STEPS_PER_SECOND: u32 = 200;
pub const STEP_RATE_INCREMENT: u32 = 5;
pub const DEFAULT_STEPS_PER_SECOND: u32 = 60;
pub const DEFAULT_MAX_FRAME_DELTA: Duration = Duration::from_millis(100);

/// Outcome of accounting one host frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameAdvance {
    pub steps: u32,
    pub fixed_step: Duration,
    /// Wall-clock delta before clamping. Zero on the first frame.
    pub raw_delta: Duration,
    pub clamped_delta: Duration,
    pub alpha: f32,
    pub first_frame: bool,
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    steps: u32,
    remaining_accumulator: Duration,
}

/// Accumulator-based fixed-timestep driver.
///
/// Each host frame adds the clamped wall-clock delta to the accumulator and
/// drains it in whole fixed steps; the leftover fraction becomes the
/// interpolation alpha for the render pass.
#[derive(Debug, Clone)]
pub struct SimulationClock {
    steps_per_second: u32,
    fixed_step: Duration,
    max_frame_delta: Duration,
    accumulator: Duration,
    last_timestamp: Option<Instant>,
    elapsed: Duration,
    step_count: u64,
    last_raw_delta: Duration,
    last_clamped_delta: Duration,
    alpha: f32,
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self::new(DEFAULT_STEPS_PER_SECOND, DEFAULT_MAX_FRAME_DELTA)
    }
}

impl SimulationClock {
    pub fn new(steps_per_second: u32, max_frame_delta: Duration) -> Self {
        let steps_per_second = clamp_steps_per_second(steps_per_second);
        Self {
            steps_per_second,
            fixed_step: fixed_step_for(steps_per_second),
            max_frame_delta: normalize_non_zero_duration(max_frame_delta, DEFAULT_MAX_FRAME_DELTA),
            accumulator: Duration::ZERO,
            last_timestamp: None,
            elapsed: Duration::ZERO,
            step_count: 0,
            last_raw_delta: Duration::ZERO,
            last_clamped_delta: Duration::ZERO,
            alpha: 0.0,
        }
    }

    /// Accounts the frame observed at `now` and returns how many fixed steps
    /// the caller must run. The first call only records the timestamp.
    pub fn advance(&mut self, now: Instant) -> FrameAdvance {
        let Some(last) = self.last_timestamp.replace(now) else {
            self.last_raw_delta = Duration::ZERO;
            self.last_clamped_delta = Duration::ZERO;
            self.alpha = self.current_alpha();
            return FrameAdvance {
                steps: 0,
                fixed_step: self.fixed_step,
                raw_delta: Duration::ZERO,
                clamped_delta: Duration::ZERO,
                alpha: self.alpha,
                first_frame: true,
            };
        };

        let raw_delta = now.saturating_duration_since(last);
        let clamped_delta = clamp_frame_delta(raw_delta, self.max_frame_delta);
        self.accumulator = self.accumulator.saturating_add(clamped_delta);

        let plan = plan_fixed_steps(self.accumulator, self.fixed_step);
        self.accumulator = plan.remaining_accumulator;
        self.last_raw_delta = raw_delta;
        self.last_clamped_delta = clamped_delta;
        self.alpha = self.current_alpha();

        FrameAdvance {
            steps: plan.steps,
            fixed_step: self.fixed_step,
            raw_delta,
            clamped_delta,
            alpha: self.alpha,
            first_frame: false,
        }
    }

    /// Books one executed fixed step of `step` duration.
    pub fn record_step(&mut self, step: Duration) {
        self.elapsed = self.elapsed.saturating_add(step);
        self.step_count = self.step_count.saturating_add(1);
    }

    pub fn increase_rate(&mut self) -> u32 {
        self.set_steps_per_second(self.steps_per_second.saturating_add(STEP_RATE_INCREMENT))
    }

    pub fn decrease_rate(&mut self) -> u32 {
        self.set_steps_per_second(self.steps_per_second.saturating_sub(STEP_RATE_INCREMENT))
    }

    /// Applies to subsequent frames; the current accumulator is kept as is.
    pub fn set_steps_per_second(&mut self, steps_per_second: u32) -> u32 {
        self.steps_per_second = clamp_steps_per_second(steps_per_second);
        self.fixed_step = fixed_step_for(self.steps_per_second);
        self.steps_per_second
    }

    pub fn steps_per_second(&self) -> u32 {
        self.steps_per_second
    }

    pub fn fixed_step(&self) -> Duration {
        self.fixed_step
    }

    pub fn accumulator(&self) -> Duration {
        self.accumulator
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn last_raw_delta(&self) -> Duration {
        self.last_raw_delta
    }

    pub fn last_clamped_delta(&self) -> Duration {
        self.last_clamped_delta
    }

    pub fn max_frame_delta(&self) -> Duration {
        self.max_frame_delta
    }

    fn current_alpha(&self) -> f32 {
        (self.accumulator.as_secs_f64() / self.fixed_step.as_secs_f64()) as f32
    }
}

fn plan_fixed_steps(mut accumulator: Duration, fixed_step: Duration) -> StepPlan {
    let mut steps = 0u32;
    while accumulator >= fixed_step {
        accumulator -= fixed_step;
        steps = steps.saturating_add(1);
    }
    StepPlan {
        steps,
        remaining_accumulator: accumulator,
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn clamp_steps_per_second(steps_per_second: u32) -> u32 {
    steps_per_second.clamp(MIN_STEPS_PER_SECOND, MAX_STEPS_PER_SECOND)
}

fn fixed_step_for(steps_per_second: u32) -> Duration {
    Duration::from_secs_f64(1.0 / steps_per_second as f64)
}

pub(crate) fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started_clock(steps_per_second: u32) -> (SimulationClock, Instant) {
        let mut clock = SimulationClock::new(steps_per_second, DEFAULT_MAX_FRAME_DELTA);
        let base = Instant::now();
        let first = clock.advance(base);
        assert!(first.first_frame);
        assert_eq!(first.steps, 0);
        (clock, base)
    }

    #[test]
    fn first_frame_runs_no_steps() {
        let mut clock = SimulationClock::default();
        let advance = clock.advance(Instant::now());
        assert!(advance.first_frame);
        assert_eq!(advance.steps, 0);
        assert_eq!(advance.raw_delta, Duration::ZERO);
        assert_eq!(clock.accumulator(), Duration::ZERO);
    }

    #[test]
    fn plan_fixed_steps_runs_expected_steps() {
        let plan = plan_fixed_steps(Duration::from_millis(48), Duration::from_millis(16));
        assert_eq!(plan.steps, 3);
        assert_eq!(plan.remaining_accumulator, Duration::ZERO);
    }

    #[test]
    fn plan_fixed_steps_keeps_remainder() {
        let plan = plan_fixed_steps(Duration::from_millis(50), Duration::from_millis(16));
        assert_eq!(plan.steps, 3);
        assert_eq!(plan.remaining_accumulator, Duration::from_millis(2));
    }

    #[test]
    fn step_total_matches_floor_of_elapsed_time() {
        let (mut clock, base) = started_clock(50);
        let deltas_ms = [7u64, 13, 31, 2, 45, 19, 20, 1, 99, 16];
        let mut now = base;
        let mut total_steps = 0u64;
        let mut total_ms = 0u64;
        for delta in deltas_ms {
            now += Duration::from_millis(delta);
            total_ms += delta;
            let advance = clock.advance(now);
            total_steps += advance.steps as u64;
            assert!(clock.accumulator() < clock.fixed_step());
            assert!(advance.alpha >= 0.0 && advance.alpha < 1.0);
        }

        // 50 steps/s is exactly 20ms per step.
        assert_eq!(total_steps, total_ms / 20);
        assert_eq!(
            clock.accumulator(),
            Duration::from_millis(total_ms % 20)
        );
    }

    #[test]
    fn long_stall_is_clamped_to_max_frame_delta() {
        let (mut clock, base) = started_clock(60);
        let advance = clock.advance(base + Duration::from_millis(5000));

        let expected =
            (DEFAULT_MAX_FRAME_DELTA.as_nanos() / clock.fixed_step().as_nanos()) as u32;
        assert_eq!(advance.raw_delta, Duration::from_millis(5000));
        assert_eq!(advance.clamped_delta, DEFAULT_MAX_FRAME_DELTA);
        assert_eq!(advance.steps, expected);
        assert!(advance.steps <= 6);
        assert!(clock.accumulator() < clock.fixed_step());
    }

    #[test]
    fn alpha_is_leftover_fraction_of_step() {
        let (mut clock, base) = started_clock(50);
        let advance = clock.advance(base + Duration::from_millis(30));
        assert_eq!(advance.steps, 1);
        assert!((advance.alpha - 0.5).abs() < 0.0001);
    }

    #[test]
    fn record_step_tracks_elapsed_and_count() {
        let (mut clock, base) = started_clock(50);
        let advance = clock.advance(base + Duration::from_millis(40));
        for _ in 0..advance.steps {
            clock.record_step(advance.fixed_step);
        }
        assert_eq!(clock.step_count(), 2);
        assert_eq!(clock.elapsed(), Duration::from_millis(40));
    }

    #[test]
    fn step_rate_saturates_at_upper_bound() {
        let mut clock = SimulationClock::new(190, DEFAULT_MAX_FRAME_DELTA);
        for _ in 0..10 {
            clock.increase_rate();
        }
        assert_eq!(clock.steps_per_second(), MAX_STEPS_PER_SECOND);
        assert!((clock.fixed_step().as_secs_f64() - 1.0 / 200.0).abs() < 1e-9);
    }

    #[test]
    fn step_rate_saturates_at_lower_bound() {
        let mut clock = SimulationClock::new(15, DEFAULT_MAX_FRAME_DELTA);
        for _ in 0..10 {
            clock.decrease_rate();
        }
        assert_eq!(clock.steps_per_second(), MIN_STEPS_PER_SECOND);
        assert!((clock.fixed_step().as_secs_f64() - 1.0 / 5.0).abs() < 1e-9);
    }

    #[test]
    fn fixed_step_tracks_rate_after_every_change() {
        let mut clock = SimulationClock::default();
        for rate in [clock.increase_rate(), clock.decrease_rate(), clock.decrease_rate()] {
            assert!((clock.fixed_step().as_secs_f64() - 1.0 / rate as f64).abs() < 1e-9);
        }
        assert_eq!(clock.steps_per_second(), 55);
    }

    #[test]
    fn rate_change_does_not_rescale_accumulator() {
        let (mut clock, base) = started_clock(50);
        clock.advance(base + Duration::from_millis(30));
        assert_eq!(clock.accumulator(), Duration::from_millis(10));
        clock.set_steps_per_second(100);
        assert_eq!(clock.accumulator(), Duration::from_millis(10));
    }

    #[test]
    fn constructor_clamps_out_of_range_rate() {
        assert_eq!(
            SimulationClock::new(1000, DEFAULT_MAX_FRAME_DELTA).steps_per_second(),
            MAX_STEPS_PER_SECOND
        );
        assert_eq!(
            SimulationClock::new(0, Duration::ZERO).max_frame_delta(),
            DEFAULT_MAX_FRAME_DELTA
        );
    }
}
