use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::math::{PixelScale, Vec2};
use crate::scene_graph::{Layer, NodeId, Rgba, SceneGraph, SceneGraphError};
use crate::sim::boundary::{build_boundaries, draw_boundaries};
use crate::sim::clock::{SimulationClock, DEFAULT_MAX_FRAME_DELTA};
use crate::sim::command::{command_channel, CommandQueue, CommandSender, SandboxCommand};
use crate::sim::config::WorldConfig;
use crate::sim::entity::{DrawOptions, Entity, EntityParams};
use crate::sim::physics::{BodyHandle, PhysicsWorld};
use crate::sim::registry::EntityRegistry;

/// Where and how a new shape should appear.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnContext {
    pub viewport: Vec2,
    /// Requested spawn point in pixels, usually the cursor.
    pub at: Option<Vec2>,
    pub bullet: bool,
    pub scale: PixelScale,
}

/// Produces the parameters for newly spawned shapes.
pub trait ShapeSpawner {
    /// A randomized shape launched with an initial impulse.
    fn energetic(&mut self, context: SpawnContext) -> EntityParams;
    /// A near-frictionless, barely bouncy shape with no impulse.
    fn calm(&mut self, context: SpawnContext) -> EntityParams;
}

/// Recovery rule for frames that took far longer than expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanicPolicy {
    /// Raw frame delta above which the policy fires.
    pub threshold: Duration,
    /// Extra removal happens only while more than this many entities remain.
    pub trim_trigger: usize,
    pub trim_batch: usize,
}

impl Default for PanicPolicy {
    fn default() -> Self {
        Self {
            threshold: Duration::from_millis(100),
            trim_trigger: 10,
            trim_batch: 10,
        }
    }
}

impl PanicPolicy {
    pub fn is_triggered(&self, raw_delta: Duration) -> bool {
        raw_delta > self.threshold
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTiming {
    pub max_frame_delta: Duration,
    pub panic_policy: PanicPolicy,
}

impl Default for FrameTiming {
    fn default() -> Self {
        Self {
            max_frame_delta: DEFAULT_MAX_FRAME_DELTA,
            panic_policy: PanicPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Toggles {
    pub draw_debug_lines: bool,
    pub use_interpolation: bool,
    pub bullet_mode: bool,
}

/// Values shown by the diagnostics overlay, refreshed every render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Diagnostics {
    pub step_count: u64,
    pub entity_count: usize,
    pub gravity: Vec2,
    pub fixed_step: Duration,
    pub steps_per_second: u32,
    pub alpha: f32,
    pub toggles: Toggles,
}

impl Diagnostics {
    pub fn lines(&self) -> Vec<String> {
        vec![
            format!("steps: {}", self.step_count),
            format!("entities: {}", self.entity_count),
            format!("gravity: {:.1}, {:.1}", self.gravity.x, self.gravity.y),
            format!(
                "timestep: {:.2} ms ({} /s)",
                self.fixed_step.as_secs_f64() * 1000.0,
                self.steps_per_second
            ),
            format!("alpha: {:.2}", self.alpha),
            format!("debug lines: {}", on_off(self.toggles.draw_debug_lines)),
            format!("interpolation: {}", on_off(self.toggles.use_interpolation)),
            format!("bullet: {}", on_off(self.toggles.bullet_mode)),
        ]
    }
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

/// Summary of one `run_frame` call.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameReport {
    pub commands_applied: usize,
    pub steps: u32,
    pub alpha: f32,
    pub raw_delta: Duration,
    pub pruned: usize,
    pub panic_removed: usize,
    pub entity_count: usize,
}

#[derive(Debug, Error)]
pub enum FrameLoopError {
    #[error("failed to set up boundary debug node: {0}")]
    Scene(#[from] SceneGraphError),
}

/// Everything the frame loop mutates. Only [`FrameLoop::run_frame`] touches it.
pub struct SimulationState {
    physics: PhysicsWorld,
    graph: SceneGraph,
    registry: EntityRegistry,
    clock: SimulationClock,
    scale: PixelScale,
    boundaries: Vec<BodyHandle>,
    boundary_debug: NodeId,
    toggles: Toggles,
    background: Rgba,
    diagnostics: Diagnostics,
}

impl SimulationState {
    fn new(config: &WorldConfig, timing: FrameTiming, viewport: Vec2) -> Result<Self, FrameLoopError> {
        let scale = config.pixel_scale();
        let mut physics = PhysicsWorld::new(config.gravity);
        let boundaries = build_boundaries(&mut physics, &config.boundaries, viewport, &scale);

        let mut graph = SceneGraph::new();
        let boundary_debug = graph.create_graphics();
        graph.add_child(graph.layer(Layer::Debug), boundary_debug)?;

        let clock = SimulationClock::new(config.steps_per_second, timing.max_frame_delta);
        let toggles = Toggles {
            draw_debug_lines: config.draw_debug_lines,
            use_interpolation: config.use_interpolation,
            bullet_mode: config.bullet_mode,
        };
        let diagnostics = Diagnostics {
            step_count: 0,
            entity_count: 0,
            gravity: config.gravity,
            fixed_step: clock.fixed_step(),
            steps_per_second: clock.steps_per_second(),
            alpha: 0.0,
            toggles,
        };

        Ok(Self {
            physics,
            graph,
            registry: EntityRegistry::new(),
            clock,
            scale,
            boundaries,
            boundary_debug,
            toggles,
            background: config.background,
            diagnostics,
        })
    }

    fn spawn(&mut self, params: EntityParams) {
        match Entity::create(&mut self.graph, &mut self.physics, self.scale, params) {
            Ok(entity) => self.registry.push(entity),
            Err(err) => warn!(error = %err, "entity_spawn_failed"),
        }
    }

    fn fixed_step(&mut self, dt_seconds: f32) -> usize {
        let pruned = self
            .registry
            .prune_dirty(&mut self.physics, &mut self.graph);
        if pruned > 0 {
            debug!(pruned, "dirty_entities_pruned");
        }
        for entity in self.registry.iter_mut() {
            entity.advance_bullet_timeout(&mut self.physics, dt_seconds);
            entity.capture_state(&self.physics);
        }
        self.physics.step(dt_seconds);
        pruned
    }

    fn apply_panic_policy(&mut self, policy: &PanicPolicy) -> usize {
        let mut removed = usize::from(self.registry.remove_first(&mut self.physics, &mut self.graph));
        if self.registry.len() > policy.trim_trigger {
            removed += self
                .registry
                .drain_front(policy.trim_batch, &mut self.physics, &mut self.graph);
        }
        removed
    }

    fn render(&mut self, viewport: Vec2, alpha: f32) {
        let options = DrawOptions {
            viewport,
            alpha,
            use_interpolation: self.toggles.use_interpolation,
            draw_debug_lines: self.toggles.draw_debug_lines,
        };
        for entity in self.registry.iter_mut() {
            entity.interpolate_and_draw(&self.physics, &mut self.graph, options);
        }

        if self.toggles.draw_debug_lines {
            draw_boundaries(
                &self.physics,
                &mut self.graph,
                self.boundary_debug,
                &self.boundaries,
                &self.scale,
            );
        } else {
            self.graph.clear(self.boundary_debug);
        }

        self.diagnostics = Diagnostics {
            step_count: self.clock.step_count(),
            entity_count: self.registry.len(),
            gravity: self.physics.gravity(),
            fixed_step: self.clock.fixed_step(),
            steps_per_second: self.clock.steps_per_second(),
            alpha,
            toggles: self.toggles,
        };
    }
}

/// Drives the simulation once per host frame.
pub struct FrameLoop {
    state: SimulationState,
    commands: CommandQueue,
    sender: CommandSender,
    spawner: Box<dyn ShapeSpawner>,
    panic_policy: PanicPolicy,
}

impl FrameLoop {
    pub fn new(
        config: &WorldConfig,
        timing: FrameTiming,
        viewport: Vec2,
        spawner: Box<dyn ShapeSpawner>,
    ) -> Result<Self, FrameLoopError> {
        let state = SimulationState::new(config, timing, viewport)?;
        let (sender, commands) = command_channel();
        info!(
            gravity_x = config.gravity.x,
            gravity_y = config.gravity.y,
            pixels_per_unit = state.scale.pixels_per_unit(),
            steps_per_second = state.clock.steps_per_second(),
            boundary_count = state.boundaries.len(),
            "world_created"
        );
        Ok(Self {
            state,
            commands,
            sender,
            spawner,
            panic_policy: timing.panic_policy,
        })
    }

    pub fn sender(&self) -> CommandSender {
        self.sender.clone()
    }

    /// Runs one host frame: queued commands, fixed steps, panic policy,
    /// then the render pass.
    pub fn run_frame(&mut self, now: Instant, viewport: Vec2) -> FrameReport {
        let commands = self.commands.drain();
        for command in &commands {
            self.apply_command(*command, viewport);
        }

        let advance = self.state.clock.advance(now);
        let dt_seconds = advance.fixed_step.as_secs_f32();
        let mut pruned = 0;
        for _ in 0..advance.steps {
            pruned += self.state.fixed_step(dt_seconds);
            self.state.clock.record_step(advance.fixed_step);
        }

        let mut panic_removed = 0;
        if self.panic_policy.is_triggered(advance.raw_delta) {
            panic_removed = self.state.apply_panic_policy(&self.panic_policy);
            warn!(
                raw_delta_ms = advance.raw_delta.as_millis() as u64,
                removed = panic_removed,
                remaining = self.state.registry.len(),
                "panic_policy_triggered"
            );
        }

        self.state.render(viewport, advance.alpha);

        FrameReport {
            commands_applied: commands.len(),
            steps: advance.steps,
            alpha: advance.alpha,
            raw_delta: advance.raw_delta,
            pruned,
            panic_removed,
            entity_count: self.state.registry.len(),
        }
    }

    fn apply_command(&mut self, command: SandboxCommand, viewport: Vec2) {
        let state = &mut self.state;
        match command {
            SandboxCommand::AddShape { at } => {
                let params = self.spawner.energetic(spawn_context(state, viewport, at));
                state.spawn(params);
            }
            SandboxCommand::AddCalmShape { at } => {
                let params = self.spawner.calm(spawn_context(state, viewport, at));
                state.spawn(params);
            }
            SandboxCommand::DeleteOne => {
                state
                    .registry
                    .remove_first(&mut state.physics, &mut state.graph);
            }
            SandboxCommand::DeleteAll => {
                let removed = state.registry.clear(&mut state.physics, &mut state.graph);
                info!(removed, "entities_cleared");
            }
            SandboxCommand::IncreaseStepRate => {
                let steps_per_second = state.clock.increase_rate();
                info!(steps_per_second, "step_rate_changed");
            }
            SandboxCommand::DecreaseStepRate => {
                let steps_per_second = state.clock.decrease_rate();
                info!(steps_per_second, "step_rate_changed");
            }
            SandboxCommand::ToggleDebugLines => {
                state.toggles.draw_debug_lines = !state.toggles.draw_debug_lines;
                info!(enabled = state.toggles.draw_debug_lines, "debug_lines_toggled");
            }
            SandboxCommand::ToggleInterpolation => {
                state.toggles.use_interpolation = !state.toggles.use_interpolation;
                info!(enabled = state.toggles.use_interpolation, "interpolation_toggled");
            }
            SandboxCommand::ToggleBullet => {
                state.toggles.bullet_mode = !state.toggles.bullet_mode;
                info!(enabled = state.toggles.bullet_mode, "bullet_mode_toggled");
            }
            SandboxCommand::AdjustGravity { dy } => {
                let gravity = state.physics.gravity() + Vec2::new(0.0, dy);
                state.physics.set_gravity(gravity);
                info!(gravity_x = gravity.x, gravity_y = gravity.y, "gravity_changed");
            }
        }
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.state.graph
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.state.diagnostics
    }

    pub fn background(&self) -> Rgba {
        self.state.background
    }

    pub fn entity_count(&self) -> usize {
        self.state.registry.len()
    }

    pub fn steps_per_second(&self) -> u32 {
        self.state.clock.steps_per_second()
    }

    pub fn toggles(&self) -> Toggles {
        self.state.toggles
    }

    pub fn gravity(&self) -> Vec2 {
        self.state.physics.gravity()
    }
}

fn spawn_context(state: &SimulationState, viewport: Vec2, at: Option<Vec2>) -> SpawnContext {
    SpawnContext {
        viewport,
        at,
        bullet: state.toggles.bullet_mode,
        scale: state.scale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::entity::{ShapeKind, VisualKind};
    use crate::sim::physics::BodyPose;
    use std::f32::consts::{PI, TAU};

    const VIEWPORT: Vec2 = Vec2::new(1280.0, 720.0);

    #[derive(Default)]
    struct GridSpawner {
        spawned: usize,
        last_bullet: Option<bool>,
        spin: f32,
    }

    impl GridSpawner {
        fn next_params(&mut self, context: SpawnContext, restitution: f32) -> EntityParams {
            let index = self.spawned;
            self.spawned += 1;
            self.last_bullet = Some(context.bullet);
            let position = context.at.unwrap_or(Vec2::new(
                60.0 + (index % 20) as f32 * 40.0,
                80.0 + (index / 20) as f32 * 40.0,
            ));
            EntityParams {
                position,
                angle: 0.0,
                angular_velocity: self.spin,
                shape: ShapeKind::Box {
                    half_width: 10.0,
                    half_height: 10.0,
                },
                visual: VisualKind::Fill {
                    color: [240, 80, 80, 255],
                },
                friction: 0.5,
                restitution,
                density: 1.0,
                bullet: context.bullet,
                impulse: Vec2::ZERO,
            }
        }
    }

    impl ShapeSpawner for GridSpawner {
        fn energetic(&mut self, context: SpawnContext) -> EntityParams {
            self.next_params(context, 0.4)
        }

        fn calm(&mut self, context: SpawnContext) -> EntityParams {
            self.next_params(context, 0.0)
        }
    }

    fn frame_loop() -> FrameLoop {
        FrameLoop::new(
            &WorldConfig::default(),
            FrameTiming::default(),
            VIEWPORT,
            Box::new(GridSpawner::default()),
        )
        .expect("frame loop")
    }

    fn queue_shapes(frame_loop: &FrameLoop, count: usize) {
        let sender = frame_loop.sender();
        for _ in 0..count {
            assert!(sender.send(SandboxCommand::AddShape { at: None }));
        }
    }

    #[test]
    fn spinning_body_is_drawn_near_its_physics_angle_across_the_seam() {
        let spin = 6.0;
        let config = WorldConfig {
            gravity: Vec2::ZERO,
            ..WorldConfig::default()
        };
        let mut frame_loop = FrameLoop::new(
            &config,
            FrameTiming::default(),
            VIEWPORT,
            Box::new(GridSpawner {
                spin,
                ..GridSpawner::default()
            }),
        )
        .expect("frame loop");
        frame_loop.sender().send(SandboxCommand::AddShape {
            at: Some(Vec2::new(640.0, 360.0)),
        });

        let step_sweep = spin / config.steps_per_second as f32;
        let base = Instant::now();
        let mut crossed_seam = false;
        let mut last_angle: Option<f32> = None;
        for frame in 0..150u64 {
            frame_loop.run_frame(base + Duration::from_millis(frame * 16), VIEWPORT);

            let entity = frame_loop.state.registry.iter().next().expect("entity");
            let physics_angle = frame_loop
                .state
                .physics
                .body_pose(entity.body())
                .expect("pose")
                .angle;
            let drawn = frame_loop
                .graph()
                .transform(entity.visual_node())
                .expect("transform")
                .rotation_radians;
            let gap = (drawn - physics_angle + PI).rem_euclid(TAU) - PI;
            assert!(
                gap.abs() <= step_sweep + 0.01,
                "frame {frame}: drawn {drawn} vs physics {physics_angle}"
            );

            if let Some(last) = last_angle {
                crossed_seam |= last > 2.5 && physics_angle < -2.5;
            }
            last_angle = Some(physics_angle);
        }
        assert!(crossed_seam);
    }

    #[test]
    fn first_frame_applies_commands_without_stepping() {
        let mut frame_loop = frame_loop();
        queue_shapes(&frame_loop, 3);

        let report = frame_loop.run_frame(Instant::now(), VIEWPORT);
        assert_eq!(report.commands_applied, 3);
        assert_eq!(report.steps, 0);
        assert_eq!(report.entity_count, 3);
        assert_eq!(frame_loop.diagnostics().entity_count, 3);
    }

    #[test]
    fn delete_all_then_add_in_same_frame_leaves_one_entity() {
        let mut frame_loop = frame_loop();
        queue_shapes(&frame_loop, 5);
        let base = Instant::now();
        frame_loop.run_frame(base, VIEWPORT);

        let sender = frame_loop.sender();
        sender.send(SandboxCommand::DeleteAll);
        sender.send(SandboxCommand::AddShape { at: None });
        let report = frame_loop.run_frame(base + Duration::from_millis(16), VIEWPORT);
        assert_eq!(report.entity_count, 1);
    }

    #[test]
    fn delete_one_removes_oldest() {
        let mut frame_loop = frame_loop();
        let sender = frame_loop.sender();
        sender.send(SandboxCommand::AddShape {
            at: Some(Vec2::new(100.0, 100.0)),
        });
        sender.send(SandboxCommand::AddShape {
            at: Some(Vec2::new(200.0, 100.0)),
        });
        sender.send(SandboxCommand::DeleteOne);
        frame_loop.run_frame(Instant::now(), VIEWPORT);

        let remaining: Vec<_> = frame_loop.state.registry.iter().collect();
        assert_eq!(remaining.len(), 1);
        let pose = frame_loop
            .state
            .physics
            .body_pose(remaining[0].body())
            .expect("pose");
        assert!((pose.position.x * 30.0 - 200.0).abs() < 0.01);
    }

    #[test]
    fn panic_policy_trims_fifteen_down_to_four() {
        let mut frame_loop = frame_loop();
        queue_shapes(&frame_loop, 15);
        let base = Instant::now();
        frame_loop.run_frame(base, VIEWPORT);
        assert_eq!(frame_loop.entity_count(), 15);

        let report = frame_loop.run_frame(base + Duration::from_millis(150), VIEWPORT);
        assert_eq!(report.panic_removed, 11);
        assert_eq!(report.entity_count, 4);
    }

    #[test]
    fn panic_policy_removes_only_oldest_when_few_remain() {
        let mut frame_loop = frame_loop();
        queue_shapes(&frame_loop, 5);
        let base = Instant::now();
        frame_loop.run_frame(base, VIEWPORT);

        let report = frame_loop.run_frame(base + Duration::from_millis(101), VIEWPORT);
        assert_eq!(report.panic_removed, 1);
        assert_eq!(report.entity_count, 4);
    }

    #[test]
    fn normal_frame_does_not_trigger_panic_policy() {
        let mut frame_loop = frame_loop();
        queue_shapes(&frame_loop, 15);
        let base = Instant::now();
        frame_loop.run_frame(base, VIEWPORT);

        let report = frame_loop.run_frame(base + Duration::from_millis(100), VIEWPORT);
        assert_eq!(report.panic_removed, 0);
        assert_eq!(report.entity_count, 15);
    }

    #[test]
    fn out_of_bounds_entity_is_pruned_before_next_step() {
        let mut frame_loop = frame_loop();
        queue_shapes(&frame_loop, 1);
        let base = Instant::now();
        frame_loop.run_frame(base, VIEWPORT);

        let body = frame_loop
            .state
            .registry
            .iter()
            .next()
            .map(|entity| entity.body())
            .expect("entity");
        frame_loop.state.physics.set_body_pose(
            body,
            BodyPose {
                position: Vec2::new(-5.0, -5.0),
                angle: 0.0,
            },
        );

        // Shorter than one fixed step: only the render pass runs.
        let report = frame_loop.run_frame(base + Duration::from_millis(5), VIEWPORT);
        assert_eq!(report.steps, 0);
        assert_eq!(report.entity_count, 1);
        assert!(frame_loop.state.registry.iter().all(|entity| entity.is_dirty()));

        let report = frame_loop.run_frame(base + Duration::from_millis(25), VIEWPORT);
        assert_eq!(report.steps, 1);
        assert_eq!(report.pruned, 1);
        assert_eq!(report.entity_count, 0);
        assert!(!frame_loop.state.physics.contains(body));
    }

    #[test]
    fn step_rate_commands_change_clock() {
        let mut frame_loop = frame_loop();
        let sender = frame_loop.sender();
        sender.send(SandboxCommand::IncreaseStepRate);
        sender.send(SandboxCommand::IncreaseStepRate);
        sender.send(SandboxCommand::DecreaseStepRate);
        frame_loop.run_frame(Instant::now(), VIEWPORT);

        assert_eq!(frame_loop.steps_per_second(), 65);
        let diagnostics = frame_loop.diagnostics();
        assert_eq!(diagnostics.steps_per_second, 65);
        assert!((diagnostics.fixed_step.as_secs_f64() - 1.0 / 65.0).abs() < 1e-9);
    }

    #[test]
    fn toggles_flip_and_bullet_mode_reaches_spawner() {
        let mut frame_loop = frame_loop();
        let sender = frame_loop.sender();
        sender.send(SandboxCommand::ToggleBullet);
        sender.send(SandboxCommand::ToggleInterpolation);
        sender.send(SandboxCommand::AddShape { at: None });
        frame_loop.run_frame(Instant::now(), VIEWPORT);

        let toggles = frame_loop.toggles();
        assert!(toggles.bullet_mode);
        assert!(!toggles.use_interpolation);
        let body = frame_loop
            .state
            .registry
            .iter()
            .next()
            .map(|entity| entity.body())
            .expect("entity");
        assert!(frame_loop.state.physics.is_bullet(body));
    }

    #[test]
    fn debug_toggle_draws_and_clears_boundary_lines() {
        let mut frame_loop = frame_loop();
        let base = Instant::now();
        frame_loop.sender().send(SandboxCommand::ToggleDebugLines);
        frame_loop.run_frame(base, VIEWPORT);
        let node = frame_loop.state.boundary_debug;
        assert_eq!(frame_loop.graph().primitives(node).len(), 8);

        frame_loop.sender().send(SandboxCommand::ToggleDebugLines);
        frame_loop.run_frame(base + Duration::from_millis(5), VIEWPORT);
        assert!(frame_loop.graph().primitives(node).is_empty());
    }

    #[test]
    fn adjust_gravity_changes_vertical_component() {
        let mut frame_loop = frame_loop();
        frame_loop
            .sender()
            .send(SandboxCommand::AdjustGravity { dy: -1.0 });
        frame_loop.run_frame(Instant::now(), VIEWPORT);

        let gravity = frame_loop.gravity();
        assert!((gravity.y - 9.0).abs() < 0.0001);
        assert_eq!(gravity.x, 0.0);
        assert!((frame_loop.diagnostics().gravity.y - 9.0).abs() < 0.0001);
    }

    #[test]
    fn diagnostics_lines_report_toggle_states() {
        let frame_loop = frame_loop();
        let lines = frame_loop.diagnostics().lines();
        assert!(lines.iter().any(|line| line == "interpolation: on"));
        assert!(lines.iter().any(|line| line == "bullet: off"));
    }
}
