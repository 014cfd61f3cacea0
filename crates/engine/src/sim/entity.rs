use std::f32::consts::{PI, TAU};

use thiserror::Error;
use tracing::debug;

use crate::math::{PixelScale, Vec2};
use crate::scene_graph::{Layer, NodeId, NodeTransform, Primitive, Rgba, SceneGraph, SceneGraphError};
use crate::sim::physics::{
    BodyHandle, BodyPose, DynamicBodyDesc, FixtureDesc, FixtureOutline, FixtureShape, PhysicsWorld,
};

/// Seconds a body keeps continuous collision detection after spawning.
pub const BULLET_TIMEOUT_SECONDS: f32 = 1.0;

pub const DEBUG_OUTLINE_COLOR: Rgba = [0x00, 0xff, 0x6a, 0xff];

/// Collision shape in pixel units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShapeKind {
    Box { half_width: f32, half_height: f32 },
    Circle { radius: f32 },
}

impl ShapeKind {
    /// Half extents of the axis-aligned box enclosing the shape.
    pub fn half_extents(&self) -> Vec2 {
        match *self {
            ShapeKind::Box {
                half_width,
                half_height,
            } => Vec2::new(half_width, half_height),
            ShapeKind::Circle { radius } => Vec2::new(radius, radius),
        }
    }

    fn fixture_shape(&self, scale: &PixelScale) -> FixtureShape {
        let upp = scale.units_per_pixel();
        match *self {
            ShapeKind::Box {
                half_width,
                half_height,
            } => FixtureShape::Box {
                half_width: half_width * upp,
                half_height: half_height * upp,
            },
            ShapeKind::Circle { radius } => FixtureShape::Circle {
                radius: radius * upp,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VisualKind {
    Fill { color: Rgba },
    Sprite { key: String, fallback_color: Rgba },
}

/// Everything needed to spawn one entity. Positions are in pixels, the
/// impulse is in physics units.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityParams {
    pub position: Vec2,
    pub angle: f32,
    pub angular_velocity: f32,
    pub shape: ShapeKind,
    pub visual: VisualKind,
    pub friction: f32,
    pub restitution: f32,
    pub density: f32,
    pub bullet: bool,
    pub impulse: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PreviousPhysicsState {
    pub position: Vec2,
    pub angle: f32,
}

impl From<BodyPose> for PreviousPhysicsState {
    fn from(pose: BodyPose) -> Self {
        Self {
            position: pose.position,
            angle: pose.angle,
        }
    }
}

#[derive(Debug, Error)]
pub enum EntityError {
    #[error("failed to attach entity node to the scene graph")]
    Scene(#[from] SceneGraphError),
    #[error("physics body {0:?} rejected its fixture")]
    FixtureRejected(BodyHandle),
}

/// Flags passed to the per-frame draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawOptions {
    pub viewport: Vec2,
    pub alpha: f32,
    pub use_interpolation: bool,
    pub draw_debug_lines: bool,
}

/// One simulated body with its visual and debug nodes.
#[derive(Debug)]
pub struct Entity {
    body: BodyHandle,
    visual: NodeId,
    debug: NodeId,
    shape: ShapeKind,
    visual_kind: VisualKind,
    scale: PixelScale,
    dirty: bool,
    bullet_timeout: f32,
    previous: PreviousPhysicsState,
}

impl Entity {
    pub fn create(
        graph: &mut SceneGraph,
        physics: &mut PhysicsWorld,
        scale: PixelScale,
        params: EntityParams,
    ) -> Result<Self, EntityError> {
        let body = physics.create_dynamic_body(DynamicBodyDesc {
            position: scale.to_units(params.position),
            angle: params.angle,
            angular_velocity: params.angular_velocity,
            bullet: params.bullet,
        });
        let fixture = FixtureDesc {
            shape: params.shape.fixture_shape(&scale),
            friction: params.friction,
            restitution: params.restitution,
            density: params.density,
        };
        if physics.create_fixture(body, fixture).is_none() {
            physics.destroy_body(body);
            return Err(EntityError::FixtureRejected(body));
        }

        let visual = graph.create_container();
        let graphics = graph.create_graphics();
        let debug = graph.create_graphics();
        let attached = attach_nodes(graph, visual, graphics, debug);
        if let Err(err) = attached {
            physics.destroy_body(body);
            graph.release(graphics);
            graph.release(visual);
            graph.release(debug);
            return Err(err.into());
        }

        let half = params.shape.half_extents();
        graph.draw(graphics, visual_primitive(&params.shape, &params.visual));
        graph.set_transform(
            visual,
            NodeTransform {
                position: params.position,
                rotation_radians: params.angle,
                pivot: half,
                scale: 1.0,
            },
        );

        if params.impulse != Vec2::ZERO {
            physics.apply_impulse(body, params.impulse, None);
        }

        let previous = physics
            .body_pose(body)
            .map(PreviousPhysicsState::from)
            .unwrap_or_default();

        Ok(Self {
            body,
            visual,
            debug,
            shape: params.shape,
            visual_kind: params.visual,
            scale,
            dirty: false,
            bullet_timeout: 0.0,
            previous,
        })
    }

    pub fn capture_state(&mut self, physics: &PhysicsWorld) {
        if let Some(pose) = physics.body_pose(self.body) {
            self.previous = pose.into();
        }
    }

    /// Accumulates `dt_seconds` while the body is a bullet and turns
    /// continuous collision off once the timeout is reached.
    pub fn advance_bullet_timeout(&mut self, physics: &mut PhysicsWorld, dt_seconds: f32) {
        if !physics.is_bullet(self.body) {
            return;
        }
        self.bullet_timeout += dt_seconds;
        if self.bullet_timeout >= BULLET_TIMEOUT_SECONDS {
            physics.set_bullet(self.body, false);
            self.bullet_timeout = 0.0;
        }
    }

    /// Pushes the blended pose to the visual node, refreshes the dirty flag
    /// and redraws or clears the debug outline.
    pub fn interpolate_and_draw(
        &mut self,
        physics: &PhysicsWorld,
        graph: &mut SceneGraph,
        options: DrawOptions,
    ) -> Option<BodyPose> {
        let Some(current) = physics.body_pose(self.body) else {
            self.dirty = true;
            return None;
        };
        let pose = if options.use_interpolation {
            interpolate_pose(self.previous, current, options.alpha)
        } else {
            current
        };

        let mut transform = graph.transform(self.visual).unwrap_or_default();
        transform.position = self.scale.to_pixels(pose.position);
        transform.rotation_radians = pose.angle;
        graph.set_transform(self.visual, transform);

        let was_dirty = self.dirty;
        self.dirty = match physics.world_center(self.body) {
            Some(center) => !within_viewport(center, options.viewport, &self.scale),
            None => true,
        };
        if self.dirty && !was_dirty {
            debug!(
                body = ?self.body,
                x = pose.position.x,
                y = pose.position.y,
                "entity_out_of_bounds"
            );
        }

        graph.clear(self.debug);
        if options.draw_debug_lines {
            for outline in physics.fixture_outlines(self.body) {
                graph.draw(self.debug, outline_primitive(&outline, pose, &self.scale));
            }
        }

        Some(pose)
    }

    /// Removes the body, then releases both nodes.
    pub fn destroy(self, physics: &mut PhysicsWorld, graph: &mut SceneGraph) {
        physics.destroy_body(self.body);
        graph.release(self.visual);
        graph.release(self.debug);
    }

    pub fn body(&self) -> BodyHandle {
        self.body
    }

    pub fn visual_node(&self) -> NodeId {
        self.visual
    }

    pub fn debug_node(&self) -> NodeId {
        self.debug
    }

    pub fn shape(&self) -> ShapeKind {
        self.shape
    }

    pub fn visual_kind(&self) -> &VisualKind {
        &self.visual_kind
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn bullet_timeout(&self) -> f32 {
        self.bullet_timeout
    }

    pub fn previous_state(&self) -> PreviousPhysicsState {
        self.previous
    }
}

/// Blends position linearly and angle along the shortest arc, so a body
/// crossing the +/-pi seam does not sweep the long way round.
pub fn interpolate_pose(previous: PreviousPhysicsState, current: BodyPose, alpha: f32) -> BodyPose {
    let delta = (current.angle - previous.angle + PI).rem_euclid(TAU) - PI;
    BodyPose {
        position: previous.position.lerp(current.position, alpha),
        angle: previous.angle + delta * alpha,
    }
}

fn attach_nodes(
    graph: &mut SceneGraph,
    visual: NodeId,
    graphics: NodeId,
    debug: NodeId,
) -> Result<(), SceneGraphError> {
    graph.add_child(visual, graphics)?;
    graph.add_child(graph.layer(Layer::Shapes), visual)?;
    graph.add_child(graph.layer(Layer::Debug), debug)
}

fn within_viewport(center: Vec2, viewport: Vec2, scale: &PixelScale) -> bool {
    let bounds = scale.to_units(viewport);
    (0.0..=bounds.x).contains(&center.x) && (0.0..=bounds.y).contains(&center.y)
}

fn visual_primitive(shape: &ShapeKind, visual: &VisualKind) -> Primitive {
    let half = shape.half_extents();
    match (visual, shape) {
        (VisualKind::Fill { color }, ShapeKind::Box { .. }) => Primitive::FilledRect {
            origin: Vec2::ZERO,
            width: half.x * 2.0,
            height: half.y * 2.0,
            color: *color,
        },
        (VisualKind::Fill { color }, ShapeKind::Circle { radius }) => Primitive::FilledCircle {
            center: half,
            radius: *radius,
            color: *color,
        },
        (
            VisualKind::Sprite {
                key,
                fallback_color,
            },
            _,
        ) => Primitive::Sprite {
            key: key.clone(),
            origin: Vec2::ZERO,
            width: half.x * 2.0,
            height: half.y * 2.0,
            fallback_color: *fallback_color,
        },
    }
}

fn outline_primitive(outline: &FixtureOutline, pose: BodyPose, scale: &PixelScale) -> Primitive {
    let to_screen = |local: Vec2| scale.to_pixels(pose.position + local.rotated(pose.angle));
    match outline {
        FixtureOutline::Polygon(points) => Primitive::PolygonOutline {
            points: points.iter().map(|point| to_screen(*point)).collect(),
            color: DEBUG_OUTLINE_COLOR,
        },
        FixtureOutline::Circle { center, radius } => Primitive::CircleOutline {
            center: to_screen(*center),
            radius: radius * scale.pixels_per_unit(),
            color: DEBUG_OUTLINE_COLOR,
        },
        FixtureOutline::Edge { from, to } => Primitive::Line {
            from: to_screen(*from),
            to: to_screen(*to),
            color: DEBUG_OUTLINE_COLOR,
        },
    }
}
