//! rapier2d integration.
//!
//! [`PhysicsWorld`] owns every rapier set and exposes the narrow surface the
//! simulation needs. Every read hands back a value copy ([`BodyPose`],
//! [`Vec2`], [`FixtureOutline`]) so no caller can hold onto solver state
//! between steps.

use rapier2d::prelude::*;

use crate::math::Vec2;

pub use rapier2d::prelude::RigidBodyHandle as BodyHandle;

const BOUNDARY_TAG_BIT: u128 = 1 << 64;

/// Marks a body as gameplay geometry or as part of a boundary rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyTag {
    Entity,
    Boundary { index: u32 },
}

impl BodyTag {
    fn to_user_data(self) -> u128 {
        match self {
            BodyTag::Entity => 0,
            BodyTag::Boundary { index } => BOUNDARY_TAG_BIT | index as u128,
        }
    }

    fn from_user_data(data: u128) -> Self {
        if data & BOUNDARY_TAG_BIT != 0 {
            BodyTag::Boundary {
                index: (data & u32::MAX as u128) as u32,
            }
        } else {
            BodyTag::Entity
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyPose {
    pub position: Vec2,
    pub angle: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamicBodyDesc {
    pub position: Vec2,
    pub angle: f32,
    pub angular_velocity: f32,
    pub bullet: bool,
}

/// Fixture geometry in physics units, relative to the body origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FixtureShape {
    Box { half_width: f32, half_height: f32 },
    Circle { radius: f32 },
    Edge { from: Vec2, to: Vec2 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixtureDesc {
    pub shape: FixtureShape,
    pub friction: f32,
    pub restitution: f32,
    pub density: f32,
}

/// Fixture outline in body-local physics units.
#[derive(Debug, Clone, PartialEq)]
pub enum FixtureOutline {
    Polygon(Vec<Vec2>),
    Circle { center: Vec2, radius: f32 },
    Edge { from: Vec2, to: Vec2 },
}

pub struct PhysicsWorld {
    pipeline: PhysicsPipeline,
    gravity: Vector<Real>,
    integration_params: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,
}

impl PhysicsWorld {
    pub fn new(gravity: Vec2) -> Self {
        Self {
            pipeline: PhysicsPipeline::new(),
            gravity: vector![gravity.x, gravity.y],
            integration_params: IntegrationParameters::default(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
        }
    }

    pub fn gravity(&self) -> Vec2 {
        Vec2::new(self.gravity.x, self.gravity.y)
    }

    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.gravity = vector![gravity.x, gravity.y];
        // Sleeping bodies ignore gravity changes until woken.
        for (_, body) in self.rigid_body_set.iter_mut() {
            if body.is_dynamic() {
                body.wake_up(true);
            }
        }
    }

    pub fn create_dynamic_body(&mut self, desc: DynamicBodyDesc) -> BodyHandle {
        let body = RigidBodyBuilder::dynamic()
            .translation(vector![desc.position.x, desc.position.y])
            .rotation(desc.angle)
            .angvel(desc.angular_velocity)
            .ccd_enabled(desc.bullet)
            .user_data(BodyTag::Entity.to_user_data())
            .build();
        self.rigid_body_set.insert(body)
    }

    pub fn create_static_body(&mut self, position: Vec2, tag: BodyTag) -> BodyHandle {
        let body = RigidBodyBuilder::fixed()
            .translation(vector![position.x, position.y])
            .user_data(tag.to_user_data())
            .build();
        self.rigid_body_set.insert(body)
    }

    pub fn create_fixture(&mut self, body: BodyHandle, desc: FixtureDesc) -> Option<ColliderHandle> {
        if !self.rigid_body_set.contains(body) {
            return None;
        }
        let builder = match desc.shape {
            FixtureShape::Box {
                half_width,
                half_height,
            } => ColliderBuilder::cuboid(half_width, half_height),
            FixtureShape::Circle { radius } => ColliderBuilder::ball(radius),
            FixtureShape::Edge { from, to } => {
                ColliderBuilder::segment(point![from.x, from.y], point![to.x, to.y])
            }
        };
        let collider = builder
            .friction(desc.friction)
            .restitution(desc.restitution)
            .density(desc.density)
            .build();
        Some(
            self.collider_set
                .insert_with_parent(collider, body, &mut self.rigid_body_set),
        )
    }

    /// Removes the body and every fixture attached to it.
    pub fn destroy_body(&mut self, body: BodyHandle) -> bool {
        self.rigid_body_set
            .remove(
                body,
                &mut self.island_manager,
                &mut self.collider_set,
                &mut self.impulse_joint_set,
                &mut self.multibody_joint_set,
                true,
            )
            .is_some()
    }

    /// Applies a linear impulse at a world point, or at the center of mass
    /// when no point is given.
    pub fn apply_impulse(&mut self, body: BodyHandle, impulse: Vec2, point: Option<Vec2>) -> bool {
        let Some(rb) = self.rigid_body_set.get_mut(body) else {
            return false;
        };
        let impulse = vector![impulse.x, impulse.y];
        match point {
            Some(point) => rb.apply_impulse_at_point(impulse, point![point.x, point.y], true),
            None => rb.apply_impulse(impulse, true),
        }
        true
    }

    pub fn step(&mut self, dt_seconds: f32) {
        self.integration_params.dt = dt_seconds;
        self.pipeline.step(
            &self.gravity,
            &self.integration_params,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            None,
            &(),
            &(),
        );
    }

    pub fn body_pose(&self, body: BodyHandle) -> Option<BodyPose> {
        self.rigid_body_set.get(body).map(|rb| {
            let translation = rb.translation();
            BodyPose {
                position: Vec2::new(translation.x, translation.y),
                angle: rb.rotation().angle(),
            }
        })
    }

    /// Moves a body without simulating the motion in between.
    pub fn set_body_pose(&mut self, body: BodyHandle, pose: BodyPose) -> bool {
        let Some(rb) = self.rigid_body_set.get_mut(body) else {
            return false;
        };
        rb.set_translation(vector![pose.position.x, pose.position.y], true);
        rb.set_rotation(Rotation::new(pose.angle), true);
        true
    }

    pub fn world_center(&self, body: BodyHandle) -> Option<Vec2> {
        self.rigid_body_set.get(body).map(|rb| {
            let center = rb.position() * rb.mass_properties().local_mprops.local_com;
            Vec2::new(center.x, center.y)
        })
    }

    pub fn linear_velocity(&self, body: BodyHandle) -> Option<Vec2> {
        self.rigid_body_set.get(body).map(|rb| {
            let velocity = rb.linvel();
            Vec2::new(velocity.x, velocity.y)
        })
    }

    pub fn is_bullet(&self, body: BodyHandle) -> bool {
        self.rigid_body_set
            .get(body)
            .map(|rb| rb.is_ccd_enabled())
            .unwrap_or(false)
    }

    pub fn set_bullet(&mut self, body: BodyHandle, bullet: bool) -> bool {
        match self.rigid_body_set.get_mut(body) {
            Some(rb) => {
                rb.enable_ccd(bullet);
                true
            }
            None => false,
        }
    }

    pub fn tag(&self, body: BodyHandle) -> Option<BodyTag> {
        self.rigid_body_set
            .get(body)
            .map(|rb| BodyTag::from_user_data(rb.user_data))
    }

    pub fn contains(&self, body: BodyHandle) -> bool {
        self.rigid_body_set.contains(body)
    }

    pub fn body_count(&self) -> usize {
        self.rigid_body_set.len()
    }

    pub fn bodies(&self) -> impl Iterator<Item = (BodyHandle, BodyTag)> + '_ {
        self.rigid_body_set
            .iter()
            .map(|(handle, rb)| (handle, BodyTag::from_user_data(rb.user_data)))
    }

    pub fn boundary_bodies(&self) -> Vec<BodyHandle> {
        let mut handles: Vec<(u32, BodyHandle)> = self
            .bodies()
            .filter_map(|(handle, tag)| match tag {
                BodyTag::Boundary { index } => Some((index, handle)),
                BodyTag::Entity => None,
            })
            .collect();
        handles.sort_by_key(|(index, _)| *index);
        handles.into_iter().map(|(_, handle)| handle).collect()
    }

    /// Outlines of every fixture on `body`, in body-local coordinates.
    pub fn fixture_outlines(&self, body: BodyHandle) -> Vec<FixtureOutline> {
        let Some(rb) = self.rigid_body_set.get(body) else {
            return Vec::new();
        };
        let mut outlines = Vec::with_capacity(rb.colliders().len());
        for collider_handle in rb.colliders() {
            let Some(collider) = self.collider_set.get(*collider_handle) else {
                continue;
            };
            let local = collider
                .position_wrt_parent()
                .copied()
                .unwrap_or_else(Isometry::identity);
            let to_local = |p: Point<Real>| {
                let mapped = local * p;
                Vec2::new(mapped.x, mapped.y)
            };
            let shape = collider.shape();
            if let Some(cuboid) = shape.as_cuboid() {
                let hx = cuboid.half_extents.x;
                let hy = cuboid.half_extents.y;
                outlines.push(FixtureOutline::Polygon(vec![
                    to_local(point![-hx, -hy]),
                    to_local(point![hx, -hy]),
                    to_local(point![hx, hy]),
                    to_local(point![-hx, hy]),
                ]));
            } else if let Some(ball) = shape.as_ball() {
                outlines.push(FixtureOutline::Circle {
                    center: to_local(Point::origin()),
                    radius: ball.radius,
                });
            } else if let Some(segment) = shape.as_segment() {
                outlines.push(FixtureOutline::Edge {
                    from: to_local(segment.a),
                    to: to_local(segment.b),
                });
            }
        }
        outlines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn box_fixture() -> FixtureDesc {
        FixtureDesc {
            shape: FixtureShape::Box {
                half_width: 0.5,
                half_height: 0.5,
            },
            friction: 0.5,
            restitution: 0.2,
            density: 1.0,
        }
    }

    fn dynamic_at(position: Vec2) -> DynamicBodyDesc {
        DynamicBodyDesc {
            position,
            angle: 0.0,
            angular_velocity: 0.0,
            bullet: false,
        }
    }

    #[test]
    fn gravity_moves_dynamic_body_along_y() {
        let mut world = PhysicsWorld::new(Vec2::new(0.0, 10.0));
        let body = world.create_dynamic_body(dynamic_at(Vec2::new(1.0, 1.0)));
        world.create_fixture(body, box_fixture()).expect("fixture");

        for _ in 0..10 {
            world.step(1.0 / 60.0);
        }

        let pose = world.body_pose(body).expect("pose");
        assert!(pose.position.y > 1.0);
        assert!((pose.position.x - 1.0).abs() < 0.0001);
    }

    #[test]
    fn destroy_body_removes_it_and_its_fixtures() {
        let mut world = PhysicsWorld::new(Vec2::ZERO);
        let body = world.create_dynamic_body(dynamic_at(Vec2::ZERO));
        world.create_fixture(body, box_fixture()).expect("fixture");

        assert!(world.destroy_body(body));
        assert!(!world.contains(body));
        assert_eq!(world.body_count(), 0);
        assert!(world.fixture_outlines(body).is_empty());
        assert!(!world.destroy_body(body));
    }

    #[test]
    fn bullet_flag_round_trips() {
        let mut world = PhysicsWorld::new(Vec2::ZERO);
        let body = world.create_dynamic_body(DynamicBodyDesc {
            bullet: true,
            ..dynamic_at(Vec2::ZERO)
        });
        assert!(world.is_bullet(body));
        assert!(world.set_bullet(body, false));
        assert!(!world.is_bullet(body));
    }

    #[test]
    fn tags_distinguish_boundaries_from_entities() {
        let mut world = PhysicsWorld::new(Vec2::ZERO);
        let entity = world.create_dynamic_body(dynamic_at(Vec2::ZERO));
        let second = world.create_static_body(Vec2::ZERO, BodyTag::Boundary { index: 1 });
        let first = world.create_static_body(Vec2::ZERO, BodyTag::Boundary { index: 0 });

        assert_eq!(world.tag(entity), Some(BodyTag::Entity));
        assert_eq!(world.tag(second), Some(BodyTag::Boundary { index: 1 }));
        assert_eq!(world.boundary_bodies(), vec![first, second]);
    }

    #[test]
    fn box_outline_is_local_to_body() {
        let mut world = PhysicsWorld::new(Vec2::ZERO);
        let body = world.create_dynamic_body(DynamicBodyDesc {
            angle: 0.3,
            ..dynamic_at(Vec2::new(4.0, 5.0))
        });
        world.create_fixture(body, box_fixture()).expect("fixture");

        let outlines = world.fixture_outlines(body);
        assert_eq!(outlines.len(), 1);
        let FixtureOutline::Polygon(points) = &outlines[0] else {
            panic!("expected polygon outline, got {:?}", outlines[0]);
        };
        assert_eq!(points.len(), 4);
        assert!((points[0].x + 0.5).abs() < 0.0001);
        assert!((points[0].y + 0.5).abs() < 0.0001);
        assert!((points[2].x - 0.5).abs() < 0.0001);
        assert!((points[2].y - 0.5).abs() < 0.0001);
    }

    #[test]
    fn impulse_changes_velocity() {
        let mut world = PhysicsWorld::new(Vec2::ZERO);
        let body = world.create_dynamic_body(dynamic_at(Vec2::ZERO));
        world.create_fixture(body, box_fixture()).expect("fixture");

        assert!(world.apply_impulse(body, Vec2::new(3.0, 0.0), None));
        let velocity = world.linear_velocity(body).expect("velocity");
        assert!(velocity.x > 0.0);
    }

    #[test]
    fn set_body_pose_teleports() {
        let mut world = PhysicsWorld::new(Vec2::ZERO);
        let body = world.create_dynamic_body(dynamic_at(Vec2::ZERO));
        world.create_fixture(body, box_fixture()).expect("fixture");
        world.set_body_pose(
            body,
            BodyPose {
                position: Vec2::new(7.0, -2.0),
                angle: 0.25,
            },
        );

        let pose = world.body_pose(body).expect("pose");
        assert!((pose.position.x - 7.0).abs() < 0.0001);
        assert!((pose.angle - 0.25).abs() < 0.0001);
        let center = world.world_center(body).expect("center");
        assert!((center.x - 7.0).abs() < 0.0001);
        assert!((center.y + 2.0).abs() < 0.0001);
    }
}
