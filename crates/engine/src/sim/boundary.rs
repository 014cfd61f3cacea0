use serde::{Deserialize, Serialize};
use tracing::info;

use crate::math::{PixelScale, Vec2};
use crate::scene_graph::{NodeId, Primitive, Rgba, SceneGraph};
use crate::sim::physics::{BodyHandle, BodyTag, FixtureDesc, FixtureOutline, FixtureShape, PhysicsWorld};

pub const BOUNDARY_OUTLINE_COLOR: Rgba = [0xff, 0xd2, 0x3f, 0xff];

/// Width or height of a boundary rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryExtent {
    /// Follows the viewport dimension on the same axis.
    Viewport,
    Pixels(f32),
}

impl BoundaryExtent {
    fn resolve(self, viewport: f32) -> f32 {
        match self {
            BoundaryExtent::Viewport => viewport,
            BoundaryExtent::Pixels(pixels) => pixels,
        }
    }
}

/// One closed rectangle of static walls, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoundarySpec {
    #[serde(default)]
    pub origin: Vec2,
    pub width: BoundaryExtent,
    pub height: BoundaryExtent,
    #[serde(default = "default_wall_friction")]
    pub friction: f32,
    #[serde(default)]
    pub restitution: f32,
}

impl BoundarySpec {
    pub fn screen() -> Self {
        Self {
            origin: Vec2::ZERO,
            width: BoundaryExtent::Viewport,
            height: BoundaryExtent::Viewport,
            friction: default_wall_friction(),
            restitution: 0.0,
        }
    }

    pub fn fixed_width(width_pixels: f32) -> Self {
        Self {
            width: BoundaryExtent::Pixels(width_pixels),
            ..Self::screen()
        }
    }

    /// Corner-to-corner size in pixels for the given viewport.
    pub fn size(&self, viewport: Vec2) -> Vec2 {
        Vec2::new(self.width.resolve(viewport.x), self.height.resolve(viewport.y))
    }
}

fn default_wall_friction() -> f32 {
    0.6
}

/// Default arena: the full screen plus a second rectangle 640 px wide.
pub fn default_boundaries() -> Vec<BoundarySpec> {
    vec![BoundarySpec::screen(), BoundarySpec::fixed_width(640.0)]
}

/// Creates one static body per boundary, each carrying four edge fixtures.
pub fn build_boundaries(
    physics: &mut PhysicsWorld,
    specs: &[BoundarySpec],
    viewport: Vec2,
    scale: &PixelScale,
) -> Vec<BodyHandle> {
    let mut handles = Vec::with_capacity(specs.len());
    for (index, spec) in specs.iter().enumerate() {
        let size = scale.to_units(spec.size(viewport));
        let body = physics.create_static_body(
            scale.to_units(spec.origin),
            BodyTag::Boundary {
                index: index as u32,
            },
        );
        let corners = [
            Vec2::ZERO,
            Vec2::new(size.x, 0.0),
            Vec2::new(size.x, size.y),
            Vec2::new(0.0, size.y),
        ];
        for edge in 0..corners.len() {
            let from = corners[edge];
            let to = corners[(edge + 1) % corners.len()];
            physics.create_fixture(
                body,
                FixtureDesc {
                    shape: FixtureShape::Edge { from, to },
                    friction: spec.friction,
                    restitution: spec.restitution,
                    density: 0.0,
                },
            );
        }
        info!(
            index,
            width_px = spec.size(viewport).x,
            height_px = spec.size(viewport).y,
            "boundary_created"
        );
        handles.push(body);
    }
    handles
}

/// Replaces the contents of `node` with the edges of every boundary body.
pub fn draw_boundaries(
    physics: &PhysicsWorld,
    graph: &mut SceneGraph,
    node: NodeId,
    boundaries: &[BodyHandle],
    scale: &PixelScale,
) {
    graph.clear(node);
    for body in boundaries {
        let Some(pose) = physics.body_pose(*body) else {
            continue;
        };
        let to_screen = |local: Vec2| scale.to_pixels(pose.position + local.rotated(pose.angle));
        for outline in physics.fixture_outlines(*body) {
            if let FixtureOutline::Edge { from, to } = outline {
                graph.draw(
                    node,
                    Primitive::Line {
                        from: to_screen(from),
                        to: to_screen(to),
                        color: BOUNDARY_OUTLINE_COLOR,
                    },
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_arena_has_screen_and_fixed_width_boundaries() {
        let specs = default_boundaries();
        let viewport = Vec2::new(1280.0, 720.0);
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].size(viewport), viewport);
        assert_eq!(specs[1].size(viewport), Vec2::new(640.0, 720.0));
    }

    #[test]
    fn each_boundary_gets_four_edges_in_units() {
        let mut physics = PhysicsWorld::new(Vec2::ZERO);
        let scale = PixelScale::new(30.0);
        let handles = build_boundaries(
            &mut physics,
            &default_boundaries(),
            Vec2::new(1200.0, 600.0),
            &scale,
        );

        assert_eq!(handles.len(), 2);
        assert_eq!(physics.boundary_bodies(), handles);
        let outlines = physics.fixture_outlines(handles[0]);
        assert_eq!(outlines.len(), 4);
        let FixtureOutline::Edge { to, .. } = outlines[1] else {
            panic!("expected edge outline");
        };
        assert!((to.x - 40.0).abs() < 0.001);
        assert!((to.y - 20.0).abs() < 0.001);
    }

    #[test]
    fn draw_boundaries_emits_one_line_per_edge() {
        let mut physics = PhysicsWorld::new(Vec2::ZERO);
        let mut graph = SceneGraph::new();
        let node = graph.create_graphics();
        let scale = PixelScale::new(30.0);
        let handles = build_boundaries(
            &mut physics,
            &default_boundaries(),
            Vec2::new(1200.0, 600.0),
            &scale,
        );

        draw_boundaries(&physics, &mut graph, node, &handles, &scale);
        assert_eq!(graph.primitives(node).len(), 8);
        draw_boundaries(&physics, &mut graph, node, &handles, &scale);
        assert_eq!(graph.primitives(node).len(), 8);
    }

    #[test]
    fn boundary_parses_from_json() {
        let spec: BoundarySpec =
            serde_json::from_str(r#"{"width":{"pixels":640.0},"height":"viewport"}"#)
                .expect("parse");
        assert_eq!(spec, BoundarySpec::fixed_width(640.0));
    }
}
