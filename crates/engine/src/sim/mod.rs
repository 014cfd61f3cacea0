pub mod boundary;
pub mod clock;
pub mod command;
pub mod config;
pub mod controller;
pub mod entity;
pub mod physics;
pub mod registry;

pub use boundary::{build_boundaries, default_boundaries, BoundaryExtent, BoundarySpec};
pub use clock::{FrameAdvance, SimulationClock, MAX_STEPS_PER_SECOND, MIN_STEPS_PER_SECOND};
pub use command::{command_channel, CommandQueue, CommandSender, SandboxCommand};
pub use config::WorldConfig;
pub use controller::{
    Diagnostics, FrameLoop, FrameLoopError, FrameReport, FrameTiming, PanicPolicy, ShapeSpawner,
    SpawnContext, Toggles,
};
pub use entity::{Entity, EntityParams, PreviousPhysicsState, ShapeKind, VisualKind};
pub use physics::{BodyHandle, BodyPose, PhysicsWorld};
pub use registry::EntityRegistry;
