use std::process::ExitCode;

use physbox_engine::{LoopConfig, ShapeSpawner, WorldConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use super::config::load_sandbox_config;
use super::spawner::RandomSpawner;

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) world: WorldConfig,
    pub(crate) spawner: Box<dyn ShapeSpawner>,
}

pub(crate) fn build_app() -> Result<AppWiring, ExitCode> {
    init_tracing();
    info!("=== physbox startup ===");

    let sandbox = load_sandbox_config().map_err(|err| {
        error!(error = %err, "config_load_failed");
        ExitCode::FAILURE
    })?;
    info!(
        steps_per_second = sandbox.world.steps_per_second,
        boundary_count = sandbox.world.boundaries.len(),
        seed = ?sandbox.spawner.seed,
        sprite_key = ?sandbox.spawner.sprite_key,
        "sandbox_configured"
    );

    Ok(AppWiring {
        config: sandbox.loop_config(),
        world: sandbox.world_config(),
        spawner: Box::new(RandomSpawner::new(sandbox.spawner)),
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
