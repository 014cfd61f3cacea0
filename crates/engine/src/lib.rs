use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

mod app;
pub mod math;
pub mod scene_graph;
pub mod sim;

pub use app::{
    run_app, run_app_with_metrics, validate_sprite_key, AppError, LoopConfig, LoopMetricsSnapshot,
    MetricsHandle, Renderer, SpriteKeyError, SLOW_FRAME_ENV_VAR,
};
pub use math::{PixelScale, Vec2, DEFAULT_PIXELS_PER_UNIT};
pub use scene_graph::{Rgba, SceneGraph};
pub use sim::{
    BoundaryExtent, BoundarySpec, EntityParams, FrameLoop, FrameTiming, PanicPolicy,
    SandboxCommand, ShapeKind, ShapeSpawner, SpawnContext, VisualKind, WorldConfig,
};

pub const ROOT_ENV_VAR: &str = "PHYSBOX_ROOT";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub assets_dir: PathBuf,
    pub config_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error(
        "PHYSBOX_ROOT is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and either crates/ or assets/."
    )]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and either crates/ or assets/.\n\
Set {env_var} explicitly, for example:\n\
Bash/zsh: export {env_var}=\"/path/to/physbox\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = resolve_root()?;
    Ok(app_paths_for_root(root))
}

fn app_paths_for_root(root: PathBuf) -> AppPaths {
    let assets_dir = root.join("assets");
    let config_dir = root.join("config");
    AppPaths {
        root,
        assets_dir,
        config_dir,
    }
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let raw = PathBuf::from(value);
            let normalized = normalize_path(&raw);
            if is_repo_marker(&normalized) {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot { path: normalized })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

            find_root_above(&exe_dir).ok_or_else(|| StartupError::RootNotFound {
                start_dir: normalize_path(&exe_dir),
                env_var: ROOT_ENV_VAR,
            })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn find_root_above(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|candidate| is_repo_marker(candidate))
        .map(normalize_path)
}

fn is_repo_marker(path: &Path) -> bool {
    let cargo_toml = path.join("Cargo.toml").is_file();
    let has_crates = path.join("crates").is_dir();
    let has_assets = path.join("assets").is_dir();

    cargo_toml && (has_crates || has_assets)
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn repo_marker_requires_cargo_toml() {
        let temp = TempDir::new().expect("tempdir");
        fs::create_dir(temp.path().join("crates")).expect("crates dir");
        assert!(!is_repo_marker(temp.path()));

        fs::write(temp.path().join("Cargo.toml"), "[workspace]\n").expect("cargo toml");
        assert!(is_repo_marker(temp.path()));
    }

    #[test]
    fn root_is_found_from_nested_directory() {
        let temp = TempDir::new().expect("tempdir");
        fs::write(temp.path().join("Cargo.toml"), "[workspace]\n").expect("cargo toml");
        fs::create_dir(temp.path().join("assets")).expect("assets dir");
        let nested = temp.path().join("target").join("debug");
        fs::create_dir_all(&nested).expect("nested");

        let root = find_root_above(&nested).expect("root");
        assert_eq!(root, normalize_path(temp.path()));
    }

    #[test]
    fn paths_hang_off_root() {
        let paths = app_paths_for_root(PathBuf::from("/tmp/physbox"));
        assert_eq!(paths.assets_dir, PathBuf::from("/tmp/physbox/assets"));
        assert_eq!(paths.config_dir, PathBuf::from("/tmp/physbox/config"));
    }
}
