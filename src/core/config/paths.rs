//! Discovers where the on-disk config file (if any) lives.
//!
//! Mirrors the teacher's `core/config/paths.rs` env-var-override-then-discover
//! shape (`TEPORA_ROOT`/`TEPORA_CONFIG_PATH`), renamed to this crate's own vars.

use std::env;
use std::path::PathBuf;

pub const CONFIG_PATH_ENV: &str = "RECIPE_PIPELINE_CONFIG_PATH";
pub const ROOT_ENV: &str = "RECIPE_PIPELINE_ROOT";

/// Resolves the YAML config file path, preferring an explicit env override.
///
/// Returns `None` when nothing on disk should be consulted (no override set and
/// no `config.yml` next to the crate root) — callers fall back to compiled defaults.
pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(path));
    }

    let root = project_root();
    let candidate = root.join("config.yml");
    if candidate.exists() {
        return Some(candidate);
    }

    None
}

fn project_root() -> PathBuf {
    if let Ok(root) = env::var(ROOT_ENV) {
        return PathBuf::from(root);
    }

    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}
