use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{env_subst::substitute_env, schema::HelixConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["helix.toml", "helix.yaml", "helix.yml", "helix.json"];

/// Load config from the given path (any supported format).
///
/// The draft section is normalized before returning.
pub fn load_config(path: &Path) -> anyhow::Result<HelixConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    let mut config = parse_config(&raw, path)?;
    config.draft = config.draft.normalized();
    Ok(config)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./helix.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/helix/helix.{toml,yaml,yml,json}` (user-global)
///
/// Returns `HelixConfig::default()` if no usable config file is found.
pub fn discover_and_load() -> HelixConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    HelixConfig::default()
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    if let Some(path) = find_in_dir(Path::new(".")) {
        return Some(path);
    }
    config_dir().and_then(|dir| find_in_dir(&dir))
}

/// Returns the user-global config directory (`~/.config/helix/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "helix").map(|d| d.config_dir().to_path_buf())
}

fn find_in_dir(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<HelixConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
