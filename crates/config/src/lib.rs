//! Configuration loading and env substitution for helix.
//!
//! Config files: `helix.toml`, `helix.yaml`, `helix.yml` or `helix.json`,
//! searched in `./` then `~/.config/helix/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{config_dir, discover_and_load, find_config_file, load_config},
    schema::{ChannelsConfig, DraftStreamConfig, HelixConfig, MIN_THROTTLE_MS},
};
