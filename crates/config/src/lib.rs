//! Bridge configuration: schema, discovery, and loading.
//!
//! Config files are discovered as `apibridge.{toml,yaml,yml,json}` in the
//! working directory, then `~/.config/apibridge/`. String values may embed
//! `${ENV_VAR}` placeholders, substituted at load time.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{discover_and_load, load_config, set_config_dir},
    schema::BridgeConfig,
};
