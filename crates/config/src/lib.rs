//! Configuration loading and env substitution.
//!
//! Config files: `therra.toml`, `therra.yaml`, or `therra.json`, searched in
//! `./` then the platform config dir. `${ENV_VAR}` placeholders are expanded
//! before parsing, and the deployment variables (`DATABASE_URL`,
//! `ENCRYPTION_KEY`, `OPENROUTER_API_KEY`, ...) override file values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;

pub use {
    error::{ConfigError, Result},
    loader::{apply_env_overrides, config_dir, discover_and_load, load_config},
    schema::{
        AuthConfig, DatabaseConfig, MetricsConfig, PipelineConfig, ProviderConfig, ServerConfig,
        SessionsConfig, TherraConfig, VaultConfig,
    },
};
