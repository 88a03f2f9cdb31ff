use std::path::{Path, PathBuf};

use {secrecy::Secret, tracing::debug};

use crate::{
    env_subst::substitute_env,
    error::{ConfigError, Result},
    schema::TherraConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["therra.toml", "therra.yaml", "therra.yml", "therra.json"];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<TherraConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config, then apply environment overrides.
///
/// Search order:
/// 1. `explicit` when given (must exist)
/// 2. `./therra.{toml,yaml,yml,json}`
/// 3. the platform config dir (`~/.config/therra/` on Linux)
///
/// Falls back to defaults when no file is found. A file that exists but
/// fails to parse is an error: running with silently-default secrets is
/// worse than refusing to start.
pub fn discover_and_load(explicit: Option<&Path>) -> Result<TherraConfig> {
    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => find_config_file(),
    };

    let mut cfg = match path {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path)?
        },
        None => {
            debug!("no config file found, using defaults");
            TherraConfig::default()
        },
    };

    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/therra/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "therra").map(|d| d.config_dir().to_path_buf())
}

/// Apply the deployment environment variables on top of file values.
pub fn apply_env_overrides(cfg: &mut TherraConfig) {
    apply_env_overrides_with(cfg, |name| std::env::var(name).ok());
}

fn apply_env_overrides_with(cfg: &mut TherraConfig, lookup: impl Fn(&str) -> Option<String>) {
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("DATABASE_URL") {
        cfg.database.url = v;
    }
    if let Some(v) = get("ENCRYPTION_KEY") {
        cfg.vault.root_key = Some(Secret::new(v));
    }
    if let Some(v) = get("OPENROUTER_API_KEY") {
        cfg.provider.api_key = Some(Secret::new(v));
    }
    if let Some(v) = get("APP_URL") {
        cfg.provider.referer = v.clone();
        cfg.server.public_url = Some(v);
    }
    if let Some(v) = get("PORT") {
        match v.parse() {
            Ok(port) => cfg.server.port = port,
            Err(e) => debug!(value = %v, error = %e, "ignoring invalid PORT"),
        }
    }
    if let Some(v) = get("WA_SESSION_PATH") {
        cfg.sessions.dir = PathBuf::from(v);
    }
    if let Some(v) = get("WA_SIDECAR_URL") {
        cfg.sessions.sidecar_url = v;
    }
    if let Some(v) = get("ADMIN_TOKEN") {
        cfg.auth.admin_token = Some(Secret::new(v));
    }
}

fn parse_config(raw: &str, path: &Path) -> Result<TherraConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
    let parse_err = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };

    match ext {
        "toml" => toml::from_str(raw).map_err(|e| parse_err(e.to_string())),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| parse_err(e.to_string())),
        "json" => serde_json::from_str(raw).map_err(|e| parse_err(e.to_string())),
        _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
    }
}
