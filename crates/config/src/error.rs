use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("unsupported config format: .{0}")]
    UnsupportedFormat(String),

    /// A required secret (root key, provider key) is absent.
    #[error("{0} is not configured")]
    Missing(&'static str),

    #[error("invalid config value for {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

pub type Result<T, E = ConfigError> = std::result::Result<T, E>;
