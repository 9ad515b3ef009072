//! Router configuration
//!
//! Config structs are plain serde types loaded from YAML (with `${VAR}`
//! environment expansion) and checked by a validation pass before a router
//! can be built from them.

pub mod types;

pub use types::{AccountConfig, Auth, ModelMapping, ModelRef, QuotaUnit, RouterConfig};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("missing required field: {field}")]
    MissingRequired { field: String },

    #[error("invalid value for field '{field}': {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("validation failed: {reason}")]
    ValidationFailed { reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;
