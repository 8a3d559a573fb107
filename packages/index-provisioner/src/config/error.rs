//! Errors raised while loading or validating provisioning settings

use std::path::PathBuf;
use thiserror::Error;

/// Why a manifest or [`ProvisionConfig`](super::ProvisionConfig) was rejected
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A numeric setting outside its accepted bounds
    #[error("{field} = {value} is out of range ({min}..={max}): {hint}")]
    Range {
        field: String,
        value: String,
        min: String,
        max: String,
        hint: String,
    },

    #[error("Manifest has no 'version' key; start the file with 'version: 1'")]
    MissingVersion,

    #[error("Manifest version {found} is not understood (known: {})", supported.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", "))]
    UnsupportedVersion { found: u32, supported: Vec<u32> },

    #[error("Cannot read manifest {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed YAML, an unknown key, or an index spec that fails validation
    #[error("Manifest does not parse: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Settings that are individually valid but inconsistent together
    #[error("Inconsistent settings: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

impl ConfigError {
    /// Out-of-range error for `field`, with a hint on picking a value
    pub fn range_with_hint(
        field: impl Into<String>,
        value: impl ToString,
        min: impl ToString,
        max: impl ToString,
        hint: impl Into<String>,
    ) -> Self {
        Self::Range {
            field: field.into(),
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
            hint: hint.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_error_names_field_and_bounds() {
        let err = ConfigError::range_with_hint(
            "poll_interval_secs",
            0,
            1,
            3600,
            "Polling needs a non-zero interval",
        );
        assert_eq!(
            err.to_string(),
            "poll_interval_secs = 0 is out of range (1..=3600): Polling needs a non-zero interval"
        );
    }

    #[test]
    fn test_unsupported_version_lists_known_versions() {
        let err = ConfigError::UnsupportedVersion {
            found: 3,
            supported: vec![1],
        };
        assert_eq!(
            err.to_string(),
            "Manifest version 3 is not understood (known: 1)"
        );
    }
}
