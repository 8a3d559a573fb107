//! YAML batch manifest (v1)
//!
//! ```yaml
//! version: 1
//! parent: projects/my-project/databases/(default)/collectionGroups/people
//! indexes:
//!   - fields:
//!       - field_path: name
//!       - field_path: location
//!   - fields:
//!       - field_path: name
//!       - field_path: employer
//!         order: descending
//! settings:
//!   poll_interval_secs: 10
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{ConfigError, ConfigResult, ProvisionConfig};
use crate::batch::IndexBatch;
use crate::spec::{CollectionScope, IndexSpec};

const SUPPORTED_VERSIONS: &[u32] = &[1];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestV1 {
    version: Option<u32>,
    parent: CollectionScope,
    indexes: Vec<IndexSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    settings: Option<ProvisionConfig>,
}

/// Parsed and validated manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexManifest {
    pub parent: CollectionScope,
    pub indexes: Vec<IndexSpec>,
    pub settings: ProvisionConfig,
}

impl IndexManifest {
    /// Load from a YAML file
    pub fn from_yaml(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let raw: ManifestV1 = serde_yaml::from_str(content)?;

        let version = raw.version.ok_or(ConfigError::MissingVersion)?;
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(ConfigError::UnsupportedVersion {
                found: version,
                supported: SUPPORTED_VERSIONS.to_vec(),
            });
        }

        if raw.indexes.is_empty() {
            return Err(ConfigError::Invalid(
                "manifest declares no indexes".to_string(),
            ));
        }

        let settings = raw.settings.unwrap_or_default();
        settings.validate()?;

        Ok(Self {
            parent: raw.parent,
            indexes: raw.indexes,
            settings,
        })
    }

    /// Serialize back to YAML v1
    pub fn to_yaml(&self) -> ConfigResult<String> {
        let raw = ManifestV1 {
            version: Some(1),
            parent: self.parent.clone(),
            indexes: self.indexes.clone(),
            settings: Some(self.settings.clone()),
        };
        Ok(serde_yaml::to_string(&raw)?)
    }

    pub fn batch(&self) -> IndexBatch {
        IndexBatch::new(self.parent.clone(), self.indexes.clone())
    }
}
