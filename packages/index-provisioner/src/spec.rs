//! Desired-index data model
//!
//! - `IndexSpec`: one composite index, an ordered list of fields
//! - `SpecKey`: stable key of a spec within its batch
//! - `CollectionScope`: the `.../collectionGroups/<id>` parent every index lives under

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{ProvisionError, Result};

/// Sort direction of one indexed field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

impl Direction {
    /// Wire name used by the admin API
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Ascending => "ASCENDING",
            Direction::Descending => "DESCENDING",
        }
    }

    fn short(&self) -> &'static str {
        match self {
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        }
    }
}

impl FromStr for Direction {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Direction::Ascending),
            "desc" | "descending" => Ok(Direction::Descending),
            other => Err(ProvisionError::InvalidSpec(format!(
                "Invalid sort direction: {}",
                other
            ))),
        }
    }
}

/// Query scope of an index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryScope {
    /// Queries against a single collection
    #[default]
    Collection,
    /// Queries across every collection with the same id
    CollectionGroup,
}

impl QueryScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryScope::Collection => "COLLECTION",
            QueryScope::CollectionGroup => "COLLECTION_GROUP",
        }
    }
}

/// One (field path, direction) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexField {
    pub field_path: String,
    #[serde(default)]
    pub order: Direction,
}

impl IndexField {
    pub fn new(field_path: impl Into<String>, order: Direction) -> Self {
        Self {
            field_path: field_path.into(),
            order,
        }
    }

    pub fn ascending(field_path: impl Into<String>) -> Self {
        Self::new(field_path, Direction::Ascending)
    }

    pub fn descending(field_path: impl Into<String>) -> Self {
        Self::new(field_path, Direction::Descending)
    }
}

/// Parses `path` or `path:asc` / `path:desc`
impl FromStr for IndexField {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.rsplit_once(':') {
            Some((path, dir)) => Ok(Self::new(path.trim(), dir.trim().parse()?)),
            None => Ok(Self::ascending(s.trim())),
        }
    }
}

impl fmt::Display for IndexField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field_path, self.order.short())
    }
}

#[derive(Deserialize)]
struct RawIndexSpec {
    fields: Vec<IndexField>,
    #[serde(default)]
    query_scope: QueryScope,
}

/// Desired composite index
///
/// Field order is significant: it defines the index's field order and thus
/// which queries it serves. Constructed through [`IndexSpec::new`], which
/// enforces at least two fields with non-empty, unique paths. No setters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawIndexSpec")]
pub struct IndexSpec {
    fields: Vec<IndexField>,
    query_scope: QueryScope,
}

impl IndexSpec {
    pub fn new(fields: Vec<IndexField>) -> Result<Self> {
        Self::with_scope(fields, QueryScope::Collection)
    }

    pub fn with_scope(fields: Vec<IndexField>, query_scope: QueryScope) -> Result<Self> {
        if fields.len() < 2 {
            return Err(ProvisionError::InvalidSpec(format!(
                "a composite index needs at least 2 fields, got {}",
                fields.len()
            )));
        }

        let mut seen = HashSet::new();
        for field in &fields {
            if field.field_path.is_empty() {
                return Err(ProvisionError::invalid_spec("field path must not be empty"));
            }
            if field.field_path.trim() != field.field_path {
                return Err(ProvisionError::InvalidSpec(format!(
                    "field path '{}' has leading or trailing whitespace",
                    field.field_path
                )));
            }
            if !seen.insert(field.field_path.as_str()) {
                return Err(ProvisionError::InvalidSpec(format!(
                    "field path '{}' appears more than once",
                    field.field_path
                )));
            }
        }

        Ok(Self {
            fields,
            query_scope,
        })
    }

    /// All-ascending spec over `paths`, in order
    pub fn ascending<S: AsRef<str>>(paths: &[S]) -> Result<Self> {
        Self::new(
            paths
                .iter()
                .map(|p| IndexField::ascending(p.as_ref()))
                .collect(),
        )
    }

    pub fn fields(&self) -> &[IndexField] {
        &self.fields
    }

    pub fn query_scope(&self) -> QueryScope {
        self.query_scope
    }

    /// SHA-256 over scope and ordered fields
    ///
    /// Two specs with the same fingerprint request the same remote index.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.query_scope.as_str().as_bytes());
        for field in &self.fields {
            hasher.update(b"|");
            hasher.update(field.field_path.as_bytes());
            hasher.update(b":");
            hasher.update(field.order.as_str().as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

impl TryFrom<RawIndexSpec> for IndexSpec {
    type Error = ProvisionError;

    fn try_from(raw: RawIndexSpec) -> Result<Self> {
        Self::with_scope(raw.fields, raw.query_scope)
    }
}

/// Parses a comma-separated field list, e.g. `name,age:desc`
impl FromStr for IndexSpec {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self> {
        let fields = s
            .split(',')
            .map(str::parse)
            .collect::<Result<Vec<IndexField>>>()?;
        Self::new(fields)
    }
}

impl fmt::Display for IndexSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", field)?;
        }
        Ok(())
    }
}

/// Position of a spec within its batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SpecKey(pub usize);

impl fmt::Display for SpecKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

const COLLECTION_GROUPS: &str = "collectionGroups";

/// Parent path of a batch: `<database-scope>/collectionGroups/<collection-id>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CollectionScope {
    path: String,
}

impl CollectionScope {
    pub fn parse(path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let invalid = |reason: &str| ProvisionError::InvalidScope {
            path: path.clone(),
            reason: reason.to_string(),
        };

        let segments: Vec<&str> = path.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(invalid("path contains an empty segment"));
        }
        if segments.len() < 3 {
            return Err(invalid(
                "expected <database-scope>/collectionGroups/<collection-id>",
            ));
        }
        if segments[segments.len() - 2] != COLLECTION_GROUPS {
            return Err(invalid("second-to-last segment must be 'collectionGroups'"));
        }

        Ok(Self { path })
    }

    /// `projects/{project}/databases/{database}/collectionGroups/{collection}`
    pub fn for_collection(project: &str, database: &str, collection: &str) -> Result<Self> {
        Self::parse(format!(
            "projects/{}/databases/{}/{}/{}",
            project, database, COLLECTION_GROUPS, collection
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    pub fn collection_id(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or_default()
    }

    /// Everything before `/collectionGroups/<id>`
    pub fn database_scope(&self) -> &str {
        let suffix_len = COLLECTION_GROUPS.len() + self.collection_id().len() + 2;
        &self.path[..self.path.len() - suffix_len]
    }
}

impl TryFrom<String> for CollectionScope {
    type Error = ProvisionError;

    fn try_from(path: String) -> Result<Self> {
        Self::parse(path)
    }
}

impl From<CollectionScope> for String {
    fn from(scope: CollectionScope) -> Self {
        scope.path
    }
}

impl fmt::Display for CollectionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}
