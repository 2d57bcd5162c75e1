//! Persisted bookmark records and the opaque directory references they carry
// src/record.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Free-form metadata attached to a bookmark. Replaced wholesale on update.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Platform-specific token that can be resolved back to a directory.
///
/// For the plain path resolver this is simply the absolute path; the
/// relocatable resolver encodes the directory's device and inode as well.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpaqueReference(String);

impl OpaqueReference {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OpaqueReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named, persisted reference to a directory the user granted access to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkRecord {
    pub identifier: String,
    pub opaque_reference: OpaqueReference,
    /// Last known absolute path. A cached hint that can go stale.
    pub path: PathBuf,
    #[serde(alias = "created_at")]
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "deserialize_metadata")]
    pub metadata: Metadata,
}

impl BookmarkRecord {
    pub fn new(
        identifier: impl Into<String>,
        opaque_reference: OpaqueReference,
        path: impl Into<PathBuf>,
        created_at: DateTime<Utc>,
        metadata: Metadata,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            opaque_reference,
            path: path.into(),
            created_at,
            metadata,
        }
    }

    /// Point the record at a freshly minted reference, keeping everything else
    pub fn refresh_reference(&mut self, reference: OpaqueReference, path: &Path) {
        self.opaque_reference = reference;
        self.path = path.to_path_buf();
    }
}

// Older store files wrote `"metadata": null` when none was supplied
fn deserialize_metadata<'de, D>(deserializer: D) -> Result<Metadata, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<Metadata>::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}
