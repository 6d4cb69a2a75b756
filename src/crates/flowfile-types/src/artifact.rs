//! Materialized artifact references (spec §3, §4.5).

use crate::hash::ContentHash;
use crate::schema::Schema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// On-disk encoding of a materialized artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    Parquet,
    Csv,
    Ipc,
}

impl ArtifactFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactFormat::Parquet => "parquet",
            ArtifactFormat::Csv => "csv",
            ArtifactFormat::Ipc => "arrow",
        }
    }
}

/// A reference to a materialized dataframe: content-addressed, reusable
/// across flows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub format: ArtifactFormat,
    pub schema: Schema,
    pub row_count: u64,
    pub content_hash: ContentHash,
    /// Size on disk, used by the cache's LRU eviction accounting.
    pub byte_size: u64,
}

impl Artifact {
    /// The relative path an artifact of this hash is stored at under
    /// `FLOWFILE_ARTIFACT_DIR`: `<hash-prefix>/<hash>.<ext>` (spec §6).
    pub fn relative_path(content_hash: ContentHash, format: ArtifactFormat) -> PathBuf {
        let hex = content_hash.0.to_hex();
        let prefix = content_hash.0.hex_prefix(2);
        PathBuf::from(prefix).join(format!("{hex}.{}", format.extension()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Digest;

    #[test]
    fn relative_path_shards_by_hash_prefix() {
        let hash = ContentHash(Digest::of(b"data"));
        let path = Artifact::relative_path(hash, ArtifactFormat::Parquet);
        let prefix = hash.0.hex_prefix(2);
        assert!(path.starts_with(&prefix));
        assert!(path.to_string_lossy().ends_with(".parquet"));
    }
}
