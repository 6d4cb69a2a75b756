//! Content-addressed artifact cache (C5), grounded on
//! `langgraph-checkpoint::memory::InMemoryCheckpointSaver` — an
//! `Arc<tokio::sync::RwLock<HashMap>>` index behind async methods,
//! generalized from checkpoint-save/replay keyed by `(thread_id,
//! checkpoint_id)` to artifact-save/lookup keyed by `EffectiveHash`.

mod error;

pub use error::{CacheError, Result};

use flowfile_types::{Artifact, EffectiveHash};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// What's written to `<root>/<hash-prefix>/<hash>.meta.json` alongside the
/// artifact's data file. The effective hash is carried explicitly because
/// it can't be recomputed from the artifact alone (it also depends on the
/// producing node's settings and its own upstreams' content hashes).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheManifest {
    effective_hash: EffectiveHash,
    artifact: Artifact,
}

struct CacheEntry {
    artifact: Artifact,
    pinned: bool,
    last_used: u64,
}

/// An in-process index over artifacts materialized under
/// `FLOWFILE_ARTIFACT_DIR`, keyed by `EffectiveHash` (spec §4.5).
pub struct ArtifactCache {
    root: PathBuf,
    entries: RwLock<HashMap<EffectiveHash, CacheEntry>>,
    clock: AtomicU64,
    total_bytes: AtomicU64,
}

impl ArtifactCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            entries: RwLock::new(HashMap::new()),
            clock: AtomicU64::new(0),
            total_bytes: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn manifest_path(&self, hash: &EffectiveHash) -> PathBuf {
        let hex = hash.0.to_hex();
        self.root
            .join(hash.0.hex_prefix(2))
            .join(format!("{hex}.meta.json"))
    }

    /// Looks up a cached artifact, bumping its LRU recency on hit.
    pub async fn lookup(&self, hash: &EffectiveHash) -> Option<Artifact> {
        let tick = self.tick();
        let mut entries = self.entries.write().await;
        let entry = entries.get_mut(hash)?;
        entry.last_used = tick;
        Some(entry.artifact.clone())
    }

    /// Records that `hash` now maps to `artifact`, persisting a manifest
    /// sidecar so a later `rebuild` can recover the entry. Idempotent:
    /// re-`put`ting the same hash overwrites in place (last-writer-wins per
    /// spec §5 — in practice the hash already pins the content, so this
    /// only matters for artifacts whose metadata legitimately changed,
    /// e.g. a corrected row count).
    pub async fn put(&self, hash: EffectiveHash, artifact: Artifact) -> Result<()> {
        let manifest_path = self.manifest_path(&hash);
        if let Some(parent) = manifest_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let manifest = CacheManifest {
            effective_hash: hash,
            artifact: artifact.clone(),
        };
        tokio::fs::write(&manifest_path, serde_json::to_vec_pretty(&manifest)?).await?;

        let tick = self.tick();
        let mut entries = self.entries.write().await;
        let byte_size = artifact.byte_size;
        if let Some(previous) = entries.insert(
            hash,
            CacheEntry {
                artifact,
                pinned: false,
                last_used: tick,
            },
        ) {
            self.total_bytes
                .fetch_sub(previous.artifact.byte_size, Ordering::Relaxed);
        }
        self.total_bytes.fetch_add(byte_size, Ordering::Relaxed);
        Ok(())
    }

    /// Marks (or unmarks) an entry as pinned; pinned entries are skipped by
    /// `evict_lru` regardless of recency (spec §4.5, `cache_results` nodes).
    pub async fn pin(&self, hash: &EffectiveHash, pinned: bool) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get_mut(hash) {
            Some(entry) => {
                entry.pinned = pinned;
                true
            }
            None => false,
        }
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes.load(Ordering::Relaxed)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Evicts the least-recently-used, unpinned entries (removing their
    /// manifest and data files) until total cached bytes is at or below
    /// `target_bytes`. Returns the hashes evicted.
    pub async fn evict_lru(&self, target_bytes: u64) -> Vec<EffectiveHash> {
        let mut evicted = Vec::new();
        loop {
            let victim = {
                let entries = self.entries.read().await;
                let current: u64 = entries.values().map(|e| e.artifact.byte_size).sum();
                if current <= target_bytes {
                    None
                } else {
                    entries
                        .iter()
                        .filter(|(_, e)| !e.pinned)
                        .min_by_key(|(_, e)| e.last_used)
                        .map(|(hash, _)| *hash)
                }
            };
            let Some(hash) = victim else { break };

            let removed = {
                let mut entries = self.entries.write().await;
                entries.remove(&hash)
            };
            let Some(entry) = removed else { break };

            self.total_bytes
                .fetch_sub(entry.artifact.byte_size, Ordering::Relaxed);
            let _ = tokio::fs::remove_file(self.manifest_path(&hash)).await;
            let _ = tokio::fs::remove_file(self.root.join(&entry.artifact.path)).await;
            evicted.push(hash);
        }
        evicted
    }

    /// Rebuilds the index from `root` at startup by scanning
    /// `<hash-prefix>/<hash>.meta.json` manifests. Entries whose manifest is
    /// unreadable, or whose data file is missing or size-mismatched, are
    /// discarded as absent rather than surfaced as a hard error — per spec
    /// §7, `CacheError` is the one error kind the caller recovers from
    /// locally (re-run the producing node) rather than aborting a run.
    pub async fn rebuild(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let cache = Self::new(root.clone());
        if !root.exists() {
            return Ok(cache);
        }
        let mut entries = cache.entries.write().await;
        let mut total = 0u64;
        let mut prefix_dirs = tokio::fs::read_dir(&root).await?;
        while let Some(prefix_dir) = prefix_dirs.next_entry().await? {
            if !prefix_dir.file_type().await?.is_dir() {
                continue;
            }
            let mut files = tokio::fs::read_dir(prefix_dir.path()).await?;
            while let Some(file) = files.next_entry().await? {
                let path = file.path();
                if path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.ends_with(".meta.json"))
                    != Some(true)
                {
                    continue;
                }
                let Ok(bytes) = tokio::fs::read(&path).await else {
                    tracing::warn!(path = %path.display(), "discarding unreadable cache manifest");
                    continue;
                };
                let Ok(manifest) = serde_json::from_slice::<CacheManifest>(&bytes) else {
                    tracing::warn!(path = %path.display(), "discarding corrupt cache manifest");
                    continue;
                };
                let data_path = root.join(&manifest.artifact.path);
                let Ok(metadata) = tokio::fs::metadata(&data_path).await else {
                    tracing::warn!(path = %data_path.display(), "discarding cache entry with missing payload");
                    continue;
                };
                if metadata.len() != manifest.artifact.byte_size {
                    tracing::warn!(path = %data_path.display(), "discarding cache entry with size mismatch");
                    continue;
                }
                total += manifest.artifact.byte_size;
                entries.insert(
                    manifest.effective_hash,
                    CacheEntry {
                        artifact: manifest.artifact,
                        pinned: false,
                        last_used: 0,
                    },
                );
            }
        }
        drop(entries);
        cache.total_bytes.store(total, Ordering::Relaxed);
        Ok(cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowfile_types::{ArtifactFormat, ContentHash, Digest, SettingsHash};

    fn artifact(seed: u8, byte_size: u64) -> (EffectiveHash, Artifact) {
        let content_hash = ContentHash(Digest::of(&[seed]));
        let settings_hash = SettingsHash::compute("select", b"{}");
        let effective = EffectiveHash::compose(settings_hash, &[content_hash]);
        let artifact = Artifact {
            path: PathBuf::from(format!("{seed}.parquet")),
            format: ArtifactFormat::Parquet,
            schema: Vec::new(),
            row_count: 0,
            content_hash,
            byte_size,
        };
        (effective, artifact)
    }

    #[tokio::test]
    async fn put_then_lookup_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path());
        let (hash, artifact) = artifact(1, 100);
        cache.put(hash, artifact.clone()).await.unwrap();
        assert_eq!(cache.lookup(&hash).await, Some(artifact));
    }

    #[tokio::test]
    async fn evict_lru_skips_pinned_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path());
        let (h1, a1) = artifact(1, 50);
        let (h2, a2) = artifact(2, 60);
        cache.put(h1, a1).await.unwrap();
        cache.put(h2, a2).await.unwrap();
        cache.pin(&h1, true).await;
        let evicted = cache.evict_lru(0).await;
        assert_eq!(evicted, vec![h2]);
        assert!(cache.lookup(&h1).await.is_some());
    }

    #[tokio::test]
    async fn evict_lru_is_a_noop_under_the_target() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path());
        let (h1, a1) = artifact(1, 10);
        cache.put(h1, a1).await.unwrap();
        assert!(cache.evict_lru(1_000).await.is_empty());
    }

    #[tokio::test]
    async fn rebuild_recovers_entries_written_by_put() {
        let dir = tempfile::tempdir().unwrap();
        let (hash, artifact) = artifact(7, 42);
        {
            let cache = ArtifactCache::new(dir.path());
            cache.put(hash, artifact.clone()).await.unwrap();
            tokio::fs::write(dir.path().join(&artifact.path), vec![0u8; 42])
                .await
                .unwrap();
        }
        let rebuilt = ArtifactCache::rebuild(dir.path()).await.unwrap();
        assert_eq!(rebuilt.lookup(&hash).await, Some(artifact));
    }

    #[tokio::test]
    async fn rebuild_discards_entries_with_missing_payload() {
        let dir = tempfile::tempdir().unwrap();
        let (hash, artifact) = artifact(9, 42);
        {
            let cache = ArtifactCache::new(dir.path());
            cache.put(hash, artifact).await.unwrap();
            // data file deliberately never written
        }
        let rebuilt = ArtifactCache::rebuild(dir.path()).await.unwrap();
        assert!(rebuilt.is_empty().await);
    }
}
