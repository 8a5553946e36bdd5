//! Content-addressed chunk cache.
//!
//! Maps `(document bytes, document name)` to a previously computed chunk
//! sequence so unchanged documents are never re-extracted or re-chunked.
//! One JSON file per key, keyed by a SHA-256 hash; records are
//! human-inspectable. The cache stores text chunks, not embeddings, so it is
//! not versioned by embedding model.
//!
//! Load and store failures degrade: a broken entry reads as a miss, a failed
//! write is logged and the caller keeps using its in-memory chunks.

use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::models::DocumentChunk;

pub struct ChunkCache {
    dir: PathBuf,
}

impl ChunkCache {
    /// Open the cache at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Compute the cache key for a `(bytes, name)` pair.
    ///
    /// Pure function, no I/O, stable across process restarts: identical
    /// inputs always yield the identical key, and any byte or name
    /// difference yields a different key with overwhelming probability.
    pub fn compute_key(bytes: &[u8], name: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hasher.update(name.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Read the chunk sequence stored under `key`. Any I/O or
    /// deserialization failure is treated as a miss, not an error.
    pub fn load(&self, key: &str) -> Option<Vec<DocumentChunk>> {
        let path = self.entry_path(key);
        if !path.exists() {
            return None;
        }
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("cache read failed for {}: {}", path.display(), e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(chunks) => {
                debug!("cache hit: {}", path.display());
                Some(chunks)
            }
            Err(e) => {
                warn!("cache entry corrupt, treating as miss: {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Persist the chunk sequence under `key`.
    ///
    /// Writes to a temp file and renames into place, so a crash or a
    /// concurrent writer for the same key never exposes a partial entry.
    /// Concurrent writers of the same key carry identical payloads, so the
    /// last rename winning is benign. Failures are logged and swallowed;
    /// the chunks remain usable in memory for the current session.
    pub fn store(&self, key: &str, chunks: &[DocumentChunk]) {
        let path = self.entry_path(key);
        let json = match serde_json::to_string_pretty(chunks) {
            Ok(json) => json,
            Err(e) => {
                warn!("cache serialization failed for key {}: {}", key, e);
                return;
            }
        };
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        if let Err(e) = fs::write(&tmp, &json) {
            warn!("cache write failed for {}: {}", tmp.display(), e);
            return;
        }
        if let Err(e) = fs::rename(&tmp, &path) {
            warn!("cache rename failed for {}: {}", path.display(), e);
            let _ = fs::remove_file(&tmp);
        }
    }

    /// Remove all entries. Used to force full reprocessing, e.g. after an
    /// embedding-model change. Returns the number of entries removed.
    pub fn clear(&self) -> Result<usize, PipelineError> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
