//! Blob store test utilities.

use std::path::PathBuf;
use tempfile::TempDir;
use voxcache_core::CacheKey;
use voxcache_storage::FilesystemBlobStore;

/// A filesystem blob store plus a scratch directory for source artifacts.
#[allow(dead_code)]
pub struct TestBlobs {
    pub store: FilesystemBlobStore,
    pub temp_dir: TempDir,
}

impl TestBlobs {
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = FilesystemBlobStore::new(temp_dir.path().join("cache").join("audio"))
            .await
            .expect("Failed to create blob store");
        std::fs::create_dir_all(temp_dir.path().join("sources")).unwrap();
        Self { store, temp_dir }
    }

    /// Write a source artifact outside the storage directory.
    #[allow(dead_code)]
    pub fn source(&self, name: &str, data: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join("sources").join(name);
        std::fs::write(&path, data).expect("Failed to write source");
        path
    }
}

/// Key for a request numbered `n`.
#[allow(dead_code)]
pub fn key(n: usize) -> CacheKey {
    CacheKey::derive(&format!("utterance {n}"), "alloy", "tts-1")
}

/// Deterministic pseudo-random bytes; the same seed gives the same output.
#[allow(dead_code)]
pub fn seeded_bytes(seed: u64, len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    let mut state = seed;
    for chunk in data.chunks_mut(8) {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }
    data
}
