use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::config::CompileOptions;
use crate::finalize::CompileOutput;

#[derive(Serialize, Deserialize)]
pub struct CacheEntry {
    pub hash: String,
    pub output: CompileOutput,
}

/// Per-document output cache used by the CLI. Keyed by the document path;
/// valid while the hash of document text and options is unchanged.
pub struct IncrementalCache {
    cache_dir: PathBuf,
}

impl IncrementalCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        let cache_dir = cache_dir.into();
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir).ok();
        }
        Self { cache_dir }
    }

    pub fn compute_hash(document: &str, options: &CompileOptions) -> String {
        let mut hasher = Sha256::new();
        hasher.update(document.as_bytes());
        hasher.update([0u8]);
        hasher.update(serde_json::to_string(options).unwrap_or_default().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn get_cache_path(&self, file_path: &str) -> PathBuf {
        let safe_name = file_path.replace(['/', '\\', ':'], "_");
        self.cache_dir.join(format!("{}.json", safe_name))
    }

    pub fn get(&self, file_path: &str, hash: &str) -> Option<CompileOutput> {
        let cache_path = self.get_cache_path(file_path);
        let data = fs::read_to_string(&cache_path).ok()?;

        let entry: CacheEntry = match serde_json::from_str(&data) {
            Ok(e) => e,
            Err(e) => {
                warn!(file = file_path, error = %e, "discarding corrupt cache entry");
                fs::remove_file(cache_path).ok();
                return None;
            }
        };

        if entry.hash == hash {
            debug!(file = file_path, "cache hit");
            Some(entry.output)
        } else {
            None
        }
    }

    pub fn set(&self, file_path: &str, hash: &str, output: &CompileOutput) {
        let cache_path = self.get_cache_path(file_path);
        let entry = CacheEntry {
            hash: hash.to_string(),
            output: output.clone(),
        };
        if let Ok(data) = serde_json::to_string(&entry) {
            if let Err(e) = fs::write(&cache_path, data) {
                warn!(file = file_path, error = %e, "failed to write cache entry");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Platform;

    fn output() -> CompileOutput {
        CompileOutput {
            platform: Platform::Web,
            files: vec![],
            fingerprint: "abc".into(),
        }
    }

    #[test]
    fn test_hash_depends_on_options() {
        let web = CompileOptions::for_platform(Platform::Web);
        let native = CompileOptions::for_platform(Platform::CrossPlatform);
        assert_ne!(
            IncrementalCache::compute_hash("{}", &web),
            IncrementalCache::compute_hash("{}", &native)
        );
    }

    #[test]
    fn test_round_trip_and_invalidation() {
        let dir = tempfile::tempdir().unwrap();
        let cache = IncrementalCache::new(dir.path().join("cache"));
        let options = CompileOptions::default();
        let hash = IncrementalCache::compute_hash("{}", &options);

        assert!(cache.get("apps/shop.app.json", &hash).is_none());
        cache.set("apps/shop.app.json", &hash, &output());
        assert_eq!(cache.get("apps/shop.app.json", &hash), Some(output()));

        let changed = IncrementalCache::compute_hash("{\"name\":\"x\"}", &options);
        assert!(cache.get("apps/shop.app.json", &changed).is_none());
    }

    #[test]
    fn test_corrupt_entry_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let cache = IncrementalCache::new(dir.path());
        fs::write(dir.path().join("x.json"), "not json").unwrap();
        assert!(cache.get("x", "hash").is_none());
        assert!(!dir.path().join("x.json").exists());
    }
}
