// src/pipeline/cache.rs

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use blake3::Hasher;
use tracing::{debug, warn};

/// Hash file contents, hex encoded.
pub fn content_hash(contents: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(contents);
    hasher.finalize().to_hex().to_string()
}

/// In-memory cache of the content hashes last written, keyed by destination
/// root and relative path.
///
/// A file is skipped while its hash matches the one recorded for the same
/// destination. Hashes are only recorded once the output was written, so a
/// failed write or a new destination root (after a profile switch) builds
/// the file again. One instance lives as long as the task that owns it, so
/// watch-triggered re-runs only process the files that were actually edited.
#[derive(Debug, Default)]
pub struct ContentCache {
    name: String,
    hashes: Mutex<HashMap<(String, String), String>>,
}

impl ContentCache {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hashes: Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> Option<MutexGuard<'_, HashMap<(String, String), String>>> {
        match self.hashes.lock() {
            Ok(g) => Some(g),
            Err(_) => {
                warn!(cache = %self.name, "cache mutex poisoned; treating every file as changed");
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().map(|h| h.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `path` was last written to `dest` with contents hashing to
    /// `hash`.
    pub fn is_unchanged(&self, dest: &str, path: &str, hash: &str) -> bool {
        let Some(hashes) = self.lock() else {
            return false;
        };
        let key = (dest.to_string(), path.to_string());
        hashes.get(&key).is_some_and(|old| old == hash)
    }

    /// Remember hashes of files written to `dest`.
    pub fn record<I>(&self, dest: &str, written: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        if let Some(mut hashes) = self.lock() {
            for (path, hash) in written {
                hashes.insert((dest.to_string(), path), hash);
            }
        }
    }

    /// Forget a path under every destination (e.g. after it was deleted).
    pub fn invalidate(&self, path: &str) {
        if let Some(mut hashes) = self.lock() {
            let before = hashes.len();
            hashes.retain(|(_, p), _| p != path);
            if hashes.len() != before {
                debug!(cache = %self.name, path = %path, "invalidated cached hash");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_recorded_hashes_count_as_unchanged() {
        let cache = ContentCache::new("development");
        let h1 = content_hash(b"1");

        assert!(!cache.is_unchanged("/out", "x.html", &h1));
        cache.record("/out", [("x.html".to_string(), h1.clone())]);
        assert!(cache.is_unchanged("/out", "x.html", &h1));
        assert!(!cache.is_unchanged("/out", "x.html", &content_hash(b"2")));

        cache.invalidate("x.html");
        assert!(!cache.is_unchanged("/out", "x.html", &h1));
        assert!(cache.is_empty());
    }

    #[test]
    fn destinations_are_cached_separately() {
        let cache = ContentCache::new("development");
        let h = content_hash(b"<dom-module>");
        cache.record("/w/target/app", [("el.html".to_string(), h.clone())]);

        assert!(cache.is_unchanged("/w/target/app", "el.html", &h));
        assert!(!cache.is_unchanged("/w/target/serve", "el.html", &h));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn hash_matches_blake3_reference() {
        assert_eq!(
            content_hash(b"hello world"),
            "d74981efa70a0c880b8d8c1985d075dbcbf679b99a5f9914e5aaf96b831a9e24"
        );
    }
}
