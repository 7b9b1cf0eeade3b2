use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::analyzer::AnalysisVerdict;

/// Deterministic fingerprint over the inputs that shape a verdict
pub fn fingerprint(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

struct CacheEntry {
    verdict: AnalysisVerdict,
    inserted_at: Instant,
}

/// In-memory verdict cache with a fixed time-to-live.
///
/// Passed into the analyzer explicitly rather than living in ambient state.
/// Entries are per-process; repeated identical inputs within one run are
/// served without a new remote call. Concurrent lookups of the same key may
/// still race to duplicate requests; with the default batch size of 1 this
/// cannot happen.
pub struct AnalysisCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl AnalysisCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<AnalysisVerdict> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(entry.verdict.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: String, verdict: AnalysisVerdict) {
        self.lock().insert(
            key,
            CacheEntry {
                verdict,
                inserted_at: Instant::now(),
            },
        );
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(flag: bool) -> AnalysisVerdict {
        AnalysisVerdict {
            needs_refactor: flag,
            refactor_prompt: flag.then(|| "tidy up".to_string()),
        }
    }

    #[test]
    fn test_fingerprint_is_deterministic_and_input_sensitive() {
        let a = fingerprint(&["prompt", "code"]);
        let b = fingerprint(&["prompt", "code"]);
        let c = fingerprint(&["prompt", "other code"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        // part boundaries matter
        assert_ne!(fingerprint(&["ab", "c"]), fingerprint(&["a", "bc"]));
    }

    #[test]
    fn test_get_returns_inserted_verdict_within_ttl() {
        let cache = AnalysisCache::new(Duration::from_secs(60));
        cache.insert("key".to_string(), verdict(true));

        let hit = cache.get("key").unwrap();
        assert!(hit.needs_refactor);
        assert_eq!(hit.refactor_prompt.as_deref(), Some("tidy up"));
        assert!(cache.get("missing").is_none());
    }

    #[test]
    fn test_expired_entries_are_evicted() {
        let cache = AnalysisCache::new(Duration::ZERO);
        cache.insert("key".to_string(), verdict(false));
        assert!(cache.get("key").is_none());
    }
}
