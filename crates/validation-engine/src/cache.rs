//! Result cache for the synchronous path
//!
//! Entries are keyed by a [`fingerprint`] of entity type, rule selection and
//! canonicalized payload. Staleness is evaluated on read: an entry older than
//! the TTL is a miss and gets overwritten by the next `put`. There is no
//! background eviction and no size bound.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::clock::Clock;
use crate::contracts::ValidationOutcome;

#[derive(Debug, Clone)]
struct CacheEntry {
    outcome: ValidationOutcome,
    computed_at: DateTime<Utc>,
}

/// Snapshot of cache occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub size: usize,
    pub ttl_secs: u64,
}

/// Process-local memoization of sync outcomes
pub struct ResultCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ResultCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    fn is_fresh(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        match (now - entry.computed_at).to_std() {
            Ok(age) => age <= self.ttl,
            // computed in the future relative to `now`: clock skew, still fresh
            Err(_) => true,
        }
    }

    /// Cached outcome for `key`, unless absent or stale
    pub fn get(&self, key: &str) -> Option<ValidationOutcome> {
        let now = self.clock.now();
        let entries = match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries
            .get(key)
            .filter(|entry| self.is_fresh(entry, now))
            .map(|entry| entry.outcome.clone())
    }

    /// Store `outcome` under `key`; last write wins
    pub fn put(&self, key: impl Into<String>, outcome: ValidationOutcome) {
        let entry = CacheEntry {
            outcome,
            computed_at: self.clock.now(),
        };
        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.insert(key.into(), entry);
    }

    pub fn clear(&self) {
        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let dropped = entries.len();
        entries.clear();
        tracing::info!(dropped = dropped, "Result cache cleared");
    }

    /// Entry count (stale entries included) and TTL
    pub fn stats(&self) -> CacheStats {
        let size = match self.entries.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        };
        CacheStats {
            size,
            ttl_secs: self.ttl.as_secs(),
        }
    }
}

/// Deterministic cache key for a sync validation request.
///
/// Rule names are sorted and deduplicated; no filter is encoded as `all`.
/// Object keys in the payload are sorted recursively.
pub fn fingerprint(entity_type: &str, names: Option<&[String]>, payload: &Value) -> String {
    let selection = match names {
        Some(names) => {
            let mut sorted: Vec<&str> = names.iter().map(String::as_str).collect();
            sorted.sort_unstable();
            sorted.dedup();
            sorted.join(",")
        }
        None => "all".to_string(),
    };

    let mut canonical = String::new();
    write_canonical(payload, &mut canonical);

    let mut hasher = Sha256::new();
    hasher.update(entity_type.as_bytes());
    hasher.update([0u8]);
    hasher.update(selection.as_bytes());
    hasher.update([0u8]);
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                if let Some(inner) = map.get(key) {
                    write_canonical(inner, out);
                }
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use serde_json::json;

    #[test]
    fn test_fingerprint_is_canonical() {
        let a = fingerprint("contact", None, &json!({"b": 1, "a": {"y": 2, "x": [1, 2]}}));
        let b = fingerprint("contact", None, &json!({"a": {"x": [1, 2], "y": 2}, "b": 1}));
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let names = vec!["b".to_string(), "a".to_string(), "a".to_string()];
        let sorted = vec!["a".to_string(), "b".to_string()];
        assert_eq!(
            fingerprint("contact", Some(&names), &json!({})),
            fingerprint("contact", Some(&sorted), &json!({}))
        );
    }

    #[test]
    fn test_fingerprint_distinguishes_inputs() {
        let payload = json!({"email": "a@x.io"});
        let base = fingerprint("contact", None, &payload);
        assert_ne!(base, fingerprint("workflow", None, &payload));
        assert_ne!(base, fingerprint("contact", Some(&["email".to_string()]), &payload));
        assert_ne!(base, fingerprint("contact", None, &json!({"email": "b@x.io"})));
        assert_ne!(
            fingerprint("contact", None, &json!([1, 2])),
            fingerprint("contact", None, &json!([2, 1]))
        );
    }

    #[test]
    fn test_entries_expire_after_ttl() {
        let clock = Arc::new(ManualClock::default());
        let cache = ResultCache::new(Duration::from_secs(300), clock.clone());
        let outcome = ValidationOutcome::new("contact", None);

        cache.put("k", outcome.clone());
        clock.advance(chrono::Duration::seconds(299));
        assert_eq!(cache.get("k").map(|o| o.id), Some(outcome.id));

        clock.advance(chrono::Duration::seconds(2));
        assert!(cache.get("k").is_none());
        assert_eq!(cache.stats().size, 1);

        cache.put("k", ValidationOutcome::new("contact", None));
        assert!(cache.get("k").is_some());
    }

    #[test]
    fn test_clear_and_stats() {
        let cache = ResultCache::new(Duration::from_secs(60), Arc::new(ManualClock::default()));
        cache.put("a", ValidationOutcome::new("contact", None));
        cache.put("b", ValidationOutcome::new("contact", None));
        assert_eq!(cache.stats(), CacheStats { size: 2, ttl_secs: 60 });

        cache.clear();
        assert_eq!(cache.stats().size, 0);
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn test_concurrent_puts_last_write_wins() {
        let cache = Arc::new(ResultCache::new(Duration::from_secs(60), Arc::new(ManualClock::default())));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        cache.put("shared", ValidationOutcome::new("contact", None));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.stats().size, 1);
        assert!(cache.get("shared").is_some());
    }
}
