// SPDX-License-Identifier: MIT

//! Sharded, fixed-capacity LRU decision cache (§4.5 "Cache"). Sharded by
//! `hash(key) % shard_count` into independent `parking_lot::Mutex`-guarded
//! LRU maps to bound lock contention under concurrent DNS query load, per
//! the fine-grained-shard guidance in §5 (SPEC_FULL §4.5).

use indexmap::IndexMap;
use parking_lot::Mutex;
use pcguard_core::{Decision, DecisionCacheKey};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

struct Entry {
    decision: Decision,
    rule_set_version: u64,
    expires_at: Instant,
}

struct Shard {
    entries: IndexMap<DecisionCacheKey, Entry>,
}

impl Shard {
    fn new() -> Self {
        Self { entries: IndexMap::new() }
    }
}

/// A sharded LRU cache keyed by `(target_kind, target_value)` (§3
/// `DecisionCacheKey`). Every entry is additionally tagged with the
/// rule-set version it was computed against; a stale version is treated
/// as a miss even before TTL expiry (I4).
pub struct DecisionCache {
    shards: Vec<Mutex<Shard>>,
    capacity_per_shard: usize,
    ttl: Duration,
}

impl DecisionCache {
    pub fn new(total_capacity: usize, shard_count: usize, ttl: Duration) -> Self {
        let shard_count = shard_count.max(1);
        let capacity_per_shard = (total_capacity / shard_count).max(1);
        Self {
            shards: (0..shard_count).map(|_| Mutex::new(Shard::new())).collect(),
            capacity_per_shard,
            ttl,
        }
    }

    fn shard_for(&self, key: &DecisionCacheKey) -> &Mutex<Shard> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() as usize) % self.shards.len();
        &self.shards[index]
    }

    /// Returns a cached decision only if both unexpired and computed
    /// against the current rule-set version.
    pub fn get(&self, key: &DecisionCacheKey, current_version: u64, now: Instant) -> Option<Decision> {
        let shard = self.shard_for(key);
        let mut shard = shard.lock();

        let hit = match shard.entries.get(key) {
            Some(entry) => entry.rule_set_version == current_version && entry.expires_at > now,
            None => false,
        };
        if !hit {
            shard.entries.shift_remove(key);
            return None;
        }

        // Move to the back (most-recently-used) by removing and reinserting.
        let (_, entry) = shard.entries.shift_remove_full(key).map(|(_, k, v)| (k, v))?;
        let decision = entry.decision.clone();
        shard.entries.insert(key.clone(), entry);
        Some(decision)
    }

    pub fn put(&self, key: DecisionCacheKey, decision: Decision, rule_set_version: u64, now: Instant) {
        let shard = self.shard_for(&key);
        let mut shard = shard.lock();

        shard.entries.shift_remove(&key);
        if shard.entries.len() >= self.capacity_per_shard {
            shard.entries.shift_remove_index(0);
        }
        shard.entries.insert(
            key,
            Entry { decision, rule_set_version, expires_at: now + self.ttl },
        );
    }

    /// Evicts every entry. Called on each rule-set version bump (§4.5
    /// "invalidated wholesale").
    pub fn clear(&self) {
        for shard in &self.shards {
            shard.lock().entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use pcguard_core::{DecisionAction, TargetKind};
    use proptest::prelude::*;

    fn decision(value: &str) -> Decision {
        Decision {
            action: DecisionAction::Block,
            reason: "blacklist".into(),
            rule_ref: None,
            target_kind: TargetKind::Url,
            target_value: value.into(),
            made_at_ms: 0,
        }
    }

    fn key(value: &str) -> DecisionCacheKey {
        DecisionCacheKey { target_kind: TargetKind::Url, target_value: value.into() }
    }

    proptest! {
        /// I4: a decision cached under version `v1` is never returned
        /// when queried under any different version `v2` — a stale
        /// rule-set version is always a cache miss regardless of TTL.
        #[test]
        fn put_under_one_version_is_never_visible_under_another(
            v1 in 0u64..1000,
            v2 in 0u64..1000,
        ) {
            prop_assume!(v1 != v2);
            let cache = DecisionCache::new(16, 4, Duration::from_secs(300));
            let now = Instant::now();
            cache.put(key("x.test"), decision("x.test"), v1, now);
            prop_assert!(cache.get(&key("x.test"), v2, now).is_none());
        }

        /// A put immediately followed by a get under the same version
        /// and before TTL elapses always hits, independent of shard
        /// count (hashing must be stable across shard configurations).
        #[test]
        fn same_version_immediate_get_is_always_a_hit(
            shard_count in 1usize..8,
            version in 0u64..1000,
        ) {
            let cache = DecisionCache::new(64, shard_count, Duration::from_secs(300));
            let now = Instant::now();
            cache.put(key("x.test"), decision("x.test"), version, now);
            prop_assert!(cache.get(&key("x.test"), version, now).is_some());
        }
    }
}
