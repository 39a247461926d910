// SPDX-License-Identifier: MIT

//! Resolver-specific counters (§4.3 `Stats()`), layered on the shared
//! `pcguard_core::Counters`.

use parking_lot::Mutex;
use pcguard_core::{Counters, RollingAverage};

#[derive(Default)]
pub struct ResolverStats {
    inner: Mutex<(Counters, RollingAverage)>,
}

impl ResolverStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_total(&self) {
        self.inner.lock().0.total += 1;
    }

    pub fn record_blocked(&self) {
        self.inner.lock().0.blocked += 1;
    }

    pub fn record_allowed(&self) {
        self.inner.lock().0.allowed += 1;
    }

    pub fn record_forwarded(&self) {
        self.inner.lock().0.forwarded += 1;
    }

    pub fn record_cache_hit(&self) {
        self.inner.lock().0.cache_hits += 1;
    }

    pub fn observe_latency_ms(&self, ms: f64) {
        self.inner.lock().1.observe(ms);
    }

    pub fn snapshot(&self) -> (Counters, RollingAverage) {
        *self.inner.lock()
    }
}
