// SPDX-License-Identifier: MIT

//! Small positive/negative DNS response cache keyed by `(qname, qtype)`
//! (§4.3). TTL is derived from the authoritative response; the whole
//! cache is flushed when the rule-set version changes.

use hickory_proto::op::Message;
use hickory_proto::rr::RecordType;
use parking_lot::Mutex;
use pcguard_core::Clock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct CacheKey {
    qname: String,
    qtype: u16,
}

struct CacheEntry {
    message: Message,
    expires_at: Instant,
}

pub struct ResponseCache<C: Clock> {
    clock: C,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
    rule_set_version: Mutex<u64>,
}

impl<C: Clock> ResponseCache<C> {
    pub fn new(clock: C) -> Self {
        Self { clock, entries: Mutex::new(HashMap::new()), rule_set_version: Mutex::new(0) }
    }

    pub fn get(&self, qname: &str, qtype: RecordType) -> Option<Message> {
        let key = CacheKey { qname: qname.to_string(), qtype: u16::from(qtype) };
        let mut entries = self.entries.lock();
        match entries.get(&key) {
            Some(entry) if entry.expires_at > self.clock.now() => Some(entry.message.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    /// Inserts `message`, deriving TTL from the minimum TTL across its
    /// answer records (0 for negative/NXDOMAIN responses, i.e. not
    /// cached past this tick).
    pub fn put(&self, qname: &str, qtype: RecordType, message: Message) {
        let ttl = message.answers().iter().map(|r| r.ttl()).min().unwrap_or(0);
        if ttl == 0 {
            return;
        }
        let key = CacheKey { qname: qname.to_string(), qtype: u16::from(qtype) };
        let expires_at = self.clock.now() + Duration::from_secs(ttl as u64);
        self.entries.lock().insert(key, CacheEntry { message, expires_at });
    }

    /// Flushes every entry when the rule-set version advances (I4).
    pub fn notify_rule_set_version(&self, version: u64) {
        let mut current = self.rule_set_version.lock();
        if *current != version {
            *current = version;
            self.entries.lock().clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::op::{Message, MessageType, Query};
    use hickory_proto::rr::{rdata::A, Name, RData, Record};
    use pcguard_core::FakeClock;
    use std::str::FromStr;

    fn answer(name: &str, ttl: u32) -> Message {
        let mut message = Message::new();
        message.set_message_type(MessageType::Response);
        message.add_query(Query::query(Name::from_str(name).unwrap(), RecordType::A));
        message.add_answer(Record::from_rdata(
            Name::from_str(name).unwrap(),
            ttl,
            RData::A(A(std::net::Ipv4Addr::UNSPECIFIED)),
        ));
        message
    }

    #[test]
    fn put_then_get_returns_cached_message_before_ttl_expiry() {
        let clock = FakeClock::new();
        let cache = ResponseCache::new(clock.clone());
        cache.put("ads.example.com", RecordType::A, answer("ads.example.com.", 60));
        assert!(cache.get("ads.example.com", RecordType::A).is_some());
    }

    #[test]
    fn entry_expires_after_ttl() {
        let clock = FakeClock::new();
        let cache = ResponseCache::new(clock.clone());
        cache.put("ads.example.com", RecordType::A, answer("ads.example.com.", 5));
        clock.advance(Duration::from_secs(6));
        assert!(cache.get("ads.example.com", RecordType::A).is_none());
    }

    #[test]
    fn rule_set_version_change_flushes_cache() {
        let clock = FakeClock::new();
        let cache = ResponseCache::new(clock);
        cache.put("x.test", RecordType::A, answer("x.test.", 300));
        assert_eq!(cache.len(), 1);
        cache.notify_rule_set_version(1);
        assert!(cache.is_empty());
    }

    #[test]
    fn zero_ttl_answer_is_not_cached() {
        let clock = FakeClock::new();
        let cache = ResponseCache::new(clock);
        cache.put("x.test", RecordType::A, answer("x.test.", 0));
        assert!(cache.is_empty());
    }
}
