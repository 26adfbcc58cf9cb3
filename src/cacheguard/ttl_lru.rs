//! TTL+LRU memory tier. A `parking_lot`-free plain struct (the mutex lives
//! one level up in `CacheGuard`/`SharedCacheGuard`, matching the teacher's
//! habit of keeping the primitive itself lock-free and letting the owner
//! decide the locking granularity).

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

pub struct TtlLru<V> {
    capacity: usize,
    entries: HashMap<String, Entry<V>>,
    order: VecDeque<String>,
}

impl<V: Clone> TtlLru<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn get(&mut self, key: &str) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some(e) => Instant::now() >= e.expires_at,
            None => return None,
        };

        if expired {
            self.entries.remove(key);
            self.order.retain(|k| k != key);
            return None;
        }

        self.touch(key);
        self.entries.get(key).map(|e| e.value.clone())
    }

    pub fn insert(&mut self, key: String, value: V, ttl: Duration) {
        if self.entries.contains_key(&key) {
            self.order.retain(|k| k != &key);
        } else if self.entries.len() >= self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.entries.remove(&evicted);
            }
        }

        self.entries.insert(
            key.clone(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        self.order.push_back(key);
    }

    fn touch(&mut self, key: &str) {
        self.order.retain(|k| k != key);
        self.order.push_back(key.to_string());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_after_ttl() {
        let mut lru: TtlLru<i32> = TtlLru::new(4);
        lru.insert("a".into(), 1, Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(lru.get("a"), None);
    }

    #[test]
    fn evicts_least_recently_used_at_capacity() {
        let mut lru: TtlLru<i32> = TtlLru::new(2);
        lru.insert("a".into(), 1, Duration::from_secs(60));
        lru.insert("b".into(), 2, Duration::from_secs(60));
        // touch "a" so "b" becomes the LRU victim
        assert_eq!(lru.get("a"), Some(1));
        lru.insert("c".into(), 3, Duration::from_secs(60));
        assert_eq!(lru.get("b"), None);
        assert_eq!(lru.get("a"), Some(1));
        assert_eq!(lru.get("c"), Some(3));
    }
}
