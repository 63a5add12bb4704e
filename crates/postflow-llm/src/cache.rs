//! BLAKE3-keyed response cache for gateway calls.
//!
//! Entries live in memory for the lifetime of the gateway. The cache is a
//! bounded LRU: a hit refreshes the entry, and inserting into a full cache
//! evicts the least recently used entry.

use std::collections::{HashMap, VecDeque};

/// Statistics for cache performance tracking
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub evictions: usize,
    pub writes: usize,
}

impl CacheStats {
    #[must_use]
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Hex BLAKE3 digest identifying one gateway request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Hash of (step, schema, prompt, salt).
    ///
    /// Each part is length-prefixed so that moving text between parts always
    /// changes the key.
    #[must_use]
    pub fn new(step: &str, schema: Option<&str>, prompt: &str, salt: Option<&str>) -> Self {
        let mut hasher = blake3::Hasher::new();
        for part in [Some(step), schema, Some(prompt), salt] {
            match part {
                Some(text) => {
                    hasher.update(&[1]);
                    hasher.update(&(text.len() as u64).to_le_bytes());
                    hasher.update(text.as_bytes());
                }
                None => {
                    hasher.update(&[0]);
                }
            }
        }
        Self(hasher.finalize().to_hex().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug)]
pub struct ResponseCache {
    capacity: usize,
    entries: HashMap<CacheKey, String>,
    /// Front is least recently used
    recency: VecDeque<CacheKey>,
    stats: CacheStats,
}

impl ResponseCache {
    /// A cache holding at most `capacity` responses (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            recency: VecDeque::with_capacity(capacity),
            stats: CacheStats::default(),
        }
    }

    pub fn get(&mut self, key: &CacheKey) -> Option<String> {
        match self.entries.get(key) {
            Some(value) => {
                let value = value.clone();
                self.touch(key);
                self.stats.hits += 1;
                Some(value)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, key: CacheKey, value: String) {
        if self.entries.contains_key(&key) {
            self.touch(&key);
        } else {
            if self.entries.len() >= self.capacity
                && let Some(oldest) = self.recency.pop_front()
            {
                self.entries.remove(&oldest);
                self.stats.evictions += 1;
            }
            self.recency.push_back(key.clone());
        }
        self.entries.insert(key, value);
        self.stats.writes += 1;
    }

    fn touch(&mut self, key: &CacheKey) {
        if let Some(pos) = self.recency.iter().position(|k| k == key)
            && let Some(k) = self.recency.remove(pos)
        {
            self.recency.push_back(k);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub const fn stats(&self) -> &CacheStats {
        &self.stats
    }
}
