use std::collections::VecDeque;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::hash::{ContentHash, content_hash};

/// Number of independent shards per cache.
pub const SHARD_COUNT: usize = 16;
/// Maximum entries held by a single shard before FIFO eviction kicks in.
pub const SHARD_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy)]
struct TokenCacheEntry {
    hash: ContentHash,
    tokens: u64,
}

#[derive(Debug)]
struct TokenCacheShard {
    entries: RwLock<VecDeque<TokenCacheEntry>>,
}

impl TokenCacheShard {
    fn new() -> Self {
        Self {
            entries: RwLock::new(VecDeque::with_capacity(SHARD_CAPACITY)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, VecDeque<TokenCacheEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, VecDeque<TokenCacheEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Bounded, sharded memo of token counts keyed by content hash.
///
/// Each shard is a small FIFO guarded by its own lock, so lookups for
/// unrelated content never contend. A shard holds at most [`SHARD_CAPACITY`]
/// entries; the cache as a whole never exceeds `SHARD_COUNT * SHARD_CAPACITY`.
///
/// Hash collisions are treated as the same content. The stored value is an
/// estimate, so a stale count after a collision is acceptable.
#[derive(Debug)]
pub struct TokenCostCache {
    shards: [TokenCacheShard; SHARD_COUNT],
}

impl Default for TokenCostCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCostCache {
    pub fn new() -> Self {
        Self {
            shards: std::array::from_fn(|_| TokenCacheShard::new()),
        }
    }

    /// Shard a piece of content routes to. Stable for the life of the process
    /// and identical across instances.
    pub fn shard_for(content: &str) -> usize {
        shard_index(content_hash(content))
    }

    pub fn get(&self, content: &str) -> Option<u64> {
        let hash = content_hash(content);
        let entries = self.shards[shard_index(hash)].read();
        entries
            .iter()
            .find(|entry| entry.hash == hash)
            .map(|entry| entry.tokens)
    }

    /// Stores a count. Re-setting known content refreshes the count in place;
    /// new content evicts the oldest entry of a full shard.
    pub fn set(&self, content: &str, tokens: u64) {
        let hash = content_hash(content);
        let mut entries = self.shards[shard_index(hash)].write();

        if let Some(entry) = entries.iter_mut().find(|entry| entry.hash == hash) {
            entry.tokens = tokens;
            return;
        }

        if entries.len() >= SHARD_CAPACITY {
            entries.pop_front();
        }
        entries.push_back(TokenCacheEntry { hash, tokens });
    }

    /// Returns the cached count, or runs `estimate` and caches its result.
    ///
    /// The estimator runs without any shard lock held; two callers racing on
    /// the same content may both estimate, and the later `set` wins.
    pub fn get_or_insert_with<F>(&self, content: &str, estimate: F) -> u64
    where
        F: FnOnce(&str) -> u64,
    {
        if let Some(tokens) = self.get(content) {
            return tokens;
        }
        let tokens = estimate(content);
        self.set(content, tokens);
        tokens
    }

    pub fn shard_len(&self, index: usize) -> usize {
        self.shards
            .get(index)
            .map(|shard| shard.read().len())
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.read().is_empty())
    }
}

fn shard_index(hash: ContentHash) -> usize {
    (hash % SHARD_COUNT as u64) as usize
}
