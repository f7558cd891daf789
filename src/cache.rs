/// Memoization tiers.
///
/// `TickCache` holds spatial counts and best-tile results for exactly one
/// decision tick; the engine builds a fresh one every tick, so it is always
/// cold at tick start and never serves a value computed against last tick's
/// creatures.
///
/// `TtlCache` is the cross-tick tier. The engine only stores world geometry in
/// it (candidate tiles around a position), which changes far slower than the
/// creatures standing on it. Staleness is checked on read; the only proactive
/// removal is oldest-first eviction when the tier is full.
use crate::{
    geometry::{Direction, Position},
    patterns::PatternRef,
    spatial::BestTile,
    world::CreatureId,
};
use std::collections::HashMap;
use std::hash::Hash;

// ---------------------------------------------------------------------------
// Structured keys
// ---------------------------------------------------------------------------

/// What a pattern was evaluated relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnchorKey {
    Position(Position),
    Entity(CreatureId),
    /// Best-tile search around the caster standing at this position.
    BestTile(Position),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub anchor:    AnchorKey,
    pub pattern:   PatternRef,
    /// Set for sweep sub-patterns.
    pub direction: Option<Direction>,
    pub hp_min:    u8,
    pub hp_max:    u8,
    pub safe:      bool,
    /// Normalized name allow-list; empty means any name.
    pub names:     Vec<String>,
}

// ---------------------------------------------------------------------------
// Per-tick tier
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct TickCache {
    counts: HashMap<QueryKey, u32>,
    tiles:  HashMap<QueryKey, Option<BestTile>>,
    hits:   u32,
    misses: u32,
}

impl TickCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count_or_insert_with(&mut self, key: QueryKey, compute: impl FnOnce() -> u32) -> u32 {
        if let Some(&count) = self.counts.get(&key) {
            self.hits += 1;
            return count;
        }
        self.misses += 1;
        let count = compute();
        self.counts.insert(key, count);
        count
    }

    pub fn tile_or_insert_with(
        &mut self,
        key:     QueryKey,
        compute: impl FnOnce() -> Option<BestTile>,
    ) -> Option<BestTile> {
        if let Some(&tile) = self.tiles.get(&key) {
            self.hits += 1;
            return tile;
        }
        self.misses += 1;
        let tile = compute();
        self.tiles.insert(key, tile);
        tile
    }

    pub fn hits(&self) -> u32 {
        self.hits
    }

    pub fn misses(&self) -> u32 {
        self.misses
    }

    pub fn len(&self) -> usize {
        self.counts.len() + self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Cross-tick tier
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries:  HashMap<K, (V, u64)>,
    ttl_ms:   u64,
    capacity: usize,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    pub fn new(ttl_ms: u64, capacity: usize) -> Self {
        Self { entries: HashMap::new(), ttl_ms, capacity: capacity.max(1) }
    }

    /// Returns the value only while it is younger than the TTL. Expired
    /// entries are dropped on the way out.
    pub fn get(&mut self, key: &K, now_ms: u64) -> Option<V> {
        let (value, stored_ms) = self.entries.get(key)?;
        if now_ms.saturating_sub(*stored_ms) < self.ttl_ms {
            return Some(value.clone());
        }
        self.entries.remove(key);
        None
    }

    pub fn insert(&mut self, key: K, value: V, now_ms: u64) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.evict_oldest();
        }
        self.entries.insert(key, (value, now_ms));
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, (_, stored_ms))| *stored_ms)
            .map(|(k, _)| k.clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
