/// Per-resource cooldown bookkeeping, layered on top of whatever cooldown the
/// game client already enforces.
///
/// Two rules that spend the same spell or item share one entry, so a rune
/// thrown by the area rule also holds back the single-target rule using it.
/// Entries are overwritten on every stamp and never removed.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Floor applied when a rule does not set its own cooldown.
pub const DEFAULT_COOLDOWN_MS: u64 = 1_000;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CooldownKey {
    /// Spell words, lower-cased.
    Spell(String),
    Item(u16),
}

impl CooldownKey {
    pub fn spell(words: &str) -> Self {
        CooldownKey::Spell(words.trim().to_lowercase())
    }
}

impl std::fmt::Display for CooldownKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CooldownKey::Spell(words) => write!(f, "spell:{}", words),
            CooldownKey::Item(id)     => write!(f, "item:{}", id),
        }
    }
}

#[derive(Debug)]
pub struct CooldownRegistry {
    last_fired_ms: HashMap<CooldownKey, u64>,
    default_ms:    u64,
}

impl Default for CooldownRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN_MS)
    }
}

impl CooldownRegistry {
    pub fn new(default_ms: u64) -> Self {
        Self { last_fired_ms: HashMap::new(), default_ms }
    }

    /// Never-stamped keys are always ready.
    pub fn ready(&self, key: &CooldownKey, duration_ms: Option<u64>, now_ms: u64) -> bool {
        let Some(&last) = self.last_fired_ms.get(key) else {
            return true;
        };
        let cooldown = duration_ms.unwrap_or(self.default_ms);
        now_ms.saturating_sub(last) >= cooldown
    }

    pub fn stamp(&mut self, key: CooldownKey, now_ms: u64) {
        self.last_fired_ms.insert(key, now_ms);
    }

    pub fn last_fired_ms(&self, key: &CooldownKey) -> Option<u64> {
        self.last_fired_ms.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.last_fired_ms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_fired_ms.is_empty()
    }
}
