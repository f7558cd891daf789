/// Engine configuration, persisted as `config.toml` in the config directory.
///
/// The file has three sections:
///
///   [engine]     tick rate, cache sizing, rotation timings
///   [settings]   per-tick switches (PvP-safe, blacklist, kill gate, ...)
///   [[rules]]    the ordered attack rule list
///
/// Every field has a default, so an empty or partial file loads.
use crate::{rotation::RotationConfig, rules::RuleSet};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Interval between engine ticks in the host loop.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms:    u64,
    /// Cooldown floor for rules without their own duration.
    #[serde(default = "default_cooldown_ms")]
    pub default_cooldown_ms: u64,
    /// Best-tile scan radius; values above 4 are clamped.
    #[serde(default = "default_tile_scan_radius")]
    pub tile_scan_radius:    u32,
    /// How long a cached candidate-tile list stays valid across ticks.
    #[serde(default = "default_geometry_ttl_ms")]
    pub geometry_ttl_ms:     u64,
    #[serde(default = "default_geometry_capacity")]
    pub geometry_capacity:   usize,
    #[serde(default)]
    pub rotation:            RotationConfig,
}

fn default_tick_interval_ms() -> u64 { 50 }
fn default_cooldown_ms() -> u64 { crate::cooldown::DEFAULT_COOLDOWN_MS }
fn default_tile_scan_radius() -> u32 { crate::spatial::MAX_TILE_SCAN_RADIUS }
fn default_geometry_ttl_ms() -> u64 { 250 }
fn default_geometry_capacity() -> usize { 64 }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms:    default_tick_interval_ms(),
            default_cooldown_ms: default_cooldown_ms(),
            tile_scan_radius:    default_tile_scan_radius(),
            geometry_ttl_ms:     default_geometry_ttl_ms(),
            geometry_capacity:   default_geometry_capacity(),
            rotation:            RotationConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Switches read on every tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_true")]
    pub enabled:          bool,
    /// Refuse area attacks that could reach a non-party player.
    #[serde(default)]
    pub pvp_safe:         bool,
    /// Hold every rule while a blacklisted player is within `blacklist_radius`.
    #[serde(default)]
    pub blacklist_safe:   bool,
    #[serde(default = "default_blacklist_radius")]
    pub blacklist_radius: u32,
    /// When set, rules only fire once recent kills exceed this number.
    #[serde(default)]
    pub kill_gate:        Option<u32>,
    /// Let sweep rules turn the character towards the best side.
    #[serde(default = "default_true")]
    pub rotation_enabled: bool,
}

fn default_true() -> bool { true }
fn default_blacklist_radius() -> u32 { 8 }

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled:          true,
            pvp_safe:         false,
            blacklist_safe:   false,
            blacklist_radius: default_blacklist_radius(),
            kill_gate:        None,
            rotation_enabled: true,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine:   EngineConfig,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub rules:    RuleSet,
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

pub fn load_or_default(config_dir: &Path) -> Result<AppConfig> {
    let path = config_dir.join("config.toml");
    if !path.exists() {
        tracing::info!("No config at {} - using defaults", path.display());
        return Ok(AppConfig::default());
    }

    let raw = std::fs::read_to_string(&path)?;
    let cfg: AppConfig = toml::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("Config parse error: {}", e))?;

    // A bad rule is skipped at evaluation time; flag it early so it is
    // visible in the log.
    for rule in cfg.rules.iter() {
        if let Err(e) = rule.validate() {
            tracing::warn!("Rule {}: {}", rule.display_name(), e);
        }
    }
    tracing::info!("Loaded {} rules from {}", cfg.rules.len(), path.display());
    Ok(cfg)
}

pub fn save(config: &AppConfig, config_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(config_dir)?;
    let raw = toml::to_string_pretty(config)
        .map_err(|e| anyhow::anyhow!("Config serialize error: {}", e))?;
    std::fs::write(config_dir.join("config.toml"), raw)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        patterns::{PatternCategory, PatternRef},
        rules::{AttackRule, Comparison, Resource, RuleKind, Shape},
    };
    use tempfile::tempdir;

    #[test]
    fn returns_default_when_missing() {
        let dir = tempdir().unwrap();
        let cfg = load_or_default(dir.path()).unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert!(cfg.settings.enabled);
        assert_eq!(cfg.engine.default_cooldown_ms, 1_000);
        assert_eq!(cfg.engine.rotation.cooldown_ms, 600);
        assert!(cfg.rules.is_empty());
    }

    #[test]
    fn round_trips_config() {
        let dir = tempdir().unwrap();
        let mut cfg = AppConfig::default();
        cfg.settings.pvp_safe  = true;
        cfg.settings.kill_gate = Some(2);
        cfg.engine.rotation.max_attempts = 5;
        cfg.rules = RuleSet::new(vec![
            AttackRule::new(
                RuleKind::AbsoluteSpell { shape: Shape::Sweep { index: 0 } },
                Resource::Spell { words: "exori min".into(), mana: 200 },
            )
            .labelled("sweep")
            .at_least(3),
            AttackRule::new(
                RuleKind::AreaProjectile { pattern: PatternRef::new(PatternCategory::Blob, 1) },
                Resource::Item { id: 3191 },
            )
            .exactly(2)
            .only(&["Dragon"])
            .cooldown(2_000),
        ]);

        save(&cfg, dir.path()).unwrap();
        let loaded = load_or_default(dir.path()).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn parses_hand_written_rules() {
        let dir = tempdir().unwrap();
        let raw = r#"
[settings]
pvp_safe = true

[engine]
tick_interval_ms = 100

[[rules]]
label = "sd"
resource = { item = { id = 3155 } }
kind = { category = "targeted_projectile", pattern = { category = "radius", index = 6 } }

[[rules]]
resource = { spell = { words = "exevo gran mas flam", mana = 1100 } }
threshold = 4
comparison = "exactly"
hp_max = 60
kind = { category = "absolute_spell", shape = { shape = "fixed", pattern = { category = "blob", index = 1 } } }
"#;
        std::fs::write(dir.path().join("config.toml"), raw).unwrap();

        let cfg = load_or_default(dir.path()).unwrap();
        assert!(cfg.settings.pvp_safe);
        assert!(cfg.settings.rotation_enabled);
        assert_eq!(cfg.engine.tick_interval_ms, 100);
        assert_eq!(cfg.engine.geometry_ttl_ms, 250);
        assert_eq!(cfg.rules.len(), 2);

        let rules: Vec<_> = cfg.rules.iter().collect();
        assert_eq!(rules[0].display_name(), "sd");
        assert_eq!(rules[0].threshold, 1);
        assert_eq!(rules[0].comparison, Comparison::AtLeast);
        assert_eq!(rules[1].display_name(), "absolute_spell");
        assert_eq!(rules[1].comparison, Comparison::Exactly);
        assert_eq!(rules[1].hp_max, 60);
        assert!(rules[1].enabled);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), "[[rules]]\nkind = 3\n").unwrap();
        assert!(load_or_default(dir.path()).is_err());
    }
}
