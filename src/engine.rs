/// Tick-driven attack engine.
///
/// Each call to `Engine::run_tick` is one decision pass: guard clauses, then
/// the rule list in order with a fresh per-tick cache, and at most one action
/// for the first satisfied rule. Cooldown stamps, one rotation state machine
/// per sweep rule and the candidate-tile cache are the only state that
/// outlives a tick.
use crate::{
    cache::TickCache,
    config::{EngineConfig, Settings},
    cooldown::{CooldownKey, CooldownRegistry},
    geometry::{Direction, Position},
    rotation::{RotationPhase, RotationState},
    rules::{self, EvalContext, Plan, RuleSet},
    spatial::GeometryCache,
    world::{Actions, CreatureId, World},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// An action requested from outside the rule list (a scripted combo, a
/// hotkey). It skips evaluation but still stamps the cooldown registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Forced {
    Cast { words: String },
    UseOnCreature { item: u16, creature: CreatureId },
    UseOnTile { item: u16, position: Position },
}

impl Forced {
    fn cooldown_key(&self) -> CooldownKey {
        match self {
            Forced::Cast { words }             => CooldownKey::spell(words),
            Forced::UseOnCreature { item, .. } => CooldownKey::Item(*item),
            Forced::UseOnTile { item, .. }     => CooldownKey::Item(*item),
        }
    }

    fn into_plan(self) -> Plan {
        match self {
            Forced::Cast { words }                    => Plan::Cast(words),
            Forced::UseOnCreature { item, creature }  => Plan::UseOnCreature { item, creature },
            Forced::UseOnTile { item, position }      => Plan::UseOnTile { item, position },
        }
    }
}

/// Why a tick ended without looking at any rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Idle {
    Disabled,
    NoPlayer,
    GlobalCooldown,
    NoTarget,
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Idle(Idle),
    /// Every rule was evaluated and none was satisfied.
    NoMatch,
    Fired { index: usize, plan: Plan },
}

/// Rotation progress of one sweep rule.
#[derive(Debug, Clone, Serialize)]
pub struct SweepSnapshot {
    pub rule_index:     usize,
    pub phase:          RotationPhase,
    pub best_direction: Option<Direction>,
    pub best_score:     u32,
    pub attempts:       u8,
}

/// Engine counters for the host UI, taken after a tick.
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub ticks:            u64,
    pub fires:            u64,
    pub rotations:        u64,
    /// Label of the last rule that acted, or "forced".
    pub last_rule:        Option<String>,
    pub last_rule_index:  Option<usize>,
    pub last_fired_ms:    Option<u64>,
    /// Per-tick cache counters of the most recent tick.
    pub cache_hits:       u32,
    pub cache_misses:     u32,
    pub geometry_entries: usize,
    pub sweeps:           Vec<SweepSnapshot>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Stats {
    ticks:           u64,
    fires:           u64,
    rotations:       u64,
    last_rule:       Option<String>,
    last_rule_index: Option<usize>,
    last_fired_ms:   Option<u64>,
    cache_hits:      u32,
    cache_misses:    u32,
}

pub struct Engine {
    config:    EngineConfig,
    cooldowns: CooldownRegistry,
    geometry:  GeometryCache,
    /// Keyed by rule index; sweep rules never share a state machine.
    rotations: BTreeMap<usize, RotationState>,
    stats:     Stats,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            cooldowns: CooldownRegistry::new(config.default_cooldown_ms),
            geometry:  GeometryCache::new(config.geometry_ttl_ms, config.geometry_capacity),
            rotations: BTreeMap::new(),
            stats:     Stats::default(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cooldowns(&self) -> &CooldownRegistry {
        &self.cooldowns
    }

    /// Rotation state of the sweep rule at `rule_index`, once it has been
    /// evaluated.
    pub fn rotation(&self, rule_index: usize) -> Option<&RotationState> {
        self.rotations.get(&rule_index)
    }

    /// Runs one evaluate-then-execute pass.
    pub fn run_tick<W, A>(
        &mut self,
        world:    &W,
        actions:  &mut A,
        rules:    &RuleSet,
        settings: &Settings,
    ) -> TickOutcome
    where
        W: World + ?Sized,
        A: Actions + ?Sized,
    {
        self.stats.ticks += 1;
        self.stats.cache_hits   = 0;
        self.stats.cache_misses = 0;

        if !settings.enabled {
            return TickOutcome::Idle(Idle::Disabled);
        }
        let Some(player) = world.local_player() else {
            return TickOutcome::Idle(Idle::NoPlayer);
        };
        if world.global_cooldown_active() {
            return TickOutcome::Idle(Idle::GlobalCooldown);
        }
        let Some(target) = world.target() else {
            return TickOutcome::Idle(Idle::NoTarget);
        };

        let now_ms = world.now_ms();
        // Per-tick tier starts cold every tick.
        let mut tick_cache = TickCache::new();
        let mut chosen = None;
        // Non-sweep rules never touch it.
        let mut unused_rotation = RotationState::new();

        for (index, rule) in rules.iter().enumerate() {
            let rotation = if rule.kind.is_sweep() {
                self.rotations.entry(index).or_default()
            } else {
                &mut unused_rotation
            };
            let mut ctx = EvalContext {
                world,
                player:     &player,
                target:     Some(&target),
                settings,
                config:     &self.config,
                cooldowns:  &self.cooldowns,
                tick_cache: &mut tick_cache,
                geometry:   &mut self.geometry,
                rotation,
                now_ms,
            };
            match rules::plan(rule, &mut ctx) {
                Ok(Some(plan)) => {
                    chosen = Some((index, rule, plan));
                    break;
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("Rule #{} {} skipped: {}", index, rule.display_name(), e),
            }
        }

        self.stats.cache_hits   = tick_cache.hits();
        self.stats.cache_misses = tick_cache.misses();

        let Some((index, rule, plan)) = chosen else {
            return TickOutcome::NoMatch;
        };

        if plan.is_attack() {
            self.cooldowns.stamp(rule.cooldown_key(), now_ms);
            self.stats.fires          += 1;
            self.stats.last_rule       = Some(rule.display_name().to_owned());
            self.stats.last_rule_index = Some(index);
            self.stats.last_fired_ms   = Some(now_ms);
            if let Some(rotation) = self.rotations.get_mut(&index) {
                rotation.on_attack(player.facing());
            }
        }
        tracing::debug!("Rule #{} {} -> {:?}", index, rule.display_name(), plan);
        self.dispatch(&plan, actions);

        TickOutcome::Fired { index, plan }
    }

    /// Executes `forced` immediately, bypassing rule evaluation.
    pub fn force_execute<W, A>(&mut self, world: &W, actions: &mut A, forced: Forced)
    where
        W: World + ?Sized,
        A: Actions + ?Sized,
    {
        let now_ms = world.now_ms();
        self.cooldowns.stamp(forced.cooldown_key(), now_ms);
        self.stats.fires          += 1;
        self.stats.last_rule       = Some("forced".to_owned());
        self.stats.last_rule_index = None;
        self.stats.last_fired_ms   = Some(now_ms);

        let plan = forced.into_plan();
        tracing::debug!("Forced -> {:?}", plan);
        self.dispatch(&plan, actions);
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            ticks:            self.stats.ticks,
            fires:            self.stats.fires,
            rotations:        self.stats.rotations,
            last_rule:        self.stats.last_rule.clone(),
            last_rule_index:  self.stats.last_rule_index,
            last_fired_ms:    self.stats.last_fired_ms,
            cache_hits:       self.stats.cache_hits,
            cache_misses:     self.stats.cache_misses,
            geometry_entries: self.geometry.len(),
            sweeps:           self
                .rotations
                .iter()
                .map(|(&rule_index, r)| SweepSnapshot {
                    rule_index,
                    phase:          r.phase(),
                    best_direction: r.best_direction(),
                    best_score:     r.best_score(),
                    attempts:       r.attempts(),
                })
                .collect(),
        }
    }

    /// Invokes exactly one primitive for `plan`.
    fn dispatch<A: Actions + ?Sized>(&mut self, plan: &Plan, actions: &mut A) {
        match plan {
            Plan::Cast(words)                        => actions.cast(words),
            Plan::UseOnCreature { item, creature }   => actions.use_on_creature(*item, *creature),
            Plan::UseOnTile { item, position }       => actions.use_on_tile(*item, *position),
            Plan::Rotate(dir) => {
                self.stats.rotations += 1;
                actions.turn(*dir);
            }
            Plan::Hold => {}
        }
    }
}
