pub mod absolute;
pub mod area;
pub mod buff;
pub mod targeted;

use crate::{
    cache::{AnchorKey, QueryKey, TickCache},
    config::{EngineConfig, Settings},
    cooldown::{CooldownKey, CooldownRegistry},
    error::RuleError,
    geometry::{Direction, Position},
    patterns::{self, Pattern, PatternRef},
    rotation::RotationState,
    spatial::{Anchor, GeometryCache, HostileFilter, Spatial},
    world::{Creature, CreatureId, LocalPlayer, World},
};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Rule configuration
// ---------------------------------------------------------------------------

/// How a ground-cast spell picks its area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Shape {
    /// Four-direction sweep resolved by the rotation state machine.
    Sweep { index: u8 },
    Fixed { pattern: PatternRef },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum RuleKind {
    /// Spell aimed at the current target; counts hostiles around it.
    TargetedSpell { pattern: PatternRef },
    /// Thrown area rune; lands on the best tile near the caster.
    AreaProjectile { pattern: PatternRef },
    /// Rune used directly on the current target.
    TargetedProjectile { pattern: PatternRef },
    /// Self-cast; counts hostiles around the caster.
    Buff { pattern: PatternRef },
    /// Ground-cast around or in front of the caster.
    AbsoluteSpell { shape: Shape },
}

impl RuleKind {
    pub fn requires_target(&self) -> bool {
        matches!(
            self,
            RuleKind::TargetedSpell { .. }
                | RuleKind::TargetedProjectile { .. }
                | RuleKind::AreaProjectile { .. }
        )
    }

    pub fn is_sweep(&self) -> bool {
        matches!(self, RuleKind::AbsoluteSpell { shape: Shape::Sweep { .. } })
    }

    pub fn name(&self) -> &'static str {
        match self {
            RuleKind::TargetedSpell { .. }      => "targeted_spell",
            RuleKind::AreaProjectile { .. }     => "area_projectile",
            RuleKind::TargetedProjectile { .. } => "targeted_projectile",
            RuleKind::Buff { .. }               => "buff",
            RuleKind::AbsoluteSpell { .. }      => "absolute_spell",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Spell {
        words: String,
        #[serde(default)]
        mana:  u32,
    },
    Item { id: u16 },
}

impl Resource {
    pub fn cooldown_key(&self) -> CooldownKey {
        match self {
            Resource::Spell { words, .. } => CooldownKey::spell(words),
            Resource::Item { id }         => CooldownKey::Item(*id),
        }
    }

    pub fn mana_cost(&self) -> u32 {
        match self {
            Resource::Spell { mana, .. } => *mana,
            Resource::Item { .. }        => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Exactly,
    #[default]
    AtLeast,
}

impl Comparison {
    pub fn matches(self, count: u32, threshold: u32) -> bool {
        match self {
            Comparison::Exactly => count == threshold,
            Comparison::AtLeast => count >= threshold,
        }
    }
}

fn default_true() -> bool { true }
fn default_hp_max() -> u8 { 100 }
fn default_threshold() -> u32 { 1 }

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackRule {
    /// Display name for logs; falls back to the category.
    #[serde(default)]
    pub label:       String,
    #[serde(default = "default_true")]
    pub enabled:     bool,
    pub kind:        RuleKind,
    pub resource:    Resource,
    #[serde(default)]
    pub hp_min:      u8,
    #[serde(default = "default_hp_max")]
    pub hp_max:      u8,
    #[serde(default = "default_threshold")]
    pub threshold:   u32,
    #[serde(default)]
    pub comparison:  Comparison,
    /// Allowed creature names; empty allows any.
    #[serde(default)]
    pub names:       Vec<String>,
    #[serde(default)]
    pub cooldown_ms: Option<u64>,
    /// Maximum distance to the target for targeted categories; defaults to
    /// the pattern radius.
    #[serde(default)]
    pub range:       Option<u32>,
}

impl AttackRule {
    pub fn new(kind: RuleKind, resource: Resource) -> Self {
        Self {
            label:       String::new(),
            enabled:     true,
            kind,
            resource,
            hp_min:      0,
            hp_max:      100,
            threshold:   1,
            comparison:  Comparison::AtLeast,
            names:       Vec::new(),
            cooldown_ms: None,
            range:       None,
        }
    }

    pub fn labelled(mut self, label: &str) -> Self {
        self.label = label.to_owned();
        self
    }

    pub fn at_least(mut self, n: u32) -> Self {
        self.comparison = Comparison::AtLeast;
        self.threshold  = n;
        self
    }

    pub fn exactly(mut self, n: u32) -> Self {
        self.comparison = Comparison::Exactly;
        self.threshold  = n;
        self
    }

    pub fn hp(mut self, min: u8, max: u8) -> Self {
        self.hp_min = min;
        self.hp_max = max;
        self
    }

    pub fn only(mut self, names: &[&str]) -> Self {
        self.names = names.iter().map(|n| (*n).to_owned()).collect();
        self
    }

    pub fn cooldown(mut self, ms: u64) -> Self {
        self.cooldown_ms = Some(ms);
        self
    }

    pub fn range(mut self, tiles: u32) -> Self {
        self.range = Some(tiles);
        self
    }

    pub fn display_name(&self) -> &str {
        if self.label.is_empty() { self.kind.name() } else { &self.label }
    }

    pub fn cooldown_key(&self) -> CooldownKey {
        self.resource.cooldown_key()
    }

    pub fn hp_in_window(&self, hp: u8) -> bool {
        hp >= self.hp_min && hp <= self.hp_max
    }

    pub fn filter(&self) -> HostileFilter<'_> {
        HostileFilter::new(self.hp_min, self.hp_max, &self.names)
    }

    pub fn validate(&self) -> Result<(), RuleError> {
        if self.hp_min > self.hp_max || self.hp_max > 100 {
            return Err(RuleError::InvalidHpWindow { min: self.hp_min, max: self.hp_max });
        }
        Ok(())
    }
}

/// Ordered rule list; earlier rules win.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: Vec<AttackRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<AttackRule>) -> Self {
        Self { rules }
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttackRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl From<Vec<AttackRule>> for RuleSet {
    fn from(rules: Vec<AttackRule>) -> Self {
        Self::new(rules)
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// The single action a satisfied rule resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    Cast(String),
    UseOnCreature { item: u16, creature: CreatureId },
    UseOnTile { item: u16, position: Position },
    Rotate(Direction),
    /// Satisfied, but waiting out the turn rate limit; consumes the tick.
    Hold,
}

impl Plan {
    /// Plans that spend the rule's resource.
    pub fn is_attack(&self) -> bool {
        matches!(self, Plan::Cast(_) | Plan::UseOnCreature { .. } | Plan::UseOnTile { .. })
    }
}

/// Everything a rule can look at during one tick.
pub struct EvalContext<'a, W: World + ?Sized> {
    pub world:      &'a W,
    pub player:     &'a LocalPlayer,
    pub target:     Option<&'a Creature>,
    pub settings:   &'a Settings,
    pub config:     &'a EngineConfig,
    pub cooldowns:  &'a CooldownRegistry,
    pub tick_cache: &'a mut TickCache,
    pub geometry:   &'a mut GeometryCache,
    pub rotation:   &'a mut RotationState,
    pub now_ms:     u64,
}

impl<'a, W: World + ?Sized> EvalContext<'a, W> {
    pub fn spatial(&self) -> Spatial<'a, W> {
        Spatial::new(self.world, self.player.id())
    }

    /// Safe variant of `key` when PvP-safe mode is on.
    pub fn safe_pattern(&self, key: PatternRef) -> Result<Option<&'static Pattern>, RuleError> {
        if !self.settings.pvp_safe {
            return Ok(None);
        }
        Ok(Some(patterns::resolve(key, true)?))
    }

    /// Spatial count through the per-tick cache.
    pub fn cached_count(
        &mut self,
        anchor:    Anchor,
        key:       PatternRef,
        direction: Option<Direction>,
        pattern:   &Pattern,
        filter:    &HostileFilter<'_>,
        safe:      Option<&Pattern>,
    ) -> u32 {
        let anchor_key = match anchor {
            Anchor::Position(p) => AnchorKey::Position(p),
            Anchor::Entity(id)  => AnchorKey::Entity(id),
        };
        let query = QueryKey {
            anchor:    anchor_key,
            pattern:   key,
            direction,
            hp_min:    filter.hp_min,
            hp_max:    filter.hp_max,
            safe:      safe.is_some(),
            names:     filter.names_key(),
        };
        let spatial = self.spatial();
        self.tick_cache
            .count_or_insert_with(query, || spatial.count_hostiles(anchor, pattern, filter, safe))
    }

    /// The resource-spending plan for `rule`, aimed at `target` or `tile`
    /// where the category needs one.
    pub fn attack_plan(&self, rule: &AttackRule, target: Option<&Creature>, tile: Option<Position>) -> Plan {
        match &rule.resource {
            Resource::Spell { words, .. } => Plan::Cast(words.clone()),
            Resource::Item { id } => match (tile, target) {
                (Some(position), _) => Plan::UseOnTile { item: *id, position },
                (None, Some(t))     => Plan::UseOnCreature { item: *id, creature: t.id },
                (None, None)        => Plan::UseOnCreature { item: *id, creature: self.player.id() },
            },
        }
    }
}

fn resource_available<W: World + ?Sized>(rule: &AttackRule, ctx: &EvalContext<'_, W>) -> bool {
    match &rule.resource {
        Resource::Spell { words, mana } => ctx.player.mana >= *mana && ctx.world.can_cast(words),
        Resource::Item { id }           => ctx.world.has_item(*id),
    }
}

fn blacklisted_player_near<W: World + ?Sized>(ctx: &EvalContext<'_, W>) -> bool {
    let spatial = ctx.spatial();
    ctx.world
        .spectators(ctx.player.position(), ctx.settings.blacklist_radius, false)
        .iter()
        .any(|c| spatial.is_foreign_player(c) && ctx.world.is_blacklisted(&c.name))
}

/// Resolves `rule` to the action it would take this tick, or `None` when it
/// is not satisfied. Checks run cheapest first and stop at the first failure.
pub fn plan<W: World + ?Sized>(
    rule: &AttackRule,
    ctx:  &mut EvalContext<'_, W>,
) -> Result<Option<Plan>, RuleError> {
    if !rule.enabled {
        return Ok(None);
    }
    rule.validate()?;

    if !resource_available(rule, ctx) {
        tracing::trace!("{}: resource unavailable", rule.display_name());
        return Ok(None);
    }

    if !ctx.cooldowns.ready(&rule.cooldown_key(), rule.cooldown_ms, ctx.now_ms) {
        tracing::trace!("{}: on cooldown", rule.display_name());
        return Ok(None);
    }

    let target = ctx.target;
    if rule.kind.requires_target() && target.is_none() {
        return Ok(None);
    }

    if ctx.settings.blacklist_safe && blacklisted_player_near(ctx) {
        tracing::trace!("{}: blacklisted player nearby", rule.display_name());
        return Ok(None);
    }

    if let Some(limit) = ctx.settings.kill_gate {
        if ctx.world.recent_kills() <= limit {
            return Ok(None);
        }
    }

    if ctx.settings.pvp_safe && matches!(rule.kind, RuleKind::AreaProjectile { .. }) {
        if let Some(t) = target {
            if t.is_player() && t.ranged && rule.hp_in_window(t.health_percent) {
                tracing::trace!("{}: ranged player target, area suppressed", rule.display_name());
                return Ok(None);
            }
        }
    }

    let target = match (rule.kind.requires_target(), target) {
        (true, Some(t)) => {
            if !rule.hp_in_window(t.health_percent) {
                return Ok(None);
            }
            Some(t)
        }
        (_, t) => t,
    };

    match rule.kind {
        RuleKind::TargetedSpell { pattern } | RuleKind::TargetedProjectile { pattern } => {
            // requires_target() guarantees a target here
            let Some(t) = target else { return Ok(None) };
            targeted::evaluate(rule, pattern, t, ctx)
        }
        RuleKind::AreaProjectile { pattern } => area::evaluate(rule, pattern, target, ctx),
        RuleKind::Buff { pattern } => buff::evaluate(rule, pattern, ctx),
        RuleKind::AbsoluteSpell { shape } => absolute::evaluate(rule, shape, ctx),
    }
}

/// True when `rule` is satisfied right now. Configuration errors read as
/// "not satisfied".
pub fn evaluate<W: World + ?Sized>(rule: &AttackRule, ctx: &mut EvalContext<'_, W>) -> bool {
    match plan(rule, ctx) {
        Ok(p) => p.is_some(),
        Err(e) => {
            tracing::warn!("{}: {}", rule.display_name(), e);
            false
        }
    }
}
