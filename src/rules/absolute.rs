/// Ground-cast spells: fixed shapes around or in front of the caster, and
/// four-direction sweeps.
///
/// Symmetric shapes are anchored on the caster's position. Shapes that need
/// a true facing (waves, beams) are anchored on the caster itself so they
/// are rotated to where it looks. Sweeps score all four directions and hand
/// the choice to the rotation state machine.
use super::{AttackRule, EvalContext, Plan, Shape};
use crate::{
    error::RuleError,
    geometry::{Direction, Position},
    patterns::{self, Pattern, PatternCategory, PatternRef},
    rotation::SweepDecision,
    spatial::{Anchor, HostileFilter},
    world::World,
};

pub fn evaluate<W: World + ?Sized>(
    rule:  &AttackRule,
    shape: Shape,
    ctx:   &mut EvalContext<'_, W>,
) -> Result<Option<Plan>, RuleError> {
    match shape {
        Shape::Fixed { pattern } => fixed(rule, pattern, ctx),
        Shape::Sweep { index } => sweep(rule, PatternRef::new(PatternCategory::Sweep, index), ctx),
    }
}

fn fixed<W: World + ?Sized>(
    rule: &AttackRule,
    key:  PatternRef,
    ctx:  &mut EvalContext<'_, W>,
) -> Result<Option<Plan>, RuleError> {
    let pattern = patterns::resolve(key, false)?;
    let safe    = ctx.safe_pattern(key)?;
    let filter  = rule.filter();

    let anchor = if pattern.is_directional() {
        Anchor::Entity(ctx.player.id())
    } else {
        Anchor::Position(ctx.player.position())
    };
    let count = ctx.cached_count(anchor, key, None, pattern, &filter, safe);
    if !rule.comparison.matches(count, rule.threshold) {
        return Ok(None);
    }
    Ok(Some(ctx.attack_plan(rule, None, None)))
}

fn sweep<W: World + ?Sized>(
    rule: &AttackRule,
    key:  PatternRef,
    ctx:  &mut EvalContext<'_, W>,
) -> Result<Option<Plan>, RuleError> {
    let pattern = patterns::resolve(key, false)?;
    let filter  = rule.filter();
    let origin  = ctx.player.position();
    let facing  = ctx.player.facing();

    if !ctx.settings.rotation_enabled {
        let count = directional_count(ctx, key, pattern, &filter, origin, facing);
        let vetoed = ctx.settings.pvp_safe
            && ctx.spatial().foreign_player_near(origin, ctx.config.rotation.player_radius);
        if vetoed || !rule.comparison.matches(count, rule.threshold) {
            return Ok(None);
        }
        return Ok(Some(ctx.attack_plan(rule, None, None)));
    }

    let mut counts = [0u32; 4];
    for dir in Direction::ALL {
        counts[dir.index()] = directional_count(ctx, key, pattern, &filter, origin, dir);
    }
    let player_nearby = ctx.settings.pvp_safe
        && ctx.spatial().foreign_player_near(origin, ctx.config.rotation.player_radius);

    let decision = ctx.rotation.decide(
        counts,
        |n| rule.comparison.matches(n, rule.threshold),
        player_nearby,
        facing,
        ctx.now_ms,
        &ctx.config.rotation,
    );

    Ok(match decision {
        SweepDecision::Reject    => None,
        SweepDecision::Attack    => Some(ctx.attack_plan(rule, None, None)),
        SweepDecision::Rotate(d) => Some(Plan::Rotate(d)),
        SweepDecision::Defer(_)  => Some(Plan::Hold),
    })
}

/// Hostiles the sweep would hit when swung towards `dir`. Sweeps never use
/// the safe variant; the player veto is radius based instead.
fn directional_count<W: World + ?Sized>(
    ctx:     &mut EvalContext<'_, W>,
    key:     PatternRef,
    pattern: &Pattern,
    filter:  &HostileFilter<'_>,
    origin:  Position,
    dir:     Direction,
) -> u32 {
    let masked = pattern.select_direction(dir);
    ctx.cached_count(Anchor::Position(origin), key, Some(dir), &masked, filter, None)
}
