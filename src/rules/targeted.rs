/// Targeted spells and targeted projectiles.
///
/// The pattern is anchored on the live target, so it follows the target as
/// it moves. The target must also be within the rule's range of the caster,
/// which defaults to the pattern radius.
use super::{AttackRule, EvalContext, Plan};
use crate::{
    error::RuleError,
    patterns::{self, PatternRef},
    spatial::Anchor,
    world::{Creature, World},
};

pub fn evaluate<W: World + ?Sized>(
    rule:    &AttackRule,
    key:     PatternRef,
    target:  &Creature,
    ctx:     &mut EvalContext<'_, W>,
) -> Result<Option<Plan>, RuleError> {
    let pattern = patterns::resolve(key, false)?;
    let safe    = ctx.safe_pattern(key)?;

    let me = ctx.player.position();
    let range = rule.range.unwrap_or_else(|| pattern.radius());
    if !me.same_floor(&target.position) || me.chebyshev(&target.position) > range {
        return Ok(None);
    }

    let filter = rule.filter();
    let count = ctx.cached_count(Anchor::Entity(target.id), key, None, pattern, &filter, safe);
    if !rule.comparison.matches(count, rule.threshold) {
        return Ok(None);
    }

    Ok(Some(ctx.attack_plan(rule, Some(target), None)))
}
