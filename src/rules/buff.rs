/// Self-cast rules, gated on how many hostiles surround the caster.
use super::{AttackRule, EvalContext, Plan};
use crate::{
    error::RuleError,
    patterns::{self, PatternRef},
    spatial::Anchor,
    world::World,
};

pub fn evaluate<W: World + ?Sized>(
    rule: &AttackRule,
    key:  PatternRef,
    ctx:  &mut EvalContext<'_, W>,
) -> Result<Option<Plan>, RuleError> {
    let pattern = patterns::resolve(key, false)?;
    let safe    = ctx.safe_pattern(key)?;
    let filter  = rule.filter();

    let me = ctx.player.id();
    let count = ctx.cached_count(Anchor::Entity(me), key, None, pattern, &filter, safe);
    if !rule.comparison.matches(count, rule.threshold) {
        return Ok(None);
    }
    Ok(Some(ctx.attack_plan(rule, None, None)))
}

#[cfg(test)]
mod tests {
    use super::super::{fixture::Bench, Resource, RuleKind};
    use super::*;
    use crate::{
        geometry::Position,
        patterns::PatternCategory,
        sim::{arena, monster},
        world::CreatureId,
    };

    fn at(dx: i32, dy: i32) -> Position {
        Position::new(100 + dx, 100 + dy, 7)
    }

    fn utamo(n: u32) -> AttackRule {
        AttackRule::new(
            RuleKind::Buff { pattern: PatternRef::new(PatternCategory::Radius, 2) },
            Resource::Spell { words: "utito tempo".into(), mana: 290 },
        )
        .at_least(n)
    }

    #[test]
    fn casts_when_surrounded() {
        let mut w = arena();
        w.mana = 300;
        w.learn("utito tempo");
        w.spawn(monster(10, "Orc", at(1, 1)));
        w.spawn(monster(11, "Orc", at(-3, 0)));
        assert_eq!(
            Bench::new().plan(&w, &utamo(2)).unwrap(),
            Some(Plan::Cast("utito tempo".into()))
        );
        assert!(!Bench::new().evaluate(&w, &utamo(3)));
    }

    #[test]
    fn needs_no_target() {
        let mut w = arena();
        w.mana = 300;
        w.learn("utito tempo");
        assert!(w.target.is_none());
        assert!(Bench::new().evaluate(&w, &utamo(0)));
    }

    #[test]
    fn item_buffs_are_used_on_self() {
        let mut w = arena();
        w.items.insert(7439);
        w.spawn(monster(10, "Orc", at(0, 1)));
        let rule = AttackRule::new(
            RuleKind::Buff { pattern: PatternRef::new(PatternCategory::Radius, 0) },
            Resource::Item { id: 7439 },
        );
        assert_eq!(
            Bench::new().plan(&w, &rule).unwrap(),
            Some(Plan::UseOnCreature { item: 7439, creature: CreatureId(1) })
        );
    }
}
