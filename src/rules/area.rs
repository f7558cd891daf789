/// Thrown area projectiles (area runes).
///
/// The landing tile is picked by the best-tile scan around the caster; the
/// scan result is shared through the per-tick cache by every rule with the
/// same shape, HP window and name filter.
use super::{AttackRule, EvalContext, Plan};
use crate::{
    cache::{AnchorKey, QueryKey},
    error::RuleError,
    patterns::{self, PatternRef},
    world::{Creature, World},
};

pub fn evaluate<W: World + ?Sized>(
    rule:   &AttackRule,
    key:    PatternRef,
    target: Option<&Creature>,
    ctx:    &mut EvalContext<'_, W>,
) -> Result<Option<Plan>, RuleError> {
    let pattern = patterns::resolve(key, false)?;
    let safe    = ctx.safe_pattern(key)?;
    let filter  = rule.filter();
    let center  = ctx.player.position();

    let query = QueryKey {
        anchor:    AnchorKey::BestTile(center),
        pattern:   key,
        direction: None,
        hp_min:    rule.hp_min,
        hp_max:    rule.hp_max,
        safe:      safe.is_some(),
        names:     filter.names_key(),
    };

    let spatial  = ctx.spatial();
    let radius   = ctx.config.tile_scan_radius;
    let now_ms   = ctx.now_ms;
    let geometry = &mut *ctx.geometry;
    let best = ctx.tick_cache.tile_or_insert_with(query, || {
        spatial.best_tile(geometry, center, radius, now_ms, pattern, &filter, safe)
    });

    let Some(best) = best else {
        return Ok(None);
    };
    if !rule.comparison.matches(best.count, rule.threshold) {
        return Ok(None);
    }

    tracing::trace!("{}: best tile {} covers {}", rule.display_name(), best.position, best.count);
    Ok(Some(ctx.attack_plan(rule, target, Some(best.position))))
}

#[cfg(test)]
mod tests {
    use super::super::{fixture::Bench, Resource, RuleKind};
    use super::*;
    use crate::{
        geometry::Position,
        patterns::PatternCategory,
        sim::{arena, creature, monster, SimWorld},
        world::{CreatureId, CreatureKind},
    };

    const GFB: u16 = 3191;

    fn at(dx: i32, dy: i32) -> Position {
        Position::new(100 + dx, 100 + dy, 7)
    }

    fn gfb() -> AttackRule {
        AttackRule::new(
            RuleKind::AreaProjectile { pattern: PatternRef::new(PatternCategory::Blob, 0) },
            Resource::Item { id: GFB },
        )
    }

    fn world() -> SimWorld {
        let mut w = arena();
        w.items.insert(GFB);
        w.target = Some(w.spawn(monster(10, "Orc", at(3, 0))));
        w
    }

    #[test]
    fn lands_on_the_best_tile() {
        let mut w = world();
        w.spawn(monster(11, "Orc", at(4, 0)));
        w.spawn(monster(12, "Orc", at(4, 1)));
        let plan = Bench::new().plan(&w, &gfb().at_least(3)).unwrap();
        assert_eq!(plan, Some(Plan::UseOnTile { item: GFB, position: at(3, 0) }));
    }

    #[test]
    fn exact_threshold_compares_the_best_count() {
        let mut w = world();
        w.spawn(monster(11, "Orc", at(4, 0)));
        assert!(!Bench::new().evaluate(&w, &gfb().exactly(3)));
        assert!(Bench::new().evaluate(&w, &gfb().exactly(2)));
    }

    #[test]
    fn shares_the_scan_with_later_rules_in_the_tick() {
        let mut w = world();
        w.spawn(monster(11, "Orc", at(4, 0)));
        let mut bench = Bench::new();
        assert!(!bench.evaluate(&w, &gfb().at_least(3)));
        let calls = w.spectator_calls();
        assert!(bench.evaluate(&w, &gfb().at_least(2)));
        assert_eq!(w.spectator_calls(), calls, "second rule should hit the tick cache");
        assert_eq!(bench.tick_cache.hits(), 1);
    }

    #[test]
    fn ranged_player_target_suppresses_area_in_pvp_safe_mode() {
        let mut w = world();
        let mut enemy = creature(20, "Sorcerer", CreatureKind::Player, at(2, 2));
        enemy.ranged = true;
        enemy.health_percent = 70;
        w.target = Some(w.spawn(enemy));

        let mut bench = Bench::new();
        assert!(bench.evaluate(&w, &gfb()));
        bench.settings.pvp_safe = true;
        assert!(!bench.evaluate(&w, &gfb()));

        // melee players are only subject to the safe-pattern veto
        w.creature_mut(CreatureId(20)).unwrap().ranged = false;
        let mut bench = Bench::new();
        bench.settings.pvp_safe = true;
        assert!(!bench.evaluate(&w, &gfb()), "target itself is a stranger inside the safe zone");
    }

    #[test]
    fn nothing_in_reach_fails() {
        let mut w = world();
        w.creature_mut(CreatureId(10)).unwrap().position = at(9, 0);
        assert!(!Bench::new().evaluate(&w, &gfb()));
    }
}
