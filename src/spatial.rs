/// Spatial queries: how many hostiles a pattern covers, and where to throw.
///
/// Both queries are read-only against `World`. Anything that cannot be
/// resolved (a vanished anchor creature, a missing tile) reads as "nothing
/// there" rather than an error.
use crate::{
    cache::TtlCache,
    geometry::Position,
    patterns::Pattern,
    world::{Creature, CreatureId, CreatureKind, World},
};
use serde::Serialize;
use std::borrow::Cow;
use std::sync::Arc;

/// Hard cap on the best-tile scan radius.
pub const MAX_TILE_SCAN_RADIUS: u32 = 4;

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Ground-cast shapes: evaluated at a fixed position, never rotated.
    Position(Position),
    /// Follows the creature's live position; directional shapes are rotated
    /// to its facing.
    Entity(CreatureId),
}

/// Which creatures count towards a pattern.
#[derive(Debug, Clone, Copy)]
pub struct HostileFilter<'a> {
    pub hp_min: u8,
    pub hp_max: u8,
    /// Allowed names, matched case-insensitively. Empty allows any name.
    pub names:  &'a [String],
}

impl<'a> HostileFilter<'a> {
    pub fn new(hp_min: u8, hp_max: u8, names: &'a [String]) -> Self {
        Self { hp_min, hp_max, names }
    }

    pub fn any() -> HostileFilter<'static> {
        HostileFilter { hp_min: 0, hp_max: 100, names: &[] }
    }

    pub fn accepts(&self, creature: &Creature) -> bool {
        let hp = creature.health_percent;
        if hp < self.hp_min || hp > self.hp_max {
            return false;
        }
        self.names.is_empty()
            || self.names.iter().any(|n| n.eq_ignore_ascii_case(&creature.name))
    }

    /// The allow-list lower-cased, sorted and deduplicated, so filters that
    /// accept the same names produce equal cache keys.
    pub fn names_key(&self) -> Vec<String> {
        let mut names: Vec<String> = self.names.iter().map(|n| n.to_lowercase()).collect();
        names.sort();
        names.dedup();
        names
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BestTile {
    pub count:    u32,
    pub position: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryKey {
    pub center: Position,
    pub radius: u32,
}

/// Cross-tick cache of walkable, projectile-reachable tiles around a point.
pub type GeometryCache = TtlCache<GeometryKey, Arc<[Position]>>;

// ---------------------------------------------------------------------------
// Spatial view
// ---------------------------------------------------------------------------

/// World queries bound to the local player, whose id is excluded from
/// every count.
pub struct Spatial<'w, W: World + ?Sized> {
    world: &'w W,
    local: CreatureId,
}

impl<'w, W: World + ?Sized> Spatial<'w, W> {
    pub fn new(world: &'w W, local: CreatureId) -> Self {
        Self { world, local }
    }

    /// Creatures that can be attacked: not us, not the party, not a
    /// non-combat character, not engine-ignored.
    pub fn is_hostile(&self, creature: &Creature) -> bool {
        creature.id != self.local
            && creature.kind != CreatureKind::Npc
            && !self.world.is_party_member(creature)
            && !self.world.is_untargetable(creature)
    }

    /// Players whose presence vetoes an attack.
    pub fn is_foreign_player(&self, creature: &Creature) -> bool {
        creature.is_player() && creature.id != self.local && !self.world.is_party_member(creature)
    }

    fn resolve<'p>(&self, anchor: Anchor, pattern: &'p Pattern) -> Option<(Position, Cow<'p, Pattern>)> {
        match anchor {
            Anchor::Position(pos) => Some((pos, Cow::Borrowed(pattern))),
            Anchor::Entity(id) => {
                let creature = self.world.creature(id)?;
                let shape = if pattern.is_directional() {
                    Cow::Owned(pattern.rotated(creature.facing))
                } else {
                    Cow::Borrowed(pattern)
                };
                Some((creature.position, shape))
            }
        }
    }

    /// Same-floor creatures standing on a non-empty cell of `pattern`
    /// anchored at `origin`.
    fn covered(&self, origin: Position, pattern: &Pattern) -> Vec<Creature> {
        self.world
            .spectators(origin, pattern.radius(), false)
            .into_iter()
            .filter(|c| c.position.same_floor(&origin))
            .filter(|c| {
                let (dx, dy) = origin.delta_to(&c.position);
                pattern.covers(dx, dy)
            })
            .collect()
    }

    /// Counts hostiles covered by `pattern` at `anchor`.
    ///
    /// When `safe` is given and any foreign player stands inside it, the
    /// count is 0 no matter what the primary pattern covers.
    pub fn count_hostiles(
        &self,
        anchor:  Anchor,
        pattern: &Pattern,
        filter:  &HostileFilter<'_>,
        safe:    Option<&Pattern>,
    ) -> u32 {
        let Some((origin, shape)) = self.resolve(anchor, pattern) else {
            return 0;
        };

        if let Some(safe) = safe {
            let safe_shape = if safe.is_directional() {
                match anchor {
                    Anchor::Entity(_) => self.resolve(anchor, safe).map(|(_, s)| s),
                    Anchor::Position(_) => Some(Cow::Borrowed(safe)),
                }
            } else {
                Some(Cow::Borrowed(safe))
            };
            let Some(safe_shape) = safe_shape else {
                return 0;
            };
            if self.covered(origin, &safe_shape).iter().any(|c| self.is_foreign_player(c)) {
                return 0;
            }
        }

        self.covered(origin, &shape)
            .iter()
            .filter(|c| self.is_hostile(c) && filter.accepts(c))
            .count() as u32
    }

    /// True when any foreign player is within Chebyshev `radius` of `center`.
    pub fn foreign_player_near(&self, center: Position, radius: u32) -> bool {
        self.world
            .spectators(center, radius, false)
            .iter()
            .any(|c| self.is_foreign_player(c))
    }

    /// Walkable, projectile-reachable tiles within `radius` of `center`,
    /// row-major from the north-west corner.
    pub fn candidate_tiles(
        &self,
        geometry: &mut GeometryCache,
        center:   Position,
        radius:   u32,
        now_ms:   u64,
    ) -> Arc<[Position]> {
        let radius = radius.min(MAX_TILE_SCAN_RADIUS);
        let key = GeometryKey { center, radius };
        if let Some(tiles) = geometry.get(&key, now_ms) {
            return tiles;
        }

        let r = radius as i32;
        let tiles: Arc<[Position]> = (-r..=r)
            .flat_map(|dy| (-r..=r).map(move |dx| center.offset(dx, dy)))
            .filter(|pos| {
                self.world
                    .tile(*pos)
                    .map(|t| t.walkable && t.shootable)
                    .unwrap_or(false)
            })
            .collect();
        geometry.insert(key, Arc::clone(&tiles), now_ms);
        tiles
    }

    /// Scans the candidate tiles around `center` and returns the one whose
    /// pattern covers the most hostiles. Ties keep the first tile in scan
    /// order. Returns `None` when nothing is covered anywhere.
    #[allow(clippy::too_many_arguments)]
    pub fn best_tile(
        &self,
        geometry: &mut GeometryCache,
        center:   Position,
        radius:   u32,
        now_ms:   u64,
        pattern:  &Pattern,
        filter:   &HostileFilter<'_>,
        safe:     Option<&Pattern>,
    ) -> Option<BestTile> {
        let tiles = self.candidate_tiles(geometry, center, radius, now_ms);

        let mut best: Option<BestTile> = None;
        for &position in tiles.iter() {
            let count = self.count_hostiles(Anchor::Position(position), pattern, filter, safe);
            if count > best.map(|b| b.count).unwrap_or(0) {
                best = Some(BestTile { count, position });
            }
        }
        best
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        geometry::Direction,
        patterns::{self, PatternCategory},
        sim::{arena, creature, monster, SimWorld},
    };

    fn at(dx: i32, dy: i32) -> Position {
        Position::new(100 + dx, 100 + dy, 7)
    }

    fn radius(r: u8) -> &'static Pattern {
        patterns::get(PatternCategory::Radius, r - 1, false).unwrap()
    }

    fn spatial(w: &SimWorld) -> Spatial<'_, SimWorld> {
        Spatial::new(w, w.player.id)
    }

    #[test]
    fn counts_only_hostiles_in_the_pattern() {
        let mut w = arena();
        w.spawn(monster(10, "Rat", at(1, 1)));
        w.spawn(monster(11, "Rat", at(-2, 0)));
        w.spawn(monster(12, "Rat", at(3, 0)));                      // outside radius 2
        w.spawn(creature(13, "Merchant", CreatureKind::Npc, at(1, 0)));
        let friend = w.spawn(creature(14, "Druid", CreatureKind::Player, at(0, 1)));
        w.party.insert(friend);
        let mut below = monster(15, "Rat", at(0, 1));
        below.position.z = 8;
        w.spawn(below);

        let s = spatial(&w);
        let n = s.count_hostiles(Anchor::Position(at(0, 0)), radius(2), &HostileFilter::any(), None);
        assert_eq!(n, 2);
    }

    #[test]
    fn hp_window_is_inclusive_and_narrowing_never_increases() {
        let mut w = arena();
        for (i, hp) in [10u8, 40, 60, 100].iter().enumerate() {
            let mut m = monster(10 + i as u32, "Orc", at(i as i32 - 1, -1));
            m.health_percent = *hp;
            w.spawn(m);
        }
        let s = spatial(&w);
        let anchor = Anchor::Position(at(0, 0));
        let pattern = radius(3);

        let windows = [(0u8, 100u8), (10, 100), (10, 60), (40, 60), (41, 59)];
        let counts: Vec<u32> = windows
            .iter()
            .map(|&(lo, hi)| s.count_hostiles(anchor, pattern, &HostileFilter::new(lo, hi, &[]), None))
            .collect();
        assert_eq!(counts, vec![4, 4, 3, 2, 0]);
        assert!(counts.windows(2).all(|p| p[1] <= p[0]));
    }

    #[test]
    fn name_filter_is_case_insensitive_exact() {
        let mut w = arena();
        w.spawn(monster(10, "Dragon", at(1, 0)));
        w.spawn(monster(11, "Dragon Lord", at(-1, 0)));
        w.spawn(monster(12, "dragon", at(0, 1)));
        let s = spatial(&w);
        let names = vec!["DRAGON".to_owned()];
        let n = s.count_hostiles(
            Anchor::Position(at(0, 0)),
            radius(1),
            &HostileFilter::new(0, 100, &names),
            None,
        );
        assert_eq!(n, 2);
    }

    #[test]
    fn untargetable_creatures_are_never_counted() {
        let mut w = arena();
        w.spawn(monster(10, "Rat", at(1, 0)));
        let ignored = w.spawn(monster(11, "Rat", at(0, 1)));
        let anchor = Anchor::Position(at(0, 0));
        assert_eq!(spatial(&w).count_hostiles(anchor, radius(1), &HostileFilter::any(), None), 2);

        w.untargetable.insert(ignored);
        assert_eq!(spatial(&w).count_hostiles(anchor, radius(1), &HostileFilter::any(), None), 1);
    }

    #[test]
    fn equivalent_name_lists_share_a_key() {
        let a = vec!["Dragon".to_owned(), "Orc".to_owned()];
        let b = vec!["orc".to_owned(), "DRAGON".to_owned(), "Orc".to_owned()];
        let c = vec!["Dragon Lord".to_owned()];
        assert_eq!(HostileFilter::new(0, 100, &a).names_key(), HostileFilter::new(0, 100, &b).names_key());
        assert_ne!(HostileFilter::new(0, 100, &a).names_key(), HostileFilter::new(0, 100, &c).names_key());
        assert!(HostileFilter::any().names_key().is_empty());
    }

    #[test]
    fn safe_pattern_vetoes_the_whole_count() {
        let mut w = arena();
        w.spawn(monster(10, "Rat", at(1, 0)));
        w.spawn(monster(11, "Rat", at(0, 1)));
        // outside radius 1, inside its safe ring
        w.spawn(creature(20, "Stranger", CreatureKind::Player, at(3, 0)));

        let s = spatial(&w);
        let normal = patterns::get(PatternCategory::Radius, 0, false).unwrap();
        let safe = patterns::get(PatternCategory::Radius, 0, true).unwrap();
        let anchor = Anchor::Position(at(0, 0));
        assert_eq!(s.count_hostiles(anchor, normal, &HostileFilter::any(), None), 2);
        assert_eq!(s.count_hostiles(anchor, normal, &HostileFilter::any(), Some(safe)), 0);
    }

    #[test]
    fn party_players_do_not_veto() {
        let mut w = arena();
        w.spawn(monster(10, "Rat", at(1, 0)));
        let friend = w.spawn(creature(20, "Druid", CreatureKind::Player, at(2, 0)));
        w.party.insert(friend);
        let s = spatial(&w);
        let normal = patterns::get(PatternCategory::Radius, 0, false).unwrap();
        let safe = patterns::get(PatternCategory::Radius, 0, true).unwrap();
        assert_eq!(
            s.count_hostiles(Anchor::Position(at(0, 0)), normal, &HostileFilter::any(), Some(safe)),
            1
        );
    }

    #[test]
    fn vanished_anchor_counts_zero() {
        let mut w = arena();
        w.spawn(monster(10, "Rat", at(1, 0)));
        let s = spatial(&w);
        let n = s.count_hostiles(Anchor::Entity(CreatureId(999)), radius(3), &HostileFilter::any(), None);
        assert_eq!(n, 0);
    }

    #[test]
    fn entity_anchor_rotates_directional_shapes() {
        let mut w = arena();
        w.spawn(monster(10, "Rat", at(0, -3)));
        w.spawn(monster(11, "Rat", at(3, 0)));
        w.spawn(monster(12, "Rat", at(4, 1)));
        let beam = patterns::get(PatternCategory::Wave, 0, false).unwrap();
        let me = Anchor::Entity(w.player.id);

        assert_eq!(spatial(&w).count_hostiles(me, beam, &HostileFilter::any(), None), 1);
        w.player.facing = Direction::East;
        assert_eq!(spatial(&w).count_hostiles(me, beam, &HostileFilter::any(), None), 1);
        w.player.facing = Direction::South;
        assert_eq!(spatial(&w).count_hostiles(me, beam, &HostileFilter::any(), None), 0);
    }

    #[test]
    fn best_tile_maximises_and_breaks_ties_in_scan_order() {
        let mut w = arena();
        // cluster of three to the east, pair to the north-west
        w.spawn(monster(10, "Rat", at(3, 0)));
        w.spawn(monster(11, "Rat", at(4, 0)));
        w.spawn(monster(12, "Rat", at(4, 1)));
        w.spawn(monster(13, "Rat", at(-3, -3)));
        w.spawn(monster(14, "Rat", at(-4, -3)));

        let s = spatial(&w);
        let mut geo = GeometryCache::new(250, 16);
        let small = patterns::get(PatternCategory::Blob, 0, false).unwrap();
        let best = s
            .best_tile(&mut geo, at(0, 0), 4, 0, small, &HostileFilter::any(), None)
            .unwrap();
        assert_eq!(best.count, 3);
        // (3, 0) and (4, 0) both cover all three; (3, 0) is scanned first
        assert_eq!(best.position, at(3, 0));

        let tiles = s.candidate_tiles(&mut geo, at(0, 0), 4, 0);
        for &t in tiles.iter() {
            let n = s.count_hostiles(Anchor::Position(t), small, &HostileFilter::any(), None);
            assert!(n <= best.count);
        }
    }

    #[test]
    fn best_tile_skips_blocked_and_unshootable_tiles() {
        let mut w = arena();
        w.spawn(monster(10, "Rat", at(4, 4)));
        w.spawn(monster(11, "Rat", at(4, 3)));
        // every in-range tile that could cover both
        for t in [at(3, 3), at(4, 3), at(3, 4), at(4, 4)] {
            w.blocked.insert(t);
        }
        let s = spatial(&w);
        let mut geo = GeometryCache::new(250, 16);
        let small = patterns::get(PatternCategory::Blob, 0, false).unwrap();
        let best = s.best_tile(&mut geo, at(0, 0), 4, 0, small, &HostileFilter::any(), None);
        assert_eq!(best.map(|b| b.count), Some(1));

        // the remaining tiles that reach the northern rat
        w.unshootable.extend([at(3, 2), at(4, 2)]);
        let s = spatial(&w);
        let mut geo = GeometryCache::new(250, 16);
        let best = s.best_tile(&mut geo, at(0, 0), 4, 0, small, &HostileFilter::any(), None);
        assert!(best.is_none());
    }

    #[test]
    fn best_tile_is_none_when_nothing_is_covered() {
        let mut w = arena();
        w.spawn(monster(10, "Rat", at(9, 9)));
        let s = spatial(&w);
        let mut geo = GeometryCache::new(250, 16);
        let small = patterns::get(PatternCategory::Blob, 0, false).unwrap();
        assert!(s.best_tile(&mut geo, at(0, 0), 4, 0, small, &HostileFilter::any(), None).is_none());
    }

    #[test]
    fn scan_radius_is_capped() {
        let w = arena();
        let s = spatial(&w);
        let mut geo = GeometryCache::new(250, 16);
        let tiles = s.candidate_tiles(&mut geo, at(0, 0), 10, 0);
        assert_eq!(tiles.len(), 81);
        assert_eq!(tiles[0], at(-4, -4));
        assert_eq!(geo.len(), 1);
    }

    #[test]
    fn candidate_tiles_come_from_the_ttl_tier_while_fresh() {
        let mut w = arena();
        let mut geo = GeometryCache::new(250, 16);
        let first = spatial(&w).candidate_tiles(&mut geo, at(0, 0), 2, 1_000);
        assert_eq!(first.len(), 25);

        w.blocked.insert(at(1, 1));
        let cached = spatial(&w).candidate_tiles(&mut geo, at(0, 0), 2, 1_200);
        assert_eq!(cached.len(), 25);
        let refreshed = spatial(&w).candidate_tiles(&mut geo, at(0, 0), 2, 1_250);
        assert_eq!(refreshed.len(), 24);
    }
}
