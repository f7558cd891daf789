/// In-memory game world for the demo binary and the test suite.
///
/// `SimWorld` answers every `World` query from plain collections and can be
/// loaded from a TOML scenario. `Recorder` is the matching `Actions` sink: it
/// only records what the engine asked for; `SimWorld::apply` replays the
/// records that change the world (turning, time).
///
/// Scenario file shape:
///
///   mana = 400
///   target = 10
///   spells = ["exori gran"]
///
///   [player]
///   id = 1
///   name = "Knight"
///   kind = "player"
///   position = { x = 100, y = 100, z = 7 }
///   facing = "north"
///   health_percent = 100
///
///   [[creatures]]
///   id = 10
///   ...
use crate::{
    geometry::{Direction, Position},
    world::{Actions, Creature, CreatureId, CreatureKind, LocalPlayer, Tile, World},
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimWorld {
    #[serde(default)]
    pub now_ms:          u64,
    pub player:          Creature,
    #[serde(default)]
    pub mana:            u32,
    #[serde(default)]
    pub target:          Option<CreatureId>,
    #[serde(default)]
    pub creatures:       Vec<Creature>,
    /// Tiles nobody can stand on.
    #[serde(default)]
    pub blocked:         HashSet<Position>,
    /// Walkable tiles a projectile cannot reach.
    #[serde(default)]
    pub unshootable:     HashSet<Position>,
    #[serde(default)]
    pub items:           HashSet<u16>,
    /// Castable spell words, lower-case.
    #[serde(default)]
    pub spells:          HashSet<String>,
    #[serde(default)]
    pub party:           HashSet<CreatureId>,
    /// Blacklisted player names, lower-case.
    #[serde(default)]
    pub blacklist:       HashSet<String>,
    #[serde(default)]
    pub recent_kills:    u32,
    #[serde(default)]
    pub global_cooldown: bool,
    #[serde(default)]
    pub untargetable:    HashSet<CreatureId>,
    #[serde(skip)]
    spectator_calls:     Cell<u32>,
}

impl SimWorld {
    pub fn new(player: Creature) -> Self {
        Self {
            now_ms:          0,
            player,
            mana:            0,
            target:          None,
            creatures:       Vec::new(),
            blocked:         HashSet::new(),
            unshootable:     HashSet::new(),
            items:           HashSet::new(),
            spells:          HashSet::new(),
            party:           HashSet::new(),
            blacklist:       HashSet::new(),
            recent_kills:    0,
            global_cooldown: false,
            untargetable:    HashSet::new(),
            spectator_calls: Cell::new(0),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let mut world: SimWorld = toml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("Scenario parse error: {}", e))?;
        world.spells = world.spells.iter().map(|s| s.to_lowercase()).collect();
        world.blacklist = world.blacklist.iter().map(|s| s.to_lowercase()).collect();
        Ok(world)
    }

    /// Adds a creature and returns its id.
    pub fn spawn(&mut self, creature: Creature) -> CreatureId {
        let id = creature.id;
        self.creatures.push(creature);
        id
    }

    pub fn creature_mut(&mut self, id: CreatureId) -> Option<&mut Creature> {
        self.creatures.iter_mut().find(|c| c.id == id)
    }

    pub fn despawn(&mut self, id: CreatureId) {
        self.creatures.retain(|c| c.id != id);
        if self.target == Some(id) {
            self.target = None;
        }
    }

    pub fn learn(&mut self, words: &str) {
        self.spells.insert(words.to_lowercase());
    }

    pub fn advance(&mut self, ms: u64) {
        self.now_ms += ms;
    }

    /// Number of spectator queries answered so far.
    pub fn spectator_calls(&self) -> u32 {
        self.spectator_calls.get()
    }

    /// Applies the world-changing part of recorded actions.
    pub fn apply(&mut self, record: &ActionRecord) {
        if let ActionRecord::Turn(dir) = record {
            self.player.facing = *dir;
        }
    }

    fn all_creatures(&self) -> impl Iterator<Item = &Creature> {
        std::iter::once(&self.player).chain(self.creatures.iter())
    }
}

impl World for SimWorld {
    fn now_ms(&self) -> u64 {
        self.now_ms
    }

    fn local_player(&self) -> Option<LocalPlayer> {
        Some(LocalPlayer { creature: self.player.clone(), mana: self.mana })
    }

    fn target(&self) -> Option<Creature> {
        self.target.and_then(|id| self.creature(id))
    }

    fn creature(&self, id: CreatureId) -> Option<Creature> {
        self.all_creatures().find(|c| c.id == id).cloned()
    }

    fn spectators(&self, center: Position, radius: u32, multi_floor: bool) -> Vec<Creature> {
        self.spectator_calls.set(self.spectator_calls.get() + 1);
        self.all_creatures()
            .filter(|c| multi_floor || c.position.same_floor(&center))
            .filter(|c| c.position.chebyshev(&center) <= radius)
            .cloned()
            .collect()
    }

    fn tile(&self, position: Position) -> Option<Tile> {
        Some(Tile {
            position,
            walkable:  !self.blocked.contains(&position),
            shootable: !self.unshootable.contains(&position),
        })
    }

    fn has_item(&self, item_id: u16) -> bool {
        self.items.contains(&item_id)
    }

    fn can_cast(&self, words: &str) -> bool {
        self.spells.contains(&words.to_lowercase())
    }

    fn is_party_member(&self, creature: &Creature) -> bool {
        self.party.contains(&creature.id)
    }

    fn is_blacklisted(&self, name: &str) -> bool {
        self.blacklist.contains(&name.to_lowercase())
    }

    fn recent_kills(&self) -> u32 {
        self.recent_kills
    }

    fn global_cooldown_active(&self) -> bool {
        self.global_cooldown
    }

    fn is_untargetable(&self, creature: &Creature) -> bool {
        self.untargetable.contains(&creature.id)
    }
}

// ---------------------------------------------------------------------------
// Action recorder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionRecord {
    Cast(String),
    UseOnCreature(u16, CreatureId),
    UseOnTile(u16, Position),
    Turn(Direction),
}

#[derive(Debug, Default)]
pub struct Recorder {
    pub records: Vec<ActionRecord>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&mut self) -> Vec<ActionRecord> {
        std::mem::take(&mut self.records)
    }
}

impl Actions for Recorder {
    fn cast(&mut self, words: &str) {
        self.records.push(ActionRecord::Cast(words.to_owned()));
    }

    fn use_on_creature(&mut self, item_id: u16, target: CreatureId) {
        self.records.push(ActionRecord::UseOnCreature(item_id, target));
    }

    fn use_on_tile(&mut self, item_id: u16, position: Position) {
        self.records.push(ActionRecord::UseOnTile(item_id, position));
    }

    fn turn(&mut self, direction: Direction) {
        self.records.push(ActionRecord::Turn(direction));
    }
}

// ---------------------------------------------------------------------------
// Builders shared by the test suite
// ---------------------------------------------------------------------------

pub fn creature(id: u32, name: &str, kind: CreatureKind, position: Position) -> Creature {
    Creature {
        id:             CreatureId(id),
        name:           name.to_owned(),
        kind,
        position,
        facing:         Direction::South,
        health_percent: 100,
        ranged:         false,
    }
}

pub fn monster(id: u32, name: &str, position: Position) -> Creature {
    creature(id, name, CreatureKind::Monster, position)
}

/// A world with the local player (id 1) standing at `(100, 100, 7)` facing north.
pub fn arena() -> SimWorld {
    let mut player = creature(1, "Knight", CreatureKind::Player, Position::new(100, 100, 7));
    player.facing = Direction::North;
    SimWorld::new(player)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn spectators_respect_radius_and_floor() {
        let mut w = arena();
        w.spawn(monster(10, "Rat", Position::new(103, 100, 7)));
        w.spawn(monster(11, "Rat", Position::new(106, 100, 7)));
        w.spawn(monster(12, "Rat", Position::new(101, 100, 6)));

        let near = w.spectators(Position::new(100, 100, 7), 3, false);
        let ids: Vec<u32> = near.iter().map(|c| c.id.0).collect();
        assert_eq!(ids, vec![1, 10]);

        let all_floors = w.spectators(Position::new(100, 100, 7), 3, true);
        assert_eq!(all_floors.len(), 3);
        assert_eq!(w.spectator_calls(), 2);
    }

    #[test]
    fn target_vanishes_with_its_creature() {
        let mut w = arena();
        let id = w.spawn(monster(10, "Rat", Position::new(101, 100, 7)));
        w.target = Some(id);
        assert!(w.target().is_some());
        w.despawn(id);
        assert!(w.target().is_none());
    }

    #[test]
    fn recorder_turns_are_applied() {
        let mut w = arena();
        let mut r = Recorder::new();
        r.turn(Direction::West);
        for rec in r.drain() {
            w.apply(&rec);
        }
        assert_eq!(w.player.facing, Direction::West);
        assert!(r.records.is_empty());
    }

    #[test]
    fn loads_scenario_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scenario.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(
            br#"
mana = 300
target = 10
spells = ["Exori Gran"]
blacklist = ["Griefer"]

[player]
id = 1
name = "Knight"
kind = "player"
position = { x = 100, y = 100, z = 7 }
facing = "north"
health_percent = 90

[[creatures]]
id = 10
name = "Dragon"
kind = "monster"
position = { x = 102, y = 100, z = 7 }
facing = "west"
health_percent = 60
ranged = true
"#,
        )
        .unwrap();

        let w = SimWorld::load(&path).unwrap();
        assert_eq!(w.mana, 300);
        assert!(w.can_cast("exori gran"));
        assert!(w.is_blacklisted("GRIEFER"));
        let target = w.target().unwrap();
        assert_eq!(target.name, "Dragon");
        assert!(target.ranged);
    }

    #[test]
    fn unknown_creature_kind_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scenario.toml");
        std::fs::write(
            &path,
            r#"
[player]
id = 1
name = "Knight"
kind = "player"
position = { x = 100, y = 100, z = 7 }
facing = "north"
health_percent = 100

[[creatures]]
id = 10
name = "Fire Elemental"
kind = "summon"
position = { x = 101, y = 100, z = 7 }
facing = "west"
health_percent = 100
"#,
        )
        .unwrap();
        assert!(SimWorld::load(&path).is_err());
    }
}
