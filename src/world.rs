/// Environment seams: everything the engine reads from or does to the game.
///
/// `World` is a set of synchronous, side-effect-free queries answered by the
/// game client each tick. `Actions` is the small set of primitives the engine
/// is allowed to invoke. Neither is implemented here; `sim::SimWorld` is the
/// in-memory stand-in used by tests and the demo binary.
use crate::geometry::{Direction, Position};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Creatures and tiles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CreatureId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreatureKind {
    Player,
    Monster,
    /// Non-combat characters; never counted, never a veto.
    Npc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Creature {
    pub id:             CreatureId,
    pub name:           String,
    pub kind:           CreatureKind,
    pub position:       Position,
    pub facing:         Direction,
    /// 0–100
    pub health_percent: u8,
    /// Can fight at range (paladins, sorcerers, ranged monsters).
    #[serde(default)]
    pub ranged:         bool,
}

impl Creature {
    pub fn is_player(&self) -> bool {
        self.kind == CreatureKind::Player
    }
}

/// The creature being controlled, plus the resources only it exposes.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalPlayer {
    pub creature: Creature,
    pub mana:     u32,
}

impl LocalPlayer {
    pub fn id(&self) -> CreatureId {
        self.creature.id
    }

    pub fn position(&self) -> Position {
        self.creature.position
    }

    pub fn facing(&self) -> Direction {
        self.creature.facing
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub position:  Position,
    pub walkable:  bool,
    /// A thrown projectile can land here (in sight, not blocked).
    pub shootable: bool,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

pub trait World {
    /// Monotonic milliseconds.
    fn now_ms(&self) -> u64;

    fn local_player(&self) -> Option<LocalPlayer>;

    /// The live attack target, if any.
    fn target(&self) -> Option<Creature>;

    fn creature(&self, id: CreatureId) -> Option<Creature>;

    /// Creatures within Chebyshev `radius` of `center`. When `multi_floor` is
    /// false only creatures on `center.z` are returned.
    fn spectators(&self, center: Position, radius: u32, multi_floor: bool) -> Vec<Creature>;

    fn tile(&self, position: Position) -> Option<Tile>;

    fn has_item(&self, item_id: u16) -> bool;

    /// The spell is known and not on the client's own cooldown.
    fn can_cast(&self, words: &str) -> bool;

    fn is_party_member(&self, creature: &Creature) -> bool;

    fn is_blacklisted(&self, name: &str) -> bool;

    /// Kills credited to the local player in the client's recent-kill window.
    fn recent_kills(&self) -> u32;

    /// The client's global action cooldown indicator is lit.
    fn global_cooldown_active(&self) -> bool;

    /// Creatures the engine must never count as targets even though they look
    /// hostile (protocol-specific special cases).
    fn is_untargetable(&self, _creature: &Creature) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// Primitives
// ---------------------------------------------------------------------------

/// Fire-and-forget action primitives. Failures are not reported back.
pub trait Actions {
    fn cast(&mut self, words: &str);

    fn use_on_creature(&mut self, item_id: u16, target: CreatureId);

    /// Uses the item on the top usable thing of the tile at `position`.
    fn use_on_tile(&mut self, item_id: u16, position: Position);

    fn turn(&mut self, direction: Direction);
}
