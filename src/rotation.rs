/// Rotate-then-attack state machine for four-direction sweep rules.
///
///   Idle ──evaluate──▶ Evaluating ──best ≥ threshold, no player veto──▶ Committed(dir)
///
/// While committed and facing elsewhere the machine asks for a turn, at most
/// `max_attempts` times per `window_ms`, never faster than `cooldown_ms`.
/// Once the attempts are spent it attacks in the current facing, so a turn
/// that never takes effect cannot stall the engine.
use crate::geometry::Direction;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationConfig {
    /// Minimum time between two turn requests.
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms:  u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u8,
    #[serde(default = "default_window_ms")]
    pub window_ms:    u64,
    /// Foreign players this close veto a sweep when PvP-safe mode is on.
    #[serde(default = "default_player_radius")]
    pub player_radius: u32,
}

fn default_cooldown_ms() -> u64 { 600 }
fn default_max_attempts() -> u8 { 3 }
fn default_window_ms() -> u64 { 3_000 }
fn default_player_radius() -> u32 { 7 }

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            cooldown_ms:   default_cooldown_ms(),
            max_attempts:  default_max_attempts(),
            window_ms:     default_window_ms(),
            player_radius: default_player_radius(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationPhase {
    Idle,
    Evaluating,
    Committed(Direction),
}

/// What the sweep rule should do this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepDecision {
    /// Not satisfied.
    Reject,
    /// Satisfied; attack in the current facing.
    Attack,
    /// Satisfied; turn towards the committed direction instead of attacking.
    Rotate(Direction),
    /// Satisfied, but the last turn was too recent. Do nothing this tick.
    Defer(Direction),
}

impl SweepDecision {
    pub fn is_satisfied(self) -> bool {
        self != SweepDecision::Reject
    }
}

#[derive(Debug, Clone)]
pub struct RotationState {
    phase:            RotationPhase,
    best:             Option<Direction>,
    best_score:       u32,
    attempts:         u8,
    window_start_ms:  u64,
    last_rotation_ms: Option<u64>,
}

impl Default for RotationState {
    fn default() -> Self {
        Self::new()
    }
}

impl RotationState {
    pub fn new() -> Self {
        Self {
            phase:            RotationPhase::Idle,
            best:             None,
            best_score:       0,
            attempts:         0,
            window_start_ms:  0,
            last_rotation_ms: None,
        }
    }

    pub fn phase(&self) -> RotationPhase {
        self.phase
    }

    pub fn best_direction(&self) -> Option<Direction> {
        self.best
    }

    pub fn best_score(&self) -> u32 {
        self.best_score
    }

    pub fn attempts(&self) -> u8 {
        self.attempts
    }

    /// Picks the best direction from per-direction counts (indexed by
    /// `Direction::index`) and decides between attacking and turning.
    pub fn decide(
        &mut self,
        counts:        [u32; 4],
        meets:         impl Fn(u32) -> bool,
        player_nearby: bool,
        facing:        Direction,
        now_ms:        u64,
        cfg:           &RotationConfig,
    ) -> SweepDecision {
        let (best, score) = Direction::ALL
            .iter()
            .map(|&d| (d, counts[d.index()]))
            .fold((Direction::North, counts[0]), |acc, cur| if cur.1 > acc.1 { cur } else { acc });

        if self.best != Some(best) {
            self.best            = Some(best);
            self.attempts        = 0;
            self.window_start_ms = now_ms;
        }
        self.best_score = score;
        self.phase      = RotationPhase::Evaluating;

        if !meets(score) {
            return SweepDecision::Reject;
        }
        if player_nearby {
            tracing::debug!("Sweep {:?} ({} hits) vetoed: player nearby", best, score);
            return SweepDecision::Reject;
        }

        self.phase = RotationPhase::Committed(best);
        if facing == best {
            return SweepDecision::Attack;
        }

        if now_ms.saturating_sub(self.window_start_ms) >= cfg.window_ms {
            self.attempts        = 0;
            self.window_start_ms = now_ms;
        }
        if self.attempts >= cfg.max_attempts {
            tracing::debug!(
                "Sweep: {} turns towards {:?} spent, attacking facing {:?}",
                self.attempts, best, facing
            );
            return SweepDecision::Attack;
        }
        if let Some(last) = self.last_rotation_ms {
            if now_ms.saturating_sub(last) < cfg.cooldown_ms {
                return SweepDecision::Defer(best);
            }
        }

        self.attempts        += 1;
        self.last_rotation_ms = Some(now_ms);
        SweepDecision::Rotate(best)
    }

    /// Called after a sweep attack fires. An attack in the committed
    /// direction clears the attempt counter; a fallback attack keeps it until
    /// the window runs out so turns stay bounded per window.
    pub fn on_attack(&mut self, facing: Direction) {
        if self.best == Some(facing) {
            self.attempts = 0;
        }
        self.phase = RotationPhase::Idle;
    }
}
