//! Action results shared by the human UI and the AI
//!
//! Every public action returns `Result<ActionOutcome, ActionError>`. An error
//! always means nothing changed.

use std::ops::Range;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::battle::pathfinding::PathFailure;

/// Which action was attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Move,
    AttackUnit,
    AttackTile,
    Overwatch,
    Resupply,
    EndTurn,
}

/// Machine-readable reason an action was rejected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    #[error("the battle is over")]
    BattleFinished,
    #[error("unknown unit")]
    UnknownUnit,
    #[error("unknown target unit")]
    UnknownTarget,
    #[error("unit does not belong to the active faction")]
    NotActiveFaction,
    #[error("unit is destroyed")]
    UnitDestroyed,
    #[error("routed units cannot do that")]
    UnitRouted,
    #[error("not enough action points")]
    InsufficientActionPoints,
    #[error("weapon is out of ammo")]
    OutOfAmmo,
    #[error("unit has no such weapon")]
    UnknownWeapon,
    #[error("target is out of weapon range")]
    OutOfRange,
    #[error("weapon cannot target this unit type")]
    TargetTypeNotAllowed,
    #[error("target is on the same faction")]
    SameFaction,
    #[error("target is already destroyed")]
    TargetDestroyed,
    #[error("target is not detected")]
    TargetNotDetected,
    #[error("coordinate is outside the map")]
    OutOfBounds,
    #[error("tile is not destructible")]
    TileNotDestructible,
    #[error("weapon cannot attack tiles")]
    WeaponCannotTargetTiles,
    #[error("path: {0}")]
    PathNotFound(PathFailure),
    #[error("no supply source in reach")]
    NoSupplySource,
    #[error("unit is already where it was asked to go")]
    AlreadyThere,
}

/// A rejected action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{kind:?} rejected: {reason}")]
pub struct ActionError {
    pub kind: ActionKind,
    pub reason: FailureReason,
}

impl ActionError {
    pub fn new(kind: ActionKind, reason: FailureReason) -> Self {
        Self { kind, reason }
    }
}

/// An accepted action and the timeline entries it appended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub kind: ActionKind,
    /// Indices into the battle timeline
    pub events: Range<usize>,
}

impl ActionOutcome {
    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}
