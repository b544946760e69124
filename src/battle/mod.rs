//! Battle system - turn-based tactical combat on a grid
//!
//! Two or more factions alternate turns spending action points to move,
//! shoot and support each other. Every outcome is computed from the declared
//! actions and an injected random source, so replays are exact.
//!
//! Layering, leaf to root:
//! - `grid`, `terrain`, `battle_map`: coordinates, tiles, line of sight
//! - `units`, `state`: the battle data model
//! - `pathfinding`, `visibility`, `resolution`: read-only subsystems
//! - `execution`: the turn processor, the only writer

pub mod actions;
pub mod battle_map;
pub mod constants;
pub mod events;
pub mod execution;
pub mod grid;
pub mod morale;
pub mod pathfinding;
pub mod progression;
pub mod resolution;
pub mod rng;
pub mod setup;
pub mod state;
pub mod terrain;
pub mod unit_type;
pub mod units;
pub mod visibility;

#[cfg(test)]
mod test_support;

// Re-exports for convenient access
pub use actions::{ActionError, ActionKind, ActionOutcome, FailureReason};
pub use battle_map::{BattleMap, Destructible, Tile};
pub use constants::*;
pub use events::{Timeline, TimelineEntry, TimelineEvent};
pub use execution::{has_supply_source, Battle, Objective};
pub use grid::{GridCoord, GridKind, ParseCoordError};
pub use morale::{check_morale_after_attack, recover_at_turn_start, MoraleCheckResult};
pub use pathfinding::{
    find_path, path_cost, reachable_tiles, Mover, Path, PathFailure, PathOptions, PathResult,
};
pub use progression::{apply_experience, experience_gain, ExperienceResult};
pub use resolution::{
    calculate_damage, calculate_hit_chance, calculate_tile_hit_chance, preview_unit_attack,
    resolve_tile_attack, resolve_unit_attack, validate_unit_attack, AttackMode, AttackPreview,
    TileAttackResult, UnitAttackResult,
};
pub use rng::{RandomSource, ScriptedRandom, SeededRandom};
pub use setup::{build_battle, BattleSpec, FactionSpec, MapSpec, TileOverride, UnitPlacement};
pub use state::{BattlePhase, TacticalBattleState, UnitSnapshot};
pub use terrain::{Terrain, TerrainProfile};
pub use unit_type::UnitType;
pub use units::{
    FactionId, Side, Stance, StatusEffect, UnitDefinition, UnitId, UnitInstance, UnitStats,
    WeaponStats,
};
pub use visibility::{
    compute_all_vision, compute_visible_tiles, detected_enemies, detection_penalty,
    is_unit_detected, spotted_units, unit_vision_range, unit_visible_tiles, VisionState,
};
