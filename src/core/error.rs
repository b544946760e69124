use thiserror::Error;

use crate::battle::grid::GridCoord;
use crate::battle::units::{FactionId, UnitId};

/// Malformed battle specification. Creation aborts; no partial battle exists.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SetupError {
    #[error("Map dimensions must be positive, got {width}x{height}")]
    EmptyMap { width: u32, height: u32 },

    #[error("Map expects {expected} tiles, spec has {actual}")]
    TileCountMismatch { expected: usize, actual: usize },

    #[error("Tile override at {0} is outside the map")]
    OverrideOutOfBounds(GridCoord),

    #[error("Tile at {0} has a negative movement cost")]
    NegativeMovementCost(GridCoord),

    #[error("Destructible tile at {at} has hp {hp} of {max_hp}; need 0 < hp <= max_hp")]
    InvalidTileHp { at: GridCoord, hp: i32, max_hp: i32 },

    #[error("A battle needs at least two factions, got {0}")]
    NotEnoughFactions(usize),

    #[error("Faction {0} has no units")]
    EmptyFaction(FactionId),

    #[error("Faction {0} is declared twice")]
    DuplicateFaction(FactionId),

    #[error("Unit definition {0} is declared twice")]
    DuplicateDefinition(String),

    #[error("Unknown unit definition: {0}")]
    UnknownDefinition(String),

    #[error("Definition {definition} belongs to {owner}, placed for {placed_for}")]
    FactionMismatch {
        definition: String,
        owner: FactionId,
        placed_for: FactionId,
    },

    #[error("Definition {definition}: {reason}")]
    InvalidDefinition { definition: String, reason: String },

    #[error("Weapon {weapon} on {definition}: {reason}")]
    InvalidWeapon {
        definition: String,
        weapon: String,
        reason: String,
    },

    #[error("Unit id {0} is used twice")]
    DuplicateUnit(UnitId),

    #[error("Unit {unit} placed outside the map at {at}")]
    PlacementOutOfBounds { unit: UnitId, at: GridCoord },

    #[error("Unit {unit} cannot stand on the terrain at {at}")]
    PlacementImpassable { unit: UnitId, at: GridCoord },

    #[error("Units {first} and {second} share {at}")]
    PlacementOccupied {
        first: UnitId,
        second: UnitId,
        at: GridCoord,
    },

    #[error("Spec parse error: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for SetupError {
    fn from(e: serde_json::Error) -> Self {
        SetupError::Parse(e.to_string())
    }
}

impl From<toml::de::Error> for SetupError {
    fn from(e: toml::de::Error) -> Self {
        SetupError::Parse(e.to_string())
    }
}

/// Failure loading or validating an `EngineConfig`
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}
