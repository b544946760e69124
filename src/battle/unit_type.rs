//! Unit type categories and their terrain restrictions

use serde::{Deserialize, Serialize};

use crate::battle::battle_map::Tile;
use crate::battle::terrain::Terrain;

/// Category of a unit, used for terrain restrictions and weapon allow-lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitType {
    Infantry,
    Vehicle,
    Air,
    Artillery,
    Support,
    Hero,
}

impl UnitType {
    /// Flies over terrain; pays a flat step cost
    pub fn is_airborne(&self) -> bool {
        matches!(self, UnitType::Air)
    }

    /// Hard terrain exclusion, independent of movement cost
    pub fn can_enter(&self, tile: &Tile) -> bool {
        if self.is_airborne() {
            return true;
        }
        if !tile.passable {
            return false;
        }
        match self {
            UnitType::Vehicle | UnitType::Artillery => !matches!(
                tile.terrain,
                Terrain::Forest | Terrain::Swamp | Terrain::Water
            ),
            UnitType::Infantry | UnitType::Support | UnitType::Hero => {
                tile.terrain != Terrain::Water
            }
            UnitType::Air => true,
        }
    }
}
