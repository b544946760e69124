//! Battle terrain categories and their default tile profiles

use serde::{Deserialize, Serialize};

/// Terrain category of a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Terrain {
    #[default]
    Plain,     // No penalty, no cover
    Road,      // Faster
    Forest,    // Slow, heavy cover
    Urban,     // Slow, heavy cover
    Hill,      // Raised, vision boost
    Water,     // Only air crosses
    Swamp,     // Very slow
    Structure, // Blocks movement until destroyed
    Rubble,    // What a destroyed structure leaves behind
}

/// Default tile values for a terrain category
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerrainProfile {
    pub movement_cost: f32,
    pub cover: i32,
    pub elevation: i32,
    pub passable: bool,
    pub vision_boost: bool,
}

impl Terrain {
    /// Terrain a destroyed tile falls back to
    pub const DESTROYED: Terrain = Terrain::Rubble;

    pub fn profile(&self) -> TerrainProfile {
        match self {
            Terrain::Plain => TerrainProfile {
                movement_cost: 1.0,
                cover: 0,
                elevation: 0,
                passable: true,
                vision_boost: false,
            },
            Terrain::Road => TerrainProfile {
                movement_cost: 0.5,
                cover: 0,
                elevation: 0,
                passable: true,
                vision_boost: false,
            },
            Terrain::Forest => TerrainProfile {
                movement_cost: 2.0,
                cover: 2,
                elevation: 0,
                passable: true,
                vision_boost: false,
            },
            Terrain::Urban => TerrainProfile {
                movement_cost: 1.5,
                cover: 2,
                elevation: 0,
                passable: true,
                vision_boost: false,
            },
            Terrain::Hill => TerrainProfile {
                movement_cost: 1.5,
                cover: 1,
                elevation: 1,
                passable: true,
                vision_boost: true,
            },
            Terrain::Water => TerrainProfile {
                movement_cost: 3.0,
                cover: 0,
                elevation: 0,
                passable: true,
                vision_boost: false,
            },
            Terrain::Swamp => TerrainProfile {
                movement_cost: 2.5,
                cover: 1,
                elevation: 0,
                passable: true,
                vision_boost: false,
            },
            Terrain::Structure => TerrainProfile {
                movement_cost: 1.0,
                cover: 4,
                elevation: 1,
                passable: false,
                vision_boost: false,
            },
            Terrain::Rubble => TerrainProfile {
                movement_cost: 1.0,
                cover: 0,
                elevation: 0,
                passable: true,
                vision_boost: false,
            },
        }
    }

    /// Does this terrain hide the units standing on it?
    pub fn provides_cover(&self) -> bool {
        self.profile().cover > 0
    }
}
