//! Battle creation from a declarative specification
//!
//! A `BattleSpec` describes the map, the unit definitions and each faction's
//! starting placements. `build_battle` validates everything up front and
//! either returns a running battle or a `SetupError`; nothing is partially
//! built.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::battle::battle_map::{BattleMap, Destructible, Tile};
use crate::battle::constants::MAX_UNIT_REACH;
use crate::battle::execution::Battle;
use crate::battle::grid::{GridCoord, GridKind};
use crate::battle::state::TacticalBattleState;
use crate::battle::terrain::Terrain;
use crate::battle::units::{FactionId, Side, UnitDefinition, UnitId, UnitInstance};
use crate::core::config::EngineConfig;
use crate::core::error::SetupError;

/// Sparse edit applied on top of the base tiles
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TileOverride {
    pub at: GridCoord,
    /// Replaces the whole tile with this terrain's default profile first
    #[serde(default)]
    pub terrain: Option<Terrain>,
    #[serde(default)]
    pub elevation: Option<i32>,
    #[serde(default)]
    pub cover: Option<i32>,
    #[serde(default)]
    pub movement_cost: Option<f32>,
    #[serde(default)]
    pub passable: Option<bool>,
    #[serde(default)]
    pub vision_boost: Option<bool>,
    #[serde(default)]
    pub supply: Option<bool>,
    /// Makes the tile destructible with this many hit points
    #[serde(default)]
    pub hp: Option<i32>,
}

impl TileOverride {
    pub fn at(at: GridCoord) -> Self {
        Self {
            at,
            ..Self::default()
        }
    }

    fn apply(&self, tile: &mut Tile) {
        if let Some(terrain) = self.terrain {
            *tile = Tile::from_terrain(terrain);
        }
        if let Some(elevation) = self.elevation {
            tile.elevation = elevation;
        }
        if let Some(cover) = self.cover {
            tile.cover = cover;
        }
        if let Some(cost) = self.movement_cost {
            tile.movement_cost = cost;
        }
        if let Some(passable) = self.passable {
            tile.passable = passable;
        }
        if let Some(boost) = self.vision_boost {
            tile.vision_boost = boost;
        }
        if let Some(supply) = self.supply {
            tile.supply = supply;
        }
        if let Some(hp) = self.hp {
            tile.destructible = Some(Destructible::new(hp));
        }
    }
}

/// Map layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapSpec {
    #[serde(default = "default_map_id")]
    pub id: String,
    #[serde(default)]
    pub grid: GridKind,
    pub width: u32,
    pub height: u32,
    /// Fill terrain when `tiles` is empty
    #[serde(default)]
    pub terrain: Terrain,
    /// Explicit row-major tiles; empty means "fill with `terrain`"
    #[serde(default)]
    pub tiles: Vec<Tile>,
    #[serde(default)]
    pub overrides: Vec<TileOverride>,
}

fn default_map_id() -> String {
    "battle".to_string()
}

impl MapSpec {
    /// Plain hex map
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            id: default_map_id(),
            grid: GridKind::Hex,
            width,
            height,
            terrain: Terrain::Plain,
            tiles: Vec::new(),
            overrides: Vec::new(),
        }
    }

    pub fn with_override(mut self, tile: TileOverride) -> Self {
        self.overrides.push(tile);
        self
    }

    /// Build and validate the map
    pub fn build(&self) -> Result<BattleMap, SetupError> {
        if self.width == 0 || self.height == 0 {
            return Err(SetupError::EmptyMap {
                width: self.width,
                height: self.height,
            });
        }
        let expected = self.width as usize * self.height as usize;
        let tiles = if self.tiles.is_empty() {
            vec![Tile::from_terrain(self.terrain); expected]
        } else {
            self.tiles.clone()
        };
        let mut map = BattleMap::from_tiles(self.id.clone(), self.grid, self.width, self.height, tiles)
            .ok_or(SetupError::TileCountMismatch {
                expected,
                actual: self.tiles.len(),
            })?;

        for edit in &self.overrides {
            let tile = map
                .tile_mut(edit.at)
                .ok_or(SetupError::OverrideOutOfBounds(edit.at))?;
            edit.apply(tile);
        }

        for (index, tile) in map.tiles().iter().enumerate() {
            if !(tile.movement_cost >= 0.0) {
                return Err(SetupError::NegativeMovementCost(map.coord_of(index)));
            }
            if let Some(structure) = tile.destructible {
                if structure.hp <= 0 || structure.hp > structure.max_hp {
                    return Err(SetupError::InvalidTileHp {
                        at: map.coord_of(index),
                        hp: structure.hp,
                        max_hp: structure.max_hp,
                    });
                }
            }
        }
        Ok(map)
    }
}

/// One unit's starting position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitPlacement {
    pub definition: String,
    pub at: GridCoord,
    /// Generated as `{faction}-{definition}-{n}` when absent
    #[serde(default)]
    pub id: Option<UnitId>,
}

impl UnitPlacement {
    pub fn new(definition: impl Into<String>, at: GridCoord) -> Self {
        Self {
            definition: definition.into(),
            at,
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(UnitId::new(id));
        self
    }
}

/// A faction and its starting units. Declaration order is turn order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactionSpec {
    pub id: FactionId,
    #[serde(default)]
    pub units: Vec<UnitPlacement>,
}

impl FactionSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: FactionId::new(id),
            units: Vec::new(),
        }
    }

    pub fn with_unit(mut self, placement: UnitPlacement) -> Self {
        self.units.push(placement);
        self
    }
}

/// Everything needed to start a battle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleSpec {
    pub map: MapSpec,
    #[serde(default)]
    pub definitions: Vec<UnitDefinition>,
    pub factions: Vec<FactionSpec>,
}

impl BattleSpec {
    pub fn from_json(content: &str) -> Result<Self, SetupError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_toml(content: &str) -> Result<Self, SetupError> {
        Ok(toml::from_str(content)?)
    }

    /// Load from a `.toml` or `.json` file, picked by extension
    pub fn load(path: &Path) -> Result<Self, SetupError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| SetupError::Parse(e.to_string()))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&content),
            _ => Self::from_json(&content),
        }
    }

    fn validated_definitions(&self) -> Result<BTreeMap<&str, &UnitDefinition>, SetupError> {
        let mut definitions = BTreeMap::new();
        for def in &self.definitions {
            validate_definition(def)?;
            if definitions.insert(def.id.as_str(), def).is_some() {
                return Err(SetupError::DuplicateDefinition(def.id.clone()));
            }
        }
        Ok(definitions)
    }

    /// Validate the spec and produce the initial sides, in turn order.
    /// Vision and action points are left to the caller.
    pub fn build_sides(&self, map: &BattleMap) -> Result<Vec<Side>, SetupError> {
        if self.factions.len() < 2 {
            return Err(SetupError::NotEnoughFactions(self.factions.len()));
        }
        let definitions = self.validated_definitions()?;

        let mut faction_ids = BTreeSet::new();
        let mut unit_ids = BTreeSet::new();
        let mut occupied: BTreeMap<GridCoord, UnitId> = BTreeMap::new();
        let mut sides = Vec::with_capacity(self.factions.len());

        for faction in &self.factions {
            if !faction_ids.insert(&faction.id) {
                return Err(SetupError::DuplicateFaction(faction.id.clone()));
            }
            if faction.units.is_empty() {
                return Err(SetupError::EmptyFaction(faction.id.clone()));
            }

            let mut side = Side::new(faction.id.clone());
            let mut per_definition: BTreeMap<&str, u32> = BTreeMap::new();

            for placement in &faction.units {
                let def = definitions
                    .get(placement.definition.as_str())
                    .ok_or_else(|| SetupError::UnknownDefinition(placement.definition.clone()))?;
                if def.faction != faction.id {
                    return Err(SetupError::FactionMismatch {
                        definition: def.id.clone(),
                        owner: def.faction.clone(),
                        placed_for: faction.id.clone(),
                    });
                }

                let count = per_definition.entry(def.id.as_str()).or_insert(0);
                *count += 1;
                let id = placement
                    .id
                    .clone()
                    .unwrap_or_else(|| UnitId::new(format!("{}-{}-{}", faction.id, def.id, count)));
                if !unit_ids.insert(id.clone()) {
                    return Err(SetupError::DuplicateUnit(id));
                }

                let tile = map.tile(placement.at).ok_or(SetupError::PlacementOutOfBounds {
                    unit: id.clone(),
                    at: placement.at,
                })?;
                if !def.unit_type.can_enter(tile) {
                    return Err(SetupError::PlacementImpassable {
                        unit: id,
                        at: placement.at,
                    });
                }
                if let Some(first) = occupied.get(&placement.at) {
                    return Err(SetupError::PlacementOccupied {
                        first: first.clone(),
                        second: id,
                        at: placement.at,
                    });
                }
                occupied.insert(placement.at, id.clone());

                side.units.insert(
                    id.clone(),
                    UnitInstance::new(id, (*def).clone(), placement.at),
                );
            }
            sides.push(side);
        }

        Ok(sides)
    }
}

/// Validate a spec and start the battle: turn 1, full action points,
/// initial vision, empty timeline
pub fn build_battle(spec: &BattleSpec, config: EngineConfig) -> Result<Battle, SetupError> {
    let map = spec.map.build()?;
    let sides = spec.build_sides(&map)?;
    tracing::info!(
        map = %map.id,
        width = map.width(),
        height = map.height(),
        factions = sides.len(),
        units = sides.iter().map(|s| s.units.len()).sum::<usize>(),
        "battle created"
    );
    Ok(Battle::start(TacticalBattleState::new(map, sides), config))
}

fn validate_definition(def: &UnitDefinition) -> Result<(), SetupError> {
    let invalid = |reason: &str| SetupError::InvalidDefinition {
        definition: def.id.clone(),
        reason: reason.to_string(),
    };
    if def.stats.max_health <= 0 {
        return Err(invalid("max_health must be positive"));
    }
    if def.stats.armor < 0 {
        return Err(invalid("armor must not be negative"));
    }
    if !(def.stats.morale >= 0.0) {
        return Err(invalid("morale must not be negative"));
    }
    if def.stats.vision > MAX_UNIT_REACH || def.stats.mobility > MAX_UNIT_REACH {
        return Err(invalid("vision and mobility must be at most MAX_UNIT_REACH"));
    }

    for (weapon_id, weapon) in &def.weapons {
        let invalid_weapon = |reason: &str| SetupError::InvalidWeapon {
            definition: def.id.clone(),
            weapon: weapon_id.clone(),
            reason: reason.to_string(),
        };
        if !(0.0..=1.0).contains(&weapon.accuracy) {
            return Err(invalid_weapon("accuracy must be in [0, 1]"));
        }
        if weapon.range == 0 {
            return Err(invalid_weapon("range must be positive"));
        }
        if weapon.range > MAX_UNIT_REACH {
            return Err(invalid_weapon("range exceeds MAX_UNIT_REACH"));
        }
        if weapon.min_range > weapon.range {
            return Err(invalid_weapon("min_range exceeds range"));
        }
        if !(weapon.ap_cost >= 0.0) || !weapon.ap_cost.is_finite() {
            return Err(invalid_weapon("ap_cost must be a non-negative number"));
        }
        if weapon.power < 0 {
            return Err(invalid_weapon("power must not be negative"));
        }
        if weapon.ammo_capacity == Some(0) {
            return Err(invalid_weapon("ammo capacity must be positive"));
        }
        if weapon.target_types.as_ref().is_some_and(|t| t.is_empty()) {
            return Err(invalid_weapon("target allow-list is empty"));
        }
    }
    Ok(())
}
