//! Tactical battle state: the aggregate root
//!
//! Owns the map, every side, per-faction vision and the timeline. Only the
//! turn processor in `execution` holds it mutably; pathfinding, visibility
//! and the combat resolver read it through `&TacticalBattleState`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::battle::battle_map::BattleMap;
use crate::battle::events::Timeline;
use crate::battle::grid::GridCoord;
use crate::battle::units::{FactionId, Side, Stance, StatusEffect, UnitId, UnitInstance};
use crate::battle::visibility::VisionState;

/// Where the turn state machine stands
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum BattlePhase {
    /// The active faction may issue any legal action
    #[default]
    AwaitingAction,
    /// Battle over; no further actions are accepted
    Finished { winner: Option<FactionId> },
}

/// Read-only unit view for renderers and AI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSnapshot {
    pub id: UnitId,
    pub faction: FactionId,
    pub name: String,
    pub position: GridCoord,
    pub health: i32,
    pub max_health: i32,
    pub action_points: f32,
    pub stance: Stance,
    pub level: u32,
    pub spotted: bool,
}

impl From<&UnitInstance> for UnitSnapshot {
    fn from(unit: &UnitInstance) -> Self {
        Self {
            id: unit.id.clone(),
            faction: unit.faction().clone(),
            name: unit.definition.name.clone(),
            position: unit.position,
            health: unit.health,
            max_health: unit.max_health(),
            action_points: unit.action_points,
            stance: unit.stance,
            level: unit.level,
            spotted: unit.has_status(StatusEffect::Spotted),
        }
    }
}

/// Complete battle state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TacticalBattleState {
    pub map: BattleMap,
    /// Sides in turn order
    pub sides: Vec<Side>,
    pub vision: BTreeMap<FactionId, VisionState>,
    /// Index into `sides`
    pub active_side: usize,
    pub turn: u32,
    pub phase: BattlePhase,
    pub timeline: Timeline,
}

impl TacticalBattleState {
    pub fn new(map: BattleMap, sides: Vec<Side>) -> Self {
        let vision = sides
            .iter()
            .map(|s| (s.faction.clone(), VisionState::default()))
            .collect();
        Self {
            map,
            sides,
            vision,
            active_side: 0,
            turn: 1,
            phase: BattlePhase::AwaitingAction,
            timeline: Timeline::new(),
        }
    }

    pub fn active_faction(&self) -> &FactionId {
        &self.sides[self.active_side].faction
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, BattlePhase::Finished { .. })
    }

    pub fn winner(&self) -> Option<&FactionId> {
        match &self.phase {
            BattlePhase::Finished { winner } => winner.as_ref(),
            BattlePhase::AwaitingAction => None,
        }
    }

    pub fn side(&self, faction: &FactionId) -> Option<&Side> {
        self.sides.iter().find(|s| &s.faction == faction)
    }

    pub fn factions(&self) -> impl Iterator<Item = &FactionId> {
        self.sides.iter().map(|s| &s.faction)
    }

    /// Get a unit from any side
    pub fn unit(&self, unit_id: &UnitId) -> Option<&UnitInstance> {
        self.sides.iter().find_map(|s| s.get_unit(unit_id))
    }

    pub(crate) fn unit_mut(&mut self, unit_id: &UnitId) -> Option<&mut UnitInstance> {
        self.sides.iter_mut().find_map(|s| s.get_unit_mut(unit_id))
    }

    /// Every unit, sides in turn order, units in id order
    pub fn units(&self) -> impl Iterator<Item = &UnitInstance> {
        self.sides.iter().flat_map(|s| s.units.values())
    }

    pub fn living_units(&self) -> impl Iterator<Item = &UnitInstance> {
        self.units().filter(|u| u.is_alive())
    }

    /// Living units not belonging to `faction`
    pub fn enemies_of<'a>(
        &'a self,
        faction: &'a FactionId,
    ) -> impl Iterator<Item = &'a UnitInstance> + 'a {
        self.living_units().filter(move |u| u.faction() != faction)
    }

    /// Living unit standing on a coordinate
    pub fn unit_at(&self, coord: GridCoord) -> Option<&UnitInstance> {
        self.living_units().find(|u| u.position == coord)
    }

    /// Factions with at least one living unit, in turn order
    pub fn surviving_factions(&self) -> Vec<&FactionId> {
        self.sides
            .iter()
            .filter(|s| !s.is_defeated())
            .map(|s| &s.faction)
            .collect()
    }

    pub fn vision_of(&self, faction: &FactionId) -> Option<&VisionState> {
        self.vision.get(faction)
    }

    /// Is the tile currently visible to the faction?
    pub fn is_visible_to(&self, faction: &FactionId, coord: GridCoord) -> bool {
        match (self.vision.get(faction), self.map.index_of(coord)) {
            (Some(v), Some(index)) => v.is_visible(index),
            _ => false,
        }
    }

    pub fn unit_snapshots(&self) -> Vec<UnitSnapshot> {
        self.units().map(UnitSnapshot::from).collect()
    }

    /// Snapshots of the units a faction may know about: its own plus spotted enemies
    pub fn known_units(&self, faction: &FactionId) -> Vec<UnitSnapshot> {
        self.living_units()
            .filter(|u| u.faction() == faction || u.has_status(StatusEffect::Spotted))
            .map(UnitSnapshot::from)
            .collect()
    }

    /// Panic if a data-model invariant is broken
    pub(crate) fn assert_invariants(&self) {
        let mut seen = std::collections::BTreeSet::new();
        for unit in self.units() {
            assert!(seen.insert(&unit.id), "duplicate unit id {}", unit.id);
            assert!(
                unit.health >= 0 && unit.health <= unit.max_health(),
                "unit {} health {} outside [0, {}]",
                unit.id,
                unit.health,
                unit.max_health()
            );
            assert!(
                unit.action_points >= 0.0 && unit.action_points <= unit.max_action_points() + 1e-4,
                "unit {} action points {} outside [0, {}]",
                unit.id,
                unit.action_points,
                unit.max_action_points()
            );
            assert_eq!(
                unit.health == 0,
                unit.is_destroyed(),
                "unit {} health/stance mismatch",
                unit.id
            );
        }
    }
}
