//! Per-faction visibility (fog of war) and stealth detection
//!
//! Vision is recomputed from scratch after anything that could change it.
//! Battles are small, so the O(units x vision area) cost is fine.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::battle::battle_map::BattleMap;
use crate::battle::grid::GridCoord;
use crate::battle::state::TacticalBattleState;
use crate::battle::units::{FactionId, UnitId, UnitInstance};
use crate::core::config::VisibilityConfig;

/// Visibility state for one faction, as row-major tile indices
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisionState {
    /// Currently visible tiles
    pub visible: BTreeSet<usize>,
    /// Previously seen tiles (remembered)
    pub remembered: BTreeSet<usize>,
}

impl VisionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Is this tile currently visible?
    pub fn is_visible(&self, index: usize) -> bool {
        self.visible.contains(&index)
    }

    /// Has this tile been seen before but is not visible now?
    pub fn is_remembered(&self, index: usize) -> bool {
        self.remembered.contains(&index)
    }

    /// Update: move current visible to remembered, set new visible
    pub fn update(&mut self, new_visible: BTreeSet<usize>) {
        self.remembered.append(&mut self.visible);
        for index in &new_visible {
            self.remembered.remove(index);
        }
        self.visible = new_visible;
    }
}

/// Vision radius including the boost from the tile the unit stands on
pub fn unit_vision_range(unit: &UnitInstance, map: &BattleMap, config: &VisibilityConfig) -> u32 {
    let mut range = unit.vision();
    if map.tile(unit.position).map_or(false, |t| t.vision_boost) {
        range += config.vision_boost_bonus;
    }
    range
}

/// Tiles one unit can see
pub fn unit_visible_tiles(
    unit: &UnitInstance,
    map: &BattleMap,
    config: &VisibilityConfig,
) -> Vec<GridCoord> {
    let range = unit_vision_range(unit, map, config);
    map.within_range(unit.position, range)
        .into_iter()
        .filter(|c| map.has_line_of_sight(unit.position, *c, config.los_blocking_cover))
        .collect()
}

/// Union of visible tiles over every living unit of a faction
pub fn compute_visible_tiles(
    state: &TacticalBattleState,
    faction: &FactionId,
    config: &VisibilityConfig,
) -> BTreeSet<usize> {
    let mut visible = BTreeSet::new();
    let Some(side) = state.side(faction) else {
        return visible;
    };

    for unit in side.living_units() {
        visible.extend(
            unit_visible_tiles(unit, &state.map, config)
                .into_iter()
                .filter_map(|c| state.map.index_of(c)),
        );
    }
    visible
}

/// Fresh vision for every faction
pub fn compute_all_vision(
    state: &TacticalBattleState,
    config: &VisibilityConfig,
) -> BTreeMap<FactionId, BTreeSet<usize>> {
    state
        .factions()
        .map(|f| (f.clone(), compute_visible_tiles(state, f, config)))
        .collect()
}

/// How far a target's stealth, tile cover and concealment bonus shorten
/// enemy vision
pub fn detection_penalty(state: &TacticalBattleState, target: &UnitInstance) -> u32 {
    let stats = &target.definition.stats;
    let cover = state
        .map
        .tile(target.position)
        .map_or(0, |t| t.cover.max(0) as u32);
    stats.stealth + cover + stats.concealment
}

/// Is the target detected by any living unit of the viewer faction?
///
/// A viewer at distance D with vision V spots a target with penalty S iff
/// `D + S <= V`. Destroyed targets are never detected.
pub fn is_unit_detected(
    state: &TacticalBattleState,
    viewer_faction: &FactionId,
    target: &UnitInstance,
    config: &VisibilityConfig,
) -> bool {
    if target.is_destroyed() {
        return false;
    }
    let Some(side) = state.side(viewer_faction) else {
        return false;
    };

    let penalty = detection_penalty(state, target);
    side.living_units().any(|viewer| {
        let vision = unit_vision_range(viewer, &state.map, config);
        let distance = state.map.distance(viewer.position, target.position);
        distance <= vision && distance + penalty <= vision
    })
}

/// Enemy units the viewer faction should tag as spotted: standing on a tile
/// it currently sees and detected through their stealth
pub fn detected_enemies(
    state: &TacticalBattleState,
    viewer_faction: &FactionId,
    config: &VisibilityConfig,
) -> BTreeSet<UnitId> {
    state
        .enemies_of(viewer_faction)
        .filter(|u| state.is_visible_to(viewer_faction, u.position))
        .filter(|u| is_unit_detected(state, viewer_faction, u, config))
        .map(|u| u.id.clone())
        .collect()
}

/// Every unit spotted by at least one enemy faction
pub fn spotted_units(state: &TacticalBattleState, config: &VisibilityConfig) -> BTreeSet<UnitId> {
    state
        .factions()
        .flat_map(|f| detected_enemies(state, f, config))
        .collect()
}
