//! Shared fixtures for unit tests

use std::collections::BTreeMap;

use crate::battle::battle_map::BattleMap;
use crate::battle::grid::GridCoord;
use crate::battle::setup::{BattleSpec, FactionSpec, MapSpec, UnitPlacement};
use crate::battle::state::TacticalBattleState;
use crate::battle::unit_type::UnitType;
use crate::battle::units::{
    FactionId, Side, StatusEffect, UnitDefinition, UnitId, UnitInstance, UnitStats, WeaponStats,
};
use crate::battle::visibility::{compute_all_vision, spotted_units};
use crate::core::config::VisibilityConfig;

pub fn blue() -> FactionId {
    FactionId::new("blue")
}

pub fn red() -> FactionId {
    FactionId::new("red")
}

/// 20 hp, 4 mobility, 5 vision, 1 armor, 60 morale; rifle (4 range, 6 power,
/// 0.7 accuracy, 3 ammo) and bayonet (1 range, 3 power, 0.9 accuracy)
pub fn infantry_definition(faction: &str) -> UnitDefinition {
    let mut weapons = BTreeMap::new();
    weapons.insert("rifle".to_string(), WeaponStats::new(4, 6, 0.7).with_ammo(3));
    weapons.insert("bayonet".to_string(), WeaponStats::new(1, 3, 0.9));
    UnitDefinition {
        id: format!("{faction}-infantry"),
        faction: FactionId::new(faction),
        name: "Line Infantry".into(),
        unit_type: UnitType::Infantry,
        stats: UnitStats {
            max_health: 20,
            mobility: 4,
            vision: 5,
            armor: 1,
            morale: 60.0,
            stealth: 0,
            concealment: 0,
        },
        weapons,
    }
}

/// 16x8 hex map, one infantry per side, vision not yet computed
pub fn two_unit_state(blue_pos: GridCoord, red_pos: GridCoord) -> TacticalBattleState {
    let mut sides = Vec::new();
    for (faction, pos) in [("blue", blue_pos), ("red", red_pos)] {
        let mut side = Side::new(FactionId::new(faction));
        let id = UnitId::new(format!("{faction}-1"));
        side.units.insert(
            id.clone(),
            UnitInstance::new(id, infantry_definition(faction), pos),
        );
        sides.push(side);
    }
    TacticalBattleState::new(BattleMap::new(16, 8), sides)
}

/// Same as `two_unit_state` with vision computed and spotted units tagged
pub fn visible_two_unit_state(blue_pos: GridCoord, red_pos: GridCoord) -> TacticalBattleState {
    let mut state = two_unit_state(blue_pos, red_pos);
    let config = VisibilityConfig::default();
    for (faction, visible) in compute_all_vision(&state, &config) {
        state.vision.entry(faction).or_default().update(visible);
    }
    for id in spotted_units(&state, &config) {
        if let Some(unit) = state.unit_mut(&id) {
            unit.status.insert(StatusEffect::Spotted);
        }
    }
    state
}

/// Spec for the same layout as `two_unit_state`, for `build_battle`
pub fn two_unit_spec(blue_pos: GridCoord, red_pos: GridCoord) -> BattleSpec {
    BattleSpec {
        map: MapSpec::new(16, 8),
        definitions: vec![infantry_definition("blue"), infantry_definition("red")],
        factions: vec![
            FactionSpec::new("blue")
                .with_unit(UnitPlacement::new("blue-infantry", blue_pos).with_id("blue-1")),
            FactionSpec::new("red")
                .with_unit(UnitPlacement::new("red-infantry", red_pos).with_id("red-1")),
        ],
    }
}
