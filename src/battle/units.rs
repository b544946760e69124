//! Units: immutable definitions, living instances and the sides that own them
//!
//! A `UnitDefinition` is the template a scenario declares. A `UnitInstance`
//! is created from it when the battle starts and is only ever changed by the
//! turn processor.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::battle::grid::GridCoord;
use crate::battle::unit_type::UnitType;

/// Unique identifier for factions
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactionId(pub String);

impl FactionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for FactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for units
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(pub String);

impl UnitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn default_ap_cost() -> f32 {
    1.0
}

/// Fixed stat record for one weapon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponStats {
    pub range: u32,
    #[serde(default)]
    pub min_range: u32,
    pub power: i32,
    /// Base hit probability in [0, 1]
    pub accuracy: f32,
    #[serde(default = "default_ap_cost")]
    pub ap_cost: f32,
    /// `None` means unlimited ammo
    #[serde(default)]
    pub ammo_capacity: Option<u32>,
    /// `None` means every unit type is a legal target
    #[serde(default)]
    pub target_types: Option<BTreeSet<UnitType>>,
    #[serde(default = "default_true")]
    pub can_attack_tiles: bool,
}

fn default_true() -> bool {
    true
}

impl WeaponStats {
    pub fn new(range: u32, power: i32, accuracy: f32) -> Self {
        Self {
            range,
            min_range: 0,
            power,
            accuracy,
            ap_cost: default_ap_cost(),
            ammo_capacity: None,
            target_types: None,
            can_attack_tiles: true,
        }
    }

    pub fn with_ammo(mut self, capacity: u32) -> Self {
        self.ammo_capacity = Some(capacity);
        self
    }

    pub fn with_targets(mut self, targets: impl IntoIterator<Item = UnitType>) -> Self {
        self.target_types = Some(targets.into_iter().collect());
        self
    }

    pub fn with_ap_cost(mut self, ap_cost: f32) -> Self {
        self.ap_cost = ap_cost;
        self
    }

    pub fn can_target(&self, unit_type: UnitType) -> bool {
        self.target_types
            .as_ref()
            .map_or(true, |allowed| allowed.contains(&unit_type))
    }

    pub fn in_range(&self, distance: u32) -> bool {
        distance >= self.min_range && distance <= self.range
    }
}

/// Base stats of a definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitStats {
    pub max_health: i32,
    /// Movement budget; the unit's max action points per turn
    pub mobility: u32,
    pub vision: u32,
    pub armor: i32,
    pub morale: f32,
    #[serde(default)]
    pub stealth: u32,
    #[serde(default)]
    pub concealment: u32,
}

/// Immutable unit template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitDefinition {
    pub id: String,
    pub faction: FactionId,
    pub name: String,
    pub unit_type: UnitType,
    pub stats: UnitStats,
    #[serde(default)]
    pub weapons: BTreeMap<String, WeaponStats>,
}

impl UnitDefinition {
    pub fn max_action_points(&self) -> f32 {
        self.stats.mobility as f32
    }
}

/// Combat stance. `Destroyed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    #[default]
    Ready,
    Suppressed,
    Routed,
    Destroyed,
}

/// Status effects layered on top of the stance
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusEffect {
    /// Currently detected by an enemy faction; gates targeting
    Spotted,
    /// Holding fire for an enemy that moves into range
    Overwatch,
}

/// A living unit on the battlefield
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitInstance {
    pub id: UnitId,
    pub definition: UnitDefinition,
    pub position: GridCoord,
    pub health: i32,
    pub action_points: f32,
    pub stance: Stance,
    pub morale: f32,
    pub status: BTreeSet<StatusEffect>,
    /// Weapon held ready while on overwatch
    pub overwatch_weapon: Option<String>,
    pub experience: u32,
    pub level: u32,
    /// Remaining ammo for weapons with a capacity
    pub ammo: BTreeMap<String, u32>,
}

impl UnitInstance {
    pub fn new(id: UnitId, definition: UnitDefinition, position: GridCoord) -> Self {
        let ammo = definition
            .weapons
            .iter()
            .filter_map(|(weapon_id, w)| w.ammo_capacity.map(|cap| (weapon_id.clone(), cap)))
            .collect();

        Self {
            id,
            health: definition.stats.max_health,
            action_points: definition.max_action_points(),
            morale: definition.stats.morale,
            position,
            stance: Stance::Ready,
            status: BTreeSet::new(),
            overwatch_weapon: None,
            experience: 0,
            level: 1,
            ammo,
            definition,
        }
    }

    pub fn faction(&self) -> &FactionId {
        &self.definition.faction
    }

    pub fn unit_type(&self) -> UnitType {
        self.definition.unit_type
    }

    pub fn max_health(&self) -> i32 {
        self.definition.stats.max_health
    }

    pub fn max_action_points(&self) -> f32 {
        self.definition.max_action_points()
    }

    pub fn vision(&self) -> u32 {
        self.definition.stats.vision
    }

    pub fn is_destroyed(&self) -> bool {
        self.stance == Stance::Destroyed
    }

    pub fn is_alive(&self) -> bool {
        !self.is_destroyed()
    }

    /// Routed units may only move
    pub fn can_fight(&self) -> bool {
        matches!(self.stance, Stance::Ready | Stance::Suppressed)
    }

    pub fn has_status(&self, effect: StatusEffect) -> bool {
        self.status.contains(&effect)
    }

    pub fn weapon(&self, weapon_id: &str) -> Option<&WeaponStats> {
        self.definition.weapons.get(weapon_id)
    }

    /// `None` when the weapon does not track ammo
    pub fn ammo_for(&self, weapon_id: &str) -> Option<u32> {
        self.ammo.get(weapon_id).copied()
    }

    pub fn has_ammo(&self, weapon_id: &str) -> bool {
        self.ammo_for(weapon_id).map_or(true, |n| n > 0)
    }

    /// Refill every tracked weapon. Returns true if anything changed.
    pub fn refill_ammo(&mut self) -> bool {
        let mut changed = false;
        for (weapon_id, weapon) in &self.definition.weapons {
            if let Some(cap) = weapon.ammo_capacity {
                let current = self.ammo.entry(weapon_id.clone()).or_insert(cap);
                if *current != cap {
                    *current = cap;
                    changed = true;
                }
            }
        }
        changed
    }

    pub fn health_fraction(&self) -> f32 {
        self.health as f32 / self.max_health().max(1) as f32
    }
}

/// One faction's side of the battle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Side {
    pub faction: FactionId,
    pub units: BTreeMap<UnitId, UnitInstance>,
}

impl Side {
    pub fn new(faction: FactionId) -> Self {
        Self {
            faction,
            units: BTreeMap::new(),
        }
    }

    pub fn get_unit(&self, unit_id: &UnitId) -> Option<&UnitInstance> {
        self.units.get(unit_id)
    }

    pub fn get_unit_mut(&mut self, unit_id: &UnitId) -> Option<&mut UnitInstance> {
        self.units.get_mut(unit_id)
    }

    /// Non-destroyed units in id order
    pub fn living_units(&self) -> impl Iterator<Item = &UnitInstance> {
        self.units.values().filter(|u| u.is_alive())
    }

    pub fn is_defeated(&self) -> bool {
        self.living_units().next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rifleman() -> UnitDefinition {
        let mut weapons = BTreeMap::new();
        weapons.insert("rifle".to_string(), WeaponStats::new(4, 6, 0.7).with_ammo(3));
        weapons.insert("bayonet".to_string(), WeaponStats::new(1, 3, 0.9));
        UnitDefinition {
            id: "rifleman".into(),
            faction: FactionId::new("blue"),
            name: "Rifleman".into(),
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

    #[test]
    fn test_instance_from_definition() {
        let unit = UnitInstance::new(UnitId::new("r1"), rifleman(), GridCoord::new(1, 1));
        assert_eq!(unit.health, 20);
        assert_eq!(unit.action_points, 4.0);
        assert_eq!(unit.level, 1);
        assert_eq!(unit.ammo_for("rifle"), Some(3));
        assert_eq!(unit.ammo_for("bayonet"), None);
        assert!(unit.has_ammo("bayonet"));
    }

    #[test]
    fn test_refill_ammo() {
        let mut unit = UnitInstance::new(UnitId::new("r1"), rifleman(), GridCoord::new(1, 1));
        assert!(!unit.refill_ammo());
        unit.ammo.insert("rifle".into(), 0);
        assert!(!unit.has_ammo("rifle"));
        assert!(unit.refill_ammo());
        assert_eq!(unit.ammo_for("rifle"), Some(3));
    }

    #[test]
    fn test_target_allow_list() {
        let at = WeaponStats::new(5, 10, 0.6).with_targets([UnitType::Vehicle]);
        assert!(at.can_target(UnitType::Vehicle));
        assert!(!at.can_target(UnitType::Infantry));
        assert!(WeaponStats::new(5, 10, 0.6).can_target(UnitType::Air));
    }

    #[test]
    fn test_routed_cannot_fight() {
        let mut unit = UnitInstance::new(UnitId::new("r1"), rifleman(), GridCoord::new(1, 1));
        assert!(unit.can_fight());
        unit.stance = Stance::Routed;
        assert!(!unit.can_fight());
        assert!(unit.is_alive());
        unit.stance = Stance::Destroyed;
        assert!(!unit.is_alive());
    }

    #[test]
    fn test_side_defeated() {
        let mut side = Side::new(FactionId::new("blue"));
        assert!(side.is_defeated());
        let unit = UnitInstance::new(UnitId::new("r1"), rifleman(), GridCoord::new(1, 1));
        side.units.insert(unit.id.clone(), unit);
        assert!(!side.is_defeated());
    }
}
