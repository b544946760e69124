//! Combat resolution: hit chance, damage, and what an attack does
//!
//! Resolution reads the battle state and returns a result describing the
//! attack. It never mutates; the turn processor applies the result. All
//! validation happens before the random source is touched, so a rejected
//! attack consumes no roll.

use serde::{Deserialize, Serialize};

use crate::battle::actions::FailureReason;
use crate::battle::battle_map::BattleMap;
use crate::battle::grid::GridCoord;
use crate::battle::morale::{check_morale_after_attack, MoraleCheckResult};
use crate::battle::pathfinding::COST_EPSILON;
use crate::battle::progression::{apply_experience, experience_gain, ExperienceResult};
use crate::battle::rng::RandomSource;
use crate::battle::state::TacticalBattleState;
use crate::battle::units::{Stance, StatusEffect, UnitId, UnitInstance, WeaponStats};
use crate::battle::visibility::is_unit_detected;
use crate::core::config::{CombatConfig, EngineConfig};

/// Whether the attack is a deliberate action or overwatch reaction fire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackMode {
    /// Costs action points
    Action,
    /// Free shot fired out of turn
    Reaction,
}

/// Hit probability in [0, 1]
pub fn calculate_hit_chance(
    attacker: &UnitInstance,
    defender: &UnitInstance,
    weapon: &WeaponStats,
    map: &BattleMap,
    config: &CombatConfig,
) -> f32 {
    let mut chance = weapon.accuracy + attacker_modifiers(attacker, config);

    let elevation_advantage = map
        .elevation_difference(attacker.position, defender.position)
        .max(0);
    chance += config.elevation_bonus * elevation_advantage as f32;

    let cover = map.tile(defender.position).map_or(0, |t| t.cover.max(0));
    chance -= config.cover_penalty * cover as f32;

    if defender.has_status(StatusEffect::Spotted) {
        chance += config.spotted_bonus;
    }

    chance.clamp(0.0, 1.0)
}

/// Hit probability against a tile; tiles have no cover against themselves
pub fn calculate_tile_hit_chance(
    attacker: &UnitInstance,
    target: GridCoord,
    weapon: &WeaponStats,
    map: &BattleMap,
    config: &CombatConfig,
) -> f32 {
    let elevation_advantage = map.elevation_difference(attacker.position, target).max(0);
    let chance = weapon.accuracy
        + attacker_modifiers(attacker, config)
        + config.elevation_bonus * elevation_advantage as f32;
    chance.clamp(0.0, 1.0)
}

fn attacker_modifiers(attacker: &UnitInstance, config: &CombatConfig) -> f32 {
    let mut modifier = config.level_accuracy_bonus * attacker.level.saturating_sub(1) as f32;
    if attacker.stance == Stance::Suppressed {
        modifier -= config.suppressed_penalty;
    }
    modifier
}

/// Damage of one hit after armor, never below the chip floor
pub fn calculate_damage(weapon: &WeaponStats, armor: i32, config: &CombatConfig) -> i32 {
    (weapon.power - armor).max(config.min_chip_damage)
}

/// Result of a resolved unit attack
#[derive(Debug, Clone, PartialEq)]
pub struct UnitAttackResult {
    pub attacker: UnitId,
    pub defender: UnitId,
    pub weapon: String,
    pub hit_chance: f32,
    pub roll: f32,
    pub hit: bool,
    pub damage: i32,
    pub defender_health: i32,
    pub destroyed: bool,
    /// Morale outcome for a surviving defender
    pub defender_morale: Option<MoraleCheckResult>,
    pub attacker_experience: ExperienceResult,
    pub ap_cost: f32,
    pub uses_ammo: bool,
}

/// Result of a resolved tile attack
#[derive(Debug, Clone, PartialEq)]
pub struct TileAttackResult {
    pub attacker: UnitId,
    pub at: GridCoord,
    pub weapon: String,
    pub hit_chance: f32,
    pub roll: f32,
    pub hit: bool,
    pub damage: i32,
    pub remaining_hp: i32,
    pub destroyed: bool,
    pub ap_cost: f32,
    pub uses_ammo: bool,
}

/// What an attack would do, without rolling
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttackPreview {
    pub hit_chance: f32,
    pub damage_on_hit: i32,
    pub expected_damage: f32,
}

fn check_weapon_ready<'a>(
    attacker: &'a UnitInstance,
    weapon_id: &str,
) -> Result<&'a WeaponStats, FailureReason> {
    if attacker.is_destroyed() {
        return Err(FailureReason::UnitDestroyed);
    }
    if !attacker.can_fight() {
        return Err(FailureReason::UnitRouted);
    }
    let weapon = attacker
        .weapon(weapon_id)
        .ok_or(FailureReason::UnknownWeapon)?;
    Ok(weapon)
}

fn check_costs(
    attacker: &UnitInstance,
    weapon_id: &str,
    weapon: &WeaponStats,
    mode: AttackMode,
) -> Result<(), FailureReason> {
    if mode == AttackMode::Action && attacker.action_points + COST_EPSILON < weapon.ap_cost {
        return Err(FailureReason::InsufficientActionPoints);
    }
    if !attacker.has_ammo(weapon_id) {
        return Err(FailureReason::OutOfAmmo);
    }
    Ok(())
}

/// Check every precondition of a unit attack. Returns the attacker,
/// defender and weapon on success.
pub fn validate_unit_attack<'a>(
    state: &'a TacticalBattleState,
    attacker_id: &UnitId,
    defender_id: &UnitId,
    weapon_id: &str,
    mode: AttackMode,
    config: &EngineConfig,
) -> Result<(&'a UnitInstance, &'a UnitInstance, &'a WeaponStats), FailureReason> {
    let attacker = state.unit(attacker_id).ok_or(FailureReason::UnknownUnit)?;
    let defender = state.unit(defender_id).ok_or(FailureReason::UnknownTarget)?;
    let weapon = check_weapon_ready(attacker, weapon_id)?;

    if attacker.faction() == defender.faction() {
        return Err(FailureReason::SameFaction);
    }
    if defender.is_destroyed() {
        return Err(FailureReason::TargetDestroyed);
    }
    if !weapon.can_target(defender.unit_type()) {
        return Err(FailureReason::TargetTypeNotAllowed);
    }
    let distance = state.map.distance(attacker.position, defender.position);
    if !weapon.in_range(distance) {
        return Err(FailureReason::OutOfRange);
    }
    if !state.is_visible_to(attacker.faction(), defender.position)
        || !is_unit_detected(state, attacker.faction(), defender, &config.visibility)
    {
        return Err(FailureReason::TargetNotDetected);
    }
    check_costs(attacker, weapon_id, weapon, mode)?;

    Ok((attacker, defender, weapon))
}

/// Expected outcome of an attack without rolling
pub fn preview_unit_attack(
    state: &TacticalBattleState,
    attacker_id: &UnitId,
    defender_id: &UnitId,
    weapon_id: &str,
    config: &EngineConfig,
) -> Result<AttackPreview, FailureReason> {
    let (attacker, defender, weapon) = validate_unit_attack(
        state,
        attacker_id,
        defender_id,
        weapon_id,
        AttackMode::Action,
        config,
    )?;
    let hit_chance = calculate_hit_chance(attacker, defender, weapon, &state.map, &config.combat);
    let damage_on_hit = calculate_damage(weapon, defender.definition.stats.armor, &config.combat)
        .min(defender.health);
    Ok(AttackPreview {
        hit_chance,
        damage_on_hit,
        expected_damage: hit_chance * damage_on_hit as f32,
    })
}

/// Validate, roll once and describe a unit attack
pub fn resolve_unit_attack(
    state: &TacticalBattleState,
    attacker_id: &UnitId,
    defender_id: &UnitId,
    weapon_id: &str,
    mode: AttackMode,
    config: &EngineConfig,
    rng: &mut dyn RandomSource,
) -> Result<UnitAttackResult, FailureReason> {
    let (attacker, defender, weapon) =
        validate_unit_attack(state, attacker_id, defender_id, weapon_id, mode, config)?;

    let hit_chance = calculate_hit_chance(attacker, defender, weapon, &state.map, &config.combat);
    let roll = rng.next_f32();
    let hit = roll < hit_chance;

    let damage = if hit {
        calculate_damage(weapon, defender.definition.stats.armor, &config.combat)
            .min(defender.health)
    } else {
        0
    };
    let defender_health = defender.health - damage;
    let destroyed = defender_health <= 0;

    let defender_morale =
        (!destroyed).then(|| check_morale_after_attack(defender, hit, damage, &config.morale));

    let gain = experience_gain(damage, destroyed, &config.progression);
    let attacker_experience =
        apply_experience(attacker.experience, attacker.level, gain, &config.progression);

    tracing::debug!(
        attacker = %attacker.id,
        defender = %defender.id,
        weapon = weapon_id,
        hit_chance,
        roll,
        hit,
        damage,
        "resolved unit attack"
    );

    Ok(UnitAttackResult {
        attacker: attacker.id.clone(),
        defender: defender.id.clone(),
        weapon: weapon_id.to_string(),
        hit_chance,
        roll,
        hit,
        damage,
        defender_health: defender_health.max(0),
        destroyed,
        defender_morale,
        attacker_experience,
        ap_cost: match mode {
            AttackMode::Action => weapon.ap_cost,
            AttackMode::Reaction => 0.0,
        },
        uses_ammo: attacker.ammo_for(weapon_id).is_some(),
    })
}

/// Validate, roll once and describe an attack on a destructible tile
pub fn resolve_tile_attack(
    state: &TacticalBattleState,
    attacker_id: &UnitId,
    target: GridCoord,
    weapon_id: &str,
    config: &EngineConfig,
    rng: &mut dyn RandomSource,
) -> Result<TileAttackResult, FailureReason> {
    let attacker = state.unit(attacker_id).ok_or(FailureReason::UnknownUnit)?;
    let weapon = check_weapon_ready(attacker, weapon_id)?;

    let tile = state.map.tile(target).ok_or(FailureReason::OutOfBounds)?;
    let Some(structure) = tile.destructible else {
        return Err(FailureReason::TileNotDestructible);
    };
    if !weapon.can_attack_tiles {
        return Err(FailureReason::WeaponCannotTargetTiles);
    }
    if !weapon.in_range(state.map.distance(attacker.position, target)) {
        return Err(FailureReason::OutOfRange);
    }
    if !state.is_visible_to(attacker.faction(), target) {
        return Err(FailureReason::TargetNotDetected);
    }
    check_costs(attacker, weapon_id, weapon, AttackMode::Action)?;

    let hit_chance =
        calculate_tile_hit_chance(attacker, target, weapon, &state.map, &config.combat);
    let roll = rng.next_f32();
    let hit = roll < hit_chance;

    let damage = if hit {
        weapon.power.max(config.combat.min_chip_damage).min(structure.hp)
    } else {
        0
    };
    let remaining_hp = (structure.hp - damage).max(0);

    tracing::debug!(
        attacker = %attacker.id,
        at = %target,
        weapon = weapon_id,
        hit_chance,
        roll,
        hit,
        damage,
        "resolved tile attack"
    );

    Ok(TileAttackResult {
        attacker: attacker.id.clone(),
        at: target,
        weapon: weapon_id.to_string(),
        hit_chance,
        roll,
        hit,
        damage,
        remaining_hp,
        destroyed: hit && remaining_hp == 0,
        ap_cost: weapon.ap_cost,
        uses_ammo: attacker.ammo_for(weapon_id).is_some(),
    })
}
