//! Turn processor: the only code that mutates a battle
//!
//! Each action validates, resolves against a read-only view of the state,
//! then applies the result and appends timeline events. Vision and victory
//! are rechecked after every accepted action. A rejected action returns an
//! `ActionError` and leaves the state untouched.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::battle::actions::{ActionError, ActionKind, ActionOutcome, FailureReason};
use crate::battle::events::{Timeline, TimelineEntry, TimelineEvent};
use crate::battle::grid::GridCoord;
use crate::battle::morale::recover_at_turn_start;
use crate::battle::pathfinding::{self, Mover, Path, PathOptions, COST_EPSILON};
use crate::battle::resolution::{
    preview_unit_attack, resolve_tile_attack, resolve_unit_attack, AttackMode, AttackPreview,
    TileAttackResult, UnitAttackResult,
};
use crate::battle::rng::RandomSource;
use crate::battle::state::{BattlePhase, TacticalBattleState};
use crate::battle::unit_type::UnitType;
use crate::battle::units::{FactionId, Stance, StatusEffect, UnitId, UnitInstance};
use crate::battle::visibility::{compute_all_vision, detected_enemies};
use crate::core::config::EngineConfig;

/// Caller-supplied victory condition, checked after every action
pub type Objective = Box<dyn Fn(&TacticalBattleState) -> Option<FactionId>>;

/// A running battle
pub struct Battle {
    state: TacticalBattleState,
    config: EngineConfig,
    objective: Option<Objective>,
}

impl fmt::Debug for Battle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Battle")
            .field("state", &self.state)
            .field("config", &self.config)
            .field("objective", &self.objective.is_some())
            .finish()
    }
}

impl Battle {
    /// Start a freshly built battle: full action points, initial vision and
    /// spotting, empty timeline
    pub fn start(mut state: TacticalBattleState, config: EngineConfig) -> Self {
        for side in &mut state.sides {
            for unit in side.units.values_mut() {
                unit.action_points = unit.max_action_points();
            }
        }
        let mut battle = Self {
            state,
            config,
            objective: None,
        };
        battle.refresh_vision(false);
        battle.state.assert_invariants();
        battle
    }

    /// Continue a battle from a saved state as-is
    pub fn resume(state: TacticalBattleState, config: EngineConfig) -> Self {
        state.assert_invariants();
        Self {
            state,
            config,
            objective: None,
        }
    }

    /// Install an extra victory condition
    pub fn with_objective(
        mut self,
        objective: impl Fn(&TacticalBattleState) -> Option<FactionId> + 'static,
    ) -> Self {
        self.objective = Some(Box::new(objective));
        self
    }

    pub fn state(&self) -> &TacticalBattleState {
        &self.state
    }

    pub fn into_state(self) -> TacticalBattleState {
        self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn timeline(&self) -> &Timeline {
        &self.state.timeline
    }

    /// Timeline entries appended since `cursor`
    pub fn events_since(&self, cursor: usize) -> &[TimelineEntry] {
        self.state.timeline.since(cursor)
    }

    pub fn active_faction(&self) -> &FactionId {
        self.state.active_faction()
    }

    pub fn turn(&self) -> u32 {
        self.state.turn
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    pub fn winner(&self) -> Option<&FactionId> {
        self.state.winner()
    }

    /// Tile indices a faction currently sees
    pub fn visible_tiles(&self, faction: &FactionId) -> Option<&BTreeSet<usize>> {
        self.state.vision_of(faction).map(|v| &v.visible)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Everywhere the unit could move with its remaining action points
    pub fn reachable_tiles(&self, unit_id: &UnitId) -> Result<BTreeMap<GridCoord, f32>, ActionError> {
        let unit = self
            .state
            .unit(unit_id)
            .ok_or(ActionError::new(ActionKind::Move, FailureReason::UnknownUnit))?;
        Ok(pathfinding::reachable_tiles(
            &self.state,
            &Mover::of(unit),
            unit.position,
            unit.action_points,
            &self.config.movement,
        ))
    }

    /// The path `move_unit` would take, without moving
    pub fn plan_move(&self, unit_id: &UnitId, to: GridCoord) -> Result<Path, ActionError> {
        let fail = |reason| ActionError::new(ActionKind::Move, reason);
        let unit = self.state.unit(unit_id).ok_or(fail(FailureReason::UnknownUnit))?;
        pathfinding::find_path(
            &self.state,
            &Mover::of(unit),
            unit.position,
            to,
            &PathOptions::with_max_cost(unit.action_points),
            &self.config.movement,
        )
        .map_err(|e| fail(FailureReason::PathNotFound(e)))
    }

    /// Hit chance and expected damage without rolling
    pub fn attack_preview(
        &self,
        attacker_id: &UnitId,
        defender_id: &UnitId,
        weapon_id: &str,
    ) -> Result<AttackPreview, ActionError> {
        preview_unit_attack(&self.state, attacker_id, defender_id, weapon_id, &self.config)
            .map_err(|reason| ActionError::new(ActionKind::AttackUnit, reason))
    }

    // ------------------------------------------------------------------
    // Actions
    // ------------------------------------------------------------------

    /// Move a unit along the cheapest legal path. Enemy units on overwatch
    /// may fire at it where it stops.
    pub fn move_unit(
        &mut self,
        unit_id: &UnitId,
        to: GridCoord,
        rng: &mut dyn RandomSource,
    ) -> Result<ActionOutcome, ActionError> {
        let kind = ActionKind::Move;
        let start = self.state.timeline.len();

        let unit = self.check_actor(kind, unit_id)?;
        if unit.position == to {
            return Err(self.reject(kind, FailureReason::AlreadyThere));
        }
        let from = unit.position;
        let path = pathfinding::find_path(
            &self.state,
            &Mover::of(unit),
            from,
            to,
            &PathOptions::with_max_cost(unit.action_points),
            &self.config.movement,
        )
        .map_err(|e| self.reject(kind, FailureReason::PathNotFound(e)))?;

        if let Some(unit) = self.state.unit_mut(unit_id) {
            unit.position = to;
            unit.action_points = (unit.action_points - path.cost).max(0.0);
            unit.status.remove(&StatusEffect::Overwatch);
            unit.overwatch_weapon = None;
        }
        tracing::debug!(unit = %unit_id, %from, %to, cost = path.cost, "unit moved");
        self.emit(TimelineEvent::UnitMoved {
            unit_id: unit_id.clone(),
            from,
            to,
            path: path.steps,
            cost: path.cost,
        });

        self.refresh_vision(true);
        if self.resolve_overwatch(unit_id, rng) {
            self.refresh_vision(true);
        }
        Ok(self.finish(kind, start))
    }

    /// Fire a weapon at an enemy unit
    pub fn attack_unit(
        &mut self,
        attacker_id: &UnitId,
        defender_id: &UnitId,
        weapon_id: &str,
        rng: &mut dyn RandomSource,
    ) -> Result<ActionOutcome, ActionError> {
        let kind = ActionKind::AttackUnit;
        let start = self.state.timeline.len();

        self.check_actor(kind, attacker_id)?;
        let result = resolve_unit_attack(
            &self.state,
            attacker_id,
            defender_id,
            weapon_id,
            AttackMode::Action,
            &self.config,
            rng,
        )
        .map_err(|reason| self.reject(kind, reason))?;

        if let Some(attacker) = self.state.unit_mut(attacker_id) {
            attacker.status.remove(&StatusEffect::Overwatch);
            attacker.overwatch_weapon = None;
        }
        self.apply_unit_attack(result);
        self.refresh_vision(true);
        Ok(self.finish(kind, start))
    }

    /// Fire a weapon at a destructible tile
    pub fn attack_tile(
        &mut self,
        attacker_id: &UnitId,
        target: GridCoord,
        weapon_id: &str,
        rng: &mut dyn RandomSource,
    ) -> Result<ActionOutcome, ActionError> {
        let kind = ActionKind::AttackTile;
        let start = self.state.timeline.len();

        self.check_actor(kind, attacker_id)?;
        let result = resolve_tile_attack(
            &self.state,
            attacker_id,
            target,
            weapon_id,
            &self.config,
            rng,
        )
        .map_err(|reason| self.reject(kind, reason))?;

        self.apply_tile_attack(result);
        self.refresh_vision(true);
        Ok(self.finish(kind, start))
    }

    /// Hold a weapon ready to fire at the first enemy that stops in range
    pub fn set_overwatch(
        &mut self,
        unit_id: &UnitId,
        weapon_id: &str,
    ) -> Result<ActionOutcome, ActionError> {
        let kind = ActionKind::Overwatch;
        let start = self.state.timeline.len();

        let unit = self.check_actor(kind, unit_id)?;
        if unit.stance == Stance::Routed {
            return Err(self.reject(kind, FailureReason::UnitRouted));
        }
        let Some(weapon) = unit.weapon(weapon_id) else {
            return Err(self.reject(kind, FailureReason::UnknownWeapon));
        };
        if !unit.has_ammo(weapon_id) {
            return Err(self.reject(kind, FailureReason::OutOfAmmo));
        }
        let cost = weapon.ap_cost;
        if unit.action_points + COST_EPSILON < cost {
            return Err(self.reject(kind, FailureReason::InsufficientActionPoints));
        }

        if let Some(unit) = self.state.unit_mut(unit_id) {
            unit.action_points = (unit.action_points - cost).max(0.0);
            unit.status.insert(StatusEffect::Overwatch);
            unit.overwatch_weapon = Some(weapon_id.to_string());
        }
        tracing::debug!(unit = %unit_id, weapon = weapon_id, "overwatch set");
        self.emit(TimelineEvent::OverwatchSet {
            unit_id: unit_id.clone(),
            weapon: weapon_id.to_string(),
        });
        Ok(self.finish(kind, start))
    }

    /// Refill ammo from a supply tile or an adjacent support unit
    pub fn resupply(&mut self, unit_id: &UnitId) -> Result<ActionOutcome, ActionError> {
        let kind = ActionKind::Resupply;
        let start = self.state.timeline.len();

        let unit = self.check_actor(kind, unit_id)?;
        if unit.stance == Stance::Routed {
            return Err(self.reject(kind, FailureReason::UnitRouted));
        }
        let cost = self.config.combat.resupply_ap_cost;
        if unit.action_points + COST_EPSILON < cost {
            return Err(self.reject(kind, FailureReason::InsufficientActionPoints));
        }
        if !has_supply_source(&self.state, unit) {
            return Err(self.reject(kind, FailureReason::NoSupplySource));
        }

        if let Some(unit) = self.state.unit_mut(unit_id) {
            unit.action_points = (unit.action_points - cost).max(0.0);
            unit.refill_ammo();
        }
        tracing::debug!(unit = %unit_id, "unit resupplied");
        self.emit(TimelineEvent::UnitResupplied {
            unit_id: unit_id.clone(),
        });
        Ok(self.finish(kind, start))
    }

    /// End the active faction's turn: upkeep, then hand over to the next
    /// faction still in the fight
    pub fn end_turn(&mut self) -> Result<ActionOutcome, ActionError> {
        let kind = ActionKind::EndTurn;
        let start = self.state.timeline.len();
        if self.state.is_finished() {
            return Err(self.reject(kind, FailureReason::BattleFinished));
        }

        let ending = self.state.active_faction().clone();
        self.auto_resupply(&ending);
        self.emit(TimelineEvent::TurnEnded {
            faction: ending.clone(),
            turn: self.state.turn,
        });

        self.advance_active_side();
        let starting = self.state.active_faction().clone();
        tracing::info!(ended = %ending, started = %starting, turn = self.state.turn, "turn handed over");
        self.emit(TimelineEvent::TurnStarted {
            faction: starting.clone(),
            turn: self.state.turn,
        });
        self.start_of_turn_upkeep(&starting);

        self.refresh_vision(true);
        Ok(self.finish(kind, start))
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn emit(&mut self, event: TimelineEvent) {
        let turn = self.state.turn;
        self.state.timeline.push(turn, event);
    }

    fn reject(&self, kind: ActionKind, reason: FailureReason) -> ActionError {
        tracing::debug!(?kind, %reason, "action rejected");
        ActionError::new(kind, reason)
    }

    /// Common actor checks: battle running, unit exists, belongs to the
    /// active faction, not destroyed
    fn check_actor(&self, kind: ActionKind, unit_id: &UnitId) -> Result<&UnitInstance, ActionError> {
        if self.state.is_finished() {
            return Err(self.reject(kind, FailureReason::BattleFinished));
        }
        let Some(unit) = self.state.unit(unit_id) else {
            return Err(self.reject(kind, FailureReason::UnknownUnit));
        };
        if unit.faction() != self.state.active_faction() {
            return Err(self.reject(kind, FailureReason::NotActiveFaction));
        }
        if unit.is_destroyed() {
            return Err(self.reject(kind, FailureReason::UnitDestroyed));
        }
        Ok(unit)
    }

    /// Victory check, invariant check, outcome
    fn finish(&mut self, kind: ActionKind, start: usize) -> ActionOutcome {
        self.check_victory();
        self.state.assert_invariants();
        ActionOutcome {
            kind,
            events: start..self.state.timeline.len(),
        }
    }

    fn apply_unit_attack(&mut self, result: UnitAttackResult) {
        if let Some(attacker) = self.state.unit_mut(&result.attacker) {
            attacker.action_points = (attacker.action_points - result.ap_cost).max(0.0);
            if result.uses_ammo {
                if let Some(ammo) = attacker.ammo.get_mut(&result.weapon) {
                    *ammo = ammo.saturating_sub(1);
                }
            }
            attacker.experience = result.attacker_experience.experience;
            attacker.level = result.attacker_experience.level;
        }

        self.emit(TimelineEvent::UnitAttacked {
            attacker: result.attacker.clone(),
            defender: result.defender.clone(),
            weapon: result.weapon.clone(),
            hit_chance: result.hit_chance,
            roll: result.roll,
            hit: result.hit,
            damage: result.damage,
            remaining_health: result.defender_health,
        });

        let mut stance_change = None;
        let mut destroyed_at = None;
        if let Some(defender) = self.state.unit_mut(&result.defender) {
            defender.health = result.defender_health;
            if result.destroyed {
                defender.stance = Stance::Destroyed;
                defender.action_points = 0.0;
                defender.status.clear();
                defender.overwatch_weapon = None;
                destroyed_at = Some(defender.position);
            } else if let Some(check) = result.defender_morale {
                defender.morale = check.morale;
                if check.stance != defender.stance {
                    stance_change = Some((defender.stance, check.stance));
                    defender.stance = check.stance;
                    if check.stance == Stance::Routed {
                        defender.status.remove(&StatusEffect::Overwatch);
                        defender.overwatch_weapon = None;
                    }
                }
            }
        }

        if let Some(at) = destroyed_at {
            tracing::info!(unit = %result.defender, %at, by = %result.attacker, "unit destroyed");
            self.emit(TimelineEvent::UnitDestroyed {
                unit_id: result.defender.clone(),
                at,
            });
        }
        if let Some((from, to)) = stance_change {
            self.emit(TimelineEvent::UnitStanceChanged {
                unit_id: result.defender.clone(),
                from,
                to,
            });
        }
        for level in result.attacker_experience.levels_gained {
            tracing::debug!(unit = %result.attacker, level, "unit leveled up");
            self.emit(TimelineEvent::UnitLeveled {
                unit_id: result.attacker.clone(),
                level,
            });
        }
    }

    fn apply_tile_attack(&mut self, result: TileAttackResult) {
        if let Some(attacker) = self.state.unit_mut(&result.attacker) {
            attacker.action_points = (attacker.action_points - result.ap_cost).max(0.0);
            if result.uses_ammo {
                if let Some(ammo) = attacker.ammo.get_mut(&result.weapon) {
                    *ammo = ammo.saturating_sub(1);
                }
            }
        }
        if let Some(tile) = self.state.map.tile_mut(result.at) {
            if result.destroyed {
                tile.destroy();
            } else if let Some(structure) = tile.destructible.as_mut() {
                structure.hp = result.remaining_hp;
            }
        }

        self.emit(TimelineEvent::TileAttacked {
            attacker: result.attacker.clone(),
            at: result.at,
            weapon: result.weapon.clone(),
            hit_chance: result.hit_chance,
            roll: result.roll,
            hit: result.hit,
            damage: result.damage,
            remaining_hp: result.remaining_hp,
        });
        if result.destroyed {
            tracing::info!(at = %result.at, by = %result.attacker, "tile destroyed");
            self.emit(TimelineEvent::TileDestroyed { at: result.at });
        }
    }

    /// Enemy overwatchers take one reaction shot each at a unit that just
    /// moved, until it dies. Returns true if anyone fired.
    fn resolve_overwatch(&mut self, target_id: &UnitId, rng: &mut dyn RandomSource) -> bool {
        let Some(target_faction) = self.state.unit(target_id).map(|u| u.faction().clone()) else {
            return false;
        };
        let watchers: Vec<(UnitId, String)> = self
            .state
            .enemies_of(&target_faction)
            .filter(|u| u.has_status(StatusEffect::Overwatch))
            .filter_map(|u| u.overwatch_weapon.clone().map(|w| (u.id.clone(), w)))
            .collect();

        let mut fired = false;
        for (watcher_id, weapon_id) in watchers {
            if self.state.unit(target_id).map_or(true, |u| u.is_destroyed()) {
                break;
            }
            match resolve_unit_attack(
                &self.state,
                &watcher_id,
                target_id,
                &weapon_id,
                AttackMode::Reaction,
                &self.config,
                rng,
            ) {
                Ok(result) => {
                    if let Some(watcher) = self.state.unit_mut(&watcher_id) {
                        watcher.status.remove(&StatusEffect::Overwatch);
                        watcher.overwatch_weapon = None;
                    }
                    tracing::debug!(watcher = %watcher_id, target = %target_id, "overwatch fired");
                    self.emit(TimelineEvent::OverwatchTriggered {
                        unit_id: watcher_id,
                        target: target_id.clone(),
                    });
                    self.apply_unit_attack(result);
                    fired = true;
                }
                Err(reason) => {
                    tracing::trace!(watcher = %watcher_id, %reason, "overwatch held");
                }
            }
        }
        fired
    }

    /// Refill units of the ending faction that stand on a supply source
    fn auto_resupply(&mut self, faction: &FactionId) {
        let eligible: Vec<UnitId> = self
            .state
            .side(faction)
            .into_iter()
            .flat_map(|s| s.living_units())
            .filter(|u| u.can_fight() && has_supply_source(&self.state, u))
            .map(|u| u.id.clone())
            .collect();

        for unit_id in eligible {
            let refilled = self
                .state
                .unit_mut(&unit_id)
                .map_or(false, |u| u.refill_ammo());
            if refilled {
                self.emit(TimelineEvent::UnitResupplied { unit_id });
            }
        }
    }

    /// Next faction with living units; wrapping past the last one starts a
    /// new round
    fn advance_active_side(&mut self) {
        let count = self.state.sides.len();
        for _ in 0..count {
            self.state.active_side = (self.state.active_side + 1) % count;
            if self.state.active_side == 0 {
                self.state.turn += 1;
            }
            if !self.state.sides[self.state.active_side].is_defeated() {
                return;
            }
        }
    }

    /// Stance decay, rally, overwatch expiry and AP reset for the faction
    /// whose turn begins
    fn start_of_turn_upkeep(&mut self, faction: &FactionId) {
        let morale_config = self.config.morale.clone();
        let mut changes = Vec::new();

        if let Some(side) = self.state.sides.iter_mut().find(|s| &s.faction == faction) {
            for unit in side.units.values_mut().filter(|u| u.is_alive()) {
                let recovery = recover_at_turn_start(unit, &morale_config);
                unit.morale = recovery.morale;
                if recovery.stance != unit.stance {
                    changes.push((unit.id.clone(), unit.stance, recovery.stance));
                    unit.stance = recovery.stance;
                }
                unit.status.remove(&StatusEffect::Overwatch);
                unit.overwatch_weapon = None;
                unit.action_points = unit.max_action_points();
            }
        }

        for (unit_id, from, to) in changes {
            self.emit(TimelineEvent::UnitStanceChanged { unit_id, from, to });
        }
    }

    /// Recompute every faction's vision and the spotted tags. Newly spotted
    /// units are announced when `announce` is set.
    fn refresh_vision(&mut self, announce: bool) {
        let config = &self.config.visibility;
        for (faction, visible) in compute_all_vision(&self.state, config) {
            self.state.vision.entry(faction).or_default().update(visible);
        }

        let mut spotted_by: BTreeMap<UnitId, FactionId> = BTreeMap::new();
        for faction in self.state.factions() {
            for unit_id in detected_enemies(&self.state, faction, config) {
                spotted_by.entry(unit_id).or_insert_with(|| faction.clone());
            }
        }

        let mut newly_spotted = Vec::new();
        for side in &mut self.state.sides {
            for unit in side.units.values_mut() {
                match spotted_by.get(&unit.id) {
                    Some(by) => {
                        if unit.status.insert(StatusEffect::Spotted) {
                            newly_spotted.push((unit.id.clone(), by.clone()));
                        }
                    }
                    None => {
                        unit.status.remove(&StatusEffect::Spotted);
                    }
                }
            }
        }

        if announce {
            for (unit_id, by) in newly_spotted {
                self.emit(TimelineEvent::UnitSpotted { unit_id, by });
            }
        }
    }

    fn check_victory(&mut self) {
        if self.state.is_finished() {
            return;
        }
        let surviving = self.state.surviving_factions();
        let outcome = if surviving.len() <= 1 {
            Some(surviving.first().map(|f| (*f).clone()))
        } else {
            self.objective
                .as_ref()
                .and_then(|objective| objective(&self.state))
                .map(Some)
        };

        if let Some(winner) = outcome {
            match &winner {
                Some(faction) => tracing::info!(winner = %faction, turn = self.state.turn, "battle ended"),
                None => tracing::info!(turn = self.state.turn, "battle ended without a winner"),
            }
            self.state.phase = BattlePhase::Finished {
                winner: winner.clone(),
            };
            self.emit(TimelineEvent::BattleEnded { winner });
        }
    }
}

/// Standing on a supply tile or next to a friendly support unit
pub fn has_supply_source(state: &TacticalBattleState, unit: &UnitInstance) -> bool {
    if state.map.tile(unit.position).is_some_and(|t| t.supply) {
        return true;
    }
    state.map.neighbors(unit.position).into_iter().any(|c| {
        state.unit_at(c).is_some_and(|other| {
            other.id != unit.id
                && other.faction() == unit.faction()
                && other.unit_type() == UnitType::Support
        })
    })
}
