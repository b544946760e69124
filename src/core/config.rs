//! Engine configuration with documented tunables
//!
//! Every coefficient the resolver, pathfinder and visibility code use lives
//! here. Defaults come from `battle::constants`; scenario files can override
//! any subset through TOML.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::battle::constants::*;
use crate::battle::units::Stance;
use crate::core::error::ConfigError;

/// Movement cost tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    pub ready_multiplier: f32,
    pub suppressed_multiplier: f32,
    pub routed_multiplier: f32,
    /// Flat cost per step for airborne units
    pub air_step_cost: f32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            ready_multiplier: READY_MOVE_MULTIPLIER,
            suppressed_multiplier: SUPPRESSED_MOVE_MULTIPLIER,
            routed_multiplier: ROUTED_MOVE_MULTIPLIER,
            air_step_cost: AIR_STEP_COST,
        }
    }
}

impl MovementConfig {
    /// Multiplier applied to every step. Destroyed units never move.
    pub fn stance_multiplier(&self, stance: Stance) -> f32 {
        match stance {
            Stance::Ready => self.ready_multiplier,
            Stance::Suppressed => self.suppressed_multiplier,
            Stance::Routed => self.routed_multiplier,
            Stance::Destroyed => f32::INFINITY,
        }
    }
}

/// Vision and line-of-sight tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilityConfig {
    /// Extra radius for a unit standing on a vision-boost tile
    pub vision_boost_bonus: u32,
    /// Intermediate tiles with at least this much cover block sight
    pub los_blocking_cover: i32,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            vision_boost_bonus: VISION_BOOST_BONUS,
            los_blocking_cover: LOS_BLOCKING_COVER,
        }
    }
}

/// Hit chance and damage tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// Added per level of elevation advantage
    pub elevation_bonus: f32,
    /// Subtracted per point of defender cover
    pub cover_penalty: f32,
    pub suppressed_penalty: f32,
    pub spotted_bonus: f32,
    /// Added per level above 1
    pub level_accuracy_bonus: f32,
    pub min_chip_damage: i32,
    pub resupply_ap_cost: f32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            elevation_bonus: ELEVATION_HIT_BONUS,
            cover_penalty: COVER_HIT_PENALTY,
            suppressed_penalty: SUPPRESSED_HIT_PENALTY,
            spotted_bonus: SPOTTED_HIT_BONUS,
            level_accuracy_bonus: LEVEL_ACCURACY_BONUS,
            min_chip_damage: MIN_CHIP_DAMAGE,
            resupply_ap_cost: RESUPPLY_AP_COST,
        }
    }
}

/// Morale and stance transition tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoraleConfig {
    pub loss_per_damage: f32,
    pub near_miss_loss: f32,
    /// Damage / max health at or above this suppresses
    pub suppression_ratio: f32,
    /// Morale at or below this routs
    pub rout_threshold: f32,
    /// Morale a routed unit regains at the start of its turn
    pub rally_recovery: f32,
    /// Routed units above this rally to suppressed
    pub rally_threshold: f32,
}

impl Default for MoraleConfig {
    fn default() -> Self {
        Self {
            loss_per_damage: MORALE_LOSS_PER_DAMAGE,
            near_miss_loss: NEAR_MISS_MORALE_LOSS,
            suppression_ratio: SUPPRESSION_DAMAGE_RATIO,
            rout_threshold: ROUT_MORALE_THRESHOLD,
            rally_recovery: RALLY_MORALE_RECOVERY,
            rally_threshold: RALLY_MORALE_THRESHOLD,
        }
    }
}

/// Experience and leveling tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionConfig {
    pub xp_per_damage: u32,
    pub xp_kill_bonus: u32,
    /// Level N -> N+1 once experience reaches `xp_per_level * N`
    pub xp_per_level: u32,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            xp_per_damage: XP_PER_DAMAGE,
            xp_kill_bonus: XP_KILL_BONUS,
            xp_per_level: XP_PER_LEVEL,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub movement: MovementConfig,
    pub visibility: VisibilityConfig,
    pub combat: CombatConfig,
    pub morale: MoraleConfig,
    pub progression: ProgressionConfig,
}

impl EngineConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML. Missing sections and fields keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file on disk
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.movement;
        if m.ready_multiplier <= 0.0 || m.suppressed_multiplier <= 0.0 || m.routed_multiplier <= 0.0
        {
            return Err(ConfigError::Invalid(
                "stance movement multipliers must be positive".into(),
            ));
        }
        if m.air_step_cost < 0.0 {
            return Err(ConfigError::Invalid("air_step_cost must be >= 0".into()));
        }

        let c = &self.combat;
        if c.elevation_bonus <= 0.0 || c.cover_penalty <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "elevation_bonus ({}) and cover_penalty ({}) must be positive",
                c.elevation_bonus, c.cover_penalty
            )));
        }
        if c.min_chip_damage < 0 {
            return Err(ConfigError::Invalid("min_chip_damage must be >= 0".into()));
        }

        if self.morale.rally_threshold <= self.morale.rout_threshold {
            return Err(ConfigError::Invalid(format!(
                "rally_threshold ({}) should be > rout_threshold ({})",
                self.morale.rally_threshold, self.morale.rout_threshold
            )));
        }

        if self.progression.xp_per_level == 0 {
            return Err(ConfigError::Invalid("xp_per_level must be positive".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [combat]
            elevation_bonus = 0.1

            [movement]
            routed_multiplier = 2.0
            "#,
        )
        .expect("partial config should parse");

        assert_eq!(config.combat.elevation_bonus, 0.1);
        assert_eq!(config.combat.cover_penalty, COVER_HIT_PENALTY);
        assert_eq!(config.movement.routed_multiplier, 2.0);
        assert_eq!(config.morale, MoraleConfig::default());
    }

    #[test]
    fn test_invalid_toml_rejected() {
        let err = EngineConfig::from_toml_str("[morale]\nrally_threshold = 1.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = EngineConfig::from_toml_str("combat = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_stance_multiplier() {
        let m = MovementConfig::default();
        assert_eq!(m.stance_multiplier(Stance::Ready), 1.0);
        assert!(m.stance_multiplier(Stance::Destroyed).is_infinite());
    }
}
