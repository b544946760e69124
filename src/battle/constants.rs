//! Battle system constants - default values for every tunable
//!
//! `EngineConfig::default()` is built from these. Anything a scenario wants to
//! retune goes through the config file instead of editing this module.

// Movement multipliers by stance
pub const READY_MOVE_MULTIPLIER: f32 = 1.0;
pub const SUPPRESSED_MOVE_MULTIPLIER: f32 = 1.3;
pub const ROUTED_MOVE_MULTIPLIER: f32 = 1.6;
pub const AIR_STEP_COST: f32 = 1.0;

// Upper bound on a definition's vision, mobility and weapon range (tiles)
pub const MAX_UNIT_REACH: u32 = 64;

// Vision (tiles)
pub const VISION_BOOST_BONUS: u32 = 2;
pub const LOS_BLOCKING_COVER: i32 = 3;

// Hit chance modifiers (additive, probability units)
pub const ELEVATION_HIT_BONUS: f32 = 0.05;
pub const COVER_HIT_PENALTY: f32 = 0.1;
pub const SUPPRESSED_HIT_PENALTY: f32 = 0.15;
pub const SPOTTED_HIT_BONUS: f32 = 0.05;
pub const LEVEL_ACCURACY_BONUS: f32 = 0.02;

// Damage
pub const MIN_CHIP_DAMAGE: i32 = 1;
pub const RESUPPLY_AP_COST: f32 = 1.0;

// Morale
pub const MORALE_LOSS_PER_DAMAGE: f32 = 1.0;
pub const NEAR_MISS_MORALE_LOSS: f32 = 2.0;
pub const SUPPRESSION_DAMAGE_RATIO: f32 = 0.25;
pub const ROUT_MORALE_THRESHOLD: f32 = 20.0;
pub const RALLY_MORALE_RECOVERY: f32 = 15.0;
pub const RALLY_MORALE_THRESHOLD: f32 = 40.0;

// Progression
pub const XP_PER_DAMAGE: u32 = 1;
pub const XP_KILL_BONUS: u32 = 25;
pub const XP_PER_LEVEL: u32 = 100;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stance_multipliers_ordered() {
        assert!(READY_MOVE_MULTIPLIER < SUPPRESSED_MOVE_MULTIPLIER);
        assert!(SUPPRESSED_MOVE_MULTIPLIER < ROUTED_MOVE_MULTIPLIER);
    }

    #[test]
    fn test_rally_above_rout() {
        assert!(RALLY_MORALE_THRESHOLD > ROUT_MORALE_THRESHOLD);
    }

    #[test]
    fn test_hit_modifiers_positive() {
        assert!(ELEVATION_HIT_BONUS > 0.0);
        assert!(COVER_HIT_PENALTY > 0.0);
    }
}
