//! Morale and stance transitions
//!
//! Damage drains morale. Heavy hits suppress; morale at the floor routs.
//! Routed units recover a little each turn and rally once steady again.

use crate::battle::units::{Stance, UnitInstance};
use crate::core::config::MoraleConfig;

/// Morale and stance a unit ends up with after being shot at
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoraleCheckResult {
    pub morale: f32,
    pub stance: Stance,
}

/// Morale outcome for a defender that survived an attack
pub fn check_morale_after_attack(
    defender: &UnitInstance,
    hit: bool,
    damage: i32,
    config: &MoraleConfig,
) -> MoraleCheckResult {
    let loss = if hit {
        damage as f32 * config.loss_per_damage
    } else {
        config.near_miss_loss
    };
    let morale = (defender.morale - loss).max(0.0);

    let severity = damage as f32 / defender.max_health().max(1) as f32;
    let stance = match defender.stance {
        Stance::Destroyed => Stance::Destroyed,
        _ if morale <= config.rout_threshold => Stance::Routed,
        Stance::Routed => Stance::Routed,
        _ if hit && severity >= config.suppression_ratio => Stance::Suppressed,
        current => current,
    };

    MoraleCheckResult { morale, stance }
}

/// Start-of-turn recovery: suppression wears off, routed units try to rally
pub fn recover_at_turn_start(unit: &UnitInstance, config: &MoraleConfig) -> MoraleCheckResult {
    match unit.stance {
        Stance::Suppressed => MoraleCheckResult {
            morale: unit.morale,
            stance: Stance::Ready,
        },
        Stance::Routed => {
            let cap = unit.definition.stats.morale;
            let morale = (unit.morale + config.rally_recovery).min(cap);
            let stance = if morale > config.rally_threshold {
                Stance::Suppressed
            } else {
                Stance::Routed
            };
            MoraleCheckResult { morale, stance }
        }
        stance => MoraleCheckResult {
            morale: unit.morale,
            stance,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::grid::GridCoord;
    use crate::battle::test_support::infantry_definition;
    use crate::battle::units::UnitId;

    fn unit() -> UnitInstance {
        // max health 20, morale 60
        UnitInstance::new(UnitId::new("u"), infantry_definition("blue"), GridCoord::new(0, 0))
    }

    #[test]
    fn test_light_hit_keeps_stance() {
        let result = check_morale_after_attack(&unit(), true, 2, &MoraleConfig::default());
        assert_eq!(result.stance, Stance::Ready);
        assert_eq!(result.morale, 58.0);
    }

    #[test]
    fn test_heavy_hit_suppresses() {
        let result = check_morale_after_attack(&unit(), true, 5, &MoraleConfig::default());
        assert_eq!(result.stance, Stance::Suppressed);
    }

    #[test]
    fn test_near_miss_costs_morale() {
        let result = check_morale_after_attack(&unit(), false, 0, &MoraleConfig::default());
        assert_eq!(result.stance, Stance::Ready);
        assert!(result.morale < 60.0);
    }

    #[test]
    fn test_low_morale_routs() {
        let mut u = unit();
        u.morale = 22.0;
        let result = check_morale_after_attack(&u, true, 3, &MoraleConfig::default());
        assert_eq!(result.stance, Stance::Routed);
    }

    #[test]
    fn test_suppression_wears_off() {
        let mut u = unit();
        u.stance = Stance::Suppressed;
        let result = recover_at_turn_start(&u, &MoraleConfig::default());
        assert_eq!(result.stance, Stance::Ready);
    }

    #[test]
    fn test_routed_rallies_over_time() {
        let config = MoraleConfig::default();
        let mut u = unit();
        u.stance = Stance::Routed;
        u.morale = 12.0;

        let first = recover_at_turn_start(&u, &config);
        assert_eq!(first.stance, Stance::Routed);
        assert_eq!(first.morale, 27.0);

        u.morale = first.morale;
        let second = recover_at_turn_start(&u, &config);
        assert_eq!(second.stance, Stance::Suppressed);
    }
}
