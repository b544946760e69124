//! Experience and leveling

use crate::core::config::ProgressionConfig;

/// Experience earned by one attack
pub fn experience_gain(damage: i32, killed: bool, config: &ProgressionConfig) -> u32 {
    let mut xp = damage.max(0) as u32 * config.xp_per_damage;
    if killed {
        xp += config.xp_kill_bonus;
    }
    xp
}

/// Result of adding experience
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperienceResult {
    pub experience: u32,
    pub level: u32,
    /// Each level reached, in order
    pub levels_gained: Vec<u32>,
}

/// Add experience. A unit at level N advances whenever its accumulated
/// experience reaches `xp_per_level * N`.
pub fn apply_experience(
    experience: u32,
    level: u32,
    gain: u32,
    config: &ProgressionConfig,
) -> ExperienceResult {
    let experience = experience.saturating_add(gain);
    let mut level = level.max(1);
    let mut levels_gained = Vec::new();

    while experience >= config.xp_per_level.saturating_mul(level) {
        level += 1;
        levels_gained.push(level);
    }

    ExperienceResult {
        experience,
        level,
        levels_gained,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gain_includes_kill_bonus() {
        let config = ProgressionConfig::default();
        assert_eq!(experience_gain(5, false, &config), 5);
        assert_eq!(experience_gain(5, true, &config), 5 + config.xp_kill_bonus);
    }

    #[test]
    fn test_crossing_threshold_levels_once() {
        let result = apply_experience(95, 1, 5, &ProgressionConfig::default());
        assert_eq!(result.level, 2);
        assert_eq!(result.levels_gained, vec![2]);
    }

    #[test]
    fn test_below_threshold_no_level() {
        let result = apply_experience(90, 1, 5, &ProgressionConfig::default());
        assert_eq!(result.level, 1);
        assert!(result.levels_gained.is_empty());
    }

    #[test]
    fn test_large_gain_levels_multiple_times() {
        // 100 -> level 2, 200 -> level 3
        let result = apply_experience(0, 1, 250, &ProgressionConfig::default());
        assert_eq!(result.level, 3);
        assert_eq!(result.levels_gained, vec![2, 3]);
    }
}
