// Progression tuning: XP thresholds, battle rewards and stat growth.
//
// `ProgressionConfig` is serde-loadable so balance can change without a
// rebuild (`ProgressionConfig::from_json`, used by the `duel_bot --progression`
// flag). Every field has a default, and a partial JSON object only overrides
// what it names.
//
// Progression only touches a client's own creature, so two clients with
// different configs still keep their battle mirrors in sync.

use petduel_prng::DuelRng;
use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// Inclusive range a stat grows by on level-up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrowthRange {
    pub min: i32,
    pub max: i32,
}

impl GrowthRange {
    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn roll(&self, rng: &mut DuelRng) -> i32 {
        rng.range_i32_inclusive(self.min.min(self.max), self.max.max(self.min))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionConfig {
    /// XP needed to leave level N is `N * xp_per_level`.
    pub xp_per_level: i64,
    /// XP granted to the winner of a networked battle.
    pub win_xp: i64,
    /// XP taken from the loser of a networked battle.
    pub loss_xp: i64,
    pub hp_growth: GrowthRange,
    pub attack_growth: GrowthRange,
    pub defense_growth: GrowthRange,
    pub speed_growth: GrowthRange,
    /// Ability slots per creature.
    pub max_abilities: usize,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            xp_per_level: 100,
            win_xp: 100,
            loss_xp: 50,
            hp_growth: GrowthRange::new(3, 7),
            attack_growth: GrowthRange::new(1, 3),
            defense_growth: GrowthRange::new(1, 3),
            speed_growth: GrowthRange::new(1, 3),
            max_abilities: 4,
        }
    }
}

impl ProgressionConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if self.xp_per_level <= 0 {
            return Err(SimError::InvalidConfig("xp_per_level must be positive".into()));
        }
        if self.win_xp < 0 || self.loss_xp < 0 {
            return Err(SimError::InvalidConfig(
                "win_xp and loss_xp must not be negative".into(),
            ));
        }
        for (name, range) in [
            ("hp_growth", self.hp_growth),
            ("attack_growth", self.attack_growth),
            ("defense_growth", self.defense_growth),
            ("speed_growth", self.speed_growth),
        ] {
            if range.min > range.max {
                return Err(SimError::InvalidConfig(format!("{name}: min > max")));
            }
        }
        if self.max_abilities == 0 || self.max_abilities > 4 {
            return Err(SimError::InvalidConfig(
                "max_abilities must be between 1 and 4".into(),
            ));
        }
        Ok(())
    }
}
