// Abilities: the four moves a creature can use in battle.
//
// `Ability` is the live form of `AbilitySnapshot`; conversion both ways is
// lossless. Power scales with tier (+20% per tier above 1), computed in
// integer tenths so both mirrors of a battle agree bit-for-bit.
//
// See also: `species.rs` for the pools new abilities are rolled from,
// `effect.rs` for the secondary effect an ability may carry.

use petduel_prng::DuelRng;
use petduel_protocol::{AbilityKind, AbilitySnapshot};

use crate::effect::{Effect, Stat, StatusKind};
use crate::species::{AbilityTemplate, Species};

/// Energy every pooled ability costs.
pub const DEFAULT_ENERGY_COST: i32 = 10;

#[derive(Clone, Debug, PartialEq)]
pub struct Ability {
    pub name: String,
    pub base_damage: i32,
    pub kind: AbilityKind,
    pub tier: u8,
    pub min_level: u32,
    pub energy_cost: i32,
    pub effect_value: f64,
    pub duration: u32,
    pub cooldown: u32,
}

impl Ability {
    pub fn from_template(template: &AbilityTemplate) -> Self {
        Self {
            name: template.name.into(),
            base_damage: template.base_damage,
            kind: template.kind,
            tier: 1,
            min_level: 1,
            energy_cost: DEFAULT_ENERGY_COST,
            effect_value: template.effect_value,
            duration: template.duration,
            cooldown: 0,
        }
    }

    /// Roll a random ability from the species pool.
    ///
    /// Always tier 1: higher tiers are reserved for abilities that arrive
    /// through snapshots.
    pub fn roll(species: Species, rng: &mut DuelRng) -> Self {
        let pool: Vec<&AbilityTemplate> = species.ability_pool().collect();
        // The pool always holds the common abilities, so it is never empty.
        let index = rng.choose_index(pool.len()).unwrap_or(0);
        Self::from_template(pool[index])
    }

    /// Damage contribution: `floor(base_damage * (1 + 0.2 * (tier - 1)))`.
    /// Tier 0 is not clamped up and scales by 0.8.
    pub fn power(&self) -> i32 {
        let tenths = 10 + 2 * (i64::from(self.tier) - 1);
        let scaled = i64::from(self.base_damage) * tenths;
        scaled.div_euclid(10).clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
    }

    /// Secondary effect, if the ability has one. Only abilities with both a
    /// duration and a non-zero effect value trigger anything.
    pub fn effect(&self) -> Option<Effect> {
        if self.duration == 0 || self.effect_value == 0.0 {
            return None;
        }
        match self.kind {
            AbilityKind::Damage => None,
            AbilityKind::Buff => Some(Effect::Buff {
                stat: Stat::Attack,
                multiplier: 1.0 + self.effect_value,
                duration: self.duration,
            }),
            AbilityKind::Debuff => Some(Effect::Debuff {
                stat: Stat::Defense,
                multiplier: (1.0 - self.effect_value).max(0.0),
                duration: self.duration,
            }),
            AbilityKind::Heal => Some(Effect::Heal {
                amount: self.effect_value,
            }),
            AbilityKind::Status => Some(Effect::Status {
                kind: StatusKind::Stun,
                duration: self.duration,
            }),
        }
    }

    pub fn from_snapshot(snapshot: &AbilitySnapshot) -> Self {
        Self {
            name: snapshot.name.clone(),
            base_damage: snapshot.base_damage,
            kind: snapshot.ability_type,
            tier: snapshot.tier,
            min_level: snapshot.min_level,
            energy_cost: snapshot.energy_cost,
            effect_value: snapshot.effect_value,
            duration: snapshot.duration,
            cooldown: snapshot.cooldown,
        }
    }

    pub fn to_snapshot(&self) -> AbilitySnapshot {
        AbilitySnapshot {
            name: self.name.clone(),
            base_damage: self.base_damage,
            ability_type: self.kind,
            tier: self.tier,
            min_level: self.min_level,
            energy_cost: self.energy_cost,
            effect_value: self.effect_value,
            duration: self.duration,
            cooldown: self.cooldown,
        }
    }
}

impl std::fmt::Display for Ability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (Tier {}) - Damage: {} (Cost: {} energy, Min Lvl: {})",
            self.name,
            self.tier,
            self.power(),
            self.energy_cost,
            self.min_level
        )
    }
}
