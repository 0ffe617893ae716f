// Live creatures and their progression.
//
// A `Creature` is the in-memory form of a `CreatureSnapshot`. Each client
// holds two during a duel: its own, rebuilt from `player_creature`, and a
// mirror of the opponent's, rebuilt from `opponent_creature`. Neither is
// shared across the network; they stay in step because both clients apply
// the same ordered sequence of `MOVE`s (see `battle.rs`, `duel.rs`).
//
// Progression (`gain_xp`, `lose_xp`) only ever runs on a client's own
// creature, after the battle has concluded locally. Level-up growth and the
// candidate ability are rolled from the caller's `DuelRng`.
//
// Fields that exist only locally and never cross the wire: `allowed_tier`,
// `active_effects`, `pending_skill`.

use petduel_prng::DuelRng;
use petduel_protocol::CreatureSnapshot;
use smallvec::SmallVec;
use tracing::debug;

use crate::ability::Ability;
use crate::config::ProgressionConfig;
use crate::effect::Effect;
use crate::error::SimError;
use crate::species::Species;

/// Inline storage for the usual four ability slots.
pub type AbilitySlots = SmallVec<[Ability; 4]>;

/// Abilities a freshly generated creature starts with.
pub const STARTING_ABILITIES: usize = 4;

#[derive(Clone, Debug, PartialEq)]
pub struct Creature {
    pub species: Species,
    pub max_hp: i32,
    pub attack: i32,
    pub defense: i32,
    pub speed: i32,
    pub current_hp: i32,
    pub level: u32,
    pub xp: i64,
    pub evolution_stage: u32,
    pub age: f64,
    pub is_alive: bool,
    pub hunger: f64,
    pub energy: f64,
    pub abilities: AbilitySlots,
    /// Highest ability tier this creature may use in battle.
    pub allowed_tier: u8,
    /// Timed effects applied during the current battle.
    pub active_effects: Vec<Effect>,
    /// Candidate ability rolled on the last level-up, awaiting a decision.
    pub pending_skill: Option<Ability>,
}

/// What a single call to `gain_xp` did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelUp {
    pub new_level: u32,
    pub hp_gain: i32,
    pub attack_gain: i32,
    pub defense_gain: i32,
    pub speed_gain: i32,
}

impl Creature {
    /// A new level-1 creature: species base stats with jitter (HP ±5, the
    /// rest ±2), full HP and energy, four rolled abilities.
    pub fn generate(species: Species, rng: &mut DuelRng) -> Self {
        let data = species.data();
        let max_hp = data.base_hp + rng.range_i32_inclusive(-5, 5);
        let attack = data.base_attack + rng.range_i32_inclusive(-2, 2);
        let defense = data.base_defense + rng.range_i32_inclusive(-2, 2);
        let speed = data.base_speed + rng.range_i32_inclusive(-2, 2);
        let abilities = (0..STARTING_ABILITIES)
            .map(|_| Ability::roll(species, rng))
            .collect();
        Self {
            species,
            max_hp,
            attack,
            defense,
            speed,
            current_hp: max_hp,
            level: 1,
            xp: 0,
            evolution_stage: 1,
            age: 0.0,
            is_alive: true,
            hunger: 0.0,
            energy: 100.0,
            abilities,
            allowed_tier: 1,
            active_effects: Vec::new(),
            pending_skill: None,
        }
    }

    /// Rebuild a creature received over the wire.
    pub fn from_snapshot(snapshot: &CreatureSnapshot) -> Result<Self, SimError> {
        let species = Species::from_name(&snapshot.creature_type)
            .ok_or_else(|| SimError::UnknownSpecies(snapshot.creature_type.clone()))?;
        Ok(Self {
            species,
            max_hp: snapshot.max_hp,
            attack: snapshot.attack,
            defense: snapshot.defense,
            speed: snapshot.speed,
            current_hp: snapshot.current_hp,
            level: snapshot.level,
            xp: snapshot.xp,
            evolution_stage: snapshot.evolution_stage,
            age: snapshot.age,
            is_alive: snapshot.is_alive,
            hunger: snapshot.hunger,
            energy: snapshot.energy,
            abilities: snapshot.abilities.iter().map(Ability::from_snapshot).collect(),
            allowed_tier: 1,
            active_effects: Vec::new(),
            pending_skill: None,
        })
    }

    pub fn to_snapshot(&self) -> CreatureSnapshot {
        CreatureSnapshot {
            creature_type: self.species.name().into(),
            max_hp: self.max_hp,
            attack: self.attack,
            defense: self.defense,
            speed: self.speed,
            current_hp: self.current_hp,
            level: self.level,
            xp: self.xp,
            evolution_stage: self.evolution_stage,
            age: self.age,
            is_alive: self.is_alive,
            hunger: self.hunger,
            energy: self.energy,
            abilities: self.abilities.iter().map(Ability::to_snapshot).collect(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.species.name()
    }

    /// Restore HP, capped at `max_hp`.
    pub fn heal(&mut self, amount: f64) {
        let amount = amount.round().clamp(0.0, f64::from(i32::MAX)) as i32;
        self.current_hp = self.current_hp.saturating_add(amount).min(self.max_hp);
    }

    /// XP needed to leave the current level.
    pub fn xp_threshold(&self, config: &ProgressionConfig) -> i64 {
        i64::from(self.level) * config.xp_per_level
    }

    /// Add XP. Crossing the threshold levels up once: XP resets to 0,
    /// stats grow, HP refills and a candidate ability is left in
    /// `pending_skill`.
    pub fn gain_xp(
        &mut self,
        amount: i64,
        config: &ProgressionConfig,
        rng: &mut DuelRng,
    ) -> Option<LevelUp> {
        self.xp = self.xp.saturating_add(amount);
        if self.xp >= self.xp_threshold(config) {
            Some(self.level_up(config, rng))
        } else {
            None
        }
    }

    fn level_up(&mut self, config: &ProgressionConfig, rng: &mut DuelRng) -> LevelUp {
        let hp_gain = config.hp_growth.roll(rng);
        let attack_gain = config.attack_growth.roll(rng);
        let defense_gain = config.defense_growth.roll(rng);
        let speed_gain = config.speed_growth.roll(rng);

        self.level += 1;
        self.xp = 0;
        self.max_hp += hp_gain;
        self.attack += attack_gain;
        self.defense += defense_gain;
        self.speed += speed_gain;
        self.current_hp = self.max_hp;
        self.pending_skill = Some(Ability::roll(self.species, rng));

        debug!(
            creature = self.name(),
            level = self.level,
            hp_gain,
            attack_gain,
            defense_gain,
            speed_gain,
            "level up"
        );
        LevelUp {
            new_level: self.level,
            hp_gain,
            attack_gain,
            defense_gain,
            speed_gain,
        }
    }

    /// Remove XP. While XP is negative above level 1 the creature drops a
    /// level, is credited that level's full threshold, and forgets abilities
    /// whose minimum level it no longer meets. Returns the levels lost.
    pub fn lose_xp(&mut self, amount: i64, config: &ProgressionConfig) -> u32 {
        self.xp = self.xp.saturating_sub(amount);
        let mut levels_lost = 0;
        while self.xp < 0 && self.level > 1 {
            self.level -= 1;
            self.xp += self.xp_threshold(config);
            levels_lost += 1;
            self.forget_high_level_abilities();
        }
        levels_lost
    }

    fn forget_high_level_abilities(&mut self) {
        let level = self.level;
        self.abilities.retain(|ability| {
            let keep = ability.min_level <= level;
            if !keep {
                debug!(ability = %ability.name, level, "ability forgotten after level drop");
            }
            keep
        });
    }
}

#[cfg(test)]
mod tests {
    use petduel_protocol::AbilityKind;

    use super::*;

    fn config() -> ProgressionConfig {
        ProgressionConfig::default()
    }

    #[test]
    fn generated_stats_stay_within_jitter() {
        let mut rng = DuelRng::new(11);
        for species in Species::ALL {
            for _ in 0..50 {
                let c = Creature::generate(species, &mut rng);
                let data = species.data();
                assert!((c.max_hp - data.base_hp).abs() <= 5);
                assert!((c.attack - data.base_attack).abs() <= 2);
                assert!((c.defense - data.base_defense).abs() <= 2);
                assert!((c.speed - data.base_speed).abs() <= 2);
                assert_eq!(c.current_hp, c.max_hp);
                assert_eq!(c.abilities.len(), STARTING_ABILITIES);
                assert!(c.abilities.iter().all(|a| a.tier == 1));
            }
        }
    }

    #[test]
    fn snapshot_roundtrip_preserves_every_field() {
        let mut rng = DuelRng::new(2);
        let mut creature = Creature::generate(Species::FireElemental, &mut rng);
        creature.current_hp = 0;
        creature.xp = -20;
        creature.age = 123.456;
        creature.hunger = 33.3;
        creature.energy = 71.5;
        let rebuilt = Creature::from_snapshot(&creature.to_snapshot()).unwrap();
        assert_eq!(rebuilt, creature);
    }

    #[test]
    fn unknown_species_is_an_error() {
        let mut rng = DuelRng::new(2);
        let mut snapshot = Creature::generate(Species::Knight, &mut rng).to_snapshot();
        snapshot.creature_type = "Dragon".into();
        assert!(matches!(
            Creature::from_snapshot(&snapshot),
            Err(SimError::UnknownSpecies(name)) if name == "Dragon"
        ));
    }

    #[test]
    fn win_at_level_one_levels_up() {
        let mut rng = DuelRng::new(4);
        let mut c = Creature::generate(Species::Goblin, &mut rng);
        let before = c.clone();
        let level_up = c.gain_xp(100, &config(), &mut rng).expect("should level up");
        assert_eq!(level_up.new_level, 2);
        assert_eq!(c.level, 2);
        assert_eq!(c.xp, 0);
        assert!((3..=7).contains(&level_up.hp_gain));
        assert_eq!(c.max_hp, before.max_hp + level_up.hp_gain);
        assert_eq!(c.current_hp, c.max_hp);
        assert!(c.pending_skill.is_some());
    }

    #[test]
    fn xp_below_threshold_does_not_level() {
        let mut rng = DuelRng::new(4);
        let mut c = Creature::generate(Species::Goblin, &mut rng);
        c.level = 2;
        assert!(c.gain_xp(100, &config(), &mut rng).is_none());
        assert_eq!(c.xp, 100);
        assert!(c.pending_skill.is_none());
    }

    #[test]
    fn loss_at_level_one_goes_negative() {
        let mut rng = DuelRng::new(4);
        let mut c = Creature::generate(Species::Troll, &mut rng);
        assert_eq!(c.lose_xp(50, &config()), 0);
        assert_eq!(c.level, 1);
        assert_eq!(c.xp, -50);
    }

    #[test]
    fn loss_drops_level_and_forgets_abilities() {
        let mut rng = DuelRng::new(4);
        let mut c = Creature::generate(Species::Knight, &mut rng);
        c.level = 3;
        c.xp = 20;
        c.abilities[0].min_level = 3;
        c.abilities[1].min_level = 2;
        assert_eq!(c.lose_xp(50, &config()), 1);
        assert_eq!(c.level, 2);
        assert_eq!(c.xp, 170);
        assert_eq!(c.abilities.len(), 3);
        assert!(c.abilities.iter().all(|a| a.min_level <= 2));
    }

    #[test]
    fn heal_caps_at_max() {
        let mut rng = DuelRng::new(4);
        let mut c = Creature::generate(Species::Skeleton, &mut rng);
        c.current_hp = c.max_hp - 3;
        c.heal(10.0);
        assert_eq!(c.current_hp, c.max_hp);
        c.current_hp = 1;
        c.heal(2.4);
        assert_eq!(c.current_hp, 3);
    }

    #[test]
    fn higher_tier_snapshot_abilities_survive() {
        let mut rng = DuelRng::new(4);
        let mut snapshot = Creature::generate(Species::Skeleton, &mut rng).to_snapshot();
        snapshot.abilities[0].tier = 3;
        snapshot.abilities[0].ability_type = AbilityKind::Heal;
        let c = Creature::from_snapshot(&snapshot).unwrap();
        assert_eq!(c.abilities[0].tier, 3);
        assert_eq!(c.allowed_tier, 1);
    }
}
