// Serializable value objects for creatures and their abilities.
//
// A snapshot is what crosses the network: the client that owns a creature
// sends a `CreatureSnapshot` inside `JOIN_LOBBY`, the server copies it into
// both `BATTLE_START` messages, and each client rebuilds its own live
// creature from it (see `petduel_sim::creature`). Nobody shares a mutable
// creature across the wire; snapshots are immutable once sent.
//
// Several fields are optional on read with the defaults older clients
// relied on (`hunger`, `energy`, and most ability fields). Unknown keys are
// ignored so a save-file dump with extra keys (inventory, special ability
// text) still decodes.
//
// `creature_type` stays a free-form string here. The server forwards
// snapshots without understanding species; only the sim validates it.

use serde::{Deserialize, Serialize};

/// Which effect family an ability belongs to. `Damage` abilities have no
/// secondary effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbilityKind {
    Damage,
    Buff,
    Debuff,
    Heal,
    Status,
}

/// Complete wire description of one ability.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AbilitySnapshot {
    pub name: String,
    pub base_damage: i32,
    pub ability_type: AbilityKind,
    #[serde(default = "default_tier")]
    pub tier: u8,
    #[serde(default = "default_min_level")]
    pub min_level: u32,
    #[serde(default = "default_energy_cost")]
    pub energy_cost: i32,
    #[serde(default)]
    pub effect_value: f64,
    #[serde(default)]
    pub duration: u32,
    #[serde(default)]
    pub cooldown: u32,
}

/// Complete wire description of one creature.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreatureSnapshot {
    pub creature_type: String,
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
    #[serde(default)]
    pub hunger: f64,
    #[serde(default = "default_energy")]
    pub energy: f64,
    pub abilities: Vec<AbilitySnapshot>,
}

fn default_tier() -> u8 {
    1
}

fn default_min_level() -> u32 {
    1
}

fn default_energy_cost() -> i32 {
    10
}

fn default_energy() -> f64 {
    100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ability_defaults_fill_missing_fields() {
        let json = r#"{"name":"Bone Smash","base_damage":10,"ability_type":"damage"}"#;
        let ability: AbilitySnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(ability.tier, 1);
        assert_eq!(ability.min_level, 1);
        assert_eq!(ability.energy_cost, 10);
        assert_eq!(ability.effect_value, 0.0);
        assert_eq!(ability.duration, 0);
        assert_eq!(ability.cooldown, 0);
    }

    #[test]
    fn creature_defaults_and_ignored_keys() {
        let json = r#"{
            "creature_type": "Goblin", "max_hp": 45, "attack": 9, "defense": 6,
            "speed": 9, "current_hp": 45, "level": 1, "xp": 0,
            "evolution_stage": 1, "age": 12.5, "is_alive": true,
            "abilities": [],
            "special_ability": "Sneaky Dodge", "inventory": []
        }"#;
        let creature: CreatureSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(creature.creature_type, "Goblin");
        assert_eq!(creature.hunger, 0.0);
        assert_eq!(creature.energy, 100.0);
        assert!(creature.abilities.is_empty());
    }

    #[test]
    fn unknown_ability_kind_is_rejected() {
        let json = r#"{"name":"X","base_damage":1,"ability_type":"teleport"}"#;
        assert!(serde_json::from_str::<AbilitySnapshot>(json).is_err());
    }
}
