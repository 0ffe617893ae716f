// Species data: base stats and ability pools.
//
// Behavioral differences between species are data, not code. `Creature`
// is a single type that reads its species' row from `Species::data()` when
// it is generated or when it rolls a new ability on level-up.
//
// See also: `creature.rs` for generation, `ability.rs` for how a template
// becomes an `Ability`.

use petduel_protocol::AbilityKind;

/// The five creature species.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Species {
    Skeleton,
    FireElemental,
    Knight,
    Goblin,
    Troll,
}

/// Static description of one poolable ability. Every pooled ability is
/// tier 1, min level 1, costs 10 energy and has no cooldown.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AbilityTemplate {
    pub name: &'static str,
    pub base_damage: i32,
    pub kind: AbilityKind,
    pub effect_value: f64,
    pub duration: u32,
}

/// Base stats and signature abilities of a species.
#[derive(Clone, Copy, Debug)]
pub struct SpeciesData {
    pub base_hp: i32,
    pub base_attack: i32,
    pub base_defense: i32,
    pub base_speed: i32,
    pub signature_abilities: &'static [AbilityTemplate],
}

const fn template(
    name: &'static str,
    base_damage: i32,
    kind: AbilityKind,
    effect_value: f64,
    duration: u32,
) -> AbilityTemplate {
    AbilityTemplate {
        name,
        base_damage,
        kind,
        effect_value,
        duration,
    }
}

/// Abilities any species can roll.
pub const COMMON_ABILITIES: &[AbilityTemplate] = &[
    template("Quick Strike", 8, AbilityKind::Damage, 0.0, 0),
    template("Focus", 0, AbilityKind::Buff, 0.2, 1),
];

const SKELETON: SpeciesData = SpeciesData {
    base_hp: 50,
    base_attack: 10,
    base_defense: 5,
    base_speed: 7,
    signature_abilities: &[
        template("Bone Smash", 10, AbilityKind::Damage, 0.0, 0),
        template("Haunting Howl", 8, AbilityKind::Debuff, 0.2, 2),
    ],
};

const FIRE_ELEMENTAL: SpeciesData = SpeciesData {
    base_hp: 40,
    base_attack: 12,
    base_defense: 3,
    base_speed: 10,
    signature_abilities: &[
        template("Flame Burst", 12, AbilityKind::Damage, 0.0, 0),
        template("Scorch", 9, AbilityKind::Debuff, 0.3, 2),
    ],
};

const KNIGHT: SpeciesData = SpeciesData {
    base_hp: 60,
    base_attack: 8,
    base_defense: 10,
    base_speed: 5,
    signature_abilities: &[
        template("Sword Slash", 11, AbilityKind::Damage, 0.0, 0),
        template("Shield Bash", 8, AbilityKind::Debuff, 0.25, 2),
    ],
};

const GOBLIN: SpeciesData = SpeciesData {
    base_hp: 45,
    base_attack: 9,
    base_defense: 6,
    base_speed: 9,
    signature_abilities: &[
        template("Sneak Attack", 10, AbilityKind::Damage, 0.0, 0),
        template("Panic", 7, AbilityKind::Status, 0.0, 1),
    ],
};

const TROLL: SpeciesData = SpeciesData {
    base_hp: 70,
    base_attack: 7,
    base_defense: 12,
    base_speed: 4,
    signature_abilities: &[
        template("Club Smash", 13, AbilityKind::Damage, 0.0, 0),
        template("Roar", 5, AbilityKind::Debuff, 0.2, 2),
    ],
};

impl Species {
    pub const ALL: [Species; 5] = [
        Species::Skeleton,
        Species::FireElemental,
        Species::Knight,
        Species::Goblin,
        Species::Troll,
    ];

    /// Display and wire name (`creature_type` in snapshots).
    pub fn name(self) -> &'static str {
        match self {
            Species::Skeleton => "Skeleton",
            Species::FireElemental => "Fire Elemental",
            Species::Knight => "Knight",
            Species::Goblin => "Goblin",
            Species::Troll => "Troll",
        }
    }

    /// Inverse of `name`. Case-sensitive, matching the wire format.
    pub fn from_name(name: &str) -> Option<Species> {
        Species::ALL.into_iter().find(|s| s.name() == name)
    }

    pub fn data(self) -> &'static SpeciesData {
        match self {
            Species::Skeleton => &SKELETON,
            Species::FireElemental => &FIRE_ELEMENTAL,
            Species::Knight => &KNIGHT,
            Species::Goblin => &GOBLIN,
            Species::Troll => &TROLL,
        }
    }

    /// Signature abilities followed by the common pool.
    pub fn ability_pool(self) -> impl Iterator<Item = &'static AbilityTemplate> {
        self.data()
            .signature_abilities
            .iter()
            .chain(COMMON_ABILITIES.iter())
    }
}
