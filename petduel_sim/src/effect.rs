// Secondary ability effects as a sum type.
//
// An ability of kind buff, debuff, heal or status carries one `Effect`,
// built by `Ability::effect()` and resolved in `battle.rs` by exhaustive
// matching. Timed effects land in the target's `active_effects` list and
// are part of the mirrored battle state both clients must agree on. They
// do not feed into the damage formula.

/// Stat an effect scales.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stat {
    Attack,
    Defense,
}

/// Non-numeric conditions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatusKind {
    Stun,
}

/// Which creature an effect lands on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EffectTarget {
    Attacker,
    Defender,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Effect {
    /// Scale one of the attacker's stats up for `duration` turns.
    Buff {
        stat: Stat,
        multiplier: f64,
        duration: u32,
    },
    /// Scale one of the defender's stats down for `duration` turns.
    Debuff {
        stat: Stat,
        multiplier: f64,
        duration: u32,
    },
    /// Restore attacker HP, capped at max HP.
    Heal { amount: f64 },
    /// Apply a status to the defender.
    Status { kind: StatusKind, duration: u32 },
}

impl Effect {
    pub fn target(&self) -> EffectTarget {
        match self {
            Effect::Buff { .. } | Effect::Heal { .. } => EffectTarget::Attacker,
            Effect::Debuff { .. } | Effect::Status { .. } => EffectTarget::Defender,
        }
    }
}
