// The battle engine: one ability use at a time, attacker against defender.
//
// Both clients of a duel run their own `Battle` over their own copies of the
// two creatures (the "mirror"). The engine is fully deterministic given the
// creatures and the ordered list of actions, so two mirrors fed the same
// `MOVE`s end in the same state. Nothing in here touches the PRNG.
//
// A rejected action (bad index, locked tier, not enough energy) changes no
// creature state but is still reported as an outcome; the caller decides
// what that means for turn order (`duel.rs` treats it as a spent turn).

use std::fmt;

use thiserror::Error;
use tracing::debug;

use crate::creature::Creature;
use crate::effect::{Effect, EffectTarget};

/// A seat in the local mirror. `Own` is this client's creature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Own,
    Opponent,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::Own => Side::Opponent,
            Side::Opponent => Side::Own,
        }
    }
}

/// Why an action did nothing.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum Rejection {
    #[error("invalid ability index {index} ({available} abilities)")]
    InvalidIndex { index: usize, available: usize },
    #[error("{ability} is tier {tier}, above the allowed tier {allowed}")]
    TierTooHigh {
        ability: String,
        tier: u8,
        allowed: u8,
    },
    #[error("not enough energy for {ability} (needs {cost}, has {energy})")]
    NotEnoughEnergy {
        ability: String,
        cost: i32,
        energy: f64,
    },
    #[error("the battle is already over")]
    BattleOver,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ActionResult {
    Hit {
        ability: String,
        damage: i32,
        effect: Option<Effect>,
        knocked_out: bool,
    },
    Rejected(Rejection),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ActionOutcome {
    pub attacker: Side,
    pub result: ActionResult,
    /// Human-readable line for the action log.
    pub log: String,
}

impl ActionOutcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self.result, ActionResult::Rejected(_))
    }
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.log)
    }
}

/// `max(1, power + attack - floor(defense * 0.5))`.
pub fn calculate_damage(power: i32, attack: i32, defense: i32) -> i32 {
    power
        .saturating_add(attack)
        .saturating_sub(defense.div_euclid(2))
        .max(1)
}

#[derive(Clone, Debug)]
pub struct Battle {
    own: Creature,
    opponent: Creature,
    winner: Option<Side>,
}

impl Battle {
    pub fn new(own: Creature, opponent: Creature) -> Self {
        Self {
            own,
            opponent,
            winner: None,
        }
    }

    pub fn own(&self) -> &Creature {
        &self.own
    }

    pub fn opponent(&self) -> &Creature {
        &self.opponent
    }

    pub fn creature(&self, side: Side) -> &Creature {
        match side {
            Side::Own => &self.own,
            Side::Opponent => &self.opponent,
        }
    }

    pub fn is_over(&self) -> bool {
        self.winner.is_some()
    }

    pub fn winner(&self) -> Option<Side> {
        self.winner
    }

    /// Consume the battle, handing back this client's creature.
    pub fn into_own(self) -> Creature {
        self.own
    }

    fn split_mut(&mut self, attacker: Side) -> (&mut Creature, &mut Creature) {
        match attacker {
            Side::Own => (&mut self.own, &mut self.opponent),
            Side::Opponent => (&mut self.opponent, &mut self.own),
        }
    }

    /// Use ability `index` of the `attacker` side against the other side.
    pub fn apply_action(&mut self, attacker_side: Side, index: usize) -> ActionOutcome {
        if self.is_over() {
            return rejected(attacker_side, "", Rejection::BattleOver);
        }
        let (attacker, defender) = self.split_mut(attacker_side);

        let Some(ability) = attacker.abilities.get(index).cloned() else {
            let rejection = Rejection::InvalidIndex {
                index,
                available: attacker.abilities.len(),
            };
            return rejected(attacker_side, attacker.name(), rejection);
        };
        if ability.tier > attacker.allowed_tier {
            let rejection = Rejection::TierTooHigh {
                ability: ability.name.clone(),
                tier: ability.tier,
                allowed: attacker.allowed_tier,
            };
            return rejected(attacker_side, attacker.name(), rejection);
        }
        let cost = f64::from(ability.energy_cost);
        if attacker.energy < cost {
            let rejection = Rejection::NotEnoughEnergy {
                ability: ability.name.clone(),
                cost: ability.energy_cost,
                energy: attacker.energy,
            };
            return rejected(attacker_side, attacker.name(), rejection);
        }

        attacker.energy -= cost;
        let damage = calculate_damage(ability.power(), attacker.attack, defender.defense);
        defender.current_hp = defender.current_hp.saturating_sub(damage);
        let effect = ability.effect();
        if let Some(effect) = effect {
            resolve_effect(effect, attacker, defender);
        }

        let mut log = format!(
            "{} uses {} for {} damage. {} has {} HP left.",
            attacker.name(),
            ability.name,
            damage,
            defender.name(),
            defender.current_hp.max(0)
        );
        let knocked_out = defender.current_hp <= 0;
        if knocked_out {
            defender.current_hp = 0;
            log.push_str(&format!(" {} is knocked out!", defender.name()));
        }
        debug!(attacker = ?attacker_side, ability = %ability.name, damage, knocked_out, "action applied");
        if knocked_out {
            self.winner = Some(attacker_side);
        }

        ActionOutcome {
            attacker: attacker_side,
            result: ActionResult::Hit {
                ability: ability.name,
                damage,
                effect,
                knocked_out,
            },
            log,
        }
    }
}

fn rejected(attacker: Side, name: &str, rejection: Rejection) -> ActionOutcome {
    debug!(?attacker, %rejection, "action rejected");
    let log = if name.is_empty() {
        rejection.to_string()
    } else {
        format!("{name} fails to act: {rejection}")
    };
    ActionOutcome {
        attacker,
        result: ActionResult::Rejected(rejection),
        log,
    }
}

fn resolve_effect(effect: Effect, attacker: &mut Creature, defender: &mut Creature) {
    let target = match effect.target() {
        EffectTarget::Attacker => attacker,
        EffectTarget::Defender => defender,
    };
    match effect {
        Effect::Heal { amount } => target.heal(amount),
        Effect::Buff { .. } | Effect::Debuff { .. } | Effect::Status { .. } => {
            target.active_effects.push(effect)
        }
    }
}
