// Client-side turn synchronisation for a networked duel.
//
// `TurnSync` is the state machine each client runs. It never touches the
// network itself: the caller feeds it every message its `Connection` polls
// (`handle_message`) and sends whatever `request_action` hands back. That
// keeps it fully testable without sockets.
//
// Phases: WaitingForMatch -> MyTurn / OpponentTurn (alternating) ->
// BattleOver, with an optional LevelUp detour after a win that crosses an
// XP threshold. The turn token only moves when this client sends a MOVE
// (to the opponent's role) or receives one (to its `next_turn`).
//
// Battle conclusion is decided locally from this client's own mirror; the
// XP award or penalty is applied to this client's creature immediately,
// with no confirmation from the peer.

use petduel_prng::DuelRng;
use petduel_protocol::{BattleStart, MAX_ABILITY_INDEX, Message, MoveAction, Role};
use tracing::{debug, info, warn};

use crate::ability::Ability;
use crate::battle::{ActionOutcome, Battle, Side};
use crate::config::ProgressionConfig;
use crate::creature::Creature;
use crate::error::DuelError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    WaitingForMatch,
    MyTurn,
    OpponentTurn,
    /// Battle won and levelled up; an ability decision is outstanding.
    LevelUp,
    BattleOver,
}

/// What `handle_message` did with a message.
#[derive(Clone, Debug, PartialEq)]
pub enum Handled {
    /// A `BATTLE_START` opened the match.
    Started,
    /// The opponent's `MOVE` was applied to the mirror.
    Applied(ActionOutcome),
    /// A `MOVE` sent by this client came back and was dropped.
    EchoIgnored,
    /// Nothing to do (opaque message, battle over, level-up pending).
    Ignored,
}

/// A local action that was applied and must now be sent.
#[derive(Clone, Debug, PartialEq)]
pub struct LocalAction {
    pub message: Message,
    pub outcome: ActionOutcome,
}

/// How the battle ended for this client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub won: bool,
    /// Signed XP change applied to the own creature.
    pub xp_delta: i64,
    pub leveled_up: bool,
    pub levels_lost: u32,
}

/// The candidate ability offered after a level-up, and which existing
/// slots it may replace (tier no higher than the candidate's).
#[derive(Clone, Debug, PartialEq)]
pub struct LevelUpPrompt {
    pub candidate: Ability,
    pub eligible_indices: Vec<usize>,
    /// Index the candidate lands on if learned without evicting anything.
    /// `None` when every slot is taken.
    pub free_slot: Option<usize>,
}

/// Result of one level-up decision.
#[derive(Clone, Debug, PartialEq)]
pub enum LevelUpStep {
    /// The candidate was dropped for good.
    Discarded,
    /// A free slot took the candidate.
    Learned { slot: usize },
    /// The candidate evicted `forgotten` from `slot`.
    Replaced { slot: usize, forgotten: String },
    /// Pick a slot (free or eligible) with `choose_replacement`.
    ChooseReplacement(LevelUpPrompt),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LevelUpStage {
    Decide,
    Replace,
}

#[derive(Debug)]
struct Match {
    my_role: Role,
    current_turn: Role,
    battle: Battle,
}

#[derive(Debug)]
struct Conclusion {
    outcome: Outcome,
    /// Own creature after XP was applied.
    creature: Creature,
    level_up: Option<LevelUpStage>,
}

#[derive(Debug)]
pub struct TurnSync {
    rng: DuelRng,
    config: ProgressionConfig,
    current: Option<Match>,
    conclusion: Option<Conclusion>,
    log: Vec<String>,
}

impl TurnSync {
    pub fn new(rng: DuelRng, config: ProgressionConfig) -> Self {
        Self {
            rng,
            config,
            current: None,
            conclusion: None,
            log: Vec::new(),
        }
    }

    /// The `JOIN_LOBBY` message that enters `creature` into matchmaking.
    pub fn join_lobby(&self, creature: &Creature) -> Message {
        Message::JoinLobby {
            creature: creature.to_snapshot(),
        }
    }

    pub fn phase(&self) -> Phase {
        match (&self.current, &self.conclusion) {
            (None, _) => Phase::WaitingForMatch,
            (Some(_), Some(c)) if c.level_up.is_some() => Phase::LevelUp,
            (Some(_), Some(_)) => Phase::BattleOver,
            (Some(m), None) if m.current_turn == m.my_role => Phase::MyTurn,
            (Some(_), None) => Phase::OpponentTurn,
        }
    }

    pub fn my_role(&self) -> Option<Role> {
        self.current.as_ref().map(|m| m.my_role)
    }

    pub fn current_turn(&self) -> Option<Role> {
        self.current.as_ref().map(|m| m.current_turn)
    }

    pub fn battle(&self) -> Option<&Battle> {
        self.current.as_ref().map(|m| &m.battle)
    }

    /// This client's creature: the mirror copy during battle, the
    /// progressed copy once it is over.
    pub fn own_creature(&self) -> Option<&Creature> {
        match &self.conclusion {
            Some(c) => Some(&c.creature),
            None => self.current.as_ref().map(|m| m.battle.own()),
        }
    }

    pub fn action_log(&self) -> &[String] {
        &self.log
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.conclusion.as_ref().map(|c| c.outcome)
    }

    pub fn level_up_prompt(&self) -> Option<LevelUpPrompt> {
        let conclusion = self.conclusion.as_ref().filter(|c| c.level_up.is_some())?;
        let candidate = conclusion.creature.pending_skill.clone()?;
        let abilities = &conclusion.creature.abilities;
        let eligible_indices = abilities
            .iter()
            .enumerate()
            .filter(|(_, a)| a.tier <= candidate.tier)
            .map(|(i, _)| i)
            .collect();
        let free_slot = (abilities.len() < self.config.max_abilities).then_some(abilities.len());
        Some(LevelUpPrompt {
            candidate,
            eligible_indices,
            free_slot,
        })
    }

    fn is_frozen(&self) -> bool {
        self.conclusion.is_some()
    }

    /// Feed one inbound message.
    pub fn handle_message(&mut self, message: &Message) -> Result<Handled, DuelError> {
        match message {
            Message::BattleStart(start) => self.on_battle_start(start),
            Message::Move(action) => self.on_move(*action),
            Message::JoinLobby { .. } => {
                warn!("JOIN_LOBBY received by a client, ignoring");
                Ok(Handled::Ignored)
            }
            Message::Opaque(opaque) => {
                debug!(kind = opaque.kind(), "ignoring opaque message");
                Ok(Handled::Ignored)
            }
        }
    }

    fn on_battle_start(&mut self, start: &BattleStart) -> Result<Handled, DuelError> {
        if self.is_frozen() {
            return Ok(Handled::Ignored);
        }
        if self.current.is_some() {
            return Err(DuelError::ProtocolViolation(
                "BATTLE_START received during a match".into(),
            ));
        }
        let own = Creature::from_snapshot(&start.player_creature)?;
        let opponent = Creature::from_snapshot(&start.opponent_creature)?;
        info!(
            role = %start.your_role,
            current_turn = %start.current_turn,
            own = own.name(),
            opponent = opponent.name(),
            "battle started"
        );
        self.log.push(format!(
            "Battle started: your {} vs {}. You are {}, {} moves first.",
            own.name(),
            opponent.name(),
            start.your_role,
            start.current_turn
        ));
        self.current = Some(Match {
            my_role: start.your_role,
            current_turn: start.current_turn,
            battle: Battle::new(own, opponent),
        });
        Ok(Handled::Started)
    }

    fn on_move(&mut self, action: MoveAction) -> Result<Handled, DuelError> {
        let Some(current) = self.current.as_mut() else {
            return Err(DuelError::ProtocolViolation(
                "MOVE received with no match in progress".into(),
            ));
        };
        if self.conclusion.is_some() {
            return Ok(Handled::Ignored);
        }
        if action.sender_role == current.my_role {
            debug!(index = action.index, "dropping echo of own MOVE");
            return Ok(Handled::EchoIgnored);
        }
        if action.sender_role != current.current_turn {
            warn!(
                sender = %action.sender_role,
                current_turn = %current.current_turn,
                "MOVE arrived out of turn, applying anyway"
            );
        }
        let outcome = current
            .battle
            .apply_action(Side::Opponent, usize::from(action.index));
        current.current_turn = action.next_turn;
        debug!(index = action.index, next_turn = %action.next_turn, "opponent move applied");
        self.log.push(outcome.log.clone());
        self.conclude_if_over();
        Ok(Handled::Applied(outcome))
    }

    /// Apply ability `index` of the own creature. On success the returned
    /// `MOVE` must be sent to the server; the turn has already passed.
    pub fn request_action(&mut self, index: usize) -> Result<LocalAction, DuelError> {
        let Some(current) = self.current.as_mut() else {
            return Err(DuelError::NoMatch);
        };
        if let Some(conclusion) = &self.conclusion {
            return Err(if conclusion.level_up.is_some() {
                DuelError::LevelUpPending
            } else {
                DuelError::BattleOver
            });
        }
        if current.current_turn != current.my_role {
            return Err(DuelError::NotYourTurn {
                current: current.current_turn,
            });
        }
        let wire_index = u8::try_from(index)
            .ok()
            .filter(|i| *i <= MAX_ABILITY_INDEX)
            .ok_or(DuelError::InvalidAbilityIndex(index))?;

        let outcome = current.battle.apply_action(Side::Own, index);
        let next_turn = current.my_role.opponent();
        let message = Message::Move(MoveAction {
            index: wire_index,
            next_turn,
            sender_role: current.my_role,
        });
        current.current_turn = next_turn;
        debug!(index, %next_turn, "own move applied");
        self.log.push(outcome.log.clone());
        self.conclude_if_over();
        Ok(LocalAction { message, outcome })
    }

    fn conclude_if_over(&mut self) {
        let Some(current) = &self.current else {
            return;
        };
        let Some(winner) = current.battle.winner() else {
            return;
        };
        let won = winner == Side::Own;
        let mut creature = current.battle.own().clone();
        let (outcome, level_up) = if won {
            let level_up = creature.gain_xp(self.config.win_xp, &self.config, &mut self.rng);
            let outcome = Outcome {
                won,
                xp_delta: self.config.win_xp,
                leveled_up: level_up.is_some(),
                levels_lost: 0,
            };
            let stage = level_up
                .filter(|_| creature.pending_skill.is_some())
                .map(|_| LevelUpStage::Decide);
            (outcome, stage)
        } else {
            let levels_lost = creature.lose_xp(self.config.loss_xp, &self.config);
            let outcome = Outcome {
                won,
                xp_delta: -self.config.loss_xp,
                leveled_up: false,
                levels_lost,
            };
            (outcome, None)
        };

        info!(
            won,
            xp_delta = outcome.xp_delta,
            level = creature.level,
            "battle over"
        );
        self.log.push(if won {
            format!("You won! +{} XP.", self.config.win_xp)
        } else {
            format!("You lost. -{} XP.", self.config.loss_xp)
        });
        if outcome.leveled_up {
            self.log
                .push(format!("{} reached level {}!", creature.name(), creature.level));
        }
        self.conclusion = Some(Conclusion {
            outcome,
            creature,
            level_up,
        });
    }

    /// Apply or discard the level-up candidate. Applying always moves on to
    /// `choose_replacement`, unless there is nowhere to put the candidate.
    pub fn decide_level_up(&mut self, apply: bool) -> Result<LevelUpStep, DuelError> {
        let prompt = self.level_up_prompt();
        let conclusion = self
            .conclusion
            .as_mut()
            .filter(|c| c.level_up == Some(LevelUpStage::Decide))
            .ok_or(DuelError::NoLevelUpPending)?;
        if !apply {
            return Ok(discard(conclusion));
        }
        match prompt {
            Some(prompt) if prompt.free_slot.is_some() || !prompt.eligible_indices.is_empty() => {
                conclusion.level_up = Some(LevelUpStage::Replace);
                Ok(LevelUpStep::ChooseReplacement(prompt))
            }
            _ => Ok(discard(conclusion)),
        }
    }

    /// Put the candidate at `slot`, or `None` to cancel. The prompt's free
    /// slot appends; an eligible index evicts the ability there. Any other
    /// slot is an error and leaves the choice open.
    pub fn choose_replacement(&mut self, slot: Option<usize>) -> Result<LevelUpStep, DuelError> {
        let (eligible, free_slot) = self
            .level_up_prompt()
            .map(|p| (p.eligible_indices, p.free_slot))
            .unwrap_or_default();
        let conclusion = self
            .conclusion
            .as_mut()
            .filter(|c| c.level_up == Some(LevelUpStage::Replace))
            .ok_or(DuelError::NoLevelUpPending)?;

        let Some(slot) = slot else {
            return Ok(discard(conclusion));
        };
        if free_slot != Some(slot) && !eligible.contains(&slot) {
            return Err(DuelError::IneligibleReplacement(slot));
        }
        conclusion.level_up = None;
        let Some(candidate) = conclusion.creature.pending_skill.take() else {
            return Ok(LevelUpStep::Discarded);
        };
        if free_slot == Some(slot) {
            info!(slot, ability = %candidate.name, "learned new ability");
            conclusion.creature.abilities.push(candidate);
            return Ok(LevelUpStep::Learned { slot });
        }
        info!(slot, ability = %candidate.name, "replaced ability");
        let forgotten = std::mem::replace(&mut conclusion.creature.abilities[slot], candidate).name;
        Ok(LevelUpStep::Replaced { slot, forgotten })
    }
}

fn discard(conclusion: &mut Conclusion) -> LevelUpStep {
    if let Some(skill) = conclusion.creature.pending_skill.take() {
        debug!(ability = %skill.name, "level-up ability discarded");
    }
    conclusion.level_up = None;
    LevelUpStep::Discarded
}
