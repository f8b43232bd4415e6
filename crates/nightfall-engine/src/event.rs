//! Everything a session tells the table.
//!
//! Operations return `Vec<Outbound>`: each entry pairs a [`GameEvent`] with
//! the [`Recipient`] that should see it. Private results (roles,
//! investigation answers, reminders) are addressed to a single player.

use nightfall_protocol::{PlayerId, Recipient};
use serde::{Deserialize, Serialize};

use crate::{
    EliminationOutcome, GameError, IndependentResult, NightSlot, Phase, RemovalCause, Role,
    RoleCounts, RoleReveal, TemplateName, Verdict, VoteBreakdown, Winner,
};

/// An event addressed to one or more players.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outbound {
    pub to: Recipient,
    pub event: GameEvent,
}

impl Outbound {
    pub fn all(event: GameEvent) -> Self {
        Self {
            to: Recipient::All,
            event,
        }
    }

    pub fn player(player: PlayerId, event: GameEvent) -> Self {
        Self {
            to: Recipient::Player(player),
            event,
        }
    }

    pub fn all_except(player: PlayerId, event: GameEvent) -> Self {
        Self {
            to: Recipient::AllExcept(player),
            event,
        }
    }
}

/// Why a player is no longer registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepartureReason {
    Left,
    TimedOut,
}

/// Narration and private results produced by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GameEvent {
    // -- Lobby --
    PlayerRegistered {
        player: PlayerId,
        registered: usize,
        /// Joined while a game was running; plays from the next one.
        waiting: bool,
    },
    PlayerReconnected {
        player: PlayerId,
    },
    PlayerDisconnected {
        player: PlayerId,
        grace_secs: u64,
    },
    PlayerUnregistered {
        player: PlayerId,
        reason: DepartureReason,
    },

    // -- Game lifecycle --
    GameStarted {
        template: TemplateName,
        players: Vec<PlayerId>,
        /// Present when roles in play are disclosed at the start.
        roles: Option<RoleCounts>,
    },
    /// Private: your role, and your fellow eliminators if you are one.
    RoleAssigned {
        role: Role,
        partners: Vec<PlayerId>,
    },
    PhaseEntered {
        phase: Phase,
        /// Night or day number.
        round: u32,
        seconds: u64,
    },
    GameWon {
        winner: Winner,
        independent: Option<IndependentResult>,
        reveal: Vec<RoleReveal>,
    },
    ReadyForNextGame,
    /// An automatic start could not deal roles.
    StartAborted {
        error: GameError,
    },

    // -- Night --
    /// Private: what you can do tonight. `enabled == false` when the
    /// ability is switched off for this night.
    NightPrompt {
        slot: NightSlot,
        enabled: bool,
    },
    /// Private to the slot's holders.
    NightActionAccepted {
        slot: NightSlot,
        actor: PlayerId,
        target: PlayerId,
    },
    /// Private: you have not acted and the night is nearly over.
    NightReminder {
        slot: NightSlot,
        seconds_left: u64,
    },
    /// Private: your slot did not act before dawn.
    NoActionTaken {
        slot: NightSlot,
    },
    /// Private: the investigator's answer.
    InvestigationResult {
        target: PlayerId,
        is_eliminator: bool,
    },
    /// Private: the shadow's answer.
    ShadowResult {
        target: PlayerId,
        found_investigator: bool,
    },
    /// Private to the protector when their shield stopped an elimination.
    ProtectionSucceeded {
        target: PlayerId,
    },
    Dawn {
        outcome: EliminationOutcome,
    },

    // -- Day --
    AccusationRaised {
        /// `None` when accusations are anonymous.
        accuser: Option<PlayerId>,
        accused: PlayerId,
    },
    SkipRequested {
        player: PlayerId,
        votes: usize,
        needed: usize,
    },
    TrialOpened {
        accused: PlayerId,
        accusers: Option<[PlayerId; 2]>,
        defense_secs: u64,
    },
    VotingOpened {
        accused: PlayerId,
        eligible: usize,
        seconds: u64,
    },
    VoteRecorded {
        voter: PlayerId,
        guilty: bool,
    },
    VoteReminder {
        seconds_left: u64,
    },
    TrialClosed {
        accused: PlayerId,
        verdict: Verdict,
        votes: VoteBreakdown,
    },
    /// The trial ended without a vote: the accused left, or the day ran out
    /// during the defense.
    TrialAbandoned {
        accused: PlayerId,
    },
    /// Play resumes after an acquittal.
    DayResumed {
        seconds_left: u64,
    },
    PlayerRemoved {
        player: PlayerId,
        cause: RemovalCause,
    },

    // -- Queries --
    RoleReminder {
        role: Role,
        partners: Vec<PlayerId>,
    },
    StatusReport {
        phase: Phase,
        seconds_left: Option<u64>,
        active: Vec<PlayerId>,
        registered: Vec<PlayerId>,
    },
}

impl GameEvent {
    /// Events a presentation layer reacts to: removals, shields, restraint
    /// and release, and the final reveal.
    pub fn is_presentational(&self) -> bool {
        match self {
            Self::PlayerRemoved { .. }
            | Self::TrialOpened { .. }
            | Self::TrialClosed { .. }
            | Self::TrialAbandoned { .. }
            | Self::ProtectionSucceeded { .. }
            | Self::GameWon { .. } => true,
            Self::Dawn { outcome } => matches!(
                outcome,
                EliminationOutcome::Prevented { .. } | EliminationOutcome::Eliminated { .. }
            ),
            Self::PlayerRegistered { .. }
            | Self::PlayerReconnected { .. }
            | Self::PlayerDisconnected { .. }
            | Self::PlayerUnregistered { .. }
            | Self::GameStarted { .. }
            | Self::RoleAssigned { .. }
            | Self::PhaseEntered { .. }
            | Self::ReadyForNextGame
            | Self::StartAborted { .. }
            | Self::NightPrompt { .. }
            | Self::NightActionAccepted { .. }
            | Self::NightReminder { .. }
            | Self::NoActionTaken { .. }
            | Self::InvestigationResult { .. }
            | Self::ShadowResult { .. }
            | Self::AccusationRaised { .. }
            | Self::SkipRequested { .. }
            | Self::VotingOpened { .. }
            | Self::VoteRecorded { .. }
            | Self::VoteReminder { .. }
            | Self::DayResumed { .. }
            | Self::RoleReminder { .. }
            | Self::StatusReport { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_is_internally_tagged() {
        let json = serde_json::to_value(GameEvent::PlayerRemoved {
            player: PlayerId(4),
            cause: RemovalCause::Convicted,
        })
        .unwrap();
        assert_eq!(json["type"], "PlayerRemoved");
        assert_eq!(json["player"], 4);
        assert_eq!(json["cause"], "Convicted");
    }

    #[test]
    fn test_is_presentational_covers_removals_and_reveals() {
        assert!(
            GameEvent::PlayerRemoved {
                player: PlayerId(1),
                cause: RemovalCause::Eliminated
            }
            .is_presentational()
        );
        assert!(
            GameEvent::Dawn {
                outcome: EliminationOutcome::Prevented { target: PlayerId(2) }
            }
            .is_presentational()
        );
        assert!(
            !GameEvent::Dawn {
                outcome: EliminationOutcome::NoAction
            }
            .is_presentational()
        );
        assert!(!GameEvent::ReadyForNextGame.is_presentational());
    }

    #[test]
    fn test_outbound_constructors_address_correctly() {
        let o = Outbound::player(PlayerId(3), GameEvent::ReadyForNextGame);
        assert_eq!(o.to, Recipient::Player(PlayerId(3)));
        assert_eq!(Outbound::all(GameEvent::ReadyForNextGame).to, Recipient::All);
    }
}
