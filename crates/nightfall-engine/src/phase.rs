//! The closed set of phases a game session can be in.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a [`GameSession`](crate::GameSession) currently is in its round.
///
/// ```text
///  NotStarted ──start──→ Day(1) ──deadline──→ WaitingOnNightActions
///      ↑                                        │        ↑
///      │                              barrier/deadline   │ deadline, skip,
///      │                                        ▼        │ guilty verdict
///      │                             WaitingOnDayActivities
///      │                                   │         ↑
///      │                     2nd accuser   │         │ innocent / no verdict
///      │                                   ▼         │
///      │          WaitingOnAccusedDefense ──→ WaitingOnTrialVotes
///      │
///      └──cooldown── Won ←── (any running phase, when a side wins)
/// ```
///
/// `Day(n)` is the introductory day of a fresh game: roles are dealt,
/// nobody can accuse yet, and it always ends in the first night.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    NotStarted,
    Day(u32),
    WaitingOnNightActions,
    WaitingOnDayActivities,
    WaitingOnAccusedDefense,
    WaitingOnTrialVotes,
    Won,
}

impl Phase {
    /// Returns `true` while a game is being played (roles are dealt and no
    /// side has won yet).
    pub fn is_running(&self) -> bool {
        match self {
            Self::NotStarted | Self::Won => false,
            Self::Day(_)
            | Self::WaitingOnNightActions
            | Self::WaitingOnDayActivities
            | Self::WaitingOnAccusedDefense
            | Self::WaitingOnTrialVotes => true,
        }
    }

    /// Returns `true` while a trial is open.
    pub fn is_trial(&self) -> bool {
        matches!(self, Self::WaitingOnAccusedDefense | Self::WaitingOnTrialVotes)
    }

    /// Returns `true` for the phases where players talk openly.
    pub fn is_daytime(&self) -> bool {
        matches!(
            self,
            Self::Day(_)
                | Self::WaitingOnDayActivities
                | Self::WaitingOnAccusedDefense
                | Self::WaitingOnTrialVotes
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "NotStarted"),
            Self::Day(n) => write!(f, "Day({n})"),
            Self::WaitingOnNightActions => write!(f, "WaitingOnNightActions"),
            Self::WaitingOnDayActivities => write!(f, "WaitingOnDayActivities"),
            Self::WaitingOnAccusedDefense => write!(f, "WaitingOnAccusedDefense"),
            Self::WaitingOnTrialVotes => write!(f, "WaitingOnTrialVotes"),
            Self::Won => write!(f, "Won"),
        }
    }
}
