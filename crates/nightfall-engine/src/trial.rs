//! Accusations and trials.
//!
//! During the day any active player may accuse another. The accusation
//! ledger holds at most one accuser per accused player; a second, distinct
//! accuser restrains the accused and opens a [`Trial`].

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use nightfall_protocol::PlayerId;
use serde::{Deserialize, Serialize};

use crate::{GameError, VerdictRule};

// ---------------------------------------------------------------------------
// Accusation ledger
// ---------------------------------------------------------------------------

/// A standing accusation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accusation {
    pub accuser: PlayerId,
    pub at: Instant,
}

/// What an accepted accusation led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccuseOutcome {
    /// The accusation stands. `replaced` is the player this accuser had
    /// accused before, whose accusation was dropped.
    Recorded { replaced: Option<PlayerId> },
    /// A second accuser joined; a trial must open.
    Threshold { accusers: [PlayerId; 2] },
}

/// Standing accusations, keyed by the accused player.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccusationLedger {
    by_accused: BTreeMap<PlayerId, Accusation>,
}

impl AccusationLedger {
    /// Records that `accuser` accuses `accused`.
    ///
    /// Each accuser holds at most one standing accusation, so a new one
    /// replaces their previous target. A second, different accuser of the
    /// same player reaches the threshold and empties the ledger.
    ///
    /// # Errors
    /// [`GameError::AlreadySubmitted`] if `accuser` already stands behind
    /// this exact accusation.
    pub fn accuse(
        &mut self,
        accuser: PlayerId,
        accused: PlayerId,
        now: Instant,
    ) -> Result<AccuseOutcome, GameError> {
        if let Some(existing) = self.by_accused.get(&accused) {
            if existing.accuser == accuser {
                return Err(GameError::AlreadySubmitted(accuser));
            }
            let first = existing.accuser;
            self.by_accused.clear();
            return Ok(AccuseOutcome::Threshold {
                accusers: [first, accuser],
            });
        }

        let replaced = self.target_of(accuser);
        if let Some(previous) = replaced {
            self.by_accused.remove(&previous);
        }
        self.by_accused.insert(accused, Accusation { accuser, at: now });
        Ok(AccuseOutcome::Recorded { replaced })
    }

    /// Drops every accusation made by or against `player`.
    pub fn withdraw_involving(&mut self, player: PlayerId) {
        self.by_accused
            .retain(|accused, a| *accused != player && a.accuser != player);
    }

    /// Who currently accuses `accused`.
    pub fn accuser_of(&self, accused: PlayerId) -> Option<PlayerId> {
        self.by_accused.get(&accused).map(|a| a.accuser)
    }

    /// Whom `accuser` currently accuses.
    pub fn target_of(&self, accuser: PlayerId) -> Option<PlayerId> {
        self.by_accused
            .iter()
            .find(|(_, a)| a.accuser == accuser)
            .map(|(accused, _)| *accused)
    }

    pub fn clear(&mut self) {
        self.by_accused.clear();
    }

    pub fn len(&self) -> usize {
        self.by_accused.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_accused.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Trial
// ---------------------------------------------------------------------------

/// The result of a trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Guilty,
    Innocent,
    /// Time ran out (or votes tied) without a decision; the accused walks.
    NoVerdict,
}

/// Vote counts among the eligible voters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tally {
    pub guilty: usize,
    pub innocent: usize,
    pub undecided: usize,
}

impl Tally {
    pub fn eligible(&self) -> usize {
        self.guilty + self.innocent + self.undecided
    }

    /// The verdict if the outcome can no longer change, whatever the
    /// undecided voters do.
    pub fn locked_verdict(&self) -> Option<Verdict> {
        if self.guilty > self.innocent + self.undecided {
            Some(Verdict::Guilty)
        } else if self.innocent > self.guilty + self.undecided {
            Some(Verdict::Innocent)
        } else {
            None
        }
    }
}

impl VerdictRule {
    /// Decides a trial that is closing now, by deadline or because every
    /// eligible voter has voted.
    pub fn decide(self, tally: Tally) -> Verdict {
        match self {
            Self::MajorityOfEligible => {
                let eligible = tally.eligible();
                if tally.guilty * 2 > eligible {
                    Verdict::Guilty
                } else if tally.innocent * 2 > eligible {
                    Verdict::Innocent
                } else {
                    Verdict::NoVerdict
                }
            }
            Self::MajorityOfCast => {
                if tally.guilty > tally.innocent {
                    Verdict::Guilty
                } else if tally.innocent > tally.guilty {
                    Verdict::Innocent
                } else {
                    Verdict::NoVerdict
                }
            }
        }
    }
}

/// Who voted which way, for the closing announcement.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VoteBreakdown {
    pub guilty: Vec<PlayerId>,
    pub innocent: Vec<PlayerId>,
    pub abstained: Vec<PlayerId>,
}

/// An open trial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trial {
    pub accused: PlayerId,
    pub accusers: [PlayerId; 2],
    guilty: BTreeSet<PlayerId>,
    innocent: BTreeSet<PlayerId>,
    reminded: bool,
}

impl Trial {
    pub fn new(accused: PlayerId, accusers: [PlayerId; 2]) -> Self {
        Self {
            accused,
            accusers,
            guilty: BTreeSet::new(),
            innocent: BTreeSet::new(),
            reminded: false,
        }
    }

    /// Records `voter`'s vote. Switching sides is allowed. Returns `true`
    /// if this replaced an opposite vote.
    ///
    /// # Errors
    /// [`GameError::AlreadySubmitted`] if the voter repeats their vote.
    pub fn cast(&mut self, voter: PlayerId, guilty: bool) -> Result<bool, GameError> {
        let (into, from) = if guilty {
            (&mut self.guilty, &mut self.innocent)
        } else {
            (&mut self.innocent, &mut self.guilty)
        };
        if into.contains(&voter) {
            return Err(GameError::AlreadySubmitted(voter));
        }
        let switched = from.remove(&voter);
        into.insert(voter);
        Ok(switched)
    }

    /// Drops `voter`'s vote, if any.
    pub fn withdraw(&mut self, voter: PlayerId) {
        self.guilty.remove(&voter);
        self.innocent.remove(&voter);
    }

    /// Counts the votes of `eligible` voters.
    pub fn tally(&self, eligible: &[PlayerId]) -> Tally {
        let mut tally = Tally::default();
        for voter in eligible {
            if self.guilty.contains(voter) {
                tally.guilty += 1;
            } else if self.innocent.contains(voter) {
                tally.innocent += 1;
            } else {
                tally.undecided += 1;
            }
        }
        tally
    }

    pub fn breakdown(&self, eligible: &[PlayerId]) -> VoteBreakdown {
        let mut out = VoteBreakdown::default();
        for voter in eligible {
            if self.guilty.contains(voter) {
                out.guilty.push(*voter);
            } else if self.innocent.contains(voter) {
                out.innocent.push(*voter);
            } else {
                out.abstained.push(*voter);
            }
        }
        out
    }

    /// Marks the closing reminder as sent. Returns `false` if it already was.
    pub fn mark_reminded(&mut self) -> bool {
        !std::mem::replace(&mut self.reminded, true)
    }
}
