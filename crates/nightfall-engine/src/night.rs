//! Night action coordination: collecting one private action per slot and
//! resolving them in a fixed order once everyone has acted.
//!
//! The barrier and the resolution are pure functions of the submitted
//! actions and the current role assignment, so submission order never
//! affects the outcome.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use nightfall_protocol::PlayerId;
use serde::{Deserialize, Serialize};

use crate::{GameError, IllegalReason, Role, RoleAssignment, RuleToggles};

// ---------------------------------------------------------------------------
// Slots
// ---------------------------------------------------------------------------

/// A role type with a night ability. Ordered by resolution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NightSlot {
    Protector,
    Eliminator,
    Investigator,
    Shadow,
}

impl NightSlot {
    /// Shield first, then the elimination, then the information roles.
    pub const RESOLUTION_ORDER: [NightSlot; 4] = [
        NightSlot::Protector,
        NightSlot::Eliminator,
        NightSlot::Investigator,
        NightSlot::Shadow,
    ];

    /// The role that acts in this slot.
    pub fn role(self) -> Role {
        match self {
            Self::Protector => Role::Protector,
            Self::Eliminator => Role::Eliminator,
            Self::Investigator => Role::Investigator,
            Self::Shadow => Role::Shadow,
        }
    }
}

/// Slots that must act before the night can resolve early.
///
/// A slot is open when at least one active player holds its role and its
/// ability is enabled tonight. Eliminations can be switched off for the
/// first night by configuration.
pub fn open_slots(assignment: &RoleAssignment, elimination_enabled: bool) -> Vec<NightSlot> {
    NightSlot::RESOLUTION_ORDER
        .into_iter()
        .filter(|slot| *slot != NightSlot::Eliminator || elimination_enabled)
        .filter(|slot| !assignment.active_holders(slot.role()).is_empty())
        .collect()
}

// ---------------------------------------------------------------------------
// Submissions
// ---------------------------------------------------------------------------

/// One accepted night action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NightAction {
    pub slot: NightSlot,
    pub actor: PlayerId,
    pub target: PlayerId,
    pub submitted_at: Instant,
}

/// Tonight's submissions, at most one per slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NightActions {
    actions: BTreeMap<NightSlot, NightAction>,
    reminded: BTreeSet<NightSlot>,
}

impl NightActions {
    /// Forgets every submission and reminder. Called at the start of each
    /// night.
    pub fn clear(&mut self) {
        self.actions.clear();
        self.reminded.clear();
    }

    pub fn get(&self, slot: NightSlot) -> Option<&NightAction> {
        self.actions.get(&slot)
    }

    /// Records `action`.
    ///
    /// # Errors
    /// [`GameError::AlreadySubmitted`] if the slot already has an action,
    /// including one submitted by an eliminator partner.
    pub fn submit(&mut self, action: NightAction) -> Result<(), GameError> {
        if self.actions.contains_key(&action.slot) {
            return Err(GameError::AlreadySubmitted(action.actor));
        }
        self.actions.insert(action.slot, action);
        Ok(())
    }

    /// Drops any action submitted by `actor`. Returns the slots cleared.
    pub fn cancel_by(&mut self, actor: PlayerId) -> Vec<NightSlot> {
        let slots: Vec<NightSlot> = self
            .actions
            .values()
            .filter(|a| a.actor == actor)
            .map(|a| a.slot)
            .collect();
        for slot in &slots {
            self.actions.remove(slot);
        }
        slots
    }

    /// `true` when every open slot has a submission.
    pub fn barrier_met(&self, open: &[NightSlot]) -> bool {
        open.iter().all(|slot| self.actions.contains_key(slot))
    }

    /// Open slots still waiting on their holder.
    pub fn pending(&self, open: &[NightSlot]) -> Vec<NightSlot> {
        open.iter()
            .copied()
            .filter(|slot| !self.actions.contains_key(slot))
            .collect()
    }

    /// Marks a slot as reminded. Returns `false` if it already was.
    pub fn mark_reminded(&mut self, slot: NightSlot) -> bool {
        self.reminded.insert(slot)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Checks whether `actor` acting in `slot` may target `target`.
///
/// The caller has already verified that both are active and that `actor`
/// holds the slot's role.
pub fn check_target(
    slot: NightSlot,
    actor: PlayerId,
    target: PlayerId,
    assignment: &RoleAssignment,
    rules: &RuleToggles,
    last_protected: Option<PlayerId>,
) -> Result<(), GameError> {
    let illegal = |reason| Err(GameError::IllegalTarget { target, reason });
    match slot {
        NightSlot::Eliminator if assignment.is_eliminator(target) => {
            illegal(IllegalReason::FellowEliminator)
        }
        NightSlot::Protector if target == actor && !rules.protector_can_protect_self => {
            illegal(IllegalReason::SelfProtection)
        }
        NightSlot::Protector
            if !rules.protector_can_repeat_target && last_protected == Some(target) =>
        {
            illegal(IllegalReason::RepeatedProtection)
        }
        NightSlot::Eliminator
        | NightSlot::Protector
        | NightSlot::Investigator
        | NightSlot::Shadow => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// What happened to the eliminators' choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EliminationOutcome {
    /// Eliminations are switched off tonight.
    Disabled,
    /// No target was chosen, or the target left before dawn.
    NoAction,
    /// The target was shielded.
    Prevented { target: PlayerId },
    /// The target is removed from play.
    Eliminated { target: PlayerId },
}

/// A private answer for an information role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub slot: NightSlot,
    pub actor: PlayerId,
    pub target: PlayerId,
    /// Investigator: the target is an eliminator. Shadow: the target is the
    /// investigator.
    pub positive: bool,
}

/// The outcome of one night.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NightResolution {
    pub shield: Option<PlayerId>,
    pub elimination: EliminationOutcome,
    pub findings: Vec<Finding>,
    /// Open slots that never acted.
    pub idle: Vec<NightSlot>,
}

/// Resolves tonight's actions against the current assignment.
///
/// Order: the protector's shield, then the elimination (prevented when it
/// hits the shielded player while a protector is active), then the
/// investigator and the shadow.
pub fn resolve(
    actions: &NightActions,
    assignment: &RoleAssignment,
    open: &[NightSlot],
    elimination_enabled: bool,
) -> NightResolution {
    let mut shield = None;
    let mut elimination = if elimination_enabled {
        EliminationOutcome::NoAction
    } else {
        EliminationOutcome::Disabled
    };
    let mut findings = Vec::new();

    for slot in NightSlot::RESOLUTION_ORDER {
        let Some(action) = actions.get(slot) else {
            continue;
        };
        if !assignment.is_active(action.actor) {
            continue;
        }
        match slot {
            NightSlot::Protector => shield = Some(action.target),
            NightSlot::Eliminator => {
                if !elimination_enabled || !assignment.is_active(action.target) {
                    continue;
                }
                elimination = if shield == Some(action.target) {
                    EliminationOutcome::Prevented {
                        target: action.target,
                    }
                } else {
                    EliminationOutcome::Eliminated {
                        target: action.target,
                    }
                };
            }
            NightSlot::Investigator => findings.push(Finding {
                slot,
                actor: action.actor,
                target: action.target,
                positive: assignment.is_eliminator(action.target),
            }),
            NightSlot::Shadow => findings.push(Finding {
                slot,
                actor: action.actor,
                target: action.target,
                positive: assignment.role_of(action.target) == Some(Role::Investigator),
            }),
        }
    }

    NightResolution {
        shield,
        elimination,
        findings,
        idle: actions.pending(open),
    }
}
