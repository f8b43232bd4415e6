//! The game session: the aggregate root that owns one table's state.
//!
//! A `GameSession` is plain synchronous data. Every operation takes the
//! current time as an argument and returns the events it produced, so the
//! same inputs always give the same outputs. The room actor owns exactly
//! one session and feeds it commands and clock ticks one at a time; the
//! session never needs a lock.
//!
//! Rejections (`Err(GameError)`) leave the session untouched.

mod flow;

use std::collections::BTreeSet;
use std::time::Instant;

use nightfall_protocol::{Command, PlayerId, SessionHandle};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::event::DepartureReason;
use crate::night::{self, NightAction, NightActions};
use crate::roster::{Departure, Registration, Roster};
use crate::trial::{AccuseOutcome, AccusationLedger, Trial};
use crate::{
    EngineConfig, GameConfig, GameError, GameEvent, IllegalReason, NightSlot, Outbound, Phase,
    Role, RoleAssignment,
};

/// One table's game: registrations, the current phase, and everything the
/// phase depends on.
#[derive(Debug, Clone)]
pub struct GameSession {
    config: EngineConfig,
    roster: Roster,
    phase: Phase,
    game: Option<GameConfig>,
    assignment: Option<RoleAssignment>,
    night: u32,
    day: u32,
    /// End of the current phase.
    deadline: Option<Instant>,
    /// End of the current day. Survives a trial and may be pushed back by
    /// one.
    day_deadline: Option<Instant>,
    actions: NightActions,
    last_protected: Option<PlayerId>,
    ledger: AccusationLedger,
    trial: Option<Trial>,
    skip_votes: BTreeSet<PlayerId>,
    rng: StdRng,
}

impl GameSession {
    /// Creates an empty session in [`Phase::NotStarted`].
    pub fn new(config: EngineConfig) -> Self {
        Self::with_rng(config, StdRng::from_rng(&mut rand::rng()))
    }

    /// Creates a session whose role deals are reproducible.
    pub fn with_seed(config: EngineConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: EngineConfig, rng: StdRng) -> Self {
        Self {
            config,
            roster: Roster::new(),
            phase: Phase::NotStarted,
            game: None,
            assignment: None,
            night: 0,
            day: 0,
            deadline: None,
            day_deadline: None,
            actions: NightActions::default(),
            last_protected: None,
            ledger: AccusationLedger::default(),
            trial: None,
            skip_votes: BTreeSet::new(),
            rng,
        }
    }

    /// Dispatches a player command to the matching operation.
    pub fn apply(
        &mut self,
        actor: PlayerId,
        command: Command,
        now: Instant,
    ) -> Result<Vec<Outbound>, GameError> {
        match command {
            Command::Join { handle } => self.join(actor, handle, now),
            Command::Leave {
                handle,
                intentional,
            } => self.leave(actor, handle, intentional, now),
            Command::NightAction { target } => self.submit_night_action(actor, target, now),
            Command::Accuse { target } => self.raise_accusation(actor, target, now),
            Command::Vote { guilty } => self.cast_trial_vote(actor, guilty, now),
            Command::Start => self.request_start(actor, now),
            Command::Skip => self.request_skip(actor, now),
            Command::MyRole => self.my_role(actor),
            Command::Status => self.status(actor, now),
        }
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Registers `player` on `handle`.
    ///
    /// A player who is already registered is rebound to the new handle
    /// instead: their seat, role, night action, accusation and trial vote
    /// all stay exactly as they were, and any pending grace timer is
    /// cancelled.
    ///
    /// # Errors
    /// [`GameError::NotEligible`] when the room is full.
    pub fn join(
        &mut self,
        player: PlayerId,
        handle: SessionHandle,
        now: Instant,
    ) -> Result<Vec<Outbound>, GameError> {
        if !self.roster.contains(player) && self.roster.len() >= self.config.max_players {
            return Err(GameError::NotEligible(player));
        }

        let mut out = Vec::new();
        match self.roster.register(player, handle, now) {
            Registration::Rebound {
                was_disconnected, ..
            } => {
                tracing::info!(%player, %handle, was_disconnected, "player rebound to new session");
                if was_disconnected {
                    out.push(Outbound::all_except(
                        player,
                        GameEvent::PlayerReconnected { player },
                    ));
                }
                if let Some(assignment) = &self.assignment {
                    if let Some(role) = assignment.role_of(player) {
                        out.push(Outbound::player(
                            player,
                            GameEvent::RoleReminder {
                                role,
                                partners: assignment.partners_of(player),
                            },
                        ));
                    }
                }
                out.push(Outbound::player(player, self.status_report(now)));
            }
            Registration::New => {
                let waiting = self.phase != Phase::NotStarted;
                tracing::info!(
                    %player,
                    %handle,
                    registered = self.roster.len(),
                    waiting,
                    "player registered"
                );
                out.push(Outbound::all(GameEvent::PlayerRegistered {
                    player,
                    registered: self.roster.len(),
                    waiting,
                }));
                if self.config.auto_start
                    && self.phase == Phase::NotStarted
                    && self.roster.len() >= self.config.min_players
                {
                    if let Err(error) = self.start_game(now, &mut out) {
                        tracing::warn!(%error, "automatic start failed");
                        out.push(Outbound::all(GameEvent::StartAborted { error }));
                    }
                }
            }
        }
        Ok(out)
    }

    /// Handles a departure reported on `handle`.
    ///
    /// Intentional departures take effect at once. A dropped connection
    /// keeps its seat for the reconnect grace period; [`tick`](Self::tick)
    /// removes the player if they have not rejoined by then. A departure
    /// reported on a handle that has since been replaced is ignored.
    ///
    /// # Errors
    /// [`GameError::NotEligible`] if `player` is not registered.
    pub fn leave(
        &mut self,
        player: PlayerId,
        handle: SessionHandle,
        intentional: bool,
        now: Instant,
    ) -> Result<Vec<Outbound>, GameError> {
        if !self.roster.contains(player) {
            return Err(GameError::NotEligible(player));
        }
        if !self.roster.is_live(player, handle) {
            tracing::debug!(%player, %handle, "ignoring departure of a replaced session");
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        if intentional {
            self.depart(player, DepartureReason::Left, now, &mut out);
        } else {
            let grace = self.config.reconnect_grace;
            let departure = self.roster.disconnect(player, handle, now, grace);
            if let Departure::GraceStarted { .. } = departure {
                tracing::info!(
                    %player,
                    grace_secs = grace.as_secs(),
                    "player disconnected, seat held"
                );
                out.push(Outbound::all_except(
                    player,
                    GameEvent::PlayerDisconnected {
                        player,
                        grace_secs: grace.as_secs(),
                    },
                ));
            }
        }
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Game commands
    // -----------------------------------------------------------------------

    /// Deals roles and begins the first day.
    ///
    /// # Errors
    /// - [`GameError::InvalidPhase`] unless the table is in the lobby.
    /// - [`GameError::NotEligible`] if `actor` is not registered.
    /// - [`GameError::NotEnoughPlayers`] below `min_players`.
    /// - [`GameError::Configuration`] if no template fits; nothing is dealt.
    pub fn request_start(
        &mut self,
        actor: PlayerId,
        now: Instant,
    ) -> Result<Vec<Outbound>, GameError> {
        if self.phase != Phase::NotStarted {
            return Err(GameError::InvalidPhase(self.phase));
        }
        if !self.roster.contains(actor) {
            return Err(GameError::NotEligible(actor));
        }
        if self.roster.len() < self.config.min_players {
            return Err(GameError::NotEnoughPlayers {
                required: self.config.min_players,
                registered: self.roster.len(),
            });
        }

        let mut out = Vec::new();
        self.start_game(now, &mut out)?;
        Ok(out)
    }

    /// Submits `actor`'s night ability against `target`.
    ///
    /// Accepted only while waiting on night actions, from an active holder
    /// of a role with a night ability, once per slot per night. Eliminators
    /// share one slot. The barrier is re-checked after every accepted
    /// submission and the night resolves as soon as it holds.
    pub fn submit_night_action(
        &mut self,
        actor: PlayerId,
        target: PlayerId,
        now: Instant,
    ) -> Result<Vec<Outbound>, GameError> {
        if self.phase != Phase::WaitingOnNightActions {
            return Err(GameError::InvalidPhase(self.phase));
        }
        let elimination_enabled = self.elimination_enabled();
        let (Some(assignment), Some(game)) = (&self.assignment, &self.game) else {
            return Err(GameError::InvalidPhase(self.phase));
        };
        if !assignment.is_active(actor) {
            return Err(GameError::NotEligible(actor));
        }
        let slot = assignment
            .role_of(actor)
            .and_then(Role::night_slot)
            .ok_or(GameError::NotEligible(actor))?;
        if slot == NightSlot::Eliminator && !elimination_enabled {
            return Err(GameError::InvalidPhase(self.phase));
        }
        if self.actions.get(slot).is_some() {
            return Err(GameError::AlreadySubmitted(actor));
        }
        if !assignment.is_active(target) {
            return Err(GameError::UnknownTarget(target));
        }
        night::check_target(slot, actor, target, assignment, &game.rules, self.last_protected)?;

        let holders = assignment.active_holders(slot.role());
        self.actions.submit(NightAction {
            slot,
            actor,
            target,
            submitted_at: now,
        })?;
        tracing::info!(%actor, ?slot, night = self.night, "night action accepted");

        let mut out: Vec<Outbound> = holders
            .into_iter()
            .map(|holder| {
                Outbound::player(
                    holder,
                    GameEvent::NightActionAccepted {
                        slot,
                        actor,
                        target,
                    },
                )
            })
            .collect();
        self.settle(now, &mut out);
        Ok(out)
    }

    /// Records `actor`'s accusation against `target`. A second, distinct
    /// accuser of the same player opens a trial.
    pub fn raise_accusation(
        &mut self,
        actor: PlayerId,
        target: PlayerId,
        now: Instant,
    ) -> Result<Vec<Outbound>, GameError> {
        if self.phase != Phase::WaitingOnDayActivities {
            return Err(GameError::InvalidPhase(self.phase));
        }
        if !self.is_active(actor) {
            return Err(GameError::NotEligible(actor));
        }
        if !self.is_active(target) {
            return Err(GameError::UnknownTarget(target));
        }
        if actor == target {
            return Err(GameError::IllegalTarget {
                target,
                reason: IllegalReason::SelfAccusation,
            });
        }

        let outcome = self.ledger.accuse(actor, target, now)?;
        let open = self.game.is_some_and(|g| g.rules.open_accusations);
        tracing::info!(accuser = %actor, accused = %target, "accusation raised");

        let mut out = vec![Outbound::all(GameEvent::AccusationRaised {
            accuser: open.then_some(actor),
            accused: target,
        })];
        match outcome {
            AccuseOutcome::Recorded { .. } => {}
            AccuseOutcome::Threshold { accusers } => {
                self.open_trial(target, accusers, now, &mut out);
            }
        }
        Ok(out)
    }

    /// Records `actor`'s vote in the running trial. Voters may switch
    /// sides; repeating a vote is rejected.
    pub fn cast_trial_vote(
        &mut self,
        actor: PlayerId,
        guilty: bool,
        now: Instant,
    ) -> Result<Vec<Outbound>, GameError> {
        if self.phase != Phase::WaitingOnTrialVotes {
            return Err(GameError::InvalidPhase(self.phase));
        }
        let active = self.is_active(actor);
        let Some(trial) = self.trial.as_mut() else {
            return Err(GameError::InvalidPhase(self.phase));
        };
        if !active || trial.accused == actor {
            return Err(GameError::NotEligible(actor));
        }
        trial.cast(actor, guilty)?;
        tracing::info!(voter = %actor, guilty, "trial vote recorded");

        let mut out = vec![Outbound::all(GameEvent::VoteRecorded {
            voter: actor,
            guilty,
        })];
        self.settle(now, &mut out);
        Ok(out)
    }

    /// Asks to end the current day early. The day ends once every active
    /// player has asked.
    pub fn request_skip(
        &mut self,
        actor: PlayerId,
        now: Instant,
    ) -> Result<Vec<Outbound>, GameError> {
        if !matches!(self.phase, Phase::Day(_) | Phase::WaitingOnDayActivities) {
            return Err(GameError::InvalidPhase(self.phase));
        }
        if !self.is_active(actor) {
            return Err(GameError::NotEligible(actor));
        }
        if !self.skip_votes.insert(actor) {
            return Err(GameError::AlreadySubmitted(actor));
        }

        let needed = self.active_players().len();
        let mut out = vec![Outbound::all(GameEvent::SkipRequested {
            player: actor,
            votes: self.skip_votes.len(),
            needed,
        })];
        self.settle(now, &mut out);
        Ok(out)
    }

    /// Privately reminds `actor` of their role.
    pub fn my_role(&self, actor: PlayerId) -> Result<Vec<Outbound>, GameError> {
        let assignment = self
            .assignment
            .as_ref()
            .ok_or(GameError::InvalidPhase(self.phase))?;
        let role = assignment
            .role_of(actor)
            .ok_or(GameError::NotEligible(actor))?;
        Ok(vec![Outbound::player(
            actor,
            GameEvent::RoleReminder {
                role,
                partners: assignment.partners_of(actor),
            },
        )])
    }

    /// Privately sends `actor` a snapshot of the table.
    pub fn status(&self, actor: PlayerId, now: Instant) -> Result<Vec<Outbound>, GameError> {
        if !self.roster.contains(actor) {
            return Err(GameError::NotEligible(actor));
        }
        Ok(vec![Outbound::player(actor, self.status_report(now))])
    }

    /// Advances the clock: releases seats whose grace ran out, sends
    /// reminders, fires phase deadlines, and re-checks the barrier and
    /// trial closure.
    pub fn tick(&mut self, now: Instant) -> Vec<Outbound> {
        let mut out = Vec::new();
        for player in self.roster.expired(now) {
            tracing::info!(%player, "reconnect grace elapsed");
            self.depart(player, DepartureReason::TimedOut, now, &mut out);
        }
        self.send_reminders(now, &mut out);
        self.advance_on_deadline(now, &mut out);
        self.settle(now, &mut out);
        out
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn engine_config(&self) -> &EngineConfig {
        &self.config
    }

    /// The frozen configuration of the running (or just won) game.
    pub fn game_config(&self) -> Option<&GameConfig> {
        self.game.as_ref()
    }

    pub fn assignment(&self) -> Option<&RoleAssignment> {
        self.assignment.as_ref()
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn trial(&self) -> Option<&Trial> {
        self.trial.as_ref()
    }

    pub fn ledger(&self) -> &AccusationLedger {
        &self.ledger
    }

    pub fn night_actions(&self) -> &NightActions {
        &self.actions
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn day_deadline(&self) -> Option<Instant> {
        self.day_deadline
    }

    pub fn night_number(&self) -> u32 {
        self.night
    }

    pub fn day_number(&self) -> u32 {
        self.day
    }

    pub fn is_active(&self, player: PlayerId) -> bool {
        self.assignment
            .as_ref()
            .is_some_and(|a| a.is_active(player))
    }

    /// Active players in id order. Empty outside a game.
    pub fn active_players(&self) -> Vec<PlayerId> {
        self.assignment
            .as_ref()
            .map(|a| a.active().collect())
            .unwrap_or_default()
    }

    /// `false` when ticking would do nothing: the table is in the lobby and
    /// nobody is waiting out a grace period.
    pub fn needs_ticks(&self) -> bool {
        self.phase != Phase::NotStarted || self.roster.has_pending_grace()
    }
}
