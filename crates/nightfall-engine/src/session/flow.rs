//! Phase transitions.
//!
//! Everything here runs inside a `GameSession` operation or tick and pushes
//! the events it produces onto `out`. Transitions are the only place
//! `phase` changes.

use std::time::Instant;

use nightfall_protocol::PlayerId;

use super::GameSession;
use crate::event::DepartureReason;
use crate::night::{self, EliminationOutcome, NightSlot};
use crate::trial::{Trial, Verdict};
use crate::win::{self, Winner};
use crate::{GameError, GameEvent, Outbound, Phase, RemovalCause, role};

/// Whole seconds from `now` until `deadline`, rounded down.
fn seconds_until(deadline: Option<Instant>, now: Instant) -> Option<u64> {
    deadline.map(|d| d.saturating_duration_since(now).as_secs())
}

fn passed(deadline: Option<Instant>, now: Instant) -> bool {
    deadline.is_some_and(|d| now >= d)
}

impl GameSession {
    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Selects a template, deals roles to everyone registered and opens day
    /// one. Nothing changes if selection or dealing fails.
    pub(super) fn start_game(
        &mut self,
        now: Instant,
        out: &mut Vec<Outbound>,
    ) -> Result<(), GameError> {
        let players = self.roster.ids();
        let game = self.config.select(players.len())?;
        let assignment = role::assign_roles(&players, &game, &mut self.rng)?;

        let length = self.config.scaled(game.durations.first_day);
        tracing::info!(template = %game.name, players = players.len(), "game started");

        out.push(Outbound::all(GameEvent::GameStarted {
            template: game.name,
            players: players.clone(),
            roles: game.rules.disclose_roles_at_start.then_some(game.roles),
        }));
        for reveal in assignment.reveal() {
            out.push(Outbound::player(
                reveal.player,
                GameEvent::RoleAssigned {
                    role: reveal.role,
                    partners: assignment.partners_of(reveal.player),
                },
            ));
        }

        self.game = Some(game);
        self.assignment = Some(assignment);
        self.night = 0;
        self.day = 1;
        self.phase = Phase::Day(1);
        self.deadline = Some(now + length);
        self.day_deadline = None;
        out.push(Outbound::all(GameEvent::PhaseEntered {
            phase: self.phase,
            round: 1,
            seconds: length.as_secs(),
        }));
        Ok(())
    }

    /// Ends the game with `winner` and starts the victory cooldown.
    pub(super) fn enter_won(&mut self, winner: Winner, now: Instant, out: &mut Vec<Outbound>) {
        let restrained = self.trial.take().map(|t| t.accused);
        let cooldown = self
            .game
            .map(|g| self.config.scaled(g.durations.victory))
            .unwrap_or_default();

        self.phase = Phase::Won;
        self.deadline = Some(now + cooldown);
        self.day_deadline = None;
        self.actions.clear();
        self.ledger.clear();
        self.skip_votes.clear();

        let (independent, reveal) = match &self.assignment {
            Some(a) => (win::independent_result(a, winner, restrained), a.reveal()),
            None => (None, Vec::new()),
        };
        tracing::info!(?winner, night = self.night, day = self.day, "game won");
        out.push(Outbound::all(GameEvent::GameWon {
            winner,
            independent,
            reveal,
        }));
    }

    /// Clears all per-game state. Registrations are kept.
    pub(super) fn reset(&mut self, announce: bool, out: &mut Vec<Outbound>) {
        self.phase = Phase::NotStarted;
        self.game = None;
        self.assignment = None;
        self.night = 0;
        self.day = 0;
        self.deadline = None;
        self.day_deadline = None;
        self.actions.clear();
        self.last_protected = None;
        self.ledger.clear();
        self.trial = None;
        self.skip_votes.clear();
        tracing::info!(registered = self.roster.len(), "table reset");
        if announce {
            out.push(Outbound::all(GameEvent::ReadyForNextGame));
        }
    }

    /// Unregisters `player` and takes them out of the running game.
    pub(super) fn depart(
        &mut self,
        player: PlayerId,
        reason: DepartureReason,
        now: Instant,
        out: &mut Vec<Outbound>,
    ) {
        self.roster.unregister(player);
        tracing::info!(%player, ?reason, "player unregistered");
        out.push(Outbound::all(GameEvent::PlayerUnregistered { player, reason }));

        if self.roster.is_empty() {
            if self.phase != Phase::NotStarted {
                self.reset(false, out);
            }
            return;
        }

        let cause = match reason {
            DepartureReason::Left => RemovalCause::Left,
            DepartureReason::TimedOut => RemovalCause::TimedOut,
        };
        if self.phase.is_running() && !self.remove_from_play(player, cause, now, out) {
            self.settle(now, out);
        }
    }

    /// Moves `player` from active to removed and cleans up everything that
    /// referenced them. Returns `true` if the removal ended the game.
    pub(super) fn remove_from_play(
        &mut self,
        player: PlayerId,
        cause: RemovalCause,
        now: Instant,
        out: &mut Vec<Outbound>,
    ) -> bool {
        let Some(assignment) = self.assignment.as_mut() else {
            return false;
        };
        if !assignment.remove(player, cause) {
            return false;
        }
        tracing::info!(%player, ?cause, "player removed from play");
        out.push(Outbound::all(GameEvent::PlayerRemoved { player, cause }));

        let cancelled = self.actions.cancel_by(player);
        if !cancelled.is_empty() {
            tracing::debug!(%player, ?cancelled, "night action cancelled");
        }
        self.ledger.withdraw_involving(player);
        self.skip_votes.remove(&player);
        let accused_removed = match self.trial.as_mut() {
            Some(trial) if trial.accused == player => true,
            Some(trial) => {
                trial.withdraw(player);
                false
            }
            None => false,
        };

        if let Some(winner) = self.evaluate_win() {
            self.enter_won(winner, now, out);
            return true;
        }
        if accused_removed {
            self.trial = None;
            out.push(Outbound::all(GameEvent::TrialAbandoned { accused: player }));
            self.resume_day(now, out);
        }
        false
    }

    pub(super) fn evaluate_win(&self) -> Option<Winner> {
        let assignment = self.assignment.as_ref()?;
        win::evaluate(assignment, self.config.eliminator_win_floor)
    }

    // -----------------------------------------------------------------------
    // Night
    // -----------------------------------------------------------------------

    pub(super) fn elimination_enabled(&self) -> bool {
        self.night > 1 || self.game.is_some_and(|g| g.rules.first_night_elimination)
    }

    pub(super) fn open_slots(&self) -> Vec<NightSlot> {
        self.assignment
            .as_ref()
            .map(|a| night::open_slots(a, self.elimination_enabled()))
            .unwrap_or_default()
    }

    pub(super) fn enter_night(&mut self, now: Instant, out: &mut Vec<Outbound>) {
        self.night += 1;
        self.phase = Phase::WaitingOnNightActions;
        self.actions.clear();
        self.ledger.clear();
        self.skip_votes.clear();
        self.trial = None;
        self.day_deadline = None;

        let Some(game) = self.game else {
            return;
        };
        let length = if self.night == 1 {
            game.durations.first_night
        } else {
            game.durations.night
        };
        let length = self.config.scaled(length);
        self.deadline = Some(now + length);

        if let Some(winner) = self.evaluate_win() {
            self.enter_won(winner, now, out);
            return;
        }

        tracing::info!(night = self.night, seconds = length.as_secs(), "night falls");
        out.push(Outbound::all(GameEvent::PhaseEntered {
            phase: self.phase,
            round: self.night,
            seconds: length.as_secs(),
        }));

        let enabled = self.elimination_enabled();
        let Some(assignment) = &self.assignment else {
            return;
        };
        for slot in NightSlot::RESOLUTION_ORDER {
            let enabled = slot != NightSlot::Eliminator || enabled;
            for holder in assignment.active_holders(slot.role()) {
                out.push(Outbound::player(holder, GameEvent::NightPrompt { slot, enabled }));
            }
        }
    }

    /// Applies tonight's actions and moves on to the day, or to the end of
    /// the game if the elimination decided it.
    pub(super) fn resolve_night(&mut self, now: Instant, out: &mut Vec<Outbound>) {
        let enabled = self.elimination_enabled();
        let Some(assignment) = &self.assignment else {
            return;
        };
        let open = night::open_slots(assignment, enabled);
        let resolution = night::resolve(&self.actions, assignment, &open, enabled);
        tracing::info!(
            night = self.night,
            outcome = ?resolution.elimination,
            idle = resolution.idle.len(),
            "night resolved"
        );

        for slot in &resolution.idle {
            for holder in assignment.active_holders(slot.role()) {
                out.push(Outbound::player(holder, GameEvent::NoActionTaken { slot: *slot }));
            }
        }
        for finding in &resolution.findings {
            let event = match finding.slot {
                NightSlot::Investigator => GameEvent::InvestigationResult {
                    target: finding.target,
                    is_eliminator: finding.positive,
                },
                NightSlot::Shadow => GameEvent::ShadowResult {
                    target: finding.target,
                    found_investigator: finding.positive,
                },
                NightSlot::Protector | NightSlot::Eliminator => continue,
            };
            out.push(Outbound::player(finding.actor, event));
        }

        let protector = self.actions.get(NightSlot::Protector).map(|a| a.actor);
        self.last_protected = resolution.shield;
        let announce_protection = self.game.is_some_and(|g| g.rules.announce_protection);

        match resolution.elimination {
            EliminationOutcome::Prevented { target } => {
                if let Some(protector) = protector {
                    out.push(Outbound::player(
                        protector,
                        GameEvent::ProtectionSucceeded { target },
                    ));
                }
                let outcome = if announce_protection {
                    resolution.elimination
                } else {
                    EliminationOutcome::NoAction
                };
                out.push(Outbound::all(GameEvent::Dawn { outcome }));
            }
            EliminationOutcome::Eliminated { target } => {
                out.push(Outbound::all(GameEvent::Dawn {
                    outcome: resolution.elimination,
                }));
                if self.remove_from_play(target, RemovalCause::Eliminated, now, out) {
                    return;
                }
            }
            EliminationOutcome::Disabled | EliminationOutcome::NoAction => {
                out.push(Outbound::all(GameEvent::Dawn {
                    outcome: resolution.elimination,
                }));
            }
        }

        self.enter_day(now, out);
    }

    // -----------------------------------------------------------------------
    // Day and trials
    // -----------------------------------------------------------------------

    pub(super) fn enter_day(&mut self, now: Instant, out: &mut Vec<Outbound>) {
        self.day += 1;
        self.phase = Phase::WaitingOnDayActivities;
        self.actions.clear();
        self.ledger.clear();
        self.skip_votes.clear();
        self.trial = None;

        let length = self
            .game
            .map(|g| self.config.scaled(g.durations.day))
            .unwrap_or_default();
        self.day_deadline = Some(now + length);
        self.deadline = self.day_deadline;

        if let Some(winner) = self.evaluate_win() {
            self.enter_won(winner, now, out);
            return;
        }

        tracing::info!(day = self.day, seconds = length.as_secs(), "day breaks");
        out.push(Outbound::all(GameEvent::PhaseEntered {
            phase: self.phase,
            round: self.day,
            seconds: length.as_secs(),
        }));
    }

    /// Restrains `accused` and gives them the floor.
    pub(super) fn open_trial(
        &mut self,
        accused: PlayerId,
        accusers: [PlayerId; 2],
        now: Instant,
        out: &mut Vec<Outbound>,
    ) {
        let length = self
            .game
            .map(|g| self.config.scaled(g.durations.defense))
            .unwrap_or_default();
        let open = self.game.is_some_and(|g| g.rules.open_accusations);

        self.trial = Some(Trial::new(accused, accusers));
        self.skip_votes.clear();
        self.phase = Phase::WaitingOnAccusedDefense;
        self.deadline = Some(now + length);

        tracing::info!(%accused, ?accusers, "trial opened");
        out.push(Outbound::all(GameEvent::TrialOpened {
            accused,
            accusers: open.then_some(accusers),
            defense_secs: length.as_secs(),
        }));
    }

    /// Ends the defense and opens the vote. Pushes the day back if the vote
    /// would outlive it.
    pub(super) fn open_voting(&mut self, now: Instant, out: &mut Vec<Outbound>) {
        let Some(accused) = self.trial.as_ref().map(|t| t.accused) else {
            return;
        };
        let (length, margin) = match self.game {
            Some(g) => (
                self.config.scaled(g.durations.voting),
                self.config.scaled(self.config.trial_overrun_margin),
            ),
            None => Default::default(),
        };
        let vote_deadline = now + length;

        self.phase = Phase::WaitingOnTrialVotes;
        self.deadline = Some(vote_deadline);
        if self.day_deadline.is_none_or(|d| vote_deadline > d) {
            self.day_deadline = Some(vote_deadline + margin);
            tracing::debug!("day extended to fit the vote");
        }

        let eligible = self.eligible_voters().len();
        tracing::info!(%accused, eligible, "voting opened");
        out.push(Outbound::all(GameEvent::VotingOpened {
            accused,
            eligible,
            seconds: length.as_secs(),
        }));
    }

    /// Active players other than the accused.
    pub(super) fn eligible_voters(&self) -> Vec<PlayerId> {
        let accused = self.trial.as_ref().map(|t| t.accused);
        self.active_players()
            .into_iter()
            .filter(|p| Some(*p) != accused)
            .collect()
    }

    /// Announces `verdict` and carries it out.
    pub(super) fn close_trial(&mut self, verdict: Verdict, now: Instant, out: &mut Vec<Outbound>) {
        let eligible = self.eligible_voters();
        let Some(trial) = self.trial.take() else {
            return;
        };
        let accused = trial.accused;
        let votes = trial.breakdown(&eligible);
        tracing::info!(
            %accused,
            ?verdict,
            guilty = votes.guilty.len(),
            innocent = votes.innocent.len(),
            abstained = votes.abstained.len(),
            "trial closed"
        );
        out.push(Outbound::all(GameEvent::TrialClosed {
            accused,
            verdict,
            votes,
        }));

        match verdict {
            Verdict::Guilty => {
                if !self.remove_from_play(accused, RemovalCause::Convicted, now, out) {
                    self.enter_night(now, out);
                }
            }
            Verdict::Innocent | Verdict::NoVerdict => self.resume_day(now, out),
        }
    }

    /// Returns to open discussion for whatever remains of the day.
    pub(super) fn resume_day(&mut self, now: Instant, out: &mut Vec<Outbound>) {
        self.phase = Phase::WaitingOnDayActivities;
        self.deadline = self.day_deadline;
        out.push(Outbound::all(GameEvent::DayResumed {
            seconds_left: seconds_until(self.day_deadline, now).unwrap_or_default(),
        }));
    }

    // -----------------------------------------------------------------------
    // Clock and completion checks
    // -----------------------------------------------------------------------

    /// Moves on from any phase whose conditions for completion are already
    /// met: a full night barrier, a decided vote, or a unanimous skip.
    pub(super) fn settle(&mut self, now: Instant, out: &mut Vec<Outbound>) {
        match self.phase {
            Phase::WaitingOnNightActions => {
                let open = self.open_slots();
                if self.actions.barrier_met(&open) {
                    tracing::debug!(night = self.night, "all night actions in");
                    self.resolve_night(now, out);
                }
            }
            Phase::WaitingOnTrialVotes => {
                let Some(trial) = &self.trial else {
                    return;
                };
                let tally = trial.tally(&self.eligible_voters());
                if let Some(verdict) = tally.locked_verdict() {
                    self.close_trial(verdict, now, out);
                } else if tally.undecided == 0 {
                    let verdict = self.config.verdict_rule.decide(tally);
                    self.close_trial(verdict, now, out);
                }
            }
            Phase::Day(_) | Phase::WaitingOnDayActivities => {
                let active = self.active_players();
                if !active.is_empty() && active.iter().all(|p| self.skip_votes.contains(p)) {
                    tracing::info!(day = self.day, "day skipped by the whole table");
                    self.enter_night(now, out);
                }
            }
            Phase::NotStarted | Phase::WaitingOnAccusedDefense | Phase::Won => {}
        }
    }

    /// Fires the deadline of the current phase, if it has passed.
    pub(super) fn advance_on_deadline(&mut self, now: Instant, out: &mut Vec<Outbound>) {
        match self.phase {
            Phase::NotStarted => {}
            Phase::Day(_) => {
                if passed(self.deadline, now) {
                    self.enter_night(now, out);
                }
            }
            Phase::WaitingOnNightActions => {
                if passed(self.deadline, now) {
                    tracing::debug!(night = self.night, "night deadline reached");
                    self.resolve_night(now, out);
                }
            }
            Phase::WaitingOnDayActivities => {
                if passed(self.day_deadline, now) {
                    self.enter_night(now, out);
                }
            }
            Phase::WaitingOnAccusedDefense => {
                if passed(self.day_deadline, now) {
                    if let Some(trial) = self.trial.take() {
                        tracing::info!(accused = %trial.accused, "day ended during the defense");
                        out.push(Outbound::all(GameEvent::TrialAbandoned {
                            accused: trial.accused,
                        }));
                    }
                    self.enter_night(now, out);
                } else if passed(self.deadline, now) {
                    self.open_voting(now, out);
                }
            }
            Phase::WaitingOnTrialVotes => {
                if passed(self.deadline, now) {
                    let Some(trial) = &self.trial else {
                        return;
                    };
                    let tally = trial.tally(&self.eligible_voters());
                    let verdict = self.config.verdict_rule.decide(tally);
                    self.close_trial(verdict, now, out);
                }
            }
            Phase::Won => {
                if passed(self.deadline, now) {
                    self.reset(true, out);
                }
            }
        }
    }

    /// Nudges whoever still owes an action once the end is near. Each
    /// reminder is sent at most once per night or trial.
    pub(super) fn send_reminders(&mut self, now: Instant, out: &mut Vec<Outbound>) {
        let Some(left) = self.deadline.map(|d| d.saturating_duration_since(now)) else {
            return;
        };
        if left.is_zero() {
            return;
        }
        match self.phase {
            Phase::WaitingOnNightActions => {
                if left > self.config.scaled(self.config.night_warning_lead) {
                    return;
                }
                let open = self.open_slots();
                let Some(assignment) = &self.assignment else {
                    return;
                };
                for slot in self.actions.pending(&open) {
                    if !self.actions.mark_reminded(slot) {
                        continue;
                    }
                    for holder in assignment.active_holders(slot.role()) {
                        out.push(Outbound::player(
                            holder,
                            GameEvent::NightReminder {
                                slot,
                                seconds_left: left.as_secs(),
                            },
                        ));
                    }
                }
            }
            Phase::WaitingOnTrialVotes => {
                if left > self.config.scaled(self.config.vote_warning_lead) {
                    return;
                }
                if self.trial.as_mut().is_some_and(Trial::mark_reminded) {
                    out.push(Outbound::all(GameEvent::VoteReminder {
                        seconds_left: left.as_secs(),
                    }));
                }
            }
            Phase::NotStarted
            | Phase::Day(_)
            | Phase::WaitingOnDayActivities
            | Phase::WaitingOnAccusedDefense
            | Phase::Won => {}
        }
    }

    pub(super) fn status_report(&self, now: Instant) -> GameEvent {
        GameEvent::StatusReport {
            phase: self.phase,
            seconds_left: seconds_until(self.deadline, now),
            active: self.active_players(),
            registered: self.roster.ids(),
        }
    }
}
