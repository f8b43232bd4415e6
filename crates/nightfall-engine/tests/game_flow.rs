//! Whole-game scenarios driven through the public `GameSession` API with a
//! synthetic clock.

use std::time::{Duration, Instant};

use nightfall_engine::{
    DepartureReason, EliminationOutcome, EngineConfig, GameError, GameEvent, GameSession,
    IllegalReason, NightSlot, Outbound, Phase, PlayerId, Recipient, RemovalCause, Role,
    SessionHandle, Standing, Verdict, VerdictRule, Winner,
};

fn pid(id: u64) -> PlayerId {
    PlayerId(id)
}

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

/// Registers players `1..=n` and deals.
fn started(n: u64, config: EngineConfig, now: Instant) -> GameSession {
    let mut session = GameSession::with_seed(config, 7);
    for id in 1..=n {
        session.join(pid(id), SessionHandle(id), now).unwrap();
    }
    session.request_start(pid(1), now).unwrap();
    session
}

fn holder(session: &GameSession, role: Role) -> PlayerId {
    session
        .assignment()
        .unwrap()
        .holders(role)
        .next()
        .unwrap_or_else(|| panic!("no {role} dealt"))
}

fn holders(session: &GameSession, role: Role) -> Vec<PlayerId> {
    session.assignment().unwrap().holders(role).collect()
}

fn sent_to(out: &[Outbound], player: PlayerId) -> Vec<&GameEvent> {
    out.iter()
        .filter(|o| o.to == Recipient::Player(player))
        .map(|o| &o.event)
        .collect()
}

fn public(out: &[Outbound]) -> Vec<&GameEvent> {
    out.iter()
        .filter(|o| o.to == Recipient::All)
        .map(|o| &o.event)
        .collect()
}

/// Five-player game, first day over, first night resolved. Returns the
/// time day two began.
fn five_at_day_two(config: EngineConfig, t0: Instant) -> (GameSession, Instant) {
    let mut session = started(5, config, t0);
    let night = t0 + secs(120);
    session.tick(night);
    assert_eq!(session.phase(), Phase::WaitingOnNightActions);

    let inv = holder(&session, Role::Investigator);
    let shadow = holder(&session, Role::Shadow);
    let elim = holder(&session, Role::Eliminator);
    session.submit_night_action(inv, elim, night).unwrap();
    session.submit_night_action(shadow, inv, night).unwrap();
    assert_eq!(session.phase(), Phase::WaitingOnDayActivities);
    (session, night)
}

/// Opens a trial of `accused`, runs out the defense, and returns the time
/// voting opened.
fn open_vote(
    session: &mut GameSession,
    accused: PlayerId,
    accusers: [PlayerId; 2],
    now: Instant,
) -> Instant {
    session.raise_accusation(accusers[0], accused, now).unwrap();
    let out = session.raise_accusation(accusers[1], accused, now).unwrap();
    assert!(public(&out)
        .iter()
        .any(|e| matches!(e, GameEvent::TrialOpened { accused: a, .. } if *a == accused)));
    assert_eq!(session.phase(), Phase::WaitingOnAccusedDefense);

    let voting = now + secs(50);
    session.tick(voting);
    assert_eq!(session.phase(), Phase::WaitingOnTrialVotes);
    voting
}

// =========================================================================
// Setup
// =========================================================================

#[test]
fn test_start_five_players_deals_smallest_template() {
    let t0 = Instant::now();
    let session = started(5, EngineConfig::default(), t0);
    let assignment = session.assignment().unwrap();

    assert_eq!(assignment.count(Role::Eliminator), 1);
    assert_eq!(assignment.count(Role::Investigator), 1);
    assert_eq!(assignment.count(Role::Sleeper), 1);
    assert_eq!(assignment.count(Role::Shadow), 1);
    assert_eq!(assignment.count(Role::Townsfolk), 1);
    assert_eq!(assignment.count(Role::Protector), 0);
    assert_eq!(session.phase(), Phase::Day(1));
    assert_eq!(session.deadline(), Some(t0 + secs(120)));
}

#[test]
fn test_start_sends_each_player_their_role() {
    let t0 = Instant::now();
    let mut session = GameSession::with_seed(EngineConfig::default(), 3);
    for id in 1..=8 {
        session.join(pid(id), SessionHandle(id), t0).unwrap();
    }
    let out = session.request_start(pid(4), t0).unwrap();

    for id in 1..=8 {
        let role = session.assignment().unwrap().role_of(pid(id)).unwrap();
        let private = sent_to(&out, pid(id));
        assert!(private.iter().any(|e| matches!(
            e,
            GameEvent::RoleAssigned { role: r, .. } if *r == role
        )));
    }

    let elims = holders(&session, Role::Eliminator);
    assert_eq!(elims.len(), 2);
    assert!(sent_to(&out, elims[0]).iter().any(|e| matches!(
        e,
        GameEvent::RoleAssigned { partners, .. } if partners == &vec![elims[1]]
    )));
}

#[test]
fn test_start_below_minimum_rejected() {
    let t0 = Instant::now();
    let mut session = GameSession::with_seed(EngineConfig::default(), 1);
    for id in 1..=4 {
        session.join(pid(id), SessionHandle(id), t0).unwrap();
    }
    let err = session.request_start(pid(1), t0).unwrap_err();
    assert_eq!(
        err,
        GameError::NotEnoughPlayers {
            required: 5,
            registered: 4
        }
    );
    assert_eq!(session.phase(), Phase::NotStarted);
    assert!(session.assignment().is_none());
}

#[test]
fn test_start_twice_rejected() {
    let t0 = Instant::now();
    let mut session = started(5, EngineConfig::default(), t0);
    assert_eq!(
        session.request_start(pid(2), t0).unwrap_err(),
        GameError::InvalidPhase(Phase::Day(1))
    );
}

#[test]
fn test_join_full_room_rejected() {
    let t0 = Instant::now();
    let config = EngineConfig {
        max_players: 5,
        ..EngineConfig::default()
    };
    let mut session = GameSession::with_seed(config, 1);
    for id in 1..=5 {
        session.join(pid(id), SessionHandle(id), t0).unwrap();
    }
    assert_eq!(
        session.join(pid(6), SessionHandle(6), t0).unwrap_err(),
        GameError::NotEligible(pid(6))
    );
}

#[test]
fn test_join_with_auto_start_deals_at_minimum() {
    let t0 = Instant::now();
    let config = EngineConfig {
        auto_start: true,
        ..EngineConfig::default()
    };
    let mut session = GameSession::with_seed(config, 1);
    for id in 1..=4 {
        session.join(pid(id), SessionHandle(id), t0).unwrap();
        assert_eq!(session.phase(), Phase::NotStarted);
    }
    let out = session.join(pid(5), SessionHandle(5), t0).unwrap();
    assert_eq!(session.phase(), Phase::Day(1));
    assert!(public(&out)
        .iter()
        .any(|e| matches!(e, GameEvent::GameStarted { .. })));
}

#[test]
fn test_join_during_game_waits_for_next_one() {
    let t0 = Instant::now();
    let mut session = started(5, EngineConfig::default(), t0);
    let out = session.join(pid(6), SessionHandle(6), t0).unwrap();
    assert!(matches!(
        out[0].event,
        GameEvent::PlayerRegistered { waiting: true, .. }
    ));
    assert!(!session.is_active(pid(6)));
    assert!(session.assignment().unwrap().role_of(pid(6)).is_none());
}

// =========================================================================
// Night
// =========================================================================

#[test]
fn test_first_night_elimination_disabled_for_five() {
    let t0 = Instant::now();
    let mut session = started(5, EngineConfig::default(), t0);

    assert!(session.tick(t0 + secs(119)).is_empty());
    let night = t0 + secs(120);
    let out = session.tick(night);
    assert_eq!(session.phase(), Phase::WaitingOnNightActions);
    assert_eq!(session.deadline(), Some(night + secs(70)));

    let elim = holder(&session, Role::Eliminator);
    assert!(sent_to(&out, elim).contains(&&GameEvent::NightPrompt {
        slot: NightSlot::Eliminator,
        enabled: false,
    }));

    let target = holder(&session, Role::Townsfolk);
    assert_eq!(
        session.submit_night_action(elim, target, night).unwrap_err(),
        GameError::InvalidPhase(Phase::WaitingOnNightActions)
    );
}

#[test]
fn test_night_waits_for_every_open_slot() {
    let t0 = Instant::now();
    let mut session = started(5, EngineConfig::default(), t0);
    let night = t0 + secs(120);
    session.tick(night);

    let inv = holder(&session, Role::Investigator);
    let shadow = holder(&session, Role::Shadow);
    let elim = holder(&session, Role::Eliminator);

    let out = session.submit_night_action(inv, elim, night).unwrap();
    assert_eq!(session.phase(), Phase::WaitingOnNightActions);
    assert!(sent_to(&out, inv).iter().any(|e| matches!(e, GameEvent::NightActionAccepted { .. })));

    let out = session.submit_night_action(shadow, inv, night).unwrap();
    assert_eq!(session.phase(), Phase::WaitingOnDayActivities);
    assert!(sent_to(&out, inv).contains(&&GameEvent::InvestigationResult {
        target: elim,
        is_eliminator: true,
    }));
    assert!(sent_to(&out, shadow).contains(&&GameEvent::ShadowResult {
        target: inv,
        found_investigator: true,
    }));
    assert!(public(&out).contains(&&GameEvent::Dawn {
        outcome: EliminationOutcome::Disabled
    }));
}

#[test]
fn test_night_deadline_resolves_with_idle_slots() {
    let t0 = Instant::now();
    let mut session = started(5, EngineConfig::default(), t0);
    let night = t0 + secs(120);
    session.tick(night);

    let inv = holder(&session, Role::Investigator);
    let shadow = holder(&session, Role::Shadow);
    session.submit_night_action(inv, shadow, night).unwrap();

    let out = session.tick(night + secs(45));
    assert!(sent_to(&out, shadow).iter().any(|e| matches!(
        e,
        GameEvent::NightReminder { slot: NightSlot::Shadow, seconds_left: 25 }
    )));
    assert!(sent_to(&session.tick(night + secs(50)), shadow).is_empty());

    let out = session.tick(night + secs(70));
    assert_eq!(session.phase(), Phase::WaitingOnDayActivities);
    assert!(sent_to(&out, shadow).contains(&&GameEvent::NoActionTaken {
        slot: NightSlot::Shadow
    }));
}

#[test]
fn test_night_action_rules_enforced() {
    let t0 = Instant::now();
    let mut session = started(5, EngineConfig::default(), t0);
    let night = t0 + secs(120);
    session.tick(night);

    let inv = holder(&session, Role::Investigator);
    let sleeper = holder(&session, Role::Sleeper);
    let elim = holder(&session, Role::Eliminator);

    assert_eq!(
        session.submit_night_action(sleeper, inv, night).unwrap_err(),
        GameError::NotEligible(sleeper)
    );
    assert_eq!(
        session.submit_night_action(inv, pid(99), night).unwrap_err(),
        GameError::UnknownTarget(pid(99))
    );
    session.submit_night_action(inv, elim, night).unwrap();
    assert_eq!(
        session.submit_night_action(inv, sleeper, night).unwrap_err(),
        GameError::AlreadySubmitted(inv)
    );
}

#[test]
fn test_protector_shield_prevents_elimination() {
    let t0 = Instant::now();
    let mut session = started(8, EngineConfig::default(), t0);
    let night = t0 + secs(180);
    session.tick(night);
    assert_eq!(session.phase(), Phase::WaitingOnNightActions);

    let elims = holders(&session, Role::Eliminator);
    let protector = holder(&session, Role::Protector);
    let inv = holder(&session, Role::Investigator);
    let target = holder(&session, Role::Townsfolk);

    assert_eq!(
        session.submit_night_action(elims[0], elims[1], night).unwrap_err(),
        GameError::IllegalTarget {
            target: elims[1],
            reason: IllegalReason::FellowEliminator
        }
    );

    session.submit_night_action(protector, target, night).unwrap();
    let out = session.submit_night_action(elims[0], target, night).unwrap();
    assert!(sent_to(&out, elims[1]).iter().any(|e| matches!(
        e,
        GameEvent::NightActionAccepted { slot: NightSlot::Eliminator, .. }
    )));
    assert_eq!(
        session.submit_night_action(elims[1], target, night).unwrap_err(),
        GameError::AlreadySubmitted(elims[1])
    );

    let out = session.submit_night_action(inv, elims[1], night).unwrap();
    assert_eq!(session.phase(), Phase::WaitingOnDayActivities);
    assert!(session.is_active(target));
    assert!(sent_to(&out, protector).contains(&&GameEvent::ProtectionSucceeded { target }));
    assert!(public(&out).contains(&&GameEvent::Dawn {
        outcome: EliminationOutcome::Prevented { target }
    }));
}

#[test]
fn test_elimination_removes_target() {
    let t0 = Instant::now();
    let mut session = started(8, EngineConfig::default(), t0);
    let night = t0 + secs(180);
    session.tick(night);

    let elims = holders(&session, Role::Eliminator);
    let protector = holder(&session, Role::Protector);
    let inv = holder(&session, Role::Investigator);
    let target = holder(&session, Role::Townsfolk);

    session.submit_night_action(protector, protector, night).unwrap();
    session.submit_night_action(inv, protector, night).unwrap();
    let out = session.submit_night_action(elims[1], target, night).unwrap();

    assert_eq!(
        session.assignment().unwrap().standing(target),
        Some(Standing::Removed(RemovalCause::Eliminated))
    );
    assert!(public(&out).contains(&&GameEvent::PlayerRemoved {
        player: target,
        cause: RemovalCause::Eliminated
    }));
    assert_eq!(session.phase(), Phase::WaitingOnDayActivities);
    assert_eq!(session.day_number(), 2);
}

#[test]
fn test_town_wins_when_sleeper_left_alone_with_eliminator() {
    let t0 = Instant::now();
    let mut session = started(6, EngineConfig::default(), t0);
    let elim = holder(&session, Role::Eliminator);
    let inv = holder(&session, Role::Investigator);
    let sleeper = holder(&session, Role::Sleeper);

    let mut leaving = holders(&session, Role::Townsfolk);
    leaving.push(holder(&session, Role::Shadow));
    for player in leaving {
        let out = session.leave(player, SessionHandle(player.0), true, t0).unwrap();
        assert!(public(&out).contains(&&GameEvent::PlayerUnregistered {
            player,
            reason: DepartureReason::Left
        }));
    }
    assert_eq!(session.active_players().len(), 3);

    // Night one: only the investigator can act.
    let night_one = t0 + secs(120);
    session.tick(night_one);
    session.submit_night_action(inv, sleeper, night_one).unwrap();
    assert_eq!(session.phase(), Phase::WaitingOnDayActivities);

    for player in [elim, inv, sleeper] {
        session.request_skip(player, night_one).unwrap();
    }
    assert_eq!(session.phase(), Phase::WaitingOnNightActions);
    assert_eq!(session.night_number(), 2);

    session.submit_night_action(elim, inv, night_one).unwrap();
    let out = session.submit_night_action(inv, elim, night_one).unwrap();

    assert_eq!(session.phase(), Phase::Won);
    assert!(public(&out).iter().any(|e| matches!(
        e,
        GameEvent::GameWon { winner: Winner::Town, .. }
    )));
}

// =========================================================================
// Day and trials
// =========================================================================

#[test]
fn test_accusation_rules_enforced() {
    let t0 = Instant::now();
    let mut session = started(5, EngineConfig::default(), t0);
    let inv = holder(&session, Role::Investigator);
    let elim = holder(&session, Role::Eliminator);

    assert_eq!(
        session.raise_accusation(inv, elim, t0).unwrap_err(),
        GameError::InvalidPhase(Phase::Day(1))
    );

    let (mut session, now) = five_at_day_two(EngineConfig::default(), t0);
    assert_eq!(
        session.raise_accusation(inv, inv, now).unwrap_err(),
        GameError::IllegalTarget {
            target: inv,
            reason: IllegalReason::SelfAccusation
        }
    );
    session.raise_accusation(inv, elim, now).unwrap();
    assert_eq!(
        session.raise_accusation(inv, elim, now).unwrap_err(),
        GameError::AlreadySubmitted(inv)
    );
    assert_eq!(session.phase(), Phase::WaitingOnDayActivities);
    assert_eq!(session.ledger().accuser_of(elim), Some(inv));
}

#[test]
fn test_split_vote_at_deadline_majority_of_eligible_releases() {
    let t0 = Instant::now();
    let (mut session, now) = five_at_day_two(EngineConfig::default(), t0);
    let accused = holder(&session, Role::Townsfolk);
    let elim = holder(&session, Role::Eliminator);
    let shadow = holder(&session, Role::Shadow);
    let sleeper = holder(&session, Role::Sleeper);
    let inv = holder(&session, Role::Investigator);

    let voting = open_vote(&mut session, accused, [sleeper, shadow], now);
    assert_eq!(
        session.cast_trial_vote(accused, false, voting).unwrap_err(),
        GameError::NotEligible(accused)
    );
    session.cast_trial_vote(elim, true, voting).unwrap();
    session.cast_trial_vote(shadow, true, voting).unwrap();
    session.cast_trial_vote(sleeper, false, voting).unwrap();
    assert_eq!(session.phase(), Phase::WaitingOnTrialVotes);

    let out = session.tick(voting + secs(100));
    let closed = public(&out)
        .into_iter()
        .find_map(|e| match e {
            GameEvent::TrialClosed { verdict, votes, .. } => Some((*verdict, votes.clone())),
            _ => None,
        })
        .unwrap();
    assert_eq!(closed.0, Verdict::NoVerdict);
    assert_eq!(closed.1.abstained, vec![inv]);
    assert!(session.is_active(accused));
    assert_eq!(session.phase(), Phase::WaitingOnDayActivities);
}

#[test]
fn test_split_vote_at_deadline_majority_of_cast_convicts() {
    let t0 = Instant::now();
    let config = EngineConfig {
        verdict_rule: VerdictRule::MajorityOfCast,
        ..EngineConfig::default()
    };
    let (mut session, now) = five_at_day_two(config, t0);
    let accused = holder(&session, Role::Townsfolk);
    let elim = holder(&session, Role::Eliminator);
    let shadow = holder(&session, Role::Shadow);
    let sleeper = holder(&session, Role::Sleeper);

    let voting = open_vote(&mut session, accused, [sleeper, shadow], now);
    session.cast_trial_vote(elim, true, voting).unwrap();
    session.cast_trial_vote(shadow, true, voting).unwrap();
    session.cast_trial_vote(sleeper, false, voting).unwrap();

    let out = session.tick(voting + secs(100));
    assert!(public(&out).contains(&&GameEvent::PlayerRemoved {
        player: accused,
        cause: RemovalCause::Convicted
    }));
    assert_eq!(session.phase(), Phase::WaitingOnNightActions);
    assert_eq!(session.night_number(), 2);
}

#[test]
fn test_locked_guilty_verdict_on_last_eliminator_ends_game() {
    let t0 = Instant::now();
    let (mut session, now) = five_at_day_two(EngineConfig::default(), t0);
    let elim = holder(&session, Role::Eliminator);
    let inv = holder(&session, Role::Investigator);
    let shadow = holder(&session, Role::Shadow);
    let sleeper = holder(&session, Role::Sleeper);

    let voting = open_vote(&mut session, elim, [inv, sleeper], now);
    session.cast_trial_vote(inv, true, voting).unwrap();
    session.cast_trial_vote(sleeper, true, voting).unwrap();
    assert_eq!(session.phase(), Phase::WaitingOnTrialVotes);

    let out = session.cast_trial_vote(shadow, true, voting).unwrap();
    assert_eq!(session.phase(), Phase::Won);
    assert!(public(&out).iter().any(|e| matches!(
        e,
        GameEvent::GameWon { winner: Winner::Town, .. }
    )));

    // The victory cooldown returns the table to the lobby.
    let out = session.tick(voting + secs(60));
    assert!(public(&out).contains(&&GameEvent::ReadyForNextGame));
    assert_eq!(session.phase(), Phase::NotStarted);
    assert_eq!(session.roster().len(), 5);
    assert!(session.assignment().is_none());
}

#[test]
fn test_vote_switch_allowed_repeat_rejected() {
    let t0 = Instant::now();
    let (mut session, now) = five_at_day_two(EngineConfig::default(), t0);
    let accused = holder(&session, Role::Townsfolk);
    let shadow = holder(&session, Role::Shadow);
    let sleeper = holder(&session, Role::Sleeper);

    let voting = open_vote(&mut session, accused, [sleeper, shadow], now);
    session.cast_trial_vote(shadow, true, voting).unwrap();
    assert_eq!(
        session.cast_trial_vote(shadow, true, voting).unwrap_err(),
        GameError::AlreadySubmitted(shadow)
    );
    session.cast_trial_vote(shadow, false, voting).unwrap();
    assert_eq!(session.phase(), Phase::WaitingOnTrialVotes);
}

#[test]
fn test_accused_leaving_abandons_trial() {
    let t0 = Instant::now();
    let (mut session, now) = five_at_day_two(EngineConfig::default(), t0);
    let accused = holder(&session, Role::Townsfolk);
    let shadow = holder(&session, Role::Shadow);
    let sleeper = holder(&session, Role::Sleeper);

    let voting = open_vote(&mut session, accused, [sleeper, shadow], now);
    let out = session
        .leave(accused, SessionHandle(accused.0), true, voting)
        .unwrap();
    assert!(public(&out).contains(&&GameEvent::TrialAbandoned { accused }));
    assert_eq!(session.phase(), Phase::WaitingOnDayActivities);
    assert!(session.trial().is_none());
}

#[test]
fn test_released_early_trial_keeps_day_deadline() {
    let t0 = Instant::now();
    let (mut session, day) = five_at_day_two(EngineConfig::default(), t0);
    let day_end = session.day_deadline().unwrap();
    assert_eq!(day_end, day + secs(1200));
    let accused = holder(&session, Role::Townsfolk);
    let elim = holder(&session, Role::Eliminator);
    let shadow = holder(&session, Role::Shadow);
    let sleeper = holder(&session, Role::Sleeper);

    let voting = open_vote(&mut session, accused, [sleeper, shadow], day);
    session.cast_trial_vote(elim, false, voting).unwrap();
    session.cast_trial_vote(shadow, false, voting).unwrap();
    let out = session.cast_trial_vote(sleeper, false, voting).unwrap();
    assert!(public(&out).iter().any(|e| matches!(
        e,
        GameEvent::TrialClosed { verdict: Verdict::Innocent, .. }
    )));

    assert_eq!(session.phase(), Phase::WaitingOnDayActivities);
    assert_eq!(session.day_deadline(), Some(day_end));
    assert_eq!(session.deadline(), Some(day_end));
}

#[test]
fn test_late_trial_extends_day_past_vote() {
    let t0 = Instant::now();
    let (mut session, day) = five_at_day_two(EngineConfig::default(), t0);
    let accused = holder(&session, Role::Townsfolk);
    let shadow = holder(&session, Role::Shadow);
    let sleeper = holder(&session, Role::Sleeper);

    // Voting would run to day + 1250, past the 1200 s day.
    let voting = open_vote(&mut session, accused, [sleeper, shadow], day + secs(1100));
    let extended = voting + secs(100) + secs(10);
    assert_eq!(session.day_deadline(), Some(extended));

    session.tick(voting + secs(100));
    assert_eq!(session.phase(), Phase::WaitingOnDayActivities);
    assert_eq!(session.deadline(), Some(extended));

    session.tick(extended);
    assert_eq!(session.phase(), Phase::WaitingOnNightActions);
    assert_eq!(session.night_number(), 2);
}

#[test]
fn test_day_ending_during_defense_abandons_trial() {
    let t0 = Instant::now();
    let (mut session, day) = five_at_day_two(EngineConfig::default(), t0);
    let accused = holder(&session, Role::Townsfolk);
    let shadow = holder(&session, Role::Shadow);
    let sleeper = holder(&session, Role::Sleeper);

    let accused_at = day + secs(1180);
    session.raise_accusation(sleeper, accused, accused_at).unwrap();
    session.raise_accusation(shadow, accused, accused_at).unwrap();
    assert_eq!(session.phase(), Phase::WaitingOnAccusedDefense);
    assert_eq!(session.day_deadline(), Some(day + secs(1200)));

    let out = session.tick(day + secs(1200));
    assert!(public(&out).contains(&&GameEvent::TrialAbandoned { accused }));
    assert!(!public(&out).iter().any(|e| matches!(e, GameEvent::VotingOpened { .. })));
    assert_eq!(session.phase(), Phase::WaitingOnNightActions);
    assert!(session.trial().is_none());
    assert!(session.is_active(accused));
}

// =========================================================================
// Connections
// =========================================================================

#[test]
fn test_reconnect_keeps_seat_and_night_action() {
    let t0 = Instant::now();
    let mut session = started(5, EngineConfig::default(), t0);
    let night = t0 + secs(120);
    session.tick(night);

    let inv = holder(&session, Role::Investigator);
    let elim = holder(&session, Role::Eliminator);
    session.submit_night_action(inv, elim, night).unwrap();

    let out = session.leave(inv, SessionHandle(inv.0), false, night).unwrap();
    assert!(matches!(
        out[0].event,
        GameEvent::PlayerDisconnected { grace_secs: 80, .. }
    ));

    let out = session.join(inv, SessionHandle(100), night + secs(5)).unwrap();
    assert!(sent_to(&out, inv).contains(&&GameEvent::RoleReminder {
        role: Role::Investigator,
        partners: Vec::new(),
    }));
    assert!(session.night_actions().get(NightSlot::Investigator).is_some());
    assert!(!session.roster().has_pending_grace());

    // A late departure from the replaced connection changes nothing.
    let out = session.leave(inv, SessionHandle(inv.0), true, night + secs(6)).unwrap();
    assert!(out.is_empty());
    assert!(session.is_active(inv));
}

#[test]
fn test_grace_expiry_removes_player() {
    let t0 = Instant::now();
    let mut session = started(5, EngineConfig::default(), t0);
    let townsfolk = holder(&session, Role::Townsfolk);

    session
        .leave(townsfolk, SessionHandle(townsfolk.0), false, t0)
        .unwrap();
    assert!(session.tick(t0 + secs(79)).is_empty());

    let out = session.tick(t0 + secs(80));
    assert!(public(&out).contains(&&GameEvent::PlayerRemoved {
        player: townsfolk,
        cause: RemovalCause::TimedOut
    }));
    assert!(!session.roster().contains(townsfolk));
    assert_eq!(session.phase(), Phase::Day(1));
}

#[test]
fn test_everyone_leaving_resets_table() {
    let t0 = Instant::now();
    let mut session = started(5, EngineConfig::default(), t0);
    for id in 1..=5 {
        let _ = session.leave(pid(id), SessionHandle(id), true, t0);
    }
    assert_eq!(session.phase(), Phase::NotStarted);
    assert!(session.roster().is_empty());
    assert!(!session.needs_ticks());
}

#[test]
fn test_skip_requires_every_active_player() {
    let t0 = Instant::now();
    let mut session = started(5, EngineConfig::default(), t0);
    for id in 1..=4 {
        let out = session.request_skip(pid(id), t0).unwrap();
        assert!(matches!(
            out[0].event,
            GameEvent::SkipRequested { needed: 5, .. }
        ));
    }
    assert_eq!(
        session.request_skip(pid(1), t0).unwrap_err(),
        GameError::AlreadySubmitted(pid(1))
    );
    assert_eq!(session.phase(), Phase::Day(1));
    session.request_skip(pid(5), t0).unwrap();
    assert_eq!(session.phase(), Phase::WaitingOnNightActions);
}
