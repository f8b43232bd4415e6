//! Scripted bots playing one Nightfall game against an in-process host.
//!
//! Every message a bot receives is printed to stdout as one JSON line;
//! logs go to stderr.
//!
//! ```text
//! cargo run -p bot-night -- 7
//! ```

use std::collections::BTreeSet;
use std::time::Duration;

use nightfall::prelude::*;
use rand::rngs::StdRng;
use rand::seq::IteratorRandom;
use rand::{Rng, SeedableRng};
use tokio::task::JoinSet;

// ---------------------------------------------------------------------------
// Bot
// ---------------------------------------------------------------------------

/// One player's scripted behaviour. Knows only what its own messages tell it.
struct Bot {
    me: PlayerId,
    table_size: usize,
    role: Option<Role>,
    partners: Vec<PlayerId>,
    alive: BTreeSet<PlayerId>,
    /// Someone the investigator caught.
    suspect: Option<PlayerId>,
    last_target: Option<PlayerId>,
    rng: StdRng,
}

impl Bot {
    fn new(me: PlayerId, table_size: usize, seed: u64) -> Self {
        Self {
            me,
            table_size,
            role: None,
            partners: Vec::new(),
            alive: BTreeSet::new(),
            suspect: None,
            last_target: None,
            rng: StdRng::seed_from_u64(seed ^ me.0),
        }
    }

    /// The first player to sit down starts the game once the table is full.
    fn is_starter(&self) -> bool {
        self.me == PlayerId(1)
    }

    /// Commands to send in response to `event`.
    fn react(&mut self, event: &GameEvent) -> Vec<Command> {
        match event {
            GameEvent::PlayerRegistered { registered, .. }
                if self.is_starter() && *registered == self.table_size =>
            {
                vec![Command::Start]
            }
            GameEvent::GameStarted { players, .. } => {
                self.alive = players.iter().copied().collect();
                Vec::new()
            }
            GameEvent::RoleAssigned { role, partners }
            | GameEvent::RoleReminder { role, partners } => {
                self.role = Some(*role);
                self.partners = partners.clone();
                Vec::new()
            }
            GameEvent::PlayerRemoved { player, .. } => {
                self.alive.remove(player);
                if self.suspect == Some(*player) {
                    self.suspect = None;
                }
                Vec::new()
            }
            GameEvent::NightPrompt { enabled: true, .. } => {
                let avoid = if self.role == Some(Role::Protector) {
                    self.last_target
                } else {
                    None
                };
                let target = self.pick_target(avoid);
                self.last_target = target;
                target
                    .map(|target| Command::NightAction { target })
                    .into_iter()
                    .collect()
            }
            GameEvent::InvestigationResult {
                target,
                is_eliminator: true,
            } => {
                self.suspect = Some(*target);
                Vec::new()
            }
            GameEvent::PhaseEntered {
                phase: Phase::WaitingOnDayActivities,
                ..
            } => {
                let target = match self.suspect {
                    Some(suspect) => Some(suspect),
                    None if self.rng.random_bool(0.5) => self.pick_target(None),
                    None => None,
                };
                match target {
                    Some(target) => vec![Command::Accuse { target }],
                    None => vec![Command::Skip],
                }
            }
            GameEvent::DayResumed { .. } => vec![Command::Skip],
            GameEvent::VotingOpened { accused, .. } if *accused != self.me => {
                let guilty = self.judge(*accused);
                vec![Command::Vote { guilty }]
            }
            _ => Vec::new(),
        }
    }

    /// A random active player other than this bot and its partners.
    fn pick_target(&mut self, avoid: Option<PlayerId>) -> Option<PlayerId> {
        let me = self.me;
        self.alive
            .iter()
            .copied()
            .filter(|p| *p != me && !self.partners.contains(p) && Some(*p) != avoid)
            .choose(&mut self.rng)
    }

    fn judge(&mut self, accused: PlayerId) -> bool {
        if self.partners.contains(&accused) {
            return false;
        }
        if self.suspect == Some(accused) || self.role == Some(Role::Eliminator) {
            return true;
        }
        self.rng.random_bool(0.6)
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Drives one bot until the game is won or its connection closes.
async fn play(
    mut conn: Connection,
    mut bot: Bot,
    echo: bool,
) -> Result<Option<Winner>, NightfallError> {
    let codec = JsonCodec;
    while let Some(envelope) = conn.recv().await {
        if echo {
            let line = codec.encode(&envelope)?;
            println!("{}", String::from_utf8_lossy(&line));
        }
        let RoomOutbound::Event(event) = &envelope.body else {
            continue;
        };
        if let GameEvent::GameWon { winner, .. } = event {
            return Ok(Some(*winner));
        }
        for command in bot.react(event) {
            conn.send(command).await?;
        }
    }
    Ok(None)
}

/// Seats `players` bots at one table and plays a single game.
async fn run_table(
    host: &Host,
    players: usize,
    seed: u64,
    echo: bool,
) -> Result<Option<Winner>, NightfallError> {
    let mut seats = Vec::with_capacity(players);
    for id in 1..=players as u64 {
        seats.push(host.connect(PlayerId(id)).await?);
    }

    let mut bots = JoinSet::new();
    for conn in seats {
        let bot = Bot::new(conn.player_id(), players, seed);
        bots.spawn(play(conn, bot, echo));
    }

    let mut winner = None;
    while let Some(result) = bots.join_next().await {
        match result {
            Ok(Ok(Some(won))) => winner = Some(won),
            Ok(Ok(None)) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "bot stopped"),
            Err(e) => tracing::warn!(error = %e, "bot task failed"),
        }
    }
    Ok(winner)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    nightfall::telemetry::init();

    let players: usize = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => 7,
    };

    let mut settings = Settings::load()?;
    if players < settings.engine.min_players || players > settings.engine.max_players {
        return Err(format!(
            "a table needs {} to {} players, got {players}",
            settings.engine.min_players, settings.engine.max_players
        )
        .into());
    }
    if settings.engine.time_compression <= 1 {
        settings.engine.time_compression = 50;
    }
    settings.room.clock = ClockConfig::with_interval(Duration::from_millis(100));
    let seed = settings.room.rng_seed.unwrap_or_else(rand::random);

    let host = Host::builder().settings(settings).build()?;
    eprintln!("bot-night: {players} bots, seed {seed}");

    let winner = run_table(&host, players, seed, true).await?;
    host.shutdown().await;

    match winner {
        Some(winner) => eprintln!("bot-night: {winner:?} win"),
        None => eprintln!("bot-night: table closed without a winner"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(id: u64) -> PlayerId {
        PlayerId(id)
    }

    fn seated(me: u64) -> Bot {
        let mut bot = Bot::new(pid(me), 5, 3);
        bot.react(&GameEvent::GameStarted {
            template: TemplateName::FiveOrSix,
            players: (1..=5).map(pid).collect(),
            roles: None,
        });
        bot
    }

    #[test]
    fn test_react_full_table_starter_sends_start() {
        let full = GameEvent::PlayerRegistered {
            player: pid(5),
            registered: 5,
            waiting: false,
        };
        assert_eq!(Bot::new(pid(1), 5, 0).react(&full), vec![Command::Start]);
        assert!(Bot::new(pid(2), 5, 0).react(&full).is_empty());
    }

    #[test]
    fn test_react_eliminator_never_targets_partner() {
        let mut bot = seated(1);
        bot.react(&GameEvent::RoleAssigned {
            role: Role::Eliminator,
            partners: vec![pid(2)],
        });
        for _ in 0..50 {
            let target = bot.pick_target(None).unwrap();
            assert!(target != pid(1) && target != pid(2));
        }
    }

    #[test]
    fn test_react_removed_player_not_targeted() {
        let mut bot = seated(1);
        for id in [2, 3, 4] {
            bot.react(&GameEvent::PlayerRemoved {
                player: pid(id),
                cause: RemovalCause::Eliminated,
            });
        }
        assert_eq!(bot.pick_target(None), Some(pid(5)));
        assert_eq!(bot.pick_target(Some(pid(5))), None);
    }

    #[test]
    fn test_react_investigator_accuses_caught_eliminator() {
        let mut bot = seated(3);
        bot.react(&GameEvent::InvestigationResult {
            target: pid(4),
            is_eliminator: true,
        });
        let day = GameEvent::PhaseEntered {
            phase: Phase::WaitingOnDayActivities,
            round: 2,
            seconds: 24,
        };
        assert_eq!(bot.react(&day), vec![Command::Accuse { target: pid(4) }]);
        assert!(bot.judge(pid(4)));
    }

    #[test]
    fn test_react_accused_does_not_vote_on_self() {
        let mut bot = seated(2);
        let opened = GameEvent::VotingOpened {
            accused: pid(2),
            eligible: 4,
            seconds: 2,
        };
        assert!(bot.react(&opened).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_table_plays_to_a_winner() {
        let mut settings = Settings::default();
        settings.engine.time_compression = 50;
        settings.room.clock = ClockConfig::with_interval(Duration::from_millis(100));
        settings.room.rng_seed = Some(5);
        let host = Host::builder().settings(settings).build().unwrap();

        let winner = tokio::time::timeout(
            Duration::from_secs(3_600),
            run_table(&host, 6, 5, false),
        )
        .await
        .unwrap()
        .unwrap();
        assert!(winner.is_some());
        host.shutdown().await;
    }

    #[test]
    fn test_printed_envelope_is_one_json_object() {
        let envelope = Envelope {
            seq: 4,
            room_id: RoomId(1),
            to: Recipient::Player(pid(2)),
            body: RoomOutbound::Event(GameEvent::ReadyForNextGame),
        };
        let line = JsonCodec.encode(&envelope).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&line).unwrap();
        assert_eq!(value["seq"], 4);
        assert_eq!(value["body"]["kind"], "event");
        assert_eq!(value["body"]["body"]["type"], "ReadyForNextGame");
    }
}
