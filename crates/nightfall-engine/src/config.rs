//! Game templates and engine settings.
//!
//! Two layers of configuration:
//!
//! - [`GameConfig`] is picked once per game from the player count
//!   ([`TemplateName::for_player_count`]) and frozen for that game: role
//!   counts, phase durations, rule toggles.
//! - [`EngineConfig`] belongs to the room and outlives games: pool size
//!   limits, reconnect grace, warning leads, the trial verdict rule.
//!
//! Both derive serde with `#[serde(default)]` so a settings file only needs
//! the fields it changes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{GameError, Role};

// ---------------------------------------------------------------------------
// TemplateName
// ---------------------------------------------------------------------------

/// The built-in table layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TemplateName {
    FiveOrSix,
    Seven,
    Eight,
    NinePlus,
}

impl TemplateName {
    /// Smallest table any template supports.
    pub const MIN_PLAYERS: usize = 5;

    /// Picks the template for `players` registered players.
    ///
    /// Exact matches below the cutoff, a single band above it. Returns
    /// `None` when the table is too small for any template.
    pub fn for_player_count(players: usize) -> Option<Self> {
        match players {
            0..=4 => None,
            5 | 6 => Some(Self::FiveOrSix),
            7 => Some(Self::Seven),
            8 => Some(Self::Eight),
            _ => Some(Self::NinePlus),
        }
    }

    /// The built-in configuration for this template.
    pub fn config(self) -> GameConfig {
        match self {
            Self::FiveOrSix => GameConfig {
                name: self,
                roles: RoleCounts {
                    eliminators: 1,
                    investigator: 1,
                    shadow: 1,
                    sleeper: 1,
                    ..RoleCounts::default()
                },
                durations: PhaseDurations::from_secs(120, 70, 1200, 70, 50, 100, 60),
                rules: RuleToggles {
                    first_night_elimination: false,
                    ..RuleToggles::default()
                },
            },
            Self::Seven => GameConfig {
                name: self,
                roles: RoleCounts {
                    eliminators: 1,
                    investigator: 1,
                    shadow: 1,
                    sleeper: 1,
                    hidden_ally: 1,
                    ..RoleCounts::default()
                },
                durations: PhaseDurations::from_secs(120, 70, 1100, 70, 50, 100, 60),
                rules: RuleToggles {
                    first_night_elimination: false,
                    ..RuleToggles::default()
                },
            },
            Self::Eight => GameConfig {
                name: self,
                roles: RoleCounts {
                    eliminators: 2,
                    protector: 1,
                    investigator: 1,
                    independent: 1,
                    ..RoleCounts::default()
                },
                durations: PhaseDurations::from_secs(180, 90, 1000, 90, 40, 120, 60),
                rules: RuleToggles {
                    first_night_elimination: true,
                    ..RuleToggles::default()
                },
            },
            Self::NinePlus => GameConfig {
                name: self,
                roles: RoleCounts {
                    eliminators: 2,
                    protector: 1,
                    investigator: 1,
                    hidden_ally: 1,
                    ..RoleCounts::default()
                },
                durations: PhaseDurations::from_secs(120, 70, 1000, 90, 40, 120, 60),
                rules: RuleToggles {
                    first_night_elimination: false,
                    protector_can_protect_self: false,
                    ..RuleToggles::default()
                },
            },
        }
    }
}

impl std::fmt::Display for TemplateName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FiveOrSix => write!(f, "five-or-six"),
            Self::Seven => write!(f, "seven"),
            Self::Eight => write!(f, "eight"),
            Self::NinePlus => write!(f, "nine-plus"),
        }
    }
}

// ---------------------------------------------------------------------------
// GameConfig
// ---------------------------------------------------------------------------

/// How many of each special role a game deals. Everyone left over is
/// [`Role::Townsfolk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleCounts {
    pub eliminators: usize,
    pub protector: usize,
    pub investigator: usize,
    pub shadow: usize,
    pub sleeper: usize,
    pub hidden_ally: usize,
    pub independent: usize,
}

impl RoleCounts {
    /// Number of seats this role occupies. Townsfolk is never declared.
    pub fn count(&self, role: Role) -> usize {
        match role {
            Role::Eliminator => self.eliminators,
            Role::Protector => self.protector,
            Role::Investigator => self.investigator,
            Role::Shadow => self.shadow,
            Role::Sleeper => self.sleeper,
            Role::HiddenAlly => self.hidden_ally,
            Role::Independent => self.independent,
            Role::Townsfolk => 0,
        }
    }

    /// Sum of all declared special roles.
    pub fn total(&self) -> usize {
        Role::DRAW_ORDER.iter().map(|r| self.count(*r)).sum()
    }
}

/// Length of every timed phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseDurations {
    pub first_day: Duration,
    pub first_night: Duration,
    pub day: Duration,
    pub night: Duration,
    pub defense: Duration,
    pub voting: Duration,
    /// Cooldown in `Won` before the table returns to the lobby.
    pub victory: Duration,
}

impl PhaseDurations {
    fn from_secs(
        first_day: u64,
        first_night: u64,
        day: u64,
        night: u64,
        defense: u64,
        voting: u64,
        victory: u64,
    ) -> Self {
        Self {
            first_day: Duration::from_secs(first_day),
            first_night: Duration::from_secs(first_night),
            day: Duration::from_secs(day),
            night: Duration::from_secs(night),
            defense: Duration::from_secs(defense),
            voting: Duration::from_secs(voting),
            victory: Duration::from_secs(victory),
        }
    }
}

/// Boolean rule switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleToggles {
    /// Eliminators may act on the very first night.
    pub first_night_elimination: bool,
    pub protector_can_protect_self: bool,
    /// When false, the protector must pick someone new each night.
    pub protector_can_repeat_target: bool,
    /// Publicly announce that an elimination was prevented.
    pub announce_protection: bool,
    /// Accusers are named in public announcements.
    pub open_accusations: bool,
    /// The start announcement lists which roles are in play.
    pub disclose_roles_at_start: bool,
}

impl Default for RuleToggles {
    fn default() -> Self {
        Self {
            first_night_elimination: false,
            protector_can_protect_self: true,
            protector_can_repeat_target: true,
            announce_protection: true,
            open_accusations: true,
            disclose_roles_at_start: true,
        }
    }
}

/// An immutable per-game configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    pub name: TemplateName,
    pub roles: RoleCounts,
    pub durations: PhaseDurations,
    pub rules: RuleToggles,
}

impl GameConfig {
    /// Checks that this configuration can be dealt to `players` players.
    ///
    /// # Errors
    /// [`GameError::Configuration`] if the eliminator count is not 1 or 2,
    /// any other role is declared more than once, or the roles outnumber
    /// the players.
    pub fn validate(&self, players: usize) -> Result<(), GameError> {
        if !(1..=2).contains(&self.roles.eliminators) {
            return Err(GameError::Configuration(format!(
                "template {} declares {} eliminators, expected 1 or 2",
                self.name, self.roles.eliminators
            )));
        }
        if let Some(role) = Role::DRAW_ORDER
            .iter()
            .filter(|r| **r != Role::Eliminator)
            .find(|r| self.roles.count(**r) > 1)
        {
            return Err(GameError::Configuration(format!(
                "template {} declares {} {role} seats, at most one allowed",
                self.name,
                self.roles.count(*role)
            )));
        }
        let total = self.roles.total();
        if total > players {
            return Err(GameError::Configuration(format!(
                "template {} needs {total} special roles but only {players} players registered",
                self.name
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// How a trial that runs out of time (or where everyone has voted) is
/// decided.
///
/// Both rules close a trial early once the outcome can no longer change:
/// guilty votes outnumber innocent plus undecided, or vice versa. They
/// differ only at the final count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VerdictRule {
    /// Guilty needs strictly more than half of the eligible voters;
    /// abstentions count against a verdict.
    #[default]
    MajorityOfEligible,
    /// Guilty needs more guilty than innocent votes among those cast.
    MajorityOfCast,
}

/// Per-room engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Registered players required before a game can start.
    pub min_players: usize,
    /// Registrations beyond this are refused.
    pub max_players: usize,
    /// Deal roles as soon as `min_players` have registered.
    pub auto_start: bool,
    /// How long a dropped connection keeps its seat.
    pub reconnect_grace: Duration,
    /// Remind night-role holders who have not acted when this much of the
    /// night remains.
    pub night_warning_lead: Duration,
    /// Warn the table when this much voting time remains.
    pub vote_warning_lead: Duration,
    /// Extra day time kept after a trial that outlives the day.
    pub trial_overrun_margin: Duration,
    pub verdict_rule: VerdictRule,
    /// Eliminators win once active non-eliminators are at or below this.
    pub eliminator_win_floor: usize,
    /// Divides every phase duration and warning lead. 1 is real time.
    pub time_compression: u32,
    /// Replacements for built-in templates, matched by name.
    pub template_overrides: Vec<GameConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_players: TemplateName::MIN_PLAYERS,
            max_players: 12,
            auto_start: false,
            reconnect_grace: Duration::from_secs(80),
            night_warning_lead: Duration::from_secs(25),
            vote_warning_lead: Duration::from_secs(20),
            trial_overrun_margin: Duration::from_secs(10),
            verdict_rule: VerdictRule::default(),
            eliminator_win_floor: 1,
            time_compression: 1,
            template_overrides: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Applies `time_compression` to a phase length.
    pub fn scaled(&self, duration: Duration) -> Duration {
        duration / self.time_compression.max(1)
    }

    /// Selects and validates the configuration for a table of `players`.
    ///
    /// # Errors
    /// [`GameError::Configuration`] when no template covers the player
    /// count or the chosen template does not fit it.
    pub fn select(&self, players: usize) -> Result<GameConfig, GameError> {
        let name = TemplateName::for_player_count(players).ok_or_else(|| {
            GameError::Configuration(format!(
                "a minimum of {} players is required, {players} registered",
                TemplateName::MIN_PLAYERS
            ))
        })?;
        let config = self
            .template_overrides
            .iter()
            .find(|c| c.name == name)
            .copied()
            .unwrap_or_else(|| name.config());
        config.validate(players)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_player_count_below_minimum_is_none() {
        assert_eq!(TemplateName::for_player_count(0), None);
        assert_eq!(TemplateName::for_player_count(4), None);
    }

    #[test]
    fn test_for_player_count_exact_then_banded() {
        assert_eq!(TemplateName::for_player_count(5), Some(TemplateName::FiveOrSix));
        assert_eq!(TemplateName::for_player_count(6), Some(TemplateName::FiveOrSix));
        assert_eq!(TemplateName::for_player_count(7), Some(TemplateName::Seven));
        assert_eq!(TemplateName::for_player_count(8), Some(TemplateName::Eight));
        assert_eq!(TemplateName::for_player_count(9), Some(TemplateName::NinePlus));
        assert_eq!(TemplateName::for_player_count(40), Some(TemplateName::NinePlus));
    }

    #[test]
    fn test_builtin_templates_fit_their_smallest_table() {
        for (name, players) in [
            (TemplateName::FiveOrSix, 5),
            (TemplateName::Seven, 7),
            (TemplateName::Eight, 8),
            (TemplateName::NinePlus, 9),
        ] {
            assert!(name.config().validate(players).is_ok(), "{name}");
        }
    }

    #[test]
    fn test_five_player_template_matches_table() {
        let cfg = TemplateName::FiveOrSix.config();
        assert_eq!(cfg.roles.eliminators, 1);
        assert_eq!(cfg.roles.protector, 0);
        assert_eq!(cfg.roles.total(), 4);
        assert!(!cfg.rules.first_night_elimination);
        assert_eq!(cfg.durations.night, Duration::from_secs(70));
        assert_eq!(cfg.durations.day, Duration::from_secs(1200));
    }

    #[test]
    fn test_nine_plus_forbids_self_protection() {
        let cfg = TemplateName::NinePlus.config();
        assert!(!cfg.rules.protector_can_protect_self);
        assert_eq!(cfg.roles.eliminators, 2);
    }

    #[test]
    fn test_validate_too_many_roles_is_configuration_error() {
        let cfg = TemplateName::Eight.config();
        assert!(matches!(cfg.validate(4), Err(GameError::Configuration(_))));
    }

    #[test]
    fn test_validate_three_eliminators_is_configuration_error() {
        let mut cfg = TemplateName::NinePlus.config();
        cfg.roles.eliminators = 3;
        assert!(matches!(cfg.validate(12), Err(GameError::Configuration(_))));
    }

    #[test]
    fn test_validate_duplicate_protector_is_configuration_error() {
        let mut cfg = TemplateName::NinePlus.config();
        cfg.roles.protector = 2;
        let err = cfg.validate(12).unwrap_err();
        assert!(err.to_string().contains("Protector"));
    }

    #[test]
    fn test_select_uses_override_by_name() {
        let mut custom = TemplateName::FiveOrSix.config();
        custom.durations.night = Duration::from_secs(5);
        let engine = EngineConfig {
            template_overrides: vec![custom],
            ..EngineConfig::default()
        };
        assert_eq!(engine.select(6).unwrap().durations.night, Duration::from_secs(5));
        assert_eq!(engine.select(7).unwrap().name, TemplateName::Seven);
    }

    #[test]
    fn test_select_four_players_is_configuration_error() {
        let err = EngineConfig::default().select(4).unwrap_err();
        assert!(err.to_string().contains("minimum of 5"));
    }

    #[test]
    fn test_scaled_divides_by_compression() {
        let engine = EngineConfig {
            time_compression: 10,
            ..EngineConfig::default()
        };
        assert_eq!(engine.scaled(Duration::from_secs(70)), Duration::from_secs(7));
        let real_time = EngineConfig {
            time_compression: 0,
            ..EngineConfig::default()
        };
        assert_eq!(real_time.scaled(Duration::from_secs(70)), Duration::from_secs(70));
    }

    #[test]
    fn test_engine_config_partial_json_fills_defaults() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{"auto_start": true, "time_compression": 20}"#).unwrap();
        assert!(cfg.auto_start);
        assert_eq!(cfg.time_compression, 20);
        assert_eq!(cfg.reconnect_grace, Duration::from_secs(80));
        assert_eq!(cfg.verdict_rule, VerdictRule::MajorityOfEligible);
    }
}
