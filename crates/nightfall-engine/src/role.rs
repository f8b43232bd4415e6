//! Roles, sides, and dealing them out.

use std::collections::BTreeMap;
use std::fmt;

use nightfall_protocol::PlayerId;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{GameConfig, GameError, NightSlot};

// ---------------------------------------------------------------------------
// Role & Side
// ---------------------------------------------------------------------------

/// A secret role dealt at the start of a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    /// Chooses one victim per night, shared with any partner.
    Eliminator,
    /// Shields one player per night.
    Protector,
    /// Learns whether one player is an eliminator.
    Investigator,
    /// Hunts for the investigator on the eliminators' behalf.
    Shadow,
    /// Plays for town, and wins it outright when left alone with a single
    /// eliminator.
    Sleeper,
    /// Wins with the eliminators but has no night ability.
    HiddenAlly,
    /// Wins if restrained or removed when the game ends.
    Independent,
    /// No ability.
    Townsfolk,
}

impl Role {
    /// The order special roles are drawn in. Eliminators go first so their
    /// count is always honoured exactly.
    pub const DRAW_ORDER: [Role; 7] = [
        Role::Eliminator,
        Role::Protector,
        Role::Investigator,
        Role::Shadow,
        Role::Sleeper,
        Role::HiddenAlly,
        Role::Independent,
    ];

    /// Which side this role plays for.
    pub fn side(self) -> Side {
        match self {
            Self::Eliminator | Self::Shadow | Self::HiddenAlly => Side::Eliminators,
            Self::Independent => Side::Independent,
            Self::Protector | Self::Investigator | Self::Sleeper | Self::Townsfolk => Side::Town,
        }
    }

    /// The night slot this role acts in, if it has a night ability.
    pub fn night_slot(self) -> Option<NightSlot> {
        match self {
            Self::Eliminator => Some(NightSlot::Eliminator),
            Self::Protector => Some(NightSlot::Protector),
            Self::Investigator => Some(NightSlot::Investigator),
            Self::Shadow => Some(NightSlot::Shadow),
            Self::Sleeper | Self::HiddenAlly | Self::Independent | Self::Townsfolk => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The allegiance a role plays for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Town,
    Eliminators,
    Independent,
}

// ---------------------------------------------------------------------------
// Standing
// ---------------------------------------------------------------------------

/// How a player left play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemovalCause {
    /// Taken by the eliminators at night.
    Eliminated,
    /// Found guilty at trial.
    Convicted,
    /// Left the room on purpose.
    Left,
    /// Disconnected and did not come back within the grace period.
    TimedOut,
}

/// Whether a dealt player is still in play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Standing {
    Active,
    Removed(RemovalCause),
}

/// One dealt seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub role: Role,
    pub standing: Standing,
}

/// A line of the end-of-game disclosure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleReveal {
    pub player: PlayerId,
    pub role: Role,
    pub standing: Standing,
}

// ---------------------------------------------------------------------------
// RoleAssignment
// ---------------------------------------------------------------------------

/// Who holds which role in the current game, and who is still in play.
///
/// Each player maps to exactly one seat, so role slots are disjoint by
/// construction. Roles never change after the deal; only standings do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleAssignment {
    seats: BTreeMap<PlayerId, Seat>,
}

impl RoleAssignment {
    /// Builds an assignment from explicit `(player, role)` pairs, every seat
    /// active.
    pub fn from_roles(roles: impl IntoIterator<Item = (PlayerId, Role)>) -> Self {
        Self {
            seats: roles
                .into_iter()
                .map(|(player, role)| {
                    (
                        player,
                        Seat {
                            role,
                            standing: Standing::Active,
                        },
                    )
                })
                .collect(),
        }
    }

    pub fn seat(&self, player: PlayerId) -> Option<&Seat> {
        self.seats.get(&player)
    }

    pub fn role_of(&self, player: PlayerId) -> Option<Role> {
        self.seats.get(&player).map(|s| s.role)
    }

    pub fn standing(&self, player: PlayerId) -> Option<Standing> {
        self.seats.get(&player).map(|s| s.standing)
    }

    pub fn is_active(&self, player: PlayerId) -> bool {
        matches!(self.standing(player), Some(Standing::Active))
    }

    /// Active players in id order.
    pub fn active(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.seats
            .iter()
            .filter(|(_, s)| s.standing == Standing::Active)
            .map(|(p, _)| *p)
    }

    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    /// Every player dealt `role`, active or not.
    pub fn holders(&self, role: Role) -> impl Iterator<Item = PlayerId> + '_ {
        self.seats
            .iter()
            .filter(move |(_, s)| s.role == role)
            .map(|(p, _)| *p)
    }

    /// Active players dealt `role`.
    pub fn active_holders(&self, role: Role) -> Vec<PlayerId> {
        self.holders(role).filter(|p| self.is_active(*p)).collect()
    }

    /// Number of seats dealt `role`.
    pub fn count(&self, role: Role) -> usize {
        self.holders(role).count()
    }

    pub fn is_eliminator(&self, player: PlayerId) -> bool {
        self.role_of(player) == Some(Role::Eliminator)
    }

    /// Marks `player` as out of play. Returns `false` if they were not
    /// seated or already removed.
    pub fn remove(&mut self, player: PlayerId, cause: RemovalCause) -> bool {
        match self.seats.get_mut(&player) {
            Some(seat) if seat.standing == Standing::Active => {
                seat.standing = Standing::Removed(cause);
                true
            }
            _ => false,
        }
    }

    /// Fellow eliminators a given eliminator should know about.
    pub fn partners_of(&self, player: PlayerId) -> Vec<PlayerId> {
        if !self.is_eliminator(player) {
            return Vec::new();
        }
        self.holders(Role::Eliminator).filter(|p| *p != player).collect()
    }

    /// The full table for the end-of-game disclosure.
    pub fn reveal(&self) -> Vec<RoleReveal> {
        self.seats
            .iter()
            .map(|(player, seat)| RoleReveal {
                player: *player,
                role: seat.role,
                standing: seat.standing,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.seats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }
}

/// Deals `config`'s roles to `players`.
///
/// Special roles are drawn in [`Role::DRAW_ORDER`], each picking a
/// uniformly random player from those not yet dealt. Whoever is left is
/// Townsfolk. The configuration is validated before the first draw, so an
/// error never leaves a half-dealt table behind.
///
/// # Errors
/// [`GameError::Configuration`] if the roles do not fit the player count.
pub fn assign_roles<R: Rng + ?Sized>(
    players: &[PlayerId],
    config: &GameConfig,
    rng: &mut R,
) -> Result<RoleAssignment, GameError> {
    config.validate(players.len())?;

    let mut pool: Vec<PlayerId> = players.to_vec();
    pool.sort();
    pool.dedup();
    if pool.len() != players.len() {
        return Err(GameError::Configuration(
            "duplicate player in deal".into(),
        ));
    }

    let mut dealt = Vec::with_capacity(pool.len());
    for role in Role::DRAW_ORDER {
        for _ in 0..config.roles.count(role) {
            let idx = rng.random_range(0..pool.len());
            dealt.push((pool.swap_remove(idx), role));
        }
    }
    dealt.extend(pool.into_iter().map(|p| (p, Role::Townsfolk)));

    Ok(RoleAssignment::from_roles(dealt))
}
