//! Win condition evaluation.

use nightfall_protocol::PlayerId;
use serde::{Deserialize, Serialize};

use crate::{RemovalCause, Role, RoleAssignment, Side, Standing};

/// The side that won a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    Town,
    Eliminators,
}

impl Winner {
    /// Whether a role shares in this win. The independent never does; it
    /// is scored separately by [`independent_result`].
    pub fn includes(self, role: Role) -> bool {
        match (self, role.side()) {
            (Self::Town, Side::Town) | (Self::Eliminators, Side::Eliminators) => true,
            (_, Side::Town | Side::Eliminators | Side::Independent) => false,
        }
    }
}

/// Checks the win rules in order. Returns `None` while the game goes on.
///
/// 1. No active eliminator: town wins.
/// 2. Exactly two active players, one eliminator and the sleeper: town
///    wins.
/// 3. Active non-eliminators at or below `eliminator_win_floor`:
///    eliminators win.
pub fn evaluate(assignment: &RoleAssignment, eliminator_win_floor: usize) -> Option<Winner> {
    let active: Vec<PlayerId> = assignment.active().collect();
    let eliminators = active
        .iter()
        .filter(|p| assignment.is_eliminator(**p))
        .count();

    if eliminators == 0 {
        return Some(Winner::Town);
    }
    if active.len() == 2
        && eliminators == 1
        && active
            .iter()
            .any(|p| assignment.role_of(*p) == Some(Role::Sleeper))
    {
        return Some(Winner::Town);
    }
    if active.len() - eliminators <= eliminator_win_floor {
        return Some(Winner::Eliminators);
    }
    None
}

/// The independent's own result, scored at the moment the game is won.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndependentResult {
    pub player: PlayerId,
    pub won: bool,
}

/// Scores the independent, if one was dealt.
///
/// They win when, at the end, they are restrained (on trial), were taken
/// out by elimination or conviction, or the eliminators won (everyone left
/// standing outside the eliminators ends bound).
pub fn independent_result(
    assignment: &RoleAssignment,
    winner: Winner,
    restrained: Option<PlayerId>,
) -> Option<IndependentResult> {
    let player = assignment.holders(Role::Independent).next()?;
    let won = match assignment.standing(player) {
        Some(Standing::Removed(RemovalCause::Eliminated | RemovalCause::Convicted)) => true,
        Some(Standing::Removed(RemovalCause::Left | RemovalCause::TimedOut)) => false,
        Some(Standing::Active) => restrained == Some(player) || winner == Winner::Eliminators,
        None => false,
    };
    Some(IndependentResult { player, won })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(id: u64) -> PlayerId {
        PlayerId(id)
    }

    fn five() -> RoleAssignment {
        RoleAssignment::from_roles([
            (pid(1), Role::Eliminator),
            (pid(2), Role::Investigator),
            (pid(3), Role::Sleeper),
            (pid(4), Role::Shadow),
            (pid(5), Role::Townsfolk),
        ])
    }

    #[test]
    fn test_evaluate_full_table_continues() {
        assert_eq!(evaluate(&five(), 1), None);
    }

    #[test]
    fn test_evaluate_no_eliminator_town_wins() {
        let mut a = five();
        a.remove(pid(1), RemovalCause::Convicted);
        assert_eq!(evaluate(&a, 1), Some(Winner::Town));
    }

    #[test]
    fn test_evaluate_eliminator_and_sleeper_town_wins() {
        let mut a = five();
        for p in [2, 4, 5] {
            a.remove(pid(p), RemovalCause::Eliminated);
        }
        assert_eq!(evaluate(&a, 1), Some(Winner::Town));
    }

    #[test]
    fn test_evaluate_eliminator_and_townsfolk_eliminators_win() {
        let mut a = five();
        for p in [2, 3, 4] {
            a.remove(pid(p), RemovalCause::Eliminated);
        }
        assert_eq!(evaluate(&a, 1), Some(Winner::Eliminators));
    }

    #[test]
    fn test_evaluate_two_eliminators_alone_win() {
        let a =
            RoleAssignment::from_roles([(pid(1), Role::Eliminator), (pid(2), Role::Eliminator)]);
        assert_eq!(evaluate(&a, 1), Some(Winner::Eliminators));
    }

    #[test]
    fn test_evaluate_floor_is_configurable() {
        let mut a = five();
        a.remove(pid(5), RemovalCause::Left);
        // Three non-eliminators left.
        assert_eq!(evaluate(&a, 2), None);
        assert_eq!(evaluate(&a, 3), Some(Winner::Eliminators));
    }

    #[test]
    fn test_winner_includes_allies() {
        assert!(Winner::Eliminators.includes(Role::HiddenAlly));
        assert!(Winner::Town.includes(Role::Sleeper));
        assert!(!Winner::Town.includes(Role::Independent));
        assert!(!Winner::Eliminators.includes(Role::Independent));
    }

    #[test]
    fn test_independent_result_cases() {
        let base = RoleAssignment::from_roles([
            (pid(1), Role::Eliminator),
            (pid(2), Role::Independent),
            (pid(3), Role::Townsfolk),
        ]);
        let standing_free = independent_result(&base, Winner::Town, None).unwrap();
        assert!(!standing_free.won);

        let restrained = independent_result(&base, Winner::Town, Some(pid(2))).unwrap();
        assert!(restrained.won);

        assert!(independent_result(&base, Winner::Eliminators, None).unwrap().won);

        let mut convicted = base.clone();
        convicted.remove(pid(2), RemovalCause::Convicted);
        assert!(independent_result(&convicted, Winner::Town, None).unwrap().won);

        let mut left = base;
        left.remove(pid(2), RemovalCause::Left);
        assert!(!independent_result(&left, Winner::Eliminators, None).unwrap().won);
    }

    #[test]
    fn test_independent_result_absent_without_independent() {
        assert_eq!(independent_result(&five(), Winner::Town, None), None);
    }
}
