//! Roster rules and the validator that enforces them
//!
//! Validation is a pure function over a catalog snapshot. Checks run in a
//! fixed order and the first violation is reported, so the same roster
//! always fails with the same error.

use crate::model::{Player, PlayerId, Position};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionLimit {
    pub position: Position,
    pub min: u32,
    pub max: u32,
}

impl PositionLimit {
    pub fn new(position: Position, min: u32, max: u32) -> Self {
        Self { position, min, max }
    }
}

/// Roster constraints of a contest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ruleset {
    pub roster_size: usize,
    pub position_limits: Vec<PositionLimit>,
    /// Budget in millions, same unit as player prices
    pub salary_cap: Decimal,
    pub max_per_affiliation: usize,
}

impl Default for Ruleset {
    fn default() -> Self {
        Self {
            roster_size: 11,
            position_limits: vec![
                PositionLimit::new(Position::Goalkeeper, 1, 1),
                PositionLimit::new(Position::Defender, 3, 5),
                PositionLimit::new(Position::Midfielder, 3, 5),
                PositionLimit::new(Position::Forward, 1, 3),
            ],
            salary_cap: Decimal::from(100),
            max_per_affiliation: 3,
        }
    }
}

impl Ruleset {
    fn limit_for(&self, position: &Position) -> Option<&PositionLimit> {
        self.position_limits.iter().find(|limit| &limit.position == position)
    }
}

/// A pick as submitted by the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSelection {
    pub player_id: PlayerId,
    #[serde(default)]
    pub is_captain: bool,
    #[serde(default)]
    pub is_vice_captain: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedPlayer {
    pub player: Player,
    pub is_captain: bool,
    pub is_vice_captain: bool,
}

/// A roster that passed every rule, with its cost breakdown
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedRoster {
    pub players: Vec<SelectedPlayer>,
    pub total_cost: Decimal,
    pub remaining_budget: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptaincyIssue {
    MissingCaptain,
    MultipleCaptains,
    MissingViceCaptain,
    MultipleViceCaptains,
    SamePlayer,
}

impl std::fmt::Display for CaptaincyIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            CaptaincyIssue::MissingCaptain => "exactly one captain is required",
            CaptaincyIssue::MultipleCaptains => "only one captain is allowed",
            CaptaincyIssue::MissingViceCaptain => "exactly one vice-captain is required",
            CaptaincyIssue::MultipleViceCaptains => "only one vice-captain is allowed",
            CaptaincyIssue::SamePlayer => "captain and vice-captain must be different players",
        };
        f.write_str(text)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RosterError {
    #[error("Roster must have exactly {expected} players, got {actual}")]
    Size { expected: usize, actual: usize },

    #[error("Player {player_id} was selected more than once")]
    DuplicatePlayer { player_id: PlayerId },

    #[error("Some players are unavailable")]
    UnavailablePlayers { missing: Vec<PlayerId>, inactive: Vec<String> },

    #[error("Invalid captaincy: {issue}")]
    Captaincy { issue: CaptaincyIssue },

    #[error("Position {code} is not supported")]
    UnsupportedPosition { code: String },

    #[error("Need {min}-{max} {position} players, got {actual}")]
    Composition { position: Position, min: u32, max: u32, actual: u32 },

    #[error("Roster costs {total_cost}M, over the {cap}M salary cap")]
    BudgetExceeded { total_cost: Decimal, cap: Decimal },

    #[error("Too many players from {team}: {count} (max {max})")]
    Diversity { team: String, count: usize, max: usize },
}

impl RosterError {
    pub fn code(&self) -> &'static str {
        match self {
            RosterError::Size { .. } => "ROSTER_SIZE",
            RosterError::DuplicatePlayer { .. } => "DUPLICATE_PLAYER",
            RosterError::UnavailablePlayers { .. } => "PLAYERS_UNAVAILABLE",
            RosterError::Captaincy { .. } => "INVALID_CAPTAINCY",
            RosterError::UnsupportedPosition { .. } => "UNSUPPORTED_POSITION",
            RosterError::Composition { .. } => "INVALID_COMPOSITION",
            RosterError::BudgetExceeded { .. } => "BUDGET_EXCEEDED",
            RosterError::Diversity { .. } => "TEAM_DIVERSITY",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            RosterError::UnavailablePlayers { missing, inactive } => Some(serde_json::json!({
                "missing": missing,
                "inactive": inactive,
            })),
            RosterError::Composition { position, min, max, actual } => Some(serde_json::json!({
                "position": position,
                "min": min,
                "max": max,
                "actual": actual,
            })),
            RosterError::BudgetExceeded { total_cost, cap } => Some(serde_json::json!({
                "total_cost": total_cost,
                "cap": cap,
            })),
            RosterError::Diversity { team, count, max } => Some(serde_json::json!({
                "team": team,
                "count": count,
                "max": max,
            })),
            _ => None,
        }
    }
}

/// Validate a roster against a ruleset
///
/// `catalog` holds the players the selections refer to; ids that are absent
/// count as missing. Checks run in order: size and duplicates, availability,
/// captaincy, composition, budget, affiliation diversity.
pub fn validate(
    selections: &[PlayerSelection],
    catalog: &[Player],
    rules: &Ruleset,
) -> Result<ValidatedRoster, RosterError> {
    if selections.len() != rules.roster_size {
        return Err(RosterError::Size { expected: rules.roster_size, actual: selections.len() });
    }

    let mut seen = HashSet::with_capacity(selections.len());
    for selection in selections {
        if !seen.insert(selection.player_id) {
            return Err(RosterError::DuplicatePlayer { player_id: selection.player_id });
        }
    }

    let by_id: HashMap<PlayerId, &Player> =
        catalog.iter().map(|player| (player.id, player)).collect();

    let mut missing = Vec::new();
    let mut inactive = Vec::new();
    let mut players = Vec::with_capacity(selections.len());
    for selection in selections {
        match by_id.get(&selection.player_id) {
            None => missing.push(selection.player_id),
            Some(player) if !player.is_active() => inactive.push(player.name.clone()),
            Some(player) => players.push(SelectedPlayer {
                player: (*player).clone(),
                is_captain: selection.is_captain,
                is_vice_captain: selection.is_vice_captain,
            }),
        }
    }
    if !missing.is_empty() || !inactive.is_empty() {
        return Err(RosterError::UnavailablePlayers { missing, inactive });
    }

    check_captaincy(selections)?;
    check_composition(&players, rules)?;

    let total_cost: Decimal = players.iter().map(|selected| selected.player.price).sum();
    if total_cost > rules.salary_cap {
        return Err(RosterError::BudgetExceeded { total_cost, cap: rules.salary_cap });
    }

    check_diversity(&players, rules)?;

    Ok(ValidatedRoster { players, total_cost, remaining_budget: rules.salary_cap - total_cost })
}

fn check_captaincy(selections: &[PlayerSelection]) -> Result<(), RosterError> {
    let captains: Vec<_> = selections.iter().filter(|s| s.is_captain).collect();
    let vice_captains: Vec<_> = selections.iter().filter(|s| s.is_vice_captain).collect();

    let issue = match (captains.as_slice(), vice_captains.as_slice()) {
        ([], _) => Some(CaptaincyIssue::MissingCaptain),
        (_, []) => Some(CaptaincyIssue::MissingViceCaptain),
        ([_, _, ..], _) => Some(CaptaincyIssue::MultipleCaptains),
        (_, [_, _, ..]) => Some(CaptaincyIssue::MultipleViceCaptains),
        ([captain], [vice]) if captain.player_id == vice.player_id => {
            Some(CaptaincyIssue::SamePlayer)
        }
        _ => None,
    };

    match issue {
        Some(issue) => Err(RosterError::Captaincy { issue }),
        None => Ok(()),
    }
}

fn check_composition(players: &[SelectedPlayer], rules: &Ruleset) -> Result<(), RosterError> {
    let mut counts: BTreeMap<&Position, u32> = BTreeMap::new();
    for selected in players {
        if let Position::Unknown(code) = &selected.player.position {
            return Err(RosterError::UnsupportedPosition { code: code.clone() });
        }
        *counts.entry(&selected.player.position).or_default() += 1;
    }

    for limit in &rules.position_limits {
        let actual = counts.get(&limit.position).copied().unwrap_or(0);
        if actual < limit.min || actual > limit.max {
            return Err(RosterError::Composition {
                position: limit.position.clone(),
                min: limit.min,
                max: limit.max,
                actual,
            });
        }
    }

    // A known position the ruleset has no slot for
    if let Some((position, actual)) =
        counts.iter().find(|(position, _)| rules.limit_for(position).is_none())
    {
        return Err(RosterError::Composition {
            position: (*position).clone(),
            min: 0,
            max: 0,
            actual: *actual,
        });
    }

    Ok(())
}

fn check_diversity(players: &[SelectedPlayer], rules: &Ruleset) -> Result<(), RosterError> {
    let mut per_team: BTreeMap<&str, usize> = BTreeMap::new();
    for selected in players {
        *per_team.entry(selected.player.team.as_str()).or_default() += 1;
    }

    match per_team.into_iter().find(|(_, count)| *count > rules.max_per_affiliation) {
        Some((team, count)) => Err(RosterError::Diversity {
            team: team.to_string(),
            count,
            max: rules.max_per_affiliation,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PlayerStatus;
    use uuid::Uuid;

    const TEAMS: [&str; 4] = ["NAVI", "G2", "FAZE", "VIT"];

    fn player(position: Position, team: &str, price: Decimal) -> Player {
        Player {
            id: Uuid::new_v4(),
            name: format!("{position}-{}", &Uuid::new_v4().to_string()[..8]),
            position,
            team: team.to_string(),
            price,
            status: PlayerStatus::Active,
            points: Decimal::ZERO,
        }
    }

    /// 1 GK, 4 DEF, 4 MID, 2 FWD at 9.0M each, spread over four teams
    fn squad() -> Vec<Player> {
        let positions = std::iter::once(Position::Goalkeeper)
            .chain(std::iter::repeat(Position::Defender).take(4))
            .chain(std::iter::repeat(Position::Midfielder).take(4))
            .chain(std::iter::repeat(Position::Forward).take(2));

        positions
            .enumerate()
            .map(|(i, position)| player(position, TEAMS[i % TEAMS.len()], Decimal::from(9)))
            .collect()
    }

    fn picks(players: &[Player]) -> Vec<PlayerSelection> {
        players
            .iter()
            .enumerate()
            .map(|(i, p)| PlayerSelection {
                player_id: p.id,
                is_captain: i == 0,
                is_vice_captain: i == 1,
            })
            .collect()
    }

    #[test]
    fn test_valid_roster() {
        let players = squad();
        let roster = validate(&picks(&players), &players, &Ruleset::default()).unwrap();

        assert_eq!(roster.players.len(), 11);
        assert_eq!(roster.total_cost, Decimal::from(99));
        assert_eq!(roster.remaining_budget, Decimal::from(1));
        assert!(roster.players[0].is_captain);
    }

    #[test]
    fn test_wrong_size() {
        let players = squad();
        let mut selections = picks(&players);
        selections.pop();

        let err = validate(&selections, &players, &Ruleset::default()).unwrap_err();
        assert_eq!(err, RosterError::Size { expected: 11, actual: 10 });
    }

    #[test]
    fn test_duplicate_player() {
        let players = squad();
        let mut selections = picks(&players);
        selections[10].player_id = selections[9].player_id;

        let err = validate(&selections, &players, &Ruleset::default()).unwrap_err();
        assert!(matches!(err, RosterError::DuplicatePlayer { .. }));
    }

    #[test]
    fn test_missing_and_inactive_players_are_listed() {
        let mut players = squad();
        players[3].status = PlayerStatus::Inactive;
        let inactive_name = players[3].name.clone();
        let selections = picks(&players);
        let gone = players.remove(5).id;

        let err = validate(&selections, &players, &Ruleset::default()).unwrap_err();
        assert_eq!(
            err,
            RosterError::UnavailablePlayers { missing: vec![gone], inactive: vec![inactive_name] }
        );
    }

    #[test]
    fn test_captaincy_rules() {
        let players = squad();
        let rules = Ruleset::default();

        let mut no_captain = picks(&players);
        no_captain[0].is_captain = false;
        assert_eq!(
            validate(&no_captain, &players, &rules).unwrap_err(),
            RosterError::Captaincy { issue: CaptaincyIssue::MissingCaptain }
        );

        let mut two_captains = picks(&players);
        two_captains[5].is_captain = true;
        assert_eq!(
            validate(&two_captains, &players, &rules).unwrap_err(),
            RosterError::Captaincy { issue: CaptaincyIssue::MultipleCaptains }
        );

        let mut same = picks(&players);
        same[1].is_vice_captain = false;
        same[0].is_vice_captain = true;
        assert_eq!(
            validate(&same, &players, &rules).unwrap_err(),
            RosterError::Captaincy { issue: CaptaincyIssue::SamePlayer }
        );
    }

    #[test]
    fn test_composition_limits() {
        let mut players = squad();
        // Swap a midfielder for a fifth defender and a forward for a sixth
        players[5].position = Position::Defender;
        players[9].position = Position::Defender;

        let err = validate(&picks(&players), &players, &Ruleset::default()).unwrap_err();
        assert_eq!(
            err,
            RosterError::Composition { position: Position::Defender, min: 3, max: 5, actual: 6 }
        );
    }

    #[test]
    fn test_unknown_position_is_rejected() {
        let mut players = squad();
        players[4].position = Position::Unknown("SUP".to_string());

        let err = validate(&picks(&players), &players, &Ruleset::default()).unwrap_err();
        assert_eq!(err, RosterError::UnsupportedPosition { code: "SUP".to_string() });
    }

    #[test]
    fn test_budget_cap() {
        let mut players = squad();
        players[10].price = Decimal::from(11);

        let err = validate(&picks(&players), &players, &Ruleset::default()).unwrap_err();
        assert_eq!(
            err,
            RosterError::BudgetExceeded { total_cost: Decimal::from(101), cap: Decimal::from(100) }
        );
    }

    #[test]
    fn test_budget_exactly_at_cap_passes() {
        let mut players = squad();
        players[10].price = Decimal::from(10);

        let roster = validate(&picks(&players), &players, &Ruleset::default()).unwrap();
        assert_eq!(roster.remaining_budget, Decimal::ZERO);
    }

    #[test]
    fn test_affiliation_diversity() {
        let mut players = squad();
        players[1].team = "NAVI".to_string();

        let err = validate(&picks(&players), &players, &Ruleset::default()).unwrap_err();
        assert_eq!(err, RosterError::Diversity { team: "NAVI".to_string(), count: 4, max: 3 });
    }

    #[test]
    fn test_size_is_checked_before_availability() {
        let players = squad();
        let selections = picks(&players[..5]);

        let err = validate(&selections, &[], &Ruleset::default()).unwrap_err();
        assert!(matches!(err, RosterError::Size { .. }));
    }
}
