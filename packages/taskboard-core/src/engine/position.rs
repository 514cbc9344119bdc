/// Column-scoped card ranking.
///
/// Every column holds its cards at positions `0..k`. A position request is
/// first resolved to a concrete rank (`resolve_position`), then applied with
/// sibling shifts that keep both the source and destination columns
/// contiguous (`apply_move`, `insert_card`, `remove_card`).
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::types::Card;

/// A requested position: explicit rank or a symbolic placement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPosition", into = "RawPosition")]
pub enum PositionSpec {
    Index(usize),
    First,
    #[default]
    Last,
    Up,
    Down,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawPosition {
    Index(usize),
    Named(String),
}

impl TryFrom<RawPosition> for PositionSpec {
    type Error = EngineError;

    fn try_from(raw: RawPosition) -> Result<Self> {
        match raw {
            RawPosition::Index(index) => Ok(PositionSpec::Index(index)),
            RawPosition::Named(name) => name.parse(),
        }
    }
}

impl From<PositionSpec> for RawPosition {
    fn from(spec: PositionSpec) -> Self {
        match spec {
            PositionSpec::Index(index) => RawPosition::Index(index),
            other => RawPosition::Named(other.to_string()),
        }
    }
}

impl FromStr for PositionSpec {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(PositionSpec::First),
            "last" => Ok(PositionSpec::Last),
            "up" => Ok(PositionSpec::Up),
            "down" => Ok(PositionSpec::Down),
            other => other.parse::<usize>().map(PositionSpec::Index).map_err(|_| {
                EngineError::validation(format!(
                    "Invalid position '{}': expected a non-negative integer, first, last, up or down",
                    s
                ))
            }),
        }
    }
}

impl fmt::Display for PositionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionSpec::Index(index) => write!(f, "{}", index),
            PositionSpec::First => f.write_str("first"),
            PositionSpec::Last => f.write_str("last"),
            PositionSpec::Up => f.write_str("up"),
            PositionSpec::Down => f.write_str("down"),
        }
    }
}

/// Number of cards in `column_id`, not counting `exclude`.
fn count_others(cards: &[Card], column_id: &str, exclude: Option<&str>) -> usize {
    cards
        .iter()
        .filter(|c| c.column_id == column_id && Some(c.id.as_str()) != exclude)
        .count()
}

/// Resolve a position request against the cards currently in `target_column`.
///
/// `moving` is the card being moved, if any; it is never counted as one of
/// the target column's occupants. `up` and `down` require a moving card that
/// stays in its own column. `down` is not clamped here; the apply step clamps.
pub fn resolve_position(
    cards: &[Card],
    target_column: &str,
    requested: PositionSpec,
    moving: Option<&Card>,
) -> Result<usize> {
    let others = count_others(cards, target_column, moving.map(|c| c.id.as_str()));

    match requested {
        PositionSpec::First => Ok(0),
        PositionSpec::Last => Ok(others),
        PositionSpec::Index(index) => Ok(index.min(others)),
        PositionSpec::Up | PositionSpec::Down => {
            let card = moving.ok_or_else(|| {
                EngineError::validation(format!(
                    "Position '{}' is only valid when moving an existing card",
                    requested
                ))
            })?;
            if card.column_id != target_column {
                return Err(EngineError::validation(format!(
                    "Position '{}' is only valid within the card's current column",
                    requested
                )));
            }
            if requested == PositionSpec::Up {
                Ok(card.position.saturating_sub(1))
            } else {
                Ok(card.position.saturating_add(1))
            }
        }
    }
}

/// Move `cards[index]` to `(target_column, target_position)`, shifting
/// siblings so both columns stay contiguous. Returns the applied position,
/// which is `target_position` clamped to the last valid slot.
pub fn apply_move(
    cards: &mut [Card],
    index: usize,
    target_column: &str,
    target_position: usize,
) -> usize {
    let moving_id = cards[index].id.clone();
    let old_column = cards[index].column_id.clone();
    let old_position = cards[index].position;
    let new_position = target_position.min(count_others(cards, target_column, Some(&moving_id)));

    for (i, card) in cards.iter_mut().enumerate() {
        if i == index {
            continue;
        }
        if old_column == target_column {
            if card.column_id != old_column {
                continue;
            }
            if old_position < new_position
                && card.position > old_position
                && card.position <= new_position
            {
                card.position -= 1;
            } else if old_position > new_position
                && card.position >= new_position
                && card.position < old_position
            {
                card.position = card.position.saturating_add(1);
            }
        } else if card.column_id == old_column && card.position > old_position {
            card.position -= 1;
        } else if card.column_id == target_column && card.position >= new_position {
            card.position = card.position.saturating_add(1);
        }
    }

    let card = &mut cards[index];
    card.column_id = target_column.to_string();
    card.position = new_position;
    new_position
}

/// Insert a new card at `card.position` within `card.column_id`, opening a
/// slot in the destination column. Returns the index of the pushed card.
pub fn insert_card(cards: &mut Vec<Card>, mut card: Card) -> usize {
    let occupants = count_others(cards, &card.column_id, None);
    card.position = card.position.min(occupants);

    for other in cards.iter_mut() {
        if other.column_id == card.column_id && other.position >= card.position {
            other.position = other.position.saturating_add(1);
        }
    }
    cards.push(card);
    cards.len() - 1
}

/// Remove `cards[index]` and close the gap it leaves in its column.
pub fn remove_card(cards: &mut Vec<Card>, index: usize) -> Card {
    let removed = cards.remove(index);
    for other in cards.iter_mut() {
        if other.column_id == removed.column_id && other.position > removed.position {
            other.position -= 1;
        }
    }
    removed
}
