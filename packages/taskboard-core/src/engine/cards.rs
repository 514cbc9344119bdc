/// Single card operations on an in-memory board.
///
/// Each function validates everything it needs before touching the board,
/// so a returned error means the board is unchanged. Persistence and
/// backups are the caller's job (see `service`).
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use super::position::{self, PositionSpec};
use crate::config::EngineLimits;
use crate::error::{EngineError, Result};
use crate::identity;
use crate::types::{Board, Card};

pub const DEFAULT_CARD_TITLE: &str = "New card";

/// Fields for a card being created. Everything is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CardDraft {
    pub title: Option<String>,
    pub content: Option<String>,
    pub dependencies: Vec<String>,
    pub tags: Vec<String>,
    pub subtasks: Vec<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub blocked_at: Option<DateTime<Utc>>,
}

impl CardDraft {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    fn validate(&self, limits: &EngineLimits) -> Result<()> {
        if let Some(title) = &self.title {
            check_title(title)?;
            check_text("title", title, limits)?;
        }
        if let Some(content) = &self.content {
            check_text("content", content, limits)?;
        }
        Ok(())
    }
}

/// Field-level changes to an existing card. Absent fields are kept.
/// `content`, `completedAt` and `blockedAt` accept `null` to clear.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CardPatch {
    pub title: Option<String>,
    #[serde(deserialize_with = "present")]
    pub content: Option<Option<String>>,
    pub column_id: Option<String>,
    pub dependencies: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub subtasks: Option<Vec<String>>,
    #[serde(deserialize_with = "present")]
    pub completed_at: Option<Option<DateTime<Utc>>>,
    #[serde(deserialize_with = "present")]
    pub blocked_at: Option<Option<DateTime<Utc>>>,
}

/// Maps a present field (including `null`) to `Some`, leaving absent
/// fields at their `None` default.
fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl CardPatch {
    fn validate(&self, limits: &EngineLimits) -> Result<()> {
        if let Some(title) = &self.title {
            check_title(title)?;
            check_text("title", title, limits)?;
        }
        if let Some(Some(content)) = &self.content {
            check_text("content", content, limits)?;
        }
        Ok(())
    }

    /// Merge every field except `column_id` onto `card`; the patch wins.
    fn merge_into(&self, card: &mut Card) {
        if let Some(title) = &self.title {
            card.title = title.clone();
        }
        if let Some(content) = &self.content {
            card.content = content.clone();
        }
        if let Some(dependencies) = &self.dependencies {
            card.dependencies = dependencies.clone();
        }
        if let Some(tags) = &self.tags {
            card.tags = tags.clone();
        }
        if let Some(subtasks) = &self.subtasks {
            card.subtasks = subtasks.clone();
        }
        if let Some(completed_at) = self.completed_at {
            card.completed_at = completed_at;
        }
        if let Some(blocked_at) = self.blocked_at {
            card.blocked_at = blocked_at;
        }
    }
}

fn check_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(EngineError::validation("Card title must not be empty"));
    }
    Ok(())
}

fn check_text(field: &str, value: &str, limits: &EngineLimits) -> Result<()> {
    let len = value.chars().count();
    if len > limits.max_card_payload_chars {
        return Err(EngineError::validation(format!(
            "Card {} is {} characters, limit is {}",
            field, len, limits.max_card_payload_chars
        )));
    }
    Ok(())
}

fn require_column(board: &Board, column_id: &str) -> Result<()> {
    if board.has_column(column_id) {
        Ok(())
    } else {
        Err(EngineError::missing_column(column_id))
    }
}

fn card_index(board: &Board, card_id: &str) -> Result<usize> {
    board
        .card_index(card_id)
        .ok_or_else(|| EngineError::card_not_found(card_id))
}

/// Create a card. The column defaults to the board's first column and the
/// position to `last`.
pub fn create_card(
    board: &mut Board,
    limits: &EngineLimits,
    column_id: Option<&str>,
    draft: CardDraft,
    position: Option<PositionSpec>,
) -> Result<Card> {
    if board.cards.len() >= limits.max_cards {
        return Err(EngineError::validation(format!(
            "Board already holds the maximum of {} cards",
            limits.max_cards
        )));
    }

    let column_id = match column_id {
        Some(id) => {
            require_column(board, id)?;
            id.to_string()
        }
        None => board
            .columns
            .first()
            .map(|c| c.id.clone())
            .ok_or_else(|| EngineError::validation("Board has no columns to add a card to"))?,
    };
    draft.validate(limits)?;

    let rank = position::resolve_position(
        &board.cards,
        &column_id,
        position.unwrap_or_default(),
        None,
    )?;

    let now = Utc::now();
    let card = Card {
        id: identity::card_id(),
        title: draft
            .title
            .unwrap_or_else(|| DEFAULT_CARD_TITLE.to_string()),
        content: draft.content,
        column_id,
        position: rank,
        dependencies: draft.dependencies,
        tags: draft.tags,
        subtasks: draft.subtasks,
        created_at: now,
        updated_at: now,
        completed_at: draft.completed_at,
        blocked_at: draft.blocked_at,
    };

    let index = position::insert_card(&mut board.cards, card);
    Ok(board.cards[index].clone())
}

/// Merge `patch` into a card. A changed `columnId` sends the card to the
/// end of its new column.
pub fn update_card(
    board: &mut Board,
    limits: &EngineLimits,
    card_id: &str,
    patch: &CardPatch,
) -> Result<Card> {
    let index = card_index(board, card_id)?;
    patch.validate(limits)?;

    let target_column = patch
        .column_id
        .as_deref()
        .filter(|id| *id != board.cards[index].column_id);
    if let Some(column_id) = target_column {
        require_column(board, column_id)?;
        let rank = position::resolve_position(
            &board.cards,
            column_id,
            PositionSpec::Last,
            Some(&board.cards[index]),
        )?;
        position::apply_move(&mut board.cards, index, column_id, rank);
    }

    let card = &mut board.cards[index];
    patch.merge_into(card);
    card.updated_at = Utc::now();
    Ok(card.clone())
}

/// Move a card to `column_id` at the requested position.
pub fn move_card(
    board: &mut Board,
    card_id: &str,
    column_id: &str,
    position: PositionSpec,
) -> Result<Card> {
    let index = card_index(board, card_id)?;
    require_column(board, column_id)?;

    let rank = position::resolve_position(
        &board.cards,
        column_id,
        position,
        Some(&board.cards[index]),
    )?;
    position::apply_move(&mut board.cards, index, column_id, rank);

    let card = &mut board.cards[index];
    card.updated_at = Utc::now();
    Ok(card.clone())
}

/// Remove a card. Dependencies that point at it are left in place.
pub fn delete_card(board: &mut Board, card_id: &str) -> Result<Card> {
    let index = card_index(board, card_id)?;
    Ok(position::remove_card(&mut board.cards, index))
}
