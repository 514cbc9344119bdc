use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub column_id: String,
    /// Zero-based rank within `column_id`.
    pub position: usize,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub subtasks: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wip_limit: Option<u32>,
}

/// A board in the flat shape: columns define order, cards carry their own
/// `column_id` and `position`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: String,
    pub name: String,
    pub columns: Vec<Column>,
    pub cards: Vec<Card>,
    pub last_updated: DateTime<Utc>,
}

impl Board {
    pub fn find_column(&self, column_id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == column_id)
    }

    pub fn has_column(&self, column_id: &str) -> bool {
        self.find_column(column_id).is_some()
    }

    pub fn find_card(&self, card_id: &str) -> Option<&Card> {
        self.cards.iter().find(|c| c.id == card_id)
    }

    pub fn card_index(&self, card_id: &str) -> Option<usize> {
        self.cards.iter().position(|c| c.id == card_id)
    }

    /// Cards of one column ordered by position.
    pub fn cards_in_column(&self, column_id: &str) -> Vec<&Card> {
        let mut cards: Vec<&Card> = self
            .cards
            .iter()
            .filter(|c| c.column_id == column_id)
            .collect();
        cards.sort_by_key(|c| c.position);
        cards
    }

    pub fn column_card_count(&self, column_id: &str) -> usize {
        self.cards.iter().filter(|c| c.column_id == column_id).count()
    }

    pub fn completed_card_count(&self) -> usize {
        self.cards.iter().filter(|c| c.completed_at.is_some()).count()
    }
}

/// A card as it appears nested inside a legacy column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyCard {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub subtasks: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyColumn {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wip_limit: Option<u32>,
    #[serde(default, alias = "items")]
    pub cards: Vec<LegacyCard>,
}

/// The older document shape with cards embedded in their columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyBoard {
    pub id: String,
    pub name: String,
    pub columns: Vec<LegacyColumn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl LegacyBoard {
    pub fn card_count(&self) -> usize {
        self.columns.iter().map(|c| c.cards.len()).sum()
    }
}

/// A stored board document, classified once when it is read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BoardShape {
    Legacy(LegacyBoard),
    Flat(Board),
}

impl BoardShape {
    /// Classify a raw document: a top-level `cards` array means flat.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        let is_flat = value
            .get("cards")
            .map(|cards| cards.is_array())
            .unwrap_or(false);
        if is_flat {
            serde_json::from_value(value).map(BoardShape::Flat)
        } else {
            serde_json::from_value(value).map(BoardShape::Legacy)
        }
    }

    pub fn id(&self) -> &str {
        match self {
            BoardShape::Legacy(board) => &board.id,
            BoardShape::Flat(board) => &board.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            BoardShape::Legacy(board) => &board.name,
            BoardShape::Flat(board) => &board.name,
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, BoardShape::Legacy(_))
    }
}

/// Summary info for a board in list responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardInfo {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    pub column_count: usize,
    pub card_count: usize,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub legacy: bool,
}

impl From<&BoardShape> for BoardInfo {
    fn from(shape: &BoardShape) -> Self {
        let (last_updated, column_count, card_count) = match shape {
            BoardShape::Flat(board) => (
                Some(board.last_updated),
                board.columns.len(),
                board.cards.len(),
            ),
            BoardShape::Legacy(board) => {
                (board.last_updated, board.columns.len(), board.card_count())
            }
        };
        BoardInfo {
            id: shape.id().to_string(),
            name: shape.name().to_string(),
            last_updated,
            column_count,
            card_count,
            legacy: shape.is_legacy(),
        }
    }
}

/// A column whose card positions are not `0..count`.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionGap {
    pub column_id: String,
    pub positions: Vec<usize>,
}

/// Verify position contiguity for every column referenced by the board.
/// Returns the first offending column, in column order.
pub fn check_positions(board: &Board) -> Result<(), PositionGap> {
    let mut column_ids: Vec<&str> = board.columns.iter().map(|c| c.id.as_str()).collect();
    // Orphaned cards still need contiguous positions among themselves.
    for card in &board.cards {
        if !column_ids.contains(&card.column_id.as_str()) {
            column_ids.push(&card.column_id);
        }
    }

    for column_id in column_ids {
        let mut positions: Vec<usize> = board
            .cards
            .iter()
            .filter(|c| c.column_id == column_id)
            .map(|c| c.position)
            .collect();
        positions.sort_unstable();
        if positions.iter().enumerate().any(|(i, p)| i != *p) {
            return Err(PositionGap {
                column_id: column_id.to_string(),
                positions,
            });
        }
    }
    Ok(())
}
