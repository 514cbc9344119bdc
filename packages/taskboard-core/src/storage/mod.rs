pub mod backup;
pub mod local;

use std::collections::HashSet;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::config::EngineLimits;
use crate::error::{EngineError, Result};
use crate::types::{Board, BoardInfo, BoardShape};

/// Abstract storage trait for board documents, keyed by board id.
/// Implementations: LocalBoardStore (one JSON file per board).
///
/// There is no locking between `load_board` and `save_board`; the last
/// writer wins.
pub trait BoardStore: Send + Sync {
    /// List all readable boards with summary info, sorted by id.
    fn list_boards(&self) -> Vec<BoardInfo>;

    fn exists(&self, board_id: &str) -> bool;

    /// The stored document text, exactly as it is on disk.
    fn load_raw(&self, board_id: &str) -> Result<String>;

    /// Classify document text previously returned by `load_raw`.
    fn parse_document(&self, board_id: &str, raw: &str) -> Result<BoardShape>;

    /// Read a board document, classified as legacy or flat.
    fn load_board(&self, board_id: &str) -> Result<BoardShape> {
        let raw = self.load_raw(board_id)?;
        self.parse_document(board_id, &raw)
    }

    /// Validate and persist a flat board, replacing any previous document.
    fn save_board(&self, board: &Board) -> Result<()>;

    fn delete_board(&self, board_id: &str) -> Result<()>;
}

/// Characters kept verbatim when a board id becomes part of a file name.
/// `_` is encoded so it can separate fields in backup names.
const FILE_NAME_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.');

pub fn encode_board_id(board_id: &str) -> String {
    let encoded = utf8_percent_encode(board_id, FILE_NAME_SET).to_string();
    // A leading dot would make a hidden file.
    match encoded.strip_prefix('.') {
        Some(rest) => format!("%2E{}", rest),
        None => encoded,
    }
}

/// Structural checks run before any board is written.
pub fn validate_board(board: &Board, limits: &EngineLimits) -> Result<()> {
    if board.id.trim().is_empty() {
        return Err(EngineError::validation("Board id must not be empty"));
    }
    if board.columns.len() > limits.max_columns {
        return Err(EngineError::validation(format!(
            "Board has {} columns, limit is {}",
            board.columns.len(),
            limits.max_columns
        )));
    }
    if board.cards.len() > limits.max_cards {
        return Err(EngineError::validation(format!(
            "Board has {} cards, limit is {}",
            board.cards.len(),
            limits.max_cards
        )));
    }

    let mut column_ids = HashSet::new();
    for column in &board.columns {
        if !column_ids.insert(column.id.as_str()) {
            return Err(EngineError::validation(format!(
                "Duplicate column id '{}'",
                column.id
            )));
        }
    }

    let mut card_ids = HashSet::new();
    for card in &board.cards {
        if !card_ids.insert(card.id.as_str()) {
            return Err(EngineError::validation(format!(
                "Duplicate card id '{}'",
                card.id
            )));
        }
        if !column_ids.contains(card.column_id.as_str()) {
            return Err(EngineError::missing_column(&card.column_id));
        }
    }
    Ok(())
}
