/// Read-only board projections for consumers with size constraints.
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::types::{Board, Card};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BoardFormat {
    #[default]
    Full,
    Summary,
    Compact,
    CardsOnly,
}

impl FromStr for BoardFormat {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "full" => Ok(BoardFormat::Full),
            "summary" => Ok(BoardFormat::Summary),
            "compact" => Ok(BoardFormat::Compact),
            "cards-only" => Ok(BoardFormat::CardsOnly),
            other => Err(EngineError::validation(format!(
                "Unknown board format '{}': expected full, summary, compact or cards-only",
                other
            ))),
        }
    }
}

impl fmt::Display for BoardFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BoardFormat::Full => "full",
            BoardFormat::Summary => "summary",
            BoardFormat::Compact => "compact",
            BoardFormat::CardsOnly => "cards-only",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FormatOptions {
    /// Only used by `cards-only`: restrict output to one column.
    pub column_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSummary {
    pub id: String,
    pub name: String,
    pub card_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardStats {
    pub total_cards: usize,
    pub completed_cards: usize,
    pub progress_percentage: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSummary {
    pub id: String,
    pub name: String,
    pub last_updated: DateTime<Utc>,
    pub columns: Vec<ColumnSummary>,
    pub stats: BoardStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompactColumn {
    pub i: String,
    pub n: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub w: Option<u32>,
}

/// Compact card: tags, subtasks and `blockedAt` are left out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompactCard {
    pub i: String,
    pub t: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub c: Option<String>,
    pub col: String,
    pub p: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub d: Vec<String>,
    pub ca: DateTime<Utc>,
    pub ua: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub da: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompactBoard {
    pub i: String,
    pub n: String,
    pub u: DateTime<Utc>,
    pub cols: Vec<CompactColumn>,
    pub cards: Vec<CompactCard>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardView {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub column_id: String,
    pub position: usize,
    pub dependencies: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&Card> for CardView {
    fn from(card: &Card) -> Self {
        CardView {
            id: card.id.clone(),
            title: card.title.clone(),
            content: card.content.clone(),
            column_id: card.column_id.clone(),
            position: card.position,
            dependencies: card.dependencies.clone(),
            created_at: card.created_at,
            updated_at: card.updated_at,
            completed_at: card.completed_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Projection {
    Full(Board),
    Summary(BoardSummary),
    Compact(CompactBoard),
    CardsOnly(Vec<CardView>),
}

/// `round(completed / total * 100)`, 0 for an empty board.
pub fn progress_percentage(completed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (completed as f64 / total as f64 * 100.0).round() as u32
}

pub fn summarize(board: &Board) -> BoardSummary {
    let total = board.cards.len();
    let completed = board.completed_card_count();
    BoardSummary {
        id: board.id.clone(),
        name: board.name.clone(),
        last_updated: board.last_updated,
        columns: board
            .columns
            .iter()
            .map(|col| ColumnSummary {
                id: col.id.clone(),
                name: col.name.clone(),
                card_count: board.column_card_count(&col.id),
            })
            .collect(),
        stats: BoardStats {
            total_cards: total,
            completed_cards: completed,
            progress_percentage: progress_percentage(completed, total),
        },
    }
}

pub fn compact(board: &Board) -> CompactBoard {
    CompactBoard {
        i: board.id.clone(),
        n: board.name.clone(),
        u: board.last_updated,
        cols: board
            .columns
            .iter()
            .map(|col| CompactColumn {
                i: col.id.clone(),
                n: col.name.clone(),
                w: col.wip_limit,
            })
            .collect(),
        cards: board
            .cards
            .iter()
            .map(|card| CompactCard {
                i: card.id.clone(),
                t: card.title.clone(),
                c: card.content.clone(),
                col: card.column_id.clone(),
                p: card.position,
                d: card.dependencies.clone(),
                ca: card.created_at,
                ua: card.updated_at,
                da: card.completed_at,
            })
            .collect(),
    }
}

/// Cards in board order, optionally limited to one existing column.
pub fn cards_only(board: &Board, column_id: Option<&str>) -> Result<Vec<CardView>> {
    if let Some(id) = column_id {
        if !board.has_column(id) {
            return Err(EngineError::column_not_found(id));
        }
    }
    Ok(board
        .cards
        .iter()
        .filter(|c| column_id.is_none_or(|id| c.column_id == id))
        .map(CardView::from)
        .collect())
}

pub fn format_board(board: &Board, format: BoardFormat, options: &FormatOptions) -> Result<Projection> {
    Ok(match format {
        BoardFormat::Full => Projection::Full(board.clone()),
        BoardFormat::Summary => Projection::Summary(summarize(board)),
        BoardFormat::Compact => Projection::Compact(compact(board)),
        BoardFormat::CardsOnly => {
            Projection::CardsOnly(cards_only(board, options.column_id.as_deref())?)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::cards::tests::board_with;
    use crate::engine::position::tests::card;

    fn sample() -> Board {
        let mut done = card("c3", "done", 0);
        done.completed_at = Some(Utc::now());
        done.tags = vec!["release".to_string()];
        let mut first = card("c1", "todo", 0);
        first.content = Some("details".to_string());
        first.dependencies = vec!["c3".to_string()];
        board_with(&["todo", "done"], vec![first, card("c2", "todo", 1), done])
    }

    #[test]
    fn test_parse_format_names() {
        assert_eq!("cards-only".parse::<BoardFormat>().unwrap(), BoardFormat::CardsOnly);
        assert_eq!(BoardFormat::Summary.to_string(), "summary");
        assert!("tiny".parse::<BoardFormat>().is_err());
    }

    #[test]
    fn test_progress_percentage() {
        assert_eq!(progress_percentage(0, 0), 0);
        assert_eq!(progress_percentage(1, 3), 33);
        assert_eq!(progress_percentage(2, 3), 67);
        assert_eq!(progress_percentage(1, 8), 13);
        assert_eq!(progress_percentage(4, 4), 100);
    }

    #[test]
    fn test_summary() {
        let board = sample();
        let summary = summarize(&board);
        assert_eq!(summary.stats.total_cards, board.cards.len());
        assert_eq!(summary.stats.completed_cards, 1);
        assert_eq!(summary.stats.progress_percentage, 33);
        assert_eq!(summary.columns[0].card_count, 2);
        assert_eq!(summary.columns[1].card_count, 1);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["stats"]["totalCards"], 3);
        assert_eq!(json["columns"][0]["cardCount"], 2);
    }

    #[test]
    fn test_compact_keeps_included_fields() {
        let board = sample();
        let compact = compact(&board);
        assert_eq!(compact.cards.len(), 3);
        assert_eq!(compact.cards[0].c.as_deref(), Some("details"));
        assert_eq!(compact.cards[0].d, vec!["c3"]);
        assert!(compact.cards[2].da.is_some());

        let json = serde_json::to_value(&compact).unwrap();
        assert_eq!(json["cards"][1]["col"], "todo");
        assert!(json["cards"][2].get("tags").is_none());
    }

    #[test]
    fn test_cards_only_filter() {
        let board = sample();
        let all = cards_only(&board, None).unwrap();
        assert_eq!(all.len(), 3);
        let todo = cards_only(&board, Some("todo")).unwrap();
        assert_eq!(todo.len(), 2);
        assert!(todo.iter().all(|c| c.column_id == "todo"));
        assert!(cards_only(&board, Some("ghost")).is_err());
    }

    #[test]
    fn test_format_is_pure_and_repeatable() {
        let board = sample();
        let before = board.clone();
        for format in [
            BoardFormat::Full,
            BoardFormat::Summary,
            BoardFormat::Compact,
            BoardFormat::CardsOnly,
        ] {
            let options = FormatOptions::default();
            let a = format_board(&board, format, &options).unwrap();
            let b = format_board(&board, format, &options).unwrap();
            assert_eq!(a, b);
            assert_eq!(
                serde_json::to_string(&a).unwrap(),
                serde_json::to_string(&b).unwrap()
            );
        }
        assert_eq!(board, before);
    }

    #[test]
    fn test_full_is_board() {
        let board = sample();
        match format_board(&board, BoardFormat::Full, &FormatOptions::default()).unwrap() {
            Projection::Full(out) => assert_eq!(out, board),
            other => panic!("unexpected projection {:?}", other),
        }
    }
}
