/// Legacy → flat board conversion.
///
/// Legacy documents nest cards inside each column. The flat layout keeps a
/// single card list where each card names its column and carries a
/// column-scoped position. Positions restart at 0 for every column and
/// follow the nested order.
use chrono::Utc;
use serde::Serialize;

use crate::identity;
use crate::types::{Board, BoardShape, Card, Column, LegacyBoard};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum MigrationOutcome {
    #[serde(rename_all = "camelCase")]
    Migrated { board: Board, cards_migrated: usize },
    AlreadyMigrated { board: Board },
}

impl MigrationOutcome {
    pub fn board(&self) -> &Board {
        match self {
            MigrationOutcome::Migrated { board, .. } => board,
            MigrationOutcome::AlreadyMigrated { board } => board,
        }
    }

    pub fn was_migrated(&self) -> bool {
        matches!(self, MigrationOutcome::Migrated { .. })
    }
}

pub fn migrate(shape: BoardShape) -> MigrationOutcome {
    match shape {
        BoardShape::Flat(board) => MigrationOutcome::AlreadyMigrated { board },
        BoardShape::Legacy(legacy) => {
            let cards_migrated = legacy.card_count();
            MigrationOutcome::Migrated {
                board: flatten(legacy),
                cards_migrated,
            }
        }
    }
}

/// Pull every nested card up into the board's card list.
pub fn flatten(legacy: LegacyBoard) -> Board {
    let now = Utc::now();
    let mut columns = Vec::with_capacity(legacy.columns.len());
    let mut cards = Vec::with_capacity(legacy.card_count());

    for column in legacy.columns {
        for (position, item) in column.cards.into_iter().enumerate() {
            let id = if item.id.trim().is_empty() {
                identity::card_id()
            } else {
                item.id
            };
            let created_at = item.created_at.unwrap_or(now);
            cards.push(Card {
                id,
                title: item.title,
                content: item.content,
                column_id: column.id.clone(),
                position,
                dependencies: item.dependencies,
                tags: item.tags,
                subtasks: item.subtasks,
                created_at,
                updated_at: item.updated_at.unwrap_or(created_at),
                completed_at: item.completed_at,
                blocked_at: item.blocked_at,
            });
        }
        columns.push(Column {
            id: column.id,
            name: column.name,
            wip_limit: column.wip_limit,
        });
    }

    Board {
        id: legacy.id,
        name: legacy.name,
        columns,
        cards,
        last_updated: legacy.last_updated.unwrap_or(now),
    }
}
