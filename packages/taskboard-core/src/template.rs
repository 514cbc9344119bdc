/// Board creation: blank boards and boards cloned from a template.
use std::collections::HashMap;

use chrono::Utc;

use crate::identity;
use crate::types::{Board, Column};

pub const DEFAULT_COLUMNS: &[&str] = &["To Do", "In Progress", "Done"];

/// A new empty board with one column per name, in order.
pub fn new_board(name: &str, column_names: &[&str]) -> Board {
    Board {
        id: identity::board_id(),
        name: name.to_string(),
        columns: column_names
            .iter()
            .map(|column_name| Column {
                id: identity::column_id(),
                name: column_name.to_string(),
                wip_limit: None,
            })
            .collect(),
        cards: Vec::new(),
        last_updated: Utc::now(),
    }
}

/// Clone `template` under a new name. Every column and card gets a fresh
/// id; `columnId` and `dependencies` are rewritten through the same map.
/// Dependencies that point outside the template are kept as written.
/// Completion and blocked stamps are cleared.
pub fn clone_template(template: &Board, name: &str) -> Board {
    let now = Utc::now();
    let mut id_map: HashMap<&str, String> = HashMap::new();
    for column in &template.columns {
        id_map.insert(column.id.as_str(), identity::column_id());
    }
    for card in &template.cards {
        id_map.insert(card.id.as_str(), identity::card_id());
    }
    let remap = |id: &str| id_map.get(id).cloned().unwrap_or_else(|| id.to_string());

    let columns = template
        .columns
        .iter()
        .map(|column| Column {
            id: remap(&column.id),
            name: column.name.clone(),
            wip_limit: column.wip_limit,
        })
        .collect();

    let cards = template
        .cards
        .iter()
        .map(|card| {
            let mut copy = card.clone();
            copy.id = remap(&card.id);
            copy.column_id = remap(&card.column_id);
            copy.dependencies = card.dependencies.iter().map(|d| remap(d)).collect();
            copy.created_at = now;
            copy.updated_at = now;
            copy.completed_at = None;
            copy.blocked_at = None;
            copy
        })
        .collect();

    Board {
        id: identity::board_id(),
        name: name.to_string(),
        columns,
        cards,
        last_updated: now,
    }
}
