/// Ordered, partial-failure-tolerant batch application.
///
/// Pass one runs every `create` in array order and records aliases; pass two
/// runs `update` and `move` in their original relative order, so they can
/// address cards created anywhere in the batch through `$ref:<alias>`.
/// A failing operation is reported and skipped; its siblings still run.
/// Created cards are inserted into the working board as soon as they are
/// staged, so later creates rank against them and pass two can find them.
use serde::{Deserialize, Serialize};

use super::cards::{self, CardDraft, CardPatch};
use super::position::PositionSpec;
use super::reference::ReferenceResolver;
use crate::config::EngineLimits;
use crate::error::{EngineError, Result};
use crate::payload::Payload;
use crate::types::{Board, Card};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BatchOperation {
    #[serde(rename_all = "camelCase")]
    Create {
        #[serde(default)]
        column_id: Option<String>,
        #[serde(default)]
        data: Option<Payload>,
        #[serde(default)]
        position: Option<PositionSpec>,
        #[serde(default)]
        reference: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Update { card_id: String, data: Payload },
    #[serde(rename_all = "camelCase")]
    Move {
        card_id: String,
        /// Defaults to the card's current column.
        #[serde(default)]
        column_id: Option<String>,
        #[serde(default)]
        position: PositionSpec,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Update,
    Move,
}

impl BatchOperation {
    pub fn kind(&self) -> OperationKind {
        match self {
            BatchOperation::Create { .. } => OperationKind::Create,
            BatchOperation::Update { .. } => OperationKind::Update,
            BatchOperation::Move { .. } => OperationKind::Move,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    pub index: usize,
    /// `None` when the operation's `type` was missing or unrecognized.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<OperationKind>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card: Option<Card>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    /// One entry per operation, in operation-array order.
    pub results: Vec<OperationResult>,
    /// True only when every operation succeeded.
    pub success: bool,
}

impl BatchResult {
    pub fn succeeded_count(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }
}

/// An operation that could not be decoded. It keeps its slot so the
/// failure is reported at its index.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedOperation {
    pub kind: Option<OperationKind>,
    pub message: String,
}

pub type DecodedOperation = std::result::Result<BatchOperation, RejectedOperation>;

/// Decode an operation list from caller input. Only the outer list can fail
/// as a whole; each element is decoded on its own.
pub fn parse_operations(payload: &Payload, limits: &EngineLimits) -> Result<Vec<DecodedOperation>> {
    let raw: Vec<serde_json::Value> = payload.resolve("batch", limits.max_board_payload_chars)?;
    Ok(raw.into_iter().map(decode_operation).collect())
}

fn decode_operation(value: serde_json::Value) -> DecodedOperation {
    let kind = value
        .get("type")
        .cloned()
        .and_then(|t| serde_json::from_value::<OperationKind>(t).ok());
    serde_json::from_value(value).map_err(|e| RejectedOperation {
        kind,
        message: EngineError::validation(format!("Invalid operation: {}", e)).to_string(),
    })
}

pub fn check_batch_size(len: usize, limits: &EngineLimits) -> Result<()> {
    if len > limits.max_batch_operations {
        return Err(EngineError::validation(format!(
            "Batch has {} operations, limit is {}",
            len, limits.max_batch_operations
        )));
    }
    Ok(())
}

/// Apply `operations` to `board`. Only a batch-level problem (too many
/// operations) is returned as an error; per-operation failures are reported
/// in the result.
pub fn apply_batch(
    board: &mut Board,
    limits: &EngineLimits,
    operations: &[BatchOperation],
) -> Result<BatchResult> {
    let entries: Vec<DecodedOperation> = operations.iter().cloned().map(Ok).collect();
    apply_decoded(board, limits, &entries)
}

/// `apply_batch` over decoded entries; rejected entries become failures in
/// their own slot.
pub fn apply_decoded(
    board: &mut Board,
    limits: &EngineLimits,
    entries: &[DecodedOperation],
) -> Result<BatchResult> {
    check_batch_size(entries.len(), limits)?;

    let mut refs = ReferenceResolver::new();
    let mut results: Vec<Option<OperationResult>> = vec![None; entries.len()];

    for (index, entry) in entries.iter().enumerate() {
        let op = match entry {
            Ok(op) => op,
            Err(rejected) => {
                results[index] = Some(reject(index, rejected));
                continue;
            }
        };
        if let BatchOperation::Create {
            column_id,
            data,
            position,
            reference,
        } = op
        {
            let outcome = apply_create(
                board,
                limits,
                &mut refs,
                column_id.as_deref(),
                data.as_ref(),
                *position,
                reference.as_deref(),
            );
            results[index] = Some(record(index, op.kind(), reference.clone(), outcome));
        }
    }

    for (index, entry) in entries.iter().enumerate() {
        let Ok(op) = entry else { continue };
        let outcome = match op {
            BatchOperation::Create { .. } => continue,
            BatchOperation::Update { card_id, data } => {
                apply_update(board, limits, &refs, card_id, data)
            }
            BatchOperation::Move {
                card_id,
                column_id,
                position,
            } => apply_move(board, &refs, card_id, column_id.as_deref(), *position),
        };
        results[index] = Some(record(index, op.kind(), None, outcome));
    }

    let results: Vec<OperationResult> = results.into_iter().flatten().collect();
    let success = results.iter().all(|r| r.success);
    let batch = BatchResult { results, success };

    log::info!(
        "[taskboard.batch] Board {}: {}/{} operations applied",
        board.id,
        batch.succeeded_count(),
        entries.len()
    );
    Ok(batch)
}

fn reject(index: usize, rejected: &RejectedOperation) -> OperationResult {
    log::warn!(
        "[taskboard.batch] Operation {} rejected: {}",
        index,
        rejected.message
    );
    OperationResult {
        index,
        kind: rejected.kind,
        success: false,
        reference: None,
        card: None,
        message: Some(rejected.message.clone()),
    }
}

fn record(
    index: usize,
    kind: OperationKind,
    reference: Option<String>,
    outcome: Result<Card>,
) -> OperationResult {
    match outcome {
        Ok(card) => OperationResult {
            index,
            kind: Some(kind),
            success: true,
            reference,
            card: Some(card),
            message: None,
        },
        Err(e) => {
            log::warn!(
                "[taskboard.batch] Operation {} ({:?}) failed: {}",
                index,
                kind,
                e
            );
            OperationResult {
                index,
                kind: Some(kind),
                success: false,
                reference,
                card: None,
                message: Some(e.to_string()),
            }
        }
    }
}

fn apply_create(
    board: &mut Board,
    limits: &EngineLimits,
    refs: &mut ReferenceResolver,
    column_id: Option<&str>,
    data: Option<&Payload>,
    position: Option<PositionSpec>,
    reference: Option<&str>,
) -> Result<Card> {
    if let Some(alias) = reference {
        refs.check_alias(alias)?;
    }

    let mut draft: CardDraft = match data {
        Some(payload) => payload.resolve("card", limits.max_card_payload_chars)?,
        None => CardDraft::default(),
    };
    draft.dependencies = refs.resolve_all(&draft.dependencies)?;

    let card = cards::create_card(board, limits, column_id, draft, position)?;
    if let Some(alias) = reference {
        refs.register(alias, &card.id);
    }
    log::debug!(
        "[taskboard.batch] Created {} in {} at {}",
        card.id,
        card.column_id,
        card.position
    );
    Ok(card)
}

fn apply_update(
    board: &mut Board,
    limits: &EngineLimits,
    refs: &ReferenceResolver,
    card_id: &str,
    data: &Payload,
) -> Result<Card> {
    let card_id = refs.resolve(card_id)?;
    let mut patch: CardPatch = data.resolve("patch", limits.max_card_payload_chars)?;
    if let Some(dependencies) = &patch.dependencies {
        patch.dependencies = Some(refs.resolve_all(dependencies)?);
    }
    cards::update_card(board, limits, &card_id, &patch)
}

fn apply_move(
    board: &mut Board,
    refs: &ReferenceResolver,
    card_id: &str,
    column_id: Option<&str>,
    position: PositionSpec,
) -> Result<Card> {
    let card_id = refs.resolve(card_id)?;
    let column_id = match column_id {
        Some(id) => id.to_string(),
        None => board
            .find_card(&card_id)
            .map(|c| c.column_id.clone())
            .ok_or_else(|| EngineError::card_not_found(card_id.as_str()))?,
    };
    cards::move_card(board, &card_id, &column_id, position)
}
