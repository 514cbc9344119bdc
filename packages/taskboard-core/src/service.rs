/// Board operations with persistence.
///
/// Every mutating call runs load → backup → mutate → save against the
/// store. A failed backup is logged and the mutation still proceeds.
/// Nothing locks the board between load and save.
use std::path::PathBuf;

use chrono::Utc;

use crate::config::{EngineConfig, EngineLimits};
use crate::engine::batch::{self, BatchOperation, BatchResult, DecodedOperation};
use crate::engine::cards::{self, CardDraft, CardPatch};
use crate::engine::position::PositionSpec;
use crate::error::{EngineError, Result};
use crate::format::{self, BoardFormat, FormatOptions, Projection};
use crate::migrate::{self, MigrationOutcome};
use crate::payload::Payload;
use crate::storage::backup::BackupManager;
use crate::storage::local::LocalBoardStore;
use crate::storage::BoardStore;
use crate::template;
use crate::types::{check_positions, Board, BoardInfo, BoardShape, Card};

pub struct BoardService<S: BoardStore> {
    store: S,
    backups: BackupManager,
    limits: EngineLimits,
}

impl BoardService<LocalBoardStore> {
    /// Open a file-backed service rooted at `config.boards_dir`.
    pub fn open(config: &EngineConfig) -> Result<Self> {
        let store = LocalBoardStore::open(&config.boards_dir, config.limits.clone())?;
        let backups = BackupManager::beside(&config.boards_dir);
        Ok(Self::new(store, backups, config.limits.clone()))
    }
}

impl<S: BoardStore> BoardService<S> {
    pub fn new(store: S, backups: BackupManager, limits: EngineLimits) -> Self {
        Self {
            store,
            backups,
            limits,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    pub fn limits(&self) -> &EngineLimits {
        &self.limits
    }

    pub fn list_boards(&self) -> Vec<BoardInfo> {
        self.store.list_boards()
    }

    pub fn load_document(&self, board_id: &str) -> Result<BoardShape> {
        self.store.load_board(board_id)
    }

    /// Load a board that card operations can run against.
    pub fn load_board(&self, board_id: &str) -> Result<Board> {
        match self.store.load_board(board_id)? {
            BoardShape::Flat(board) => Ok(board),
            BoardShape::Legacy(_) => Err(legacy_error(board_id)),
        }
    }

    /// Stamp `lastUpdated` and persist.
    pub fn save_board(&self, board: &mut Board) -> Result<()> {
        board.last_updated = Utc::now();
        self.store.save_board(board)
    }

    /// Snapshot the stored document for `board_id` as it is on disk.
    pub fn create_backup(&self, board_id: &str, label: &str) -> Result<PathBuf> {
        let raw = self.store.load_raw(board_id)?;
        self.backups.create_backup(board_id, &raw, label)
    }

    /// Backup that never blocks the mutation it precedes.
    fn snapshot(&self, board_id: &str, raw: &str, label: &str) -> Option<PathBuf> {
        match self.backups.create_backup(board_id, raw, label) {
            Ok(path) => Some(path),
            Err(e) => {
                log::warn!(
                    "[taskboard.backup] Backup '{}' of board {} failed, continuing: {}",
                    label,
                    board_id,
                    e
                );
                None
            }
        }
    }

    /// Load, back up, apply `mutation`, and save once.
    fn mutate<T>(
        &self,
        board_id: &str,
        label: &str,
        mutation: impl FnOnce(&mut Board, &EngineLimits) -> Result<T>,
    ) -> Result<T> {
        let raw = self.store.load_raw(board_id)?;
        let document = self.store.parse_document(board_id, &raw)?;
        if document.is_legacy() {
            return Err(legacy_error(board_id));
        }
        self.snapshot(board_id, &raw, label);

        let mut board = match document {
            BoardShape::Flat(board) => board,
            BoardShape::Legacy(_) => return Err(legacy_error(board_id)),
        };
        let out = mutation(&mut board, &self.limits)?;
        self.save_board(&mut board)?;
        Ok(out)
    }

    pub fn create_board(&self, name: &str, column_names: &[&str]) -> Result<Board> {
        let mut board = template::new_board(name, column_names);
        self.insert_new_board(&mut board)?;
        Ok(board)
    }

    /// Create a new board by cloning a stored template board.
    pub fn create_board_from_template(&self, template_id: &str, name: &str) -> Result<Board> {
        let template = self.load_board(template_id)?;
        let mut board = template::clone_template(&template, name);
        self.insert_new_board(&mut board)?;
        log::info!(
            "[taskboard.storage] Board {} created from template {}",
            board.id,
            template_id
        );
        Ok(board)
    }

    /// Store a complete board supplied by a caller.
    pub fn import_board(&self, payload: &Payload) -> Result<Board> {
        let mut board: Board = payload.resolve("board", self.limits.max_board_payload_chars)?;
        if let Err(gap) = check_positions(&board) {
            return Err(EngineError::validation(format!(
                "Column '{}' has non-contiguous positions {:?}",
                gap.column_id, gap.positions
            )));
        }
        self.insert_new_board(&mut board)?;
        Ok(board)
    }

    fn insert_new_board(&self, board: &mut Board) -> Result<()> {
        if self.store.exists(&board.id) {
            return Err(EngineError::validation(format!(
                "Board '{}' already exists",
                board.id
            )));
        }
        self.save_board(board)
    }

    /// Delete a board after taking a `pre-delete` snapshot. Returns the
    /// snapshot path when the backup succeeded.
    pub fn delete_board(&self, board_id: &str) -> Result<Option<PathBuf>> {
        let raw = self.store.load_raw(board_id)?;
        let backup = self.snapshot(board_id, &raw, "pre-delete");
        self.store.delete_board(board_id)?;
        Ok(backup)
    }

    pub fn create_card(
        &self,
        board_id: &str,
        column_id: Option<&str>,
        payload: Option<&Payload>,
        position: Option<PositionSpec>,
    ) -> Result<Card> {
        let draft: CardDraft = match payload {
            Some(p) => p.resolve("card", self.limits.max_card_payload_chars)?,
            None => CardDraft::default(),
        };
        self.mutate(board_id, "pre-create", |board, limits| {
            cards::create_card(board, limits, column_id, draft, position)
        })
    }

    pub fn update_card(&self, board_id: &str, card_id: &str, patch: &Payload) -> Result<Card> {
        let patch: CardPatch = patch.resolve("patch", self.limits.max_card_payload_chars)?;
        self.mutate(board_id, "pre-update", |board, limits| {
            cards::update_card(board, limits, card_id, &patch)
        })
    }

    pub fn move_card(
        &self,
        board_id: &str,
        card_id: &str,
        column_id: &str,
        position: PositionSpec,
    ) -> Result<Card> {
        self.mutate(board_id, "pre-move", |board, _| {
            cards::move_card(board, card_id, column_id, position)
        })
    }

    pub fn delete_card(&self, board_id: &str, card_id: &str) -> Result<Card> {
        self.mutate(board_id, "pre-delete-card", |board, _| {
            cards::delete_card(board, card_id)
        })
    }

    /// Apply a batch and persist the outcome once, whatever subset succeeded.
    pub fn apply_batch(&self, board_id: &str, operations: &[BatchOperation]) -> Result<BatchResult> {
        let entries: Vec<DecodedOperation> = operations.iter().cloned().map(Ok).collect();
        self.apply_entries(board_id, &entries)
    }

    /// Decode a caller-supplied operation list and apply it. Operations that
    /// fail to decode are reported in place; the rest still run.
    pub fn apply_batch_payload(&self, board_id: &str, payload: &Payload) -> Result<BatchResult> {
        let entries = batch::parse_operations(payload, &self.limits)?;
        self.apply_entries(board_id, &entries)
    }

    fn apply_entries(&self, board_id: &str, entries: &[DecodedOperation]) -> Result<BatchResult> {
        batch::check_batch_size(entries.len(), &self.limits)?;
        self.mutate(board_id, "pre-batch", |board, limits| {
            batch::apply_decoded(board, limits, entries)
        })
    }

    pub fn format_board(
        &self,
        board_id: &str,
        format: BoardFormat,
        options: &FormatOptions,
    ) -> Result<Projection> {
        let board = self.load_board(board_id)?;
        format::format_board(&board, format, options)
    }

    /// Convert a legacy document to the flat layout and save it. A board
    /// that is already flat is returned untouched.
    pub fn migrate_board(&self, board_id: &str) -> Result<MigrationOutcome> {
        let raw = self.store.load_raw(board_id)?;
        let document = self.store.parse_document(board_id, &raw)?;
        if !document.is_legacy() {
            log::info!("[taskboard.migrate] Board {} already migrated", board_id);
            return Ok(migrate::migrate(document));
        }

        self.snapshot(board_id, &raw, "pre-migrate");
        let mut outcome = migrate::migrate(document);
        if let MigrationOutcome::Migrated {
            board,
            cards_migrated,
        } = &mut outcome
        {
            self.save_board(board)?;
            log::info!(
                "[taskboard.migrate] Board {} migrated ({} cards)",
                board_id,
                cards_migrated
            );
        }
        Ok(outcome)
    }
}

fn legacy_error(board_id: &str) -> EngineError {
    EngineError::Architecture(format!(
        "board {} must be migrated before card operations",
        board_id
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        service: BoardService<LocalBoardStore>,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig {
            boards_dir: dir.path().join("boards"),
            limits: EngineLimits::default(),
        };
        let service = BoardService::open(&config).unwrap();
        Fixture { _dir: dir, service }
    }

    fn column_ids(board: &Board) -> Vec<String> {
        board.columns.iter().map(|c| c.id.clone()).collect()
    }

    fn card_payload(title: &str) -> Payload {
        Payload::from(json!({ "title": title }))
    }

    fn seed_column(
        service: &BoardService<LocalBoardStore>,
        board_id: &str,
        column: &str,
        titles: &[&str],
    ) -> Vec<String> {
        titles
            .iter()
            .map(|t| {
                service
                    .create_card(board_id, Some(column), Some(&card_payload(t)), None)
                    .unwrap()
                    .id
            })
            .collect()
    }

    fn place(board: &Board, card_id: &str) -> (String, usize) {
        let c = board.find_card(card_id).unwrap();
        (c.column_id.clone(), c.position)
    }

    fn legacy_board(service: &BoardService<LocalBoardStore>, id: &str) {
        let doc = json!({
            "id": id,
            "name": "Legacy",
            "columns": [
                { "id": "todo", "name": "Todo", "cards": [
                    { "id": "l1", "title": "one" }, { "id": "l2", "title": "two" }
                ]},
                { "id": "doing", "name": "Doing", "items": [ { "id": "l3", "title": "three" } ] },
                { "id": "done", "name": "Done", "cards": [] }
            ]
        });
        fs::write(service.store().board_path(id), doc.to_string()).unwrap();
    }

    #[test]
    fn test_same_column_move_persists() {
        let fx = fixture();
        let board = fx.service.create_board("Moves", &["Todo"]).unwrap();
        let col = column_ids(&board)[0].clone();
        let ids = seed_column(&fx.service, &board.id, &col, &["c1", "c2", "c3"]);

        fx.service
            .move_card(&board.id, &ids[0], &col, PositionSpec::Index(2))
            .unwrap();

        let saved = fx.service.load_board(&board.id).unwrap();
        assert_eq!(place(&saved, &ids[1]).1, 0);
        assert_eq!(place(&saved, &ids[2]).1, 1);
        assert_eq!(place(&saved, &ids[0]).1, 2);
    }

    #[test]
    fn test_batch_reference_move_persists() {
        let fx = fixture();
        let board = fx.service.create_board("Refs", &["A", "B"]).unwrap();
        let cols = column_ids(&board);
        let existing = seed_column(&fx.service, &board.id, &cols[1], &["b1", "b2"]);

        let ops: Vec<BatchOperation> = serde_json::from_value(json!([
            { "type": "create", "columnId": cols[0], "data": { "title": "X" }, "reference": "x", "position": "last" },
            { "type": "move", "cardId": "$ref:x", "columnId": cols[1], "position": "first" }
        ]))
        .unwrap();
        let result = fx.service.apply_batch(&board.id, &ops).unwrap();
        assert!(result.success);

        let x = result.results[0].card.as_ref().unwrap().id.clone();
        let saved = fx.service.load_board(&board.id).unwrap();
        assert_eq!(place(&saved, &x), (cols[1].clone(), 0));
        assert_eq!(place(&saved, &existing[0]).1, 1);
        assert_eq!(place(&saved, &existing[1]).1, 2);
    }

    #[test]
    fn test_batch_partial_failure_persists_successes() {
        let fx = fixture();
        let board = fx.service.create_board("Partial", &["Todo"]).unwrap();
        let ops: Vec<BatchOperation> = serde_json::from_value(json!([
            { "type": "create", "data": { "title": "A" } },
            { "type": "create", "columnId": "col-missing", "data": { "title": "B" } }
        ]))
        .unwrap();

        let result = fx.service.apply_batch(&board.id, &ops).unwrap();
        assert!(!result.success);
        assert!(result.results[0].success);
        assert!(!result.results[1].success);
        assert!(result.results[1].message.as_ref().unwrap().contains("does not exist"));

        let saved = fx.service.load_board(&board.id).unwrap();
        assert_eq!(saved.cards.len(), 1);
        assert_eq!(saved.cards[0].title, "A");
    }

    #[test]
    fn test_migrate_then_noop() {
        let fx = fixture();
        legacy_board(&fx.service, "legacy");

        let outcome = fx.service.migrate_board("legacy").unwrap();
        assert!(outcome.was_migrated());
        let board = fx.service.load_board("legacy").unwrap();
        assert_eq!(board.cards.len(), 3);
        assert_eq!(place(&board, "l1"), ("todo".to_string(), 0));
        assert_eq!(place(&board, "l2"), ("todo".to_string(), 1));
        assert_eq!(place(&board, "l3"), ("doing".to_string(), 0));

        let path = fx.service.store().board_path("legacy");
        let before = fs::read_to_string(&path).unwrap();
        let backups_before = fx.service.backups().list_backups("legacy").unwrap().len();

        let again = fx.service.migrate_board("legacy").unwrap();
        assert!(!again.was_migrated());
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
        assert_eq!(
            fx.service.backups().list_backups("legacy").unwrap().len(),
            backups_before
        );
    }

    #[test]
    fn test_backup_keeps_stored_document_verbatim() {
        let fx = fixture();
        let doc = json!({
            "id": "old",
            "name": "Old",
            "columns": [{
                "id": "todo",
                "name": "Todo",
                "color": "red",
                "items": [{ "id": "a", "title": "A", "priority": "high" }]
            }]
        })
        .to_string();
        fs::write(fx.service.store().board_path("old"), &doc).unwrap();

        assert!(fx.service.load_document("old").unwrap().is_legacy());
        let path = fx.service.create_backup("old", "manual").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), doc);
        assert_eq!(fx.service.backups().list_backups("old").unwrap(), vec![path]);

        fx.service.migrate_board("old").unwrap();
        let snapshots = fx.service.backups().list_backups("old").unwrap();
        assert_eq!(snapshots.len(), 2);
        assert!(snapshots[1].to_string_lossy().contains("pre-migrate"));
        let pre_migrate = fs::read_to_string(&snapshots[1]).unwrap();
        assert!(pre_migrate.contains("\"priority\":\"high\""));
        assert!(pre_migrate.contains("\"items\""));
    }

    #[test]
    fn test_create_backup_of_missing_board() {
        let fx = fixture();
        let err = fx.service.create_backup("ghost", "manual").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_batch_payload_isolates_bad_operations() {
        let fx = fixture();
        let board = fx.service.create_board("Payload", &["Todo"]).unwrap();
        let payload = Payload::from(json!([
            { "type": "create", "data": { "title": "A" }, "reference": "a" },
            { "type": "move", "cardId": "$ref:a", "position": "sideways" },
            { "type": "teleport", "cardId": "$ref:a" }
        ]));

        let result = fx.service.apply_batch_payload(&board.id, &payload).unwrap();
        assert!(!result.success);
        assert!(result.results[0].success);
        assert!(!result.results[1].success);
        assert!(!result.results[2].success);

        let saved = fx.service.load_board(&board.id).unwrap();
        assert_eq!(saved.cards.len(), 1);
        assert_eq!(saved.cards[0].title, "A");
    }

    #[test]
    fn test_card_operations_on_legacy_board_fail() {
        let fx = fixture();
        legacy_board(&fx.service, "legacy");
        let err = fx
            .service
            .create_card("legacy", Some("todo"), None, None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Architecture);
        let err = fx
            .service
            .format_board("legacy", BoardFormat::Summary, &FormatOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Architecture);
    }

    #[test]
    fn test_mutations_take_backups() {
        let fx = fixture();
        let board = fx.service.create_board("Backups", &["Todo", "Done"]).unwrap();
        let cols = column_ids(&board);
        assert!(fx.service.backups().list_backups(&board.id).unwrap().is_empty());

        let card = fx
            .service
            .create_card(&board.id, None, Some(&card_payload("T")), None)
            .unwrap();
        fx.service
            .update_card(&board.id, &card.id, &Payload::from(r#"{"content":"body"}"#))
            .unwrap();
        fx.service
            .move_card(&board.id, &card.id, &cols[1], PositionSpec::First)
            .unwrap();

        let snapshots = fx.service.backups().list_backups(&board.id).unwrap();
        assert_eq!(snapshots.len(), 3);
        // The pre-move snapshot still shows the card in its first column.
        let pre_move = snapshots
            .iter()
            .find(|p| p.to_string_lossy().contains("pre-move"))
            .unwrap();
        match fx.service.backups().read_backup(pre_move).unwrap() {
            BoardShape::Flat(old) => assert_eq!(place(&old, &card.id).0, cols[0]),
            BoardShape::Legacy(_) => panic!("expected flat snapshot"),
        }
    }

    #[test]
    fn test_failed_operation_does_not_save() {
        let fx = fixture();
        let board = fx.service.create_board("Fail", &["Todo"]).unwrap();
        let path = fx.service.store().board_path(&board.id);
        let before = fs::read_to_string(&path).unwrap();

        let err = fx
            .service
            .move_card(&board.id, "card-missing", &board.columns[0].id, PositionSpec::First)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn test_summary_counts_match_cards() {
        let fx = fixture();
        let board = fx.service.create_board("Stats", &["Todo", "Done"]).unwrap();
        let cols = column_ids(&board);
        let ids = seed_column(&fx.service, &board.id, &cols[0], &["a", "b", "c", "d"]);
        fx.service
            .update_card(
                &board.id,
                &ids[0],
                &Payload::from(json!({ "completedAt": "2024-02-02T00:00:00Z", "columnId": cols[1] })),
            )
            .unwrap();

        match fx
            .service
            .format_board(&board.id, BoardFormat::Summary, &FormatOptions::default())
            .unwrap()
        {
            Projection::Summary(summary) => {
                assert_eq!(summary.stats.total_cards, 4);
                assert_eq!(summary.stats.completed_cards, 1);
                assert_eq!(summary.stats.progress_percentage, 25);
                assert_eq!(summary.columns[0].card_count, 3);
                assert_eq!(summary.columns[1].card_count, 1);
            }
            other => panic!("unexpected projection {:?}", other),
        }
    }

    #[test]
    fn test_board_from_template() {
        let fx = fixture();
        let template = fx.service.create_board("Template", &["Backlog", "Doing"]).unwrap();
        let ids = seed_column(&fx.service, &template.id, &template.columns[0].id, &["Plan", "Build"]);
        fx.service
            .update_card(
                &template.id,
                &ids[1],
                &Payload::from(json!({ "dependencies": [ids[0].clone()], "completedAt": "2024-01-01T00:00:00Z" })),
            )
            .unwrap();

        let board = fx
            .service
            .create_board_from_template(&template.id, "Sprint 7")
            .unwrap();
        assert_ne!(board.id, template.id);
        let reloaded = fx.service.load_board(&board.id).unwrap();
        assert_eq!(reloaded.cards.len(), 2);
        assert!(reloaded.cards.iter().all(|c| !ids.contains(&c.id)));
        assert!(reloaded.cards.iter().all(|c| c.completed_at.is_none()));
        let plan = reloaded.cards.iter().find(|c| c.title == "Plan").unwrap();
        let build = reloaded.cards.iter().find(|c| c.title == "Build").unwrap();
        assert_eq!(build.dependencies, vec![plan.id.clone()]);
    }

    #[test]
    fn test_delete_board_with_backup() {
        let fx = fixture();
        let board = fx.service.create_board("Doomed", &["Todo"]).unwrap();
        let backup = fx.service.delete_board(&board.id).unwrap();
        assert!(backup.unwrap().exists());
        assert_eq!(
            fx.service.load_board(&board.id).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert!(fx.service.list_boards().is_empty());
    }

    #[test]
    fn test_delete_card_keeps_dependents() {
        let fx = fixture();
        let board = fx.service.create_board("Deps", &["Todo"]).unwrap();
        let col = board.columns[0].id.clone();
        let ids = seed_column(&fx.service, &board.id, &col, &["a", "b", "c"]);
        fx.service
            .update_card(&board.id, &ids[2], &Payload::from(json!({ "dependencies": [ids[0].clone()] })))
            .unwrap();

        fx.service.delete_card(&board.id, &ids[0]).unwrap();
        let saved = fx.service.load_board(&board.id).unwrap();
        assert_eq!(place(&saved, &ids[1]).1, 0);
        assert_eq!(place(&saved, &ids[2]).1, 1);
        assert_eq!(saved.find_card(&ids[2]).unwrap().dependencies, vec![ids[0].clone()]);
    }

    #[test]
    fn test_import_board() {
        let fx = fixture();
        let payload = Payload::from(json!({
            "id": "imported",
            "name": "Imported",
            "columns": [{ "id": "todo", "name": "Todo" }],
            "cards": [{
                "id": "c1", "title": "T", "columnId": "todo", "position": 0,
                "createdAt": "2024-01-01T00:00:00Z", "updatedAt": "2024-01-01T00:00:00Z"
            }],
            "lastUpdated": "2024-01-01T00:00:00Z"
        }));
        let board = fx.service.import_board(&payload).unwrap();
        assert_eq!(board.cards.len(), 1);
        assert_eq!(fx.service.import_board(&payload).unwrap_err().kind(), ErrorKind::Validation);

        let gap = Payload::from(json!({
            "id": "gappy",
            "name": "Gappy",
            "columns": [{ "id": "todo", "name": "Todo" }],
            "cards": [{
                "id": "c1", "title": "T", "columnId": "todo", "position": 3,
                "createdAt": "2024-01-01T00:00:00Z", "updatedAt": "2024-01-01T00:00:00Z"
            }],
            "lastUpdated": "2024-01-01T00:00:00Z"
        }));
        assert!(fx.service.import_board(&gap).is_err());
    }

    #[test]
    fn test_concurrent_load_save_last_writer_wins() {
        let fx = fixture();
        let board = fx.service.create_board("Race", &["Todo"]).unwrap();

        let mut first = fx.service.load_board(&board.id).unwrap();
        let mut second = fx.service.load_board(&board.id).unwrap();
        first.name = "First".to_string();
        second.name = "Second".to_string();
        fx.service.save_board(&mut first).unwrap();
        fx.service.save_board(&mut second).unwrap();

        assert_eq!(fx.service.load_board(&board.id).unwrap().name, "Second");
    }

    #[test]
    fn test_oversized_batch_rejected_before_load() {
        let fx = fixture();
        let ops = vec![
            BatchOperation::Create {
                column_id: None,
                data: None,
                position: None,
                reference: None,
            };
            EngineLimits::default().max_batch_operations + 1
        ];
        let err = fx.service.apply_batch("no-such-board", &ops).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
