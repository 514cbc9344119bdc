/// Local filesystem storage backend.
///
/// Keeps one `<encoded board id>.json` document per board in a single
/// directory with:
/// - Atomic writes (write to .tmp, fsync, rename, fsync directory)
/// - Validation and size limits checked before every write
/// - Legacy/flat shape classification on every read
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{encode_board_id, validate_board, BoardStore};
use crate::config::EngineLimits;
use crate::error::{EngineError, Result};
use crate::types::{check_positions, Board, BoardInfo, BoardShape};

const BOARD_EXTENSION: &str = "json";

pub struct LocalBoardStore {
    dir: PathBuf,
    limits: EngineLimits,
}

impl LocalBoardStore {
    /// Open (creating if needed) a board directory.
    pub fn open(dir: impl Into<PathBuf>, limits: EngineLimits) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, limits })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn limits(&self) -> &EngineLimits {
        &self.limits
    }

    /// Path derived from the board id.
    pub fn board_path(&self, board_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", encode_board_id(board_id), BOARD_EXTENSION))
    }

    fn check_size(&self, board_id: &str, len: usize) -> Result<()> {
        if len > self.limits.max_board_payload_chars {
            return Err(EngineError::validation(format!(
                "Board {} is {} characters, limit is {}",
                board_id, len, self.limits.max_board_payload_chars
            )));
        }
        Ok(())
    }

    fn read_shape(&self, path: &Path) -> Result<BoardShape> {
        let content = fs::read_to_string(path)?;
        Self::parse_at(path, &content)
    }

    fn parse_at(path: &Path, content: &str) -> Result<BoardShape> {
        let value: serde_json::Value =
            serde_json::from_str(content).map_err(|source| EngineError::Document {
                path: path.to_path_buf(),
                source,
            })?;
        BoardShape::from_value(value).map_err(|source| EngineError::Document {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Atomic write with fsync: write to .tmp, fsync, rename, fsync directory.
    /// Refuses to write empty content over a non-empty file.
    fn atomic_write(path: &Path, content: &str) -> std::io::Result<()> {
        if content.trim().is_empty() {
            if let Ok(existing) = fs::read_to_string(path) {
                if !existing.trim().is_empty() {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "Refusing to overwrite non-empty file with empty content",
                    ));
                }
            }
        }

        let tmp_path = path.with_extension("taskboard.tmp");
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;

        if let Some(dir) = path.parent() {
            if let Ok(d) = fs::File::open(dir) {
                let _ = d.sync_all();
            }
        }
        Ok(())
    }
}

impl BoardStore for LocalBoardStore {
    fn list_boards(&self) -> Vec<BoardInfo> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!(
                    "[taskboard.storage] Cannot list {}: {}",
                    self.dir.display(),
                    e
                );
                return Vec::new();
            }
        };

        let mut boards: Vec<BoardInfo> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path.extension().and_then(|e| e.to_str()) == Some(BOARD_EXTENSION)
            })
            .filter_map(|path| match self.read_shape(&path) {
                Ok(shape) => Some(BoardInfo::from(&shape)),
                Err(e) => {
                    log::warn!(
                        "[taskboard.storage] Skipping unreadable board {:?}: {}",
                        path,
                        e
                    );
                    None
                }
            })
            .collect();
        boards.sort_by(|a, b| a.id.cmp(&b.id));
        boards
    }

    fn exists(&self, board_id: &str) -> bool {
        self.board_path(board_id).is_file()
    }

    fn load_raw(&self, board_id: &str) -> Result<String> {
        let path = self.board_path(board_id);
        if !path.is_file() {
            return Err(EngineError::board_not_found(board_id));
        }
        let content = fs::read_to_string(&path)?;
        // Byte length bounds char length from above; only count chars when close.
        if content.len() > self.limits.max_board_payload_chars {
            self.check_size(board_id, content.chars().count())?;
        }
        Ok(content)
    }

    fn parse_document(&self, board_id: &str, raw: &str) -> Result<BoardShape> {
        let shape = Self::parse_at(&self.board_path(board_id), raw)?;
        if let BoardShape::Flat(board) = &shape {
            if let Err(gap) = check_positions(board) {
                log::warn!(
                    "[taskboard.storage] Board {} column {} has non-contiguous positions {:?}",
                    board_id,
                    gap.column_id,
                    gap.positions
                );
            }
        }
        Ok(shape)
    }

    fn save_board(&self, board: &Board) -> Result<()> {
        validate_board(board, &self.limits)?;

        let json = serde_json::to_string_pretty(board).map_err(|source| EngineError::Document {
            path: self.board_path(&board.id),
            source,
        })?;
        self.check_size(&board.id, json.chars().count())?;

        let path = self.board_path(&board.id);
        Self::atomic_write(&path, &json)?;
        log::info!(
            "[taskboard.storage] Saved board {} ({} columns, {} cards)",
            board.id,
            board.columns.len(),
            board.cards.len()
        );
        Ok(())
    }

    fn delete_board(&self, board_id: &str) -> Result<()> {
        let path = self.board_path(board_id);
        if !path.is_file() {
            return Err(EngineError::board_not_found(board_id));
        }
        fs::remove_file(&path)?;
        log::info!("[taskboard.storage] Deleted board {}", board_id);
        Ok(())
    }
}
