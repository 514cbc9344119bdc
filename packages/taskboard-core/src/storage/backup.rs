/// Pre-mutation snapshots.
///
/// Each snapshot is a byte-for-byte copy of the stored document, written once
/// to `backups/{encodedBoardId}_{yyyymmddThhmmss.mmmZ}-{seq}_{label}.json` and
/// never touched again. `seq` is a zero-padded counter within one timestamp,
/// so file-name order is creation order. There is no retention policy.
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;

use super::encode_board_id;
use crate::error::{EngineError, Result};
use crate::types::BoardShape;

pub const BACKUP_DIR_NAME: &str = "backups";

static LABEL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_-]+").unwrap());

/// Snapshots per board per millisecond; `seq` is written with three digits.
const MAX_SEQUENCE: u32 = 1000;

pub struct BackupManager {
    dir: PathBuf,
}

impl BackupManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Backups live in `backups/` next to the board documents.
    pub fn beside(boards_dir: &Path) -> Self {
        Self::new(boards_dir.join(BACKUP_DIR_NAME))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `raw` (the stored document text) as a snapshot and return its path.
    pub fn create_backup(&self, board_id: &str, raw: &str, label: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let stamp = format!(
            "{}_{}-",
            encode_board_id(board_id),
            Utc::now().format("%Y%m%dT%H%M%S%.3fZ")
        );
        let label = sanitize_label(label);

        for seq in self.next_sequence(&stamp)?..MAX_SEQUENCE {
            let path = self.dir.join(format!("{}{:03}_{}.json", stamp, seq, label));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(raw.as_bytes())?;
                    file.sync_all()?;
                    log::info!(
                        "[taskboard.backup] Board {} snapshot saved to {:?}",
                        board_id,
                        path
                    );
                    return Ok(path);
                }
                Err(e) if e.kind() == IoErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(EngineError::Io(std::io::Error::new(
            IoErrorKind::AlreadyExists,
            format!("No free backup sequence for {}", stamp),
        )))
    }

    /// One past the highest sequence already used under `stamp`, whatever
    /// the label.
    fn next_sequence(&self, stamp: &str) -> Result<u32> {
        let next = fs::read_dir(&self.dir)?
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                let rest = name.strip_prefix(stamp)?;
                rest.get(..3)?.parse::<u32>().ok()
            })
            .max()
            .map_or(0, |seq| seq + 1);
        Ok(next)
    }

    /// Snapshot paths for one board, oldest first.
    pub fn list_backups(&self, board_id: &str) -> Result<Vec<PathBuf>> {
        let prefix = format!("{}_", encode_board_id(board_id));
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(&prefix) && n.ends_with(".json"))
            })
            .collect();
        paths.sort();
        Ok(paths)
    }

    /// Read a snapshot back as a board document.
    pub fn read_backup(&self, path: &Path) -> Result<BoardShape> {
        let content = fs::read_to_string(path)?;
        let value: serde_json::Value =
            serde_json::from_str(&content).map_err(|source| EngineError::Document {
                path: path.to_path_buf(),
                source,
            })?;
        BoardShape::from_value(value).map_err(|source| EngineError::Document {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn sanitize_label(label: &str) -> String {
    let cleaned = LABEL_RE.replace_all(label.trim(), "-");
    let cleaned = cleaned.trim_matches('-');
    if cleaned.is_empty() {
        "snapshot".to_string()
    } else {
        cleaned.to_string()
    }
}
