/// Engine configuration: where boards live and the size limits applied to
/// every mutation. Read from `engine.json` under the platform config dir.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineLimits {
    #[serde(default = "default_max_columns")]
    pub max_columns: usize,
    #[serde(default = "default_max_cards")]
    pub max_cards: usize,
    #[serde(default = "default_max_batch_operations")]
    pub max_batch_operations: usize,
    /// Upper bound on a single card or patch payload, in characters.
    #[serde(default = "default_max_card_payload_chars")]
    pub max_card_payload_chars: usize,
    /// Upper bound on a whole serialized board, in characters.
    #[serde(default = "default_max_board_payload_chars")]
    pub max_board_payload_chars: usize,
}

fn default_max_columns() -> usize {
    20
}

fn default_max_cards() -> usize {
    1000
}

fn default_max_batch_operations() -> usize {
    100
}

fn default_max_card_payload_chars() -> usize {
    200_000
}

fn default_max_board_payload_chars() -> usize {
    1_000_000
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_columns: default_max_columns(),
            max_cards: default_max_cards(),
            max_batch_operations: default_max_batch_operations(),
            max_card_payload_chars: default_max_card_payload_chars(),
            max_board_payload_chars: default_max_board_payload_chars(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default = "default_boards_dir")]
    pub boards_dir: PathBuf,
    #[serde(default)]
    pub limits: EngineLimits,
}

/// Default board directory: <data dir>/taskboard/boards
fn default_boards_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskboard")
        .join("boards")
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            boards_dir: default_boards_dir(),
            limits: EngineLimits::default(),
        }
    }
}

/// Default config path: <config dir>/taskboard/engine.json
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskboard")
        .join("engine.json")
}

/// Load config from path. Returns defaults if the file is missing or unreadable.
pub fn load_config(path: &Path) -> EngineConfig {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!(
                "[taskboard.config] Failed to parse config {}: {}",
                path.display(),
                e
            );
            EngineConfig::default()
        }),
        Err(_) => {
            log::info!(
                "[taskboard.config] No config at {}, using defaults",
                path.display()
            );
            EngineConfig::default()
        }
    }
}
