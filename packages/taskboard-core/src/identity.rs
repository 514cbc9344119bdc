/// Identifier generation for boards, columns and cards.
///
/// Ids are `<prefix>-<12 hex chars>`. The hex part is the SHA-256 of an
/// in-process counter plus the current nanosecond timestamp, so ids stay
/// unique inside one process and well distributed across processes.
use std::sync::atomic::{AtomicU64, Ordering};

use sha2::{Digest, Sha256};

pub const BOARD_PREFIX: &str = "board";
pub const COLUMN_PREFIX: &str = "col";
pub const CARD_PREFIX: &str = "card";

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn generate_id(prefix: &str) -> String {
    let seq = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    let ts = std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let mut hasher = Sha256::new();
    hasher.update(seq.to_le_bytes());
    hasher.update(ts.to_le_bytes());
    let hash = hasher.finalize();
    format!("{}-{}", prefix, hex::encode(&hash[..6]))
}

pub fn board_id() -> String {
    generate_id(BOARD_PREFIX)
}

pub fn column_id() -> String {
    generate_id(COLUMN_PREFIX)
}

pub fn card_id() -> String {
    generate_id(CARD_PREFIX)
}
