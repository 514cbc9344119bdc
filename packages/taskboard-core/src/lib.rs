/// Taskboard core: board documents, card placement, batches, projections,
/// migration and file-backed persistence.
pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod identity;
pub mod migrate;
pub mod payload;
pub mod service;
pub mod storage;
pub mod template;
pub mod types;

pub use error::{EngineError, ErrorKind, Result};
pub use service::BoardService;
