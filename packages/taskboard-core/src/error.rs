use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Error categories exposed to transport layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Conflict,
    Architecture,
    Io,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Board uses the legacy nested layout: {0}")]
    Architecture(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed board document {path:?}: {source}")]
    Document {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl EngineError {
    pub fn board_not_found(id: impl Into<String>) -> Self {
        EngineError::NotFound {
            kind: "Board",
            id: id.into(),
        }
    }

    pub fn card_not_found(id: impl Into<String>) -> Self {
        EngineError::NotFound {
            kind: "Card",
            id: id.into(),
        }
    }

    pub fn column_not_found(id: impl Into<String>) -> Self {
        EngineError::NotFound {
            kind: "Column",
            id: id.into(),
        }
    }

    /// The column a create/move/update targets is absent from the board.
    pub fn missing_column(id: &str) -> Self {
        EngineError::Conflict(format!("Column '{}' does not exist", id))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::Validation(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::NotFound { .. } => ErrorKind::NotFound,
            EngineError::Validation(_) | EngineError::Document { .. } => ErrorKind::Validation,
            EngineError::Conflict(_) => ErrorKind::Conflict,
            EngineError::Architecture(_) => ErrorKind::Architecture,
            EngineError::Io(_) => ErrorKind::Io,
        }
    }
}
