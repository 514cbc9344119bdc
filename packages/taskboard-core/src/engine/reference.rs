/// Batch-scoped alias table.
///
/// A `create` operation may name the card it creates (`reference: "x"`);
/// later operations in the same batch address it as `$ref:x`. The table
/// lives for one batch only.
use std::collections::HashMap;

use crate::error::{EngineError, Result};

pub const REF_PREFIX: &str = "$ref:";

#[derive(Debug, Default)]
pub struct ReferenceResolver {
    alias_to_id: HashMap<String, String>,
}

impl ReferenceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject an alias that is empty or already taken in this batch.
    /// Called before the creating operation mutates anything.
    pub fn check_alias(&self, alias: &str) -> Result<()> {
        if alias.trim().is_empty() {
            return Err(EngineError::validation("Reference alias must not be empty"));
        }
        if self.alias_to_id.contains_key(alias) {
            return Err(EngineError::validation(format!(
                "Reference '{}' is already defined in this batch",
                alias
            )));
        }
        Ok(())
    }

    pub fn register(&mut self, alias: &str, id: &str) {
        self.alias_to_id.insert(alias.to_string(), id.to_string());
    }

    pub fn lookup(&self, alias: &str) -> Option<&str> {
        self.alias_to_id.get(alias).map(String::as_str)
    }

    /// Rewrite a `$ref:<alias>` marker to its concrete id. Plain ids pass
    /// through unchanged.
    pub fn resolve(&self, value: &str) -> Result<String> {
        match value.strip_prefix(REF_PREFIX) {
            Some(alias) => self
                .lookup(alias)
                .map(ToOwned::to_owned)
                .ok_or_else(|| EngineError::NotFound {
                    kind: "Reference",
                    id: alias.to_string(),
                }),
            None => Ok(value.to_string()),
        }
    }

    pub fn resolve_all(&self, values: &[String]) -> Result<Vec<String>> {
        values.iter().map(|v| self.resolve(v)).collect()
    }
}
