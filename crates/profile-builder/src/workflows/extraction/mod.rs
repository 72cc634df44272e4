//! Best-effort document extraction and the merge of its untrusted output into form state.

mod merge;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::workflows::wizard::FileHandle;

pub use merge::{merge_extraction, FormPatch};

/// Fields the extraction service believes it found, keyed by form section.
///
/// Nothing in here is trusted: values may be null, blank, or of the wrong shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialRecord {
    #[serde(default)]
    pub fields: BTreeMap<String, Map<String, Value>>,
    #[serde(default)]
    pub lists: BTreeMap<String, Vec<Map<String, Value>>>,
}

impl PartialRecord {
    /// Split a loose JSON document into record sections (objects) and list sections (arrays).
    /// Anything else at the top level is dropped, as are non-object list items.
    pub fn from_json(document: &Value) -> Self {
        let mut partial = Self::default();
        let Some(sections) = document.as_object() else {
            return partial;
        };

        for (name, value) in sections {
            match value {
                Value::Object(fields) => {
                    partial.fields.insert(name.clone(), fields.clone());
                }
                Value::Array(items) => {
                    let items = items
                        .iter()
                        .filter_map(|item| item.as_object().cloned())
                        .collect();
                    partial.lists.insert(name.clone(), items);
                }
                _ => {}
            }
        }

        partial
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.lists.is_empty()
    }
}

/// AI-backed reader turning an uploaded document (typically a CV) into a partial record.
pub trait ExtractionService: Send + Sync {
    fn extract(&self, artifact: &FileHandle) -> Result<PartialRecord, ExtractionError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("extraction service unavailable: {0}")]
    Unavailable(String),
    #[error("document could not be read: {0}")]
    Unreadable(String),
}
