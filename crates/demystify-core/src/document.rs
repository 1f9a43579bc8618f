//! Serialized trace documents.
//!
//! A trace document bundles everything one render needs: the metadata table,
//! the exception graph and the root exception id.
//!
//! ```json
//! {
//!   "metadata": { "types": { "1": { "kind": "named", "name": "Program" } },
//!                 "methods": { "10": { "name": "Run", "declaring_type": 1 } } },
//!   "exceptions": [
//!     { "type_name": "System.Exception", "message": "boom",
//!       "trace": { "frames": [ { "declaring_type": 1, "method": 10 } ] } }
//!   ],
//!   "root": 0
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DemystifyError, DemystifyResult};
use crate::exception::{ExceptionGraph, ExceptionId};
use crate::metadata::MetadataTable;

/// Metadata plus an exception graph, as read from JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceDocument {
    #[serde(default)]
    pub metadata: MetadataTable,
    pub exceptions: ExceptionGraph,
    #[serde(default)]
    pub root: ExceptionId,
}

impl TraceDocument {
    /// Parse and validate a document.
    pub fn from_json(json: &str) -> DemystifyResult<Self> {
        let document: TraceDocument = serde_json::from_str(json)?;
        document.validate()?;
        Ok(document)
    }

    /// Read, parse and validate a document file.
    pub fn load(path: &Path) -> DemystifyResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Check that the root and every exception link point inside the graph.
    pub fn validate(&self) -> DemystifyResult<()> {
        if !self.exceptions.contains(self.root) {
            return Err(DemystifyError::invalid_document(format!(
                "root exception #{} out of range ({} exceptions)",
                self.root.0,
                self.exceptions.len()
            )));
        }
        for id in self.exceptions.ids() {
            let Some(record) = self.exceptions.get(id) else {
                continue;
            };
            if let Some(dangling) = record
                .nested()
                .into_iter()
                .find(|link| !self.exceptions.contains(*link))
            {
                return Err(DemystifyError::invalid_document(format!(
                    "exception #{} links to unknown exception #{}",
                    id.0, dangling.0
                )));
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> DemystifyResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ============================================================================
// Tests
// ============================================================================
