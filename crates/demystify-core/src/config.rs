//! Render configuration.
//!
//! A single [`RenderOptions`] value controls both output styles. A
//! process-wide default exists (see [`RenderOptions::global`]); every entry
//! point also accepts an explicit override.

use std::path::Path;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::DemystifyResult;
use crate::type_name::FormatOptions;

/// Options recognized by the renderers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Emit color markup from the styled builder.
    pub color_enabled: bool,
    /// Render type names with their namespace.
    pub namespace_qualified: bool,
    /// Render open generic parameters by name inside argument lists.
    pub include_generic_param_names: bool,
    /// Maximum exception nesting depth before truncation.
    pub max_depth: usize,
}

impl RenderOptions {
    /// Built-in defaults.
    pub const DEFAULT: RenderOptions = RenderOptions {
        color_enabled: true,
        namespace_qualified: false,
        include_generic_param_names: true,
        max_depth: 64,
    };

    /// Current process-wide defaults.
    pub fn global() -> RenderOptions {
        match GLOBAL_OPTIONS.read() {
            Ok(options) => options.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the process-wide defaults.
    pub fn set_global(options: RenderOptions) {
        match GLOBAL_OPTIONS.write() {
            Ok(mut guard) => *guard = options,
            Err(poisoned) => *poisoned.into_inner() = options,
        }
    }

    /// Parse options from JSON; absent fields take their defaults.
    pub fn from_json(json: &str) -> DemystifyResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load options from a JSON file.
    pub fn load(path: &Path) -> DemystifyResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Type formatting options derived from these render options.
    pub fn format_options(&self) -> FormatOptions {
        FormatOptions {
            fully_qualified: self.namespace_qualified,
            include_generic_param_names: self.include_generic_param_names,
        }
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions::DEFAULT
    }
}

static GLOBAL_OPTIONS: RwLock<RenderOptions> = RwLock::new(RenderOptions::DEFAULT);

// ============================================================================
// Tests
// ============================================================================
