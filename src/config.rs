//! Engine configuration.
//!
//! A small TOML file pointing the engine at external table definitions and
//! tuning the ordering pass limit. Everything is optional; a missing file
//! means the builtin policy.
//!
//! ```toml
//! [tables]
//! before = "tables/before.dt"
//! resolve = "tables/resolve.dt"
//!
//! [ordering]
//! max-passes = 64
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ReconcileError;

/// Top-level configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct RemeldConfig {
    /// External table definition files.
    pub tables: TablesConfig,
    /// Ordering-phase tuning.
    pub ordering: OrderingConfig,
}

/// Paths to external table definition files; unset means builtin.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct TablesConfig {
    /// Precedence policy file (must define the same sections as the builtin
    /// precedence policy).
    pub before: Option<PathBuf>,
    /// Resolution policy file.
    pub resolve: Option<PathBuf>,
}

/// Ordering-phase tuning.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct OrderingConfig {
    /// Dependency pass limit; unset means the node count.
    pub max_passes: Option<usize>,
}

impl RemeldConfig {
    /// Load configuration from `path`. A missing file is not an error; it
    /// yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ReconcileError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path).map_err(|err| ReconcileError::Config {
            path: path.to_owned(),
            detail: err.to_string(),
        })?;
        toml::from_str(&text).map_err(|err| ReconcileError::Config {
            path: path.to_owned(),
            detail: err.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
