//! Error types for the reconciliation engine.
//!
//! Defines [`ReconcileError`], the unified error type for a reconciliation
//! session. Every fatal condition aborts the whole session — there is no
//! partial-result mode — so each variant is self-contained: it names what
//! went wrong and where, without requiring extra context to interpret.
//!
//! "No matching rule" is **not** an error anywhere in the engine; it is an
//! ordinary control value (no relation / unresolved block).

use std::fmt;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// ReconcileError
// ---------------------------------------------------------------------------

/// Unified error type for reconciliation sessions.
#[derive(Debug)]
pub enum ReconcileError {
    /// A dependency cycle was detected, either while ordering members of a
    /// same-side composite or while linearizing the final change sequence.
    CircularReference {
        /// Where the cycle was found (e.g. `"composite insert"`,
        /// `"change ordering"`).
        context: String,
    },

    /// A decision-table action fired on an input combination that upstream
    /// invariants should have made impossible.
    RuleViolation {
        /// The table that detected the violation.
        table: String,
        /// The action that fired.
        action: String,
        /// Where the table definition came from (file path or `<builtin>`).
        source: String,
        /// Zero-based rule column that matched.
        rule: usize,
        /// What the action reported.
        detail: String,
    },

    /// A rule condition needed the cross-side counterpart of an element, but
    /// the upstream matching stage produced none.
    UnmatchedElement {
        /// Display form of the element missing a counterpart.
        element: String,
    },

    /// A strict tri-state coercion hit an undefined value.
    UndefinedTruth {
        /// What was being coerced.
        context: String,
    },

    /// A table definition file (or embedded default) failed to parse.
    TableParse {
        /// File path or `<builtin>`.
        source: String,
        /// One-based line number.
        line: usize,
        /// What is wrong with the line.
        detail: String,
    },

    /// A table file (or builtin set) lacks a section the engine requires.
    MissingTable {
        /// The required section name.
        name: String,
        /// Where the engine looked.
        source: String,
    },

    /// A table definition names a condition or action with no registered
    /// binding.
    UnknownBinding {
        /// The table being bound.
        table: String,
        /// `"condition"` or `"action"`.
        kind: &'static str,
        /// The unrecognized name.
        name: String,
    },

    /// A condition or action row disagrees with the table's rule-column count.
    ColumnMismatch {
        /// The table being built.
        table: String,
        /// The offending row.
        row: String,
        /// Columns the table expects.
        expected: usize,
        /// Columns the row supplied.
        found: usize,
    },

    /// An input edit descriptor is malformed (e.g. an alter without an
    /// updated element, or an add carrying one).
    InvalidEdit {
        /// What is wrong with the descriptor.
        detail: String,
    },

    /// A contradiction block was handed two changes that are not one per
    /// side.
    SideMismatch {
        /// The sides that were supplied.
        detail: String,
    },

    /// A configuration file could not be loaded or parsed.
    Config {
        /// Path to the configuration file.
        path: PathBuf,
        /// Human-readable description of the problem.
        detail: String,
    },

    /// An I/O error while reading table or configuration files.
    Io(std::io::Error),
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CircularReference { context } => {
                write!(
                    f,
                    "circular reference detected during {context}.\n  The input edit sets contain mutually dependent changes that cannot be ordered; the merge session was aborted."
                )
            }
            Self::RuleViolation {
                table,
                action,
                source,
                rule,
                detail,
            } => {
                write!(
                    f,
                    "rule violation in table '{table}' (rule {rule}, action '{action}', defined in {source}): {detail}\n  This input combination should be impossible; check the upstream matching stage or the table definition."
                )
            }
            Self::UnmatchedElement { element } => {
                write!(
                    f,
                    "element {element} has no cross-side counterpart.\n  Reconciliation requires the matching stage to resolve all correspondences first."
                )
            }
            Self::UndefinedTruth { context } => {
                write!(
                    f,
                    "undefined tri-state value where a definite boolean is required: {context}"
                )
            }
            Self::TableParse {
                source,
                line,
                detail,
            } => {
                write!(
                    f,
                    "malformed table definition in {source} at line {line}: {detail}\n  Expected whitespace-separated Y/N/- cells (conditions) or step numbers (actions) under a [Section] header."
                )
            }
            Self::MissingTable { name, source } => {
                write!(
                    f,
                    "required table section '[{name}]' not found in {source}.\n  External table files must define every section the builtin set defines."
                )
            }
            Self::UnknownBinding { table, kind, name } => {
                write!(
                    f,
                    "table '{table}' names {kind} '{name}', which has no registered binding.\n  Check the definition for typos, or register the {kind} before loading."
                )
            }
            Self::ColumnMismatch {
                table,
                row,
                expected,
                found,
            } => {
                write!(
                    f,
                    "row '{row}' in table '{table}' has {found} rule column(s), expected {expected}.\n  Every condition and action row must span the same rule columns."
                )
            }
            Self::InvalidEdit { detail } => {
                write!(f, "invalid edit descriptor: {detail}")
            }
            Self::SideMismatch { detail } => {
                write!(
                    f,
                    "contradiction block requires at most one change per side, got: {detail}"
                )
            }
            Self::Config { path, detail } => {
                write!(f, "configuration error in '{}': {detail}", path.display())
            }
            Self::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for ReconcileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ReconcileError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
