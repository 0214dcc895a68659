//! Three-valued logic for "don't-care" rule cells.
//!
//! Decision-table cells are tri-state: a condition cell can expect true,
//! expect false, or be inapplicable ([`Truth::Undefined`]). The connectives
//! here deliberately do **not** short-circuit: any operand that is
//! `Undefined` makes the result `Undefined`, even when the other operand
//! would dominate under Kleene logic. Rule evaluation depends on this —
//! an inapplicable cell must never pretend to be a definite answer.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ReconcileError;

// ---------------------------------------------------------------------------
// Truth
// ---------------------------------------------------------------------------

/// A tri-state logic value: true, false, or undefined ("don't care").
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Truth {
    /// Definitely true.
    True,
    /// Definitely false.
    False,
    /// No definite value. In a rule cell this means "inapplicable".
    #[default]
    Undefined,
}

impl Truth {
    /// Lift a plain boolean into a definite `Truth`.
    #[must_use]
    pub const fn from_bool(value: bool) -> Self {
        if value { Self::True } else { Self::False }
    }

    /// Returns `true` if the value is definite (not `Undefined`).
    #[must_use]
    pub const fn is_defined(self) -> bool {
        !matches!(self, Self::Undefined)
    }

    /// Logical AND. `Undefined` on either side yields `Undefined`.
    #[must_use]
    pub const fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::Undefined, _) | (_, Self::Undefined) => Self::Undefined,
            (Self::True, Self::True) => Self::True,
            _ => Self::False,
        }
    }

    /// Logical OR. `Undefined` on either side yields `Undefined`.
    #[must_use]
    pub const fn or(self, other: Self) -> Self {
        match (self, other) {
            (Self::Undefined, _) | (_, Self::Undefined) => Self::Undefined,
            (Self::False, Self::False) => Self::False,
            _ => Self::True,
        }
    }

    /// Logical NOT. `Undefined` stays `Undefined`.
    #[must_use]
    pub const fn not(self) -> Self {
        match self {
            Self::True => Self::False,
            Self::False => Self::True,
            Self::Undefined => Self::Undefined,
        }
    }

    /// Strict coercion to `bool`: fails on `Undefined`.
    ///
    /// Use this wherever the algorithm requires a definite answer, e.g. when
    /// reading a rule outcome that a fired action must have set.
    pub fn require(self, context: &str) -> Result<bool, ReconcileError> {
        match self {
            Self::True => Ok(true),
            Self::False => Ok(false),
            Self::Undefined => Err(ReconcileError::UndefinedTruth {
                context: context.to_owned(),
            }),
        }
    }

    /// Defaulting coercion: `Undefined` counts as `false`.
    ///
    /// Note: this and [`Truth::or_true`] are intentionally asymmetric twins.
    /// Call sites pick one deliberately; do not unify them.
    #[must_use]
    pub const fn or_false(self) -> bool {
        matches!(self, Self::True)
    }

    /// Defaulting coercion: `Undefined` counts as `true`.
    #[must_use]
    pub const fn or_true(self) -> bool {
        !matches!(self, Self::False)
    }
}

impl From<bool> for Truth {
    fn from(value: bool) -> Self {
        Self::from_bool(value)
    }
}

impl fmt::Display for Truth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::True => write!(f, "Y"),
            Self::False => write!(f, "N"),
            Self::Undefined => write!(f, "-"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
