//! Change-operation model.
//!
//! Atomic add/alter/delete edits are arena-allocated ([`OpArena`]) and
//! referred to by [`OpId`] handles; the pairwise precedence/conflict
//! relations accumulated over them live in a session-owned
//! [`RelationGraph`], not on the operations themselves. This keeps the
//! entities immutable after extraction and makes each pipeline phase's
//! mutations explicit in its signature.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ReconcileError;
use crate::model::ElementId;

pub mod composite;

pub use composite::{Composite, ContradictBlock};

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

/// Merge side: the provenance of an edit, or the resolution of a block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Side {
    /// No side chosen (unresolved).
    #[default]
    None,
    /// The left derivative.
    Left,
    /// The right derivative.
    Right,
    /// Neither derivative — resolved toward the common ancestor.
    Base,
    /// Both derivatives kept (e.g. after rename disambiguation).
    Both,
}

impl Side {
    /// The opposite derivative side. Identity for `None`/`Base`/`Both`.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
            other => other,
        }
    }

    /// Accumulate a resolution choice onto an existing one.
    ///
    /// Choosing `Left` when `Right` was already chosen (or vice versa) yields
    /// `Both` — two independent rule firings that each keep one side keep
    /// both. `Base` and `Both` replace outright.
    #[must_use]
    pub const fn accumulate(self, chosen: Self) -> Self {
        match (self, chosen) {
            (Self::Left, Self::Right) | (Self::Right, Self::Left) => Self::Both,
            (current, Self::None) => current,
            (_, next) => next,
        }
    }

    /// Returns `true` for the two derivative sides (`Left`/`Right`).
    #[must_use]
    pub const fn is_derivative(self) -> bool {
        matches!(self, Self::Left | Self::Right)
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Left => write!(f, "left"),
            Self::Right => write!(f, "right"),
            Self::Base => write!(f, "base"),
            Self::Both => write!(f, "both"),
        }
    }
}

// ---------------------------------------------------------------------------
// OpKind
// ---------------------------------------------------------------------------

/// The kind of edit an atomic change operation performs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OpKind {
    /// Element newly present on this side.
    Add,
    /// Element's value replaced by an updated counterpart.
    Alter,
    /// Element removed on this side.
    Delete,
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "add"),
            Self::Alter => write!(f, "alter"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

// ---------------------------------------------------------------------------
// OpId / AtomicOp / OpArena
// ---------------------------------------------------------------------------

/// Stable handle for one atomic change operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpId(u32);

impl OpId {
    /// Create an id from a raw arena index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// The raw arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op{}", self.0)
    }
}

/// One atomic edit to one model element on one side.
///
/// Immutable once extracted; its relations to other operations accumulate in
/// the session's [`RelationGraph`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AtomicOp {
    /// The derivative this edit came from (`Left` or `Right`).
    pub side: Side,
    /// Add, alter, or delete.
    pub kind: OpKind,
    /// The element this edit targets (pre-edit snapshot for alters).
    pub target: ElementId,
    /// The post-edit snapshot (`Alter` only).
    pub updated: Option<ElementId>,
    /// Element-type tag from the input change log (e.g. `"Class"`).
    pub type_tag: String,
}

impl AtomicOp {
    /// The element whose post-edit state this operation produces: the updated
    /// snapshot for alters, the target otherwise.
    #[must_use]
    pub fn effective(&self) -> ElementId {
        self.updated.unwrap_or(self.target)
    }
}

/// Owning arena for the session's atomic operations.
#[derive(Clone, Debug, Default)]
pub struct OpArena {
    ops: Vec<AtomicOp>,
}

impl OpArena {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an operation; returns its handle.
    ///
    /// Validates the descriptor: alters must carry an updated element
    /// reference, adds and deletes must not, and the side must be a
    /// derivative side.
    pub fn push(&mut self, op: AtomicOp) -> Result<OpId, ReconcileError> {
        if !op.side.is_derivative() {
            return Err(ReconcileError::InvalidEdit {
                detail: format!("edit side must be left or right, got '{}'", op.side),
            });
        }
        match (op.kind, op.updated) {
            (OpKind::Alter, None) => {
                return Err(ReconcileError::InvalidEdit {
                    detail: format!("alter of {} lacks an updated element reference", op.target),
                });
            }
            (OpKind::Add | OpKind::Delete, Some(_)) => {
                return Err(ReconcileError::InvalidEdit {
                    detail: format!(
                        "{} of {} must not carry an updated element reference",
                        op.kind, op.target
                    ),
                });
            }
            _ => {}
        }
        let id = OpId::new(u32::try_from(self.ops.len()).unwrap_or(u32::MAX));
        self.ops.push(op);
        Ok(id)
    }

    /// Look up an operation.
    ///
    /// # Panics
    ///
    /// Panics on a foreign `OpId`; ids are only ever minted by this arena.
    #[must_use]
    pub fn get(&self, id: OpId) -> &AtomicOp {
        &self.ops[id.index()]
    }

    /// Number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns `true` if the arena holds no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Iterate over `(id, op)` pairs in extraction order.
    pub fn iter(&self) -> impl Iterator<Item = (OpId, &AtomicOp)> {
        self.ops
            .iter()
            .enumerate()
            .map(|(i, op)| (OpId::new(u32::try_from(i).unwrap_or(u32::MAX)), op))
    }

    /// Ids of all operations on one side, in extraction order.
    #[must_use]
    pub fn side_ops(&self, side: Side) -> Vec<OpId> {
        self.iter()
            .filter(|(_, op)| op.side == side)
            .map(|(id, _)| id)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Relation / RelationGraph
// ---------------------------------------------------------------------------

/// Precedence relation tag between two atomic operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Relation {
    /// The source must be replayed before the target.
    Before,
    /// The operations contradict each other.
    Conflict,
    /// The source requires the target to be present (reserved for the apply
    /// stage; ignored by ordering).
    Require,
}

/// Session-owned adjacency structure over atomic operations.
///
/// Edges preserve insertion order per source operation, which
/// [`RelationGraph::replace_relation`] relies on — reclassifying a BEFORE
/// edge as CONFLICT must not reshuffle the edges recorded around it.
#[derive(Clone, Debug, Default)]
pub struct RelationGraph {
    edges: Vec<Vec<(OpId, Relation)>>,
}

impl RelationGraph {
    /// Create a graph sized for `ops` operations.
    #[must_use]
    pub fn with_capacity(ops: usize) -> Self {
        Self {
            edges: vec![Vec::new(); ops],
        }
    }

    /// Record a relation from `from` to `to`. An existing edge between the
    /// pair is overwritten in place.
    pub fn add_relation(&mut self, from: OpId, to: OpId, relation: Relation) {
        if self.edges.len() <= from.index() {
            self.edges.resize(from.index() + 1, Vec::new());
        }
        let row = &mut self.edges[from.index()];
        if let Some(slot) = row.iter_mut().find(|(other, _)| *other == to) {
            slot.1 = relation;
        } else {
            row.push((to, relation));
        }
    }

    /// The recorded relation from `from` to `to`, if any.
    #[must_use]
    pub fn relation(&self, from: OpId, to: OpId) -> Option<Relation> {
        self.edges
            .get(from.index())?
            .iter()
            .find(|(other, _)| *other == to)
            .map(|&(_, rel)| rel)
    }

    /// Replace the relation on an existing edge, preserving its position in
    /// insertion order. Inserts the edge if it was absent.
    pub fn replace_relation(&mut self, from: OpId, to: OpId, relation: Relation) {
        self.add_relation(from, to, relation);
    }

    /// Returns `true` if a direct BEFORE edge `from → to` is recorded.
    ///
    /// No transitive closure at this level — composites and contradiction
    /// blocks compute transitivity by delegating to their members.
    #[must_use]
    pub fn is_before(&self, from: OpId, to: OpId) -> bool {
        self.relation(from, to) == Some(Relation::Before)
    }

    /// All operations `from` is recorded as conflicting with, in insertion
    /// order.
    pub fn conflicts_of(&self, from: OpId) -> impl Iterator<Item = OpId> + '_ {
        self.edges
            .get(from.index())
            .into_iter()
            .flatten()
            .filter(|(_, rel)| *rel == Relation::Conflict)
            .map(|&(to, _)| to)
    }

    /// Iterate over all edges of one operation in insertion order.
    pub fn edges_of(&self, from: OpId) -> impl Iterator<Item = (OpId, Relation)> + '_ {
        self.edges.get(from.index()).into_iter().flatten().copied()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
