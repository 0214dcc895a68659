//! Composite change operations and contradiction blocks.
//!
//! A [`Composite`] groups same-side atomic operations in dependency order; a
//! [`ContradictBlock`] pairs one composite per side to represent a single
//! semantic conflict. Both delegate transitive before-queries to their
//! members — the relation graph itself only records direct edges.

use crate::error::ReconcileError;
use crate::op::{OpArena, OpId, RelationGraph, Side};

// ---------------------------------------------------------------------------
// Composite
// ---------------------------------------------------------------------------

/// A same-side, dependency-ordered group of atomic operations.
///
/// Insertion keeps the member list topologically ordered under the direct
/// BEFORE relation and rejects same-side dependency cycles outright.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Composite {
    side: Side,
    members: Vec<OpId>,
}

impl Composite {
    /// Create an empty composite for one side.
    #[must_use]
    pub const fn new(side: Side) -> Self {
        Self {
            side,
            members: Vec::new(),
        }
    }

    /// The side all members share.
    #[must_use]
    pub const fn side(&self) -> Side {
        self.side
    }

    /// Members in dependency order.
    #[must_use]
    pub fn members(&self) -> &[OpId] {
        &self.members
    }

    /// Returns `true` if the composite has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Returns `true` if `op` is already a member.
    #[must_use]
    pub fn contains(&self, op: OpId) -> bool {
        self.members.contains(&op)
    }

    /// Insert an operation, preserving dependency order.
    ///
    /// The op goes immediately before the first existing member it is BEFORE,
    /// else at the end. Afterwards, any member *after* the insertion point
    /// with a BEFORE edge back to the new op means the same-side dependencies
    /// are cyclic — a fatal error, and the op is removed again so a failed
    /// insert leaves no partial composite.
    pub fn insert(
        &mut self,
        op: OpId,
        ops: &OpArena,
        graph: &RelationGraph,
    ) -> Result<(), ReconcileError> {
        let side = ops.get(op).side;
        if side != self.side {
            return Err(ReconcileError::SideMismatch {
                detail: format!("{side} operation inserted into {} composite", self.side),
            });
        }
        if self.contains(op) {
            return Ok(());
        }

        let pos = self
            .members
            .iter()
            .position(|&m| graph.is_before(op, m))
            .unwrap_or(self.members.len());
        self.members.insert(pos, op);

        if self.members[pos + 1..].iter().any(|&m| graph.is_before(m, op)) {
            self.members.remove(pos);
            return Err(ReconcileError::CircularReference {
                context: format!("composite insert of {op}"),
            });
        }
        Ok(())
    }

    /// Returns `true` if any member is directly BEFORE `other`.
    #[must_use]
    pub fn any_before(&self, other: OpId, graph: &RelationGraph) -> bool {
        self.members.iter().any(|&m| graph.is_before(m, other))
    }

    /// Returns `true` if any member is directly BEFORE any member of `other`.
    #[must_use]
    pub fn is_before(&self, other: &Self, graph: &RelationGraph) -> bool {
        other.members.iter().any(|&o| self.any_before(o, graph))
    }
}

// ---------------------------------------------------------------------------
// ContradictBlock
// ---------------------------------------------------------------------------

/// One semantic conflict: a left composite paired with a right composite.
///
/// A side with no operations is represented by an empty composite; the block
/// is "in conflict" only while both composites are non-empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContradictBlock {
    left: Composite,
    right: Composite,
    resolved: bool,
    resolution: Side,
}

impl Default for ContradictBlock {
    fn default() -> Self {
        Self::new()
    }
}

impl ContradictBlock {
    /// Create an empty block.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            left: Composite::new(Side::Left),
            right: Composite::new(Side::Right),
            resolved: false,
            resolution: Side::None,
        }
    }

    /// Build a block from one or two changes, each assigned to its side's
    /// composite. Two changes on the same side are a construction error.
    pub fn from_ops(
        changes: &[OpId],
        ops: &OpArena,
        graph: &RelationGraph,
    ) -> Result<Self, ReconcileError> {
        if changes.len() == 2 && ops.get(changes[0]).side == ops.get(changes[1]).side {
            return Err(ReconcileError::SideMismatch {
                detail: format!(
                    "{} and {} are both on the {} side",
                    changes[0],
                    changes[1],
                    ops.get(changes[0]).side
                ),
            });
        }
        let mut block = Self::new();
        for &op in changes {
            block.absorb(op, ops, graph)?;
        }
        Ok(block)
    }

    /// Add an operation to the composite of its side.
    pub fn absorb(
        &mut self,
        op: OpId,
        ops: &OpArena,
        graph: &RelationGraph,
    ) -> Result<(), ReconcileError> {
        match ops.get(op).side {
            Side::Left => self.left.insert(op, ops, graph),
            Side::Right => self.right.insert(op, ops, graph),
            other => Err(ReconcileError::SideMismatch {
                detail: format!("{op} carries non-derivative side '{other}'"),
            }),
        }
    }

    /// The left-side composite.
    #[must_use]
    pub const fn left(&self) -> &Composite {
        &self.left
    }

    /// The right-side composite.
    #[must_use]
    pub const fn right(&self) -> &Composite {
        &self.right
    }

    /// Returns `true` if `op` belongs to either composite.
    #[must_use]
    pub fn contains(&self, op: OpId) -> bool {
        self.left.contains(op) || self.right.contains(op)
    }

    /// All members, left composite first.
    pub fn members(&self) -> impl Iterator<Item = OpId> + '_ {
        self.left
            .members()
            .iter()
            .chain(self.right.members())
            .copied()
    }

    /// A block is in conflict only when both composites are non-empty.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        !self.left.is_empty() && !self.right.is_empty()
    }

    /// Delegated before-query: true if either composite reports true.
    #[must_use]
    pub fn any_before(&self, other: OpId, graph: &RelationGraph) -> bool {
        self.left.any_before(other, graph) || self.right.any_before(other, graph)
    }

    /// Resolution status.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// The chosen resolution side (`None` while unresolved).
    #[must_use]
    pub const fn resolution(&self) -> Side {
        self.resolution
    }

    /// Mark the block resolved toward `side`.
    pub fn set_resolved(&mut self, side: Side) {
        self.resolved = true;
        self.resolution = side;
    }

    /// Clear resolution status (e.g. before re-running resolution).
    pub fn reset_resolved(&mut self) {
        self.resolved = false;
        self.resolution = Side::None;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
