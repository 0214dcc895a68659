//! The reconciliation pipeline.
//!
//! [`Reconciler::reconcile`] runs the four phases in order over one pair of
//! edit sets:
//!   1. **precedence** — derive BEFORE/CONFLICT relations pairwise,
//!   2. **partition** — union conflicting operations into contradiction
//!      blocks,
//!   3. **resolve** — attempt automatic resolution per block,
//!   4. **order** — linearize everything into a replayable change sequence.
//!
//! The phases share no hidden state: operations live in an [`OpArena`],
//! relations in a [`RelationGraph`], and each phase's signature names what
//! it reads and what it mutates. The tables driving phases 1 and 3 come from
//! the builtin policy or from external table files via
//! [`Reconciler::from_config`].

use std::fs;

use serde::{Deserialize, Serialize};

use crate::config::RemeldConfig;
use crate::error::ReconcileError;
use crate::model::{ElementId, ModelView};
use crate::op::{AtomicOp, ContradictBlock, OpArena, OpId, OpKind, RelationGraph, Side};
use crate::table::{TableDef, parse};

pub mod order;
pub mod partition;
pub mod precedence;
pub mod resolve;
pub mod rules;

#[cfg(all(test, feature = "proptests"))]
mod determinism_tests;

pub use partition::{ChangeNode, Partition};
pub use precedence::PairCtx;
pub use resolve::ResolveCtx;
pub use rules::{BUILTIN_BEFORE, BUILTIN_RESOLVE, default_before_defs, default_resolve_defs};

// ---------------------------------------------------------------------------
// Edit
// ---------------------------------------------------------------------------

/// One input edit descriptor, as produced by the upstream differencing
/// stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Edit {
    /// Which derivative the edit came from.
    pub side: Side,
    /// Add, alter, or delete.
    pub kind: OpKind,
    /// The element the edit targets.
    pub target: ElementId,
    /// The post-edit snapshot (alters only).
    #[serde(default)]
    pub updated: Option<ElementId>,
    /// Element-type tag, e.g. `"Class"`.
    pub type_tag: String,
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// A configured reconciliation engine: parsed table definitions plus
/// ordering limits, reusable across sessions.
#[derive(Debug)]
pub struct Reconciler {
    before_defs: Vec<TableDef>,
    resolve_defs: Vec<TableDef>,
    max_passes: Option<usize>,
}

impl Reconciler {
    /// Engine with the builtin rule policy.
    pub fn new() -> Result<Self, ReconcileError> {
        Ok(Self {
            before_defs: default_before_defs()?,
            resolve_defs: default_resolve_defs()?,
            max_passes: None,
        })
    }

    /// Engine with table files and limits from a configuration; unset fields
    /// fall back to the builtins.
    pub fn from_config(config: &RemeldConfig) -> Result<Self, ReconcileError> {
        let before_defs = match &config.tables.before {
            Some(path) => parse(&fs::read_to_string(path)?, &path.display().to_string())?,
            None => default_before_defs()?,
        };
        let resolve_defs = match &config.tables.resolve {
            Some(path) => parse(&fs::read_to_string(path)?, &path.display().to_string())?,
            None => default_resolve_defs()?,
        };
        Ok(Self {
            before_defs,
            resolve_defs,
            max_passes: config.ordering.max_passes,
        })
    }

    /// Override the ordering pass limit.
    #[must_use]
    pub const fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = Some(max_passes);
        self
    }

    /// Run one reconciliation session over two edit sets.
    ///
    /// The model is mutated only by resolution actions (currently: renaming
    /// colliding added elements apart).
    pub fn reconcile(
        &self,
        model: &mut dyn ModelView,
        edits: &[Edit],
    ) -> Result<Reconciliation, ReconcileError> {
        let mut ops = OpArena::new();
        for edit in edits {
            ops.push(AtomicOp {
                side: edit.side,
                kind: edit.kind,
                target: edit.target,
                updated: edit.updated,
                type_tag: edit.type_tag.clone(),
            })?;
        }
        tracing::debug!(ops = ops.len(), "session extracted");

        let mut graph = RelationGraph::with_capacity(ops.len());
        precedence::compute(&ops, &*model, &self.before_defs, &mut graph)?;

        let Partition { mut nodes, mut blocks } = partition::partition(&ops, &graph)?;
        resolve::resolve_blocks(&mut blocks, &ops, model, &self.resolve_defs)?;
        order::order_nodes(&mut nodes, &blocks, &graph, self.max_passes)?;

        Ok(Reconciliation {
            ops,
            graph,
            blocks,
            sequence: nodes,
        })
    }
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// Disposition of one scheduled change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeStatus {
    /// Never conflicted.
    Clean,
    /// Conflicted, automatically resolved.
    Resolved,
    /// Conflicted, needs a manual decision.
    Unresolved,
}

/// One entry of the final change sequence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledChange {
    /// The operations to replay, in dependency order.
    pub ops: Vec<OpId>,
    /// The side to keep: the operation's own side for clean changes, the
    /// chosen resolution for blocks (`None` while unresolved).
    pub resolution: Side,
    /// Disposition.
    pub status: ChangeStatus,
}

/// Everything one session produced.
#[derive(Debug)]
pub struct Reconciliation {
    /// All extracted operations.
    pub ops: OpArena,
    /// The derived relations.
    pub graph: RelationGraph,
    /// All contradiction blocks, resolved or not.
    pub blocks: Vec<ContradictBlock>,
    /// The linearized change sequence.
    pub sequence: Vec<ChangeNode>,
}

impl Reconciliation {
    /// Flatten the sequence into replayable entries.
    #[must_use]
    pub fn schedule(&self) -> Vec<ScheduledChange> {
        self.sequence
            .iter()
            .map(|node| match node {
                ChangeNode::Op(id) => ScheduledChange {
                    ops: vec![*id],
                    resolution: self.ops.get(*id).side,
                    status: ChangeStatus::Clean,
                },
                ChangeNode::Block(index) => {
                    let block = &self.blocks[*index];
                    ScheduledChange {
                        ops: block.members().collect(),
                        resolution: block.resolution(),
                        status: if block.is_resolved() {
                            ChangeStatus::Resolved
                        } else {
                            ChangeStatus::Unresolved
                        },
                    }
                }
            })
            .collect()
    }

    /// The schedule as pretty-printed JSON, for reports and tooling.
    pub fn schedule_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.schedule())
    }

    /// Number of blocks still needing a manual decision.
    #[must_use]
    pub fn unresolved_count(&self) -> usize {
        self.blocks.iter().filter(|b| !b.is_resolved()).count()
    }

    /// Returns `true` if every change is clean or automatically resolved.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.unresolved_count() == 0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
