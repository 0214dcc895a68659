//! RESOLVE phase: attempt automatic resolution of contradiction blocks.
//!
//! Runs the resolve table once per block. A fired rule accumulates a side
//! choice into the outcome; a non-`None` side marks the block resolved.
//! Blocks no rule matches stay unresolved — they are still ordered and
//! reported, the engine just makes no choice for them.

use crate::error::ReconcileError;
use crate::model::ModelView;
use crate::op::{ContradictBlock, OpArena, Side};
use crate::table::{DecisionTable, TableDef};

use super::rules::{find_def, resolve_bindings};

// ---------------------------------------------------------------------------
// ResolveCtx
// ---------------------------------------------------------------------------

/// Evaluation context for the resolve table: one block under scrutiny.
///
/// Holds the whole block slice plus a cursor rather than a block reference,
/// so one context (and one table binding) serves the whole phase.
pub struct ResolveCtx<'a> {
    /// All contradiction blocks of the session.
    pub blocks: &'a [ContradictBlock],
    /// Index of the block under scrutiny.
    pub index: usize,
    /// All operations of the session.
    pub ops: &'a OpArena,
    /// Element queries, mutable for the rename resolution.
    pub model: &'a mut (dyn ModelView + 'a),
}

impl ResolveCtx<'_> {
    /// The block under scrutiny.
    #[must_use]
    pub fn block(&self) -> &ContradictBlock {
        &self.blocks[self.index]
    }
}

// ---------------------------------------------------------------------------
// resolve_blocks
// ---------------------------------------------------------------------------

/// Run the resolve table over every block, marking the resolved ones.
pub fn resolve_blocks(
    blocks: &mut [ContradictBlock],
    ops: &OpArena,
    model: &mut dyn ModelView,
    defs: &[TableDef],
) -> Result<(), ReconcileError> {
    let bindings = resolve_bindings();
    let error = DecisionTable::from_def(find_def(defs, "resolve-error")?, &bindings)?;
    let table = DecisionTable::from_def(find_def(defs, "resolve")?, &bindings)?.with_aux(error);

    // Outcomes are collected first: rule actions borrow the blocks read-only
    // (and the model mutably), resolution marks need the blocks mutably.
    let outcomes = {
        let mut ctx = ResolveCtx {
            blocks: &*blocks,
            index: 0,
            ops,
            model: &mut *model,
        };
        let mut outcomes = Vec::with_capacity(ctx.blocks.len());
        for index in 0..ctx.blocks.len() {
            ctx.index = index;
            outcomes.push(table.run(&mut ctx)?);
        }
        outcomes
    };

    for (index, (block, outcome)) in blocks.iter_mut().zip(outcomes).enumerate() {
        if outcome.side == Side::None {
            tracing::debug!(block = index, "block left unresolved");
        } else {
            tracing::debug!(block = index, side = %outcome.side, "block resolved");
            block.set_resolved(outcome.side);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
