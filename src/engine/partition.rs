//! PARTITION phase: group conflicting operations into contradiction blocks.
//!
//! Walks the CONFLICT edges recorded during precedence and unions the
//! touched operations into [`ContradictBlock`]s, merging blocks when an edge
//! bridges two existing ones. Operations with no conflict edge stay outside
//! any block. The result is the node list the ordering phase linearizes:
//! every non-conflicted operation as its own node, every block as one node.

use std::collections::BTreeMap;

use crate::error::ReconcileError;
use crate::op::{ContradictBlock, OpArena, OpId, RelationGraph};

// ---------------------------------------------------------------------------
// ChangeNode / Partition
// ---------------------------------------------------------------------------

/// One schedulable unit: a lone operation or a whole contradiction block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeNode {
    /// A non-conflicted atomic operation.
    Op(OpId),
    /// Index into the partition's block list.
    Block(usize),
}

/// The partitioned session: schedulable nodes plus the blocks they refer to.
#[derive(Debug, Default)]
pub struct Partition {
    /// Nodes in extraction order (a block appears at its first member's
    /// position).
    pub nodes: Vec<ChangeNode>,
    /// All contradiction blocks.
    pub blocks: Vec<ContradictBlock>,
}

// ---------------------------------------------------------------------------
// partition
// ---------------------------------------------------------------------------

/// Partition the session's operations along the graph's CONFLICT edges.
pub fn partition(ops: &OpArena, graph: &RelationGraph) -> Result<Partition, ReconcileError> {
    // Union conflicted ops into blocks. Conflict edges are recorded in both
    // directions, so a single pass over all ops sees every pair.
    let mut membership: BTreeMap<OpId, usize> = BTreeMap::new();
    let mut slots: Vec<Option<ContradictBlock>> = Vec::new();

    for (id, _) in ops.iter() {
        for other in graph.conflicts_of(id) {
            match (membership.get(&id).copied(), membership.get(&other).copied()) {
                (None, None) => {
                    let mut block = ContradictBlock::new();
                    block.absorb(id, ops, graph)?;
                    block.absorb(other, ops, graph)?;
                    membership.insert(id, slots.len());
                    membership.insert(other, slots.len());
                    slots.push(Some(block));
                }
                (Some(slot), None) => {
                    if let Some(block) = slots[slot].as_mut() {
                        block.absorb(other, ops, graph)?;
                    }
                    membership.insert(other, slot);
                }
                (None, Some(slot)) => {
                    if let Some(block) = slots[slot].as_mut() {
                        block.absorb(id, ops, graph)?;
                    }
                    membership.insert(id, slot);
                }
                (Some(keep), Some(merge)) if keep != merge => {
                    // The edge bridges two blocks: fold the later one into
                    // the earlier, leaving a tombstone.
                    let (keep, merge) = if keep < merge { (keep, merge) } else { (merge, keep) };
                    if let Some(folded) = slots[merge].take() {
                        let members: Vec<OpId> = folded.members().collect();
                        for member in members {
                            if let Some(block) = slots[keep].as_mut() {
                                block.absorb(member, ops, graph)?;
                            }
                            membership.insert(member, keep);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    // Compact away tombstones and remap slot indices.
    let mut remap: BTreeMap<usize, usize> = BTreeMap::new();
    let mut blocks = Vec::new();
    for (slot, block) in slots.into_iter().enumerate() {
        if let Some(block) = block {
            remap.insert(slot, blocks.len());
            blocks.push(block);
        }
    }

    // Node list in extraction order; a block enters at its first member.
    let mut nodes = Vec::new();
    let mut emitted = vec![false; blocks.len()];
    for (id, _) in ops.iter() {
        match membership.get(&id) {
            Some(slot) => {
                let index = remap[slot];
                if !emitted[index] {
                    emitted[index] = true;
                    nodes.push(ChangeNode::Block(index));
                }
            }
            None => nodes.push(ChangeNode::Op(id)),
        }
    }

    tracing::debug!(
        ops = ops.len(),
        blocks = blocks.len(),
        nodes = nodes.len(),
        "partitioned session"
    );
    Ok(Partition { nodes, blocks })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ElementId;
    use crate::op::{AtomicOp, OpKind, Relation, Side};

    fn arena_of(sides: &[Side]) -> (OpArena, Vec<OpId>) {
        let mut arena = OpArena::new();
        let ids = sides
            .iter()
            .enumerate()
            .map(|(i, &side)| {
                arena
                    .push(AtomicOp {
                        side,
                        kind: OpKind::Add,
                        target: ElementId::new(u32::try_from(i).unwrap()),
                        updated: None,
                        type_tag: "Class".to_owned(),
                    })
                    .unwrap()
            })
            .collect();
        (arena, ids)
    }

    fn conflict(graph: &mut RelationGraph, a: OpId, b: OpId) {
        graph.add_relation(a, b, Relation::Conflict);
        graph.add_relation(b, a, Relation::Conflict);
    }

    #[test]
    fn no_conflicts_yields_only_op_nodes() {
        let (ops, ids) = arena_of(&[Side::Left, Side::Right]);
        let graph = RelationGraph::with_capacity(2);
        let p = partition(&ops, &graph).unwrap();
        assert!(p.blocks.is_empty());
        assert_eq!(p.nodes, vec![ChangeNode::Op(ids[0]), ChangeNode::Op(ids[1])]);
    }

    #[test]
    fn one_conflict_pair_forms_one_block() {
        let (ops, ids) = arena_of(&[Side::Left, Side::Right, Side::Left]);
        let mut graph = RelationGraph::with_capacity(3);
        conflict(&mut graph, ids[0], ids[1]);

        let p = partition(&ops, &graph).unwrap();
        assert_eq!(p.blocks.len(), 1);
        assert!(p.blocks[0].contains(ids[0]));
        assert!(p.blocks[0].contains(ids[1]));
        assert_eq!(p.nodes, vec![ChangeNode::Block(0), ChangeNode::Op(ids[2])]);
    }

    // Two conflict pairs sharing an op collapse into one block.
    #[test]
    fn shared_op_unions_blocks() {
        let (ops, ids) = arena_of(&[Side::Left, Side::Right, Side::Right]);
        let mut graph = RelationGraph::with_capacity(3);
        conflict(&mut graph, ids[0], ids[1]);
        conflict(&mut graph, ids[0], ids[2]);

        let p = partition(&ops, &graph).unwrap();
        assert_eq!(p.blocks.len(), 1);
        assert_eq!(p.blocks[0].members().count(), 3);
    }

    // An edge bridging two independently formed blocks merges them.
    #[test]
    fn bridging_edge_merges_blocks() {
        let (ops, ids) = arena_of(&[Side::Left, Side::Right, Side::Left, Side::Right]);
        let mut graph = RelationGraph::with_capacity(4);
        conflict(&mut graph, ids[0], ids[1]);
        conflict(&mut graph, ids[2], ids[3]);
        conflict(&mut graph, ids[1], ids[2]);

        let p = partition(&ops, &graph).unwrap();
        assert_eq!(p.blocks.len(), 1);
        assert_eq!(p.blocks[0].members().count(), 4);
        assert_eq!(p.nodes, vec![ChangeNode::Block(0)]);
    }

    #[test]
    fn independent_conflicts_stay_separate() {
        let (ops, ids) = arena_of(&[Side::Left, Side::Right, Side::Left, Side::Right]);
        let mut graph = RelationGraph::with_capacity(4);
        conflict(&mut graph, ids[0], ids[1]);
        conflict(&mut graph, ids[2], ids[3]);

        let p = partition(&ops, &graph).unwrap();
        assert_eq!(p.blocks.len(), 2);
        assert_eq!(p.nodes, vec![ChangeNode::Block(0), ChangeNode::Block(1)]);
    }

    // Block members keep same-side dependency order when absorbed.
    #[test]
    fn block_members_respect_before_edges() {
        let (ops, ids) = arena_of(&[Side::Left, Side::Left, Side::Right]);
        let mut graph = RelationGraph::with_capacity(3);
        graph.add_relation(ids[1], ids[0], Relation::Before);
        conflict(&mut graph, ids[0], ids[2]);
        conflict(&mut graph, ids[1], ids[2]);

        let p = partition(&ops, &graph).unwrap();
        assert_eq!(p.blocks.len(), 1);
        assert_eq!(p.blocks[0].left().members(), &[ids[1], ids[0]]);
    }
}
