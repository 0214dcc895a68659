//! ORDER phase: linearize nodes into a replayable change sequence.
//!
//! Three steps:
//!   1. a stable rank sort segregating categories — non-conflicted
//!      operations, then resolved blocks, then unresolved blocks;
//!   2. dependency passes that move a node back behind anything it depends
//!      on, bounded by a pass limit (node count by default) that turns
//!      non-convergence into a [`ReconcileError::CircularReference`];
//!   3. a compaction pass hopping non-conflicted operations forward past
//!      adjacent blocks they do not depend on, so clean changes are not
//!      trapped behind unrelated conflicts.

use crate::error::ReconcileError;
use crate::op::{ContradictBlock, RelationGraph};

use super::partition::ChangeNode;

// ---------------------------------------------------------------------------
// node ordering
// ---------------------------------------------------------------------------

fn rank(node: &ChangeNode, blocks: &[ContradictBlock]) -> u8 {
    match node {
        ChangeNode::Op(_) => 0,
        ChangeNode::Block(index) => {
            if blocks[*index].is_resolved() {
                1
            } else {
                2
            }
        }
    }
}

/// Direct dependency between two nodes, delegating block queries to their
/// members.
fn node_before(
    a: &ChangeNode,
    b: &ChangeNode,
    blocks: &[ContradictBlock],
    graph: &RelationGraph,
) -> bool {
    match (a, b) {
        (ChangeNode::Op(x), ChangeNode::Op(y)) => graph.is_before(*x, *y),
        (ChangeNode::Op(x), ChangeNode::Block(j)) => {
            blocks[*j].members().any(|m| graph.is_before(*x, m))
        }
        (ChangeNode::Block(i), ChangeNode::Op(y)) => blocks[*i].any_before(*y, graph),
        (ChangeNode::Block(i), ChangeNode::Block(j)) => blocks[*j]
            .members()
            .any(|m| blocks[*i].any_before(m, graph)),
    }
}

// ---------------------------------------------------------------------------
// order_nodes
// ---------------------------------------------------------------------------

/// Order `nodes` in place. `max_passes` overrides the default dependency
/// pass limit (the node count).
pub fn order_nodes(
    nodes: &mut [ChangeNode],
    blocks: &[ContradictBlock],
    graph: &RelationGraph,
    max_passes: Option<usize>,
) -> Result<(), ReconcileError> {
    let n = nodes.len();
    if n < 2 {
        return Ok(());
    }

    // Category segregation. The sort is stable, so extraction order is
    // preserved within each category.
    nodes.sort_by_key(|node| rank(node, blocks));

    // Dependency passes: when a later node must precede an earlier one, the
    // earlier node steps back behind it (a left rotation of the span, which
    // keeps the relative order of everything in between). Mutually dependent
    // nodes chase each other instead of settling, so exhausting the pass
    // limit while still moving is a cycle.
    let limit = max_passes.unwrap_or(n).max(1);
    let mut passes = 0;
    loop {
        let mut moved = false;
        for i in 0..n - 1 {
            for j in i + 1..n {
                if node_before(&nodes[j], &nodes[i], blocks, graph) {
                    nodes[i..=j].rotate_left(1);
                    moved = true;
                }
            }
        }
        if !moved {
            break;
        }
        passes += 1;
        if passes >= limit {
            return Err(ReconcileError::CircularReference {
                context: "change ordering".to_owned(),
            });
        }
    }
    tracing::debug!(nodes = n, passes, "change sequence converged");

    // Compaction: let each lone operation hop forward over adjacent blocks
    // it does not depend on.
    for i in 1..n {
        if !matches!(nodes[i], ChangeNode::Op(_)) {
            continue;
        }
        let mut j = i;
        while j > 0
            && matches!(nodes[j - 1], ChangeNode::Block(_))
            && !node_before(&nodes[j - 1], &nodes[j], blocks, graph)
        {
            nodes.swap(j - 1, j);
            j -= 1;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ElementId;
    use crate::op::{AtomicOp, OpArena, OpId, OpKind, Relation, Side};

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

    fn block_of(ops: &OpArena, graph: &RelationGraph, members: &[OpId]) -> ContradictBlock {
        ContradictBlock::from_ops(members, ops, graph).unwrap()
    }

    // A dependency chain is linearized even when its links start far apart.
    #[test]
    fn dependencies_come_first() {
        let (_ops, ids) = arena_of(&[Side::Left, Side::Left, Side::Left]);
        let mut graph = RelationGraph::with_capacity(3);
        // ids[2] before ids[1] before ids[0].
        graph.add_relation(ids[2], ids[1], Relation::Before);
        graph.add_relation(ids[1], ids[0], Relation::Before);

        let mut nodes = vec![
            ChangeNode::Op(ids[0]),
            ChangeNode::Op(ids[1]),
            ChangeNode::Op(ids[2]),
        ];
        order_nodes(&mut nodes, &[], &graph, None).unwrap();
        assert_eq!(
            nodes,
            vec![
                ChangeNode::Op(ids[2]),
                ChangeNode::Op(ids[1]),
                ChangeNode::Op(ids[0]),
            ]
        );
    }

    // Clean ops, then resolved blocks, then unresolved blocks.
    #[test]
    fn categories_are_segregated() {
        let (ops, ids) = arena_of(&[Side::Left, Side::Right, Side::Left, Side::Right, Side::Left]);
        let graph = RelationGraph::with_capacity(5);
        let mut resolved = block_of(&ops, &graph, &[ids[0], ids[1]]);
        resolved.set_resolved(Side::Left);
        let unresolved = block_of(&ops, &graph, &[ids[2], ids[3]]);
        let blocks = vec![unresolved, resolved];

        let mut nodes = vec![
            ChangeNode::Block(0),
            ChangeNode::Block(1),
            ChangeNode::Op(ids[4]),
        ];
        order_nodes(&mut nodes, &blocks, &graph, None).unwrap();
        assert_eq!(
            nodes,
            vec![
                ChangeNode::Op(ids[4]),
                ChangeNode::Block(1),
                ChangeNode::Block(0),
            ]
        );
    }

    // A clean op that depends on a block member steps back behind the block,
    // overriding category segregation.
    #[test]
    fn block_dependency_overrides_category() {
        let (ops, ids) = arena_of(&[Side::Left, Side::Right, Side::Left]);
        let mut graph = RelationGraph::with_capacity(3);
        graph.add_relation(ids[0], ids[2], Relation::Before);
        let blocks = vec![block_of(&ops, &graph, &[ids[0], ids[1]])];

        let mut nodes = vec![ChangeNode::Op(ids[2]), ChangeNode::Block(0)];
        order_nodes(&mut nodes, &blocks, &graph, None).unwrap();
        assert_eq!(nodes, vec![ChangeNode::Block(0), ChangeNode::Op(ids[2])]);
    }

    // Only the dependent op steps back behind the block; an unrelated clean
    // op stays ahead of it.
    #[test]
    fn unrelated_op_is_not_trapped_behind_blocks() {
        let (ops, ids) = arena_of(&[Side::Left, Side::Right, Side::Left, Side::Left]);
        let mut graph = RelationGraph::with_capacity(4);
        graph.add_relation(ids[0], ids[2], Relation::Before);
        let blocks = vec![block_of(&ops, &graph, &[ids[0], ids[1]])];

        let mut nodes = vec![
            ChangeNode::Op(ids[2]),
            ChangeNode::Op(ids[3]),
            ChangeNode::Block(0),
        ];
        order_nodes(&mut nodes, &blocks, &graph, None).unwrap();
        assert_eq!(
            nodes,
            vec![
                ChangeNode::Op(ids[3]),
                ChangeNode::Block(0),
                ChangeNode::Op(ids[2]),
            ]
        );
    }

    // A mutually dependent pair never settles: the pass limit turns the
    // oscillation into a circular-reference error.
    #[test]
    fn mutual_dependency_is_a_cycle() {
        let (_ops, ids) = arena_of(&[Side::Left, Side::Left]);
        let mut graph = RelationGraph::with_capacity(2);
        graph.add_relation(ids[0], ids[1], Relation::Before);
        graph.add_relation(ids[1], ids[0], Relation::Before);

        let mut nodes = vec![ChangeNode::Op(ids[0]), ChangeNode::Op(ids[1])];
        let err = order_nodes(&mut nodes, &[], &graph, None).unwrap_err();
        assert!(matches!(err, ReconcileError::CircularReference { .. }));
    }

    // A three-op dependency cycle is also caught by the pass limit.
    #[test]
    fn three_op_cycle_is_detected() {
        let (_ops, ids) = arena_of(&[Side::Left, Side::Left, Side::Left]);
        let mut graph = RelationGraph::with_capacity(3);
        graph.add_relation(ids[0], ids[1], Relation::Before);
        graph.add_relation(ids[1], ids[2], Relation::Before);
        graph.add_relation(ids[2], ids[0], Relation::Before);

        let mut nodes = vec![
            ChangeNode::Op(ids[0]),
            ChangeNode::Op(ids[1]),
            ChangeNode::Op(ids[2]),
        ];
        let err = order_nodes(&mut nodes, &[], &graph, None).unwrap_err();
        assert!(matches!(err, ReconcileError::CircularReference { .. }));
    }

    #[test]
    fn single_node_is_a_no_op() {
        let (_ops, ids) = arena_of(&[Side::Left]);
        let graph = RelationGraph::with_capacity(1);
        let mut nodes = vec![ChangeNode::Op(ids[0])];
        order_nodes(&mut nodes, &[], &graph, None).unwrap();
        assert_eq!(nodes, vec![ChangeNode::Op(ids[0])]);
    }
}
