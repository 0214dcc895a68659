//! PRECEDENCE phase: derive BEFORE/CONFLICT relations between atomic edits.
//!
//! Applies the layered before-tables to every relevant ordered pair of
//! atomic operations, across all four quadrants: left×left, right×right,
//! left×right, right×left. Same-side pairs go through the same-side table
//! (containment-dependency cases); cross-side pairs go through the
//! cross-side table, which delegates malformed-input detection to the error
//! table via its auxiliary condition.
//!
//! Conflicts are never tested for directly: when a cross-side pair is BEFORE
//! in *both* directions, the mutual precedence is reclassified as CONFLICT
//! on both edges. Mutual precedence is evidence of contradiction, not of a
//! cyclic ordering.

use crate::error::ReconcileError;
use crate::model::{ElementId, ModelView};
use crate::op::{AtomicOp, OpArena, OpId, Relation, RelationGraph, Side};
use crate::table::{DecisionTable, TableDef};

use super::rules::{find_def, pair_bindings};

// ---------------------------------------------------------------------------
// PairCtx
// ---------------------------------------------------------------------------

/// Evaluation context for the before-tables: "is `a` before `b`?"
///
/// One context is built per phase and re-pointed at each pair; condition
/// tests read it, action handlers only write the [`crate::table::Outcome`].
pub struct PairCtx<'a> {
    /// The candidate predecessor.
    pub a: OpId,
    /// The candidate successor.
    pub b: OpId,
    /// All operations of the session.
    pub ops: &'a OpArena,
    /// Element queries.
    pub model: &'a dyn ModelView,
}

impl PairCtx<'_> {
    /// The operation under test as predecessor.
    #[must_use]
    pub fn first(&self) -> &AtomicOp {
        self.ops.get(self.a)
    }

    /// The operation under test as successor.
    #[must_use]
    pub fn second(&self) -> &AtomicOp {
        self.ops.get(self.b)
    }

    /// Strict counterpart lookup: a missing correspondence for an element
    /// that must have one means the upstream matching stage failed, which is
    /// fatal for the whole session.
    pub fn counterpart_required(&self, e: ElementId) -> Result<ElementId, ReconcileError> {
        self.model
            .counterpart(e)
            .ok_or_else(|| ReconcileError::UnmatchedElement {
                element: self.model.describe(e),
            })
    }
}

// ---------------------------------------------------------------------------
// compute
// ---------------------------------------------------------------------------

/// Populate `graph` with BEFORE/CONFLICT relations over all four pair
/// quadrants.
pub fn compute(
    ops: &OpArena,
    model: &dyn ModelView,
    defs: &[TableDef],
    graph: &mut RelationGraph,
) -> Result<(), ReconcileError> {
    let bindings = pair_bindings();
    let same_side = DecisionTable::from_def(find_def(defs, "same-side-before")?, &bindings)?;
    let error = DecisionTable::from_def(find_def(defs, "cross-side-error")?, &bindings)?;
    let cross_side =
        DecisionTable::from_def(find_def(defs, "cross-side-before")?, &bindings)?.with_aux(error);

    let left = ops.side_ops(Side::Left);
    let right = ops.side_ops(Side::Right);

    let mut ctx = PairCtx {
        a: OpId::new(0),
        b: OpId::new(0),
        ops,
        model,
    };

    // Same-side quadrants: left×left, right×right.
    for side_ops in [&left, &right] {
        for &a in side_ops {
            for &b in side_ops {
                if a == b {
                    continue;
                }
                ctx.a = a;
                ctx.b = b;
                // No matching rule means no relation, not an error.
                if same_side.run(&mut ctx)?.result.or_false() {
                    graph.add_relation(a, b, Relation::Before);
                }
            }
        }
    }

    // Cross-side quadrants: left×right and right×left, one pass per pair
    // evaluating both directions so mutual precedence is seen together.
    for &a in &left {
        for &b in &right {
            ctx.a = a;
            ctx.b = b;
            let ab = cross_side.run(&mut ctx)?.result.or_false();
            ctx.a = b;
            ctx.b = a;
            let ba = cross_side.run(&mut ctx)?.result.or_false();

            match (ab, ba) {
                (true, true) => {
                    tracing::debug!(%a, %b, "mutual precedence reclassified as conflict");
                    graph.replace_relation(a, b, Relation::Conflict);
                    graph.replace_relation(b, a, Relation::Conflict);
                }
                (true, false) => graph.add_relation(a, b, Relation::Before),
                (false, true) => graph.add_relation(b, a, Relation::Before),
                (false, false) => {}
            }
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
    use crate::engine::rules::default_before_defs;
    use crate::model::ElementStore;
    use crate::op::OpKind;

    fn push(arena: &mut OpArena, side: Side, kind: OpKind, target: ElementId, updated: Option<ElementId>) -> OpId {
        arena
            .push(AtomicOp {
                side,
                kind,
                target,
                updated,
                type_tag: "Class".to_owned(),
            })
            .unwrap()
    }

    fn run(ops: &OpArena, model: &ElementStore) -> RelationGraph {
        let mut graph = RelationGraph::with_capacity(ops.len());
        compute(ops, model, &default_before_defs().unwrap(), &mut graph).unwrap();
        graph
    }

    // Disjoint adds: no counterpart, no containment — no relation either way.
    #[test]
    fn disjoint_adds_have_no_relation() {
        let mut store = ElementStore::new();
        let x = store.add("Class", Some("X"), None);
        let y = store.add("Class", Some("Y"), None);

        let mut ops = OpArena::new();
        let a = push(&mut ops, Side::Left, OpKind::Add, x, None);
        let b = push(&mut ops, Side::Right, OpKind::Add, y, None);

        let graph = run(&ops, &store);
        assert_eq!(graph.relation(a, b), None);
        assert_eq!(graph.relation(b, a), None);
    }

    // Same side: adding a container orders before adding its member.
    #[test]
    fn same_side_add_container_before_add_member() {
        let mut store = ElementStore::new();
        let pkg = store.add("Package", Some("p"), None);
        let cls = store.add("Class", Some("C"), Some(pkg));

        let mut ops = OpArena::new();
        let add_member = push(&mut ops, Side::Left, OpKind::Add, cls, None);
        let add_container = push(&mut ops, Side::Left, OpKind::Add, pkg, None);

        let graph = run(&ops, &store);
        assert!(graph.is_before(add_container, add_member));
        assert!(!graph.is_before(add_member, add_container));
    }

    // Same side: deleting a member orders before deleting its container.
    #[test]
    fn same_side_delete_member_before_delete_container() {
        let mut store = ElementStore::new();
        let pkg = store.add("Package", Some("p"), None);
        let cls = store.add("Class", Some("C"), Some(pkg));

        let mut ops = OpArena::new();
        let del_container = push(&mut ops, Side::Right, OpKind::Delete, pkg, None);
        let del_member = push(&mut ops, Side::Right, OpKind::Delete, cls, None);

        let graph = run(&ops, &store);
        assert!(graph.is_before(del_member, del_container));
        assert!(!graph.is_before(del_container, del_member));
    }

    // Same side: an alter that moves an element into a newly added container
    // depends on the add; an alter that moves an element out of a container
    // must precede the container's delete.
    #[test]
    fn same_side_move_orders_around_add_and_delete() {
        let mut store = ElementStore::new();
        let old_pkg = store.add("Package", Some("old"), None);
        let new_pkg = store.add("Package", Some("new"), None);
        let cls = store.add("Class", Some("C"), Some(old_pkg));
        let moved = store.add("Class", Some("C"), Some(new_pkg));

        let mut ops = OpArena::new();
        let add_pkg = push(&mut ops, Side::Left, OpKind::Add, new_pkg, None);
        let move_cls = push(&mut ops, Side::Left, OpKind::Alter, cls, Some(moved));
        let del_old = push(&mut ops, Side::Left, OpKind::Delete, old_pkg, None);

        let graph = run(&ops, &store);
        assert!(graph.is_before(add_pkg, move_cls), "add new container first");
        assert!(graph.is_before(move_cls, del_old), "move out before delete");
    }

    // Cross side: both sides alter the same matched element — mutual
    // precedence becomes a CONFLICT edge on both sides.
    #[test]
    fn mutual_precedence_becomes_conflict() {
        let mut store = ElementStore::new();
        let e_left = store.add("Class", Some("E"), None);
        let e_right = store.add("Class", Some("E"), None);
        store.link(e_left, e_right);
        let upd_left = store.add("Class", Some("A"), None);
        let upd_right = store.add("Class", Some("B"), None);

        let mut ops = OpArena::new();
        let l = push(&mut ops, Side::Left, OpKind::Alter, e_left, Some(upd_left));
        let r = push(&mut ops, Side::Right, OpKind::Alter, e_right, Some(upd_right));

        let graph = run(&ops, &store);
        assert_eq!(graph.relation(l, r), Some(Relation::Conflict));
        assert_eq!(graph.relation(r, l), Some(Relation::Conflict));
    }

    // Cross side: alter vs delete of the same matched element conflicts.
    #[test]
    fn alter_delete_conflicts() {
        let mut store = ElementStore::new();
        let e_left = store.add("Class", Some("E"), None);
        let e_right = store.add("Class", Some("E"), None);
        store.link(e_left, e_right);
        let upd = store.add("Class", Some("E2"), None);

        let mut ops = OpArena::new();
        let l = push(&mut ops, Side::Left, OpKind::Alter, e_left, Some(upd));
        let r = push(&mut ops, Side::Right, OpKind::Delete, e_right, None);

        let graph = run(&ops, &store);
        assert_eq!(graph.relation(l, r), Some(Relation::Conflict));
        assert_eq!(graph.relation(r, l), Some(Relation::Conflict));
    }

    // Cross side: a one-directional dependency stays BEFORE. The right side
    // moves a class under a container whose counterpart the left side adds.
    #[test]
    fn cross_side_add_before_move_is_one_directional() {
        let mut store = ElementStore::new();
        let pkg_left = store.add("Package", Some("p"), None);
        let pkg_right = store.add("Package", Some("p"), None);
        store.link(pkg_left, pkg_right);
        let cls = store.add("Class", Some("C"), None);
        let moved = store.add("Class", Some("C"), Some(pkg_right));

        let mut ops = OpArena::new();
        let add_pkg = push(&mut ops, Side::Left, OpKind::Add, pkg_left, None);
        let move_cls = push(&mut ops, Side::Right, OpKind::Alter, cls, Some(moved));

        let graph = run(&ops, &store);
        assert_eq!(graph.relation(add_pkg, move_cls), Some(Relation::Before));
        assert_eq!(graph.relation(move_cls, add_pkg), None);
    }

    // An alter whose target has no counterpart is fatal: the matching stage
    // must resolve all base-element correspondences before reconciliation.
    #[test]
    fn unmatched_alter_target_is_fatal() {
        let mut store = ElementStore::new();
        let e_left = store.add("Class", Some("E"), None);
        let e_right = store.add("Class", Some("F"), None);
        let upd = store.add("Class", Some("E2"), None);
        // No link between e_left and e_right.

        let mut ops = OpArena::new();
        push(&mut ops, Side::Left, OpKind::Alter, e_left, Some(upd));
        push(&mut ops, Side::Right, OpKind::Alter, e_right, Some(upd));

        let mut graph = RelationGraph::with_capacity(ops.len());
        let err = compute(&ops, &store, &default_before_defs().unwrap(), &mut graph).unwrap_err();
        assert!(matches!(err, ReconcileError::UnmatchedElement { .. }));
    }

    // Malformed matching: an add matched against a base-element edit trips
    // the error table.
    #[test]
    fn add_matched_to_base_edit_is_rule_violation() {
        let mut store = ElementStore::new();
        let e_left = store.add("Class", Some("E"), None);
        let e_right = store.add("Class", Some("E"), None);
        store.link(e_left, e_right);
        let upd = store.add("Class", Some("E2"), None);

        let mut ops = OpArena::new();
        // Left altered a base element whose counterpart the right ADDED —
        // the matcher cannot have produced this from a common ancestor.
        push(&mut ops, Side::Left, OpKind::Alter, e_left, Some(upd));
        push(&mut ops, Side::Right, OpKind::Add, e_right, None);

        let mut graph = RelationGraph::with_capacity(ops.len());
        let err = compute(&ops, &store, &default_before_defs().unwrap(), &mut graph).unwrap_err();
        match err {
            ReconcileError::RuleViolation { table, .. } => {
                assert_eq!(table, "cross-side-error");
            }
            other => panic!("expected RuleViolation, got {other}"),
        }
    }
}
