//! Property tests for reconciliation determinism.
//!
//! The pipeline (precedence → partition → resolve → order) must be
//! deterministic: rebuilding the same model and edit sets and reconciling
//! again must produce an identical schedule, and the schedule must satisfy
//! the structural invariants regardless of scenario shape:
//!
//! - every extracted operation appears in exactly one schedule entry;
//! - operations in different entries never conflict with each other;
//! - for flat scenarios (no containment dependencies) the entry statuses
//!   are segregated: clean, then resolved, then unresolved.
//!
//! Run with `cargo test --features proptests`.

#![allow(clippy::all, clippy::pedantic, clippy::nursery)]

use std::collections::BTreeSet;

use proptest::prelude::*;

use crate::engine::{ChangeStatus, Edit, Reconciler};
use crate::model::ElementStore;
use crate::op::{OpId, OpKind, Relation, Side};

// ---------------------------------------------------------------------------
// Scenario generation
// ---------------------------------------------------------------------------

/// What both sides did to one matched base element.
#[derive(Clone, Copy, Debug)]
enum PairEdit {
    /// Neither side touched it.
    Keep,
    /// Both altered it identically.
    SameAlter,
    /// Each side altered a different attribute.
    DisjointAlter,
    /// Both altered the same attribute to different values.
    OverlappingAlter,
    /// Only the left side deleted it.
    LeftDelete,
    /// Both sides deleted it.
    BothDelete,
    /// Left altered it, right deleted it.
    AlterDelete,
}

/// One pair of independently added elements the matcher linked.
#[derive(Clone, Copy, Debug)]
struct AddPair {
    /// Same name on both sides (rename-resolvable) or different names
    /// (unresolvable).
    clash: bool,
}

fn pair_edit() -> impl Strategy<Value = PairEdit> {
    prop_oneof![
        Just(PairEdit::Keep),
        Just(PairEdit::SameAlter),
        Just(PairEdit::DisjointAlter),
        Just(PairEdit::OverlappingAlter),
        Just(PairEdit::LeftDelete),
        Just(PairEdit::BothDelete),
        Just(PairEdit::AlterDelete),
    ]
}

fn add_pair() -> impl Strategy<Value = AddPair> {
    any::<bool>().prop_map(|clash| AddPair { clash })
}

fn scenario() -> impl Strategy<Value = (Vec<PairEdit>, Vec<AddPair>)> {
    (
        proptest::collection::vec(pair_edit(), 0..8),
        proptest::collection::vec(add_pair(), 0..4),
    )
}

/// Deterministically rebuild the model and edit sets for one scenario.
fn build(pairs: &[PairEdit], adds: &[AddPair]) -> (ElementStore, Vec<Edit>) {
    let mut store = ElementStore::new();
    let mut edits = Vec::new();

    let mut edit = |side, kind, target, updated| Edit {
        side,
        kind,
        target,
        updated,
        type_tag: "Class".to_owned(),
    };

    for (i, pair) in pairs.iter().enumerate() {
        let name = format!("E{i}");
        let left = store.add("Class", Some(&name), None);
        let right = store.add("Class", Some(&name), None);
        store.link(left, right);

        match pair {
            PairEdit::Keep => {}
            PairEdit::SameAlter => {
                let ul = store.add("Class", Some(&name), None);
                store.set_attr(ul, "a", "1");
                let ur = store.add("Class", Some(&name), None);
                store.set_attr(ur, "a", "1");
                edits.push(edit(Side::Left, OpKind::Alter, left, Some(ul)));
                edits.push(edit(Side::Right, OpKind::Alter, right, Some(ur)));
            }
            PairEdit::DisjointAlter => {
                let ul = store.add("Class", Some(&name), None);
                store.set_attr(ul, "a", "1");
                let ur = store.add("Class", Some(&name), None);
                store.set_attr(ur, "b", "2");
                edits.push(edit(Side::Left, OpKind::Alter, left, Some(ul)));
                edits.push(edit(Side::Right, OpKind::Alter, right, Some(ur)));
            }
            PairEdit::OverlappingAlter => {
                let ul = store.add("Class", Some(&name), None);
                store.set_attr(ul, "a", "1");
                let ur = store.add("Class", Some(&name), None);
                store.set_attr(ur, "a", "2");
                edits.push(edit(Side::Left, OpKind::Alter, left, Some(ul)));
                edits.push(edit(Side::Right, OpKind::Alter, right, Some(ur)));
            }
            PairEdit::LeftDelete => {
                edits.push(edit(Side::Left, OpKind::Delete, left, None));
            }
            PairEdit::BothDelete => {
                edits.push(edit(Side::Left, OpKind::Delete, left, None));
                edits.push(edit(Side::Right, OpKind::Delete, right, None));
            }
            PairEdit::AlterDelete => {
                let ul = store.add("Class", Some(&name), None);
                store.set_attr(ul, "a", "1");
                edits.push(edit(Side::Left, OpKind::Alter, left, Some(ul)));
                edits.push(edit(Side::Right, OpKind::Delete, right, None));
            }
        }
    }

    for (i, add) in adds.iter().enumerate() {
        let left_name = format!("N{i}");
        let right_name = if add.clash {
            left_name.clone()
        } else {
            format!("M{i}")
        };
        let left = store.add("Class", Some(&left_name), None);
        let right = store.add("Class", Some(&right_name), None);
        store.link(left, right);
        edits.push(edit(Side::Left, OpKind::Add, left, None));
        edits.push(edit(Side::Right, OpKind::Add, right, None));
    }

    (store, edits)
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn reconciliation_is_deterministic((pairs, adds) in scenario()) {
        let engine = Reconciler::new().unwrap();

        let (mut store_a, edits_a) = build(&pairs, &adds);
        let result_a = engine.reconcile(&mut store_a, &edits_a).unwrap();

        let (mut store_b, edits_b) = build(&pairs, &adds);
        let result_b = engine.reconcile(&mut store_b, &edits_b).unwrap();

        prop_assert_eq!(result_a.schedule(), result_b.schedule());
        prop_assert_eq!(result_a.unresolved_count(), result_b.unresolved_count());
    }

    #[test]
    fn every_op_is_scheduled_exactly_once((pairs, adds) in scenario()) {
        let engine = Reconciler::new().unwrap();
        let (mut store, edits) = build(&pairs, &adds);
        let result = engine.reconcile(&mut store, &edits).unwrap();

        let mut seen: BTreeSet<OpId> = BTreeSet::new();
        for entry in result.schedule() {
            for op in entry.ops {
                prop_assert!(seen.insert(op), "{op} scheduled twice");
            }
        }
        prop_assert_eq!(seen.len(), edits.len());
    }

    #[test]
    fn conflicts_never_cross_schedule_entries((pairs, adds) in scenario()) {
        let engine = Reconciler::new().unwrap();
        let (mut store, edits) = build(&pairs, &adds);
        let result = engine.reconcile(&mut store, &edits).unwrap();

        let schedule = result.schedule();
        for (i, entry) in schedule.iter().enumerate() {
            for other in schedule.iter().skip(i + 1) {
                for &a in &entry.ops {
                    for &b in &other.ops {
                        prop_assert_ne!(result.graph.relation(a, b), Some(Relation::Conflict));
                        prop_assert_ne!(result.graph.relation(b, a), Some(Relation::Conflict));
                    }
                }
            }
        }
    }

    // Flat scenarios carry no containment dependencies, so the category
    // segregation is exact.
    #[test]
    fn flat_scenarios_segregate_statuses((pairs, adds) in scenario()) {
        let engine = Reconciler::new().unwrap();
        let (mut store, edits) = build(&pairs, &adds);
        let result = engine.reconcile(&mut store, &edits).unwrap();

        let rank = |status: ChangeStatus| match status {
            ChangeStatus::Clean => 0,
            ChangeStatus::Resolved => 1,
            ChangeStatus::Unresolved => 2,
        };
        let ranks: Vec<u8> = result.schedule().iter().map(|c| rank(c.status)).collect();
        prop_assert!(ranks.windows(2).all(|w| w[0] <= w[1]), "statuses out of order: {ranks:?}");
    }
}
