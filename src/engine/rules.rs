//! Built-in rule policy: condition tests, action handlers, and the default
//! table definitions.
//!
//! Every condition and action a table definition may name is registered
//! here, so external table files can rearrange the policy (reorder rules,
//! change priorities, swap resolutions) without touching engine code — but
//! they cannot introduce new behavior. The builtin texts below are the
//! shipped policy; [`default_before_defs`] and [`default_resolve_defs`]
//! parse them once per engine construction.

use crate::error::ReconcileError;
use crate::model::ElementId;
use crate::op::{OpKind, Side};
use crate::table::{Bindings, Outcome, TableDef, parse};

use super::precedence::PairCtx;
use super::resolve::ResolveCtx;

// ---------------------------------------------------------------------------
// Builtin table texts
// ---------------------------------------------------------------------------

/// Default precedence policy: same-side dependency ordering, cross-side
/// contradiction discovery, and the malformed-matching error screen.
pub const BUILTIN_BEFORE: &str = "\
// Same-side dependency ordering: is `a` before `b`?
//   r1  add the container before adding a member inside it
//   r2  delete a member before deleting its container
//   r3  add the container before an alter that moves an element into it
//   r4  move an element out of a container before deleting the container
[same-side-before]
rules                  r1 r2 r3 r4
a-is-add               Y  -  Y  -
a-is-alter             -  -  -  Y
a-is-delete            -  Y  -  -
b-is-add               Y  -  -  -
b-is-alter             -  -  Y  -
b-is-delete            -  Y  -  Y
b-target-in-a-target   Y  -  -  -
a-target-in-b-target   -  Y  -  Y
b-updated-in-a-target  -  -  Y  -
a-updated-in-b-target  -  -  -  N
before                 1  1  1  1

// Cross-side precedence: evaluated in both directions per pair, and a pair
// that is before both ways is reclassified as a conflict.
//   r1  both sides added elements the matcher paired up
//   r2  an add this side, an alter on the other side moving an element
//       under the added element's counterpart
//   r3-r6  edits of the same matched base element contradict pairwise
//   r7  everything else: screen for malformed matching, then no relation
[cross-side-before]
rules                  r1 r2 r3 r4 r5 r6 r7
a-is-add               Y  Y  -  -  -  -  -
a-is-alter             -  -  Y  Y  -  -  -
a-is-delete            -  -  -  -  Y  Y  -
b-is-alter             -  Y  Y  -  Y  -  -
b-is-delete            -  -  -  Y  -  Y  -
b-is-add               Y  -  -  -  -  -  -
added-targets-matched  Y  -  -  -  -  -  -
b-moves-under-a        -  Y  -  -  -  -  -
targets-matched        -  -  Y  Y  Y  Y  -
error-screen           -  -  -  -  -  -  Y
before                 1  1  1  1  1  1  -
not-before             -  -  -  -  -  -  1

// Malformed matching: an element added on one side can have no history in
// the common ancestor, so it can never be matched against an alter or a
// delete of a pre-existing element.
[cross-side-error]
rules                  e1 e2 e3
a-edits-base           Y  -  -
b-is-add               Y  -  -
a-is-add               -  Y  -
b-edits-base           -  Y  -
targets-cross-matched  Y  Y  -
raise-error            1  1  -
report-ok              -  -  1
";

/// Default resolution policy for contradiction blocks.
pub const BUILTIN_RESOLVE: &str = "\
//   q1  both sides made the same change: keep either (left, for determinism)
//   q2  both sides deleted: keep either
//   q3  alters touching disjoint attribute sets: keep both
//   q4  independently added elements colliding on name: rename both apart
//   q5  everything else: screen for misuse, then leave unresolved
[resolve]
rules             q1 q2 q3 q4 q5
sides-equivalent  Y  -  -  -  -
both-delete       -  Y  -  -  -
disjoint-edits    -  -  Y  -  -
added-name-clash  -  -  -  Y  -
error-screen      -  -  -  -  Y
keep-left         1  1  -  -  -
keep-both         -  -  1  -  -
rename-apart      -  -  -  1  -
report-ok         -  -  -  -  1

// Resolution is only defined for blocks with changes on both sides.
[resolve-error]
rules            e1 e2
not-in-conflict  Y  -
raise-error      1  -
report-ok        -  1
";

/// Parse the builtin precedence policy.
pub fn default_before_defs() -> Result<Vec<TableDef>, ReconcileError> {
    parse(BUILTIN_BEFORE, "<builtin>")
}

/// Parse the builtin resolution policy.
pub fn default_resolve_defs() -> Result<Vec<TableDef>, ReconcileError> {
    parse(BUILTIN_RESOLVE, "<builtin>")
}

/// Find a required section among parsed definitions.
pub(crate) fn find_def<'a>(
    defs: &'a [TableDef],
    name: &str,
) -> Result<&'a TableDef, ReconcileError> {
    TableDef::find(defs, name).ok_or_else(|| ReconcileError::MissingTable {
        name: name.to_owned(),
        source: defs
            .first()
            .map_or_else(|| "<empty definition set>".to_owned(), |d| d.source.clone()),
    })
}

// ---------------------------------------------------------------------------
// Pair conditions
// ---------------------------------------------------------------------------

fn a_is_add(ctx: &PairCtx) -> Result<bool, ReconcileError> {
    Ok(ctx.first().kind == OpKind::Add)
}

fn a_is_alter(ctx: &PairCtx) -> Result<bool, ReconcileError> {
    Ok(ctx.first().kind == OpKind::Alter)
}

fn a_is_delete(ctx: &PairCtx) -> Result<bool, ReconcileError> {
    Ok(ctx.first().kind == OpKind::Delete)
}

fn b_is_add(ctx: &PairCtx) -> Result<bool, ReconcileError> {
    Ok(ctx.second().kind == OpKind::Add)
}

fn b_is_alter(ctx: &PairCtx) -> Result<bool, ReconcileError> {
    Ok(ctx.second().kind == OpKind::Alter)
}

fn b_is_delete(ctx: &PairCtx) -> Result<bool, ReconcileError> {
    Ok(ctx.second().kind == OpKind::Delete)
}

/// Alters and deletes edit an element that already existed in the common
/// ancestor; adds do not.
fn a_edits_base(ctx: &PairCtx) -> Result<bool, ReconcileError> {
    Ok(matches!(ctx.first().kind, OpKind::Alter | OpKind::Delete))
}

fn b_edits_base(ctx: &PairCtx) -> Result<bool, ReconcileError> {
    Ok(matches!(ctx.second().kind, OpKind::Alter | OpKind::Delete))
}

fn b_target_in_a_target(ctx: &PairCtx) -> Result<bool, ReconcileError> {
    Ok(ctx
        .model
        .contained_in(ctx.second().target, ctx.first().target))
}

fn a_target_in_b_target(ctx: &PairCtx) -> Result<bool, ReconcileError> {
    Ok(ctx
        .model
        .contained_in(ctx.first().target, ctx.second().target))
}

fn b_updated_in_a_target(ctx: &PairCtx) -> Result<bool, ReconcileError> {
    Ok(ctx
        .second()
        .updated
        .is_some_and(|u| ctx.model.contained_in(u, ctx.first().target)))
}

fn a_updated_in_b_target(ctx: &PairCtx) -> Result<bool, ReconcileError> {
    Ok(ctx
        .first()
        .updated
        .is_some_and(|u| ctx.model.contained_in(u, ctx.second().target)))
}

/// Strict cross-side correspondence: `a` edits a base element, so a missing
/// counterpart is fatal. Columns using this condition gate on `a`'s kind
/// first, which keeps it away from added elements.
fn targets_matched(ctx: &PairCtx) -> Result<bool, ReconcileError> {
    let cp = ctx.counterpart_required(ctx.first().target)?;
    Ok(ctx.model.same(cp, ctx.second().target))
}

/// Lenient cross-side correspondence: no counterpart just means no match.
fn targets_matched_lenient(ctx: &PairCtx) -> Result<bool, ReconcileError> {
    Ok(ctx
        .model
        .counterpart(ctx.first().target)
        .is_some_and(|cp| ctx.model.same(cp, ctx.second().target)))
}

/// `b` is an alter whose updated snapshot sits inside a container whose
/// counterpart is the element `a` targets.
fn b_moves_under_a(ctx: &PairCtx) -> Result<bool, ReconcileError> {
    let Some(updated) = ctx.second().updated else {
        return Ok(false);
    };
    let Some(container) = ctx.model.container(updated) else {
        return Ok(false);
    };
    Ok(ctx
        .model
        .counterpart(container)
        .is_some_and(|cp| ctx.model.same(cp, ctx.first().target)))
}

// ---------------------------------------------------------------------------
// Pair actions
// ---------------------------------------------------------------------------

fn act_before(_: &mut PairCtx, out: &mut Outcome) -> Result<(), String> {
    out.set_result(crate::logic::Truth::True);
    Ok(())
}

fn act_not_before(_: &mut PairCtx, out: &mut Outcome) -> Result<(), String> {
    out.set_result(crate::logic::Truth::False);
    Ok(())
}

fn act_pair_raise_error(ctx: &mut PairCtx, _: &mut Outcome) -> Result<(), String> {
    Err(format!(
        "an added element is matched against an edit of a pre-existing element ({} vs {})",
        ctx.a, ctx.b
    ))
}

/// Everything the before-tables and their error screen may name.
pub(crate) fn pair_bindings<'a>() -> Bindings<PairCtx<'a>> {
    Bindings::new()
        .condition("a-is-add", a_is_add)
        .condition("a-is-alter", a_is_alter)
        .condition("a-is-delete", a_is_delete)
        .condition("b-is-add", b_is_add)
        .condition("b-is-alter", b_is_alter)
        .condition("b-is-delete", b_is_delete)
        .condition("a-edits-base", a_edits_base)
        .condition("b-edits-base", b_edits_base)
        .condition("b-target-in-a-target", b_target_in_a_target)
        .condition("a-target-in-b-target", a_target_in_b_target)
        .condition("b-updated-in-a-target", b_updated_in_a_target)
        .condition("a-updated-in-b-target", a_updated_in_b_target)
        .condition("targets-matched", targets_matched)
        .condition("added-targets-matched", targets_matched_lenient)
        .condition("targets-cross-matched", targets_matched_lenient)
        .condition("b-moves-under-a", b_moves_under_a)
        .aux_condition("error-screen")
        .action("before", act_before)
        .action("not-before", act_not_before)
        .action("report-ok", act_not_before)
        .action("raise-error", act_pair_raise_error)
}

// ---------------------------------------------------------------------------
// Resolve conditions
// ---------------------------------------------------------------------------

fn not_in_conflict(ctx: &ResolveCtx) -> Result<bool, ReconcileError> {
    Ok(!ctx.block().is_conflict())
}

/// Both sides made the same single change: one member per side, same kind,
/// no attribute-level difference between the post-edit snapshots.
fn sides_equivalent(ctx: &ResolveCtx) -> Result<bool, ReconcileError> {
    let block = ctx.block();
    let (&[l], &[r]) = (block.left().members(), block.right().members()) else {
        return Ok(false);
    };
    let (left, right) = (ctx.ops.get(l), ctx.ops.get(r));
    if left.kind != right.kind {
        return Ok(false);
    }
    Ok(ctx
        .model
        .differing_attributes(left.effective(), right.effective())
        .is_empty())
}

fn both_delete(ctx: &ResolveCtx) -> Result<bool, ReconcileError> {
    let block = ctx.block();
    Ok(block.is_conflict()
        && block
            .members()
            .all(|m| ctx.ops.get(m).kind == OpKind::Delete))
}

/// Alter-only block whose sides touch disjoint attribute sets.
fn disjoint_edits(ctx: &ResolveCtx) -> Result<bool, ReconcileError> {
    let block = ctx.block();
    if !block.is_conflict()
        || !block.members().all(|m| ctx.ops.get(m).kind == OpKind::Alter)
    {
        return Ok(false);
    }
    let touched = |members: &[crate::op::OpId]| -> Vec<String> {
        let mut attrs: Vec<String> = members
            .iter()
            .flat_map(|&m| {
                let op = ctx.ops.get(m);
                ctx.model
                    .differing_attributes(op.target, op.effective())
            })
            .collect();
        attrs.sort();
        attrs.dedup();
        attrs
    };
    let left = touched(block.left().members());
    let right = touched(block.right().members());
    Ok(!left.iter().any(|attr| right.contains(attr)))
}

/// Two independently added elements that collide on name.
fn added_name_clash(ctx: &ResolveCtx) -> Result<bool, ReconcileError> {
    let block = ctx.block();
    let (&[l], &[r]) = (block.left().members(), block.right().members()) else {
        return Ok(false);
    };
    let (left, right) = (ctx.ops.get(l), ctx.ops.get(r));
    if left.kind != OpKind::Add || right.kind != OpKind::Add {
        return Ok(false);
    }
    match (ctx.model.name(left.target), ctx.model.name(right.target)) {
        (Some(a), Some(b)) => Ok(a == b),
        _ => Ok(false),
    }
}

// ---------------------------------------------------------------------------
// Resolve actions
// ---------------------------------------------------------------------------

fn act_keep_left(_: &mut ResolveCtx, out: &mut Outcome) -> Result<(), String> {
    out.choose(Side::Left);
    Ok(())
}

fn act_keep_right(_: &mut ResolveCtx, out: &mut Outcome) -> Result<(), String> {
    out.choose(Side::Right);
    Ok(())
}

fn act_keep_both(_: &mut ResolveCtx, out: &mut Outcome) -> Result<(), String> {
    out.choose(Side::Both);
    Ok(())
}

fn act_revert_base(_: &mut ResolveCtx, out: &mut Outcome) -> Result<(), String> {
    out.choose(Side::Base);
    Ok(())
}

/// Keep both added elements by renaming each apart with a side suffix.
fn act_rename_apart(ctx: &mut ResolveCtx, out: &mut Outcome) -> Result<(), String> {
    let mut renames: Vec<(ElementId, String)> = Vec::new();
    {
        let block = &ctx.blocks[ctx.index];
        for (composite, side) in [(block.left(), Side::Left), (block.right(), Side::Right)] {
            for &m in composite.members() {
                let e = ctx.ops.get(m).effective();
                let name = ctx
                    .model
                    .name(e)
                    .ok_or_else(|| format!("cannot rename unnamed element {e} apart"))?;
                renames.push((e, format!("{name}~{side}")));
            }
        }
    }
    for (e, name) in renames {
        ctx.model.rename(e, name);
    }
    out.choose(Side::Both);
    Ok(())
}

fn act_resolve_raise_error(ctx: &mut ResolveCtx, _: &mut Outcome) -> Result<(), String> {
    Err(format!(
        "contradiction block {} is not in conflict",
        ctx.index
    ))
}

fn act_resolve_report_ok(_: &mut ResolveCtx, out: &mut Outcome) -> Result<(), String> {
    out.set_result(crate::logic::Truth::False);
    Ok(())
}

/// Everything the resolve tables and their error screen may name.
pub(crate) fn resolve_bindings<'a>() -> Bindings<ResolveCtx<'a>> {
    Bindings::new()
        .condition("not-in-conflict", not_in_conflict)
        .condition("sides-equivalent", sides_equivalent)
        .condition("both-delete", both_delete)
        .condition("disjoint-edits", disjoint_edits)
        .condition("added-name-clash", added_name_clash)
        .aux_condition("error-screen")
        .action("keep-left", act_keep_left)
        .action("keep-right", act_keep_right)
        .action("keep-both", act_keep_both)
        .action("revert-base", act_revert_base)
        .action("rename-apart", act_rename_apart)
        .action("raise-error", act_resolve_raise_error)
        .action("report-ok", act_resolve_report_ok)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::DecisionTable;

    // The builtin texts must parse and bind cleanly: a typo in a condition
    // or action name would otherwise only surface at engine construction.
    #[test]
    fn builtin_before_defs_parse_and_bind() {
        let defs = default_before_defs().unwrap();
        assert_eq!(defs.len(), 3);
        let bindings = pair_bindings();
        for def in &defs {
            DecisionTable::from_def(def, &bindings).unwrap();
        }
    }

    #[test]
    fn builtin_resolve_defs_parse_and_bind() {
        let defs = default_resolve_defs().unwrap();
        assert_eq!(defs.len(), 2);
        let bindings = resolve_bindings();
        for def in &defs {
            DecisionTable::from_def(def, &bindings).unwrap();
        }
    }

    #[test]
    fn builtin_sections_are_all_present() {
        let defs = default_before_defs().unwrap();
        assert!(find_def(&defs, "same-side-before").is_ok());
        assert!(find_def(&defs, "cross-side-before").is_ok());
        assert!(find_def(&defs, "cross-side-error").is_ok());

        let err = find_def(&defs, "resolve").unwrap_err();
        assert!(matches!(err, ReconcileError::MissingTable { .. }));
    }
}
