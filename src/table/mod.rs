//! Decision tables: data-driven rule dispatch.
//!
//! A [`DecisionTable`] is an ordered set of named boolean conditions and
//! named actions arranged as a rule matrix. It replaces what would otherwise
//! be long if/else chains scattered across the engine with one auditable
//! policy artifact: rule columns are scanned strictly left to right with
//! first-match-wins semantics (a guarded `case` ladder, not a constraint
//! solver), so column order encodes priority and columns need not be
//! mutually exclusive.
//!
//! Tables are generic over a context type `C`: condition tests read `&C`,
//! action handlers get `&mut C` plus the [`Outcome`] under construction.
//! A table may carry one auxiliary table (error detection / cross-cutting
//! fallback); a condition bound to [`CondBinding::Aux`] evaluates and fully
//! executes the auxiliary table against the same context and reports whether
//! its outcome result was non-true.

use std::fmt;

use crate::error::ReconcileError;
use crate::logic::Truth;
use crate::op::Side;

pub mod def;

pub use def::{TableDef, parse};

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// What a fired rule produced.
///
/// A table run with no matching column leaves the outcome at its default
/// (`side = None`, `result = Undefined`) — "no match" is a control value,
/// never an error.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Outcome {
    /// Merge-side choice accumulated by the fired actions.
    pub side: Side,
    /// Tri-state result set by the fired actions.
    pub result: Truth,
}

impl Outcome {
    /// Accumulate a side choice (Left after Right becomes Both, see
    /// [`Side::accumulate`]).
    pub fn choose(&mut self, side: Side) {
        self.side = self.side.accumulate(side);
    }

    /// Set the tri-state result.
    pub fn set_result(&mut self, result: Truth) {
        self.result = result;
    }

    /// Returns `true` if no rule matched (or the matched rule set nothing).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.side == Side::None && self.result == Truth::Undefined
    }
}

// ---------------------------------------------------------------------------
// Bindings
// ---------------------------------------------------------------------------

/// Live test behind a named condition row.
pub type CondFn<C> = fn(&C) -> Result<bool, ReconcileError>;

/// Handler behind a named action row. An `Err` is a fatal rule violation;
/// the table wraps it with table name, action name, source, and rule number.
pub type ActionFn<C> = fn(&mut C, &mut Outcome) -> Result<(), String>;

/// What a condition name binds to.
pub enum CondBinding<C> {
    /// An ordinary live test.
    Test(CondFn<C>),
    /// The auxiliary-match condition: run the aux table to completion and
    /// report whether its outcome result was non-true.
    Aux,
}

// Manual impls: a derive would bound `C`, but the variants only hold a fn
// pointer.
impl<C> Clone for CondBinding<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for CondBinding<C> {}

/// Name → behavior registry used to bind a parsed [`TableDef`].
pub struct Bindings<C> {
    conditions: Vec<(&'static str, CondBinding<C>)>,
    actions: Vec<(&'static str, ActionFn<C>)>,
}

impl<C> Default for Bindings<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Bindings<C> {
    /// Create an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            conditions: Vec::new(),
            actions: Vec::new(),
        }
    }

    /// Register a condition test under a name.
    #[must_use]
    pub fn condition(mut self, name: &'static str, test: CondFn<C>) -> Self {
        self.conditions.push((name, CondBinding::Test(test)));
        self
    }

    /// Register a name as the auxiliary-match condition.
    #[must_use]
    pub fn aux_condition(mut self, name: &'static str) -> Self {
        self.conditions.push((name, CondBinding::Aux));
        self
    }

    /// Register an action handler under a name.
    #[must_use]
    pub fn action(mut self, name: &'static str, run: ActionFn<C>) -> Self {
        self.actions.push((name, run));
        self
    }

    fn find_condition(&self, name: &str) -> Option<CondBinding<C>> {
        self.conditions
            .iter()
            .find(|(n, _)| *n == name)
            .map(|&(_, b)| b)
    }

    fn find_action(&self, name: &str) -> Option<ActionFn<C>> {
        self.actions
            .iter()
            .find(|(n, _)| *n == name)
            .map(|&(_, f)| f)
    }
}

// ---------------------------------------------------------------------------
// DecisionTable
// ---------------------------------------------------------------------------

struct Condition<C> {
    name: String,
    binding: CondBinding<C>,
}

struct Action<C> {
    name: String,
    steps: Vec<u32>,
    run: ActionFn<C>,
}

/// A bound, finalized decision table.
///
/// Read-only once built; safe to reuse across evaluations within a session.
pub struct DecisionTable<C> {
    name: String,
    source: String,
    columns: usize,
    conditions: Vec<Condition<C>>,
    actions: Vec<Action<C>>,
    /// Per (condition, rule) cell: is the cell applicable (not don't-care)?
    applicable: Vec<Vec<bool>>,
    /// Per (condition, rule) cell: the expected truth value, when applicable.
    expected: Vec<Vec<bool>>,
    aux: Option<Box<DecisionTable<C>>>,
}

impl<C> fmt::Debug for DecisionTable<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecisionTable")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("columns", &self.columns)
            .field("conditions", &self.conditions.len())
            .field("actions", &self.actions.len())
            .field("aux", &self.aux.as_ref().map(|t| t.name.clone()))
            .finish()
    }
}

impl<C> DecisionTable<C> {
    /// Bind a parsed definition against a registry.
    ///
    /// Derives the applicability/expectation masks from the tri-state
    /// condition rows (`Undefined` ⇒ not applicable) and keeps the action
    /// fire-step rows as parsed (nonzero ⇒ fires at that step).
    pub fn from_def(def: &TableDef, bindings: &Bindings<C>) -> Result<Self, ReconcileError> {
        let mut conditions = Vec::with_capacity(def.conditions.len());
        let mut applicable = Vec::with_capacity(def.conditions.len());
        let mut expected = Vec::with_capacity(def.conditions.len());

        for (name, cells) in &def.conditions {
            if cells.len() != def.columns {
                return Err(ReconcileError::ColumnMismatch {
                    table: def.name.clone(),
                    row: name.clone(),
                    expected: def.columns,
                    found: cells.len(),
                });
            }
            let binding = bindings.find_condition(name).ok_or_else(|| {
                ReconcileError::UnknownBinding {
                    table: def.name.clone(),
                    kind: "condition",
                    name: name.clone(),
                }
            })?;
            applicable.push(cells.iter().map(|c| c.is_defined()).collect());
            expected.push(cells.iter().map(|c| *c == Truth::True).collect());
            conditions.push(Condition {
                name: name.clone(),
                binding,
            });
        }

        let mut actions = Vec::with_capacity(def.actions.len());
        for (name, steps) in &def.actions {
            if steps.len() != def.columns {
                return Err(ReconcileError::ColumnMismatch {
                    table: def.name.clone(),
                    row: name.clone(),
                    expected: def.columns,
                    found: steps.len(),
                });
            }
            let run = bindings
                .find_action(name)
                .ok_or_else(|| ReconcileError::UnknownBinding {
                    table: def.name.clone(),
                    kind: "action",
                    name: name.clone(),
                })?;
            actions.push(Action {
                name: name.clone(),
                steps: steps.clone(),
                run,
            });
        }

        Ok(Self {
            name: def.name.clone(),
            source: def.source.clone(),
            columns: def.columns,
            conditions,
            actions,
            applicable,
            expected,
            aux: None,
        })
    }

    /// Attach the auxiliary fallback table.
    #[must_use]
    pub fn with_aux(mut self, aux: Self) -> Self {
        self.aux = Some(Box::new(aux));
        self
    }

    /// Table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Definition origin (file path or `<builtin>`).
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Rule-column count.
    #[must_use]
    pub const fn columns(&self) -> usize {
        self.columns
    }

    /// First matching rule column, scanning from column 0.
    pub fn evaluate(&self, ctx: &mut C) -> Result<Option<usize>, ReconcileError> {
        self.evaluate_from(ctx, 0)
    }

    /// First matching rule column at or after `offset`.
    ///
    /// A column matches when, for every condition row, either the cell is
    /// inapplicable or the live test equals the cell's expected value.
    /// `ctx` is mutable only because an aux-bound condition fully executes
    /// the auxiliary table, whose actions may mutate the context.
    pub fn evaluate_from(&self, ctx: &mut C, offset: usize) -> Result<Option<usize>, ReconcileError> {
        'columns: for col in offset..self.columns {
            for (row, cond) in self.conditions.iter().enumerate() {
                if !self.applicable[row][col] {
                    continue;
                }
                let live = match cond.binding {
                    CondBinding::Test(test) => test(&*ctx)?,
                    CondBinding::Aux => self.aux_mismatch(ctx)?,
                };
                if live != self.expected[row][col] {
                    continue 'columns;
                }
            }
            return Ok(Some(col));
        }
        Ok(None)
    }

    /// Evaluate and, if a rule matches, execute its action sequence.
    ///
    /// The sequence is the subset of actions with a nonzero step for the
    /// matched rule, ordered by step number. A handler failure is fatal and
    /// identifies table, action, definition source, and rule number.
    pub fn run(&self, ctx: &mut C) -> Result<Outcome, ReconcileError> {
        let mut outcome = Outcome::default();
        let Some(col) = self.evaluate(ctx)? else {
            return Ok(outcome);
        };

        let mut sequence: Vec<(u32, usize)> = self
            .actions
            .iter()
            .enumerate()
            .filter(|(_, action)| action.steps[col] != 0)
            .map(|(idx, action)| (action.steps[col], idx))
            .collect();
        sequence.sort_by_key(|&(step, _)| step);

        for (_, idx) in sequence {
            let action = &self.actions[idx];
            (action.run)(ctx, &mut outcome).map_err(|detail| ReconcileError::RuleViolation {
                table: self.name.clone(),
                action: action.name.clone(),
                source: self.source.clone(),
                rule: col,
                detail,
            })?;
        }
        Ok(outcome)
    }

    /// The auxiliary-match condition: run the aux table to completion against
    /// the same context; report whether its outcome result was non-true.
    /// With no aux table attached, there is nothing to mismatch.
    fn aux_mismatch(&self, ctx: &mut C) -> Result<bool, ReconcileError> {
        match &self.aux {
            Some(aux) => Ok(aux.run(ctx)?.result != Truth::True),
            None => Ok(false),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
