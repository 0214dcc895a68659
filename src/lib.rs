//! remeld — three-way reconciliation of structured model edits.
//!
//! Given the atomic edits two derivatives made against a common ancestor,
//! the engine derives precedence and conflict relations pairwise (via
//! data-driven decision tables), partitions conflicting edits into
//! contradiction blocks, auto-resolves the blocks it safely can, and
//! linearizes everything into one replayable change sequence.
//!
//! Entry point: [`Reconciler`]. The modeled artifact is abstracted behind
//! [`model::ModelView`]; [`model::ElementStore`] is a ready-made in-memory
//! implementation.

pub mod config;
pub mod engine;
pub mod error;
pub mod logic;
pub mod model;
pub mod op;
pub mod table;

pub use config::RemeldConfig;
pub use engine::{ChangeNode, ChangeStatus, Edit, Reconciler, Reconciliation, ScheduledChange};
pub use error::ReconcileError;
pub use logic::Truth;
pub use model::{ElementId, ElementStore, ModelView};
pub use op::{AtomicOp, Composite, ContradictBlock, OpArena, OpId, OpKind, Relation, RelationGraph, Side};
pub use table::{DecisionTable, Outcome, TableDef};
