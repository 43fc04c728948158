//! Client-side model of a workflow's actions.
//!
//! Actions arrive from the backend as a flat list linked by `parent_id`.
//! [`ActionTree`] turns that list into the nested shape the editor works on,
//! and [`WorkflowEditor`] keeps the tree and the backend in step.

mod action;
mod delay;
mod editor;
mod payload;
mod tree;

pub use action::{Action, ActionDraft, ActionId, Branch, ROOT_PARENT_ID, is_root_parent};
pub use delay::{Delay, DelayUnit};
pub use editor::WorkflowEditor;
pub use payload::{ActionKind, ActionPayload, ConditionPayload, Criterion, EmailPayload, ParsedData, WaitPayload};
pub use tree::{ActionTree, BuildReport, BuildWarning, Scope, append_to_chain, chain_parent_id};
