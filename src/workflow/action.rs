use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    model::ActionModel,
    workflow::payload::{ActionKind, ActionPayload, ParsedData},
};

/// action id
pub type ActionId = String;

/// Parent id the backend uses for the first action of a workflow.
pub const ROOT_PARENT_ID: &str = "00000000-0000-0000-0000-000000000000";

/// Whether `parent_id` marks a root action (absent, empty or the nil UUID).
pub fn is_root_parent(parent_id: Option<&str>) -> bool {
    match parent_id.map(str::trim) {
        None | Some("") => true,
        Some(id) => Uuid::parse_str(id).is_ok_and(|u| u.is_nil()),
    }
}

/// Outcome of a condition that an action hangs off.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, strum::AsRefStr, strum::EnumString, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Branch {
    Yes,
    No,
}

/// One step of an automation workflow, with its subtrees.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    /// action id, empty until persisted
    pub id: ActionId,
    /// preceding action, `None` for a root action
    pub parent_id: Option<ActionId>,
    /// action title
    pub title: String,
    /// action kind
    pub kind: ActionKind,
    /// kind-specific data
    pub payload: ActionPayload,
    /// which branch of a condition parent this action sits on
    pub branch: Option<Branch>,
    /// actions chained directly after this one
    pub children: Vec<Action>,
    /// actions run when this condition holds
    pub yes_branch: Vec<Action>,
    /// actions run when this condition does not hold
    pub no_branch: Vec<Action>,
}

impl Action {
    /// Builds a detached node from a backend record, parsing its payload.
    ///
    /// Returns the node together with the parse details so callers can
    /// report malformed data or an invalid branch tag.
    pub fn from_model(model: &ActionModel) -> (Self, ParsedData) {
        let kind = model.kind.clone();
        let parsed = ActionPayload::parse(&kind, model.data.as_deref());
        let parent_id = if is_root_parent(model.parent_id.as_deref()) {
            None
        } else {
            model.parent_id.clone()
        };

        let action = Self {
            id: model.id.clone(),
            parent_id,
            title: model.title.clone().unwrap_or_else(|| kind.default_title()),
            kind,
            payload: parsed.payload.clone(),
            branch: parsed.branch,
            children: Vec::new(),
            yes_branch: Vec::new(),
            no_branch: Vec::new(),
        };
        (action, parsed)
    }

    pub fn is_condition(&self) -> bool {
        self.kind == ActionKind::Condition
    }

    pub fn is_complete(&self) -> bool {
        self.payload.is_complete()
    }

    /// The branch list of this action for `branch`.
    pub fn branch(
        &self,
        branch: Branch,
    ) -> &Vec<Action> {
        match branch {
            Branch::Yes => &self.yes_branch,
            Branch::No => &self.no_branch,
        }
    }

    pub fn branch_mut(
        &mut self,
        branch: Branch,
    ) -> &mut Vec<Action> {
        match branch {
            Branch::Yes => &mut self.yes_branch,
            Branch::No => &mut self.no_branch,
        }
    }
}

/// An action that has been picked in the "select type" step but not saved.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionDraft {
    pub kind: ActionKind,
    pub title: String,
}

impl ActionDraft {
    pub fn new(kind: ActionKind) -> Self {
        let title = kind.default_title();
        Self {
            kind,
            title,
        }
    }

    pub fn with_title(
        mut self,
        title: impl Into<String>,
    ) -> Self {
        self.title = title.into();
        self
    }
}
