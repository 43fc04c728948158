//! Workflow editor - the main entry point for editing a workflow's actions.
//!
//! The editor owns the in-memory [`ActionTree`] of one workflow and keeps it
//! in step with the backend:
//! - loading rebuilds the tree from the backend's flat action list
//! - appending creates the action remotely, then splices it into the tree
//! - editing sends the merged payload, then commits it locally
//! - removing only edits the local tree
//!
//! Each mutation is an independent backend call. Nothing is inserted
//! speculatively, so a failed call leaves the tree as it was.

use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info, trace};

use crate::{
    MailflowError, Result,
    api::{CompanyScope, WorkflowApi},
    model::{NewAction, UpdateAction},
    workflow::{
        action::{Action, ActionDraft, ActionId, Branch},
        payload::ActionPayload,
        tree::{ActionTree, BuildReport, Scope},
    },
};

/// Editing session over one workflow of one company.
///
/// # Example
///
/// ```rust,ignore
/// let scope = CompanyScope::from_token(&token);
/// let (mut editor, report) = WorkflowEditor::load(api, scope, "workflow_id").await?;
///
/// let condition = editor.append_action(None, None, ActionDraft::new(ActionKind::Condition)).await?;
/// let email = editor.append_action(Some(&condition), Some(Branch::Yes), ActionDraft::new(ActionKind::Email)).await?;
///
/// if editor.is_ready() {
///     editor.start().await?;
/// }
/// ```
pub struct WorkflowEditor {
    /// Backend the editor talks to.
    api: Arc<dyn WorkflowApi>,
    /// Tenant every call is made for.
    scope: CompanyScope,
    /// Workflow being edited.
    workflow_id: String,
    /// Local copy of the workflow's actions.
    tree: ActionTree,
    /// Actions covered by the readiness check.
    completeness_scope: Scope,
}

impl WorkflowEditor {
    /// Creates an editor over an empty tree, e.g. for a workflow just created.
    pub fn new(
        api: Arc<dyn WorkflowApi>,
        scope: CompanyScope,
        workflow_id: impl Into<String>,
    ) -> Self {
        Self {
            api,
            scope,
            workflow_id: workflow_id.into(),
            tree: ActionTree::new(),
            completeness_scope: Scope::default(),
        }
    }

    /// Fetches the workflow's actions and rebuilds the tree.
    pub async fn load(
        api: Arc<dyn WorkflowApi>,
        scope: CompanyScope,
        workflow_id: impl Into<String>,
    ) -> Result<(Self, BuildReport)> {
        let mut editor = Self::new(api, scope, workflow_id);
        let report = editor.reload().await?;
        Ok((editor, report))
    }

    /// Sets which actions [`WorkflowEditor::is_ready`] checks.
    pub fn with_completeness_scope(
        mut self,
        scope: Scope,
    ) -> Self {
        self.completeness_scope = scope;
        self
    }

    /// Discards the local tree and rebuilds it from the backend.
    pub async fn reload(&mut self) -> Result<BuildReport> {
        trace!("editor::reload({})", self.workflow_id);
        let models = self.api.list_actions(&self.scope, &self.workflow_id).await.inspect_err(|e| error!("failed to load actions of {}: {}", self.workflow_id, e))?;
        let (tree, report) = ActionTree::build(&models);
        self.tree = tree;
        Ok(report)
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn scope(&self) -> &CompanyScope {
        &self.scope
    }

    pub fn tree(&self) -> &ActionTree {
        &self.tree
    }

    /// The main trunk as shown in the primary list.
    pub fn actions(&self) -> Vec<&Action> {
        self.tree.flatten(Scope::Trunk)
    }

    /// Creates a new action after `parent` (or as a root) and adds it to the tree.
    ///
    /// With a `branch`, `parent` must be a condition and the action is
    /// chained after the last action already on that branch. Returns the
    /// backend-assigned id.
    pub async fn append_action(
        &mut self,
        parent: Option<&str>,
        branch: Option<Branch>,
        draft: ActionDraft,
    ) -> Result<ActionId> {
        let parent_id = self.tree.resolve_parent_id(parent, branch)?;
        trace!("editor::append_action({:?}, {:?}, {}) -> parent {}", parent, branch, draft.kind, parent_id);

        let payload = ActionPayload::empty(&draft.kind);
        let data = match branch {
            Some(branch) => Some(payload.to_data(Some(branch))?),
            None => None,
        };
        let request = NewAction {
            kind: draft.kind.clone(),
            title: draft.title.clone(),
            parent_id,
            data,
        };

        let created = self.api.create_action(&self.scope, &self.workflow_id, &request).await.inspect_err(|e| error!("failed to create {} action: {}", draft.kind, e))?;
        if created.id.is_empty() {
            return Err(MailflowError::Action("backend returned an empty action id".to_string()));
        }

        let action = Action {
            id: created.id.clone(),
            parent_id: created.parent_id.or(Some(request.parent_id)),
            title: draft.title,
            kind: draft.kind,
            payload,
            branch,
            children: Vec::new(),
            yes_branch: Vec::new(),
            no_branch: Vec::new(),
        };
        self.tree.insert(parent, branch, action)?;
        info!("action {} added to workflow {}", created.id, self.workflow_id);
        Ok(created.id)
    }

    /// Merges `update` into the payload of action `id` and saves it.
    ///
    /// Fields set in `update` replace the current ones; the rest are kept.
    /// The action stays where it is in the tree.
    pub async fn edit_action(
        &mut self,
        id: &str,
        update: ActionPayload,
    ) -> Result<()> {
        let action = self.tree.find(id).ok_or_else(|| MailflowError::Action(format!("action {} not found", id)))?;
        if !update.matches(&action.kind) {
            return Err(MailflowError::Action(format!("payload does not fit {} action {}", action.kind, id)));
        }

        let mut merged = action.payload.clone();
        merged.merge(update)?;
        let request = UpdateAction {
            kind: action.kind.clone(),
            data: merged.to_data(action.branch)?,
        };

        self.api.update_action(&self.scope, &self.workflow_id, id, &request).await.inspect_err(|e| error!("failed to update action {}: {}", id, e))?;
        self.tree.set_payload(id, merged)
    }

    /// Like [`WorkflowEditor::edit_action`] but takes the raw form values,
    /// validated against the action kind's schema.
    pub async fn edit_action_json(
        &mut self,
        id: &str,
        values: Value,
    ) -> Result<()> {
        let kind = self.tree.find(id).map(|a| a.kind.clone()).ok_or_else(|| MailflowError::Action(format!("action {} not found", id)))?;
        let update = ActionPayload::create(&kind, values)?;
        self.edit_action(id, update).await
    }

    /// Takes action `id` (and everything after it) out of the local tree.
    ///
    /// The container is named explicitly: a branch of `parent`, the
    /// `children` of `parent`, or the root list. The backend is not told.
    pub fn remove_action(
        &mut self,
        id: &str,
        parent: Option<&str>,
        branch: Option<Branch>,
    ) -> Result<Action> {
        trace!("editor::remove_action({}, {:?}, {:?})", id, parent, branch);
        self.tree.remove(id, parent, branch)
    }

    pub fn is_action_complete(
        &self,
        id: &str,
    ) -> Option<bool> {
        self.tree.find(id).map(Action::is_complete)
    }

    /// Whether every action covered by the completeness scope is complete.
    pub fn is_ready(&self) -> bool {
        self.tree.are_all_actions_complete(self.completeness_scope)
    }

    /// Asks the backend to start the workflow. Readiness is not checked.
    pub async fn start(&self) -> Result<()> {
        self.api.start_workflow(&self.scope, &self.workflow_id).await.inspect_err(|e| error!("failed to start workflow {}: {}", self.workflow_id, e))?;
        info!("workflow {} started", self.workflow_id);
        Ok(())
    }

    /// Starts the workflow only if [`WorkflowEditor::is_ready`] holds.
    pub async fn start_checked(&self) -> Result<()> {
        let incomplete = self.tree.incomplete(self.completeness_scope);
        if !incomplete.is_empty() {
            let ids = incomplete.iter().map(|a| a.id.as_str()).collect::<Vec<_>>().join(", ");
            return Err(MailflowError::Workflow(format!("workflow {} has incomplete actions: {}", self.workflow_id, ids)));
        }
        self.start().await
    }
}
