use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::trace;
use uuid::Uuid;

use crate::{
    MailflowError, Result,
    api::{CompanyScope, WorkflowApi},
    model::{ActionModel, CreatedAction, NewAction, NewWorkflow, UpdateAction, UpdateWorkflow, WorkflowModel},
};

#[derive(Debug, Clone, Default)]
struct Tenant {
    workflows: Vec<WorkflowModel>,
    actions: HashMap<String, Vec<ActionModel>>,
    campaigns: Vec<Value>,
}

/// In-process [`WorkflowApi`] keeping every tenant's data in memory.
///
/// Follows the backend's observable behavior closely enough for tests:
/// unknown workflows answer 404, an empty company scope answers 401, and
/// ids are fresh UUIDs.
#[derive(Debug, Clone, Default)]
pub struct MemWorkflowApi {
    tenants: Arc<RwLock<HashMap<String, Tenant>>>,
}

fn unauthorized() -> MailflowError {
    MailflowError::Api {
        status: 401,
        body: "missing company scope".to_string(),
    }
}

fn not_found(what: &str) -> MailflowError {
    MailflowError::Api {
        status: 404,
        body: format!("{} not found", what),
    }
}

impl MemWorkflowApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a workflow with a fixed id and the given flat action list.
    pub async fn seed_workflow(
        &self,
        scope: &CompanyScope,
        workflow: WorkflowModel,
        actions: Vec<ActionModel>,
    ) {
        let mut tenants = self.tenants.write().await;
        let tenant = tenants.entry(scope.company_id().to_string()).or_default();
        tenant.actions.insert(workflow.id.clone(), actions);
        tenant.workflows.push(workflow);
    }

    pub async fn seed_campaigns(
        &self,
        scope: &CompanyScope,
        campaigns: Vec<Value>,
    ) {
        let mut tenants = self.tenants.write().await;
        tenants.entry(scope.company_id().to_string()).or_default().campaigns = campaigns;
    }

    /// Status of a stored workflow, e.g. `"running"` after a start.
    pub async fn workflow_status(
        &self,
        scope: &CompanyScope,
        workflow_id: &str,
    ) -> Option<String> {
        let tenants = self.tenants.read().await;
        tenants.get(scope.company_id())?.workflows.iter().find(|w| w.id == workflow_id).map(|w| w.status.clone())
    }

    /// Snapshot of the stored flat action list of a workflow.
    pub async fn stored_actions(
        &self,
        scope: &CompanyScope,
        workflow_id: &str,
    ) -> Vec<ActionModel> {
        let tenants = self.tenants.read().await;
        tenants.get(scope.company_id()).and_then(|t| t.actions.get(workflow_id)).cloned().unwrap_or_default()
    }

    fn check_scope(scope: &CompanyScope) -> Result<()> {
        if scope.is_empty() {
            return Err(unauthorized());
        }
        Ok(())
    }
}

#[async_trait]
impl WorkflowApi for MemWorkflowApi {
    async fn create_workflow(
        &self,
        scope: &CompanyScope,
        workflow: &NewWorkflow,
    ) -> Result<String> {
        Self::check_scope(scope)?;
        let id = Uuid::new_v4().to_string();
        trace!("mem::create_workflow({}, {})", scope, id);

        let mut tenants = self.tenants.write().await;
        let tenant = tenants.entry(scope.company_id().to_string()).or_default();
        tenant.workflows.push(WorkflowModel {
            id: id.clone(),
            name: workflow.name.clone(),
            mailinglist_id: workflow.mailinglist_id.clone(),
            trigger: workflow.trigger.to_string(),
            trigger_data: serde_json::to_value(&workflow.trigger_data)?,
            status: "draft".to_string(),
        });
        tenant.actions.insert(id.clone(), Vec::new());
        Ok(id)
    }

    async fn list_workflows(
        &self,
        scope: &CompanyScope,
        page: u32,
        limit: u32,
    ) -> Result<Vec<WorkflowModel>> {
        Self::check_scope(scope)?;
        let tenants = self.tenants.read().await;
        let Some(tenant) = tenants.get(scope.company_id()) else {
            return Ok(Vec::new());
        };
        let skip = (page.max(1) as usize - 1) * limit as usize;
        Ok(tenant.workflows.iter().skip(skip).take(limit as usize).cloned().collect())
    }

    async fn update_workflow(
        &self,
        scope: &CompanyScope,
        workflow_id: &str,
        update: &UpdateWorkflow,
    ) -> Result<()> {
        Self::check_scope(scope)?;
        let mut tenants = self.tenants.write().await;
        let workflow = tenants
            .get_mut(scope.company_id())
            .and_then(|t| t.workflows.iter_mut().find(|w| w.id == workflow_id))
            .ok_or_else(|| not_found("workflow"))?;
        if let Some(name) = &update.name {
            workflow.name = name.clone();
        }
        if let Some(status) = &update.status {
            workflow.status = status.clone();
        }
        Ok(())
    }

    async fn delete_workflow(
        &self,
        scope: &CompanyScope,
        workflow_id: &str,
    ) -> Result<()> {
        Self::check_scope(scope)?;
        let mut tenants = self.tenants.write().await;
        let tenant = tenants.get_mut(scope.company_id()).ok_or_else(|| not_found("workflow"))?;
        let pos = tenant.workflows.iter().position(|w| w.id == workflow_id).ok_or_else(|| not_found("workflow"))?;
        tenant.workflows.remove(pos);
        tenant.actions.remove(workflow_id);
        Ok(())
    }

    async fn list_actions(
        &self,
        scope: &CompanyScope,
        workflow_id: &str,
    ) -> Result<Vec<ActionModel>> {
        Self::check_scope(scope)?;
        let tenants = self.tenants.read().await;
        tenants.get(scope.company_id()).and_then(|t| t.actions.get(workflow_id)).cloned().ok_or_else(|| not_found("workflow"))
    }

    async fn create_action(
        &self,
        scope: &CompanyScope,
        workflow_id: &str,
        action: &NewAction,
    ) -> Result<CreatedAction> {
        Self::check_scope(scope)?;
        let mut tenants = self.tenants.write().await;
        let actions = tenants.get_mut(scope.company_id()).and_then(|t| t.actions.get_mut(workflow_id)).ok_or_else(|| not_found("workflow"))?;

        let id = Uuid::new_v4().to_string();
        trace!("mem::create_action({}, {}, {})", workflow_id, id, action.parent_id);
        actions.push(ActionModel {
            id: id.clone(),
            kind: action.kind.clone(),
            title: Some(action.title.clone()),
            parent_id: Some(action.parent_id.clone()),
            data: action.data.clone(),
        });
        Ok(CreatedAction {
            id,
            parent_id: Some(action.parent_id.clone()),
        })
    }

    async fn update_action(
        &self,
        scope: &CompanyScope,
        workflow_id: &str,
        action_id: &str,
        update: &UpdateAction,
    ) -> Result<()> {
        Self::check_scope(scope)?;
        let mut tenants = self.tenants.write().await;
        let action = tenants
            .get_mut(scope.company_id())
            .and_then(|t| t.actions.get_mut(workflow_id))
            .and_then(|actions| actions.iter_mut().find(|a| a.id == action_id))
            .ok_or_else(|| not_found("action"))?;
        action.kind = update.kind.clone();
        action.data = Some(update.data.clone());
        Ok(())
    }

    async fn start_workflow(
        &self,
        scope: &CompanyScope,
        workflow_id: &str,
    ) -> Result<()> {
        self.update_workflow(
            scope,
            workflow_id,
            &UpdateWorkflow {
                name: None,
                status: Some("running".to_string()),
            },
        )
        .await
    }

    async fn list_campaigns(
        &self,
        scope: &CompanyScope,
    ) -> Result<Vec<Value>> {
        Self::check_scope(scope)?;
        let tenants = self.tenants.read().await;
        Ok(tenants.get(scope.company_id()).map(|t| t.campaigns.clone()).unwrap_or_default())
    }
}
