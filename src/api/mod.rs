//! Backend access for workflows and their actions.
//!
//! Provides an abstraction over the REST backend:
//! - `HttpWorkflowApi`: the real backend over HTTP
//! - `MemWorkflowApi`: an in-process backend for testing and demos
//!
//! Every call names the tenant explicitly through a [`CompanyScope`].

mod http;
mod mem;
pub(crate) mod scope;

use async_trait::async_trait;

use crate::{
    Result,
    model::{ActionModel, CreatedAction, NewAction, NewWorkflow, UpdateAction, UpdateWorkflow, WorkflowModel},
};

pub use http::HttpWorkflowApi;
pub use mem::MemWorkflowApi;
pub use scope::CompanyScope;

/// Workflow endpoints of the backend, rooted at `/api/{companyID}`.
#[async_trait]
pub trait WorkflowApi: Send + Sync {
    /// `POST /workflow`, returns the new workflow id.
    async fn create_workflow(
        &self,
        scope: &CompanyScope,
        workflow: &NewWorkflow,
    ) -> Result<String>;

    /// `GET /workflow?page&limit`, pages are 1-based.
    async fn list_workflows(
        &self,
        scope: &CompanyScope,
        page: u32,
        limit: u32,
    ) -> Result<Vec<WorkflowModel>>;

    /// `PUT /workflow/{id}`
    async fn update_workflow(
        &self,
        scope: &CompanyScope,
        workflow_id: &str,
        update: &UpdateWorkflow,
    ) -> Result<()>;

    /// `DELETE /workflow/{id}`
    async fn delete_workflow(
        &self,
        scope: &CompanyScope,
        workflow_id: &str,
    ) -> Result<()>;

    /// `GET /workflow/{id}/action`, the flat action list.
    async fn list_actions(
        &self,
        scope: &CompanyScope,
        workflow_id: &str,
    ) -> Result<Vec<ActionModel>>;

    /// `POST /workflow/{id}/action`
    async fn create_action(
        &self,
        scope: &CompanyScope,
        workflow_id: &str,
        action: &NewAction,
    ) -> Result<CreatedAction>;

    /// `PUT /workflow/{id}/action/{actionId}`
    async fn update_action(
        &self,
        scope: &CompanyScope,
        workflow_id: &str,
        action_id: &str,
        update: &UpdateAction,
    ) -> Result<()>;

    /// `POST /workflow/{id}/start`
    async fn start_workflow(
        &self,
        scope: &CompanyScope,
        workflow_id: &str,
    ) -> Result<()>;

    /// `GET /campaigns/all`, campaigns an email action can be based on.
    async fn list_campaigns(
        &self,
        scope: &CompanyScope,
    ) -> Result<Vec<serde_json::Value>>;
}
