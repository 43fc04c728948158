//! # Mailflow
//!
//! Mailflow is the client-side model of an email-automation workflow.
//! It is designed to be embedded in tools that edit a company's workflows
//! against the email-marketing backend's REST API.
//!
//! ## Core Features
//!
//! - **Action Tree**: Rebuilds the nested action tree (children plus yes/no branches) from the backend's flat list
//! - **Editing**: Appends, edits and removes actions while keeping parent links valid
//! - **Readiness**: Checks that every action has its required fields before a workflow is started
//! - **Tenant Scoping**: Every REST call is made under `/api/{companyID}/`, taken from the access token
//! - **Pluggable Backend**: HTTP client for production, in-memory backend for tests
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mailflow::{ClientBuilder, CompanyScope, workflow::{ActionDraft, ActionKind, WorkflowEditor}};
//!
//! let api = ClientBuilder::new().base_url("https://mail.example.com/api").token(&token).build()?;
//! let scope = api.token_scope();
//!
//! let (mut editor, _report) = WorkflowEditor::load(Arc::new(api), scope, workflow_id).await?;
//! let id = editor.append_action(None, None, ActionDraft::new(ActionKind::Email)).await?;
//! ```

mod api;
mod builder;
mod config;
mod error;
mod model;
pub mod workflow;

pub use api::{CompanyScope, HttpWorkflowApi, MemWorkflowApi, WorkflowApi};
pub use builder::ClientBuilder;
pub use config::{ApiConfig, Config, WorkflowConfig};
pub use error::MailflowError;
pub use model::*;

/// Result type alias for Mailflow operations.
pub type Result<T> = std::result::Result<T, MailflowError>;
