mod action;
mod envelope;
mod workflow;

pub use action::{ActionModel, CreatedAction, NewAction, UpdateAction};
pub use envelope::{ApiResponse, Items};
pub use workflow::{NewWorkflow, TriggerData, TriggerKind, UpdateWorkflow, WorkflowModel};
