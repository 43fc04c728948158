use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{MailflowError, Result};

/// Workflow record as listed by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowModel {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mailinglist_id: String,
    #[serde(default)]
    pub trigger: String,
    #[serde(default)]
    pub trigger_data: serde_json::Value,
    #[serde(default)]
    pub status: String,
}

/// Event that enrolls contacts of the mailing list into a workflow.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::EnumString, strum::Display)]
pub enum TriggerKind {
    /// contact subscribed to the list
    #[serde(rename = "welcome")]
    #[strum(serialize = "welcome")]
    Welcome,
    /// fixed calendar date
    #[serde(rename = "specific date")]
    #[strum(serialize = "specific date")]
    SpecificDate,
    /// some days after the contact was added
    #[serde(rename = "days after")]
    #[strum(serialize = "days after")]
    DaysAfter,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(rename = "daysAfter", default, skip_serializing_if = "Option::is_none")]
    pub days_after: Option<u32>,
}

/// Body of the create-workflow call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWorkflow {
    pub name: String,
    pub mailinglist_id: String,
    pub trigger: TriggerKind,
    pub trigger_data: TriggerData,
}

impl NewWorkflow {
    fn new(
        name: &str,
        mailinglist_id: &str,
        trigger: TriggerKind,
        trigger_data: TriggerData,
    ) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(MailflowError::Workflow("workflow name is required".to_string()));
        }
        if mailinglist_id.trim().is_empty() {
            return Err(MailflowError::Workflow("mailing list is required".to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            mailinglist_id: mailinglist_id.to_string(),
            trigger,
            trigger_data,
        })
    }

    /// Runs for every contact that subscribes to the list.
    pub fn welcome(
        name: &str,
        mailinglist_id: &str,
    ) -> Result<Self> {
        Self::new(name, mailinglist_id, TriggerKind::Welcome, TriggerData::default())
    }

    /// Runs once on `date`.
    pub fn on_date(
        name: &str,
        mailinglist_id: &str,
        date: NaiveDate,
    ) -> Result<Self> {
        Self::new(
            name,
            mailinglist_id,
            TriggerKind::SpecificDate,
            TriggerData {
                date: Some(date),
                days_after: None,
            },
        )
    }

    /// Runs `days` days after a contact was added; `days` must be at least 1.
    pub fn days_after(
        name: &str,
        mailinglist_id: &str,
        days: u32,
    ) -> Result<Self> {
        if days < 1 {
            return Err(MailflowError::Workflow("days after must be at least 1".to_string()));
        }
        Self::new(
            name,
            mailinglist_id,
            TriggerKind::DaysAfter,
            TriggerData {
                date: None,
                days_after: Some(days),
            },
        )
    }
}

/// Body of the update-workflow call; unset fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateWorkflow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}
