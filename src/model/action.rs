use serde::{Deserialize, Serialize};

use crate::{MailflowError, Result, workflow::ActionKind};

/// Action record as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionModel {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    /// serialized payload
    #[serde(default)]
    pub data: Option<String>,
}

impl ActionModel {
    pub fn from_json(s: &str) -> Result<Vec<Self>> {
        serde_json::from_str::<Vec<ActionModel>>(s).map_err(|e| MailflowError::Convert(format!("invalid action list: {}", e)))
    }
}

/// Body of the create-action call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAction {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub title: String,
    pub parent_id: String,
    /// carries the branch tag when the action is created inside a branch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// Reply of the create-action call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedAction {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

/// Body of the update-action call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateAction {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub data: String,
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_action_list_from_json() {
        let actions = ActionModel::from_json(
            r#"[
                {"id": "1", "type": "condition", "parent_id": "00000000-0000-0000-0000-000000000000"},
                {"id": "2", "type": "email", "parent_id": "1", "data": "{\"branch\":\"yes\"}"},
                {"id": "3", "type": "wait", "parent_id": null}
            ]"#,
        )
        .unwrap();
        assert_eq!(actions.len(), 3);
        assert_eq!(actions[0].kind, ActionKind::Condition);
        assert_eq!(actions[1].data.as_deref(), Some(r#"{"branch":"yes"}"#));
        assert_eq!(actions[2].parent_id, None);
    }

    #[test]
    fn test_action_list_invalid() {
        assert!(ActionModel::from_json("{}").is_err());
    }

    #[test]
    fn test_created_action_wire_names() {
        let created: CreatedAction = serde_json::from_value(json!({"ID": "abc", "parent_id": "p"})).unwrap();
        assert_eq!(created.id, "abc");
        assert_eq!(created.parent_id.as_deref(), Some("p"));
    }

    #[test]
    fn test_new_action_skips_empty_data() {
        let body = serde_json::to_value(NewAction {
            kind: ActionKind::Wait,
            title: "Wait".into(),
            parent_id: "p".into(),
            data: None,
        })
        .unwrap();
        assert_eq!(body, json!({"type": "wait", "title": "Wait", "parent_id": "p"}));
    }
}
