//! Kind-specific action payloads.
//!
//! The backend keeps each action's payload as an opaque JSON string in its
//! `data` column. It is parsed once, when the action is loaded, into an
//! [`ActionPayload`] and serialized back only when the action is edited.
//! Loading is lenient: a field of the wrong type is treated as unset and a
//! string that is not a JSON object yields an empty payload. Payloads built
//! from caller input go through [`ActionPayload::create`] instead, which
//! validates against the kind's JSON schema.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::{
    MailflowError, Result,
    workflow::{action::Branch, delay::Delay},
};

const TYPE_KEY: &str = "type";
const BRANCH_KEY: &str = "branch";

/// Variant tag of an action. Unknown tags are preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionKind {
    Email,
    Wait,
    Condition,
    Other(String),
}

impl ActionKind {
    pub fn as_str(&self) -> &str {
        match self {
            ActionKind::Email => "email",
            ActionKind::Wait => "wait",
            ActionKind::Condition => "condition",
            ActionKind::Other(s) => s.as_str(),
        }
    }

    /// Default title shown for a freshly created action of this kind.
    pub fn default_title(&self) -> String {
        match self {
            ActionKind::Email => "Email".to_string(),
            ActionKind::Wait => "Wait".to_string(),
            ActionKind::Condition => "Condition".to_string(),
            ActionKind::Other(s) => s.clone(),
        }
    }
}

impl From<String> for ActionKind {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "email" => ActionKind::Email,
            "wait" => ActionKind::Wait,
            "condition" => ActionKind::Condition,
            _ => ActionKind::Other(s),
        }
    }
}

impl From<&str> for ActionKind {
    fn from(s: &str) -> Self {
        ActionKind::from(s.to_string())
    }
}

impl From<ActionKind> for String {
    fn from(kind: ActionKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ActionKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a condition waits for on the preceding email.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::EnumString, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Criterion {
    Read,
    Click,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(rename = "HTML", default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_open: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track_click: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct WaitPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<Delay>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionPayload {
    #[serde(rename = "criteria", default, skip_serializing_if = "Option::is_none")]
    pub criterion: Option<Criterion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<Delay>,
}

/// Typed payload of an action, one variant per [`ActionKind`].
#[derive(Debug, Clone, PartialEq)]
pub enum ActionPayload {
    Email(EmailPayload),
    Wait(WaitPayload),
    Condition(ConditionPayload),
    /// Payload of an unknown kind, kept as the raw JSON object.
    Other(Map<String, Value>),
}

/// Result of leniently parsing an action's stored `data` string.
#[derive(Debug, Clone)]
pub struct ParsedData {
    pub payload: ActionPayload,
    /// Branch tag, if present and valid.
    pub branch: Option<Branch>,
    /// Branch tag as stored, present even when it is not `yes`/`no`.
    pub branch_raw: Option<String>,
    /// Why the data string could not be read, if it could not.
    pub error: Option<String>,
}

fn non_empty(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.is_empty())
}

fn get_string(
    map: &Map<String, Value>,
    key: &str,
) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

fn get_bool(
    map: &Map<String, Value>,
    key: &str,
) -> Option<bool> {
    map.get(key).and_then(Value::as_bool)
}

fn get_parsed<T: std::str::FromStr>(
    map: &Map<String, Value>,
    key: &str,
) -> Option<T> {
    map.get(key).and_then(Value::as_str).and_then(|s| s.parse().ok())
}

impl ActionPayload {
    /// An empty payload for `kind`, as created by the "select type" step.
    pub fn empty(kind: &ActionKind) -> Self {
        match kind {
            ActionKind::Email => ActionPayload::Email(EmailPayload::default()),
            ActionKind::Wait => ActionPayload::Wait(WaitPayload::default()),
            ActionKind::Condition => ActionPayload::Condition(ConditionPayload::default()),
            ActionKind::Other(_) => ActionPayload::Other(Map::new()),
        }
    }

    /// Strictly builds a payload of `kind` from caller-supplied JSON.
    ///
    /// The value is validated against [`ActionPayload::schema`] first, so a
    /// malformed duration or an unknown criterion is rejected instead of
    /// silently dropped. Missing fields are allowed.
    pub fn create(
        kind: &ActionKind,
        params: Value,
    ) -> Result<Self> {
        jsonschema::validate(&Self::schema(kind), &params)?;
        let payload = match kind {
            ActionKind::Email => ActionPayload::Email(serde_json::from_value(params)?),
            ActionKind::Wait => ActionPayload::Wait(serde_json::from_value(params)?),
            ActionKind::Condition => ActionPayload::Condition(serde_json::from_value(params)?),
            ActionKind::Other(_) => match params {
                Value::Object(map) => ActionPayload::Other(map),
                _ => return Err(MailflowError::Action("payload must be a JSON object".to_string())),
            },
        };
        Ok(payload)
    }

    /// JSON schema describing the accepted shape of a payload of `kind`.
    pub fn schema(kind: &ActionKind) -> Value {
        let branch = json!({ "type": "string", "enum": ["yes", "no"] });
        let duration = json!({ "type": "string", "pattern": "^\\s*[0-9]+[smhd]\\s*$" });
        match kind {
            ActionKind::Email => json!({
                "type": "object",
                "properties": {
                    "subject": { "type": "string" },
                    "HTML": { "type": "string" },
                    "from": { "type": "string" },
                    "reply_to": { "type": "string" },
                    "track_open": { "type": "boolean" },
                    "track_click": { "type": "boolean" },
                    "branch": branch
                }
            }),
            ActionKind::Wait => json!({
                "type": "object",
                "properties": {
                    "duration": duration,
                    "branch": branch
                }
            }),
            ActionKind::Condition => json!({
                "type": "object",
                "properties": {
                    "criteria": { "type": "string", "enum": ["read", "click"] },
                    "duration": duration,
                    "branch": branch
                }
            }),
            ActionKind::Other(_) => json!({ "type": "object" }),
        }
    }

    /// Leniently parses a stored `data` string for an action of `kind`.
    pub fn parse(
        kind: &ActionKind,
        data: Option<&str>,
    ) -> ParsedData {
        let (map, error) = match data.map(str::trim) {
            None | Some("") => (Map::new(), None),
            Some(text) => match serde_json::from_str::<Value>(text) {
                Ok(Value::Object(map)) => (map, None),
                Ok(other) => (Map::new(), Some(format!("expected a JSON object, found {}", other))),
                Err(e) => (Map::new(), Some(e.to_string())),
            },
        };

        let branch_raw = get_string(&map, BRANCH_KEY);
        let branch = branch_raw.as_deref().and_then(|b| b.parse::<Branch>().ok());

        let payload = match kind {
            ActionKind::Email => ActionPayload::Email(EmailPayload {
                subject: get_string(&map, "subject"),
                html: get_string(&map, "HTML"),
                from: get_string(&map, "from"),
                reply_to: get_string(&map, "reply_to"),
                track_open: get_bool(&map, "track_open"),
                track_click: get_bool(&map, "track_click"),
            }),
            ActionKind::Wait => ActionPayload::Wait(WaitPayload {
                duration: get_parsed(&map, "duration"),
            }),
            ActionKind::Condition => ActionPayload::Condition(ConditionPayload {
                criterion: get_parsed(&map, "criteria"),
                duration: get_parsed(&map, "duration"),
            }),
            ActionKind::Other(_) => {
                let mut map = map;
                map.remove(BRANCH_KEY);
                ActionPayload::Other(map)
            }
        };

        ParsedData {
            payload,
            branch,
            branch_raw,
            error,
        }
    }

    pub fn kind(&self) -> Option<ActionKind> {
        match self {
            ActionPayload::Email(_) => Some(ActionKind::Email),
            ActionPayload::Wait(_) => Some(ActionKind::Wait),
            ActionPayload::Condition(_) => Some(ActionKind::Condition),
            ActionPayload::Other(_) => None,
        }
    }

    /// Whether this payload can be stored on an action of `kind`.
    pub fn matches(
        &self,
        kind: &ActionKind,
    ) -> bool {
        match self {
            ActionPayload::Other(_) => matches!(kind, ActionKind::Other(_)),
            _ => self.kind().as_ref() == Some(kind),
        }
    }

    /// Overlays every field set in `update` onto `self`.
    pub fn merge(
        &mut self,
        update: ActionPayload,
    ) -> Result<()> {
        match (self, update) {
            (ActionPayload::Email(cur), ActionPayload::Email(new)) => {
                cur.subject = new.subject.or(cur.subject.take());
                cur.html = new.html.or(cur.html.take());
                cur.from = new.from.or(cur.from.take());
                cur.reply_to = new.reply_to.or(cur.reply_to.take());
                cur.track_open = new.track_open.or(cur.track_open);
                cur.track_click = new.track_click.or(cur.track_click);
            }
            (ActionPayload::Wait(cur), ActionPayload::Wait(new)) => {
                cur.duration = new.duration.or(cur.duration);
            }
            (ActionPayload::Condition(cur), ActionPayload::Condition(new)) => {
                cur.criterion = new.criterion.or(cur.criterion);
                cur.duration = new.duration.or(cur.duration);
            }
            (ActionPayload::Other(cur), ActionPayload::Other(new)) => {
                cur.extend(new);
            }
            (cur, new) => {
                return Err(MailflowError::Action(format!(
                    "cannot merge {} payload into {} payload",
                    new.kind().map(|k| k.to_string()).unwrap_or_else(|| "custom".to_string()),
                    cur.kind().map(|k| k.to_string()).unwrap_or_else(|| "custom".to_string()),
                )));
            }
        }
        Ok(())
    }

    /// Whether every field the kind requires before the workflow may start is set.
    ///
    /// Tracking flags only need to be present; `false` counts as set.
    pub fn is_complete(&self) -> bool {
        match self {
            ActionPayload::Email(p) => {
                non_empty(&p.subject) && non_empty(&p.html) && non_empty(&p.from) && non_empty(&p.reply_to) && p.track_open.is_some() && p.track_click.is_some()
            }
            ActionPayload::Wait(p) => p.duration.is_some(),
            ActionPayload::Condition(p) => p.criterion.is_some() && p.duration.is_some(),
            ActionPayload::Other(_) => true,
        }
    }

    /// Serializes the payload into the backend's `data` string.
    pub fn to_data(
        &self,
        branch: Option<Branch>,
    ) -> Result<String> {
        let mut map = match self {
            ActionPayload::Email(p) => Self::to_map(p)?,
            ActionPayload::Wait(p) => Self::to_map(p)?,
            ActionPayload::Condition(p) => Self::to_map(p)?,
            ActionPayload::Other(map) => map.clone(),
        };
        if let Some(kind) = self.kind() {
            map.insert(TYPE_KEY.to_string(), Value::String(kind.to_string()));
        }
        if let Some(branch) = branch {
            map.insert(BRANCH_KEY.to_string(), Value::String(branch.to_string()));
        }
        Ok(serde_json::to_string(&Value::Object(map))?)
    }

    fn to_map<T: Serialize>(value: &T) -> Result<Map<String, Value>> {
        match serde_json::to_value(value)? {
            Value::Object(map) => Ok(map),
            other => Err(MailflowError::Convert(format!("payload serialized to non-object {}", other))),
        }
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;
    use crate::workflow::delay::DelayUnit;

    fn full_email() -> EmailPayload {
        EmailPayload {
            subject: Some("Welcome".into()),
            html: Some("<p>hi</p>".into()),
            from: Some("news@example.com".into()),
            reply_to: Some("support@example.com".into()),
            track_open: Some(true),
            track_click: Some(true),
        }
    }

    #[test]
    fn test_kind_from_string() {
        assert_eq!(ActionKind::from("email"), ActionKind::Email);
        assert_eq!(ActionKind::from("Condition"), ActionKind::Condition);
        assert_eq!(ActionKind::from("sms"), ActionKind::Other("sms".into()));
        assert_eq!(serde_json::to_string(&ActionKind::Wait).unwrap(), "\"wait\"");
    }

    #[test]
    fn test_email_missing_reply_to_is_incomplete() {
        let mut email = full_email();
        email.reply_to = None;
        assert!(!ActionPayload::Email(email).is_complete());
        assert!(ActionPayload::Email(full_email()).is_complete());
    }

    #[test]
    fn test_email_empty_string_is_incomplete() {
        let mut email = full_email();
        email.subject = Some(String::new());
        assert!(!ActionPayload::Email(email).is_complete());
    }

    #[test]
    fn test_email_explicit_false_tracking_is_complete() {
        let mut email = full_email();
        email.track_open = Some(false);
        email.track_click = Some(false);
        assert!(ActionPayload::Email(email).is_complete());

        let mut email = full_email();
        email.track_open = None;
        assert!(!ActionPayload::Email(email).is_complete());
    }

    #[test]
    fn test_wait_completeness() {
        let parsed = ActionPayload::parse(&ActionKind::Wait, Some(r#"{"duration":""}"#));
        assert!(!parsed.payload.is_complete());
        let parsed = ActionPayload::parse(&ActionKind::Wait, Some(r#"{"duration":"3h"}"#));
        assert!(parsed.payload.is_complete());
    }

    #[test]
    fn test_condition_completeness() {
        let parsed = ActionPayload::parse(&ActionKind::Condition, Some(r#"{"criteria":"read"}"#));
        assert!(!parsed.payload.is_complete());
        let parsed = ActionPayload::parse(&ActionKind::Condition, Some(r#"{"criteria":"click","duration":"2d"}"#));
        assert!(parsed.payload.is_complete());
    }

    #[test]
    fn test_other_kind_is_complete() {
        let parsed = ActionPayload::parse(&ActionKind::Other("sms".into()), None);
        assert!(parsed.payload.is_complete());
    }

    #[test]
    fn test_parse_reads_branch() {
        let parsed = ActionPayload::parse(&ActionKind::Email, Some(r#"{"branch":"yes","subject":"s"}"#));
        assert_eq!(parsed.branch, Some(Branch::Yes));
        assert_eq!(parsed.branch_raw.as_deref(), Some("yes"));

        let parsed = ActionPayload::parse(&ActionKind::Email, Some(r#"{"branch":"maybe"}"#));
        assert_eq!(parsed.branch, None);
        assert_eq!(parsed.branch_raw.as_deref(), Some("maybe"));
    }

    #[test]
    fn test_parse_malformed_data_is_soft() {
        let parsed = ActionPayload::parse(&ActionKind::Wait, Some("{not json"));
        assert_eq!(parsed.payload, ActionPayload::Wait(WaitPayload::default()));
        assert!(parsed.error.is_some());

        let parsed = ActionPayload::parse(&ActionKind::Wait, Some("[1,2]"));
        assert!(parsed.error.is_some());
    }

    #[test]
    fn test_parse_wrong_field_type_is_unset() {
        let parsed = ActionPayload::parse(&ActionKind::Email, Some(r#"{"track_open":"yes","subject":"hello"}"#));
        let ActionPayload::Email(email) = parsed.payload else {
            panic!("expected email payload");
        };
        assert_eq!(email.track_open, None);
        assert_eq!(email.subject.as_deref(), Some("hello"));
        assert!(parsed.error.is_none());
    }

    #[test]
    fn test_to_data_writes_type_and_branch() {
        let payload = ActionPayload::Wait(WaitPayload {
            duration: Some(Delay::new(5, DelayUnit::Days)),
        });
        let data = payload.to_data(Some(Branch::No)).unwrap();
        let value: Value = serde_json::from_str(&data).unwrap();
        assert_eq!(value, json!({"type": "wait", "duration": "5d", "branch": "no"}));

        let reparsed = ActionPayload::parse(&ActionKind::Wait, Some(&data));
        assert_eq!(reparsed.payload, payload);
        assert_eq!(reparsed.branch, Some(Branch::No));
    }

    #[test]
    fn test_email_to_data_uses_wire_names() {
        let data = ActionPayload::Email(full_email()).to_data(None).unwrap();
        let value: Value = serde_json::from_str(&data).unwrap();
        assert_eq!(value["HTML"], "<p>hi</p>");
        assert_eq!(value["reply_to"], "support@example.com");
        assert!(value.get("branch").is_none());
    }

    #[test]
    fn test_create_validates_schema() {
        let ok = ActionPayload::create(&ActionKind::Condition, json!({"criteria": "read", "duration": "4h"})).unwrap();
        assert!(ok.is_complete());

        assert!(ActionPayload::create(&ActionKind::Condition, json!({"criteria": "open"})).is_err());
        assert!(ActionPayload::create(&ActionKind::Wait, json!({"duration": "4 weeks"})).is_err());
        assert!(ActionPayload::create(&ActionKind::Email, json!({"track_open": "yes"})).is_err());
        assert!(ActionPayload::create(&ActionKind::Other("sms".into()), json!("text")).is_err());
    }

    #[test]
    fn test_create_allows_partial_payload() {
        let partial = ActionPayload::create(&ActionKind::Email, json!({"subject": "Hi"})).unwrap();
        assert!(!partial.is_complete());
    }

    #[test]
    fn test_merge_overlays_set_fields() {
        let mut current = ActionPayload::Email(EmailPayload {
            subject: Some("Old".into()),
            from: Some("a@example.com".into()),
            ..Default::default()
        });
        current
            .merge(ActionPayload::Email(EmailPayload {
                subject: Some("New".into()),
                track_open: Some(false),
                ..Default::default()
            }))
            .unwrap();
        let ActionPayload::Email(email) = current else {
            panic!("expected email payload");
        };
        assert_eq!(email.subject.as_deref(), Some("New"));
        assert_eq!(email.from.as_deref(), Some("a@example.com"));
        assert_eq!(email.track_open, Some(false));
    }

    #[test]
    fn test_merge_rejects_kind_mismatch() {
        let mut current = ActionPayload::empty(&ActionKind::Wait);
        assert!(current.merge(ActionPayload::empty(&ActionKind::Email)).is_err());
    }
}
