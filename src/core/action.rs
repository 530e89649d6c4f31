//! Payloads and tagged actions.
//!
//! A creator hands back a [`Payload`]; [`Action::tag`] turns it into the
//! object dispatch receives by adding a `type` field when the creator didn't
//! set one itself.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ActionError;

/// Field name every tagged action carries.
pub const TYPE_KEY: &str = "type";

/// The plain object a creator returns.
pub type Payload = Map<String, Value>;

// ───────────────────────────────────────── action ────────────

/// A payload with a guaranteed `type` field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Action(Payload);

impl Action {
    /// Tag `payload` with `action_type`.
    ///
    /// Fields are copied first, then `type` is set only if absent, so a
    /// creator-supplied `type` always wins over the computed one.
    pub fn tag(payload: Payload, action_type: &str) -> Self {
        let mut fields = payload;
        fields
            .entry(TYPE_KEY)
            .or_insert_with(|| Value::String(action_type.to_owned()));
        Self(fields)
    }

    /// Tag whatever a creator returned.  `null` is treated as an empty
    /// payload; any other non-object value is rejected.
    pub fn from_creator_output(output: Value, action_type: &str) -> Result<Self, ActionError> {
        match output {
            Value::Object(payload) => Ok(Self::tag(payload, action_type)),
            Value::Null => Ok(Self::tag(Payload::new(), action_type)),
            other => Err(ActionError::NonObjectPayload {
                action_type: action_type.to_owned(),
                found: value_kind(&other),
            }),
        }
    }

    /// The `type` field as a string, if it is one.
    ///
    /// A creator may set a non-string `type`; that value is preserved and
    /// this returns `None`.
    pub fn action_type(&self) -> Option<&str> {
        self.0.get(TYPE_KEY).and_then(Value::as_str)
    }

    /// Field lookup, `type` included.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Unwrap into the plain field map, `type` included.
    pub fn into_payload(self) -> Payload {
        self.0
    }
}

impl From<Action> for Value {
    fn from(action: Action) -> Self {
        Value::Object(action.0)
    }
}

impl PartialEq<Value> for Action {
    fn eq(&self, other: &Value) -> bool {
        other.as_object() == Some(&self.0)
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(v: Value) -> Payload {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn adds_type_when_missing() {
        let action = Action::tag(payload(json!({ "a": "hi" })), "one");
        assert_eq!(action, json!({ "type": "one", "a": "hi" }));
        assert_eq!(action.action_type(), Some("one"));
    }

    #[test]
    fn keeps_creator_type() {
        let action = Action::tag(payload(json!({ "type": "foo", "a": "z" })), "one");
        assert_eq!(action, json!({ "type": "foo", "a": "z" }));
    }

    #[test]
    fn keeps_non_string_creator_type() {
        let action = Action::tag(payload(json!({ "type": 7 })), "one");
        assert_eq!(action.get(TYPE_KEY), Some(&json!(7)));
        assert_eq!(action.action_type(), None);
    }

    #[test]
    fn null_output_is_empty_payload() {
        let action = Action::from_creator_output(Value::Null, "nil").unwrap();
        assert_eq!(action, json!({ "type": "nil" }));
    }

    #[test]
    fn rejects_scalar_output() {
        let err = Action::from_creator_output(json!(3), "count").unwrap_err();
        assert_eq!(
            err,
            ActionError::NonObjectPayload {
                action_type: "count".into(),
                found: "a number",
            }
        );
    }

    #[test]
    fn serialises_as_plain_object() {
        let action = Action::tag(payload(json!({ "c": "baz" })), "foo_bar");
        let text = serde_json::to_string(&action).unwrap();
        let back: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back, json!({ "type": "foo_bar", "c": "baz" }));
    }
}
