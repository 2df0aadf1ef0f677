//! Transcript types: roles, messages, tool calls, and request payload shapes.
//!
//! Decoding is only ever used to read the transcript. Repair edits the raw
//! JSON entries, so messages it keeps reach the wire exactly as they arrived.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Role of a message participant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
    /// Any other role (`developer`, `function`, ...), carried verbatim.
    #[serde(untagged)]
    Other(String),
}

/// Ids must be strings. Anything else reads as absent.
fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(id) => id,
        _ => String::new(),
    })
}

fn lenient_optional_id<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(id) => Some(id),
        _ => None,
    })
}

/// A tool invocation emitted by an assistant message.
///
/// Only `id` is typed. Name and arguments stay in their provider-specific
/// layout (`function.name` / `function.arguments` or top-level `name`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Empty when the call carries no string id; such calls declare nothing.
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ToolCall {
    /// Build a call in the common `{type: "function", function: {name, arguments}}` layout.
    pub fn function(id: impl Into<String>, name: &str, arguments: Value) -> Self {
        let mut extra = Map::new();
        extra.insert("type".into(), Value::String("function".into()));
        extra.insert(
            "function".into(),
            serde_json::json!({ "name": name, "arguments": arguments }),
        );
        Self {
            id: id.into(),
            extra,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.extra
            .get("function")
            .and_then(|f| f.get("name"))
            .and_then(Value::as_str)
            .or_else(|| self.extra.get("name").and_then(Value::as_str))
    }

    pub fn arguments(&self) -> Option<&Value> {
        self.extra
            .get("function")
            .and_then(|f| f.get("arguments"))
            .or_else(|| self.extra.get("arguments"))
    }
}

/// One transcript entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    /// Usually a string; structured content arrays are carried opaquely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(
        default,
        deserialize_with = "lenient_optional_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub tool_call_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    fn with_role(role: Role, content: Option<&str>) -> Self {
        Self {
            role,
            content: content.map(|c| Value::String(c.to_string())),
            tool_calls: None,
            tool_call_id: None,
            extra: Map::new(),
        }
    }

    pub fn system(content: &str) -> Self {
        Self::with_role(Role::System, Some(content))
    }

    pub fn user(content: &str) -> Self {
        Self::with_role(Role::User, Some(content))
    }

    pub fn assistant(content: &str) -> Self {
        Self::with_role(Role::Assistant, Some(content))
    }

    pub fn assistant_with_tool_calls(content: Option<&str>, calls: Vec<ToolCall>) -> Self {
        let mut msg = Self::with_role(Role::Assistant, content);
        msg.tool_calls = Some(calls);
        msg
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: &str) -> Self {
        let mut msg = Self::with_role(Role::Tool, Some(content));
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }

    /// Text content, when the content is a plain string.
    pub fn text(&self) -> Option<&str> {
        self.content.as_ref().and_then(Value::as_str)
    }

    /// Tool calls declared by this message. Only assistant messages declare calls.
    pub fn declared_calls(&self) -> &[ToolCall] {
        match (&self.role, &self.tool_calls) {
            (Role::Assistant, Some(calls)) => calls,
            _ => &[],
        }
    }

    /// Non-empty ids of the calls this message declares.
    pub fn declared_ids(&self) -> impl Iterator<Item = &str> {
        self.declared_calls()
            .iter()
            .map(|call| call.id.as_str())
            .filter(|id| !id.is_empty())
    }

    /// The call id this message answers, for tool-role messages carrying a non-empty id.
    pub fn result_for(&self) -> Option<&str> {
        if self.role != Role::Tool {
            return None;
        }
        self.tool_call_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Errors raised when a payload claims to carry a transcript but does not.
#[derive(Debug, thiserror::Error)]
pub enum TranscriptError {
    #[error("message {index} is not a valid transcript entry: {source}")]
    Decode {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode repaired transcript: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Where the transcript lives inside an outbound request payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestShape {
    /// An object whose `messages` field is an array.
    Wrapped,
    /// The payload itself is the message array (legacy shape).
    Bare,
    /// No transcript; passed through untouched.
    Opaque,
}

impl RequestShape {
    pub fn of(payload: &Value) -> Self {
        if payload.get("messages").is_some_and(Value::is_array) {
            Self::Wrapped
        } else if payload.is_array() {
            Self::Bare
        } else {
            Self::Opaque
        }
    }
}

/// The raw transcript entries carried by `payload`, if any.
pub fn raw_messages(payload: &Value) -> Option<&Vec<Value>> {
    match RequestShape::of(payload) {
        RequestShape::Wrapped => payload.get("messages").and_then(Value::as_array),
        RequestShape::Bare => payload.as_array(),
        RequestShape::Opaque => None,
    }
}

/// Decode the transcript carried by `payload`, if any.
pub fn extract_messages(payload: &Value) -> Result<Option<Vec<Message>>, TranscriptError> {
    let Some(raw) = raw_messages(payload) else {
        return Ok(None);
    };

    raw.iter()
        .enumerate()
        .map(|(index, value)| {
            Message::deserialize(value).map_err(|source| TranscriptError::Decode { index, source })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// Rebuild the transcript inside `payload` from its raw entries, mirroring
/// the shape it arrived in. Opaque payloads are returned unchanged.
pub fn edit_messages(payload: Value, edit: impl FnOnce(Vec<Value>) -> Vec<Value>) -> Value {
    match payload {
        Value::Array(raw) => Value::Array(edit(raw)),
        Value::Object(mut map) => {
            if let Some(Value::Array(raw)) = map.get_mut("messages") {
                let taken = std::mem::take(raw);
                *raw = edit(taken);
            }
            Value::Object(map)
        }
        other => other,
    }
}
