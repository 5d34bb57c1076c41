//! Envelope wire types and the conversation request/response payloads.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Envelope name carrying a [`ConversationRequest`] body.
pub const CONVERSATION_REQUEST: &str = "conversationRequest";
/// Envelope name carrying a [`ConversationResponse`] body.
pub const CONVERSATION_RESPONSE: &str = "conversationResponse";

/// Wire envelope: `{ "category"?, "kind"?, "name", "body" }`. Same shape both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub name: String,
    pub body: serde_json::Value,
}

/// Inbound payload that is not a JSON envelope (bad JSON, missing `name` or `body`).
#[derive(Debug, thiserror::Error)]
#[error("malformed envelope: {0}")]
pub struct MalformedEnvelope(#[from] serde_json::Error);

/// Closed set of inbound envelopes the relay understands.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// `conversationRequest`; the body is decoded later by the dispatcher.
    ConversationRequest(serde_json::Value),
    /// Any other name. Ignored so newer clients can send messages we do not know yet.
    Unrecognized(String),
}

/// Decode a raw frame (text or binary) into an envelope.
pub fn parse_envelope(payload: &[u8]) -> Result<Envelope, MalformedEnvelope> {
    // `body: null` deserializes as Value::Null, so presence is checked on the raw object.
    let value: serde_json::Value = serde_json::from_slice(payload)?;
    if value.get("body").is_none() {
        return Err(MalformedEnvelope(serde::de::Error::missing_field("body")));
    }
    Ok(serde_json::from_value(value)?)
}

impl Envelope {
    pub fn classify(self) -> Inbound {
        if self.name == CONVERSATION_REQUEST {
            Inbound::ConversationRequest(self.body)
        } else {
            Inbound::Unrecognized(self.name)
        }
    }

    /// Outbound envelope for a response: category "scene", kind "request", name "conversationResponse".
    pub fn conversation_response(response: &ConversationResponse) -> Result<Self, serde_json::Error> {
        Ok(Self {
            category: Some("scene".to_string()),
            kind: Some("request".to_string()),
            name: CONVERSATION_RESPONSE.to_string(),
            body: serde_json::to_value(response)?,
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// User utterance: `{ "input": { "text" }, "optionalArgs"? }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRequest {
    pub input: ConversationInput,
    #[serde(
        default,
        deserialize_with = "lenient_optional_args",
        skip_serializing_if = "Option::is_none"
    )]
    pub optional_args: Option<OptionalArgs>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationInput {
    pub text: String,
}

/// Free-form request arguments. Only `kind` is interpreted; other keys are kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionalArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// `optionalArgs` never fails a request: a non-object becomes `None`, and a non-string `kind`
/// stays in `extra` untouched.
fn lenient_optional_args<'de, D>(deserializer: D) -> Result<Option<OptionalArgs>, D::Error>
where
    D: Deserializer<'de>,
{
    let serde_json::Value::Object(mut extra) = serde_json::Value::deserialize(deserializer)? else {
        return Ok(None);
    };
    let kind = match extra.remove("kind") {
        Some(serde_json::Value::String(kind)) => Some(kind),
        Some(other) => {
            extra.insert("kind".to_string(), other);
            None
        }
        None => None,
    };
    Ok(Some(OptionalArgs { kind, extra }))
}

impl ConversationRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            input: ConversationInput { text: text.into() },
            optional_args: None,
        }
    }

    /// Session-start handshake (`optionalArgs.kind == "init"`).
    pub fn is_init(&self) -> bool {
        self.optional_args
            .as_ref()
            .and_then(|a| a.kind.as_deref())
            == Some("init")
    }
}

/// Reply: echoes the input, carries output text, rich-content variables and the fallback flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub input: ConversationInput,
    pub output: ConversationOutput,
    #[serde(default)]
    pub variables: HashMap<String, RichContent>,
    /// Only on the wire when true.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationOutput {
    pub text: String,
}

/// UI component descriptor referenced from output text by a directive such as `@showcards(cat)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RichContent {
    pub component: String,
    /// Passed through untouched.
    pub data: serde_json::Value,
}

impl ConversationResponse {
    pub fn new(input_text: impl Into<String>, output_text: impl Into<String>) -> Self {
        Self {
            input: ConversationInput {
                text: input_text.into(),
            },
            output: ConversationOutput {
                text: output_text.into(),
            },
            variables: HashMap::new(),
            fallback: false,
        }
    }
}
