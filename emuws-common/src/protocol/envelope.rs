//! Request and response envelopes

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Protocol name reported by `GETPROTOCOL`
pub const PROTOCOL_NAME: &str = "EMU-webApp-websocket-protocol";

/// Protocol version reported by `GETPROTOCOL`
pub const PROTOCOL_VERSION: &str = "0.0.2";

/// Raw inbound message before command decoding
///
/// `callbackID` is kept as an untouched JSON value so it can be echoed
/// verbatim whatever type the client chose.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestEnvelope {
    /// Command tag; any JSON type is accepted so a non-string tag still
    /// gets an answer
    #[serde(rename = "type", default)]
    pub kind: Value,

    #[serde(rename = "callbackID", default)]
    pub callback_id: Option<Value>,

    /// Remaining command-specific fields
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl RequestEnvelope {
    /// Decode a text frame
    ///
    /// Returns `None` when the text is not a JSON object or carries no usable
    /// `callbackID`; such messages cannot be answered.
    pub fn parse(text: &str) -> Option<Self> {
        let envelope: Self = serde_json::from_str(text).ok()?;
        match envelope.callback_id {
            None | Some(Value::Null) => None,
            Some(_) => Some(envelope),
        }
    }

    /// Command tag when it is a string
    pub fn tag(&self) -> Option<&str> {
        self.kind.as_str()
    }
}

/// Outcome of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatusKind {
    Success,
    Error,
}

/// Status block of every response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    #[serde(rename = "type")]
    pub kind: StatusKind,
    pub message: String,
}

/// Outbound message, correlated to its request by `callbackID`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(rename = "callbackID")]
    pub callback_id: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    pub status: Status,
}

impl ResponseEnvelope {
    pub fn success(callback_id: Value, data: Option<Value>) -> Self {
        Self {
            callback_id,
            data,
            status: Status {
                kind: StatusKind::Success,
                message: String::new(),
            },
        }
    }

    pub fn error(callback_id: Value, message: impl Into<String>) -> Self {
        Self {
            callback_id,
            data: None,
            status: Status {
                kind: StatusKind::Error,
                message: message.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.kind == StatusKind::Success
    }
}

/// `GETPROTOCOL` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolInfo {
    pub protocol: String,
    pub version: String,
}

impl Default for ProtocolInfo {
    fn default() -> Self {
        Self {
            protocol: PROTOCOL_NAME.to_string(),
            version: PROTOCOL_VERSION.to_string(),
        }
    }
}
