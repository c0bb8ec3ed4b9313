//! Command decoding
//!
//! The editor's requests are a fixed set of tags. Decoding turns the loose
//! JSON object into one closed enum so handlers never look at raw fields.

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use super::bundle::BundlePayload;
use super::truthy;

/// Command tags understood by the dispatcher
pub mod tags {
    pub const GET_PROTOCOL: &str = "GETPROTOCOL";
    pub const GET_DO_USER_MANAGEMENT: &str = "GETDOUSERMANAGEMENT";
    pub const GET_GLOBAL_DB_CONFIG: &str = "GETGLOBALDBCONFIG";
    pub const GET_BUNDLE_LIST: &str = "GETBUNDLELIST";
    pub const GET_BUNDLE: &str = "GETBUNDLE";
    pub const SAVE_BUNDLE: &str = "SAVEBUNDLE";
}

/// Fields of `GETBUNDLE`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GetBundleRequest {
    pub name: String,
    pub session: String,
}

/// `data` of `SAVEBUNDLE`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SaveBundleRequest {
    #[serde(flatten)]
    pub payload: BundlePayload,

    /// Session display name, as listed in the bundle list
    pub session: String,

    #[serde(rename = "finishedEditing", default)]
    pub finished_editing: Value,

    #[serde(default)]
    pub comment: Value,
}

impl SaveBundleRequest {
    /// `finishedEditing` coerced to a boolean
    pub fn finished(&self) -> bool {
        truthy(&self.finished_editing)
    }

    /// `comment` as text; absent means empty
    pub fn comment_text(&self) -> String {
        match &self.comment {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct SaveBundleFields {
    data: SaveBundleRequest,
}

/// A decoded request
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    GetProtocol,
    GetDoUserManagement,
    GetGlobalDbConfig,
    GetBundleList,
    GetBundle(GetBundleRequest),
    SaveBundle(Box<SaveBundleRequest>),
    /// Any tag outside the fixed set, including a missing tag
    Unknown(Option<String>),
}

/// A known command whose fields do not decode
#[derive(Debug, Error, PartialEq)]
#[error("Invalid {tag} request: {reason}")]
pub struct CommandError {
    pub tag: &'static str,
    pub reason: String,
}

impl Command {
    /// Decode a command from its tag and remaining fields
    pub fn decode(kind: Option<&str>, fields: &Map<String, Value>) -> Result<Self, CommandError> {
        let Some(kind) = kind else {
            return Ok(Command::Unknown(None));
        };

        match kind {
            tags::GET_PROTOCOL => Ok(Command::GetProtocol),
            tags::GET_DO_USER_MANAGEMENT => Ok(Command::GetDoUserManagement),
            tags::GET_GLOBAL_DB_CONFIG => Ok(Command::GetGlobalDbConfig),
            tags::GET_BUNDLE_LIST => Ok(Command::GetBundleList),
            tags::GET_BUNDLE => decode_fields::<GetBundleRequest>(tags::GET_BUNDLE, fields)
                .map(Command::GetBundle),
            tags::SAVE_BUNDLE => decode_fields::<SaveBundleFields>(tags::SAVE_BUNDLE, fields)
                .map(|f| Command::SaveBundle(Box::new(f.data))),
            other => Ok(Command::Unknown(Some(other.to_string()))),
        }
    }

    /// Tag used in logs
    pub fn tag(&self) -> &str {
        match self {
            Command::GetProtocol => tags::GET_PROTOCOL,
            Command::GetDoUserManagement => tags::GET_DO_USER_MANAGEMENT,
            Command::GetGlobalDbConfig => tags::GET_GLOBAL_DB_CONFIG,
            Command::GetBundleList => tags::GET_BUNDLE_LIST,
            Command::GetBundle(_) => tags::GET_BUNDLE,
            Command::SaveBundle(_) => tags::SAVE_BUNDLE,
            Command::Unknown(Some(tag)) => tag.as_str(),
            Command::Unknown(None) => "<none>",
        }
    }
}

fn decode_fields<T: for<'de> Deserialize<'de>>(
    tag: &'static str,
    fields: &Map<String, Value>,
) -> Result<T, CommandError> {
    serde_json::from_value(Value::Object(fields.clone())).map_err(|e| CommandError {
        tag,
        reason: e.to_string(),
    })
}
