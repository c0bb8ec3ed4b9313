//! Bundle payload and bundle-list types

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::truthy;

/// How a file's `data` field is to be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileEncoding {
    /// Inline bytes, standard base64 alphabet
    #[serde(rename = "BASE64")]
    Base64,

    /// `data` is a URL the client fetches itself
    #[serde(rename = "GETURL")]
    GetUrl,

    /// Any tag this server does not decode
    #[serde(other, skip_serializing)]
    Unsupported,
}

/// One derived signal (SSFF) file of a bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SsffFile {
    pub data: String,
    pub encoding: FileEncoding,
    #[serde(rename = "fileExtension")]
    pub file_extension: String,
}

/// Reference to the bundle's audio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaFile {
    pub data: String,
    pub encoding: FileEncoding,
}

/// A bundle as exchanged with the editor
///
/// The annotation document is carried as raw JSON so that it round-trips
/// verbatim; only `name` and `annotates` are ever read from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundlePayload {
    pub annotation: Value,

    #[serde(rename = "mediaFile", default, skip_serializing_if = "Option::is_none")]
    pub media_file: Option<MediaFile>,

    #[serde(rename = "ssffFiles", default)]
    pub ssff_files: Vec<SsffFile>,
}

impl BundlePayload {
    /// `annotation.name`, the bundle name
    pub fn annotation_name(&self) -> Option<&str> {
        self.annotation.get("name").and_then(Value::as_str)
    }

    /// `annotation.annotates`, the audio file name
    pub fn annotates(&self) -> Option<&str> {
        self.annotation.get("annotates").and_then(Value::as_str)
    }

    /// `annotation.sampleRate`
    pub fn annotation_sample_rate(&self) -> Option<u64> {
        self.annotation.get("sampleRate").and_then(Value::as_u64)
    }
}

/// One row of a user's bundle list
///
/// Keys other than the four tracked here are preserved untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleListEntry {
    pub name: String,

    pub session: String,

    #[serde(
        rename = "finishedEditing",
        default,
        deserialize_with = "deserialize_truthy"
    )]
    pub finished_editing: bool,

    #[serde(default, deserialize_with = "deserialize_comment")]
    pub comment: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BundleListEntry {
    pub fn new(name: impl Into<String>, session: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            session: session.into(),
            finished_editing: false,
            comment: String::new(),
            extra: Map::new(),
        }
    }

    pub fn matches(&self, name: &str, session: &str) -> bool {
        self.name == name && self.session == session
    }
}

fn deserialize_truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(truthy(&value))
}

fn deserialize_comment<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}
