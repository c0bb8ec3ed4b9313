//! EMU-webApp WebSocket protocol types
//!
//! Inbound messages are JSON objects `{type, callbackID, ...fields}`;
//! every answered request gets exactly one
//! `{callbackID, data?, status: {type, message}}` back.
//!
//! # Design Principle
//!
//! This module contains ONLY serde types and pure parsing. Transport,
//! authentication and handler logic live in emuws-server.

pub mod bundle;
pub mod command;
pub mod envelope;

pub use bundle::{BundleListEntry, BundlePayload, FileEncoding, MediaFile, SsffFile};
pub use command::{Command, CommandError, GetBundleRequest, SaveBundleRequest};
pub use envelope::{
    ProtocolInfo, RequestEnvelope, ResponseEnvelope, Status, StatusKind, PROTOCOL_NAME,
    PROTOCOL_VERSION,
};

use serde_json::Value;

/// Interpret a JSON value the way the editor's booleans are meant
///
/// `null`, `false`, `0`, `""` are false; every other value is true.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
