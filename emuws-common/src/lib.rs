//! # emuws Common Library
//!
//! Shared code for the EMU-webApp bridge server:
//! - Wire protocol types (command envelope, responses, bundle payloads)
//! - Registry schema bootstrap and row models
//! - Configuration resolution
//! - Common error type

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod protocol;

pub use error::{Error, Result};
