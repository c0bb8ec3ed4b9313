//! HTTP API handlers for emuws-server

pub mod cookies;
pub mod file;
pub mod service;
pub mod ws;

pub use cookies::SessionCookies;
pub use file::get_bundle_file;
pub use service::{service_routes, BuildInfo};
pub use ws::{serve_connection, websocket_or_empty};
