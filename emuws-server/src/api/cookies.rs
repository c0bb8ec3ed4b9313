//! Session cookie extraction
//!
//! Browsers attach the editor's `PHPSESSID` and `projectId` cookies to both
//! the WebSocket upgrade and media file requests.

use axum::{async_trait, extract::FromRequestParts, http::header::COOKIE, http::request::Parts};
use std::convert::Infallible;

use crate::dispatch::ConnectionCredentials;

/// Credentials read from the request's `Cookie` headers
///
/// Never rejects; absent cookies leave the fields empty and the
/// authorization gate reports which one is missing.
#[derive(Debug, Clone, Default)]
pub struct SessionCookies(pub ConnectionCredentials);

#[async_trait]
impl<S> FromRequestParts<S> for SessionCookies
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // HTTP/2 clients may split cookies over several headers
        let joined = parts
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect::<Vec<_>>()
            .join("; ");

        let header = (!joined.is_empty()).then_some(joined.as_str());
        Ok(SessionCookies(ConnectionCredentials::from_cookie_header(header)))
    }
}
