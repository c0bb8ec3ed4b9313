//! Command Dispatcher
//!
//! Turns one inbound text frame into at most one response. The only state
//! is the credential pair captured when the connection opened; every
//! message is authorized again with it before being routed.
//!
//! Messages that are not JSON objects with a `callbackID` are logged and
//! dropped since there is nothing to correlate an answer with. Everything
//! else gets exactly one response: SUCCESS with data, or ERROR with a
//! message.

use emuws_common::db::Identity;
use emuws_common::protocol::{Command, ProtocolInfo, RequestEnvelope, ResponseEnvelope};
use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::auth::{redact, AuthorizationGate};
use crate::bundle::{BundleAssembler, BundlePersister, Progress};
use crate::catalog;
use crate::error::{Error, Result};
use crate::registry::BundleListStore;
use crate::repo::RepositoryLayout;

/// Cookie carrying the editor session token
pub const SESSION_COOKIE: &str = "PHPSESSID";

/// Cookie carrying the project id
pub const PROJECT_COOKIE: &str = "projectId";

/// `GETDOUSERMANAGEMENT` answer: this server never manages users
pub const USER_MANAGEMENT_DISABLED: &str = "NO";

/// Credentials captured once per connection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionCredentials {
    pub token: Option<String>,
    pub project_id: Option<String>,
}

impl ConnectionCredentials {
    pub fn new(token: Option<String>, project_id: Option<String>) -> Self {
        Self { token, project_id }
    }

    /// Read both values from a `Cookie` request header
    ///
    /// Values are percent-decoded; one that does not decode to UTF-8 is
    /// kept as sent.
    pub fn from_cookie_header(header: Option<&str>) -> Self {
        let mut credentials = Self::default();
        let Some(header) = header else {
            return credentials;
        };

        for pair in header.split(';') {
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            let value = decode_cookie_value(value.trim().trim_matches('"'));
            match name.trim() {
                SESSION_COOKIE => credentials.token = Some(value),
                PROJECT_COOKIE => credentials.project_id = Some(value),
                _ => {}
            }
        }

        credentials
    }

    /// Token shortened for logs
    pub fn redacted_token(&self) -> String {
        self.token.as_deref().map(redact).unwrap_or_else(|| "<none>".to_string())
    }
}

fn decode_cookie_value(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// Routes authorized commands to their handlers
pub struct Dispatcher {
    gate: Arc<AuthorizationGate>,
    layout: RepositoryLayout,
    lists: Arc<dyn BundleListStore>,
    assembler: BundleAssembler,
    persister: BundlePersister,
}

impl Dispatcher {
    pub fn new(
        gate: Arc<AuthorizationGate>,
        layout: RepositoryLayout,
        lists: Arc<dyn BundleListStore>,
        assembler: BundleAssembler,
        persister: BundlePersister,
    ) -> Self {
        Self {
            gate,
            layout,
            lists,
            assembler,
            persister,
        }
    }

    pub fn gate(&self) -> &Arc<AuthorizationGate> {
        &self.gate
    }

    /// Handle one inbound text frame
    ///
    /// Returns `None` only for messages that were dropped.
    pub async fn handle_message(
        &self,
        credentials: &ConnectionCredentials,
        text: &str,
    ) -> Option<ResponseEnvelope> {
        let Some(envelope) = RequestEnvelope::parse(text) else {
            warn!("Dropping malformed message ({} bytes)", text.len());
            return None;
        };
        let callback_id = envelope.callback_id.clone().unwrap_or(Value::Null);

        let identity = match self
            .gate
            .authenticate(credentials.token.as_deref(), credentials.project_id.as_deref())
            .await
        {
            Ok(identity) => identity,
            Err(e) => {
                warn!("User failed authentication/authorization. Reason: {}", e);
                return Some(ResponseEnvelope::error(callback_id, e.to_string()));
            }
        };
        // The gate has rejected absent project ids already
        let project_id = credentials.project_id.clone().unwrap_or_default();

        let command = match Command::decode(envelope.tag(), &envelope.fields) {
            Ok(command) => command,
            Err(e) => {
                warn!("{} from user {}: {}", e.tag, identity.username, e);
                return Some(ResponseEnvelope::error(callback_id, e.to_string()));
            }
        };

        info!("{} from user {}", command.tag(), identity.username);

        if let Command::Unknown(tag) = &command {
            warn!("Unknown command {:?} from user {}", tag, identity.username);
            return Some(ResponseEnvelope::error(callback_id, "Unknown command"));
        }

        let tag = command.tag().to_string();
        let outcome = AssertUnwindSafe(self.execute(&identity, &project_id, command))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                error!("Handler for {} panicked", tag);
                Err(Error::Internal)
            });

        Some(match outcome {
            Ok(data) => ResponseEnvelope::success(callback_id, data),
            Err(e) => {
                match &e {
                    Error::Registry(cause) => warn!("{} failed: registry: {}", tag, cause),
                    other => warn!("{} failed: {}", tag, other),
                }
                ResponseEnvelope::error(callback_id, e.to_string())
            }
        })
    }

    async fn execute(
        &self,
        identity: &Identity,
        project_id: &str,
        command: Command,
    ) -> Result<Option<Value>> {
        match command {
            Command::GetProtocol => Ok(Some(serde_json::to_value(ProtocolInfo::default())?)),

            Command::GetDoUserManagement => {
                Ok(Some(Value::String(USER_MANAGEMENT_DISABLED.to_string())))
            }

            Command::GetGlobalDbConfig => {
                let config = catalog::load_project_config(&self.layout, project_id).await?;
                Ok(Some(config))
            }

            Command::GetBundleList => {
                let bundles = self
                    .lists
                    .find_bundle_list(project_id, &identity.username)
                    .await?
                    .map(|list| list.bundles)
                    .unwrap_or_default();

                if bundles.is_empty() {
                    // The editor rejects an empty list
                    warn!(
                        "Bundle list of {} in project {} is empty or missing",
                        identity.username, project_id
                    );
                }
                Ok(Some(serde_json::to_value(bundles)?))
            }

            Command::GetBundle(request) => {
                let tracks = catalog::resolve_tracks(&self.layout, project_id).await?;
                let payload = self
                    .assembler
                    .assemble(identity, project_id, &request.session, &request.name, &tracks)
                    .await?;
                Ok(Some(serde_json::to_value(payload)?))
            }

            Command::SaveBundle(request) => {
                let progress = Progress {
                    finished_editing: request.finished(),
                    comment: request.comment_text(),
                };
                self.persister
                    .persist(identity, project_id, &request.session, &request.payload, &progress)
                    .await?;
                Ok(None)
            }

            Command::Unknown(_) => Err(Error::InvalidRequest("Unknown command".to_string())),
        }
    }
}
