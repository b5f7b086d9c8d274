//! Authenticated Graph session for one run
//!
//! Provides:
//! - Sign-in with the fixed scope list through an [`AuthProvider`]
//! - A Graph client bound to the signed-in account
//! - Teardown on `disconnect()` or, failing that, on drop

use tracing::info;

use crate::auth::AuthProvider;
use crate::config::{Config, GRAPH_SCOPES};
use crate::error::{Error, Result};
use crate::graph::GraphClient;

/// Session guard that owns the Graph client for the duration of a run.
pub struct GraphSession {
    client: GraphClient,
    sender_id: String,
    connected: bool,
}

impl GraphSession {
    /// Sign in and bind the session to the configured sender.
    pub async fn connect(provider: &dyn AuthProvider, config: &Config) -> Result<Self> {
        let sender_id = config.require_sender_id()?.to_string();

        let token = provider
            .authenticate(GRAPH_SCOPES)
            .await
            .map_err(|e| match e {
                Error::AuthenticationFailed(_) => e,
                other => Error::AuthenticationFailed(other.to_string()),
            })?;

        let client = GraphClient::new(token, config.graph_url.clone())?;
        info!(sender = %sender_id, scopes = ?GRAPH_SCOPES, "Connected to Microsoft Graph");

        Ok(Self {
            client,
            sender_id,
            connected: true,
        })
    }

    /// Object id of the signed-in account.
    pub fn sender_id(&self) -> &str {
        &self.sender_id
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// End the session. Safe to call more than once.
    pub fn disconnect(&mut self) {
        if !self.connected {
            return;
        }
        self.client.revoke();
        self.connected = false;
        info!("Disconnected from Microsoft Graph");
    }
}

impl Drop for GraphSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}

// Implement Deref to allow using GraphSession as &GraphClient
impl std::ops::Deref for GraphSession {
    type Target = GraphClient;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}
