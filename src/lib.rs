//! Microsoft Teams direct message sender
//!
//! This library provides tools to:
//! - Sign in to Microsoft Graph with a fixed set of delegated scopes
//! - Resolve users by email address
//! - Find or create one-on-one chats with those users
//! - Send the same plain-text message to everyone in a users file

pub mod auth;
pub mod chat;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod graph;
pub mod metrics;
pub mod recipients;
pub mod session;

// Re-export common types
pub use auth::{AccessToken, AuthProvider, DeviceCodeAuth, StaticTokenAuth};
pub use config::{Config, DEFAULT_MESSAGE, GRAPH_SCOPES};
pub use dispatcher::{DeliveryOutcome, Dispatcher, RunSummary};
pub use error::{Error, Result};
pub use graph::GraphClient;
pub use recipients::Recipient;
pub use session::GraphSession;

// Commands module uses re-exported types, so it must be declared after the re-exports
pub mod commands;
