//! Sequential delivery of one message to every recipient in a users file.
//!
//! A run validates the file, signs in once, then walks the file line by line:
//! look up the user, find or create the one-on-one chat, post the message.
//! Failures for one recipient are counted and never stop the run.

use std::fmt;
use std::path::Path;

use tracing::{info, warn};

use crate::auth::AuthProvider;
use crate::chat::resolve_chat;
use crate::config::Config;
use crate::error::Result;
use crate::metrics;
use crate::recipients::{self, Recipient};
use crate::session::GraphSession;

/// Terminal state of a single recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent { chat_id: String },
    UserNotFound,
    Failed(String),
}

impl DeliveryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DeliveryOutcome::Sent { .. })
    }

    /// Label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            DeliveryOutcome::Sent { .. } => "sent",
            DeliveryOutcome::UserNotFound => "user_not_found",
            DeliveryOutcome::Failed(_) => "failed",
        }
    }
}

/// Counters reported at the end of a run.
///
/// `total_count` is the raw line count of the users file, blank lines included,
/// so `success_count + fail_count <= total_count`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub success_count: usize,
    pub fail_count: usize,
    pub total_count: usize,
}

impl RunSummary {
    fn with_total(total_count: usize) -> Self {
        Self {
            total_count,
            ..Self::default()
        }
    }

    pub fn record(&mut self, outcome: &DeliveryOutcome) {
        if outcome.is_success() {
            self.success_count += 1;
        } else {
            self.fail_count += 1;
        }
    }

    /// Recipients that were actually attempted.
    pub fn processed(&self) -> usize {
        self.success_count + self.fail_count
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Success: {} | Failed: {} | Total: {}",
            self.success_count, self.fail_count, self.total_count
        )
    }
}

/// Deliver `message` to one recipient. Every error ends up in the outcome.
pub async fn deliver(
    session: &GraphSession,
    recipient: &Recipient,
    message: &str,
) -> DeliveryOutcome {
    match try_deliver(session, recipient, message).await {
        Ok(outcome) => outcome,
        Err(err) => DeliveryOutcome::Failed(err.to_string()),
    }
}

async fn try_deliver(
    session: &GraphSession,
    recipient: &Recipient,
    message: &str,
) -> Result<DeliveryOutcome> {
    let Some(user_id) = session.find_user_by_email(recipient.email()).await? else {
        return Ok(DeliveryOutcome::UserNotFound);
    };

    let chat_id = resolve_chat(session, session.sender_id(), &user_id).await?;
    session.send_message(&chat_id, message).await?;

    Ok(DeliveryOutcome::Sent { chat_id })
}

fn report(recipient: &Recipient, outcome: &DeliveryOutcome) {
    match outcome {
        DeliveryOutcome::Sent { chat_id } => {
            info!(email = recipient.email(), %chat_id, "Message sent");
            println!("✓ Message sent to {}", recipient.email());
        }
        DeliveryOutcome::UserNotFound => {
            warn!(email = recipient.email(), "User not found");
            eprintln!("✗ User not found: {}", recipient.email());
        }
        DeliveryOutcome::Failed(reason) => {
            warn!(email = recipient.email(), %reason, "Delivery failed");
            eprintln!("✗ Failed to send to {}: {}", recipient.email(), reason);
        }
    }
}

/// Owns one run: validation, sign-in, the recipient loop and teardown.
pub struct Dispatcher<'a> {
    provider: &'a dyn AuthProvider,
    config: &'a Config,
}

impl<'a> Dispatcher<'a> {
    pub fn new(provider: &'a dyn AuthProvider, config: &'a Config) -> Self {
        Self { provider, config }
    }

    pub async fn run(&self, users_file: &Path, message: &str) -> Result<RunSummary> {
        recipients::ensure_exists(users_file)?;

        let mut session = GraphSession::connect(self.provider, self.config).await?;
        deliver_and_disconnect(&mut session, users_file, message).await
    }
}

/// Run the recipient loop, then end the session whatever the loop returned.
async fn deliver_and_disconnect(
    session: &mut GraphSession,
    users_file: &Path,
    message: &str,
) -> Result<RunSummary> {
    let result = deliver_all(session, users_file, message).await;
    session.disconnect();
    result
}

async fn deliver_all(
    session: &GraphSession,
    users_file: &Path,
    message: &str,
) -> Result<RunSummary> {
    let lines = recipients::load_lines(users_file)?;
    let mut summary = RunSummary::with_total(lines.len());

    for line in &lines {
        let Some(recipient) = Recipient::parse(line) else {
            continue;
        };

        let outcome = deliver(session, &recipient, message).await;
        metrics::record_delivery(outcome.label());
        report(&recipient, &outcome);
        summary.record(&outcome);
    }

    info!(
        success = summary.success_count,
        failed = summary.fail_count,
        total = summary.total_count,
        "Run finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AccessToken, StaticTokenAuth};
    use crate::error::Error;
    use async_trait::async_trait;
    use httpmock::prelude::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::NamedTempFile;

    struct CountingAuth {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingAuth {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl AuthProvider for CountingAuth {
        async fn authenticate(&self, scopes: &[&str]) -> Result<AccessToken> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::AuthenticationFailed("denied".to_string()));
            }
            Ok(AccessToken::new("t", scopes))
        }
    }

    fn test_config(graph_url: String) -> Config {
        Config {
            tenant_id: String::new(),
            client_id: String::new(),
            access_token: None,
            sender_id: "me".to_string(),
            graph_url,
            login_url: "http://127.0.0.1:1".to_string(),
            default_message: "Hi".to_string(),
        }
    }

    fn users_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(content.as_bytes()).expect("write");
        file
    }

    fn mock_user<'a>(
        server: &'a MockServer,
        email: &str,
        id: Option<&str>,
    ) -> httpmock::Mock<'a> {
        let filter = format!("mail eq '{}'", email);
        let value = match id {
            Some(id) => serde_json::json!([{ "id": id }]),
            None => serde_json::json!([]),
        };
        server.mock(|when, then| {
            when.method(GET).path("/v1.0/users").query_param("$filter", filter);
            then.status(200)
                .json_body(serde_json::json!({ "value": value }));
        })
    }

    #[test]
    fn summary_records_outcomes() {
        let mut summary = RunSummary::with_total(4);
        summary.record(&DeliveryOutcome::Sent {
            chat_id: "c".into(),
        });
        summary.record(&DeliveryOutcome::UserNotFound);
        summary.record(&DeliveryOutcome::Failed("boom".into()));

        assert_eq!(summary.success_count, 1);
        assert_eq!(summary.fail_count, 2);
        assert_eq!(summary.processed(), 3);
        assert_eq!(summary.to_string(), "Success: 1 | Failed: 2 | Total: 4");
    }

    #[test]
    fn outcome_labels() {
        assert_eq!(DeliveryOutcome::UserNotFound.label(), "user_not_found");
        assert_eq!(DeliveryOutcome::Failed("x".into()).label(), "failed");
        assert!(DeliveryOutcome::Sent {
            chat_id: "c".into()
        }
        .is_success());
    }

    #[tokio::test]
    async fn missing_file_fails_before_authentication() {
        let auth = CountingAuth::new(false);
        let config = test_config("http://127.0.0.1:1/v1.0".to_string());

        let err = Dispatcher::new(&auth, &config)
            .run(Path::new("/nonexistent/users.txt"), "Hi")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::FileNotFound(_)));
        assert_eq!(auth.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn authentication_failure_aborts_without_deliveries() {
        let server = MockServer::start_async().await;
        let any_call = server.mock(|when, then| {
            when.is_true(|_| true);
            then.status(200).json_body(serde_json::json!({ "value": [] }));
        });

        let auth = CountingAuth::new(true);
        let config = test_config(server.url("/v1.0"));
        let file = users_file("alice@example.com\n");

        let err = Dispatcher::new(&auth, &config)
            .run(file.path(), "Hi")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::AuthenticationFailed(_)));
        assert_eq!(auth.calls.load(Ordering::SeqCst), 1);
        any_call.assert_calls(0);
    }

    #[tokio::test]
    async fn empty_file_is_fatal_after_sign_in() {
        let auth = CountingAuth::new(false);
        let config = test_config("http://127.0.0.1:1/v1.0".to_string());
        let file = users_file("");

        let err = Dispatcher::new(&auth, &config)
            .run(file.path(), "Hi")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::EmptyInput(_)));
        assert_eq!(auth.calls.load(Ordering::SeqCst), 1);
    }

    async fn connected_session(config: &Config) -> GraphSession {
        GraphSession::connect(&StaticTokenAuth::new("t"), config)
            .await
            .expect("session")
    }

    #[tokio::test]
    async fn session_ends_when_file_is_empty() {
        let config = test_config("http://127.0.0.1:1/v1.0".to_string());
        let mut session = connected_session(&config).await;
        let file = users_file("");

        let err = deliver_and_disconnect(&mut session, file.path(), "Hi")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::EmptyInput(_)));
        assert!(!session.is_connected());
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn session_ends_when_no_recipient_is_listed() {
        let config = test_config("http://127.0.0.1:1/v1.0".to_string());
        let mut session = connected_session(&config).await;
        let file = users_file("\n \n");

        let summary = deliver_and_disconnect(&mut session, file.path(), "Hi")
            .await
            .expect("summary");

        assert_eq!(summary.processed(), 0);
        assert_eq!(summary.total_count, 2);
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn session_ends_after_completed_run() {
        let server = MockServer::start_async().await;
        mock_user(&server, "alice@example.com", Some("user-alice"));
        server.mock(|when, then| {
            when.method(GET).path("/v1.0/me/chats");
            then.status(200).json_body(serde_json::json!({
                "value": [ { "id": "dm-alice", "chatType": "oneOnOne" } ]
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/v1.0/chats/dm-alice/members");
            then.status(200).json_body(serde_json::json!({
                "value": [ { "id": "m-1", "userId": "me" }, { "id": "m-2", "userId": "user-alice" } ]
            }));
        });
        let post_mock = server.mock(|when, then| {
            when.method(POST).path("/v1.0/chats/dm-alice/messages");
            then.status(201).json_body(serde_json::json!({ "id": "msg-1" }));
        });

        let config = test_config(server.url("/v1.0"));
        let mut session = connected_session(&config).await;
        let file = users_file("alice@example.com\n");

        let summary = deliver_and_disconnect(&mut session, file.path(), "Hi")
            .await
            .expect("summary");

        assert_eq!(summary.success_count, 1);
        post_mock.assert_calls(1);
        assert!(!session.is_connected());
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn blank_only_file_yields_zero_counts() {
        let server = MockServer::start_async().await;
        let any_call = server.mock(|when, then| {
            when.is_true(|_| true);
            then.status(500);
        });

        let auth = StaticTokenAuth::new("t");
        let config = test_config(server.url("/v1.0"));
        let file = users_file("\n  \n\t\n");

        let summary = Dispatcher::new(&auth, &config)
            .run(file.path(), "Hi")
            .await
            .expect("summary");

        assert_eq!(summary.success_count, 0);
        assert_eq!(summary.fail_count, 0);
        assert_eq!(summary.total_count, 3);
        any_call.assert_calls(0);
    }

    #[tokio::test]
    async fn unknown_user_is_counted_and_run_continues() {
        let server = MockServer::start_async().await;
        mock_user(&server, "ghost@example.com", None);
        mock_user(&server, "bob@example.com", Some("user-bob"));
        server.mock(|when, then| {
            when.method(GET).path("/v1.0/me/chats");
            then.status(200).json_body(serde_json::json!({
                "value": [ { "id": "dm-bob", "chatType": "oneOnOne" } ]
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/v1.0/chats/dm-bob/members");
            then.status(200).json_body(serde_json::json!({
                "value": [ { "id": "m-1", "userId": "me" }, { "id": "m-2", "userId": "user-bob" } ]
            }));
        });
        let post_mock = server.mock(|when, then| {
            when.method(POST).path("/v1.0/chats/dm-bob/messages");
            then.status(201).json_body(serde_json::json!({ "id": "msg-1" }));
        });

        let auth = StaticTokenAuth::new("t");
        let config = test_config(server.url("/v1.0"));
        let file = users_file("ghost@example.com\nbob@example.com\n");

        let summary = Dispatcher::new(&auth, &config)
            .run(file.path(), "Hi")
            .await
            .expect("summary");

        assert_eq!(summary.success_count, 1);
        assert_eq!(summary.fail_count, 1);
        assert_eq!(summary.total_count, 2);
        post_mock.assert_calls(1);
    }

    #[tokio::test]
    async fn post_failure_is_counted_as_failure() {
        let server = MockServer::start_async().await;
        mock_user(&server, "alice@example.com", Some("user-alice"));
        server.mock(|when, then| {
            when.method(GET).path("/v1.0/me/chats");
            then.status(200).json_body(serde_json::json!({ "value": [] }));
        });
        server.mock(|when, then| {
            when.method(POST).path("/v1.0/chats");
            then.status(201)
                .json_body(serde_json::json!({ "id": "dm-alice", "chatType": "oneOnOne" }));
        });
        server.mock(|when, then| {
            when.method(POST).path("/v1.0/chats/dm-alice/messages");
            then.status(403).json_body(serde_json::json!({
                "error": { "code": "Forbidden", "message": "nope" }
            }));
        });

        let auth = StaticTokenAuth::new("t");
        let config = test_config(server.url("/v1.0"));
        let mut session = GraphSession::connect(&auth, &config).await.expect("session");
        let recipient = Recipient::parse("alice@example.com").expect("recipient");

        let outcome = deliver(&session, &recipient, "Hi").await;
        session.disconnect();

        match outcome {
            DeliveryOutcome::Failed(reason) => assert!(reason.contains("Forbidden")),
            other => panic!("Expected Failed, got {:?}", other),
        }
    }
}
