//! Tests for the send command

use std::io::Write;

use httpmock::prelude::*;
use tempfile::NamedTempFile;

use teams_sender::commands::send::{run, run_with_config, SendArgs};
use teams_sender::{Config, Error};

fn config_for(server: &MockServer, token: Option<&str>) -> Config {
    Config {
        tenant_id: String::new(),
        client_id: String::new(),
        access_token: token.map(str::to_string),
        sender_id: "me".to_string(),
        graph_url: server.url("/v1.0"),
        login_url: server.url(""),
        default_message: "Hello from config".to_string(),
    }
}

fn users_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(content.as_bytes()).expect("write");
    file
}

#[tokio::test]
async fn test_send_rejects_missing_users_file() {
    let result = run(SendArgs {
        users_file: "/nonexistent/users.txt".into(),
        message: None,
    })
    .await;

    assert!(matches!(result, Err(Error::FileNotFound(_))));
}

#[tokio::test]
async fn test_send_uses_configured_default_message() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET).path("/v1.0/users");
        then.status(200)
            .json_body(serde_json::json!({ "value": [ { "id": "user-alice" } ] }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/v1.0/me/chats");
        then.status(200).json_body(serde_json::json!({
            "value": [ { "id": "dm-alice", "chatType": "oneOnOne" } ]
        }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/v1.0/chats/dm-alice/members");
        then.status(200).json_body(serde_json::json!({
            "value": [ { "id": "m-1", "userId": "user-alice" } ]
        }));
    });
    let post_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1.0/chats/dm-alice/messages")
            .json_body(serde_json::json!({
                "body": { "contentType": "text", "content": "Hello from config" }
            }));
        then.status(201).json_body(serde_json::json!({ "id": "msg-1" }));
    });

    let config = config_for(&server, Some("token"));
    let file = users_file("alice@example.com\n");

    let summary = run_with_config(
        SendArgs {
            users_file: file.path().to_path_buf(),
            message: None,
        },
        &config,
    )
    .await
    .expect("summary");

    assert_eq!(summary.success_count, 1);
    post_mock.assert_calls(1);
}

#[tokio::test]
async fn test_send_without_credentials_fails_authentication() {
    let server = MockServer::start_async().await;
    let any_call = server.mock(|when, then| {
        when.is_true(|_| true);
        then.status(200);
    });

    let config = config_for(&server, None);
    let file = users_file("alice@example.com\n");

    let result = run_with_config(
        SendArgs {
            users_file: file.path().to_path_buf(),
            message: Some("Hi".into()),
        },
        &config,
    )
    .await;

    assert!(matches!(result, Err(Error::AuthenticationFailed(_))));
    any_call.assert_calls(0);
}
