//! Authentication against the Microsoft identity platform.
//!
//! An [`AuthProvider`] turns a scope list into a bearer token. Two providers
//! exist: a pre-issued token taken from configuration, and the OAuth 2.0
//! device authorization grant for interactive use from a terminal.

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Error, Result};

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";
const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

/// Bearer token for Graph calls, together with the scopes it was requested for.
#[derive(Clone)]
pub struct AccessToken {
    secret: String,
    pub scopes: Vec<String>,
}

impl AccessToken {
    pub fn new<S: Into<String>>(secret: S, scopes: &[&str]) -> Self {
        Self {
            secret: secret.into(),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("scopes", &self.scopes)
            .finish()
    }
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Obtain a token carrying the requested scopes.
    async fn authenticate(&self, scopes: &[&str]) -> Result<AccessToken>;
}

/// Uses a token issued elsewhere (e.g. `GRAPH_ACCESS_TOKEN`).
#[derive(Clone)]
pub struct StaticTokenAuth {
    token: String,
}

impl StaticTokenAuth {
    pub fn new<S: Into<String>>(token: S) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl AuthProvider for StaticTokenAuth {
    async fn authenticate(&self, scopes: &[&str]) -> Result<AccessToken> {
        let token = self.token.trim();
        if token.is_empty() {
            return Err(Error::AuthenticationFailed(
                "access token is empty".to_string(),
            ));
        }
        debug!(?scopes, "Using pre-issued access token");
        Ok(AccessToken::new(token, scopes))
    }
}

/// OAuth 2.0 device authorization grant (RFC 8628) for a public client.
#[derive(Debug, Clone)]
pub struct DeviceCodeAuth {
    http: Client,
    login_url: String,
    tenant_id: String,
    client_id: String,
}

impl DeviceCodeAuth {
    pub fn new<S1, S2, S3>(login_url: S1, tenant_id: S2, client_id: S3) -> Result<Self>
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        let tenant_id = tenant_id.into();
        let client_id = client_id.into();
        if tenant_id.trim().is_empty() || client_id.trim().is_empty() {
            return Err(Error::AuthenticationFailed(
                "tenant id and client id are required for device code sign-in".to_string(),
            ));
        }

        let http = Client::builder()
            .user_agent(format!("teams_sender/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                Error::AuthenticationFailed(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            login_url: login_url.into().trim_end_matches('/').to_string(),
            tenant_id,
            client_id,
        })
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{}/oauth2/v2.0/{}", self.login_url, self.tenant_id, name)
    }

    async fn request_device_code(&self, scope: &str) -> Result<DeviceCodeResponse> {
        let response = self
            .http
            .post(self.endpoint("devicecode"))
            .form(&[("client_id", self.client_id.as_str()), ("scope", scope)])
            .send()
            .await
            .map_err(|e| {
                Error::AuthenticationFailed(format!("Device code request failed: {}", e))
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            Error::AuthenticationFailed(format!("Failed to read device code response: {}", e))
        })?;

        if !status.is_success() {
            return Err(Error::AuthenticationFailed(describe_token_error(
                status.as_u16(),
                &text,
            )));
        }

        serde_json::from_str(&text).map_err(|e| {
            Error::AuthenticationFailed(format!("Invalid device code response: {}", e))
        })
    }

    async fn poll_token(&self, device_code: &str) -> Result<PollOutcome> {
        let response = self
            .http
            .post(self.endpoint("token"))
            .form(&[
                ("grant_type", DEVICE_CODE_GRANT),
                ("client_id", self.client_id.as_str()),
                ("device_code", device_code),
            ])
            .send()
            .await
            .map_err(|e| Error::AuthenticationFailed(format!("Token request failed: {}", e)))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            Error::AuthenticationFailed(format!("Failed to read token response: {}", e))
        })?;

        if status.is_success() {
            let token: TokenResponse = serde_json::from_str(&text).map_err(|e| {
                Error::AuthenticationFailed(format!("Invalid token response: {}", e))
            })?;
            return Ok(PollOutcome::Issued(token.access_token));
        }

        match serde_json::from_str::<TokenErrorResponse>(&text) {
            Ok(err) if err.error == "authorization_pending" => Ok(PollOutcome::Pending),
            Ok(err) if err.error == "slow_down" => Ok(PollOutcome::SlowDown),
            _ => Err(Error::AuthenticationFailed(describe_token_error(
                status.as_u16(),
                &text,
            ))),
        }
    }
}

#[async_trait]
impl AuthProvider for DeviceCodeAuth {
    async fn authenticate(&self, scopes: &[&str]) -> Result<AccessToken> {
        let scope = scopes.join(" ");
        let device = self.request_device_code(&scope).await?;

        // The operator completes sign-in in a browser.
        match device.message.as_deref() {
            Some(message) => println!("{}", message),
            None => println!(
                "To sign in, open {} and enter the code {}",
                device.verification_uri, device.user_code
            ),
        }

        let deadline = Instant::now()
            .checked_add(Duration::from_secs(device.expires_in))
            .ok_or_else(|| {
                Error::AuthenticationFailed(format!(
                    "device code lifetime out of range: {}s",
                    device.expires_in
                ))
            })?;
        let mut interval = Duration::from_secs(device.interval.unwrap_or(5));

        loop {
            match self.poll_token(&device.device_code).await? {
                PollOutcome::Issued(token) => {
                    info!(tenant = %self.tenant_id, "Signed in with device code");
                    return Ok(AccessToken::new(token, scopes));
                }
                PollOutcome::Pending => {}
                PollOutcome::SlowDown => interval += SLOW_DOWN_STEP,
            }

            if Instant::now() >= deadline {
                return Err(Error::AuthenticationFailed(
                    "device code expired before sign-in completed".to_string(),
                ));
            }
            sleep(interval).await;
        }
    }
}

/// Pick the provider the configuration allows: a pre-issued token wins over
/// interactive sign-in.
pub fn provider_from_config(config: &Config) -> Result<Box<dyn AuthProvider>> {
    if let Some(token) = &config.access_token {
        return Ok(Box::new(StaticTokenAuth::new(token.clone())));
    }

    if !config.tenant_id.trim().is_empty() && !config.client_id.trim().is_empty() {
        return Ok(Box::new(DeviceCodeAuth::new(
            config.login_url.clone(),
            config.tenant_id.clone(),
            config.client_id.clone(),
        )?));
    }

    Err(Error::AuthenticationFailed(
        "no credentials configured: set GRAPH_ACCESS_TOKEN or TEAMS_TENANT_ID and TEAMS_CLIENT_ID"
            .to_string(),
    ))
}

fn describe_token_error(status: u16, body: &str) -> String {
    match serde_json::from_str::<TokenErrorResponse>(body) {
        Ok(err) => match err.error_description {
            Some(description) => format!("{}: {}", err.error, description),
            None => err.error,
        },
        Err(_) => format!("HTTP {}: {}", status, body),
    }
}

enum PollOutcome {
    Issued(String),
    Pending,
    SlowDown,
}

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    user_code: String,
    verification_uri: String,
    expires_in: u64,
    interval: Option<u64>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}
