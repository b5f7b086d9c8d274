//! Minimal Microsoft Graph client (users, chats, chat members, chat messages).

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::AccessToken;
use crate::{Error, Result};

const MEMBER_ODATA_TYPE: &str = "#microsoft.graph.aadUserConversationMember";
const OWNER_ROLE: &str = "owner";

#[derive(Debug, Clone)]
pub struct GraphClient {
    http: Client,
    base_url: String,
    token: Option<AccessToken>,
}

impl GraphClient {
    /// Create client for the given Graph root (e.g. `https://graph.microsoft.com/v1.0`).
    pub fn new<S: Into<String>>(token: AccessToken, base_url: S) -> Result<Self> {
        let http = Client::builder()
            .user_agent(format!("teams_sender/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::GraphError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: Some(token),
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Drop the bearer token; later calls fail without reaching the network.
    pub fn revoke(&mut self) {
        self.token = None;
    }

    fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.token.as_ref().ok_or_else(|| {
            Error::AuthenticationFailed("Graph session has been disconnected".to_string())
        })?;
        Ok(request.bearer_auth(token.secret()))
    }

    async fn get<D: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<D> {
        let request = self.authorize(self.http.get(url).query(query))?;
        Self::read_json(request).await
    }

    async fn post<B: Serialize, D: DeserializeOwned>(&self, url: &str, body: &B) -> Result<D> {
        let request = self.authorize(self.http.post(url).json(body))?;
        Self::read_json(request).await
    }

    async fn read_json<D: DeserializeOwned>(request: RequestBuilder) -> Result<D> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::GraphError(format!("Request to Graph failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::GraphError(format!("Failed to read Graph response: {}", e)))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<GraphErrorEnvelope>(&text)
                .map(|envelope| format!("{}: {}", envelope.error.code, envelope.error.message))
                .unwrap_or(text);
            return Err(Error::GraphError(format!(
                "HTTP {}: {}",
                status.as_u16(),
                detail
            )));
        }

        serde_json::from_str(&text).map_err(|e| {
            Error::GraphError(format!("Graph returned unexpected body: {} ({})", text, e))
        })
    }

    /// Fetch every page of a collection, following `@odata.nextLink`.
    async fn get_all<T: DeserializeOwned>(&self, url: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page: Collection<T> = self.get(url, &[]).await?;

        loop {
            items.append(&mut page.value);
            match page.next_link.take() {
                Some(next) => {
                    debug!(%next, "Following Graph next link");
                    page = self.get(&next, &[]).await?;
                }
                None => return Ok(items),
            }
        }
    }

    /// Look up a user's object id by exact mail address.
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<String>> {
        let filter = format!("mail eq '{}'", odata_literal(email));
        let page: Collection<User> = self
            .get(
                &format!("{}/users", self.base_url),
                &[("$filter", filter.as_str()), ("$select", "id,mail")],
            )
            .await?;

        Ok(page.value.into_iter().next().map(|user| user.id))
    }

    /// All chats the signed-in user takes part in, in service order.
    pub async fn list_chats(&self) -> Result<Vec<Chat>> {
        self.get_all(&format!("{}/me/chats", self.base_url)).await
    }

    pub async fn list_chat_members(&self, chat_id: &str) -> Result<Vec<ChatMember>> {
        self.get_all(&format!("{}/chats/{}/members", self.base_url, chat_id))
            .await
    }

    /// Create a one-on-one chat where both participants are owners.
    pub async fn create_one_on_one_chat(&self, caller_id: &str, target_id: &str) -> Result<Chat> {
        let payload = CreateChatRequest {
            chat_type: ChatType::OneOnOne,
            members: vec![
                self.owner_binding(caller_id),
                self.owner_binding(target_id),
            ],
        };

        self.post(&format!("{}/chats", self.base_url), &payload)
            .await
    }

    /// Post a plain-text message into a chat.
    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<ChatMessage> {
        let payload = SendMessageRequest {
            body: ItemBody {
                content_type: "text",
                content: text,
            },
        };

        self.post(
            &format!("{}/chats/{}/messages", self.base_url, chat_id),
            &payload,
        )
        .await
    }

    fn owner_binding(&self, user_id: &str) -> MemberBinding {
        MemberBinding {
            odata_type: MEMBER_ODATA_TYPE,
            roles: vec![OWNER_ROLE],
            user_bind: format!("{}/users('{}')", self.base_url, user_id),
        }
    }
}

/// Quote a value for an OData string literal.
fn odata_literal(value: &str) -> String {
    value.replace('\'', "''")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChatType {
    OneOnOne,
    Group,
    Meeting,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    pub chat_type: ChatType,
    #[serde(default)]
    pub topic: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMember {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    pub id: String,
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Collection<T> {
    value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphErrorEnvelope {
    error: GraphErrorBody,
}

#[derive(Debug, Deserialize)]
struct GraphErrorBody {
    code: String,
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateChatRequest {
    chat_type: ChatType,
    members: Vec<MemberBinding>,
}

#[derive(Debug, Serialize)]
struct MemberBinding {
    #[serde(rename = "@odata.type")]
    odata_type: &'static str,
    roles: Vec<&'static str>,
    #[serde(rename = "user@odata.bind")]
    user_bind: String,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    body: ItemBody<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ItemBody<'a> {
    content_type: &'static str,
    content: &'a str,
}
