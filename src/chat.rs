//! One-on-one chat discovery and creation

use tracing::{debug, info};

use crate::error::Result;
use crate::graph::{ChatType, GraphClient};

/// Find an existing one-on-one chat that has `user_id` as a member.
///
/// Scans every chat of the caller and the members of each one-on-one chat;
/// the first match in service order wins.
pub async fn find_one_on_one_chat(client: &GraphClient, user_id: &str) -> Result<Option<String>> {
    let chats = client.list_chats().await?;

    for chat in chats.iter().filter(|c| c.chat_type == ChatType::OneOnOne) {
        let members = client.list_chat_members(&chat.id).await?;
        if members
            .iter()
            .any(|m| m.user_id.as_deref() == Some(user_id))
        {
            debug!(chat_id = %chat.id, %user_id, "Found existing one-on-one chat");
            return Ok(Some(chat.id.clone()));
        }
    }

    Ok(None)
}

/// Resolve the chat to deliver into, creating it when none exists yet.
pub async fn resolve_chat(client: &GraphClient, caller_id: &str, user_id: &str) -> Result<String> {
    if let Some(chat_id) = find_one_on_one_chat(client, user_id).await? {
        return Ok(chat_id);
    }

    let chat = client.create_one_on_one_chat(caller_id, user_id).await?;
    info!(chat_id = %chat.id, %user_id, "Created one-on-one chat");
    Ok(chat.id)
}
