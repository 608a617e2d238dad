// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chat surfaces, message normalization, and paginated history.
//!
//! The backend's message shapes drift between snake_case and camelCase and
//! between `message`/`text`/`content` for the body. Each external shape has
//! its own deserialization struct and one conversion into the canonical
//! [`ChatMessage`]; neither naming variant leaks past this module.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::{Cache, CacheOptions};
use crate::error::ApiError;
use crate::http::ApiClient;
use crate::storage::epoch_ms;

/// How long a fetched history page stays fresh.
const HISTORY_TTL: Duration = Duration::from_secs(30);

/// A chat surface: one-on-one, city-wide, or a named community room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Surface {
    Direct { peer_id: String },
    City { city: String },
    Community { room_id: String },
}

impl Surface {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Direct { .. } => "dm",
            Self::City { .. } => "city",
            Self::Community { .. } => "room",
        }
    }

    pub fn identifier(&self) -> &str {
        match self {
            Self::Direct { peer_id } => peer_id,
            Self::City { city } => city,
            Self::Community { room_id } => room_id,
        }
    }

    fn history_path(&self) -> String {
        format!("/api/chat/{}/{}", self.kind(), self.identifier())
    }

    fn cache_key(&self, page: u32, limit: u32) -> String {
        format!("chat_history_{}_{}_p{}_l{}", self.kind(), self.identifier(), page, limit)
    }
}

/// Deterministic room id for a one-on-one conversation: both participants
/// derive the same id regardless of who opens the chat.
pub fn dm_room(a: &str, b: &str) -> String {
    if a <= b {
        format!("dm_{a}_{b}")
    } else {
        format!("dm_{b}_{a}")
    }
}

/// Canonical chat message record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub room: String,
    pub sender_id: String,
    pub sender_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<String>,
    pub body: String,
    pub sent_at_ms: u64,
}

/// Inbound socket message shape (camelCase family, body-field drift).
#[derive(Debug, Clone, Deserialize)]
pub struct WireMessage {
    #[serde(default, alias = "_id")]
    id: Option<String>,
    #[serde(default, alias = "roomId")]
    room: Option<String>,
    #[serde(rename = "senderId", alias = "from")]
    sender_id: String,
    #[serde(default, rename = "senderName")]
    sender_name: Option<String>,
    #[serde(default, rename = "recipientId", alias = "to")]
    recipient_id: Option<String>,
    #[serde(rename = "message", alias = "text", alias = "content")]
    body: String,
    #[serde(default, rename = "sentAt", alias = "timestamp", alias = "createdAt")]
    sent_at_ms: Option<u64>,
}

impl WireMessage {
    pub fn into_message(self) -> ChatMessage {
        let sender_name = self.sender_name.unwrap_or_else(|| self.sender_id.clone());
        ChatMessage {
            id: self.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            room: self.room.unwrap_or_default(),
            sender_id: self.sender_id,
            sender_name,
            recipient_id: self.recipient_id,
            body: self.body,
            sent_at_ms: self.sent_at_ms.unwrap_or_else(epoch_ms),
        }
    }
}

/// Historical message shape from the REST history endpoints (snake_case
/// family, with camelCase stragglers).
#[derive(Debug, Deserialize)]
struct HistoryRecord {
    #[serde(alias = "_id")]
    id: String,
    #[serde(default, alias = "roomId")]
    room: Option<String>,
    #[serde(rename = "sender_id", alias = "senderId")]
    sender_id: String,
    #[serde(default, rename = "sender_name", alias = "senderName")]
    sender_name: Option<String>,
    #[serde(default, rename = "recipient_id", alias = "recipientId")]
    recipient_id: Option<String>,
    #[serde(alias = "message", alias = "text")]
    body: String,
    #[serde(rename = "sent_at", alias = "sentAt", alias = "created_at", alias = "createdAt")]
    sent_at_ms: u64,
}

impl HistoryRecord {
    fn into_message(self) -> ChatMessage {
        let sender_name = self.sender_name.unwrap_or_else(|| self.sender_id.clone());
        ChatMessage {
            id: self.id,
            room: self.room.unwrap_or_default(),
            sender_id: self.sender_id,
            sender_name,
            recipient_id: self.recipient_id,
            body: self.body,
            sent_at_ms: self.sent_at_ms,
        }
    }
}

/// History endpoint payload.
#[derive(Debug, Deserialize)]
struct HistoryData {
    #[serde(alias = "items")]
    messages: Vec<HistoryRecord>,
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    limit: Option<u32>,
    #[serde(alias = "totalCount", alias = "count")]
    total: u64,
}

/// One page of conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPage {
    pub messages: Vec<ChatMessage>,
    pub page: u32,
    pub limit: u32,
    /// Full message count for the surface as of the query; may be stale if
    /// new messages arrive between pages.
    pub total: u64,
}

impl HistoryPage {
    pub fn has_more(&self) -> bool {
        u64::from(self.page) * u64::from(self.limit) < self.total
    }
}

/// Paginated history loader with short-TTL page caching.
pub struct ChatHistory {
    api: Arc<ApiClient>,
    cache: Arc<Cache>,
}

impl ChatHistory {
    pub fn new(api: Arc<ApiClient>, cache: Arc<Cache>) -> Self {
        Self { api, cache }
    }

    /// Fetch one page of history for `surface`. `page` is 1-indexed. No
    /// automatic retry; a backend-reported failure rejects with its message.
    pub async fn history(
        &self,
        surface: &Surface,
        page: u32,
        limit: u32,
    ) -> Result<HistoryPage, ApiError> {
        if page == 0 || limit == 0 {
            return Err(ApiError::Rejected {
                status: 400,
                message: "page and limit must be positive".to_owned(),
            });
        }
        let key = surface.cache_key(page, limit);
        self.cache
            .get_or_fetch(&key, CacheOptions::session_ttl(HISTORY_TTL), || async move {
                let data: HistoryData = self
                    .api
                    .get_with_query(
                        &surface.history_path(),
                        &[("page", page.to_string()), ("limit", limit.to_string())],
                    )
                    .await?;
                Ok(HistoryPage {
                    messages: data.messages.into_iter().map(HistoryRecord::into_message).collect(),
                    page: data.page.unwrap_or(page),
                    limit: data.limit.unwrap_or(limit),
                    total: data.total,
                })
            })
            .await
    }

    /// Drop every cached page for `surface`, e.g. after sending a message.
    pub fn invalidate(&self, surface: &Surface) {
        self.cache.invalidate_prefix(&format!("chat_history_{}_{}_", surface.kind(), surface.identifier()));
    }
}

#[cfg(test)]
#[path = "chat_tests.rs"]
mod tests;
