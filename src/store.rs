//! Chat-room storage interface.
//!
//! Room records are owned by an external store; the core only looks rooms
//! up and mints new ones through this trait. Implementations decide how
//! rooms persist (SQL, memory, anything) — the sentinels below are the
//! contract they surface through.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use oscar_proto::IdentScreenName;
use thiserror::Error;

/// Exchange for user-created (private) rooms.
pub const EXCHANGE_PRIVATE: u16 = 4;
/// Exchange for operator-created (public) rooms.
pub const EXCHANGE_PUBLIC: u16 = 5;

/// Chat-room store errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("chat room not found")]
    ChatRoomNotFound,

    #[error("chat room already exists")]
    DuplicateChatRoom,
}

impl StoreError {
    /// Static error code for metrics and log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ChatRoomNotFound => "chat_room_not_found",
            Self::DuplicateChatRoom => "duplicate_chat_room",
        }
    }
}

/// A chat room as recorded by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRoom {
    pub name: String,
    pub creator: IdentScreenName,
    pub exchange: u16,
    pub instance_number: u16,
    pub create_time: DateTime<Utc>,
}

impl ChatRoom {
    pub fn new(name: impl Into<String>, creator: IdentScreenName, exchange: u16) -> Self {
        Self {
            name: name.into(),
            creator,
            exchange,
            instance_number: 0,
            create_time: Utc::now(),
        }
    }

    /// The room identifier clients carry around.
    ///
    /// The format is stable and observable on the wire; only `name` is
    /// semantically meaningful to clients.
    pub fn cookie(&self) -> String {
        format!("{}-{}-{}", self.exchange, self.instance_number, self.name)
    }
}

/// Read-only room lookups plus room creation, implemented by the
/// persistence layer and injected into the chat service front-ends.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn chat_room_by_cookie(&self, cookie: &str) -> Result<ChatRoom, StoreError>;

    async fn chat_room_by_name(&self, exchange: u16, name: &str) -> Result<ChatRoom, StoreError>;

    async fn create_chat_room(&self, room: &ChatRoom) -> Result<(), StoreError>;
}
