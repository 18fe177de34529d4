//! Room-keyed collection of session pools.
//!
//! Each occupied chat room owns an inner [`SessionManager`]; the room is
//! created on first join and garbage-collected on last leave. The
//! create-if-absent and delete-if-empty checks both run under the outer
//! write lock, so a join for a cookie always observes either the old
//! non-empty pool or a freshly created empty one, never a dangling
//! reference.

use std::collections::HashMap;
use std::sync::Arc;

use oscar_proto::{DisplayScreenName, IdentScreenName, SnacMessage};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::LimitsConfig;
use crate::error::SessionError;
use crate::metrics;
use crate::state::Session;
use crate::state::managers::{SessionManager, deliver};

/// Session pools for every occupied chat room, keyed by room cookie.
pub struct ChatSessionManager {
    store: RwLock<HashMap<String, Arc<SessionManager>>>,
    limits: LimitsConfig,
}

impl ChatSessionManager {
    pub fn new() -> Self {
        Self::with_limits(LimitsConfig::default())
    }

    pub fn with_limits(limits: LimitsConfig) -> Self {
        Self {
            store: RwLock::new(HashMap::new()),
            limits,
        }
    }

    /// Join a room, creating it on first join.
    ///
    /// The room lookup and the install both happen under the outer write
    /// lock, so a join can never land in a pool that a concurrent last
    /// leave is collecting. Replacement semantics for a screen name
    /// already in the room match the main pool's: close the incumbent,
    /// wait for its removal with no lock held, try once more. On success
    /// the session carries the room cookie.
    pub async fn add_session(
        &self,
        stop: &CancellationToken,
        chat_cookie: &str,
        screen_name: DisplayScreenName,
    ) -> Result<Arc<Session>, SessionError> {
        let mut waited = false;
        loop {
            let attempt = {
                let mut store = self.store.write();
                store
                    .entry(chat_cookie.to_string())
                    .or_insert_with(|| {
                        debug!(cookie = %chat_cookie, "creating chat room pool");
                        metrics::ACTIVE_CHAT_ROOMS.inc();
                        Arc::new(SessionManager::with_limits(&self.limits))
                    })
                    .try_add_session(screen_name.clone())
            };

            match attempt {
                Ok(session) => {
                    session.set_chat_room_cookie(chat_cookie);
                    return Ok(session);
                }
                Err(_) if waited => {
                    return Err(SessionError::Conflict(screen_name.ident()));
                }
                Err((incumbent, removed)) => {
                    debug!(
                        cookie = %chat_cookie,
                        screen_name = %incumbent.ident_screen_name(),
                        "screen name already in room, closing previous session"
                    );
                    incumbent.close();
                    tokio::select! {
                        _ = removed.cancelled() => {}
                        _ = stop.cancelled() => {
                            return Err(SessionError::Cancelled(screen_name.ident()));
                        }
                    }
                    waited = true;
                }
            }
        }
    }

    /// Leave a room, deleting the room once it is empty.
    ///
    /// # Panics
    ///
    /// Panics if the session's room is no longer in the map: rooms are
    /// only deleted when their last occupant leaves, so a missing room
    /// here means a caller removed a session it never added.
    pub fn remove_session(&self, session: &Arc<Session>) {
        let cookie = session.chat_room_cookie();
        let mut store = self.store.write();
        let Some(room) = store.get(&cookie) else {
            panic!("chat room {cookie} already deleted");
        };
        room.remove_session(session);
        if room.is_empty() {
            store.remove(&cookie);
            metrics::ACTIVE_CHAT_ROOMS.dec();
            debug!(cookie = %cookie, "chat room empty, deleting");
        }
    }

    /// Snapshot of a room's occupants; empty for an unknown cookie.
    pub fn all_sessions(&self, chat_cookie: &str) -> Vec<Arc<Session>> {
        match self.store.read().get(chat_cookie) {
            Some(room) => room.all_sessions(),
            None => Vec::new(),
        }
    }

    /// Relay to every occupant of a room except `except`, typically the
    /// sender.
    pub fn relay_to_all_except(
        &self,
        chat_cookie: &str,
        except: &IdentScreenName,
        msg: SnacMessage,
    ) {
        let store = self.store.read();
        let Some(room) = store.get(chat_cookie) else {
            warn!(cookie = %chat_cookie, "relay to unknown chat room");
            return;
        };
        for session in room.all_sessions() {
            if session.ident_screen_name() == except {
                continue;
            }
            deliver(&session, msg.clone());
        }
    }

    /// Relay to one occupant of a room.
    pub fn relay_to_screen_name(
        &self,
        chat_cookie: &str,
        recipient: &IdentScreenName,
        msg: SnacMessage,
    ) {
        let store = self.store.read();
        let Some(room) = store.get(chat_cookie) else {
            warn!(cookie = %chat_cookie, "relay to unknown chat room");
            return;
        };
        room.relay_to_screen_name(recipient, msg);
    }

    /// Kick a user out of every room they occupy, e.g. when their main
    /// session signs off. Emptied rooms are deleted.
    pub fn remove_user_from_all_chats(&self, ident: &IdentScreenName) {
        let mut store = self.store.write();
        store.retain(|cookie, room| {
            if let Some(session) = room.retrieve_session(ident) {
                session.close();
                room.remove_session(&session);
            }
            if room.is_empty() {
                metrics::ACTIVE_CHAT_ROOMS.dec();
                debug!(cookie = %cookie, "chat room empty, deleting");
                false
            } else {
                true
            }
        });
    }
}

impl Default for ChatSessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ChatSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSessionManager")
            .field("rooms", &self.store.read().len())
            .finish()
    }
}
