//! Screen-name-keyed session pool.
//!
//! The SessionManager guarantees at most one active session per normalized
//! screen name. A second login does not evict the first by force: it asks
//! the incumbent to close, waits for its front-end to finish tearing down,
//! and only then takes the slot.
//!
//! # Thread Safety
//!
//! The pool is a DashMap; shard locks are held only for map reads and
//! writes, never across an await. Per-session locks live inside each
//! [`Session`].

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use oscar_proto::{DisplayScreenName, IdentScreenName, SnacMessage};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::LimitsConfig;
use crate::error::SessionError;
use crate::metrics;
use crate::state::Session;
use crate::state::managers::deliver;

/// One pool slot: the live session plus a single-shot signal fired when
/// the slot is vacated, used to wake logins waiting to replace it.
struct PoolEntry {
    session: Arc<Session>,
    removed: CancellationToken,
}

/// In-memory pool of signed-on sessions, keyed by normalized screen name.
pub struct SessionManager {
    store: DashMap<IdentScreenName, PoolEntry>,
    mailbox_capacity: usize,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::with_limits(&LimitsConfig::default())
    }

    pub fn with_limits(limits: &LimitsConfig) -> Self {
        Self {
            store: DashMap::new(),
            mailbox_capacity: limits.mailbox_capacity,
        }
    }

    /// Sign a session on, replacing any incumbent with the same identity.
    ///
    /// If the screen name is free the new session is installed
    /// immediately. Otherwise the incumbent is closed and this call waits
    /// for its front-end to acknowledge with [`SessionManager::remove_session`];
    /// no map lock is held during the wait, so the teardown can proceed.
    /// `stop` aborts the wait (`SessionError::Cancelled`). If a third
    /// login for the same name wins the slot while this one waits, the
    /// loser gets `SessionError::Conflict` rather than evicting the
    /// winner.
    pub async fn add_session(
        &self,
        stop: &CancellationToken,
        screen_name: DisplayScreenName,
    ) -> Result<Arc<Session>, SessionError> {
        let ident = screen_name.ident();

        let (incumbent, removed) = match self.try_add_session(screen_name.clone()) {
            Ok(session) => return Ok(session),
            Err(pending) => pending,
        };

        debug!(screen_name = %ident, "screen name in use, closing previous session");
        incumbent.close();

        tokio::select! {
            _ = removed.cancelled() => {}
            _ = stop.cancelled() => {
                return Err(SessionError::Cancelled(ident));
            }
        }

        match self.try_add_session(screen_name) {
            Ok(session) => Ok(session),
            // Another login for this name raced in while we waited; the
            // winner keeps the slot.
            Err(_) => Err(SessionError::Conflict(ident)),
        }
    }

    /// Synchronous install attempt. On a free slot the new session goes
    /// in immediately; on an occupied slot the incumbent and its removed
    /// signal come back so the caller can close, wait and retry.
    pub(crate) fn try_add_session(
        &self,
        screen_name: DisplayScreenName,
    ) -> Result<Arc<Session>, (Arc<Session>, CancellationToken)> {
        match self.store.entry(screen_name.ident()) {
            Entry::Vacant(slot) => {
                let session =
                    Arc::new(Session::with_capacity(screen_name, self.mailbox_capacity));
                slot.insert(PoolEntry {
                    session: session.clone(),
                    removed: CancellationToken::new(),
                });
                metrics::ACTIVE_SESSIONS.inc();
                Ok(session)
            }
            Entry::Occupied(slot) => {
                let entry = slot.get();
                Err((entry.session.clone(), entry.removed.clone()))
            }
        }
    }

    /// Take a session out of the pool and wake any login waiting on its
    /// slot.
    ///
    /// Only removes the entry if it still holds exactly this session, so
    /// a double remove or a remove racing a replacement cannot evict a
    /// successor.
    pub fn remove_session(&self, session: &Arc<Session>) {
        let removed = self
            .store
            .remove_if(session.ident_screen_name(), |_, entry| {
                Arc::ptr_eq(&entry.session, session)
            });
        if let Some((ident, entry)) = removed {
            debug!(screen_name = %ident, "session removed");
            entry.removed.cancel();
            metrics::ACTIVE_SESSIONS.dec();
        }
    }

    /// The active session for a screen name, if any.
    pub fn retrieve_session(&self, ident: &IdentScreenName) -> Option<Arc<Session>> {
        self.store.get(ident).map(|entry| entry.session.clone())
    }

    /// Snapshot of every active session.
    pub fn all_sessions(&self) -> Vec<Arc<Session>> {
        self.store
            .iter()
            .map(|entry| entry.session.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Relay to one recipient; a recipient with no active session is a
    /// warn-and-drop, never an error back to the sender.
    pub fn relay_to_screen_name(&self, recipient: &IdentScreenName, msg: SnacMessage) {
        match self.retrieve_session(recipient) {
            Some(session) => deliver(&session, msg),
            None => {
                warn!(screen_name = %recipient, "recipient has no active session");
            }
        }
    }

    /// Relay one message to several recipients.
    pub fn relay_to_screen_names(&self, recipients: &[IdentScreenName], msg: SnacMessage) {
        for recipient in recipients {
            self.relay_to_screen_name(recipient, msg.clone());
        }
    }

    /// Relay to every active session.
    pub fn relay_to_all(&self, msg: SnacMessage) {
        for entry in self.store.iter() {
            deliver(&entry.session, msg.clone());
        }
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("sessions", &self.store.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oscar_proto::snac::{SnacFrame, foodgroup};

    fn msg() -> SnacMessage {
        SnacMessage::new(SnacFrame::new(foodgroup::ICBM, 0x0007), vec![1, 2, 3])
    }

    #[tokio::test]
    async fn add_and_retrieve() {
        let manager = SessionManager::new();
        let stop = CancellationToken::new();

        let sess = manager
            .add_session(&stop, DisplayScreenName::new("Chatting Chuck"))
            .await
            .unwrap();

        let ident = IdentScreenName::new("chattingchuck");
        let found = manager.retrieve_session(&ident).unwrap();
        assert!(Arc::ptr_eq(&sess, &found));
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test]
    async fn retrieve_unknown_is_none() {
        let manager = SessionManager::new();
        assert!(
            manager
                .retrieve_session(&IdentScreenName::new("nobody"))
                .is_none()
        );
    }

    #[tokio::test]
    async fn second_login_replaces_first() {
        let manager = Arc::new(SessionManager::new());
        let stop = CancellationToken::new();

        let first = manager
            .add_session(&stop, DisplayScreenName::new("alice"))
            .await
            .unwrap();

        // Stand in for the first front-end: tear down once asked to close.
        let teardown = {
            let manager = manager.clone();
            let first = first.clone();
            tokio::spawn(async move {
                first.closed().await;
                manager.remove_session(&first);
            })
        };

        let second = manager
            .add_session(&stop, DisplayScreenName::new("alice"))
            .await
            .unwrap();
        teardown.await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert!(first.is_closed());
        let all = manager.all_sessions();
        assert_eq!(all.len(), 1);
        assert!(Arc::ptr_eq(&all[0], &second));
    }

    #[tokio::test]
    async fn replacement_wait_honors_cancellation() {
        let manager = SessionManager::new();
        let stop = CancellationToken::new();

        let first = manager
            .add_session(&stop, DisplayScreenName::new("alice"))
            .await
            .unwrap();

        // Nobody ever calls remove_session; cancel instead.
        let login = CancellationToken::new();
        let canceller = {
            let login = login.clone();
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                login.cancel();
            })
        };

        let err = manager
            .add_session(&login, DisplayScreenName::new("alice"))
            .await
            .unwrap_err();
        canceller.await.unwrap();

        assert!(matches!(err, SessionError::Cancelled(_)));
        // The incumbent keeps the slot even though it was asked to close.
        let kept = manager
            .retrieve_session(&IdentScreenName::new("alice"))
            .unwrap();
        assert!(Arc::ptr_eq(&kept, &first));
    }

    #[tokio::test]
    async fn login_losing_the_slot_race_gets_a_conflict() {
        // Single-threaded runtime: tasks only run at await points, which
        // pins down the interleaving below.
        let manager = Arc::new(SessionManager::new());
        let stop = CancellationToken::new();

        let first = manager
            .add_session(&stop, DisplayScreenName::new("alice"))
            .await
            .unwrap();

        // Waiter parks on the incumbent's removed signal.
        let waiter = {
            let manager = manager.clone();
            let stop = stop.clone();
            tokio::spawn(
                async move { manager.add_session(&stop, DisplayScreenName::new("alice")).await },
            )
        };
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
        assert!(first.is_closed(), "waiter should have closed the incumbent");

        // Vacate the slot, then install a third login before the waiter
        // gets to run its re-check.
        manager.remove_session(&first);
        let third = manager
            .add_session(&stop, DisplayScreenName::new("alice"))
            .await
            .unwrap();

        let err = waiter.await.unwrap().unwrap_err();
        assert!(matches!(err, SessionError::Conflict(_)));

        // The winner keeps the slot.
        let all = manager.all_sessions();
        assert_eq!(all.len(), 1);
        assert!(Arc::ptr_eq(&all[0], &third));
        assert!(!third.is_closed());
    }

    #[tokio::test]
    async fn remove_only_fires_for_the_stored_session() {
        let manager = SessionManager::new();
        let stop = CancellationToken::new();

        let sess = manager
            .add_session(&stop, DisplayScreenName::new("alice"))
            .await
            .unwrap();

        // A stale handle from a previous life must not evict the current
        // occupant.
        let stale = Arc::new(Session::new(DisplayScreenName::new("alice")));
        manager.remove_session(&stale);
        assert_eq!(manager.len(), 1);

        manager.remove_session(&sess);
        assert!(manager.is_empty());
        // Double remove is harmless.
        manager.remove_session(&sess);
    }

    #[tokio::test]
    async fn broadcast_skips_closed_sessions() {
        let manager = SessionManager::new();
        let stop = CancellationToken::new();

        let alice = manager
            .add_session(&stop, DisplayScreenName::new("alice"))
            .await
            .unwrap();
        let bob = manager
            .add_session(&stop, DisplayScreenName::new("bob"))
            .await
            .unwrap();

        bob.close();
        manager.relay_to_all(msg());

        assert!(alice.recv_message().await.is_some());
        assert!(bob.try_recv_message().is_none());
    }

    #[tokio::test]
    async fn relay_to_screen_names_hits_each_recipient() {
        let manager = SessionManager::new();
        let stop = CancellationToken::new();

        let alice = manager
            .add_session(&stop, DisplayScreenName::new("alice"))
            .await
            .unwrap();
        let bob = manager
            .add_session(&stop, DisplayScreenName::new("bob"))
            .await
            .unwrap();

        manager.relay_to_screen_names(
            &[
                IdentScreenName::new("alice"),
                IdentScreenName::new("bob"),
                IdentScreenName::new("nobody"), // logged, not fatal
            ],
            msg(),
        );

        assert!(alice.recv_message().await.is_some());
        assert!(bob.recv_message().await.is_some());
    }

    #[tokio::test]
    async fn overflowing_recipient_is_closed() {
        let manager = SessionManager::with_limits(&LimitsConfig {
            mailbox_capacity: 1,
            ..Default::default()
        });
        let stop = CancellationToken::new();

        let slow = manager
            .add_session(&stop, DisplayScreenName::new("slowpoke"))
            .await
            .unwrap();

        manager.relay_to_screen_name(&IdentScreenName::new("slowpoke"), msg());
        assert!(!slow.is_closed());
        manager.relay_to_screen_name(&IdentScreenName::new("slowpoke"), msg());
        assert!(slow.is_closed(), "overflow presumes a dead client");
    }
}
