//! Session pools.
//!
//! [`SessionManager`] enforces one active session per screen name;
//! [`ChatSessionManager`] layers a room-keyed collection of pools on top of
//! it. Both share one delivery policy: enqueue never blocks, a closed
//! recipient is logged and skipped, and a full mailbox closes its session.

mod chat;
mod session;

pub use chat::ChatSessionManager;
pub use session::SessionManager;

use std::sync::Arc;

use oscar_proto::SnacMessage;
use tracing::warn;

use crate::metrics;
use crate::state::{RelayStatus, Session};

/// Enqueue `msg` to one recipient, applying the shared failure policy.
fn deliver(session: &Arc<Session>, msg: SnacMessage) {
    match session.relay_message(msg) {
        RelayStatus::Sent => {
            metrics::MESSAGES_RELAYED.inc();
        }
        RelayStatus::Closed => {
            warn!(
                screen_name = %session.ident_screen_name(),
                "dropping message for closed session"
            );
        }
        RelayStatus::QueueFull => {
            // A client this far behind is not coming back.
            warn!(
                screen_name = %session.ident_screen_name(),
                "mailbox full, closing session"
            );
            metrics::RELAY_QUEUE_FULL_CLOSES.inc();
            session.close();
        }
    }
}
