//! Unified error handling for oscard.
//!
//! Recoverable errors flow back to the front-end as typed errors;
//! asynchronous relay failures are logged and never raised to the sender —
//! an IM server must not fail a sender because a recipient's mailbox is
//! full.

use oscar_proto::IdentScreenName;
use thiserror::Error;

/// Errors surfaced by the session pools.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Two logins for the same screen name raced; the loser gets this and
    /// may retry.
    #[error("session conflict: concurrent login for {0}")]
    Conflict(IdentScreenName),

    /// The wait for the previous session to vacate its slot was cancelled.
    #[error("login cancelled while waiting for {0} to sign off")]
    Cancelled(IdentScreenName),
}

impl SessionError {
    /// Static error code for metrics and log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Conflict(_) => "session_conflict",
            Self::Cancelled(_) => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes() {
        let ident = IdentScreenName::new("chuck");
        assert_eq!(
            SessionError::Conflict(ident.clone()).error_code(),
            "session_conflict"
        );
        assert_eq!(SessionError::Cancelled(ident).error_code(), "cancelled");
    }

    #[test]
    fn messages_name_the_screen_name() {
        let err = SessionError::Conflict(IdentScreenName::new("Chatting Chuck"));
        assert!(err.to_string().contains("chattingchuck"));
    }
}
