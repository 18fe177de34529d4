//! Runtime state: sessions and the pools that own them.

pub mod managers;
mod session;

pub use session::{DEFAULT_MAILBOX_CAPACITY, MAX_WARNING_LEVEL, RelayStatus, Session};
