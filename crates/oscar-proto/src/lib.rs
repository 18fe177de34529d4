//! OSCAR protocol value types.
//!
//! This crate holds the wire-adjacent building blocks shared by the server
//! core and its protocol front-ends: screen-name identity and validation,
//! SNAC frames and food-group identifiers, TLV encoding, capability UUIDs,
//! and user-info block assembly.
//!
//! Framing and the full codec live with the front-ends; nothing here
//! performs I/O.

pub mod caps;
pub mod screen_name;
pub mod snac;
pub mod tlv;
pub mod user_info;

pub use screen_name::{DisplayScreenName, IdentScreenName, ScreenNameError};
pub use snac::{SnacFrame, SnacMessage};
pub use tlv::{Tlv, TlvBlock};
pub use user_info::TlvUserInfo;
