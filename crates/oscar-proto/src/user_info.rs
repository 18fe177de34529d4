//! User-info block assembly.
//!
//! The user-info block is the presence record OSCAR attaches to arrival
//! notifications, buddy updates, chat joins and locate replies: screen
//! name, warning level, and a TLV list describing flags, status, idle time
//! and capabilities.

use bytes::{BufMut, Bytes, BytesMut};

use crate::tlv::TlvBlock;

/// TLV tags that appear inside a user-info block.
pub mod tags {
    /// `u16` user class flags.
    pub const USER_FLAGS: u16 = 0x0001;
    /// `u32` sign-on time, seconds since the epoch.
    pub const SIGNON_TOD: u16 = 0x0003;
    /// `u16` idle time in whole minutes.
    pub const IDLE_TIME: u16 = 0x0004;
    /// `u32` user status bitmask.
    pub const USER_STATUS: u16 = 0x0006;
    /// ICQ direct-connect info; emitted empty by this server.
    pub const ICQ_DC_INFO: u16 = 0x000C;
    /// Concatenated 16-byte capability UUIDs.
    pub const CAPABILITIES: u16 = 0x000D;
    /// `u16` subscription count; always zero here.
    pub const MY_SUBSCRIPTIONS: u16 = 0x0013;
}

/// User class flags (the `u16` in [`tags::USER_FLAGS`]).
pub mod flags {
    pub const UNCONFIRMED: u16 = 0x0001;
    pub const ADMINISTRATOR: u16 = 0x0002;
    pub const AOL_STAFF: u16 = 0x0004;
    pub const COMMERCIAL: u16 = 0x0008;
    pub const FREE: u16 = 0x0010;
    /// Set while an away message is posted.
    pub const UNAVAILABLE: u16 = 0x0020;
    pub const ICQ: u16 = 0x0040;
    pub const WIRELESS: u16 = 0x0080;
    /// Automated clients; exempt from rate limiting.
    pub const BOT: u16 = 0x0400;
}

/// User status bits (the `u32` in [`tags::USER_STATUS`]).
pub mod status {
    pub const AVAILABLE: u32 = 0x0000;
    pub const AWAY: u32 = 0x0001;
    pub const DND: u32 = 0x0002;
    pub const OUT: u32 = 0x0004;
    pub const BUSY: u32 = 0x0010;
    pub const CHATTABLE: u32 = 0x0020;
    pub const INVISIBLE: u32 = 0x0100;
}

/// The assembled user-info block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TlvUserInfo {
    pub screen_name: String,
    pub warning_level: u16,
    pub tlv_block: TlvBlock,
}

impl TlvUserInfo {
    /// Wire encoding: length-prefixed screen name, warning level, TLV
    /// count, then the TLVs.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(
            1 + self.screen_name.len() + 4 + self.tlv_block.encoded_len(),
        );
        buf.put_u8(self.screen_name.len() as u8);
        buf.put_slice(self.screen_name.as_bytes());
        buf.put_u16(self.warning_level);
        buf.put_u16(self.tlv_block.len() as u16);
        self.tlv_block.encode(&mut buf);
        buf.freeze()
    }
}
