//! SNAC frames, the unit of OSCAR traffic.
//!
//! Every event that reaches a client is a SNAC: a fixed ten-byte frame
//! naming the food group and subgroup, followed by an opaque body. The
//! server core relays these values without interpreting the body.

use bytes::Bytes;

/// Food-group identifiers, the OSCAR service families.
pub mod foodgroup {
    pub const OSERVICE: u16 = 0x0001;
    pub const LOCATE: u16 = 0x0002;
    pub const BUDDY: u16 = 0x0003;
    pub const ICBM: u16 = 0x0004;
    pub const ADVERT: u16 = 0x0005;
    pub const INVITE: u16 = 0x0006;
    pub const ADMIN: u16 = 0x0007;
    pub const POPUP: u16 = 0x0008;
    pub const PERMIT_DENY: u16 = 0x0009;
    pub const USER_LOOKUP: u16 = 0x000A;
    pub const STATS: u16 = 0x000B;
    pub const TRANSLATE: u16 = 0x000C;
    pub const CHAT_NAV: u16 = 0x000D;
    pub const CHAT: u16 = 0x000E;
    pub const ODIR: u16 = 0x000F;
    pub const BART: u16 = 0x0010;
    pub const FEEDBAG: u16 = 0x0013;
    pub const ICQ: u16 = 0x0015;
    pub const BUCP: u16 = 0x0017;
    pub const ALERT: u16 = 0x0018;
}

/// Size of the per-session food-group version table. Food groups are
/// identified by small integers; one slot per identifier up to the highest
/// known group.
pub const FOOD_GROUP_MAX: usize = foodgroup::ALERT as usize + 1;

/// The ten-byte SNAC header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SnacFrame {
    pub food_group: u16,
    pub sub_group: u16,
    pub flags: u16,
    pub request_id: u32,
}

impl SnacFrame {
    pub fn new(food_group: u16, sub_group: u16) -> Self {
        Self {
            food_group,
            sub_group,
            flags: 0,
            request_id: 0,
        }
    }
}

/// A complete SNAC: frame plus opaque body.
///
/// The body is reference-counted (`Bytes`), so cloning for fan-out to many
/// recipients copies a pointer, not the payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SnacMessage {
    pub frame: SnacFrame,
    pub body: Bytes,
}

impl SnacMessage {
    pub fn new(frame: SnacFrame, body: impl Into<Bytes>) -> Self {
        Self {
            frame,
            body: body.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_defaults_are_zero() {
        let frame = SnacFrame::new(foodgroup::ICBM, 0x0007);
        assert_eq!(frame.flags, 0);
        assert_eq!(frame.request_id, 0);
    }

    #[test]
    fn message_body_clone_is_shallow() {
        let msg = SnacMessage::new(SnacFrame::new(foodgroup::CHAT, 0x0006), vec![0u8; 1024]);
        let copy = msg.clone();
        // Bytes clones share the backing allocation.
        assert_eq!(msg.body.as_ptr(), copy.body.as_ptr());
    }

    #[test]
    fn version_table_covers_all_known_groups() {
        assert!(FOOD_GROUP_MAX > foodgroup::ALERT as usize);
        assert!(FOOD_GROUP_MAX > foodgroup::FEEDBAG as usize);
    }
}
