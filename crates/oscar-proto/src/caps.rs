//! Well-known client capability UUIDs.
//!
//! Capabilities are 16-byte UUIDs a client advertises in its user info to
//! signal feature support. The classic AIM set lives in the
//! `09461341-4C7F-11D1-8222-444553540000` family, with chat as the odd one
//! out.

use uuid::Uuid;

pub const CHAT: Uuid = Uuid::from_u128(0x748F2420_6287_11D1_8222_444553540000);
pub const VOICE_CHAT: Uuid = Uuid::from_u128(0x09461341_4C7F_11D1_8222_444553540000);
pub const FILE_TRANSFER: Uuid = Uuid::from_u128(0x09461343_4C7F_11D1_8222_444553540000);
pub const DIRECT_ICBM: Uuid = Uuid::from_u128(0x09461345_4C7F_11D1_8222_444553540000);
pub const BUDDY_ICON: Uuid = Uuid::from_u128(0x09461346_4C7F_11D1_8222_444553540000);
pub const GAMES: Uuid = Uuid::from_u128(0x09461347_4C7F_11D1_8222_444553540000);
pub const SEND_BUDDY_LIST: Uuid = Uuid::from_u128(0x09461348_4C7F_11D1_8222_444553540000);
pub const ICQ_SERVER_RELAY: Uuid = Uuid::from_u128(0x09461349_4C7F_11D1_8222_444553540000);

/// Concatenate capability UUIDs into the wire blob carried in user info.
pub fn encode(caps: &[Uuid]) -> Vec<u8> {
    let mut out = Vec::with_capacity(caps.len() * 16);
    for cap in caps {
        out.extend_from_slice(cap.as_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_is_sixteen_bytes_per_cap() {
        let blob = encode(&[CHAT, FILE_TRANSFER]);
        assert_eq!(blob.len(), 32);
        assert_eq!(&blob[..16], CHAT.as_bytes());
        assert_eq!(&blob[16..], FILE_TRANSFER.as_bytes());
    }

    #[test]
    fn chat_cap_round_trips_through_text() {
        assert_eq!(
            CHAT.to_string(),
            "748f2420-6287-11d1-8222-444553540000"
        );
    }
}
