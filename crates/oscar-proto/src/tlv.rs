//! Tag-length-value encoding.
//!
//! TLVs are the universal container of OSCAR payloads: a big-endian `u16`
//! tag, a `u16` length, and the value bytes. Integers are always encoded
//! big-endian.

use bytes::{BufMut, Bytes, BytesMut};

/// A single tag-length-value element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tlv {
    pub tag: u16,
    pub value: Bytes,
}

impl Tlv {
    pub fn new(tag: u16, value: impl Into<Bytes>) -> Self {
        Self {
            tag,
            value: value.into(),
        }
    }

    /// A zero-length TLV; presence of the tag is the payload.
    pub fn empty(tag: u16) -> Self {
        Self {
            tag,
            value: Bytes::new(),
        }
    }

    pub fn u8(tag: u16, value: u8) -> Self {
        Self::new(tag, vec![value])
    }

    pub fn u16(tag: u16, value: u16) -> Self {
        Self::new(tag, value.to_be_bytes().to_vec())
    }

    pub fn u32(tag: u16, value: u32) -> Self {
        Self::new(tag, value.to_be_bytes().to_vec())
    }

    /// Encoded size: 4-byte header plus the value.
    pub fn encoded_len(&self) -> usize {
        4 + self.value.len()
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16(self.tag);
        buf.put_u16(self.value.len() as u16);
        buf.put_slice(&self.value);
    }
}

/// An ordered collection of TLVs.
///
/// Order is preserved: several OSCAR payloads are sensitive to TLV order
/// even though the format does not require it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TlvBlock {
    tlvs: Vec<Tlv>,
}

impl TlvBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tlv: Tlv) {
        self.tlvs.push(tlv);
    }

    pub fn len(&self) -> usize {
        self.tlvs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tlvs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tlv> {
        self.tlvs.iter()
    }

    /// First TLV carrying `tag`, if any.
    pub fn get(&self, tag: u16) -> Option<&Tlv> {
        self.tlvs.iter().find(|t| t.tag == tag)
    }

    pub fn encoded_len(&self) -> usize {
        self.tlvs.iter().map(Tlv::encoded_len).sum()
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        for tlv in &self.tlvs {
            tlv.encode(buf);
        }
    }
}

impl FromIterator<Tlv> for TlvBlock {
    fn from_iter<I: IntoIterator<Item = Tlv>>(iter: I) -> Self {
        Self {
            tlvs: iter.into_iter().collect(),
        }
    }
}
