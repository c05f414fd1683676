use std::io;

use bytes::{Buf, Bytes};

use crate::errors::Result;
use crate::packet::{PacketHeader, PacketTrait};
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::Tag;
use crate::util::read_string;

/// User ID Packet
/// <https://tools.ietf.org/html/rfc4880.html#section-5.11>
///
/// The raw bytes are kept, they are what certifications are computed over.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct UserId {
    packet_header: PacketHeader,
    id: Bytes,
}

impl UserId {
    /// Parses a `UserId` packet from the given buffer.
    pub fn from_buf<B: Buf>(packet_header: PacketHeader, mut input: B) -> Result<Self> {
        let id = input.rest();
        Ok(UserId { packet_header, id })
    }

    /// Create a new user id packet from a string.
    pub fn from_str(input: &str) -> Result<Self> {
        let id = Bytes::copy_from_slice(input.as_bytes());
        let packet_header = PacketHeader::for_new_packet(Tag::UserId, id.len())?;
        Ok(UserId { packet_header, id })
    }

    pub fn id(&self) -> &[u8] {
        &self.id
    }

    /// The id as text, invalid UTF-8 replaced.
    pub fn as_str(&self) -> String {
        read_string(&self.id)
    }
}

impl Serialize for UserId {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.id)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.id.len()
    }
}

impl PacketTrait for UserId {
    fn packet_header(&self) -> &PacketHeader {
        &self.packet_header
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_user_id_latin1() {
        let header = PacketHeader::new_fixed(Tag::UserId, 5);
        let id = UserId::from_buf(header, &b"J\xf6rg"[..]).unwrap();
        assert_eq!(id.id(), b"J\xf6rg");
        assert_eq!(id.as_str(), "J\u{FFFD}rg");
        assert_eq!(id.to_bytes().unwrap(), b"J\xf6rg");
    }

    #[test]
    fn test_user_id_header() {
        let id = UserId::from_str("Alice <alice@example.org>").unwrap();
        let mut out = Vec::new();
        id.to_writer_with_header(&mut out).unwrap();
        // old format, tag 13, one octet length
        assert_eq!(&out[..2], &[0xB4, 25]);
        assert_eq!(out.len(), 27);
    }
}
