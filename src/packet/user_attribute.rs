use std::io;

use bytes::{Buf, Bytes};

use crate::errors::Result;
use crate::packet::{PacketHeader, PacketTrait};
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::Tag;

/// Subpacket type of an embedded image.
const IMAGE_SUBPACKET: u8 = 1;

/// User Attribute Packet
/// <https://tools.ietf.org/html/rfc4880.html#section-5.12>
///
/// Kept as an opaque blob; certifications over it hash the whole body.
#[derive(derive_more::Debug, PartialEq, Eq, Clone)]
pub struct UserAttribute {
    packet_header: PacketHeader,
    #[debug("{}", hex::encode(data))]
    data: Bytes,
}

impl UserAttribute {
    pub fn from_buf<B: Buf>(packet_header: PacketHeader, mut input: B) -> Result<Self> {
        Ok(UserAttribute {
            packet_header,
            data: input.rest(),
        })
    }

    pub fn new(data: Bytes) -> Result<Self> {
        let packet_header = PacketHeader::for_new_packet(Tag::UserAttribute, data.len())?;
        Ok(UserAttribute {
            packet_header,
            data,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Does the first subpacket hold an image (a photo id)?
    pub fn is_image(&self) -> bool {
        let mut i = self.data.clone();
        let Ok(len) = crate::packet::SubpacketLength::from_buf(&mut i) else {
            return false;
        };
        len.len() > 0 && i.first() == Some(&IMAGE_SUBPACKET)
    }
}

impl Serialize for UserAttribute {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.data)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.data.len()
    }
}

impl PacketTrait for UserAttribute {
    fn packet_header(&self) -> &PacketHeader {
        &self.packet_header
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_attribute_image() {
        let attr = UserAttribute::new(Bytes::from_static(&[0x05, 0x01, 0x10, 0x00, 0x01, 0x01]))
            .unwrap();
        assert!(attr.is_image());
        assert_eq!(attr.packet_header().tag(), Tag::UserAttribute);

        let mut out = Vec::new();
        attr.to_writer_with_header(&mut out).unwrap();
        // tag 17 needs a new format header
        assert_eq!(&out[..2], &[0xD1, 0x06]);

        let other = UserAttribute::new(Bytes::from_static(&[0x02, 0x64, 0x00])).unwrap();
        assert!(!other.is_image());
    }
}
