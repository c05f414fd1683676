use std::io;

use byteorder::WriteBytesExt;
use bytes::Buf;

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::{unsupported_err, Result};
use crate::packet::{PacketHeader, PacketTrait, SignatureType};
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{KeyId, Tag};

/// One-Pass Signature Packet
/// <https://tools.ietf.org/html/rfc4880.html#section-5.4>
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct OnePassSignature {
    packet_header: PacketHeader,
    pub typ: SignatureType,
    pub hash_algorithm: HashAlgorithm,
    pub pub_algorithm: PublicKeyAlgorithm,
    pub key_id: KeyId,
    /// Zero means another one-pass signature follows.
    pub last: u8,
}

impl OnePassSignature {
    /// Parses a `OnePassSignature` packet from the given buffer.
    pub fn from_buf<B: Buf>(packet_header: PacketHeader, mut i: B) -> Result<Self> {
        let version = i.read_u8()?;
        if version != 3 {
            unsupported_err!("one pass signature version {}", version);
        }
        let typ = SignatureType::from(i.read_u8()?);
        let hash_algorithm = HashAlgorithm::from(i.read_u8()?);
        let pub_algorithm = PublicKeyAlgorithm::from(i.read_u8()?);
        let key_id = KeyId::from(i.read_array::<8>()?);
        let last = i.read_u8()?;

        Ok(OnePassSignature {
            packet_header,
            typ,
            hash_algorithm,
            pub_algorithm,
            key_id,
            last,
        })
    }

    pub fn new(
        typ: SignatureType,
        hash_algorithm: HashAlgorithm,
        pub_algorithm: PublicKeyAlgorithm,
        key_id: KeyId,
    ) -> Result<Self> {
        Ok(OnePassSignature {
            packet_header: PacketHeader::for_new_packet(Tag::OnePassSignature, 13)?,
            typ,
            hash_algorithm,
            pub_algorithm,
            key_id,
            last: 1,
        })
    }
}

impl Serialize for OnePassSignature {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(3)?;
        writer.write_u8(self.typ.into())?;
        writer.write_u8(self.hash_algorithm.into())?;
        writer.write_u8(self.pub_algorithm.into())?;
        writer.write_all(self.key_id.as_ref())?;
        writer.write_u8(self.last)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        13
    }
}

impl PacketTrait for OnePassSignature {
    fn packet_header(&self) -> &PacketHeader {
        &self.packet_header
    }
}
