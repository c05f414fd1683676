use std::io;

use bytes::{Buf, Bytes};

use crate::errors::Result;
use crate::packet::{PacketHeader, PacketTrait};
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{Tag, TrustByte};

/// Trust Packet
/// <https://tools.ietf.org/html/rfc4880.html#section-5.10>
///
/// Only meaningful in local keyring files. The first octet is the trust byte
/// of the preceding key, user id or signature, trailing octets are kept as read.
#[derive(derive_more::Debug, PartialEq, Eq, Clone)]
pub struct Trust {
    packet_header: PacketHeader,
    #[debug("{}", hex::encode(data))]
    data: Bytes,
}

impl Trust {
    pub fn from_buf<B: Buf>(packet_header: PacketHeader, mut input: B) -> Result<Self> {
        Ok(Trust {
            packet_header,
            data: input.rest(),
        })
    }

    /// A two octet trust packet, as PGP 2.6 writes them.
    pub fn new(trust: TrustByte) -> Result<Self> {
        let packet_header = PacketHeader::for_new_packet(Tag::Trust, 2)?;
        Ok(Trust {
            packet_header,
            data: Bytes::copy_from_slice(&[trust.bits(), 0]),
        })
    }

    /// Zero when the packet is empty.
    pub fn trust_byte(&self) -> TrustByte {
        TrustByte::new(self.data.first().copied().unwrap_or_default())
    }
}

impl Serialize for Trust {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.data)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.data.len()
    }
}

impl PacketTrait for Trust {
    fn packet_header(&self) -> &PacketHeader {
        &self.packet_header
    }
}
