use std::io;

use bytes::Buf;

use crate::errors::Result;
use crate::packet::{PacketHeader, PacketTrait};
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::Tag;

const PGP: [u8; 3] = [0x50, 0x47, 0x50];

/// PGP as UTF-8 octets.
///
/// Marker Packet
/// <https://tools.ietf.org/html/rfc4880.html#section-5.8>
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Marker {
    packet_header: PacketHeader,
}

impl Marker {
    /// Parses a `Marker` packet from the given buffer.
    pub fn from_buf<B: Buf>(packet_header: PacketHeader, mut input: B) -> Result<Self> {
        input.read_tag(&PGP, "marker")?;
        Ok(Marker { packet_header })
    }

    pub fn new() -> Result<Self> {
        Ok(Marker {
            packet_header: PacketHeader::for_new_packet(Tag::Marker, PGP.len())?,
        })
    }
}

impl Serialize for Marker {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&PGP)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        PGP.len()
    }
}

impl PacketTrait for Marker {
    fn packet_header(&self) -> &PacketHeader {
        &self.packet_header
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker() {
        let marker = Marker::new().unwrap();
        let mut out = Vec::new();
        marker.to_writer_with_header(&mut out).unwrap();
        assert_eq!(out, b"\xA8\x03PGP");

        let header = PacketHeader::new_fixed(Tag::Marker, 3);
        assert!(Marker::from_buf(header, &b"PGX"[..]).is_err());
    }
}
