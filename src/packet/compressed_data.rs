use std::io;

use byteorder::WriteBytesExt;
use bytes::{Buf, Bytes};

use crate::errors::Result;
use crate::packet::{PacketHeader, PacketTrait};
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::CompressionAlgorithm;

/// Compressed Data Packet
/// <https://tools.ietf.org/html/rfc4880.html#section-5.6>
///
/// The compressed stream is kept as is, it is not inflated here.
#[derive(derive_more::Debug, Clone, PartialEq, Eq)]
pub struct CompressedData {
    packet_header: PacketHeader,
    compression_algorithm: CompressionAlgorithm,
    #[debug("{}", hex::encode(compressed_data))]
    compressed_data: Bytes,
}

impl CompressedData {
    /// Parses a `CompressedData` packet from the given buffer.
    pub fn from_buf<B: Buf>(packet_header: PacketHeader, mut input: B) -> Result<Self> {
        let alg = CompressionAlgorithm::from(input.read_u8()?);
        Ok(CompressedData {
            packet_header,
            compression_algorithm: alg,
            compressed_data: input.rest(),
        })
    }

    pub fn compression_algorithm(&self) -> CompressionAlgorithm {
        self.compression_algorithm
    }

    pub fn compressed_data(&self) -> &[u8] {
        &self.compressed_data
    }
}

impl Serialize for CompressedData {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.compression_algorithm.into())?;
        writer.write_all(&self.compressed_data)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        1 + self.compressed_data.len()
    }
}

impl PacketTrait for CompressedData {
    fn packet_header(&self) -> &PacketHeader {
        &self.packet_header
    }
}
