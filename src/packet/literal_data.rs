use std::io;

use byteorder::{BigEndian, WriteBytesExt};
use bytes::{Buf, Bytes};
use chrono::{DateTime, Utc};
use num_enum::{FromPrimitive, IntoPrimitive};

use crate::errors::Result;
use crate::packet::{PacketHeader, PacketTrait};
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::Tag;
use crate::util::{dt_from_timestamp, dt_to_timestamp};

/// Literal Data Packet
/// <https://tools.ietf.org/html/rfc4880.html#section-5.9>
#[derive(derive_more::Debug, Clone, PartialEq, Eq)]
pub struct LiteralData {
    packet_header: PacketHeader,
    mode: DataMode,
    #[debug("{}", hex::encode(file_name))]
    file_name: Bytes,
    created: DateTime<Utc>,
    #[debug("{}", hex::encode(data))]
    data: Bytes,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum DataMode {
    Binary = b'b',
    Text = b't',
    Utf8 = b'u',

    #[num_enum(catch_all)]
    Other(u8),
}

impl LiteralData {
    /// Parses a `LiteralData` packet from the given buffer.
    pub fn from_buf<B: Buf>(packet_header: PacketHeader, mut i: B) -> Result<Self> {
        let mode = DataMode::from(i.read_u8()?);
        let name_len = i.read_u8()?;
        let file_name = i.read_take(name_len.into())?;
        let created = dt_from_timestamp(i.read_be_u32()?)?;
        let data = i.rest();

        Ok(LiteralData {
            packet_header,
            mode,
            file_name,
            created,
            data,
        })
    }

    /// Creates a binary literal data packet.
    pub fn from_bytes(file_name: &[u8], created: DateTime<Utc>, data: Bytes) -> Result<Self> {
        let file_name = Bytes::copy_from_slice(&file_name[..file_name.len().min(255)]);
        let len = 6 + file_name.len() + data.len();
        Ok(LiteralData {
            packet_header: PacketHeader::for_new_packet(Tag::LiteralData, len)?,
            mode: DataMode::Binary,
            file_name,
            created,
            data,
        })
    }

    pub fn mode(&self) -> DataMode {
        self.mode
    }

    pub fn file_name(&self) -> &[u8] {
        &self.file_name
    }

    pub fn created(&self) -> &DateTime<Utc> {
        &self.created
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl Serialize for LiteralData {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.mode.into())?;
        writer.write_u8(self.file_name.len().try_into()?)?;
        writer.write_all(&self.file_name)?;
        writer.write_u32::<BigEndian>(dt_to_timestamp(&self.created))?;
        writer.write_all(&self.data)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        1 + 1 + self.file_name.len() + 4 + self.data.len()
    }
}

impl PacketTrait for LiteralData {
    fn packet_header(&self) -> &PacketHeader {
        &self.packet_header
    }
}
