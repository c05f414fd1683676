use byteorder::{BigEndian, WriteBytesExt};
use bytes::Buf;
use log::{debug, warn};

use crate::errors::{bail, ensure, Result};
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{OldLengthType, PacketHeaderVersion, PacketLength, Tag};

/// Represents a packet header.
///
/// Ref: <https://tools.ietf.org/html/rfc4880.html#section-4.2>
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PacketHeader {
    Old {
        tag: Tag,
        length_type: OldLengthType,
        length: PacketLength,
    },
    New {
        tag: Tag,
        length: PacketLength,
    },
}

/// Maximum size of partial packet length.
const MAX_PARTIAL_LEN: u32 = 2u32.pow(30);

/// Reads a new format length: one, two or five octets, or a partial body length.
pub(crate) fn read_new_length<B: Buf>(mut i: B) -> Result<PacketLength> {
    let olen = i.read_u8()?;
    let length = match olen {
        // One-Octet Lengths
        0..=191 => PacketLength::Fixed(olen.into()),
        // Two-Octet Lengths
        192..=223 => {
            let a = i.read_u8()?;
            let l = ((u32::from(olen) - 192) << 8) + 192 + u32::from(a);
            PacketLength::Fixed(l)
        }
        // Partial Body Lengths
        224..=254 => PacketLength::Partial(1 << (olen & 0x1F)),
        // Five-Octet Lengths
        255 => PacketLength::Fixed(i.read_be_u32()?),
    };
    Ok(length)
}

fn write_new_length<W: std::io::Write>(writer: &mut W, length: &PacketLength) -> Result<()> {
    match length {
        PacketLength::Fixed(len) => {
            let len = *len;
            if len < 192 {
                writer.write_u8(len as u8)?;
            } else if len < 8384 {
                writer.write_u8((((len - 192) >> 8) + 192) as u8)?;
                writer.write_u8(((len - 192) & 0xFF) as u8)?;
            } else {
                writer.write_u8(255)?;
                writer.write_u32::<BigEndian>(len)?;
            }
        }
        PacketLength::Partial(len) => {
            ensure!(len.count_ones() == 1, "partial length must be a power of two");
            let n = len.trailing_zeros();
            writer.write_u8((224 + n) as u8)?;
        }
        PacketLength::Indeterminate => {
            bail!("indeterminate lengths are only supported in old style headers");
        }
    }
    Ok(())
}

fn new_length_len(length: &PacketLength) -> usize {
    match length {
        PacketLength::Fixed(len) if *len < 192 => 1,
        PacketLength::Fixed(len) if *len < 8384 => 2,
        PacketLength::Fixed(_) => 5,
        PacketLength::Partial(_) => 1,
        PacketLength::Indeterminate => 0,
    }
}

impl PacketHeader {
    /// Reads a header in either format.
    pub fn from_buf<B: Buf>(mut i: B) -> Result<Self> {
        let header = i.read_u8()?;

        match header & 0b1100_0000 {
            0b1100_0000 => {
                let tag = Tag::from(header & 0b0011_1111);
                let length = read_new_length(&mut i)?;
                Ok(PacketHeader::New { tag, length })
            }
            0b1000_0000 => {
                let tag = Tag::from((header >> 2) & 0b0000_1111);
                let length_type = OldLengthType::try_from(header & 0b0000_0011)
                    .map_err(|_| crate::errors::Error::InvalidInput)?;
                let length = match length_type {
                    OldLengthType::OneOctet => PacketLength::Fixed(i.read_u8()?.into()),
                    OldLengthType::TwoOctet => PacketLength::Fixed(i.read_be_u16()?.into()),
                    OldLengthType::FourOctet => PacketLength::Fixed(i.read_be_u32()?),
                    OldLengthType::Indeterminate => PacketLength::Indeterminate,
                };
                Ok(PacketHeader::Old {
                    tag,
                    length_type,
                    length,
                })
            }
            _ => {
                bail!("unknown packet header version {:08b}", header);
            }
        }
    }

    /// Builds a header, picking the shortest length encoding for the given version.
    pub fn from_parts(version: PacketHeaderVersion, tag: Tag, length: PacketLength) -> Result<Self> {
        match version {
            PacketHeaderVersion::Old => {
                let length_type = match length {
                    PacketLength::Fixed(len) => OldLengthType::for_len(len),
                    PacketLength::Indeterminate => OldLengthType::Indeterminate,
                    PacketLength::Partial(_) => {
                        bail!("partial lengths are only supported in new style headers");
                    }
                };
                Self::new_old(tag, length_type, length)
            }
            PacketHeaderVersion::New => {
                ensure!(
                    !matches!(length, PacketLength::Indeterminate),
                    "indeterminate packet length is only supported in old style headers"
                );
                if let PacketLength::Partial(l) = length {
                    ensure!(l.count_ones() == 1, "partial length must be a power of two");
                    ensure!(
                        l <= MAX_PARTIAL_LEN,
                        "partial length must be less or equal than {}",
                        MAX_PARTIAL_LEN
                    );
                }

                Ok(Self::New { tag, length })
            }
        }
    }

    /// Builds an old format header with an explicit length type.
    pub fn new_old(tag: Tag, length_type: OldLengthType, length: PacketLength) -> Result<Self> {
        ensure!(
            u8::from(tag) < 16,
            "tag is not compatible with old packet headers: {:?}",
            tag
        );
        match (length_type, length) {
            (OldLengthType::Indeterminate, PacketLength::Indeterminate) => {}
            (OldLengthType::Indeterminate, _) | (_, PacketLength::Indeterminate) => {
                bail!("length type {:?} does not match {:?}", length_type, length);
            }
            (_, PacketLength::Partial(_)) => {
                bail!("partial lengths are only supported in new style headers");
            }
            (lt, PacketLength::Fixed(len)) => {
                ensure!(lt.fits(len), "length {} does not fit into {:?}", len, lt);
            }
        }

        Ok(Self::Old {
            tag,
            length_type,
            length,
        })
    }

    /// Header for a packet built by this crate. Tags that fit are written in the
    /// old format, which every PGP 2.6 era reader understands.
    pub(crate) fn for_new_packet(tag: Tag, len: usize) -> Result<Self> {
        let len = PacketLength::Fixed(len.try_into()?);
        if u8::from(tag) < 16 {
            Self::from_parts(PacketHeaderVersion::Old, tag, len)
        } else {
            Self::from_parts(PacketHeaderVersion::New, tag, len)
        }
    }

    /// Creates a `New` style packet header.
    pub fn new_fixed(tag: Tag, length: u32) -> Self {
        PacketHeader::New {
            tag,
            length: PacketLength::Fixed(length),
        }
    }

    pub const fn version(&self) -> PacketHeaderVersion {
        match self {
            Self::Old { .. } => PacketHeaderVersion::Old,
            Self::New { .. } => PacketHeaderVersion::New,
        }
    }

    /// Returns the packet length.
    pub fn packet_length(&self) -> PacketLength {
        match self {
            Self::Old { length, .. } => *length,
            Self::New { length, .. } => *length,
        }
    }

    /// Returns the packet tag.
    pub fn tag(&self) -> Tag {
        match self {
            Self::Old { tag, .. } => *tag,
            Self::New { tag, .. } => *tag,
        }
    }

    /// The same header, describing a body of `len` bytes.
    ///
    /// Old format headers keep their length type while the length still fits,
    /// indeterminate ones stay indeterminate. Partial bodies are written as one
    /// fixed length body.
    pub fn with_body_len(&self, len: u32) -> Self {
        match *self {
            Self::New { tag, .. } => Self::New {
                tag,
                length: PacketLength::Fixed(len),
            },
            Self::Old {
                tag,
                length_type: OldLengthType::Indeterminate,
                ..
            } => Self::Old {
                tag,
                length_type: OldLengthType::Indeterminate,
                length: PacketLength::Indeterminate,
            },
            Self::Old {
                tag, length_type, ..
            } => {
                let length_type = if length_type.fits(len) {
                    length_type
                } else {
                    let upgraded = OldLengthType::for_len(len);
                    warn!(
                        "{:?} packet of {} bytes does not fit {:?}, using {:?}",
                        tag, len, length_type, upgraded
                    );
                    upgraded
                };
                Self::Old {
                    tag,
                    length_type,
                    length: PacketLength::Fixed(len),
                }
            }
        }
    }
}

impl Serialize for PacketHeader {
    fn to_writer<W: std::io::Write>(&self, writer: &mut W) -> Result<()> {
        debug!("writing packet header {:?}", self);

        match self {
            Self::New { tag, length } => {
                writer.write_u8(0b1100_0000 | u8::from(*tag))?;
                write_new_length(writer, length)?;
            }
            Self::Old {
                tag,
                length_type,
                length,
            } => {
                writer.write_u8(0b1000_0000 | (u8::from(*tag) << 2) | u8::from(*length_type))?;
                match (length_type, length) {
                    (OldLengthType::OneOctet, PacketLength::Fixed(len)) => {
                        writer.write_u8((*len).try_into()?)?;
                    }
                    (OldLengthType::TwoOctet, PacketLength::Fixed(len)) => {
                        writer.write_u16::<BigEndian>((*len).try_into()?)?;
                    }
                    (OldLengthType::FourOctet, PacketLength::Fixed(len)) => {
                        writer.write_u32::<BigEndian>(*len)?;
                    }
                    (OldLengthType::Indeterminate, PacketLength::Indeterminate) => {}
                    _ => {
                        bail!("invalid old packet header {:?} {:?}", length_type, length);
                    }
                }
            }
        }

        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            Self::New { length, .. } => 1 + new_length_len(length),
            Self::Old { length_type, .. } => 1 + length_type.octets(),
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_new_format_lengths() {
        // user id, five octet length
        let header = PacketHeader::from_buf(&mut &hex::decode("cdff00010000").unwrap()[..]).unwrap();
        assert_eq!(header.version(), PacketHeaderVersion::New);
        assert_eq!(header.tag(), Tag::UserId);
        assert_eq!(header.packet_length(), PacketLength::Fixed(65536));

        // trust packet, one octet length
        let header = PacketHeader::from_buf(&mut &[0xCC, 0x02][..]).unwrap();
        assert_eq!(header.tag(), Tag::Trust);
        assert_eq!(header.packet_length(), PacketLength::Fixed(2));
    }

    #[test]
    fn test_write_header() {
        let header = PacketHeader::new_fixed(Tag::UserAttribute, 12875);
        assert_eq!(hex::encode(header.to_bytes().unwrap()), "d1ff0000324b");

        let header = PacketHeader::new_fixed(Tag::Signature, 302);
        assert_eq!(hex::encode(header.to_bytes().unwrap()), "c2c06e");

        let header = PacketHeader::new_fixed(Tag::Signature, 303);
        assert_eq!(hex::encode(header.to_bytes().unwrap()), "c2c06f");
    }

    #[test]
    fn test_old_header_keeps_length_type() {
        // public key packet, two octet length type carrying a length that fits into one
        let raw = [0x99, 0x00, 0x8d];
        let header = PacketHeader::from_buf(&mut &raw[..]).unwrap();
        assert_eq!(
            header,
            PacketHeader::Old {
                tag: Tag::PublicKey,
                length_type: OldLengthType::TwoOctet,
                length: PacketLength::Fixed(141),
            }
        );
        assert_eq!(header.to_bytes().unwrap(), raw.to_vec());

        let grown = header.with_body_len(300);
        assert_eq!(grown.to_bytes().unwrap(), vec![0x99, 0x01, 0x2c]);

        let too_big = header.with_body_len(70_000);
        assert_eq!(too_big.write_len(), 5);
        assert_eq!(too_big.to_bytes().unwrap()[0], 0x9a);
    }

    #[test]
    fn test_invalid_headers() {
        // first bit not set
        assert!(PacketHeader::from_buf(&mut &[0x40, 0x00][..]).is_err());
        // tag 17 in an old header
        assert!(PacketHeader::from_parts(
            PacketHeaderVersion::Old,
            Tag::UserAttribute,
            PacketLength::Fixed(1)
        )
        .is_err());
        assert!(PacketHeader::from_parts(
            PacketHeaderVersion::New,
            Tag::UserId,
            PacketLength::Indeterminate
        )
        .is_err());
        assert!(
            PacketHeader::new_old(Tag::UserId, OldLengthType::OneOctet, PacketLength::Fixed(256))
                .is_err()
        );
    }

    #[test]
    fn test_partial_length() {
        let header = PacketHeader::from_buf(&mut &[0xCB, 0xE9][..]).unwrap();
        assert_eq!(header.packet_length(), PacketLength::Partial(512));
        assert_eq!(header.to_bytes().unwrap(), vec![0xCB, 0xE9]);
    }

    fn arb_header() -> impl Strategy<Value = PacketHeader> {
        prop_oneof![
            (1u8..=63, any::<u32>()).prop_map(|(tag, len)| PacketHeader::New {
                tag: Tag::from(tag),
                length: PacketLength::Fixed(len),
            }),
            (1u8..=63, 0u32..=30).prop_map(|(tag, exp)| PacketHeader::New {
                tag: Tag::from(tag),
                length: PacketLength::Partial(1 << exp),
            }),
            (1u8..16, any::<u32>(), 0u8..3).prop_map(|(tag, len, min_type)| {
                let needed = u8::from(OldLengthType::for_len(len));
                let length_type = OldLengthType::try_from(needed.max(min_type)).unwrap();
                PacketHeader::Old {
                    tag: Tag::from(tag),
                    length_type,
                    length: PacketLength::Fixed(len),
                }
            }),
            (1u8..16).prop_map(|tag| PacketHeader::Old {
                tag: Tag::from(tag),
                length_type: OldLengthType::Indeterminate,
                length: PacketLength::Indeterminate,
            }),
        ]
    }

    proptest! {
        #[test]
        fn write_len(header in arb_header()) {
            let buf = header.to_bytes()?;
            prop_assert_eq!(buf.len(), header.write_len());
        }

        #[test]
        fn header_roundtrip(header in arb_header()) {
            let buf = header.to_bytes()?;
            let back = PacketHeader::from_buf(&mut &buf[..])?;
            prop_assert_eq!(header, back);
        }

        #[test]
        fn new_headers_use_shortest_encoding(len: u32) {
            let header = PacketHeader::from_parts(
                PacketHeaderVersion::New,
                Tag::Signature,
                PacketLength::Fixed(len),
            )?;
            let expected = if len < 192 { 2 } else if len < 8384 { 3 } else { 6 };
            prop_assert_eq!(header.write_len(), expected);
        }
    }
}
