use std::io;

use bytes::Bytes;
use log::debug;

use crate::errors::{bail, Error, Result};
use crate::packet::{
    CompressedData, LiteralData, Marker, ModDetectionCode, OnePassSignature, PacketHeader,
    PublicKey, PublicKeyEncryptedSessionKey, PublicSubkey, SecretKey, SecretSubkey, Signature,
    SymEncryptedData, SymEncryptedProtectedData, SymKeyEncryptedSessionKey, Trust,
    UserAttribute, UserId,
};
use crate::ser::Serialize;
use crate::types::{PacketHeaderVersion, Tag};

/// Represents a Packet. A packet is the record structure used to encode a chunk of data in OpenPGP.
/// Ref: <https://tools.ietf.org/html/rfc4880.html#section-4>
#[derive(Debug, PartialEq, Eq, Clone)]
#[allow(clippy::large_enum_variant)]
pub enum Packet {
    CompressedData(CompressedData),
    PublicKey(PublicKey),
    PublicSubkey(PublicSubkey),
    SecretKey(SecretKey),
    SecretSubkey(SecretSubkey),
    LiteralData(LiteralData),
    Marker(Marker),
    ModDetectionCode(ModDetectionCode),
    OnePassSignature(OnePassSignature),
    PublicKeyEncryptedSessionKey(PublicKeyEncryptedSessionKey),
    Signature(Signature),
    SymEncryptedData(SymEncryptedData),
    SymEncryptedProtectedData(SymEncryptedProtectedData),
    SymKeyEncryptedSessionKey(SymKeyEncryptedSessionKey),
    Trust(Trust),
    UserAttribute(UserAttribute),
    UserId(UserId),
}

macro_rules! impl_try_from_into {
    ($($name:ident),+ $(,)?) => {
        $(
            impl From<$name> for Packet {
                fn from(other: $name) -> Packet {
                    Packet::$name(other)
                }
            }

            impl TryFrom<Packet> for $name {
                type Error = Error;

                fn try_from(other: Packet) -> Result<$name> {
                    match other {
                        Packet::$name(value) => Ok(value),
                        other => Err(Error::KeyringStructure {
                            expected: stringify!($name),
                            found: Some(other.tag()),
                        }),
                    }
                }
            }
        )+
    };
}

impl_try_from_into!(
    CompressedData,
    PublicKey,
    PublicSubkey,
    SecretKey,
    SecretSubkey,
    LiteralData,
    Marker,
    ModDetectionCode,
    OnePassSignature,
    PublicKeyEncryptedSessionKey,
    Signature,
    SymEncryptedData,
    SymEncryptedProtectedData,
    SymKeyEncryptedSessionKey,
    Trust,
    UserAttribute,
    UserId,
);

/// Runs `$body` with `$p` bound to the packet inside any variant.
macro_rules! with_packet {
    ($self:expr, $p:ident => $body:expr) => {
        match $self {
            Packet::CompressedData($p) => $body,
            Packet::PublicKey($p) => $body,
            Packet::PublicSubkey($p) => $body,
            Packet::SecretKey($p) => $body,
            Packet::SecretSubkey($p) => $body,
            Packet::LiteralData($p) => $body,
            Packet::Marker($p) => $body,
            Packet::ModDetectionCode($p) => $body,
            Packet::OnePassSignature($p) => $body,
            Packet::PublicKeyEncryptedSessionKey($p) => $body,
            Packet::Signature($p) => $body,
            Packet::SymEncryptedData($p) => $body,
            Packet::SymEncryptedProtectedData($p) => $body,
            Packet::SymKeyEncryptedSessionKey($p) => $body,
            Packet::Trust($p) => $body,
            Packet::UserAttribute($p) => $body,
            Packet::UserId($p) => $body,
        }
    };
}

impl Packet {
    /// Decodes a packet body, dispatching on the header's tag.
    ///
    /// Errors are wrapped in [`Error::InvalidPacketContent`] naming the tag.
    pub fn from_bytes(packet_header: PacketHeader, body: Bytes) -> Result<Self> {
        let tag = packet_header.tag();
        debug!("decoding {:?} packet of {} bytes", tag, body.len());

        let res: Result<Self> = match tag {
            Tag::PublicKeyEncryptedSessionKey => {
                PublicKeyEncryptedSessionKey::from_buf(packet_header, body).map(Into::into)
            }
            Tag::Signature => Signature::from_buf(packet_header, body).map(Into::into),
            Tag::SymKeyEncryptedSessionKey => {
                SymKeyEncryptedSessionKey::from_buf(packet_header, body).map(Into::into)
            }
            Tag::OnePassSignature => {
                OnePassSignature::from_buf(packet_header, body).map(Into::into)
            }
            Tag::SecretKey => SecretKey::from_buf(packet_header, body).map(Into::into),
            Tag::PublicKey => PublicKey::from_buf(packet_header, body).map(Into::into),
            Tag::SecretSubkey => SecretSubkey::from_buf(packet_header, body).map(Into::into),
            Tag::CompressedData => CompressedData::from_buf(packet_header, body).map(Into::into),
            Tag::SymEncryptedData => {
                SymEncryptedData::from_buf(packet_header, body).map(Into::into)
            }
            Tag::Marker => Marker::from_buf(packet_header, body).map(Into::into),
            Tag::LiteralData => LiteralData::from_buf(packet_header, body).map(Into::into),
            Tag::Trust => Trust::from_buf(packet_header, body).map(Into::into),
            Tag::UserId => UserId::from_buf(packet_header, body).map(Into::into),
            Tag::PublicSubkey => PublicSubkey::from_buf(packet_header, body).map(Into::into),
            Tag::UserAttribute => UserAttribute::from_buf(packet_header, body).map(Into::into),
            Tag::SymEncryptedProtectedData => {
                SymEncryptedProtectedData::from_buf(packet_header, body).map(Into::into)
            }
            Tag::ModDetectionCode => {
                ModDetectionCode::from_buf(packet_header, body).map(Into::into)
            }
            Tag::Other(n) => bail!("unknown packet tag {}", n),
        };

        res.map_err(|source| Error::InvalidPacketContent {
            tag,
            source: Box::new(source),
        })
    }
}

impl Serialize for Packet {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        with_packet!(self, p => p.to_writer_with_header(writer))
    }

    fn write_len(&self) -> usize {
        with_packet!(self, p => p.write_len_with_header())
    }
}

/// A packet with a header. `Serialize` covers the body only.
pub trait PacketTrait: Serialize {
    fn packet_header(&self) -> &PacketHeader;

    fn packet_header_version(&self) -> PacketHeaderVersion {
        self.packet_header().version()
    }

    fn tag(&self) -> Tag {
        self.packet_header().tag()
    }

    /// The header as it is written: the stored one, with the length of the current body.
    fn write_header(&self) -> Result<PacketHeader> {
        let len = self.write_len().try_into()?;
        Ok(self.packet_header().with_body_len(len))
    }

    /// Write this packet including the packet header.
    fn to_writer_with_header<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        self.write_header()?.to_writer(writer)?;
        self.to_writer(writer)
    }

    /// Length in bytes used when calling `to_writer_with_header`.
    fn write_len_with_header(&self) -> usize {
        let header_len = self
            .write_header()
            .map(|h| h.write_len())
            .unwrap_or_else(|_| self.packet_header().write_len());
        header_len + self.write_len()
    }
}

impl PacketTrait for Packet {
    fn packet_header(&self) -> &PacketHeader {
        with_packet!(self, p => p.packet_header())
    }
}

impl<T: PacketTrait> PacketTrait for &T {
    fn packet_header(&self) -> &PacketHeader {
        (*self).packet_header()
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_unknown_tag() {
        let header = PacketHeader::new_fixed(Tag::Other(42), 1);
        let err = Packet::from_bytes(header, Bytes::from_static(&[0])).unwrap_err();
        assert!(err.is_codec());
        assert!(err.to_string().contains("42"), "{}", err);
    }

    #[test]
    fn test_invalid_content() {
        let header = PacketHeader::new_fixed(Tag::ModDetectionCode, 3);
        let err = Packet::from_bytes(header, Bytes::from_static(&[1, 2, 3])).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidPacketContent {
                tag: Tag::ModDetectionCode,
                ..
            }
        ));
    }

    #[test]
    fn test_old_length_type_kept() {
        // old format user id with a two octet length
        let raw = hex!("b5 0003 414243");
        let mut buf = Bytes::copy_from_slice(&raw);
        let header = PacketHeader::from_buf(&mut buf).unwrap();
        let packet = Packet::from_bytes(header, buf).unwrap();
        assert_eq!(packet.to_bytes().unwrap(), raw.to_vec());
    }

    #[test]
    fn test_try_from_packet() {
        let id = UserId::from_str("bob").unwrap();
        let packet = Packet::from(id.clone());
        assert_eq!(UserId::try_from(packet.clone()).unwrap(), id);
        assert!(Signature::try_from(packet).is_err());
    }
}
