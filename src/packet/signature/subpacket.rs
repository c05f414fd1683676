use std::io;

use byteorder::{BigEndian, WriteBytesExt};
use bytes::{Buf, Bytes};
use chrono::{DateTime, Duration, Utc};
use log::debug;
use num_enum::{FromPrimitive, IntoPrimitive};
use smallvec::SmallVec;

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{ensure, ensure_eq, Result};
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{CompressionAlgorithm, KeyId, RevocationKey};
use crate::util::{dt_from_timestamp, dt_to_timestamp};

/// High bit of the type octet: a reader that does not understand the
/// subpacket must treat the signature as invalid.
const CRITICAL_BIT: u8 = 0x80;

/// Subpacket type ids, RFC 4880 section 5.2.3.1.
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum SubpacketType {
    SignatureCreationTime = 2,
    SignatureExpirationTime = 3,
    ExportableCertification = 4,
    TrustSignature = 5,
    RegularExpression = 6,
    Revocable = 7,
    KeyExpirationTime = 9,
    PreferredSymmetricAlgorithms = 11,
    RevocationKey = 12,
    Issuer = 16,
    Notation = 20,
    PreferredHashAlgorithms = 21,
    PreferredCompressionAlgorithms = 22,
    PrimaryUserId = 25,
    PolicyURI = 26,
    KeyFlags = 27,
    SignersUserID = 28,
    RevocationReason = 29,
    Features = 30,
    #[num_enum(catch_all)]
    Other(u8),
}

impl SubpacketType {
    /// The type octet as written, with the critical bit applied.
    pub fn to_octet(self, is_critical: bool) -> u8 {
        let id = u8::from(self);
        if is_critical {
            id | CRITICAL_BIT
        } else {
            id
        }
    }

    /// Splits a type octet into the type and its critical flag.
    pub fn from_octet(octet: u8) -> (Self, bool) {
        (
            SubpacketType::from(octet & !CRITICAL_BIT),
            octet & CRITICAL_BIT != 0,
        )
    }
}

/// Represents a subpacket length, in the encoding it was read with.
///
/// Ref: <https://tools.ietf.org/html/rfc4880.html#section-5.2.3.1>
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SubpacketLength {
    /// 1 byte encoding, must be less than `192`.
    One(u8),
    /// 2 byte encoding, `192..=16319`
    Two(u16),
    /// 5 byte encoding
    Five(u32),
}

impl SubpacketLength {
    pub(crate) fn from_buf<B: Buf>(mut i: B) -> Result<Self> {
        let olen = i.read_u8()?;
        let len = match olen {
            0..=191 => Self::One(olen),
            192..=254 => {
                let a = i.read_u8()?;
                let l = ((u16::from(olen) - 192) << 8) + 192 + u16::from(a);
                Self::Two(l)
            }
            255 => Self::Five(i.read_be_u32()?),
        };
        Ok(len)
    }

    /// The shortest encoding for `len`.
    pub(crate) fn encode(len: u32) -> Self {
        match len {
            0..=191 => Self::One(len as u8),
            192..=16319 => Self::Two(len as u16),
            _ => Self::Five(len),
        }
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            Self::One(l) => *l as usize,
            Self::Two(l) => *l as usize,
            Self::Five(l) => *l as usize,
        }
    }
}

impl Serialize for SubpacketLength {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            Self::One(l) => writer.write_u8(*l)?,
            Self::Two(l) => {
                writer.write_u8((((l - 192) >> 8) + 192) as u8)?;
                writer.write_u8(((l - 192) & 0xFF) as u8)?;
            }
            Self::Five(l) => {
                writer.write_u8(0xFF)?;
                writer.write_u32::<BigEndian>(*l)?;
            }
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Two(_) => 2,
            Self::Five(_) => 5,
        }
    }
}

/// Code of a reason for revocation subpacket.
#[derive(Debug, PartialEq, Eq, Copy, Clone, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum RevocationCode {
    NoReason = 0,
    /// Key revocations only, as are the next two.
    KeySuperseded = 1,
    KeyCompromised = 2,
    KeyRetired = 3,
    /// Certification revocations only.
    CertUserIdInvalid = 32,

    #[num_enum(catch_all)]
    Other(u8),
}

/// A notation data subpacket.
#[derive(derive_more::Debug, PartialEq, Eq, Clone)]
pub struct Notation {
    #[debug("{}", hex::encode(flags))]
    pub flags: [u8; 4],
    pub name: Bytes,
    #[debug("{}", hex::encode(value))]
    pub value: Bytes,
}

impl Notation {
    pub fn is_human_readable(&self) -> bool {
        self.flags[0] & 0x80 != 0
    }
}

#[derive(derive_more::Debug, PartialEq, Eq, Clone)]
pub enum SubpacketData {
    /// The time the signature was made.
    SignatureCreationTime(DateTime<Utc>),
    /// Validity of the signature, counted from its creation.
    SignatureExpirationTime(Duration),
    ExportableCertification(bool),
    /// Depth and amount of a trust signature.
    TrustSignature(u8, u8),
    RegularExpression(#[debug("{:?}", String::from_utf8_lossy(_0))] Bytes),
    Revocable(bool),
    /// Validity of the key, counted from the key's creation.
    KeyExpirationTime(Duration),
    PreferredSymmetricAlgorithms(SmallVec<[SymmetricKeyAlgorithm; 8]>),
    RevocationKey(RevocationKey),
    /// The OpenPGP Key ID of the key issuing the signature.
    Issuer(KeyId),
    Notation(Notation),
    PreferredHashAlgorithms(SmallVec<[HashAlgorithm; 8]>),
    PreferredCompressionAlgorithms(SmallVec<[CompressionAlgorithm; 8]>),
    IsPrimary(bool),
    PolicyURI(String),
    KeyFlags(#[debug("{}", hex::encode(_0))] SmallVec<[u8; 1]>),
    SignersUserID(#[debug("{:?}", String::from_utf8_lossy(_0))] Bytes),
    RevocationReason(RevocationCode, #[debug("{:?}", String::from_utf8_lossy(_1))] Bytes),
    Features(#[debug("{}", hex::encode(_0))] SmallVec<[u8; 1]>),
    /// Anything not interpreted above, kept as read.
    Other(u8, #[debug("{}", hex::encode(_1))] Bytes),
}

impl SubpacketData {
    pub fn typ(&self) -> SubpacketType {
        match self {
            Self::SignatureCreationTime(_) => SubpacketType::SignatureCreationTime,
            Self::SignatureExpirationTime(_) => SubpacketType::SignatureExpirationTime,
            Self::ExportableCertification(_) => SubpacketType::ExportableCertification,
            Self::TrustSignature(_, _) => SubpacketType::TrustSignature,
            Self::RegularExpression(_) => SubpacketType::RegularExpression,
            Self::Revocable(_) => SubpacketType::Revocable,
            Self::KeyExpirationTime(_) => SubpacketType::KeyExpirationTime,
            Self::PreferredSymmetricAlgorithms(_) => SubpacketType::PreferredSymmetricAlgorithms,
            Self::RevocationKey(_) => SubpacketType::RevocationKey,
            Self::Issuer(_) => SubpacketType::Issuer,
            Self::Notation(_) => SubpacketType::Notation,
            Self::PreferredHashAlgorithms(_) => SubpacketType::PreferredHashAlgorithms,
            Self::PreferredCompressionAlgorithms(_) => {
                SubpacketType::PreferredCompressionAlgorithms
            }
            Self::IsPrimary(_) => SubpacketType::PrimaryUserId,
            Self::PolicyURI(_) => SubpacketType::PolicyURI,
            Self::KeyFlags(_) => SubpacketType::KeyFlags,
            Self::SignersUserID(_) => SubpacketType::SignersUserID,
            Self::RevocationReason(_, _) => SubpacketType::RevocationReason,
            Self::Features(_) => SubpacketType::Features,
            Self::Other(n, _) => SubpacketType::Other(*n),
        }
    }

    /// Interprets the body of a known subpacket type.
    ///
    /// Only encodings that serialize back to the same bytes are accepted,
    /// everything else is reported as an error and kept raw by the caller.
    fn from_body(typ: SubpacketType, mut body: Bytes) -> Result<Self> {
        let i = &mut body;
        let data = match typ {
            SubpacketType::SignatureCreationTime => {
                Self::SignatureCreationTime(dt_from_timestamp(i.read_be_u32()?)?)
            }
            SubpacketType::SignatureExpirationTime => {
                Self::SignatureExpirationTime(Duration::seconds(i.read_be_u32()?.into()))
            }
            SubpacketType::KeyExpirationTime => {
                Self::KeyExpirationTime(Duration::seconds(i.read_be_u32()?.into()))
            }
            SubpacketType::ExportableCertification => {
                Self::ExportableCertification(read_bool(&mut *i)?)
            }
            SubpacketType::Revocable => Self::Revocable(read_bool(&mut *i)?),
            SubpacketType::PrimaryUserId => Self::IsPrimary(read_bool(&mut *i)?),
            SubpacketType::TrustSignature => {
                let depth = i.read_u8()?;
                let amount = i.read_u8()?;
                Self::TrustSignature(depth, amount)
            }
            SubpacketType::RegularExpression => Self::RegularExpression(i.rest()),
            SubpacketType::PreferredSymmetricAlgorithms => {
                Self::PreferredSymmetricAlgorithms(i.rest().iter().map(|&b| b.into()).collect())
            }
            SubpacketType::PreferredHashAlgorithms => {
                Self::PreferredHashAlgorithms(i.rest().iter().map(|&b| b.into()).collect())
            }
            SubpacketType::PreferredCompressionAlgorithms => {
                Self::PreferredCompressionAlgorithms(i.rest().iter().map(|&b| b.into()).collect())
            }
            SubpacketType::RevocationKey => Self::RevocationKey(RevocationKey::from_buf(&mut *i)?),
            SubpacketType::Issuer => Self::Issuer(KeyId::from(i.read_array::<8>()?)),
            SubpacketType::Notation => {
                let flags = i.read_array::<4>()?;
                let name_len = i.read_be_u16()?;
                let value_len = i.read_be_u16()?;
                let name = i.read_take(name_len.into())?;
                let value = i.read_take(value_len.into())?;
                Self::Notation(Notation { flags, name, value })
            }
            SubpacketType::PolicyURI => {
                Self::PolicyURI(std::str::from_utf8(&i.rest())?.to_string())
            }
            SubpacketType::KeyFlags => Self::KeyFlags(i.rest().iter().copied().collect()),
            SubpacketType::Features => Self::Features(i.rest().iter().copied().collect()),
            SubpacketType::SignersUserID => Self::SignersUserID(i.rest()),
            SubpacketType::RevocationReason => {
                let code = RevocationCode::from(i.read_u8()?);
                Self::RevocationReason(code, i.rest())
            }
            SubpacketType::Other(n) => Self::Other(n, i.rest()),
        };
        ensure_eq!(i.remaining(), 0, "trailing bytes in {:?} subpacket", typ);

        Ok(data)
    }
}

fn read_bool<B: Buf>(mut i: B) -> Result<bool> {
    match i.read_u8()? {
        0 => Ok(false),
        1 => Ok(true),
        v => crate::errors::bail!("invalid boolean {}", v),
    }
}

impl Serialize for SubpacketData {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            Self::SignatureCreationTime(d) => writer.write_u32::<BigEndian>(dt_to_timestamp(d))?,
            Self::SignatureExpirationTime(d) | Self::KeyExpirationTime(d) => {
                writer.write_u32::<BigEndian>(d.num_seconds().try_into()?)?
            }
            Self::ExportableCertification(v) | Self::Revocable(v) | Self::IsPrimary(v) => {
                writer.write_u8(u8::from(*v))?
            }
            Self::TrustSignature(depth, amount) => writer.write_all(&[*depth, *amount])?,
            Self::RegularExpression(d) | Self::SignersUserID(d) => writer.write_all(d)?,
            Self::PreferredSymmetricAlgorithms(algs) => {
                let raw: Vec<u8> = algs.iter().map(|&a| a.into()).collect();
                writer.write_all(&raw)?
            }
            Self::PreferredHashAlgorithms(algs) => {
                let raw: Vec<u8> = algs.iter().map(|&a| a.into()).collect();
                writer.write_all(&raw)?
            }
            Self::PreferredCompressionAlgorithms(algs) => {
                let raw: Vec<u8> = algs.iter().map(|&a| a.into()).collect();
                writer.write_all(&raw)?
            }
            Self::RevocationKey(key) => key.to_writer(writer)?,
            Self::Issuer(id) => writer.write_all(id.as_ref())?,
            Self::Notation(n) => {
                writer.write_all(&n.flags)?;
                writer.write_u16::<BigEndian>(n.name.len().try_into()?)?;
                writer.write_u16::<BigEndian>(n.value.len().try_into()?)?;
                writer.write_all(&n.name)?;
                writer.write_all(&n.value)?;
            }
            Self::PolicyURI(uri) => writer.write_all(uri.as_bytes())?,
            Self::KeyFlags(d) | Self::Features(d) => writer.write_all(d)?,
            Self::RevocationReason(code, reason) => {
                writer.write_u8((*code).into())?;
                writer.write_all(reason)?;
            }
            Self::Other(_, raw) => writer.write_all(raw)?,
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            Self::SignatureCreationTime(_)
            | Self::SignatureExpirationTime(_)
            | Self::KeyExpirationTime(_) => 4,
            Self::ExportableCertification(_) | Self::Revocable(_) | Self::IsPrimary(_) => 1,
            Self::TrustSignature(_, _) => 2,
            Self::RegularExpression(d) | Self::SignersUserID(d) => d.len(),
            Self::PreferredSymmetricAlgorithms(algs) => algs.len(),
            Self::PreferredHashAlgorithms(algs) => algs.len(),
            Self::PreferredCompressionAlgorithms(algs) => algs.len(),
            Self::RevocationKey(key) => key.write_len(),
            Self::Issuer(_) => 8,
            Self::Notation(n) => 8 + n.name.len() + n.value.len(),
            Self::PolicyURI(uri) => uri.len(),
            Self::KeyFlags(d) | Self::Features(d) => d.len(),
            Self::RevocationReason(_, reason) => 1 + reason.len(),
            Self::Other(_, raw) => raw.len(),
        }
    }
}

/// One signature subpacket.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Subpacket {
    pub is_critical: bool,
    pub data: SubpacketData,
    /// Length as found on the wire, so re-encoding reproduces the hashed area.
    pub len: SubpacketLength,
}

impl Subpacket {
    /// Construct a new regular subpacket.
    pub fn regular(data: SubpacketData) -> Result<Self> {
        Self::new(false, data)
    }

    /// Construct a new critical subpacket.
    pub fn critical(data: SubpacketData) -> Result<Self> {
        Self::new(true, data)
    }

    fn new(is_critical: bool, data: SubpacketData) -> Result<Self> {
        let raw_len = (data.write_len() + 1).try_into()?;
        Ok(Subpacket {
            is_critical,
            data,
            len: SubpacketLength::encode(raw_len),
        })
    }

    pub fn typ(&self) -> SubpacketType {
        self.data.typ()
    }

    pub fn from_buf<B: Buf>(mut i: B) -> Result<Self> {
        let len = SubpacketLength::from_buf(&mut i)?;
        ensure!(len.len() > 0, "empty subpacket");

        let mut body = i.read_take(len.len())?;
        let raw_typ = body.read_u8()?;
        let (typ, is_critical) = SubpacketType::from_octet(raw_typ);

        let data = match SubpacketData::from_body(typ, body.clone()) {
            Ok(data) => data,
            Err(err) => {
                debug!("keeping {:?} subpacket raw: {}", typ, err);
                SubpacketData::Other(raw_typ & !CRITICAL_BIT, body)
            }
        };

        Ok(Subpacket {
            is_critical,
            data,
            len,
        })
    }

    /// Parses a whole subpacket area.
    pub fn from_area(mut area: Bytes) -> Result<Vec<Self>> {
        let mut packets = Vec::new();
        while area.has_remaining() {
            packets.push(Self::from_buf(&mut area)?);
        }
        Ok(packets)
    }
}

impl Serialize for Subpacket {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        self.len.to_writer(writer)?;
        writer.write_u8(self.data.typ().to_octet(self.is_critical))?;
        self.data.to_writer(writer)
    }

    fn write_len(&self) -> usize {
        self.len.write_len() + self.len.len()
    }
}
