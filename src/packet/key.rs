use std::io;

use byteorder::{BigEndian, WriteBytesExt};
use bytes::Buf;
use chrono::{DateTime, Utc};
use digest::Digest;
use log::debug;
use md5::Md5;
use sha1::Sha1;

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::Verifier;
use crate::errors::{ensure, unsupported_err, Result};
use crate::packet::PacketHeader;
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{
    Fingerprint, KeyId, KeyVersion, Mpi, PacketHeaderVersion, PublicKeyTrait, PublicParams,
    SecretKeyTrait, SecretParams, Tag,
};
use crate::util::{dt_from_timestamp, dt_to_timestamp};

/// The public part shared by all four key packet types.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PubKeyInner {
    version: KeyVersion,
    algorithm: PublicKeyAlgorithm,
    created_at: DateTime<Utc>,
    expiration: Option<u16>,
    public_params: PublicParams,
    fingerprint: Fingerprint,
    key_id: KeyId,
}

impl PubKeyInner {
    pub fn new(
        version: KeyVersion,
        algorithm: PublicKeyAlgorithm,
        created_at: DateTime<Utc>,
        expiration: Option<u16>,
        public_params: PublicParams,
    ) -> Result<Self> {
        let (fingerprint, key_id) = match version {
            KeyVersion::V2 | KeyVersion::V3 => {
                let PublicParams::Rsa { n, e } = &public_params else {
                    unsupported_err!("{:?} keys with algorithm {:?}", version, algorithm);
                };
                ensure!(n.len() >= 8, "RSA modulus too short for a key id");

                let mut h = Md5::new();
                h.update(n.as_ref());
                h.update(e.as_ref());
                let fingerprint = Fingerprint::new(version, &h.finalize())?;

                // low 64 bits of the modulus
                let key_id = KeyId::from_slice(&n.as_ref()[n.len() - 8..])?;
                (fingerprint, key_id)
            }
            KeyVersion::V4 => {
                let mut h = Sha1::new();
                write_for_hashing(&mut h, version, algorithm, &created_at, None, &public_params)?;
                let fingerprint = Fingerprint::new(version, &h.finalize())?;

                let fp = fingerprint.as_bytes();
                let key_id = KeyId::from_slice(&fp[fp.len() - 8..])?;
                (fingerprint, key_id)
            }
            KeyVersion::Other(v) => unsupported_err!("key version {}", v),
        };

        Ok(PubKeyInner {
            version,
            algorithm,
            created_at,
            expiration: expiration.filter(|_| version != KeyVersion::V4),
            public_params,
            fingerprint,
            key_id,
        })
    }

    pub fn try_from_buf<B: Buf>(mut i: B) -> Result<Self> {
        let version = KeyVersion::from(i.read_u8()?);
        let created_at = dt_from_timestamp(i.read_be_u32()?)?;
        let expiration = match version {
            KeyVersion::V2 | KeyVersion::V3 => Some(i.read_be_u16()?),
            KeyVersion::V4 => None,
            KeyVersion::Other(v) => unsupported_err!("key version {}", v),
        };
        let algorithm = PublicKeyAlgorithm::from(i.read_u8()?);
        let public_params = PublicParams::try_from_buf(algorithm, &mut i)?;

        Self::new(version, algorithm, created_at, expiration, public_params)
    }
}

fn body_len(version: KeyVersion, public_params: &PublicParams) -> usize {
    let fixed = match version {
        KeyVersion::V2 | KeyVersion::V3 => 1 + 4 + 2 + 1,
        _ => 1 + 4 + 1,
    };
    fixed + public_params.write_len()
}

fn write_body<W: io::Write>(
    writer: &mut W,
    version: KeyVersion,
    algorithm: PublicKeyAlgorithm,
    created_at: &DateTime<Utc>,
    expiration: Option<u16>,
    public_params: &PublicParams,
) -> Result<()> {
    writer.write_u8(version.into())?;
    writer.write_u32::<BigEndian>(dt_to_timestamp(created_at))?;
    if version.is_legacy() {
        writer.write_u16::<BigEndian>(expiration.unwrap_or(0))?;
    }
    writer.write_u8(algorithm.into())?;
    public_params.to_writer(writer)?;
    Ok(())
}

/// `0x99 || u16 length || body`, the framing used by fingerprints and signature hashes.
fn write_for_hashing<W: io::Write>(
    writer: &mut W,
    version: KeyVersion,
    algorithm: PublicKeyAlgorithm,
    created_at: &DateTime<Utc>,
    expiration: Option<u16>,
    public_params: &PublicParams,
) -> Result<()> {
    let len = u16::try_from(body_len(version, public_params))?;
    writer.write_u8(0x99)?;
    writer.write_u16::<BigEndian>(len)?;
    write_body(writer, version, algorithm, created_at, expiration, public_params)
}

impl Serialize for PubKeyInner {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        write_body(
            writer,
            self.version,
            self.algorithm,
            &self.created_at,
            self.expiration,
            &self.public_params,
        )
    }

    fn write_len(&self) -> usize {
        body_len(self.version, &self.public_params)
    }
}

impl PublicKeyTrait for PubKeyInner {
    fn version(&self) -> KeyVersion {
        self.version
    }

    fn fingerprint(&self) -> Fingerprint {
        self.fingerprint.clone()
    }

    fn key_id(&self) -> KeyId {
        self.key_id
    }

    fn algorithm(&self) -> PublicKeyAlgorithm {
        self.algorithm
    }

    fn created_at(&self) -> &DateTime<Utc> {
        &self.created_at
    }

    fn v3_expiration_days(&self) -> Option<u16> {
        self.expiration
    }

    fn public_params(&self) -> &PublicParams {
        &self.public_params
    }

    fn verify_signature(&self, hash: HashAlgorithm, hashed: &[u8], sig: &[Mpi]) -> Result<bool> {
        self.public_params.verify(hash, hashed, sig)
    }

    fn serialize_for_hashing(&self, writer: &mut impl io::Write) -> Result<()> {
        write_for_hashing(
            writer,
            self.version,
            self.algorithm,
            &self.created_at,
            self.expiration,
            &self.public_params,
        )
    }
}

macro_rules! impl_public_key {
    ($name:ident, $tag:expr) => {
        #[derive(Debug, PartialEq, Eq, Clone)]
        pub struct $name {
            packet_header: PacketHeader,
            inner: PubKeyInner,
        }

        impl $name {
            pub fn new(
                version: KeyVersion,
                algorithm: PublicKeyAlgorithm,
                created_at: DateTime<Utc>,
                expiration: Option<u16>,
                public_params: PublicParams,
            ) -> Result<Self> {
                let inner =
                    PubKeyInner::new(version, algorithm, created_at, expiration, public_params)?;
                Self::from_inner(inner)
            }

            pub fn from_inner(inner: PubKeyInner) -> Result<Self> {
                let packet_header = PacketHeader::for_new_packet($tag, inner.write_len())?;
                Ok(Self {
                    packet_header,
                    inner,
                })
            }

            /// Parses the packet body.
            pub fn from_buf<B: Buf>(packet_header: PacketHeader, input: B) -> Result<Self> {
                let inner = PubKeyInner::try_from_buf(input)?;
                debug!("parsed {:?} {}", $tag, inner.key_id);
                Ok(Self {
                    packet_header,
                    inner,
                })
            }

            pub fn inner(&self) -> &PubKeyInner {
                &self.inner
            }
        }

        impl Serialize for $name {
            fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
                self.inner.to_writer(writer)
            }

            fn write_len(&self) -> usize {
                self.inner.write_len()
            }
        }

        impl crate::packet::PacketTrait for $name {
            fn packet_header(&self) -> &PacketHeader {
                &self.packet_header
            }
        }

        impl_key_details!($name, inner);
    };
}

macro_rules! impl_key_details {
    ($name:ident, $($field:ident).+) => {
        impl PublicKeyTrait for $name {
            fn version(&self) -> KeyVersion {
                self.$($field).+.version()
            }

            fn fingerprint(&self) -> Fingerprint {
                self.$($field).+.fingerprint()
            }

            fn key_id(&self) -> KeyId {
                self.$($field).+.key_id()
            }

            fn algorithm(&self) -> PublicKeyAlgorithm {
                self.$($field).+.algorithm()
            }

            fn created_at(&self) -> &DateTime<Utc> {
                self.$($field).+.created_at()
            }

            fn v3_expiration_days(&self) -> Option<u16> {
                self.$($field).+.v3_expiration_days()
            }

            fn public_params(&self) -> &PublicParams {
                self.$($field).+.public_params()
            }

            fn verify_signature(
                &self,
                hash: HashAlgorithm,
                hashed: &[u8],
                sig: &[Mpi],
            ) -> Result<bool> {
                self.$($field).+.verify_signature(hash, hashed, sig)
            }

            fn serialize_for_hashing(&self, writer: &mut impl io::Write) -> Result<()> {
                self.$($field).+.serialize_for_hashing(writer)
            }
        }
    };
}

macro_rules! impl_secret_key {
    ($name:ident, $public:ident, $tag:expr) => {
        #[derive(Debug, PartialEq, Eq, Clone)]
        pub struct $name {
            packet_header: PacketHeader,
            details: PubKeyInner,
            secret_params: SecretParams,
        }

        impl $name {
            pub fn new(details: PubKeyInner, secret_params: SecretParams) -> Result<Self> {
                let len = details.write_len() + secret_params.write_len();
                Ok(Self {
                    packet_header: PacketHeader::for_new_packet($tag, len)?,
                    details,
                    secret_params,
                })
            }

            /// Parses the packet body: the public key, followed by the secret material.
            pub fn from_buf<B: Buf>(packet_header: PacketHeader, mut input: B) -> Result<Self> {
                let details = PubKeyInner::try_from_buf(&mut input)?;
                let secret_params = SecretParams::try_from_buf(details.algorithm, &mut input)?;
                debug!("parsed {:?} {}", $tag, details.key_id);
                Ok(Self {
                    packet_header,
                    details,
                    secret_params,
                })
            }

            /// The matching public key packet, keeping this packet's header style.
            pub fn public_key(&self) -> Result<$public> {
                let mut public = $public::from_inner(self.details.clone())?;
                if self.packet_header.version() == PacketHeaderVersion::New {
                    public.packet_header = PacketHeader::new_fixed(
                        crate::packet::PacketTrait::tag(&public),
                        public.write_len().try_into()?,
                    );
                }
                Ok(public)
            }

            pub fn details(&self) -> &PubKeyInner {
                &self.details
            }

            /// Replaces the secret material, e.g. after changing the passphrase.
            pub fn set_secret_params(&mut self, secret_params: SecretParams) -> Result<()> {
                self.secret_params = secret_params;
                let len = (self.details.write_len() + self.secret_params.write_len()).try_into()?;
                self.packet_header = self.packet_header.with_body_len(len);
                Ok(())
            }
        }

        impl Serialize for $name {
            fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
                self.details.to_writer(writer)?;
                self.secret_params.to_writer(writer)
            }

            fn write_len(&self) -> usize {
                self.details.write_len() + self.secret_params.write_len()
            }
        }

        impl crate::packet::PacketTrait for $name {
            fn packet_header(&self) -> &PacketHeader {
                &self.packet_header
            }
        }

        impl_key_details!($name, details);

        impl SecretKeyTrait for $name {
            fn secret_params(&self) -> &SecretParams {
                &self.secret_params
            }

            fn create_signature(
                &self,
                passphrase: &str,
                hash: HashAlgorithm,
                digest: &[u8],
            ) -> Result<Vec<Mpi>> {
                let plain = self.secret_params.unlock(
                    self.details.version,
                    self.details.algorithm,
                    passphrase,
                )?;
                plain.sign(&self.details.public_params, hash, digest)
            }
        }
    };
}

impl_public_key!(PublicKey, Tag::PublicKey);
impl_public_key!(PublicSubkey, Tag::PublicSubkey);
impl_secret_key!(SecretKey, PublicKey, Tag::SecretKey);
impl_secret_key!(SecretSubkey, PublicSubkey, Tag::SecretSubkey);

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::packet::PacketTrait;
    use crate::types::PlainSecretParams;

    fn rsa_params() -> PublicParams {
        PublicParams::Rsa {
            n: Mpi::from_slice(&hex::decode("c5a3b2f1e0d9c8b7a6958473625140302f1e0d0c0b0a0908").unwrap()),
            e: Mpi::from_slice(&[0x01, 0x00, 0x01]),
        }
    }

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_v4_fingerprint_and_key_id() {
        let key = PublicKey::new(KeyVersion::V4, PublicKeyAlgorithm::RSA, created(), None, rsa_params())
            .unwrap();

        let body = key.to_bytes().unwrap();
        let mut framed = vec![0x99, 0, body.len() as u8];
        framed.extend_from_slice(&body);
        let expected = Sha1::digest(&framed);

        assert_eq!(key.fingerprint().as_bytes(), &expected[..]);
        assert_eq!(key.key_id().as_ref(), &expected[12..]);

        let mut hashed = Vec::new();
        key.serialize_for_hashing(&mut hashed).unwrap();
        assert_eq!(hashed, framed);
    }

    #[test]
    fn test_v3_key_id_is_low_modulus_bits() {
        let key = PublicKey::new(
            KeyVersion::V3,
            PublicKeyAlgorithm::RSA,
            created(),
            Some(30),
            rsa_params(),
        )
        .unwrap();

        assert_eq!(key.key_id().to_string(), "2F1E0D0C0B0A0908");
        assert_eq!(key.fingerprint().len(), 16);

        let mut h = Md5::new();
        h.update(hex::decode("c5a3b2f1e0d9c8b7a6958473625140302f1e0d0c0b0a0908").unwrap());
        h.update([0x01, 0x00, 0x01]);
        assert_eq!(key.fingerprint().as_bytes(), &h.finalize()[..]);

        assert_eq!(
            key.v3_expires_at().unwrap(),
            Utc.with_ymd_and_hms(2020, 1, 31, 0, 0, 0).unwrap()
        );

        // roundtrip through the wire format
        let body = key.to_bytes().unwrap();
        let back = PublicKey::from_buf(*key.packet_header(), &body[..]).unwrap();
        assert_eq!(back, key);
    }

    #[test]
    fn test_v3_requires_rsa() {
        let params = PublicParams::Dsa {
            p: Mpi::from_slice(&[23]),
            q: Mpi::from_slice(&[11]),
            g: Mpi::from_slice(&[4]),
            y: Mpi::from_slice(&[8]),
        };
        assert!(
            PublicKey::new(KeyVersion::V3, PublicKeyAlgorithm::DSA, created(), Some(0), params)
                .is_err()
        );
    }

    #[test]
    fn test_secret_key_public_half() {
        let public =
            PublicKey::new(KeyVersion::V4, PublicKeyAlgorithm::RSA, created(), None, rsa_params())
                .unwrap();
        let secret = SecretKey::new(
            public.inner().clone(),
            SecretParams::Plain(PlainSecretParams::Rsa {
                d: Mpi::from_slice(&[7]),
                p: Mpi::from_slice(&[3]),
                q: Mpi::from_slice(&[5]),
                u: Mpi::from_slice(&[2]),
            }),
        )
        .unwrap();

        assert_eq!(secret.key_id(), public.key_id());
        assert_eq!(secret.public_key().unwrap(), public);
        assert_eq!(secret.tag(), Tag::SecretKey);

        let body = secret.to_bytes().unwrap();
        assert_eq!(body.len(), secret.write_len());
        let back = SecretKey::from_buf(*secret.packet_header(), &body[..]).unwrap();
        assert_eq!(back, secret);
    }
}
