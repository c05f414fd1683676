use std::io;

use byteorder::{BigEndian, WriteBytesExt};

use crate::errors::Result;
use crate::packet::signature::SignatureVersionSpecific;
use crate::packet::{PacketHeader, PacketTrait, Signature};
use crate::ser::Serialize;
use crate::util::dt_to_timestamp;

impl Serialize for Signature {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.config.version().into())?;

        match &self.config.version_specific {
            SignatureVersionSpecific::V3 {
                created, issuer, ..
            } => {
                writer.write_u8(5)?;
                writer.write_u8(self.config.typ.into())?;
                writer.write_u32::<BigEndian>(dt_to_timestamp(created))?;
                writer.write_all(issuer.as_ref())?;
                writer.write_u8(self.config.pub_alg.into())?;
                writer.write_u8(self.config.hash_alg.into())?;
            }
            SignatureVersionSpecific::V4 => {
                writer.write_u8(self.config.typ.into())?;
                writer.write_u8(self.config.pub_alg.into())?;
                writer.write_u8(self.config.hash_alg.into())?;

                writer.write_u16::<BigEndian>(self.config.hashed_subpackets.write_len().try_into()?)?;
                self.config.hashed_subpackets.to_writer(writer)?;

                writer.write_u16::<BigEndian>(
                    self.config.unhashed_subpackets.write_len().try_into()?,
                )?;
                self.config.unhashed_subpackets.to_writer(writer)?;
            }
        }

        writer.write_all(&self.signed_hash_value)?;
        self.signature.to_writer(writer)?;

        Ok(())
    }

    fn write_len(&self) -> usize {
        let fields = match &self.config.version_specific {
            SignatureVersionSpecific::V3 { .. } => 1 + 1 + 4 + 8 + 1 + 1,
            SignatureVersionSpecific::V4 => {
                3 + 2
                    + self.config.hashed_subpackets.write_len()
                    + 2
                    + self.config.unhashed_subpackets.write_len()
            }
        };
        1 + fields + 2 + self.signature.write_len()
    }
}

impl PacketTrait for Signature {
    fn packet_header(&self) -> &PacketHeader {
        &self.packet_header
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use hex_literal::hex;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::crypto::hash::HashAlgorithm;
    use crate::crypto::public_key::PublicKeyAlgorithm;
    use crate::packet::{SignatureType, SignatureVersion, Subpacket, SubpacketData};
    use crate::types::{KeyId, Mpi, Tag};

    #[test]
    fn test_v3_roundtrip() {
        let sig = Signature::v3(
            PacketHeader::new_fixed(Tag::Signature, 0),
            SignatureType::CertGeneric,
            PublicKeyAlgorithm::RSA,
            HashAlgorithm::Md5,
            Utc.with_ymd_and_hms(1998, 3, 1, 12, 0, 0).unwrap(),
            KeyId::from(hex!("0011223344556677")),
            [0xAB, 0xCD],
            vec![Mpi::from_slice(&hex!("0102030405"))],
        );

        let raw = sig.to_bytes().unwrap();
        assert_eq!(raw.len(), sig.write_len());
        assert_eq!(&raw[..3], &[3, 5, 0x10]);

        let back = Signature::from_buf(sig.packet_header, &raw[..]).unwrap();
        assert_eq!(back, sig);
        assert_eq!(back.version(), SignatureVersion::V3);
        assert_eq!(back.issuer(), Some(KeyId::from(hex!("0011223344556677"))));
    }

    #[test]
    fn test_v4_roundtrip_keeps_unknown_subpackets() {
        let raw = hex!(
            "04 13 01 08"
            "000d 05 02 5e0be100 02 19 01 03 e5 aabb"
            "000a 09 10 0102030405060708"
            "beef"
            "0009 01ff"
        );
        let sig = Signature::from_buf(PacketHeader::new_fixed(Tag::Signature, raw.len() as u32), &raw[..])
            .unwrap();

        assert_eq!(sig.typ(), SignatureType::CertPositive);
        assert_eq!(sig.hash_alg(), HashAlgorithm::Sha256);
        assert!(sig.is_primary());
        assert_eq!(sig.issuer(), Some(KeyId::from(hex!("0102030405060708"))));
        assert_eq!(
            sig.created(),
            Some(&Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(sig.config.hashed_subpackets.len(), 3);
        assert_eq!(sig.signature.len(), 1);

        assert_eq!(sig.to_bytes().unwrap(), raw);
    }

    #[test]
    fn test_from_config_header() {
        let config = crate::packet::SignatureConfig::new_v4(
            SignatureType::CertGeneric,
            PublicKeyAlgorithm::RSA,
            HashAlgorithm::Sha256,
            vec![Subpacket::regular(SubpacketData::TrustSignature(1, 120)).unwrap()],
            vec![],
        );
        let sig = Signature::from_config(config, [0, 0], vec![Mpi::from_slice(&[1])]).unwrap();
        assert_eq!(sig.trust_signature(), Some((1, 120)));
        assert_eq!(
            sig.packet_header().packet_length(),
            crate::types::PacketLength::Fixed(sig.write_len() as u32)
        );
    }
}
