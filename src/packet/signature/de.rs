use bytes::{Buf, Bytes};
use log::debug;

use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::{ensure_eq, unsupported_err, Result};
use crate::packet::signature::{SignatureConfig, SignatureVersionSpecific};
use crate::packet::{PacketHeader, Signature, SignatureType, SignatureVersion, Subpacket};
use crate::parsing::BufParsing;
use crate::types::{KeyId, Mpi};
use crate::util::dt_from_timestamp;

impl Signature {
    /// Parses a `Signature` packet body.
    pub fn from_buf<B: Buf>(packet_header: PacketHeader, mut i: B) -> Result<Self> {
        let version = SignatureVersion::from(i.read_u8()?);
        let config = match version {
            SignatureVersion::V2 | SignatureVersion::V3 => v3_config(version, &mut i)?,
            SignatureVersion::V4 => v4_config(&mut i)?,
            SignatureVersion::Other(v) => unsupported_err!("signature version {}", v),
        };
        let signed_hash_value = i.read_array::<2>()?;

        // the MPIs run to the end of the packet
        let mut signature = Vec::new();
        while i.has_remaining() {
            signature.push(Mpi::from_buf(&mut i)?);
        }

        debug!("parsed {:?} signature by {:?}", config.typ, config.issuer());

        Ok(Signature {
            packet_header,
            config,
            signed_hash_value,
            signature,
        })
    }
}

fn v3_config<B: Buf>(version: SignatureVersion, mut i: B) -> Result<SignatureConfig> {
    // length of the hashed material, always 5
    let len = i.read_u8()?;
    ensure_eq!(len, 5, "invalid V3 signature hashed length");

    let typ = SignatureType::from(i.read_u8()?);
    let created = dt_from_timestamp(i.read_be_u32()?)?;
    let issuer = KeyId::from(i.read_array::<8>()?);
    let pub_alg = PublicKeyAlgorithm::from(i.read_u8()?);
    let hash_alg = HashAlgorithm::from(i.read_u8()?);

    Ok(SignatureConfig {
        typ,
        pub_alg,
        hash_alg,
        hashed_subpackets: vec![],
        unhashed_subpackets: vec![],
        version_specific: SignatureVersionSpecific::V3 {
            version,
            created,
            issuer,
        },
    })
}

fn v4_config<B: Buf>(mut i: B) -> Result<SignatureConfig> {
    let typ = SignatureType::from(i.read_u8()?);
    let pub_alg = PublicKeyAlgorithm::from(i.read_u8()?);
    let hash_alg = HashAlgorithm::from(i.read_u8()?);

    let hashed_len = i.read_be_u16()?;
    let hashed: Bytes = i.read_take(hashed_len.into())?;
    let hashed_subpackets = Subpacket::from_area(hashed)?;

    let unhashed_len = i.read_be_u16()?;
    let unhashed = i.read_take(unhashed_len.into())?;
    let unhashed_subpackets = Subpacket::from_area(unhashed)?;

    Ok(SignatureConfig::new_v4(
        typ,
        pub_alg,
        hash_alg,
        hashed_subpackets,
        unhashed_subpackets,
    ))
}
