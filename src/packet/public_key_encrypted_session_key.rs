use std::io;

use byteorder::WriteBytesExt;
use bytes::Buf;

use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::{unsupported_err, Result};
use crate::packet::{PacketHeader, PacketTrait};
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{KeyId, Mpi, PkeskVersion};

/// Public Key Encrypted Session Key Packet
/// <https://tools.ietf.org/html/rfc4880.html#section-5.1>
///
/// Decoded to its fields only, decrypting the session key belongs to the
/// message layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyEncryptedSessionKey {
    packet_header: PacketHeader,
    id: KeyId,
    pk_algo: PublicKeyAlgorithm,
    values: Vec<Mpi>,
}

impl PublicKeyEncryptedSessionKey {
    pub fn from_buf<B: Buf>(packet_header: PacketHeader, mut i: B) -> Result<Self> {
        let version = PkeskVersion::from(i.read_u8()?);
        if version != PkeskVersion::V3 {
            unsupported_err!("PKESK {:?}", version);
        }
        let id = KeyId::from(i.read_array::<8>()?);
        let pk_algo = PublicKeyAlgorithm::from(i.read_u8()?);

        let mut values = Vec::new();
        while i.has_remaining() {
            values.push(Mpi::from_buf(&mut i)?);
        }

        Ok(PublicKeyEncryptedSessionKey {
            packet_header,
            id,
            pk_algo,
            values,
        })
    }

    /// Recipient key id, all zeros for anonymous recipients.
    pub fn id(&self) -> &KeyId {
        &self.id
    }

    pub fn algorithm(&self) -> PublicKeyAlgorithm {
        self.pk_algo
    }

    pub fn values(&self) -> &[Mpi] {
        &self.values
    }
}

impl Serialize for PublicKeyEncryptedSessionKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(PkeskVersion::V3.into())?;
        writer.write_all(self.id.as_ref())?;
        writer.write_u8(self.pk_algo.into())?;
        self.values.to_writer(writer)
    }

    fn write_len(&self) -> usize {
        1 + 8 + 1 + self.values.write_len()
    }
}

impl PacketTrait for PublicKeyEncryptedSessionKey {
    fn packet_header(&self) -> &PacketHeader {
        &self.packet_header
    }
}
