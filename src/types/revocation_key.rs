use std::io;

use bytes::Buf;

use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::{ensure, Result};
use crate::parsing::BufParsing;
use crate::ser::Serialize;

/// A designated revoker, named in a revocation key subpacket.
#[derive(derive_more::Debug, PartialEq, Eq, Clone)]
pub struct RevocationKey {
    /// Class octet, bit 0x80 must be set; 0x40 marks the relationship as sensitive.
    pub class: u8,
    pub algorithm: PublicKeyAlgorithm,
    #[debug("{}", hex::encode(fingerprint))]
    pub fingerprint: [u8; 20],
}

impl RevocationKey {
    pub fn is_sensitive(&self) -> bool {
        self.class & 0x40 != 0
    }

    pub fn from_buf<B: Buf>(mut i: B) -> Result<Self> {
        let class = i.read_u8()?;
        ensure!(class & 0x80 != 0, "invalid revocation key class {:#04x}", class);
        let algorithm = i.read_u8()?.into();
        let fingerprint = i.read_array::<20>()?;

        Ok(RevocationKey {
            class,
            algorithm,
            fingerprint,
        })
    }
}

impl Serialize for RevocationKey {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&[self.class, self.algorithm.into()])?;
        writer.write_all(&self.fingerprint)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        22
    }
}
