use std::io;

use byteorder::{BigEndian, WriteBytesExt};
use bytes::{Buf, Bytes};
use num_bigint::BigUint;

use crate::errors::{Error, Result};
use crate::parsing::BufParsing;
use crate::ser::Serialize;

/// Largest MPI accepted on read, in bits. Matches GnuPG's limit.
const MAX_MPI_BITS: u16 = 16384;

/// A multiprecision integer (RFC 4880 section 3.2), held as its big endian
/// magnitude without leading zero bytes so it serializes unchanged.
#[derive(Default, Clone, PartialEq, Eq, Hash, derive_more::Debug)]
pub struct Mpi(#[debug("{}", hex::encode(_0))] Bytes);

fn significant(raw: &[u8]) -> &[u8] {
    let start = raw.iter().take_while(|b| **b == 0).count();
    &raw[start..]
}

impl Mpi {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value of the two byte length prefix.
    pub fn bit_len(&self) -> usize {
        match self.0.first() {
            Some(top) => self.0.len() * 8 - top.leading_zeros() as usize,
            None => 0,
        }
    }

    /// Reads a length prefixed MPI. Zero bytes in front of the magnitude are
    /// tolerated and dropped.
    pub fn from_buf<B: Buf>(mut i: B) -> Result<Self> {
        let bits = i.read_be_u16()?;
        if bits > MAX_MPI_BITS {
            return Err(Error::InvalidInput);
        }

        let raw = i.read_take(usize::from(bits).div_ceil(8))?;
        let magnitude = raw.slice_ref(significant(&raw));
        Ok(Mpi(magnitude))
    }

    /// Wraps an unprefixed big endian magnitude.
    pub fn from_slice(raw: &[u8]) -> Self {
        Mpi(Bytes::copy_from_slice(significant(raw)))
    }
}

impl AsRef<[u8]> for Mpi {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Mpi {
    fn to_writer<W: io::Write>(&self, w: &mut W) -> Result<()> {
        w.write_u16::<BigEndian>(self.bit_len().try_into()?)?;
        w.write_all(&self.0)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        2 + self.len()
    }
}

impl From<&BigUint> for Mpi {
    fn from(n: &BigUint) -> Self {
        Mpi::from_slice(&n.to_bytes_be())
    }
}

impl From<BigUint> for Mpi {
    fn from(n: BigUint) -> Self {
        Mpi::from(&n)
    }
}

impl From<&Mpi> for BigUint {
    fn from(m: &Mpi) -> Self {
        BigUint::from_bytes_be(&m.0)
    }
}

impl From<Mpi> for BigUint {
    fn from(m: Mpi) -> Self {
        BigUint::from(&m)
    }
}
