//! # Cryptography module
//!
//! Thin wrappers around the RustCrypto primitives. Everything in here works on
//! already framed byte buffers, the packet and keyring layers decide what gets hashed.

use crate::errors::Result;
use crate::types::Mpi;

use self::hash::HashAlgorithm;

pub mod checksum;
pub mod dsa;
pub mod hash;
pub mod public_key;
pub mod rsa;
pub mod sym;

/// Describes keys that can verify signatures.
pub trait Verifier {
    /// Returns `Ok(false)` for a well formed but cryptographically invalid signature.
    fn verify(&self, hash: HashAlgorithm, hashed: &[u8], sig: &[Mpi]) -> Result<bool>;
}
