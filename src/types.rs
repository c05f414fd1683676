mod compression;
mod fingerprint;
mod key_id;
mod key_traits;
mod mpi;
mod packet;
mod params;
mod revocation_key;
mod s2k;
mod trust;

pub use self::{
    compression::CompressionAlgorithm,
    fingerprint::Fingerprint,
    key_id::{KeyId, ShortKeyId},
    key_traits::{PublicKeyTrait, SecretKeyTrait},
    mpi::Mpi,
    packet::*,
    params::*,
    revocation_key::RevocationKey,
    s2k::{StringToKey, DEFAULT_ITER_COUNT},
    trust::{KeyLegitimacy, OwnerTrust, TrustByte},
};
