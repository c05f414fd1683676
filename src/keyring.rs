//! # Keyring module
//!
//! Assembles packet streams into certificates, merges public and secret
//! keyrings, verifies and creates signatures, and writes keyrings back out.

mod builder;
mod export;
mod merge;
mod model;
mod parser;
mod store;
mod verify;

pub use self::{
    model::{
        CertSignature, PrimaryKey, SigRef, SigSite, SigState, SignerRef, Subkey, UserBinding,
        UserPacket,
    },
    parser::{parse_keyring, KeyringParser},
    store::KeyStore,
};
