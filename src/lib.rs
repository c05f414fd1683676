//! # pgp-keyring
//!
//! An OpenPGP keyring engine: it decodes and encodes the OpenPGP binary packet
//! format, assembles a flat packet stream into certificates (primary keys,
//! subkeys, user identities and their signatures) and computes a PGP 2.6 style
//! web of trust over them.
//!
//! ```no_run
//! use pgp_keyring::keyring::KeyStore;
//! use pgp_keyring::trust::TrustEngine;
//!
//! # fn main() -> pgp_keyring::errors::Result<()> {
//! let public = std::fs::read("pubring.pgp")?;
//! let secret = std::fs::read("secring.pgp")?;
//!
//! let mut store = KeyStore::from_keyrings(&public, Some(&secret[..]))?;
//! TrustEngine::default().refresh(&mut store);
//!
//! for key in store.all_keys() {
//!     println!("{} {:?}", key.key_id(), key.primary_user_id());
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(
    clippy::all,
    clippy::style,
    clippy::perf,
    clippy::complexity,
    clippy::correctness
)]
#![warn(rust_2018_idioms)]
#![allow(clippy::missing_const_for_fn, clippy::use_self)]

pub mod crypto;
pub mod errors;
pub mod keygen;
pub mod keyring;
pub mod packet;
pub mod parsing;
pub mod ser;
pub mod trust;
pub mod types;

mod util;

pub use self::keyring::{KeyStore, PrimaryKey, SigRef, Subkey, UserBinding};
pub use self::packet::{Packet, PacketParser};
pub use self::trust::{TrustEngine, TrustModel};

/// The version of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
