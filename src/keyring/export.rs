use std::io;

use crate::errors::{Error, Result};
use crate::keyring::{CertSignature, KeyStore, PrimaryKey, Subkey, UserPacket};
use crate::packet::{PacketTrait, Trust};
use crate::types::TrustByte;

/// Writes packets in keyring order, optionally followed by their trust packets.
struct KeyringWriter<'a, W: io::Write> {
    writer: &'a mut W,
    with_trust: bool,
}

impl<W: io::Write> KeyringWriter<'_, W> {
    fn packet(&mut self, packet: &impl PacketTrait, trust: TrustByte) -> Result<()> {
        packet.to_writer_with_header(&mut *self.writer)?;
        if self.with_trust {
            Trust::new(trust)?.to_writer_with_header(&mut *self.writer)?;
        }
        Ok(())
    }

    /// Signatures that leave the local keyring only when they are exportable.
    fn signature(&mut self, sig: &CertSignature) -> Result<()> {
        if !self.with_trust && !sig.signature().exportable_certification() {
            return Ok(());
        }
        self.packet(sig.signature(), sig.trust())?;
        if let Some(rev) = sig.revocation() {
            self.packet(rev.signature(), rev.trust())?;
        }
        Ok(())
    }

    fn body(&mut self, key: &PrimaryKey, secret: bool) -> Result<()> {
        if let Some(rev) = key.revocation() {
            self.signature(rev)?;
        }
        for sig in key.signatures() {
            self.signature(sig)?;
        }

        for binding in key.users() {
            match binding.user() {
                UserPacket::Id(id) => self.packet(id, binding.trust())?,
                UserPacket::Attribute(attr) => self.packet(attr, binding.trust())?,
            }
            for sig in binding.signatures() {
                self.signature(sig)?;
            }
        }

        for subkey in key.subkeys() {
            self.subkey(subkey, secret)?;
        }
        Ok(())
    }

    fn subkey(&mut self, subkey: &Subkey, secret: bool) -> Result<()> {
        match subkey.secret_key() {
            Some(s) if secret => self.packet(s, subkey.trust())?,
            _ => self.packet(subkey.public_key(), subkey.trust())?,
        }
        if let Some(binding) = subkey.binding() {
            self.signature(binding)?;
        }
        if let Some(rev) = subkey.revocation() {
            self.signature(rev)?;
        }
        Ok(())
    }
}

impl PrimaryKey {
    /// Writes the public certificate. Trust packets belong to local keyrings
    /// only and are left out when `with_trust` is false, as are non-exportable
    /// certifications.
    pub fn to_public_writer<W: io::Write>(&self, writer: &mut W, with_trust: bool) -> Result<()> {
        let mut out = KeyringWriter { writer, with_trust };
        out.packet(self.public_key(), self.trust())?;
        out.body(self, false)
    }

    pub fn to_public_bytes(&self, with_trust: bool) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.to_public_writer(&mut buf, with_trust)?;
        Ok(buf)
    }

    /// Writes the certificate with its secret key material.
    pub fn to_secret_writer<W: io::Write>(&self, writer: &mut W, with_trust: bool) -> Result<()> {
        let secret = self.secret_key().ok_or_else(|| Error::KeyMismatch {
            message: format!("no secret key for {}", self.key_id()),
        })?;
        let mut out = KeyringWriter { writer, with_trust };
        out.packet(secret, self.trust())?;
        out.body(self, true)
    }

    pub fn to_secret_bytes(&self, with_trust: bool) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.to_secret_writer(&mut buf, with_trust)?;
        Ok(buf)
    }
}

impl KeyStore {
    /// The public keyring: every certificate of the store.
    pub fn to_public_bytes(&self, with_trust: bool) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        for key in self.all_keys() {
            key.to_public_writer(&mut buf, with_trust)?;
        }
        Ok(buf)
    }

    /// The secret keyring: the key pairs of the store.
    pub fn to_secret_bytes(&self, with_trust: bool) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        for key in self.key_pairs() {
            key.to_secret_writer(&mut buf, with_trust)?;
        }
        Ok(buf)
    }
}
