use log::{debug, warn};

use crate::errors::{format_err, Error, Result};
use crate::keyring::{KeyStore, SigRef, SigSite};
use crate::packet::PublicKey;
use crate::types::{KeyId, PublicKeyTrait};

impl KeyStore {
    /// Checks one signature against its signer's public key and records the
    /// outcome on the signature.
    ///
    /// `Ok(false)` means the signature is cryptographically invalid. A failed
    /// revocation is rolled back. When the signer is not in the store the
    /// signature stays pending and [`Error::MissingKey`] is returned.
    pub fn verify_signature(&mut self, sig_ref: &SigRef) -> Result<bool> {
        let res = self.check_signature(sig_ref);

        match &res {
            Err(Error::MissingKey { key_id }) => {
                debug!("signer {} of {:?} is not in the keyring", key_id, sig_ref.site);
                return res;
            }
            Ok(true) => {
                if let Some(sig) = self.signature_mut(sig_ref) {
                    sig.set_verified(true);
                }
                return res;
            }
            Ok(false) => warn!("bad signature at {:?} on {}", sig_ref.site, sig_ref.key),
            Err(err) => warn!(
                "could not verify signature at {:?} on {}: {}",
                sig_ref.site, sig_ref.key, err
            ),
        }

        if let Some(sig) = self.signature_mut(sig_ref) {
            sig.set_verified(false);
        }
        if let Some(key) = self.key_by_long_id_mut(&sig_ref.key) {
            if key.roll_back_revocation(sig_ref.site).is_some() {
                warn!("rolled back revocation at {:?} on {}", sig_ref.site, sig_ref.key);
            }
        }
        res
    }

    fn check_signature(&self, sig_ref: &SigRef) -> Result<bool> {
        let key = self.key_by_long_id(&sig_ref.key).ok_or(Error::MissingKey {
            key_id: sig_ref.key,
        })?;
        let cert = key
            .signature_at(sig_ref.site)
            .ok_or_else(|| format_err!("no signature at {:?}", sig_ref.site))?;
        let sig = cert.signature();
        let issuer = sig.issuer().ok_or_else(|| Error::Verification {
            message: format!("{:?} signature names no issuer", sig.typ()),
        })?;

        match sig_ref.site {
            SigSite::SubkeyBinding(i) | SigSite::SubkeyRevocation(i) => {
                if issuer != key.key_id() {
                    warn!("subkey signature issued by {} instead of {}", issuer, key.key_id());
                    return Ok(false);
                }
                let subkey = key
                    .subkeys()
                    .get(i)
                    .ok_or_else(|| format_err!("no subkey at {}", i))?;
                sig.verify_key_binding(key.public_key(), subkey.public_key())
            }
            SigSite::KeyRevocation | SigSite::Key(_) => {
                let signer = self.signer_key(key.public_key(), issuer)?;
                sig.verify_key(signer, key.public_key())
            }
            SigSite::User { user, .. } | SigSite::CertRevocation { user, .. } => {
                let signer = self.signer_key(key.public_key(), issuer)?;
                let binding = key
                    .users()
                    .get(user)
                    .ok_or_else(|| format_err!("no user binding at {}", user))?;
                sig.verify_certification(
                    signer,
                    key.public_key(),
                    binding.user().tag(),
                    binding.user().data(),
                )
            }
        }
    }

    fn signer_key<'a>(&'a self, own: &'a PublicKey, issuer: KeyId) -> Result<&'a PublicKey> {
        if own.key_id() == issuer {
            return Ok(own);
        }
        self.key_by_long_id(&issuer)
            .map(|k| k.public_key())
            .ok_or(Error::MissingKey { key_id: issuer })
    }

    /// Verifies the binding signature of `subkey` on the certificate `primary`.
    pub fn verify_binding_signature(&mut self, primary: &KeyId, subkey: &KeyId) -> Result<bool> {
        let key = self
            .key_by_long_id(primary)
            .ok_or(Error::MissingKey { key_id: *primary })?;
        let i = key
            .subkeys()
            .iter()
            .position(|s| s.key_id() == *subkey)
            .ok_or(Error::MissingKey { key_id: *subkey })?;
        if key.subkeys()[i].binding().is_none() {
            return Err(Error::Verification {
                message: format!("subkey {} has no binding signature", subkey),
            });
        }

        self.verify_signature(&SigRef {
            key: *primary,
            site: SigSite::SubkeyBinding(i),
        })
    }

    /// Runs every outstanding verification. Failures are logged and recorded on
    /// the signatures, signatures whose signer is unknown stay pending.
    ///
    /// Returns how many signatures verified.
    pub fn verify_all(&mut self) -> usize {
        let mut verified = 0;
        for sig_ref in self.sig_refs() {
            if !self.signature(&sig_ref).is_some_and(|s| s.is_pending()) {
                continue;
            }
            if let Ok(true) = self.verify_signature(&sig_ref) {
                verified += 1;
            }
        }
        debug!("verified {} signatures", verified);
        verified
    }
}
