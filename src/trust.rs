//! # Trust module
//!
//! PGP 2.6 style web of trust. Owner trust set on keys flows onto the
//! certifications those keys made, and the certifications on a user binding
//! decide how legitimate that binding is.

use std::collections::HashMap;

use derive_builder::Builder;
use log::{debug, info};

use crate::errors::{Error, Result};
use crate::keyring::{CertSignature, KeyStore, SigRef, SigSite};
use crate::types::{KeyId, KeyLegitimacy, OwnerTrust, TrustByte};

/// Thresholds of the trust computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Builder)]
#[builder(build_fn(validate = "Self::validate", error = "Error"))]
pub struct TrustModel {
    /// Completely trusted certifications that make a binding legitimate.
    #[builder(default = "1")]
    completes_needed: u8,
    /// Marginally trusted certifications that make a binding legitimate.
    #[builder(default = "2")]
    marginals_needed: u8,
    /// Upper bound on the depth of trust signature chains.
    #[builder(default = "2")]
    max_chain_depth: u8,
}

impl TrustModelBuilder {
    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("completes_needed", self.completes_needed),
            ("marginals_needed", self.marginals_needed),
            ("max_chain_depth", self.max_chain_depth),
        ] {
            if value == Some(0) {
                return Err(Error::Message {
                    message: format!("{name} must be at least 1"),
                });
            }
        }
        Ok(())
    }
}

impl Default for TrustModel {
    fn default() -> Self {
        TrustModel {
            completes_needed: 1,
            marginals_needed: 2,
            max_chain_depth: 2,
        }
    }
}

impl TrustModel {
    pub fn completes_needed(&self) -> u8 {
        self.completes_needed
    }

    pub fn marginals_needed(&self) -> u8 {
        self.marginals_needed
    }

    pub fn max_chain_depth(&self) -> u8 {
        self.max_chain_depth
    }

    /// Legitimacy of a binding on the key `owner` from the trust already
    /// assigned to its certifications.
    ///
    /// Self certifications only count for key pairs.
    pub fn legitimacy(
        &self,
        owner: &KeyId,
        key_pair: bool,
        signatures: &[CertSignature],
    ) -> KeyLegitimacy {
        let cn = u32::from(self.completes_needed);
        let mn = u32::from(self.marginals_needed);
        let mut completes = 0u32;
        let mut marginals = 0u32;

        for sig in signatures {
            if !sig.signature().is_certification() || sig.is_revoked() {
                continue;
            }
            if sig.issuer() == Some(*owner) && !key_pair {
                continue;
            }
            match sig.trust().owner_trust() {
                OwnerTrust::Ultimate => return KeyLegitimacy::Complete,
                OwnerTrust::AlwaysTrusted => completes += 1,
                OwnerTrust::UsuallyTrusted => marginals += 1,
                _ => {}
            }
            if completes >= cn || marginals >= mn {
                return KeyLegitimacy::Complete;
            }
        }

        if completes * mn + marginals * cn >= cn * mn {
            KeyLegitimacy::Complete
        } else if completes > 0 || marginals > 0 {
            KeyLegitimacy::Marginal
        } else {
            KeyLegitimacy::NotTrusted
        }
    }
}

/// Signatures by the long key id of their issuer.
type SigIndex = HashMap<KeyId, Vec<SigRef>>;

/// Runs the trust computation over a [`KeyStore`].
#[derive(Debug, Clone, Default)]
pub struct TrustEngine {
    model: TrustModel,
}

impl TrustEngine {
    pub fn new(model: TrustModel) -> Self {
        TrustEngine { model }
    }

    pub fn model(&self) -> &TrustModel {
        &self.model
    }

    /// Recomputes every derived trust value of the store.
    pub fn refresh(&self, store: &mut KeyStore) {
        // revocations must be settled before trust flows
        store.verify_all();

        let mut index = build_index(store);

        // most trusted roots first, ties by key id
        let mut roots: Vec<(OwnerTrust, KeyId)> = store
            .key_pairs()
            .filter(|k| !k.is_revoked())
            .map(|k| (k.owner_trust(), k.key_id()))
            .collect();
        roots.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        for (_, root) in roots {
            debug!("walking trust from {}", root);
            self.walk(
                store,
                &mut index,
                root,
                self.model.max_chain_depth.saturating_add(1),
                OwnerTrust::Ultimate,
            );
        }

        copy_owner_trust(store, &index);
        self.roll_up(store);
        info!("trust refreshed for {} certificates", store.len());
    }

    /// Assigns trust to the certifications `signer` made, following trust
    /// signatures down to `depth` levels.
    ///
    /// A signer whose owner trust is undefined does not cap the carried value.
    /// The first visit of a signer settles its certifications; later paths to
    /// the same signer leave them alone, so roots are walked in a fixed order.
    fn walk(
        &self,
        store: &mut KeyStore,
        index: &mut SigIndex,
        signer: KeyId,
        depth: u8,
        carry: OwnerTrust,
    ) {
        if depth == 0 {
            return;
        }
        let Some(key) = store.key_by_long_id(&signer) else {
            return;
        };
        let revoked = key.is_revoked();
        let cap = match key.owner_trust() {
            OwnerTrust::Undefined => OwnerTrust::Ultimate,
            trust => trust,
        };
        let Some(refs) = index.get_mut(&signer) else {
            return;
        };

        let (chain, rest): (Vec<SigRef>, Vec<SigRef>) = refs.drain(..).partition(|r| {
            r.key != signer
                && store
                    .signature(r)
                    .is_some_and(|s| s.signature().is_certification())
        });
        *refs = rest;

        for sig_ref in chain {
            let Some(sig) = store.signature(&sig_ref) else {
                continue;
            };
            let delegation = sig.signature().trust_signature();
            let usable = !revoked && sig.is_verified() && !sig.is_revoked();

            let value = if usable {
                delegation
                    .map(|(_, amount)| OwnerTrust::from_trust_amount(amount))
                    .unwrap_or(OwnerTrust::Ultimate)
                    .min(cap)
                    .min(carry)
            } else {
                OwnerTrust::NotUsuallyTrusted
            };
            if let Some(sig) = store.signature_mut(&sig_ref) {
                sig.trust_mut().set_owner_trust(value);
            }

            if let (true, Some((declared, _))) = (usable, delegation) {
                let next = (depth - 1).min(declared);
                debug!("trust signature on {} carries {} to depth {}", sig_ref.key, value, next);
                self.walk(store, index, sig_ref.key, next, value);
            }
        }
    }

    /// Derives binding legitimacy and subkey trust.
    fn roll_up(&self, store: &mut KeyStore) {
        for key in store.keys_mut() {
            let owner = key.key_id();
            let key_pair = key.is_key_pair();
            for binding in key.users_mut() {
                let legitimacy = self.model.legitimacy(&owner, key_pair, binding.signatures());
                binding.trust_mut().set_legitimacy(legitimacy);
            }

            for subkey in key.subkeys_mut() {
                let trust = match subkey.binding() {
                    Some(b) if !subkey.is_revoked() && b.is_verified() => b.trust().owner_trust(),
                    _ => OwnerTrust::NotUsuallyTrusted,
                };
                subkey.trust_mut().set_owner_trust(trust);
            }
        }
    }

    /// Sets the owner trust of `key_id` and recomputes the store.
    ///
    /// `value` is a raw owner trust code, the reserved codes 3 and 4 are refused.
    pub fn apply_trust(&self, store: &mut KeyStore, key_id: &KeyId, value: u8) -> Result<()> {
        let trust = OwnerTrust::try_from(value)?;
        let key = store
            .key_by_long_id_mut(key_id)
            .ok_or(Error::MissingKey { key_id: *key_id })?;

        let mut byte = TrustByte::default();
        byte.set_owner_trust(trust);
        byte.set_revoked(key.is_revoked());
        byte.set_buckstop(key.secret_key().is_some());
        *key.trust_mut() = byte;
        info!("owner trust of {} set to {}", key_id, trust);

        self.refresh(store);
        Ok(())
    }

    /// Forgets the owner trust of every key that is not a key pair, then
    /// recomputes the store.
    pub fn clear_trust(&self, store: &mut KeyStore) {
        for key in store.keys_mut().iter_mut().filter(|k| !k.is_key_pair()) {
            key.trust_mut().set_owner_trust(OwnerTrust::Undefined);
        }
        self.refresh(store);
    }
}

fn build_index(store: &KeyStore) -> SigIndex {
    let mut index = SigIndex::new();
    for sig_ref in store.sig_refs() {
        if matches!(sig_ref.site, SigSite::CertRevocation { .. }) {
            continue;
        }
        if let Some(issuer) = store.signature(&sig_ref).and_then(CertSignature::issuer) {
            index.entry(issuer).or_default().push(sig_ref);
        }
    }
    index
}

/// Signatures the chain walk did not reach take their signer's owner trust.
fn copy_owner_trust(store: &mut KeyStore, index: &SigIndex) {
    for (signer, refs) in index {
        let owner_trust = store
            .key_by_long_id(signer)
            .map(|k| k.owner_trust())
            .unwrap_or_default();
        for sig_ref in refs {
            let Some(sig) = store.signature_mut(sig_ref) else {
                continue;
            };
            let value = if !sig.is_verified() || sig.is_revoked() {
                OwnerTrust::NotUsuallyTrusted
            } else {
                owner_trust
            };
            sig.trust_mut().set_owner_trust(value);
        }
    }
}
