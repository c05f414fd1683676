use std::collections::{BTreeMap, HashMap};

use log::{debug, info, warn};

use crate::errors::Result;
use crate::keyring::{
    parse_keyring, CertSignature, PrimaryKey, SigRef, SignerRef, UserBinding,
};
use crate::types::{KeyId, ShortKeyId};

/// All certificates of a keyring, indexed by long key id, short key id and
/// lowercased user id.
///
/// Mutation goes through `&mut self`; callers sharing a store between tasks
/// wrap it in a lock.
#[derive(Debug, Clone, Default)]
pub struct KeyStore {
    keys: Vec<PrimaryKey>,
    by_long_id: HashMap<KeyId, usize>,
    by_short_id: HashMap<ShortKeyId, Vec<usize>>,
    by_user_id: BTreeMap<String, Vec<usize>>,
}

impl KeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a public keyring and optionally the matching secret keyring,
    /// merges the two and resolves signers.
    pub fn from_keyrings(public: &[u8], secret: Option<&[u8]>) -> Result<Self> {
        let mut store = Self::new();
        for mut key in parse_keyring(public.to_vec())? {
            // secret key packets in the public stream still form a pair
            key.mark_public_read();
            store.insert_key(key);
        }
        if let Some(secret) = secret {
            store.merge_secret_keys(parse_keyring(secret.to_vec())?);
        }
        store.cross_reference();
        info!("loaded {} certificates", store.keys.len());

        Ok(store)
    }

    /// Adds a certificate, absorbing it into an existing one with the same key id.
    pub fn insert(&mut self, key: PrimaryKey) {
        self.insert_key(key);
        self.cross_reference();
    }

    fn insert_key(&mut self, key: PrimaryKey) {
        match self.by_long_id.get(&key.key_id()) {
            Some(&i) => {
                self.keys[i].absorb(key);
                self.reindex();
            }
            None => {
                debug!("adding {}", key.key_id());
                self.keys.push(key);
                self.reindex();
            }
        }
    }

    /// Merges certificates read from a secret keyring.
    ///
    /// A secret certificate is joined with the public one carrying the same
    /// key id and primary user id. Without such a counterpart the keyring is
    /// inconsistent and the secret certificate is dropped.
    pub fn merge_secret_keys(&mut self, secret_keys: Vec<PrimaryKey>) {
        for key in secret_keys {
            let id = key.key_id();
            let target = self.by_long_id.get(&id).copied().filter(|&i| {
                self.keys[i].primary_user_id() == key.primary_user_id()
            });
            match target {
                Some(i) => self.keys[i].absorb(key),
                None => warn!(
                    "dropping secret key {} ({:?}): no matching public key",
                    id,
                    key.primary_user_id()
                ),
            }
        }
        self.reindex();
    }

    pub fn remove(&mut self, key_id: &KeyId) -> Option<PrimaryKey> {
        let i = *self.by_long_id.get(key_id)?;
        let key = self.keys.remove(i);
        self.reindex();
        self.cross_reference();
        Some(key)
    }

    /// Rebuilds the lookup indices from the certificate list.
    pub(crate) fn reindex(&mut self) {
        self.by_long_id.clear();
        self.by_short_id.clear();
        self.by_user_id.clear();

        for (i, key) in self.keys.iter().enumerate() {
            self.by_long_id.insert(key.key_id(), i);
            self.by_short_id.entry(key.short_key_id()).or_default().push(i);
            for binding in key.users().iter().filter(|u| !u.is_attribute()) {
                self.by_user_id
                    .entry(binding.id_string().to_lowercase())
                    .or_default()
                    .push(i);
            }
        }
    }

    /// Resolves who made each signature: the certificate itself, another
    /// certificate of the store, or nobody known.
    pub fn cross_reference(&mut self) {
        let index = &self.by_long_id;
        let keys = &mut self.keys;

        for key in keys.iter_mut() {
            let own = key.key_id();
            for site in key.sig_sites() {
                let Some(sig) = key.signature_at_mut(site) else {
                    continue;
                };
                let signer = match sig.issuer() {
                    Some(issuer) if issuer == own => SignerRef::SelfSigned,
                    Some(issuer) if index.contains_key(&issuer) => SignerRef::Key(issuer),
                    _ => SignerRef::Unresolved,
                };
                sig.set_signer(signer);
            }
        }
    }

    pub fn all_keys(&self) -> &[PrimaryKey] {
        &self.keys
    }

    pub fn primary_keys(&self) -> impl Iterator<Item = &PrimaryKey> {
        self.keys.iter()
    }

    /// Certificates with both halves present.
    pub fn key_pairs(&self) -> impl Iterator<Item = &PrimaryKey> {
        self.keys.iter().filter(|k| k.is_key_pair())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn key_by_long_id(&self, key_id: &KeyId) -> Option<&PrimaryKey> {
        self.by_long_id.get(key_id).map(|&i| &self.keys[i])
    }

    pub(crate) fn key_by_long_id_mut(&mut self, key_id: &KeyId) -> Option<&mut PrimaryKey> {
        let i = *self.by_long_id.get(key_id)?;
        self.keys.get_mut(i)
    }

    pub(crate) fn keys_mut(&mut self) -> &mut [PrimaryKey] {
        &mut self.keys
    }

    pub fn keys_by_short_id(&self, short: &ShortKeyId) -> Vec<&PrimaryKey> {
        self.by_short_id
            .get(short)
            .map(|ix| ix.iter().map(|&i| &self.keys[i]).collect())
            .unwrap_or_default()
    }

    /// Certificates with a user id containing `query`, ignoring case.
    pub fn keys_by_user_id(&self, query: &str) -> Vec<&PrimaryKey> {
        let query = query.to_lowercase();
        let mut found: Vec<usize> = self
            .by_user_id
            .iter()
            .filter(|(id, _)| id.contains(&query))
            .flat_map(|(_, ix)| ix.iter().copied())
            .collect();
        found.sort_unstable();
        found.dedup();

        found.into_iter().map(|i| &self.keys[i]).collect()
    }

    pub fn user_ids_of(&self, key_id: &KeyId) -> &[UserBinding] {
        self.key_by_long_id(key_id)
            .map(PrimaryKey::users)
            .unwrap_or_default()
    }

    /// Certifications on the `user`th binding of a certificate.
    pub fn signatures_of(&self, key_id: &KeyId, user: usize) -> &[CertSignature] {
        self.user_ids_of(key_id)
            .get(user)
            .map(UserBinding::signatures)
            .unwrap_or_default()
    }

    pub fn signature(&self, sig: &SigRef) -> Option<&CertSignature> {
        self.key_by_long_id(&sig.key)?.signature_at(sig.site)
    }

    pub(crate) fn signature_mut(&mut self, sig: &SigRef) -> Option<&mut CertSignature> {
        self.key_by_long_id_mut(&sig.key)?.signature_at_mut(sig.site)
    }

    /// References to every signature in the store.
    pub fn sig_refs(&self) -> Vec<SigRef> {
        self.keys
            .iter()
            .flat_map(|key| {
                let key_id = key.key_id();
                key.sig_sites()
                    .into_iter()
                    .map(move |site| SigRef { key: key_id, site })
            })
            .collect()
    }

    /// The certificate that made a signature, if it is in the store.
    pub fn signer_of(&self, sig: &SigRef) -> Option<&PrimaryKey> {
        match self.signature(sig)?.signer() {
            SignerRef::SelfSigned => self.key_by_long_id(&sig.key),
            SignerRef::Key(id) => self.key_by_long_id(&id),
            SignerRef::Unresolved => None,
        }
    }
}
