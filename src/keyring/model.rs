use chrono::{DateTime, Utc};
use log::warn;

use crate::errors::Result;
use crate::packet::{
    PublicKey, PublicSubkey, SecretKey, SecretSubkey, Signature, SignatureType, UserAttribute,
    UserId,
};
use crate::types::{
    Fingerprint, KeyId, KeyLegitimacy, OwnerTrust, PublicKeyTrait, ShortKeyId, Tag, TrustByte,
};
use crate::util::now;

/// Where a signature sits inside a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigSite {
    /// A direct signature on the primary key.
    Key(usize),
    KeyRevocation,
    /// A certification on a user id or attribute.
    User { user: usize, sig: usize },
    /// The revocation attached to a certification.
    CertRevocation { user: usize, sig: usize },
    SubkeyBinding(usize),
    SubkeyRevocation(usize),
}

/// Addresses one signature in a [`KeyStore`](super::KeyStore).
///
/// Indices are positions at the time the reference was taken; removing keys,
/// user bindings or signatures invalidates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SigRef {
    pub key: KeyId,
    pub site: SigSite,
}

/// Who made a signature, as far as the store knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignerRef {
    /// Not resolved: the signer is shown by its raw key id only.
    #[default]
    Unresolved,
    /// Made by the certificate the signature belongs to.
    SelfSigned,
    /// Made by the primary key of another certificate in the store.
    Key(KeyId),
}

/// Cryptographic state of a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SigState {
    #[default]
    Unverified,
    Verified,
}

/// A signature together with its local keyring state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertSignature {
    signature: Signature,
    trust: TrustByte,
    state: SigState,
    /// A check ran and did not succeed.
    failed: bool,
    revocation: Option<Box<CertSignature>>,
    signer: SignerRef,
}

impl CertSignature {
    pub fn new(signature: Signature) -> Self {
        Self::with_trust(signature, TrustByte::default())
    }

    pub fn with_trust(signature: Signature, trust: TrustByte) -> Self {
        CertSignature {
            signature,
            trust,
            state: SigState::Unverified,
            failed: false,
            revocation: None,
            signer: SignerRef::Unresolved,
        }
    }

    /// A signature this keyring just made, so already known to be good.
    pub(crate) fn created_here(signature: Signature, signer: SignerRef) -> Self {
        CertSignature {
            state: SigState::Verified,
            signer,
            ..Self::new(signature)
        }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn typ(&self) -> SignatureType {
        self.signature.typ()
    }

    pub fn issuer(&self) -> Option<KeyId> {
        self.signature.issuer()
    }

    pub fn created(&self) -> Option<&DateTime<Utc>> {
        self.signature.created()
    }

    pub fn trust(&self) -> TrustByte {
        self.trust
    }

    pub(crate) fn trust_mut(&mut self) -> &mut TrustByte {
        &mut self.trust
    }

    pub fn state(&self) -> SigState {
        self.state
    }

    pub fn is_verified(&self) -> bool {
        self.state == SigState::Verified
    }

    /// Verification was attempted and did not succeed.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Still waiting for a verification attempt.
    pub(crate) fn is_pending(&self) -> bool {
        self.state == SigState::Unverified && !self.failed
    }

    pub(crate) fn set_verified(&mut self, ok: bool) {
        if ok {
            self.state = SigState::Verified;
            self.failed = false;
        } else {
            self.state = SigState::Unverified;
            self.failed = true;
        }
    }

    pub fn is_revoked(&self) -> bool {
        self.revocation.is_some()
    }

    pub fn revocation(&self) -> Option<&CertSignature> {
        self.revocation.as_deref()
    }

    pub(crate) fn revocation_mut(&mut self) -> Option<&mut CertSignature> {
        self.revocation.as_deref_mut()
    }

    pub(crate) fn set_revocation(&mut self, revocation: CertSignature) {
        self.trust.set_revoked(true);
        self.revocation = Some(Box::new(revocation));
    }

    pub(crate) fn take_revocation(&mut self) -> Option<CertSignature> {
        self.trust.set_revoked(false);
        self.revocation.take().map(|r| *r)
    }

    pub fn signer(&self) -> SignerRef {
        self.signer
    }

    pub(crate) fn set_signer(&mut self, signer: SignerRef) {
        self.signer = signer;
    }

    pub fn is_self_signature(&self) -> bool {
        self.signer == SignerRef::SelfSigned
    }

    /// Signatures considered the same when keyrings are merged.
    pub(crate) fn dedup_key(&self) -> (Option<KeyId>, SignatureType, Option<DateTime<Utc>>) {
        (self.issuer(), self.typ(), self.created().copied())
    }

    /// Attaches a certification revocation to the most recent earlier
    /// certification by the same signer that is not revoked yet.
    ///
    /// Hands the revocation back when nothing in `list` matches.
    pub(crate) fn revoke_in(
        list: &mut [CertSignature],
        revocation: CertSignature,
    ) -> std::result::Result<(), CertSignature> {
        let (Some(issuer), Some(revoked_at)) = (revocation.issuer(), revocation.created().copied())
        else {
            return Err(revocation);
        };

        let target = list
            .iter_mut()
            .filter(|s| {
                s.signature.is_certification()
                    && !s.is_revoked()
                    && s.issuer() == Some(issuer)
                    && s.created().is_some_and(|c| *c < revoked_at)
            })
            .max_by_key(|s| s.created().copied());

        match target {
            Some(target) => {
                target.set_revocation(revocation);
                Ok(())
            }
            None => Err(revocation),
        }
    }
}

/// The packet a user binding is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserPacket {
    Id(UserId),
    Attribute(UserAttribute),
}

impl UserPacket {
    pub fn tag(&self) -> Tag {
        match self {
            Self::Id(_) => Tag::UserId,
            Self::Attribute(_) => Tag::UserAttribute,
        }
    }

    /// The bytes certifications are computed over.
    pub fn data(&self) -> &[u8] {
        match self {
            Self::Id(id) => id.id(),
            Self::Attribute(attr) => attr.data(),
        }
    }
}

/// A user id or attribute with its certifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserBinding {
    user: UserPacket,
    trust: TrustByte,
    signatures: Vec<CertSignature>,
}

impl UserBinding {
    pub fn new(user: UserPacket, trust: TrustByte) -> Self {
        UserBinding {
            user,
            trust,
            signatures: Vec::new(),
        }
    }

    pub fn user(&self) -> &UserPacket {
        &self.user
    }

    pub fn user_id(&self) -> Option<&UserId> {
        match &self.user {
            UserPacket::Id(id) => Some(id),
            UserPacket::Attribute(_) => None,
        }
    }

    pub fn is_attribute(&self) -> bool {
        matches!(self.user, UserPacket::Attribute(_))
    }

    pub(crate) fn into_parts(self) -> (UserPacket, Vec<CertSignature>) {
        (self.user, self.signatures)
    }

    /// Display string: the user id, or a placeholder for attributes.
    pub fn id_string(&self) -> String {
        match &self.user {
            UserPacket::Id(id) => id.as_str(),
            UserPacket::Attribute(attr) if attr.is_image() => "[image]".to_string(),
            UserPacket::Attribute(_) => "[attribute]".to_string(),
        }
    }

    pub fn trust(&self) -> TrustByte {
        self.trust
    }

    pub(crate) fn trust_mut(&mut self) -> &mut TrustByte {
        &mut self.trust
    }

    pub fn legitimacy(&self) -> KeyLegitimacy {
        self.trust.legitimacy()
    }

    pub fn signatures(&self) -> &[CertSignature] {
        &self.signatures
    }

    pub(crate) fn signatures_mut(&mut self) -> &mut Vec<CertSignature> {
        &mut self.signatures
    }

    /// The self certification queries rely on: the most recent one that is not
    /// revoked, later entries winning ties.
    pub fn authoritative_self_signature(&self, key_id: &KeyId) -> Option<&CertSignature> {
        self.signatures
            .iter()
            .filter(|s| {
                s.signature.is_certification() && s.issuer() == Some(*key_id) && !s.is_revoked()
            })
            .max_by_key(|s| s.created().copied())
    }

    /// The most recent self certification has been revoked.
    pub fn is_self_sig_revoked(&self, key_id: &KeyId) -> bool {
        self.signatures
            .iter()
            .filter(|s| s.signature.is_certification() && s.issuer() == Some(*key_id))
            .max_by_key(|s| s.created().copied())
            .is_some_and(CertSignature::is_revoked)
    }
}

/// A subkey with its binding signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subkey {
    public: PublicSubkey,
    secret: Option<SecretSubkey>,
    has_public: bool,
    trust: TrustByte,
    binding: Option<CertSignature>,
    revocation: Option<CertSignature>,
}

impl Subkey {
    pub fn from_public(public: PublicSubkey, trust: TrustByte) -> Self {
        Subkey {
            public,
            secret: None,
            has_public: true,
            trust,
            binding: None,
            revocation: None,
        }
    }

    pub fn from_secret(secret: SecretSubkey, trust: TrustByte) -> Result<Self> {
        Ok(Subkey {
            public: secret.public_key()?,
            secret: Some(secret),
            has_public: false,
            trust,
            binding: None,
            revocation: None,
        })
    }

    pub fn key_id(&self) -> KeyId {
        self.public.key_id()
    }

    pub fn public_key(&self) -> &PublicSubkey {
        &self.public
    }

    pub fn secret_key(&self) -> Option<&SecretSubkey> {
        self.secret.as_ref()
    }

    pub fn is_key_pair(&self) -> bool {
        self.has_public && self.secret.is_some()
    }

    pub fn trust(&self) -> TrustByte {
        self.trust
    }

    pub(crate) fn trust_mut(&mut self) -> &mut TrustByte {
        &mut self.trust
    }

    pub fn binding(&self) -> Option<&CertSignature> {
        self.binding.as_ref()
    }

    pub(crate) fn binding_mut(&mut self) -> Option<&mut CertSignature> {
        self.binding.as_mut()
    }

    /// Installs a subkey binding, the newest one wins when there are several.
    pub(crate) fn set_binding(&mut self, sig: CertSignature) {
        if let Some(existing) = &self.binding {
            warn!(
                "subkey {} carries more than one binding signature, keeping the newest",
                self.key_id()
            );
            if existing.created() > sig.created() {
                return;
            }
        }
        self.binding = Some(sig);
    }

    pub fn is_revoked(&self) -> bool {
        self.revocation.is_some()
    }

    pub fn revocation(&self) -> Option<&CertSignature> {
        self.revocation.as_ref()
    }

    pub(crate) fn revocation_mut(&mut self) -> Option<&mut CertSignature> {
        self.revocation.as_mut()
    }

    pub(crate) fn set_revocation(&mut self, revocation: CertSignature) {
        self.trust.set_revoked(true);
        self.revocation = Some(revocation);
    }

    pub(crate) fn take_revocation(&mut self) -> Option<CertSignature> {
        self.trust.set_revoked(false);
        self.revocation.take()
    }

    pub(crate) fn merge_halves(&mut self, other: Subkey) {
        if !self.has_public && other.has_public {
            self.public = other.public;
            self.has_public = true;
        }
        if self.secret.is_none() {
            self.secret = other.secret;
        }
        if self.binding.is_none() {
            self.binding = other.binding;
        }
        if self.revocation.is_none() {
            if let Some(rev) = other.revocation {
                self.set_revocation(rev);
            }
        }
    }
}

/// A certificate: a primary key with its user bindings, subkeys and signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKey {
    public: PublicKey,
    secret: Option<SecretKey>,
    has_public: bool,
    trust: TrustByte,
    revocation: Option<CertSignature>,
    signatures: Vec<CertSignature>,
    users: Vec<UserBinding>,
    subkeys: Vec<Subkey>,
}

impl PrimaryKey {
    pub fn from_public(public: PublicKey, trust: TrustByte) -> Self {
        PrimaryKey {
            public,
            secret: None,
            has_public: true,
            trust,
            revocation: None,
            signatures: Vec::new(),
            users: Vec::new(),
            subkeys: Vec::new(),
        }
    }

    pub fn from_secret(secret: SecretKey, trust: TrustByte) -> Result<Self> {
        Ok(PrimaryKey {
            public: secret.public_key()?,
            secret: Some(secret),
            has_public: false,
            trust,
            revocation: None,
            signatures: Vec::new(),
            users: Vec::new(),
            subkeys: Vec::new(),
        })
    }

    /// A freshly generated key: both halves present, ultimately trusted.
    pub(crate) fn from_key_pair(secret: SecretKey) -> Result<Self> {
        let mut key = Self::from_secret(secret, TrustByte::default())?;
        key.has_public = true;
        key.mark_key_pair_trust();
        Ok(key)
    }

    pub fn key_id(&self) -> KeyId {
        self.public.key_id()
    }

    pub fn short_key_id(&self) -> ShortKeyId {
        self.key_id().short()
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.public.fingerprint()
    }

    pub fn created_at(&self) -> &DateTime<Utc> {
        self.public.created_at()
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub fn secret_key(&self) -> Option<&SecretKey> {
        self.secret.as_ref()
    }

    /// Was the public half read from a public keyring (or generated here)?
    pub fn has_public(&self) -> bool {
        self.has_public
    }

    /// Both halves are present: the keyring owner holds this key.
    pub fn is_key_pair(&self) -> bool {
        self.has_public && self.secret.is_some()
    }

    pub fn trust(&self) -> TrustByte {
        self.trust
    }

    pub(crate) fn trust_mut(&mut self) -> &mut TrustByte {
        &mut self.trust
    }

    pub fn owner_trust(&self) -> OwnerTrust {
        self.trust.owner_trust()
    }

    /// Key pairs are ultimately trusted and stop the trust walk, whatever trust
    /// byte they were read with. Only an explicit `apply_trust` lowers this.
    pub(crate) fn mark_key_pair_trust(&mut self) {
        if self.is_key_pair() {
            self.trust.set_owner_trust(OwnerTrust::Ultimate);
            self.trust.set_buckstop(true);
        }
    }

    pub fn is_revoked(&self) -> bool {
        self.revocation.is_some()
    }

    pub fn revocation(&self) -> Option<&CertSignature> {
        self.revocation.as_ref()
    }

    pub(crate) fn revocation_mut(&mut self) -> Option<&mut CertSignature> {
        self.revocation.as_mut()
    }

    /// Marks the key revoked. Only the key itself may revoke it, anything else
    /// is ignored with a warning.
    pub(crate) fn set_revocation(&mut self, revocation: CertSignature) {
        if revocation.issuer() != Some(self.key_id()) {
            warn!(
                "ignoring revocation of {} issued by {:?}",
                self.key_id(),
                revocation.issuer()
            );
            return;
        }
        if self.revocation.is_some() {
            warn!("{} is already revoked, ignoring another revocation", self.key_id());
            return;
        }
        self.trust.set_revoked(true);
        self.revocation = Some(revocation);
    }

    pub(crate) fn take_revocation(&mut self) -> Option<CertSignature> {
        self.trust.set_revoked(false);
        self.revocation.take()
    }

    /// Direct signatures on the primary key, other than its revocation.
    pub fn signatures(&self) -> &[CertSignature] {
        &self.signatures
    }

    pub(crate) fn signatures_mut(&mut self) -> &mut Vec<CertSignature> {
        &mut self.signatures
    }

    pub fn users(&self) -> &[UserBinding] {
        &self.users
    }

    pub(crate) fn users_mut(&mut self) -> &mut Vec<UserBinding> {
        &mut self.users
    }

    /// Only the user ids, no attributes.
    pub fn user_ids(&self) -> impl Iterator<Item = &UserId> {
        self.users.iter().filter_map(UserBinding::user_id)
    }

    pub fn subkeys(&self) -> &[Subkey] {
        &self.subkeys
    }

    pub(crate) fn subkeys_mut(&mut self) -> &mut Vec<Subkey> {
        &mut self.subkeys
    }

    /// The binding whose authoritative self certification carries the primary
    /// flag, the most recent one winning. Falls back to the first user id.
    pub fn primary_user(&self) -> Option<&UserBinding> {
        let key_id = self.key_id();
        let now = now();

        self.users
            .iter()
            .filter(|u| !u.is_attribute())
            .filter_map(|u| u.authoritative_self_signature(&key_id).map(|s| (u, s)))
            .filter(|(_, s)| {
                s.signature().is_primary()
                    && !s.is_failed()
                    && !s.signature().is_expired_at(&now)
            })
            .max_by_key(|(_, s)| s.created().copied())
            .map(|(u, _)| u)
            .or_else(|| self.users.iter().find(|u| !u.is_attribute()))
    }

    pub fn primary_user_id(&self) -> Option<String> {
        self.primary_user().map(UserBinding::id_string)
    }

    /// When the key stops being valid, `None` if it never expires.
    ///
    /// V3 keys carry their validity in the key packet, V4 keys in the
    /// authoritative self certification of the primary user id.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        if let Some(expires) = self.public.v3_expires_at() {
            return Some(expires);
        }
        let validity = self
            .primary_user()?
            .authoritative_self_signature(&self.key_id())?
            .signature()
            .key_expiration_time()
            .copied()?;
        if validity.is_zero() {
            return None;
        }
        Some(*self.created_at() + validity)
    }

    pub fn is_expired_at(&self, at: &DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|e| e <= *at)
    }

    pub(crate) fn into_parts(self) -> (Vec<CertSignature>, Vec<UserBinding>, Vec<Subkey>) {
        (self.signatures, self.users, self.subkeys)
    }

    pub(crate) fn merge_halves(&mut self, other: &mut PrimaryKey) {
        if !self.has_public && other.has_public {
            self.public = other.public.clone();
            self.has_public = true;
        }
        if self.secret.is_none() {
            self.secret = other.secret.take();
        }
        if self.revocation.is_none() {
            if let Some(rev) = other.revocation.take() {
                self.set_revocation(rev);
            }
        }
    }
}

impl PrimaryKey {
    pub fn signature_at(&self, site: SigSite) -> Option<&CertSignature> {
        match site {
            SigSite::Key(i) => self.signatures.get(i),
            SigSite::KeyRevocation => self.revocation.as_ref(),
            SigSite::User { user, sig } => self.users.get(user)?.signatures.get(sig),
            SigSite::CertRevocation { user, sig } => {
                self.users.get(user)?.signatures.get(sig)?.revocation()
            }
            SigSite::SubkeyBinding(i) => self.subkeys.get(i)?.binding.as_ref(),
            SigSite::SubkeyRevocation(i) => self.subkeys.get(i)?.revocation.as_ref(),
        }
    }

    pub(crate) fn signature_at_mut(&mut self, site: SigSite) -> Option<&mut CertSignature> {
        match site {
            SigSite::Key(i) => self.signatures.get_mut(i),
            SigSite::KeyRevocation => self.revocation.as_mut(),
            SigSite::User { user, sig } => self.users.get_mut(user)?.signatures.get_mut(sig),
            SigSite::CertRevocation { user, sig } => self
                .users
                .get_mut(user)?
                .signatures
                .get_mut(sig)?
                .revocation_mut(),
            SigSite::SubkeyBinding(i) => self.subkeys.get_mut(i)?.binding.as_mut(),
            SigSite::SubkeyRevocation(i) => self.subkeys.get_mut(i)?.revocation.as_mut(),
        }
    }

    /// Every signature of this certificate, revocations included.
    pub fn sig_sites(&self) -> Vec<SigSite> {
        let mut sites: Vec<_> = (0..self.signatures.len()).map(SigSite::Key).collect();
        if self.revocation.is_some() {
            sites.push(SigSite::KeyRevocation);
        }
        for (user, binding) in self.users.iter().enumerate() {
            for (sig, s) in binding.signatures.iter().enumerate() {
                sites.push(SigSite::User { user, sig });
                if s.is_revoked() {
                    sites.push(SigSite::CertRevocation { user, sig });
                }
            }
        }
        for (i, subkey) in self.subkeys.iter().enumerate() {
            if subkey.binding.is_some() {
                sites.push(SigSite::SubkeyBinding(i));
            }
            if subkey.revocation.is_some() {
                sites.push(SigSite::SubkeyRevocation(i));
            }
        }
        sites
    }

    /// Drops the revocation at `site`, if the site holds one.
    pub(crate) fn roll_back_revocation(&mut self, site: SigSite) -> Option<CertSignature> {
        match site {
            SigSite::KeyRevocation => self.take_revocation(),
            SigSite::CertRevocation { user, sig } => self
                .users
                .get_mut(user)?
                .signatures
                .get_mut(sig)?
                .take_revocation(),
            SigSite::SubkeyRevocation(i) => self.subkeys.get_mut(i)?.take_revocation(),
            _ => None,
        }
    }

    /// Treats both halves as read from the public keyring.
    pub(crate) fn mark_public_read(&mut self) {
        self.has_public = true;
        for subkey in &mut self.subkeys {
            subkey.has_public = true;
        }
        self.mark_key_pair_trust();
    }
}
