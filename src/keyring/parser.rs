use std::iter::Peekable;

use bytes::Bytes;
use log::{debug, warn};

use crate::errors::{Error, Result};
use crate::keyring::{CertSignature, PrimaryKey, Subkey, UserBinding, UserPacket};
use crate::packet::{Packet, PacketParser, PacketTrait, Signature, SignatureType};
use crate::types::{PublicKeyTrait, Tag, TrustByte};

/// Assembles a packet stream into certificates, following the keyring grammar:
///
/// ```text
/// Keyring       = {Certificate}.
/// Certificate   = PrimaryKey UserID {UserID} {UserAttribute} {Subkey}.
/// PrimaryKey    = (PublicKeyPkt | SecretKeyPkt) [TrustPkt] {Signature}.
/// UserID        = UserIDPkt [TrustPkt] {Signature}.
/// UserAttribute = UserAttributePkt [TrustPkt] {Signature}.
/// Subkey        = (PublicSubkeyPkt | SecretSubkeyPkt) [TrustPkt] Signature [Signature].
/// Signature     = SignaturePkt [TrustPkt].
/// ```
///
/// Any violation is a [`Error::KeyringStructure`] and ends the iteration, as do
/// packets that fail to decode. Marker packets are skipped.
pub struct KeyringParser<I: Iterator<Item = Result<Packet>>> {
    packets: Peekable<I>,
    done: bool,
}

impl KeyringParser<PacketParser> {
    pub fn from_bytes(input: impl Into<Bytes>) -> Self {
        Self::new(PacketParser::new(input))
    }
}

impl<I: Iterator<Item = Result<Packet>>> KeyringParser<I> {
    pub fn new(packets: I) -> Self {
        KeyringParser {
            packets: packets.peekable(),
            done: false,
        }
    }

    /// Looks at the tag of the next packet without consuming it.
    fn scan(&mut self) -> Result<Option<Tag>> {
        loop {
            if let Some(Err(err)) = self.packets.next_if(Result::is_err) {
                return Err(err);
            }
            match self.packets.peek() {
                Some(Ok(p)) if p.tag() == Tag::Marker => {
                    debug!("skipping marker packet");
                    self.packets.next();
                }
                Some(Ok(p)) => return Ok(Some(p.tag())),
                _ => return Ok(None),
            }
        }
    }

    /// Consumes the next packet, which must carry one of `tags`.
    fn expect(&mut self, expected: &'static str, tags: &[Tag]) -> Result<Packet> {
        let found = self.scan()?;
        match found {
            Some(tag) if tags.contains(&tag) => match self.packets.next() {
                Some(res) => res,
                None => Err(Error::KeyringStructure {
                    expected,
                    found: None,
                }),
            },
            found => Err(Error::KeyringStructure { expected, found }),
        }
    }

    fn optional_trust(&mut self) -> Result<TrustByte> {
        if self.scan()? != Some(Tag::Trust) {
            return Ok(TrustByte::default());
        }
        match self.expect("trust packet", &[Tag::Trust])? {
            Packet::Trust(trust) => Ok(trust.trust_byte()),
            _ => Ok(TrustByte::default()),
        }
    }

    /// `Signature = SignaturePkt [TrustPkt]`
    fn signature(&mut self, expected: &'static str) -> Result<CertSignature> {
        let sig = Signature::try_from(self.expect(expected, &[Tag::Signature])?)?;
        let trust = self.optional_trust()?;
        debug!("  signature {:?} by {:?}", sig.typ(), sig.issuer());
        Ok(CertSignature::with_trust(sig, trust))
    }

    fn signatures(&mut self, mut f: impl FnMut(CertSignature)) -> Result<()> {
        while self.scan()? == Some(Tag::Signature) {
            f(self.signature("signature packet")?);
        }
        Ok(())
    }

    fn user_binding(&mut self, key: &mut PrimaryKey, tag: Tag) -> Result<()> {
        let user = match self.expect("user id packet", &[tag])? {
            Packet::UserId(id) => UserPacket::Id(id),
            Packet::UserAttribute(attr) => UserPacket::Attribute(attr),
            other => {
                return Err(Error::KeyringStructure {
                    expected: "user id packet",
                    found: Some(other.tag()),
                })
            }
        };
        let trust = self.optional_trust()?;
        key.users_mut().push(UserBinding::new(user, trust));

        self.signatures(|sig| add_user_signature(key, sig))
    }

    fn subkey(&mut self, key: &mut PrimaryKey) -> Result<()> {
        let packet = self.expect(
            "subkey packet",
            &[Tag::PublicSubkey, Tag::SecretSubkey],
        )?;
        let trust = self.optional_trust()?;
        let mut subkey = match packet {
            Packet::PublicSubkey(p) => Subkey::from_public(p, trust),
            Packet::SecretSubkey(p) => Subkey::from_secret(p, trust)?,
            other => {
                return Err(Error::KeyringStructure {
                    expected: "subkey packet",
                    found: Some(other.tag()),
                })
            }
        };
        debug!(" subkey {}", subkey.key_id());

        let first = self.signature("subkey binding signature")?;
        add_subkey_signature(key, &mut subkey, first);
        if self.scan()? == Some(Tag::Signature) {
            let second = self.signature("signature packet")?;
            add_subkey_signature(key, &mut subkey, second);
        }
        if subkey.binding().is_none() {
            warn!("subkey {} has no binding signature", subkey.key_id());
        }

        key.subkeys_mut().push(subkey);
        Ok(())
    }

    fn certificate(&mut self) -> Result<PrimaryKey> {
        let packet = self.expect("public or secret key packet", &[Tag::PublicKey, Tag::SecretKey])?;
        let trust = self.optional_trust()?;
        let mut key = match packet {
            Packet::PublicKey(p) => PrimaryKey::from_public(p, trust),
            Packet::SecretKey(p) => PrimaryKey::from_secret(p, trust)?,
            other => {
                return Err(Error::KeyringStructure {
                    expected: "public or secret key packet",
                    found: Some(other.tag()),
                })
            }
        };
        debug!("certificate {}", key.key_id());

        self.signatures(|sig| add_key_signature(&mut key, sig))?;

        // at least one user id
        self.user_binding(&mut key, Tag::UserId)?;
        while self.scan()? == Some(Tag::UserId) {
            self.user_binding(&mut key, Tag::UserId)?;
        }
        while self.scan()? == Some(Tag::UserAttribute) {
            self.user_binding(&mut key, Tag::UserAttribute)?;
        }

        while self.scan()?.is_some_and(Tag::is_subkey) {
            if key.public_key().version().is_legacy() {
                warn!("{:?} key {} carries subkeys", key.public_key().version(), key.key_id());
            }
            self.subkey(&mut key)?;
        }

        Ok(key)
    }
}

impl<I: Iterator<Item = Result<Packet>>> Iterator for KeyringParser<I> {
    type Item = Result<PrimaryKey>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.scan() {
            Ok(None) => return None,
            Ok(Some(_)) => {}
            Err(err) => {
                self.done = true;
                return Some(Err(err));
            }
        }

        let res = self.certificate();
        if res.is_err() {
            self.done = true;
        }
        Some(res)
    }
}

/// Parses a whole keyring, failing on the first error.
pub fn parse_keyring(input: impl Into<Bytes>) -> Result<Vec<PrimaryKey>> {
    KeyringParser::from_bytes(input).collect()
}

/// Places a signature found after the primary key.
pub(crate) fn add_key_signature(key: &mut PrimaryKey, sig: CertSignature) {
    match sig.typ() {
        SignatureType::KeyRevocation => key.set_revocation(sig),
        SignatureType::CertRevocation => {
            if let Err(sig) = CertSignature::revoke_in(key.signatures_mut(), sig) {
                warn!("ignoring certification revocation by {:?}: nothing to revoke", sig.issuer());
            }
        }
        _ => key.signatures_mut().push(sig),
    }
}

/// Places a signature found after the last user id or attribute of `key`.
pub(crate) fn add_user_signature(key: &mut PrimaryKey, sig: CertSignature) {
    if sig.typ() == SignatureType::KeyRevocation {
        key.set_revocation(sig);
        return;
    }
    let Some(binding) = key.users_mut().last_mut() else {
        warn!("dropping {:?} signature without a user id", sig.typ());
        return;
    };
    if sig.typ() == SignatureType::CertRevocation {
        if let Err(sig) = CertSignature::revoke_in(binding.signatures_mut(), sig) {
            warn!(
                "ignoring certification revocation by {:?} on {:?}: no earlier certification",
                sig.issuer(),
                binding.id_string()
            );
        }
        return;
    }
    binding.signatures_mut().push(sig);
}

/// Places a signature found after a subkey.
pub(crate) fn add_subkey_signature(key: &PrimaryKey, subkey: &mut Subkey, sig: CertSignature) {
    match sig.typ() {
        SignatureType::SubkeyBinding => subkey.set_binding(sig),
        SignatureType::SubkeyRevocation if sig.issuer() == Some(key.key_id()) => {
            if subkey.is_revoked() {
                warn!("subkey {} is already revoked", subkey.key_id());
            } else {
                subkey.set_revocation(sig);
            }
        }
        SignatureType::SubkeyRevocation => warn!(
            "ignoring revocation of subkey {} issued by {:?}",
            subkey.key_id(),
            sig.issuer()
        ),
        typ => warn!("ignoring {:?} signature on subkey {}", typ, subkey.key_id()),
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn test_signature_before_key() {
        // a bare V3 signature packet: type 0x10, hashed length 5
        let raw = hex!(
            "88 16 03 05 10 5e0be100 0102030405060708 01 02 abcd 0008 ff"
        );
        let err = parse_keyring(raw.to_vec()).unwrap_err();
        assert!(err.is_keyring_structure(), "{:?}", err);
        assert!(matches!(
            err,
            Error::KeyringStructure {
                found: Some(Tag::Signature),
                ..
            }
        ));
    }

    #[test]
    fn test_empty_keyring() {
        assert!(parse_keyring(Vec::new()).unwrap().is_empty());
    }

    #[test]
    fn test_user_id_without_key() {
        let raw = hex!("b4 03 414243");
        let err = parse_keyring(raw.to_vec()).unwrap_err();
        assert!(matches!(
            err,
            Error::KeyringStructure {
                found: Some(Tag::UserId),
                ..
            }
        ));
    }
}
