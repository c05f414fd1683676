use log::debug;

use crate::keyring::{CertSignature, PrimaryKey, UserBinding};

impl PrimaryKey {
    /// Unions `other` into `self`: missing key halves, user bindings matched by
    /// their packet bytes, signatures matched by issuer, type and creation time,
    /// and subkeys matched by key id.
    ///
    /// Absorbing the same certificate again changes nothing.
    pub fn absorb(&mut self, mut other: PrimaryKey) {
        debug!("absorbing {} into {}", other.key_id(), self.key_id());
        self.merge_halves(&mut other);

        let (signatures, users, subkeys) = other.into_parts();

        merge_signatures(self.signatures_mut(), signatures);

        for binding in users {
            let existing = self.users_mut().iter_mut().find(|u| {
                u.user().tag() == binding.user().tag() && u.user().data() == binding.user().data()
            });
            match existing {
                Some(existing) => merge_binding(existing, binding),
                None => self.users_mut().push(binding),
            }
        }

        for subkey in subkeys {
            let id = subkey.key_id();
            match self.subkeys_mut().iter_mut().find(|s| s.key_id() == id) {
                Some(existing) => existing.merge_halves(subkey),
                None => self.subkeys_mut().push(subkey),
            }
        }

        self.mark_key_pair_trust();
    }
}

fn merge_binding(existing: &mut UserBinding, other: UserBinding) {
    let (_, signatures) = other.into_parts();
    merge_signatures(existing.signatures_mut(), signatures);
}

fn merge_signatures(into: &mut Vec<CertSignature>, from: Vec<CertSignature>) {
    for mut sig in from {
        let key = sig.dedup_key();
        match into.iter_mut().find(|s| s.dedup_key() == key) {
            Some(existing) => {
                if !existing.is_revoked() {
                    if let Some(rev) = sig.take_revocation() {
                        existing.set_revocation(rev);
                    }
                }
            }
            None => into.push(sig),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::crypto::hash::HashAlgorithm;
    use crate::crypto::public_key::PublicKeyAlgorithm;
    use crate::keygen::{generate_key, KeyGenParamsBuilder};
    use crate::keyring::{parse_keyring, UserPacket};
    use crate::packet::{
        PublicKey, Signature, SignatureConfig, SignatureType, Subpacket, SubpacketData, UserId,
    };
    use crate::types::{KeyVersion, Mpi, OwnerTrust, PublicParams, TrustByte};

    fn primary() -> PrimaryKey {
        let created = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let public = PublicKey::new(
            KeyVersion::V4,
            PublicKeyAlgorithm::RSA,
            created,
            None,
            PublicParams::Rsa {
                n: Mpi::from_slice(&[0xC5; 64]),
                e: Mpi::from_slice(&[0x01, 0x00, 0x01]),
            },
        )
        .unwrap();
        PrimaryKey::from_public(public, TrustByte::default())
    }

    fn self_cert(key: &PrimaryKey) -> CertSignature {
        let created = Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap();
        let config = SignatureConfig::new_v4(
            SignatureType::CertPositive,
            PublicKeyAlgorithm::RSA,
            HashAlgorithm::Sha1,
            vec![Subpacket::regular(SubpacketData::SignatureCreationTime(created)).unwrap()],
            vec![Subpacket::regular(SubpacketData::Issuer(key.key_id())).unwrap()],
        );
        CertSignature::new(Signature::from_config(config, [0, 0], vec![Mpi::from_slice(&[1])]).unwrap())
    }

    fn certificate() -> PrimaryKey {
        let mut key = primary();
        let sig = self_cert(&key);
        let mut binding = UserBinding::new(
            UserPacket::Id(UserId::from_str("Alice <alice@example.org>").unwrap()),
            TrustByte::default(),
        );
        binding.signatures_mut().push(sig);
        key.users_mut().push(binding);
        key
    }

    #[test]
    fn test_absorb_idempotent() {
        let mut once = certificate();
        once.absorb(certificate());

        let mut twice = once.clone();
        twice.absorb(certificate());

        assert_eq!(once, twice);
        assert_eq!(twice.users().len(), 1);
        assert_eq!(twice.users()[0].signatures().len(), 1);
    }

    #[test]
    fn test_absorb_new_user() {
        let mut key = certificate();
        let mut other = primary();
        other.users_mut().push(UserBinding::new(
            UserPacket::Id(UserId::from_str("Alice <alice@work.example>").unwrap()),
            TrustByte::default(),
        ));
        key.absorb(other);

        assert_eq!(key.users().len(), 2);
        assert_eq!(key.users()[0].signatures().len(), 1);
        assert!(key.users()[1].signatures().is_empty());
    }

    #[test]
    fn test_absorb_secret_idempotent() {
        let params = KeyGenParamsBuilder::default()
            .bits(1024)
            .primary_user_id("Alice <alice@example.org>")
            .subkey(true)
            .build()
            .unwrap();
        let pair = generate_key(&params, &mut ChaCha8Rng::seed_from_u64(3)).unwrap();
        let public = parse_keyring(pair.to_public_bytes(false).unwrap())
            .unwrap()
            .remove(0);
        assert!(!public.is_key_pair());

        let mut once = public.clone();
        once.absorb(pair.clone());
        let mut twice = once.clone();
        twice.absorb(pair.clone());

        assert_eq!(once, twice);
        assert!(twice.is_key_pair());
        assert_eq!(twice.secret_key(), pair.secret_key());
        assert_eq!(twice.users().len(), 1);
        assert_eq!(twice.users()[0].signatures().len(), 1);
        assert_eq!(twice.subkeys().len(), 1);
        assert!(twice.subkeys()[0].is_key_pair());
        assert_eq!(twice.owner_trust(), OwnerTrust::Ultimate);
        assert!(twice.trust().is_buckstop());
    }
}
