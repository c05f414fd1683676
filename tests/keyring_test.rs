use chrono::{TimeZone, Utc};
use pgp_keyring::crypto::hash::HashAlgorithm;
use pgp_keyring::errors::Error;
use pgp_keyring::keygen::{generate_key, KeyGenParamsBuilder};
use pgp_keyring::keyring::{SigSite, SigState, SignerRef};
use pgp_keyring::packet::{Packet, PacketParser, Signature, SignatureConfig, SignatureType};
use pgp_keyring::ser::Serialize;
use pgp_keyring::types::{KeyId, KeyLegitimacy, Mpi, OwnerTrust};
use pgp_keyring::{KeyStore, PrimaryKey, SigRef, TrustEngine};
use pretty_assertions::assert_eq;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn key(seed: u64, user_id: &str, subkey: bool) -> PrimaryKey {
    let params = KeyGenParamsBuilder::default()
        .bits(1024)
        .primary_user_id(user_id)
        .created_at(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        .hash_alg(HashAlgorithm::Sha256)
        .subkey(subkey)
        .build()
        .unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    generate_key(&params, &mut rng).unwrap()
}

fn public_only(key: &PrimaryKey) -> PrimaryKey {
    let bytes = key.to_public_bytes(false).unwrap();
    let mut store = KeyStore::from_keyrings(&bytes, None).unwrap();
    store.remove(&key.key_id()).unwrap()
}

fn legitimacy(store: &KeyStore, key: &PrimaryKey) -> KeyLegitimacy {
    store.user_ids_of(&key.key_id())[0].legitimacy()
}

#[test]
fn test_end_to_end_public_keyring() {
    let _ = pretty_env_logger::try_init();
    let alice = key(1, "Alice <alice@example.org>", true);
    let bytes = alice.to_public_bytes(false).unwrap();

    let mut store = KeyStore::from_keyrings(&bytes, None).unwrap();
    assert_eq!(store.all_keys().len(), 1);

    let parsed = &store.all_keys()[0];
    assert_eq!(parsed.key_id(), alice.key_id());
    assert!(!parsed.is_key_pair());
    assert_eq!(
        parsed.primary_user_id().as_deref(),
        Some("Alice <alice@example.org>")
    );
    assert_eq!(
        parsed.users()[0].signatures()[0].signer(),
        SignerRef::SelfSigned
    );

    let subkey = &parsed.subkeys()[0];
    let subkey_id = subkey.key_id();
    assert_eq!(subkey.binding().unwrap().state(), SigState::Unverified);

    assert!(store
        .verify_binding_signature(&alice.key_id(), &subkey_id)
        .unwrap());
    let subkey = &store.all_keys()[0].subkeys()[0];
    assert_eq!(subkey.binding().unwrap().state(), SigState::Verified);
}

#[test]
fn test_public_secret_merge() {
    let alice = key(2, "Alice <alice@example.org>", true);
    let bob = key(3, "Bob <bob@example.org>", false);

    let public = alice.to_public_bytes(true).unwrap();
    let mut secret = alice.to_secret_bytes(true).unwrap();
    // bob only exists in the secret keyring
    secret.extend(bob.to_secret_bytes(true).unwrap());

    let store = KeyStore::from_keyrings(&public, Some(&secret)).unwrap();
    assert_eq!(store.len(), 1);
    assert!(store.key_by_long_id(&bob.key_id()).is_none());

    let merged = store.key_by_long_id(&alice.key_id()).unwrap();
    assert!(merged.is_key_pair());
    assert!(merged.subkeys()[0].is_key_pair());
    assert_eq!(merged.owner_trust(), OwnerTrust::Ultimate);
    assert!(merged.trust().is_buckstop());
    assert_eq!(merged.users().len(), 1);
    assert_eq!(merged.users()[0].signatures().len(), 1);

    // a round trip through both keyrings changes nothing
    let again = KeyStore::from_keyrings(
        &store.to_public_bytes(true).unwrap(),
        Some(&store.to_secret_bytes(true).unwrap()),
    )
    .unwrap();
    assert_eq!(again.all_keys(), store.all_keys());
}

#[test]
fn test_signature_before_key_is_rejected() {
    let alice = key(4, "Alice <alice@example.org>", false);
    let bytes = alice.to_public_bytes(false).unwrap();

    let packets: Vec<Packet> = PacketParser::new(bytes).collect::<Result<_, _>>().unwrap();
    let sig = packets
        .iter()
        .find(|p| matches!(p, Packet::Signature(_)))
        .unwrap();

    let err = KeyStore::from_keyrings(&sig.to_bytes().unwrap(), None).unwrap_err();
    assert!(err.is_keyring_structure(), "{:?}", err);
}

#[test]
fn test_lookup() {
    let mut store = KeyStore::new();
    let alice = key(5, "Alice Example <alice@example.org>", false);
    let bob = key(6, "Bob <bob@example.org>", false);
    store.insert(public_only(&alice));
    store.insert(public_only(&bob));

    let found = store.keys_by_user_id("ALICE EXAMPLE");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].key_id(), alice.key_id());
    assert_eq!(store.keys_by_user_id("example.org").len(), 2);

    let short = store.keys_by_short_id(&bob.key_id().short());
    assert_eq!(short.len(), 1);
    assert_eq!(short[0].key_id(), bob.key_id());

    // inserting again absorbs instead of duplicating
    store.insert(public_only(&bob));
    assert_eq!(store.len(), 2);

    assert!(store.remove(&alice.key_id()).is_some());
    assert!(store.keys_by_user_id("alice").is_empty());
}

#[test]
fn test_web_of_trust() {
    let _ = pretty_env_logger::try_init();
    let alice = key(7, "Alice <alice@example.org>", false);
    let bob = key(8, "Bob <bob@example.org>", false);
    let dave = key(9, "Dave <dave@example.org>", false);
    let carol = key(10, "Carol <carol@example.org>", false);

    let mut store = KeyStore::new();
    store.insert(alice.clone());
    store.insert(bob.clone());
    store.insert(dave.clone());
    store.insert(public_only(&carol));

    let engine = TrustEngine::default();
    engine.refresh(&mut store);
    assert_eq!(legitimacy(&store, &carol), KeyLegitimacy::NotTrusted);
    assert_eq!(legitimacy(&store, &alice), KeyLegitimacy::Complete);

    engine
        .apply_trust(&mut store, &bob.key_id(), OwnerTrust::UsuallyTrusted as u8)
        .unwrap();
    engine
        .apply_trust(&mut store, &dave.key_id(), OwnerTrust::UsuallyTrusted as u8)
        .unwrap();
    assert!(store.key_by_long_id(&bob.key_id()).unwrap().trust().is_buckstop());

    let by_bob = store.certify(&bob.key_id(), "", &carol.key_id(), 0, None).unwrap();
    engine.refresh(&mut store);
    assert_eq!(
        store.signature(&by_bob).unwrap().trust().owner_trust(),
        OwnerTrust::UsuallyTrusted
    );
    assert_eq!(legitimacy(&store, &carol), KeyLegitimacy::Marginal);

    store.certify(&dave.key_id(), "", &carol.key_id(), 0, None).unwrap();
    engine.refresh(&mut store);
    assert_eq!(legitimacy(&store, &carol), KeyLegitimacy::Complete);

    assert!(matches!(
        engine.apply_trust(&mut store, &bob.key_id(), 4),
        Err(Error::InvalidInput)
    ));

    // clearing forgets public keys only
    engine
        .apply_trust(&mut store, &carol.key_id(), OwnerTrust::AlwaysTrusted as u8)
        .unwrap();
    engine.clear_trust(&mut store);
    let owner_trust = |id: &KeyId| store.key_by_long_id(id).unwrap().owner_trust();
    assert_eq!(owner_trust(&carol.key_id()), OwnerTrust::Undefined);
    assert_eq!(owner_trust(&bob.key_id()), OwnerTrust::UsuallyTrusted);
    assert_eq!(owner_trust(&alice.key_id()), OwnerTrust::Ultimate);
}

#[test]
fn test_trust_signature_chain() {
    let alice = key(11, "Alice <alice@example.org>", false);
    let bob = key(12, "Bob <bob@example.org>", false);
    let carol = key(13, "Carol <carol@example.org>", false);

    // bob certifies carol in his own keyring
    let mut bobs = KeyStore::new();
    bobs.insert(bob.clone());
    bobs.insert(public_only(&carol));
    bobs.certify(&bob.key_id(), "", &carol.key_id(), 0, None).unwrap();
    let carol_certified = bobs.key_by_long_id(&carol.key_id()).unwrap().clone();

    let mut store = KeyStore::new();
    store.insert(alice.clone());
    store.insert(public_only(&bob));
    store.insert(carol_certified);

    // alice makes bob a trusted introducer: depth 1, complete trust
    let delegation = store
        .certify(&alice.key_id(), "", &bob.key_id(), 0, Some((1, 120)))
        .unwrap();

    let engine = TrustEngine::default();
    engine.refresh(&mut store);

    assert_eq!(
        store.signature(&delegation).unwrap().trust().owner_trust(),
        OwnerTrust::AlwaysTrusted
    );
    assert_eq!(legitimacy(&store, &bob), KeyLegitimacy::Complete);
    assert_eq!(legitimacy(&store, &carol), KeyLegitimacy::Complete);

    // without the delegation bob's certification carries no trust
    let mut plain = KeyStore::new();
    plain.insert(alice.clone());
    plain.insert(public_only(&bob));
    plain.insert(store.key_by_long_id(&carol.key_id()).unwrap().clone());
    plain.certify(&alice.key_id(), "", &bob.key_id(), 0, None).unwrap();
    engine.refresh(&mut plain);
    assert_eq!(legitimacy(&plain, &bob), KeyLegitimacy::Complete);
    assert_eq!(legitimacy(&plain, &carol), KeyLegitimacy::NotTrusted);
}

#[test]
fn test_certification_revocation() {
    let alice = key(14, "Alice <alice@example.org>", false);
    let carol = key(15, "Carol <carol@example.org>", false);

    let mut store = KeyStore::new();
    store.insert(alice.clone());
    store.insert(public_only(&carol));

    let cert = store.certify(&alice.key_id(), "", &carol.key_id(), 0, None).unwrap();
    let engine = TrustEngine::default();
    engine.refresh(&mut store);
    assert_eq!(legitimacy(&store, &carol), KeyLegitimacy::Complete);

    store.revoke_certification(&cert, "").unwrap();
    assert!(store.signature(&cert).unwrap().is_revoked());
    assert!(matches!(
        store.revoke_certification(&cert, ""),
        Err(Error::Revocation { .. })
    ));

    engine.refresh(&mut store);
    assert_eq!(legitimacy(&store, &carol), KeyLegitimacy::NotTrusted);

    // the revocation survives a round trip and verifies
    let mut reloaded = KeyStore::from_keyrings(&store.to_public_bytes(true).unwrap(), None).unwrap();
    let revocation = SigRef {
        key: carol.key_id(),
        site: SigSite::CertRevocation { user: 0, sig: 1 },
    };
    assert!(reloaded.signature(&revocation).is_some());
    assert!(reloaded.verify_signature(&revocation).unwrap());
    assert!(reloaded.signature(&cert).unwrap().is_revoked());
}

#[test]
fn test_key_revocation() {
    let alice = key(16, "Alice <alice@example.org>", false);
    let bob = key(17, "Bob <bob@example.org>", true);

    let mut store = KeyStore::new();
    store.insert(alice.clone());
    store.insert(bob.clone());

    let subkey = bob.subkeys()[0].key_id();
    store
        .revoke_subkey(
            &bob.key_id(),
            &subkey,
            "",
            pgp_keyring::packet::RevocationCode::KeyRetired,
            "retired",
        )
        .unwrap();
    assert!(store.key_by_long_id(&bob.key_id()).unwrap().subkeys()[0].is_revoked());

    store
        .revoke_key(
            &bob.key_id(),
            "",
            pgp_keyring::packet::RevocationCode::KeyCompromised,
            "lost",
        )
        .unwrap();
    assert!(store.key_by_long_id(&bob.key_id()).unwrap().is_revoked());

    assert!(matches!(
        store.revoke_key(
            &bob.key_id(),
            "",
            pgp_keyring::packet::RevocationCode::NoReason,
            ""
        ),
        Err(Error::Revocation { .. })
    ));
    assert!(matches!(
        store.certify(&alice.key_id(), "", &bob.key_id(), 0, None),
        Err(Error::Revocation { .. })
    ));

    // a certificate without secret half cannot revoke
    let mut public = KeyStore::new();
    public.insert(public_only(&alice));
    assert!(matches!(
        public.revoke_key(
            &alice.key_id(),
            "",
            pgp_keyring::packet::RevocationCode::NoReason,
            ""
        ),
        Err(Error::KeyMismatch { .. })
    ));

    let bytes = store.key_by_long_id(&bob.key_id()).unwrap().to_public_bytes(false).unwrap();
    let mut reloaded = KeyStore::from_keyrings(&bytes, None).unwrap();
    assert_eq!(reloaded.verify_all(), 4);
    let reloaded_bob = reloaded.key_by_long_id(&bob.key_id()).unwrap();
    assert!(reloaded_bob.is_revoked());
    assert!(reloaded_bob.subkeys()[0].is_revoked());

    let (code, reason) = reloaded_bob
        .revocation()
        .unwrap()
        .signature()
        .revocation_reason()
        .unwrap();
    assert_eq!(code, pgp_keyring::packet::RevocationCode::KeyCompromised);
    assert_eq!(&reason[..], b"lost");
}

#[test]
fn test_forged_revocation_is_rolled_back() {
    let bob = key(18, "Bob <bob@example.org>", false);
    let public = public_only(&bob);

    let config = SignatureConfig::from_signer(
        public.public_key(),
        SignatureType::KeyRevocation,
        HashAlgorithm::Sha256,
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
    )
    .unwrap();
    let forged = Signature::from_config(config, [0, 0], vec![Mpi::from_slice(&[1, 2, 3])]).unwrap();

    let mut packets: Vec<Packet> = PacketParser::new(public.to_public_bytes(false).unwrap())
        .collect::<Result<_, _>>()
        .unwrap();
    packets.insert(1, Packet::from(forged));
    let bytes = packets.to_bytes().unwrap();

    let mut store = KeyStore::from_keyrings(&bytes, None).unwrap();
    assert!(store.key_by_long_id(&bob.key_id()).unwrap().is_revoked());

    let revocation = SigRef {
        key: bob.key_id(),
        site: SigSite::KeyRevocation,
    };
    assert!(!store.verify_signature(&revocation).unwrap());
    assert!(!store.key_by_long_id(&bob.key_id()).unwrap().is_revoked());
}

#[test]
fn test_unknown_signer_stays_pending() {
    let alice = key(19, "Alice <alice@example.org>", false);
    let carol = key(20, "Carol <carol@example.org>", false);

    let mut store = KeyStore::new();
    store.insert(alice.clone());
    store.insert(public_only(&carol));
    let cert = store.certify(&alice.key_id(), "", &carol.key_id(), 0, None).unwrap();
    let certified = store.key_by_long_id(&carol.key_id()).unwrap().clone();

    let mut other = KeyStore::from_keyrings(&certified.to_public_bytes(false).unwrap(), None).unwrap();
    assert_eq!(other.signature(&cert).unwrap().signer(), SignerRef::Unresolved);
    assert!(matches!(
        other.verify_signature(&cert),
        Err(Error::MissingKey { .. })
    ));
    assert_eq!(other.signature(&cert).unwrap().state(), SigState::Unverified);
    assert!(!other.signature(&cert).unwrap().is_failed());
}

#[test]
fn test_foreign_revocations_are_ignored() {
    let _ = pretty_env_logger::try_init();
    let alice = key(21, "Alice <alice@example.org>", false);
    let bob = key(22, "Bob <bob@example.org>", true);
    let created = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

    // alice claims to revoke bob's primary key and subkey
    let foreign = |typ| {
        let config =
            SignatureConfig::from_signer(alice.public_key(), typ, HashAlgorithm::Sha256, created)
                .unwrap();
        Packet::from(Signature::from_config(config, [0, 0], vec![Mpi::from_slice(&[1])]).unwrap())
    };

    let mut packets: Vec<Packet> = PacketParser::new(bob.to_public_bytes(false).unwrap())
        .collect::<Result<_, _>>()
        .unwrap();
    assert!(matches!(packets.last(), Some(Packet::Signature(_))));
    packets.insert(1, foreign(SignatureType::KeyRevocation));
    packets.push(foreign(SignatureType::SubkeyRevocation));

    let mut store = KeyStore::from_keyrings(&packets.to_bytes().unwrap(), None).unwrap();
    store.insert(public_only(&alice));
    store.verify_all();

    let parsed = store.key_by_long_id(&bob.key_id()).unwrap();
    assert!(!parsed.is_revoked());
    assert!(!parsed.trust().is_revoked());
    let subkey = &parsed.subkeys()[0];
    assert!(!subkey.is_revoked());
    assert!(!subkey.trust().is_revoked());
    assert_eq!(subkey.binding().unwrap().state(), SigState::Verified);
}

/// Alice introduces bob with a trust signature of `alice_depth`, bob introduces
/// carol with depth 1, and carol certifies dave.
fn introducer_chain(
    keys: &[PrimaryKey; 4],
    alice_depth: u8,
) -> (KeyStore, SigRef, SigRef) {
    let [alice, bob, carol, dave] = keys;

    let mut bobs = KeyStore::new();
    bobs.insert(bob.clone());
    bobs.insert(public_only(carol));
    let by_bob = bobs
        .certify(&bob.key_id(), "", &carol.key_id(), 0, Some((1, 120)))
        .unwrap();

    let mut carols = KeyStore::new();
    carols.insert(carol.clone());
    carols.insert(public_only(dave));
    let by_carol = carols.certify(&carol.key_id(), "", &dave.key_id(), 0, None).unwrap();

    let mut store = KeyStore::new();
    store.insert(alice.clone());
    store.insert(public_only(bob));
    store.insert(bobs.key_by_long_id(&carol.key_id()).unwrap().clone());
    store.insert(carols.key_by_long_id(&dave.key_id()).unwrap().clone());
    store
        .certify(&alice.key_id(), "", &bob.key_id(), 0, Some((alice_depth, 120)))
        .unwrap();
    (store, by_bob, by_carol)
}

#[test]
fn test_trust_signature_depth_bound() {
    let keys = [
        key(23, "Alice <alice@example.org>", false),
        key(24, "Bob <bob@example.org>", false),
        key(25, "Carol <carol@example.org>", false),
        key(26, "Dave <dave@example.org>", false),
    ];
    let engine = TrustEngine::default();
    let sig_trust =
        |store: &KeyStore, sig: &SigRef| store.signature(sig).unwrap().trust().owner_trust();

    // depth 2 reaches carol as an introducer
    let (mut store, by_bob, by_carol) = introducer_chain(&keys, 2);
    engine.refresh(&mut store);
    assert_eq!(sig_trust(&store, &by_bob), OwnerTrust::AlwaysTrusted);
    assert_eq!(sig_trust(&store, &by_carol), OwnerTrust::AlwaysTrusted);
    assert_eq!(legitimacy(&store, &keys[3]), KeyLegitimacy::Complete);

    // depth 1 stops after bob's certifications
    let (mut store, by_bob, by_carol) = introducer_chain(&keys, 1);
    engine.refresh(&mut store);
    assert_eq!(sig_trust(&store, &by_bob), OwnerTrust::AlwaysTrusted);
    assert_eq!(legitimacy(&store, &keys[2]), KeyLegitimacy::Complete);
    assert_eq!(sig_trust(&store, &by_carol), OwnerTrust::Undefined);
    assert_eq!(legitimacy(&store, &keys[3]), KeyLegitimacy::NotTrusted);

    // the model bound applies on top of the declared depth
    let shallow = TrustEngine::new(
        pgp_keyring::trust::TrustModelBuilder::default()
            .max_chain_depth(1)
            .build()
            .unwrap(),
    );
    let (mut store, _, by_carol) = introducer_chain(&keys, 2);
    shallow.refresh(&mut store);
    assert_eq!(legitimacy(&store, &keys[2]), KeyLegitimacy::Complete);
    assert_eq!(sig_trust(&store, &by_carol), OwnerTrust::Undefined);
    assert_eq!(legitimacy(&store, &keys[3]), KeyLegitimacy::NotTrusted);
}

#[test]
fn test_revoked_introducer() {
    let alice = key(27, "Alice <alice@example.org>", false);
    let bob = key(28, "Bob <bob@example.org>", false);
    let carol = key(29, "Carol <carol@example.org>", false);

    let mut bobs = KeyStore::new();
    bobs.insert(bob.clone());
    bobs.insert(public_only(&carol));
    let by_bob = bobs.certify(&bob.key_id(), "", &carol.key_id(), 0, None).unwrap();

    let mut store = KeyStore::new();
    store.insert(alice.clone());
    store.insert(public_only(&bob));
    store.insert(bobs.key_by_long_id(&carol.key_id()).unwrap().clone());
    let delegation = store
        .certify(&alice.key_id(), "", &bob.key_id(), 0, Some((1, 120)))
        .unwrap();

    let engine = TrustEngine::default();
    engine.refresh(&mut store);
    assert_eq!(legitimacy(&store, &carol), KeyLegitimacy::Complete);

    // bob's revocation arrives later
    bobs.revoke_key(
        &bob.key_id(),
        "",
        pgp_keyring::packet::RevocationCode::KeyCompromised,
        "lost",
    )
    .unwrap();
    store.insert(public_only(bobs.key_by_long_id(&bob.key_id()).unwrap()));
    assert!(store.key_by_long_id(&bob.key_id()).unwrap().is_revoked());

    engine.refresh(&mut store);
    assert_eq!(
        store.signature(&delegation).unwrap().trust().owner_trust(),
        OwnerTrust::AlwaysTrusted
    );
    assert_eq!(
        store.signature(&by_bob).unwrap().trust().owner_trust(),
        OwnerTrust::NotUsuallyTrusted
    );
    assert_eq!(legitimacy(&store, &carol), KeyLegitimacy::NotTrusted);
}

#[test]
fn test_trust_walk_prefers_stronger_roots() {
    let alice = key(30, "Alice <alice@example.org>", false);
    let bob = key(31, "Bob <bob@example.org>", false);
    let carol = key(32, "Carol <carol@example.org>", false);
    let dave = key(33, "Dave <dave@example.org>", false);

    let mut carols = KeyStore::new();
    carols.insert(carol.clone());
    carols.insert(public_only(&dave));
    let by_carol = carols.certify(&carol.key_id(), "", &dave.key_id(), 0, None).unwrap();

    // bob comes first in the store but is only usually trusted
    let mut store = KeyStore::new();
    store.insert(bob.clone());
    store.insert(alice.clone());
    store.insert(public_only(&carol));
    store.insert(carols.key_by_long_id(&dave.key_id()).unwrap().clone());
    for introducer in [&bob, &alice] {
        store
            .certify(&introducer.key_id(), "", &carol.key_id(), 0, Some((1, 120)))
            .unwrap();
    }

    let engine = TrustEngine::default();
    engine
        .apply_trust(&mut store, &bob.key_id(), OwnerTrust::UsuallyTrusted as u8)
        .unwrap();

    assert_eq!(
        store.signature(&by_carol).unwrap().trust().owner_trust(),
        OwnerTrust::AlwaysTrusted
    );
    assert_eq!(legitimacy(&store, &dave), KeyLegitimacy::Complete);
}

#[test]
fn test_reloaded_key_pair_is_ultimate() {
    let alice = key(34, "Alice <alice@example.org>", false);
    let mut store = KeyStore::new();
    store.insert(alice.clone());

    TrustEngine::default()
        .apply_trust(&mut store, &alice.key_id(), OwnerTrust::UsuallyTrusted as u8)
        .unwrap();
    assert_eq!(
        store.key_by_long_id(&alice.key_id()).unwrap().owner_trust(),
        OwnerTrust::UsuallyTrusted
    );

    let reloaded = KeyStore::from_keyrings(
        &store.to_public_bytes(true).unwrap(),
        Some(&store.to_secret_bytes(true).unwrap()),
    )
    .unwrap();
    let key = reloaded.key_by_long_id(&alice.key_id()).unwrap();
    assert!(key.is_key_pair());
    assert_eq!(key.owner_trust(), OwnerTrust::Ultimate);
    assert!(key.trust().is_buckstop());
}
