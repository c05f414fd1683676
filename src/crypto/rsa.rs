use md5::Md5;
use num_bigint::{BigUint, ModInverse, ToBigUint};
use rand::{CryptoRng, Rng};
use ripemd::Ripemd160;
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;

use crate::crypto::hash::HashAlgorithm;
use crate::errors::{format_err, unsupported_err, Result};
use crate::types::{Mpi, PlainSecretParams, PublicParams};

/// Largest RSA modulus accepted, same limit as gnupg.
pub(crate) const MAX_KEY_SIZE: usize = 16384;

fn pkcs1v15_scheme(hash: HashAlgorithm) -> Result<Pkcs1v15Sign> {
    Ok(match hash {
        HashAlgorithm::Md5 => Pkcs1v15Sign::new::<Md5>(),
        HashAlgorithm::Sha1 => Pkcs1v15Sign::new::<Sha1>(),
        HashAlgorithm::Ripemd160 => Pkcs1v15Sign::new::<Ripemd160>(),
        HashAlgorithm::Sha224 => Pkcs1v15Sign::new::<sha2::Sha224>(),
        HashAlgorithm::Sha256 => Pkcs1v15Sign::new::<sha2::Sha256>(),
        HashAlgorithm::Sha384 => Pkcs1v15Sign::new::<sha2::Sha384>(),
        HashAlgorithm::Sha512 => Pkcs1v15Sign::new::<sha2::Sha512>(),
        _ => unsupported_err!("RSA signatures using {}", hash),
    })
}

/// Generate an RSA key pair.
pub fn generate_key<R: Rng + CryptoRng>(
    rng: &mut R,
    bit_size: usize,
) -> Result<(PublicParams, PlainSecretParams)> {
    let key = RsaPrivateKey::new(rng, bit_size)?;

    // OpenPGP wants p < q, with u = p^-1 mod q
    let (p, q) = match &key.primes()[..] {
        [a, b] if a < b => (a.clone(), b.clone()),
        [a, b] => (b.clone(), a.clone()),
        _ => unsupported_err!("multi prime RSA keys"),
    };
    let u = p
        .clone()
        .mod_inverse(&q)
        .and_then(|u| u.to_biguint())
        .ok_or_else(|| format_err!("invalid RSA prime"))?;

    Ok((
        PublicParams::Rsa {
            n: key.n().into(),
            e: key.e().into(),
        },
        PlainSecretParams::Rsa {
            d: key.d().into(),
            p: p.into(),
            q: q.into(),
            u: u.into(),
        },
    ))
}

/// Reassemble a private key from its OpenPGP components.
pub fn private_key(n: &Mpi, e: &Mpi, d: &Mpi, p: &Mpi, q: &Mpi) -> Result<RsaPrivateKey> {
    let key = RsaPrivateKey::from_components(
        n.into(),
        e.into(),
        d.into(),
        vec![BigUint::from(p), BigUint::from(q)],
    )?;
    Ok(key)
}

/// Verify a RSA, PKCS1v15 padded signature.
pub fn verify(n: &Mpi, e: &Mpi, hash: HashAlgorithm, hashed: &[u8], sig: &[u8]) -> Result<bool> {
    let key = RsaPublicKey::new_with_max_size(n.into(), e.into(), MAX_KEY_SIZE)?;

    // the signature MPI may have lost leading zeros
    let size = key.size();
    let mut padded = vec![0u8; size.saturating_sub(sig.len())];
    padded.extend_from_slice(sig);

    match key.verify(pkcs1v15_scheme(hash)?, hashed, &padded) {
        Ok(()) => Ok(true),
        Err(rsa::errors::Error::Verification) => Ok(false),
        Err(err) => Err(err.into()),
    }
}

/// Sign using RSA, with PKCS1v15 padding.
pub fn sign(key: &RsaPrivateKey, hash: HashAlgorithm, digest: &[u8]) -> Result<Vec<Mpi>> {
    let sig = key.sign(pkcs1v15_scheme(hash)?, digest)?;

    Ok(vec![Mpi::from_slice(&sig)])
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn test_generate_sign_verify() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let (public, secret) = generate_key(&mut rng, 1024).unwrap();

        let (PublicParams::Rsa { n, e }, PlainSecretParams::Rsa { d, p, q, u }) =
            (&public, &secret)
        else {
            panic!("expected RSA parameters");
        };
        assert!(BigUint::from(p) < BigUint::from(q));
        assert_eq!(
            (BigUint::from(p) * BigUint::from(u)) % BigUint::from(q),
            BigUint::from(1u32)
        );

        let key = private_key(n, e, d, p, q).unwrap();
        let digest = HashAlgorithm::Sha256.digest(b"hello").unwrap();
        let sig = sign(&key, HashAlgorithm::Sha256, &digest).unwrap();

        assert!(verify(n, e, HashAlgorithm::Sha256, &digest, sig[0].as_ref()).unwrap());

        let other = HashAlgorithm::Sha256.digest(b"hellO").unwrap();
        assert!(!verify(n, e, HashAlgorithm::Sha256, &other, sig[0].as_ref()).unwrap());
    }
}
