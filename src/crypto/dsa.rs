use dsa::{Components, Signature, SigningKey, VerifyingKey};
use md5::Md5;
use num_bigint::BigUint;
use ripemd::Ripemd160;
use sha1::Sha1;
use signature::hazmat::PrehashVerifier;

use crate::crypto::hash::HashAlgorithm;
use crate::errors::{unsupported_err, Result};
use crate::types::Mpi;

fn verifying_key(p: &Mpi, q: &Mpi, g: &Mpi, y: &Mpi) -> Result<VerifyingKey> {
    let components = Components::from_components(p.into(), q.into(), g.into())?;
    let key = VerifyingKey::from_components(components, y.into())?;
    Ok(key)
}

/// Verify a DSA signature over an already hashed message.
pub fn verify(p: &Mpi, q: &Mpi, g: &Mpi, y: &Mpi, hashed: &[u8], r: &Mpi, s: &Mpi) -> Result<bool> {
    let key = verifying_key(p, q, g, y)?;
    let Ok(signature) = Signature::from_components(BigUint::from(r), BigUint::from(s)) else {
        // zero r or s, never valid
        return Ok(false);
    };

    Ok(key.verify_prehash(hashed, &signature).is_ok())
}

/// Deterministic (RFC 6979) DSA signature over an already hashed message.
#[allow(clippy::too_many_arguments)]
pub fn sign(
    p: &Mpi,
    q: &Mpi,
    g: &Mpi,
    y: &Mpi,
    x: &Mpi,
    hash: HashAlgorithm,
    digest: &[u8],
) -> Result<Vec<Mpi>> {
    let key = SigningKey::from_components(verifying_key(p, q, g, y)?, x.into())?;

    let signature = match hash {
        HashAlgorithm::Md5 => key.sign_prehashed_rfc6979::<Md5>(digest),
        HashAlgorithm::Sha1 => key.sign_prehashed_rfc6979::<Sha1>(digest),
        HashAlgorithm::Ripemd160 => key.sign_prehashed_rfc6979::<Ripemd160>(digest),
        HashAlgorithm::Sha224 => key.sign_prehashed_rfc6979::<sha2::Sha224>(digest),
        HashAlgorithm::Sha256 => key.sign_prehashed_rfc6979::<sha2::Sha256>(digest),
        HashAlgorithm::Sha384 => key.sign_prehashed_rfc6979::<sha2::Sha384>(digest),
        HashAlgorithm::Sha512 => key.sign_prehashed_rfc6979::<sha2::Sha512>(digest),
        _ => unsupported_err!("DSA signatures using {}", hash),
    }?;

    Ok(vec![signature.r().into(), signature.s().into()])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mpi(s: &str) -> Mpi {
        Mpi::from_slice(&hex::decode(s).unwrap())
    }

    /// Key from RFC 6979, A.2.1
    fn rfc6979_key() -> [Mpi; 5] {
        [
            mpi("86F5CA03DCFEB225063FF830A0C769B9DD9D6153AD91D7CE27F787C43278B447\
                 E6533B86B18BED6E8A48B784A14C252C5BE0DBF60B86D6385BD2F12FB763ED88\
                 73ABFD3F5BA2E0A8C0A59082EAC056935E529DAF7C610467899C77ADEDFC846C\
                 881870B7B19B2B58F9BE0521A17002E3BDD6B86685EE90B3D9A1B02B782B1779"),
            mpi("996F967F6C8E388D9E28D01E205FBA957A5698B1"),
            mpi("07B0F92546150B62514BB771E2A0C0CE387F03BDA6C56B505209FF25FD3C133D\
                 89BBCD97E904E09114D9A7DEFDEADFC9078EA544D2E401AEECC40BB9FBBF78FD\
                 87995A10A1C27CB7789B594BA7EFB5C4326A9FE59A070E136DB77175464ADCA4\
                 17BE5DCE2F40D10A46A3A3943F26AB7FD9C0398FF8C76EE0A56826A8A88F1DBD"),
            mpi("5DF5E01DED31D0297E274E1691C192FE5868FEF9E19A84776454B100CF16F653\
                 92195A38B90523E2542EE61871C0440CB87C322FC4B4D2EC5E1E7EC766E1BE8D\
                 4CE935437DC11C3C8FD426338933EBFE739CB3465F4D3668C5E473508253B1E6\
                 82F65CBDC4FAE93C2EA212390E54905A86E2223170B44EAA7DA5DD9FFCFB7F3B"),
            mpi("411602CB19A6CCC34494D79D98EF1E7ED5AF25F7"),
        ]
    }

    #[test]
    fn test_dsa_1024_sha1() {
        let _ = pretty_env_logger::try_init();
        let [p, q, g, y, x] = rfc6979_key();

        let digest = HashAlgorithm::Sha1.digest(b"sample").unwrap();
        let sig = sign(&p, &q, &g, &y, &x, HashAlgorithm::Sha1, &digest).unwrap();
        assert_eq!(sig[0], mpi("2E1A0C2562B2912CAAF89186FB0F42001585DA55"));
        assert_eq!(sig[1], mpi("29EFB6B0AFF2D7A68EB70CA313022253B9A88DF5"));

        assert!(verify(&p, &q, &g, &y, &digest, &sig[0], &sig[1]).unwrap());

        let other = HashAlgorithm::Sha1.digest(b"samplE").unwrap();
        assert!(!verify(&p, &q, &g, &y, &other, &sig[0], &sig[1]).unwrap());
    }
}
