use std::{fmt, io};

use byteorder::{BigEndian, WriteBytesExt};
use bytes::{Buf, Bytes};
use log::debug;
use rand::{CryptoRng, Rng};
use zeroize::Zeroizing;

use crate::crypto::checksum;
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::crypto::{dsa, rsa, Verifier};
use crate::errors::{bail, ensure, unsupported_err, Error, Result};
use crate::parsing::BufParsing;
use crate::ser::Serialize;
use crate::types::{KeyVersion, Mpi, StringToKey};

/// The public part of a key, one set of MPIs per algorithm family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicParams {
    Rsa {
        n: Mpi,
        e: Mpi,
    },
    Dsa {
        p: Mpi,
        q: Mpi,
        g: Mpi,
        y: Mpi,
    },
    Elgamal {
        p: Mpi,
        g: Mpi,
        y: Mpi,
    },
    /// Algorithms this crate does not interpret, kept byte for byte.
    Unknown {
        #[allow(missing_docs)]
        data: Bytes,
    },
}

impl PublicParams {
    pub fn try_from_buf<B: Buf>(alg: PublicKeyAlgorithm, mut i: B) -> Result<Self> {
        let params = match alg {
            PublicKeyAlgorithm::RSA | PublicKeyAlgorithm::RSAEncrypt | PublicKeyAlgorithm::RSASign => {
                let n = Mpi::from_buf(&mut i)?;
                let e = Mpi::from_buf(&mut i)?;
                PublicParams::Rsa { n, e }
            }
            PublicKeyAlgorithm::DSA => {
                let p = Mpi::from_buf(&mut i)?;
                let q = Mpi::from_buf(&mut i)?;
                let g = Mpi::from_buf(&mut i)?;
                let y = Mpi::from_buf(&mut i)?;
                PublicParams::Dsa { p, q, g, y }
            }
            PublicKeyAlgorithm::Elgamal | PublicKeyAlgorithm::ElgamalEncrypt => {
                let p = Mpi::from_buf(&mut i)?;
                let g = Mpi::from_buf(&mut i)?;
                let y = Mpi::from_buf(&mut i)?;
                PublicParams::Elgamal { p, g, y }
            }
            _ => {
                debug!("keeping raw public parameters for {:?}", alg);
                PublicParams::Unknown { data: i.rest() }
            }
        };

        Ok(params)
    }

    /// Size of the key in bits, as shown in key listings.
    pub fn bit_len(&self) -> usize {
        match self {
            PublicParams::Rsa { n, .. } => n.bit_len(),
            PublicParams::Dsa { p, .. } | PublicParams::Elgamal { p, .. } => p.bit_len(),
            PublicParams::Unknown { .. } => 0,
        }
    }
}

impl Serialize for PublicParams {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            PublicParams::Rsa { n, e } => {
                n.to_writer(writer)?;
                e.to_writer(writer)?;
            }
            PublicParams::Dsa { p, q, g, y } => {
                p.to_writer(writer)?;
                q.to_writer(writer)?;
                g.to_writer(writer)?;
                y.to_writer(writer)?;
            }
            PublicParams::Elgamal { p, g, y } => {
                p.to_writer(writer)?;
                g.to_writer(writer)?;
                y.to_writer(writer)?;
            }
            PublicParams::Unknown { data } => {
                writer.write_all(data)?;
            }
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            PublicParams::Rsa { n, e } => n.write_len() + e.write_len(),
            PublicParams::Dsa { p, q, g, y } => {
                p.write_len() + q.write_len() + g.write_len() + y.write_len()
            }
            PublicParams::Elgamal { p, g, y } => p.write_len() + g.write_len() + y.write_len(),
            PublicParams::Unknown { data } => data.len(),
        }
    }
}

impl Verifier for PublicParams {
    fn verify(&self, hash: HashAlgorithm, hashed: &[u8], sig: &[Mpi]) -> Result<bool> {
        match self {
            PublicParams::Rsa { n, e } => {
                ensure!(sig.len() == 1, "RSA signatures consist of one MPI, got {}", sig.len());
                rsa::verify(n, e, hash, hashed, sig[0].as_ref())
            }
            PublicParams::Dsa { p, q, g, y } => {
                ensure!(sig.len() == 2, "DSA signatures consist of two MPIs, got {}", sig.len());
                dsa::verify(p, q, g, y, hashed, &sig[0], &sig[1])
            }
            PublicParams::Elgamal { .. } => unsupported_err!("Elgamal signatures"),
            PublicParams::Unknown { .. } => unsupported_err!("verifying with an unknown algorithm"),
        }
    }
}

/// Unencrypted secret key material.
#[derive(Clone, PartialEq, Eq)]
pub enum PlainSecretParams {
    Rsa { d: Mpi, p: Mpi, q: Mpi, u: Mpi },
    Dsa { x: Mpi },
    Elgamal { x: Mpi },
}

impl fmt::Debug for PlainSecretParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rsa { .. } => f.write_str("PlainSecretParams::Rsa([..])"),
            Self::Dsa { .. } => f.write_str("PlainSecretParams::Dsa([..])"),
            Self::Elgamal { .. } => f.write_str("PlainSecretParams::Elgamal([..])"),
        }
    }
}

impl PlainSecretParams {
    pub fn try_from_buf<B: Buf>(alg: PublicKeyAlgorithm, mut i: B) -> Result<Self> {
        let params = match alg {
            PublicKeyAlgorithm::RSA | PublicKeyAlgorithm::RSAEncrypt | PublicKeyAlgorithm::RSASign => {
                let d = Mpi::from_buf(&mut i)?;
                let p = Mpi::from_buf(&mut i)?;
                let q = Mpi::from_buf(&mut i)?;
                let u = Mpi::from_buf(&mut i)?;
                PlainSecretParams::Rsa { d, p, q, u }
            }
            PublicKeyAlgorithm::DSA => PlainSecretParams::Dsa {
                x: Mpi::from_buf(&mut i)?,
            },
            PublicKeyAlgorithm::Elgamal | PublicKeyAlgorithm::ElgamalEncrypt => {
                PlainSecretParams::Elgamal {
                    x: Mpi::from_buf(&mut i)?,
                }
            }
            _ => unsupported_err!("secret parameters for {:?}", alg),
        };
        Ok(params)
    }

    /// Two octet checksum over the serialized MPIs.
    pub fn checksum_simple(&self) -> Result<u16> {
        let raw = Zeroizing::new(self.to_bytes()?);
        Ok(checksum::calculate_simple(&raw))
    }

    /// Protects the parameters with a passphrase, using the SHA1 integrity check (usage 254).
    pub fn encrypt<R: CryptoRng + Rng>(
        &self,
        mut rng: R,
        passphrase: &str,
        s2k: StringToKey,
        sym_alg: SymmetricKeyAlgorithm,
    ) -> Result<EncryptedSecretParams> {
        let key = s2k.derive_key(passphrase.as_bytes(), sym_alg.key_size())?;

        let mut iv = vec![0u8; sym_alg.block_size()];
        rng.fill_bytes(&mut iv);

        let mut data = Zeroizing::new(self.to_bytes()?);
        let hash = checksum::calculate_sha1(&data);
        data.extend_from_slice(&hash);
        sym_alg.encrypt_with_iv_regular(&key, &iv, &mut data)?;

        Ok(EncryptedSecretParams {
            data: Bytes::copy_from_slice(&data),
            iv: iv.into(),
            s2k_usage: S2kUsage::Cfb,
            sym_alg,
            s2k,
        })
    }

    /// Signs `digest` with these parameters and the matching public half.
    pub fn sign(&self, public: &PublicParams, hash: HashAlgorithm, digest: &[u8]) -> Result<Vec<Mpi>> {
        match (self, public) {
            (PlainSecretParams::Rsa { d, p, q, .. }, PublicParams::Rsa { n, e }) => {
                let key = rsa::private_key(n, e, d, p, q)?;
                rsa::sign(&key, hash, digest)
            }
            (PlainSecretParams::Dsa { x }, PublicParams::Dsa { p, q, g, y }) => {
                dsa::sign(p, q, g, y, x, hash, digest)
            }
            (PlainSecretParams::Elgamal { .. }, _) => unsupported_err!("Elgamal signatures"),
            _ => bail!("secret parameters do not match the public key"),
        }
    }
}

impl Serialize for PlainSecretParams {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            PlainSecretParams::Rsa { d, p, q, u } => {
                d.to_writer(writer)?;
                p.to_writer(writer)?;
                q.to_writer(writer)?;
                u.to_writer(writer)?;
            }
            PlainSecretParams::Dsa { x } | PlainSecretParams::Elgamal { x } => {
                x.to_writer(writer)?;
            }
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            PlainSecretParams::Rsa { d, p, q, u } => {
                d.write_len() + p.write_len() + q.write_len() + u.write_len()
            }
            PlainSecretParams::Dsa { x } | PlainSecretParams::Elgamal { x } => x.write_len(),
        }
    }
}

/// The secret key usage octet.
///
/// Ref: <https://tools.ietf.org/html/rfc4880.html#section-5.5.3>
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum S2kUsage {
    /// 0: not protected, followed by a two octet checksum
    Unprotected,
    /// 254: string to key, SHA1 integrity check
    Cfb,
    /// 255: string to key, two octet checksum
    MalleableCfb,
    /// Any other value: the cipher id itself, key is the MD5 of the passphrase
    LegacyCfb(SymmetricKeyAlgorithm),
}

impl From<u8> for S2kUsage {
    fn from(value: u8) -> Self {
        match value {
            0 => S2kUsage::Unprotected,
            254 => S2kUsage::Cfb,
            255 => S2kUsage::MalleableCfb,
            alg => S2kUsage::LegacyCfb(alg.into()),
        }
    }
}

impl From<S2kUsage> for u8 {
    fn from(value: S2kUsage) -> Self {
        match value {
            S2kUsage::Unprotected => 0,
            S2kUsage::Cfb => 254,
            S2kUsage::MalleableCfb => 255,
            S2kUsage::LegacyCfb(alg) => alg.into(),
        }
    }
}

/// Passphrase protected secret key material.
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct EncryptedSecretParams {
    /// The encrypted MPIs, including the trailing checksum or hash.
    #[debug("{}", hex::encode(data))]
    data: Bytes,
    #[debug("{}", hex::encode(iv))]
    iv: Bytes,
    s2k_usage: S2kUsage,
    sym_alg: SymmetricKeyAlgorithm,
    s2k: StringToKey,
}

impl EncryptedSecretParams {
    pub fn s2k_usage(&self) -> S2kUsage {
        self.s2k_usage
    }

    pub fn sym_alg(&self) -> SymmetricKeyAlgorithm {
        self.sym_alg
    }

    pub fn string_to_key(&self) -> &StringToKey {
        &self.s2k
    }

    /// Derives the key from `passphrase`, decrypts and checks the integrity value.
    ///
    /// A wrong passphrase shows up as [`Error::InvalidPassphrase`].
    pub fn unlock(
        &self,
        version: KeyVersion,
        alg: PublicKeyAlgorithm,
        passphrase: &str,
    ) -> Result<PlainSecretParams> {
        if version != KeyVersion::V4 {
            // V3 keys encrypt each MPI separately, with CFB resyncs in between
            unsupported_err!("unlocking {:?} secret keys", version);
        }

        let key = self
            .s2k
            .derive_key(passphrase.as_bytes(), self.sym_alg.key_size())?;

        let mut plaintext = Zeroizing::new(self.data.to_vec());
        self.sym_alg
            .decrypt_with_iv_regular(&key, &self.iv, &mut plaintext)?;

        let check_len = match self.s2k_usage {
            S2kUsage::Cfb => 20,
            _ => 2,
        };
        if plaintext.len() < check_len {
            return Err(Error::InvalidPassphrase);
        }
        let (mpis, check) = plaintext.split_at(plaintext.len() - check_len);
        match self.s2k_usage {
            S2kUsage::Cfb => checksum::sha1(check, mpis)?,
            _ => checksum::simple(check, mpis)?,
        }

        // the checksum matched, so malformed MPIs are not a passphrase problem
        PlainSecretParams::try_from_buf(alg, mpis)
    }
}

/// Secret key material, as found after the public part of a secret key packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretParams {
    Plain(PlainSecretParams),
    Encrypted(EncryptedSecretParams),
}

impl SecretParams {
    pub fn try_from_buf<B: Buf>(alg: PublicKeyAlgorithm, mut i: B) -> Result<Self> {
        let s2k_usage = S2kUsage::from(i.read_u8()?);

        let (sym_alg, s2k) = match s2k_usage {
            S2kUsage::Unprotected => {
                let mut rest = i.rest();
                ensure!(rest.len() >= 2, "missing secret key checksum");
                let raw = rest.split_to(rest.len() - 2);
                let params = PlainSecretParams::try_from_buf(alg, &raw[..])?;
                let expected = params.checksum_simple()?;
                if rest[..] != expected.to_be_bytes() {
                    bail!("invalid secret key checksum");
                }
                return Ok(SecretParams::Plain(params));
            }
            S2kUsage::Cfb | S2kUsage::MalleableCfb => {
                let sym_alg = SymmetricKeyAlgorithm::from(i.read_u8()?);
                let s2k = StringToKey::from_buf(&mut i)?;
                (sym_alg, s2k)
            }
            S2kUsage::LegacyCfb(sym_alg) => (
                sym_alg,
                StringToKey::Simple {
                    hash_alg: HashAlgorithm::Md5,
                },
            ),
        };

        let (iv, data) = if matches!(s2k, StringToKey::Private { .. }) {
            // stubs carry no key material
            (Bytes::new(), Bytes::new())
        } else {
            let iv = i.read_take(sym_alg.block_size())?;
            (iv, i.rest())
        };

        Ok(SecretParams::Encrypted(EncryptedSecretParams {
            data,
            iv,
            s2k_usage,
            sym_alg,
            s2k,
        }))
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, SecretParams::Encrypted(_))
    }

    /// Returns the plain parameters, decrypting them with `passphrase` if needed.
    pub fn unlock(
        &self,
        version: KeyVersion,
        alg: PublicKeyAlgorithm,
        passphrase: &str,
    ) -> Result<PlainSecretParams> {
        match self {
            SecretParams::Plain(params) => Ok(params.clone()),
            SecretParams::Encrypted(params) => params.unlock(version, alg, passphrase),
        }
    }
}

impl Serialize for SecretParams {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            SecretParams::Plain(params) => {
                writer.write_u8(0)?;
                params.to_writer(writer)?;
                writer.write_u16::<BigEndian>(params.checksum_simple()?)?;
            }
            SecretParams::Encrypted(params) => {
                writer.write_u8(params.s2k_usage.into())?;
                match params.s2k_usage {
                    S2kUsage::Cfb | S2kUsage::MalleableCfb => {
                        writer.write_u8(params.sym_alg.into())?;
                        params.s2k.to_writer(writer)?;
                    }
                    S2kUsage::LegacyCfb(_) => {}
                    S2kUsage::Unprotected => bail!("encrypted parameters without protection"),
                }
                writer.write_all(&params.iv)?;
                writer.write_all(&params.data)?;
            }
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            SecretParams::Plain(params) => 1 + params.write_len() + 2,
            SecretParams::Encrypted(params) => {
                let header = match params.s2k_usage {
                    S2kUsage::Cfb | S2kUsage::MalleableCfb => 1 + params.s2k.write_len(),
                    _ => 0,
                };
                1 + header + params.iv.len() + params.data.len()
            }
        }
    }
}
