use num_enum::{FromPrimitive, IntoPrimitive};

/// Public key algorithm ids.
/// Ref: <https://tools.ietf.org/html/rfc4880.html#section-9.1>
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum PublicKeyAlgorithm {
    /// RSA (Encrypt and Sign)
    RSA = 1,
    /// DEPRECATED: RSA (Encrypt-Only)
    RSAEncrypt = 2,
    /// DEPRECATED: RSA (Sign-Only)
    RSASign = 3,
    /// Elgamal (Encrypt-Only)
    ElgamalEncrypt = 16,
    /// DSA (Digital Signature Algorithm)
    DSA = 17,
    /// Elliptic Curve: RFC-6637
    ECDH = 18,
    /// ECDSA: RFC-6637
    ECDSA = 19,
    /// DEPRECATED: Elgamal (Encrypt and Sign)
    Elgamal = 20,
    /// Reserved for Diffie-Hellman (X9.42, as defined for IETF-S/MIME)
    DiffieHellman = 21,
    /// EdDSA legacy format
    EdDSALegacy = 22,

    #[num_enum(catch_all)]
    Unknown(u8),
}

impl PublicKeyAlgorithm {
    pub fn is_rsa(self) -> bool {
        matches!(self, Self::RSA | Self::RSAEncrypt | Self::RSASign)
    }

    /// Can keys of this algorithm make signatures?
    pub fn can_sign(self) -> bool {
        matches!(
            self,
            Self::RSA | Self::RSASign | Self::DSA | Self::ECDSA | Self::Elgamal | Self::EdDSALegacy
        )
    }

    /// Short uppercase name used when listing keys (`R`, `D`, `g`, ...).
    pub fn letter(self) -> char {
        match self {
            Self::RSA | Self::RSAEncrypt | Self::RSASign => 'R',
            Self::DSA => 'D',
            Self::ElgamalEncrypt | Self::Elgamal => 'g',
            Self::ECDH => 'e',
            Self::ECDSA | Self::EdDSALegacy => 'E',
            _ => '?',
        }
    }
}
