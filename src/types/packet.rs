use num_enum::{FromPrimitive, IntoPrimitive, TryFromPrimitive};

/// Represents the packet length.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PacketLength {
    Fixed(u32),
    /// Old format only: the packet extends to the end of the input.
    Indeterminate,
    /// New format only: the first chunk of a partial body.
    Partial(u32),
}

impl PacketLength {
    /// Returns the length in bytes, if it is specified.
    pub fn maybe_len(&self) -> Option<u32> {
        match self {
            Self::Fixed(len) => Some(*len),
            Self::Indeterminate => None,
            Self::Partial(len) => Some(*len),
        }
    }
}

/// Packet tags of RFC 4880 section 4.3.
///
/// Keyrings only ever hold key, user, signature, trust and marker packets; the
/// message tags are known so that stray packets can be named in errors.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
#[non_exhaustive]
pub enum Tag {
    PublicKeyEncryptedSessionKey = 1,
    Signature = 2,
    SymKeyEncryptedSessionKey = 3,
    OnePassSignature = 4,
    SecretKey = 5,
    PublicKey = 6,
    SecretSubkey = 7,
    /// Carried opaque, never inflated.
    CompressedData = 8,
    /// Legacy encryption without an integrity check.
    SymEncryptedData = 9,
    /// Ignored by readers, the literal bytes "PGP".
    Marker = 10,
    LiteralData = 11,
    /// Local keyring bookkeeping following a key, user or signature packet.
    Trust = 12,
    UserId = 13,
    PublicSubkey = 14,
    UserAttribute = 17,
    /// Encrypted data followed by a modification detection code.
    SymEncryptedProtectedData = 18,
    ModDetectionCode = 19,

    #[num_enum(catch_all)]
    Other(u8),
}

impl Tag {
    /// Tags that start a certificate in a keyring.
    pub fn is_primary_key(self) -> bool {
        matches!(self, Tag::PublicKey | Tag::SecretKey)
    }

    pub fn is_subkey(self) -> bool {
        matches!(self, Tag::PublicSubkey | Tag::SecretSubkey)
    }
}

/// Header framing, RFC 4880 section 4.2. PGP 2.6 only reads the old format,
/// which cannot express tags above 15 or partial body lengths.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, TryFromPrimitive)]
#[repr(u8)]
pub enum PacketHeaderVersion {
    Old = 0,
    #[default]
    New = 1,
}

/// The two bit length-type of an old format header.
///
/// This is chosen by whoever writes the packet and is kept as read, so
/// re-encoding a keyring written by another implementation reproduces its bytes.
#[derive(Debug, PartialEq, Eq, Clone, Copy, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum OldLengthType {
    OneOctet = 0,
    TwoOctet = 1,
    FourOctet = 2,
    Indeterminate = 3,
}

impl OldLengthType {
    /// The shortest length type able to hold `len`.
    pub fn for_len(len: u32) -> Self {
        if len < 256 {
            Self::OneOctet
        } else if len < 65536 {
            Self::TwoOctet
        } else {
            Self::FourOctet
        }
    }

    /// Can a body of `len` bytes be described with this length type?
    pub fn fits(self, len: u32) -> bool {
        match self {
            Self::OneOctet => len < 256,
            Self::TwoOctet => len < 65536,
            Self::FourOctet | Self::Indeterminate => true,
        }
    }

    /// Number of length octets following the tag byte.
    pub fn octets(self) -> usize {
        match self {
            Self::OneOctet => 1,
            Self::TwoOctet => 2,
            Self::FourOctet => 4,
            Self::Indeterminate => 0,
        }
    }
}

/// Version of key packets.
#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Hash, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum KeyVersion {
    V2 = 2,
    V3 = 3,
    V4 = 4,

    #[num_enum(catch_all)]
    Other(u8),
}

impl KeyVersion {
    /// MD5 fingerprints for the legacy versions, SHA-1 for V4.
    pub const fn fingerprint_len(&self) -> Option<usize> {
        match self {
            KeyVersion::V2 | KeyVersion::V3 => Some(16),
            KeyVersion::V4 => Some(20),
            KeyVersion::Other(_) => None,
        }
    }

    /// V2 and V3 keys follow PGP 2.6 rules.
    pub fn is_legacy(&self) -> bool {
        matches!(self, KeyVersion::V2 | KeyVersion::V3)
    }
}

impl Default for KeyVersion {
    fn default() -> Self {
        Self::V4
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum PkeskVersion {
    V3 = 3,

    #[num_enum(catch_all)]
    Other(u8),
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum SkeskVersion {
    V4 = 4,

    #[num_enum(catch_all)]
    Other(u8),
}
