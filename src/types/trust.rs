use crate::errors::{Error, Result};

/// How much the keyring owner trusts a key's owner to certify other keys.
///
/// Stored in the low three bits of a key's trust byte. The values 3 and 4 are
/// reserved and never produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, derive_more::Display)]
#[repr(u8)]
pub enum OwnerTrust {
    #[default]
    #[display("undefined")]
    Undefined = 0,
    #[display("unknown")]
    Unknown = 1,
    #[display("not usually trusted")]
    NotUsuallyTrusted = 2,
    #[display("usually trusted")]
    UsuallyTrusted = 5,
    #[display("always trusted")]
    AlwaysTrusted = 6,
    #[display("ultimate")]
    Ultimate = 7,
}

impl OwnerTrust {
    /// Converts the three owner trust bits, `None` for the reserved values.
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Self::Undefined),
            1 => Some(Self::Unknown),
            2 => Some(Self::NotUsuallyTrusted),
            5 => Some(Self::UsuallyTrusted),
            6 => Some(Self::AlwaysTrusted),
            7 => Some(Self::Ultimate),
            _ => None,
        }
    }

    /// Maps the amount of a trust signature to an owner trust level.
    ///
    /// Only the two PGP 2.6 values are meaningful: 60 is partial and 120 is
    /// complete trust, anything else carries no trust.
    pub const fn from_trust_amount(amount: u8) -> Self {
        match amount {
            60 => Self::UsuallyTrusted,
            120 => Self::AlwaysTrusted,
            _ => Self::Undefined,
        }
    }
}

impl TryFrom<u8> for OwnerTrust {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Self::from_bits(value).ok_or(Error::InvalidInput)
    }
}

/// Computed confidence that a user id really belongs to the key it is bound to.
///
/// Stored in the low two bits of a user binding's trust byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, derive_more::Display)]
#[repr(u8)]
pub enum KeyLegitimacy {
    #[default]
    #[display("unknown")]
    Unknown = 0,
    #[display("not trusted")]
    NotTrusted = 1,
    #[display("marginally trusted")]
    Marginal = 2,
    #[display("completely trusted")]
    Complete = 3,
}

impl KeyLegitimacy {
    const fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::Unknown,
            1 => Self::NotTrusted,
            2 => Self::Marginal,
            _ => Self::Complete,
        }
    }
}

/// The one byte trust record attached to keys, user bindings and signatures.
///
/// For keys and signatures the low three bits hold an [`OwnerTrust`], followed by
/// the expired, disabled, revoked and buckstop flags. For user bindings the low
/// two bits hold a [`KeyLegitimacy`] and the top bit is the warn-only flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TrustByte(u8);

impl TrustByte {
    pub const OWNER_TRUST_MASK: u8 = 0x07;
    pub const EXPIRED: u8 = 0x10;
    pub const DISABLED: u8 = 0x20;
    pub const REVOKED: u8 = 0x40;
    pub const BUCKSTOP: u8 = 0x80;

    pub const LEGITIMACY_MASK: u8 = 0x03;
    pub const WARN_ONLY: u8 = 0x80;

    pub const fn new(bits: u8) -> Self {
        TrustByte(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    fn flag(self, mask: u8) -> bool {
        self.0 & mask != 0
    }

    fn set_flag(&mut self, mask: u8, value: bool) {
        if value {
            self.0 |= mask;
        } else {
            self.0 &= !mask;
        }
    }

    /// The owner trust bits; reserved values read as undefined.
    pub fn owner_trust(self) -> OwnerTrust {
        OwnerTrust::from_bits(self.0 & Self::OWNER_TRUST_MASK).unwrap_or_default()
    }

    pub fn set_owner_trust(&mut self, trust: OwnerTrust) {
        self.0 = (self.0 & !Self::OWNER_TRUST_MASK) | trust as u8;
    }

    pub fn is_buckstop(self) -> bool {
        self.flag(Self::BUCKSTOP)
    }

    pub fn set_buckstop(&mut self, value: bool) {
        self.set_flag(Self::BUCKSTOP, value)
    }

    pub fn is_revoked(self) -> bool {
        self.flag(Self::REVOKED)
    }

    pub fn set_revoked(&mut self, value: bool) {
        self.set_flag(Self::REVOKED, value)
    }

    pub fn is_disabled(self) -> bool {
        self.flag(Self::DISABLED)
    }

    pub fn set_disabled(&mut self, value: bool) {
        self.set_flag(Self::DISABLED, value)
    }

    pub fn is_expired(self) -> bool {
        self.flag(Self::EXPIRED)
    }

    pub fn set_expired(&mut self, value: bool) {
        self.set_flag(Self::EXPIRED, value)
    }

    pub fn legitimacy(self) -> KeyLegitimacy {
        KeyLegitimacy::from_bits(self.0)
    }

    pub fn set_legitimacy(&mut self, legitimacy: KeyLegitimacy) {
        self.0 = (self.0 & !Self::LEGITIMACY_MASK) | legitimacy as u8;
    }

    pub fn is_warn_only(self) -> bool {
        self.flag(Self::WARN_ONLY)
    }

    pub fn set_warn_only(&mut self, value: bool) {
        self.set_flag(Self::WARN_ONLY, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_trust_bits() {
        let mut trust = TrustByte::new(TrustByte::BUCKSTOP | 0x03);
        // reserved
        assert_eq!(trust.owner_trust(), OwnerTrust::Undefined);

        trust.set_owner_trust(OwnerTrust::AlwaysTrusted);
        assert_eq!(trust.bits(), 0x86);
        assert!(trust.is_buckstop());

        trust.set_revoked(true);
        trust.set_owner_trust(OwnerTrust::Unknown);
        assert_eq!(trust.bits(), 0xC1);
        assert!(trust.is_revoked());
        assert!(!trust.is_disabled());
    }

    #[test]
    fn test_legitimacy_bits() {
        let mut trust = TrustByte::default();
        trust.set_warn_only(true);
        trust.set_legitimacy(KeyLegitimacy::Complete);
        assert_eq!(trust.bits(), 0x83);

        trust.set_legitimacy(KeyLegitimacy::NotTrusted);
        assert_eq!(trust.legitimacy(), KeyLegitimacy::NotTrusted);
        assert!(trust.is_warn_only());
    }

    #[test]
    fn test_reserved_owner_trust() {
        assert!(OwnerTrust::try_from(3).is_err());
        assert!(OwnerTrust::try_from(4).is_err());
        assert!(OwnerTrust::try_from(8).is_err());
        assert_eq!(OwnerTrust::try_from(7).unwrap(), OwnerTrust::Ultimate);
    }

    #[test]
    fn test_trust_amount_buckets() {
        assert_eq!(OwnerTrust::from_trust_amount(60), OwnerTrust::UsuallyTrusted);
        assert_eq!(OwnerTrust::from_trust_amount(120), OwnerTrust::AlwaysTrusted);
        assert_eq!(OwnerTrust::from_trust_amount(255), OwnerTrust::Undefined);
        assert_eq!(OwnerTrust::from_trust_amount(61), OwnerTrust::Undefined);
    }
}
