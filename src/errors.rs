use std::num::TryFromIntError;

use snafu::Snafu;

use crate::types::{KeyId, Tag};

pub type Result<T, E = Error> = ::std::result::Result<T, E>;

pub use crate::parsing::{Error as ParsingError, RemainingError};

/// Error types
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("invalid input"))]
    InvalidInput,
    #[snafu(transparent)]
    PacketParsing { source: ParsingError },
    #[snafu(display("invalid {tag:?} packet: {source}"))]
    InvalidPacketContent { tag: Tag, source: Box<Error> },
    #[snafu(display("Not yet implemented: {message}"))]
    Unimplemented { message: String },
    /// Signals packet versions and parameters we don't support, but can safely ignore
    #[snafu(display("Unsupported: {message}"))]
    Unsupported { message: String },
    #[snafu(display("{message}"))]
    Message { message: String },
    #[snafu(display(
        "invalid keyring structure: expected {expected}, found {}",
        found.map(|tag| format!("{tag:?}")).unwrap_or_else(|| "end of input".to_string())
    ))]
    KeyringStructure {
        expected: &'static str,
        found: Option<Tag>,
    },
    #[snafu(display("integrity check failed: {reason}"))]
    Integrity { reason: &'static str },
    #[snafu(display("key mismatch: {message}"))]
    KeyMismatch { message: String },
    #[snafu(display("revocation refused: {message}"))]
    Revocation { message: String },
    #[snafu(display("cannot verify signature: {message}"))]
    Verification { message: String },
    #[snafu(display("missing key {key_id}"))]
    MissingKey { key_id: KeyId },
    #[snafu(display("invalid passphrase"))]
    InvalidPassphrase,
    #[snafu(display("operation was cancelled"))]
    Cancelled,
    #[snafu(display("operation timed out after {seconds} seconds"))]
    Timeout { seconds: u64 },
    #[snafu(display("cfb: invalid key iv length"))]
    CfbInvalidKeyIvLength,
    #[snafu(transparent)]
    IO { source: std::io::Error },
    #[snafu(transparent)]
    RSAError { source: rsa::errors::Error },
    #[snafu(transparent)]
    SignatureError { source: signature::Error },
    #[snafu(transparent)]
    Utf8Error { source: std::str::Utf8Error },
    #[snafu(transparent)]
    TryFromInt { source: TryFromIntError },
}

impl Error {
    /// Malformed wire data: the packet being decoded is unusable.
    pub fn is_codec(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput
                | Self::PacketParsing { .. }
                | Self::InvalidPacketContent { .. }
                | Self::Unsupported { .. }
                | Self::Unimplemented { .. }
                | Self::Message { .. }
                | Self::Utf8Error { .. }
        )
    }

    /// The MDC quick check or digest did not match.
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Integrity { .. })
    }

    /// The packet stream does not follow the keyring grammar.
    pub fn is_keyring_structure(&self) -> bool {
        matches!(self, Self::KeyringStructure { .. })
    }
}

impl From<cipher::InvalidLength> for Error {
    fn from(_: cipher::InvalidLength) -> Error {
        Error::CfbInvalidKeyIvLength
    }
}

impl From<String> for Error {
    fn from(err: String) -> Error {
        Error::Message { message: err }
    }
}

impl From<derive_builder::UninitializedFieldError> for Error {
    fn from(err: derive_builder::UninitializedFieldError) -> Error {
        Error::Message {
            message: err.to_string(),
        }
    }
}

macro_rules! unimplemented_err {
    ($e:expr) => {
        return Err($crate::errors::Error::Unimplemented { message: $e.to_string() })
    };
    ($fmt:expr, $($arg:tt)+) => {
        return Err($crate::errors::Error::Unimplemented { message: format!($fmt, $($arg)+)})
    };
}

macro_rules! unsupported_err {
    ($e:expr) => {
        return Err($crate::errors::Error::Unsupported { message: $e.to_string()})
    };
    ($fmt:expr, $($arg:tt)+) => {
        return Err($crate::errors::Error::Unsupported { message: format!($fmt, $($arg)+) })
    };
}

macro_rules! bail {
    ($e:expr) => {
        return Err($crate::errors::Error::Message { message: $e.to_string() })
    };
    ($fmt:expr, $($arg:tt)+) => {
        return Err($crate::errors::Error::Message { message: format!($fmt, $($arg)+) })
    };
}

macro_rules! format_err {
    ($e:expr) => {
        $crate::errors::Error::Message { message: $e.to_string() }
    };
    ($fmt:expr, $($arg:tt)+) => {
        $crate::errors::Error::Message { message: format!($fmt, $($arg)+) }
    };
}

macro_rules! ensure {
    ($cond:expr, $e:expr) => {
        if !($cond) {
            return Err($crate::errors::Error::Message { message: $e.to_string() });
        }
    };
    ($cond:expr, $fmt:expr, $($arg:tt)+) => {
        if !($cond) {
            return Err($crate::errors::Error::Message { message: format!($fmt, $($arg)+) });
        }
    };
}

macro_rules! ensure_eq {
    ($left:expr, $right:expr) => ({
        match (&$left, &$right) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
                    return Err($crate::errors::Error::Message {
                        message: format!(
                            "assertion failed: `(left == right)`\n  left: `{:?}`,\n right: `{:?}`",
                            left_val, right_val
                        ),
                    });
                }
            }
        }
    });
    ($left:expr, $right:expr, $($arg:tt)+) => ({
        match (&($left), &($right)) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
                    return Err($crate::errors::Error::Message {
                        message: format!(
                            "assertion failed: `(left == right)`\n  left: `{:?}`,\n right: `{:?}`: {}",
                            left_val, right_val, format_args!($($arg)+)
                        ),
                    });
                }
            }
        }
    });
}

pub(crate) use {bail, ensure, ensure_eq, format_err, unimplemented_err, unsupported_err};
