//! Parsing functions to parse data using [Buf].

use bytes::{Buf, Bytes};
use snafu::{ensure, Backtrace, Snafu};

/// Parsing errors
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("{}: reading {:?}", context, typ))]
    TooShort {
        typ: Typ,
        context: &'static str,
        #[snafu(backtrace)]
        source: RemainingError,
    },
    #[snafu(display("expected {}, found {}", hex::encode(expected), hex::encode(&found[..])))]
    TagMismatch {
        expected: Vec<u8>,
        found: Bytes,
        context: &'static str,
        backtrace: Option<Backtrace>,
    },
}

impl Error {
    /// Returns true if the error indictates that the input was too short.
    pub fn is_incomplete(&self) -> bool {
        match self {
            Self::TooShort { .. } => true,
            Self::TagMismatch { .. } => false,
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(display("needed {}, remaining {}", needed, remaining))]
pub struct RemainingError {
    pub needed: usize,
    pub remaining: usize,
    backtrace: Option<Backtrace>,
}

#[derive(Debug)]
pub enum Typ {
    U8,
    U16Be,
    U32Be,
    Array(usize),
    Take(usize),
}

/// Bounds checked reads. A failed read leaves the buffer untouched.
pub trait BufParsing: Buf + Sized {
    /// Runs `read` once `needed` bytes are known to be available.
    fn checked<T>(
        &mut self,
        needed: usize,
        typ: Typ,
        context: &'static str,
        read: impl FnOnce(&mut Self) -> T,
    ) -> Result<T, Error> {
        if self.remaining() < needed {
            let source = RemainingError {
                needed,
                remaining: self.remaining(),
                backtrace: snafu::GenerateImplicitData::generate(),
            };
            return Err(Error::TooShort {
                typ,
                context,
                source,
            });
        }
        Ok(read(self))
    }

    fn read_u8(&mut self) -> Result<u8, Error> {
        self.checked(1, Typ::U8, "u8", |b| b.get_u8())
    }

    fn read_be_u16(&mut self) -> Result<u16, Error> {
        self.checked(2, Typ::U16Be, "u16", |b| b.get_u16())
    }

    fn read_be_u32(&mut self) -> Result<u32, Error> {
        self.checked(4, Typ::U32Be, "u32", |b| b.get_u32())
    }

    fn read_array<const C: usize>(&mut self) -> Result<[u8; C], Error> {
        self.checked(C, Typ::Array(C), "array", |b| {
            let mut arr = [0u8; C];
            b.copy_to_slice(&mut arr);
            arr
        })
    }

    fn read_take(&mut self, size: usize) -> Result<Bytes, Error> {
        self.checked(size, Typ::Take(size), "take", |b| b.copy_to_bytes(size))
    }

    /// Consumes `expected.len()` bytes, failing unless they equal `expected`.
    fn read_tag(&mut self, expected: &[u8], context: &'static str) -> Result<(), Error> {
        let found = self.read_take(expected.len())?;
        ensure!(
            found == expected,
            TagMismatchSnafu {
                expected: expected.to_vec(),
                found,
                context,
            }
        );
        Ok(())
    }

    fn rest(&mut self) -> Bytes {
        self.copy_to_bytes(self.remaining())
    }
}

impl<B: Buf> BufParsing for B {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_past_end() {
        let mut buf = &[0x01, 0x02, 0x03][..];
        assert_eq!(buf.read_be_u16().unwrap(), 0x0102);

        let err = buf.read_be_u16().unwrap_err();
        assert!(err.is_incomplete());
        // a failed read does not consume anything
        assert_eq!(buf.read_u8().unwrap(), 0x03);
    }

    #[test]
    fn test_read_tag() {
        let mut buf = &[0xD3, 0x14, 0xFF][..];
        buf.read_tag(&[0xD3, 0x14], "mdc header").unwrap();
        assert!(buf.read_tag(&[0x00], "padding").is_err());
    }
}
