use bytes::{Buf, BufMut, Bytes, BytesMut};
use log::{debug, warn};

use crate::errors::{bail, Result};
use crate::packet::header::read_new_length;
use crate::packet::{Packet, PacketHeader};
use crate::parsing::BufParsing;
use crate::types::PacketLength;

/// Iterates over the packets in a buffer.
///
/// A packet whose body fails to decode is yielded as an error and parsing
/// continues with the next packet. Broken framing (a bad header or a truncated
/// body) ends the iteration after yielding the error, as there is no way to
/// find the next packet boundary.
#[derive(Debug)]
pub struct PacketParser {
    input: Bytes,
    done: bool,
}

impl PacketParser {
    pub fn new(input: impl Into<Bytes>) -> Self {
        PacketParser {
            input: input.into(),
            done: false,
        }
    }

    fn read_body(&mut self, header: &PacketHeader) -> Result<Bytes> {
        match header.packet_length() {
            PacketLength::Fixed(len) => Ok(self.input.read_take(len.try_into()?)?),
            PacketLength::Indeterminate => Ok(self.input.rest()),
            PacketLength::Partial(first) => {
                if first < 512 {
                    warn!("first partial body chunk of {} bytes is below 512", first);
                }
                let mut body = BytesMut::new();
                let mut chunk = first;
                loop {
                    body.put(self.input.read_take(chunk.try_into()?)?);
                    match read_new_length(&mut self.input)? {
                        PacketLength::Partial(len) => chunk = len,
                        PacketLength::Fixed(len) => {
                            body.put(self.input.read_take(len.try_into()?)?);
                            break;
                        }
                        PacketLength::Indeterminate => bail!("invalid partial body length"),
                    }
                }
                debug!("reassembled partial body of {} bytes", body.len());
                Ok(body.freeze())
            }
        }
    }
}

impl Iterator for PacketParser {
    type Item = Result<Packet>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || !self.input.has_remaining() {
            return None;
        }

        let framed = PacketHeader::from_buf(&mut self.input)
            .and_then(|header| Ok((header, self.read_body(&header)?)));
        match framed {
            Ok((header, body)) => Some(Packet::from_bytes(header, body)),
            Err(err) => {
                warn!("stopping at broken packet framing: {}", err);
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::packet::{PacketTrait, UserId};
    use crate::ser::Serialize;
    use crate::types::Tag;

    #[test]
    fn test_partial_body() {
        let _ = pretty_env_logger::try_init();
        // new format user id: a 2 byte partial chunk, a 1 byte partial chunk, then 2 fixed bytes
        let raw = hex!("cd e1 4142 e0 43 02 4445");
        let packets: Vec<_> = PacketParser::new(raw.to_vec()).collect::<Result<_>>().unwrap();
        assert_eq!(packets.len(), 1);

        let id = UserId::try_from(packets[0].clone()).unwrap();
        assert_eq!(id.id(), b"ABCDE");
        // written back as one fixed length body
        assert_eq!(packets[0].to_bytes().unwrap(), hex!("cd 05 4142434445").to_vec());
    }

    #[test]
    fn test_indeterminate_length() {
        let raw = hex!("b7 414243");
        let packets: Vec<_> = PacketParser::new(raw.to_vec()).collect::<Result<_>>().unwrap();
        assert_eq!(packets[0].tag(), Tag::UserId);
        assert_eq!(packets[0].to_bytes().unwrap(), raw.to_vec());
    }

    #[test]
    fn test_recovers_after_bad_body() {
        // a marker with the wrong content, followed by a valid user id
        let raw = hex!("a8 03 585858 b4 01 41");
        let mut parser = PacketParser::new(raw.to_vec());
        assert!(parser.next().unwrap().is_err());
        assert_eq!(parser.next().unwrap().unwrap().tag(), Tag::UserId);
        assert!(parser.next().is_none());
    }

    #[test]
    fn test_stops_on_truncation() {
        let raw = hex!("b4 05 41 b4 01 41");
        let mut parser = PacketParser::new(raw.to_vec());
        let err = parser.next().unwrap().unwrap_err();
        assert!(err.is_codec());
        assert!(parser.next().is_none());
    }
}
