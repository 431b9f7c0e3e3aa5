//  0       1       2               6               8
// +-------+-------+---------------+---------------+------------------
// |version| type  | sequence no.  | payload len   | payload ...
// +-------+-------+---------------+---------------+------------------
//
// All fields are big-endian.

use std::net;

use byteorder::{ByteOrder, NetworkEndian};

use super::{Packet, PacketType};
use crate::error::{Error, FormatError};

pub const VERSION: u8 = 1;

pub const HEADER_SIZE: usize = 8;

const PAYLOAD_SIZE_MAX: usize = u16::MAX as usize;

const TYPE_DATA: u8 = 1;
const TYPE_BSN: u8 = 2;
const TYPE_ACK: u8 = 3;
const TYPE_FIN: u8 = 4;

fn type_code(kind: PacketType) -> u8 {
    match kind {
        PacketType::Data => TYPE_DATA,
        PacketType::Bsn => TYPE_BSN,
        PacketType::Ack => TYPE_ACK,
        PacketType::Fin => TYPE_FIN,
    }
}

fn read_type(code: u8) -> Option<PacketType> {
    match code {
        TYPE_DATA => Some(PacketType::Data),
        TYPE_BSN => Some(PacketType::Bsn),
        TYPE_ACK => Some(PacketType::Ack),
        TYPE_FIN => Some(PacketType::Fin),
        _ => None,
    }
}

/// Returns an error if a payload of `payload_len` bytes cannot be sent in a single datagram.
pub fn check_size(payload_len: usize, datagram_size_max: usize) -> Result<(), Error> {
    let size = HEADER_SIZE + payload_len;

    if payload_len > PAYLOAD_SIZE_MAX || size > datagram_size_max {
        return Err(Error::Oversize {
            size,
            max: datagram_size_max.min(HEADER_SIZE + PAYLOAD_SIZE_MAX),
        });
    }

    Ok(())
}

/// Serializes `packet`. The source address, if any, is not part of the encoding.
pub fn encode(packet: &Packet, datagram_size_max: usize) -> Result<Box<[u8]>, Error> {
    check_size(packet.payload.len(), datagram_size_max)?;

    let mut buf = vec![0; HEADER_SIZE + packet.payload.len()];

    buf[0] = VERSION;
    buf[1] = type_code(packet.kind);
    NetworkEndian::write_u32(&mut buf[2..6], packet.seq);
    NetworkEndian::write_u16(&mut buf[6..8], packet.payload.len() as u16);
    buf[HEADER_SIZE..].copy_from_slice(&packet.payload);

    Ok(buf.into_boxed_slice())
}

/// Serializes a payload-free control packet; these always fit.
pub fn encode_control(kind: PacketType, seq: u32) -> [u8; HEADER_SIZE] {
    let mut buf = [0; HEADER_SIZE];

    buf[0] = VERSION;
    buf[1] = type_code(kind);
    NetworkEndian::write_u32(&mut buf[2..6], seq);

    buf
}

/// Parses a datagram received from `from`.
pub fn decode(bytes: &[u8], from: net::SocketAddr) -> Result<Packet, FormatError> {
    if bytes.len() < HEADER_SIZE {
        return Err(FormatError::Truncated {
            provided: bytes.len(),
            min: HEADER_SIZE,
        });
    }

    if bytes[0] != VERSION {
        return Err(FormatError::InvalidVersion {
            provided: bytes[0],
            expected: VERSION,
        });
    }

    let kind = read_type(bytes[1]).ok_or(FormatError::InvalidType(bytes[1]))?;
    let seq = NetworkEndian::read_u32(&bytes[2..6]);
    let declared = NetworkEndian::read_u16(&bytes[6..8]) as usize;

    let payload = &bytes[HEADER_SIZE..];

    if declared != payload.len() {
        return Err(FormatError::LengthMismatch {
            declared,
            actual: payload.len(),
        });
    }

    Ok(Packet {
        kind,
        seq,
        payload: payload.into(),
        addr: Some(from),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_addr() -> net::SocketAddr {
        "127.0.0.1:4000".parse().unwrap()
    }

    #[test]
    fn data_round_trip() {
        let mut packet = Packet::data(0xFFFF_FFFE, b"hello"[..].into());
        packet.addr = Some(from_addr());

        let bytes = encode(&packet, 1472).unwrap();

        assert_eq!(bytes.len(), HEADER_SIZE + 5);
        assert_eq!(&bytes[..HEADER_SIZE], &[1, 1, 0xFF, 0xFF, 0xFF, 0xFE, 0, 5]);
        assert_eq!(decode(&bytes, from_addr()).unwrap(), packet);
    }

    #[test]
    fn control_layout() {
        let bytes = encode_control(PacketType::Ack, 0x0102_0304);

        assert_eq!(bytes, [1, 3, 1, 2, 3, 4, 0, 0]);

        let packet = decode(&bytes, from_addr()).unwrap();
        assert_eq!(packet.kind, PacketType::Ack);
        assert_eq!(packet.seq, 0x0102_0304);
        assert!(packet.payload.is_empty());
    }

    #[test]
    fn oversize_rejected() {
        let packet = Packet::data(0, vec![0; 100].into_boxed_slice());

        assert!(encode(&packet, HEADER_SIZE + 100).is_ok());

        match encode(&packet, HEADER_SIZE + 99) {
            Err(Error::Oversize { size, max }) => {
                assert_eq!(size, HEADER_SIZE + 100);
                assert_eq!(max, HEADER_SIZE + 99);
            }
            other => panic!("expected oversize error, got {:?}", other),
        }

        let huge = Packet::data(0, vec![0; PAYLOAD_SIZE_MAX + 1].into_boxed_slice());
        assert!(matches!(
            encode(&huge, usize::MAX),
            Err(Error::Oversize { .. })
        ));
    }

    #[test]
    fn decode_truncated() {
        assert_eq!(
            decode(&[1, 1, 0, 0], from_addr()),
            Err(FormatError::Truncated {
                provided: 4,
                min: HEADER_SIZE
            })
        );
        assert!(decode(&[], from_addr()).is_err());
    }

    #[test]
    fn decode_bad_version() {
        let mut bytes = encode_control(PacketType::Bsn, 7);
        bytes[0] = 2;

        assert_eq!(
            decode(&bytes, from_addr()),
            Err(FormatError::InvalidVersion {
                provided: 2,
                expected: VERSION
            })
        );
    }

    #[test]
    fn decode_bad_type() {
        let mut bytes = encode_control(PacketType::Bsn, 7);
        bytes[1] = 0;
        assert_eq!(decode(&bytes, from_addr()), Err(FormatError::InvalidType(0)));

        bytes[1] = 5;
        assert_eq!(decode(&bytes, from_addr()), Err(FormatError::InvalidType(5)));
    }

    #[test]
    fn decode_length_mismatch() {
        let packet = Packet::data(9, b"abc"[..].into());
        let bytes = encode(&packet, 1472).unwrap();

        // Short by one
        assert_eq!(
            decode(&bytes[..bytes.len() - 1], from_addr()),
            Err(FormatError::LengthMismatch {
                declared: 3,
                actual: 2
            })
        );

        // Trailing garbage
        let mut long = bytes.to_vec();
        long.push(0);
        assert_eq!(
            decode(&long, from_addr()),
            Err(FormatError::LengthMismatch {
                declared: 3,
                actual: 4
            })
        );
    }

    #[test]
    fn decode_garbage_never_panics() {
        for _ in 0..1000 {
            let len = rand::random::<usize>() % 32;
            let bytes = (0..len).map(|_| rand::random::<u8>()).collect::<Vec<_>>();

            let _ = decode(&bytes, from_addr());
        }
    }
}
