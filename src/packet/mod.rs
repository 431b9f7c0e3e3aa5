//! Wire packets.

use std::net;

pub mod serial;

pub use serial::{decode, encode, HEADER_SIZE, VERSION};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum PacketType {
    /// Carries user data.
    Data,
    /// Opens a connection and declares the initial sequence number.
    Bsn,
    /// Cumulative acknowledgement; the sequence number is the next one expected.
    Ack,
    /// Closes a connection.
    Fin,
}

impl PacketType {
    pub fn is_control(self) -> bool {
        self != PacketType::Data
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Packet {
    pub kind: PacketType,
    pub seq: u32,
    pub payload: Box<[u8]>,
    // Source address, filled in on receipt; never transmitted
    pub addr: Option<net::SocketAddr>,
}

impl Packet {
    pub fn data(seq: u32, payload: Box<[u8]>) -> Self {
        Self {
            kind: PacketType::Data,
            seq,
            payload,
            addr: None,
        }
    }

    pub fn control(kind: PacketType, seq: u32) -> Self {
        debug_assert!(kind.is_control());

        Self {
            kind,
            seq,
            payload: Box::new([]),
            addr: None,
        }
    }
}
