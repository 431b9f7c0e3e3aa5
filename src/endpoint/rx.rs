use std::collections::VecDeque;
use std::net;

use log::{debug, trace};

use super::State;
use crate::seq;

/// Receive-direction state for a single peer.
///
/// Only the packet carrying `expected` is ever accepted. Everything else is answered with a
/// duplicate acknowledgement and left for the sender to retransmit.
pub struct RecvEndpoint {
    addr: net::SocketAddr,
    // Sequence number of the BSN that opened the connection
    bsn: u32,
    expected: u32,
    // Accepted payloads not yet consumed by the application
    delivered: VecDeque<Box<[u8]>>,
    state: State,
}

/// Reaction to an inbound packet.
#[derive(Debug, Eq, PartialEq)]
pub struct Reply {
    /// Acknowledgement value to send back.
    pub ack: u32,
    /// Whether a waiting reader may now make progress.
    pub wake: bool,
}

impl RecvEndpoint {
    pub fn new(addr: net::SocketAddr, bsn: u32) -> Self {
        trace!("{}: connection opened at {}", addr, bsn);

        Self {
            addr,
            bsn,
            expected: bsn.wrapping_add(1),
            delivered: VecDeque::new(),
            state: State::Active,
        }
    }

    /// Sequence number of the BSN that opened the current connection.
    pub fn bsn(&self) -> u32 {
        self.bsn
    }

    #[cfg(test)]
    pub fn state(&self) -> State {
        self.state
    }

    pub fn expected(&self) -> u32 {
        self.expected
    }

    pub fn handle_bsn(&mut self, seq: u32) -> Reply {
        if seq == self.bsn {
            // Retransmitted, our ack was lost
            return Reply {
                ack: self.expected,
                wake: false,
            };
        }

        debug!("{}: connection reopened at {}", self.addr, seq);

        // Undelivered data from the previous connection stays queued
        self.bsn = seq;
        self.expected = seq.wrapping_add(1);
        let wake = self.state != State::Active;
        self.state = State::Active;

        Reply {
            ack: self.expected,
            wake,
        }
    }

    pub fn handle_data(&mut self, seq: u32, payload: Box<[u8]>) -> Reply {
        if self.state == State::Active && seq == self.expected {
            trace!("{}: accepted packet {}", self.addr, seq);

            self.delivered.push_back(payload);
            self.expected = self.expected.wrapping_add(1);

            return Reply {
                ack: self.expected,
                wake: true,
            };
        }

        self.reject(seq)
    }

    pub fn handle_fin(&mut self, seq: u32) -> Reply {
        if self.state == State::Active && seq == self.expected {
            debug!("{}: connection finished", self.addr);

            self.expected = self.expected.wrapping_add(1);
            self.state = State::Finished;

            return Reply {
                ack: self.expected,
                wake: true,
            };
        }

        self.reject(seq)
    }

    fn reject(&self, seq: u32) -> Reply {
        if seq::lt(seq, self.expected) {
            trace!("{}: duplicate packet {}", self.addr, seq);
        } else {
            trace!(
                "{}: out of order packet {} (expected {})",
                self.addr,
                seq,
                self.expected
            );
        }

        Reply {
            ack: self.expected,
            wake: false,
        }
    }

    /// Removes the oldest accepted payload.
    pub fn pop(&mut self) -> Option<Box<[u8]>> {
        self.delivered.pop_front()
    }

    /// A finished endpoint with nothing left to deliver can be forgotten.
    pub fn is_drained(&self) -> bool {
        self.state == State::Finished && self.delivered.is_empty()
    }
}
