//            base      next         base+window   end
//            v         v            v             v
// -----------##########_____________......------> sequence numbers
//
// #: in transit, awaiting acknowledgement
// _: sendable
// .: queued, outside the window

use std::collections::VecDeque;
use std::io;
use std::net;
use std::time;

use log::{debug, trace, warn};

use super::{HostContext, State, Timer};
use crate::config::Config;
use crate::error::Result;
use crate::packet::{self, Packet, PacketType};
use crate::seq;

/// Send-direction state for a single peer.
pub struct SendEndpoint {
    addr: net::SocketAddr,
    // Sequence number of the BSN packet
    bsn: u32,
    // Encoded frames for [base, end)
    frames: VecDeque<Box<[u8]>>,
    base: u32,
    next: u32,
    end: u32,
    fin: Option<u32>,
    retries: u32,
    timer: Timer,
    state: State,
}

impl SendEndpoint {
    /// Creates an endpoint whose first queued packet is a BSN carrying `initial_seq`.
    pub fn new(addr: net::SocketAddr, initial_seq: u32) -> Self {
        let mut frames = VecDeque::new();
        frames.push_back(Box::from(packet::serial::encode_control(PacketType::Bsn, initial_seq)));

        Self {
            addr,
            bsn: initial_seq,
            frames,
            base: initial_seq,
            next: initial_seq,
            end: initial_seq.wrapping_add(1),
            fin: None,
            retries: 0,
            timer: Timer::default(),
            state: State::Active,
        }
    }

    pub fn addr(&self) -> &net::SocketAddr {
        &self.addr
    }

    pub fn state(&self) -> State {
        self.state
    }

    #[cfg(test)]
    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn next(&self) -> u32 {
        self.next
    }

    #[cfg(test)]
    pub fn end(&self) -> u32 {
        self.end
    }

    #[cfg(test)]
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Queues a data packet and returns its sequence number.
    pub fn enqueue(&mut self, payload: Box<[u8]>, datagram_size_max: usize) -> Result<u32> {
        debug_assert!(self.fin.is_none(), "enqueue after FIN");

        let seq = self.end;
        let frame = packet::encode(&Packet::data(seq, payload), datagram_size_max)?;

        self.frames.push_back(frame);
        self.end = self.end.wrapping_add(1);

        Ok(seq)
    }

    /// Queues the FIN packet and returns its sequence number. Nothing may be enqueued after it.
    pub fn enqueue_fin(&mut self) -> u32 {
        if let Some(fin) = self.fin {
            return fin;
        }

        let seq = self.end;
        self.frames
            .push_back(Box::from(packet::serial::encode_control(PacketType::Fin, seq)));
        self.end = self.end.wrapping_add(1);
        self.fin = Some(seq);

        seq
    }

    /// Applies a cumulative acknowledgement. Returns true if the window base moved.
    pub fn advance_base(&mut self, ack: u32, now: time::Instant, config: &Config) -> bool {
        if self.state != State::Active {
            return false;
        }

        // The ack must land in (base, next], anything else is stale or bogus
        if !seq::lt(self.base, ack) || !seq::le(ack, self.next) {
            return false;
        }

        let acked = seq::distance(self.base, ack) as usize;
        self.frames.drain(..acked);

        self.base = ack;
        self.retries = 0;

        trace!("{}: base -> {}", self.addr, self.base);

        if let Some(fin) = self.fin {
            if seq::lt(fin, self.base) {
                debug!("{}: all packets acknowledged", self.addr);

                self.state = State::Finished;
                self.frames = VecDeque::new();
                self.timer.disarm();

                return true;
            }
        }

        if self.base == self.next {
            self.timer.disarm();
        } else {
            self.timer.arm(now, config.retransmit_timeout());
        }

        true
    }

    /// Sends every queued packet that fits in the window. Fails only if the very first
    /// transmission of the BSN could not be handed to the transport.
    pub fn transmit<C>(
        &mut self,
        now: time::Instant,
        config: &Config,
        host_ctx: &mut C,
    ) -> io::Result<()>
    where
        C: HostContext,
    {
        if self.state != State::Active {
            return Ok(());
        }

        let window_end = self.base.wrapping_add(config.window_size);

        while self.next != self.end && seq::lt(self.next, window_end) {
            let idx = seq::distance(self.base, self.next) as usize;

            if let Err(err) = host_ctx.send_frame(&self.frames[idx], &self.addr) {
                if self.next == self.bsn && self.retries == 0 {
                    return Err(err);
                }

                // Left for the retransmission timer
                warn!("{}: failed to send packet {}: {}", self.addr, self.next, err);
            } else {
                trace!("{}: sent packet {}", self.addr, self.next);
            }

            self.next = self.next.wrapping_add(1);
        }

        if self.base != self.next && !self.timer.is_armed() {
            self.timer.arm(now, config.retransmit_timeout());
        }

        Ok(())
    }

    /// Retransmits the outstanding window if the timer has expired, or gives up on the peer once
    /// `config.retry_max` retransmissions have been used.
    pub fn handle_timer<C>(&mut self, now: time::Instant, config: &Config, host_ctx: &mut C)
    where
        C: HostContext,
    {
        if self.state != State::Active || !self.timer.is_expired(now) {
            return;
        }

        if self.retries >= config.retry_max {
            warn!(
                "{}: no acknowledgement after {} retransmissions, giving up",
                self.addr, self.retries
            );

            self.abandon();
            return;
        }

        self.retries += 1;

        debug!(
            "{}: timeout, resending [{}, {}) (retry {})",
            self.addr, self.base, self.next, self.retries
        );

        let in_transit = seq::distance(self.base, self.next) as usize;

        for frame in self.frames.iter().take(in_transit) {
            if let Err(err) = host_ctx.send_frame(frame, &self.addr) {
                warn!("{}: failed to resend: {}", self.addr, err);
            }
        }

        self.timer.arm(now, config.retransmit_timeout());
    }

    /// Time left on the retransmission timer, if armed.
    pub fn timer_remaining(&self, now: time::Instant) -> Option<time::Duration> {
        self.timer.remaining(now)
    }

    /// Drops all outstanding data and stops transmission for good.
    pub fn abandon(&mut self) {
        self.state = State::MaxRetried;
        self.frames = VecDeque::new();
        self.timer.disarm();
    }
}
