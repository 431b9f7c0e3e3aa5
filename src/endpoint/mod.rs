use std::io;
use std::net;
use std::time;

mod rx;
mod tx;

pub use rx::{RecvEndpoint, Reply};
pub use tx::SendEndpoint;

/// Lifecycle of a connection in one direction. Both non-active states are terminal.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum State {
    Active,
    Finished,
    MaxRetried,
}

/// Operations an endpoint needs from whoever is driving it.
pub trait HostContext {
    fn send_frame(&mut self, frame: &[u8], addr: &net::SocketAddr) -> io::Result<()>;
}

/// Polled retransmission timer.
#[derive(Debug, Default)]
pub struct Timer {
    deadline: Option<time::Instant>,
}

impl Timer {
    pub fn arm(&mut self, now: time::Instant, timeout: time::Duration) {
        self.deadline = Some(now + timeout);
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn is_expired(&self, now: time::Instant) -> bool {
        match self.deadline {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }

    /// Time left until expiry, or `None` if disarmed.
    pub fn remaining(&self, now: time::Instant) -> Option<time::Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }
}
