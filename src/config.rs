use std::time;

use crate::packet::HEADER_SIZE;

const WINDOW_SIZE_DEFAULT: u32 = 3;
const WINDOW_SIZE_MAX: u32 = 1 << 30;

const RETRY_MAX_DEFAULT: u32 = 10;

const RETRANSMIT_TIMEOUT_DEFAULT_MS: u64 = 1_000;

const DATAGRAM_SIZE_DEFAULT: usize = 1472;
const DATAGRAM_SIZE_MAX: usize = 65_507;

/// Configuration for a [`Socket`](crate::Socket) object.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum number of unacknowledged packets in flight per peer.
    ///
    /// Minimum value: 1 \
    /// Default value: 3
    pub window_size: u32,

    /// Number of times the outstanding window is retransmitted before a peer is given up on.
    ///
    /// Default value: 10
    pub retry_max: u32,

    /// Time without acknowledgement after which the outstanding window is retransmitted, in
    /// milliseconds.
    ///
    /// Minimum value: 1 \
    /// Default value: 1,000
    pub retransmit_timeout_ms: u64,

    /// Largest datagram that will be sent or accepted, header included.
    ///
    /// Minimum value: 9 \
    /// Maximum value: 65,507 \
    /// Default value: 1,472
    pub datagram_size_max: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window_size: WINDOW_SIZE_DEFAULT,
            retry_max: RETRY_MAX_DEFAULT,
            retransmit_timeout_ms: RETRANSMIT_TIMEOUT_DEFAULT_MS,
            datagram_size_max: DATAGRAM_SIZE_DEFAULT,
        }
    }
}

impl Config {
    pub(crate) fn validate(&self) {
        assert!(
            self.window_size >= 1 && self.window_size <= WINDOW_SIZE_MAX,
            "invalid socket configuration: window_size not in 1..={}",
            WINDOW_SIZE_MAX
        );
        assert!(
            self.retransmit_timeout_ms >= 1,
            "invalid socket configuration: retransmit_timeout_ms < 1"
        );
        assert!(
            self.datagram_size_max > HEADER_SIZE && self.datagram_size_max <= DATAGRAM_SIZE_MAX,
            "invalid socket configuration: datagram_size_max not in {}..={}",
            HEADER_SIZE + 1,
            DATAGRAM_SIZE_MAX
        );
    }

    pub(crate) fn retransmit_timeout(&self) -> time::Duration {
        time::Duration::from_millis(self.retransmit_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        Config::default().validate();
    }

    #[test]
    #[should_panic(expected = "window_size")]
    fn zero_window_rejected() {
        let config = Config {
            window_size: 0,
            ..Default::default()
        };

        config.validate();
    }

    #[test]
    #[should_panic(expected = "datagram_size_max")]
    fn header_sized_datagram_rejected() {
        let config = Config {
            datagram_size_max: HEADER_SIZE,
            ..Default::default()
        };

        config.validate();
    }
}
