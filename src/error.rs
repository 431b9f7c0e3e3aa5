use std::{error, fmt, io, net, result};

/// A convenience wrapper around `Result` for [`Error`].
pub type Result<T> = result::Result<T, Error>;

/// Errors produced by socket operations and by the sender engine.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// The underlying transport failed.
    Io(io::Error),
    /// A datagram could not be decoded.
    Format(FormatError),
    /// An encoded packet would not fit into a single datagram.
    Oversize { size: usize, max: usize },
    /// The socket has been closed.
    Closed,
    /// `finish()` has already been called on this socket.
    Finished,
    /// The peer stopped acknowledging and all retransmissions were used up.
    ConnectionFailed(net::SocketAddr),
}

impl error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<FormatError> for Error {
    fn from(err: FormatError) -> Error {
        Error::Format(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::Io(ref err) => fmt::Display::fmt(err, f),
            Error::Format(ref err) => fmt::Display::fmt(err, f),
            Error::Oversize { size, max } => {
                write!(f, "packet of {size} bytes exceeds maximum datagram size of {max} bytes")
            }
            Error::Closed => write!(f, "socket is closed"),
            Error::Finished => write!(f, "socket has already been finished"),
            Error::ConnectionFailed(addr) => {
                write!(f, "connection to {addr} failed: retransmission limit reached")
            }
        }
    }
}

/// Error occurred while decoding a datagram.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FormatError {
    /// Datagram is shorter than the fixed header.
    Truncated { provided: usize, min: usize },
    /// Unknown protocol version.
    InvalidVersion { provided: u8, expected: u8 },
    /// Unknown packet type code.
    InvalidType(u8),
    /// Declared payload length disagrees with the bytes that follow the header.
    LengthMismatch { declared: usize, actual: usize },
}

impl error::Error for FormatError {}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            FormatError::Truncated { provided, min } => {
                write!(f, "truncated datagram: {provided} bytes (header is {min} bytes)")
            }
            FormatError::InvalidVersion { provided, expected } => {
                write!(f, "invalid version: {provided} (must be {expected})")
            }
            FormatError::InvalidType(code) => write!(f, "invalid packet type: {code}"),
            FormatError::LengthMismatch { declared, actual } => {
                write!(
                    f,
                    "payload length mismatch: header declares {declared} bytes, {actual} present"
                )
            }
        }
    }
}
