/*

gudp provides reliable, ordered delivery of discrete messages over UDP. Every message is one
datagram, and every send and receive names the peer explicitly.

# Packets

Four packet types share an 8-byte header (version, type, sequence number, payload length):

  BSN   opens a connection, carries the randomly chosen initial sequence number
  DATA  carries one application message
  ACK   cumulative acknowledgement: the next sequence number the receiver expects
  FIN   closes a connection

BSN, DATA and FIN occupy consecutive sequence numbers of the same connection:

  seq:   n     n+1   n+2   ...   n+k   n+k+1
  type:  BSN   DATA  DATA  ...   DATA  FIN

Sequence numbers are compared modulo 2^32, since the initial value may sit anywhere in the range.

# Sender

Messages are queued per destination by send() and nothing is transmitted until finish(). Then a
single sender thread serves destinations one after another, in the order they were first used.
For the current destination it keeps at most `window_size` packets in flight (go-back-N):

            base      next         base+window
            v         v            v
  ----------##########_____________.........
  #: sent, unacknowledged   _: sendable   .: queued

An ACK for value v means everything below v arrived, so base jumps to v. A single timer covers
the window. When it expires, everything in [base, next) is sent again. After `retry_max`
unanswered retransmissions the destination is abandoned and reported as failed, and the sender
moves on to the next destination. A destination is finished once its FIN is acknowledged.

# Receiver

A receiver thread reads every datagram, acknowledging and dispatching by source address. Only the
packet carrying the expected sequence number is accepted; anything else is answered with the
current (unchanged) acknowledgement and otherwise ignored. There is no reorder buffer, recovery
is entirely up to the sender's timer.

ACKs are forwarded to the sender thread over a channel. Accepted payloads are queued per source,
and receive() hands them out one source at a time, in the order sources connected.

*/

pub mod config;
mod endpoint;
mod endpoint_table;
pub mod error;
pub mod packet;
mod receiver;
mod sender;
mod seq;
mod socket;
pub mod transport;

pub use config::Config;
pub use error::{Error, FormatError, Result};
pub use sender::SendOutcome;
pub use socket::Socket;
pub use transport::{Transport, UdpTransport};
