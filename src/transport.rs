use std::io;
use std::net;
use std::sync::Mutex;
use std::time;

const SOCKET_POLLING_KEY: usize = 0;

/// Unreliable datagram service the protocol runs on.
///
/// Both engines share one transport, so all operations take `&self`.
pub trait Transport: Send + Sync + 'static {
    /// Sends a single datagram to `addr`.
    fn send_to(&self, frame: &[u8], addr: &net::SocketAddr) -> io::Result<()>;

    /// Blocks for a duration of up to `timeout` for an incoming datagram and copies it into
    /// `buffer`. Returns Ok(None) if nothing arrived in the allotted time.
    fn wait_for_frame(
        &self,
        buffer: &mut [u8],
        timeout: Option<time::Duration>,
    ) -> io::Result<Option<(usize, net::SocketAddr)>>;
}

/// A [`Transport`] over a UDP socket.
pub struct UdpTransport {
    // Non-blocking socket, readiness is reported by the poller
    socket: net::UdpSocket,
    // Cached from socket initialization
    local_addr: net::SocketAddr,
    // Polling objects
    poller: polling::Poller,
    poller_events: Mutex<polling::Events>,
}

impl UdpTransport {
    pub fn bind<A>(bind_address: A) -> io::Result<Self>
    where
        A: net::ToSocketAddrs,
    {
        let socket = net::UdpSocket::bind(bind_address)?;
        socket.set_nonblocking(true)?;

        let local_addr = socket.local_addr()?;

        let poller = polling::Poller::new()?;

        unsafe {
            poller.add(&socket, polling::Event::readable(SOCKET_POLLING_KEY))?;
        }

        Ok(Self {
            socket,
            local_addr,
            poller,
            poller_events: Mutex::new(polling::Events::new()),
        })
    }

    pub fn local_addr(&self) -> net::SocketAddr {
        self.local_addr
    }

    /// If a datagram can be read from the socket, copies it into `buffer`. Returns Ok(None)
    /// otherwise.
    fn try_read_frame(&self, buffer: &mut [u8]) -> io::Result<Option<(usize, net::SocketAddr)>> {
        match self.socket.recv_from(buffer) {
            Ok((frame_len, sender_addr)) => Ok(Some((frame_len, sender_addr))),
            Err(err) => match err.kind() {
                // The only acceptable error is WouldBlock, indicating no packet
                io::ErrorKind::WouldBlock => Ok(None),
                _ => Err(err),
            },
        }
    }
}

impl Transport for UdpTransport {
    fn send_to(&self, frame: &[u8], addr: &net::SocketAddr) -> io::Result<()> {
        self.socket.send_to(frame, addr).map(|_| ())
    }

    fn wait_for_frame(
        &self,
        buffer: &mut [u8],
        timeout: Option<time::Duration>,
    ) -> io::Result<Option<(usize, net::SocketAddr)>> {
        // Several datagrams may be pending after a single readiness event
        if let Some(frame) = self.try_read_frame(buffer)? {
            return Ok(Some(frame));
        }

        let mut events = self
            .poller_events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // Interest is oneshot, rearm prior to each wait() call
        self.poller
            .modify(&self.socket, polling::Event::readable(SOCKET_POLLING_KEY))?;

        events.clear();

        let n = self.poller.wait(&mut *events, timeout)?;

        if n > 0 {
            self.try_read_frame(buffer)
        } else {
            Ok(None)
        }
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        let _ = self.poller.delete(&self.socket);
    }
}
