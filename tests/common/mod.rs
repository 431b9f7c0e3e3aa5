use std::collections::HashMap;
use std::io;
use std::net;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time;

use gudp::packet::{self, Packet, PacketType};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn addr(port: u16) -> net::SocketAddr {
    net::SocketAddr::from(([10, 0, 0, 1], port))
}

/// One datagram handed to the network.
#[derive(Clone, Debug)]
pub struct WireEvent {
    pub time: time::Instant,
    pub from: net::SocketAddr,
    pub to: net::SocketAddr,
    pub packet: Packet,
    pub dropped: bool,
    pub delay: Option<time::Duration>,
}

type DropRule = Box<dyn FnMut(&Packet, net::SocketAddr, net::SocketAddr) -> bool + Send>;

type DelayRule =
    Box<dyn FnMut(&Packet, net::SocketAddr, net::SocketAddr) -> Option<time::Duration> + Send>;

type Datagram = (Box<[u8]>, net::SocketAddr);

struct NetworkCore {
    mailboxes: Mutex<HashMap<net::SocketAddr, mpsc::Sender<Datagram>>>,
    trace: Mutex<Vec<WireEvent>>,
    drop_rule: Mutex<Option<DropRule>>,
    delay_rule: Mutex<Option<DelayRule>>,
}

/// In-memory datagram network with programmable loss and delay, and a full wire trace. Packets
/// without a delay are delivered instantly, so a delayed packet is overtaken by later ones.
#[derive(Clone)]
pub struct Network {
    core: Arc<NetworkCore>,
}

pub struct SimTransport {
    addr: net::SocketAddr,
    core: Arc<NetworkCore>,
    inbox: Mutex<mpsc::Receiver<Datagram>>,
}

impl Network {
    pub fn new() -> Self {
        Self {
            core: Arc::new(NetworkCore {
                mailboxes: Mutex::new(HashMap::new()),
                trace: Mutex::new(Vec::new()),
                drop_rule: Mutex::new(None),
                delay_rule: Mutex::new(None),
            }),
        }
    }

    /// Attaches a host at `addr`.
    pub fn transport(&self, addr: net::SocketAddr) -> SimTransport {
        let (tx, rx) = mpsc::channel();

        self.core.mailboxes.lock().unwrap().insert(addr, tx);

        SimTransport {
            addr,
            core: Arc::clone(&self.core),
            inbox: Mutex::new(rx),
        }
    }

    /// Installs a predicate deciding which packets are lost.
    pub fn set_drop_rule<F>(&self, rule: F)
    where
        F: FnMut(&Packet, net::SocketAddr, net::SocketAddr) -> bool + Send + 'static,
    {
        *self.core.drop_rule.lock().unwrap() = Some(Box::new(rule));
    }

    /// Installs a function choosing which packets are held back, and for how long.
    pub fn set_delay_rule<F>(&self, rule: F)
    where
        F: FnMut(&Packet, net::SocketAddr, net::SocketAddr) -> Option<time::Duration>
            + Send
            + 'static,
    {
        *self.core.delay_rule.lock().unwrap() = Some(Box::new(rule));
    }

    /// Delivers raw bytes, bypassing the trace.
    pub fn inject(&self, from: net::SocketAddr, to: net::SocketAddr, bytes: &[u8]) {
        if let Some(mailbox) = self.core.mailboxes.lock().unwrap().get(&to) {
            let _ = mailbox.send((bytes.into(), from));
        }
    }

    pub fn trace(&self) -> Vec<WireEvent> {
        self.core.trace.lock().unwrap().clone()
    }

    /// Delivered packets of one type sent by `from`.
    pub fn delivered(&self, from: net::SocketAddr, kind: PacketType) -> Vec<WireEvent> {
        self.trace()
            .into_iter()
            .filter(|e| e.from == from && e.packet.kind == kind && !e.dropped)
            .collect()
    }

    /// All transmissions, lost or not, of one type sent by `from`.
    pub fn sent(&self, from: net::SocketAddr, kind: PacketType) -> Vec<WireEvent> {
        self.trace()
            .into_iter()
            .filter(|e| e.from == from && e.packet.kind == kind)
            .collect()
    }
}

impl gudp::Transport for SimTransport {
    fn send_to(&self, frame: &[u8], to: &net::SocketAddr) -> io::Result<()> {
        let packet = packet::decode(frame, self.addr)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

        let dropped = match self.core.drop_rule.lock().unwrap().as_mut() {
            Some(rule) => rule(&packet, self.addr, *to),
            None => false,
        };

        let delay = if dropped {
            None
        } else {
            match self.core.delay_rule.lock().unwrap().as_mut() {
                Some(rule) => rule(&packet, self.addr, *to),
                None => None,
            }
        };

        self.core.trace.lock().unwrap().push(WireEvent {
            time: time::Instant::now(),
            from: self.addr,
            to: *to,
            packet,
            dropped,
            delay,
        });

        if dropped {
            return Ok(());
        }

        // Unknown hosts silently swallow datagrams, as with UDP
        let mailbox = match self.core.mailboxes.lock().unwrap().get(to) {
            Some(mailbox) => mailbox.clone(),
            None => return Ok(()),
        };

        let datagram = (Box::<[u8]>::from(frame), self.addr);

        match delay {
            Some(delay) => {
                std::thread::spawn(move || {
                    std::thread::sleep(delay);
                    let _ = mailbox.send(datagram);
                });
            }
            None => {
                let _ = mailbox.send(datagram);
            }
        }

        Ok(())
    }

    fn wait_for_frame(
        &self,
        buffer: &mut [u8],
        timeout: Option<time::Duration>,
    ) -> io::Result<Option<(usize, net::SocketAddr)>> {
        let inbox = self.inbox.lock().unwrap();

        let received = match timeout {
            Some(timeout) => inbox.recv_timeout(timeout).ok(),
            None => inbox.recv().ok(),
        };

        Ok(received.map(|(bytes, from)| {
            let len = bytes.len().min(buffer.len());
            buffer[..len].copy_from_slice(&bytes[..len]);
            (len, from)
        }))
    }
}

/// Config with short timers for simulated runs.
pub fn fast_config(window_size: u32, retry_max: u32, retransmit_timeout_ms: u64) -> gudp::Config {
    gudp::Config {
        window_size,
        retry_max,
        retransmit_timeout_ms,
        ..Default::default()
    }
}

/// Receives on `socket` in a background thread until it is closed.
pub fn spawn_collector<T>(
    socket: Arc<gudp::Socket<T>>,
) -> std::thread::JoinHandle<Vec<(Box<[u8]>, net::SocketAddr)>>
where
    T: gudp::Transport,
{
    std::thread::spawn(move || {
        let mut received = Vec::new();

        loop {
            match socket.receive() {
                Ok(message) => received.push(message),
                Err(gudp::Error::Closed) => return received,
                Err(err) => panic!("unexpected receive error: {}", err),
            }
        }
    })
}
