use std::net;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time;

use log::{debug, trace, warn};

use crate::endpoint::{RecvEndpoint, Reply};
use crate::endpoint_table::EndpointTable;
use crate::error::{Error, Result};
use crate::packet::{self, Packet, PacketType};
use crate::sender::Request;
use crate::transport::Transport;

// How often the receive loop checks for shutdown while the transport is quiet
const POLL_INTERVAL: time::Duration = time::Duration::from_millis(50);

// Bound on remembered finished connections
const LINGER_MAX: usize = 256;

// Final state of an evicted connection
#[derive(Clone, Copy, Debug)]
struct Linger {
    bsn: u32,
    ack: u32,
}

struct IncomingState {
    table: EndpointTable<RecvEndpoint>,
    // Evicted connections, oldest first; late BSN and FIN retransmissions are answered from here
    lingering: EndpointTable<Linger>,
    linger_max: usize,
    closed: bool,
}

impl IncomingState {
    fn linger(&mut self, addr: net::SocketAddr, record: Linger) {
        self.lingering.insert(addr, record);

        while self.lingering.len() > self.linger_max {
            self.lingering.pop_front();
        }
    }
}

/// Receive-direction endpoint table shared between the receiver engine and readers.
pub struct Incoming {
    state: Mutex<IncomingState>,
    ready: Condvar,
}

impl Incoming {
    pub fn new() -> Self {
        Self::with_linger_max(LINGER_MAX)
    }

    fn with_linger_max(linger_max: usize) -> Self {
        Self {
            state: Mutex::new(IncomingState {
                table: EndpointTable::new(),
                lingering: EndpointTable::new(),
                linger_max,
                closed: false,
            }),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, IncomingState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Blocks until the earliest peer has a payload ready, and returns it.
    pub fn wait_packet(&self) -> Result<(Box<[u8]>, net::SocketAddr)> {
        let mut state = self.lock();

        loop {
            if state.closed {
                return Err(Error::Closed);
            }

            let evicted = match state.table.front_mut() {
                Some((&addr, endpoint)) => {
                    if let Some(payload) = endpoint.pop() {
                        return Ok((payload, addr));
                    }

                    if endpoint.is_drained() {
                        let record = Linger {
                            bsn: endpoint.bsn(),
                            ack: endpoint.expected(),
                        };

                        Some((addr, record))
                    } else {
                        None
                    }
                }
                None => None,
            };

            if let Some((addr, record)) = evicted {
                debug!("{}: evicting finished endpoint", addr);

                state.table.pop_front();
                state.linger(addr, record);

                continue;
            }

            state = self
                .ready
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Applies an inbound BSN, DATA or FIN packet. Returns the acknowledgement to send, if any.
    pub fn handle_packet(&self, packet: Packet, from: net::SocketAddr) -> Option<u32> {
        let mut guard = self.lock();
        let state = &mut *guard;

        let reply = if let Some(endpoint) = state.table.get_mut(&from) {
            match packet.kind {
                PacketType::Bsn => endpoint.handle_bsn(packet.seq),
                PacketType::Data => endpoint.handle_data(packet.seq, packet.payload),
                PacketType::Fin => endpoint.handle_fin(packet.seq),
                PacketType::Ack => return None,
            }
        } else {
            let lingering = state.lingering.get(&from).copied();

            match packet.kind {
                PacketType::Bsn => match lingering {
                    // Delayed duplicate of a connection that already finished
                    Some(record) if record.bsn == packet.seq => {
                        trace!("{}: BSN for finished connection {}", from, packet.seq);

                        Reply {
                            ack: record.ack,
                            wake: false,
                        }
                    }
                    _ => {
                        state.lingering.remove(&from);

                        let endpoint = state
                            .table
                            .get_or_insert_with(&from, || RecvEndpoint::new(from, packet.seq));

                        Reply {
                            ack: endpoint.expected(),
                            wake: true,
                        }
                    }
                },
                PacketType::Fin => match lingering {
                    Some(record) if record.ack == packet.seq.wrapping_add(1) => Reply {
                        ack: record.ack,
                        wake: false,
                    },
                    _ => {
                        trace!("{}: FIN for unknown connection", from);
                        return None;
                    }
                },
                PacketType::Data => {
                    trace!("{}: data for unknown connection", from);
                    return None;
                }
                PacketType::Ack => return None,
            }
        };

        drop(guard);

        if reply.wake {
            self.ready.notify_all();
        }

        Some(reply.ack)
    }

    /// Fails all current and future waits.
    pub fn close(&self) {
        self.lock().closed = true;
        self.ready.notify_all();
    }
}

/// Reads the transport, demultiplexes packets by source address and acknowledges them.
pub struct ReceiverEngine<T> {
    transport: Arc<T>,
    incoming: Arc<Incoming>,
    requests: mpsc::Sender<Request>,
    shutdown: Arc<AtomicBool>,
    // Always-allocated receive buffer
    recv_buffer: Box<[u8]>,
}

impl<T> ReceiverEngine<T>
where
    T: Transport,
{
    pub fn new(
        transport: Arc<T>,
        incoming: Arc<Incoming>,
        requests: mpsc::Sender<Request>,
        shutdown: Arc<AtomicBool>,
        datagram_size_max: usize,
    ) -> Self {
        Self {
            transport,
            incoming,
            requests,
            shutdown,
            recv_buffer: vec![0; datagram_size_max].into_boxed_slice(),
        }
    }

    pub fn run(mut self) {
        debug!("receiver engine started");

        while !self.shutdown.load(Ordering::Acquire) {
            match self
                .transport
                .wait_for_frame(&mut self.recv_buffer, Some(POLL_INTERVAL))
            {
                Ok(Some((frame_len, from))) => self.handle_frame(frame_len, from),
                Ok(None) => (),
                Err(err) => warn!("receive failed: {}", err),
            }
        }

        debug!("receiver engine stopped");
    }

    fn handle_frame(&mut self, frame_len: usize, from: net::SocketAddr) {
        let packet = match packet::decode(&self.recv_buffer[..frame_len], from) {
            Ok(packet) => packet,
            Err(err) => {
                debug!("dropping datagram from {}: {}", from, err);
                return;
            }
        };

        trace!("{}: received {:?} {}", from, packet.kind, packet.seq);

        if packet.kind == PacketType::Ack {
            // Sender may not be running yet, or may have halted already
            let _ = self.requests.send(Request::Ack {
                peer: from,
                seq: packet.seq,
            });
            return;
        }

        if let Some(ack) = self.incoming.handle_packet(packet, from) {
            let frame = packet::serial::encode_control(PacketType::Ack, ack);

            if let Err(err) = self.transport.send_to(&frame, &from) {
                warn!("{}: failed to send ack {}: {}", from, ack, err);
            }
        }
    }
}
