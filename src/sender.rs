use std::io;
use std::net;
use std::sync::mpsc;
use std::sync::Arc;
use std::time;

use log::{debug, trace, warn};

use crate::config::Config;
use crate::endpoint::{HostContext, SendEndpoint, State};
use crate::endpoint_table::EndpointTable;
use crate::error::{Error, Result};
use crate::seq;
use crate::transport::Transport;

// Upper bound on a wait when the current endpoint has no timer running
const IDLE_WAIT: time::Duration = time::Duration::from_millis(100);

/// Messages delivered to the sender engine.
#[derive(Debug)]
pub enum Request {
    /// The peer at `peer` acknowledged everything below `seq`.
    Ack { peer: net::SocketAddr, seq: u32 },
    /// Stop as soon as possible.
    Shutdown,
}

/// Final result for one destination.
#[derive(Debug)]
pub struct SendOutcome {
    pub peer: net::SocketAddr,
    pub result: Result<()>,
}

/// Highest acknowledgement seen from the endpoint being serviced.
#[derive(Debug, Default)]
struct AckRecord {
    high: Option<u32>,
}

impl AckRecord {
    fn observe(&mut self, ack: u32) {
        self.high = Some(match self.high {
            Some(high) => seq::max(high, ack),
            None => ack,
        });
    }

    fn reset(&mut self) {
        self.high = None;
    }
}

struct TransportContext<'a, T> {
    transport: &'a T,
}

impl<'a, T> HostContext for TransportContext<'a, T>
where
    T: Transport,
{
    fn send_frame(&mut self, frame: &[u8], addr: &net::SocketAddr) -> io::Result<()> {
        self.transport.send_to(frame, addr)
    }
}

enum Step {
    // Current endpoint still active; wait at most this long before the next pass
    Wait(time::Duration),
    // Current endpoint reached a terminal state
    Advance(Result<()>),
}

/// Drives the send table onto the transport, one destination at a time in the order destinations
/// were first used.
pub struct SenderEngine<T> {
    config: Config,
    transport: Arc<T>,
    table: EndpointTable<SendEndpoint>,
    // Index of the endpoint being serviced
    current: usize,
    acks: AckRecord,
    requests: mpsc::Receiver<Request>,
    outcomes: mpsc::Sender<SendOutcome>,
}

impl<T> SenderEngine<T>
where
    T: Transport,
{
    pub fn new(
        config: Config,
        transport: Arc<T>,
        table: EndpointTable<SendEndpoint>,
        requests: mpsc::Receiver<Request>,
        outcomes: mpsc::Sender<SendOutcome>,
    ) -> Self {
        Self {
            config,
            transport,
            table,
            current: 0,
            acks: AckRecord::default(),
            requests,
            outcomes,
        }
    }

    pub fn run(mut self) {
        debug!("sender engine started, {} destination(s)", self.table.len());

        while self.current < self.table.len() {
            let wait = match self.service(time::Instant::now()) {
                Step::Wait(wait) => wait,
                Step::Advance(result) => {
                    self.advance(result);
                    continue;
                }
            };

            let request = match self.requests.recv_timeout(wait) {
                Ok(request) => request,
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            };

            if !self.handle_request(request) {
                break;
            }

            // Merge whatever else has arrived before the next pass
            loop {
                match self.requests.try_recv() {
                    Ok(request) => {
                        if !self.handle_request(request) {
                            debug!("sender engine shut down");
                            return;
                        }
                    }
                    Err(mpsc::TryRecvError::Empty) => break,
                    Err(mpsc::TryRecvError::Disconnected) => return,
                }
            }
        }

        debug!("sender engine halted");
    }

    /// Returns false if the engine should stop.
    fn handle_request(&mut self, request: Request) -> bool {
        match request {
            Request::Ack { peer, seq: ack } => {
                if let Some((addr, endpoint)) = self.table.get_index_mut(self.current) {
                    // Acks for data never sent would mask later valid ones
                    if *addr == peer && seq::le(ack, endpoint.next()) {
                        self.acks.observe(ack);
                    } else {
                        trace!("ignoring ack {} from {}", ack, peer);
                    }
                }

                true
            }
            Request::Shutdown => false,
        }
    }

    /// Runs one pass over the current endpoint.
    fn service(&mut self, now: time::Instant) -> Step {
        let (_, endpoint) = match self.table.get_index_mut(self.current) {
            Some(entry) => entry,
            None => return Step::Wait(IDLE_WAIT),
        };

        let ref mut host_ctx = TransportContext {
            transport: &*self.transport,
        };

        if let Some(ack) = self.acks.high {
            endpoint.advance_base(ack, now, &self.config);
        }

        if let Err(err) = endpoint.transmit(now, &self.config, host_ctx) {
            warn!("{}: could not send BSN: {}", endpoint.addr(), err);

            endpoint.abandon();
            return Step::Advance(Err(Error::Io(err)));
        }

        endpoint.handle_timer(now, &self.config, host_ctx);

        match endpoint.state() {
            State::Active => Step::Wait(endpoint.timer_remaining(now).unwrap_or(IDLE_WAIT)),
            State::Finished => Step::Advance(Ok(())),
            State::MaxRetried => Step::Advance(Err(Error::ConnectionFailed(*endpoint.addr()))),
        }
    }

    /// Reports the current endpoint's outcome and moves on to the next destination.
    fn advance(&mut self, result: Result<()>) {
        if let Some((&peer, _)) = self.table.get_index_mut(self.current) {
            match result {
                Ok(()) => debug!("{}: transfer complete", peer),
                Err(ref err) => debug!("{}: transfer failed: {}", peer, err),
            }

            // The application may have stopped listening
            let _ = self.outcomes.send(SendOutcome { peer, result });
        }

        self.current += 1;
        self.acks.reset();
    }
}
