use std::io;
use std::net;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use log::{debug, warn};

use crate::config::Config;
use crate::endpoint::SendEndpoint;
use crate::endpoint_table::EndpointTable;
use crate::error::{Error, Result};
use crate::packet;
use crate::receiver::{Incoming, ReceiverEngine};
use crate::sender::{Request, SendOutcome, SenderEngine};
use crate::transport::{Transport, UdpTransport};

enum Outgoing {
    // Payloads are being queued, nothing has been sent yet
    Buffering(EndpointTable<SendEndpoint>),
    // The table belongs to the sender engine
    Finished,
    Closed,
}

#[derive(Default)]
struct Threads {
    sender: Option<thread::JoinHandle<()>>,
    receiver: Option<thread::JoinHandle<()>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A reliable datagram socket.
///
/// Payloads passed to [`Socket::send`] are buffered per destination and only hit the network once
/// [`Socket::finish`] is called, after which each destination is served in turn: connection
/// establishment, data, then termination. Incoming connections are accepted by
/// [`Socket::receive`].
pub struct Socket<T: Transport = UdpTransport> {
    // Saved configuration
    config: Config,
    // Shared with both engines; taken on close
    transport: Mutex<Option<Arc<T>>>,
    // Send-direction endpoints, until finish() hands them to the sender engine
    outgoing: Mutex<Outgoing>,
    // Receive-direction endpoints
    incoming: Arc<Incoming>,
    // Acknowledgements and shutdown requests for the sender engine
    requests_tx: mpsc::Sender<Request>,
    requests_rx: Mutex<Option<mpsc::Receiver<Request>>>,
    // Per-destination results from the sender engine
    outcomes_tx: Mutex<Option<mpsc::Sender<SendOutcome>>>,
    outcomes_rx: Mutex<mpsc::Receiver<SendOutcome>>,
    // Set once by close()
    shutdown: Arc<AtomicBool>,
    threads: Mutex<Threads>,
}

impl Socket<UdpTransport> {
    /// Equivalent to calling [`Socket::bind_with_config`] with default configuration.
    pub fn bind<A>(bind_address: A) -> io::Result<Self>
    where
        A: net::ToSocketAddrs,
    {
        Self::bind_with_config(bind_address, Default::default())
    }

    /// Binds a UDP socket to the provided address and returns a new socket object. Errors
    /// encountered during socket initialization are forwarded to the caller.
    pub fn bind_with_config<A>(bind_address: A, config: Config) -> io::Result<Self>
    where
        A: net::ToSocketAddrs,
    {
        let transport = UdpTransport::bind(bind_address)?;

        Ok(Self::with_transport(transport, config))
    }

    /// Returns the local address of the internal UDP socket, or `None` once closed.
    pub fn local_addr(&self) -> Option<net::SocketAddr> {
        lock(&self.transport)
            .as_ref()
            .map(|transport| transport.local_addr())
    }
}

impl<T> Socket<T>
where
    T: Transport,
{
    /// Wraps an existing transport.
    ///
    /// Panics if `config` is invalid.
    pub fn with_transport(transport: T, config: Config) -> Self {
        config.validate();

        let (requests_tx, requests_rx) = mpsc::channel();
        let (outcomes_tx, outcomes_rx) = mpsc::channel();

        Self {
            config,
            transport: Mutex::new(Some(Arc::new(transport))),
            outgoing: Mutex::new(Outgoing::Buffering(EndpointTable::new())),
            incoming: Arc::new(Incoming::new()),
            requests_tx,
            requests_rx: Mutex::new(Some(requests_rx)),
            outcomes_tx: Mutex::new(Some(outcomes_tx)),
            outcomes_rx: Mutex::new(outcomes_rx),
            shutdown: Arc::new(AtomicBool::new(false)),
            threads: Default::default(),
        }
    }

    fn transport(&self) -> Result<Arc<T>> {
        lock(&self.transport).clone().ok_or(Error::Closed)
    }

    /// Queues a payload for delivery to `addr`. Never blocks and never touches the network.
    pub fn send(&self, payload: &[u8], addr: net::SocketAddr) -> Result<()> {
        packet::serial::check_size(payload.len(), self.config.datagram_size_max)?;

        let mut outgoing = lock(&self.outgoing);

        let table = match *outgoing {
            Outgoing::Buffering(ref mut table) => table,
            Outgoing::Finished => return Err(Error::Finished),
            Outgoing::Closed => return Err(Error::Closed),
        };

        let endpoint = table.get_or_insert_with(&addr, || {
            let initial_seq = rand::random::<u32>();
            debug!("{}: new destination, initial sequence number {}", addr, initial_seq);

            SendEndpoint::new(addr, initial_seq)
        });

        endpoint.enqueue(payload.into(), self.config.datagram_size_max)?;

        Ok(())
    }

    /// Blocks until a payload is available and returns it along with its source address.
    ///
    /// Payloads from one source arrive in the order they were sent. Sources are served in the
    /// order they first connected; a source's payloads are all returned before the next source's.
    pub fn receive(&self) -> Result<(Box<[u8]>, net::SocketAddr)> {
        self.start_receiver()?;

        self.incoming.wait_packet()
    }

    /// Terminates every queued connection and starts transmission. May only be called once.
    pub fn finish(&self) -> Result<()> {
        let mut table = {
            let mut outgoing = lock(&self.outgoing);

            match std::mem::replace(&mut *outgoing, Outgoing::Finished) {
                Outgoing::Buffering(table) => table,
                Outgoing::Finished => return Err(Error::Finished),
                Outgoing::Closed => {
                    *outgoing = Outgoing::Closed;
                    return Err(Error::Closed);
                }
            }
        };

        for (_, endpoint) in table.iter_mut() {
            endpoint.enqueue_fin();
        }

        self.start_receiver()?;

        let mut threads = lock(&self.threads);

        if self.shutdown.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }

        let requests = lock(&self.requests_rx).take().ok_or(Error::Finished)?;
        let outcomes = lock(&self.outcomes_tx).take().ok_or(Error::Finished)?;

        let engine = SenderEngine::new(
            self.config.clone(),
            self.transport()?,
            table,
            requests,
            outcomes,
        );

        let handle = thread::Builder::new()
            .name("gudp-sender".into())
            .spawn(move || engine.run())?;

        threads.sender = Some(handle);

        Ok(())
    }

    /// Blocks until the sender engine reports the result for another destination. Returns `None`
    /// if `finish()` has not been called, or once every result has been returned.
    pub fn wait_outcome(&self) -> Option<SendOutcome> {
        if lock(&self.outcomes_tx).is_some() {
            return None;
        }

        lock(&self.outcomes_rx).recv().ok()
    }

    /// Blocks until the sender engine halts and returns the result for every destination.
    pub fn wait_sent(&self) -> Vec<SendOutcome> {
        let mut outcomes = Vec::new();

        while let Some(outcome) = self.wait_outcome() {
            outcomes.push(outcome);
        }

        outcomes
    }

    /// Stops both engines and releases the transport. Blocked and future calls to
    /// [`Socket::receive`] fail with [`Error::Closed`]. Calling this more than once has no effect.
    pub fn close(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }

        debug!("closing socket");

        *lock(&self.outgoing) = Outgoing::Closed;

        // The sender may be waiting on its request channel
        let _ = self.requests_tx.send(Request::Shutdown);

        self.incoming.close();

        let threads = std::mem::take(&mut *lock(&self.threads));

        for handle in [threads.sender, threads.receiver].into_iter().flatten() {
            if handle.join().is_err() {
                warn!("engine thread panicked");
            }
        }

        // Engines are gone, this is the last reference
        lock(&self.transport).take();
    }

    fn start_receiver(&self) -> Result<()> {
        let mut threads = lock(&self.threads);

        if threads.receiver.is_some() {
            return Ok(());
        }

        if self.shutdown.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }

        let engine = ReceiverEngine::new(
            self.transport()?,
            Arc::clone(&self.incoming),
            self.requests_tx.clone(),
            Arc::clone(&self.shutdown),
            self.config.datagram_size_max,
        );

        let handle = thread::Builder::new()
            .name("gudp-receiver".into())
            .spawn(move || engine.run())?;

        threads.receiver = Some(handle);

        Ok(())
    }
}

impl<T> Drop for Socket<T>
where
    T: Transport,
{
    fn drop(&mut self) {
        self.close();
    }
}
