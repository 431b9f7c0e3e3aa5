use std::collections::VecDeque;
use std::net;

/// Endpoints keyed by peer address, kept in the order peers first appeared.
///
/// Tables hold a handful of peers at most, so lookups are a linear scan.
pub struct EndpointTable<E> {
    entries: VecDeque<(net::SocketAddr, E)>,
}

impl<E> Default for EndpointTable<E> {
    fn default() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }
}

impl<E> EndpointTable<E> {
    pub fn new() -> Self {
        Default::default()
    }

    fn position(&self, addr: &net::SocketAddr) -> Option<usize> {
        self.entries.iter().position(|(a, _)| a == addr)
    }

    pub fn get(&self, addr: &net::SocketAddr) -> Option<&E> {
        self.position(addr).map(|idx| &self.entries[idx].1)
    }

    pub fn get_mut(&mut self, addr: &net::SocketAddr) -> Option<&mut E> {
        self.position(addr).map(move |idx| &mut self.entries[idx].1)
    }

    /// Returns the endpoint for `addr`, appending a new one if the peer is unknown.
    pub fn get_or_insert_with<F>(&mut self, addr: &net::SocketAddr, f: F) -> &mut E
    where
        F: FnOnce() -> E,
    {
        let idx = match self.position(addr) {
            Some(idx) => idx,
            None => {
                self.entries.push_back((*addr, f()));
                self.entries.len() - 1
            }
        };

        &mut self.entries[idx].1
    }

    /// Inserts `e` as the newest entry, replacing any existing entry for `addr`.
    pub fn insert(&mut self, addr: net::SocketAddr, e: E) {
        self.remove(&addr);
        self.entries.push_back((addr, e));
    }

    pub fn remove(&mut self, addr: &net::SocketAddr) -> Option<E> {
        self.position(addr)
            .and_then(|idx| self.entries.remove(idx))
            .map(|(_, e)| e)
    }

    /// Entry at position `idx` in insertion order.
    pub fn get_index_mut(&mut self, idx: usize) -> Option<(&net::SocketAddr, &mut E)> {
        self.entries.get_mut(idx).map(|(addr, e)| (&*addr, e))
    }

    pub fn front_mut(&mut self) -> Option<(&net::SocketAddr, &mut E)> {
        self.get_index_mut(0)
    }

    pub fn pop_front(&mut self) -> Option<(net::SocketAddr, E)> {
        self.entries.pop_front()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&net::SocketAddr, &mut E)> {
        self.entries.iter_mut().map(|(addr, e)| (&*addr, e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
