//! Address bookkeeping for connected human players.
//!
//! UDP has no connection state, so the server tracks which socket address
//! belongs to which player and when it last heard from it. A client that goes
//! silent for longer than the connection timeout is treated as disconnected.

use log::info;
use shared::PlayerId;
use std::collections::HashMap;
use std::net::SocketAddr;

/// Silence after which a client is considered gone.
pub const CONNECTION_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone)]
pub struct Client {
    pub id: PlayerId,
    pub addr: SocketAddr,
    pub name: String,
    pub connected_at: u64,
    /// Last time any datagram arrived from this address.
    pub last_seen: u64,
}

impl Client {
    pub fn new(id: PlayerId, addr: SocketAddr, name: impl Into<String>, now: u64) -> Self {
        Self {
            id,
            addr,
            name: name.into(),
            connected_at: now,
            last_seen: now,
        }
    }

    pub fn is_timed_out(&self, now: u64, timeout_ms: u64) -> bool {
        now.saturating_sub(self.last_seen) > timeout_ms
    }
}

pub struct ClientManager {
    clients: HashMap<PlayerId, Client>,
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            max_clients,
        }
    }

    /// Registers a client under an id issued by the game state.
    ///
    /// Fails at capacity or when the id is already taken.
    pub fn add_client(&mut self, client: Client) -> bool {
        if self.clients.len() >= self.max_clients || self.clients.contains_key(&client.id) {
            return false;
        }
        info!("Client {} ({}) connected from {}", client.id, client.name, client.addr);
        self.clients.insert(client.id, client);
        true
    }

    pub fn remove_client(&mut self, client_id: &PlayerId) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!("Client {} disconnected from {}", client.id, client.addr);
            true
        } else {
            false
        }
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<PlayerId> {
        self.clients
            .values()
            .find(|client| client.addr == addr)
            .map(|client| client.id)
    }

    /// Records that `addr` is still alive. Returns its player id if known.
    pub fn touch(&mut self, addr: SocketAddr, now: u64) -> Option<PlayerId> {
        let client = self.clients.values_mut().find(|client| client.addr == addr)?;
        client.last_seen = now;
        Some(client.id)
    }

    /// Removes and returns clients silent for longer than the connection timeout.
    pub fn check_timeouts(&mut self, now: u64) -> Vec<PlayerId> {
        let mut timed_out: Vec<PlayerId> = self
            .clients
            .values()
            .filter(|client| client.is_timed_out(now, CONNECTION_TIMEOUT_MS))
            .map(|client| client.id)
            .collect();
        timed_out.sort_unstable();

        for client_id in &timed_out {
            self.remove_client(client_id);
        }
        timed_out
    }

    /// Every (id, address) pair, for broadcasting.
    pub fn get_client_addrs(&self) -> Vec<(PlayerId, SocketAddr)> {
        let mut addrs: Vec<(PlayerId, SocketAddr)> = self
            .clients
            .values()
            .map(|client| (client.id, client.addr))
            .collect();
        addrs.sort_unstable_by_key(|(id, _)| *id);
        addrs
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    #[test]
    fn test_client_creation() {
        let client = Client::new(1, test_addr(), "alice", 100);
        assert_eq!(client.id, 1);
        assert_eq!(client.addr, test_addr());
        assert_eq!(client.name, "alice");
        assert_eq!(client.last_seen, 100);
    }

    #[test]
    fn test_client_timeout() {
        let client = Client::new(1, test_addr(), "alice", 0);
        assert!(!client.is_timed_out(CONNECTION_TIMEOUT_MS, CONNECTION_TIMEOUT_MS));
        assert!(client.is_timed_out(CONNECTION_TIMEOUT_MS + 1, CONNECTION_TIMEOUT_MS));
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = ClientManager::new(1);
        assert!(manager.add_client(Client::new(1, test_addr(), "a", 0)));
        assert!(!manager.add_client(Client::new(2, test_addr2(), "b", 0)));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_add_duplicate_id() {
        let mut manager = ClientManager::new(4);
        assert!(manager.add_client(Client::new(1, test_addr(), "a", 0)));
        assert!(!manager.add_client(Client::new(1, test_addr2(), "b", 0)));
    }

    #[test]
    fn test_remove_client() {
        let mut manager = ClientManager::new(2);
        manager.add_client(Client::new(1, test_addr(), "a", 0));

        assert!(manager.remove_client(&1));
        assert!(manager.is_empty());
        assert!(!manager.remove_client(&999));
    }

    #[test]
    fn test_find_client_by_addr() {
        let mut manager = ClientManager::new(2);
        manager.add_client(Client::new(3, test_addr(), "a", 0));
        manager.add_client(Client::new(4, test_addr2(), "b", 0));

        assert_eq!(manager.find_client_by_addr(test_addr()), Some(3));
        assert_eq!(manager.clients[&4].addr, test_addr2());

        let unknown: SocketAddr = "192.168.1.1:9999".parse().unwrap();
        assert_eq!(manager.find_client_by_addr(unknown), None);
    }

    #[test]
    fn test_touch_and_check_timeouts() {
        let mut manager = ClientManager::new(2);
        manager.add_client(Client::new(1, test_addr(), "a", 0));
        manager.add_client(Client::new(2, test_addr2(), "b", 0));

        assert_eq!(manager.touch(test_addr(), 4_000), Some(1));
        let timed_out = manager.check_timeouts(CONNECTION_TIMEOUT_MS + 1);

        assert_eq!(timed_out, vec![2]);
        assert_eq!(manager.len(), 1);
        assert!(manager.clients.contains_key(&1));
    }

    #[test]
    fn test_get_client_addrs_sorted() {
        let mut manager = ClientManager::new(3);
        manager.add_client(Client::new(5, test_addr(), "a", 0));
        manager.add_client(Client::new(2, test_addr2(), "b", 0));

        let addrs = manager.get_client_addrs();
        assert_eq!(addrs, vec![(2, test_addr2()), (5, test_addr())]);
    }
}
