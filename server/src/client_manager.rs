//! Connection tracking for the tag server
//!
//! This module owns the mapping between UDP peer addresses and the player ids
//! the rest of the server works with:
//! - Connection lifecycle (connect, disconnect, timeout)
//! - Activity tracking for liveness detection
//! - Client capacity management and address lookup
//!
//! Room membership and per-player input live in the room registry; a client here
//! is only a reachable endpoint.

use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A connected endpoint
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server, also used as player id
    pub id: u32,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
}

impl Client {
    pub fn new(id: u32, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
        }
    }

    /// Marks the client as active right now
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Returns true if no packets have been received from this client
    /// within the specified timeout duration.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected clients
///
/// Provides centralized control over client connections and enforces the
/// server capacity limit. Ids are never reused during a server run.
pub struct ClientManager {
    /// Connected clients indexed by their unique ID
    clients: HashMap<u32, Client>,
    /// Next available client ID for new connections
    next_client_id: u32,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Attempts to add a new client connection
    ///
    /// Returns Some(client_id) if successful, None if server is at capacity.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, Client::new(client_id, addr));

        Some(client_id)
    }

    /// Removes a client. Returns false if they were already gone.
    pub fn remove_client(&mut self, client_id: &u32) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!("Client {} disconnected", client.id);
            true
        } else {
            false
        }
    }

    /// Finds a client ID by their network address
    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Refreshes the activity timestamp of a client. Returns false for unknown ids.
    pub fn touch(&mut self, client_id: u32) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.touch();
                true
            }
            None => false,
        }
    }

    pub fn addr_of(&self, client_id: u32) -> Option<SocketAddr> {
        self.clients.get(&client_id).map(|client| client.addr)
    }

    /// Resolves player ids to addresses, skipping ids that are no longer connected
    pub fn addrs_of(&self, client_ids: &[u32]) -> Vec<SocketAddr> {
        client_ids
            .iter()
            .filter_map(|id| self.addr_of(*id))
            .collect()
    }

    /// Checks for and removes timed-out clients
    ///
    /// Returns the removed client IDs together with their addresses so the
    /// caller can clean up room state and tell the peer why it was dropped.
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<(u32, SocketAddr)> {
        let timed_out: Vec<(u32, SocketAddr)> = self
            .clients
            .values()
            .filter(|client| client.is_timed_out(timeout))
            .map(|client| (client.id, client.addr))
            .collect();

        for (client_id, _) in &timed_out {
            self.remove_client(client_id);
        }

        timed_out
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
