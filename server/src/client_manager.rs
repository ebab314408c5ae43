//! Connection tracking for participants
//!
//! This module handles the host-side bookkeeping of connected participants:
//! - Admission of new connections through the session gate
//! - The two-step handshake (approved, then established on `Ready`)
//! - Address lookup for incoming packets
//! - Connection health monitoring and timeout detection
//!
//! Only established participants may feed the input registry. An approved
//! connection still holds a slot while its handshake is in flight, so the
//! capacity check counts it.

use crate::admission::SessionAdmission;
use log::info;
use shared::{AdmissionRejection, ClientId, SessionPhase};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A participant's connection as tracked by the host
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the host
    pub id: ClientId,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
    /// Set once the client acknowledged the approval with `Ready`
    pub established: bool,
    /// Sequence number of the last input received
    pub last_input_sequence: u32,
}

impl Client {
    pub fn new(id: ClientId, addr: SocketAddr, now: Instant) -> Self {
        Self {
            id,
            addr,
            last_seen: now,
            established: false,
            last_input_sequence: 0,
        }
    }

    /// Checks if the client has exceeded the connection timeout
    pub fn is_timed_out(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) > timeout
    }
}

/// Manages every connection holding a slot in the session
///
/// Client IDs start at 1 and are never reused within one manager, so a
/// stale packet can never be attributed to a newer participant.
pub struct ClientManager {
    clients: HashMap<ClientId, Client>,
    next_client_id: ClientId,
    admission: SessionAdmission,
}

impl ClientManager {
    pub fn new(capacity: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            admission: SessionAdmission::new(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.admission.capacity()
    }

    /// Runs the admission gate and reserves a slot on approval.
    pub fn admit(
        &mut self,
        addr: SocketAddr,
        phase: SessionPhase,
        now: Instant,
    ) -> Result<ClientId, AdmissionRejection> {
        self.admission.evaluate(self.clients.len(), phase)?;

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} approved from {}", client_id, addr);
        self.clients.insert(client_id, Client::new(client_id, addr, now));

        Ok(client_id)
    }

    /// Marks the handshake complete. Returns true only on the first call.
    pub fn establish(&mut self, client_id: ClientId, now: Instant) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) if !client.established => {
                client.established = true;
                client.last_seen = now;
                info!("Client {} established", client_id);
                true
            }
            _ => false,
        }
    }

    pub fn remove_client(&mut self, client_id: &ClientId) -> Option<Client> {
        let removed = self.clients.remove(client_id);
        if let Some(client) = &removed {
            info!("Client {} disconnected", client.id);
        }
        removed
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<ClientId> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    pub fn get(&self, client_id: &ClientId) -> Option<&Client> {
        self.clients.get(client_id)
    }

    pub fn is_established(&self, client_id: &ClientId) -> bool {
        self.clients
            .get(client_id)
            .map(|client| client.established)
            .unwrap_or(false)
    }

    /// Refreshes the last-seen time of a client
    pub fn touch(&mut self, client_id: ClientId, now: Instant) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.last_seen = now;
        }
    }

    /// Notes the newest input sequence seen from a client and returns how
    /// many inputs went missing in between. Late or repeated inputs count
    /// as no gap.
    pub fn record_input_sequence(&mut self, client_id: ClientId, sequence: u32) -> u32 {
        let Some(client) = self.clients.get_mut(&client_id) else {
            return 0;
        };

        let last = client.last_input_sequence;
        if last != 0 && sequence <= last {
            return 0;
        }
        client.last_input_sequence = sequence;

        if last == 0 {
            0
        } else {
            sequence - last - 1
        }
    }

    /// Lists clients silent for longer than `timeout`.
    ///
    /// Nothing is removed here; the caller runs its normal disconnect path
    /// for each returned id so every other component is cleaned up too.
    pub fn timed_out_clients(&self, now: Instant, timeout: Duration) -> Vec<ClientId> {
        let mut timed_out: Vec<ClientId> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(now, timeout))
            .map(|(id, _)| *id)
            .collect();
        timed_out.sort_unstable();
        timed_out
    }

    /// Established client ids in ascending order
    pub fn established_ids(&self) -> Vec<ClientId> {
        let mut ids: Vec<ClientId> = self
            .clients
            .values()
            .filter(|client| client.established)
            .map(|client| client.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Addresses of established clients, used for broadcasts
    pub fn established_addrs(&self) -> Vec<(ClientId, SocketAddr)> {
        let mut addrs: Vec<(ClientId, SocketAddr)> = self
            .clients
            .values()
            .filter(|client| client.established)
            .map(|client| (client.id, client.addr))
            .collect();
        addrs.sort_unstable_by_key(|(id, _)| *id);
        addrs
    }

    pub fn established_count(&self) -> usize {
        self.clients.values().filter(|c| c.established).count()
    }

    /// Number of slots taken, including handshakes in flight
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
