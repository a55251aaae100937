//! Server network layer handling UDP communications and game loop coordination

use crate::client_manager::ClientManager;
use crate::config::ServerConfig;
use crate::registry::{RoomRegistry, RoomUpdate};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{timestamp_ms, Packet, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { client_id: u32, addr: SocketAddr },
    Shutdown,
}

/// Messages sent from game loop to network tasks
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    /// Same packet to every listed address, serialized once.
    Multicast {
        packet: Packet,
        addrs: Vec<SocketAddr>,
    },
}

/// Main server coordinating networking and room simulation
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    rooms: RoomRegistry,
    rng: StdRng,
    tick_duration: Duration,
    client_timeout: Duration,
    tick: u64,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(config: &ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(config.address()).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(config.max_clients))),
            rooms: RoomRegistry::new(config.room_config()),
            rng: StdRng::from_entropy(),
            tick_duration: config.tick_duration(),
            client_timeout: config.client_timeout(),
            tick: 0,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Handle for asking a running server to stop.
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; MAX_PACKET_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, &[addr]).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::Multicast { packet, addrs } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, &addrs).await {
                            error!("Failed to multicast packet: {}", e);
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();
        let timeout = self.client_timeout;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts(timeout)
                };

                for (client_id, addr) in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id, addr })
                    {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addrs: &[SocketAddr],
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        for addr in addrs {
            if let Err(e) = socket.send_to(&data, addr).await {
                warn!("Failed to send to {}: {}", addr, e);
            }
        }
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn multicast(&self, packet: Packet, addrs: Vec<SocketAddr>) {
        if addrs.is_empty() {
            return;
        }
        if let Err(e) = self.game_tx.send(GameMessage::Multicast { packet, addrs }) {
            error!("Failed to queue multicast packet: {}", e);
        }
    }

    /// Sends a room's events and snapshot to its current members.
    async fn dispatch_update(&self, update: RoomUpdate) {
        let addrs = {
            let clients = self.clients.read().await;
            clients.addrs_of(&update.recipients)
        };

        for event in &update.events {
            self.multicast(event.to_packet(), addrs.clone());
        }
        if let Some(snapshot) = update.snapshot {
            self.multicast(Packet::State(snapshot), addrs);
        }
    }

    /// Drops a player from room state and notifies whoever is left.
    async fn leave_rooms(&mut self, client_id: u32) {
        if let Some(update) = self.rooms.remove_player(client_id) {
            self.dispatch_update(update).await;
        }
    }

    async fn handle_connect(&mut self, client_version: u32, addr: SocketAddr) {
        info!(
            "Client connecting from {} (version: {})",
            addr, client_version
        );

        if client_version != PROTOCOL_VERSION {
            self.send_packet(
                Packet::Disconnected {
                    reason: "Protocol version mismatch".to_string(),
                },
                addr,
            );
            return;
        }

        // A reconnect from the same address replaces the old session
        let existing_client_id = {
            let clients = self.clients.read().await;
            clients.find_client_by_addr(addr)
        };
        if let Some(existing_id) = existing_client_id {
            info!("Removing existing client {} from {}", existing_id, addr);
            self.clients.write().await.remove_client(&existing_id);
            self.leave_rooms(existing_id).await;
        }

        let client_id = self.clients.write().await.add_client(addr);
        let response = match client_id {
            Some(client_id) => Packet::Connected { client_id },
            None => Packet::Disconnected {
                reason: "Server full".to_string(),
            },
        };
        self.send_packet(response, addr);
    }

    /// Processes one incoming packet
    pub async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        if let Packet::Connect { client_version } = packet {
            self.handle_connect(client_version, addr).await;
            return;
        }

        let client_id = {
            let mut clients = self.clients.write().await;
            let id = clients.find_client_by_addr(addr);
            if let Some(id) = id {
                clients.touch(id);
            }
            id
        };
        let Some(client_id) = client_id else {
            debug!("Ignoring packet from unknown address {}", addr);
            return;
        };

        match packet {
            Packet::CreateRoom { name } => {
                let now = timestamp_ms();
                let (code, left) = self.rooms.create_room(client_id, &name, now, &mut self.rng);
                if let Some(update) = left {
                    self.dispatch_update(update).await;
                }
                self.send_packet(Packet::RoomJoined { code }, addr);
            }

            Packet::JoinRoom { code, name } => match self.rooms.join_room(client_id, &code, &name)
            {
                Ok((code, left)) => {
                    if let Some(update) = left {
                        self.dispatch_update(update).await;
                    }
                    self.send_packet(Packet::RoomJoined { code }, addr);
                }
                Err(e) => {
                    debug!("Client {} failed to join {}: {}", client_id, code, e);
                    self.send_packet(
                        Packet::Rejected {
                            reason: e.to_string(),
                        },
                        addr,
                    );
                }
            },

            Packet::StartGame { code } => {
                let now = timestamp_ms();
                if let Err(e) = self.rooms.start_game(client_id, &code, now, &mut self.rng) {
                    debug!("Client {} failed to start {}: {}", client_id, code, e);
                    self.send_packet(
                        Packet::Rejected {
                            reason: e.to_string(),
                        },
                        addr,
                    );
                }
            }

            Packet::Input(command) => {
                if !self.rooms.apply_input(client_id, &command) {
                    debug!("Dropped input {:?} from client {}", command.sequence, client_id);
                }
            }

            Packet::Ping { client_time } => {
                self.send_packet(Packet::Pong { client_time }, addr);
            }

            Packet::Disconnect => {
                self.clients.write().await.remove_client(&client_id);
                self.leave_rooms(client_id).await;
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Advances every room to `now` and broadcasts what is due
    pub async fn tick_rooms(&mut self, now: u64) {
        self.tick += 1;
        for update in self.rooms.tick(now) {
            self.dispatch_update(update).await;
        }

        if self.tick % 600 == 0 {
            let client_count = self.clients.read().await.len();
            debug!(
                "Tick {}: {} clients in {} rooms",
                self.tick,
                client_count,
                self.rooms.len()
            );
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut tick_interval = interval(self.tick_duration);

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id, addr }) => {
                            info!("Client {} timed out", client_id);
                            self.leave_rooms(client_id).await;
                            self.send_packet(
                                Packet::Disconnected { reason: "Timed out".to_string() },
                                addr,
                            );
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    self.tick_rooms(timestamp_ms()).await;
                },
            }
        }

        Ok(())
    }
}
