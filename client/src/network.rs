use crate::game::ClientGameState;
use crate::input::{InputManager, KeySample, Toggles};
use crate::prediction::ReconcileConfig;
use crate::rendering::{HudConfig, Renderer};
use bincode::{deserialize, serialize};
use log::{error, info, warn};
use macroquad::prelude::{is_key_pressed, next_frame, KeyCode};
use shared::{timestamp_ms, Packet, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::sleep;

const PING_INTERVAL: Duration = Duration::from_secs(1);
const CONNECT_RETRY: Duration = Duration::from_secs(1);

/// UDP endpoint running on its own thread with a single-threaded tokio runtime.
///
/// The render loop never blocks on the network: outgoing packets are queued and
/// incoming ones are polled with [`Connection::try_recv`].
pub struct Connection {
    outgoing: mpsc::UnboundedSender<Packet>,
    incoming: mpsc::UnboundedReceiver<Packet>,
    local_addr: SocketAddr,
}

impl Connection {
    /// Binds a local socket and starts the network thread. `fake_ping_ms` is
    /// split evenly between the send and receive direction.
    pub fn spawn(
        server_addr: SocketAddr,
        fake_ping_ms: u64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let std_socket = std::net::UdpSocket::bind("0.0.0.0:0")?;
        std_socket.set_nonblocking(true)?;
        let local_addr = std_socket.local_addr()?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        let delay = Duration::from_millis(fake_ping_ms / 2);

        thread::Builder::new()
            .name("network".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    match UdpSocket::from_std(std_socket) {
                        Ok(socket) => {
                            Self::run(Arc::new(socket), server_addr, delay, outgoing_rx, incoming_tx)
                                .await
                        }
                        Err(e) => error!("Failed to register socket: {}", e),
                    }
                });
            })?;

        Ok(Self {
            outgoing: outgoing_tx,
            incoming: incoming_rx,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn send(&self, packet: Packet) {
        if let Err(e) = self.outgoing.send(packet) {
            error!("Network thread is gone, dropping packet: {:?}", e.0);
        }
    }

    pub fn try_recv(&mut self) -> Option<Packet> {
        self.incoming.try_recv().ok()
    }

    async fn run(
        socket: Arc<UdpSocket>,
        server_addr: SocketAddr,
        delay: Duration,
        mut outgoing: mpsc::UnboundedReceiver<Packet>,
        incoming: mpsc::UnboundedSender<Packet>,
    ) {
        let mut buffer = vec![0u8; MAX_PACKET_SIZE];

        loop {
            tokio::select! {
                result = socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => match deserialize::<Packet>(&buffer[..len]) {
                            Ok(packet) => Self::deliver(&incoming, packet, delay),
                            Err(e) => warn!("Failed to deserialize packet: {}", e),
                        },
                        Err(e) => {
                            error!("Error receiving packet: {}", e);
                            sleep(Duration::from_millis(10)).await;
                        }
                    }
                },

                message = outgoing.recv() => {
                    let Some(packet) = message else {
                        break;
                    };
                    let data = match serialize(&packet) {
                        Ok(data) => data,
                        Err(e) => {
                            error!("Failed to serialize packet: {}", e);
                            continue;
                        }
                    };
                    if delay.is_zero() {
                        if let Err(e) = socket.send_to(&data, server_addr).await {
                            error!("Failed to send packet: {}", e);
                        }
                    } else {
                        let socket = Arc::clone(&socket);
                        tokio::spawn(async move {
                            sleep(delay).await;
                            if let Err(e) = socket.send_to(&data, server_addr).await {
                                error!("Failed to send packet: {}", e);
                            }
                        });
                    }
                },
            }
        }
    }

    fn deliver(incoming: &mpsc::UnboundedSender<Packet>, packet: Packet, delay: Duration) {
        if delay.is_zero() {
            Self::forward(incoming, packet);
            return;
        }
        let incoming = incoming.clone();
        tokio::spawn(async move {
            sleep(delay).await;
            Self::forward(&incoming, packet);
        });
    }

    /// Hands a received packet to the frame loop. Returns false once the frame
    /// loop has gone away.
    fn forward(incoming: &mpsc::UnboundedSender<Packet>, packet: Packet) -> bool {
        match incoming.send(packet) {
            Ok(()) => true,
            Err(e) => {
                warn!("Frame loop is gone, dropping packet: {:?}", e.0);
                false
            }
        }
    }
}

/// Startup options of the game client.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub name: String,
    /// Room to join; a new room is created when absent.
    pub join_code: Option<String>,
    pub fake_ping_ms: u64,
    pub interpolation_delay_ms: u64,
    pub reconcile: ReconcileConfig,
}

pub struct Client {
    connection: Connection,
    options: ClientOptions,
    connected: bool,
    last_connect_attempt: Option<Instant>,

    game_state: ClientGameState,
    input_manager: InputManager,
    renderer: Renderer,

    ping_ms: u64,
    last_ping_time: Option<Instant>,
    last_frame: Instant,
    status: Option<String>,

    prediction_enabled: bool,
    reconciliation_enabled: bool,
    interpolation_enabled: bool,
}

impl Client {
    pub fn new(
        server_addr: &str,
        options: ClientOptions,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let server_addr: SocketAddr = server_addr.parse()?;
        let connection = Connection::spawn(server_addr, options.fake_ping_ms)?;
        info!(
            "Network thread bound to {}, server is {}",
            connection.local_addr(),
            server_addr
        );

        Ok(Client {
            connection,
            game_state: ClientGameState::new(options.reconcile, options.interpolation_delay_ms),
            options,
            connected: false,
            last_connect_attempt: None,
            input_manager: InputManager::new(),
            renderer: Renderer::new(),
            ping_ms: 0,
            last_ping_time: None,
            last_frame: Instant::now(),
            status: None,
            prediction_enabled: true,
            reconciliation_enabled: true,
            interpolation_enabled: true,
        })
    }

    /// Sends `Connect` until the server answers.
    fn maintain_connection(&mut self, now: Instant) {
        if self.connected {
            return;
        }
        let due = self
            .last_connect_attempt
            .map_or(true, |at| now.duration_since(at) >= CONNECT_RETRY);
        if due {
            info!("Connecting to server...");
            self.connection.send(Packet::Connect {
                client_version: PROTOCOL_VERSION,
            });
            self.last_connect_attempt = Some(now);
        }
    }

    fn request_room(&mut self) {
        let name = self.options.name.clone();
        let packet = match &self.options.join_code {
            Some(code) => Packet::JoinRoom {
                code: code.clone(),
                name,
            },
            None => Packet::CreateRoom { name },
        };
        self.connection.send(packet);
    }

    fn handle_packet(&mut self, packet: Packet) {
        match packet {
            Packet::Connected { client_id } => {
                if self.connected {
                    return;
                }
                info!("Connected! Client ID: {}", client_id);
                self.connected = true;
                self.game_state.client_id = Some(client_id);
                self.status = None;
                self.request_room();
            }

            Packet::RoomJoined { code } => {
                self.options.join_code = Some(code.clone());
                self.game_state.enter_room(code);
            }

            Packet::Rejected { reason } => {
                warn!("Request rejected: {}", reason);
                self.status = Some(reason);
            }

            Packet::State(snapshot) => {
                self.game_state
                    .apply_snapshot(snapshot, self.reconciliation_enabled);
            }

            Packet::Tagged { tagger_id } => {
                self.game_state.apply_tag(tagger_id, timestamp_ms());
            }

            Packet::PlayerLeft { id } => {
                self.game_state.remove_player(id);
            }

            Packet::LeaderChanged { leader_id } => {
                self.game_state.set_leader(leader_id);
            }

            Packet::Pong { client_time } => {
                self.ping_ms = timestamp_ms().saturating_sub(client_time);
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.connected = false;
                self.last_connect_attempt = None;
                self.game_state.client_id = None;
                self.status = Some(reason);
            }

            _ => {
                warn!("Unexpected packet type");
            }
        }
    }

    fn handle_toggles(&mut self, toggles: Toggles) {
        if toggles.prediction {
            self.prediction_enabled = !self.prediction_enabled;
            info!("Client-side prediction: {}", self.prediction_enabled);
        }
        if toggles.reconciliation {
            self.reconciliation_enabled = !self.reconciliation_enabled;
            info!("Server reconciliation: {}", self.reconciliation_enabled);
        }
        if toggles.interpolation {
            self.interpolation_enabled = !self.interpolation_enabled;
            info!("Interpolation: {}", self.interpolation_enabled);
        }
        if toggles.start && self.game_state.is_leader() {
            if let Some(code) = self.game_state.room_code.clone() {
                info!("Requesting game start in room {}", code);
                self.connection.send(Packet::StartGame { code });
            }
        }
    }

    fn send_ping(&mut self, now: Instant) {
        let due = self
            .last_ping_time
            .map_or(true, |at| now.duration_since(at) >= PING_INTERVAL);
        if self.connected && due {
            self.connection.send(Packet::Ping {
                client_time: timestamp_ms(),
            });
            self.last_ping_time = Some(now);
        }
    }

    /// One iteration of the frame loop, minus drawing.
    fn update(&mut self, keys: KeySample, now: Instant) {
        while let Some(packet) = self.connection.try_recv() {
            self.handle_packet(packet);
        }
        self.maintain_connection(now);

        let frame = self.input_manager.update(keys, now);
        self.handle_toggles(frame.toggles);

        let in_room = self.connected && self.game_state.room_code.is_some();
        if in_room {
            if let Some(command) = frame.command {
                self.connection.send(Packet::Input(command));
            }
            if self.prediction_enabled {
                self.game_state.record_input(&frame.flags);
            }
        }

        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.game_state.update(dt, self.prediction_enabled);

        self.send_ping(now);
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        loop {
            if is_key_pressed(KeyCode::Escape) {
                break;
            }

            self.update(KeySample::capture(), Instant::now());

            let players = self
                .game_state
                .render_players(self.interpolation_enabled);
            let hud = HudConfig {
                prediction_enabled: self.prediction_enabled,
                reconciliation_enabled: self.reconciliation_enabled,
                interpolation_enabled: self.interpolation_enabled,
                connected: self.connected,
                ping_ms: self.ping_ms,
                fake_ping_ms: self.options.fake_ping_ms,
                status: self.status.clone(),
                now_ms: timestamp_ms(),
            };
            self.renderer.render(&self.game_state, &players, &hud);

            next_frame().await;
        }

        if self.connected {
            self.connection.send(Packet::Disconnect);
            // Give the network thread a moment to flush.
            thread::sleep(Duration::from_millis(50));
        }

        Ok(())
    }
}
