//! Integration tests across the shared simulation, the server rooms and the
//! client state, plus a full UDP session against a running server.

use bincode::{deserialize, serialize};
use shared::{InputCommand, InputFlags, Packet, RoomPhase, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::Duration;

/// NETWORK PROTOCOL TESTS
mod protocol_tests {
    use super::*;
    use std::net::UdpSocket;
    use std::thread;

    /// Tests real UDP socket communication with the wire format
    #[test]
    fn udp_socket_communication() {
        let server_socket = UdpSocket::bind("127.0.0.1:0").expect("Failed to bind server socket");
        let server_addr = server_socket.local_addr().unwrap();

        // Echo server
        let server_socket_clone = server_socket.try_clone().unwrap();
        thread::spawn(move || {
            let mut buf = [0; 1024];
            if let Ok((size, client_addr)) = server_socket_clone.recv_from(&mut buf) {
                let _ = server_socket_clone.send_to(&buf[..size], client_addr);
            }
        });

        let client_socket = UdpSocket::bind("127.0.0.1:0").expect("Failed to bind client socket");
        client_socket
            .set_read_timeout(Some(Duration::from_millis(500)))
            .unwrap();

        let flags = InputFlags {
            left: true,
            jump_held: true,
            jump_pressed: true,
            ..InputFlags::default()
        };
        let test_packet = Packet::Input(InputCommand::from_flags(&flags, 12));
        client_socket
            .send_to(&serialize(&test_packet).unwrap(), server_addr)
            .unwrap();

        let mut buf = [0; 1024];
        let (size, _) = client_socket.recv_from(&mut buf).unwrap();
        let received_packet: Packet = deserialize(&buf[..size]).unwrap();

        assert_eq!(received_packet, test_packet);
    }

    /// A full room snapshot fits comfortably in one datagram
    #[test]
    fn snapshot_fits_in_datagram() {
        let mut room = server::game::Room::new(
            "ABCDEF".to_string(),
            server::config::RoomConfig::default(),
            0,
        );
        for id in 0..16 {
            room.add_player(id, "a-long-player-name-here");
        }
        let packet = Packet::State(room.snapshot(0));
        let size = serialize(&packet).unwrap().len();

        assert!(size < MAX_PACKET_SIZE / 2, "snapshot is {} bytes", size);
    }
}

/// SIMULATION CONSISTENCY TESTS
mod simulation_tests {
    use super::*;
    use client::game::ClientGameState;
    use client::prediction::{Predictor, ReconcileConfig};
    use server::config::RoomConfig;
    use server::game::Room;

    const TICK_MS: u64 = 16;

    fn scripted_flags(frame: usize) -> InputFlags {
        InputFlags {
            left: (90..150).contains(&frame),
            right: frame < 60,
            jump_held: (30..45).contains(&frame) || (100..140).contains(&frame),
            jump_pressed: frame == 30 || frame == 100,
            jump_released: frame == 45 || frame == 140,
        }
    }

    /// The server room and the client predictor produce bit-identical bodies when
    /// fed the same inputs and time steps
    #[test]
    fn prediction_matches_server_simulation() {
        let mut room = Room::new("ABCDEF".to_string(), RoomConfig::default(), 0);
        room.add_player(1, "solo");

        let mut predictor = Predictor::new(ReconcileConfig::default());
        let spawn = room.snapshot(0);
        predictor.reconcile(spawn.player(1).unwrap(), true);

        let platforms = room.platforms().to_vec();
        let dt = TICK_MS as f32 / 1000.0;

        for frame in 0..200 {
            let flags = scripted_flags(frame);
            room.apply_input(1, &InputCommand::from_flags(&flags, frame as u32 + 1));
            room.tick((frame as u64 + 1) * TICK_MS);

            predictor.record_input(&flags);
            predictor.predict(dt, &platforms);

            assert_eq!(
                &room.player(1).unwrap().body,
                predictor.body(),
                "diverged at frame {}",
                frame
            );
        }

        assert_eq!(room.player(1).unwrap().last_processed_sequence, 200);
    }

    /// A tagger running at another player tags them exactly once
    #[test]
    fn chase_produces_single_tag() {
        use rand::rngs::StdRng;
        use rand::SeedableRng;

        let mut room = Room::new("ABCDEF".to_string(), RoomConfig::default(), 0);
        room.add_player(1, "a");
        room.add_player(2, "b");
        room.start_countdown(1, 0, &mut StdRng::seed_from_u64(1)).unwrap();

        let mut now = 0;
        while room.phase() != RoomPhase::Running {
            now += TICK_MS;
            room.tick(now);
        }
        room.drain_events();

        let tagger = room.tagger_id().unwrap();
        let runner = if tagger == 1 { 2 } else { 1 };
        let toward = room.player(runner).unwrap().body.x > room.player(tagger).unwrap().body.x;
        let command = InputCommand {
            left: Some(!toward),
            right: Some(toward),
            sequence: Some(1),
            ..InputCommand::default()
        };
        room.apply_input(tagger, &command);

        let mut tags = 0;
        for _ in 0..120 {
            now += TICK_MS;
            room.tick(now);
            assert_eq!(room.players().filter(|p| p.is_tagger).count(), 1);
            tags += room
                .drain_events()
                .iter()
                .filter(|e| matches!(e, server::game::RoomEvent::Tagged { .. }))
                .count();
        }

        // The pair cooldown stops an immediate tag back.
        assert_eq!(tags, 1);
        assert_eq!(room.tagger_id(), Some(runner));
    }

    /// Remote players advance smoothly through server snapshots
    #[test]
    fn remote_interpolation_over_room_snapshots() {
        let mut room = Room::new("ABCDEF".to_string(), RoomConfig::default(), 0);
        room.add_player(1, "me");
        room.add_player(2, "runner");
        room.apply_input(
            2,
            &InputCommand {
                right: Some(true),
                sequence: Some(1),
                ..InputCommand::default()
            },
        );

        let mut client = ClientGameState::new(ReconcileConfig::default(), 110);
        client.client_id = Some(1);
        client.enter_room("ABCDEF".to_string());

        let mut last_x = f32::MIN;
        let mut drawn = 0;
        for frame in 1..=120u64 {
            if let Some(snapshot) = room.tick(frame * TICK_MS) {
                client.apply_snapshot(snapshot, true);
            }
            client.update(TICK_MS as f32 / 1000.0, true);

            if let Some(remote) = client.render_players(true).into_iter().find(|p| p.id == 2) {
                assert!(remote.x >= last_x);
                last_x = remote.x;
                drawn += 1;
            }
        }

        assert!(drawn > 0);
        let authoritative = room.player(2).unwrap().body.x;
        assert!(last_x < authoritative);
    }
}

/// CLIENT-SERVER INTEGRATION TESTS
mod client_server_tests {
    use super::*;
    use clap::Parser;
    use server::config::ServerConfig;
    use server::network::{Server, ServerMessage};
    use std::thread;
    use tokio::net::UdpSocket;
    use tokio::sync::mpsc::UnboundedSender;
    use tokio::time::timeout;

    /// Runs a server on its own runtime thread and returns where to reach it.
    fn start_server(extra: &[&str]) -> (SocketAddr, UnboundedSender<ServerMessage>) {
        let mut args = vec!["server", "--port", "0"];
        args.extend_from_slice(extra);
        let config = ServerConfig::parse_from(args);

        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async move {
                let mut server = Server::new(&config).await.unwrap();
                ready_tx
                    .send((server.local_addr().unwrap(), server.shutdown_handle()))
                    .unwrap();
                let _ = server.run().await;
            });
        });

        ready_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("server failed to start")
    }

    async fn send(socket: &UdpSocket, packet: &Packet, to: SocketAddr) {
        socket.send_to(&serialize(packet).unwrap(), to).await.unwrap();
    }

    /// Receives packets until one matches, failing after a few seconds.
    async fn recv_until<F>(socket: &UdpSocket, mut matches: F) -> Packet
    where
        F: FnMut(&Packet) -> bool,
    {
        let mut buf = vec![0u8; MAX_PACKET_SIZE];
        timeout(Duration::from_secs(5), async {
            loop {
                let (len, _) = socket.recv_from(&mut buf).await.unwrap();
                let packet: Packet = deserialize(&buf[..len]).unwrap();
                if matches(&packet) {
                    return packet;
                }
            }
        })
        .await
        .expect("timed out waiting for packet")
    }

    async fn connect(socket: &UdpSocket, server: SocketAddr) -> u32 {
        send(
            socket,
            &Packet::Connect {
                client_version: PROTOCOL_VERSION,
            },
            server,
        )
        .await;
        match recv_until(socket, |p| matches!(p, Packet::Connected { .. })).await {
            Packet::Connected { client_id } => client_id,
            _ => unreachable!(),
        }
    }

    async fn room_joined(socket: &UdpSocket) -> String {
        match recv_until(socket, |p| matches!(p, Packet::RoomJoined { .. })).await {
            Packet::RoomJoined { code } => code,
            _ => unreachable!(),
        }
    }

    /// Two clients create, join and play a round over real sockets
    #[tokio::test]
    async fn full_session_over_udp() {
        let (server, shutdown) = start_server(&["--countdown-ms", "200"]);

        let host = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let guest = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let host_id = connect(&host, server).await;
        let guest_id = connect(&guest, server).await;
        assert_ne!(host_id, guest_id);

        send(&host, &Packet::CreateRoom { name: "host".to_string() }, server).await;
        let code = room_joined(&host).await;
        assert_eq!(code.len(), 6);

        send(
            &guest,
            &Packet::JoinRoom {
                code: code.to_lowercase(),
                name: "guest".to_string(),
            },
            server,
        )
        .await;
        assert_eq!(room_joined(&guest).await, code);

        send(&host, &Packet::StartGame { code: code.clone() }, server).await;

        let running = recv_until(&guest, |p| {
            matches!(p, Packet::State(s) if s.state == RoomPhase::Running)
        })
        .await;
        let Packet::State(snapshot) = running else {
            unreachable!()
        };
        assert_eq!(snapshot.players.len(), 2);
        assert_eq!(snapshot.leader_id, Some(host_id));
        assert_eq!(snapshot.players.iter().filter(|p| p.is_tagger).count(), 1);
        assert!(snapshot.game_remaining_ms > 0);

        send(&host, &Packet::Ping { client_time: 1234 }, server).await;
        assert_eq!(
            recv_until(&host, |p| matches!(p, Packet::Pong { .. })).await,
            Packet::Pong { client_time: 1234 }
        );

        send(&guest, &Packet::Disconnect, server).await;
        assert_eq!(
            recv_until(&host, |p| matches!(p, Packet::PlayerLeft { .. })).await,
            Packet::PlayerLeft { id: guest_id }
        );
        recv_until(&host, |p| {
            matches!(p, Packet::State(s) if s.state == RoomPhase::Ended)
        })
        .await;

        let _ = shutdown.send(ServerMessage::Shutdown);
    }

    /// Unknown room codes are rejected without creating anything
    #[tokio::test]
    async fn join_unknown_room_over_udp() {
        let (server, shutdown) = start_server(&[]);
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        connect(&socket, server).await;

        send(
            &socket,
            &Packet::JoinRoom {
                code: "ZZZZZZ".to_string(),
                name: "lost".to_string(),
            },
            server,
        )
        .await;

        match recv_until(&socket, |p| matches!(p, Packet::Rejected { .. })).await {
            Packet::Rejected { reason } => assert!(reason.contains("not found")),
            _ => unreachable!(),
        }
        let _ = shutdown.send(ServerMessage::Shutdown);
    }

    /// A client with the wrong protocol version is turned away
    #[test]
    fn version_mismatch_over_udp() {
        tokio_test::block_on(async {
            let (server, shutdown) = start_server(&[]);
            let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();

            send(&socket, &Packet::Connect { client_version: 0 }, server).await;
            let packet = recv_until(&socket, |p| matches!(p, Packet::Disconnected { .. })).await;

            assert_eq!(
                packet,
                Packet::Disconnected {
                    reason: "Protocol version mismatch".to_string()
                }
            );
            let _ = shutdown.send(ServerMessage::Shutdown);
        });
    }
}
