//! Performance benchmarks for critical game systems

use bincode::{deserialize, serialize};
use client::interpolation::{RemoteInterpolator, RemoteSample};
use rand::rngs::StdRng;
use rand::SeedableRng;
use server::config::RoomConfig;
use server::game::Room;
use server::registry::RoomRegistry;
use shared::{default_platforms, Body, InputCommand, InputFlags, Packet};
use std::time::Instant;

/// Benchmarks the shared movement step across many bodies
#[test]
fn benchmark_body_step() {
    let platforms = default_platforms();
    let mut bodies: Vec<(Body, InputFlags)> = (0..100)
        .map(|i| {
            let input = InputFlags {
                left: i % 2 == 0,
                right: i % 2 == 1,
                ..InputFlags::default()
            };
            (Body::new((i as f32) * 15.0, 300.0), input)
        })
        .collect();

    let dt = 1.0 / 60.0;
    let iterations = 1000;
    let start = Instant::now();

    for frame in 0..iterations {
        for (body, input) in &mut bodies {
            input.jump_pressed = frame % 45 == 0;
            input.jump_held = frame % 45 < 10;
            body.step(input, false, dt, &platforms);
        }
    }

    let duration = start.elapsed();
    let total_updates = iterations * bodies.len();
    println!(
        "Body step: {} updates in {:?} ({:.2} ns/update)",
        total_updates,
        duration,
        duration.as_nanos() as f64 / total_updates as f64
    );

    // 100 bodies at 60 FPS for 1000 frames should be well under a second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks a full room tick with a running game
#[test]
fn benchmark_room_tick() {
    let mut room = Room::new("BENCHX".to_string(), RoomConfig::default(), 0);
    for id in 1..=8 {
        room.add_player(id, &format!("player{}", id));
    }
    room.start_countdown(1, 0, &mut StdRng::seed_from_u64(3))
        .unwrap();

    for id in 1..=8 {
        room.apply_input(
            id,
            &InputCommand {
                left: Some(id % 2 == 0),
                right: Some(id % 2 == 1),
                sequence: Some(1),
                ..InputCommand::default()
            },
        );
    }

    let iterations = 10_000u64;
    let start = Instant::now();

    let mut snapshots = 0;
    for tick in 1..=iterations {
        if room.tick(tick * 16).is_some() {
            snapshots += 1;
        }
        room.drain_events();
    }

    let duration = start.elapsed();
    println!(
        "Room tick: {} ticks ({} snapshots) in {:?} ({:.2} μs/tick)",
        iterations,
        snapshots,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(snapshots > 0);
    // A tick budget at 60 Hz is ~16ms; we should be orders of magnitude below
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks snapshot serialization for a full room
#[test]
fn benchmark_snapshot_serialization() {
    let mut room = Room::new("BENCHX".to_string(), RoomConfig::default(), 0);
    for id in 1..=8 {
        room.add_player(id, &format!("player{}", id));
    }
    let packet = Packet::State(room.snapshot(1000));

    let iterations = 10_000;
    let start = Instant::now();

    let mut total_bytes = 0;
    for _ in 0..iterations {
        let bytes = serialize(&packet).unwrap();
        total_bytes += bytes.len();
        let _: Packet = deserialize(&bytes).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Snapshot serialization: {} round trips, {} bytes each, in {:?} ({:.2} μs/iter)",
        iterations,
        total_bytes / iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 2000);
}

/// Benchmarks the registry ticking many rooms at once
#[test]
fn benchmark_registry_tick() {
    let mut registry = RoomRegistry::new(RoomConfig::default());
    let mut rng = StdRng::seed_from_u64(11);

    for room in 0..50u32 {
        let host = room * 4;
        let (code, _) = registry.create_room(host, "host", 0, &mut rng);
        for guest in 1..4 {
            registry.join_room(host + guest, &code, "guest").unwrap();
        }
    }
    assert_eq!(registry.len(), 50);

    let iterations = 1000u64;
    let start = Instant::now();

    let mut updates = 0;
    for tick in 1..=iterations {
        updates += registry.tick(tick * 16).len();
    }

    let duration = start.elapsed();
    println!(
        "Registry tick: 50 rooms x {} ticks in {:?} ({:.2} μs/tick, {} updates)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64,
        updates
    );

    assert!(updates > 0);
    assert!(duration.as_millis() < 3000);
}

/// Benchmarks remote interpolation lookups over a full history
#[test]
fn benchmark_interpolation_sample() {
    let mut interpolator = RemoteInterpolator::new(110);
    for id in 1..=8 {
        for step in 0..30u64 {
            interpolator.push(
                id,
                RemoteSample {
                    server_time: step * 50,
                    x: step as f32 * 10.0,
                    y: 100.0,
                    dir: 1,
                    is_tagger: false,
                },
            );
        }
    }

    let iterations = 100_000u64;
    let start = Instant::now();

    let mut hits = 0;
    for i in 0..iterations {
        let render_time = i % 1450;
        for id in 1..=8 {
            if interpolator.sample(id, render_time).is_some() {
                hits += 1;
            }
        }
    }

    let duration = start.elapsed();
    println!(
        "Interpolation sample: {} lookups in {:?} ({:.2} ns/lookup)",
        iterations * 8,
        duration,
        duration.as_nanos() as f64 / (iterations * 8) as f64
    );

    assert!(hits > 0);
    assert!(duration.as_millis() < 2000);
}
