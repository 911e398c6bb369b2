//! Integration tests driving the simulation worker end to end.
//!
//! These exercise the public channel protocol the way a render-thread
//! consumer would: init, pull frames, merge partial updates, reconfigure,
//! and tear down.

use std::time::Duration;

use stardrift::{
    ChangeFlags, ConfigDelta, ControlMessage, Engine, EngineMessage, PartialUpdate,
    SimulationConfig, SimulationWorker, WorkerError, WorkerHandle,
};

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

fn recv(handle: &WorkerHandle) -> EngineMessage {
    handle.recv_timeout(RECV_TIMEOUT).expect("worker reply")
}

/// Batched frames may arrive bare or wrapped; unwrap one level.
fn recv_flat(handle: &WorkerHandle) -> Vec<EngineMessage> {
    match recv(handle) {
        EngineMessage::Batch(messages) => messages,
        message => vec![message],
    }
}

fn init_worker(config: SimulationConfig) -> WorkerHandle {
    let handle = SimulationWorker::spawn();
    handle.init(config).unwrap();
    match recv(&handle) {
        EngineMessage::Ready { buffer, .. } => {
            assert_eq!(buffer.len(), config.star_count);
        }
        other => panic!("expected Ready, got {:?}", other),
    }
    handle
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_init_returns_buffer_and_config() {
    let config = SimulationConfig::new()
        .with_star_count(64)
        .with_viewport(200.0, 100.0);
    let handle = SimulationWorker::spawn();
    handle.init(config).unwrap();

    match recv(&handle) {
        EngineMessage::Ready {
            config: echoed,
            buffer,
        } => {
            assert_eq!(echoed, config);
            assert_eq!(buffer.len(), 64);
            for p in buffer.particles() {
                assert!(p.is_live());
                assert!(p.x >= -200.0 && p.x <= 200.0);
                assert!(p.z >= 0.0 && p.z < config.max_depth);
            }
        }
        other => panic!("expected Ready, got {:?}", other),
    }
}

#[test]
fn test_double_init_is_rejected() {
    let handle = init_worker(SimulationConfig::default());
    handle.init(SimulationConfig::default()).unwrap();
    match recv(&handle) {
        EngineMessage::Rejected(WorkerError::AlreadyInitialized) => {}
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[test]
fn test_frame_before_init_is_rejected() {
    let handle = SimulationWorker::spawn();
    handle.request_frame(16.7, None).unwrap();
    match recv(&handle) {
        EngineMessage::Rejected(WorkerError::NotInitialized) => {}
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[test]
fn test_invalid_config_rejected_not_clamped() {
    let handle = SimulationWorker::spawn();
    handle
        .init(SimulationConfig::new().with_star_count(0))
        .unwrap();
    match recv(&handle) {
        EngineMessage::Rejected(WorkerError::Config(_)) => {}
        other => panic!("expected config rejection, got {:?}", other),
    }
}

#[test]
fn test_cleanup_is_acknowledged_and_terminal() {
    let handle = init_worker(SimulationConfig::default());
    handle.cleanup().unwrap();
    match recv(&handle) {
        EngineMessage::CleanupDone => {}
        other => panic!("expected CleanupDone, got {:?}", other),
    }
    // The thread is gone; further sends fail.
    std::thread::sleep(Duration::from_millis(50));
    assert!(handle.request_frame(16.7, None).is_err());
}

#[test]
fn test_reset_returns_fresh_buffer() {
    let config = SimulationConfig::new().with_star_count(32);
    let handle = init_worker(config);
    handle.reset().unwrap();
    match recv(&handle) {
        EngineMessage::Ready { buffer, .. } => {
            assert_eq!(buffer.len(), 32);
            assert!(buffer.particles().iter().all(|p| p.is_live() && p.z > 0.0));
        }
        other => panic!("expected Ready after reset, got {:?}", other),
    }
}

// ============================================================================
// Frames
// ============================================================================

#[test]
fn test_request_frame_produces_update() {
    let handle = init_worker(SimulationConfig::new().with_star_count(16));
    handle.request_frame(16.7, None).unwrap();

    let messages = recv_flat(&handle);
    assert!(messages.iter().any(|m| matches!(
        m,
        EngineMessage::FrameUpdate { .. }
            | EngineMessage::PartialFrameUpdate { .. }
            | EngineMessage::NoChanges
    )));
}

#[test]
fn test_full_frame_carries_whole_store() {
    // Default base speed moves every particle past the epsilon, which puts
    // the changed fraction over the partial threshold.
    let handle = init_worker(SimulationConfig::new().with_star_count(8));
    handle.request_frame(16.7, None).unwrap();

    let messages = recv_flat(&handle);
    match messages
        .iter()
        .find(|m| !matches!(m, EngineMessage::Stats(_)))
        .unwrap()
    {
        EngineMessage::FrameUpdate { buffer, .. } => assert_eq!(buffer.len(), 8),
        other => panic!("expected FrameUpdate, got {:?}", other),
    }
}

#[test]
fn test_returned_partial_buffer_is_remerged() {
    let handle = init_worker(SimulationConfig::default());
    // Round-trip an empty partial: valid, changes nothing, still ticks.
    handle
        .send(ControlMessage::RequestPartialFrame {
            update: PartialUpdate {
                indices: Vec::new(),
                records: Vec::new(),
            },
            delta_ms: 16.7,
        })
        .unwrap();
    let messages = recv_flat(&handle);
    assert!(messages.iter().any(|m| matches!(
        m,
        EngineMessage::FrameUpdate { .. }
            | EngineMessage::PartialFrameUpdate { .. }
            | EngineMessage::NoChanges
    )));
}

#[test]
fn test_malformed_partial_degrades_to_noop_frame() {
    let handle = init_worker(SimulationConfig::new().with_star_count(4));
    handle
        .send(ControlMessage::RequestPartialFrame {
            update: PartialUpdate {
                indices: vec![1000],
                records: vec![stardrift::Particle {
                    x: 0.0,
                    y: 0.0,
                    z: 1.0,
                    prev_x: 0.0,
                    prev_y: 0.0,
                    in_use: 1.0,
                }],
            },
            delta_ms: 16.7,
        })
        .unwrap();
    let messages = recv_flat(&handle);
    assert!(messages
        .iter()
        .any(|m| matches!(m, EngineMessage::NoChanges)));

    // The engine is still usable afterwards.
    handle.request_frame(16.7, None).unwrap();
    let messages = recv_flat(&handle);
    assert!(messages.iter().any(|m| matches!(
        m,
        EngineMessage::FrameUpdate { .. } | EngineMessage::PartialFrameUpdate { .. }
    )));
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn test_star_count_change_returns_new_buffer() {
    let handle = init_worker(SimulationConfig::new().with_star_count(16));
    handle
        .update_config(ConfigDelta {
            star_count: Some(64),
            ..Default::default()
        })
        .unwrap();
    match recv(&handle) {
        EngineMessage::ConfigApplied { config, buffer } => {
            assert_eq!(config.star_count, 64);
            assert_eq!(buffer.expect("reinit buffer").len(), 64);
        }
        other => panic!("expected ConfigApplied, got {:?}", other),
    }
}

#[test]
fn test_speed_change_keeps_buffer() {
    let handle = init_worker(SimulationConfig::default());
    handle
        .update_config(ConfigDelta {
            base_speed: Some(0.5),
            ..Default::default()
        })
        .unwrap();
    match recv(&handle) {
        EngineMessage::ConfigApplied { config, buffer } => {
            assert_eq!(config.base_speed, 0.5);
            assert!(buffer.is_none());
        }
        other => panic!("expected ConfigApplied, got {:?}", other),
    }
}

// ============================================================================
// One tick over a pinned store
// ============================================================================

#[test]
fn test_one_tick_marks_exactly_the_z_crossers_and_movers() {
    // Direct engine drive so depths can be pinned: star_count 4, max depth
    // 10, one 16.7 ms tick at base speed 0.25.
    let config = SimulationConfig::new()
        .with_star_count(4)
        .with_max_depth(10.0)
        .with_viewport(100.0, 100.0);
    let mut engine = Engine::new(config).unwrap();
    {
        let store = engine.store_mut();
        store[0].z = 0.1; // crosses zero this tick
        store[1].z = 8.0; // moves 0.25 > 0.1 epsilon
        store[2].in_use = 0.0; // dead, skipped
        store[3].z = 0.2; // crosses zero this tick
    }

    engine.tick(16.7);

    assert_eq!(engine.changed(), &[0, 1, 3]);
    assert!(engine.change_flags(0).contains(ChangeFlags::RECYCLED));
    assert!(engine.change_flags(3).contains(ChangeFlags::RECYCLED));
    assert_eq!(engine.change_flags(1), ChangeFlags::MOVED);
    assert_eq!(engine.change_flags(2), ChangeFlags::empty());

    // Recycled particles are live again at positive depth.
    assert!(engine.store()[0].z > 0.0);
    assert!(engine.store()[3].z > 0.0);
}

// ============================================================================
// Round-trip law
// ============================================================================

#[test]
fn test_extract_apply_round_trip_is_bit_exact() {
    let config = SimulationConfig::new().with_star_count(32);
    let mut engine = Engine::new(config).unwrap();

    let pristine = engine.snapshot_buffer();
    engine.tick(16.7);

    let mut tracker = stardrift::ChangeTracker::new(32);
    for i in [0usize, 5, 17, 31] {
        tracker.mark_changed(i, ChangeFlags::MOVED);
    }
    let update = tracker.extract_partial(engine.store());

    let mut copy = pristine.clone();
    update.apply(&mut copy).unwrap();

    for i in 0..32 {
        if [0usize, 5, 17, 31].contains(&i) {
            assert_eq!(copy[i], engine.store()[i], "changed index {} mismatched", i);
        } else {
            assert_eq!(copy[i], pristine[i], "untouched index {} disturbed", i);
        }
    }
}

// ============================================================================
// Stats cadence
// ============================================================================

/// Receive until the channel goes quiet, unwrapping batches.
fn drain_messages(handle: &WorkerHandle) -> Vec<EngineMessage> {
    let mut messages = Vec::new();
    while let Ok(message) = handle.recv_timeout(Duration::from_millis(250)) {
        match message {
            EngineMessage::Batch(batch) => messages.extend(batch),
            message => messages.push(message),
        }
    }
    messages
}

fn collect_stats(messages: Vec<EngineMessage>) -> Vec<stardrift::FrameStats> {
    messages
        .into_iter()
        .filter_map(|m| match m {
            EngineMessage::Stats(stats) => Some(stats),
            _ => None,
        })
        .collect()
}

#[test]
fn test_stats_emitted_at_interval_and_after_reset() {
    let mut config = SimulationConfig::new().with_star_count(8);
    config.stats_interval = 2;
    let handle = init_worker(config);

    for _ in 0..4 {
        handle.request_frame(16.7, None).unwrap();
    }
    let stats = collect_stats(drain_messages(&handle));
    assert!(!stats.is_empty(), "no stats over 4 ticks at interval 2");
    assert!(stats.iter().all(|s| s.tick % 2 == 0));
    assert!(stats.iter().all(|s| s.fps >= 0.0));

    // The tick counter restarts at zero on reset; the cadence must restart
    // with it rather than wait out the old counter.
    handle.reset().unwrap();
    assert!(matches!(recv(&handle), EngineMessage::Ready { .. }));
    for _ in 0..4 {
        handle.request_frame(16.7, None).unwrap();
    }
    let stats = collect_stats(drain_messages(&handle));
    assert!(!stats.is_empty(), "stats silenced after reset");
    assert!(stats.iter().all(|s| s.tick > 0 && s.tick <= 4));
}

// ============================================================================
// Window coalescing over the wire
// ============================================================================

#[test]
fn test_three_frames_in_one_window_arrive_as_one_batch() {
    let handle = init_worker(SimulationConfig::new().with_star_count(8));

    // Three requests land well inside one 16 ms window.
    handle.request_frame(1.0, None).unwrap();
    handle.request_frame(1.0, None).unwrap();
    handle.request_frame(1.0, None).unwrap();

    match recv(&handle) {
        EngineMessage::Batch(messages) => {
            let frames: Vec<_> = messages
                .iter()
                .filter(|m| {
                    matches!(
                        m,
                        EngineMessage::FrameUpdate { .. }
                            | EngineMessage::PartialFrameUpdate { .. }
                            | EngineMessage::NoChanges
                    )
                })
                .collect();
            assert_eq!(frames.len(), 3);
        }
        other => panic!("expected one coalesced Batch, got {:?}", other),
    }
}
