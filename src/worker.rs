//! The dedicated simulation thread.
//!
//! One simulation thread and one consumer thread, connected only by a pair of
//! mpsc channels: control messages in, engine messages out. There is no shared
//! mutable memory between them at any instant; buffers cross by move.
//!
//! The loop is pull-driven. The engine ticks only when the consumer requests a
//! frame, so per-message work is synchronous and bounded. Outbound frame and
//! stats traffic is batched through a [`BatchQueue`]; the loop sleeps on the
//! control channel with a timeout set to the pending flush deadline, which is
//! how the window timer "fires" without a second thread.
//!
//! # Example
//!
//! ```no_run
//! use stardrift::{SimulationConfig, SimulationWorker};
//!
//! let handle = SimulationWorker::spawn();
//! handle.init(SimulationConfig::default()).unwrap();
//! let ready = handle.recv().unwrap(); // EngineMessage::Ready
//! handle.request_frame(16.7, None).unwrap();
//! let frame = handle.recv().unwrap();
//! handle.cleanup().unwrap(); // acknowledged with CleanupDone
//! # let _ = (ready, frame);
//! ```

use crate::config::{ConfigDelta, SimulationConfig};
use crate::engine::{Engine, FrameOutput};
use crate::error::WorkerError;
use crate::protocol::{BatchQueue, ControlMessage, EngineMessage};
use crate::time::FrameClock;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Spawns and owns the simulation thread.
pub struct SimulationWorker;

impl SimulationWorker {
    /// Start the simulation thread and return the consumer-side handle.
    pub fn spawn() -> WorkerHandle {
        let (control_tx, control_rx) = mpsc::channel::<ControlMessage>();
        let (out_tx, out_rx) = mpsc::channel::<EngineMessage>();
        let join = thread::Builder::new()
            .name("stardrift-sim".into())
            .spawn(move || run(control_rx, out_tx))
            .expect("failed to spawn simulation thread");
        WorkerHandle {
            control: control_tx,
            frames: out_rx,
            join: Some(join),
        }
    }
}

/// Consumer-side handle: send control messages, receive engine messages.
///
/// Dropping the handle sends `Cleanup` and joins the thread.
pub struct WorkerHandle {
    control: Sender<ControlMessage>,
    frames: Receiver<EngineMessage>,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Send a raw control message.
    pub fn send(&self, message: ControlMessage) -> Result<(), WorkerError> {
        self.control
            .send(message)
            .map_err(|_| WorkerError::ChannelClosed)
    }

    /// Initialize the engine. Answered with [`EngineMessage::Ready`].
    pub fn init(&self, config: SimulationConfig) -> Result<(), WorkerError> {
        self.send(ControlMessage::Init(config))
    }

    /// Request one simulation tick.
    pub fn request_frame(
        &self,
        delta_ms: f32,
        dimensions: Option<(f32, f32)>,
    ) -> Result<(), WorkerError> {
        self.send(ControlMessage::RequestFrame {
            delta_ms,
            dimensions,
        })
    }

    /// Toggle boost.
    pub fn set_boost(&self, on: bool) -> Result<(), WorkerError> {
        self.send(ControlMessage::SetBoost(on))
    }

    /// Update viewport dimensions.
    pub fn set_dimensions(&self, width: f32, height: f32) -> Result<(), WorkerError> {
        self.send(ControlMessage::SetDimensions { width, height })
    }

    /// Apply a config delta at the next tick boundary.
    pub fn update_config(&self, delta: ConfigDelta) -> Result<(), WorkerError> {
        self.send(ControlMessage::UpdateConfig(delta))
    }

    /// Reinitialize all particles.
    pub fn reset(&self) -> Result<(), WorkerError> {
        self.send(ControlMessage::Reset)
    }

    /// Request teardown; the worker answers [`EngineMessage::CleanupDone`]
    /// and exits.
    pub fn cleanup(&self) -> Result<(), WorkerError> {
        self.send(ControlMessage::Cleanup)
    }

    /// Block for the next engine message.
    pub fn recv(&self) -> Result<EngineMessage, WorkerError> {
        self.frames.recv().map_err(|_| WorkerError::ChannelClosed)
    }

    /// Block for the next engine message, up to `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<EngineMessage, WorkerError> {
        self.frames
            .recv_timeout(timeout)
            .map_err(|_| WorkerError::ChannelClosed)
    }

    /// Non-blocking poll for an engine message.
    pub fn try_recv(&self) -> Option<EngineMessage> {
        self.frames.try_recv().ok()
    }

    /// Consume the handle and join the simulation thread.
    pub fn join(mut self) {
        let _ = self.cleanup();
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        let _ = self.control.send(ControlMessage::Cleanup);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// The simulation thread's control loop.
fn run(control: Receiver<ControlMessage>, out: Sender<EngineMessage>) {
    let mut engine: Option<Engine> = None;
    let mut queue = BatchQueue::default();
    // Measures the wall-clock rate of frame requests for the stats payload.
    let mut clock = FrameClock::new();
    let mut last_stats_tick = 0u64;

    loop {
        // Sleep on the control channel; the batch deadline doubles as the
        // flush timer.
        let message = match queue.deadline() {
            Some(deadline) => {
                let wait = deadline.saturating_duration_since(Instant::now());
                match control.recv_timeout(wait) {
                    Ok(message) => Some(message),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => return,
                }
            }
            None => match control.recv() {
                Ok(message) => Some(message),
                Err(_) => return,
            },
        };

        if let Some(flushed) = queue.flush_if_due(Instant::now()) {
            if out.send(flushed).is_err() {
                return;
            }
        }
        let Some(message) = message else {
            continue;
        };

        let outbound = match message {
            ControlMessage::Init(config) => match engine {
                Some(_) => Some(EngineMessage::Rejected(WorkerError::AlreadyInitialized)),
                None => match Engine::new(config) {
                    Ok(new_engine) => {
                        let ready = EngineMessage::Ready {
                            config: *new_engine.config(),
                            buffer: new_engine.snapshot_buffer(),
                        };
                        engine = Some(new_engine);
                        Some(ready)
                    }
                    Err(e) => Some(EngineMessage::Rejected(WorkerError::Config(e))),
                },
            },
            ControlMessage::RequestFrame {
                delta_ms,
                dimensions,
            } => match engine.as_mut() {
                Some(engine) => {
                    if let Some((width, height)) = dimensions {
                        if let Err(e) = engine.set_dimensions(width, height) {
                            eprintln!("stardrift: ignoring bad dimensions: {}", e);
                        }
                    }
                    clock.tick();
                    Some(frame_message(engine, delta_ms))
                }
                None => Some(EngineMessage::Rejected(WorkerError::NotInitialized)),
            },
            ControlMessage::RequestPartialFrame { update, delta_ms } => match engine.as_mut() {
                Some(engine) => match engine.merge_partial(&update) {
                    Ok(()) => {
                        clock.tick();
                        Some(frame_message(engine, delta_ms))
                    }
                    Err(e) => {
                        // One bad payload must not corrupt the store; the
                        // tick degrades to a no-op frame.
                        eprintln!("stardrift: dropping malformed partial update: {}", e);
                        Some(EngineMessage::NoChanges)
                    }
                },
                None => Some(EngineMessage::Rejected(WorkerError::NotInitialized)),
            },
            ControlMessage::SetBoost(on) => {
                if let Some(engine) = engine.as_mut() {
                    engine.set_boost(on);
                }
                None
            }
            ControlMessage::SetDimensions { width, height } => {
                if let Some(engine) = engine.as_mut() {
                    if let Err(e) = engine.set_dimensions(width, height) {
                        eprintln!("stardrift: ignoring bad dimensions: {}", e);
                    }
                }
                None
            }
            ControlMessage::UpdateConfig(delta) => match engine.as_mut() {
                Some(engine) => match engine.apply_config(&delta) {
                    Ok(buffer) => Some(EngineMessage::ConfigApplied {
                        config: *engine.config(),
                        buffer,
                    }),
                    Err(e) => Some(EngineMessage::Rejected(WorkerError::Config(e))),
                },
                None => Some(EngineMessage::Rejected(WorkerError::NotInitialized)),
            },
            ControlMessage::Reset => match engine.as_mut() {
                Some(engine) => {
                    let buffer = engine.reset();
                    // The tick counter restarted; the stats guard must too.
                    last_stats_tick = 0;
                    Some(EngineMessage::Ready {
                        config: *engine.config(),
                        buffer,
                    })
                }
                None => Some(EngineMessage::Rejected(WorkerError::NotInitialized)),
            },
            ControlMessage::Cleanup => {
                // Flush whatever the window still holds, release state, then
                // acknowledge so the consumer knows teardown completed.
                if let Some(flushed) = queue.flush() {
                    let _ = out.send(flushed);
                }
                if let Some(engine) = engine.as_mut() {
                    engine.release();
                }
                let _ = out.send(EngineMessage::CleanupDone);
                return;
            }
        };

        let Some(outbound) = outbound else {
            continue;
        };
        // High priority bypasses the window; the rest rides it.
        if let Some(immediate) = queue.enqueue(outbound) {
            if out.send(immediate).is_err() {
                return;
            }
        }

        // Stats ride the same window at low priority, once per due tick.
        if let Some(engine) = engine.as_ref() {
            if engine.tick_count() > last_stats_tick && engine.stats_due() {
                last_stats_tick = engine.tick_count();
                let stats = engine.frame_stats(clock.fps());
                if let Some(immediate) = queue.enqueue(EngineMessage::Stats(stats)) {
                    if out.send(immediate).is_err() {
                        return;
                    }
                }
            }
        }
    }
}

/// Tick the engine and wrap the output as a protocol message.
fn frame_message(engine: &mut Engine, delta_ms: f32) -> EngineMessage {
    match engine.tick(delta_ms) {
        FrameOutput::Full {
            buffer,
            regions,
            full_clear,
        } => EngineMessage::FrameUpdate {
            buffer,
            regions,
            full_clear,
        },
        FrameOutput::Partial {
            update,
            regions,
            full_clear,
        } => EngineMessage::PartialFrameUpdate {
            update,
            regions,
            full_clear,
        },
        FrameOutput::NoChanges => EngineMessage::NoChanges,
    }
}
