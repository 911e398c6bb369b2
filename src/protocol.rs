//! Cross-thread message protocol and outbound batching.
//!
//! The simulation and its consumer share no memory; everything crosses the
//! boundary as a message. Inbound control messages ([`ControlMessage`]) drive
//! the engine; outbound engine messages ([`EngineMessage`]) carry frame data,
//! stats, and lifecycle acknowledgements. Buffer payloads are owned values
//! moved into the message, so sending one is an ownership transfer enforced by
//! the type system, not a convention.
//!
//! Outbound traffic goes through a [`BatchQueue`]: high-priority lifecycle
//! messages bypass batching and flush immediately, while frame and stats
//! traffic is held until a fixed time window elapses and then coalesced into
//! one compound [`EngineMessage::Batch`] per flush.

use crate::changes::PartialUpdate;
use crate::config::{ConfigDelta, SimulationConfig};
use crate::error::WorkerError;
use crate::regions::DirtyRegion;
use crate::store::ParticleBuffer;
use std::time::{Duration, Instant};

/// Default outbound batching window.
pub const BATCH_WINDOW: Duration = Duration::from_millis(16);

/// Message priority classes.
///
/// `High` bypasses batching entirely; `Normal` and `Low` ride the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Low,
    Normal,
    High,
}

/// Consumer-to-engine control messages.
#[derive(Debug)]
pub enum ControlMessage {
    /// Initialize the engine. Answered with [`EngineMessage::Ready`].
    Init(SimulationConfig),
    /// Advance one tick and reply with a full or partial frame update.
    /// Dimensions, when present, are applied before the tick.
    RequestFrame {
        delta_ms: f32,
        dimensions: Option<(f32, f32)>,
    },
    /// Return a previously transferred partial buffer: the engine re-merges
    /// it into its store, then simulates a tick as for `RequestFrame`.
    RequestPartialFrame { update: PartialUpdate, delta_ms: f32 },
    /// Toggle boost speed. Fire-and-forget.
    SetBoost(bool),
    /// Update viewport dimensions. Fire-and-forget.
    SetDimensions { width: f32, height: f32 },
    /// Apply a config delta at the next tick boundary. Answered with
    /// [`EngineMessage::ConfigApplied`].
    UpdateConfig(ConfigDelta),
    /// Reinitialize all particles. Answered with [`EngineMessage::Ready`].
    Reset,
    /// Tear down: flush pending output, release buffers, acknowledge with
    /// [`EngineMessage::CleanupDone`], then the worker thread exits.
    Cleanup,
}

/// Engine-to-consumer messages.
#[derive(Debug)]
pub enum EngineMessage {
    /// Initialization or reset completed; carries the freshly initialized
    /// buffer and the active config.
    Ready {
        config: SimulationConfig,
        buffer: ParticleBuffer,
    },
    /// Full-buffer frame: the whole store plus the dirty regions to repaint.
    FrameUpdate {
        buffer: ParticleBuffer,
        regions: Vec<DirtyRegion>,
        full_clear: bool,
    },
    /// Partial frame: only the changed records, index-addressed.
    PartialFrameUpdate {
        update: PartialUpdate,
        regions: Vec<DirtyRegion>,
        full_clear: bool,
    },
    /// Nothing moved this tick.
    NoChanges,
    /// Periodic statistics.
    Stats(FrameStats),
    /// A config delta was applied; carries a fresh buffer when the store was
    /// reinitialized.
    ConfigApplied {
        config: SimulationConfig,
        buffer: Option<ParticleBuffer>,
    },
    /// Cleanup finished; no further messages will follow.
    CleanupDone,
    /// A lifecycle hard failure: double init, use before init, or a rejected
    /// configuration. The engine state is unchanged.
    Rejected(WorkerError),
    /// Coalesced window flush, payloads in enqueue order.
    Batch(Vec<EngineMessage>),
}

impl EngineMessage {
    /// Scheduling class for this message.
    pub fn priority(&self) -> Priority {
        match self {
            EngineMessage::Ready { .. }
            | EngineMessage::ConfigApplied { .. }
            | EngineMessage::CleanupDone
            | EngineMessage::Rejected(_) => Priority::High,
            EngineMessage::FrameUpdate { .. }
            | EngineMessage::PartialFrameUpdate { .. }
            | EngineMessage::NoChanges
            | EngineMessage::Batch(_) => Priority::Normal,
            EngineMessage::Stats(_) => Priority::Low,
        }
    }
}

/// Per-frame statistics, emitted at [`Priority::Low`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStats {
    /// Ticks simulated since init.
    pub tick: u64,
    /// Particles marked changed on the last tick.
    pub changed: usize,
    /// Dirty regions tracked after the last tick.
    pub regions: usize,
    /// Frame-request rate observed by the worker, in frames per second.
    pub fps: f32,
    /// Current speed in depth units per reference frame.
    pub speed: f32,
    /// Particle count.
    pub star_count: usize,
}

/// Priority-aware outbound batching.
///
/// `High` messages are returned to the caller immediately for individual
/// sending. `Normal` and `Low` messages accumulate until the window deadline;
/// [`BatchQueue::flush`] then drains them as one message, normals before lows,
/// each class in enqueue order. Arming the deadline is idempotent: enqueues
/// while a flush is already pending do not push the deadline back.
#[derive(Debug)]
pub struct BatchQueue {
    window: Duration,
    normal: Vec<EngineMessage>,
    low: Vec<EngineMessage>,
    deadline: Option<Instant>,
}

impl BatchQueue {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            normal: Vec::new(),
            low: Vec::new(),
            deadline: None,
        }
    }

    /// Enqueue a message. Returns it back when it must be sent immediately
    /// (High priority bypass); otherwise buffers it and arms the window.
    pub fn enqueue(&mut self, message: EngineMessage) -> Option<EngineMessage> {
        match message.priority() {
            Priority::High => Some(message),
            Priority::Normal => {
                self.normal.push(message);
                self.arm();
                None
            }
            Priority::Low => {
                self.low.push(message);
                self.arm();
                None
            }
        }
    }

    fn arm(&mut self) {
        if self.deadline.is_none() {
            self.deadline = Some(Instant::now() + self.window);
        }
    }

    /// The pending flush deadline, if armed.
    #[inline]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the window has elapsed.
    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|d| now >= d)
    }

    /// Buffered message count.
    pub fn pending(&self) -> usize {
        self.normal.len() + self.low.len()
    }

    /// Drain everything buffered, regardless of the deadline.
    ///
    /// A single buffered message is returned bare; two or more are wrapped in
    /// one [`EngineMessage::Batch`], normals before lows, in enqueue order.
    pub fn flush(&mut self) -> Option<EngineMessage> {
        self.deadline = None;
        let mut batch: Vec<EngineMessage> = self.normal.drain(..).collect();
        batch.extend(self.low.drain(..));
        match batch.len() {
            0 => None,
            1 => batch.pop(),
            _ => Some(EngineMessage::Batch(batch)),
        }
    }

    /// Flush only when the deadline has passed.
    pub fn flush_if_due(&mut self, now: Instant) -> Option<EngineMessage> {
        if self.is_due(now) {
            self.flush()
        } else {
            None
        }
    }
}

impl Default for BatchQueue {
    fn default() -> Self {
        Self::new(BATCH_WINDOW)
    }
}
