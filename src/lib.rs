//! # stardrift - off-main-thread starfield simulation
//!
//! A particle (starfield) simulation that runs on a dedicated thread, tracks
//! which screen regions changed between frames, and ships frame data to a
//! consumer through a priority-batched message channel - without sharing any
//! mutable memory across the thread boundary.
//!
//! ## Quick Start
//!
//! ```no_run
//! use stardrift::prelude::*;
//!
//! let handle = SimulationWorker::spawn();
//! handle.init(SimulationConfig::new().with_star_count(500)).unwrap();
//!
//! // Pull model: the simulation only advances when a frame is requested.
//! let mut clock = FrameClock::new();
//! loop {
//!     handle.request_frame(clock.tick(), None).unwrap();
//!     match handle.recv().unwrap() {
//!         EngineMessage::FrameUpdate { .. } => {
//!             // repaint the dirty regions (or everything on full_clear)
//!         }
//!         EngineMessage::PartialFrameUpdate { .. } => {
//!             // merge the changed records into the local copy by index
//!         }
//!         EngineMessage::NoChanges => {}
//!         _ => {}
//!     }
//! }
//! ```
//!
//! ## Core Concepts
//!
//! ### Particles
//!
//! Particles live in one packed buffer, six floats per record - position,
//! depth, previous position, liveness - with no per-particle heap objects.
//! The count is fixed at init and slots are reset in place, so an index names
//! the same particle forever. A particle whose depth reaches zero is recycled
//! to far depth, never destroyed.
//!
//! ### Partial updates
//!
//! Each tick records which indices changed. When few enough particles moved,
//! only those records cross the channel as a [`PartialUpdate`]; the receiver
//! merges them by index. Otherwise the whole buffer is transferred.
//!
//! ### Dirty regions
//!
//! Particle motion feeds a [`RegionTracker`] that merges repaint rectangles
//! through a uniform spatial grid, and decides when repainting everything
//! beats tracking the pieces ([`RegionTracker::should_full_clear`]).
//!
//! ### Ownership transfer
//!
//! Buffers cross the channel as owned values moved into the message. The
//! sender's handle is consumed by the send; there is no instant at which both
//! threads can touch the same buffer.
//!
//! ## Message Overview
//!
//! | Direction | Message | Priority |
//! |-----------|---------|----------|
//! | in | [`ControlMessage::Init`], [`ControlMessage::Reset`], [`ControlMessage::Cleanup`], [`ControlMessage::UpdateConfig`] | High |
//! | in | [`ControlMessage::RequestFrame`], [`ControlMessage::RequestPartialFrame`] | Normal |
//! | in | [`ControlMessage::SetBoost`], [`ControlMessage::SetDimensions`] | fire-and-forget |
//! | out | [`EngineMessage::Ready`], [`EngineMessage::ConfigApplied`], [`EngineMessage::CleanupDone`], [`EngineMessage::Rejected`] | High (immediate) |
//! | out | [`EngineMessage::FrameUpdate`], [`EngineMessage::PartialFrameUpdate`], [`EngineMessage::NoChanges`] | Normal (batched) |
//! | out | [`EngineMessage::Stats`] | Low (batched) |

pub mod changes;
pub mod config;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod regions;
pub mod store;
pub mod time;
pub mod worker;

pub use bytemuck;
pub use changes::{ChangeFlags, ChangeTracker, PartialUpdate};
pub use config::{ConfigDelta, SimulationConfig, TARGET_FRAME_MS};
pub use engine::{Engine, FrameOutput};
pub use error::{ConfigError, PartialUpdateError, WorkerError};
pub use glam::Vec2;
pub use protocol::{BatchQueue, ControlMessage, EngineMessage, FrameStats, Priority};
pub use regions::{DirtyRegion, RegionConfig, RegionKind, RegionTracker};
pub use store::{Particle, ParticleBuffer, FIELDS_PER_PARTICLE};
pub use time::FrameClock;
pub use worker::{SimulationWorker, WorkerHandle};

/// Convenient re-exports for common usage.
///
/// ```no_run
/// use stardrift::prelude::*;
/// ```
pub mod prelude {
    pub use crate::changes::PartialUpdate;
    pub use crate::config::{ConfigDelta, SimulationConfig};
    pub use crate::engine::{Engine, FrameOutput};
    pub use crate::protocol::{ControlMessage, EngineMessage, FrameStats};
    pub use crate::regions::{DirtyRegion, RegionConfig, RegionTracker};
    pub use crate::store::{Particle, ParticleBuffer};
    pub use crate::time::FrameClock;
    pub use crate::worker::{SimulationWorker, WorkerHandle};
    pub use crate::Vec2;
}
