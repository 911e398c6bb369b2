//! The per-tick simulation state machine.
//!
//! The engine advances every live particle one tick, recycles particles that
//! exit the view volume, records which indices changed, and feeds the motion
//! into the dirty-region tracker. It is pull-driven: nothing happens between
//! [`Engine::tick`] calls, so any moment between ticks is a safe config
//! boundary.
//!
//! Per tick, given a frame delta:
//! 1. normalize the delta against the reference frame duration;
//! 2. for each live index in ascending order, save the previous position and
//!    decrement depth by `speed * time_scale`;
//! 3. a particle at `z <= 0` is reseeded at far depth and marked recycled;
//! 4. otherwise a depth change past the movement epsilon marks it moved;
//! 5. dead slots are skipped entirely.
//!
//! Speed decays multiplicatively toward the base speed once per tick whenever
//! boost has pushed it above baseline.

use crate::changes::{ChangeFlags, ChangeTracker, PartialUpdate};
use crate::config::{ConfigDelta, SimulationConfig};
use crate::error::{ConfigError, PartialUpdateError};
use crate::protocol::FrameStats;
use crate::regions::{DirtyRegion, RegionConfig, RegionTracker};
use crate::store::ParticleBuffer;
use crate::time::time_scale;
use glam::Vec2;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Repaint padding around a particle, in logical units.
const PARTICLE_RADIUS: f32 = 2.0;

/// What a tick produced for the consumer.
#[derive(Debug)]
pub enum FrameOutput {
    /// Enough changed that transferring the whole store is cheaper.
    Full {
        buffer: ParticleBuffer,
        regions: Vec<DirtyRegion>,
        full_clear: bool,
    },
    /// Only the changed records, index-addressed.
    Partial {
        update: PartialUpdate,
        regions: Vec<DirtyRegion>,
        full_clear: bool,
    },
    /// Nothing moved.
    NoChanges,
}

/// The simulation engine: particle store, change tracker, and region tracker
/// advancing together under one config snapshot per tick.
#[derive(Debug)]
pub struct Engine {
    config: SimulationConfig,
    store: ParticleBuffer,
    changes: ChangeTracker,
    regions: RegionTracker,
    rng: StdRng,
    speed: f32,
    boost: bool,
    tick_count: u64,
}

impl Engine {
    /// Build an engine from a validated config, seeding all particles.
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Build with an explicit RNG for deterministic runs.
    pub fn with_rng(config: SimulationConfig, mut rng: StdRng) -> Result<Self, ConfigError> {
        config.validate()?;
        let store = ParticleBuffer::init(
            config.star_count,
            config.viewport_width,
            config.viewport_height,
            config.max_depth,
            &mut rng,
        );
        Ok(Self {
            store,
            changes: ChangeTracker::new(config.star_count),
            regions: RegionTracker::new(RegionConfig::for_canvas(
                config.viewport_width,
                config.viewport_height,
            )),
            rng,
            speed: config.base_speed,
            boost: false,
            tick_count: 0,
            config,
        })
    }

    /// The active config snapshot.
    #[inline]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Current speed in depth units per reference frame.
    #[inline]
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Ticks simulated since init.
    #[inline]
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// The authoritative particle store.
    #[inline]
    pub fn store(&self) -> &ParticleBuffer {
        &self.store
    }

    /// Mutable store access, for consumers that merge external state.
    #[inline]
    pub fn store_mut(&mut self) -> &mut ParticleBuffer {
        &mut self.store
    }

    /// The dirty-region tracker.
    #[inline]
    pub fn regions(&self) -> &RegionTracker {
        &self.regions
    }

    /// Changed indices from the last tick, in insertion order.
    #[inline]
    pub fn changed(&self) -> &[u32] {
        self.changes.changed()
    }

    /// Flags recorded for one particle on the last tick.
    #[inline]
    pub fn change_flags(&self, index: usize) -> ChangeFlags {
        self.changes.flags(index)
    }

    /// Swap speed between base and boost. Positions are untouched; the decay
    /// applied each tick brings speed back to baseline after boost ends.
    pub fn set_boost(&mut self, on: bool) {
        self.boost = on;
        self.speed = if on {
            self.config.boost_speed
        } else {
            self.config.base_speed
        };
    }

    /// Update viewport dimensions. Takes effect from the next tick; does not
    /// reinitialize the store.
    pub fn set_dimensions(&mut self, width: f32, height: f32) -> Result<(), ConfigError> {
        let update = self.config.apply(&ConfigDelta {
            viewport: Some((width, height)),
            ..Default::default()
        })?;
        self.config = update.config;
        self.regions.set_canvas(width, height);
        Ok(())
    }

    /// Apply a config delta at this tick boundary.
    ///
    /// Returns a freshly initialized transfer buffer when the star count
    /// changed and the store was rebuilt. The current config survives intact
    /// if the delta fails validation.
    pub fn apply_config(
        &mut self,
        delta: &ConfigDelta,
    ) -> Result<Option<ParticleBuffer>, ConfigError> {
        let update = self.config.apply(delta)?;
        self.config = update.config;
        self.regions
            .set_canvas(self.config.viewport_width, self.config.viewport_height);
        if !self.boost {
            self.speed = self.config.base_speed;
        }
        if update.reinitialize {
            self.reinit_store();
            Ok(Some(self.snapshot_buffer()))
        } else {
            Ok(None)
        }
    }

    /// Reseed every particle, as for a fresh init, and return the transfer
    /// buffer for the consumer.
    pub fn reset(&mut self) -> ParticleBuffer {
        self.reinit_store();
        self.tick_count = 0;
        self.snapshot_buffer()
    }

    fn reinit_store(&mut self) {
        self.store = ParticleBuffer::init(
            self.config.star_count,
            self.config.viewport_width,
            self.config.viewport_height,
            self.config.max_depth,
            &mut self.rng,
        );
        self.changes.resize(self.config.star_count);
    }

    /// Merge a returned partial buffer into the store before re-simulating.
    ///
    /// A malformed payload leaves the store untouched; the caller treats the
    /// tick as a no-op frame.
    pub fn merge_partial(&mut self, update: &PartialUpdate) -> Result<(), PartialUpdateError> {
        update.apply(&mut self.store)
    }

    /// Clone the store into a fresh transfer buffer.
    ///
    /// The returned buffer is the owned handle that moves across the channel;
    /// the store itself stays with the engine.
    pub fn snapshot_buffer(&self) -> ParticleBuffer {
        self.store.clone()
    }

    /// Advance one tick and decide what the consumer should receive.
    pub fn tick(&mut self, delta_ms: f32) -> FrameOutput {
        self.tick_count += 1;
        self.regions.begin_tick(self.tick_count);
        self.changes.reset();

        let scale = time_scale(delta_ms.max(0.0));
        let config = self.config;
        let step = self.speed * scale;

        for i in 0..self.store.len() {
            if !self.store[i].is_live() {
                continue;
            }
            let prev_z = self.store[i].z;
            {
                let p = &mut self.store[i];
                p.prev_x = p.x;
                p.prev_y = p.y;
                p.z -= step;
            }
            let p = self.store[i];

            if p.z <= 0.0 {
                let old = self.project(p.x, p.y, prev_z);
                self.store.reset_particle(
                    i,
                    config.viewport_width,
                    config.viewport_height,
                    config.max_depth,
                    &mut self.rng,
                );
                let fresh = self.store[i];
                let spawn = self.project(fresh.x, fresh.y, fresh.z);
                self.changes.mark_changed(i, ChangeFlags::RECYCLED);
                // Erase the old screen position, paint the new one.
                self.regions.add_motion(old, old, PARTICLE_RADIUS, 1);
                self.regions.add_motion(spawn, spawn, PARTICLE_RADIUS, 0);
            } else if (prev_z - p.z).abs() > config.movement_epsilon {
                self.changes.mark_changed(i, ChangeFlags::MOVED);
                let from = self.project(p.x, p.y, prev_z);
                let to = self.project(p.x, p.y, p.z);
                self.regions.add_motion(from, to, PARTICLE_RADIUS, 0);
            }
        }

        // Boost decay, once per tick whether or not anything moved.
        if self.speed > self.config.base_speed {
            self.speed = (self.speed * self.config.speed_decay).max(self.config.base_speed);
        }

        if self.changes.changed_count() == 0 {
            return FrameOutput::NoChanges;
        }

        let full_clear = self.regions.should_full_clear();
        let regions = self.regions.drain();
        if self
            .changes
            .prefers_partial(self.config.star_count, self.config.partial_threshold)
        {
            FrameOutput::Partial {
                update: self.changes.extract_partial(&self.store),
                regions,
                full_clear,
            }
        } else {
            FrameOutput::Full {
                buffer: self.snapshot_buffer(),
                regions,
                full_clear,
            }
        }
    }

    /// Whether a stats message is due after the last tick.
    pub fn stats_due(&self) -> bool {
        self.config.stats_interval > 0 && self.tick_count % self.config.stats_interval == 0
    }

    /// Statistics for the last tick. The frame rate is measured by the
    /// caller's clock, not the engine, so it comes in as an argument.
    pub fn frame_stats(&self, fps: f32) -> FrameStats {
        FrameStats {
            tick: self.tick_count,
            changed: self.changes.changed_count(),
            regions: self.regions.len(),
            fps,
            speed: self.speed,
            star_count: self.config.star_count,
        }
    }

    /// Shrink all owned state to minimal size before teardown.
    pub fn release(&mut self) {
        self.store.release();
        self.changes.release();
        self.regions.release();
    }

    /// Perspective mapping from logical space to the origin-centered canvas:
    /// unit scale at far depth, growing as a particle approaches the viewer.
    fn project(&self, x: f32, y: f32, z: f32) -> Vec2 {
        let scale = self.config.max_depth / z.max(0.1);
        Vec2::new(x * scale, y * scale)
    }
}
