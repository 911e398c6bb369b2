//! Packed particle storage.
//!
//! Particles live in one contiguous buffer of fixed-arity records, six floats
//! per record, with no per-particle heap objects. The record count is fixed at
//! initialization; slots are reset in place rather than reallocated, so an
//! index identifies the same particle for the lifetime of the buffer. That
//! stability is what makes cross-thread partial updates index-addressable.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use rand::Rng;

/// Floats per particle record.
pub const FIELDS_PER_PARTICLE: usize = 6;

/// One particle record: position, depth, previous position, liveness.
///
/// `#[repr(C)]` + [`Pod`] so a `&[Particle]` casts losslessly to `&[f32]`
/// for transfer or inspection.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Particle {
    /// Current position in the unbounded, origin-centered logical space.
    pub x: f32,
    pub y: f32,
    /// Depth in `(0, max_depth]`; decreases each tick, recycled at `z <= 0`.
    pub z: f32,
    /// Position at the previous tick, for motion deltas and trails.
    pub prev_x: f32,
    pub prev_y: f32,
    /// Liveness flag encoded as a float: 1.0 live, 0.0 dead.
    pub in_use: f32,
}

impl Particle {
    /// Whether this slot participates in simulation.
    #[inline]
    pub fn is_live(&self) -> bool {
        self.in_use != 0.0
    }

    /// Current position as a vector.
    #[inline]
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    /// Previous-tick position as a vector.
    #[inline]
    pub fn prev_position(&self) -> Vec2 {
        Vec2::new(self.prev_x, self.prev_y)
    }
}

/// An owned, fixed-size particle buffer.
///
/// This is the single-writer handle the protocol moves across the thread
/// boundary: sending it into a message consumes it, so the sender cannot keep
/// writing to a buffer it no longer owns.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleBuffer {
    particles: Vec<Particle>,
}

impl ParticleBuffer {
    /// Allocate and seed a buffer of `count` particles.
    ///
    /// Positions are uniform in `[-width, width] x [-height, height]`, depth
    /// uniform in `[0, depth)`, previous position equal to current, all slots
    /// live.
    pub fn init<R: Rng>(count: usize, width: f32, height: f32, depth: f32, rng: &mut R) -> Self {
        let mut buffer = Self {
            particles: vec![Particle::zeroed(); count],
        };
        for i in 0..count {
            buffer.reset_particle(i, width, height, depth, rng);
            // Initial seeding spreads depth across the whole volume so the
            // field doesn't start as a single far plane.
            buffer.particles[i].z = rng.gen_range(0.0..depth);
        }
        buffer
    }

    /// Allocate a zeroed buffer of `count` dead particles.
    pub fn empty(count: usize) -> Self {
        Self {
            particles: vec![Particle::zeroed(); count],
        }
    }

    /// Reseed one record to a far-depth, random-position state.
    ///
    /// Used both for recycling (the particle reached the viewer) and for
    /// count-change reinitialization. Allocation-free.
    pub fn reset_particle<R: Rng>(
        &mut self,
        index: usize,
        width: f32,
        height: f32,
        depth: f32,
        rng: &mut R,
    ) {
        let p = &mut self.particles[index];
        p.x = rng.gen_range(-width..=width);
        p.y = rng.gen_range(-height..=height);
        p.z = depth;
        p.prev_x = p.x;
        p.prev_y = p.y;
        p.in_use = 1.0;
    }

    /// Number of particle records.
    #[inline]
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Shared record access.
    #[inline]
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Mutable record access.
    #[inline]
    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    /// The packed float view: `len() * FIELDS_PER_PARTICLE` floats.
    #[inline]
    pub fn as_floats(&self) -> &[f32] {
        bytemuck::cast_slice(&self.particles)
    }

    /// Release backing memory down to capacity zero.
    ///
    /// Cleanup support: the worker shrinks its store before acknowledging
    /// teardown.
    pub fn release(&mut self) {
        self.particles.clear();
        self.particles.shrink_to_fit();
    }
}

impl std::ops::Index<usize> for ParticleBuffer {
    type Output = Particle;

    #[inline]
    fn index(&self, index: usize) -> &Particle {
        &self.particles[index]
    }
}

impl std::ops::IndexMut<usize> for ParticleBuffer {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut Particle {
        &mut self.particles[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_init_bounds_and_liveness() {
        let mut rng = StdRng::seed_from_u64(7);
        let buffer = ParticleBuffer::init(64, 100.0, 50.0, 32.0, &mut rng);

        assert_eq!(buffer.len(), 64);
        for p in buffer.particles() {
            assert!(p.is_live());
            assert!(p.x >= -100.0 && p.x <= 100.0);
            assert!(p.y >= -50.0 && p.y <= 50.0);
            assert!(p.z >= 0.0 && p.z < 32.0);
            assert_eq!(p.prev_x, p.x);
            assert_eq!(p.prev_y, p.y);
        }
    }

    #[test]
    fn test_float_view_is_packed() {
        let mut rng = StdRng::seed_from_u64(7);
        let buffer = ParticleBuffer::init(4, 10.0, 10.0, 8.0, &mut rng);

        let floats = buffer.as_floats();
        assert_eq!(floats.len(), 4 * FIELDS_PER_PARTICLE);
        assert_eq!(floats[0], buffer[0].x);
        assert_eq!(floats[FIELDS_PER_PARTICLE + 2], buffer[1].z);
    }

    #[test]
    fn test_reset_particle_goes_to_far_depth() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut buffer = ParticleBuffer::init(4, 10.0, 10.0, 8.0, &mut rng);

        buffer[2].z = -0.5;
        buffer.reset_particle(2, 10.0, 10.0, 8.0, &mut rng);
        assert_eq!(buffer[2].z, 8.0);
        assert!(buffer[2].is_live());
        assert_eq!(buffer[2].prev_x, buffer[2].x);
    }

    #[test]
    fn test_release_drops_capacity() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut buffer = ParticleBuffer::init(128, 10.0, 10.0, 8.0, &mut rng);
        buffer.release();
        assert!(buffer.is_empty());
    }
}
