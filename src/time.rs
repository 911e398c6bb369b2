//! Frame timing.
//!
//! A small clock for the consumer side of the pull model: it measures the
//! delta passed to `RequestFrame`, normalizes it against the reference frame
//! duration, and keeps an fps estimate updated at a fixed interval.

use crate::config::TARGET_FRAME_MS;
use std::time::{Duration, Instant};

/// Delta measurement and fps estimation for a frame loop.
#[derive(Debug)]
pub struct FrameClock {
    last_frame: Instant,
    frame_count: u64,
    fps: f32,
    fps_frame_count: u64,
    fps_update_time: Instant,
    fps_update_interval: Duration,
}

impl FrameClock {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            last_frame: now,
            frame_count: 0,
            fps: 0.0,
            fps_frame_count: 0,
            fps_update_time: now,
            fps_update_interval: Duration::from_millis(500),
        }
    }

    /// Record a frame and return the delta since the previous one, in
    /// milliseconds.
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let delta_ms = now.duration_since(self.last_frame).as_secs_f32() * 1000.0;
        self.last_frame = now;
        self.frame_count += 1;

        let fps_elapsed = now.duration_since(self.fps_update_time);
        if fps_elapsed >= self.fps_update_interval {
            let frames_since = self.frame_count - self.fps_frame_count;
            self.fps = frames_since as f32 / fps_elapsed.as_secs_f32();
            self.fps_frame_count = self.frame_count;
            self.fps_update_time = now;
        }

        delta_ms
    }

    /// Frames recorded since creation.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }

    /// Estimated frames per second.
    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalize a frame delta to the reference frame duration, so particle
/// motion is frame-rate independent.
#[inline]
pub fn time_scale(delta_ms: f32) -> f32 {
    delta_ms / TARGET_FRAME_MS
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_tick_measures_delta() {
        let mut clock = FrameClock::new();
        thread::sleep(Duration::from_millis(10));
        let delta = clock.tick();
        assert!(delta >= 9.0);
        assert_eq!(clock.frame(), 1);
    }

    #[test]
    fn test_time_scale_reference_frame() {
        assert!((time_scale(16.7) - 1.0).abs() < 1e-6);
        assert!((time_scale(33.4) - 2.0).abs() < 1e-6);
    }
}
