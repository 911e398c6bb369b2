//! Simulation configuration.
//!
//! Configuration is validated at construction and treated as an immutable
//! snapshot for the duration of a tick. Runtime changes arrive as a
//! [`ConfigDelta`] and are applied only at tick boundaries, so a tick never
//! observes a half-updated config.

use crate::error::ConfigError;

/// Reference frame duration used to normalize delta time, in milliseconds.
pub const TARGET_FRAME_MS: f32 = 16.7;

/// Validated simulation configuration.
///
/// Use method chaining to adjust defaults, then pass to the engine or worker:
///
/// ```
/// use stardrift::SimulationConfig;
///
/// let config = SimulationConfig::new()
///     .with_star_count(500)
///     .with_viewport(1920.0, 1080.0)
///     .validated()
///     .unwrap();
/// assert_eq!(config.star_count, 500);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationConfig {
    /// Number of particle records. Changing this forces store reinitialization.
    pub star_count: usize,
    /// Depth of the view volume; particles live in `(0, max_depth]`.
    pub max_depth: f32,
    /// Cruising speed, in depth units per reference frame.
    pub base_speed: f32,
    /// Speed while boost is engaged.
    pub boost_speed: f32,
    /// Logical viewport width (positions span `[-width, width]`).
    pub viewport_width: f32,
    /// Logical viewport height (positions span `[-height, height]`).
    pub viewport_height: f32,
    /// Fraction of `star_count` below which a partial update is preferred
    /// over a full buffer transfer.
    pub partial_threshold: f32,
    /// Minimum depth change that counts as movement.
    pub movement_epsilon: f32,
    /// Multiplicative decay applied per tick while speed is above baseline.
    pub speed_decay: f32,
    /// Emit a stats message every this many ticks.
    pub stats_interval: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            star_count: 300,
            max_depth: 32.0,
            base_speed: 0.25,
            boost_speed: 2.0,
            viewport_width: 800.0,
            viewport_height: 600.0,
            partial_threshold: 0.3,
            movement_epsilon: 0.1,
            speed_decay: 0.98,
            stats_interval: 30,
        }
    }
}

impl SimulationConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of particles.
    pub fn with_star_count(mut self, count: usize) -> Self {
        self.star_count = count;
        self
    }

    /// Set the depth of the view volume.
    pub fn with_max_depth(mut self, depth: f32) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set base and boost speeds.
    pub fn with_speeds(mut self, base: f32, boost: f32) -> Self {
        self.base_speed = base;
        self.boost_speed = boost;
        self
    }

    /// Set the logical viewport dimensions.
    pub fn with_viewport(mut self, width: f32, height: f32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Set the partial-vs-full update threshold (fraction of star count).
    pub fn with_partial_threshold(mut self, threshold: f32) -> Self {
        self.partial_threshold = threshold;
        self
    }

    /// Validate the configuration, consuming the builder.
    pub fn validated(self) -> Result<Self, ConfigError> {
        self.validate()?;
        Ok(self)
    }

    /// Check every field without consuming.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.star_count == 0 {
            return Err(ConfigError::InvalidStarCount(self.star_count));
        }
        if !(self.max_depth.is_finite() && self.max_depth > 0.0) {
            return Err(ConfigError::InvalidMaxDepth(self.max_depth));
        }
        for speed in [self.base_speed, self.boost_speed] {
            if !(speed.is_finite() && speed > 0.0) {
                return Err(ConfigError::InvalidSpeed(speed));
            }
        }
        if !(self.viewport_width.is_finite()
            && self.viewport_width > 0.0
            && self.viewport_height.is_finite()
            && self.viewport_height > 0.0)
        {
            return Err(ConfigError::InvalidViewport(
                self.viewport_width,
                self.viewport_height,
            ));
        }
        if !(self.partial_threshold > 0.0 && self.partial_threshold <= 1.0) {
            return Err(ConfigError::InvalidPartialThreshold(self.partial_threshold));
        }
        Ok(())
    }

    /// Apply a delta, producing the next config snapshot.
    ///
    /// The result reports whether the store must be reinitialized (star count
    /// changed). The current config is untouched if validation fails.
    pub fn apply(&self, delta: &ConfigDelta) -> Result<ConfigUpdate, ConfigError> {
        let mut next = *self;
        if let Some(count) = delta.star_count {
            next.star_count = count;
        }
        if let Some(depth) = delta.max_depth {
            next.max_depth = depth;
        }
        if let Some(base) = delta.base_speed {
            next.base_speed = base;
        }
        if let Some(boost) = delta.boost_speed {
            next.boost_speed = boost;
        }
        if let Some((w, h)) = delta.viewport {
            next.viewport_width = w;
            next.viewport_height = h;
        }
        if let Some(t) = delta.partial_threshold {
            next.partial_threshold = t;
        }
        next.validate()?;
        Ok(ConfigUpdate {
            config: next,
            reinitialize: next.star_count != self.star_count,
        })
    }
}

/// A partial configuration change, applied at a tick boundary.
///
/// Fields left as `None` keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConfigDelta {
    pub star_count: Option<usize>,
    pub max_depth: Option<f32>,
    pub base_speed: Option<f32>,
    pub boost_speed: Option<f32>,
    pub viewport: Option<(f32, f32)>,
    pub partial_threshold: Option<f32>,
}

impl ConfigDelta {
    /// An empty delta.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this delta changes anything at all.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Outcome of applying a [`ConfigDelta`].
#[derive(Debug, Clone, Copy)]
pub struct ConfigUpdate {
    /// The next config snapshot.
    pub config: SimulationConfig,
    /// True when the particle store must be rebuilt (star count changed).
    pub reinitialize: bool,
}
