//! Error types for stardrift.
//!
//! This module provides error types for configuration validation, partial
//! update application, and worker lifecycle failures.

use std::fmt;

/// Errors that can occur when validating a simulation configuration.
///
/// Configuration is rejected at the `init`/`update_config` boundary rather
/// than silently clamped to a default.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Star count must be at least 1.
    InvalidStarCount(usize),
    /// Max depth must be a positive, finite number.
    InvalidMaxDepth(f32),
    /// Base or boost speed must be positive and finite.
    InvalidSpeed(f32),
    /// Viewport dimensions must be positive and finite.
    InvalidViewport(f32, f32),
    /// Partial-update threshold must be in (0, 1].
    InvalidPartialThreshold(f32),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidStarCount(n) => {
                write!(f, "Star count must be at least 1, got {}", n)
            }
            ConfigError::InvalidMaxDepth(d) => {
                write!(f, "Max depth must be positive and finite, got {}", d)
            }
            ConfigError::InvalidSpeed(s) => {
                write!(f, "Speed must be positive and finite, got {}", s)
            }
            ConfigError::InvalidViewport(w, h) => {
                write!(
                    f,
                    "Viewport dimensions must be positive and finite, got {}x{}",
                    w, h
                )
            }
            ConfigError::InvalidPartialThreshold(t) => {
                write!(f, "Partial-update threshold must be in (0, 1], got {}", t)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Errors that can occur when applying a partial update to a particle buffer.
///
/// These are transient: the target buffer is left untouched and the engine
/// remains usable after the failed application.
#[derive(Debug, Clone, PartialEq)]
pub enum PartialUpdateError {
    /// The record buffer length does not match the index list length.
    LengthMismatch { indices: usize, records: usize },
    /// An index refers past the end of the target buffer.
    IndexOutOfBounds { index: usize, len: usize },
}

impl fmt::Display for PartialUpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartialUpdateError::LengthMismatch { indices, records } => write!(
                f,
                "Partial update carries {} indices but {} records",
                indices, records
            ),
            PartialUpdateError::IndexOutOfBounds { index, len } => write!(
                f,
                "Partial update index {} out of bounds for buffer of {} particles",
                index, len
            ),
        }
    }
}

impl std::error::Error for PartialUpdateError {}

/// Errors that can occur when driving a simulation worker.
///
/// Lifecycle misuse (double init, use before init) and a torn-down channel
/// are the only failures that surface to the caller as hard errors; everything
/// else degrades to a no-op frame.
#[derive(Debug)]
pub enum WorkerError {
    /// `Init` was sent to an engine that is already initialized.
    AlreadyInitialized,
    /// A frame or config message arrived before `Init`.
    NotInitialized,
    /// The worker thread hung up its channel.
    ChannelClosed,
    /// Initialization failed due to invalid configuration.
    Config(ConfigError),
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerError::AlreadyInitialized => {
                write!(f, "Simulation worker is already initialized")
            }
            WorkerError::NotInitialized => {
                write!(f, "Simulation worker has not been initialized")
            }
            WorkerError::ChannelClosed => write!(f, "Simulation worker channel is closed"),
            WorkerError::Config(e) => write!(f, "Invalid configuration: {}", e),
        }
    }
}

impl std::error::Error for WorkerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WorkerError::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for WorkerError {
    fn from(e: ConfigError) -> Self {
        WorkerError::Config(e)
    }
}
