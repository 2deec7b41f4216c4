//! Error Types
//!
//! This module defines the error types used throughout the crate.
//!
//! # Overview
//!
//! The main error type [`GlintError`] covers all failure modes including:
//! - GPU adapter/device acquisition failures
//! - Device loss after recovery exhaustion
//! - Surface target resolution and configuration errors
//!
//! # Usage
//!
//! All public APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, GlintError>`.

use thiserror::Error;

/// The main error type for the glint GPU layer.
///
/// Environment-capability failures (no adapter, no device) are raised once
/// at startup and never retried. Device loss is recoverable up to the
/// configured attempt budget, after which it becomes terminal.
#[derive(Error, Debug)]
pub enum GlintError {
    // ========================================================================
    // GPU & Device Errors
    // ========================================================================
    /// Failed to request a compatible GPU adapter.
    #[error("Failed to request WGPU adapter: {0}")]
    AdapterRequestFailed(String),

    /// Failed to create the GPU device.
    #[error("Failed to create WGPU device: {0}")]
    DeviceCreateFailed(#[from] wgpu::RequestDeviceError),

    /// The device was lost and could not be reacquired within the
    /// configured attempt budget.
    #[error("Device lost and not recovered after {attempts} attempt(s)")]
    DeviceLost {
        /// Number of recovery attempts made before giving up.
        attempts: u32,
    },

    // ========================================================================
    // Surface Errors
    // ========================================================================
    /// The requested surface target does not exist and could not be created.
    #[error("Surface target not found: {0}")]
    TargetNotFound(String),

    /// Failed to create or configure a presentation surface.
    #[error("Surface error: {0}")]
    SurfaceError(String),

    /// A lifecycle method was called on a destroyed component.
    #[error("Component already destroyed: {0}")]
    Destroyed(String),
}

impl From<wgpu::CreateSurfaceError> for GlintError {
    fn from(err: wgpu::CreateSurfaceError) -> Self {
        GlintError::SurfaceError(err.to_string())
    }
}

/// Alias for `Result<T, GlintError>`.
pub type Result<T> = std::result::Result<T, GlintError>;
