//! GPU Layer Configuration
//!
//! This module defines the configuration consumed once during
//! [`GpuContext::new`](crate::GpuContext::new) and shared with the caches
//! that hang off the context (staging pool, timer result buffers).
//!
//! # Fields
//!
//! | Field                   | Description                             | Default           |
//! |-------------------------|-----------------------------------------|-------------------|
//! | `backends`              | Forced wgpu backend (or auto)           | `None`            |
//! | `power_preference`      | GPU adapter selection strategy          | `HighPerformance` |
//! | `required_features`     | Required wgpu features                  | Empty             |
//! | `required_limits`       | Required wgpu limits                    | Default           |
//! | `depth_format`          | Depth attachment texture format         | `Depth24Plus`     |
//! | `vsync`                 | Vertical sync for bound surfaces        | `true`            |
//! | `max_recovery_attempts` | Device-loss reacquisition budget        | `3`               |
//! | `recovery_backoff`      | Base delay between recovery attempts    | `100 ms`          |
//! | `staging_pool_cap`      | Max idle staging buffers kept alive     | `4`               |
//! | `timer_pool_cap`        | Max idle timestamp result buffers       | `8`               |

use std::time::Duration;

/// Global configuration for the GPU layer.
///
/// Device loss recovery is a bounded retry loop rather than an open-ended
/// re-initialization: after `max_recovery_attempts` failed reacquisitions the
/// context reports a terminal [`GlintError::DeviceLost`](crate::GlintError::DeviceLost).
#[derive(Debug, Clone)]
pub struct GpuSettings {
    // === GPU / Backend Configuration ===
    /// Force a specific wgpu backend (Vulkan, Metal, DX12, …).
    ///
    /// `None` lets wgpu choose the best available backend for the platform.
    /// Override this only when debugging backend-specific issues.
    pub backends: Option<wgpu::Backends>,

    /// GPU adapter selection preference.
    ///
    /// - `HighPerformance`: prefer discrete / dedicated GPU
    /// - `LowPower`: prefer integrated GPU (better battery life)
    pub power_preference: wgpu::PowerPreference,

    /// Required wgpu features that must be supported by the adapter.
    ///
    /// Initialization fails if these features are unavailable. Add
    /// [`wgpu::Features::TIMESTAMP_QUERY`] here to enable GPU pass timing.
    pub required_features: wgpu::Features,

    /// Required wgpu limits (max texture dimensions, binding counts, etc.).
    pub required_limits: wgpu::Limits,

    // === Presentation ===
    /// Depth attachment texture format shared by all bound views.
    pub depth_format: wgpu::TextureFormat,

    /// Enable vertical synchronization for bound surfaces.
    pub vsync: bool,

    // === Device-Loss Recovery ===
    /// Maximum number of device reacquisition attempts after a loss.
    pub max_recovery_attempts: u32,

    /// Base delay between recovery attempts; attempt *n* waits `n × backoff`.
    pub recovery_backoff: Duration,

    // === Cache Caps ===
    /// Maximum number of idle staging buffers retained by
    /// [`StagingPool`](crate::StagingPool). Buffers recycled past the cap
    /// are destroyed instead of pooled.
    pub staging_pool_cap: usize,

    /// Maximum number of idle timestamp result buffers retained by
    /// [`GpuTimer`](crate::GpuTimer).
    pub timer_pool_cap: usize,
}

impl Default for GpuSettings {
    fn default() -> Self {
        Self {
            backends: None,
            power_preference: wgpu::PowerPreference::HighPerformance,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            depth_format: wgpu::TextureFormat::Depth24Plus,
            vsync: true,
            max_recovery_attempts: 3,
            recovery_backoff: Duration::from_millis(100),
            staging_pool_cap: 4,
            timer_pool_cap: 8,
        }
    }
}
