//! GPU Device Context
//!
//! The [`GpuContext`] acquires and monitors the graphics device. It owns the
//! wgpu instance and adapter, negotiates features and limits once at startup,
//! and replaces the whole [`DeviceHandle`] on loss-driven recovery.
//!
//! Dependent caches never hold a raw device comparison; they record the
//! handle's `epoch` and invalidate themselves whenever it advances.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::errors::{GlintError, Result};
use crate::settings::GpuSettings;
use crate::staging::StagingPool;
use crate::timing::GpuTimer;

/// Snapshot of the active device and its negotiated capability set.
///
/// A handle is created at startup and replaced wholesale when the device is
/// reacquired after a loss; it is never mutated in place. The `epoch` field
/// is the generation counter caches compare on every access.
#[derive(Clone)]
pub struct DeviceHandle {
    /// The wgpu device for resource creation.
    pub device: wgpu::Device,
    /// The command submission queue.
    pub queue: wgpu::Queue,
    /// Features negotiated at device creation.
    pub features: wgpu::Features,
    /// Limits negotiated at device creation.
    pub limits: wgpu::Limits,

    epoch: u64,
    lost: Arc<AtomicBool>,
    recoverable: Arc<AtomicBool>,
}

impl DeviceHandle {
    /// Generation counter, incremented on every loss-driven replacement.
    #[inline]
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether the underlying device has reported a loss.
    ///
    /// Dependents use this to short-circuit operations against a stale
    /// device (e.g. [`GpuTimer::read_elapsed`](crate::GpuTimer::read_elapsed)).
    #[inline]
    #[must_use]
    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }

    /// Largest supported 2D texture dimension, used to clamp backing sizes.
    #[inline]
    #[must_use]
    pub fn max_texture_dimension_2d(&self) -> u32 {
        self.limits.max_texture_dimension_2d
    }

    /// Nanoseconds per timestamp tick for this queue.
    #[must_use]
    pub fn timestamp_period(&self) -> f32 {
        self.queue.get_timestamp_period()
    }
}

/// Core GPU context holding the instance, adapter and current device handle.
///
/// Initialization failure (no capable adapter or device) is fatal and never
/// retried. Device loss is absorbed here: [`GpuContext::ensure_device`] runs
/// a bounded recovery loop and dependents simply observe a new handle with a
/// higher epoch on their next access.
pub struct GpuContext {
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    handle: DeviceHandle,
    presentation_format: wgpu::TextureFormat,
    settings: GpuSettings,
}

impl GpuContext {
    /// Requests an adapter and device according to `settings`.
    ///
    /// This is an environment-capability negotiation: if no adapter or
    /// device is obtainable the error is terminal.
    pub async fn new(settings: GpuSettings) -> Result<Self> {
        let instance = match settings.backends {
            Some(backends) => wgpu::Instance::new(&wgpu::InstanceDescriptor {
                backends,
                ..Default::default()
            }),
            None => wgpu::Instance::default(),
        };

        let adapter = Self::request_adapter(&instance, &settings).await?;
        let handle = Self::request_handle(&adapter, &settings, 0).await?;

        Ok(Self {
            instance,
            adapter,
            handle,
            presentation_format: wgpu::TextureFormat::Bgra8UnormSrgb,
            settings,
        })
    }

    async fn request_adapter(
        instance: &wgpu::Instance,
        settings: &GpuSettings,
    ) -> Result<wgpu::Adapter> {
        instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: settings.power_preference,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| GlintError::AdapterRequestFailed(e.to_string()))
    }

    async fn request_handle(
        adapter: &wgpu::Adapter,
        settings: &GpuSettings,
        epoch: u64,
    ) -> Result<DeviceHandle> {
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: settings.required_features,
                required_limits: settings.required_limits.clone(),
                memory_hints: wgpu::MemoryHints::Performance,
                ..Default::default()
            })
            .await?;

        let lost = Arc::new(AtomicBool::new(false));
        let recoverable = Arc::new(AtomicBool::new(true));
        {
            let lost = lost.clone();
            let recoverable = recoverable.clone();
            device.set_device_lost_callback(move |reason, message| {
                log::warn!("Device lost ({reason:?}): {message}");
                recoverable.store(
                    !matches!(reason, wgpu::DeviceLostReason::Destroyed),
                    Ordering::Release,
                );
                lost.store(true, Ordering::Release);
            });
        }

        let features = device.features();
        let limits = device.limits();

        Ok(DeviceHandle {
            device,
            queue,
            features,
            limits,
            epoch,
            lost,
            recoverable,
        })
    }

    /// Per-frame device check.
    ///
    /// Cheap in the common case. When the device has reported a recoverable
    /// loss, runs the bounded recovery loop and returns the fresh handle; an
    /// intentional destroy or an exhausted attempt budget is terminal.
    pub fn ensure_device(&mut self) -> Result<&DeviceHandle> {
        if self.handle.is_lost() {
            if !self.handle.recoverable.load(Ordering::Acquire) {
                return Err(GlintError::DeviceLost { attempts: 0 });
            }
            self.recover()?;
        }
        Ok(&self.handle)
    }

    /// Reacquires the adapter and device, replacing the current handle.
    ///
    /// Retries up to `settings.max_recovery_attempts` times with linear
    /// backoff (`attempt × recovery_backoff`). The epoch of the new handle
    /// is one greater than the old, which invalidates every dependent cache
    /// on its next access.
    pub fn recover(&mut self) -> Result<()> {
        let attempts = self.settings.max_recovery_attempts.max(1);
        let next_epoch = self.handle.epoch + 1;

        for attempt in 1..=attempts {
            log::info!("Reacquiring GPU device (attempt {attempt}/{attempts})");

            let acquired = pollster::block_on(async {
                let adapter = Self::request_adapter(&self.instance, &self.settings).await?;
                let handle = Self::request_handle(&adapter, &self.settings, next_epoch).await?;
                Ok::<_, GlintError>((adapter, handle))
            });

            match acquired {
                Ok((adapter, handle)) => {
                    self.adapter = adapter;
                    self.handle = handle;
                    log::info!("GPU device reacquired, epoch {next_epoch}");
                    return Ok(());
                }
                Err(e) => {
                    log::warn!("Device reacquisition failed: {e}");
                    if attempt < attempts {
                        std::thread::sleep(self.settings.recovery_backoff * attempt);
                    }
                }
            }
        }

        Err(GlintError::DeviceLost { attempts })
    }

    /// Builds a surface configuration at the negotiated presentation format.
    ///
    /// Records the surface's preferred format as the context-wide
    /// presentation format so subsequently bound views agree on it.
    pub fn default_surface_config(
        &mut self,
        surface: &wgpu::Surface<'_>,
        width: u32,
        height: u32,
    ) -> Result<wgpu::SurfaceConfiguration> {
        let mut config = surface
            .get_default_config(&self.adapter, width.max(1), height.max(1))
            .ok_or_else(|| {
                GlintError::SurfaceError("Surface not supported by adapter".to_string())
            })?;

        config.present_mode = if self.settings.vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        };

        self.presentation_format = config.format;
        Ok(config)
    }

    /// The current device handle.
    #[inline]
    #[must_use]
    pub fn handle(&self) -> &DeviceHandle {
        &self.handle
    }

    /// The wgpu instance, needed by hosts that create presentation surfaces.
    #[inline]
    #[must_use]
    pub fn instance(&self) -> &wgpu::Instance {
        &self.instance
    }

    /// Information about the selected adapter.
    #[must_use]
    pub fn adapter_info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    /// Current device generation.
    #[inline]
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.handle.epoch
    }

    /// Whether the current device has reported a loss.
    #[inline]
    #[must_use]
    pub fn is_lost(&self) -> bool {
        self.handle.is_lost()
    }

    /// Color format bound surfaces are configured with.
    #[inline]
    #[must_use]
    pub fn presentation_format(&self) -> wgpu::TextureFormat {
        self.presentation_format
    }

    /// The settings this context was built with.
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &GpuSettings {
        &self.settings
    }

    /// Builds a staging pool with the configured idle-buffer cap.
    #[must_use]
    pub fn create_staging_pool(&self, slot_size: u64) -> StagingPool {
        StagingPool::new(slot_size, self.settings.staging_pool_cap)
    }

    /// Builds a pass timer with the configured result-buffer cap.
    #[must_use]
    pub fn create_timer(&self) -> GpuTimer {
        GpuTimer::new(&self.handle, self.settings.timer_pool_cap)
    }
}
