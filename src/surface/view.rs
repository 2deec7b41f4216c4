//! Render View Lifecycle
//!
//! A [`RenderView`] is one rendering component's binding to a surface
//! target: it tracks the target's backing pixel size and visibility through
//! host observers, owns the component's shared depth attachment, and tears
//! everything down in order on [`destroy`](RenderView::destroy).
//!
//! State machine:
//!
//! ```text
//! Uninitialized → Initializing → Active ⇄ Inactive → Destroyed (terminal)
//! ```
//!
//! A destroyed view is never reused; create a fresh instance and call
//! [`initialize`](RenderView::initialize) again.

use crate::context::{DeviceHandle, GpuContext};
use crate::errors::{GlintError, Result};
use crate::surface::host::{ObserverId, ObserverKind, SurfaceEvent, SurfaceHost, TargetId};

/// Computes the backing pixel size for a logical content box.
///
/// `content × scale`, rounded, clamped per axis to `[1, max_dim]` where
/// `max_dim` is the device's largest supported 2D texture dimension.
#[must_use]
pub fn compute_backing_size(width: f32, height: f32, scale_factor: f64, max_dim: u32) -> (u32, u32) {
    let to_pixels = |logical: f32| -> u32 {
        let px = (f64::from(logical) * scale_factor).round();
        (px as u32).clamp(1, max_dim)
    };
    (to_pixels(width), to_pixels(height))
}

/// Coarse lifecycle state derived from the view's flags.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ViewState {
    /// No device bound yet.
    Uninitialized,
    /// Device bound, surface binding not completed.
    Initializing,
    /// Bound and at least partially visible.
    Active,
    /// Bound but scrolled out of view / occluded.
    Inactive,
    /// Torn down. Terminal.
    Destroyed,
}

/// Cached depth attachment, keyed implicitly by (width, height).
///
/// Same dimensions ⇒ the cached texture is reused unchanged. Different
/// dimensions ⇒ the old texture is destroyed before exactly one new one is
/// allocated.
pub struct DepthTextureCache {
    entry: Option<DepthEntry>,
    allocations: u64,
}

struct DepthEntry {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: (u32, u32),
}

impl DepthTextureCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entry: None,
            allocations: 0,
        }
    }

    /// Returns a depth view matching `width × height`, reallocating only on
    /// a dimension change.
    pub fn get_or_create(
        &mut self,
        device: &wgpu::Device,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> &wgpu::TextureView {
        let wanted = (width.max(1), height.max(1));

        if let Some(old) = self.entry.take_if(|e| e.size != wanted) {
            old.texture.destroy();
        }

        let allocations = &mut self.allocations;
        let entry = self.entry.get_or_insert_with(|| {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("View Depth Texture"),
                size: wgpu::Extent3d {
                    width: wanted.0,
                    height: wanted.1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            *allocations += 1;
            DepthEntry {
                texture,
                view,
                size: wanted,
            }
        });
        &entry.view
    }

    /// Destroys the cached texture, if any.
    pub fn clear(&mut self) {
        if let Some(old) = self.entry.take() {
            old.texture.destroy();
        }
    }

    /// Total number of depth textures allocated over the cache's lifetime.
    #[inline]
    #[must_use]
    pub fn allocations(&self) -> u64 {
        self.allocations
    }

    /// Dimensions of the currently cached texture.
    #[must_use]
    pub fn current_size(&self) -> Option<(u32, u32)> {
        self.entry.as_ref().map(|e| e.size)
    }
}

impl Default for DepthTextureCache {
    fn default() -> Self {
        Self::new()
    }
}

/// One rendering component's surface binding and lifecycle state.
pub struct RenderView {
    id: String,

    // Lifecycle flags
    active: bool,
    inited: bool,
    destroyed: bool,

    handle: Option<DeviceHandle>,
    target: Option<TargetId>,
    secondary: bool,

    surface: Option<wgpu::Surface<'static>>,
    config: Option<wgpu::SurfaceConfiguration>,
    format: Option<wgpu::TextureFormat>,
    depth_format: wgpu::TextureFormat,

    backing_size: (u32, u32),
    depth: DepthTextureCache,

    observers: Vec<ObserverId>,
    events: Option<(flume::Sender<SurfaceEvent>, flume::Receiver<SurfaceEvent>)>,
}

impl RenderView {
    /// Creates an unbound view. Safe to destroy without ever initializing.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            active: false,
            inited: false,
            destroyed: false,
            handle: None,
            target: None,
            secondary: false,
            surface: None,
            config: None,
            format: None,
            depth_format: wgpu::TextureFormat::Depth24Plus,
            backing_size: (1, 1),
            depth: DepthTextureCache::new(),
            observers: Vec::new(),
            events: None,
        }
    }

    /// Binds (or re-binds after device recovery) the view to a device.
    ///
    /// Resets the lifecycle flags and drops the cached depth texture, which
    /// would be stale across a device change.
    pub fn initialize(&mut self, handle: &DeviceHandle) {
        self.handle = Some(handle.clone());
        self.inited = false;
        self.active = true;
        self.destroyed = false;
        self.depth.clear();
    }

    /// Binds the view to the surface target named `id`.
    ///
    /// Locates an existing target or creates one under `parent`, configures
    /// a presentation surface at the context's negotiated format (when the
    /// host is not headless), and installs the resize, visibility and
    /// attribute observers plus the host-level scroll/resize listeners.
    pub fn bind_surface(
        &mut self,
        ctx: &mut GpuContext,
        host: &mut dyn SurfaceHost,
        id: &str,
        secondary: bool,
        parent: Option<&str>,
    ) -> Result<()> {
        if self.destroyed {
            return Err(GlintError::Destroyed(self.id.clone()));
        }
        let target = host.resolve_target(id, parent)?;
        self.target = Some(target);
        self.secondary = secondary;
        self.depth_format = ctx.settings().depth_format;

        let (tx, rx) = flume::unbounded();
        for kind in [
            ObserverKind::Resize,
            ObserverKind::Visibility,
            ObserverKind::Attributes,
            ObserverKind::HostScroll,
            ObserverKind::HostResize,
        ] {
            self.observers.push(host.subscribe(target, kind, tx.clone()));
        }
        self.events = Some((tx, rx));

        let probe = host.probe(target);
        let max_dim = self.max_texture_dim();
        self.backing_size =
            compute_backing_size(probe.width, probe.height, probe.scale_factor, max_dim);

        if let Some(surface) = host.create_wgpu_surface(target, ctx.instance())? {
            let config =
                ctx.default_surface_config(&surface, self.backing_size.0, self.backing_size.1)?;
            if let Some(handle) = &self.handle {
                surface.configure(&handle.device, &config);
            }
            self.format = Some(config.format);
            self.config = Some(config);
            self.surface = Some(surface);
        } else {
            self.format = Some(ctx.presentation_format());
        }

        self.active = probe.intersection_ratio > 0.0;
        self.inited = true;
        Ok(())
    }

    /// Drains pending observer events. Call once per frame before drawing.
    pub fn pump_events(&mut self, host: &dyn SurfaceHost) {
        let Some(rx) = self.events.as_ref().map(|(_, rx)| rx.clone()) else {
            return;
        };
        while let Ok(event) = rx.try_recv() {
            match event {
                SurfaceEvent::Resized {
                    width,
                    height,
                    scale_factor,
                } => self.apply_resize(host, width, height, scale_factor),
                SurfaceEvent::Visibility { ratio } => self.active = ratio > 0.0,
                SurfaceEvent::AttributesChanged
                | SurfaceEvent::HostScrolled
                | SurfaceEvent::HostResized => self.refresh_visibility(host),
            }
        }
    }

    fn apply_resize(&mut self, host: &dyn SurfaceHost, width: f32, height: f32, scale: f64) {
        let max_dim = self.max_texture_dim();
        let backing = compute_backing_size(width, height, scale, max_dim);
        if backing != self.backing_size {
            log::debug!("View '{}' backing size {backing:?}", self.id);
            self.backing_size = backing;
            if let (Some(surface), Some(config), Some(handle)) =
                (&self.surface, &mut self.config, &self.handle)
            {
                config.width = backing.0;
                config.height = backing.1;
                surface.configure(&handle.device, config);
            }
        }
        // A resize can move the target in and out of the viewport.
        self.refresh_visibility(host);
    }

    fn refresh_visibility(&mut self, host: &dyn SurfaceHost) {
        if let Some(target) = self.target {
            self.active = host.probe(target).intersection_ratio > 0.0;
        }
    }

    fn max_texture_dim(&self) -> u32 {
        self.handle
            .as_ref()
            .map_or(wgpu::Limits::default().max_texture_dimension_2d, |h| {
                h.max_texture_dimension_2d()
            })
    }

    /// Returns the shared depth attachment for the current backing size,
    /// (re)allocating only when the dimensions changed since the last call.
    ///
    /// `None` before [`initialize`](Self::initialize) or after
    /// [`destroy`](Self::destroy).
    pub fn depth_texture(&mut self) -> Option<&wgpu::TextureView> {
        if self.destroyed {
            return None;
        }
        let handle = self.handle.as_ref()?;
        let (width, height) = self.backing_size;
        Some(
            self.depth
                .get_or_create(&handle.device, width, height, self.depth_format),
        )
    }

    /// Tears the view down. Idempotent; safe on a partially initialized
    /// instance and safe to call twice.
    pub fn destroy(&mut self, host: &mut dyn SurfaceHost) {
        for observer in self.observers.drain(..) {
            host.unsubscribe(observer);
        }
        self.events = None;
        self.depth.clear();
        self.surface = None;
        self.config = None;
        self.format = None;
        self.handle = None;
        self.target = None;
        self.active = false;
        self.inited = false;
        self.destroyed = true;
    }

    // ── Accessors ──────────────────────────────────────────────────────────

    /// The id this view was created with.
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the bound target is at least partially visible.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether `bind_surface` has completed.
    #[inline]
    #[must_use]
    pub fn is_inited(&self) -> bool {
        self.inited
    }

    /// Whether the view has been destroyed. Terminal.
    #[inline]
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Whether this view was bound as a secondary (non-primary) target.
    #[inline]
    #[must_use]
    pub fn is_secondary(&self) -> bool {
        self.secondary
    }

    /// Current backing pixel size.
    #[inline]
    #[must_use]
    pub fn backing_size(&self) -> (u32, u32) {
        self.backing_size
    }

    /// Color format the bound surface is configured with.
    #[inline]
    #[must_use]
    pub fn surface_format(&self) -> Option<wgpu::TextureFormat> {
        self.format
    }

    /// The bound presentation surface, when the host is not headless.
    #[inline]
    #[must_use]
    pub fn surface(&self) -> Option<&wgpu::Surface<'static>> {
        self.surface.as_ref()
    }

    /// The depth attachment cache (exposed for allocation accounting).
    #[inline]
    #[must_use]
    pub fn depth_cache(&self) -> &DepthTextureCache {
        &self.depth
    }

    /// Coarse lifecycle state derived from the flags.
    #[must_use]
    pub fn state(&self) -> ViewState {
        if self.destroyed {
            ViewState::Destroyed
        } else if self.handle.is_none() {
            ViewState::Uninitialized
        } else if !self.inited {
            ViewState::Initializing
        } else if self.active {
            ViewState::Active
        } else {
            ViewState::Inactive
        }
    }
}
