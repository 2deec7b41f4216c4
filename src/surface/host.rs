//! Surface Host Boundary
//!
//! The [`SurfaceHost`] trait abstracts the windowing system a view binds to:
//! it resolves surface targets by id, reports their current geometry and
//! viewport intersection, and delivers observer events over a channel.
//!
//! Events are pushed by the host into a `flume` sender captured at
//! subscription time and drained by [`RenderView::pump_events`]
//! (single-threaded, once per frame).
//!
//! [`RenderView::pump_events`]: crate::RenderView::pump_events

use crate::errors::Result;

/// Opaque host-side identifier for a surface target.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct TargetId(pub u64);

/// Opaque identifier for an observer subscription.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ObserverId(pub u64);

/// The kinds of observation a view installs on its target.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ObserverKind {
    /// Content-box size changes of the target itself.
    Resize,
    /// Viewport intersection changes of the target.
    Visibility,
    /// Attribute mutations on the target (style/class changes that can move
    /// it without resizing it).
    Attributes,
    /// Host-level scroll events. Catches visibility changes the target
    /// observers miss, e.g. scrolling without resizing.
    HostScroll,
    /// Host-level (window) resize events.
    HostResize,
}

/// Events delivered from the host to a subscribed view.
#[derive(Clone, Copy, Debug)]
pub enum SurfaceEvent {
    /// The target's content box changed.
    Resized {
        /// Logical content width.
        width: f32,
        /// Logical content height.
        height: f32,
        /// Device pixel ratio at the target's location.
        scale_factor: f64,
    },
    /// The target's intersection with the viewport changed.
    Visibility {
        /// Fraction of the target currently visible, in `0.0..=1.0`.
        ratio: f32,
    },
    /// Attributes on the target changed; visibility must be re-checked.
    AttributesChanged,
    /// The host scrolled; visibility must be re-checked.
    HostScrolled,
    /// The host window resized; visibility must be re-checked.
    HostResized,
}

/// Snapshot of a target's current geometry and visibility.
#[derive(Clone, Copy, Debug)]
pub struct TargetProbe {
    /// Logical content width.
    pub width: f32,
    /// Logical content height.
    pub height: f32,
    /// Device pixel ratio at the target's location.
    pub scale_factor: f64,
    /// Fraction of the target currently visible, in `0.0..=1.0`.
    pub intersection_ratio: f32,
}

/// The windowing-system boundary a [`RenderView`](crate::RenderView) binds to.
///
/// Hosts own the actual window/compositor objects; views only hold
/// [`TargetId`]s and observer subscriptions. A headless host (tests, CI) may
/// return `None` from [`create_wgpu_surface`](Self::create_wgpu_surface) and
/// the view will track geometry without presenting.
pub trait SurfaceHost {
    /// Locates an existing target by `id`, or creates one under `parent`.
    fn resolve_target(&mut self, id: &str, parent: Option<&str>) -> Result<TargetId>;

    /// Current geometry and viewport intersection of a target.
    fn probe(&self, target: TargetId) -> TargetProbe;

    /// Registers an observer; matching [`SurfaceEvent`]s are pushed into
    /// `sender` until [`unsubscribe`](Self::unsubscribe) is called.
    fn subscribe(
        &mut self,
        target: TargetId,
        kind: ObserverKind,
        sender: flume::Sender<SurfaceEvent>,
    ) -> ObserverId;

    /// Removes an observer registration. Unknown ids are ignored so teardown
    /// stays safe after partial initialization.
    fn unsubscribe(&mut self, observer: ObserverId);

    /// Creates a presentation surface for the target, or `None` when the
    /// host has no presentable backing (headless).
    fn create_wgpu_surface(
        &mut self,
        target: TargetId,
        instance: &wgpu::Instance,
    ) -> Result<Option<wgpu::Surface<'static>>>;
}
