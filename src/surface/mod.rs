//! Surface binding & per-view lifecycle
//!
//! Provides:
//! - `SurfaceHost`: the windowing-system boundary (target lookup, observer
//!   subscriptions, presentation surface creation)
//! - `RenderView`: one rendering component's binding to a visible, resizable
//!   surface target and its shared depth attachment
//! - `ViewRegistry`: owns all live views for centralized, ordered teardown

pub mod host;
pub mod registry;
pub mod view;

pub use host::{ObserverId, ObserverKind, SurfaceEvent, SurfaceHost, TargetId, TargetProbe};
pub use registry::{ViewId, ViewRegistry};
pub use view::{DepthTextureCache, RenderView, ViewState, compute_backing_size};
