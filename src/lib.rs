#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod context;
pub mod errors;
pub mod mipmap;
pub mod settings;
pub mod staging;
pub mod surface;
pub mod timing;

pub use context::{DeviceHandle, GpuContext};
pub use errors::{GlintError, Result};
pub use mipmap::{MipmapGenerator, TextureOptions, TextureSource, mip_level_count, next_mip_extent};
pub use settings::GpuSettings;
pub use staging::{StagingBuffer, StagingPool};
pub use surface::host::{ObserverId, ObserverKind, SurfaceEvent, SurfaceHost, TargetId, TargetProbe};
pub use surface::registry::{ViewId, ViewRegistry};
pub use surface::view::{DepthTextureCache, RenderView, ViewState, compute_backing_size};
pub use timing::{GpuTimer, TimerState};
