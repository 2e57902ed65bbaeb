//! Targets served by vizproxy workers
//!
//! `plot` and `plot-interactive` expose a pyplot-style namespace, `scene` a 3D
//! visualizer. Both render headless through a small software rasterizer.

pub mod error;
pub mod plot;
pub mod registry;
pub mod render;
pub mod scene;

pub use error::BackendError;
pub use plot::{AxesHandle, FigureHandle, FigureRef, PlotNamespace, INTERACTIVE_TICK_RATE};
pub use registry::{available_backends, backend_info, create_backend, BackendInfo, BACKENDS};
pub use scene::{Geometry, Visualizer, SCENE_TICK_RATE};
