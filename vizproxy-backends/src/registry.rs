//! Backend lookup by name

use tracing::info;
use vizproxy_service::HostedTarget;

use crate::error::BackendError;
use crate::plot::{PlotNamespace, INTERACTIVE_TICK_RATE};
use crate::scene::{Visualizer, SCENE_TICK_RATE};

/// Static description of a backend
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackendInfo {
    pub name: &'static str,
    pub description: &'static str,
    /// Rate of the backend's ticker; `None` for request-driven backends
    pub tick_rate: Option<f64>,
}

pub const BACKENDS: &[BackendInfo] = &[
    BackendInfo {
        name: "plot",
        description: "pyplot-style plotting namespace",
        tick_rate: None,
    },
    BackendInfo {
        name: "plot-interactive",
        description: "plotting namespace in interactive mode, redrawing stale figures",
        tick_rate: Some(INTERACTIVE_TICK_RATE),
    },
    BackendInfo {
        name: "scene",
        description: "3D scene visualizer for meshes and point clouds",
        tick_rate: Some(SCENE_TICK_RATE),
    },
];

pub fn available_backends() -> impl Iterator<Item = &'static str> {
    BACKENDS.iter().map(|b| b.name)
}

pub fn backend_info(name: &str) -> Option<&'static BackendInfo> {
    BACKENDS.iter().find(|b| b.name == name)
}

/// Build the target served by a worker for backend `name`
pub fn create_backend(name: &str) -> Result<HostedTarget, BackendError> {
    let hosted = match name {
        "plot" => HostedTarget::plain(PlotNamespace::new(false)),
        "plot-interactive" => {
            let plt = PlotNamespace::new(true);
            let ticker = plt.ticker(INTERACTIVE_TICK_RATE);
            HostedTarget::active(plt, ticker)
        }
        "scene" => {
            let vis = Visualizer::new();
            let ticker = vis.ticker(SCENE_TICK_RATE);
            HostedTarget::active(vis, ticker)
        }
        other => {
            return Err(BackendError::Unavailable {
                backend: other.to_string(),
                reason: format!(
                    "no such backend (available: {})",
                    available_backends().collect::<Vec<_>>().join(", ")
                ),
            })
        }
    };
    info!(backend = name, target = hosted.target.type_name(), "backend created");
    Ok(hosted)
}
