//! Host side of vizproxy
//!
//! [`ProxyHost`] launches a worker process, waits for its readiness report
//! and connects to the target it serves. Calls go through [`RemoteObject`]
//! handles or the typed facades in [`facade`].

pub mod client;
pub mod error;
pub mod facade;
pub mod host;
pub mod remote;

pub use client::RemoteClient;
pub use error::HostError;
pub use facade::{AxesProxy, FigureProxy, PlotProxy, SceneProxy};
pub use host::ProxyHost;
pub use remote::RemoteObject;
