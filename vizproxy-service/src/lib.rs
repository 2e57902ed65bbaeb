//! Worker side of vizproxy
//!
//! A worker process wraps one [`RemoteTarget`] and serves it to a single host
//! over a one-shot TCP server. The plain [`ProxyService`] handles requests as
//! they arrive; the [`ActiveProxyService`] additionally runs a periodic tick
//! (redraw, event polling) on the same thread.

pub mod active;
pub mod dispatch;
pub mod error;
pub mod server;
pub mod service;
pub mod target;
pub mod worker;

#[cfg(test)]
mod testing;

pub use active::{ActiveProxyService, Ticker, DEFAULT_MAX_REQUESTS_PER_TICK, DEFAULT_TICK_RATE};
pub use dispatch::{Dispatch, Dispatcher, EXPOSED_PREFIX, STOP_NAME};
pub use error::ServiceError;
pub use server::{OneShotServer, ServerState};
pub use service::{ProxyService, ServeExit};
pub use target::{CallArgs, ErrorKind, RemoteTarget, Returned, TargetError};
pub use worker::{
    run_worker, serve_worker, shutdown_signal, HostedTarget, ShutdownSignal, WorkerExit,
    WorkerOptions,
};
