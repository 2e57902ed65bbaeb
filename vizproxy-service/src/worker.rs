//! Worker process entry point
//!
//! A worker builds its wrapped target, binds a one-shot server, reports the
//! outcome on stdout, serves the single host connection and then exits. All
//! shutdown paths close the target and end with "server has terminated".

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWrite};
use tracing::{error, info, warn};
use uuid::Uuid;
use vizproxy_config::ServiceConfig;
use vizproxy_wire::{write_report, CodecRegistry, Connection, ReadinessReport};

use crate::active::{ActiveProxyService, Ticker, DEFAULT_MAX_REQUESTS_PER_TICK};
use crate::dispatch::Dispatcher;
use crate::error::ServiceError;
use crate::server::OneShotServer;
use crate::service::{ProxyService, ServeExit};
use crate::target::RemoteTarget;

/// The wrapped target and, for interactive backends, its ticker
pub struct HostedTarget {
    pub target: Box<dyn RemoteTarget>,
    pub ticker: Option<Ticker>,
}

impl HostedTarget {
    pub fn plain(target: impl RemoteTarget + 'static) -> Self {
        Self {
            target: Box::new(target),
            ticker: None,
        }
    }

    pub fn active(target: impl RemoteTarget + 'static, ticker: Ticker) -> Self {
        Self {
            target: Box::new(target),
            ticker: Some(ticker),
        }
    }
}

impl fmt::Debug for HostedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostedTarget")
            .field("target", &self.target.type_name())
            .field("ticker", &self.ticker)
            .finish()
    }
}

/// Worker settings
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub worker_id: String,
    pub bind_address: String,
    /// Overrides the ticker's own rate
    pub tick_rate: Option<f64>,
    pub max_requests_per_tick: usize,
    pub accept_timeout: Option<Duration>,
    /// Shut down when stdin reaches EOF (the host went away)
    pub watch_stdin: bool,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            worker_id: Uuid::new_v4().to_string(),
            bind_address: "127.0.0.1".to_string(),
            tick_rate: None,
            max_requests_per_tick: DEFAULT_MAX_REQUESTS_PER_TICK,
            accept_timeout: Some(Duration::from_secs(60)),
            watch_stdin: true,
        }
    }
}

impl From<&ServiceConfig> for WorkerOptions {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            bind_address: config.bind_address.clone(),
            tick_rate: config.tick_rate,
            max_requests_per_tick: config.max_requests_per_tick,
            accept_timeout: config.accept_timeout,
            ..Self::default()
        }
    }
}

/// How a worker run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    Stopped,
    Disconnected,
    Interrupted,
    HostGone,
    AcceptTimeout,
}

impl From<ServeExit> for WorkerExit {
    fn from(exit: ServeExit) -> Self {
        match exit {
            ServeExit::Stopped => WorkerExit::Stopped,
            ServeExit::Disconnected => WorkerExit::Disconnected,
        }
    }
}

/// External reasons to shut down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    HostGone,
}

impl From<ShutdownSignal> for WorkerExit {
    fn from(signal: ShutdownSignal) -> Self {
        match signal {
            ShutdownSignal::Interrupt => WorkerExit::Interrupted,
            ShutdownSignal::HostGone => WorkerExit::HostGone,
        }
    }
}

/// Run a worker on a fresh single-threaded runtime.
///
/// The readiness report goes to stdout. Ctrl-C and, when enabled, EOF on
/// stdin trigger the orderly shutdown path.
pub fn run_worker<F, E>(options: WorkerOptions, factory: F) -> Result<WorkerExit, ServiceError>
where
    F: FnOnce() -> Result<HostedTarget, E>,
    E: fmt::Display,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let watch_stdin = options.watch_stdin;
    let result = runtime.block_on(async move {
        let mut stdout = tokio::io::stdout();
        serve_worker(options, factory, &mut stdout, shutdown_signal(watch_stdin)).await
    });
    // The stdin watcher may still sit in a blocking read
    runtime.shutdown_timeout(Duration::from_millis(100));
    result
}

/// Resolves on Ctrl-C, or on stdin EOF when `watch_stdin` is set
pub async fn shutdown_signal(watch_stdin: bool) -> ShutdownSignal {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for interrupts");
            std::future::pending::<()>().await;
        }
    };
    let host_gone = async {
        if watch_stdin {
            wait_for_stdin_eof().await;
        } else {
            std::future::pending::<()>().await;
        }
    };
    tokio::select! {
        _ = interrupt => ShutdownSignal::Interrupt,
        _ = host_gone => ShutdownSignal::HostGone,
    }
}

async fn wait_for_stdin_eof() {
    let mut stdin = tokio::io::stdin();
    let mut buf = [0u8; 256];
    loop {
        match stdin.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
    }
}

/// Worker body, generic over where the readiness report goes and what ends it early
pub async fn serve_worker<F, E, W, Sig>(
    options: WorkerOptions,
    factory: F,
    report: &mut W,
    shutdown: Sig,
) -> Result<WorkerExit, ServiceError>
where
    F: FnOnce() -> Result<HostedTarget, E>,
    E: fmt::Display,
    W: AsyncWrite + Unpin,
    Sig: Future<Output = ShutdownSignal>,
{
    tokio::pin!(shutdown);
    info!(worker_id = %options.worker_id, "worker starting");

    let HostedTarget { mut target, ticker } = match factory() {
        Ok(hosted) => hosted,
        Err(e) => {
            let reason = e.to_string();
            error!(reason = %reason, "backend unavailable");
            write_report(report, &ReadinessReport::Failed { reason: reason.clone() }).await?;
            return Err(ServiceError::BackendUnavailable(reason));
        }
    };

    let mut server = OneShotServer::new(options.bind_address.clone());
    let port = match server.listen().await {
        Ok(port) => port,
        Err(e) => {
            error!(error = %e, "cannot listen");
            let failed = ReadinessReport::Failed {
                reason: e.to_string(),
            };
            if let Err(report_err) = write_report(report, &failed).await {
                warn!(error = %report_err, "cannot report failure");
            }
            target.close();
            info!("server has terminated");
            return Err(e);
        }
    };
    let ready = ReadinessReport::Ready {
        port,
        pid: std::process::id(),
    };
    if let Err(e) = write_report(report, &ready).await {
        target.close();
        info!("server has terminated");
        return Err(e.into());
    }

    let accepted = tokio::select! {
        accepted = accept(&mut server, options.accept_timeout) => accepted.map(Ok),
        signal = &mut shutdown => Ok(Err(signal)),
    };
    let connection = match accepted {
        Ok(Ok(connection)) => connection,
        Ok(Err(signal)) => {
            log_signal(signal);
            server.close();
            target.close();
            info!("server has terminated");
            return Ok(signal.into());
        }
        Err(ServiceError::AcceptTimeout(waited)) => {
            warn!(waited = ?waited, "no host connected");
            server.close();
            target.close();
            info!("server has terminated");
            return Ok(WorkerExit::AcceptTimeout);
        }
        Err(e) => {
            error!(error = %e, "accept failed");
            server.close();
            target.close();
            info!("server has terminated");
            return Err(e);
        }
    };

    let registry = Arc::new(CodecRegistry::standard());
    let service = ProxyService::new(connection, Dispatcher::new(target, registry));
    let outcome = match ticker {
        None => {
            let mut service = service;
            let outcome = tokio::select! {
                served = service.serve() => served.map(WorkerExit::from),
                signal = &mut shutdown => {
                    log_signal(signal);
                    Ok(signal.into())
                }
            };
            service.close().await;
            outcome
        }
        Some(ticker) => {
            let ticker = ticker.with_rate(options.tick_rate);
            let mut active = ActiveProxyService::new(service, ticker)
                .with_max_requests_per_tick(options.max_requests_per_tick);
            let outcome = tokio::select! {
                served = active.serve() => served.map(WorkerExit::from),
                signal = &mut shutdown => {
                    log_signal(signal);
                    Ok(signal.into())
                }
            };
            active.close().await;
            outcome
        }
    };

    server.close();
    match &outcome {
        Ok(exit) => info!(exit = ?exit, "server has terminated"),
        Err(e) => {
            error!(error = %e, "serving failed");
            info!("server has terminated");
        }
    }
    outcome
}

async fn accept(
    server: &mut OneShotServer,
    timeout: Option<Duration>,
) -> Result<Connection<tokio::net::TcpStream>, ServiceError> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, server.accept())
            .await
            .map_err(|_| ServiceError::AcceptTimeout(limit))?,
        None => server.accept().await,
    }
}

fn log_signal(signal: ShutdownSignal) {
    match signal {
        ShutdownSignal::Interrupt => warn!("keyboard interrupt"),
        ShutdownSignal::HostGone => info!("host went away"),
    }
}
