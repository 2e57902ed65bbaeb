//! Worker process lifecycle

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use vizproxy_config::HostConfig;
use vizproxy_wire::{read_report, CodecRegistry, Readiness, ReadinessCell, Value};

use crate::client::RemoteClient;
use crate::error::HostError;
use crate::remote::RemoteObject;

#[derive(Debug)]
struct WorkerHandle {
    child: Child,
    stdin: Option<ChildStdin>,
    pid: Option<u32>,
    port: u16,
    reader: JoinHandle<()>,
}

/// Owns one worker process and the connection to the target it serves.
///
/// `start` spawns the worker, waits for its readiness report and connects;
/// `stop` asks the worker to shut down and reaps it. A host that is dropped
/// while started kills its worker.
#[derive(Debug)]
pub struct ProxyHost {
    config: HostConfig,
    registry: Arc<CodecRegistry>,
    worker: Option<WorkerHandle>,
    root: Option<RemoteObject>,
    last_pid: Option<u32>,
}

impl ProxyHost {
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            registry: Arc::new(CodecRegistry::standard()),
            worker: None,
            root: None,
            last_pid: None,
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Spawn the worker and connect to it
    pub async fn start(&mut self) -> Result<(), HostError> {
        if self.worker.is_some() {
            return Err(HostError::AlreadyStarted);
        }
        let mut child = self.spawn()?;
        let pid = child.id();
        self.last_pid = pid;
        info!(pid = ?pid, backend = %self.config.backend, "worker spawned");

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| HostError::Spawn("worker stdout not captured".to_string()))?;
        let cell = Arc::new(ReadinessCell::new());
        let notify = Arc::new(Notify::new());
        let reader = tokio::spawn(read_readiness(stdout, cell.clone(), notify.clone()));

        let port = match self.wait_ready(&mut child, &cell, &notify).await {
            Ok(port) => port,
            Err(e) => {
                warn!(error = %e, "worker failed to start");
                drop(stdin);
                reap(&mut child, self.config.shutdown_timeout).await;
                reader.abort();
                return Err(e);
            }
        };

        let client = match self.connect(port).await {
            Ok(client) => client,
            Err(e) => {
                error!(error = %e, port, "cannot connect to worker");
                drop(stdin);
                reap(&mut child, self.config.shutdown_timeout).await;
                reader.abort();
                return Err(e);
            }
        };
        info!(pid = ?pid, port, "worker ready");

        self.worker = Some(WorkerHandle {
            child,
            stdin,
            pid,
            port,
            reader,
        });
        self.root = Some(RemoteObject::root(client));
        Ok(())
    }

    fn spawn(&self) -> Result<Child, HostError> {
        let program = match &self.config.worker_program {
            Some(program) => program.clone(),
            None => std::env::current_exe()
                .map_err(|e| HostError::Spawn(format!("Failed to get current exe: {}", e)))?,
        };

        let mut cmd = Command::new(&program);
        cmd.arg("--worker").arg("--backend").arg(&self.config.backend);
        if let Some(rate) = self.config.tick_rate {
            cmd.arg("--tick-rate").arg(rate.to_string());
        }
        if let Some(level) = self.config.log_level {
            cmd.arg("--log-level").arg(level.as_str());
        }
        cmd.args(&self.config.worker_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        debug!(program = %program.display(), "spawning worker");
        cmd.spawn()
            .map_err(|e| HostError::Spawn(format!("{}: {}", program.display(), e)))
    }

    /// Poll until the readiness cell is set, the worker dies or the deadline passes
    async fn wait_ready(
        &self,
        child: &mut Child,
        cell: &ReadinessCell,
        notify: &Notify,
    ) -> Result<u16, HostError> {
        let deadline = self.config.start_timeout.map(|t| Instant::now() + t);
        loop {
            match cell.get() {
                Readiness::Ready(port) => return Ok(port),
                Readiness::Failed => {
                    let reason = cell
                        .failure_reason()
                        .unwrap_or_else(|| "worker reported failure".to_string());
                    return Err(HostError::BackendUnavailable { reason });
                }
                Readiness::Pending => {}
            }

            if let Some(status) = child.try_wait()? {
                // A report written just before exiting may still be in flight
                let _ = tokio::time::timeout(self.config.poll_interval, notify.notified()).await;
                if cell.get() != Readiness::Pending {
                    continue;
                }
                return Err(HostError::WorkerExited {
                    status: describe(status),
                });
            }

            let mut wait = self.config.poll_interval;
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    return Err(HostError::StartTimeout(
                        self.config.start_timeout.unwrap_or_default(),
                    ));
                }
                wait = wait.min(deadline - now);
            }
            tokio::select! {
                _ = notify.notified() => {}
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    async fn connect(&self, port: u16) -> Result<RemoteClient, HostError> {
        let ip: IpAddr = self.config.connect_host.parse().map_err(|_| {
            HostError::Io(format!("invalid connect host '{}'", self.config.connect_host))
        })?;
        RemoteClient::connect(
            SocketAddr::new(ip, port),
            self.registry.clone(),
            self.config.allow_public_attrs,
        )
        .await
    }

    /// Stop the worker; stopping a host that is not running is a no-op
    pub async fn stop(&mut self) -> Result<(), HostError> {
        let Some(mut worker) = self.worker.take() else {
            debug!("host not running");
            return Ok(());
        };
        if let Some(root) = self.root.take() {
            if let Err(e) = root.client().stop().await {
                warn!(error = %e, "stop request failed");
            }
        }
        drop(worker.stdin.take());
        let status = reap(&mut worker.child, self.config.shutdown_timeout)
            .await
            .map_or_else(|| "unknown".to_string(), describe);
        worker.reader.abort();
        info!(pid = ?worker.pid, status = %status, "worker stopped");
        Ok(())
    }

    /// Handle on the wrapped target
    pub fn root(&self) -> Result<&RemoteObject, HostError> {
        self.root.as_ref().ok_or(HostError::NotStarted)
    }

    pub async fn invoke(&self, name: &str, args: Vec<Value>) -> Result<Value, HostError> {
        self.root()?.invoke(name, args).await
    }

    pub async fn call(
        &self,
        name: &str,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<Value, HostError> {
        self.root()?.call(name, args, kwargs).await
    }

    pub async fn getattr(&self, name: &str) -> Result<Value, HostError> {
        self.root()?.getattr(name).await
    }

    pub async fn setattr(&self, name: &str, value: impl Into<Value>) -> Result<(), HostError> {
        self.root()?.setattr(name, value).await
    }

    pub async fn notify(&self, name: &str, args: Vec<Value>) -> Result<(), HostError> {
        self.root()?.notify(name, args).await
    }

    pub fn pid(&self) -> Option<u32> {
        self.worker.as_ref().and_then(|w| w.pid)
    }

    /// Pid of the most recently spawned worker, kept after it has been reaped
    pub fn last_worker_pid(&self) -> Option<u32> {
        self.last_pid
    }

    /// Port the worker reported in its readiness report
    pub fn port(&self) -> Option<u16> {
        self.worker.as_ref().map(|w| w.port)
    }

    pub fn is_connected(&self) -> bool {
        self.root.is_some()
    }

    /// Start a host, run `f` against the wrapped target and always stop it
    pub async fn scoped<F, Fut, T>(config: HostConfig, f: F) -> Result<T, HostError>
    where
        F: FnOnce(RemoteObject) -> Fut,
        Fut: Future<Output = Result<T, HostError>>,
    {
        let mut host = ProxyHost::new(config);
        host.start().await?;
        let root = host.root()?.clone();
        let result = f(root).await;
        let stopped = host.stop().await;
        let value = result?;
        stopped?;
        Ok(value)
    }
}

impl Drop for ProxyHost {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.as_mut() {
            warn!(pid = ?worker.pid, "host dropped while running, killing worker");
            if let Err(e) = worker.child.start_kill() {
                debug!(error = %e, "kill on drop failed");
            }
            worker.reader.abort();
        }
    }
}

/// Read the readiness report into `cell`, then drain the rest of stdout
async fn read_readiness(stdout: ChildStdout, cell: Arc<ReadinessCell>, notify: Arc<Notify>) {
    let mut reader = BufReader::new(stdout);
    match read_report(&mut reader).await {
        Ok(Some(report)) => {
            debug!(report = ?report, "readiness report received");
            cell.set(&report);
        }
        Ok(None) => debug!("worker closed stdout before reporting"),
        Err(e) => {
            warn!(error = %e, "invalid readiness report");
            cell.fail(format!("invalid readiness report: {}", e));
        }
    }
    notify.notify_one();

    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => debug!(line = line.trim_end(), "worker stdout"),
        }
    }
}

/// Wait up to `grace` for the worker to exit, then kill it
async fn reap(child: &mut Child, grace: Duration) -> Option<ExitStatus> {
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => Some(status),
        Ok(Err(e)) => {
            debug!(error = %e, "wait on worker failed");
            None
        }
        Err(_) => {
            warn!(grace = ?grace, "worker did not exit in time, killing it");
            if let Err(e) = child.kill().await {
                debug!(error = %e, "kill failed");
            }
            child.wait().await.ok()
        }
    }
}

fn describe(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {}", code),
        None => status.to_string(),
    }
}
