//! Proxy service that interleaves a periodic tick with request handling
//!
//! Visualization libraries must be driven from the thread that owns them, so
//! the tick runs in the same loop as the requests: tick, then handle requests
//! as they arrive for up to one tick period, then tick again.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::error::ServiceError;
use crate::service::{Flow, ProxyService, ServeExit};
use crate::target::TargetError;

/// Rate used when a ticker is given a rate that is not a positive number
pub const DEFAULT_TICK_RATE: f64 = 20.0;

/// Default bound on requests handled between two ticks
pub const DEFAULT_MAX_REQUESTS_PER_TICK: usize = 256;

type TickFn = Box<dyn FnMut() -> Result<(), TargetError>>;

/// Periodic side-effecting callback and its rate
pub struct Ticker {
    callback: TickFn,
    rate_hz: f64,
}

impl Ticker {
    pub fn new<F>(rate_hz: f64, callback: F) -> Self
    where
        F: FnMut() -> Result<(), TargetError> + 'static,
    {
        Self {
            callback: Box::new(callback),
            rate_hz: sanitize_rate(rate_hz),
        }
    }

    /// Replace the rate when an override is given
    pub fn with_rate(mut self, rate_hz: Option<f64>) -> Self {
        if let Some(rate) = rate_hz {
            self.rate_hz = sanitize_rate(rate);
        }
        self
    }

    pub fn rate_hz(&self) -> f64 {
        self.rate_hz
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.rate_hz)
    }

    pub fn tick(&mut self) -> Result<(), TargetError> {
        (self.callback)()
    }
}

impl fmt::Debug for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ticker").field("rate_hz", &self.rate_hz).finish()
    }
}

fn sanitize_rate(rate_hz: f64) -> f64 {
    if rate_hz.is_finite() && rate_hz > 0.0 {
        rate_hz
    } else {
        warn!(rate_hz, fallback = DEFAULT_TICK_RATE, "invalid tick rate");
        DEFAULT_TICK_RATE
    }
}

/// A [`ProxyService`] driven by a [`Ticker`]
#[derive(Debug)]
pub struct ActiveProxyService<S> {
    service: ProxyService<S>,
    ticker: Ticker,
    max_requests_per_tick: usize,
    active: Arc<AtomicBool>,
}

impl<S> ActiveProxyService<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(service: ProxyService<S>, ticker: Ticker) -> Self {
        Self {
            service,
            ticker,
            max_requests_per_tick: DEFAULT_MAX_REQUESTS_PER_TICK,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_max_requests_per_tick(mut self, max: usize) -> Self {
        self.max_requests_per_tick = max.max(1);
        self
    }

    /// Flag observed by the loop; clearing it ends serving after the current tick period
    pub fn active_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.active)
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn service(&self) -> &ProxyService<S> {
        &self.service
    }

    pub async fn serve(&mut self) -> Result<ServeExit, ServiceError> {
        self.active.store(true, Ordering::Release);
        info!(rate_hz = self.ticker.rate_hz(), "active service started");
        let result = self.run().await;
        self.active.store(false, Ordering::Release);
        result
    }

    pub async fn close(&mut self) {
        self.active.store(false, Ordering::Release);
        self.service.close().await;
    }

    async fn run(&mut self) -> Result<ServeExit, ServiceError> {
        let period = self.ticker.period();
        while self.is_active() {
            if let Err(e) = self.ticker.tick() {
                warn!(error = %e, "tick failed");
            }
            if let Some(exit) = self.drain(period).await? {
                return Ok(exit);
            }
        }
        debug!("active flag cleared");
        Ok(ServeExit::Stopped)
    }

    /// Handle requests as they arrive, each waited for at most one period
    async fn drain(&mut self, period: Duration) -> Result<Option<ServeExit>, ServiceError> {
        for _ in 0..self.max_requests_per_tick {
            match self.service.poll(period).await {
                Ok(false) => return Ok(None),
                Ok(true) => {}
                Err(e) if e.is_closed() => {
                    info!("client disconnected");
                    return Ok(Some(ServeExit::Disconnected));
                }
                Err(e) => return Err(e.into()),
            }
            match self.service.serve_one().await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => return Ok(Some(ServeExit::Stopped)),
                Err(ServiceError::Wire(e)) if e.is_closed() => {
                    info!("client disconnected");
                    return Ok(Some(ServeExit::Disconnected));
                }
                Err(e) => return Err(e),
            }
        }
        debug!(
            max = self.max_requests_per_tick,
            "request cap reached, ticking before draining further"
        );
        Ok(None)
    }
}
