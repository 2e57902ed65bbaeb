//! The proxy service: serves one connection until stop or disconnect

use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};
use vizproxy_wire::{
    decode_request, encode_reply, peek_seq, Connection, RemoteError, Reply, WireError,
};

use crate::dispatch::{Dispatch, Dispatcher};
use crate::error::ServiceError;

/// Why serving ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeExit {
    /// The client asked the service to stop
    Stopped,
    /// The connection closed without a stop request
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Stop,
}

/// Serves the requests of a single connection against a [`Dispatcher`]
#[derive(Debug)]
pub struct ProxyService<S> {
    connection: Connection<S>,
    dispatcher: Dispatcher,
}

impl<S> ProxyService<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(connection: Connection<S>, dispatcher: Dispatcher) -> Self {
        Self {
            connection,
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Handle requests in arrival order until stop or disconnect
    pub async fn serve(&mut self) -> Result<ServeExit, ServiceError> {
        loop {
            match self.serve_one().await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => return Ok(ServeExit::Stopped),
                Err(ServiceError::Wire(e)) if e.is_closed() => {
                    info!("client disconnected");
                    return Ok(ServeExit::Disconnected);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Close the connection and the wrapped target
    pub async fn close(&mut self) {
        if let Err(e) = self.connection.shutdown().await {
            debug!(error = %e, "connection shutdown failed");
        }
        self.dispatcher.close();
    }

    /// Wait up to `timeout` for a request to be fully buffered
    pub(crate) async fn poll(&mut self, timeout: Duration) -> Result<bool, WireError> {
        self.connection.poll(timeout).await
    }

    /// Receive and handle one request
    pub(crate) async fn serve_one(&mut self) -> Result<Flow, ServiceError> {
        let frame = self.connection.recv_frame().await?;
        self.handle_frame(&frame).await
    }

    async fn handle_frame(&mut self, frame: &[u8]) -> Result<Flow, ServiceError> {
        let (seq, request) = match decode_request(self.dispatcher.registry(), frame) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(error = %e, "undecodable request");
                if let Some(seq) = peek_seq(frame) {
                    let reply = Reply::Error(RemoteError::new("WireError", e.to_string()));
                    self.send_reply(seq, &reply).await?;
                }
                return Ok(Flow::Continue);
            }
        };
        debug!(seq, ?request, "request");

        match self.dispatcher.dispatch(request) {
            Dispatch::Reply(reply) => {
                self.send_reply(seq, &reply).await?;
                Ok(Flow::Continue)
            }
            Dispatch::NoReply => Ok(Flow::Continue),
            Dispatch::Stop => Ok(Flow::Stop),
            Dispatch::Reject(reply) => {
                self.send_reply(seq, &reply).await?;
                warn!("closing connection after rejected request");
                Ok(Flow::Stop)
            }
        }
    }

    /// Send a reply; a result that cannot be encoded becomes a type error
    async fn send_reply(&mut self, seq: u32, reply: &Reply) -> Result<(), ServiceError> {
        let registry = self.dispatcher.registry();
        let frame = match encode_reply(registry, seq, reply) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(seq, error = %e, "result cannot be sent");
                let kind = if e.is_value_error() { "TypeError" } else { "WireError" };
                let fallback = Reply::Error(RemoteError::new(kind, e.to_string()));
                encode_reply(registry, seq, &fallback)?
            }
        };
        self.connection.send_frame(&frame).await?;
        Ok(())
    }
}
