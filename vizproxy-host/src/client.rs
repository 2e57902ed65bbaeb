//! Request/reply client over the worker connection

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, trace};
use vizproxy_wire::{
    decode_reply, encode_request, CodecRegistry, Connection, Reply, Request, Value, WireError,
    PROTOCOL_VERSION,
};

use crate::error::HostError;

#[derive(Debug)]
struct Channel {
    conn: Connection<TcpStream>,
    seq: u32,
}

/// Shared handle on the single connection to a worker.
///
/// Clones share the connection; each request holds the lock until its reply
/// arrives, so requests are strictly sequential.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    channel: Arc<Mutex<Channel>>,
    registry: Arc<CodecRegistry>,
}

impl RemoteClient {
    /// Connect and perform the hello handshake
    pub async fn connect(
        addr: SocketAddr,
        registry: Arc<CodecRegistry>,
        allow_public_attrs: bool,
    ) -> Result<Self, HostError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        debug!(%addr, "connected to worker");
        let client = Self {
            channel: Arc::new(Mutex::new(Channel {
                conn: Connection::new(stream),
                seq: 0,
            })),
            registry,
        };
        client.handshake(allow_public_attrs).await?;
        Ok(client)
    }

    pub fn registry(&self) -> &CodecRegistry {
        &self.registry
    }

    async fn handshake(&self, allow_public_attrs: bool) -> Result<(), HostError> {
        let hello = Request::Hello {
            version: PROTOCOL_VERSION,
            codecs: self.registry.fingerprint(),
            allow_public_attrs,
        };
        match self.exchange(&hello).await? {
            Some(Reply::Hello { version, codecs }) => {
                if version != PROTOCOL_VERSION {
                    return Err(WireError::ProtocolVersionMismatch {
                        expected: PROTOCOL_VERSION,
                        actual: version,
                    }
                    .into());
                }
                self.registry.verify_fingerprint(&codecs)?;
                debug!(codecs = codecs.len(), "handshake complete");
                Ok(())
            }
            Some(Reply::Error(e)) => Err(e.into()),
            other => Err(HostError::UnexpectedReply(format!(
                "expected hello, got {:?}",
                other
            ))),
        }
    }

    /// Send a request and return the value it produced.
    ///
    /// Requests without a reply (fire-and-forget calls, releases) return
    /// `Value::None` once sent.
    pub async fn request(&self, request: &Request) -> Result<Value, HostError> {
        match self.exchange(request).await? {
            None => Ok(Value::None),
            Some(Reply::Value(value)) => Ok(value),
            Some(Reply::Error(e)) => Err(e.into()),
            Some(other) => Err(HostError::UnexpectedReply(format!("{:?}", other))),
        }
    }

    async fn exchange(&self, request: &Request) -> Result<Option<Reply>, HostError> {
        let mut channel = self.channel.lock().await;
        let seq = channel.seq.wrapping_add(1);
        // Unencodable arguments fail here, before anything reaches the wire
        let frame = encode_request(&self.registry, seq, request)?;
        channel.seq = seq;
        trace!(seq, len = frame.len(), "sending request");
        channel.conn.send_frame(&frame).await?;
        if !request.expects_reply() {
            return Ok(None);
        }

        let frame = channel.conn.recv_frame().await?;
        let (got, reply) = decode_reply(&self.registry, &frame)?;
        if got != seq {
            return Err(HostError::UnexpectedReply(format!(
                "reply to request {} while waiting for {}",
                got, seq
            )));
        }
        Ok(Some(reply))
    }

    /// Ask the worker to stop; a connection that is already gone counts as stopped
    pub async fn stop(&self) -> Result<(), HostError> {
        match self.request(&Request::Stop).await {
            Ok(_) => {}
            Err(HostError::Wire(e)) if e.is_closed() => {
                debug!("worker connection already closed");
                return Ok(());
            }
            Err(e) => return Err(e),
        }
        let mut channel = self.channel.lock().await;
        if let Err(e) = channel.conn.shutdown().await {
            debug!(error = %e, "connection shutdown after stop");
        }
        Ok(())
    }
}
