//! One-shot TCP server: accepts exactly one connection, then stops listening

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};
use vizproxy_wire::Connection;

use crate::error::ServiceError;

/// Lifecycle of a [`OneShotServer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Unstarted,
    Listening,
    Serving,
    Closed,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServerState::Unstarted => "unstarted",
            ServerState::Listening => "listening",
            ServerState::Serving => "serving",
            ServerState::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct OneShotServer {
    bind_address: String,
    state: ServerState,
    listener: Option<TcpListener>,
    local_addr: Option<SocketAddr>,
}

impl OneShotServer {
    pub fn new(bind_address: impl Into<String>) -> Self {
        Self {
            bind_address: bind_address.into(),
            state: ServerState::Unstarted,
            listener: None,
            local_addr: None,
        }
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Bind an ephemeral port and return it
    pub async fn listen(&mut self) -> Result<u16, ServiceError> {
        self.expect_state(ServerState::Unstarted)?;
        let ip: IpAddr = self.bind_address.parse().map_err(|e| ServiceError::Bind {
            address: self.bind_address.clone(),
            reason: format!("not an IP address: {}", e),
        })?;
        let listener = TcpListener::bind(SocketAddr::new(ip, 0))
            .await
            .map_err(|e| ServiceError::Bind {
                address: self.bind_address.clone(),
                reason: e.to_string(),
            })?;
        let addr = listener.local_addr()?;
        self.listener = Some(listener);
        self.local_addr = Some(addr);
        self.transition(ServerState::Listening);
        info!(port = addr.port(), address = %addr.ip(), "worker listening");
        Ok(addr.port())
    }

    /// Wait for the single connection; the listener is closed once it arrives.
    ///
    /// Cancel safe: dropping the future keeps the server listening.
    pub async fn accept(&mut self) -> Result<Connection<TcpStream>, ServiceError> {
        self.expect_state(ServerState::Listening)?;
        let listener = self.listener.as_ref().ok_or(ServiceError::InvalidState {
            expected: ServerState::Listening,
            actual: self.state,
        })?;
        let (stream, peer) = listener.accept().await?;
        // Later connection attempts are refused
        self.listener = None;
        stream.set_nodelay(true)?;
        info!(peer = %peer, "connection accepted");
        self.transition(ServerState::Serving);
        Ok(Connection::new(stream))
    }

    pub fn close(&mut self) {
        if self.state == ServerState::Closed {
            return;
        }
        self.listener = None;
        self.transition(ServerState::Closed);
    }

    fn expect_state(&self, expected: ServerState) -> Result<(), ServiceError> {
        if self.state != expected {
            return Err(ServiceError::InvalidState {
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }

    fn transition(&mut self, next: ServerState) {
        debug!(from = %self.state, to = %next, "server state");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_accepts_exactly_one_connection() {
        let mut server = OneShotServer::new("127.0.0.1");
        assert_eq!(server.state(), ServerState::Unstarted);
        let port = server.listen().await.unwrap();
        assert_ne!(port, 0);
        assert_eq!(server.state(), ServerState::Listening);

        let addr = server.local_addr().unwrap();
        let (first, accepted) = tokio::join!(TcpStream::connect(addr), server.accept());
        assert!(first.is_ok());
        assert!(accepted.is_ok());
        assert_eq!(server.state(), ServerState::Serving);

        assert!(TcpStream::connect(addr).await.is_err());

        server.close();
        assert_eq!(server.state(), ServerState::Closed);
    }

    #[tokio::test]
    async fn test_state_is_enforced() {
        let mut server = OneShotServer::new("127.0.0.1");
        assert!(matches!(
            server.accept().await,
            Err(ServiceError::InvalidState {
                expected: ServerState::Listening,
                actual: ServerState::Unstarted,
            })
        ));
        server.listen().await.unwrap();
        assert!(server.listen().await.is_err());
    }

    #[tokio::test]
    async fn test_bad_bind_address() {
        let mut server = OneShotServer::new("localhost");
        let err = server.listen().await.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(server.state(), ServerState::Unstarted);
    }

    #[tokio::test]
    async fn test_accept_can_be_abandoned() {
        let mut server = OneShotServer::new("127.0.0.1");
        server.listen().await.unwrap();
        let waited =
            tokio::time::timeout(std::time::Duration::from_millis(20), server.accept()).await;
        assert!(waited.is_err());
        assert_eq!(server.state(), ServerState::Listening);

        let addr = server.local_addr().unwrap();
        let (client, accepted) = tokio::join!(TcpStream::connect(addr), server.accept());
        assert!(client.is_ok() && accepted.is_ok());
    }
}
