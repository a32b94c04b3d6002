//! TCP Connector Module
//!
//! [`ResourceManager`] that opens plain TCP connections to the backing store.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::debug;

use super::ResourceManager;

/// Opens TCP connections to a fixed address with a connect timeout.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    addr: String,
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(addr: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout,
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

#[async_trait]
impl ResourceManager for TcpConnector {
    type Resource = TcpStream;
    type Error = io::Error;

    async fn create(&self) -> Result<TcpStream, io::Error> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connect to {} timed out", self.addr),
                )
            })??;
        stream.set_nodelay(true)?;
        debug!(addr = %self.addr, "Opened backend connection");
        Ok(stream)
    }
}
