//! # TCP P1 Source
//!
//! A P1 byte source over a TCP socket, for meters attached through a
//! serial-to-network bridge. Reads block until the full requested size is
//! available; excess bytes are carried over to the next call.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::{timeout_at, Instant};

use crate::constants::SOURCE_READ_TIMEOUT_SECS;
use crate::error::P1Error;
use crate::transport::P1Source;

/// A P1 byte source backed by a TCP connection.
pub struct TcpSource {
    stream: TcpStream,
    carry: Vec<u8>,
    timeout: Duration,
}

impl TcpSource {
    /// Connects to the P1 bridge at `host:port`.
    pub async fn connect(host: &str, port: u16) -> Result<TcpSource, P1Error> {
        let stream = TcpStream::connect((host, port)).await.map_err(|e| {
            P1Error::TcpSourceError(format!("could not connect to {host}:{port}: {e}"))
        })?;

        Ok(TcpSource {
            stream,
            carry: Vec::new(),
            timeout: Duration::from_secs(SOURCE_READ_TIMEOUT_SECS),
        })
    }
}

#[async_trait]
impl P1Source for TcpSource {
    async fn read(&mut self, size: usize) -> Result<Vec<u8>, P1Error> {
        let deadline = Instant::now() + self.timeout;

        while self.carry.len() < size {
            debug!("Attempting to read {size} bytes from socket");
            let mut chunk = vec![0u8; size];
            match timeout_at(deadline, self.stream.read(&mut chunk)).await {
                Ok(Ok(0)) => {
                    warn!("EOF from socket, connection closed?");
                    break;
                }
                Ok(Ok(n)) => {
                    debug!("Read {n} bytes from socket");
                    self.carry.extend_from_slice(&chunk[..n]);
                }
                Ok(Err(e)) => return Err(P1Error::TcpSourceError(e.to_string())),
                Err(_) => {
                    warn!("Timeout reading {size} bytes from TCP socket");
                    break;
                }
            }
        }

        let take = size.min(self.carry.len());
        Ok(self.carry.drain(..take).collect())
    }
}
