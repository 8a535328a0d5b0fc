//! RAW protocol: newline-framed SCPI over a plain TCP stream (spec §4.2).

use std::{net::SocketAddr, time::Duration};

use async_trait::async_trait;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time,
};

use crate::error::{Error, Result};

use super::Transport;

pub struct RawTransport {
    address: SocketAddr,
    stream: Option<TcpStream>,
}
impl RawTransport {
    pub fn new(address: SocketAddr) -> Self {
        Self { address, stream: None }
    }

    /// Read until `timeout` elapses or the peer closes the stream, accumulating
    /// everything seen. Used internally by the HTTP-XML identification fallback,
    /// which needs the full response body rather than just the first available chunk.
    pub(crate) async fn receive_wait(&mut self, timeout: Duration) -> Result<Vec<u8>> {
        let stream = self.stream.as_mut().ok_or_else(|| Error::Io("not connected".into()))?;

        let mut out = Vec::new();
        let mut chunk = [0u8; 4096];
        let deadline = time::Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            match time::timeout(remaining, stream.read(&mut chunk)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => out.extend_from_slice(&chunk[..n]),
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => break,
            }
        }

        Ok(out)
    }
}

#[async_trait]
impl Transport for RawTransport {
    async fn connect(&mut self, timeout: Duration) -> Result<()> {
        let stream = time::timeout(timeout, TcpStream::connect(self.address))
            .await
            .map_err(|_| Error::Connect(format!("timed out connecting to {}", self.address)))?
            .map_err(|e| Error::Connect(format!("{}: {e}", self.address)))?;

        self.stream = Some(stream);
        Ok(())
    }

    async fn send(&mut self, data: &[u8], timeout: Duration) -> Result<usize> {
        let stream = self.stream.as_mut().ok_or_else(|| Error::Io("not connected".into()))?;

        time::timeout(timeout, stream.write_all(data))
            .await
            .map_err(|_| Error::Timeout("send deadline elapsed".into()))?
            .map_err(Error::from)?;

        Ok(data.len())
    }

    async fn receive(&mut self, buffer: &mut [u8], timeout: Duration) -> Result<usize> {
        let stream = self.stream.as_mut().ok_or_else(|| Error::Io("not connected".into()))?;

        let n = time::timeout(timeout, stream.read(buffer))
            .await
            .map_err(|_| Error::Timeout("receive deadline elapsed".into()))?
            .map_err(Error::from)?;

        Ok(n)
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.stream = None;
        Ok(())
    }
}
