//! Protocol dispatch layer: a single async trait object per session, bound at
//! `connect` time to whichever wire protocol the caller asked for.

pub mod raw;
pub mod vxi11;

use std::{net::SocketAddr, time::Duration};

use async_trait::async_trait;
use tokio::net::lookup_host;

use crate::error::{Error, Result};

/// Which wire protocol a session uses. `Hislip` is reserved but unimplemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolTag {
    Vxi11,
    Raw,
    Hislip,
}

/// Uniform operation set a session dispatches through, regardless of wire protocol.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&mut self, timeout: Duration) -> Result<()>;

    async fn send(&mut self, data: &[u8], timeout: Duration) -> Result<usize>;

    async fn receive(&mut self, buffer: &mut [u8], timeout: Duration) -> Result<usize>;

    async fn disconnect(&mut self) -> Result<()>;
}

/// Construct the (not-yet-connected) transport for a protocol tag.
pub fn new_transport(tag: ProtocolTag, address: SocketAddr) -> Result<Box<dyn Transport>> {
    match tag {
        ProtocolTag::Vxi11 => Ok(Box::new(vxi11::Vxi11Transport::new(address))),
        ProtocolTag::Raw => Ok(Box::new(raw::RawTransport::new(address))),
        ProtocolTag::Hislip => Err(Error::Unsupported("HiSLIP is not implemented".into())),
    }
}

/// Resolve `address` to a `SocketAddr`: numeric IPv4/IPv6 literals parse directly,
/// anything else is resolved via hostname lookup (first result wins).
pub async fn resolve(address: &str, port: u16) -> Result<SocketAddr> {
    if let Ok(ip) = address.parse() {
        return Ok(SocketAddr::new(ip, port));
    }

    lookup_host((address, port))
        .await
        .map_err(|e| Error::Connect(format!("failed to resolve {address}: {e}")))?
        .next()
        .ok_or_else(|| Error::Connect(format!("no addresses found for {address}")))
}
