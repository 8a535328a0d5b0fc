//! Discovery and session-based control of LXI-class networked test instruments.
//!
//! The typed API (`connect`/`send`/`receive`/`disconnect`/`discover`) is the primary
//! surface for Rust callers. [`compat`] wraps it in the historical `i32`-returning
//! contract for callers that want that shape verbatim.

pub mod compat;
pub mod config;
pub mod discovery;
pub mod error;
pub mod protocol;
pub mod session;

use std::time::Duration;

pub use config::{LXI_ERROR, LXI_ID_LENGTH_MAX, LXI_OK, SESSIONS_MAX};
pub use discovery::{DiscoveryCallbacks, DiscoveryKind};
pub use error::{Error, Result};
pub use protocol::ProtocolTag;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Zero the session table. Idempotent.
pub async fn init() {
    session::init().await;
}

/// Connect to `address:port` with the given protocol, returning a session handle.
/// `name` is currently unused (reserved for a future logical-name registry, per spec
/// §6.1) but kept in the signature so callers don't need a breaking change later.
pub async fn connect(
    address: &str,
    port: u16,
    _name: Option<&str>,
    timeout: Duration,
    protocol: ProtocolTag,
) -> Result<i32> {
    session::connect(address, port, timeout, protocol).await
}

pub async fn disconnect(handle: i32) -> Result<()> {
    session::disconnect(handle).await
}

pub async fn send(handle: i32, bytes: &[u8], timeout: Duration) -> Result<usize> {
    session::send(handle, bytes, timeout).await
}

pub async fn receive(handle: i32, buffer: &mut [u8], timeout: Duration) -> Result<usize> {
    session::receive(handle, buffer, timeout).await
}

pub async fn discover(info: DiscoveryCallbacks, timeout: Duration, kind: DiscoveryKind) -> Result<()> {
    discovery::discover(info, timeout, kind).await
}
