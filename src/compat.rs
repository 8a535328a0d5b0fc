//! Historical two-valued `i32` contract (spec §6.1), kept as a thin shim over the typed
//! API for callers that want the C-library-style surface verbatim. New code should
//! prefer the `Result`-returning functions at the crate root.

use std::time::Duration;

use crate::{
    config::{LXI_ERROR, LXI_OK},
    discovery::{DiscoveryCallbacks, DiscoveryKind},
    protocol::ProtocolTag,
};

pub async fn lxi_init() -> i32 {
    crate::init().await;
    LXI_OK
}

/// Returns the session handle on success, `LXI_ERROR` on failure. Errors are logged at
/// `warn` rather than returned; the caller has no channel to receive them through.
pub async fn lxi_connect(address: &str, port: u16, timeout: Duration, protocol: ProtocolTag) -> i32 {
    match crate::connect(address, port, None, timeout, protocol).await {
        Ok(handle) => handle,
        Err(e) => {
            log::warn!("lxi_connect({address}:{port}) failed: {e}");
            LXI_ERROR
        }
    }
}

pub async fn lxi_disconnect(handle: i32) -> i32 {
    match crate::disconnect(handle).await {
        Ok(()) => LXI_OK,
        Err(e) => {
            log::warn!("lxi_disconnect({handle}) failed: {e}");
            LXI_ERROR
        }
    }
}

/// Returns the number of bytes sent, or `LXI_ERROR`.
pub async fn lxi_send(handle: i32, bytes: &[u8], timeout: Duration) -> i32 {
    match crate::send(handle, bytes, timeout).await {
        Ok(n) => n as i32,
        Err(e) => {
            log::warn!("lxi_send({handle}) failed: {e}");
            LXI_ERROR
        }
    }
}

/// Returns the number of bytes received, or `LXI_ERROR`.
pub async fn lxi_receive(handle: i32, buffer: &mut [u8], timeout: Duration) -> i32 {
    match crate::receive(handle, buffer, timeout).await {
        Ok(n) => n as i32,
        Err(e) => {
            log::warn!("lxi_receive({handle}) failed: {e}");
            LXI_ERROR
        }
    }
}

pub async fn lxi_discover(info: DiscoveryCallbacks, timeout: Duration, kind: DiscoveryKind) -> i32 {
    match crate::discover(info, timeout, kind).await {
        Ok(()) => LXI_OK,
        Err(e) => {
            log::warn!("lxi_discover failed: {e}");
            LXI_ERROR
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_to_an_unreachable_address_yields_lxi_error() {
        let result = lxi_connect("198.51.100.1", 1, Duration::from_millis(50), ProtocolTag::Raw).await;
        assert_eq!(result, LXI_ERROR);
    }

    #[tokio::test]
    async fn disconnecting_an_out_of_range_handle_yields_lxi_error() {
        let result = lxi_disconnect(-1).await;
        assert_eq!(result, LXI_ERROR);
    }
}
