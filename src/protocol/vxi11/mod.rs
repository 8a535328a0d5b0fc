//! VXI-11 protocol client, referencing the VXI-11 1.0 specification. Builds an ONC RPC
//! client over TCP and drives the `Create_Link`/`Device_Write`/`Device_Read`/
//! `Destroy_Link` exchange.

mod onc;
pub mod portmap;
mod rpc;
mod xdr;

use std::{net::SocketAddr, time::Duration};

use async_trait::async_trait;
use tokio::time;

use crate::error::{Error, Result};

use self::{
    onc::OncClient,
    portmap::RpcIpProto,
    rpc::{RpcDeviceErrorCode, RpcRequest},
};

use super::Transport;

/// VXI-11 `DEVICE_CORE` program/version, as resolved through the portmapper.
const VXI_CORE_PROG: u32 = 0x000607AF;
const VXI_CORE_VERS: u32 = 1;

/// Client ID presented to `Create_Link`. Arbitrary; the instrument does not validate it.
const CLIENT_ID: i32 = 1;
/// Device lock timeout passed to every RPC request; this crate never takes a device lock.
const LOCK_TIMEOUT: u32 = 0;
/// Chunk size requested on reads before the instrument's own `max_recv_size` is known.
const INITIAL_READ_SIZE: u32 = 65536;

/// VXI-11's `io_timeout`/`lock_timeout` fields are `u32` milliseconds; clamp rather than
/// wrap when a caller passes a `Duration` longer than that can represent.
fn io_timeout_millis(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}

pub struct Vxi11Transport {
    pmap_addr: SocketAddr,
    client: Option<OncClient>,
    link_id: Option<i32>,
    max_recv_size: u32,
}
impl Vxi11Transport {
    pub fn new(addr: SocketAddr) -> Self {
        Self { pmap_addr: addr, client: None, link_id: None, max_recv_size: INITIAL_READ_SIZE }
    }

    async fn connect_inner(&mut self, deadline: Duration) -> Result<()> {
        let port = portmap::connect_and_request_port(
            self.pmap_addr,
            VXI_CORE_PROG,
            VXI_CORE_VERS,
            RpcIpProto::Tcp,
            deadline,
        )
        .await?;

        let mut core_addr = self.pmap_addr;
        core_addr.set_port(port);

        let mut client = OncClient::new(core_addr);
        client.connect(deadline).await?;

        let req = rpc::RpcRequestCreateDeviceLink {
            client_id: CLIENT_ID,
            lock_device: false,
            lock_timeout: LOCK_TIMEOUT,
            /* VXI-11.3 B.1.2 */
            device: "inst0".into(),
        };

        let results = client
            .call(VXI_CORE_PROG, VXI_CORE_VERS, RpcRequest::CreateLink as u32, req, deadline)
            .await?;

        let mut results = results;
        let resp = rpc::RpcResponseCreateDeviceLink::unpack(&mut results)?;
        if resp.error != RpcDeviceErrorCode::NoError {
            return Err(Error::ProtocolLink(format!("create_link failed: {:?}", resp.error)));
        }

        self.client = Some(client);
        self.link_id = Some(resp.lid);
        self.max_recv_size = resp.max_recv_size.max(1);

        Ok(())
    }

    fn client_mut(&mut self) -> Result<(&mut OncClient, i32)> {
        match (&mut self.client, self.link_id) {
            (Some(client), Some(lid)) => Ok((client, lid)),
            _ => Err(Error::Io("not connected".into())),
        }
    }

    async fn write_chunk(&mut self, data: &[u8], is_last: bool, deadline: Duration) -> Result<u32> {
        let (client, lid) = self.client_mut()?;

        let req = rpc::RpcRequestDeviceWrite {
            lid,
            io_timeout: io_timeout_millis(deadline),
            lock_timeout: LOCK_TIMEOUT,
            flags: rpc::RpcOperationFlags { wait_lock: true, end: is_last, termchr_set: false },
            data: data.to_vec(),
        };

        let mut results = client.call(VXI_CORE_PROG, VXI_CORE_VERS, RpcRequest::DeviceWrite as u32, req, deadline).await?;
        let resp = rpc::RpcResponseDeviceWrite::unpack(&mut results)?;

        match resp.error {
            RpcDeviceErrorCode::NoError => Ok(resp.size),
            RpcDeviceErrorCode::IoTimeout => Err(Error::Timeout("device_write timed out".into())),
            other => Err(Error::Io(format!("device_write failed: {other:?}"))),
        }
    }

    async fn read_chunk(&mut self, request_size: u32, deadline: Duration) -> Result<(Vec<u8>, rpc::RpcDeviceReadReason)> {
        let (client, lid) = self.client_mut()?;

        let req = rpc::RpcRequestDeviceRead {
            lid,
            request_size,
            io_timeout: io_timeout_millis(deadline),
            lock_timeout: LOCK_TIMEOUT,
            flags: rpc::RpcOperationFlags { wait_lock: false, end: false, termchr_set: false },
            termchr: 0,
        };

        let mut results = client.call(VXI_CORE_PROG, VXI_CORE_VERS, RpcRequest::DeviceRead as u32, req, deadline).await?;
        let resp = rpc::RpcResponseDeviceRead::unpack(&mut results)?;

        match resp.error {
            RpcDeviceErrorCode::NoError => Ok((resp.data, resp.reason)),
            RpcDeviceErrorCode::IoTimeout => Err(Error::Timeout("device_read timed out".into())),
            other => Err(Error::Io(format!("device_read failed: {other:?}"))),
        }
    }
}

#[async_trait]
impl Transport for Vxi11Transport {
    async fn connect(&mut self, timeout: Duration) -> Result<()> {
        if self.client.is_some() {
            return Err(Error::Connect("already connected".into()));
        }

        time::timeout(timeout, self.connect_inner(timeout))
            .await
            .map_err(|_| Error::Connect("connect deadline elapsed".into()))?
    }

    async fn send(&mut self, data: &[u8], timeout: Duration) -> Result<usize> {
        let chunk_size = self.max_recv_size as usize;
        let n_chunks = data.len().div_ceil(chunk_size.max(1)).max(1);

        let mut total = 0usize;
        for (index, chunk) in data.chunks(chunk_size.max(1)).enumerate() {
            let is_last = index == (n_chunks - 1);
            total += self.write_chunk(chunk, is_last, timeout).await? as usize;
        }

        Ok(total)
    }

    async fn receive(&mut self, buffer: &mut [u8], timeout: Duration) -> Result<usize> {
        let mut offset = 0usize;

        loop {
            let remaining = buffer.len().saturating_sub(offset) as u32;
            let (data, reason) = self.read_chunk(remaining.max(1), timeout).await?;

            if offset + data.len() > buffer.len() {
                return Err(Error::Buffer(format!(
                    "reply of at least {} bytes exceeds caller buffer of {} bytes",
                    offset + data.len(),
                    buffer.len()
                )));
            }

            buffer[offset..offset + data.len()].copy_from_slice(&data);
            offset += data.len();

            if reason.is_terminal() {
                break;
            }
        }

        Ok(offset)
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let (Some(mut client), Some(lid)) = (self.client.take(), self.link_id.take()) {
            let req = rpc::RpcRequestDestroyLink { lid };
            let deadline = Duration::from_secs(5);
            if let Err(e) = client.call(VXI_CORE_PROG, VXI_CORE_VERS, RpcRequest::DestroyLink as u32, req, deadline).await {
                log::warn!("destroy_link failed during disconnect: {e}");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_timeout_clamps_to_u32_max() {
        let huge = Duration::from_secs(u64::from(u32::MAX) + 10);
        assert_eq!(io_timeout_millis(huge), u32::MAX);

        let small = Duration::from_millis(500);
        assert_eq!(io_timeout_millis(small), 500);
    }
}
