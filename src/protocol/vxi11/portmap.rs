//! ONC portmapper client, RFC1833

use std::{net::SocketAddr, time::Duration};

use crate::error::{Error, Result};

use super::{
    onc::{OncClient, OpaqueAuth, RPC_VERSION},
    xdr::{self, XdrPack},
};

pub const PORTMAP_PROG: u32 = 100000;
pub const PORTMAP_VERS: u32 = 2;
pub const PORTMAP_PORT: u16 = 111;

/// Connect to an ONC server's portmapper and request a port for a program.
pub async fn connect_and_request_port(
    addr: SocketAddr,
    prog: u32,
    vers: u32,
    prot: RpcIpProto,
    deadline: Duration,
) -> Result<u16> {
    let mut client = OncClient::new(addr);
    client.connect(deadline).await?;

    request_port(&mut client, prog, vers, prot, deadline).await
}

/// Request a port for a program/version/protocol triple, using an existing client.
pub async fn request_port(
    client: &mut OncClient,
    prog: u32,
    vers: u32,
    prot: RpcIpProto,
    deadline: Duration,
) -> Result<u16> {
    let mapping = RpcMapping { prog, vers, prot, port: 0 };

    let mut results = client
        .call(PORTMAP_PROG, PORTMAP_VERS, RpcRequest::GetPort as u32, mapping, deadline)
        .await?;

    xdr::unpack_u16(&mut results)
}

#[allow(unused)]
#[repr(u8)]
enum RpcRequest {
    Null = 0,
    Set = 1,
    Unset = 2,
    GetPort = 3,
    CallIt = 4,
}

#[derive(Debug)]
struct RpcMapping {
    prog: u32,
    vers: u32,
    prot: RpcIpProto,
    port: u32,
}
impl XdrPack for RpcMapping {
    fn pack_xdr(self, out: &mut Vec<u8>) {
        self.prog.pack_xdr(out);
        self.vers.pack_xdr(out);
        (self.prot as u32).pack_xdr(out);
        self.port.pack_xdr(out);
    }
}

#[allow(unused)]
#[derive(Clone, Copy, Debug)]
#[repr(u32)]
pub enum RpcIpProto {
    Tcp = 6,
    Udp = 17,
}

/// The VXI-11 `DEVICE_CORE` program/version this crate discovers via broadcast GETPORT.
const VXI_CORE_PROG: u32 = 0x000607AF;
const VXI_CORE_VERS: u32 = 1;

/// Frozen PORTMAP GETPORT UDP datagram (spec §6.2): asks "what TCP port serves
/// DEVICE_CORE v1?" Kept as a literal so discovery never depends on the XDR encoder
/// producing byte-identical output after a refactor; [`build_getport_datagram`]
/// reconstructs the same bytes from the RPC/XDR definitions and a test pins the two
/// against each other.
#[rustfmt::skip]
pub const GETPORT_DATAGRAM: [u8; 56] = [
    0x00, 0x00, 0x03, 0xe8, // xid
    0x00, 0x00, 0x00, 0x00, // msg_type = CALL
    0x00, 0x00, 0x00, 0x02, // rpc_version = 2
    0x00, 0x01, 0x86, 0xa0, // prog = 100000 (portmapper)
    0x00, 0x00, 0x00, 0x02, // vers = 2
    0x00, 0x00, 0x00, 0x03, // proc = 3 (GETPORT)
    0x00, 0x00, 0x00, 0x00, // cred flavor = AUTH_NULL
    0x00, 0x00, 0x00, 0x00, // cred length = 0
    0x00, 0x00, 0x00, 0x00, // verf flavor = AUTH_NULL
    0x00, 0x00, 0x00, 0x00, // verf length = 0
    0x00, 0x06, 0x07, 0xaf, // mapping.prog = 0x000607af (DEVICE_CORE)
    0x00, 0x00, 0x00, 0x01, // mapping.vers = 1
    0x00, 0x00, 0x00, 0x06, // mapping.prot = 6 (TCP)
    0x00, 0x00, 0x00, 0x00, // mapping.port = 0
];

/// Reconstruct [`GETPORT_DATAGRAM`] from the RPC/XDR definitions.
pub fn build_getport_datagram() -> Vec<u8> {
    let mut out = vec![];
    0x000003e8u32.pack_xdr(&mut out); // xid
    0u32.pack_xdr(&mut out); // msg_type = CALL
    RPC_VERSION.pack_xdr(&mut out);
    PORTMAP_PROG.pack_xdr(&mut out);
    PORTMAP_VERS.pack_xdr(&mut out);
    (RpcRequest::GetPort as u32).pack_xdr(&mut out);
    OpaqueAuth::new_null().pack_xdr(&mut out);
    OpaqueAuth::new_null().pack_xdr(&mut out);

    let mapping = RpcMapping { prog: VXI_CORE_PROG, vers: VXI_CORE_VERS, prot: RpcIpProto::Tcp, port: 0 };
    mapping.pack_xdr(&mut out);

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructed_datagram_matches_frozen_literal() {
        let built = build_getport_datagram();
        assert_eq!(built.len(), 56);
        assert_eq!(built, GETPORT_DATAGRAM.to_vec());
    }
}
