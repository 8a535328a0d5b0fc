//! VXI-11 discovery (spec §4.5.1): broadcast a frozen `PORTMAP GETPORT` datagram on every
//! broadcast-capable IPv4 interface, then probe each responder with `*IDN?`.

use std::{net::Ipv4Addr, time::Duration};

use tokio::{net::UdpSocket, time};

use crate::{
    config::LXI_ID_LENGTH_MAX,
    error::{Error, Result},
    protocol::{self, ProtocolTag, Transport},
};

use super::{DiscoveryCallbacks, http_id, log_and_continue};

use crate::protocol::vxi11::portmap::{GETPORT_DATAGRAM, PORTMAP_PORT};

pub async fn discover(callbacks: &mut DiscoveryCallbacks, timeout: Duration) -> Result<()> {
    let interfaces = if_addrs::get_if_addrs()
        .map_err(|e| Error::Io(format!("enumerating interfaces: {e}")))?;

    for iface in interfaces {
        let if_addrs::IfAddr::V4(v4) = &iface.addr else { continue };
        let Some(broadcast) = v4.broadcast else { continue };
        if iface.is_loopback() {
            continue;
        }

        callbacks.fire_broadcast(&v4.ip.to_string(), &iface.name);

        if let Err(e) = probe_interface(v4.ip, broadcast, &iface.name, timeout, callbacks).await {
            log_and_continue(&format!("vxi-11 discovery on {}", iface.name), e);
        }
    }

    Ok(())
}

async fn probe_interface(
    bind_ip: Ipv4Addr,
    broadcast: Ipv4Addr,
    iface_name: &str,
    timeout: Duration,
    callbacks: &mut DiscoveryCallbacks,
) -> Result<()> {
    let socket = UdpSocket::bind((bind_ip, 0)).await?;
    socket.set_broadcast(true)?;
    socket.send_to(&GETPORT_DATAGRAM, (broadcast, PORTMAP_PORT)).await?;

    let deadline = time::Instant::now() + timeout;
    let mut buf = [0u8; 512];

    loop {
        let remaining = deadline.saturating_duration_since(time::Instant::now());
        if remaining.is_zero() {
            return Ok(());
        }

        let (n, from) = match time::timeout(remaining, socket.recv_from(&mut buf)).await {
            Ok(Ok(v)) => v,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Ok(()),
        };

        if parse_getport_reply(&buf[..n]).is_none() {
            continue;
        }

        let address = from.ip().to_string();
        match get_device_id(&address, timeout).await {
            Ok(id) if !id.is_empty() => callbacks.fire_device(&address, &id),
            Ok(_) => match http_id::fetch(&address, timeout).await {
                Ok(id) => callbacks.fire_device(&address, &id),
                Err(e) => log_and_continue(&format!("HTTP-XML fallback for {iface_name}/{address}"), e),
            },
            Err(e) => log_and_continue(&format!("*IDN? probe of {address}"), e),
        }
    }
}

/// Extract the port from a PORTMAP GETPORT success reply, or `None` if the datagram
/// isn't a well-formed accepted success reply (rejected call, wrong procedure, garbage).
fn parse_getport_reply(buf: &[u8]) -> Option<u16> {
    if buf.len() < 20 {
        return None;
    }
    let u32_at = |o: usize| -> Option<u32> { buf.get(o..o + 4).map(|b| u32::from_be_bytes(b.try_into().unwrap())) };

    if u32_at(4)? != 1 {
        return None; // not MSG_REPLY
    }
    if u32_at(8)? != 0 {
        return None; // not MSG_ACCEPTED
    }

    let verf_len = u32_at(16)? as usize;
    let padded_verf = verf_len.div_ceil(4) * 4;
    let accept_stat_off = 20 + padded_verf;

    if u32_at(accept_stat_off)? != 0 {
        return None; // not SUCCESS
    }

    let port = u32_at(accept_stat_off + 4)?;
    if port == 0 || port > u32::from(u16::MAX) {
        return None;
    }
    Some(port as u16)
}

/// Open a VXI-11 session to `address`, send `*IDN?`, and return the trimmed reply.
async fn get_device_id(address: &str, timeout: Duration) -> Result<String> {
    let addr = protocol::resolve(address, PORTMAP_PORT).await?;
    let mut transport = protocol::new_transport(ProtocolTag::Vxi11, addr)?;
    transport.connect(timeout).await?;

    let result = async {
        transport.send(b"*IDN?\n", timeout).await?;

        let mut buf = vec![0u8; LXI_ID_LENGTH_MAX];
        let n = transport.receive(&mut buf, timeout).await?;
        buf.truncate(n);

        let text = String::from_utf8_lossy(&buf);
        Ok::<String, Error>(text.trim_end_matches(['\r', '\n']).to_string())
    }
    .await;

    let _ = transport.disconnect().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_or_non_reply_datagrams() {
        assert_eq!(parse_getport_reply(&[0u8; 4]), None);
        assert_eq!(parse_getport_reply(&[0u8; 20]), None);
    }

    #[test]
    fn extracts_port_from_a_well_formed_success_reply() {
        let mut buf = vec![0u8; 24];
        buf[4..8].copy_from_slice(&1u32.to_be_bytes()); // MSG_REPLY
        buf[8..12].copy_from_slice(&0u32.to_be_bytes()); // MSG_ACCEPTED
        buf[16..20].copy_from_slice(&0u32.to_be_bytes()); // verf length = 0
        buf[20..24].copy_from_slice(&0u32.to_be_bytes()); // accept_stat = SUCCESS
        buf.extend_from_slice(&9009u32.to_be_bytes());

        assert_eq!(parse_getport_reply(&buf), Some(9009));
    }
}
