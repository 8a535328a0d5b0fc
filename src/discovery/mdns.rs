//! mDNS/DNS-SD discovery (spec §4.5.2): a two-stage PTR→SRV correlation over multicast.
//!
//! Binds one shared socket on `0.0.0.0:5353` and joins the mDNS group on every
//! usable IPv4 interface, rather than a fully separate socket per interface — the kernel
//! delivers multicast traffic to the bound socket regardless of which joined interface it
//! arrived on, which keeps the receive loop to a single `recv_from` instead of a
//! `select!` across N sockets. Each interface still gets its own `broadcast` callback.
//! IPv6 is not probed (see DESIGN.md).

use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr, SocketAddrV4},
    time::Duration,
};

use simple_dns::{CLASS, Name, Packet, QCLASS, QTYPE, Question, TYPE, rdata::RData};
use socket2::{Domain, Protocol as SockProtocol, Socket, Type as SockType};
use tokio::{net::UdpSocket, time};

use crate::{
    config::{LXI_SERVICE_TYPES, pretty_name_for_label},
    error::{Error, Result},
};

use super::{DiscoveryCallbacks, log_and_continue};

const MDNS_PORT: u16 = 5353;
const MDNS_GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);
const DNS_SD_META_QUERY: &str = "_services._dns-sd._udp.local";

struct PendingProbe {
    service_type: &'static str,
    instance_name: Option<String>,
    port: Option<u16>,
}

pub async fn discover(callbacks: &mut DiscoveryCallbacks, timeout: Duration) -> Result<()> {
    let interfaces = if_addrs::get_if_addrs().map_err(|e| Error::Io(format!("enumerating interfaces: {e}")))?;

    let mut joined = Vec::new();
    for iface in &interfaces {
        if iface.is_loopback() {
            continue;
        }
        if looks_like_tunnel(&iface.name) {
            continue;
        }
        let if_addrs::IfAddr::V4(v4) = &iface.addr else { continue };
        joined.push((v4.ip, iface.name.clone()));
    }

    if joined.is_empty() {
        return Ok(());
    }

    let socket = open_shared_socket(joined.iter().map(|(ip, _)| *ip))?;
    for (ip, name) in &joined {
        callbacks.fire_broadcast(&ip.to_string(), name);
    }

    let query = build_query(DNS_SD_META_QUERY)?;
    socket.send_to(&query, (MDNS_GROUP, MDNS_PORT)).await?;

    let mut pending: HashMap<(IpAddr, u16), PendingProbe> = HashMap::new();
    let deadline = time::Instant::now() + timeout;
    let mut buf = [0u8; 4096];

    loop {
        let remaining = deadline.saturating_duration_since(time::Instant::now());
        if remaining.is_zero() {
            break;
        }

        let (n, from) = match time::timeout(remaining, socket.recv_from(&mut buf)).await {
            Ok(Ok(v)) => v,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => break,
        };

        let packet = match Packet::parse(&buf[..n]) {
            Ok(p) => p,
            Err(e) => {
                log_and_continue("mdns packet parse", Error::Io(e.to_string()));
                continue;
            }
        };

        for answer in &packet.answers {
            handle_answer(&socket, answer, from.ip(), from.port(), &mut pending).await;
        }
    }

    for ((ip, _port), probe) in pending {
        callbacks.fire_service(
            &ip.to_string(),
            probe.instance_name.as_deref().unwrap_or("Unknown"),
            probe.service_type,
            probe.port.unwrap_or(0),
        );
    }

    Ok(())
}

async fn handle_answer(
    socket: &UdpSocket,
    answer: &simple_dns::ResourceRecord<'_>,
    from_ip: IpAddr,
    from_port: u16,
    pending: &mut HashMap<(IpAddr, u16), PendingProbe>,
) {
    let answer_name = answer.name.to_string();
    let answer_name = answer_name.trim_end_matches('.');

    match &answer.rdata {
        RData::PTR(target) if answer_name.eq_ignore_ascii_case(DNS_SD_META_QUERY) => {
            let target = target.to_string();
            let target = target.trim_end_matches('.');
            let Some(service_type) = pretty_name_for_label(target) else { return };

            pending.insert(
                (from_ip, from_port),
                PendingProbe { service_type, instance_name: None, port: None },
            );

            if let Ok(query) = build_query(target) {
                let _ = socket.send_to(&query, (MDNS_GROUP, MDNS_PORT)).await;
            }
        }
        RData::PTR(target) => {
            let target_str = target.to_string();
            let target_str = target_str.trim_end_matches('.');
            let Some(label) = LXI_SERVICE_TYPES.iter().find(|t| answer_name.contains(t.label)) else {
                return;
            };

            let instance = target_str
                .find(label.label)
                .map(|idx| target_str[..idx].trim_end_matches('.').to_string())
                .unwrap_or_else(|| target_str.to_string());

            for probe in pending.values_mut() {
                if probe.service_type == label.pretty_name && probe.instance_name.is_none() {
                    probe.instance_name = Some(instance.clone());
                }
            }
        }
        RData::SRV(srv) => {
            if let Some(probe) = pending.get_mut(&(from_ip, from_port)) {
                probe.port = Some(srv.port);
            }
        }
        _ => {}
    }
}

fn looks_like_tunnel(name: &str) -> bool {
    ["tun", "tap", "ppp", "utun"].iter().any(|p| name.starts_with(p))
}

fn open_shared_socket(ips: impl Iterator<Item = Ipv4Addr>) -> Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, SockType::DGRAM, Some(SockProtocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, MDNS_PORT).into())?;

    for ip in ips {
        socket.join_multicast_v4(&MDNS_GROUP, &ip)?;
    }

    socket.set_nonblocking(true)?;
    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket).map_err(Error::from)
}

fn build_query(name: &str) -> Result<Vec<u8>> {
    let mut packet = Packet::new_query(0);
    let qname = Name::new(name).map_err(|e| Error::Io(format!("building mdns query for {name}: {e}")))?;
    packet.questions.push(Question::new(qname, QTYPE::TYPE(TYPE::PTR), QCLASS::CLASS(CLASS::IN), false));
    packet.build_bytes_vec().map_err(|e| Error::Io(format!("encoding mdns query for {name}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_type_detection_matches_known_labels_only() {
        assert_eq!(pretty_name_for_label("_lxi._tcp.local"), Some("lxi"));
        assert_eq!(pretty_name_for_label("_not-a-service._tcp.local"), None);
    }

    #[test]
    fn meta_query_builds_without_error() {
        let bytes = build_query(DNS_SD_META_QUERY).unwrap();
        assert!(!bytes.is_empty());
    }
}
