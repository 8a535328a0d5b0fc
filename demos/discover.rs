//! Run a discovery pass and print every instrument/service found.
//!
//! Usage: `discover [vxi11|mdns] [timeout_secs]`

use std::time::Duration;

use lxi_rs::{DiscoveryCallbacks, DiscoveryKind};

#[tokio::main]
async fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let kind = match args.next().as_deref() {
        Some("mdns") => DiscoveryKind::Mdns,
        _ => DiscoveryKind::Vxi11,
    };
    let timeout = args
        .next()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(5));

    let mut callbacks = DiscoveryCallbacks::new();
    callbacks.broadcast = Some(Box::new(|addr, iface| {
        println!("probing on {iface} ({addr})");
    }));
    callbacks.device = Some(Box::new(|addr, id| {
        println!("{addr}: {id}");
    }));
    callbacks.service = Some(Box::new(|addr, name, service_type, port| {
        println!("{addr}:{port} {name} [{service_type}]");
    }));

    if let Err(e) = lxi_rs::discover(callbacks, timeout, kind).await {
        eprintln!("discovery failed: {e}");
        std::process::exit(1);
    }
}
