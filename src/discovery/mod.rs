//! Instrument discovery (spec §4.5): two independent mechanisms dispatched by
//! [`DiscoveryKind`], each reporting candidates to the caller through optional callbacks
//! rather than building up a collection — a discovery pass can run indefinitely and the
//! caller may want to act on the first hit.

pub mod http_id;
pub mod mdns;
pub mod vxi11;

use std::time::Duration;

use crate::error::{Error, Result};

/// Which discovery mechanism to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryKind {
    Vxi11,
    Mdns,
}

/// Optional callbacks invoked from the discovery task. Any subset may be left unset; an
/// absent callback just means that event is skipped rather than reported.
#[derive(Default)]
pub struct DiscoveryCallbacks {
    /// Called once per interface a discovery probe goes out on.
    pub broadcast: Option<Box<dyn FnMut(&str, &str) + Send>>,
    /// VXI-11 path: called once per instrument that answered `*IDN?` (or the HTTP-XML
    /// fallback).
    pub device: Option<Box<dyn FnMut(&str, &str) + Send>>,
    /// mDNS path: called once per fully-correlated service.
    pub service: Option<Box<dyn FnMut(&str, &str, &str, u16) + Send>>,
}
impl DiscoveryCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    fn fire_broadcast(&mut self, addr: &str, iface: &str) {
        if let Some(cb) = &mut self.broadcast {
            cb(addr, iface);
        }
    }

    fn fire_device(&mut self, addr: &str, id: &str) {
        if let Some(cb) = &mut self.device {
            cb(addr, id);
        }
    }

    fn fire_service(&mut self, addr: &str, name: &str, service_type: &str, port: u16) {
        if let Some(cb) = &mut self.service {
            cb(addr, name, service_type, port);
        }
    }
}

/// Run one discovery pass, bounded by `timeout`, reporting through `callbacks`.
pub async fn discover(
    mut callbacks: DiscoveryCallbacks,
    timeout: Duration,
    kind: DiscoveryKind,
) -> Result<()> {
    match kind {
        DiscoveryKind::Vxi11 => vxi11::discover(&mut callbacks, timeout).await,
        DiscoveryKind::Mdns => mdns::discover(&mut callbacks, timeout).await,
    }
}

/// Callbacks that fail to find an instrument at a given candidate are not propagated;
/// the caller's own callback panicking is not caught here (spec §7 scopes that as their
/// responsibility), but a protocol-level miss on one candidate must not abort the sweep.
pub(crate) fn log_and_continue(context: &str, err: Error) {
    log::debug!("{context}: {err}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unset_callbacks_are_simply_skipped() {
        let mut callbacks = DiscoveryCallbacks::new();
        callbacks.fire_broadcast("127.0.0.1", "lo");
        callbacks.fire_device("127.0.0.1", "ACME,X,1,1");
        callbacks.fire_service("127.0.0.1", "inst", "lxi", 80);
    }

    #[tokio::test]
    async fn set_callbacks_observe_their_events() {
        use std::sync::{Arc, Mutex};

        let seen = Arc::new(Mutex::new(vec![]));
        let mut callbacks = DiscoveryCallbacks::new();
        let seen_clone = seen.clone();
        callbacks.broadcast = Some(Box::new(move |addr, iface| {
            seen_clone.lock().unwrap().push(format!("{addr}/{iface}"));
        }));

        callbacks.fire_broadcast("192.0.2.1", "eth0");
        assert_eq!(seen.lock().unwrap().as_slice(), ["192.0.2.1/eth0"]);
    }
}
