//! Static configuration: the LXI service-type table and numeric constants shared
//! across sessions, protocol, and discovery.

/// Compatibility-surface success code (spec §6.1).
pub const LXI_OK: i32 = 0;
/// Compatibility-surface error code (spec §6.1).
pub const LXI_ERROR: i32 = -1;
/// Largest `*IDN?`/HTTP-XML identification string this crate will assemble.
pub const LXI_ID_LENGTH_MAX: usize = 65536;
/// Size of the fixed session table.
pub const SESSIONS_MAX: usize = 256;

/// One entry in the LXI mDNS/DNS-SD service-type table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LxiServiceType {
    /// DNS-SD label, e.g. `_lxi._tcp`
    pub label: &'static str,
    /// Human-readable name, e.g. `lxi`
    pub pretty_name: &'static str,
}

/// The five LXI service types probed by mDNS discovery, in spec order.
pub const LXI_SERVICE_TYPES: [LxiServiceType; 5] = [
    LxiServiceType { label: "_lxi._tcp", pretty_name: "lxi" },
    LxiServiceType { label: "_vxi-11._tcp", pretty_name: "vxi-11" },
    LxiServiceType { label: "_scpi-raw._tcp", pretty_name: "scpi-raw" },
    LxiServiceType { label: "_scpi-telnet._tcp", pretty_name: "scpi-telnet" },
    LxiServiceType { label: "_hislip._tcp", pretty_name: "hislip" },
];

/// Look up the pretty name for a DNS-SD label, matching as a substring so callers can
/// pass a fully-qualified name like `_lxi._tcp.local`.
pub fn pretty_name_for_label(label: &str) -> Option<&'static str> {
    LXI_SERVICE_TYPES
        .iter()
        .find(|entry| label.contains(entry.label))
        .map(|entry| entry.pretty_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_pretty_name_round_trips_through_its_label() {
        for entry in LXI_SERVICE_TYPES {
            let qualified = format!("{}.local", entry.label);
            assert_eq!(pretty_name_for_label(&qualified), Some(entry.pretty_name));
        }
    }

    #[test]
    fn unknown_label_is_rejected() {
        assert_eq!(pretty_name_for_label("_not-lxi._tcp.local"), None);
    }
}
