//! Error taxonomy (spec §7): kinds, not instrument-specific messages. Every fallible
//! operation in this crate returns `Result<T, Error>`; the `compat` module in `lib.rs`
//! reduces these to the historical two-valued `i32` contract at the boundary.

use std::{fmt::Display, result};

pub type Result<T, E = Error> = result::Result<T, E>;

#[derive(Debug)]
pub enum Error {
    /// No free session slot
    Capacity,
    /// Socket/bind/RPC-client creation failure, unresolved hostname, or missed connect deadline
    Connect(String),
    /// `create_link` rejected by the instrument
    ProtocolLink(String),
    /// Send/receive deadline elapsed, or VXI-11 device error 15 (I/O timeout)
    Timeout(String),
    /// Transport-level read/write failure, or an RPC call that didn't succeed/decode
    Io(String),
    /// Reply is larger than the caller-provided buffer
    Buffer(String),
    /// Protocol tag `Hislip`, or an unknown discovery kind
    Unsupported(String),
}
impl std::error::Error for Error {}
impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Capacity => write!(f, "no free session slot"),
            Error::Connect(desc) => write!(f, "connect failed: {desc}"),
            Error::ProtocolLink(desc) => write!(f, "protocol link failed: {desc}"),
            Error::Timeout(desc) => write!(f, "timed out: {desc}"),
            Error::Io(desc) => write!(f, "I/O failure: {desc}"),
            Error::Buffer(desc) => write!(f, "buffer too small: {desc}"),
            Error::Unsupported(desc) => write!(f, "not supported: {desc}"),
        }
    }
}
impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_variant_has_a_distinct_nonempty_message() {
        let variants = [
            Error::Capacity,
            Error::Connect("x".into()),
            Error::ProtocolLink("x".into()),
            Error::Timeout("x".into()),
            Error::Io("x".into()),
            Error::Buffer("x".into()),
            Error::Unsupported("x".into()),
        ];
        let mut seen = std::collections::HashSet::new();
        for variant in &variants {
            let message = variant.to_string();
            assert!(!message.is_empty());
            assert!(seen.insert(message), "duplicate Display output across variants");
        }
    }
}
