//! Connect to an instrument, send `*IDN?`, and print the reply.
//!
//! Usage: `identify <address> [port] [vxi11|raw]`

use std::time::Duration;

use lxi_rs::{ProtocolTag, config::LXI_ID_LENGTH_MAX};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const IO_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let Some(address) = args.next() else {
        eprintln!("usage: identify <address> [port] [vxi11|raw]");
        std::process::exit(2);
    };
    let port: u16 = args.next().and_then(|s| s.parse().ok()).unwrap_or(111);
    let protocol = match args.next().as_deref() {
        Some("raw") => ProtocolTag::Raw,
        _ => ProtocolTag::Vxi11,
    };

    lxi_rs::init().await;

    let handle = match lxi_rs::connect(&address, port, None, CONNECT_TIMEOUT, protocol).await {
        Ok(h) => h,
        Err(e) => {
            eprintln!("connect failed: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = lxi_rs::send(handle, b"*IDN?\n", IO_TIMEOUT).await {
        eprintln!("send failed: {e}");
        std::process::exit(1);
    }

    let mut buf = vec![0u8; LXI_ID_LENGTH_MAX];
    match lxi_rs::receive(handle, &mut buf, IO_TIMEOUT).await {
        Ok(n) => {
            buf.truncate(n);
            println!("{}", String::from_utf8_lossy(&buf).trim_end());
        }
        Err(e) => eprintln!("receive failed: {e}"),
    }

    let _ = lxi_rs::disconnect(handle).await;
}
