//! Fixed-capacity session table (spec §4.1): handle-based connect/send/receive/
//! disconnect multiplexed across protocols. Allocation is guarded by one lock over a
//! bitmap; each slot's live state is guarded by its own independent lock so I/O on
//! distinct handles never contends.

use std::{net::SocketAddr, sync::LazyLock, time::Duration};

use tokio::sync::Mutex;

use crate::{
    config::SESSIONS_MAX,
    error::{Error, Result},
    protocol::{self, ProtocolTag, Transport, resolve},
};

struct Slot {
    connected: bool,
    transport: Option<Box<dyn Transport>>,
}
impl Slot {
    const fn empty() -> Self {
        Self { connected: false, transport: None }
    }
}

struct SessionTable {
    allocated: Mutex<[bool; SESSIONS_MAX]>,
    slots: Vec<Mutex<Slot>>,
}
impl SessionTable {
    fn new() -> Self {
        Self {
            allocated: Mutex::new([false; SESSIONS_MAX]),
            slots: (0..SESSIONS_MAX).map(|_| Mutex::new(Slot::empty())).collect(),
        }
    }
}

static TABLE: LazyLock<SessionTable> = LazyLock::new(SessionTable::new);

/// Zero the table. Idempotent; safe to call more than once.
pub async fn init() {
    let mut allocated = TABLE.allocated.lock().await;
    for slot in allocated.iter_mut() {
        *slot = false;
    }
    for slot in &TABLE.slots {
        *slot.lock().await = Slot::empty();
    }
}

fn check_handle(handle: i32) -> Result<usize> {
    if handle < 0 || (handle as usize) >= SESSIONS_MAX {
        return Err(Error::Io(format!("handle {handle} out of range")));
    }
    Ok(handle as usize)
}

/// Find a free slot, bind a transport for `protocol`, connect it, and return the
/// handle. Releases the allocation guard before the (potentially slow) connect so
/// unrelated sessions are not blocked.
pub async fn connect(
    address: &str,
    port: u16,
    timeout: Duration,
    protocol: ProtocolTag,
) -> Result<i32> {
    let index = {
        let mut allocated = TABLE.allocated.lock().await;
        let index = allocated.iter().position(|taken| !taken).ok_or(Error::Capacity)?;
        allocated[index] = true;
        index
    };

    let result = async {
        let addr: SocketAddr = resolve(address, port).await?;
        let mut transport = protocol::new_transport(protocol, addr)?;
        transport.connect(timeout).await?;

        let mut slot = TABLE.slots[index].lock().await;
        slot.connected = true;
        slot.transport = Some(transport);

        Ok::<(), Error>(())
    }
    .await;

    if let Err(e) = result {
        let mut allocated = TABLE.allocated.lock().await;
        allocated[index] = false;
        return Err(e);
    }

    log::info!("session {index} connected to {address}:{port}");
    Ok(index as i32)
}

/// Release `handle`'s transport (calling its `disconnect`) and free the slot for reuse.
pub async fn disconnect(handle: i32) -> Result<()> {
    let index = check_handle(handle)?;

    let mut transport = {
        let mut slot = TABLE.slots[index].lock().await;
        slot.connected = false;
        slot.transport.take()
    };

    if let Some(transport) = &mut transport {
        transport.disconnect().await?;
    }

    let mut allocated = TABLE.allocated.lock().await;
    allocated[index] = false;

    log::info!("session {index} disconnected");
    Ok(())
}

/// Send on `handle` without holding the allocation guard; concurrent I/O on distinct
/// handles proceeds in parallel, serialized per-handle by that slot's own lock.
pub async fn send(handle: i32, data: &[u8], timeout: Duration) -> Result<usize> {
    let index = check_handle(handle)?;
    let mut slot = TABLE.slots[index].lock().await;
    let transport = slot.transport.as_mut().ok_or_else(|| Error::Io("not connected".into()))?;
    transport.send(data, timeout).await
}

pub async fn receive(handle: i32, buffer: &mut [u8], timeout: Duration) -> Result<usize> {
    let index = check_handle(handle)?;
    let mut slot = TABLE.slots[index].lock().await;
    let transport = slot.transport.as_mut().ok_or_else(|| Error::Io("not connected".into()))?;
    transport.receive(buffer, timeout).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::{io::AsyncReadExt, io::AsyncWriteExt, net::TcpListener};

    async fn spawn_echo_server() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let (mut stream, _) = match listener.accept().await {
                    Ok(v) => v,
                    Err(_) => return,
                };
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    loop {
                        match stream.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => {
                                if stream.write_all(&buf[..n]).await.is_err() {
                                    return;
                                }
                            }
                        }
                    }
                });
            }
        });
        addr
    }

    #[tokio::test]
    async fn handle_at_sessions_max_is_rejected() {
        assert!(check_handle(SESSIONS_MAX as i32).is_err());
        assert!(check_handle(-1).is_err());
        assert!(check_handle(0).is_ok());
    }

    #[tokio::test]
    async fn raw_send_then_receive_round_trips() {
        init().await;
        let addr = spawn_echo_server().await;

        let handle = connect(
            &addr.ip().to_string(),
            addr.port(),
            Duration::from_secs(1),
            ProtocolTag::Raw,
        )
        .await
        .unwrap();

        let sent = send(handle, b"hello", Duration::from_secs(1)).await.unwrap();
        assert_eq!(sent, 5);

        let mut buf = [0u8; 256];
        let n = receive(handle, &mut buf, Duration::from_secs(1)).await.unwrap();
        assert_eq!(&buf[..n], b"hello");

        disconnect(handle).await.unwrap();
    }

    #[tokio::test]
    async fn disconnect_frees_the_slot_for_reuse() {
        init().await;
        let addr = spawn_echo_server().await;

        let first = connect(&addr.ip().to_string(), addr.port(), Duration::from_secs(1), ProtocolTag::Raw)
            .await
            .unwrap();
        disconnect(first).await.unwrap();

        let second = connect(&addr.ip().to_string(), addr.port(), Duration::from_secs(1), ProtocolTag::Raw)
            .await
            .unwrap();
        assert_eq!(first, second);

        disconnect(second).await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_connects_return_distinct_handles() {
        init().await;
        let addr = spawn_echo_server().await;

        let mut handles = vec![];
        for _ in 0..8 {
            let h = connect(&addr.ip().to_string(), addr.port(), Duration::from_secs(1), ProtocolTag::Raw)
                .await
                .unwrap();
            handles.push(h);
        }

        let mut sorted = handles.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), handles.len());

        for h in handles {
            disconnect(h).await.unwrap();
        }
    }

    #[tokio::test]
    async fn raw_receive_times_out_when_peer_is_silent() {
        init().await;
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            std::mem::forget(stream);
            std::future::pending::<()>().await;
        });

        let handle = connect(&addr.ip().to_string(), addr.port(), Duration::from_secs(1), ProtocolTag::Raw)
            .await
            .unwrap();

        let mut buf = [0u8; 16];
        let result = receive(handle, &mut buf, Duration::from_millis(200)).await;
        assert!(matches!(result, Err(Error::Timeout(_))));

        disconnect(handle).await.unwrap();
    }
}
