// ────────────────────────────────
// src/server/listener.rs
// Encapsulates low-level TCP bind/accept so we can swap TLS later.
// ────────────────────────────────
use anyhow::Result;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Bind the listener and report the address actually bound, which differs
/// from the requested one when port 0 asks the OS for an ephemeral port.
pub async fn bind_tcp(addr: SocketAddr) -> Result<(TcpListener, SocketAddr)> {
    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;
    Ok((listener, local_addr))
}
