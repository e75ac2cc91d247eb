// ────────────────────────────────
// src/server/builder.rs
// ────────────────────────────────
use crate::server::listener::bind_tcp;
use anyhow::Result;
use hyper::{server::conn::Http, Body, Request, Response};
use std::future::Future;
use std::net::SocketAddr;
use tower::Service;

/// Builder pattern so `main.rs` can inject its request handler.
pub struct ServerBuilder<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    addr: SocketAddr,
    handler: Option<H>,
}

impl<H> ServerBuilder<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            handler: None,
        }
    }

    /// Inject the request handler (usually wraps [`crate::server::AppState`]).
    pub fn with_handler(mut self, handler: H) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Bind the TCP socket without accepting yet. Split from [`serve`] so
    /// callers (and tests) can learn the bound address first.
    ///
    /// [`serve`]: BoundServer::serve
    pub async fn bind(self) -> Result<BoundServer<H>> {
        let handler = self.handler.expect("handler must be set via with_handler()");
        let (listener, local_addr) = bind_tcp(self.addr).await?;
        tracing::info!("HTTP server listening on {}", local_addr);
        Ok(BoundServer {
            listener,
            handler,
            local_addr,
        })
    }

    /// Bind and run the accept loop until `shutdown` resolves.
    pub async fn serve(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        self.bind().await?.serve(shutdown).await
    }
}

pub struct BoundServer<H> {
    listener: tokio::net::TcpListener,
    handler: H,
    local_addr: SocketAddr,
}

impl<H> BoundServer<H>
where
    H: Service<Request<Body>, Response = Response<Body>> + Send + Clone + 'static,
    H::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    H::Future: Send + 'static,
{
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections, spawning one Tokio task per connection, until the
    /// shutdown future resolves.
    pub async fn serve(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let BoundServer {
            listener, handler, ..
        } = self;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = accepted?;
                    let svc = handler.clone();

                    tokio::spawn(async move {
                        let http = Http::new();
                        if let Err(err) = http.serve_connection(stream, svc).await {
                            tracing::warn!(%peer, %err, "connection error");
                        }
                    });
                }
                _ = &mut shutdown => {
                    tracing::info!("Shutdown signal received, stopping accept loop");
                    return Ok(());
                }
            }
        }
    }
}
