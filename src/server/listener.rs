use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::transport::Transport;
use crate::websocket::protocol::{Handler, ServerInfo, WebSocketProtocol};

/// Binds `listen_addr` and serves connections until an accept fails.
pub async fn run<H: Handler>(
    listen_addr: &str,
    protocol: WebSocketProtocol<H>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(listen_addr).await?;
    serve(listener, protocol).await
}

/// Accept loop over an already bound listener.
pub async fn serve<H: Handler>(
    listener: TcpListener,
    protocol: WebSocketProtocol<H>,
) -> anyhow::Result<()> {
    let server = Arc::new(ServerInfo {
        local_addr: listener.local_addr()?,
    });
    let protocol = Arc::new(protocol);
    info!("Listening on {}", server.local_addr);

    loop {
        let (socket, peer) = listener.accept().await?;
        info!("Accepted connection from {}", peer);

        let server = Arc::clone(&server);
        let protocol = Arc::clone(&protocol);
        tokio::spawn(async move {
            let transport = match Transport::from_tcp(socket) {
                Ok(transport) => transport,
                Err(e) => {
                    tracing::error!("Connection setup failed for {}: {}", peer, e);
                    return;
                }
            };

            if let Err(e) = protocol.serve(&server, transport).await {
                tracing::warn!("Connection error from {}: {:#}", peer, e);
            }
        });
    }
}
