use tokio::io::{AsyncRead, AsyncWrite};
use wsgate::config::Config;
use wsgate::server;
use wsgate::websocket::{Handler, MessageStream, ServerInfo, WebSocketProtocol};

/// Replies to every text message with the same text.
struct Echo;

impl Handler for Echo {
    async fn handle<S>(
        &self,
        _server: &ServerInfo,
        stream: &mut MessageStream<S>,
    ) -> anyhow::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        while let Some(message) = stream.receive_message().await? {
            stream.send_message(&message).await?;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load()?;
    let protocol = WebSocketProtocol::from_config(&cfg, Echo)?;

    tokio::select! {
        res = server::listener::run(&cfg.listen_addr, protocol) => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
