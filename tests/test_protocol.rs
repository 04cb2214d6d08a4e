mod common;

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::Notify;
use wsgate::Error;
use wsgate::websocket::frame::{Frame, OpCode};
use wsgate::websocket::origin::{AllowedOrigin, OriginPolicy};
use wsgate::websocket::{Handler, MessageStream, ServerInfo, WebSocketProtocol};

use common::{
    FrameReader, UPGRADE_RESPONSE, local_addr, pipe, read_exact, read_to_end, send_client_frame,
    upgrade_request,
};

/// Echoes messages back until the client closes, recording what it saw.
#[derive(Clone, Default)]
struct Recorder {
    seen: Arc<Mutex<Vec<String>>>,
}

impl Handler for Recorder {
    async fn handle<S>(
        &self,
        server: &ServerInfo,
        stream: &mut MessageStream<S>,
    ) -> anyhow::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        assert_eq!(server.local_addr, local_addr());
        while let Some(message) = stream.receive_message().await? {
            self.seen.lock().unwrap().push(message.clone());
            stream.send_message(&message).await?;
        }
        Ok(())
    }
}

/// Fails as soon as the first message arrives.
struct Failing;

impl Handler for Failing {
    async fn handle<S>(
        &self,
        _server: &ServerInfo,
        stream: &mut MessageStream<S>,
    ) -> anyhow::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let message = stream.receive_message().await?;
        anyhow::bail!("handler gave up on {message:?}")
    }
}

/// Signals once it is running, then never returns.
#[derive(Clone, Default)]
struct Stuck {
    started: Arc<Notify>,
}

impl Handler for Stuck {
    async fn handle<S>(
        &self,
        _server: &ServerInfo,
        _stream: &mut MessageStream<S>,
    ) -> anyhow::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        self.started.notify_one();
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// Formatted log output collected in memory.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn lines(&self) -> Vec<String> {
        String::from_utf8(self.0.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn server_info() -> ServerInfo {
    ServerInfo {
        local_addr: local_addr(),
    }
}

fn restricted() -> OriginPolicy {
    OriginPolicy::new(vec![
        AllowedOrigin::Literal("https://example.com".to_string()),
        AllowedOrigin::pattern(r"https://[a-z]+\.example\.org").unwrap(),
    ])
}

fn protocol_error(result: anyhow::Result<()>) -> Error {
    result
        .unwrap_err()
        .downcast::<Error>()
        .expect("expected a protocol error")
}

#[tokio::test]
async fn test_upgrade_and_exchange_messages() {
    let protocol = WebSocketProtocol::new(Recorder::default());
    let (transport, mut client) = pipe();

    let client_side = async {
        client
            .write_all(upgrade_request(Some("https://example.com")).as_bytes())
            .await
            .unwrap();
        assert_eq!(read_exact(&mut client, UPGRADE_RESPONSE.len()).await, UPGRADE_RESPONSE);

        let mut reader = FrameReader::new();
        send_client_frame(&mut client, Frame::text("hello")).await;
        let echo = reader.next(&mut client).await.unwrap();
        assert_eq!(echo.opcode(), OpCode::Text);
        assert_eq!(&echo.payload()[..], b"hello");

        send_client_frame(&mut client, Frame::close(1000, "bye")).await;
        let close = reader.next(&mut client).await.unwrap();
        assert_eq!(close.opcode(), OpCode::Close);
        assert_eq!(&close.payload()[..], b"\x03\xe8bye");
        assert!(reader.next(&mut client).await.is_none());
    };

    let info = server_info();
    let (result, ()) = tokio::join!(protocol.serve(&info, transport), client_side);

    result.unwrap();
    assert_eq!(*protocol.handler().seen.lock().unwrap(), vec!["hello".to_string()]);
}

#[tokio::test]
async fn test_request_bytes_after_headers_reach_the_stream() {
    let protocol = WebSocketProtocol::new(Recorder::default());
    let (transport, mut client) = pipe();

    let client_side = async move {
        let mut bytes = upgrade_request(None).into_bytes();
        bytes.extend(wsgate::websocket::codec::encode(
            &Frame::text("eager").masked(common::CLIENT_MASK),
        ));
        client.write_all(&bytes).await.unwrap();

        assert_eq!(read_exact(&mut client, UPGRADE_RESPONSE.len()).await, UPGRADE_RESPONSE);
        let echo = FrameReader::new().next(&mut client).await.unwrap();
        assert_eq!(&echo.payload()[..], b"eager");
        // Hanging up ends the handler.
    };

    let info = server_info();
    let (result, ()) = tokio::join!(protocol.serve(&info, transport), client_side);

    result.unwrap();
    assert_eq!(*protocol.handler().seen.lock().unwrap(), vec!["eager".to_string()]);
}

#[tokio::test]
async fn test_health_check_with_origin() {
    let protocol = WebSocketProtocol::new(Recorder::default());
    let (transport, mut client) = pipe();
    client
        .write_all(b"GET /ready HTTP/1.1\r\nOrigin: https://example.com\r\n\r\n")
        .await
        .unwrap();

    protocol.serve(&server_info(), transport).await.unwrap();

    assert_eq!(
        read_to_end(&mut client).await,
        b"HTTP/1.1 204 No Content\r\n\
Access-Control-Allow-Origin: https://example.com\r\n\
Vary: Origin\r\n\r\n"
            .to_vec()
    );
    assert!(protocol.handler().seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_health_check_without_origin() {
    let protocol = WebSocketProtocol::new(Recorder::default());
    let (transport, mut client) = pipe();
    client.write_all(b"GET /READY HTTP/1.1\r\n\r\n").await.unwrap();

    protocol.serve(&server_info(), transport).await.unwrap();

    assert_eq!(
        read_to_end(&mut client).await,
        b"HTTP/1.1 204 No Content\r\nVary: Origin\r\n\r\n".to_vec()
    );
}

#[tokio::test]
async fn test_custom_health_path() {
    let protocol = WebSocketProtocol::new(Recorder::default()).with_health_path("/Healthz");
    let (transport, mut client) = pipe();
    client.write_all(b"GET /healthz HTTP/1.1\r\n\r\n").await.unwrap();

    protocol.serve(&server_info(), transport).await.unwrap();

    assert!(read_to_end(&mut client).await.starts_with(b"HTTP/1.1 204 No Content\r\n"));
}

#[tokio::test]
async fn test_disallowed_origin_drops_connection() {
    let protocol = WebSocketProtocol::new(Recorder::default()).with_origins(restricted());
    let (transport, mut client) = pipe();
    client
        .write_all(upgrade_request(Some("https://evil.com")).as_bytes())
        .await
        .unwrap();

    let err = protocol_error(protocol.serve(&server_info(), transport).await);

    assert!(matches!(err, Error::OriginNotAllowed(ref origin) if origin == "https://evil.com"));
    assert!(read_to_end(&mut client).await.is_empty());
}

#[tokio::test]
async fn test_disallowed_origin_blocks_health_check() {
    let protocol = WebSocketProtocol::new(Recorder::default()).with_origins(restricted());
    let (transport, mut client) = pipe();
    client
        .write_all(b"GET /ready HTTP/1.1\r\nOrigin: https://evil.com\r\n\r\n")
        .await
        .unwrap();

    let err = protocol_error(protocol.serve(&server_info(), transport).await);

    assert!(matches!(err, Error::OriginNotAllowed(_)));
    assert!(read_to_end(&mut client).await.is_empty());
}

#[tokio::test]
async fn test_allowed_origins_upgrade() {
    for origin in [None, Some("https://example.com"), Some("https://chat.example.org")] {
        let protocol = WebSocketProtocol::new(Recorder::default()).with_origins(restricted());
        let (transport, mut client) = pipe();

        let client_side = async move {
            client
                .write_all(upgrade_request(origin).as_bytes())
                .await
                .unwrap();
            assert_eq!(read_exact(&mut client, UPGRADE_RESPONSE.len()).await, UPGRADE_RESPONSE);
        };

        let info = server_info();
        let (result, ()) = tokio::join!(protocol.serve(&info, transport), client_side);

        result.unwrap_or_else(|e| panic!("{origin:?}: {e}"));
    }
}

#[tokio::test]
async fn test_unsupported_version_drops_connection() {
    let protocol = WebSocketProtocol::new(Recorder::default());
    let (transport, mut client) = pipe();
    client
        .write_all(
            b"GET /chat HTTP/1.1\r\n\
Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
Sec-WebSocket-Version: 12\r\n\r\n",
        )
        .await
        .unwrap();

    let err = protocol_error(protocol.serve(&server_info(), transport).await);

    assert!(matches!(err, Error::UnsupportedVersion));
    assert!(read_to_end(&mut client).await.is_empty());
}

#[tokio::test]
async fn test_missing_key_drops_connection() {
    let protocol = WebSocketProtocol::new(Recorder::default());
    let (transport, mut client) = pipe();
    client
        .write_all(b"GET /chat HTTP/1.1\r\nSec-WebSocket-Version: 13\r\n\r\n")
        .await
        .unwrap();

    let err = protocol_error(protocol.serve(&server_info(), transport).await);

    assert!(matches!(err, Error::MissingKey));
    assert!(read_to_end(&mut client).await.is_empty());
}

#[tokio::test]
async fn test_handshake_timeout() {
    let protocol = WebSocketProtocol::new(Recorder::default())
        .with_handshake_timeout(Duration::from_millis(50));
    let (transport, mut client) = pipe();
    client.write_all(b"GET /chat HTTP/1.1\r\n").await.unwrap();

    let err = protocol_error(protocol.serve(&server_info(), transport).await);

    assert!(matches!(err, Error::HandshakeTimeout));
    assert!(read_to_end(&mut client).await.is_empty());
}

#[tokio::test]
async fn test_oversized_request_drops_connection() {
    let protocol = WebSocketProtocol::new(Recorder::default());
    let (transport, mut client) = pipe();
    let mut head = b"GET /chat HTTP/1.1\r\n".to_vec();
    head.extend(std::iter::repeat_n(b'a', 5000));
    client.write_all(&head).await.unwrap();

    let err = protocol_error(protocol.serve(&server_info(), transport).await);

    assert!(matches!(err, Error::RequestTooLarge));
}

#[tokio::test]
async fn test_handler_error_still_closes_stream() {
    let protocol = WebSocketProtocol::new(Failing);
    let (transport, mut client) = pipe();

    let client_side = async {
        client.write_all(upgrade_request(None).as_bytes()).await.unwrap();
        read_exact(&mut client, UPGRADE_RESPONSE.len()).await;
        send_client_frame(&mut client, Frame::text("boom")).await;

        let mut reader = FrameReader::new();
        let close = reader.next(&mut client).await.unwrap();
        assert_eq!(close.opcode(), OpCode::Close);
        assert_eq!(&close.payload()[..], b"\x03\xe8");
        assert!(reader.next(&mut client).await.is_none());
    };

    let info = server_info();
    let (result, ()) = tokio::join!(protocol.serve(&info, transport), client_side);

    let err = result.unwrap_err();
    assert!(err.to_string().contains("handler gave up"));
    assert!(err.downcast_ref::<Error>().is_none());
}

#[tokio::test]
async fn test_protocol_violation_in_handler_closes_stream() {
    let protocol = WebSocketProtocol::new(Recorder::default());
    let (transport, mut client) = pipe();

    let client_side = async {
        client.write_all(upgrade_request(None).as_bytes()).await.unwrap();
        read_exact(&mut client, UPGRADE_RESPONSE.len()).await;
        send_client_frame(
            &mut client,
            Frame::new(true, OpCode::Binary, None, vec![1u8, 2, 3]),
        )
        .await;

        let close = FrameReader::new().next(&mut client).await.unwrap();
        assert_eq!(close.opcode(), OpCode::Close);
    };

    let info = server_info();
    let (result, ()) = tokio::join!(protocol.serve(&info, transport), client_side);

    assert!(matches!(protocol_error(result), Error::BinaryNotSupported));
}

#[tokio::test]
async fn test_aborted_task_logs_disconnect_and_releases_stream() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    // The test runtime is single-threaded, so the spawned task logs here too.
    let _guard = tracing::subscriber::set_default(subscriber);

    let handler = Stuck::default();
    let started = Arc::clone(&handler.started);
    let protocol = Arc::new(WebSocketProtocol::new(handler));
    let (transport, mut client) = pipe();

    let task = tokio::spawn({
        let protocol = Arc::clone(&protocol);
        async move { protocol.serve(&server_info(), transport).await }
    });

    client
        .write_all(upgrade_request(Some("https://example.com")).as_bytes())
        .await
        .unwrap();
    assert_eq!(read_exact(&mut client, UPGRADE_RESPONSE.len()).await, UPGRADE_RESPONSE);
    started.notified().await;

    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());

    assert!(read_to_end(&mut client).await.is_empty());

    let lines = logs.lines();
    let connected = lines
        .iter()
        .position(|l| l.contains("WebSocket connected"))
        .expect("connect event logged");
    let disconnected = lines
        .iter()
        .position(|l| l.contains("WebSocket disconnected"))
        .expect("disconnect event logged");
    assert!(connected < disconnected);
    assert!(lines[disconnected].contains("peer=127.0.0.1:50000"));
    assert!(lines[disconnected].contains("https://example.com"));
}
