//! tokio-tungstenite implementation of [`Connector`].
//!
//! Performs the (TLS) handshake with the configured headers and maps
//! tungstenite messages onto [`SocketEvent`]s. Reconnect, heartbeat, and
//! subscription handling live in the supervisor, not here.

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::http::Request;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;

use super::transport::{CLOSE_ABNORMAL, Connector, Endpoint, Frame, FrameSink, Socket, SocketEvent};
use crate::error::{GatewayError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens real WebSocket connections.
#[derive(Debug, Clone, Default)]
pub struct TungsteniteConnector;

impl TungsteniteConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Socket> {
        let stream = connect_ws(endpoint).await?;
        let (write, read) = stream.split();

        let stream = read
            .filter_map(|msg| async move {
                match msg {
                    Ok(Message::Text(text)) => Some(SocketEvent::Text(text.as_str().to_owned())),
                    Ok(Message::Binary(data)) => Some(SocketEvent::Binary(data.to_vec())),
                    Ok(Message::Pong(_)) => Some(SocketEvent::Pong),
                    Ok(Message::Close(frame)) => Some(match frame {
                        Some(f) => SocketEvent::Closed { code: u16::from(f.code), reason: f.reason.as_str().to_owned() },
                        None => SocketEvent::Closed { code: CLOSE_ABNORMAL, reason: String::new() },
                    }),
                    // tungstenite queues the pong reply itself.
                    Ok(Message::Ping(_)) | Ok(Message::Frame(_)) => None,
                    Err(e) => Some(SocketEvent::Error(e.to_string())),
                }
            })
            .boxed();

        Ok(Socket { sink: Box::new(TungsteniteSink { write }), stream })
    }
}

struct TungsteniteSink {
    write: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameSink for TungsteniteSink {
    async fn send(&mut self, frame: Frame) -> Result<()> {
        let msg = match frame {
            Frame::Text(t) => Message::Text(t.into()),
            Frame::Ping => Message::Ping(Vec::new().into()),
        };
        self.write.send(msg).await.map_err(|e| GatewayError::Transport(e.to_string()))
    }

    async fn close(&mut self, code: u16) -> Result<()> {
        let frame = CloseFrame { code: CloseCode::from(code), reason: String::new().into() };
        let res = self.write.send(Message::Close(Some(frame))).await;
        if let Err(e) = &res {
            debug!("close frame not delivered: {e}");
        }
        res.map_err(|e| GatewayError::Transport(e.to_string()))
    }
}

/// Establish a (TLS) WebSocket connection with the endpoint's headers.
async fn connect_ws(endpoint: &Endpoint) -> Result<WsStream> {
    use tokio_tungstenite::tungstenite::handshake::client::generate_key;

    let host = extract_host(&endpoint.url)?;
    let mut request = Request::builder()
        .uri(&endpoint.url)
        .header("Host", host)
        .header("Connection", "Upgrade")
        .header("Upgrade", "websocket")
        .header("Sec-WebSocket-Version", "13")
        .header("Sec-WebSocket-Key", generate_key());

    for (key, value) in &endpoint.headers {
        request = request.header(key.as_str(), value.as_str());
    }

    let request = request.body(()).map_err(|e| GatewayError::Transport(format!("bad handshake request: {e}")))?;

    let (stream, _response) =
        tokio_tungstenite::connect_async(request).await.map_err(|e| GatewayError::Transport(e.to_string()))?;
    Ok(stream)
}

/// Extract the host (with explicit port, if any) from a URL string.
fn extract_host(raw: &str) -> Result<String> {
    let url = url::Url::parse(raw).map_err(|e| GatewayError::Transport(format!("invalid url '{raw}': {e}")))?;
    let host = url.host_str().ok_or_else(|| GatewayError::Transport(format!("url '{raw}' has no host")))?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}
