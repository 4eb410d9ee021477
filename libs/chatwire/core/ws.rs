use crate::traits::*;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport over tokio-tungstenite
///
/// Accepts `ws://` and `wss://` addresses.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsTransport;

#[async_trait]
impl Transport for WsTransport {
    async fn open(&self, address: &str) -> Result<Box<dyn TransportSession>> {
        let (stream, response) = connect_async(address)
            .await
            .map_err(|e| ChatWireError::WebSocket(e.to_string()))?;

        debug!("WebSocket handshake with {} complete ({})", address, response.status());
        Ok(Box::new(WsSession { stream }))
    }
}

/// One open WebSocket connection
pub struct WsSession {
    stream: WsStream,
}

#[async_trait]
impl TransportSession for WsSession {
    async fn send(&mut self, text: String) -> Result<()> {
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| ChatWireError::WebSocket(e.to_string()))
    }

    async fn recv(&mut self) -> Result<Inbound> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Inbound::Frame(text)),
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| format!("closed by server ({}): {}", f.code, f.reason))
                        .unwrap_or_else(|| "closed by server".to_string());
                    return Ok(Inbound::Closed(reason));
                }
                Some(Ok(Message::Binary(data))) => {
                    debug!("Ignoring {}-byte binary frame", data.len());
                }
                // tungstenite answers pings itself
                Some(Ok(other)) => trace!("Ignoring control frame: {:?}", other),
                Some(Err(e)) => return Err(ChatWireError::WebSocket(e.to_string())),
                None => return Ok(Inbound::Closed("stream ended".to_string())),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self.stream.close(None).await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(ChatWireError::WebSocket(e.to_string())),
        }
    }
}
