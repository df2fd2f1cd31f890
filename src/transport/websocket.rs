use super::{Connection, Transport, TransportError};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_with_config, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport built on tokio-tungstenite
///
/// Payloads that are valid UTF-8 go out as text frames, anything else as
/// binary frames. Control frames are handled by tungstenite and never
/// surface as received messages.
#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, address: &str) -> Result<Box<dyn Connection>, TransportError> {
        debug!("Dialing WebSocket server at {}", address);

        let (stream, response) = connect_async_with_config(address, None, true)
            .await
            .map_err(|e| TransportError::Connect {
                address: address.to_string(),
                reason: e.to_string(),
            })?;
        trace!("WebSocket handshake completed with status {}", response.status());

        Ok(Box::new(WebSocketConnection {
            stream,
            closed: false,
        }))
    }

    fn name(&self) -> &'static str {
        "WebSocket"
    }
}

/// One open WebSocket connection
pub struct WebSocketConnection {
    stream: WsStream,
    closed: bool,
}

#[async_trait]
impl Connection for WebSocketConnection {
    async fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }

        let message = match std::str::from_utf8(payload) {
            Ok(text) => Message::Text(text.to_owned()),
            Err(_) => Message::Binary(payload.to_vec()),
        };

        self.stream
            .send(message)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn receive(&mut self) -> Result<Vec<u8>, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }

        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.into_bytes()),
                Some(Ok(Message::Binary(data))) => return Ok(data),
                Some(Ok(Message::Close(frame))) => {
                    debug!("Server closed WebSocket: {:?}", frame);
                    return Err(TransportError::Closed);
                }
                // ping/pong/raw frames
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(TransportError::Receive(e.to_string())),
                None => return Err(TransportError::Closed),
            }
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.stream.close(None).await {
            debug!("WebSocket close reported: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn spawn_echo_server() -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
                    while let Some(Ok(msg)) = ws.next().await {
                        if msg.is_text() || msg.is_binary() {
                            if ws.send(msg).await.is_err() {
                                break;
                            }
                        }
                    }
                });
            }
        });
        addr
    }

    #[tokio::test]
    async fn test_text_and_binary_echo() {
        let addr = spawn_echo_server().await;
        let mut conn = WebSocketTransport::new()
            .connect(&format!("ws://{}/ws", addr))
            .await
            .unwrap();

        conn.send(b"Client: 0 message_id: 0").await.unwrap();
        assert_eq!(conn.receive().await.unwrap(), b"Client: 0 message_id: 0".to_vec());

        let binary = vec![0xff, 0xfe, 0x00];
        conn.send(&binary).await.unwrap();
        assert_eq!(conn.receive().await.unwrap(), binary);

        conn.close().await;
        conn.close().await;
        assert!(matches!(conn.receive().await, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn test_connect_failure_is_reported() {
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let result = WebSocketTransport::new()
            .connect(&format!("ws://{}/ws", addr))
            .await;
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }
}
