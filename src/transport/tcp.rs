use super::{Connection, Transport, TransportError};
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// Largest frame accepted in either direction
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// TCP transport with length-prefixed framing
///
/// Each message travels as a 4-byte little-endian length followed by the
/// payload. Sockets are opened with `TCP_NODELAY` so small request/response
/// exchanges are not held back by Nagle's algorithm.
#[derive(Debug, Clone, Default)]
pub struct TcpTransport {
    buffer_size: Option<usize>,
}

impl TcpTransport {
    /// Create a new TCP transport using OS default socket buffers
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a TCP transport that sizes socket send/receive buffers
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            buffer_size: Some(buffer_size),
        }
    }

    /// Strip the `tcp://` scheme and any trailing path.
    fn socket_address(address: &str) -> &str {
        let rest = address
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(address);
        rest.split('/').next().unwrap_or(rest)
    }

    fn configure(&self, stream: &TcpStream) -> std::io::Result<()> {
        let socket = socket2::SockRef::from(stream);
        socket.set_nodelay(true)?;
        if let Some(size) = self.buffer_size {
            socket.set_recv_buffer_size(size)?;
            socket.set_send_buffer_size(size)?;
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&self, address: &str) -> Result<Box<dyn Connection>, TransportError> {
        let target = Self::socket_address(address);
        debug!("Connecting TCP transport to {}", target);

        let connect_err = |e: std::io::Error| TransportError::Connect {
            address: address.to_string(),
            reason: e.to_string(),
        };

        let stream = TcpStream::connect(target).await.map_err(connect_err)?;
        self.configure(&stream).map_err(connect_err)?;

        Ok(Box::new(TcpConnection {
            stream: Some(stream),
        }))
    }

    fn name(&self) -> &'static str {
        "TCP"
    }
}

/// One framed TCP connection
pub struct TcpConnection {
    stream: Option<TcpStream>,
}

impl TcpConnection {
    fn stream(&mut self) -> Result<&mut TcpStream, TransportError> {
        self.stream.as_mut().ok_or(TransportError::Closed)
    }
}

#[async_trait]
impl Connection for TcpConnection {
    async fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if payload.len() > MAX_FRAME_SIZE {
            return Err(TransportError::FrameTooLarge(payload.len()));
        }
        let stream = self.stream()?;
        let len = (payload.len() as u32).to_le_bytes();

        let write = async {
            stream.write_all(&len).await?;
            stream.write_all(payload).await?;
            stream.flush().await
        };
        write.await.map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn receive(&mut self) -> Result<Vec<u8>, TransportError> {
        let stream = self.stream()?;

        let mut len_bytes = [0u8; 4];
        match stream.read_exact(&mut len_bytes).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(TransportError::Closed)
            }
            Err(e) => return Err(TransportError::Receive(e.to_string())),
        }

        let len = u32::from_le_bytes(len_bytes) as usize;
        if len > MAX_FRAME_SIZE {
            return Err(TransportError::FrameTooLarge(len));
        }

        let mut payload = vec![0u8; len];
        stream
            .read_exact(&mut payload)
            .await
            .map_err(|e| TransportError::Receive(e.to_string()))?;
        Ok(payload)
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!("TCP shutdown reported: {}", e);
            }
        }
    }
}
