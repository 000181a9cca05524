//! Device link transport for BlobDB commands
//!
//! The [`BlobTransport`] trait is the single suspension point that talks to
//! the device: one encoded command in, one raw response payload out, with no
//! pipelining at this layer. [`TcpDevLink`] implements it over the TCP
//! developer connection (emulator or dev-port), framing each payload with the
//! big-endian length + endpoint header the device protocol uses. Real-device
//! transports plug in behind the same trait.

use crate::types::{BlobDbError, Result};
use log::{debug, trace};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::Mutex;

/// Endpoint id of the BlobDB service in the device protocol
pub const BLOBDB_ENDPOINT: u16 = 0xB1DB;

/// Default time to wait for the device's response to one command
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Frames larger than this are treated as a corrupted link
const MAX_FRAME_LEN: usize = 8192;

/// One request/response exchange with the device
///
/// Implementations must pair exactly one response to each call. Correlation
/// across concurrent logical operations happens via the command token; the
/// transport itself treats each call as a synchronous exchange.
#[async_trait::async_trait]
pub trait BlobTransport: Send + Sync {
    /// Send an encoded BlobDB command and return the raw response payload
    async fn send(&self, payload: &[u8]) -> Result<Vec<u8>>;
}

/// Encode a device protocol frame: length and endpoint, both big-endian
pub fn encode_frame(endpoint: u16, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    frame.extend_from_slice(&endpoint.to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// TCP developer-connection transport
///
/// Exchanges are serialized through a single lock so concurrent logical
/// operations never interleave partial writes on the shared link.
pub struct TcpDevLink {
    stream: Mutex<TcpStream>,
    response_timeout: Duration,
}

impl TcpDevLink {
    /// Connect to a device's developer port
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| BlobDbError::LinkFailure(format!("connect: {}", e)))?;

        Ok(Self {
            stream: Mutex::new(stream),
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        })
    }

    /// Override the per-command response timeout
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Read frames until one arrives on the BlobDB endpoint
    ///
    /// The developer connection multiplexes every endpoint over one socket;
    /// frames for other services are logged and skipped.
    async fn read_blobdb_frame(stream: &mut TcpStream) -> Result<Vec<u8>> {
        loop {
            let mut header = [0u8; 4];
            stream
                .read_exact(&mut header)
                .await
                .map_err(|e| BlobDbError::LinkFailure(format!("read header: {}", e)))?;

            let length = u16::from_be_bytes([header[0], header[1]]) as usize;
            let endpoint = u16::from_be_bytes([header[2], header[3]]);

            if length > MAX_FRAME_LEN {
                return Err(BlobDbError::LinkFailure(format!(
                    "frame length {} exceeds limit",
                    length
                )));
            }

            let mut payload = vec![0u8; length];
            stream
                .read_exact(&mut payload)
                .await
                .map_err(|e| BlobDbError::LinkFailure(format!("read payload: {}", e)))?;

            if endpoint == BLOBDB_ENDPOINT {
                return Ok(payload);
            }

            trace!(
                "Skipping frame for endpoint 0x{:04X} ({} bytes)",
                endpoint,
                length
            );
        }
    }
}

#[async_trait::async_trait]
impl BlobTransport for TcpDevLink {
    async fn send(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let mut stream = self.stream.lock().await;

        let frame = encode_frame(BLOBDB_ENDPOINT, payload);
        stream
            .write_all(&frame)
            .await
            .map_err(|e| BlobDbError::LinkFailure(format!("write: {}", e)))?;

        debug!("Sent BlobDB command ({} bytes)", payload.len());

        match tokio::time::timeout(self.response_timeout, Self::read_blobdb_frame(&mut stream))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(BlobDbError::ResponseTimeout),
        }
    }
}
