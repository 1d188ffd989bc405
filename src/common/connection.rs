//! # TCP Connection Abstraction
//!
//! Wraps a byte stream with message framing and the wire codec.
//!
//! ## Wire Protocol
//!
//! Two framings are supported (see [`Framing`]):
//!
//! ```text
//! framed:  [4 bytes: payload length, big-endian] [N bytes: XOR-encoded text]
//! legacy:  [N bytes: XOR-encoded text]            (one read = one message)
//! ```
//!
//! The legacy framing matches peers that write a whole command per `send` and
//! expect the other side to pick it up in a single `recv`. It breaks as soon as
//! TCP splits or coalesces segments, so it is only offered for compatibility.

use anyhow::Result;
use log::error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use super::codec::XorCodec;
use super::config::Framing;

/// Largest payload accepted in framed mode.
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Receive buffer used by the legacy framing. One byte short of the peer's
/// 4096-byte buffer, which reserved the last slot for a terminator.
pub const LEGACY_BUFFER_SIZE: usize = 4095;

/// Errors raised by the framing layer.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// A frame header announced more than [`MAX_FRAME_SIZE`] bytes.
    #[error("frame too large: {size} bytes (max: {max} bytes)")]
    FrameTooLarge {
        /// Announced payload length.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// The codec key was empty.
    #[error("wire key must not be empty")]
    EmptyKey,
}

/// Stream wrapper that reads and writes whole text messages.
///
/// Generic over the stream so a [`TcpStream`] can be split into independently
/// owned read and write halves (see [`Connection::into_split`]).
pub struct Connection<S = TcpStream> {
    stream: S,
    codec: XorCodec,
    framing: Framing,
}

impl<S> Connection<S> {
    /// Wrap an established stream.
    ///
    /// # Example
    /// ```ignore
    /// let stream = TcpStream::connect("127.0.0.1:8080").await?;
    /// let mut conn = Connection::new(stream, XorCodec::default(), Framing::Framed);
    /// ```
    pub fn new(stream: S, codec: XorCodec, framing: Framing) -> Self {
        Self {
            stream,
            codec,
            framing,
        }
    }
}

impl Connection<TcpStream> {
    /// Split into a reader and a writer that can live on different tasks.
    pub fn into_split(self) -> (Connection<OwnedReadHalf>, Connection<OwnedWriteHalf>) {
        let (read_half, write_half) = self.stream.into_split();
        (
            Connection::new(read_half, self.codec.clone(), self.framing),
            Connection::new(write_half, self.codec, self.framing),
        )
    }
}

impl<S: AsyncRead + Unpin> Connection<S> {
    /// Read and decode one message.
    ///
    /// # Returns
    /// - `Ok(Some(text))`: a complete message
    /// - `Ok(None)`: the peer closed the connection
    /// - `Err`: I/O error or an oversized frame
    ///
    /// Bytes that do not decode to valid UTF-8 are replaced with U+FFFD; the
    /// command parser then treats the message as unknown.
    pub async fn read_message(&mut self) -> Result<Option<String>> {
        let mut payload = match self.framing {
            Framing::Framed => {
                let mut length_buf = [0u8; 4];
                match self.stream.read_exact(&mut length_buf).await {
                    Ok(_) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
                    Err(e) => return Err(e.into()),
                }

                let length = u32::from_be_bytes(length_buf) as usize;
                if length > MAX_FRAME_SIZE {
                    error!(
                        "❌ Frame too large: {} bytes (max: {} bytes)",
                        length, MAX_FRAME_SIZE
                    );
                    return Err(WireError::FrameTooLarge {
                        size: length,
                        max: MAX_FRAME_SIZE,
                    }
                    .into());
                }

                let mut data = vec![0u8; length];
                match self.stream.read_exact(&mut data).await {
                    Ok(_) => data,
                    // Header arrived but the body never did
                    Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
                    Err(e) => return Err(e.into()),
                }
            }
            Framing::Legacy => {
                let mut data = vec![0u8; LEGACY_BUFFER_SIZE];
                let read = self.stream.read(&mut data).await?;
                if read == 0 {
                    return Ok(None);
                }
                data.truncate(read);
                data
            }
        };

        self.codec.apply_in_place(&mut payload);
        Ok(Some(String::from_utf8_lossy(&payload).into_owned()))
    }
}

impl<S: AsyncWrite + Unpin> Connection<S> {
    /// Encode and send one message, flushing the stream.
    pub async fn write_message(&mut self, text: &str) -> Result<()> {
        let data = self.codec.transform(text.as_bytes());

        match self.framing {
            Framing::Framed => {
                if data.len() > MAX_FRAME_SIZE {
                    return Err(WireError::FrameTooLarge {
                        size: data.len(),
                        max: MAX_FRAME_SIZE,
                    }
                    .into());
                }
                let length = data.len() as u32;
                self.stream.write_all(&length.to_be_bytes()).await?;
                self.stream.write_all(&data).await?;
            }
            Framing::Legacy => {
                self.stream.write_all(&data).await?;
            }
        }
        self.stream.flush().await?;

        Ok(())
    }

    /// Shut down the write direction so the peer observes end of stream.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}
