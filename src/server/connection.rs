use crate::error::Error;
use crate::proto::{self, Response};
use std::io::ErrorKind;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// A connected client speaking the framed registration protocol.
pub struct Connection {
    stream: TcpStream,
    peer_addr: SocketAddr,
    max_message_size: usize,
    read_buffer: Vec<u8>,
}

impl Connection {
    pub fn new(stream: TcpStream, peer_addr: SocketAddr, max_message_size: usize) -> Self {
        Self {
            stream,
            peer_addr,
            max_message_size,
            read_buffer: Vec::with_capacity(4096),
        }
    }

    #[must_use]
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Read one frame's payload off the wire.
    ///
    /// Returns `Ok(None)` if the peer closed the connection cleanly between
    /// frames.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Framing`] for an empty or oversized declared length
    /// and for a connection cut mid-frame; [`Error::IO`] for other socket
    /// failures.
    pub async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, Error> {
        let mut len_buf = [0u8; proto::LENGTH_PREFIX_LEN];
        match self.stream.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                return Ok(None); // Connection closed between frames.
            }
            Err(e) => return Err(Error::IO(e)),
        }

        let len = u32::from_be_bytes(len_buf) as usize;
        if len == 0 {
            return Err(Error::Framing("empty message".to_string()));
        }
        if len > self.max_message_size {
            return Err(Error::Framing(format!(
                "message too large: {len} > {}",
                self.max_message_size
            )));
        }

        self.read_buffer.clear();
        self.read_buffer.resize(len, 0);
        match self.stream.read_exact(&mut self.read_buffer).await {
            Ok(_) => Ok(Some(self.read_buffer.clone())),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(Error::Framing(format!(
                "connection closed mid-frame, expected {len} payload bytes"
            ))),
            Err(e) => Err(Error::IO(e)),
        }
    }

    /// Frame and write one response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Framing`] if the encoded response exceeds the
    /// configured message size, [`Error::IO`] for socket failures.
    pub async fn send_response(&mut self, response: &Response) -> Result<(), Error> {
        let framed = proto::encode(response)?;
        if framed.len() - proto::LENGTH_PREFIX_LEN > self.max_message_size {
            return Err(Error::Framing(format!(
                "response too large: {} > {}",
                framed.len() - proto::LENGTH_PREFIX_LEN,
                self.max_message_size
            )));
        }
        self.stream.write_all(&framed).await?;
        self.stream.flush().await?;
        Ok(())
    }
}
