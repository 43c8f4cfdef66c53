//! Framed connection to the verifier.

use std::io;

use lamport_auth::ChainHash;
use lamport_proto::{decode_challenge, read_frame, write_hash, WireError};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

/// A message received from the verifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Challenge(u32),
    /// A frame that did not decode as a challenge.
    Malformed(WireError),
    /// The verifier closed the connection.
    Closed,
}

/// Prover side of the connection.
///
/// Reads and writes happen strictly in turn, so the halves need no locking.
#[derive(Debug)]
pub struct ProverClient {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
}

impl ProverClient {
    pub async fn connect(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self::new(stream))
    }

    pub fn new(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self { reader, writer }
    }

    /// Send a commitment or OTP response.
    pub async fn send_hash(&mut self, hash: &ChainHash) -> io::Result<()> {
        write_hash(&mut self.writer, hash).await
    }

    /// Wait for the next challenge.
    ///
    /// EOF and connection resets both map to [`Inbound::Closed`]; the
    /// verifier closes abruptly after a failed verification.
    pub async fn recv(&mut self) -> io::Result<Inbound> {
        match read_frame(&mut self.reader).await {
            Ok(frame) => Ok(match decode_challenge(&frame) {
                Ok(challenge) => Inbound::Challenge(challenge),
                Err(e) => Inbound::Malformed(e),
            }),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::UnexpectedEof | io::ErrorKind::ConnectionReset
                ) =>
            {
                Ok(Inbound::Closed)
            }
            Err(e) => Err(e),
        }
    }

    /// Close the write side.
    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.writer.shutdown().await
    }
}
