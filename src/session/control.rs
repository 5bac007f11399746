//! Module `control`
//!
//! Line-oriented I/O on the control connection. Reads one command line at a
//! time and writes CRLF-terminated response lines, flushing after every
//! line: some handlers depend on a response reaching the client before the
//! data connection is opened, so responses are never batched.

use std::io;
use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

pub struct ControlChannel {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    local_addr: SocketAddr,
    remote_addr: SocketAddr,
}

impl ControlChannel {
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        let local_addr = stream.local_addr()?;
        let remote_addr = stream.peer_addr()?;
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            local_addr,
            remote_addr,
        })
    }

    /// Reads one line into `buf`, clearing it first. Returns the number of
    /// bytes read; 0 means the peer closed the connection.
    pub async fn read_line(&mut self, buf: &mut String) -> io::Result<usize> {
        buf.clear();
        self.reader.read_line(buf).await
    }

    /// Writes `line` followed by CRLF and flushes immediately.
    pub async fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await
    }

    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.writer.shutdown().await
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }
}
