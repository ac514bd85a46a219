use crate::error::{GraphError, Result};
use crate::model::Endpoint;
use std::fmt;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

/// Line-buffered duplex channel over one established connection.
pub struct Channel {
    reader: Box<dyn BufRead + Send>,
    writer: Box<dyn Write + Send>,
}

impl Channel {
    pub fn new(reader: impl BufRead + Send + 'static, writer: impl Write + Send + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
        }
    }
}

/// Opens connections for a [`Transport`]. Production code uses
/// [`TcpConnector`]; tests script their own.
pub trait Connector: Send + Sync {
    fn connect(&self, endpoint: &Endpoint, timeout: Duration) -> io::Result<Channel>;
}

/// Blocking TCP with the same timeout on connect, read and write.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    fn connect(&self, endpoint: &Endpoint, timeout: Duration) -> io::Result<Channel> {
        let addrs = (endpoint.host(), endpoint.port()).to_socket_addrs()?;
        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(timeout))?;
                    stream.set_write_timeout(Some(timeout))?;
                    stream.set_nodelay(true)?;
                    let read_half = stream.try_clone()?;
                    return Ok(Channel::new(BufReader::new(read_half), BufWriter::new(stream)));
                }
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("{endpoint} did not resolve to any address"),
            )
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unconnected,
    Connected,
    Closed,
}

enum Link {
    Unconnected,
    Connected(Channel),
    Closed,
}

/// Lazily connected line transport to one endpoint.
///
/// `Closed` is terminal: nothing reconnects a closed transport, a new one has
/// to be created. Callers serialize access (see `RpcClient`).
pub struct Transport {
    endpoint: Endpoint,
    timeout: Duration,
    connector: Arc<dyn Connector>,
    link: Link,
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .field("state", &self.state())
            .finish()
    }
}

impl Transport {
    pub fn new(endpoint: Endpoint, timeout: Duration, connector: Arc<dyn Connector>) -> Self {
        Self {
            endpoint,
            timeout,
            connector,
            link: Link::Unconnected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        match self.link {
            Link::Unconnected => ConnectionState::Unconnected,
            Link::Connected(_) => ConnectionState::Connected,
            Link::Closed => ConnectionState::Closed,
        }
    }

    /// Connect if still unconnected. A failed attempt leaves the transport
    /// unconnected so the next call may retry.
    pub fn ensure_connected(&mut self) -> Result<()> {
        match self.link {
            Link::Connected(_) => Ok(()),
            Link::Closed => Err(GraphError::ConnectionClosed),
            Link::Unconnected => {
                tracing::debug!(endpoint = %self.endpoint, "connecting to graph RPC");
                let channel = self
                    .connector
                    .connect(&self.endpoint, self.timeout)
                    .map_err(GraphError::Connection)?;
                self.link = Link::Connected(channel);
                Ok(())
            }
        }
    }

    /// Write `text` plus a newline and flush.
    pub fn send_line(&mut self, text: &str) -> Result<()> {
        let channel = self.channel()?;
        let written = channel
            .writer
            .write_all(text.as_bytes())
            .and_then(|()| channel.writer.write_all(b"\n"))
            .and_then(|()| channel.writer.flush());
        if let Err(err) = written {
            let err = timed_out(err, "write", self.timeout);
            self.close();
            return Err(GraphError::Connection(err));
        }
        Ok(())
    }

    /// Next line without its terminator, or `None` once the peer has closed
    /// the stream. End of stream closes the transport.
    pub fn read_line(&mut self) -> Result<Option<String>> {
        let channel = self.channel()?;
        let mut line = String::new();
        match channel.reader.read_line(&mut line) {
            Ok(0) => {
                tracing::debug!(endpoint = %self.endpoint, "graph RPC peer closed the stream");
                self.close();
                Ok(None)
            }
            Ok(_) => {
                while line.ends_with(['\n', '\r']) {
                    line.pop();
                }
                Ok(Some(line))
            }
            Err(err) => {
                let err = timed_out(err, "read", self.timeout);
                self.close();
                Err(GraphError::Connection(err))
            }
        }
    }

    /// Drop the channel and mark the transport closed. Idempotent.
    pub fn close(&mut self) {
        if let Link::Connected(mut channel) = std::mem::replace(&mut self.link, Link::Closed) {
            // Teardown never fails; a flush error on a dying socket is moot.
            let _ = channel.writer.flush();
            tracing::debug!(endpoint = %self.endpoint, "graph RPC connection closed");
        }
    }

    fn channel(&mut self) -> Result<&mut Channel> {
        match &mut self.link {
            Link::Connected(channel) => Ok(channel),
            Link::Closed => Err(GraphError::ConnectionClosed),
            Link::Unconnected => Err(GraphError::Connection(io::Error::new(
                io::ErrorKind::NotConnected,
                "graph RPC transport is not connected",
            ))),
        }
    }
}

/// Socket timeouts surface as `WouldBlock` on Unix; report them as timeouts.
fn timed_out(err: io::Error, op: &str, timeout: Duration) -> io::Error {
    match err.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => io::Error::new(
            io::ErrorKind::TimedOut,
            format!("graph RPC {op} timed out after {timeout:?}"),
        ),
        _ => err,
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.close();
    }
}
