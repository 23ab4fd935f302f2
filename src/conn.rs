//! Async connection driver (requires the `tokio` feature).
//!
//! [`Connection`] owns the socket, the line framer, the session, and the
//! dispatcher, and drives them in a single read loop: flush whatever the
//! session queued, read a chunk, frame it into lines, dispatch each one.
//! All protocol logic stays in the sans-IO core; this module only moves
//! bytes.

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::TlsConnector;
use tracing::{trace, warn};

use crate::dispatch::Dispatcher;
use crate::error::Error;
use crate::framer::LineFramer;
use crate::session::{Session, SessionConfig};

const READ_CHUNK: usize = 4096;

enum Stream {
    Tcp(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl Stream {
    async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Stream::Tcp(s) => s.read(buf).await,
            Stream::Tls(s) => s.read(buf).await,
        }
    }

    async fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        match self {
            Stream::Tcp(s) => s.write_all(buf).await,
            Stream::Tls(s) => s.write_all(buf).await,
        }
    }
}

/// One live connection: socket plus the protocol engine driving it.
pub struct Connection {
    stream: Stream,
    framer: LineFramer,
    session: Session,
    dispatcher: Dispatcher,
}

impl Connection {
    /// Connect over plain TCP and start the handshake.
    pub async fn connect(host: &str, port: u16, config: SessionConfig) -> Result<Self> {
        let stream = TcpStream::connect((host, port))
            .await
            .with_context(|| format!("connecting to {}:{}", host, port))?;
        enable_keepalive(&stream);
        Ok(Self::from_parts(Stream::Tcp(stream), config))
    }

    /// Connect over TLS and start the handshake.
    pub async fn connect_tls(
        host: &str,
        port: u16,
        config: SessionConfig,
        connector: TlsConnector,
    ) -> Result<Self> {
        let stream = TcpStream::connect((host, port))
            .await
            .with_context(|| format!("connecting to {}:{}", host, port))?;
        enable_keepalive(&stream);

        let server_name =
            ServerName::try_from(host.to_string()).context("invalid TLS server name")?;
        let stream = connector
            .connect(server_name, stream)
            .await
            .context("TLS handshake failed")?;
        Ok(Self::from_parts(Stream::Tls(Box::new(stream)), config))
    }

    fn from_parts(stream: Stream, config: SessionConfig) -> Self {
        let framer = LineFramer::new(&config.encoding).unwrap_or_else(LineFramer::utf8);
        Connection {
            stream,
            framer,
            session: Session::new(config),
            dispatcher: Dispatcher::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher {
        &mut self.dispatcher
    }

    /// Drive the connection until the server closes it or a fatal error
    /// occurs. Returns `Ok(())` only on a clean local teardown.
    pub async fn run(&mut self) -> Result<(), Error> {
        let mut buf = [0u8; READ_CHUNK];

        loop {
            self.flush().await?;
            if self.session.is_terminated() {
                return Ok(());
            }

            let n = self.stream.read(&mut buf).await?;
            if n == 0 {
                self.session.teardown();
                return Err(Error::Eof);
            }

            let lines = match self.framer.feed(&buf[..n]) {
                Ok(lines) => lines,
                Err(err) => {
                    self.session.teardown();
                    return Err(err);
                }
            };

            for line in lines {
                let raw = match line {
                    Ok(raw) => raw,
                    Err(err) => {
                        // bad byte sequence in one line; the stream survives
                        warn!("dropping undecodable line: {}", err);
                        continue;
                    }
                };
                if raw.is_empty() {
                    continue;
                }
                trace!("<<< {}", raw);

                if let Err(err) = self.dispatcher.dispatch_raw(&mut self.session, &raw) {
                    if err.is_fatal() {
                        self.session.teardown();
                        return Err(err);
                    }
                    warn!("dropping malformed line: {}", err);
                }
            }
        }
    }

    /// Write out everything the session has queued.
    pub async fn flush(&mut self) -> Result<(), Error> {
        for line in self.session.take_outbound() {
            trace!(">>> {}", line);
            let bytes = self.framer.encode_line(&line);
            self.stream.write_all(&bytes).await?;
        }
        Ok(())
    }
}

fn enable_keepalive(stream: &TcpStream) {
    use socket2::{SockRef, TcpKeepalive};
    use std::time::Duration;

    let sock = SockRef::from(stream);
    let keepalive = TcpKeepalive::new()
        .with_time(Duration::from_secs(120))
        .with_interval(Duration::from_secs(30));
    if let Err(e) = sock.set_tcp_keepalive(&keepalive) {
        warn!("failed to enable TCP keepalive: {}", e);
    }
}
