//! FTP store adapter.
//!
//! Connect performs the network handshake plus login and reports
//! distinguishable failures (`Unreachable`, `AuthFailed`, `Timeout`) so the
//! orchestrator can tell "abort the pass" from "skip one owner". Listings
//! always name an explicit remote path; the session never changes the
//! server-side working directory.

use super::{ChildEntry, FileStore, StoreSession};
use crate::error::{ConnectError, ListError};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, UNIX_EPOCH};
use suppaftp::list::File as ListLine;
use suppaftp::{FtpError, FtpStream, Status};
use tracing::{debug, warn};

/// Store adapter over a remote FTP endpoint.
#[derive(Debug, Clone)]
pub struct FtpStore {
    host: String,
    port: u16,
    username: String,
    password: String,
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl FtpStore {
    pub fn new(
        host: &str,
        port: u16,
        username: &str,
        password: &str,
        connect_timeout: Duration,
        io_timeout: Duration,
    ) -> Self {
        Self {
            host: host.to_string(),
            port,
            username: username.to_string(),
            password: password.to_string(),
            connect_timeout,
            io_timeout,
        }
    }

    fn resolve(&self) -> Result<SocketAddr, ConnectError> {
        let mut addrs = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| ConnectError::Unreachable(format!("{}:{}: {e}", self.host, self.port)))?;
        addrs
            .next()
            .ok_or_else(|| ConnectError::Unreachable(format!("{}:{}: no addresses", self.host, self.port)))
    }
}

impl FileStore for FtpStore {
    fn connect(&self) -> Result<Box<dyn StoreSession>, ConnectError> {
        let addr = self.resolve()?;

        let mut stream = FtpStream::connect_timeout(addr, self.connect_timeout).map_err(|e| {
            match e {
                FtpError::ConnectionError(io) if is_timeout(&io) => {
                    ConnectError::Timeout(self.connect_timeout)
                }
                FtpError::ConnectionError(io) => ConnectError::Unreachable(io.to_string()),
                other => ConnectError::Protocol(other.to_string()),
            }
        })?;

        stream
            .login(&self.username, &self.password)
            .map_err(|e| match e {
                FtpError::UnexpectedResponse(resp) => {
                    ConnectError::AuthFailed(format!("{:?}", resp.status))
                }
                FtpError::ConnectionError(io) if is_timeout(&io) => {
                    ConnectError::Timeout(self.connect_timeout)
                }
                FtpError::ConnectionError(io) => ConnectError::Unreachable(io.to_string()),
                other => ConnectError::Protocol(other.to_string()),
            })?;

        apply_io_timeout(stream.get_ref(), self.io_timeout)
            .map_err(|e| ConnectError::Protocol(format!("set socket timeout: {e}")))?;

        debug!(host = %self.host, port = self.port, "FTP session established");
        Ok(Box::new(FtpSession { stream }))
    }
}

fn is_timeout(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
    )
}

fn apply_io_timeout(sock: &TcpStream, timeout: Duration) -> std::io::Result<()> {
    sock.set_read_timeout(Some(timeout))?;
    sock.set_write_timeout(Some(timeout))
}

struct FtpSession {
    stream: FtpStream,
}

impl StoreSession for FtpSession {
    fn list_children(&mut self, path: &str) -> Result<Vec<ChildEntry>, ListError> {
        let lines = self.stream.list(Some(path)).map_err(|e| match e {
            FtpError::UnexpectedResponse(resp) if resp.status == Status::FileUnavailable => {
                ListError::NotFound(path.to_string())
            }
            FtpError::UnexpectedResponse(resp) => ListError::Protocol {
                path: path.to_string(),
                message: format!("status {:?}", resp.status),
            },
            FtpError::ConnectionError(io) => ListError::Io {
                path: path.to_string(),
                source: io,
            },
            other => ListError::Protocol {
                path: path.to_string(),
                message: other.to_string(),
            },
        })?;

        let mut children = Vec::with_capacity(lines.len());
        for line in &lines {
            match ListLine::try_from(line.as_str()) {
                Ok(parsed) => {
                    if parsed.is_symlink() {
                        continue;
                    }
                    let name = parsed.name().to_string();
                    if name == "." || name == ".." {
                        continue;
                    }
                    let modified_at = parsed
                        .modified()
                        .duration_since(UNIX_EPOCH)
                        .ok()
                        .map(|d| d.as_millis() as i64);
                    children.push(ChildEntry {
                        is_directory: parsed.is_directory(),
                        size: Some(parsed.size() as u64),
                        modified_at,
                        name,
                    });
                }
                Err(e) => {
                    // Keep the raw line as the entry name so the traversal
                    // reports it as a per-file issue instead of dropping it
                    // silently.
                    warn!(path = %path, line = %line, error = %e, "unparseable LIST line");
                    children.push(ChildEntry {
                        name: line.clone(),
                        is_directory: false,
                        size: None,
                        modified_at: None,
                    });
                }
            }
        }

        Ok(children)
    }

    fn disconnect(&mut self) {
        if let Err(e) = self.stream.quit() {
            debug!(error = %e, "FTP quit failed");
        }
    }
}
