use std::{
    fs::{self, File},
    io::{BufWriter, Read, Write},
    net::{SocketAddr, ToSocketAddrs},
    path::{Path, PathBuf},
    time::Duration,
};

use suppaftp::{list, types::FileType, FtpError, FtpStream};

use gwasget::{FetchError, FetchResult};

use crate::fetcher::FetchObserver;

const READ_BUF_SIZE: usize = 8192;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    Dir,
    File,
}

/// one entry of a remote directory listing
#[derive(Debug, Clone)]
pub struct RemoteEntry {
    pub name: String,
    pub kind: EntryKind,
    pub size: u64,
}

impl RemoteEntry {
    /// parse a raw LIST line; `.`/`..`, symlinks and unparsable lines yield None
    pub fn parse(line: &str) -> Option<RemoteEntry> {
        let file = list::File::try_from(line).ok()?;
        if file.name() == "." || file.name() == ".." {
            return None;
        }

        let kind = if file.is_directory() {
            EntryKind::Dir
        } else if file.is_file() {
            EntryKind::File
        } else {
            // symlinks are neither descended nor downloaded
            return None;
        };

        Some(RemoteEntry {
            name: file.name().to_string(),
            kind,
            size: file.size() as u64,
        })
    }
}

pub fn resolve_addr(addr: &str) -> FetchResult<SocketAddr> {
    let host = addr.to_string();
    let mut sock_addrs = addr.to_socket_addrs().map_err(|e| FetchError::Connection {
        host: host.clone(),
        reason: e.to_string(),
    })?;

    let first = sock_addrs.next().ok_or_else(|| FetchError::Connection {
        host: host.clone(),
        reason: "host resolved to no addresses".to_string(),
    })?;

    // try to use ipv4 address if available
    Ok(sock_addrs.find(|ip| ip.is_ipv4()).unwrap_or(first))
}

/// blocking anonymous FTP session, one per accession
pub struct FtpSession {
    stream: FtpStream,
}

impl FtpSession {
    pub fn connect(host: &str, timeout: Duration) -> FetchResult<FtpSession> {
        let addr = resolve_addr(host)?;
        let mut stream =
            FtpStream::connect_timeout(addr, timeout).map_err(|e| FetchError::Connection {
                host: host.to_string(),
                reason: e.to_string(),
            })?;

        stream
            .login("anonymous", "anonymous")
            .and_then(|_| stream.transfer_type(FileType::Binary))
            .map_err(|e| FetchError::Connection {
                host: host.to_string(),
                reason: e.to_string(),
            })?;

        Ok(FtpSession { stream })
    }

    pub fn list(&mut self, path: &str) -> FetchResult<Vec<RemoteEntry>> {
        let lines = self
            .stream
            .list(Some(path))
            .map_err(|e| classify(e, path))?;

        Ok(lines.iter().filter_map(|l| RemoteEntry::parse(l)).collect())
    }

    /// stream a remote file into `dest`, overwriting it if present; bytes are
    /// staged in a `.part` file so a failed transfer never leaves a truncated
    /// `dest` behind
    pub fn download(
        &mut self,
        remote: &str,
        dest: &Path,
        ob: &mut dyn FetchObserver,
    ) -> FetchResult<u64> {
        let mut reader = self
            .stream
            .retr_as_stream(remote)
            .map_err(|e| classify(e, remote))?;

        let part = part_path(dest);
        match copy_to_file(&mut reader, remote, &part, ob) {
            Ok(total) => {
                let persisted = self
                    .stream
                    .finalize_retr_stream(reader)
                    .map_err(|e| classify(e, remote))
                    .and_then(|_| {
                        fs::rename(&part, dest).map_err(|e| FetchError::local_io(dest, e))
                    });
                if let Err(err) = persisted {
                    let _ = fs::remove_file(&part);
                    return Err(err);
                }

                Ok(total)
            }
            Err(err) => {
                // the RETR reply must still be consumed, or the next command
                // on this session reads it as its own response
                drain(&mut reader);
                let _ = self.stream.finalize_retr_stream(reader);
                let _ = fs::remove_file(&part);
                Err(err)
            }
        }
    }

    /// best-effort QUIT; the socket closes on drop either way
    pub fn close(mut self) {
        let _ = self.stream.quit();
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut path = dest.as_os_str().to_os_string();
    path.push(".part");
    PathBuf::from(path)
}

fn drain(reader: &mut impl Read) {
    let mut sink = [0u8; READ_BUF_SIZE];
    while matches!(reader.read(&mut sink), Ok(n) if n > 0) {}
}

fn copy_to_file(
    reader: &mut impl Read,
    remote: &str,
    part: &Path,
    ob: &mut dyn FetchObserver,
) -> FetchResult<u64> {
    let file = File::create(part).map_err(|e| FetchError::local_io(part, e))?;
    let mut writer = BufWriter::new(file);
    let mut buf = [0u8; READ_BUF_SIZE];
    let mut total = 0u64;

    loop {
        let n = reader.read(&mut buf).map_err(|e| FetchError::Transient {
            path: remote.to_string(),
            reason: e.to_string(),
        })?;
        if n == 0 {
            break;
        }

        writer
            .write_all(&buf[..n])
            .map_err(|e| FetchError::local_io(part, e))?;
        total += n as u64;
        ob.on_progress(total);
    }

    writer.flush().map_err(|e| FetchError::local_io(part, e))?;
    Ok(total)
}

fn classify(err: FtpError, path: &str) -> FetchError {
    match &err {
        // dropped control/data connection, worth another attempt
        FtpError::ConnectionError(_) => FetchError::Transient {
            path: path.to_string(),
            reason: err.to_string(),
        },
        FtpError::UnexpectedResponse(resp) => {
            classify_reply(resp.status.code(), err.to_string(), path)
        }
        _ => FetchError::Permanent {
            path: path.to_string(),
            reason: err.to_string(),
        },
    }
}

/// RFC 959 reply semantics: 4yz transient negative, 5yz permanent negative
fn classify_reply(code: u32, reason: String, path: &str) -> FetchError {
    match code {
        550 => FetchError::NotFound {
            path: path.to_string(),
        },
        400..=499 => FetchError::Transient {
            path: path.to_string(),
            reason,
        },
        _ => FetchError::Permanent {
            path: path.to_string(),
            reason,
        },
    }
}
