//! Local socket path resolution and cleanup
//!
//! Every remote host maps to exactly one local socket file. The mapping is
//! a pure function of the host string so that a tunnel restarted after a
//! crash finds (and can clean up) the file its predecessor left behind.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

/// Directory holding the mirrored sockets
pub const LOCAL_SOCKET_DIR: &str = "/tmp";

/// Suffix appended to the escaped host name
pub const LOCAL_SOCKET_SUFFIX: &str = ".docker.sock";

/// Resolve the local socket path for `remote_host` under [`LOCAL_SOCKET_DIR`]
pub fn resolve(remote_host: &str) -> PathBuf {
    resolve_in(Path::new(LOCAL_SOCKET_DIR), remote_host)
}

/// Resolve the local socket path for `remote_host` under `dir`
pub fn resolve_in(dir: &Path, remote_host: &str) -> PathBuf {
    dir.join(format!("{}{}", escape_host(remote_host), LOCAL_SOCKET_SUFFIX))
}

/// Escape a host string into a single path component.
///
/// `[A-Za-z0-9._-]` pass through, every other byte becomes `%XX`. Since `%`
/// itself is escaped the mapping stays injective.
fn escape_host(host: &str) -> String {
    let mut out = String::with_capacity(host.len());
    for byte in host.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'_' | b'-') {
            out.push(byte as char);
        } else {
            let _ = write!(out, "%{:02X}", byte);
        }
    }
    out
}

/// Remove a socket file.
///
/// Returns `Ok(true)` if a file was removed and `Ok(false)` if there was
/// nothing to remove.
pub fn remove_socket_file(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// What was found at a socket path before binding it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketProbe {
    /// Nothing at the path
    Absent,
    /// A listener accepted a probe connection
    Live,
    /// A file is present but nobody is listening on it
    Stale,
}

/// Check whether `path` is free, served by a live listener, or left over
/// from a process that died without cleaning up.
///
/// Regular files and directories are reported as `Live` so they are never
/// deleted by mistake; binding will then fail with the OS error.
///
/// Liveness is tested with a real connect that is dropped immediately. If
/// the listener is another tunnel, it accepts that connection and opens a
/// remote channel for it, which ends as soon as this check disconnects.
pub fn probe_socket(path: &Path) -> SocketProbe {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(_) => return SocketProbe::Absent,
    };

    if !metadata.file_type().is_socket() {
        return SocketProbe::Live;
    }

    match UnixStream::connect(path) {
        Ok(_) => SocketProbe::Live,
        Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => SocketProbe::Stale,
        Err(e) if e.kind() == io::ErrorKind::NotFound => SocketProbe::Absent,
        Err(e) => {
            tracing::debug!("Probe of {} failed: {}", path.display(), e);
            SocketProbe::Live
        }
    }
}
