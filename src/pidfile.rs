//! Pid record: `<socket><suffix>` holding the detached child's pid as decimal
//! text, no trailing newline, owner-only permissions.

use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use crate::error::ProxyError;

/// Writes `pid` to `path`, replacing any previous record.
pub fn write(path: &Path, pid: u32) -> Result<(), ProxyError> {
    let err = |source| ProxyError::PidFile {
        path: path.to_path_buf(),
        source,
    };
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .map_err(err)?;
    file.write_all(pid.to_string().as_bytes()).map_err(err)
}

/// Reads a pid record back.
pub fn read(path: &Path) -> std::io::Result<u32> {
    std::fs::read_to_string(path)?
        .trim()
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}
