//! Worker output capture
//!
//! Each worker process points its own stdout and stderr at a file named after
//! its pid. Redirection happens at the file-descriptor level, so output from
//! the test command's child processes lands in the same file.

use crate::Result;
use anyhow::Context;
use std::fs::OpenOptions;
use std::io::Write;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

/// File name prefix for capture files
pub const CAPTURE_PREFIX: &str = "specpool-worker-";

/// Capture file for the worker process `pid`
pub fn capture_path(dir: &Path, pid: u32) -> PathBuf {
    dir.join(format!("{}{}", CAPTURE_PREFIX, pid))
}

/// Redirect this process's stdout and stderr into `path`.
///
/// The file is created or truncated. Anything already buffered is flushed to
/// the old destinations first.
pub fn redirect_stdio(path: &Path) -> Result<()> {
    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .with_context(|| format!("Failed to create capture file: {}", path.display()))?;

    for target in [libc::STDOUT_FILENO, libc::STDERR_FILENO] {
        // SAFETY: both descriptors are valid for the duration of the call
        let rc = unsafe { libc::dup2(file.as_raw_fd(), target) };
        if rc < 0 {
            return Err(std::io::Error::last_os_error())
                .with_context(|| format!("Failed to redirect fd {} to {}", target, path.display()));
        }
    }

    Ok(())
}

/// Read a capture file, replacing invalid UTF-8.
pub fn read_capture(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read capture file: {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
