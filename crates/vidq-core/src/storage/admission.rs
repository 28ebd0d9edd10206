//! Free-space admission check run before any fetch.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::collab::DiskStat;

/// True when `free` leaves room for both the temporary and the final copy of
/// `required` bytes (`free >= 2 * required`). Unknown sizes (`required == 0`) always pass.
pub fn admit(required: u64, free: u64) -> bool {
    (required as u128) * 2 <= free as u128
}

/// Free bytes available to unprivileged users on the filesystem holding `path`.
#[cfg(unix)]
pub fn free_bytes(path: &Path) -> Result<u64> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes())
        .with_context(|| format!("path contains NUL: {}", path.display()))?;
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let r = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if r != 0 {
        return Err(std::io::Error::last_os_error())
            .with_context(|| format!("statvfs {}", path.display()));
    }
    Ok((stat.f_bavail as u64).saturating_mul(stat.f_frsize as u64))
}

/// Non-Unix fallback: free space is unknown, report "plenty" so admission never blocks.
#[cfg(not(unix))]
pub fn free_bytes(_path: &Path) -> Result<u64> {
    Ok(u64::MAX)
}

/// Disk stat provider backed by `statvfs` on the job work directory.
#[derive(Debug, Clone)]
pub struct StatvfsDisk {
    dir: PathBuf,
}

impl StatvfsDisk {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl DiskStat for StatvfsDisk {
    fn free_bytes(&self) -> Result<u64> {
        free_bytes(&self.dir)
    }
}
