use std::fmt;
use std::path::Path;

use crate::core::error::AppResult;

/// Why a path can't be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Directory,
    Symlink,
    NamedPipe,
    Special,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Rejection::Directory => "don't support directory!",
            Rejection::Symlink => "don't support symbolic link!",
            Rejection::NamedPipe => "don't support named pipe!",
            Rejection::Special => "don't support special files (sockets, devices)!",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admissibility {
    Regular,
    Rejected(Rejection),
}

impl Admissibility {
    pub fn is_admissible(&self) -> bool {
        matches!(self, Admissibility::Regular)
    }
}

/// Classify `path` without following symlinks. Failing to stat it is an error.
pub fn check_file(path: &Path) -> AppResult<Admissibility> {
    let file_type = std::fs::symlink_metadata(path)?.file_type();

    if file_type.is_file() {
        return Ok(Admissibility::Regular);
    }
    if file_type.is_dir() {
        return Ok(Admissibility::Rejected(Rejection::Directory));
    }
    if file_type.is_symlink() {
        return Ok(Admissibility::Rejected(Rejection::Symlink));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt;
        if file_type.is_fifo() {
            return Ok(Admissibility::Rejected(Rejection::NamedPipe));
        }
    }

    Ok(Admissibility::Rejected(Rejection::Special))
}

/// Name a file is stored under on the peer: the path with directories stripped.
pub fn remote_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
}

/// Whether `name` is a bare file name the server may create in its served directory.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}
