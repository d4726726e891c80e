//! Path types for grove.
//!
//! Hashing needs to be stable across machines, so paths that end up inside a
//! hash are always [`RelativeUnixPathBuf`]s: forward-slash separated and
//! relative to some anchor (the repository root or a package directory).
//! Paths that are used to touch the filesystem are system paths:
//!
//! - [`AbsoluteSystemPath`] / [`AbsoluteSystemPathBuf`]: absolute, uses the
//!   platform separator.
//! - [`AnchoredSystemPath`] / [`AnchoredSystemPathBuf`]: relative to an
//!   absolute path that is tracked by the caller, uses the platform separator.
//!
//! Conversions between the two families happen via path-prefix arithmetic
//! only: [`AbsoluteSystemPath::anchor`], [`AbsoluteSystemPath::resolve`] and
//! [`AnchoredSystemPath::to_unix`].

mod absolute_system_path;
mod absolute_system_path_buf;
mod anchored_system_path;
mod anchored_system_path_buf;
mod relative_unix_path;
mod relative_unix_path_buf;

use std::io;

pub use absolute_system_path::AbsoluteSystemPath;
pub use absolute_system_path_buf::AbsoluteSystemPathBuf;
pub use anchored_system_path::AnchoredSystemPath;
pub use anchored_system_path_buf::AnchoredSystemPathBuf;
pub use relative_unix_path::RelativeUnixPath;
pub use relative_unix_path_buf::RelativeUnixPathBuf;

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("Path is not absolute: {0}")]
    NotAbsolute(String),
    #[error("Path is not relative: {0}")]
    NotRelative(String),
    #[error("Path {1} is not parent of {0}")]
    NotParent(String, String),
    #[error("{0} is not a prefix for {1}")]
    PrefixError(String, String),
    #[error("Invalid UTF-8: {0}")]
    InvalidUnicode(String),
    #[error("IO error: {0}")]
    IO(#[from] io::Error),
}

impl From<camino::FromPathBufError> for PathError {
    fn from(value: camino::FromPathBufError) -> Self {
        PathError::InvalidUnicode(value.into_path_buf().to_string_lossy().into_owned())
    }
}

impl From<camino::FromPathError> for PathError {
    fn from(value: camino::FromPathError) -> Self {
        PathError::InvalidUnicode(value.to_string())
    }
}

impl PathError {
    pub fn is_io_error(&self, kind: io::ErrorKind) -> bool {
        matches!(self, PathError::IO(err) if err.kind() == kind)
    }
}

/// Converts a string that may contain either separator into one that only
/// contains the platform separator.
pub(crate) fn into_system(path: &str) -> String {
    #[cfg(windows)]
    {
        path.replace('/', std::path::MAIN_SEPARATOR_STR)
    }
    #[cfg(not(windows))]
    {
        path.to_owned()
    }
}
