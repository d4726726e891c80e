use std::fmt;

use camino::Utf8PathBuf;

use crate::{PathError, RelativeUnixPathBuf};

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct RelativeUnixPath {
    inner: str,
}

impl fmt::Display for RelativeUnixPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner)
    }
}

impl RelativeUnixPath {
    pub fn new<P: AsRef<str> + ?Sized>(value: &P) -> Result<&Self, PathError> {
        let path = value.as_ref();
        if path.starts_with('/') {
            return Err(PathError::NotRelative(path.to_string()));
        }
        Ok(Self::new_unchecked(path))
    }

    pub(crate) fn new_unchecked(path: &str) -> &Self {
        // SAFETY: `RelativeUnixPath` is a transparent wrapper around `str`
        unsafe { &*(path as *const str as *const Self) }
    }

    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Translates the forward slashes into the platform separator.
    pub(crate) fn to_system_path_buf(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(crate::into_system(&self.inner))
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn starts_with(&self, prefix: impl AsRef<RelativeUnixPath>) -> bool {
        let prefix = prefix.as_ref().as_str();
        if prefix.is_empty() {
            return true;
        }
        match self.inner.strip_prefix(prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'),
            None => false,
        }
    }
}

impl ToOwned for RelativeUnixPath {
    type Owned = RelativeUnixPathBuf;

    fn to_owned(&self) -> Self::Owned {
        RelativeUnixPathBuf(self.inner.to_owned())
    }
}

impl AsRef<RelativeUnixPath> for RelativeUnixPath {
    fn as_ref(&self) -> &RelativeUnixPath {
        self
    }
}
