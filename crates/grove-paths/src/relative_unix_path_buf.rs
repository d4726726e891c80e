use std::{
    borrow::Borrow,
    fmt::{self, Display, Formatter},
    ops::Deref,
};

use serde::{Deserialize, Serialize};

use crate::{PathError, RelativeUnixPath};

/// A forward-slash separated path relative to some anchor. This is the only
/// path type that is allowed to appear in hashed data.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct RelativeUnixPathBuf(pub(crate) String);

impl Display for RelativeUnixPathBuf {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl RelativeUnixPathBuf {
    pub fn new(path: impl Into<String>) -> Result<Self, PathError> {
        let path_string = path.into();
        if path_string.starts_with('/') {
            return Err(PathError::NotRelative(path_string));
        }
        Ok(Self(path_string))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// Removes `prefix` from the front of this path. The prefix must end on a
    /// component boundary: `a/b` is a prefix of `a/b/c` but not of `a/bc`.
    pub fn strip_prefix(&self, prefix: impl AsRef<RelativeUnixPath>) -> Result<Self, PathError> {
        let prefix = prefix.as_ref().as_str().trim_end_matches('/');
        if prefix.is_empty() {
            return Ok(self.clone());
        }
        let Some(rest) = self.0.strip_prefix(prefix) else {
            return Err(PathError::NotParent(prefix.to_string(), self.0.clone()));
        };

        // Handle the case where we are stripping the entire contents of this path
        if rest.is_empty() {
            return Ok(Self(String::new()));
        }

        match rest.strip_prefix('/') {
            Some(tail) => Ok(Self(tail.to_string())),
            None => Err(PathError::PrefixError(prefix.to_string(), self.0.clone())),
        }
    }

    pub fn join(&self, tail: impl AsRef<RelativeUnixPath>) -> Self {
        let tail = tail.as_ref().as_str();
        if self.0.is_empty() {
            return Self(tail.to_string());
        }
        if tail.is_empty() {
            return self.clone();
        }
        Self(format!("{}/{}", self.0.trim_end_matches('/'), tail))
    }
}

impl Borrow<RelativeUnixPath> for RelativeUnixPathBuf {
    fn borrow(&self) -> &RelativeUnixPath {
        RelativeUnixPath::new_unchecked(&self.0)
    }
}

impl AsRef<RelativeUnixPath> for RelativeUnixPathBuf {
    fn as_ref(&self) -> &RelativeUnixPath {
        self.borrow()
    }
}

impl Deref for RelativeUnixPathBuf {
    type Target = RelativeUnixPath;

    fn deref(&self) -> &Self::Target {
        self.borrow()
    }
}

impl TryFrom<String> for RelativeUnixPathBuf {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RelativeUnixPathBuf> for String {
    fn from(value: RelativeUnixPathBuf) -> Self {
        value.0
    }
}
