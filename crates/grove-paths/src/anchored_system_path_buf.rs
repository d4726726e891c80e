use std::{borrow::Borrow, fmt, ops::Deref, path::Path};

use camino::Utf8PathBuf;

use crate::{AbsoluteSystemPath, AnchoredSystemPath, PathError};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AnchoredSystemPathBuf(pub(crate) Utf8PathBuf);

impl Borrow<AnchoredSystemPath> for AnchoredSystemPathBuf {
    fn borrow(&self) -> &AnchoredSystemPath {
        AnchoredSystemPath::new_unchecked(&self.0)
    }
}

impl AsRef<AnchoredSystemPath> for AnchoredSystemPathBuf {
    fn as_ref(&self) -> &AnchoredSystemPath {
        self.borrow()
    }
}

impl AsRef<Path> for AnchoredSystemPathBuf {
    fn as_ref(&self) -> &Path {
        self.0.as_std_path()
    }
}

impl Deref for AnchoredSystemPathBuf {
    type Target = AnchoredSystemPath;

    fn deref(&self) -> &Self::Target {
        self.borrow()
    }
}

impl fmt::Display for AnchoredSystemPathBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AnchoredSystemPathBuf {
    pub fn new(
        root: impl AsRef<AbsoluteSystemPath>,
        path: impl AsRef<AbsoluteSystemPath>,
    ) -> Result<Self, PathError> {
        let root = root.as_ref();
        let path = path.as_ref();
        let stripped_path = path
            .as_path()
            .strip_prefix(root.as_path())
            .map_err(|_| PathError::NotParent(root.to_string(), path.to_string()))?
            .to_path_buf();

        Ok(AnchoredSystemPathBuf(stripped_path))
    }

    /// Builds an anchored path from a string that may use either separator.
    pub fn from_raw(raw: impl AsRef<str>) -> Result<Self, PathError> {
        let system = crate::into_system(raw.as_ref());
        let path = Utf8PathBuf::from(system);
        if path.is_absolute() {
            return Err(PathError::NotRelative(path.into_string()));
        }
        Ok(AnchoredSystemPathBuf(path))
    }
}
