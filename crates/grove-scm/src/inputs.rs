use grovepath::RelativeUnixPath;
use wax::{any, Any, Glob, Pattern};

use crate::Error;

/// Compiled task input globs. Globs are package relative; a leading `!` turns
/// a glob into an exclusion. With no inclusions every file is included.
pub(crate) struct InputGlobs {
    include: Option<Any<'static>>,
    exclude: Option<Any<'static>>,
}

impl InputGlobs {
    pub fn new<S: AsRef<str>>(inputs: &[S]) -> Result<Self, Error> {
        let mut includes = Vec::new();
        let mut excludes = Vec::new();
        for pattern in inputs {
            let pattern = pattern.as_ref();
            if let Some(exclusion) = pattern.strip_prefix('!') {
                excludes.push(Glob::new(exclusion)?.into_owned());
            } else {
                includes.push(Glob::new(pattern)?.into_owned());
            }
        }
        let include = if includes.is_empty() {
            None
        } else {
            Some(any(includes)?)
        };
        let exclude = if excludes.is_empty() {
            None
        } else {
            Some(any(excludes)?)
        };
        Ok(Self { include, exclude })
    }

    /// True when there is nothing to filter on
    pub fn is_empty(&self) -> bool {
        self.include.is_none() && self.exclude.is_none()
    }

    pub fn is_match(&self, path: &RelativeUnixPath) -> bool {
        if let Some(include) = &self.include {
            if !include.is_match(path.as_str()) {
                return false;
            }
        }
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(path.as_str()) {
                return false;
            }
        }
        true
    }
}
