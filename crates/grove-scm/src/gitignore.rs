//! Compiled `.gitignore` rules.
//!
//! The repository root and each package directory carry their own ignore
//! file. Each one is compiled independently, relative to the directory it
//! lives in, and callers combine them: a path is excluded when any matcher
//! matches it.

use grovepath::{AbsoluteSystemPath, AbsoluteSystemPathBuf};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use tracing::debug;

use crate::Error;

pub const GITIGNORE: &str = ".gitignore";

pub trait Matcher {
    /// Whether `path`, or any directory above it up to the matcher's base,
    /// is ignored.
    fn matches(&self, path: &AbsoluteSystemPath, is_dir: bool) -> bool;
}

#[derive(Debug, Clone)]
pub struct IgnoreFile {
    base: AbsoluteSystemPathBuf,
    rules: Gitignore,
}

impl IgnoreFile {
    /// A matcher that never matches
    pub fn empty(base: &AbsoluteSystemPath) -> Self {
        Self {
            base: base.to_owned(),
            rules: Gitignore::empty(),
        }
    }

    /// Compiles `ignore_file` with patterns anchored at `base`. A missing file
    /// yields an empty matcher. Lines git would reject are skipped.
    pub fn compile(
        base: &AbsoluteSystemPath,
        ignore_file: &AbsoluteSystemPath,
    ) -> Result<Self, Error> {
        let contents = match ignore_file.read() {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::empty(base));
            }
            Err(source) => {
                return Err(Error::ReadFile {
                    path: ignore_file.to_owned(),
                    source,
                })
            }
        };
        let contents = String::from_utf8(contents)?;

        let mut builder = GitignoreBuilder::new(base);
        for line in contents.lines() {
            if let Err(err) = builder.add_line(Some(ignore_file.as_std_path().to_owned()), line) {
                debug!("skipping invalid line in {}: {}", ignore_file, err);
            }
        }
        let rules = builder.build()?;

        Ok(Self {
            base: base.to_owned(),
            rules,
        })
    }

    /// Compiles the `.gitignore` that lives directly in `dir`
    pub fn for_dir(dir: &AbsoluteSystemPath) -> Result<Self, Error> {
        Self::compile(dir, &dir.join_component(GITIGNORE))
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Matcher for IgnoreFile {
    fn matches(&self, path: &AbsoluteSystemPath, is_dir: bool) -> bool {
        if self.rules.is_empty() || !path.as_path().starts_with(self.base.as_path()) {
            return false;
        }
        self.rules
            .matched_path_or_any_parents(path.as_std_path(), is_dir)
            .is_ignore()
    }
}

impl<A: Matcher, B: Matcher> Matcher for (A, B) {
    fn matches(&self, path: &AbsoluteSystemPath, is_dir: bool) -> bool {
        self.0.matches(path, is_dir) || self.1.matches(path, is_dir)
    }
}
