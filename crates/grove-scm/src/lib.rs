#![deny(clippy::all)]

//! Source control support for grove. Produces maps of package-relative file
//! paths to git blob hashes, either from the git index and working tree
//! status, or by walking the filesystem and applying `.gitignore` rules
//! manually when git is unavailable.

use std::{
    collections::HashMap,
    io::{BufRead, Cursor, Read},
    process::{Child, Command},
    string::FromUtf8Error,
};

use grovepath::{AbsoluteSystemPath, AbsoluteSystemPathBuf, PathError, RelativeUnixPathBuf};
use thiserror::Error;
use tracing::debug;

pub mod gitignore;
mod hash_object;
mod inputs;
mod ls_tree;
mod manual;
pub mod package_deps;
mod status;
#[cfg(test)]
mod test_utils;

pub use hash_object::hash_file;
pub use package_deps::{get_package_file_hashes_with_fallback, FileEnumerator};

/// Package-relative unix path to git blob hash
pub type GitHashes = HashMap<RelativeUnixPathBuf, String>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("git error: {0}")]
    Git(String),
    #[error("could not find git binary")]
    GitBinaryNotFound(#[from] which::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: AbsoluteSystemPathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("path error: {0}")]
    Path(#[from] PathError),
    #[error("encoding error: {0}")]
    Encoding(#[from] FromUtf8Error),
    #[error("package traversal error: {0}")]
    Ignore(#[from] ignore::Error),
    #[error("invalid glob: {0}")]
    Glob(#[source] Box<wax::BuildError>),
}

impl From<wax::BuildError> for Error {
    fn from(value: wax::BuildError) -> Self {
        Error::Glob(Box::new(value))
    }
}

impl Error {
    pub(crate) fn git_error(s: impl Into<String>) -> Self {
        Error::Git(s.into())
    }

    /// Whether the error came from git itself rather than from the files
    /// being hashed
    pub fn is_git_error(&self) -> bool {
        matches!(self, Error::Git(_) | Error::GitBinaryNotFound(_))
    }
}

fn read_git_error_to_string<R: Read>(stderr: &mut R) -> Option<String> {
    let mut buf = String::new();
    let bytes_read = stderr.read_to_string(&mut buf).ok()?;
    if bytes_read > 0 {
        // something failed with git, report that error
        Some(buf)
    } else {
        None
    }
}

/// Waits for a git child process whose stdout has been consumed by
/// `parse_result`. A parse failure kills the child instead of waiting on it,
/// since it may still be blocked writing output nobody will read.
pub(crate) fn wait_for_success<R: Read, T>(
    mut child: Child,
    stderr: &mut R,
    command: &str,
    root_path: impl AsRef<AbsoluteSystemPath>,
    parse_result: Result<T, Error>,
) -> Result<T, Error> {
    if let Err(parse_err) = parse_result {
        child.kill()?;
        let stderr_text = read_git_error_to_string(stderr)
            .map(|stderr| format!(" stderr: {stderr}"))
            .unwrap_or_default();
        return Err(Error::git_error(format!(
            "'{}' in {}{}: {}",
            command,
            root_path.as_ref(),
            stderr_text,
            parse_err
        )));
    }
    let exit_status = child.wait()?;
    if exit_status.success() {
        return parse_result;
    }
    // We successfully parsed, but the command failed.
    let stderr_text = read_git_error_to_string(stderr)
        .map(|stderr| format!(" stderr: {stderr}"))
        .unwrap_or_default();
    let code = exit_status
        .code()
        .map(|code| code.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    Err(Error::git_error(format!(
        "'{}' in {} exited with code {}{}",
        command,
        root_path.as_ref(),
        code,
        stderr_text
    )))
}

#[derive(Debug, Clone)]
pub struct Git {
    root: AbsoluteSystemPathBuf,
    bin: AbsoluteSystemPathBuf,
}

#[derive(Debug, Error)]
enum GitError {
    #[error("failed to find git binary: {0}")]
    Binary(#[from] which::Error),
    #[error("git binary path is not absolute: {0}")]
    BinaryPath(#[from] PathError),
    #[error("failed to find .git folder for path {0}: {1}")]
    Root(AbsoluteSystemPathBuf, Error),
}

impl Git {
    fn find(path_in_repo: &AbsoluteSystemPath) -> Result<Self, GitError> {
        let bin = which::which("git")?;
        let bin = AbsoluteSystemPathBuf::try_from(bin.as_path())?;
        let root =
            find_git_root(path_in_repo).map_err(|e| GitError::Root(path_in_repo.to_owned(), e))?;
        Ok(Self { root, bin })
    }

    pub fn root(&self) -> &AbsoluteSystemPath {
        &self.root
    }
}

fn find_git_root(repo_root: &AbsoluteSystemPath) -> Result<AbsoluteSystemPathBuf, Error> {
    let rev_parse = Command::new("git")
        .args(["rev-parse", "--show-cdup"])
        .current_dir(repo_root)
        .output()?;
    if !rev_parse.status.success() {
        let stderr = String::from_utf8_lossy(&rev_parse.stderr);
        return Err(Error::git_error(format!(
            "git rev-parse --show-cdup error: {stderr}"
        )));
    }
    let mut lines = Cursor::new(rev_parse.stdout).split(b'\n');
    if let Some(line) = lines.next() {
        let line = String::from_utf8(line?)?;
        let tail = RelativeUnixPathBuf::new(line.trim_end_matches('\r'))?;
        Ok(repo_root.join_unix_path(tail)?)
    } else {
        let stderr = String::from_utf8_lossy(&rev_parse.stderr);
        Err(Error::git_error(format!(
            "git rev-parse --show-cdup error: no values on stdout. stderr: {stderr}"
        )))
    }
}

#[derive(Debug, Clone)]
pub enum SCM {
    Git(Git),
    Manual,
}

impl SCM {
    /// Uses git when both the binary and a repository containing
    /// `path_in_repo` can be found, manual hashing otherwise.
    #[tracing::instrument]
    pub fn new(path_in_repo: &AbsoluteSystemPath) -> SCM {
        Git::find(path_in_repo).map(SCM::Git).unwrap_or_else(|e| {
            debug!("{}, continuing with manual hashing", e);
            SCM::Manual
        })
    }

    pub fn is_manual(&self) -> bool {
        matches!(self, SCM::Manual)
    }
}
