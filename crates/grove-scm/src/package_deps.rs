//! Package file hashing. Git is the primary enumerator; manual hashing is the
//! fallback whenever git fails for any reason.

use grovepath::{AbsoluteSystemPath, AnchoredSystemPath, PathError};
use tracing::debug;

use crate::{
    hash_object::hash_objects, inputs::InputGlobs, manual, status::StatusChanges, Error, Git,
    GitHashes, SCM,
};

/// Produces a map of package-relative path to blob hash for the files of a
/// package, optionally narrowed by input globs.
pub trait FileEnumerator {
    fn package_file_hashes<S: AsRef<str>>(
        &self,
        repo_root: &AbsoluteSystemPath,
        package_path: &AnchoredSystemPath,
        inputs: &[S],
    ) -> Result<GitHashes, Error>;
}

/// Walks the filesystem, applying `.gitignore` rules itself
#[derive(Debug, Default, Clone, Copy)]
pub struct ManualHasher;

impl FileEnumerator for ManualHasher {
    fn package_file_hashes<S: AsRef<str>>(
        &self,
        repo_root: &AbsoluteSystemPath,
        package_path: &AnchoredSystemPath,
        inputs: &[S],
    ) -> Result<GitHashes, Error> {
        manual::get_package_file_hashes_without_git(repo_root, package_path, inputs)
    }
}

impl FileEnumerator for Git {
    fn package_file_hashes<S: AsRef<str>>(
        &self,
        repo_root: &AbsoluteSystemPath,
        package_path: &AnchoredSystemPath,
        inputs: &[S],
    ) -> Result<GitHashes, Error> {
        let globs = InputGlobs::new(inputs)?;
        let mut hashes = self.get_package_file_hashes_from_index(repo_root, package_path)?;
        if !globs.is_empty() {
            hashes.retain(|path, _| globs.is_match(path));
        }
        Ok(hashes)
    }
}

/// Runs `primary`, and `fallback` if that fails. Errors from `fallback` are
/// returned as is.
pub fn get_package_file_hashes_with_fallback<P, F, S>(
    primary: &P,
    fallback: &F,
    repo_root: &AbsoluteSystemPath,
    package_path: &AnchoredSystemPath,
    inputs: &[S],
) -> Result<GitHashes, Error>
where
    P: FileEnumerator,
    F: FileEnumerator,
    S: AsRef<str>,
{
    match primary.package_file_hashes(repo_root, package_path, inputs) {
        Ok(hashes) => Ok(hashes),
        Err(err) => {
            debug!(
                "failed to hash {} with primary enumerator: {}. Falling back to manual",
                package_path, err,
            );
            fallback.package_file_hashes(repo_root, package_path, inputs)
        }
    }
}

impl FileEnumerator for SCM {
    fn package_file_hashes<S: AsRef<str>>(
        &self,
        repo_root: &AbsoluteSystemPath,
        package_path: &AnchoredSystemPath,
        inputs: &[S],
    ) -> Result<GitHashes, Error> {
        self.get_package_file_hashes(repo_root, package_path, inputs)
    }
}

impl SCM {
    #[tracing::instrument(skip(self, repo_root, inputs))]
    pub fn get_package_file_hashes<S: AsRef<str>>(
        &self,
        repo_root: &AbsoluteSystemPath,
        package_path: &AnchoredSystemPath,
        inputs: &[S],
    ) -> Result<GitHashes, Error> {
        match self {
            SCM::Manual => ManualHasher.package_file_hashes(repo_root, package_path, inputs),
            SCM::Git(git) => get_package_file_hashes_with_fallback(
                git,
                &ManualHasher,
                repo_root,
                package_path,
                inputs,
            ),
        }
    }

    pub fn hash_files(
        &self,
        repo_root: &AbsoluteSystemPath,
        files: impl Iterator<Item = impl AsRef<AnchoredSystemPath>>,
    ) -> Result<GitHashes, Error> {
        match self {
            SCM::Manual => manual::hash_files(repo_root, files, false),
            SCM::Git(git) => git.hash_files(repo_root, files),
        }
    }

    /// Hashes the files in `files` that exist, skipping the rest
    pub fn hash_existing_of(
        &self,
        repo_root: &AbsoluteSystemPath,
        files: impl Iterator<Item = impl AsRef<AnchoredSystemPath>>,
    ) -> Result<GitHashes, Error> {
        manual::hash_files(repo_root, files, true)
    }
}

impl Git {
    #[tracing::instrument(skip(self, repo_root))]
    fn get_package_file_hashes_from_index(
        &self,
        repo_root: &AbsoluteSystemPath,
        package_path: &AnchoredSystemPath,
    ) -> Result<GitHashes, Error> {
        let full_pkg_path = repo_root.resolve(package_path);
        let git_to_pkg_path = self.root.anchor(&full_pkg_path)?;
        let pkg_prefix = git_to_pkg_path.to_unix();

        let mut hashes = self.git_ls_tree(&full_pkg_path)?;
        let StatusChanges { to_hash, to_remove } = self.git_status(&full_pkg_path, &pkg_prefix)?;
        for path in &to_remove {
            hashes.remove(path);
        }
        // to_hash is relative to the git root
        hash_objects(&self.root, &full_pkg_path, to_hash, &mut hashes)?;
        Ok(hashes)
    }

    fn hash_files(
        &self,
        process_relative_to: &AbsoluteSystemPath,
        files: impl Iterator<Item = impl AsRef<AnchoredSystemPath>>,
    ) -> Result<GitHashes, Error> {
        let mut hashes = GitHashes::new();
        let to_hash = files
            .map(|f| {
                Ok(self
                    .root
                    .anchor(process_relative_to.resolve(f.as_ref()))?
                    .to_unix())
            })
            .collect::<Result<Vec<_>, PathError>>()?;
        hash_objects(&self.root, process_relative_to, to_hash, &mut hashes)?;
        Ok(hashes)
    }
}
