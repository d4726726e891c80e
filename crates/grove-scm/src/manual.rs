//! Hashing without git: walk the package directory, honour every
//! `.gitignore` git would and hash every remaining regular file.

use grovepath::{AbsoluteSystemPath, AnchoredSystemPath};
use ignore::WalkBuilder;
use tracing::warn;

use crate::{
    gitignore::{IgnoreFile, Matcher},
    hash_object::hash_file,
    inputs::InputGlobs,
    Error, GitHashes,
};

pub(crate) fn hash_files(
    root_path: &AbsoluteSystemPath,
    files: impl Iterator<Item = impl AsRef<AnchoredSystemPath>>,
    allow_missing: bool,
) -> Result<GitHashes, Error> {
    let mut hashes = GitHashes::new();
    for file in files {
        let file = file.as_ref();
        let path = root_path.resolve(file);
        match path.symlink_metadata() {
            Ok(_) => {}
            Err(e) if allow_missing && e.is_io_error(std::io::ErrorKind::NotFound) => continue,
            Err(e) => return Err(e.into()),
        }
        let hash = hash_file(&path)?;
        hashes.insert(file.to_unix(), hash);
    }
    Ok(hashes)
}

#[tracing::instrument(skip(repo_root, inputs))]
pub(crate) fn get_package_file_hashes_without_git<S: AsRef<str>>(
    repo_root: &AbsoluteSystemPath,
    package_path: &AnchoredSystemPath,
    inputs: &[S],
) -> Result<GitHashes, Error> {
    let full_package_path = repo_root.resolve(package_path);
    let globs = InputGlobs::new(inputs)?;

    let ignores = (
        IgnoreFile::for_dir(repo_root)?,
        IgnoreFile::for_dir(&full_package_path)?,
    );

    // Nested `.gitignore` files and the ones between the repo root and the
    // package are picked up by the walker, the same set git itself honours.
    // `.ignore` files and the global excludes file stay off.
    let walker = WalkBuilder::new(&full_package_path)
        .standard_filters(false)
        .git_ignore(true)
        .git_exclude(true)
        .parents(true)
        .require_git(false)
        .hidden(false)
        .follow_links(false)
        .filter_entry(move |entry| {
            if entry.depth() == 0 {
                return true;
            }
            if entry.file_name() == ".git" {
                return false;
            }
            let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
            // nested repositories and submodules are not part of the package
            if is_dir && entry.path().join(".git").exists() {
                return false;
            }
            match AbsoluteSystemPath::from_std_path(entry.path()) {
                Ok(path) => !ignores.matches(path, is_dir),
                // keep it so the walk loop reports the bad path
                Err(_) => true,
            }
        })
        .build();

    let mut hashes = GitHashes::new();
    for dirent in walker {
        let dirent = dirent?;
        let Some(file_type) = dirent.file_type() else {
            continue;
        };
        // The root directory is always yielded and not subject to the filter
        if file_type.is_dir() {
            continue;
        }
        let path = AbsoluteSystemPath::from_std_path(dirent.path())?;
        if file_type.is_symlink() {
            warn!("skipping symlink {}", path);
            continue;
        }
        let relative_path = full_package_path.anchor(path)?.to_unix();
        if !globs.is_match(&relative_path) {
            continue;
        }
        let hash = hash_file(path)?;
        hashes.insert(relative_path, hash);
    }
    Ok(hashes)
}
