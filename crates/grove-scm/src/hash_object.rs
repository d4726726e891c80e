use std::io::Read;

use grovepath::{AbsoluteSystemPath, RelativeUnixPathBuf};
use hex::ToHex;
use sha1::{Digest, Sha1};
use tracing::warn;

use crate::{Error, GitHashes};

/// Hashes the contents of `path` the same way `git hash-object` does: SHA1
/// over `blob <len>\0<contents>`, rendered as lowercase hex.
pub fn hash_file(path: &AbsoluteSystemPath) -> Result<String, Error> {
    let read_err = |source| Error::ReadFile {
        path: path.to_owned(),
        source,
    };
    let mut f = path.open().map_err(read_err)?;
    let mut buffer = Vec::new();
    f.read_to_end(&mut buffer).map_err(read_err)?;
    Ok(hash_blob(&buffer))
}

pub(crate) fn hash_blob(contents: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update("blob ".as_bytes());
    hasher.update(contents.len().to_string().as_bytes());
    hasher.update([b'\0']);
    hasher.update(contents);
    hasher.finalize().encode_hex::<String>()
}

/// Rehashes files reported by `git status`. `to_hash` is relative to
/// `git_root`, the resulting keys are relative to `pkg_path`.
pub(crate) fn hash_objects(
    git_root: &AbsoluteSystemPath,
    pkg_path: &AbsoluteSystemPath,
    to_hash: Vec<RelativeUnixPathBuf>,
    hashes: &mut GitHashes,
) -> Result<(), Error> {
    for filename in to_hash {
        let full_file_path = git_root.join_unix_path(&filename)?;
        let package_relative_path = pkg_path.anchor(&full_file_path)?.to_unix();
        let metadata = full_file_path.symlink_metadata()?;
        if metadata.is_symlink() {
            // Symlinks are never hashed, on either the git or the manual path
            warn!("skipping symlink {}", full_file_path);
            hashes.remove(&package_relative_path);
            continue;
        }
        if metadata.is_dir() {
            continue;
        }
        let hash = hash_file(&full_file_path)?;
        hashes.insert(package_relative_path, hash);
    }
    Ok(())
}
