use std::{
    io::{BufRead, BufReader, Read},
    process::{Command, Stdio},
};

use grovepath::{AbsoluteSystemPath, RelativeUnixPathBuf};
use nom::{
    bytes::complete::{take_while1, take_while_m_n},
    character::complete::{alpha1, char},
    combinator::{all_consuming, map_res, rest, verify},
    sequence::{terminated, tuple},
    Finish, IResult,
};

use crate::{wait_for_success, Error, Git, GitHashes};

impl Git {
    /// Lists the committed files below `root_path`. `git ls-tree` run in a
    /// subdirectory reports paths relative to that subdirectory, so the keys
    /// are already package relative.
    #[tracing::instrument(skip(self))]
    pub(crate) fn git_ls_tree(&self, root_path: &AbsoluteSystemPath) -> Result<GitHashes, Error> {
        let mut git = Command::new(self.bin.as_std_path())
            .args(["ls-tree", "-r", "-z", "HEAD"])
            .env("GIT_OPTIONAL_LOCKS", "0")
            .current_dir(root_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = git
            .stdout
            .as_mut()
            .ok_or_else(|| Error::git_error("failed to get stdout for git ls-tree"))?;
        let mut stderr = git
            .stderr
            .take()
            .ok_or_else(|| Error::git_error("failed to get stderr for git ls-tree"))?;
        let parse_result = read_ls_tree(stdout);
        wait_for_success(git, &mut stderr, "git ls-tree", root_path, parse_result)
    }
}

// Committed symlinks and submodules have no file contents to hash. The
// manual walk skips them as well.
const SYMLINK_MODE: &[u8] = b"120000";
const GITLINK_MODE: &[u8] = b"160000";

/// Reads `git ls-tree -z` output, one NUL terminated record per file. A
/// missing terminator after the last record is accepted.
fn read_ls_tree<R: Read>(reader: R) -> Result<GitHashes, Error> {
    let mut hashes = GitHashes::new();
    for record in BufReader::with_capacity(64 * 1024, reader).split(b'\0') {
        let record = record?;
        if let Some((path, hash)) = parse_ls_tree(&record)? {
            hashes.insert(path, hash);
        }
    }
    Ok(hashes)
}

fn parse_ls_tree(record: &[u8]) -> Result<Option<(RelativeUnixPathBuf, String)>, Error> {
    let (_, (mode, hash, filename)) = all_consuming(ls_tree_record)(record)
        .finish()
        .map_err(|e| {
            Error::git_error(format!(
                "failed to parse git ls-tree record: {}",
                String::from_utf8_lossy(e.input)
            ))
        })?;
    if mode == SYMLINK_MODE || mode == GITLINK_MODE {
        return Ok(None);
    }
    let path = RelativeUnixPathBuf::new(String::from_utf8(filename.to_vec())?)?;
    Ok(Some((path, hash.to_owned())))
}

// <mode> SP <type> SP <object> TAB <file>
fn ls_tree_record(i: &[u8]) -> IResult<&[u8], (&[u8], &str, &[u8])> {
    let mode = take_while1(|c: u8| c.is_ascii_digit());
    let object = map_res(
        take_while_m_n(40, 40, |c: u8| c.is_ascii_hexdigit()),
        std::str::from_utf8,
    );
    let mut filename = verify(rest, |f: &[u8]| !f.is_empty());
    let (i, (mode, _, _, _, hash)) = tuple((
        mode,
        char(' '),
        alpha1,
        char(' '),
        terminated(object, char('\t')),
    ))(i)?;
    let (i, filename) = filename(i)?;
    Ok((i, (mode, hash, filename)))
}

#[cfg(test)]
mod tests {
    use grovepath::RelativeUnixPathBuf;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    use super::read_ls_tree;
    use crate::{
        test_utils::{commit_all, init_repo, tmp_dir, write_files},
        Git, GitHashes,
    };

    const EMPTY: &str = "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391";
    const CONTENTS: &str = "7e59c6a6ea9098c6d3beb00e753e2c54ea502311";

    fn to_hash_map(pairs: &[(&str, &str)]) -> GitHashes {
        pairs
            .iter()
            .map(|(path, hash)| (RelativeUnixPathBuf::new(*path).unwrap(), hash.to_string()))
            .collect()
    }

    #[test_case("", &[] ; "no output")]
    #[test_case(
        "100644 blob e69de29bb2d1d6434b8b29ae775ad8c2e48c5391\tpackage.json\0",
        &[("package.json", EMPTY)] ;
        "single record"
    )]
    #[test_case(
        "100644 blob e69de29bb2d1d6434b8b29ae775ad8c2e48c5391\tpackage.json",
        &[("package.json", EMPTY)] ;
        "missing terminator"
    )]
    #[test_case(
        "100755 blob 7e59c6a6ea9098c6d3beb00e753e2c54ea502311\tbin/run me\0",
        &[("bin/run me", CONTENTS)] ;
        "executable with spaces"
    )]
    #[test_case(
        "100644 blob e69de29bb2d1d6434b8b29ae775ad8c2e48c5391\ttab\there\0\
         100644 blob 7e59c6a6ea9098c6d3beb00e753e2c54ea502311\tsrc/index.ts\0",
        &[("tab\there", EMPTY), ("src/index.ts", CONTENTS)] ;
        "multiple records"
    )]
    #[test_case(
        "160000 commit 7e59c6a6ea9098c6d3beb00e753e2c54ea502311\tvendor/submodule\0\
         100644 blob e69de29bb2d1d6434b8b29ae775ad8c2e48c5391\tpackage.json\0",
        &[("package.json", EMPTY)] ;
        "submodule is skipped"
    )]
    #[test_case(
        "120000 blob 7e59c6a6ea9098c6d3beb00e753e2c54ea502311\tlink.txt\0\
         100644 blob e69de29bb2d1d6434b8b29ae775ad8c2e48c5391\treal.txt\0",
        &[("real.txt", EMPTY)] ;
        "symlink is skipped"
    )]
    fn test_read_ls_tree(input: &str, expected: &[(&str, &str)]) {
        let hashes = read_ls_tree(input.as_bytes()).unwrap();
        assert_eq!(hashes, to_hash_map(expected));
    }

    #[test_case("not ls-tree output" ; "garbage")]
    #[test_case("100644 blob e69de29b\tpackage.json" ; "short object id")]
    #[test_case("100644 blob e69de29bb2d1d6434b8b29ae775ad8c2e48c5391\t" ; "no filename")]
    fn test_read_ls_tree_rejects(input: &str) {
        assert!(read_ls_tree(input.as_bytes()).is_err());
    }

    #[test]
    fn test_ls_tree_in_subdirectory_is_package_relative() {
        let (_tmp, repo_root) = tmp_dir();
        init_repo(&repo_root);
        write_files(
            &repo_root,
            &[
                ("package.json", "{}"),
                ("packages/a/package.json", "{}"),
                ("packages/a/src/index.ts", "some-file-contents"),
                ("packages/b/index.ts", ""),
            ],
        );
        commit_all(&repo_root);

        let git = Git::find(&repo_root).unwrap();
        let pkg_path = repo_root.join_components(&["packages", "a"]);
        let hashes = git.git_ls_tree(&pkg_path).unwrap();

        let mut paths: Vec<_> = hashes.keys().map(|path| path.as_str()).collect();
        paths.sort_unstable();
        assert_eq!(paths, vec!["package.json", "src/index.ts"]);
        assert_eq!(
            hashes[&RelativeUnixPathBuf::new("src/index.ts").unwrap()],
            CONTENTS
        );
    }
}
