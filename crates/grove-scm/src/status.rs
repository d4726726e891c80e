use std::{
    io::{BufRead, BufReader, Read},
    process::{Command, Stdio},
};

use grovepath::{AbsoluteSystemPath, RelativeUnixPathBuf};
use nom::{
    bytes::complete::take,
    character::complete::char,
    combinator::{all_consuming, rest, verify},
    sequence::separated_pair,
    Finish, IResult,
};

use crate::{wait_for_success, Error, Git};

/// Working tree changes below a package: `to_hash` is relative to the git
/// root, `to_remove` has already been made package relative.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct StatusChanges {
    pub to_hash: Vec<RelativeUnixPathBuf>,
    pub to_remove: Vec<RelativeUnixPathBuf>,
}

impl Git {
    #[tracing::instrument(skip(self, root_path))]
    pub(crate) fn git_status(
        &self,
        root_path: &AbsoluteSystemPath,
        pkg_prefix: &RelativeUnixPathBuf,
    ) -> Result<StatusChanges, Error> {
        let mut git = Command::new(self.bin.as_std_path())
            .args([
                "status",
                "--untracked-files",
                "--no-renames",
                "-z",
                "--",
                ".",
            ])
            .env("GIT_OPTIONAL_LOCKS", "0")
            .current_dir(root_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = git
            .stdout
            .as_mut()
            .ok_or_else(|| Error::git_error("failed to get stdout for git status"))?;
        let mut stderr = git
            .stderr
            .take()
            .ok_or_else(|| Error::git_error("failed to get stderr for git status"))?;
        let parse_result = read_status(stdout, root_path, pkg_prefix);
        wait_for_success(git, &mut stderr, "git status", root_path, parse_result)
    }
}

fn read_status<R: Read>(
    reader: R,
    root_path: &AbsoluteSystemPath,
    pkg_prefix: &RelativeUnixPathBuf,
) -> Result<StatusChanges, Error> {
    let mut changes = StatusChanges::default();
    for record in BufReader::new(reader).split(b'\0') {
        let record = record?;
        let (status, filename) = parse_status(&record)?;
        // porcelain output is always relative to the repository root
        let path = RelativeUnixPathBuf::new(String::from_utf8(filename.to_vec())?)?;
        if status.contains(&b'D') {
            let path = path.strip_prefix(pkg_prefix).map_err(|_| {
                Error::git_error(format!(
                    "'git status --untracked-files --no-renames -z -- .' run in {} found a \
                     deleted file {} that did not have the expected prefix: {}",
                    root_path, path, pkg_prefix
                ))
            })?;
            changes.to_remove.push(path);
        } else {
            changes.to_hash.push(path);
        }
    }
    Ok(changes)
}

/// Splits a status record into its two status characters and the path
fn parse_status(record: &[u8]) -> Result<(&[u8], &[u8]), Error> {
    all_consuming(status_record)(record)
        .finish()
        .map(|(_, entry)| entry)
        .map_err(|e| {
            Error::git_error(format!(
                "failed to parse git status record: {}",
                String::from_utf8_lossy(e.input)
            ))
        })
}

// XY SP <path>, where X and Y may themselves be spaces
fn status_record(i: &[u8]) -> IResult<&[u8], (&[u8], &[u8])> {
    separated_pair(take(2usize), char(' '), verify(rest, |p: &[u8]| !p.is_empty()))(i)
}
