//! Hashable records for grove.
//!
//! Every composite fingerprint is computed the same way: the record is
//! serialized to a canonical JSON byte string (fixed field order, maps sorted
//! by key) and that byte string is run through xxh64. See [`GroveHash`].

mod traits;

use std::collections::HashMap;

use grovepath::RelativeUnixPathBuf;
use serde::{ser::SerializeStruct, Deserialize, Serialize, Serializer};
pub use traits::GroveHash;

/// How environment variables outside of the declared set are treated.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvMode {
    /// Only declared and pass-through variables reach the task
    #[default]
    Strict,
    /// The full environment reaches the task
    Loose,
}

impl std::fmt::Display for EnvMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            EnvMode::Strict => "strict",
            EnvMode::Loose => "loose",
        })
    }
}

/// Output globs of a task, split by whether they were prefixed with `!`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutputs {
    pub inclusions: Vec<String>,
    pub exclusions: Vec<String>,
}

impl TaskOutputs {
    pub fn from_globs<S: AsRef<str>>(globs: &[S]) -> Self {
        let mut outputs = TaskOutputs::default();
        for glob in globs {
            let glob = glob.as_ref();
            match glob.strip_prefix('!') {
                Some(exclusion) => outputs.exclusions.push(exclusion.to_string()),
                None => outputs.inclusions.push(glob.to_string()),
            }
        }
        outputs
    }
}

/// Map of package-relative file paths to their blob hashes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FileHashes(pub HashMap<RelativeUnixPathBuf, String>);

impl Serialize for FileHashes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut entries: Vec<_> = self.0.iter().collect();
        entries.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));
        serializer.collect_map(entries.into_iter().map(|(path, hash)| (path.as_str(), hash)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LockfilePackage {
    pub key: String,
    pub version: String,
}

/// Sorted closure of external packages a workspace package depends on.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct LockFilePackages(pub Vec<LockfilePackage>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHashable<'a> {
    // hashes
    pub global_hash: &'a str,
    pub task_dependency_hashes: Vec<String>,
    pub hash_of_files: &'a str,
    pub external_deps_hash: Option<String>,

    // task
    pub package_dir: Option<RelativeUnixPathBuf>,
    pub task: &'a str,
    pub outputs: TaskOutputs,
    pub pass_through_args: &'a [String],
    /// Package relative `.env` files whose contents are part of the file hash
    pub dot_env: &'a [String],

    // env
    pub env: &'a [String],
    pub resolved_env_vars: Vec<String>,
    pub pass_through_env: Option<&'a [String]>,
    pub env_mode: EnvMode,
}

impl TaskHashable<'_> {
    /// Loose mode lets the whole environment through so the pass-through list
    /// carries no information. Strict mode treats an absent list as empty.
    fn normalized_pass_through_env(&self) -> Option<&[String]> {
        match self.env_mode {
            EnvMode::Loose => None,
            EnvMode::Strict => Some(self.pass_through_env.unwrap_or_default()),
        }
    }
}

impl Serialize for TaskHashable<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("TaskHashable", 13)?;
        state.serialize_field("globalHash", self.global_hash)?;
        state.serialize_field("taskDependencyHashes", &self.task_dependency_hashes)?;
        state.serialize_field("packageDir", &self.package_dir)?;
        state.serialize_field("hashOfFiles", self.hash_of_files)?;
        state.serialize_field("externalDepsHash", &self.external_deps_hash)?;
        state.serialize_field("task", self.task)?;
        state.serialize_field("outputs", &self.outputs)?;
        state.serialize_field("passThroughArgs", self.pass_through_args)?;
        state.serialize_field("dotEnv", self.dot_env)?;
        state.serialize_field("env", self.env)?;
        state.serialize_field("resolvedEnvVars", &self.resolved_env_vars)?;
        state.serialize_field("passThroughEnv", &self.normalized_pass_through_env())?;
        state.serialize_field("envMode", &self.env_mode)?;
        state.end()
    }
}
