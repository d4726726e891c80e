//! Task fingerprinting for grove.
//!
//! Hashing happens in two phases. [`PackageInputsHashes::calculate_file_hashes`]
//! hashes the files of every distinct [`PackageInputSpec`] up front on a
//! bounded pool of workers. [`TaskHasher::calculate_task_hash`] is then called
//! once per task, in topological order, and combines that file hash with the
//! task definition, the environment and the hashes of the task's
//! dependencies.

mod config;
mod tracker;

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fmt,
    sync::RwLock,
};

pub use config::{ConfigError, HashingConfig, RunOptsHashInfo};
use grove_env::{DetailedMap, EnvironmentVariableMap};
use grove_frameworks::infer_framework;
use grove_hash::{
    FileHashes, GroveHash, LockFilePackages, LockfilePackage, TaskHashable, TaskOutputs,
};
use grove_scm::{GitHashes, SCM};
use grove_task_id::{TaskId, TaskNode, TASK_DELIMITER};
use grovepath::{AbsoluteSystemPath, AnchoredSystemPath, AnchoredSystemPathBuf};
use rayon::prelude::*;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
pub use tracker::{CacheHitMetadata, CacheSource, TaskHashTracker};

/// When set, variables starting with its value are never picked up by
/// framework inference
pub const CI_VENDOR_ENV_KEY: &str = "GROVE_CI_VENDOR_ENV_KEY";

#[derive(Debug, Error)]
pub enum Error {
    #[error("No task definition for {0}")]
    MissingPipelineEntry(TaskId<'static>),
    #[error("Unknown package {package} referenced by task {task_id}")]
    UnknownPackage {
        package: String,
        task_id: TaskId<'static>,
    },
    #[error("Package inputs of {0} were never hashed")]
    MissingPackageFileHash(TaskId<'static>),
    #[error("Missing hash for {dependency}, a dependency of {task_id}.")]
    MissingDependencyTaskHash {
        task_id: TaskId<'static>,
        dependency: TaskId<'static>,
    },
    #[error("Failed to hash files of package {package}: {source}")]
    FileHashes {
        package: String,
        #[source]
        source: grove_scm::Error,
    },
    #[error("Invalid env pattern for task {task_id}: {source}")]
    EnvPattern {
        task_id: TaskId<'static>,
        #[source]
        source: grove_env::Error,
    },
    #[error("Failed to start file hashing workers: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("task hash tracker lock was poisoned")]
    Lock,
    #[error("Task {0} was hashed twice")]
    DuplicateTaskHash(TaskId<'static>),
}

/// The unit of file hashing: a package together with the input globs and
/// `.env` files of a task in it. Tasks that share all three share a file hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageInputSpec {
    package_name: String,
    input_globs: Vec<String>,
    dot_env: Vec<String>,
}

impl PackageInputSpec {
    pub fn new<S: Into<String>>(
        package_name: impl Into<String>,
        input_globs: impl IntoIterator<Item = S>,
    ) -> Self {
        let mut input_globs: Vec<String> = input_globs.into_iter().map(Into::into).collect();
        input_globs.sort();
        Self {
            package_name: package_name.into(),
            input_globs,
            dot_env: Vec::new(),
        }
    }

    /// Adds package relative `.env` files. They are hashed when they exist,
    /// even if they are ignored or not matched by the input globs.
    pub fn with_dot_env<S: Into<String>>(mut self, files: impl IntoIterator<Item = S>) -> Self {
        self.dot_env = files.into_iter().map(Into::into).collect();
        self.dot_env.sort();
        self
    }

    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    pub fn input_globs(&self) -> &[String] {
        &self.input_globs
    }

    pub fn dot_env(&self) -> &[String] {
        &self.dot_env
    }

    /// `package#glob1!glob2!...`, followed by `#file1!file2...` when there
    /// are `.env` files
    pub fn key(&self) -> String {
        let mut key = format!(
            "{}{TASK_DELIMITER}{}",
            self.package_name,
            self.input_globs.join("!")
        );
        if !self.dot_env.is_empty() {
            key.push_str(TASK_DELIMITER);
            key.push_str(&self.dot_env.join("!"));
        }
        key
    }
}

impl fmt::Display for PackageInputSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// What the hasher needs to know about a package
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackageInfo {
    /// Relative to the repository root, empty for the root package
    pub package_path: AnchoredSystemPathBuf,
    /// Declared dependencies, used for framework inference
    pub dependencies: Option<BTreeMap<String, String>>,
    /// External packages this package resolves to through the lockfile
    pub transitive_dependencies: Option<HashSet<LockfilePackage>>,
}

impl PackageInfo {
    pub fn package_path(&self) -> &AnchoredSystemPath {
        &self.package_path
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskDefinition {
    /// Package relative globs, `!` excludes. Empty means every file.
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub env: Vec<String>,
    pub pass_through_env: Option<Vec<String>>,
    /// Package relative `.env` files read by the task
    pub dot_env: Vec<String>,
}

impl TaskDefinition {
    pub fn hashable_outputs(&self) -> TaskOutputs {
        TaskOutputs::from_globs(&self.outputs)
    }
}

#[derive(Debug, Default)]
pub struct PackageInputsHashes {
    // keyed by PackageInputSpec::key
    hashes: HashMap<String, String>,
    expanded_hashes: HashMap<String, FileHashes>,
    task_specs: HashMap<TaskId<'static>, String>,
}

impl PackageInputsHashes {
    /// Hashes the files of every distinct [`PackageInputSpec`] referenced by
    /// `all_tasks` using `worker_count` workers. The first error stops the
    /// run.
    #[tracing::instrument(skip(scm, all_tasks, packages, task_definitions, repo_root))]
    pub fn calculate_file_hashes<'a>(
        scm: &SCM,
        all_tasks: impl Iterator<Item = &'a TaskNode>,
        packages: &HashMap<String, PackageInfo>,
        task_definitions: &HashMap<TaskId<'static>, TaskDefinition>,
        repo_root: &AbsoluteSystemPath,
        worker_count: usize,
    ) -> Result<PackageInputsHashes, Error> {
        tracing::trace!(manual = scm.is_manual(), worker_count, "hashing package inputs");

        let mut task_specs = HashMap::new();
        let mut unique_specs: BTreeMap<String, (PackageInputSpec, &AnchoredSystemPath)> =
            BTreeMap::new();
        for task in all_tasks {
            let TaskNode::Task(task_id) = task else {
                continue;
            };
            if task_id.is_virtual_root() {
                continue;
            }
            let task_definition = task_definitions
                .get(task_id)
                .ok_or_else(|| Error::MissingPipelineEntry(task_id.clone()))?;
            let package = packages
                .get(task_id.package())
                .ok_or_else(|| Error::UnknownPackage {
                    package: task_id.package().to_string(),
                    task_id: task_id.clone(),
                })?;
            let spec = PackageInputSpec::new(task_id.package(), task_definition.inputs.iter())
                .with_dot_env(task_definition.dot_env.iter());
            let key = spec.key();
            unique_specs
                .entry(key.clone())
                .or_insert((spec, package.package_path()));
            task_specs.insert(task_id.clone(), key);
        }

        debug!(
            total_tasks = task_specs.len(),
            unique_hash_keys = unique_specs.len(),
            "file hash deduplication"
        );

        let table = RwLock::new(HashMap::with_capacity(unique_specs.len()));
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(worker_count.max(1))
            .build()?;
        pool.install(|| {
            unique_specs
                .par_iter()
                .try_for_each(|(key, (spec, package_path))| -> Result<(), Error> {
                    let file_hashes = hash_spec_files(scm, repo_root, spec, package_path)
                        .map_err(|source| Error::FileHashes {
                            package: spec.package_name().to_string(),
                            source,
                        })?;
                    let file_hashes = FileHashes(file_hashes);
                    let hash = file_hashes.hash();
                    table
                        .write()
                        .map_err(|_| Error::Lock)?
                        .insert(key.clone(), (hash, file_hashes));
                    Ok(())
                })
        })?;

        let mut hashes = HashMap::new();
        let mut expanded_hashes = HashMap::new();
        for (key, (hash, file_hashes)) in table.into_inner().map_err(|_| Error::Lock)? {
            hashes.insert(key.clone(), hash);
            expanded_hashes.insert(key, file_hashes);
        }

        Ok(PackageInputsHashes {
            hashes,
            expanded_hashes,
            task_specs,
        })
    }

    /// The file hash for the package inputs of `task_id`
    pub fn hash(&self, task_id: &TaskId) -> Option<&str> {
        let key = self.task_specs.get(task_id)?;
        self.hashes.get(key).map(String::as_str)
    }

    pub fn expanded_hashes(&self, task_id: &TaskId) -> Option<&FileHashes> {
        let key = self.task_specs.get(task_id)?;
        self.expanded_hashes.get(key)
    }

    /// Aggregate hashes keyed by [`PackageInputSpec::key`]
    pub fn spec_hashes(&self) -> &HashMap<String, String> {
        &self.hashes
    }

    fn expanded_hashes_by_task(&self) -> HashMap<TaskId<'static>, FileHashes> {
        self.task_specs
            .iter()
            .filter_map(|(task_id, key)| {
                let file_hashes = self.expanded_hashes.get(key)?;
                Some((task_id.clone(), file_hashes.clone()))
            })
            .collect()
    }
}

fn hash_spec_files(
    scm: &SCM,
    repo_root: &AbsoluteSystemPath,
    spec: &PackageInputSpec,
    package_path: &AnchoredSystemPath,
) -> Result<GitHashes, grove_scm::Error> {
    let mut hashes = scm.get_package_file_hashes(repo_root, package_path, spec.input_globs())?;
    if !spec.dot_env().is_empty() {
        let dot_env = spec
            .dot_env()
            .iter()
            .map(AnchoredSystemPathBuf::from_raw)
            .collect::<Result<Vec<_>, _>>()?;
        let full_package_path = repo_root.resolve(package_path);
        hashes.extend(scm.hash_existing_of(&full_package_path, dot_env.iter())?);
    }
    Ok(hashes)
}

/// Combines package file hashes with everything else that goes into a task
/// hash, and records the results in a [`TaskHashTracker`].
pub struct TaskHasher<'a, R> {
    package_inputs_hashes: PackageInputsHashes,
    run_opts: &'a R,
    env_at_execution_start: &'a EnvironmentVariableMap,
    global_hash: &'a str,
    task_hash_tracker: TaskHashTracker,
}

impl<'a, R: RunOptsHashInfo> TaskHasher<'a, R> {
    pub fn new(
        package_inputs_hashes: PackageInputsHashes,
        run_opts: &'a R,
        env_at_execution_start: &'a EnvironmentVariableMap,
        global_hash: &'a str,
    ) -> Self {
        let task_hash_tracker = TaskHashTracker::new(package_inputs_hashes.expanded_hashes_by_task());
        Self {
            package_inputs_hashes,
            run_opts,
            env_at_execution_start,
            global_hash,
            task_hash_tracker,
        }
    }

    /// Computes and records the hash of `task_id`. Every task in
    /// `dependency_set` must already have been hashed.
    #[tracing::instrument(skip(self, task_definition, package, dependency_set))]
    pub fn calculate_task_hash(
        &self,
        task_id: &TaskId<'static>,
        task_definition: &TaskDefinition,
        package: &PackageInfo,
        dependency_set: HashSet<&TaskNode>,
    ) -> Result<String, Error> {
        let do_framework_inference = self.run_opts.framework_inference();
        let is_monorepo = !self.run_opts.single_package();

        let hash_of_files = self
            .package_inputs_hashes
            .hash(task_id)
            .ok_or_else(|| Error::MissingPackageFileHash(task_id.clone()))?;
        let framework = do_framework_inference
            .then(|| infer_framework(package.dependencies.as_ref()))
            .flatten();
        let framework_slug = framework.map(|f| f.slug());

        let env_vars = match framework {
            Some(framework) => self.framework_task_env(task_id, task_definition, framework)?,
            None => self
                .env_at_execution_start
                .explicit_task_env(&task_definition.env)
                .map_err(|source| Error::EnvPattern {
                    task_id: task_id.clone(),
                    source,
                })?,
        };

        let hashable_env_pairs = env_vars.all.to_hashable();
        let task_dependency_hashes = self.calculate_dependency_hashes(task_id, dependency_set)?;
        let external_deps_hash =
            is_monorepo.then(|| get_external_deps_hash(package.transitive_dependencies.as_ref()));

        if !hashable_env_pairs.is_empty() {
            debug!(task = %task_id, vars = ?hashable_env_pairs, "env vars in task hash");
        }

        let package_dir = package.package_path().to_unix();
        // the root package has no directory of its own
        let package_dir = (!package_dir.is_empty()).then_some(package_dir);

        let task_hashable = TaskHashable {
            global_hash: self.global_hash,
            task_dependency_hashes,
            package_dir,
            hash_of_files,
            external_deps_hash,
            task: task_id.task(),
            outputs: task_definition.hashable_outputs(),
            pass_through_args: self.run_opts.pass_through_args(),
            dot_env: &task_definition.dot_env,
            env: &task_definition.env,
            resolved_env_vars: hashable_env_pairs,
            pass_through_env: task_definition.pass_through_env.as_deref(),
            env_mode: self.run_opts.env_mode(),
        };

        let task_hash = task_hashable.hash();

        self.task_hash_tracker.insert_hash(
            task_id.clone(),
            env_vars,
            task_hash.clone(),
            framework_slug,
        )?;

        Ok(task_hash)
    }

    fn framework_task_env(
        &self,
        task_id: &TaskId<'static>,
        task_definition: &TaskDefinition,
        framework: &grove_frameworks::Framework,
    ) -> Result<DetailedMap, Error> {
        let mut computed_wildcards = framework.env(self.env_at_execution_start);
        debug!(
            package = task_id.package(),
            framework = %framework.slug(),
            wildcards = ?computed_wildcards,
            "inferred framework"
        );

        if let Some(exclude_prefix) = self
            .env_at_execution_start
            .get(CI_VENDOR_ENV_KEY)
            .filter(|prefix| !prefix.is_empty())
        {
            let computed_exclude = format!("!{exclude_prefix}*");
            debug!(wildcard = %computed_exclude, "excluding CI vendor env vars");
            computed_wildcards.push(computed_exclude);
        }

        // Global exclusions apply to inferred variables as well
        let combined_env_patterns: Vec<String> = task_definition
            .env
            .iter()
            .chain(
                self.run_opts
                    .global_env_patterns()
                    .iter()
                    .filter(|p| p.starts_with('!')),
            )
            .cloned()
            .collect();

        self.env_at_execution_start
            .hashable_task_env(&computed_wildcards, &combined_env_patterns)
            .map_err(|source| Error::EnvPattern {
                task_id: task_id.clone(),
                source,
            })
    }

    /// Sorted, deduplicated hashes of the dependencies of `task_id`. The
    /// caller visits tasks in topological order, so every dependency has a
    /// hash by now.
    fn calculate_dependency_hashes(
        &self,
        task_id: &TaskId<'static>,
        dependency_set: HashSet<&TaskNode>,
    ) -> Result<Vec<String>, Error> {
        let mut dependency_hash_set = HashSet::new();

        for dependency_task in dependency_set {
            let TaskNode::Task(dependency_task_id) = dependency_task else {
                continue;
            };
            if dependency_task_id.is_virtual_root() {
                continue;
            }

            let dependency_hash = self.task_hash_tracker.hash(dependency_task_id)?.ok_or_else(
                || Error::MissingDependencyTaskHash {
                    task_id: task_id.clone(),
                    dependency: dependency_task_id.clone(),
                },
            )?;
            dependency_hash_set.insert(dependency_hash);
        }

        let mut dependency_hash_list = dependency_hash_set.into_iter().collect::<Vec<_>>();
        dependency_hash_list.sort_unstable();

        Ok(dependency_hash_list)
    }

    pub fn task_hash_tracker(&self) -> TaskHashTracker {
        self.task_hash_tracker.clone()
    }

    pub fn package_inputs_hashes(&self) -> &PackageInputsHashes {
        &self.package_inputs_hashes
    }
}

/// Hash of the external packages a package depends on. Empty when the
/// closure is unknown.
pub fn get_external_deps_hash(transitive_dependencies: Option<&HashSet<LockfilePackage>>) -> String {
    let Some(transitive_dependencies) = transitive_dependencies else {
        return "".into();
    };

    let mut transitive_deps: Vec<LockfilePackage> =
        transitive_dependencies.iter().cloned().collect();
    transitive_deps.sort_unstable_by(|a, b| {
        a.key
            .cmp(&b.key)
            .then_with(|| a.version.cmp(&b.version))
    });

    LockFilePackages(transitive_deps).hash()
}

#[cfg(test)]
mod test {
    use grovepath::AbsoluteSystemPathBuf;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    use super::*;

    fn tmp_repo(files: &[(&str, &str)]) -> (tempfile::TempDir, AbsoluteSystemPathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let root = AbsoluteSystemPathBuf::try_from(tmp.path())
            .unwrap()
            .to_realpath()
            .unwrap();
        for (path, contents) in files {
            let file = root
                .join_unix_path(grovepath::RelativeUnixPathBuf::new(*path).unwrap())
                .unwrap();
            file.ensure_dir().unwrap();
            file.create_with_contents(contents).unwrap();
        }
        (tmp, root)
    }

    fn package(path: &str) -> PackageInfo {
        PackageInfo {
            package_path: AnchoredSystemPathBuf::from_raw(path).unwrap(),
            ..Default::default()
        }
    }

    fn task(id: &'static str) -> TaskId<'static> {
        TaskId::try_from(id).unwrap()
    }

    #[test]
    fn test_hash_tracker_is_send_and_sync() {
        // shared between hashing threads
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<TaskHashTracker>();
        assert_sync::<TaskHashTracker>();
    }

    #[test_case("a", &[], "a#" ; "no globs")]
    #[test_case("a", &["src/**", "!dist/**", "package.json"], "a#!dist/**!package.json!src/**" ; "sorted")]
    #[test_case("//", &["grove.json"], "//#grove.json" ; "root package")]
    fn test_package_input_spec_key(package: &str, globs: &[&str], expected: &str) {
        let spec = PackageInputSpec::new(package, globs.iter().copied());
        assert_eq!(spec.key(), expected);
    }

    #[test]
    fn test_package_input_spec_key_with_dot_env() {
        let spec = PackageInputSpec::new("a", ["src/**"]).with_dot_env([".env.local", ".env"]);
        assert_eq!(spec.key(), "a#src/**#.env!.env.local");
        assert_ne!(spec, PackageInputSpec::new("a", ["src/**"]));
    }

    #[test]
    fn test_package_input_spec_ignores_glob_order() {
        assert_eq!(
            PackageInputSpec::new("a", ["b", "a"]),
            PackageInputSpec::new("a", ["a", "b"])
        );
        assert_ne!(
            PackageInputSpec::new("a", ["a"]),
            PackageInputSpec::new("b", ["a"])
        );
    }

    #[test]
    fn test_tasks_with_the_same_inputs_share_a_spec() {
        let (_tmp, root) = tmp_repo(&[("a/index.js", "a"), ("a/README.md", "docs")]);
        let packages = HashMap::from([("a".to_string(), package("a"))]);
        let build = task("a#build");
        let lint = task("a#lint");
        let docs = task("a#docs");
        let task_definitions = HashMap::from([
            (build.clone(), TaskDefinition::default()),
            (lint.clone(), TaskDefinition::default()),
            (
                docs.clone(),
                TaskDefinition {
                    inputs: vec!["*.md".into()],
                    ..Default::default()
                },
            ),
        ]);
        let nodes = vec![
            TaskNode::Root,
            TaskNode::Task(build.clone()),
            TaskNode::Task(lint.clone()),
            TaskNode::Task(docs.clone()),
        ];

        let hashes = PackageInputsHashes::calculate_file_hashes(
            &SCM::Manual,
            nodes.iter(),
            &packages,
            &task_definitions,
            &root,
            2,
        )
        .unwrap();

        assert_eq!(hashes.spec_hashes().len(), 2);
        assert_eq!(hashes.hash(&build), hashes.hash(&lint));
        assert_ne!(hashes.hash(&build), hashes.hash(&docs));
        let docs_files = hashes.expanded_hashes(&docs).unwrap();
        let paths: Vec<_> = docs_files.0.keys().map(|p| p.as_str()).collect();
        assert_eq!(paths, vec!["README.md"]);
    }

    #[test]
    fn test_dot_env_files_join_the_file_hash() {
        let (_tmp, root) = tmp_repo(&[
            ("a/.gitignore", ".env\n"),
            ("a/index.js", "a"),
            ("a/.env", "API=1"),
        ]);
        let packages = HashMap::from([("a".to_string(), package("a"))]);
        let plain = task("a#build");
        let with_env = task("a#dev");
        let missing_env = task("a#start");
        let task_definitions = HashMap::from([
            (plain.clone(), TaskDefinition::default()),
            (
                with_env.clone(),
                TaskDefinition {
                    dot_env: vec![".env".into()],
                    ..Default::default()
                },
            ),
            (
                missing_env.clone(),
                TaskDefinition {
                    dot_env: vec![".env.local".into()],
                    ..Default::default()
                },
            ),
        ]);
        let nodes = [
            TaskNode::Task(plain.clone()),
            TaskNode::Task(with_env.clone()),
            TaskNode::Task(missing_env.clone()),
        ];

        let hashes = PackageInputsHashes::calculate_file_hashes(
            &SCM::Manual,
            nodes.iter(),
            &packages,
            &task_definitions,
            &root,
            2,
        )
        .unwrap();

        let keys = |task_id: &TaskId| -> Vec<String> {
            let mut keys: Vec<_> = hashes
                .expanded_hashes(task_id)
                .unwrap()
                .0
                .keys()
                .map(|p| p.as_str().to_string())
                .collect();
            keys.sort();
            keys
        };
        // ignored, but listed explicitly
        assert_eq!(keys(&with_env), vec![".env", ".gitignore", "index.js"]);
        assert_eq!(keys(&plain), vec![".gitignore", "index.js"]);
        // a missing .env file is skipped
        assert_eq!(hashes.hash(&missing_env), hashes.hash(&plain));
        assert_ne!(hashes.hash(&with_env), hashes.hash(&plain));
        assert_eq!(hashes.spec_hashes().len(), 3);
    }

    #[test]
    fn test_unknown_package() {
        let (_tmp, root) = tmp_repo(&[]);
        let build = task("missing#build");
        let task_definitions = HashMap::from([(build.clone(), TaskDefinition::default())]);
        let nodes = [TaskNode::Task(build.clone())];

        let err = PackageInputsHashes::calculate_file_hashes(
            &SCM::Manual,
            nodes.iter(),
            &HashMap::new(),
            &task_definitions,
            &root,
            1,
        )
        .unwrap_err();
        match err {
            Error::UnknownPackage { package, task_id } => {
                assert_eq!(package, "missing");
                assert_eq!(task_id, build);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_malformed_glob_aborts() {
        let (_tmp, root) = tmp_repo(&[("a/index.js", "a")]);
        let packages = HashMap::from([("a".to_string(), package("a"))]);
        let build = task("a#build");
        let task_definitions = HashMap::from([(
            build.clone(),
            TaskDefinition {
                inputs: vec!["src/{a,b".into()],
                ..Default::default()
            },
        )]);
        let nodes = [TaskNode::Task(build)];

        let err = PackageInputsHashes::calculate_file_hashes(
            &SCM::Manual,
            nodes.iter(),
            &packages,
            &task_definitions,
            &root,
            4,
        )
        .unwrap_err();
        assert!(
            matches!(&err, Error::FileHashes { package, .. } if package == "a"),
            "{err}"
        );
    }

    #[test]
    fn test_missing_dependency_hash() {
        let (_tmp, root) = tmp_repo(&[("a/index.js", "a"), ("b/index.js", "b")]);
        let packages = HashMap::from([
            ("a".to_string(), package("a")),
            ("b".to_string(), package("b")),
        ]);
        let a = task("a#build");
        let b = task("b#build");
        let task_definitions = HashMap::from([
            (a.clone(), TaskDefinition::default()),
            (b.clone(), TaskDefinition::default()),
        ]);
        let nodes = [TaskNode::Task(a.clone()), TaskNode::Task(b.clone())];
        let inputs = PackageInputsHashes::calculate_file_hashes(
            &SCM::Manual,
            nodes.iter(),
            &packages,
            &task_definitions,
            &root,
            1,
        )
        .unwrap();

        let config = HashingConfig::default();
        let env = EnvironmentVariableMap::default();
        let hasher = TaskHasher::new(inputs, &config, &env, "global");
        let a_node = TaskNode::Task(a.clone());
        let err = hasher
            .calculate_task_hash(
                &b,
                &task_definitions[&b],
                &packages["b"],
                HashSet::from([&a_node]),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            Error::MissingDependencyTaskHash { ref task_id, ref dependency } if *task_id == b && *dependency == a
        ));

        // once the dependency is hashed, the dependent can be too
        hasher
            .calculate_task_hash(&a, &task_definitions[&a], &packages["a"], HashSet::new())
            .unwrap();
        let root_node = TaskNode::Root;
        hasher
            .calculate_task_hash(
                &b,
                &task_definitions[&b],
                &packages["b"],
                HashSet::from([&a_node, &root_node]),
            )
            .unwrap();
    }

    #[test]
    fn test_missing_package_file_hash() {
        let config = HashingConfig::default();
        let env = EnvironmentVariableMap::default();
        let hasher = TaskHasher::new(PackageInputsHashes::default(), &config, &env, "global");
        let a = task("a#build");
        let err = hasher
            .calculate_task_hash(&a, &TaskDefinition::default(), &package("a"), HashSet::new())
            .unwrap_err();
        assert!(matches!(err, Error::MissingPackageFileHash(id) if id == a));
    }

    #[test]
    fn test_external_deps_hash_is_order_independent() {
        let pkg = |key: &str, version: &str| LockfilePackage {
            key: key.into(),
            version: version.into(),
        };
        let first = HashSet::from([pkg("react", "18.2.0"), pkg("lodash", "4.17.21")]);
        let second = HashSet::from([pkg("lodash", "4.17.21"), pkg("react", "18.2.0")]);
        let bumped = HashSet::from([pkg("lodash", "4.17.21"), pkg("react", "18.3.0")]);

        assert_eq!(get_external_deps_hash(None), "");
        assert_eq!(
            get_external_deps_hash(Some(&first)),
            get_external_deps_hash(Some(&second))
        );
        assert_ne!(
            get_external_deps_hash(Some(&first)),
            get_external_deps_hash(Some(&bumped))
        );
    }

    #[test]
    fn test_task_definition_from_json() {
        let definition: TaskDefinition = serde_json::from_str(
            r#"{"inputs": ["src/**"], "outputs": ["dist/**", "!dist/cache/**"], "env": ["API_*"], "dotEnv": [".env"]}"#,
        )
        .unwrap();
        assert_eq!(definition.inputs, vec!["src/**".to_string()]);
        assert_eq!(definition.dot_env, vec![".env".to_string()]);
        assert_eq!(definition.pass_through_env, None);
        assert_eq!(
            definition.hashable_outputs(),
            TaskOutputs {
                inclusions: vec!["dist/**".into()],
                exclusions: vec!["dist/cache/**".into()],
            }
        );
    }
}
