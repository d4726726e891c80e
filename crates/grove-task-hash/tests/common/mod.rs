//! Workspace fixtures for the task hashing tests: a scratch repository, a
//! package table and a task graph that is hashed in topological order.

#![allow(dead_code)]

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    process::Command,
};

use grove_env::EnvironmentVariableMap;
use grove_scm::SCM;
use grove_task_hash::{
    HashingConfig, PackageInfo, PackageInputsHashes, TaskDefinition, TaskHasher,
};
use grove_task_id::{TaskId, TaskNode};
use grovepath::{
    AbsoluteSystemPath, AbsoluteSystemPathBuf, AnchoredSystemPathBuf, RelativeUnixPathBuf,
};
use petgraph::{algo::toposort, graph::NodeIndex, Direction, Graph};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn tmp_dir() -> (tempfile::TempDir, AbsoluteSystemPathBuf) {
    let tmp_dir = tempfile::tempdir().unwrap();
    let dir = AbsoluteSystemPathBuf::try_from(tmp_dir.path())
        .unwrap()
        .to_realpath()
        .unwrap();
    (tmp_dir, dir)
}

pub fn write_files(root: &AbsoluteSystemPath, files: &[(&str, &str)]) {
    for (path, contents) in files {
        let file = root
            .join_unix_path(RelativeUnixPathBuf::new(*path).unwrap())
            .unwrap();
        file.ensure_dir().unwrap();
        file.create_with_contents(contents).unwrap();
    }
}

pub fn git(repo_root: &AbsoluteSystemPath, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_root)
        .output()
        .unwrap_or_else(|e| panic!("failed to run git {:?}: {}", args, e));
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

pub fn init_and_commit(repo_root: &AbsoluteSystemPath) {
    let cmds: &[&[&str]] = &[
        &["init", "."],
        &["config", "--local", "user.name", "test"],
        &["config", "--local", "user.email", "test@example.com"],
        &["config", "--local", "core.autocrlf", "false"],
        &["add", "."],
        &["commit", "-m", "initial"],
    ];
    for cmd in cmds {
        git(repo_root, cmd);
    }
}

pub fn task_id(id: &str) -> TaskId<'static> {
    TaskId::try_from(id).unwrap().into_owned()
}

/// A workspace with packages, task definitions and a task graph. Every task
/// without dependencies hangs off the virtual root, the same way a real task
/// graph is built.
pub struct Workspace {
    pub tmp: tempfile::TempDir,
    pub root: AbsoluteSystemPathBuf,
    pub packages: HashMap<String, PackageInfo>,
    pub task_definitions: HashMap<TaskId<'static>, TaskDefinition>,
    pub config: HashingConfig,
    pub env: EnvironmentVariableMap,
    pub global_hash: String,
    graph: Graph<TaskNode, ()>,
    nodes: HashMap<TaskNode, NodeIndex>,
}

impl Workspace {
    pub fn new(files: &[(&str, &str)]) -> Self {
        let (tmp, root) = tmp_dir();
        write_files(&root, files);
        let mut graph = Graph::new();
        let root_index = graph.add_node(TaskNode::Root);
        Self {
            tmp,
            root,
            packages: HashMap::new(),
            task_definitions: HashMap::new(),
            config: HashingConfig::default(),
            env: EnvironmentVariableMap::default(),
            global_hash: "global-hash".to_string(),
            graph,
            nodes: HashMap::from([(TaskNode::Root, root_index)]),
        }
    }

    pub fn write(&self, files: &[(&str, &str)]) {
        write_files(&self.root, files);
    }

    pub fn add_package(&mut self, name: &str, path: &str) -> &mut PackageInfo {
        self.packages.entry(name.to_string()).or_insert(PackageInfo {
            package_path: AnchoredSystemPathBuf::from_raw(path).unwrap(),
            ..Default::default()
        })
    }

    pub fn set_dependencies(&mut self, package: &str, dependencies: &[(&str, &str)]) {
        let deps: BTreeMap<String, String> = dependencies
            .iter()
            .map(|(name, version)| (name.to_string(), version.to_string()))
            .collect();
        self.packages
            .get_mut(package)
            .expect("package is registered")
            .dependencies = Some(deps);
    }

    /// Adds `id` to the graph, depending on `dependencies`, which must have
    /// been added before.
    pub fn add_task(&mut self, id: &str, definition: TaskDefinition, dependencies: &[&str]) {
        let id = task_id(id);
        self.task_definitions.insert(id.clone(), definition);
        let node = TaskNode::Task(id);
        let index = self.graph.add_node(node.clone());
        self.nodes.insert(node, index);
        if dependencies.is_empty() {
            self.graph.add_edge(self.nodes[&TaskNode::Root], index, ());
        }
        for dependency in dependencies {
            let dependency = TaskNode::Task(task_id(dependency));
            self.graph.add_edge(self.nodes[&dependency], index, ());
        }
    }

    pub fn definition_mut(&mut self, id: &str) -> &mut TaskDefinition {
        self.task_definitions
            .get_mut(&task_id(id))
            .expect("task is registered")
    }

    pub fn file_hashes(&self, scm: &SCM, worker_count: usize) -> PackageInputsHashes {
        PackageInputsHashes::calculate_file_hashes(
            scm,
            self.graph.node_weights(),
            &self.packages,
            &self.task_definitions,
            &self.root,
            worker_count,
        )
        .unwrap()
    }

    /// Runs both hashing phases and returns every task hash
    pub fn hash_with(&self, scm: &SCM, worker_count: usize) -> HashMap<TaskId<'static>, String> {
        let hasher = TaskHasher::new(
            self.file_hashes(scm, worker_count),
            &self.config,
            &self.env,
            &self.global_hash,
        );
        for index in toposort(&self.graph, None).expect("task graph has no cycles") {
            let TaskNode::Task(task_id) = &self.graph[index] else {
                continue;
            };
            let dependency_set: HashSet<&TaskNode> = self
                .graph
                .neighbors_directed(index, Direction::Incoming)
                .map(|dependency| &self.graph[dependency])
                .collect();
            let package = &self.packages[task_id.package()];
            hasher
                .calculate_task_hash(
                    task_id,
                    &self.task_definitions[task_id],
                    package,
                    dependency_set,
                )
                .unwrap();
        }
        hasher.task_hash_tracker().task_hashes().unwrap()
    }

    /// Like [`Self::hash_with`] but every task of a topological level is
    /// hashed on its own thread, sharing one hasher
    pub fn hash_concurrently(&self, scm: &SCM) -> HashMap<TaskId<'static>, String> {
        let hasher = TaskHasher::new(
            self.file_hashes(scm, 4),
            &self.config,
            &self.env,
            &self.global_hash,
        );

        let mut levels: Vec<Vec<NodeIndex>> = Vec::new();
        let mut depth: HashMap<NodeIndex, usize> = HashMap::new();
        for index in toposort(&self.graph, None).expect("task graph has no cycles") {
            let level = self
                .graph
                .neighbors_directed(index, Direction::Incoming)
                .map(|dependency| depth[&dependency] + 1)
                .max()
                .unwrap_or(0);
            depth.insert(index, level);
            if levels.len() <= level {
                levels.resize_with(level + 1, Vec::new);
            }
            levels[level].push(index);
        }

        for level in &levels {
            std::thread::scope(|scope| {
                for &index in level {
                    let TaskNode::Task(task_id) = &self.graph[index] else {
                        continue;
                    };
                    let hasher = &hasher;
                    scope.spawn(move || {
                        let dependency_set: HashSet<&TaskNode> = self
                            .graph
                            .neighbors_directed(index, Direction::Incoming)
                            .map(|dependency| &self.graph[dependency])
                            .collect();
                        hasher
                            .calculate_task_hash(
                                task_id,
                                &self.task_definitions[task_id],
                                &self.packages[task_id.package()],
                                dependency_set,
                            )
                            .unwrap();
                    });
                }
            });
        }
        hasher.task_hash_tracker().task_hashes().unwrap()
    }

    pub fn hash(&self) -> HashMap<TaskId<'static>, String> {
        self.hash_with(&SCM::Manual, 4)
    }
}
