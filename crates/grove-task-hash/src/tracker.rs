use std::{
    collections::HashMap,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use grove_env::DetailedMap;
use grove_frameworks::Slug as FrameworkSlug;
use grove_hash::FileHashes;
use grove_task_id::TaskId;
use grovepath::AnchoredSystemPathBuf;

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
    Local,
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheHitMetadata {
    pub source: CacheSource,
    /// Milliseconds saved by not running the task
    pub time_saved: u64,
}

/// Everything learned about each task while hashing and running it. Cheap to
/// clone, all clones share the same state.
#[derive(Default, Debug, Clone)]
pub struct TaskHashTracker {
    state: Arc<RwLock<TaskHashTrackerState>>,
}

#[derive(Default, Debug)]
struct TaskHashTrackerState {
    package_task_env_vars: HashMap<TaskId<'static>, DetailedMap>,
    package_task_hashes: HashMap<TaskId<'static>, String>,
    package_task_framework: HashMap<TaskId<'static>, FrameworkSlug>,
    package_task_outputs: HashMap<TaskId<'static>, Vec<AnchoredSystemPathBuf>>,
    package_task_cache: HashMap<TaskId<'static>, CacheHitMetadata>,
    package_task_inputs_expanded_hashes: HashMap<TaskId<'static>, FileHashes>,
}

impl TaskHashTracker {
    pub fn new(input_expanded_hashes: HashMap<TaskId<'static>, FileHashes>) -> Self {
        Self {
            state: Arc::new(RwLock::new(TaskHashTrackerState {
                package_task_inputs_expanded_hashes: input_expanded_hashes,
                ..Default::default()
            })),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, TaskHashTrackerState>, Error> {
        self.state.read().map_err(|_| Error::Lock)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, TaskHashTrackerState>, Error> {
        self.state.write().map_err(|_| Error::Lock)
    }

    pub fn hash(&self, task_id: &TaskId) -> Result<Option<String>, Error> {
        Ok(self.read()?.package_task_hashes.get(task_id).cloned())
    }

    /// Snapshot of every task hash computed so far
    pub fn task_hashes(&self) -> Result<HashMap<TaskId<'static>, String>, Error> {
        Ok(self.read()?.package_task_hashes.clone())
    }

    pub(crate) fn insert_hash(
        &self,
        task_id: TaskId<'static>,
        env_vars: DetailedMap,
        hash: String,
        framework_slug: Option<FrameworkSlug>,
    ) -> Result<(), Error> {
        let mut state = self.write()?;
        // each task is hashed exactly once per run
        if state.package_task_hashes.contains_key(&task_id) {
            return Err(Error::DuplicateTaskHash(task_id));
        }
        state
            .package_task_env_vars
            .insert(task_id.clone(), env_vars);
        if let Some(framework) = framework_slug {
            state
                .package_task_framework
                .insert(task_id.clone(), framework);
        }
        state.package_task_hashes.insert(task_id, hash);
        Ok(())
    }

    pub fn env_vars(&self, task_id: &TaskId) -> Result<Option<DetailedMap>, Error> {
        Ok(self.read()?.package_task_env_vars.get(task_id).cloned())
    }

    pub fn framework(&self, task_id: &TaskId) -> Result<Option<FrameworkSlug>, Error> {
        Ok(self.read()?.package_task_framework.get(task_id).cloned())
    }

    pub fn expanded_outputs(
        &self,
        task_id: &TaskId,
    ) -> Result<Option<Vec<AnchoredSystemPathBuf>>, Error> {
        Ok(self.read()?.package_task_outputs.get(task_id).cloned())
    }

    pub fn insert_expanded_outputs(
        &self,
        task_id: TaskId<'static>,
        outputs: Vec<AnchoredSystemPathBuf>,
    ) -> Result<(), Error> {
        self.write()?.package_task_outputs.insert(task_id, outputs);
        Ok(())
    }

    pub fn cache_status(&self, task_id: &TaskId) -> Result<Option<CacheHitMetadata>, Error> {
        Ok(self.read()?.package_task_cache.get(task_id).copied())
    }

    pub fn insert_cache_status(
        &self,
        task_id: TaskId<'static>,
        cache_status: CacheHitMetadata,
    ) -> Result<(), Error> {
        self.write()?.package_task_cache.insert(task_id, cache_status);
        Ok(())
    }

    pub fn get_expanded_inputs(&self, task_id: &TaskId) -> Result<Option<FileHashes>, Error> {
        Ok(self
            .read()?
            .package_task_inputs_expanded_hashes
            .get(task_id)
            .cloned())
    }
}
