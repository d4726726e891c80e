use std::{
    collections::HashMap,
    env,
    ops::{Deref, DerefMut},
};

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum Error {
    #[error("Failed to parse regex: {0}")]
    Regex(#[from] regex::Error),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EnvironmentVariableMap(HashMap<String, String>);

/// Task env split by where each variable was picked up
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BySource {
    pub explicit: EnvironmentVariableMap,
    pub matching: EnvironmentVariableMap,
}

/// The env a task hash depends on, with its breakdown by source
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DetailedMap {
    pub all: EnvironmentVariableMap,
    pub by_source: BySource,
}

pub type EnvironmentVariablePairs = Vec<String>;

/// Variables matched by inclusion patterns and by `!` patterns, kept apart
#[derive(Debug, Default)]
pub struct WildcardMaps {
    pub inclusions: EnvironmentVariableMap,
    pub exclusions: EnvironmentVariableMap,
}

impl WildcardMaps {
    fn resolve(self) -> EnvironmentVariableMap {
        let mut output = self.inclusions;
        output.difference(&self.exclusions);
        output
    }
}

impl From<HashMap<String, String>> for EnvironmentVariableMap {
    fn from(map: HashMap<String, String>) -> Self {
        EnvironmentVariableMap(map)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvironmentVariableMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        EnvironmentVariableMap(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl Deref for EnvironmentVariableMap {
    type Target = HashMap<String, String>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for EnvironmentVariableMap {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl EnvironmentVariableMap {
    /// Captures the environment of the current process
    pub fn infer() -> Self {
        EnvironmentVariableMap(env::vars().collect())
    }

    pub fn into_inner(self) -> HashMap<String, String> {
        self.0
    }

    /// Sorted `KEY=VALUE` pairs, the form that is fed into task hashes
    pub fn to_hashable(&self) -> EnvironmentVariablePairs {
        let mut pairs: Vec<_> = self.iter().map(|(k, v)| format!("{k}={v}")).collect();
        pairs.sort_unstable();
        pairs
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.keys().cloned().collect();
        names.sort();

        names
    }

    /// Copies every variable of `another` into `self`, replacing existing
    /// values
    pub fn union(&mut self, another: &EnvironmentVariableMap) {
        self.0
            .extend(another.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    /// Drops every variable that is named in `another`
    pub fn difference(&mut self, another: &EnvironmentVariableMap) {
        self.0.retain(|name, _| !another.contains_key(name));
    }

    fn wildcard_map_from_wildcards(
        &self,
        wildcard_patterns: &[impl AsRef<str>],
    ) -> Result<WildcardMaps, Error> {
        let set = WildcardSet::compile(wildcard_patterns)?;
        let mut output = WildcardMaps::default();
        for (name, value) in &self.0 {
            if set.includes(name) {
                output.inclusions.insert(name.clone(), value.clone());
            }
            if set.excludes(name) {
                output.exclusions.insert(name.clone(), value.clone());
            }
        }
        Ok(output)
    }

    /// The variables matched by `wildcard_patterns`, minus the ones matched
    /// by its `!` patterns
    pub fn from_wildcards(
        &self,
        wildcard_patterns: &[impl AsRef<str>],
    ) -> Result<EnvironmentVariableMap, Error> {
        if wildcard_patterns.is_empty() {
            return Ok(EnvironmentVariableMap::default());
        }

        let resolved_set = self.wildcard_map_from_wildcards(wildcard_patterns)?;
        Ok(resolved_set.resolve())
    }

    /// Like [`Self::from_wildcards`] but keeps the matches of inclusions and
    /// exclusions apart, so exclusions can be applied to other maps too.
    pub fn wildcard_map_from_wildcards_unresolved(
        &self,
        wildcard_patterns: &[impl AsRef<str>],
    ) -> Result<WildcardMaps, Error> {
        if wildcard_patterns.is_empty() {
            return Ok(WildcardMaps::default());
        }

        self.wildcard_map_from_wildcards(wildcard_patterns)
    }

    /// Resolves the variables a task hash depends on when a framework was
    /// inferred. `computed_wildcards` come from the framework, `task_env` from
    /// the task definition. Exclusions in `task_env` win over framework
    /// inclusions.
    pub fn hashable_task_env(
        &self,
        computed_wildcards: &[impl AsRef<str>],
        task_env: &[impl AsRef<str>],
    ) -> Result<DetailedMap, Error> {
        let inference_env_var_map = self.from_wildcards(computed_wildcards)?;
        let user_env_var_set = self.wildcard_map_from_wildcards_unresolved(task_env)?;

        let mut all = EnvironmentVariableMap::default();
        all.union(&user_env_var_set.inclusions);
        all.union(&inference_env_var_map);
        all.difference(&user_env_var_set.exclusions);

        let mut explicit = EnvironmentVariableMap::default();
        explicit.union(&user_env_var_set.inclusions);
        explicit.difference(&user_env_var_set.exclusions);

        let mut matching = EnvironmentVariableMap::default();
        matching.union(&inference_env_var_map);
        matching.difference(&user_env_var_set.exclusions);

        Ok(DetailedMap {
            all,
            by_source: BySource { explicit, matching },
        })
    }

    /// Resolves the variables a task hash depends on when no framework was
    /// inferred: only the declared `task_env` patterns count.
    pub fn explicit_task_env(&self, task_env: &[impl AsRef<str>]) -> Result<DetailedMap, Error> {
        let all = self.from_wildcards(task_env)?;
        Ok(DetailedMap {
            all: all.clone(),
            by_source: BySource {
                explicit: all,
                matching: EnvironmentVariableMap::default(),
            },
        })
    }
}

const WILDCARD: char = '*';
const WILDCARD_ESCAPE: char = '\\';
const REGEX_WILDCARD_SEGMENT: &str = ".*";

/// A list of wildcard patterns compiled into one anchored regex for the
/// inclusions and one for the `!` exclusions
struct WildcardSet {
    include: Option<Regex>,
    exclude: Option<Regex>,
}

impl WildcardSet {
    fn compile(patterns: &[impl AsRef<str>]) -> Result<Self, Error> {
        let mut include = Vec::new();
        let mut exclude = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            match pattern.strip_prefix('!') {
                Some(excluded) => exclude.push(wildcard_to_regex_pattern(excluded)),
                None => {
                    // `\!` at the start is a literal bang
                    let pattern = pattern
                        .strip_prefix(WILDCARD_ESCAPE)
                        .filter(|rest| rest.starts_with('!'))
                        .unwrap_or(pattern);
                    include.push(wildcard_to_regex_pattern(pattern));
                }
            }
        }
        Ok(Self {
            include: any_of(&include)?,
            exclude: any_of(&exclude)?,
        })
    }

    fn includes(&self, name: &str) -> bool {
        self.include.as_ref().is_some_and(|re| re.is_match(name))
    }

    fn excludes(&self, name: &str) -> bool {
        self.exclude.as_ref().is_some_and(|re| re.is_match(name))
    }
}

fn any_of(patterns: &[String]) -> Result<Option<Regex>, Error> {
    if patterns.is_empty() {
        return Ok(None);
    }
    Ok(Some(Regex::new(&format!("^({})$", patterns.join("|")))?))
}

/// Translates a wildcard pattern into a regex. `*` matches anything, `\*` is
/// a literal star, every other character is literal. Runs of `*` collapse
/// into a single `.*`.
fn wildcard_to_regex_pattern(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len());
    let mut literal = String::new();
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            WILDCARD_ESCAPE if chars.peek() == Some(&WILDCARD) => {
                chars.next();
                literal.push(WILDCARD);
            }
            WILDCARD => {
                regex.push_str(&regex::escape(&literal));
                literal.clear();
                if !regex.ends_with(REGEX_WILDCARD_SEGMENT) {
                    regex.push_str(REGEX_WILDCARD_SEGMENT);
                }
            }
            c => literal.push(c),
        }
    }
    regex.push_str(&regex::escape(&literal));
    regex
}
