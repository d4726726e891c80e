//! Framework detection for grove.
//! Identifies which JavaScript framework a package is built with and which
//! environment variables that framework inlines into its build output.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::OnceLock,
};

use serde::{Deserialize, Serialize};

const FRAMEWORKS_JSON: &str = include_str!("frameworks.json");

static FRAMEWORKS: OnceLock<Vec<Framework>> = OnceLock::new();

#[derive(Debug, PartialEq, Eq, Hash, Clone, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum MatchStrategy {
    /// every listed dependency is present
    All,
    /// at least one listed dependency is present
    Some,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct DependencyMatch {
    strategy: MatchStrategy,
    dependencies: Vec<String>,
}

impl DependencyMatch {
    fn matches(&self, installed: &BTreeMap<String, String>) -> bool {
        let mut required = self.dependencies.iter();
        match self.strategy {
            MatchStrategy::All => required.all(|name| installed.contains_key(name)),
            MatchStrategy::Some => required.any(|name| installed.contains_key(name)),
        }
    }
}

/// Extra wildcards that only apply while `when` holds in the environment
#[derive(Debug, Clone, PartialEq, Deserialize)]
struct ConditionalEnv {
    when: EnvCondition,
    include: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct EnvCondition {
    key: String,
    /// `None` only requires the variable to be set
    value: Option<String>,
}

impl EnvCondition {
    fn holds(&self, env: &HashMap<String, String>) -> bool {
        match (env.get(&self.key), &self.value) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(actual), Some(expected)) => actual == expected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Framework {
    slug: Slug,
    env_wildcards: Vec<String>,
    #[serde(default)]
    env_conditionals: Vec<ConditionalEnv>,
    dependency_match: DependencyMatch,
}

impl Framework {
    pub fn slug(&self) -> Slug {
        self.slug.clone()
    }

    /// Env wildcards that affect this framework's output, including any
    /// conditional wildcards whose condition holds in `env_at_execution_start`.
    pub fn env(&self, env_at_execution_start: &HashMap<String, String>) -> Vec<String> {
        let conditional = self
            .env_conditionals
            .iter()
            .filter(|conditional| conditional.when.holds(env_at_execution_start))
            .flat_map(|conditional| conditional.include.iter());

        self.env_wildcards
            .iter()
            .chain(conditional)
            .cloned()
            .collect()
    }
}

fn frameworks() -> &'static [Framework] {
    FRAMEWORKS.get_or_init(|| {
        serde_json::from_str(FRAMEWORKS_JSON).expect("embedded frameworks.json is invalid")
    })
}

/// Finds the first framework, in table order, whose dependency matcher is
/// satisfied by `dependencies`. The order matters: `blitz` ships `next` so
/// blitz has to be checked first.
pub fn infer_framework(
    dependencies: Option<&BTreeMap<String, String>>,
) -> Option<&'static Framework> {
    let dependencies = dependencies?;
    frameworks()
        .iter()
        .find(|framework| framework.dependency_match.matches(dependencies))
}
