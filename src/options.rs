use crate::constants;
use crate::resolver::ResolverKind;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// How caller-supplied file names are joined onto a bookmarked directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathPolicy {
    /// Only a single plain file name; `..`, separators and absolute paths are rejected
    #[default]
    Strict,
    /// Plain concatenation, nested and parent components allowed
    Concatenate,
}

impl PathPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PathPolicy::Strict => "strict",
            PathPolicy::Concatenate => "concatenate",
        }
    }
}

impl fmt::Display for PathPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PathPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(PathPolicy::Strict),
            "concatenate" | "concat" => Ok(PathPolicy::Concatenate),
            other => Err(format!("unknown path policy '{}'", other)),
        }
    }
}

/// Configuration options for the bookmark manager
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// JSON record store location
    pub store_path: PathBuf,
    /// Maximum simultaneously active directory handles
    pub capacity: usize,
    /// Which reference resolver to run
    pub resolver_kind: ResolverKind,
    pub path_policy: PathPolicy,
    /// Threshold for `sweep_idle`; never applied automatically
    pub idle_timeout: Duration,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            store_path: constants::default_store_path(),
            capacity: constants::DEFAULT_CACHE_CAPACITY,
            resolver_kind: ResolverKind::platform_default(),
            path_policy: PathPolicy::default(),
            idle_timeout: constants::DEFAULT_IDLE_TIMEOUT,
        }
    }
}

/// Builder for ManagerOptions
pub struct ManagerOptionsBuilder {
    options: ManagerOptions,
}

impl ManagerOptionsBuilder {
    pub fn new() -> Self {
        Self {
            options: ManagerOptions::default(),
        }
    }

    pub fn store_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.store_path = path.into();
        self
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.options.capacity = capacity;
        self
    }

    pub fn resolver_kind(mut self, kind: ResolverKind) -> Self {
        self.options.resolver_kind = kind;
        self
    }

    pub fn path_policy(mut self, policy: PathPolicy) -> Self {
        self.options.path_policy = policy;
        self
    }

    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.options.idle_timeout = timeout;
        self
    }

    pub fn build(self) -> ManagerOptions {
        self.options
    }
}

impl Default for ManagerOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
