//! Directory reference resolution: turns a persisted opaque reference into a validated,
//! activated directory handle. One contract, variant implementations picked at startup.
use crate::error::ResolveError;
use crate::record::{BookmarkRecord, OpaqueReference};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

mod path;
#[cfg(unix)]
mod relocatable;

pub use path::PathResolver;
#[cfg(unix)]
pub use relocatable::RelocatableResolver;

/// OS-level resource held while a directory handle is active.
///
/// `release` consumes the activation, so it can run at most once.
pub trait Activation: Send + Sync + fmt::Debug {
    fn release(self: Box<Self>);
}

/// Activation for platforms where a directory needs no explicit grant
#[derive(Debug, Default)]
pub struct NoActivation;

impl Activation for NoActivation {
    fn release(self: Box<Self>) {}
}

/// Outcome of a successful resolution
#[derive(Debug)]
pub struct Resolution {
    /// Validated, existing directory
    pub path: PathBuf,
    pub activation: Box<dyn Activation>,
    /// Replacement reference when the stored one was stale.
    /// The caller persists it; metadata is never touched.
    pub refreshed: Option<OpaqueReference>,
}

impl Resolution {
    pub fn fresh(path: PathBuf, activation: Box<dyn Activation>) -> Self {
        Self {
            path,
            activation,
            refreshed: None,
        }
    }
}

/// Capability interface for turning references into live directories.
///
/// Implementations are stateless with respect to activation counts: bounding
/// how many resolutions are live at once is the cache's job.
pub trait DirectoryResolver: Send + Sync {
    fn kind(&self) -> ResolverKind;

    /// Produce an opaque reference for an existing directory
    fn mint(&self, path: &Path) -> Result<OpaqueReference, ResolveError>;

    /// Locate, validate and activate the directory a record refers to
    fn resolve(&self, record: &BookmarkRecord) -> Result<Resolution, ResolveError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverKind {
    /// Reference is the literal path; nothing to activate
    Path,
    /// Reference tracks the directory's identity and survives renames
    Relocatable,
}

impl ResolverKind {
    /// The variant used when nothing is configured
    pub fn platform_default() -> Self {
        if cfg!(unix) {
            ResolverKind::Relocatable
        } else {
            ResolverKind::Path
        }
    }

    pub fn build(self) -> Arc<dyn DirectoryResolver> {
        match self {
            ResolverKind::Path => Arc::new(PathResolver),
            #[cfg(unix)]
            ResolverKind::Relocatable => Arc::new(RelocatableResolver::default()),
            #[cfg(not(unix))]
            ResolverKind::Relocatable => {
                log::warn!("Relocatable references are unsupported on this platform, using plain paths");
                Arc::new(PathResolver)
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResolverKind::Path => "path",
            ResolverKind::Relocatable => "relocatable",
        }
    }
}

impl fmt::Display for ResolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResolverKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "path" => Ok(ResolverKind::Path),
            "relocatable" | "inode" => Ok(ResolverKind::Relocatable),
            other => Err(format!(
                "unknown resolver '{}' (expected 'path' or 'relocatable')",
                other
            )),
        }
    }
}

/// Decoded form of a relocatable reference: `ino:v2:<dev>:<ino>:<birth>:<path>`.
///
/// `birth` is the directory's creation time in nanoseconds since the epoch,
/// or `-` where the filesystem does not report one. `ino:v1:` tokens predate
/// it and decode with no birth time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RelocatableToken {
    pub dev: u64,
    pub ino: u64,
    pub birth: Option<u128>,
    pub path: PathBuf,
}

impl RelocatableToken {
    pub fn encode(&self) -> Result<OpaqueReference, ResolveError> {
        let birth = match self.birth {
            Some(nanos) => nanos.to_string(),
            None => "-".to_string(),
        };
        Ok(OpaqueReference::new(format!(
            "{}{}:{}:{}:{}",
            crate::constants::RELOCATABLE_REFERENCE_PREFIX,
            self.dev,
            self.ino,
            birth,
            utf8_path(&self.path)?
        )))
    }

    /// None if the reference is not in relocatable form at all
    pub fn decode(reference: &OpaqueReference) -> Option<Result<Self, ResolveError>> {
        let raw = reference.as_str();
        let parsed = match raw.strip_prefix(crate::constants::RELOCATABLE_REFERENCE_PREFIX) {
            Some(body) => Self::parse_body(body, true),
            None => {
                let body =
                    raw.strip_prefix(crate::constants::LEGACY_RELOCATABLE_REFERENCE_PREFIX)?;
                Self::parse_body(body, false)
            }
        };

        Some(parsed.ok_or_else(|| ResolveError::InvalidReference(reference.to_string())))
    }

    fn parse_body(body: &str, with_birth: bool) -> Option<Self> {
        let mut parts = body.splitn(if with_birth { 4 } else { 3 }, ':');
        let dev = parts.next()?.parse().ok()?;
        let ino = parts.next()?.parse().ok()?;
        let birth = if with_birth {
            match parts.next()? {
                "-" => None,
                nanos => Some(nanos.parse().ok()?),
            }
        } else {
            None
        };
        let path = PathBuf::from(parts.next()?);
        path.is_absolute().then_some(Self {
            dev,
            ino,
            birth,
            path,
        })
    }
}

/// Borrow `path` as UTF-8; references and records only hold UTF-8 paths
pub(crate) fn utf8_path(path: &Path) -> Result<&str, ResolveError> {
    path.to_str().ok_or_else(|| {
        ResolveError::InvalidReference(format!("{} is not valid UTF-8", path.display()))
    })
}

/// Make `path` absolute without following symlinks
pub(crate) fn absolute(path: &Path) -> Result<PathBuf, ResolveError> {
    std::path::absolute(path).map_err(|_| {
        ResolveError::InvalidReference(format!("cannot make {} absolute", path.display()))
    })
}

/// Validate that `path` exists and is a directory
pub(crate) fn require_directory(path: &Path) -> Result<std::fs::Metadata, ResolveError> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(meta),
        _ => Err(ResolveError::DirectoryGone(path.to_path_buf())),
    }
}
