// Relocatable resolver: references carry the directory's (device, inode, birth time)
// identity, so a moved directory can be found again and its reference re-minted.
use super::{
    Activation, DirectoryResolver, RelocatableToken, Resolution, ResolverKind, absolute,
    require_directory,
};
use crate::constants;
use crate::error::ResolveError;
use crate::record::{BookmarkRecord, OpaqueReference};
use log::{debug, info, warn};
use std::collections::VecDeque;
use std::fs::{self, File};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// An open descriptor on the bookmarked directory.
///
/// Holding it pins the directory's identity for as long as the handle is
/// active; closing it is the release.
#[derive(Debug)]
pub struct DirectoryDescriptor {
    file: File,
    path: PathBuf,
}

impl Activation for DirectoryDescriptor {
    fn release(self: Box<Self>) {
        debug!("Closing directory descriptor for {}", self.path.display());
        drop(self.file);
    }
}

#[derive(Debug, Clone)]
pub struct RelocatableResolver {
    search_depth: usize,
}

impl Default for RelocatableResolver {
    fn default() -> Self {
        Self {
            search_depth: constants::RELOCATION_SEARCH_DEPTH,
        }
    }
}

/// Where a token's directory was found, and the identity it has now
struct Located {
    path: PathBuf,
    token: RelocatableToken,
    stale: bool,
}

impl RelocatableResolver {
    pub fn with_search_depth(search_depth: usize) -> Self {
        Self { search_depth }
    }

    fn token_for(path: &Path, meta: &fs::Metadata) -> RelocatableToken {
        RelocatableToken {
            dev: meta.dev(),
            ino: meta.ino(),
            birth: birth_nanos(meta),
            path: path.to_path_buf(),
        }
    }

    fn same_inode(meta: &fs::Metadata, token: &RelocatableToken) -> bool {
        meta.is_dir() && meta.dev() == token.dev && meta.ino() == token.ino
    }

    /// Same inode and, where both sides know it, the same birth time
    fn same_identity(meta: &fs::Metadata, token: &RelocatableToken) -> bool {
        Self::same_inode(meta, token)
            && match (token.birth, birth_nanos(meta)) {
                (Some(recorded), Some(current)) => recorded == current,
                _ => true,
            }
    }

    /// Inode numbers are recycled, so away from the recorded path an inode
    /// match only counts when the birth time confirms it. Without birth times
    /// the directory must at least still carry its recorded name.
    fn is_relocated(candidate: &Path, meta: &fs::Metadata, token: &RelocatableToken) -> bool {
        if !Self::same_inode(meta, token) {
            return false;
        }
        match (token.birth, birth_nanos(meta)) {
            (Some(recorded), Some(current)) => recorded == current,
            _ => candidate.file_name() == token.path.file_name(),
        }
    }

    /// Find the directory a token refers to.
    ///
    /// Order: the recorded path with unchanged identity, then a bounded
    /// search below the nearest surviving ancestor (accepted only when it
    /// yields exactly one confirmed candidate), then whatever directory now
    /// lives at the recorded path.
    fn locate(&self, token: &RelocatableToken) -> Result<Located, ResolveError> {
        let at_recorded = fs::metadata(&token.path).ok().filter(|meta| meta.is_dir());
        if let Some(meta) = &at_recorded
            && Self::same_identity(meta, token)
        {
            let current = Self::token_for(&token.path, meta);
            let stale = current != *token;
            return Ok(Located {
                path: token.path.clone(),
                token: current,
                stale,
            });
        }

        let mut candidates = self.search(token);
        if candidates.len() == 1
            && let Some((path, meta)) = candidates.pop()
        {
            let current = Self::token_for(&path, &meta);
            return Ok(Located {
                path,
                token: current,
                stale: true,
            });
        }
        if candidates.len() > 1 {
            warn!(
                "{} directories match the reference for {}, adopting none",
                candidates.len(),
                token.path.display()
            );
        }

        match at_recorded {
            Some(meta) => {
                debug!(
                    "Directory at {} was replaced, adopting the new one",
                    token.path.display()
                );
                Ok(Located {
                    path: token.path.clone(),
                    token: Self::token_for(&token.path, &meta),
                    stale: true,
                })
            }
            None => Err(ResolveError::DirectoryGone(token.path.clone())),
        }
    }

    /// Breadth-first walk below the nearest existing ancestor of the
    /// recorded path, collecting directories that pass `is_relocated`
    fn search(&self, token: &RelocatableToken) -> Vec<(PathBuf, fs::Metadata)> {
        let mut ancestor = token.path.parent();
        while let Some(dir) = ancestor {
            if dir.is_dir() {
                break;
            }
            ancestor = dir.parent();
        }
        let Some(root) = ancestor else {
            return Vec::new();
        };

        debug!(
            "Reference for {} is stale, searching below {}",
            token.path.display(),
            root.display()
        );

        let mut found = Vec::new();
        let mut queue = VecDeque::from([(root.to_path_buf(), 0usize)]);
        while let Some((dir, depth)) = queue.pop_front() {
            if let Ok(meta) = fs::metadata(&dir)
                && Self::is_relocated(&dir, &meta, token)
            {
                found.push((dir, meta));
                continue;
            }
            if depth >= self.search_depth {
                continue;
            }
            let Ok(entries) = fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries.flatten() {
                // Never follow symlinks; skip names a reference cannot hold
                let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                if is_dir && entry.file_name().to_str().is_some() {
                    queue.push_back((entry.path(), depth + 1));
                }
            }
        }
        found
    }

    fn activate(path: &Path, token: &RelocatableToken) -> Result<DirectoryDescriptor, ResolveError> {
        let file = File::open(path).map_err(|source| ResolveError::ActivationFailed {
            path: path.to_path_buf(),
            source,
        })?;

        // The directory could have been swapped between locate and open
        let meta = file.metadata().map_err(|source| ResolveError::ActivationFailed {
            path: path.to_path_buf(),
            source,
        })?;
        if !Self::same_identity(&meta, token) {
            return Err(ResolveError::DirectoryGone(path.to_path_buf()));
        }

        Ok(DirectoryDescriptor {
            file,
            path: path.to_path_buf(),
        })
    }
}

fn birth_nanos(meta: &fs::Metadata) -> Option<u128> {
    let created = meta.created().ok()?;
    created
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|elapsed| elapsed.as_nanos())
}

impl DirectoryResolver for RelocatableResolver {
    fn kind(&self) -> ResolverKind {
        ResolverKind::Relocatable
    }

    fn mint(&self, path: &Path) -> Result<OpaqueReference, ResolveError> {
        let path = absolute(path)?;
        let meta = require_directory(&path)?;
        Self::token_for(&path, &meta).encode()
    }

    fn resolve(&self, record: &BookmarkRecord) -> Result<Resolution, ResolveError> {
        let (token, upgraded) = match RelocatableToken::decode(&record.opaque_reference) {
            Some(token) => (token?, false),
            None => {
                // Plain path reference: adopt whatever directory lives there now
                let path = PathBuf::from(record.opaque_reference.as_str());
                if !path.is_absolute() {
                    return Err(ResolveError::InvalidReference(
                        record.opaque_reference.to_string(),
                    ));
                }
                let meta = require_directory(&path)?;
                (Self::token_for(&path, &meta), true)
            }
        };

        let located = self.locate(&token)?;
        let descriptor = Self::activate(&located.path, &located.token)?;

        let refreshed = if located.stale || upgraded {
            info!(
                "Re-minting reference for '{}': {} -> {}",
                record.identifier,
                token.path.display(),
                located.path.display()
            );
            Some(located.token.encode()?)
        } else {
            None
        };

        Ok(Resolution {
            path: located.path,
            activation: Box::new(descriptor),
            refreshed,
        })
    }
}
