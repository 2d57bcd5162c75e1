// Plain path resolver: the reference is the directory path itself
use super::{
    Activation, DirectoryResolver, NoActivation, RelocatableToken, Resolution, ResolverKind,
    absolute, require_directory, utf8_path,
};
use crate::error::ResolveError;
use crate::record::{BookmarkRecord, OpaqueReference};
use std::path::{Path, PathBuf};

/// Resolver for platforms without a relocatable-bookmark primitive.
///
/// References never go stale: a moved directory is simply gone.
#[derive(Debug, Default, Clone, Copy)]
pub struct PathResolver;

impl PathResolver {
    fn reference_path(reference: &OpaqueReference) -> Result<PathBuf, ResolveError> {
        // Records minted by the relocatable resolver still carry their path
        if let Some(token) = RelocatableToken::decode(reference) {
            return Ok(token?.path);
        }

        let path = PathBuf::from(reference.as_str());
        if reference.as_str().is_empty() || !path.is_absolute() {
            return Err(ResolveError::InvalidReference(reference.to_string()));
        }
        Ok(path)
    }
}

impl DirectoryResolver for PathResolver {
    fn kind(&self) -> ResolverKind {
        ResolverKind::Path
    }

    fn mint(&self, path: &Path) -> Result<OpaqueReference, ResolveError> {
        let path = absolute(path)?;
        require_directory(&path)?;
        Ok(OpaqueReference::new(utf8_path(&path)?))
    }

    fn resolve(&self, record: &BookmarkRecord) -> Result<Resolution, ResolveError> {
        let path = Self::reference_path(&record.opaque_reference)?;
        require_directory(&path)?;
        let activation: Box<dyn Activation> = Box::new(NoActivation);
        Ok(Resolution::fresh(path, activation))
    }
}
