//! Maps request identifiers onto directories under the archive root.
//!
//! # Design
//! - Identifiers must be a single normal path segment; anything else is `NotFound`.
//! - The joined path is canonicalised and must remain under the canonical root, so
//!   symlinks cannot lead the archiver outside the configured tree.
//! - Resolution has no side effects and never spawns anything.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{ArchiveError, ArchiveResult};

/// A validated archive request: the identifier and the directory it names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveRequest {
    identifier: String,
    resolved_path: PathBuf,
}

impl ArchiveRequest {
    /// Identifier exactly as it appeared in the request path.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Absolute, canonical directory the archiver runs in.
    #[must_use]
    pub fn resolved_path(&self) -> &Path {
        &self.resolved_path
    }
}

/// Resolves identifiers relative to a configured root directory.
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    root: PathBuf,
}

impl DirectoryResolver {
    /// Build a resolver for the given root. The root is not checked until the first lookup.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory archives are resolved under.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an identifier to an existing directory below the root.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::NotFound`] when the identifier is malformed, the path does not
    /// exist, is not a directory, or escapes the root.
    pub fn resolve(&self, identifier: &str) -> ArchiveResult<ArchiveRequest> {
        validate_identifier(identifier)?;

        let root = self
            .root
            .canonicalize()
            .map_err(|_| ArchiveError::not_found(identifier, "root_unavailable"))?;
        let resolved = root
            .join(identifier)
            .canonicalize()
            .map_err(|_| ArchiveError::not_found(identifier, "missing"))?;
        if !resolved.starts_with(&root) {
            return Err(ArchiveError::not_found(identifier, "outside_root"));
        }

        let metadata = fs::metadata(&resolved)
            .map_err(|_| ArchiveError::not_found(identifier, "missing"))?;
        if !metadata.is_dir() {
            return Err(ArchiveError::not_found(identifier, "not_directory"));
        }

        Ok(ArchiveRequest {
            identifier: identifier.to_string(),
            resolved_path: resolved,
        })
    }
}

fn validate_identifier(identifier: &str) -> ArchiveResult<()> {
    if identifier.is_empty() {
        return Err(ArchiveError::not_found(identifier, "empty"));
    }
    if identifier.contains('\0') || identifier.contains('/') {
        return Err(ArchiveError::not_found(identifier, "invalid_segment"));
    }
    let mut components = Path::new(identifier).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(ArchiveError::not_found(identifier, "invalid_segment")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use tempfile::TempDir;

    fn photo_root() -> Result<TempDir, Box<dyn Error>> {
        let temp = TempDir::new()?;
        fs::create_dir_all(temp.path().join("7kna"))?;
        fs::write(temp.path().join("7kna").join("1.jpg"), b"jpeg")?;
        fs::write(temp.path().join("notes.txt"), b"plain file")?;
        Ok(temp)
    }

    fn reason_of(err: &ArchiveError) -> Option<&'static str> {
        match err {
            ArchiveError::NotFound { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    #[test]
    fn resolves_existing_directory_to_absolute_path() -> Result<(), Box<dyn Error>> {
        let temp = photo_root()?;
        let resolver = DirectoryResolver::new(temp.path());

        let request = resolver.resolve("7kna")?;
        assert_eq!(request.identifier(), "7kna");
        assert!(request.resolved_path().is_absolute());
        assert_eq!(
            request.resolved_path(),
            temp.path().canonicalize()?.join("7kna")
        );
        Ok(())
    }

    #[test]
    fn missing_identifier_is_not_found() -> Result<(), Box<dyn Error>> {
        let temp = photo_root()?;
        let resolver = DirectoryResolver::new(temp.path());

        let err = resolver
            .resolve("doesnotexist")
            .err()
            .ok_or("expected rejection")?;
        assert_eq!(reason_of(&err), Some("missing"));
        Ok(())
    }

    #[test]
    fn regular_file_is_not_found() -> Result<(), Box<dyn Error>> {
        let temp = photo_root()?;
        let resolver = DirectoryResolver::new(temp.path());

        let err = resolver.resolve("notes.txt").err().ok_or("expected rejection")?;
        assert_eq!(reason_of(&err), Some("not_directory"));
        Ok(())
    }

    #[test]
    fn traversal_segments_are_rejected() -> Result<(), Box<dyn Error>> {
        let temp = photo_root()?;
        let resolver = DirectoryResolver::new(temp.path().join("7kna"));

        for identifier in ["..", ".", "", "7kna/..", "/etc", "a\0b"] {
            let err = resolver
                .resolve(identifier)
                .err()
                .ok_or("expected rejection")?;
            assert!(
                matches!(err, ArchiveError::NotFound { .. }),
                "{identifier:?} should be rejected"
            );
        }
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escaping_root_is_rejected() -> Result<(), Box<dyn Error>> {
        let temp = photo_root()?;
        let root = temp.path().join("root");
        fs::create_dir_all(&root)?;
        std::os::unix::fs::symlink(temp.path().join("7kna"), root.join("escape"))?;
        let resolver = DirectoryResolver::new(&root);

        let err = resolver.resolve("escape").err().ok_or("expected rejection")?;
        assert_eq!(reason_of(&err), Some("outside_root"));
        Ok(())
    }

    #[test]
    fn missing_root_is_not_found() {
        let resolver = DirectoryResolver::new("/definitely/not/a/photo/root");
        assert!(matches!(
            resolver.resolve("7kna"),
            Err(ArchiveError::NotFound {
                reason: "root_unavailable",
                ..
            })
        ));
    }
}
