use std::path::{Path, PathBuf};

use emcee_transport::ResourceHandle;

use crate::DecodeError;

/// Maps resource handles (storage keys or paths) onto local files.
///
/// Keys are looked up as given first, then under the root directory. URLs
/// are rejected: fetching is the host application's job.
#[derive(Debug, Clone)]
pub struct ResourceResolver {
    root: PathBuf,
}

impl ResourceResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn resolve(&self, handle: &ResourceHandle) -> Result<PathBuf, DecodeError> {
        if handle.is_url() {
            return Err(DecodeError::Remote(handle.to_string()));
        }

        let raw = handle.as_str();
        let path = Path::new(raw.strip_prefix("file://").unwrap_or(raw));
        if path.exists() {
            return Ok(path.to_path_buf());
        }

        let under_root = self.root.join(path);
        if under_root.exists() {
            return Ok(under_root);
        }

        Err(DecodeError::NotFound(under_root))
    }

    /// Handle for a local file, relative to the root when it lives under it.
    pub fn handle_for(&self, path: &Path) -> ResourceHandle {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        ResourceHandle(relative.to_string_lossy().into_owned())
    }
}

impl Default for ResourceResolver {
    fn default() -> Self {
        Self::new("audio")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_resolve_under_root() {
        let dir = tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("events/7")).expect("mkdir");
        std::fs::write(dir.path().join("events/7/intro.mp3"), b"").expect("write");

        let resolver = ResourceResolver::new(dir.path());
        let resolved = resolver
            .resolve(&ResourceHandle::from("events/7/intro.mp3"))
            .expect("resolve");

        assert_eq!(resolved, dir.path().join("events/7/intro.mp3"));
    }

    #[test]
    fn test_resolve_absolute_and_file_scheme() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("a.wav");
        std::fs::write(&file, b"").expect("write");

        let resolver = ResourceResolver::new("does-not-matter");
        let plain = ResourceHandle(file.to_string_lossy().into_owned());
        let scheme = ResourceHandle(format!("file://{}", file.display()));

        assert_eq!(resolver.resolve(&plain).expect("plain"), file);
        assert_eq!(resolver.resolve(&scheme).expect("scheme"), file);
    }

    #[test]
    fn test_urls_are_remote() {
        let resolver = ResourceResolver::default();
        let err = resolver
            .resolve(&ResourceHandle::from("https://bucket.example.com/a.mp3"))
            .unwrap_err();
        assert!(matches!(err, DecodeError::Remote(_)));
    }

    #[test]
    fn test_missing_key() {
        let resolver = ResourceResolver::new("/nonexistent-root");
        let err = resolver.resolve(&ResourceHandle::from("x.wav")).unwrap_err();
        assert!(matches!(err, DecodeError::NotFound(_)));
    }

    #[test]
    fn test_handle_for_strips_root() {
        let resolver = ResourceResolver::new("audio");
        assert_eq!(
            resolver.handle_for(Path::new("audio/voice/1.wav")),
            ResourceHandle::from("voice/1.wav")
        );
        assert_eq!(
            resolver.handle_for(Path::new("elsewhere/1.wav")),
            ResourceHandle::from("elsewhere/1.wav")
        );
    }
}
