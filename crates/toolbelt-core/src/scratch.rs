//! Disposable scratch directories for one pipeline iteration.

use std::io;
use std::path::{Path, PathBuf};

use toolbelt_schema::Platform;

/// A temporary working tree owned by a single platform iteration.
///
/// The directory and everything under it is removed when the value is
/// dropped, so every exit path of the iteration (success, `?`, panic) cleans
/// up.
#[derive(Debug)]
pub struct Scratch {
    temp_dir: tempfile::TempDir,
}

impl Scratch {
    /// Create a scratch directory labelled with the platform name.
    ///
    /// # Errors
    ///
    /// Returns an error if the temp directory cannot be created.
    pub fn for_platform(platform: Platform) -> io::Result<Self> {
        Self::with_label(&platform.as_str().to_lowercase())
    }

    /// Create a scratch directory for run-level work (e.g. config staging).
    ///
    /// # Errors
    ///
    /// Returns an error if the temp directory cannot be created.
    pub fn for_run() -> io::Result<Self> {
        Self::with_label("run")
    }

    fn with_label(label: &str) -> io::Result<Self> {
        let temp_dir = tempfile::Builder::new()
            .prefix(&format!("toolbelt-{label}-"))
            .tempdir()?;
        Ok(Self { temp_dir })
    }

    /// Access the root path
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Path of `rel` inside the scratch root.
    pub fn join(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.temp_dir.path().join(rel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removed_on_drop() {
        let root = {
            let scratch = Scratch::for_platform(Platform::Linux).unwrap();
            std::fs::create_dir_all(scratch.join("Linux/resources")).unwrap();
            std::fs::write(scratch.join("Linux/resources/a.txt"), b"x").unwrap();
            scratch.path().to_path_buf()
        };
        assert!(!root.exists());
    }

    #[test]
    fn test_removed_on_early_return() {
        fn fails(seen: &mut Option<PathBuf>) -> io::Result<()> {
            let scratch = Scratch::for_platform(Platform::Windows)?;
            *seen = Some(scratch.path().to_path_buf());
            Err(io::Error::other("stage failed"))
        }

        let mut seen = None;
        assert!(fails(&mut seen).is_err());
        assert!(!seen.unwrap().exists());
    }

    #[test]
    fn test_label_in_name() {
        let scratch = Scratch::for_platform(Platform::MacOs).unwrap();
        let name = scratch.path().file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("toolbelt-macos-"));
    }
}
