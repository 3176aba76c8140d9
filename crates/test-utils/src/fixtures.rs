use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;

/// A throwaway directory tree used as the watch base in tests.
pub struct DirTree {
    dir: TempDir,
}

impl DirTree {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("recmd-")
            .tempdir()
            .context("creating temp dir")?;
        Ok(Self { dir })
    }

    /// Build a tree from a list of relative directories.
    pub fn with_dirs(dirs: &[&str]) -> Result<Self> {
        let tree = Self::new()?;
        for dir in dirs {
            tree.mkdirs(dir)?;
        }
        Ok(tree)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    pub fn mkdirs(&self, rel: &str) -> Result<PathBuf> {
        let path = self.join(rel);
        fs::create_dir_all(&path).with_context(|| format!("creating {path:?}"))?;
        Ok(path)
    }

    /// Write `contents` to `rel`, creating parent directories as needed.
    pub fn write(&self, rel: &str, contents: &str) -> Result<PathBuf> {
        let path = self.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {parent:?}"))?;
        }
        fs::write(&path, contents).with_context(|| format!("writing {path:?}"))?;
        Ok(path)
    }

    pub fn touch(&self, rel: &str) -> Result<PathBuf> {
        self.write(rel, "")
    }

    pub fn remove_dir(&self, rel: &str) -> Result<()> {
        let path = self.join(rel);
        fs::remove_dir_all(&path).with_context(|| format!("removing {path:?}"))
    }
}
