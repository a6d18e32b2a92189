use std::{
    fs,
    path::{Path, PathBuf},
};
use tempfile::TempDir;

/// A fabricated filesystem root for probing tests
pub struct SysfsTree {
    dir: TempDir,
}

impl SysfsTree {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    pub fn write(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
        path
    }

    /// `temp{idx}_label` and `temp{idx}_input` in `dir`
    pub fn temp(&self, dir: &str, idx: u32, label: &str, millidegrees: i64) {
        self.write(&format!("{}/temp{}_label", dir, idx), &format!("{}\n", label));
        self.write(
            &format!("{}/temp{}_input", dir, idx),
            &format!("{}\n", millidegrees),
        );
    }
}
