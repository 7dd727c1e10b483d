use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::RepoPath;

/// Path oracle for the plugrack data directory and the install tree.
///
/// Cloned sources keep their hierarchical `host/user/name` shape under the
/// data root; the install tree is flat, one encoded directory per repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    data_root: PathBuf,
    install_root: PathBuf,
}

impl DataLayout {
    pub fn new(data_root: impl Into<PathBuf>, install_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            install_root: install_root.into(),
        }
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    pub fn repos_dir(&self) -> PathBuf {
        self.data_root.join("repos")
    }

    pub fn repo_dir(&self, path: &RepoPath) -> PathBuf {
        self.repos_dir()
            .join(path.host())
            .join(path.user())
            .join(path.name())
    }

    pub fn plugconf_dir(&self) -> PathBuf {
        self.data_root.join("plugconf")
    }

    pub fn plugconf_path(&self, path: &RepoPath) -> PathBuf {
        self.plugconf_dir()
            .join(path.host())
            .join(path.user())
            .join(format!("{}.vim", path.name()))
    }

    pub fn lock_manifest_path(&self) -> PathBuf {
        self.data_root.join("lock.json")
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_root.join("config.toml")
    }

    pub fn trx_dir(&self) -> PathBuf {
        self.data_root.join("trx")
    }

    /// Provisional directory claimed by the running transaction.
    pub fn trx_lock_dir(&self) -> PathBuf {
        self.trx_dir().join("lock")
    }

    /// Permanent directory of a committed transaction.
    pub fn trx_entry_dir(&self, id: &str) -> PathBuf {
        self.trx_dir().join(id)
    }

    pub fn install_dir(&self, path: &RepoPath) -> PathBuf {
        self.install_root.join(path.encode_to_flat_name())
    }

    pub fn build_info_path(&self) -> PathBuf {
        self.install_root.join("build-info.json")
    }

    pub fn ensure_base_dirs(&self) -> Result<()> {
        for dir in [
            self.data_root.clone(),
            self.repos_dir(),
            self.plugconf_dir(),
            self.trx_dir(),
            self.install_root.clone(),
        ] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}

pub fn default_user_layout() -> Result<DataLayout> {
    if cfg!(windows) {
        let app_data = std::env::var("LOCALAPPDATA")
            .context("LOCALAPPDATA is not set; cannot resolve Windows data directory")?;
        let data_root = PathBuf::from(app_data).join("Plugrack");
        let install_root = data_root.join("install");
        return Ok(DataLayout::new(data_root, install_root));
    }

    let home = std::env::var("HOME").context("HOME is not set; cannot resolve data directory")?;
    let data_root = PathBuf::from(home).join(".plugrack");
    let install_root = data_root.join("install");
    Ok(DataLayout::new(data_root, install_root))
}
