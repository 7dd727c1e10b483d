use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

use crate::{BuildRepo, ReposType};

/// Outcome of the rebuild decision for one desired repository. Anything but
/// `UpToDate` means the build step must rebuild the install-tree entry and
/// replace its cache record wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildReason {
    UpToDate,
    NotInCache,
    VersionChanged { cached: String, current: String },
    DirtyWorktree,
    FileChanged { rel_path: String },
    FileMissing { rel_path: String },
    FileUntracked { rel_path: String },
}

impl RebuildReason {
    pub fn needs_rebuild(&self) -> bool {
        !matches!(self, Self::UpToDate)
    }
}

impl fmt::Display for RebuildReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpToDate => write!(f, "up to date"),
            Self::NotInCache => write!(f, "not built yet"),
            Self::VersionChanged { cached, current } => {
                write!(f, "version changed ({cached} -> {current})")
            }
            Self::DirtyWorktree => write!(f, "worktree was dirty at last build"),
            Self::FileChanged { rel_path } => write!(f, "file changed: {rel_path}"),
            Self::FileMissing { rel_path } => write!(f, "file removed: {rel_path}"),
            Self::FileUntracked { rel_path } => write!(f, "file added: {rel_path}"),
        }
    }
}

/// The contract the build cache supports: compares one cached entry against
/// the repository's current resolved version and, for plain sources, its
/// current on-disk fingerprints.
pub fn decide_rebuild(
    cached: Option<&BuildRepo>,
    current_version: &str,
    current_files: &BTreeMap<String, String>,
) -> RebuildReason {
    let Some(cached) = cached else {
        return RebuildReason::NotInCache;
    };

    if cached.dirty_worktree {
        return RebuildReason::DirtyWorktree;
    }
    if cached.version != current_version {
        return RebuildReason::VersionChanged {
            cached: cached.version.clone(),
            current: current_version.to_string(),
        };
    }

    if cached.repos_type == ReposType::Plain {
        static EMPTY: BTreeMap<String, String> = BTreeMap::new();
        let tracked = cached.files.as_ref().unwrap_or(&EMPTY);
        for (rel_path, fingerprint) in tracked {
            match current_files.get(rel_path) {
                None => {
                    return RebuildReason::FileMissing {
                        rel_path: rel_path.clone(),
                    };
                }
                Some(current) if current != fingerprint => {
                    return RebuildReason::FileChanged {
                        rel_path: rel_path.clone(),
                    };
                }
                Some(_) => {}
            }
        }
        for rel_path in current_files.keys() {
            if !tracked.contains_key(rel_path) {
                return RebuildReason::FileUntracked {
                    rel_path: rel_path.clone(),
                };
            }
        }
    }

    RebuildReason::UpToDate
}

/// Content fingerprint of one file (sha256, hex).
pub fn fingerprint_file(path: &Path) -> Result<String> {
    let content = fs::read(path)
        .with_context(|| format!("failed reading file for fingerprint: {}", path.display()))?;
    Ok(hex::encode(Sha256::digest(&content)))
}

/// Fingerprints every file under `root`, keyed by `/`-separated relative
/// path. This is what populates `files` for plain sources.
pub fn fingerprint_dir(root: &Path) -> Result<BTreeMap<String, String>> {
    let mut files = BTreeMap::new();
    collect_fingerprints(root, root, &mut files)?;
    Ok(files)
}

fn collect_fingerprints(
    root: &Path,
    dir: &Path,
    files: &mut BTreeMap<String, String>,
) -> Result<()> {
    for entry in fs::read_dir(dir)
        .with_context(|| format!("failed reading directory: {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_fingerprints(root, &path, files)?;
            continue;
        }

        let rel_path = path
            .strip_prefix(root)
            .with_context(|| format!("path escapes fingerprint root: {}", path.display()))?;
        let rel_path = rel_path
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.insert(rel_path, fingerprint_file(&path)?);
    }
    Ok(())
}
