use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;

use anyhow::{bail, Context, Result};
use plugrack_core::{BuildStrategy, DataLayout, RepoPath};
use serde::{Deserialize, Serialize};

pub const BUILD_INFO_VERSION: i64 = 1;

/// Last-known-installed-state document, used by the build step to decide
/// incremental rebuild work. A missing file reads as the zero value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    #[serde(default)]
    pub repos: Vec<BuildRepo>,
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub strategy: BuildStrategy,
}

/// Kind of a plugin source: a version-controlled clone or a plain directory
/// of files with no single commit identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReposType {
    Git,
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRepo {
    #[serde(rename = "type")]
    pub repos_type: ReposType,
    pub path: RepoPath,
    #[serde(default)]
    pub version: String,
    /// Relative file path to content fingerprint; only kept for plain
    /// sources, where per-file fingerprints substitute for a commit hash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<BTreeMap<String, String>>,
    /// The working tree had uncommitted changes at last build; forces a
    /// rebuild regardless of version match.
    #[serde(default)]
    pub dirty_worktree: bool,
}

impl BuildInfo {
    pub fn read(layout: &DataLayout) -> Result<Self> {
        let path = layout.build_info_path();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed reading build info: {}", path.display()));
            }
        };

        let info: BuildInfo = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing build info: {}", path.display()))?;
        validate_repos(&info.repos)?;
        Ok(info)
    }

    pub fn write(&self, layout: &DataLayout) -> Result<()> {
        validate_repos(&self.repos)?;

        let path = layout.build_info_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)
            .with_context(|| format!("failed serializing build info: {}", path.display()))?;
        fs::write(&path, content)
            .with_context(|| format!("failed writing build info: {}", path.display()))
    }

    pub fn find_by_path(&self, path: &RepoPath) -> Option<&BuildRepo> {
        self.repos.iter().find(|repo| &repo.path == path)
    }

    /// Replaces the entry for `repo.path` wholesale. Stale `files` entries
    /// from a previous build must not survive a rebuild, so there is no
    /// merge variant.
    pub fn upsert_repo(&mut self, repo: BuildRepo) {
        self.repos.retain(|existing| existing.path != repo.path);
        self.repos.push(repo);
    }

    pub fn remove_by_path(&mut self, path: &RepoPath) {
        self.repos.retain(|repo| &repo.path != path);
    }
}

fn validate_repos(repos: &[BuildRepo]) -> Result<()> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(repos.len());
    for repo in repos {
        if !seen.insert(repo.path.as_str()) {
            bail!(
                "duplicate-repository: build info lists '{}' more than once",
                repo.path
            );
        }
    }
    Ok(())
}
