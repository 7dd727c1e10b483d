use std::collections::HashSet;
use std::fs;
use std::io;

use anyhow::{anyhow, bail, Context, Result};
use plugrack_core::{DataLayout, RepoPath};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Current lock manifest schema version. v1 named the current profile
/// `active_profile`; v2 renamed it to `current_profile_name`.
pub const LOCK_VERSION: i64 = 2;

/// Desired-state document: which repositories should be installed and which
/// profiles exist. Unknown on-disk versions are rolled forward on read by the
/// migration steps below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockManifest {
    #[serde(default)]
    pub current_profile_name: String,
    #[serde(default = "load_init_default")]
    pub load_init: bool,
    #[serde(default)]
    pub repos: Vec<RepoEntry>,
    #[serde(default)]
    pub profiles: Vec<Profile>,
    #[serde(default = "first_version")]
    pub version: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoEntry {
    pub path: RepoPath,
    #[serde(default)]
    pub version: String,
    // Legacy flag kept for migration compatibility; profiles decide what
    // actually loads.
    #[serde(default = "load_init_default")]
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    #[serde(rename = "path", default)]
    pub repos_paths: Vec<RepoPath>,
    #[serde(default = "load_init_default")]
    pub load_init: bool,
}

impl Default for LockManifest {
    fn default() -> Self {
        Self {
            current_profile_name: "default".to_string(),
            load_init: true,
            repos: Vec::new(),
            profiles: Vec::new(),
            version: LOCK_VERSION,
        }
    }
}

impl LockManifest {
    /// Reads the manifest, rolling an older schema forward. A missing file
    /// yields the fresh default at the latest version.
    pub fn read(layout: &DataLayout) -> Result<Self> {
        let path = layout.lock_manifest_path();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed reading lock manifest: {}", path.display()));
            }
        };

        let mut manifest: LockManifest = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing lock manifest: {}", path.display()))?;
        // Raw bytes are parsed a second time: migration steps read legacy
        // fields that no longer exist in the typed schema.
        let raw_value: Value = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing lock manifest: {}", path.display()))?;
        migrate(&mut manifest, &raw_value)?;
        validate_repos(&manifest.repos)?;
        Ok(manifest)
    }

    /// Validates and writes the manifest, creating parent directories.
    pub fn write(&self, layout: &DataLayout) -> Result<()> {
        validate_repos(&self.repos)?;

        let path = layout.lock_manifest_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)
            .with_context(|| format!("failed serializing lock manifest: {}", path.display()))?;
        fs::write(&path, content)
            .with_context(|| format!("failed writing lock manifest: {}", path.display()))
    }

    pub fn find_by_path(&self, path: &RepoPath) -> Option<&RepoEntry> {
        self.repos.iter().find(|entry| &entry.path == path)
    }

    pub fn find_by_path_mut(&mut self, path: &RepoPath) -> Option<&mut RepoEntry> {
        self.repos.iter_mut().find(|entry| &entry.path == path)
    }

    /// Removes the entry for `path`. A no-op when absent; callers that care
    /// about absence must check with [`LockManifest::find_by_path`] first.
    pub fn remove_by_path(&mut self, path: &RepoPath) {
        self.repos.retain(|entry| &entry.path != path);
    }

    pub fn find_profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.iter().find(|profile| profile.name == name)
    }

    pub fn find_profile_mut(&mut self, name: &str) -> Option<&mut Profile> {
        self.profiles.iter_mut().find(|profile| profile.name == name)
    }

    pub fn current_profile(&self) -> Option<&Profile> {
        self.find_profile(&self.current_profile_name)
    }
}

type MigrationStep = fn(&mut LockManifest, &Value) -> Result<()>;

/// Ordered single-step upgrades; the step for version `n` lives at index
/// `n - 1`. Each step reads legacy fields from the raw document, mutates the
/// typed manifest, and must leave the version bump to the driver so a failed
/// step can be retried safely.
const MIGRATION_STEPS: &[MigrationStep] = &[migrate_v1_to_v2];

fn migrate(manifest: &mut LockManifest, raw: &Value) -> Result<()> {
    if manifest.version < 1 {
        bail!(
            "migration-failed: unsupported lock manifest version {}",
            manifest.version
        );
    }
    while ((manifest.version - 1) as usize) < MIGRATION_STEPS.len() {
        let step = MIGRATION_STEPS[(manifest.version - 1) as usize];
        step(manifest, raw)?;
        manifest.version += 1;
    }
    Ok(())
}

fn migrate_v1_to_v2(manifest: &mut LockManifest, raw: &Value) -> Result<()> {
    let active = raw
        .get("active_profile")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            anyhow!("migration-failed: lock manifest v1 has no 'active_profile' field")
        })?;
    manifest.current_profile_name = active.to_string();
    Ok(())
}

fn validate_repos(repos: &[RepoEntry]) -> Result<()> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(repos.len());
    for entry in repos {
        if !seen.insert(entry.path.as_str()) {
            bail!(
                "duplicate-repository: lock manifest lists '{}' more than once",
                entry.path
            );
        }
    }
    Ok(())
}

fn load_init_default() -> bool {
    true
}

fn first_version() -> i64 {
    1
}
