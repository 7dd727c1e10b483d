use std::collections::BTreeMap;
use std::fs;

use anyhow::{bail, Result};
use plugrack_core::{Config, DataLayout, RepoPath};
use plugrack_state::{
    decide_rebuild, fingerprint_dir, BuildInfo, LockManifest, Profile, RepoEntry, Transaction,
    TrxId,
};

use crate::render;

/// Every mutating flow follows the same envelope: acquire the transaction,
/// read, mutate, write, commit. A failed mutation releases the lock and
/// surfaces the original error.
fn with_transaction<T>(
    layout: &DataLayout,
    mutate: impl FnOnce() -> Result<T>,
) -> Result<T> {
    let trx = Transaction::start(layout)?;
    match mutate() {
        Ok(value) => {
            trx.done()?;
            Ok(value)
        }
        Err(err) => {
            // Best-effort release; the command error is the one to surface.
            let _ = trx.cancel();
            Err(err)
        }
    }
}

pub fn cmd_list(layout: &DataLayout) -> Result<()> {
    let manifest = LockManifest::read(layout)?;
    if manifest.repos.is_empty() {
        println!("no repositories tracked");
    }
    for entry in &manifest.repos {
        let version = if entry.version.is_empty() {
            "(unfetched)"
        } else {
            entry.version.as_str()
        };
        println!("{} {version}", entry.path);
    }
    if !manifest.profiles.is_empty() {
        println!();
        for profile in &manifest.profiles {
            let marker = if profile.name == manifest.current_profile_name {
                "*"
            } else {
                " "
            };
            println!(
                "{marker} {} ({} repos)",
                profile.name,
                profile.repos_paths.len()
            );
        }
    }
    Ok(())
}

pub fn cmd_add(layout: &DataLayout, raw: &str, local: bool) -> Result<()> {
    let path = if local {
        RepoPath::normalize_local(raw)?
    } else {
        RepoPath::normalize(raw)?
    };

    with_transaction(layout, || {
        let mut manifest = LockManifest::read(layout)?;
        if manifest.find_by_path(&path).is_some() {
            bail!("repository '{path}' is already tracked");
        }
        manifest.repos.push(RepoEntry {
            path: path.clone(),
            version: String::new(),
            active: true,
        });

        // The first repo-affecting mutation materializes the current
        // profile; fresh manifests start with none.
        let current = manifest.current_profile_name.clone();
        if manifest.find_profile(&current).is_none() {
            manifest.profiles.push(Profile {
                name: current.clone(),
                repos_paths: Vec::new(),
                load_init: manifest.load_init,
            });
        }
        if let Some(profile) = manifest.find_profile_mut(&current) {
            if !profile.repos_paths.contains(&path) {
                profile.repos_paths.push(path.clone());
            }
        }

        manifest.write(layout)
    })?;

    render::print_status("added", path.as_str());
    Ok(())
}

pub fn cmd_rm(layout: &DataLayout, raw: &str) -> Result<()> {
    let path = RepoPath::normalize_local(raw)?;

    with_transaction(layout, || {
        let mut manifest = LockManifest::read(layout)?;
        if manifest.find_by_path(&path).is_none() {
            bail!("repository '{path}' is not tracked");
        }
        manifest.remove_by_path(&path);
        for profile in &mut manifest.profiles {
            profile.repos_paths.retain(|listed| listed != &path);
        }
        manifest.write(layout)
    })?;

    render::print_status("removed", path.as_str());
    Ok(())
}

pub fn cmd_profile_list(layout: &DataLayout) -> Result<()> {
    let manifest = LockManifest::read(layout)?;
    if manifest.profiles.is_empty() {
        println!("no profiles (current would be '{}')", manifest.current_profile_name);
        return Ok(());
    }
    for profile in &manifest.profiles {
        let marker = if profile.name == manifest.current_profile_name {
            "*"
        } else {
            " "
        };
        println!("{marker} {}", profile.name);
        for path in &profile.repos_paths {
            println!("    {path}");
        }
    }
    Ok(())
}

pub fn cmd_profile_get(layout: &DataLayout) -> Result<()> {
    let manifest = LockManifest::read(layout)?;
    println!("{}", manifest.current_profile_name);
    Ok(())
}

pub fn cmd_profile_set(layout: &DataLayout, name: &str) -> Result<()> {
    with_transaction(layout, || {
        let mut manifest = LockManifest::read(layout)?;
        if manifest.find_profile(name).is_none() {
            bail!("profile '{name}' does not exist");
        }
        manifest.current_profile_name = name.to_string();
        manifest.write(layout)
    })?;

    render::print_status("profile", name);
    Ok(())
}

pub fn cmd_profile_new(layout: &DataLayout, name: &str) -> Result<()> {
    with_transaction(layout, || {
        let mut manifest = LockManifest::read(layout)?;
        if manifest.find_profile(name).is_some() {
            bail!("profile '{name}' already exists");
        }
        manifest.profiles.push(Profile {
            name: name.to_string(),
            repos_paths: Vec::new(),
            load_init: true,
        });
        manifest.write(layout)
    })?;

    render::print_status("created", name);
    Ok(())
}

pub fn cmd_profile_rm(layout: &DataLayout, name: &str) -> Result<()> {
    with_transaction(layout, || {
        let mut manifest = LockManifest::read(layout)?;
        if name == manifest.current_profile_name {
            bail!("cannot remove the current profile '{name}'; switch first");
        }
        if manifest.find_profile(name).is_none() {
            bail!("profile '{name}' does not exist");
        }
        manifest.profiles.retain(|profile| profile.name != name);
        manifest.write(layout)
    })?;

    render::print_status("removed", name);
    Ok(())
}

pub fn cmd_profile_add_repo(layout: &DataLayout, name: &str, raw: &str) -> Result<()> {
    let path = RepoPath::normalize_local(raw)?;

    with_transaction(layout, || {
        let mut manifest = LockManifest::read(layout)?;
        if manifest.find_by_path(&path).is_none() {
            bail!("repository '{path}' is not tracked; run 'plugrack add' first");
        }
        let Some(profile) = manifest.find_profile_mut(name) else {
            bail!("profile '{name}' does not exist");
        };
        if !profile.repos_paths.contains(&path) {
            profile.repos_paths.push(path.clone());
        }
        manifest.write(layout)
    })?;

    render::print_status("added", &format!("{path} to profile {name}"));
    Ok(())
}

pub fn cmd_profile_rm_repo(layout: &DataLayout, name: &str, raw: &str) -> Result<()> {
    let path = RepoPath::normalize_local(raw)?;

    with_transaction(layout, || {
        let mut manifest = LockManifest::read(layout)?;
        let Some(profile) = manifest.find_profile_mut(name) else {
            bail!("profile '{name}' does not exist");
        };
        if !profile.repos_paths.contains(&path) {
            bail!("profile '{name}' does not list '{path}'");
        }
        profile.repos_paths.retain(|listed| listed != &path);
        manifest.write(layout)
    })?;

    render::print_status("removed", &format!("{path} from profile {name}"));
    Ok(())
}

pub fn cmd_migrate(layout: &DataLayout) -> Result<()> {
    let version = with_transaction(layout, || {
        // Reading rolls the schema forward; writing makes it stick.
        let manifest = LockManifest::read(layout)?;
        manifest.write(layout)?;
        Ok(manifest.version)
    })?;

    render::print_status("migrated", &format!("lock manifest is at version {version}"));
    Ok(())
}

pub fn cmd_plan(layout: &DataLayout) -> Result<()> {
    let manifest = LockManifest::read(layout)?;
    let info = BuildInfo::read(layout)?;
    let config = Config::read(&layout.config_path())?;

    println!("strategy: {}", config.build.strategy.as_str());
    if manifest.repos.is_empty() {
        println!("nothing to build");
        return Ok(());
    }

    for entry in &manifest.repos {
        let repo_dir = layout.repo_dir(&entry.path);
        let is_plain = repo_dir.is_dir() && !repo_dir.join(".git").exists();
        let current_files = if is_plain {
            fingerprint_dir(&repo_dir)?
        } else {
            BTreeMap::new()
        };
        let reason = decide_rebuild(info.find_by_path(&entry.path), &entry.version, &current_files);
        if reason.needs_rebuild() {
            render::print_status("rebuild", &format!("{}: {reason}", entry.path));
        } else {
            println!("ok      {}", entry.path);
        }
    }
    Ok(())
}

pub fn cmd_status(layout: &DataLayout) -> Result<()> {
    let manifest = LockManifest::read(layout)?;
    let config = Config::read(&layout.config_path())?;

    println!("data root: {}", layout.data_root().display());
    println!("install root: {}", layout.install_root().display());
    println!("lock manifest: version {}, {} repos", manifest.version, manifest.repos.len());
    println!("strategy: {}", config.build.strategy.as_str());

    if layout.trx_lock_dir().is_dir() {
        render::print_warning(&format!(
            "transaction lock is held: {}",
            layout.trx_lock_dir().display()
        ));
    }
    println!("committed transactions: {}", committed_transaction_count(layout)?);
    Ok(())
}

fn committed_transaction_count(layout: &DataLayout) -> Result<usize> {
    let trx_dir = layout.trx_dir();
    if !trx_dir.is_dir() {
        return Ok(0);
    }
    let mut count = 0;
    for entry in fs::read_dir(&trx_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if entry.file_type()?.is_dir() && TrxId::new(name).is_ok() {
            count += 1;
        }
    }
    Ok(count)
}
