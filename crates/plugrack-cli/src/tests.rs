use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};

use plugrack_core::{DataLayout, RepoPath};
use plugrack_state::{LockManifest, Transaction, LOCK_VERSION};

use crate::dispatch;

static TEST_LAYOUT_COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_layout() -> DataLayout {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let sequence = TEST_LAYOUT_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut root = std::env::temp_dir();
    root.push(format!(
        "plugrack-cli-tests-{}-{}-{}",
        std::process::id(),
        nanos,
        sequence
    ));
    DataLayout::new(root.join("data"), root.join("install"))
}

fn cleanup(layout: &DataLayout) {
    if let Some(root) = layout.data_root().parent() {
        let _ = fs::remove_dir_all(root);
    }
}

#[test]
fn add_tracks_repository_and_commits_a_transaction() {
    let layout = test_layout();

    dispatch::cmd_add(&layout, "https://github.com/user/plugin.git", false).expect("must add");

    let manifest = LockManifest::read(&layout).expect("must read");
    let path = RepoPath::normalize("user/plugin").expect("must normalize");
    assert!(manifest.find_by_path(&path).is_some());
    let profile = manifest.current_profile().expect("must have current profile");
    assert_eq!(profile.name, "default");
    assert_eq!(profile.repos_paths, vec![path]);
    assert!(layout.trx_entry_dir("1").is_dir());
    assert!(!layout.trx_lock_dir().exists());

    cleanup(&layout);
}

#[test]
fn add_rejects_already_tracked_repository_and_releases_the_lock() {
    let layout = test_layout();
    dispatch::cmd_add(&layout, "user/plugin", false).expect("must add");

    let err = dispatch::cmd_add(&layout, "user/plugin", false).expect_err("must reject");
    assert!(err.to_string().contains("already tracked"), "{err}");

    // The failed command must not leave the lock held.
    let trx = Transaction::start(&layout).expect("must start after failed add");
    trx.done().expect("must commit");

    cleanup(&layout);
}

#[test]
fn rm_removes_repository_from_repos_and_profiles() {
    let layout = test_layout();
    dispatch::cmd_add(&layout, "user/plugin", false).expect("must add");
    dispatch::cmd_add(&layout, "user/other", false).expect("must add");

    dispatch::cmd_rm(&layout, "user/plugin").expect("must remove");

    let manifest = LockManifest::read(&layout).expect("must read");
    let removed = RepoPath::normalize("user/plugin").expect("must normalize");
    let kept = RepoPath::normalize("user/other").expect("must normalize");
    assert!(manifest.find_by_path(&removed).is_none());
    assert!(manifest.find_by_path(&kept).is_some());
    let profile = manifest.current_profile().expect("must have current profile");
    assert_eq!(profile.repos_paths, vec![kept]);

    cleanup(&layout);
}

#[test]
fn rm_rejects_untracked_repository() {
    let layout = test_layout();
    let err = dispatch::cmd_rm(&layout, "user/missing").expect_err("must reject");
    assert!(err.to_string().contains("not tracked"), "{err}");
    cleanup(&layout);
}

#[test]
fn profile_new_set_and_rm_flow() {
    let layout = test_layout();

    dispatch::cmd_profile_new(&layout, "work").expect("must create");
    dispatch::cmd_profile_set(&layout, "work").expect("must switch");

    let manifest = LockManifest::read(&layout).expect("must read");
    assert_eq!(manifest.current_profile_name, "work");

    let err = dispatch::cmd_profile_rm(&layout, "work").expect_err("must protect current");
    assert!(err.to_string().contains("current profile"), "{err}");

    dispatch::cmd_profile_new(&layout, "default").expect("must create");
    dispatch::cmd_profile_set(&layout, "default").expect("must switch");
    dispatch::cmd_profile_rm(&layout, "work").expect("must remove");

    let manifest = LockManifest::read(&layout).expect("must read");
    assert!(manifest.find_profile("work").is_none());

    cleanup(&layout);
}

#[test]
fn profile_set_rejects_unknown_profile() {
    let layout = test_layout();
    let err = dispatch::cmd_profile_set(&layout, "nope").expect_err("must reject");
    assert!(err.to_string().contains("does not exist"), "{err}");
    cleanup(&layout);
}

#[test]
fn profile_add_repo_requires_tracked_repository() {
    let layout = test_layout();
    dispatch::cmd_profile_new(&layout, "work").expect("must create");

    let err =
        dispatch::cmd_profile_add_repo(&layout, "work", "user/plugin").expect_err("must reject");
    assert!(err.to_string().contains("not tracked"), "{err}");

    dispatch::cmd_add(&layout, "user/plugin", false).expect("must add");
    dispatch::cmd_profile_add_repo(&layout, "work", "user/plugin").expect("must add to profile");

    let manifest = LockManifest::read(&layout).expect("must read");
    let path = RepoPath::normalize("user/plugin").expect("must normalize");
    assert!(manifest
        .find_profile("work")
        .expect("must exist")
        .repos_paths
        .contains(&path));

    cleanup(&layout);
}

#[test]
fn migrate_rolls_a_v1_manifest_forward() {
    let layout = test_layout();
    fs::create_dir_all(layout.data_root()).expect("must create dirs");
    fs::write(
        layout.lock_manifest_path(),
        r#"{"active_profile": "dev", "load_init": true, "repos": [], "profiles": [], "version": 1}"#,
    )
    .expect("must write v1 manifest");

    dispatch::cmd_migrate(&layout).expect("must migrate");

    let manifest = LockManifest::read(&layout).expect("must read");
    assert_eq!(manifest.version, LOCK_VERSION);
    assert_eq!(manifest.current_profile_name, "dev");
    let on_disk = fs::read_to_string(layout.lock_manifest_path()).expect("must read file");
    assert!(on_disk.contains("current_profile_name"));
    assert!(!on_disk.contains("active_profile"));

    cleanup(&layout);
}

#[test]
fn plan_and_status_run_on_an_empty_data_directory() {
    let layout = test_layout();
    dispatch::cmd_plan(&layout).expect("must plan");
    dispatch::cmd_status(&layout).expect("must report");
    dispatch::cmd_list(&layout).expect("must list");
    cleanup(&layout);
}

#[test]
fn plan_reports_unbuilt_repositories() {
    let layout = test_layout();
    dispatch::cmd_add(&layout, "user/plugin", false).expect("must add");
    // No build-info entry exists yet, so the plan must ask for a rebuild;
    // this only checks it does not error without the install tree.
    dispatch::cmd_plan(&layout).expect("must plan");
    cleanup(&layout);
}
