//! Working-copy synchronization against local git remotes.

mod common;

use std::time::Duration;

use common::harness::{git, init_remote};
use common::TestHarness;

use rocketeer::config::GitSettings;
use rocketeer::gitops::loader::DescriptorLoader;
use rocketeer::gitops::{GitOpsError, RepositorySynchronizer, SyncAction, SyncTarget};

fn synchronizer() -> RepositorySynchronizer {
    RepositorySynchronizer::new(GitSettings {
        timeout_secs: 30,
        ..Default::default()
    })
}

fn target(harness: &TestHarness, git_ref: &str) -> SyncTarget {
    SyncTarget::new(&harness.work_dir, "team-a", "web", harness.url(), git_ref)
}

fn descriptor_names(path: &std::path::Path) -> Vec<String> {
    DescriptorLoader::default()
        .load(&path.join("k8s"))
        .unwrap()
        .map(|d| d.unwrap().file_name)
        .collect()
}

#[tokio::test]
async fn test_clone_then_up_to_date_then_pull() {
    let harness = TestHarness::new();
    harness.commit_descriptor("k8s/a.yaml", "kind: ConfigMap\n");
    let sync = synchronizer();
    let target = target(&harness, "main");

    let copy = sync.sync(&target).await.unwrap();
    assert_eq!(copy.action, SyncAction::Cloned);
    assert_eq!(copy.revision, harness.head());
    assert_eq!(copy.path(), harness.working_copy("team-a", "web").as_path());
    drop(copy);

    let copy = sync.sync(&target).await.unwrap();
    assert_eq!(copy.action, SyncAction::UpToDate);
    drop(copy);

    let head = harness.commit_descriptor("k8s/b.yaml", "kind: ConfigMap\n");
    let copy = sync.sync(&target).await.unwrap();
    assert_eq!(copy.action, SyncAction::Pulled);
    assert_eq!(copy.revision, head);
    assert_eq!(descriptor_names(copy.path()), vec!["a.yaml", "b.yaml"]);
}

#[tokio::test]
async fn test_corrupted_working_copy_is_recloned() {
    let harness = TestHarness::new();
    harness.commit_descriptor("k8s/a.yaml", "kind: ConfigMap\n");
    let sync = synchronizer();
    let target = target(&harness, "main");
    drop(sync.sync(&target).await.unwrap());

    // Break HEAD and leave a stray descriptor that is not in the repository.
    std::fs::write(target.path.join(".git/HEAD"), "garbage").unwrap();
    std::fs::write(target.path.join("k8s/stray.yaml"), "kind: ConfigMap\n").unwrap();

    let copy = sync.sync(&target).await.unwrap();
    assert_eq!(copy.action, SyncAction::Recloned);
    assert_eq!(copy.revision, harness.head());
    assert_eq!(descriptor_names(copy.path()), vec!["a.yaml"]);
}

#[tokio::test]
async fn test_rewritten_upstream_history_is_recloned() {
    let harness = TestHarness::new();
    harness.commit_descriptor("k8s/a.yaml", "kind: ConfigMap\n");
    let sync = synchronizer();
    let target = target(&harness, "main");
    let first = sync.sync(&target).await.unwrap();
    let old_revision = first.revision.clone();
    drop(first);

    // Replace the tip commit so the working copy can no longer fast-forward.
    harness.remove("k8s/a.yaml");
    harness.write("k8s/b.yaml", "kind: ConfigMap\n");
    git(&harness.remote_dir, &["add", "-A"]);
    git(&harness.remote_dir, &["commit", "--amend", "-m", "rewritten"]);
    let new_head = harness.head();
    assert_ne!(new_head, old_revision);

    let copy = sync.sync(&target).await.unwrap();
    assert_eq!(copy.action, SyncAction::Recloned);
    assert_eq!(copy.revision, new_head);
    assert_eq!(descriptor_names(copy.path()), vec!["b.yaml"]);
}

#[tokio::test]
async fn test_non_repository_directory_is_replaced() {
    let harness = TestHarness::new();
    harness.commit_descriptor("k8s/a.yaml", "kind: ConfigMap\n");
    let target = target(&harness, "main");
    std::fs::create_dir_all(target.path.join("k8s")).unwrap();
    std::fs::write(target.path.join("k8s/leftover.yaml"), "x").unwrap();

    let copy = synchronizer().sync(&target).await.unwrap();
    assert_eq!(copy.action, SyncAction::Recloned);
    assert_eq!(descriptor_names(copy.path()), vec!["a.yaml"]);
}

#[tokio::test]
async fn test_other_remote_is_recloned() {
    let harness = TestHarness::new();
    harness.commit_descriptor("k8s/a.yaml", "kind: ConfigMap\n");
    let sync = synchronizer();
    drop(sync.sync(&target(&harness, "main")).await.unwrap());

    let other = harness.temp_path().join("other");
    init_remote(&other);
    std::fs::create_dir_all(other.join("k8s")).unwrap();
    std::fs::write(other.join("k8s/z.yaml"), "kind: ConfigMap\n").unwrap();
    git(&other, &["add", "."]);
    git(&other, &["commit", "-m", "other"]);

    let moved = SyncTarget::new(
        &harness.work_dir,
        "team-a",
        "web",
        other.display().to_string(),
        "main",
    );
    let copy = sync.sync(&moved).await.unwrap();
    assert_eq!(copy.action, SyncAction::Recloned);
    assert_eq!(descriptor_names(copy.path()), vec!["z.yaml"]);
}

#[tokio::test]
async fn test_ref_change_is_recloned() {
    let harness = TestHarness::new();
    harness.commit_descriptor("k8s/a.yaml", "kind: ConfigMap\n");
    git(&harness.remote_dir, &["branch", "release"]);
    let sync = synchronizer();
    drop(sync.sync(&target(&harness, "main")).await.unwrap());

    let copy = sync.sync(&target(&harness, "release")).await.unwrap();
    assert_eq!(copy.action, SyncAction::Recloned);
    assert_eq!(copy.git_ref, "release");
    assert_eq!(
        git(copy.path(), &["rev-parse", "--abbrev-ref", "HEAD"]),
        "release"
    );
}

#[tokio::test]
async fn test_unknown_ref_fails() {
    let harness = TestHarness::new();
    let err = synchronizer()
        .sync(&target(&harness, "does-not-exist"))
        .await
        .unwrap_err();
    assert!(matches!(err, GitOpsError::GitRefNotFound(ref r) if r == "does-not-exist"));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_syncs_of_one_target_are_serialized() {
    let harness = TestHarness::new();
    let sync = synchronizer();
    let target = target(&harness, "main");

    let held = sync.sync(&target).await.unwrap();
    let blocked = tokio::time::timeout(Duration::from_millis(200), sync.sync(&target)).await;
    assert!(blocked.is_err(), "second sync ran while the first copy was held");

    // Other targets are not blocked.
    let other = SyncTarget::new(&harness.work_dir, "team-b", "web", harness.url(), "main");
    drop(sync.sync(&other).await.unwrap());

    drop(held);
    let copy = sync.sync(&target).await.unwrap();
    assert_eq!(copy.action, SyncAction::UpToDate);
}
