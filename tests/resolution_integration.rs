//! Integration tests for connection resolution.
//!
//! These tests build real directory trees with config files and resolve
//! them through the calculator, the registry and the manager.

mod common;

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::TestTree;
use p4conn::connection::ConnectionManager;
use p4conn::core::config::{Settings, SettingsFile};
use p4conn::core::env::Environment;
use p4conn::core::paths::normalize;
use p4conn::exec::CancellationToken;
use p4conn::resolve::{ConfigFileLocator, ConnectionCalculator};

// =============================================================================
// Test Fixtures
// =============================================================================

fn env() -> Environment {
    Environment::isolated().with_override("P4CONFIG", ".p4config")
}

fn calculate(tree: &TestTree, roots: &[&str]) -> p4conn::resolve::MultipleConnections {
    let roots: Vec<PathBuf> = roots.iter().map(|r| tree.join(r)).collect();
    ConnectionCalculator::new(env(), tree.path())
        .calculate(&roots, &CancellationToken::new())
        .expect("resolution cancelled")
}

fn settings(file: SettingsFile) -> Settings {
    Settings::from_files(file, None)
}

// =============================================================================
// Locator
// =============================================================================

#[test]
fn locator_returns_none_without_config() {
    let tree = TestTree::new();
    let dir = tree.mkdir("x/y/z");
    let mut locator = ConfigFileLocator::new(".p4config-not-anywhere");
    assert_eq!(locator.find_config_dir(&dir), None);
}

#[test]
fn locator_answer_does_not_depend_on_query_order() {
    let tree = TestTree::new();
    tree.p4config("a", "P4PORT=a:1666\n");
    let deep = tree.mkdir("a/b/c/d");

    let mut top_down = ConfigFileLocator::new(".p4config");
    top_down.find_config_dir(&tree.join("a"));
    let from_top = top_down.find_config_dir(&deep);

    let mut bottom_up = ConfigFileLocator::new(".p4config");
    let from_bottom = bottom_up.find_config_dir(&deep);
    bottom_up.find_config_dir(&tree.join("a"));

    assert_eq!(from_top, Some(normalize(&tree.join("a"))));
    assert_eq!(from_top, from_bottom);
}

// =============================================================================
// Filtering
// =============================================================================

#[test]
fn descendant_sharing_config_dir_is_merged() {
    let tree = TestTree::new();
    tree.p4config("a", "P4PORT=s1:1666\n");
    tree.mkdir("a/b");

    let mapping = calculate(&tree, &["a", "a/b"]);
    let roots: Vec<_> = mapping.roots().keys().cloned().collect();
    assert_eq!(roots, vec![normalize(&tree.join("a"))]);
}

#[test]
fn descendant_with_other_server_is_kept() {
    let tree = TestTree::new();
    tree.p4config("a", "P4PORT=s1:1666\n");
    tree.p4config("a/b", "P4PORT=s2:1666\n");

    let mapping = calculate(&tree, &["a", "a/b"]);
    assert_eq!(mapping.len(), 2);
    let outer = mapping.parameters(&normalize(&tree.join("a"))).unwrap();
    let inner = mapping.parameters(&normalize(&tree.join("a/b"))).unwrap();
    assert_eq!(outer.server.as_deref(), Some("s1:1666"));
    assert_eq!(inner.server.as_deref(), Some("s2:1666"));
    assert_eq!(
        mapping.config_dir(&normalize(&tree.join("a/b"))),
        Some(normalize(&tree.join("a/b")).as_path())
    );
}

#[test]
fn descendant_with_identical_parameters_is_merged() {
    let tree = TestTree::new();
    tree.p4config("a", "P4PORT=s1:1666\nP4USER=bob\n");
    tree.p4config("a/b", "P4PORT=s1:1666\n");

    // a/b inherits P4USER from the farther file, so both resolve the same
    let mapping = calculate(&tree, &["a", "a/b"]);
    assert_eq!(mapping.len(), 1);
}

#[test]
fn root_between_equal_roots_keeps_its_files() {
    let tree = TestTree::new();
    tree.p4config("a", "P4PORT=s1:1666\n");
    tree.p4config("a/b", "P4PORT=s2:1666\n");
    tree.p4config("a/b/c", "P4PORT=s1:1666\n");

    let mapping = calculate(&tree, &["a", "a/b", "a/b/c"]);
    assert_eq!(mapping.len(), 3);

    let owner = mapping.root_for(&tree.join("a/b/c/file.txt")).unwrap();
    assert_eq!(owner, normalize(&tree.join("a/b/c")).as_path());
    let params = mapping.parameters(owner).unwrap();
    assert_eq!(params.server.as_deref(), Some("s1:1666"));
    assert_eq!(
        mapping
            .parameters(mapping.root_for(&tree.join("a/b/file.txt")).unwrap())
            .unwrap()
            .server
            .as_deref(),
        Some("s2:1666")
    );
}

#[test]
fn siblings_are_independent() {
    let tree = TestTree::new();
    tree.p4config("left", "P4PORT=s1:1666\n");
    tree.p4config("right", "P4PORT=s1:1666\n");

    let mapping = calculate(&tree, &["left", "right"]);
    assert_eq!(mapping.len(), 2);
}

#[test]
fn directory_named_like_config_is_not_a_config() {
    let tree = TestTree::new();
    tree.p4config("good", "P4PORT=s1:1666\n");
    tree.mkdir("odd/.p4config");

    let mapping = calculate(&tree, &["good", "odd"]);
    assert_eq!(mapping.len(), 2);
    let good = mapping.parameters(&normalize(&tree.join("good"))).unwrap();
    let odd = mapping.parameters(&normalize(&tree.join("odd"))).unwrap();
    assert!(!good.has_problems());
    assert!(odd.is_no_config());
}

#[test]
fn filtering_an_already_filtered_mapping_changes_nothing() {
    let tree = TestTree::new();
    tree.p4config("a", "P4PORT=s1:1666\n");
    tree.p4config("a/b", "P4PORT=s2:1666\n");
    tree.mkdir("a/b/c");
    tree.mkdir("a/d");

    let first = calculate(&tree, &["a", "a/b", "a/b/c", "a/d"]);
    let kept: Vec<String> = first
        .roots()
        .keys()
        .map(|p| p.strip_prefix(tree.path()).unwrap().display().to_string())
        .collect();
    let kept: Vec<&str> = kept.iter().map(String::as_str).collect();
    let second = calculate(&tree, &kept);
    assert_eq!(
        first.roots().keys().collect::<Vec<_>>(),
        second.roots().keys().collect::<Vec<_>>()
    );
}

// =============================================================================
// Precedence
// =============================================================================

#[test]
fn nearest_file_then_farther_file_then_environment() {
    let tree = TestTree::new();
    tree.p4config("a", "P4PORT=far:1666\nP4USER=faruser\n");
    tree.p4config("a/b", "P4PORT=near:1666\n");

    let env = env()
        .with_override("P4PORT", "env:1666")
        .with_override("P4USER", "envuser")
        .with_override("P4CLIENT", "envclient");
    let mapping = ConnectionCalculator::new(env, tree.path())
        .calculate(&[tree.join("a/b")], &CancellationToken::new())
        .unwrap();

    let params = mapping.parameters(&normalize(&tree.join("a/b"))).unwrap();
    assert_eq!(params.server.as_deref(), Some("near:1666"));
    assert_eq!(params.user.as_deref(), Some("faruser"));
    assert_eq!(params.client.as_deref(), Some("envclient"));
}

#[cfg(unix)]
#[test]
fn probe_values_sit_between_files_and_environment() {
    let tree = TestTree::new();
    let p4 = tree.fake_p4(common::PROBING_P4);
    tree.p4config("ws", "P4PORT=file:1666\n");

    let env = Environment::isolated()
        .with_override("P4USER", "envuser")
        .with_override("P4CLIENT", "envclient")
        .with_override("P4PASSWD", "envpass");
    let manager = ConnectionManager::from_settings(
        settings(SettingsFile {
            executable: Some(p4.display().to_string()),
            ..Default::default()
        }),
        tree.path().to_path_buf(),
        vec![tree.join("ws")],
        env,
    );

    let cancel = CancellationToken::new();
    let conn = manager
        .connection_for(&tree.join("ws/src/main.c"), &cancel)
        .unwrap()
        .expect("ws should be covered");
    let params = conn.parameters();
    // config name learned from the probe
    assert_eq!(params.config_file_name.as_deref(), Some(".p4config"));
    assert_eq!(params.server.as_deref(), Some("file:1666"));
    assert_eq!(params.user.as_deref(), Some("probeuser"));
    assert_eq!(params.client.as_deref(), Some("probeclient"));
    assert_eq!(params.password.as_deref(), Some("envpass"));
}

// =============================================================================
// Registry identity
// =============================================================================

#[test]
fn connections_are_shared_per_root() {
    let tree = TestTree::new();
    tree.p4config("one", "P4PORT=s1:1666\n");
    tree.p4config("two", "P4PORT=s2:1666\n");

    let manager = ConnectionManager::from_settings(
        settings(SettingsFile {
            probe_environment: Some(false),
            config_file_name: Some(".p4config".into()),
            ..Default::default()
        }),
        tree.path().to_path_buf(),
        vec![tree.join("one"), tree.join("two")],
        Environment::isolated(),
    );
    let cancel = CancellationToken::new();

    let a = manager.connection_for(&tree.join("one/x.c"), &cancel).unwrap().unwrap();
    let b = manager.connection_for(&tree.join("one/deep/y.c"), &cancel).unwrap().unwrap();
    let c = manager.connection_for(&tree.join("two/z.c"), &cancel).unwrap().unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&a, &c));
    assert!(manager.connection_for(&tree.join("three/w.c"), &cancel).unwrap().is_none());

    let all = manager.all_connections(&cancel).unwrap();
    assert!(Arc::ptr_eq(&all[&normalize(&tree.join("one"))], &a));
}

#[cfg(unix)]
#[test]
fn roots_changed_during_resolution_are_not_lost() {
    let tree = TestTree::new();
    // a slow `p4 set` keeps the first resolution in flight
    let p4 = tree.fake_p4(r#"if [ "$1" = "set" ]; then sleep 1; fi"#);
    tree.p4config("one", "P4PORT=s1:1666\n");
    tree.p4config("two", "P4PORT=s2:1666\n");

    let manager = ConnectionManager::from_settings(
        settings(SettingsFile {
            executable: Some(p4.display().to_string()),
            probe_environment: Some(true),
            config_file_name: Some(".p4config".into()),
            ..Default::default()
        }),
        tree.path().to_path_buf(),
        vec![tree.join("one"), tree.join("two")],
        Environment::isolated(),
    );
    let cancel = CancellationToken::new();

    let in_flight = thread::scope(|scope| {
        let resolving = scope.spawn(|| manager.all_connections(&cancel).unwrap().len());
        thread::sleep(Duration::from_millis(300));
        manager.set_roots(vec![tree.join("one")]);
        resolving.join().unwrap()
    });

    assert_eq!(in_flight, 1);
    let all = manager.all_connections(&cancel).unwrap();
    assert_eq!(all.keys().cloned().collect::<Vec<_>>(), vec![normalize(&tree.join("one"))]);
}
