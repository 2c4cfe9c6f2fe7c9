//! Table-driven tests for `Configuration` and settings loading.

use std::path::PathBuf;

use rocketeer::config::{load_configuration, load_configuration_from_str, load_settings_from_str};
use rocketeer::config::{GitAuthType, LogFormat};
use rocketeer::gitops::ApplyPolicy;

/// A single configuration loading test case.
struct ConfigTestCase {
    /// Test case name for identification.
    name: &'static str,
    content: &'static str,
    should_succeed: bool,
    /// Expected error substring (if should_succeed is false).
    expected_error: Option<&'static str>,
}

const CONFIGURATION_TESTS: &[ConfigTestCase] = &[
    ConfigTestCase {
        name: "valid_minimal_yaml",
        content: r#"
apiVersion: app.rocketeer.io/v1alpha1
kind: Configuration
metadata:
  name: web
spec:
  gitUrl: https://github.com/acme/deploy.git
  gitRef: main
"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "valid_json_with_folder",
        content: r#"{
            "apiVersion": "app.rocketeer.io/v1alpha1",
            "kind": "Configuration",
            "metadata": {"name": "web", "namespace": "team-a"},
            "spec": {"gitUrl": "git@github.com:acme/deploy.git", "gitRef": "release/1.2", "descriptorsFolder": "deploy/k8s"}
        }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "invalid_yaml",
        content: "apiVersion: [unclosed",
        should_succeed: false,
        expected_error: Some("parse"),
    },
    ConfigTestCase {
        name: "wrong_api_version",
        content: r#"
apiVersion: app.rocketeer.io/v1
kind: Configuration
metadata:
  name: web
spec:
  gitUrl: https://github.com/acme/deploy.git
  gitRef: main
"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "missing_git_url",
        content: r#"
apiVersion: app.rocketeer.io/v1alpha1
kind: Configuration
metadata:
  name: web
spec:
  gitRef: main
"#,
        should_succeed: false,
        expected_error: Some("gitUrl"),
    },
    ConfigTestCase {
        name: "uppercase_name",
        content: r#"
apiVersion: app.rocketeer.io/v1alpha1
kind: Configuration
metadata:
  name: Web
spec:
  gitUrl: https://github.com/acme/deploy.git
  gitRef: main
"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "ref_with_double_dot",
        content: r#"
apiVersion: app.rocketeer.io/v1alpha1
kind: Configuration
metadata:
  name: web
spec:
  gitUrl: https://github.com/acme/deploy.git
  gitRef: main..evil
"#,
        should_succeed: false,
        expected_error: Some("Invalid git ref"),
    },
    ConfigTestCase {
        name: "folder_outside_repository",
        content: r#"
apiVersion: app.rocketeer.io/v1alpha1
kind: Configuration
metadata:
  name: web
spec:
  gitUrl: https://github.com/acme/deploy.git
  gitRef: main
  descriptorsFolder: ../secrets
"#,
        should_succeed: false,
        expected_error: Some("descriptorsFolder"),
    },
];

#[test]
fn test_configuration_loading() {
    for test_case in CONFIGURATION_TESTS {
        let result = load_configuration_from_str(test_case.content);

        if test_case.should_succeed {
            assert!(
                result.is_ok(),
                "Test '{}': Expected success but got error: {:?}",
                test_case.name,
                result.err()
            );
        } else {
            assert!(
                result.is_err(),
                "Test '{}': Expected error but got success",
                test_case.name
            );

            if let Some(expected_error) = test_case.expected_error {
                let error_msg = result.err().unwrap().to_string();
                assert!(
                    error_msg.contains(expected_error),
                    "Test '{}': Expected error containing '{}', got '{}'",
                    test_case.name,
                    expected_error,
                    error_msg
                );
            }
        }
    }
}

#[test]
fn test_configuration_from_file() {
    let temp = tempfile::TempDir::new().unwrap();
    let path: PathBuf = temp.path().join("configuration.yaml");
    std::fs::write(&path, CONFIGURATION_TESTS[0].content).unwrap();

    let config = load_configuration(&path).unwrap();
    assert_eq!(config.metadata.name, "web");
    assert_eq!(config.spec.descriptors_folder(), "k8s");
}

#[test]
fn test_full_settings_file() {
    let settings = load_settings_from_str(
        r#"
workDir: /var/lib/rocketeer
syncIntervalSecs: 120
storeTimeoutSecs: 10
maxDescriptorBytes: 65536
applyPolicy: always-update
git:
  timeoutSecs: 60
  recurseSubmodules: false
  auth:
    type: token
    tokenEnvVar: DEPLOY_TOKEN
logging:
  format: json
  filter: rocketeer=debug,info
"#,
    )
    .unwrap();

    assert_eq!(settings.work_dir, PathBuf::from("/var/lib/rocketeer"));
    assert_eq!(settings.sync_interval_secs, 120);
    assert_eq!(settings.store_timeout_secs, 10);
    assert_eq!(settings.max_descriptor_bytes, 65536);
    assert_eq!(settings.apply_policy, ApplyPolicy::AlwaysUpdate);
    assert_eq!(settings.git.timeout_secs, 60);
    assert!(!settings.git.recurse_submodules);
    assert_eq!(settings.git.auth.auth_type, GitAuthType::Token);
    assert_eq!(settings.logging.format, LogFormat::Json);
}

#[test]
fn test_invalid_settings() {
    for (name, content) in [
        ("zero_store_timeout", "storeTimeoutSecs: 0"),
        ("zero_max_bytes", "maxDescriptorBytes: 0"),
        ("unknown_policy", "applyPolicy: sometimes"),
        ("unknown_auth_type", "git:\n  auth:\n    type: password"),
    ] {
        assert!(
            load_settings_from_str(content).is_err(),
            "Test '{}': Expected error but got success",
            name
        );
    }
}
