// ABOUTME: Integration tests for the persisted environment state.
// ABOUTME: Round trips through the state file and rejection of incompatible state.

mod support;

use devnet::config::ConfigFactory;
use devnet::spec::{AppStatus, AppType, DeploymentInfo, Spec, SpecError};
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};
use support::test_config;

fn running(container: &str, ip: [u8; 4]) -> DeploymentInfo {
    DeploymentInfo {
        container: Some(container.to_string()),
        host_from_host: Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
        host_from_container: Some(IpAddr::from(ip)),
        status: AppStatus::Running,
        ports: BTreeMap::from([("rpc".to_string(), 26657)]),
        depends_on: vec!["postgres".to_string()],
        deployed_at: Some(chrono::Utc::now()),
    }
}

#[test]
fn saved_state_loads_back_unchanged() {
    let home = tempfile::tempdir().unwrap();
    let config = test_config(home.path());

    let spec = Spec::new(&config);
    spec.describe_app(AppType::new("cored"), "cored-00")
        .unwrap()
        .set_info(running("devnet-test-cored-00", [172, 18, 0, 2]));
    spec.describe_app(AppType::new("postgres"), "postgres").unwrap();
    spec.save().unwrap();

    let loaded = Spec::load(&config).unwrap();
    assert_eq!(loaded.target(), "docker");
    assert_eq!(loaded.mode(), "dev");
    assert_eq!(loaded.env(), "devnet-test");

    let before: Vec<_> = spec
        .apps()
        .into_iter()
        .map(|(name, info)| (name, info.app_type(), info.info()))
        .collect();
    let after: Vec<_> = loaded
        .apps()
        .into_iter()
        .map(|(name, info)| (name, info.app_type(), info.info()))
        .collect();
    assert_eq!(before, after);
}

#[test]
fn state_file_is_indented_camel_case_json() {
    let home = tempfile::tempdir().unwrap();
    let config = test_config(home.path());

    let spec = Spec::new(&config);
    spec.describe_app(AppType::new("cored"), "cored-00")
        .unwrap()
        .set_info(running("devnet-test-cored-00", [172, 18, 0, 2]));
    spec.save().unwrap();

    let raw = std::fs::read_to_string(config.spec_file()).unwrap();
    assert!(raw.contains("\n  \"target\": \"docker\""), "{raw}");
    assert!(raw.contains("\"hostFromContainer\": \"172.18.0.2\""), "{raw}");

    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["apps"]["cored-00"]["type"], "cored");
    assert_eq!(json["apps"]["cored-00"]["info"]["status"], "running");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(config.spec_file())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[test]
fn missing_state_file_starts_empty() {
    let home = tempfile::tempdir().unwrap();
    let config = test_config(home.path());

    let spec = Spec::load(&config).unwrap();
    assert!(spec.apps().is_empty());
    assert_eq!(spec.path(), config.spec_file());
}

#[test]
fn state_of_another_target_is_rejected() {
    let home = tempfile::tempdir().unwrap();
    let config = test_config(home.path());
    Spec::new(&config).save().unwrap();

    let tmux = ConfigFactory {
        env_name: config.env_name.clone(),
        target: "tmux".to_string(),
        home_root: Some(home.path().to_path_buf()),
        ..Default::default()
    }
    .build()
    .unwrap();

    let err = Spec::load(&tmux).unwrap_err();
    match &err {
        SpecError::Mismatch {
            field,
            stored,
            requested,
            ..
        } => {
            assert_eq!(*field, "target");
            assert_eq!(stored, "docker");
            assert_eq!(requested, "tmux");
        }
        other => panic!("unexpected error {other}"),
    }
    assert!(err.to_string().contains("target mismatch"), "{err}");
}

#[test]
fn state_of_another_mode_is_rejected() {
    let home = tempfile::tempdir().unwrap();
    let config = test_config(home.path());
    Spec::new(&config).save().unwrap();

    let full = ConfigFactory {
        env_name: config.env_name.clone(),
        mode_name: "full".to_string(),
        home_root: Some(home.path().to_path_buf()),
        ..Default::default()
    }
    .build()
    .unwrap();

    assert!(matches!(
        Spec::load(&full),
        Err(SpecError::Mismatch { field: "mode", .. })
    ));
}

#[test]
fn app_name_cannot_change_type() {
    let home = tempfile::tempdir().unwrap();
    let spec = Spec::new(&test_config(home.path()));

    let first = spec.describe_app(AppType::new("cored"), "node").unwrap();
    let again = spec.describe_app(AppType::new("cored"), "node").unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &again));

    let err = spec
        .describe_app(AppType::new("postgres"), "node")
        .unwrap_err();
    assert!(matches!(err, SpecError::TypeMismatch { .. }), "{err}");
}

#[test]
fn mark_all_stopped_drops_addresses() {
    let home = tempfile::tempdir().unwrap();
    let spec = Spec::new(&test_config(home.path()));
    let info = spec.describe_app(AppType::new("cored"), "cored-00").unwrap();
    info.set_info(running("devnet-test-cored-00", [172, 18, 0, 2]));
    let never_deployed = spec.describe_app(AppType::new("faucet"), "faucet").unwrap();

    spec.mark_all_stopped();

    let after = info.info();
    assert_eq!(after.status, AppStatus::Stopped);
    assert!(after.host_from_container.is_none());
    assert!(after.depends_on.is_empty());

    // Never prepared, so the next start must still run its hooks.
    assert_eq!(never_deployed.info().status, AppStatus::NotDeployed);
}

#[test]
fn corrupt_state_file_is_reported() {
    let home = tempfile::tempdir().unwrap();
    let config = test_config(home.path());
    std::fs::create_dir_all(&config.home_dir).unwrap();
    std::fs::write(config.spec_file(), "{not json").unwrap();

    assert!(matches!(
        Spec::load(&config),
        Err(SpecError::Corrupt { .. })
    ));
}
