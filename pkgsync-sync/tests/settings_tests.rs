use pkgsync_sync::settings::{
    DEFAULT_BUCKET_NAME, ENV_BUCKET_NAME, ENV_GCS_ACCESS_TOKEN, ENV_LOCAL_PACKAGE_DIRECTORY,
    ENV_PROPAGATION_MODE, ENV_REMOTE_PACKAGE_DIRECTORY, ENV_TIER,
};
use pkgsync_storage::StorageClient;
use pkgsync_sync::{GlobalSettings, PropagationMode, RemoteBackend, SyncError, Tier};
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::collections::HashMap;
use std::path::PathBuf;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name| map.get(name).cloned()
}

// ── Presets ─────────────────────────────────────────────────────

#[test]
fn unset_tier_means_dev() {
    let settings = GlobalSettings::from_lookup(lookup(&[])).unwrap();
    assert_eq!(settings.tier, Tier::Dev);
    assert_eq!(settings.local_root, PathBuf::from("./packages"));
    assert_eq!(settings.remote_root, "./.remote_packages");
    assert_eq!(settings.remote_backend, RemoteBackend::Directory);
    assert_eq!(settings.bucket_name, DEFAULT_BUCKET_NAME);
    assert_eq!(settings.propagation, PropagationMode::Synchronous);
    assert_eq!(settings.remote_retry.max_retries, 0);
    assert_eq!(settings.max_concurrent_transfers, 4);
}

#[test]
fn production_preset() {
    let settings = GlobalSettings::from_lookup(lookup(&[(ENV_TIER, "Production")])).unwrap();
    assert_eq!(settings.tier, Tier::Production);
    assert_eq!(settings.local_root, PathBuf::from("/tmp/packages"));
    assert_eq!(settings.remote_root, "packages");
    assert_eq!(settings.remote_backend, RemoteBackend::Gcs);
    assert_eq!(settings.remote_timeout_secs, 60);
    assert_eq!(settings.remote_retry.max_retries, 3);
    assert_eq!(settings.max_concurrent_transfers, 8);
}

#[test]
fn unknown_tier_is_rejected() {
    let err = GlobalSettings::from_lookup(lookup(&[(ENV_TIER, "staging")])).unwrap_err();
    assert!(matches!(err, SyncError::Config(_)));
}

#[test]
fn tier_parsing_is_case_insensitive() {
    assert_eq!("DEV".parse::<Tier>().unwrap(), Tier::Dev);
    assert_eq!(" prod ".parse::<Tier>().unwrap(), Tier::Production);
    assert_eq!(Tier::Production.to_string(), "production");
}

// ── Overrides ───────────────────────────────────────────────────

#[test]
fn variables_override_preset() {
    let settings = GlobalSettings::from_lookup(lookup(&[
        (ENV_TIER, "production"),
        (ENV_BUCKET_NAME, "acme-packages"),
        (ENV_LOCAL_PACKAGE_DIRECTORY, "/var/cache/pkgs"),
        (ENV_REMOTE_PACKAGE_DIRECTORY, "simple"),
        (ENV_PROPAGATION_MODE, "deferred"),
        (ENV_GCS_ACCESS_TOKEN, "token-123"),
    ]))
    .unwrap();
    assert_eq!(settings.bucket_name, "acme-packages");
    assert_eq!(settings.local_root, PathBuf::from("/var/cache/pkgs"));
    assert_eq!(settings.remote_root, "simple");
    assert_eq!(settings.propagation, PropagationMode::Deferred);
    assert_eq!(settings.gcs_access_token.as_deref(), Some("token-123"));
    assert_eq!(settings.remote_location(), "gs://acme-packages/simple");
}

#[test]
fn empty_values_count_as_unset() {
    let settings =
        GlobalSettings::from_lookup(lookup(&[(ENV_TIER, ""), (ENV_BUCKET_NAME, "  ")])).unwrap();
    assert_eq!(settings.tier, Tier::Dev);
    assert_eq!(settings.bucket_name, DEFAULT_BUCKET_NAME);
}

#[test]
fn unknown_propagation_mode_is_rejected() {
    let err =
        GlobalSettings::from_lookup(lookup(&[(ENV_PROPAGATION_MODE, "eventually")])).unwrap_err();
    assert!(matches!(err, SyncError::Config(_)));
}

#[test]
fn same_local_and_remote_directory_is_rejected() {
    let err = GlobalSettings::from_lookup(lookup(&[
        (ENV_LOCAL_PACKAGE_DIRECTORY, "/srv/pkgs"),
        (ENV_REMOTE_PACKAGE_DIRECTORY, "/srv/pkgs"),
    ]))
    .unwrap_err();
    assert!(matches!(err, SyncError::Config(_)));
}

#[test]
fn nested_remote_directory_is_rejected() {
    for (local, remote) in [
        ("/srv/pkgs", "/srv/pkgs/mirror"),
        ("/srv/pkgs/cache", "/srv/pkgs"),
        ("./packages", "packages/./mirror"),
        ("./cache/../packages", "./packages/mirror"),
    ] {
        let err = GlobalSettings::from_lookup(lookup(&[
            (ENV_LOCAL_PACKAGE_DIRECTORY, local),
            (ENV_REMOTE_PACKAGE_DIRECTORY, remote),
        ]))
        .unwrap_err();
        assert!(matches!(err, SyncError::Config(_)), "{local} / {remote}");
    }
}

#[test]
fn sibling_directories_with_shared_name_prefix_are_accepted() {
    let settings = GlobalSettings::from_lookup(lookup(&[
        (ENV_LOCAL_PACKAGE_DIRECTORY, "/srv/pkgs"),
        (ENV_REMOTE_PACKAGE_DIRECTORY, "/srv/pkgs-remote"),
    ]))
    .unwrap();
    assert_eq!(settings.remote_root, "/srv/pkgs-remote");
}

#[test]
fn gcs_remote_root_is_not_a_directory() {
    // Object prefixes share nothing with the local filesystem.
    let settings = GlobalSettings::from_lookup(lookup(&[
        (ENV_TIER, "production"),
        (ENV_LOCAL_PACKAGE_DIRECTORY, "packages"),
        (ENV_REMOTE_PACKAGE_DIRECTORY, "packages"),
    ]))
    .unwrap();
    assert_eq!(settings.remote_backend, RemoteBackend::Gcs);
}

#[test]
fn describe_mentions_tiers() {
    let settings = GlobalSettings::for_tier(Tier::Dev);
    let text = settings.describe();
    assert!(text.contains("tier=dev"));
    assert!(text.contains("./packages"));
    assert!(text.contains("./.remote_packages"));
}

#[test]
fn access_token_is_never_serialized() {
    let mut settings = GlobalSettings::for_tier(Tier::Production);
    settings.gcs_access_token = Some("secret".into());
    let json = serde_json::to_string(&settings).unwrap();
    assert!(!json.contains("secret"));
}

// ── Tier construction ───────────────────────────────────────────

#[test]
fn dev_tiers_are_two_directories() {
    let settings = GlobalSettings::for_tier(Tier::Dev);
    let tiers = settings.build_tiers().unwrap();
    assert_eq!(tiers.local.tier_name(), "local");
    assert_eq!(tiers.remote.tier_name(), "remote-dir");
}

#[test]
fn production_tiers_use_gcs() {
    let settings = GlobalSettings::for_tier(Tier::Production);
    let tiers = settings.build_tiers().unwrap();
    assert_eq!(tiers.remote.tier_name(), "gcs");
    assert_eq!(
        tiers.remote.location(),
        format!("gs://{DEFAULT_BUCKET_NAME}/packages")
    );
}

// ── Process environment ─────────────────────────────────────────

#[test]
#[serial]
fn from_env_reads_process_environment() {
    // SAFETY: serialised with every other test touching the environment.
    unsafe {
        std::env::set_var(ENV_TIER, "dev");
        std::env::set_var(ENV_LOCAL_PACKAGE_DIRECTORY, "/tmp/pkgsync-env-test");
    }
    let settings = GlobalSettings::from_env();
    unsafe {
        std::env::remove_var(ENV_TIER);
        std::env::remove_var(ENV_LOCAL_PACKAGE_DIRECTORY);
    }

    let settings = settings.unwrap();
    assert_eq!(settings.local_root, PathBuf::from("/tmp/pkgsync-env-test"));
}
