//! `meld.toml` loading tests

mod common;

use common::Fixture;
use meld_core::{FacetKind, FlagGroup, Flags};
use meld_engine::{EnvironmentBuilder, EnvironmentConfig, CONFIG_FILE_NAME};
use std::sync::Arc;
use tempfile::TempDir;

fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_environment_from_config_file() {
    let fx = Fixture::new();
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
instance_name = "loader"
verbose_logging = true

[settings.PIPELINE]
CONFIGPATH = "/etc/opt/engine"
"#,
    );

    let config = EnvironmentConfig::from_file(&path).unwrap();
    let env = EnvironmentBuilder::from_config(Arc::new(fx.mock.clone()), &config)
        .unwrap()
        .registry(Arc::clone(&fx.registry))
        .build()
        .unwrap();
    assert_eq!(env.instance_name(), "loader");
    assert!(env.is_verbose());
    assert_eq!(env.config_id(), None);

    env.product().unwrap();
    let args = fx.mock.init_args(FacetKind::Product).unwrap();
    assert_eq!(args.instance_name, "loader");
    assert!(args.verbose);
    let settings: serde_json::Value = serde_json::from_str(&args.settings).unwrap();
    assert_eq!(settings["PIPELINE"]["CONFIGPATH"], "/etc/opt/engine");
}

#[test]
fn test_config_id_and_flags_from_file() {
    let fx = Fixture::new();
    let pinned = fx.mock.register_config_document(&["TEST"], "pinned");
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        &format!(
            r#"
instance_name = "pinned"
config_id = {pinned}

[default_flags]
entity_get = ["ENTITY_INCLUDE_ENTITY_NAME"]
"#
        ),
    );

    let config = EnvironmentConfig::from_file(&path).unwrap();
    let env = EnvironmentBuilder::from_config(Arc::new(fx.mock.clone()), &config)
        .unwrap()
        .registry(Arc::clone(&fx.registry))
        .build()
        .unwrap();

    assert_eq!(env.config_id(), Some(pinned));
    assert_eq!(
        env.default_flags(FlagGroup::EntityGet),
        Flags::ENTITY_INCLUDE_ENTITY_NAME
    );
    env.engine().unwrap();
    assert_eq!(fx.mock.init_config_ids(), vec![pinned]);
}

#[test]
fn test_missing_file_is_usage() {
    let dir = TempDir::new().unwrap();
    let err = EnvironmentConfig::from_file(dir.path().join(CONFIG_FILE_NAME)).unwrap_err();
    assert!(err.is_usage());
}

#[test]
fn test_unknown_flag_family_rejected_by_builder() {
    let fx = Fixture::new();
    let config = EnvironmentConfig::from_toml_str(
        r#"
instance_name = "bad"
[default_flags]
entity_fetch = ["ENTITY_DEFAULT"]
"#,
    )
    .unwrap();

    let err = EnvironmentBuilder::from_config(Arc::new(fx.mock.clone()), &config).unwrap_err();
    assert!(err.is_usage());
    assert!(err.message().contains("entity_fetch"));
}

#[test]
fn test_default_file_round_trips_through_builder() {
    let fx = Fixture::new();
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, EnvironmentConfig::default_toml());

    let config = EnvironmentConfig::from_file(&path).unwrap();
    let env = EnvironmentBuilder::from_config(Arc::new(fx.mock.clone()), &config)
        .unwrap()
        .registry(Arc::clone(&fx.registry))
        .build()
        .unwrap();
    assert_eq!(env.instance_name(), "meld");
    assert!(serde_json::from_str::<serde_json::Value>(env.settings()).is_ok());
}
