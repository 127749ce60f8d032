//! Settings loaded from disk change chain defaults.

use std::fs;

use serde_json::{Map, Value, json};
use stateful_engine::{Bail, Chain, ChainSettings, EngineConfig, Operation};
use tempfile::tempdir;

fn fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("fixture must be an object, got {other}"),
    }
}

#[tokio::test]
async fn loaded_settings_flow_into_chains() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        "[chain]\nbail = \"never\"\ncondition_error = \"Precondition failed\"\n",
    )?;

    let settings = ChainSettings::load_from(&path)?;
    assert_eq!(settings.bail, Bail::Never);
    let config = EngineConfig::default().with_settings(settings);

    let ctx = Chain::with_config(&config, fields(json!({"items": [1, 2, 3]})))
        .then(|ctx| {
            ctx.for_each_sync("items", |item| {
                if item.index == 0 {
                    Operation::err("first")
                } else {
                    Operation::ok(item.value)
                }
            })
        })
        .catch(|ctx, _| ctx.reject_if(true))
        .await;

    assert_eq!(
        ctx.errors(),
        vec![json!("first"), json!("Precondition failed")]
    );
    Ok(())
}

#[test]
fn unreadable_config_reports_its_path() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    fs::write(&path, "[chain]\nbail = \"sometimes\"\n").expect("write");

    let err = ChainSettings::load_from(&path).expect_err("unknown bail policy");
    assert_eq!(err.path(), path.as_path());
    assert!(err.to_string().starts_with("failed to parse config at"));
}
