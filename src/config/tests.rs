use std::time::Duration;

use clap::{CommandFactory, FromArgMatches};
use tempfile::tempdir;

use super::{apply_config, load_config_file, load_config_in, types::ConfigFile};
use crate::args::{IdempotencyMode, LoadArgs, RampStage, ThinkTime};

fn args_with_matches(cli: &[&str]) -> Result<(LoadArgs, clap::ArgMatches), String> {
    let mut argv = vec!["surge"];
    argv.extend_from_slice(cli);
    let matches = LoadArgs::command()
        .try_get_matches_from(argv)
        .map_err(|err| format!("matches failed: {}", err))?;
    let args = LoadArgs::from_arg_matches(&matches).map_err(|err| err.to_string())?;
    Ok((args, matches))
}

#[test]
fn parse_toml_config_with_body_template() -> Result<(), String> {
    let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
    let path = dir.path().join("surge.toml");
    let content = r#"
url = "http://localhost:8082/orders"
token = "secret"
idempotency = "per-iteration"
think_time = "500ms..1500ms"

[random.qty]
min = 1
max = 5

[vars]
user_id = 7

[body]
user_id = "{{user_id}}"
quantity = "{{qty}}"
status = "created"

[[stages]]
duration = "10s"
target = 5

[[stages]]
duration = 20
target = 0
"#;
    std::fs::write(&path, content).map_err(|err| format!("write failed: {}", err))?;

    let config = load_config_file(&path).map_err(|err| err.to_string())?;
    if config.url.as_deref() != Some("http://localhost:8082/orders") {
        return Err("Unexpected url".to_owned());
    }
    if config.idempotency != Some(IdempotencyMode::PerIteration) {
        return Err("Unexpected idempotency mode".to_owned());
    }
    let random = config.random.as_ref().ok_or("Expected random fields")?;
    let qty = random.get("qty").ok_or("Missing qty range")?;
    if qty.min != 1 || qty.max != 5 {
        return Err(format!("Unexpected range: {}..{}", qty.min, qty.max));
    }
    let body = config.body.as_ref().ok_or("Expected body")?;
    if body.get("status").and_then(|value| value.as_str()) != Some("created") {
        return Err(format!("Unexpected body: {}", body));
    }
    let stages = config.stages.as_ref().ok_or("Expected stages")?;
    if stages.len() != 2 {
        return Err(format!("Unexpected stage count: {}", stages.len()));
    }
    Ok(())
}

#[test]
fn parse_json_config_with_vus_alias() -> Result<(), String> {
    let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
    let path = dir.path().join("surge.json");
    let content = r#"{
  "url": "http://localhost:8082/orders",
  "concurrency": 4,
  "iterations": 100,
  "status": 201
}"#;
    std::fs::write(&path, content).map_err(|err| format!("write failed: {}", err))?;

    let config = load_config_file(&path).map_err(|err| err.to_string())?;
    if config.vus != Some(4) {
        return Err(format!("Unexpected vus: {:?}", config.vus));
    }
    if config.iterations != Some(100) || config.status != Some(201) {
        return Err("Unexpected iterations/status".to_owned());
    }
    Ok(())
}

#[test]
fn unknown_extension_is_rejected() -> Result<(), String> {
    let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
    let path = dir.path().join("surge.yaml");
    std::fs::write(&path, "url: x").map_err(|err| format!("write failed: {}", err))?;
    match load_config_file(&path) {
        Err(err) if err.is_config() => Ok(()),
        Err(err) => Err(format!("Unexpected error: {}", err)),
        Ok(_) => Err("Expected yaml config to be rejected".to_owned()),
    }
}

#[test]
fn discovery_prefers_toml_over_json() -> Result<(), String> {
    let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
    std::fs::write(dir.path().join("surge.toml"), "vus = 4\n")
        .map_err(|err| format!("write failed: {}", err))?;
    std::fs::write(dir.path().join("surge.json"), r#"{"vus": 9}"#)
        .map_err(|err| format!("write failed: {}", err))?;

    let config = load_config_in(dir.path(), None)
        .map_err(|err| err.to_string())?
        .ok_or("Expected a discovered config")?;
    if config.vus != Some(4) {
        return Err(format!("Expected surge.toml to win, got {:?}", config.vus));
    }
    Ok(())
}

#[test]
fn discovery_without_files_yields_none() -> Result<(), String> {
    let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
    match load_config_in(dir.path(), None) {
        Ok(None) => Ok(()),
        other => Err(format!("Expected no config, got {:?}", other.map(|c| c.is_some()))),
    }
}

#[test]
fn explicit_path_is_resolved_against_base() -> Result<(), String> {
    let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
    std::fs::create_dir(dir.path().join("profiles"))
        .map_err(|err| format!("mkdir failed: {}", err))?;
    std::fs::write(dir.path().join("profiles/smoke.JSON"), r#"{"vus": 2}"#)
        .map_err(|err| format!("write failed: {}", err))?;

    let config = load_config_in(dir.path(), Some("profiles/smoke.JSON"))
        .map_err(|err| err.to_string())?
        .ok_or("Expected the explicit config")?;
    if config.vus != Some(2) {
        return Err(format!("Unexpected vus: {:?}", config.vus));
    }
    Ok(())
}

#[test]
fn apply_config_respects_cli_precedence() -> Result<(), String> {
    let (mut args, matches) = args_with_matches(&["--vus", "3", "--think-time", "none"])?;
    let config = ConfigFile {
        url: Some("http://example.test/orders".to_owned()),
        vus: Some(9),
        think_time: Some(ThinkTime::Fixed(Duration::from_secs(2))),
        stages: Some(vec![super::types::StageConfig {
            duration: super::types::DurationValue::Text("5s".to_owned()),
            target: 2,
        }]),
        ..ConfigFile::default()
    };

    apply_config(&mut args, &matches, &config).map_err(|err| err.to_string())?;

    if args.url.as_deref() != Some("http://example.test/orders") {
        return Err("Config url should apply".to_owned());
    }
    if args.vus.get() != 3 {
        return Err(format!("CLI vus should win, got {}", args.vus.get()));
    }
    if args.think_time != ThinkTime::None {
        return Err(format!("CLI think time should win, got {}", args.think_time));
    }
    let expected = vec![RampStage {
        duration: Duration::from_secs(5),
        target: 2,
    }];
    if args.stages != expected {
        return Err(format!("Unexpected stages: {:?}", args.stages));
    }
    Ok(())
}

#[test]
fn apply_config_rejects_duration_with_stages() -> Result<(), String> {
    let (mut args, matches) = args_with_matches(&[])?;
    let config = ConfigFile {
        duration: Some(super::types::DurationValue::Seconds(30)),
        stages: Some(vec![]),
        ..ConfigFile::default()
    };
    match apply_config(&mut args, &matches, &config) {
        Err(err) if err.is_config() => Ok(()),
        Err(err) => Err(format!("Unexpected error: {}", err)),
        Ok(()) => Err("Expected conflict".to_owned()),
    }
}

#[test]
fn apply_config_rejects_zero_vus() -> Result<(), String> {
    let (mut args, matches) = args_with_matches(&[])?;
    let config = ConfigFile {
        vus: Some(0),
        ..ConfigFile::default()
    };
    if apply_config(&mut args, &matches, &config).is_ok() {
        return Err("Expected vus = 0 to be rejected".to_owned());
    }
    Ok(())
}
