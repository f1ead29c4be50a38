//! Config load validation tests for lexis-config.
// crates/lexis-config/tests/load_validation.rs
// =============================================================================
// Module: Config Load Validation Tests
// Description: Validate config loading guards (path, size, encoding).
// Purpose: Ensure config input handling is strict and fail-closed.
// =============================================================================

use std::io::Write;
use std::path::Path;

use lexis_config::ConfigError;
use lexis_config::DEFAULT_RESOURCE_KEYS;
use lexis_config::LexisConfig;
use lexis_config::StorageConfig;
use tempfile::NamedTempFile;

type TestResult = Result<(), String>;

fn assert_invalid(result: Result<LexisConfig, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config load".to_string()),
    }
}

#[test]
fn load_rejects_path_too_long() -> TestResult {
    let long_path = "a".repeat(5_000);
    let path = Path::new(&long_path);
    assert_invalid(LexisConfig::load(Some(path)), "config path exceeds max length")?;
    Ok(())
}

#[test]
fn load_rejects_path_component_too_long() -> TestResult {
    let long_component = "a".repeat(300);
    let path = Path::new(&long_component);
    assert_invalid(LexisConfig::load(Some(path)), "config path component too long")?;
    Ok(())
}

#[test]
fn load_rejects_oversized_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    let payload = vec![b'a'; 1_048_577];
    file.write_all(&payload).map_err(|err| err.to_string())?;
    assert_invalid(LexisConfig::load(Some(file.path())), "config file exceeds size limit")?;
    Ok(())
}

#[test]
fn load_rejects_non_utf8_file() -> TestResult {
    let mut file = NamedTempFile::new().map_err(|err| err.to_string())?;
    file.write_all(&[0xFF, 0xFE, 0xFF]).map_err(|err| err.to_string())?;
    assert_invalid(LexisConfig::load(Some(file.path())), "config file must be utf-8")?;
    Ok(())
}

#[test]
fn load_reports_missing_file_as_io() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("absent.toml");
    assert_invalid(LexisConfig::load(Some(&path)), "config io error")?;
    Ok(())
}

#[test]
fn empty_file_uses_defaults() -> TestResult {
    let file = NamedTempFile::new().map_err(|err| err.to_string())?;
    let config = LexisConfig::load(Some(file.path())).map_err(|err| err.to_string())?;
    let keys: Vec<&str> = config.resources.iter().map(|resource| resource.key.as_str()).collect();
    if keys != DEFAULT_RESOURCE_KEYS {
        return Err(format!("unexpected default resources: {keys:?}"));
    }
    if !matches!(config.storage, StorageConfig::Memory) {
        return Err("expected memory storage by default".to_string());
    }
    if config.server.max_head_bytes != 16 * 1024 || config.server.expose_internal_errors {
        return Err("unexpected server defaults".to_string());
    }
    if !config.audit.enabled {
        return Err("audit should be enabled by default".to_string());
    }
    Ok(())
}

#[test]
fn seed_paths_resolve_against_config_dir() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("lexis.toml");
    std::fs::write(&path, "[[resources]]\nkey = \"sentences\"\nseed = \"seeds/sentences.json\"\n")
        .map_err(|err| err.to_string())?;
    let config = LexisConfig::load(Some(&path)).map_err(|err| err.to_string())?;
    let seed = config.resources[0].seed.as_deref().ok_or("seed missing")?;
    let resolved = config.resolve_relative(seed);
    if resolved != dir.path().join("seeds/sentences.json") {
        return Err(format!("unexpected seed path {}", resolved.display()));
    }
    Ok(())
}

#[test]
fn malformed_toml_is_a_parse_error() -> TestResult {
    assert_invalid(LexisConfig::from_toml_str("[server\nbind = 1"), "config parse error")?;
    Ok(())
}
