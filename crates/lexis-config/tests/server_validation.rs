//! Section validation tests for lexis-config.
// crates/lexis-config/tests/server_validation.rs
// =============================================================================
// Module: Config Section Validation Tests
// Description: Validate server, storage, resource, and auth sections.
// Purpose: Ensure inconsistent or unsafe settings are rejected.
// =============================================================================

use lexis_config::ConfigError;
use lexis_config::LexisConfig;
use lexis_config::StorageConfig;
use lexis_core::PrincipalId;

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
        Ok(_) => Err("expected invalid config".to_string()),
    }
}

const PRINCIPAL: &str = r#"
[[auth.principals]]
token = "tutor-token"
id = "3"
permission_level = 1
managed_students = ["7", "9"]
"#;

#[test]
fn non_loopback_bind_requires_principals() -> TestResult {
    assert_invalid(
        LexisConfig::from_toml_str("[server]\nbind = \"0.0.0.0:8080\"\n"),
        "non-loopback bind disallowed without auth principals",
    )?;
    let content = format!("[server]\nbind = \"0.0.0.0:8080\"\n{PRINCIPAL}");
    LexisConfig::from_toml_str(&content).map_err(|err| err.to_string())?;
    Ok(())
}

#[test]
fn invalid_bind_is_rejected() -> TestResult {
    assert_invalid(
        LexisConfig::from_toml_str("[server]\nbind = \"localhost\"\n"),
        "invalid bind address",
    )
}

#[test]
fn head_limit_bounds_are_enforced() -> TestResult {
    assert_invalid(
        LexisConfig::from_toml_str("[server]\nmax_head_bytes = 16\n"),
        "server.max_head_bytes must be between",
    )?;
    assert_invalid(
        LexisConfig::from_toml_str("[server]\nmax_head_bytes = 2097152\n"),
        "server.max_head_bytes must be between",
    )
}

#[test]
fn timeouts_are_bounded() -> TestResult {
    assert_invalid(
        LexisConfig::from_toml_str("[server]\nsniff_timeout_ms = 0\n"),
        "server.sniff_timeout_ms must be between",
    )?;
    assert_invalid(
        LexisConfig::from_toml_str("[server]\nhandshake_timeout_ms = 600000\n"),
        "server.handshake_timeout_ms must be between",
    )
}

#[test]
fn channel_buffer_must_be_positive() -> TestResult {
    assert_invalid(
        LexisConfig::from_toml_str("[server]\nchannel_buffer = 0\n"),
        "server.channel_buffer must be between",
    )
}

#[test]
fn sqlite_storage_requires_path() -> TestResult {
    assert_invalid(
        LexisConfig::from_toml_str("[storage]\ntype = \"sqlite\"\n"),
        "config parse error",
    )?;
    assert_invalid(
        LexisConfig::from_toml_str("[storage]\ntype = \"sqlite\"\npath = \"  \"\n"),
        "storage.path must be non-empty",
    )?;
    let config =
        LexisConfig::from_toml_str("[storage]\ntype = \"sqlite\"\npath = \"lexis.db\"\n")
            .map_err(|err| err.to_string())?;
    match config.storage {
        StorageConfig::Sqlite(sqlite) if sqlite.busy_timeout_ms == 5_000 => Ok(()),
        other => Err(format!("unexpected storage config {other:?}")),
    }
}

#[test]
fn duplicate_resource_keys_are_rejected() -> TestResult {
    let content = "[[resources]]\nkey = \"sentences\"\n[[resources]]\nkey = \"sentences\"\n";
    assert_invalid(LexisConfig::from_toml_str(content), "duplicate resource type: sentences")
}

#[test]
fn invalid_type_key_fails_to_parse() -> TestResult {
    assert_invalid(
        LexisConfig::from_toml_str("[[resources]]\nkey = \"Sentences\"\n"),
        "config parse error",
    )
}

#[test]
fn duplicate_tokens_are_rejected() -> TestResult {
    let content = format!("{PRINCIPAL}{PRINCIPAL}");
    assert_invalid(LexisConfig::from_toml_str(&content), "duplicate auth token")
}

#[test]
fn empty_token_is_rejected() -> TestResult {
    let content = "[[auth.principals]]\ntoken = \"\"\nid = \"1\"\npermission_level = 0\n";
    assert_invalid(LexisConfig::from_toml_str(content), "must be 1 to 256 bytes")
}

#[test]
fn principal_builds_identity() -> TestResult {
    let config = LexisConfig::from_toml_str(PRINCIPAL).map_err(|err| err.to_string())?;
    let principal = config.auth.principals.first().ok_or("principal missing")?;
    let identity = principal.identity();
    let student = PrincipalId::parse("7").map_err(|err| err.to_string())?;
    if !identity.manages(&student) || identity.permission_level.is_admin() {
        return Err(format!("unexpected identity {identity:?}"));
    }
    if format!("{principal:?}").contains("tutor-token") {
        return Err("principal debug output leaks token".to_string());
    }
    Ok(())
}

#[test]
fn integer_principal_ids_match_string_ids() -> TestResult {
    let content = "[[auth.principals]]\ntoken = \"t\"\nid = 42\npermission_level = 1\n\
                   managed_students = [7, \"9\", { \"$oid\" = \"11\" }]\n";
    let config = LexisConfig::from_toml_str(content).map_err(|err| err.to_string())?;
    let principal = config.auth.principals.first().ok_or("principal missing")?;
    if principal.id != PrincipalId::from_u64(42) {
        return Err(format!("unexpected principal id {}", principal.id));
    }
    let identity = principal.identity();
    for student in ["7", "9", "11"] {
        let student = PrincipalId::parse(student).map_err(|err| err.to_string())?;
        if !identity.manages(&student) {
            return Err(format!("student {student} not managed"));
        }
    }
    Ok(())
}

#[test]
fn fractional_principal_id_is_rejected() -> TestResult {
    let content = "[[auth.principals]]\ntoken = \"t\"\nid = 4.2\npermission_level = 1\n";
    assert_invalid(LexisConfig::from_toml_str(content), "non-integer number")
}
