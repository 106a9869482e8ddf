//! Exit codes and error output of the buildkick binary

use std::process::{Command, Output};
use tempfile::TempDir;

fn buildkick(args: &[&str], env: &[(&str, &str)]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_buildkick"));
    command.args(args).env_clear().env("NO_COLOR", "1");
    for (key, value) in env {
        command.env(key, value);
    }
    command.output().expect("Failed to execute buildkick")
}

fn exit_code(output: &Output) -> i32 {
    output.status.code().unwrap_or(1)
}

#[test]
fn test_help_exits_zero() {
    let output = buildkick(&["--help"], &[]);
    assert_eq!(exit_code(&output), 0);
    assert!(String::from_utf8_lossy(&output.stdout).contains("BuildExcludeBuildConfigs"));
}

#[test]
fn test_unknown_argument_prints_usage_and_exits_one() {
    let output = buildkick(&["--trigger-everything"], &[]);
    assert_eq!(exit_code(&output), 1);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--trigger-everything"));
    assert!(stderr.contains("BuildDisableBuildStepTypes"));
}

#[test]
fn test_missing_server_exits_one() {
    let output = buildkick(&["--dry-run"], &[]);
    assert_eq!(exit_code(&output), 1);
    assert!(String::from_utf8_lossy(&output.stderr).contains("No CI server address could be resolved"));
}

#[test]
fn test_missing_password_exits_one() {
    let output = buildkick(
        &[],
        &[("BuildServer", "ci.example.com"), ("BuildUsername", "bot")],
    );
    assert_eq!(exit_code(&output), 1);
    assert!(String::from_utf8_lossy(&output.stderr).contains("No CI password could be resolved"));
}

#[test]
fn test_properties_file_credentials_and_unreachable_server() {
    let dir = TempDir::new().unwrap();
    let config_props = dir.path().join("config.properties");
    std::fs::write(&config_props, "teamcity.serverUrl=http\\://127.0.0.1\\:9\n").unwrap();
    let build_props = dir.path().join("build.properties");
    std::fs::write(
        &build_props,
        format!(
            "#Build properties\nteamcity.auth.userId=TeamCityBuildId=42\nteamcity.auth.password=Zx81-secret\nteamcity.buildType.id=Tools_TriggerAll\nteamcity.configuration.properties.file={}\n",
            config_props.display().to_string().replace('\\', "\\\\").replace(':', "\\:")
        ),
    )
    .unwrap();

    let output = buildkick(
        &["--dry-run"],
        &[("TEAMCITY_BUILD_PROPERTIES_FILE", build_props.to_str().unwrap())],
    );

    assert_eq!(exit_code(&output), 1);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("127.0.0.1:9"), "stderr: {stderr}");
    assert!(!stderr.contains("Zx81-secret"));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("Zx81-secret"));
}
