//! Integration tests for CLI argument handling
//!
//! Tests segment selection, duration validation, the offline `--list`
//! mode and the running binary's stdin handling.

use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Helper to run the CLI with given args and capture output
fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_segwatch"))
        .args(args)
        .output()
        .expect("Failed to execute segwatch")
}

#[test]
fn test_help_flag_exits_successfully() {
    let output = run_cli(&["--help"]);
    assert!(
        output.status.success(),
        "Expected --help to exit successfully"
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("segwatch"), "Help should mention segwatch");
    assert!(stdout.contains("segment"), "Help should mention --segment flag");
    assert!(stdout.contains("interval"), "Help should mention --interval flag");
}

#[test]
fn test_list_prints_registry_without_network() {
    let output = run_cli(&["--list", "--provider-url", "http://127.0.0.1:9/v1"]);
    assert!(output.status.success(), "Expected --list to exit successfully");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let ids: Vec<&str> = stdout
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .collect();
    assert_eq!(ids, vec!["delft", "aruba", "melbourne"]);
    assert!(stdout.contains("Caribbean"));
}

#[test]
fn test_unknown_segment_prints_error_and_exits() {
    let output = run_cli(&["--segment", "atlantis"]);
    assert!(!output.status.success(), "Expected unknown segment to fail");
    assert_eq!(output.status.code(), Some(2));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Unknown segment") && stderr.contains("atlantis"),
        "Should print error message about the unknown segment: {}",
        stderr
    );
}

#[test]
fn test_zero_interval_is_rejected() {
    let output = run_cli(&["--interval", "0"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid interval"), "stderr: {}", stderr);
}

#[test]
fn test_non_numeric_interval_is_rejected_by_parser() {
    let output = run_cli(&["--interval", "soon"]);
    assert!(!output.status.success());
}

#[test]
fn test_segment_with_help_is_valid() {
    // With --help, it should succeed regardless of other flags
    let output = run_cli(&["--segment", "aruba", "--help"]);
    assert!(output.status.success());
}

#[test]
fn test_json_mode_prints_only_json_lines_after_segment_switch() {
    let mut child = Command::new(env!("CARGO_BIN_EXE_segwatch"))
        .args(["--json", "--provider-url", "http://127.0.0.1:9/v1", "--timeout", "2"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to start segwatch");

    child
        .stdin
        .as_mut()
        .expect("stdin is piped")
        .write_all(b"aruba\n")
        .expect("Failed to write to stdin");

    // Both fetches fail fast against the closed port
    std::thread::sleep(Duration::from_secs(3));
    let _ = child.kill();
    let output = child.wait_with_output().expect("Failed to collect output");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().filter(|l| !l.trim().is_empty()).collect();
    assert!(!lines.is_empty(), "Expected at least one snapshot on stdout");
    for line in &lines {
        assert!(
            serde_json::from_str::<serde_json::Value>(line).is_ok(),
            "Non-JSON line on stdout: {}",
            line
        );
    }
    assert!(
        lines.iter().any(|l| l.contains("\"segment_id\":\"aruba\"")),
        "Expected a snapshot for aruba: {}",
        stdout
    );
}

fn forecast_body() -> serde_json::Value {
    json!({
        "current": {
            "time": "2024-07-15T01:00",
            "temperature_2m": 12.0,
            "wind_direction_10m": 180
        },
        "hourly": {
            "time": ["2024-07-15T00:00", "2024-07-15T01:00"],
            "temperature_2m": [11.5, 12.0]
        }
    })
}

fn query_has(request: &Request, key: &str, value: &str) -> bool {
    request.url.query_pairs().any(|(k, v)| k == key && v == value)
}

/// Polls the mock server until a matching request arrives or `within` passes
async fn wait_for_request(
    server: &MockServer,
    within: Duration,
    matches: impl Fn(&Request) -> bool,
) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        let requests = server.received_requests().await.unwrap_or_default();
        if requests.iter().any(&matches) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn test_slow_uv_lookup_does_not_block_segment_switch() {
    use tokio::io::AsyncWriteExt;

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .and(query_param("current", "uv_index"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "current": { "uv_index": 5.0 } }))
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .and(query_param("wind_speed_unit", "ms"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body()))
        .mount(&server)
        .await;

    let provider_url = format!("{}/v1", server.uri());
    let mut child = tokio::process::Command::new(env!("CARGO_BIN_EXE_segwatch"))
        .args(["--json", "--segment", "delft", "--provider-url", &provider_url])
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .expect("Failed to start segwatch");

    // The first snapshot's UV lookup is now hanging on the server
    assert!(
        wait_for_request(&server, Duration::from_secs(10), |r| query_has(r, "current", "uv_index")).await,
        "Expected a UV lookup for the first snapshot"
    );

    let mut stdin = child.stdin.take().expect("stdin is piped");
    stdin.write_all(b"aruba\n").await.expect("Failed to write to stdin");
    stdin.flush().await.expect("Failed to flush stdin");

    assert!(
        wait_for_request(&server, Duration::from_secs(5), |r| {
            query_has(r, "latitude", "12.5211") && query_has(r, "wind_speed_unit", "ms")
        })
        .await,
        "Segment switch should be handled while the UV lookup is pending"
    );

    let _ = child.kill().await;
}

#[cfg(test)]
mod unit_tests {
    //! Unit tests for CLI parsing that don't require running the binary

    use std::time::Duration;

    use clap::Parser;
    use segwatch::cli::{parse_segment_arg, Cli, CliError, StartupConfig};

    #[test]
    fn test_cli_no_args_has_no_segment() {
        let cli = Cli::parse_from(["segwatch"]);
        assert!(cli.segment.is_none());
    }

    #[test]
    fn test_cli_segment_flag_with_melbourne() {
        let cli = Cli::parse_from(["segwatch", "--segment", "melbourne"]);
        assert_eq!(cli.segment.as_deref(), Some("melbourne"));
    }

    #[test]
    fn test_parse_segment_arg_invalid_returns_error() {
        let result = parse_segment_arg("invalid");
        assert!(matches!(result, Err(CliError::UnknownSegment(..))));
    }

    #[test]
    fn test_startup_config_from_cli_interval() {
        let cli = Cli::parse_from(["segwatch", "--interval", "30"]);
        let config = StartupConfig::from_cli(&cli).expect("valid arguments");
        assert_eq!(config.refresh.refresh_interval, Duration::from_secs(30));
        assert!(config.refresh.fetch_timeout.is_none());
    }

    #[test]
    fn test_startup_config_from_cli_once_json() {
        let cli = Cli::parse_from(["segwatch", "--once", "--json", "-s", "delft"]);
        let config = StartupConfig::from_cli(&cli).expect("valid arguments");
        assert!(config.once);
        assert!(config.json);
        assert_eq!(config.refresh.initial_segment.as_deref(), Some("delft"));
    }

    #[test]
    fn test_startup_config_from_cli_provider_url() {
        let cli = Cli::parse_from(["segwatch", "--provider-url", "http://localhost:1234/v1"]);
        let config = StartupConfig::from_cli(&cli).expect("valid arguments");
        assert_eq!(config.provider.base_url, "http://localhost:1234/v1");
    }
}
