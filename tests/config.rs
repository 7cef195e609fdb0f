use procload::cli::Cli;
use procload::config::{Config, OutputFormat};
use serial_test::serial;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

/// A helper function to run a test with a temporary config file.
fn with_config_file<F>(toml_content: &str, test_fn: F)
where
    F: FnOnce(PathBuf),
{
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", toml_content).unwrap();
    let path = file.path().to_path_buf();
    test_fn(path);
}

fn cli_with_config(path: PathBuf) -> Cli {
    Cli {
        config: Some(path),
        ..Default::default()
    }
}

#[test]
#[serial]
fn test_load_full_valid_config() {
    let toml_content = r#"
        log_level = "debug"
        interval_seconds = 5
        cycle_timeout_ms = 250
        proc_root = "/host/proc"
        targets = ["myapp", "/usr/sbin/sshd"]
        targets_file = "/etc/procload/targets.json"
        [output]
        stdout = true
        format = "Json"
        log_samples = false
        [metrics]
        enabled = true
        listen_address = "0.0.0.0:9100"
        system_metrics_enabled = true
    "#;

    with_config_file(toml_content, |path| {
        let config = Config::load(&cli_with_config(path)).unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.interval_seconds, 5);
        assert_eq!(config.cycle_timeout_ms, 250);
        assert_eq!(config.proc_root, PathBuf::from("/host/proc"));
        assert_eq!(config.targets, vec!["myapp", "/usr/sbin/sshd"]);
        assert_eq!(
            config.targets_file,
            Some(PathBuf::from("/etc/procload/targets.json"))
        );
        assert!(config.output.stdout);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(!config.output.log_samples);
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.listen_address, "0.0.0.0:9100".parse().unwrap());
        assert!(config.metrics.system_metrics_enabled);
    });
}

#[test]
#[serial]
fn test_partial_config_keeps_defaults() {
    with_config_file("interval_seconds = 3\n[output]\nstdout = true\n", |path| {
        let config = Config::load(&cli_with_config(path)).unwrap();

        assert_eq!(config.interval_seconds, 3);
        assert!(config.output.stdout);
        assert!(config.output.log_samples);
        assert_eq!(config.output.format, OutputFormat::PlainText);
        assert_eq!(config.cycle_timeout_ms, 5_000);
        assert_eq!(config.proc_root, PathBuf::from("/proc"));
    });
}

#[test]
#[serial]
fn test_no_config_file_uses_defaults() {
    let config = Config::load(&Cli::default()).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
#[serial]
fn test_zero_interval_is_rejected() {
    with_config_file("interval_seconds = 0\n", |path| {
        let err = Config::load(&cli_with_config(path)).unwrap_err();
        assert!(err.to_string().contains("interval_seconds"));
    });
}

#[test]
#[serial]
fn test_malformed_toml_is_rejected() {
    with_config_file("interval_seconds = \"soon\"\n", |path| {
        assert!(Config::load(&cli_with_config(path)).is_err());
    });
}

#[test]
#[serial]
fn test_env_overrides_file() {
    with_config_file("interval_seconds = 3\n", |path| {
        std::env::set_var("PROCLOAD_INTERVAL_SECONDS", "7");
        std::env::set_var("PROCLOAD_METRICS__ENABLED", "true");
        let result = Config::load(&cli_with_config(path));
        std::env::remove_var("PROCLOAD_INTERVAL_SECONDS");
        std::env::remove_var("PROCLOAD_METRICS__ENABLED");

        let config = result.unwrap();
        assert_eq!(config.interval_seconds, 7);
        assert!(config.metrics.enabled);
    });
}

#[test]
#[serial]
fn test_cli_overrides_env_and_file() {
    with_config_file("interval_seconds = 3\nlog_level = \"warn\"\n", |path| {
        std::env::set_var("PROCLOAD_INTERVAL_SECONDS", "7");
        let cli = Cli {
            config: Some(path),
            interval: Some(9),
            json: true,
            targets: Some(PathBuf::from("targets.json")),
            proc_root: Some(PathBuf::from("/tmp/fake-proc")),
            metrics_addr: Some("127.0.0.1:9999".parse().unwrap()),
            ..Default::default()
        };
        let result = Config::load(&cli);
        std::env::remove_var("PROCLOAD_INTERVAL_SECONDS");

        let config = result.unwrap();
        assert_eq!(config.interval_seconds, 9);
        assert_eq!(config.log_level, "warn");
        assert!(config.output.stdout);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.targets_file, Some(PathBuf::from("targets.json")));
        assert_eq!(config.proc_root, PathBuf::from("/tmp/fake-proc"));
        assert!(config.metrics.enabled);
        assert_eq!(
            config.metrics.listen_address,
            "127.0.0.1:9999".parse().unwrap()
        );
    });
}
