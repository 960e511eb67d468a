//! Integration tests for configuration loading.

use frameseek::config::{load_config, load_config_or_default, parse_config, Config};
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

#[test]
fn empty_config_is_default() {
    let config = parse_config("").unwrap();
    assert_eq!(config, Config::default());
    assert!(config.cache.persist);
    assert_eq!(config.engine.native_retries, 3);
    assert_eq!(config.engine.native_decode_limit, 1000);
}

#[test]
fn sections_override_defaults() {
    let config = parse_config(
        r#"
[engine]
calibration_samples = 64
timestamp_tolerance = 2
verification_points = [0.8, 0.2]

[cache]
dir = "/var/cache/frameseek"
persist = false

[tools]
ffprobe_path = "/opt/ffmpeg/bin/ffprobe"
"#,
    )
    .unwrap();

    assert_eq!(config.engine.calibration_samples, 64);
    assert_eq!(config.engine.timestamp_tolerance, Some(2));
    assert_eq!(config.engine.verification_points, vec![0.8, 0.2]);
    assert_eq!(config.engine.start_margin, 8);
    assert_eq!(config.cache.dir, Some(PathBuf::from("/var/cache/frameseek")));
    assert!(!config.cache.persist);
    assert_eq!(
        config.tools.ffprobe_path,
        Some(PathBuf::from("/opt/ffmpeg/bin/ffprobe"))
    );
}

#[test]
fn tilde_is_expanded() {
    let config = parse_config("[cache]\ndir = \"~/frameseek-cache\"\n").unwrap();
    let dir = config.cache.dir.unwrap();
    assert!(!dir.to_string_lossy().starts_with('~'));
    assert!(dir.ends_with("frameseek-cache"));
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[test]
fn zero_multiplier_is_rejected() {
    let err = parse_config("[engine]\nindex_retry_multiplier = 0\n").unwrap_err();
    assert!(format!("{err:#}").contains("index_retry_multiplier"));
}

#[test]
fn zero_samples_are_rejected() {
    assert!(parse_config("[engine]\ncalibration_samples = 0\n").is_err());
}

#[test]
fn empty_cache_dir_is_rejected() {
    assert!(parse_config("[cache]\ndir = \"\"\n").is_err());
}

#[test]
fn malformed_toml_is_rejected() {
    assert!(parse_config("[engine\nnative_retries = 3").is_err());
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

#[test]
fn load_from_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("frameseek.toml");
    fs::write(&path, "[engine]\nstart_margin = 20\n").unwrap();

    let config = load_config(&path).unwrap();
    assert_eq!(config.engine.start_margin, 20);

    let config = load_config_or_default(Some(&path)).unwrap();
    assert_eq!(config.engine.start_margin, 20);
}

#[test]
fn missing_explicit_file_is_an_error() {
    let dir = tempdir().unwrap();
    let err = load_config_or_default(Some(&dir.path().join("nope.toml"))).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
fn round_trips_through_toml() {
    let config = parse_config("[engine]\nsequential_reuse_gap = 100\n").unwrap();
    let text = toml::to_string(&config).unwrap();
    assert_eq!(parse_config(&text).unwrap(), config);
}
