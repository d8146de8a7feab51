//! Command-line parsing and config loading.

use clap::Parser;
use std::io::Write;
use std::time::Duration;

use reflect_server::{CliArgs, ServerConfig};

#[test]
fn test_no_arguments_parse() {
    let args = CliArgs::try_parse_from(["reflect-server"]).unwrap();
    assert!(args.port.is_none());
    assert!(args.stun_servers.is_empty());
    assert!(!args.log_json);
}

#[test]
fn test_stun_is_repeatable() {
    let args = CliArgs::try_parse_from([
        "reflect-server",
        "--stun",
        "stun:stun.l.google.com:19302",
        "--stun",
        "stun:stun1.example.org:3478",
    ])
    .unwrap();

    assert_eq!(
        args.stun_servers,
        vec!["stun:stun.l.google.com:19302", "stun:stun1.example.org:3478"]
    );
}

#[test]
fn test_timeouts_and_ports() {
    let args = CliArgs::try_parse_from([
        "reflect-server",
        "-p",
        "9443",
        "--media-port",
        "0",
        "--offer-timeout",
        "30",
        "--gathering-timeout",
        "0",
        "--keyframe-interval",
        "2",
        "--log-json",
    ])
    .unwrap();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[reflect]\nstats_interval = 7").unwrap();
    let args = CliArgs {
        config: Some(file.path().to_path_buf()),
        ..args
    };

    let config = ServerConfig::load(&args).unwrap();
    assert_eq!(config.api.port, 9443);
    assert_eq!(config.reflect.media_port, None);
    assert_eq!(config.reflect.offer_timeout, Some(Duration::from_secs(30)));
    assert_eq!(config.reflect.gathering_timeout, None);
    assert_eq!(config.reflect.keyframe_interval, Some(Duration::from_secs(2)));
    assert_eq!(config.reflect.stats_interval, Duration::from_secs(7));
    assert!(config.logging.json);
}

#[test]
fn test_port_must_be_a_number() {
    assert!(CliArgs::try_parse_from(["reflect-server", "--port", "signal"]).is_err());
}

#[test]
fn test_malformed_config_file_is_an_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[reflect\nmedia_port = ").unwrap();

    let args = CliArgs {
        config: Some(file.path().to_path_buf()),
        ..Default::default()
    };
    let err = ServerConfig::load(&args).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
}
