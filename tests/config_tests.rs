use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use manifest_listen::config::Configuration;

#[test]
fn empty_config_uses_defaults() {
    let cfg: Configuration = serde_yaml::from_str("{}").unwrap();
    let cfg = cfg.validated().unwrap();
    assert_eq!(cfg.manifest_url, "");
    assert_eq!(cfg.poll_interval(), Duration::from_millis(2000));
    assert_eq!(cfg.fetch_timeout(), Duration::from_millis(1500));
    assert_eq!(cfg.load_timeout(), Duration::from_secs(10));
    assert!(cfg.autostart);
    assert!(cfg.close_on_exit);
    assert!(cfg.control.enabled);
    assert_eq!(cfg.control.bind_address, IpAddr::V4(Ipv4Addr::LOCALHOST));
    assert_eq!(cfg.control.port, 8470);
    assert!(cfg.user_agent.starts_with("manifest-listen/"));
}

#[test]
fn parse_kebab_case_config() {
    let yaml = r#"
manifest-url: "  https://forms.example.org/reading/images.txt  "
poll-interval-ms: 5000
fetch-timeout-ms: 4000
load-timeout-ms: 2500
autostart: false
close-on-exit: false
control:
  bind-address: 0.0.0.0
  port: 9000
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    let cfg = cfg.validated().unwrap();
    assert_eq!(
        cfg.manifest_url,
        "https://forms.example.org/reading/images.txt"
    );
    assert_eq!(cfg.poll_interval(), Duration::from_secs(5));
    assert_eq!(cfg.fetch_timeout(), Duration::from_secs(4));
    assert_eq!(cfg.load_timeout(), Duration::from_millis(2500));
    assert!(!cfg.autostart);
    assert!(!cfg.close_on_exit);
    assert_eq!(cfg.control.socket_addr().to_string(), "0.0.0.0:9000");
}

#[test]
fn fetch_timeout_must_be_below_poll_interval() {
    let yaml = r#"
poll-interval-ms: 1000
fetch-timeout-ms: 1000
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    let err = cfg.validated().unwrap_err();
    assert!(err.to_string().contains("fetch-timeout-ms"), "{err}");
}

#[test]
fn zero_values_are_rejected() {
    for yaml in [
        "poll-interval-ms: 0",
        "fetch-timeout-ms: 0",
        "load-timeout-ms: 0",
        "user-agent: ''",
    ] {
        let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
        assert!(cfg.validated().is_err(), "accepted: {yaml}");
    }
}

#[test]
fn invalid_control_address_fails_to_parse() {
    let yaml = r#"
control:
  bind-address: not-an-ip
"#;
    assert!(serde_yaml::from_str::<Configuration>(yaml).is_err());
}

#[test]
fn loads_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "manifest-url: file:///srv/list.txt\n").unwrap();

    let cfg = Configuration::from_yaml_file(&path).unwrap();
    assert_eq!(cfg.manifest_url, "file:///srv/list.txt");

    let missing = Configuration::from_yaml_file(dir.path().join("absent.yaml"));
    assert!(missing.is_err());
}
