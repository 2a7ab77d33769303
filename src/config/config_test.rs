use crate::config::ChannelOptions;
use crate::config::Namespace;
use crate::config::NodeConfig;

fn with_namespace(name: &str) -> NodeConfig {
    let mut config = NodeConfig::default();
    config.namespaces.push(Namespace {
        name: name.to_owned(),
        options: ChannelOptions {
            presence: true,
            join_leave: true,
            history_size: 10,
            history_lifetime: 60,
        },
    });
    config
}

#[test]
fn test_defaults_validate() {
    let config = NodeConfig::default().validate().expect("defaults must be valid");
    assert_eq!(config.namespace_channel_boundary, ":");
    assert!(config.node_info_max_delay_ms > config.node_ping_interval_ms);
}

#[test]
fn test_zero_ping_interval_rejected() {
    let mut config = NodeConfig::default();
    config.node_ping_interval_ms = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_max_delay_must_exceed_ping_interval() {
    let mut config = NodeConfig::default();
    config.node_ping_interval_ms = 5_000;
    config.node_info_max_delay_ms = 5_000;
    assert!(config.validate().is_err());
}

#[test]
fn test_duplicate_namespace_rejected() {
    let mut config = with_namespace("public");
    config.namespaces.push(Namespace {
        name: "public".to_owned(),
        options: ChannelOptions::default(),
    });
    assert!(config.validate().is_err());
}

#[test]
fn test_namespace_name_must_not_contain_boundary() {
    let config = with_namespace("pub:lic");
    assert!(config.validate().is_err());
}

#[test]
fn test_empty_namespace_name_rejected() {
    let config = with_namespace("");
    assert!(config.validate().is_err());
}

#[test]
fn test_channel_opts_resolution() {
    let mut config = with_namespace("public");
    config.options.history_size = 3;
    let config = config.validate().unwrap();

    let top = config.channel_opts("").expect("empty namespace uses top-level options");
    assert_eq!(top.history_size, 3);
    assert!(!top.presence);

    let ns = config.channel_opts("public").expect("configured namespace resolves");
    assert!(ns.presence);
    assert_eq!(ns.history_size, 10);

    assert!(config.channel_opts("missing").is_none());
}
