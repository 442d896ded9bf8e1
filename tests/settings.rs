use config::{Config, File};
use etherscan_session_verifier::Settings;
use pretty_assertions::assert_eq;

#[test]
fn test_base_settings() {
    std::env::set_var("ETHERSCAN_SESSION_VERIFIER__CONFIG", "config/base.toml");
    let base_settings = Settings::new().expect("Failed to parse config");
    let default_settings = Settings::default();

    assert_eq!(default_settings, base_settings);
}

#[test]
fn test_example_settings() {
    let settings: Settings = Config::builder()
        .add_source(File::with_name("config/example.toml"))
        .build()
        .expect("Failed to read config")
        .try_deserialize()
        .expect("Failed to parse config");

    let chains = settings.chains.inner();
    assert_eq!(3, chains.len());
    assert_eq!("Gnosis", chains["100"].name);
    assert_eq!(2, chains["1"].rpc.len());
    assert!(settings.metrics.enabled);
    assert_eq!(20, settings.rpc.request_timeout);
    assert_eq!(7200, settings.session.ttl);
}
