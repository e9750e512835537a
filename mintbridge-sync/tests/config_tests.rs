use mintbridge_sync::{
    DateField, DestinationConfig, ListFilters, MappingConfig, SourceAuthMode, SourceConfig,
    SyncConfig, SyncError,
};
use pretty_assertions::assert_eq;

fn valid_source() -> SourceConfig {
    SourceConfig {
        client_id: "id".into(),
        client_secret: "secret".into(),
        ..Default::default()
    }
}

fn valid_destination() -> DestinationConfig {
    DestinationConfig {
        username: "user".into(),
        password: "pass".into(),
        ..Default::default()
    }
}

fn valid() -> SyncConfig {
    SyncConfig {
        source: valid_source(),
        destination: valid_destination(),
        ..Default::default()
    }
}

fn config_error(result: Result<(), SyncError>, needle: &str) {
    match result {
        Err(SyncError::Config(msg)) => assert!(msg.contains(needle), "{msg}"),
        other => panic!("expected config error mentioning {needle}, got {other:?}"),
    }
}

// ── Defaults ────────────────────────────────────────────────────

#[test]
fn defaults_point_at_production_hosts() {
    let config = SyncConfig::default();
    assert_eq!(config.source.api_base_url, "https://api.dsco.io/api/v3");
    assert_eq!(config.source.auth_mode, SourceAuthMode::OAuth);
    assert_eq!(config.source.page_size, 100);
    assert_eq!(config.destination.api_base_url, "https://api.mintsoft.co.uk");
    assert!(config.destination.index_lookups);
    assert_eq!(config.default_window_hours, 1);
}

#[test]
fn default_courier_table() {
    let mapping = MappingConfig::default();
    assert_eq!(mapping.courier_services.get("UPS Ground"), Some(&1036));
    assert_eq!(mapping.courier_services.get("FEDEX"), Some(&1007));
    assert_eq!(mapping.default_courier_service_id, 1006);
}

#[test]
fn default_config_lacks_credentials() {
    config_error(SyncConfig::default().validate(), "client_id");
}

#[test]
fn populated_config_validates() {
    valid().validate().unwrap();
}

// ── Source ──────────────────────────────────────────────────────

#[test]
fn oauth_requires_secret() {
    let config = SourceConfig {
        client_secret: " ".into(),
        ..valid_source()
    };
    config_error(config.validate(), "client_secret");
}

#[test]
fn api_key_mode_requires_key_only() {
    let config = SourceConfig {
        auth_mode: SourceAuthMode::ApiKey,
        ..Default::default()
    };
    config_error(config.validate(), "api_key");

    let config = SourceConfig {
        api_key: Some("k".into()),
        ..config
    };
    config.validate().unwrap();
}

#[test]
fn basic_mode_ignores_token_url() {
    let config = SourceConfig {
        auth_mode: SourceAuthMode::Basic,
        auth_url: String::new(),
        ..valid_source()
    };
    config.validate().unwrap();
}

#[test]
fn base_url_must_be_http() {
    let config = SourceConfig {
        api_base_url: "api.dsco.io".into(),
        ..valid_source()
    };
    config_error(config.validate(), "http(s)");
}

#[test]
fn zero_page_size_is_rejected() {
    let config = SourceConfig {
        page_size: 0,
        ..valid_source()
    };
    config_error(config.validate(), "page_size");
}

// ── Destination ─────────────────────────────────────────────────

#[test]
fn destination_requires_login() {
    let config = DestinationConfig {
        password: String::new(),
        ..valid_destination()
    };
    config_error(config.validate(), "password");
}

#[test]
fn destination_zero_max_pages_is_rejected() {
    let config = DestinationConfig {
        max_pages: 0,
        ..valid_destination()
    };
    config_error(config.validate(), "max_pages");
}

#[test]
fn non_positive_window_is_rejected() {
    let config = SyncConfig {
        default_window_hours: 0,
        ..valid()
    };
    config_error(config.validate(), "default_window_hours");
}

// ── Serialization ───────────────────────────────────────────────

#[test]
fn config_survives_json() {
    let mut config = valid();
    config.source.auth_mode = SourceAuthMode::ApiKey;
    config.source.api_key = Some("k".into());

    let json = serde_json::to_value(&config).unwrap();
    assert_eq!(json["source"]["auth_mode"], "api_key");

    let back: SyncConfig = serde_json::from_value(json).unwrap();
    assert_eq!(back.source.api_key.as_deref(), Some("k"));
    assert_eq!(back.destination.username, "user");
}

#[test]
fn date_field_parses_cli_spellings() {
    assert_eq!("created".parse::<DateField>().unwrap(), DateField::Created);
    assert_eq!(" Updated ".parse::<DateField>().unwrap(), DateField::Updated);
    assert_eq!(
        "retailer_created".parse::<DateField>().unwrap(),
        DateField::RetailerCreated
    );
    assert!(matches!(
        "shipped".parse::<DateField>(),
        Err(SyncError::Config(_))
    ));
}

#[test]
fn filters_builder() {
    let filters = ListFilters::default()
        .with_date_field(DateField::Updated)
        .with_status("released");
    assert_eq!(filters.date_field, DateField::Updated);
    assert_eq!(filters.status.as_deref(), Some("released"));
    assert_eq!(filters.date_field.to_string(), "updated");
}
