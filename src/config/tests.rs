use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn defaults_apply_when_nothing_is_configured() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(matches!(settings.logging.format, LogFormat::Compact));
    assert_eq!(settings.render.default_page_template, DEFAULT_PAGE_TEMPLATE);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn zero_port_is_rejected() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(0);

    let err = Settings::from_raw(raw).expect_err("must fail");
    assert!(matches!(err, LoadError::Invalid { key, .. } if key == "server.port"));
}

#[test]
fn blank_page_template_is_rejected() {
    let mut raw = RawSettings::default();
    raw.render.default_page_template = Some("   ".to_string());

    let err = Settings::from_raw(raw).expect_err("must fail");
    assert!(matches!(err, LoadError::Invalid { key, .. } if key == "render.default_page_template"));
}

#[test]
fn page_template_override_is_trimmed() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        render_page_template: Some(" fe_custom ".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.render.default_page_template, "fe_custom");
}
