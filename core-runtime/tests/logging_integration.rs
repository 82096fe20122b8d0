//! Integration tests for logging system

use bridge_traits::time::LogLevel;
use core_runtime::logging::{redact_if_sensitive, LogFormat, LoggingConfig};

#[test]
fn test_logging_config_builder() {
    // Logging can only be initialized once per process, so only the builder is exercised here.
    let config = LoggingConfig::default()
        .with_format(LogFormat::Json)
        .with_level(LogLevel::Debug)
        .with_spans(true);

    assert_eq!(config.format, LogFormat::Json);
    assert_eq!(config.level, LogLevel::Debug);
    assert!(config.enable_spans);
}

#[test]
fn test_credentials_are_redacted() {
    assert_eq!(redact_if_sensitive("access_token", "abc123"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("api_key", "abc123"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("password", "hunter2"), "[REDACTED]");
}

#[test]
fn test_identifiers_pass_through() {
    assert_eq!(
        redact_if_sensitive("item_id", "3f2b9c1e8d7a4b6c9e0f1a2b3c4d5e6f"),
        "3f2b9c1e8d7a4b6c9e0f1a2b3c4d5e6f"
    );
    assert_eq!(redact_if_sensitive("name", "Pilot"), "Pilot");
    assert_eq!(redact_if_sensitive("genre", "Drama"), "Drama");
}

#[test]
fn test_format_selection() {
    #[cfg(debug_assertions)]
    assert_eq!(LoggingConfig::default().format, LogFormat::Pretty);

    #[cfg(not(debug_assertions))]
    assert_eq!(LoggingConfig::default().format, LogFormat::Json);
}

#[test]
fn test_filter_configuration() {
    let config = LoggingConfig::default().with_filter("core_downloads=debug,core_sync=trace");

    assert_eq!(
        config.filter,
        Some("core_downloads=debug,core_sync=trace".to_string())
    );
}

#[test]
fn test_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn)
        .with_spans(false)
        .with_target(false)
        .with_thread_info(true);

    assert_eq!(config.format, LogFormat::Compact);
    assert_eq!(config.level, LogLevel::Warn);
    assert!(!config.enable_spans);
    assert!(!config.display_target);
    assert!(config.display_thread_info);
}
