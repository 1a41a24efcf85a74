use std::fs;

use sysdash::core::config::DashboardConfig;
use sysdash::core::system_monitor::{Command, PanelId, SessionHandle, SortKey, Threshold};
use tempfile::TempDir;

#[test]
fn test_config_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("config.json");

    let mut config = DashboardConfig::default();
    config.update_interval_ms = 1750;
    config.thresholds.push(Threshold::above("disk:/home", 60.0, 70.0));
    config.visible_panels.remove(&PanelId::Battery);
    config.enable_containers = false;

    config.save_to(&path).unwrap();
    let loaded = DashboardConfig::load_from(&path).unwrap();

    assert_eq!(loaded, config);
}

#[test]
fn test_session_changes_survive_save_and_load() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    let config = DashboardConfig::default();

    let session = SessionHandle::new(config.session());
    session.apply(Command::IncreaseInterval);
    session.apply(Command::SortBy(SortKey::Memory));
    session.apply(Command::TogglePanel(PanelId::Network));

    config.with_session(&session.current()).save_to(&path).unwrap();
    let reloaded = DashboardConfig::load_from(&path).unwrap();
    let restored = reloaded.session();

    assert_eq!(restored.poll_interval_ms, 1250);
    assert_eq!(restored.sort_key, SortKey::Memory);
    assert!(!restored.is_visible(PanelId::Network));
    assert!(restored.is_visible(PanelId::Cpu));
}

#[test]
fn test_config_file_uses_readable_names() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    DashboardConfig::default().save_to(&path).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("\"update_interval_ms\": 1000"));
    assert!(text.contains("\"lower_is_worse\""));
    assert!(text.contains("\"battery\""));
}

#[test]
fn test_unknown_fields_are_ignored() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(
        &path,
        r#"{ "update_interval_ms": 500, "theme": "dark", "default_sort_key": "name" }"#,
    )
    .unwrap();

    let config = DashboardConfig::load_from(&path).unwrap();
    assert_eq!(config.update_interval_ms, 500);
    assert_eq!(config.default_sort_key, SortKey::Name);
}

#[test]
fn test_inverted_threshold_is_dropped_on_load() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    fs::write(
        &path,
        r#"{ "thresholds": [
            { "metric": "cpu", "warning": 90.0, "critical": 70.0 },
            { "metric": "memory", "warning": 70.0, "critical": 90.0 }
        ] }"#,
    )
    .unwrap();

    let config = DashboardConfig::load_from(&path).unwrap();
    assert_eq!(config.thresholds.len(), 1);
    assert_eq!(config.thresholds[0].metric.as_str(), "memory");
}
