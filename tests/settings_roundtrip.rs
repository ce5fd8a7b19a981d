use champdup_client::settings::WidthRange;
use champdup_client::ClientSettings;
use tempfile::tempdir;

#[test]
fn missing_or_empty_file_loads_defaults() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing.json");
    let settings = ClientSettings::load(missing.to_str().unwrap()).unwrap();
    assert_eq!(settings, ClientSettings::default());

    let empty = dir.path().join("empty.json");
    std::fs::write(&empty, "").unwrap();
    let settings = ClientSettings::load(empty.to_str().unwrap()).unwrap();
    assert_eq!(settings.canvas_size, 375);
    assert_eq!(settings.brush_color, "#000000");
    assert_eq!(settings.poll_early_close_ms, 500);
    assert_eq!(settings.storage_budget_bytes, 5 * 1024 * 1024);
}

#[test]
fn saved_settings_load_back() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("settings.json");
    let path = path.to_str().unwrap();

    let settings = ClientSettings {
        username: "ann".into(),
        is_host: true,
        brush_width: 22,
        brush_width_range: WidthRange { min: 2, max: 30 },
        reminder_fraction: 0.75,
        debug_logging: true,
        ..ClientSettings::default()
    };
    settings.save(path).unwrap();

    let loaded = ClientSettings::load(path).unwrap();
    assert_eq!(loaded, settings);
    assert_eq!(loaded.brush_width_range(), 2..=30);
}

#[test]
fn invalid_json_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ username: ann").unwrap();
    let err = ClientSettings::load(path.to_str().unwrap()).unwrap_err();
    assert!(err.to_string().contains("parse settings file"));
}
