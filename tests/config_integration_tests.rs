//! Integration tests for ConfigManager and settings file handling
//!
//! These tests verify:
//! - Launcher configuration defaults and YAML overrides
//! - Settings back-fill for documents written by older versions
//! - Summon element recomputation on save
//! - Integration with StateManager through the BotController

mod common;

use common::{create_test_dir, ready_settings, write_settings};
use ga_launcher::config::{load_settings, save_settings};
use ga_launcher::models::Element;
use ga_launcher::models::summons::catalog;
use ga_launcher::services::default_lifecycle;
use ga_launcher::{BotController, ConfigManager, LauncherConfig, StateManager};
use serde_json::{Value, json};
use std::fs;
use std::sync::Arc;

#[test]
fn test_create_config_manager() {
    let (_temp_dir, config_path) = create_test_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    assert_eq!(manager.config_dir(), &config_path);
}

#[test]
fn test_default_launcher_config_round_trips_through_yaml() {
    let (_temp_dir, config_path) = create_test_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    assert!(manager.write_default_launcher_config().unwrap());

    let yaml: serde_yaml_ng::Value =
        serde_yaml_ng::from_str(&fs::read_to_string(manager.launcher_config_path()).unwrap())
            .unwrap();
    assert_eq!(yaml["settings_path"].as_str(), Some("backend/settings.json"));
    assert_eq!(
        yaml["api_base_url"].as_str(),
        Some("https://granblue-automation-statistics.com")
    );

    let loaded = manager.load_launcher_config().unwrap();
    assert_eq!(loaded, LauncherConfig::default());
}

#[test]
fn test_invalid_launcher_yaml_is_an_error() {
    let (_temp_dir, config_path) = create_test_dir();
    let manager = ConfigManager::new(&config_path).unwrap();
    fs::write(manager.launcher_config_path(), "api_timeout_secs: [not, a, number]\n").unwrap();

    assert!(manager.load_launcher_config().is_err());
}

#[test]
fn test_load_backfills_missing_sections() {
    let (_temp_dir, root) = create_test_dir();
    let path = root.join("settings.json");
    fs::write(
        &path,
        r#"{ "game": { "farmingMode": "Raid", "item": "Silver Centrum", "partyNumber": 4 } }"#,
    )
    .unwrap();

    let settings = load_settings(&path).unwrap();

    assert_eq!(settings.game.farming_mode, "Raid");
    assert_eq!(settings.game.party_number, 4);
    // Missing keys inside a present section fall back to their defaults
    assert_eq!(settings.game.group_number, 1);
    // Missing sections come from the defaults
    assert_eq!(settings.api.username, "");
    assert!(settings.configuration.enable_refresh_during_combat);
}

#[test]
fn test_load_does_not_write_the_file() {
    let (_temp_dir, root) = create_test_dir();
    let path = root.join("settings.json");
    let original = r#"{"game":{"item":"EXP"}}"#;
    fs::write(&path, original).unwrap();

    load_settings(&path).unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), original);
}

#[test]
fn test_save_preserves_unknown_keys() {
    let (_temp_dir, root) = create_test_dir();
    let path = root.join("settings.json");
    fs::write(
        &path,
        r#"{ "sandbox": { "enableDefender": true }, "game": { "summons": ["Kaguya", "Nobody"] } }"#,
    )
    .unwrap();

    let settings = load_settings(&path).unwrap();
    save_settings(&path, &settings, catalog()).unwrap();

    let written: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written["sandbox"], json!({ "enableDefender": true }));
    assert_eq!(written["game"]["summonElements"], json!(["Misc"]));
    assert_eq!(written["nightmare"]["nightmareSummonElements"], json!([]));
}

#[test]
fn test_save_maps_each_summon_to_its_bucket() {
    let (_temp_dir, root) = create_test_dir();
    let path = root.join("settings.json");

    let mut settings = ready_settings();
    settings.game.summons = vec![
        "Colossus Omega".to_string(),
        "Varuna".to_string(),
        "Titan".to_string(),
        "Bahamut".to_string(),
    ];
    let written = save_settings(&path, &settings, catalog()).unwrap();

    assert_eq!(
        written.game.summon_elements,
        vec![Element::Fire, Element::Water, Element::Earth, Element::Dark]
    );
}

#[test]
fn test_controller_saves_settings_changes_after_load() {
    let (_temp_dir, root) = create_test_dir();
    write_settings(&root, &ready_settings());

    let controller = BotController::new(
        Arc::new(StateManager::new()),
        common::launcher_config(&root, "http://127.0.0.1:1"),
        default_lifecycle(),
    )
    .unwrap();
    assert!(controller.load_settings());
    assert!(controller.state().read(|s| s.ready));

    controller.update_settings(|settings| settings.game.mission.clear());

    assert!(!controller.state().read(|s| s.ready));
    let saved = load_settings(&root.join("settings.json")).unwrap();
    assert_eq!(saved.game.mission, "");
    assert_eq!(saved.game.summon_elements, vec![Element::Fire]);
}

#[test]
fn test_controller_reports_write_failure() {
    let (_temp_dir, root) = create_test_dir();

    let config = LauncherConfig {
        settings_path: root.join("missing-dir").join("settings.json"),
        ..common::launcher_config(&root, "http://127.0.0.1:1")
    };
    let controller =
        BotController::new(Arc::new(StateManager::new()), config, default_lifecycle()).unwrap();
    controller.load_settings();

    controller.update_settings(|settings| settings.game.item = "EXP".to_string());

    let log = controller.state().messages_since(0);
    assert!(
        log.iter()
            .any(|m| m.starts_with("\nEncountered write exception while saving settings to settings.json:"))
    );
}
