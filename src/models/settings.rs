use crate::models::summons::{Element, SummonCatalog};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// User settings persisted to `settings.json`.
///
/// The document is shared with the bot process, which reads it on startup, so
/// field names follow the camelCase keys the bot expects. Keys this crate does
/// not know about, at the top level or inside a section, are carried in the
/// `extra` maps and written back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub api: ApiSettings,
    pub game: GameSettings,
    pub nightmare: NightmareSettings,
    pub discord: DiscordSettings,
    pub configuration: ConfigurationSettings,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Credentials for the Granblue Automation Statistics API
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiSettings {
    pub username: String,
    pub password: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameSettings {
    pub combat_script_name: String,
    pub combat_script: Vec<String>,
    pub farming_mode: String,
    pub item: String,
    pub mission: String,
    pub map: String,
    pub item_amount: u32,
    pub summons: Vec<String>,
    /// Derived from `summons` on every save
    pub summon_elements: Vec<Element>,
    pub group_number: u32,
    pub party_number: u32,
    pub debug_mode: bool,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NightmareSettings {
    pub enable_nightmare: bool,
    pub enable_custom_nightmare_settings: bool,
    pub nightmare_combat_script_name: String,
    pub nightmare_combat_script: Vec<String>,
    pub nightmare_summons: Vec<String>,
    /// Derived from `nightmare_summons` on every save
    pub nightmare_summon_elements: Vec<Element>,
    pub nightmare_group_number: u32,
    pub nightmare_party_number: u32,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiscordSettings {
    pub enable_discord_notifications: bool,
    pub discord_token: String,
    #[serde(rename = "userID")]
    pub user_id: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigurationSettings {
    pub enable_delay_between_runs: bool,
    pub delay_between_runs: u32,
    pub enable_randomized_delay_between_runs: bool,
    pub delay_between_runs_lower_bound: u32,
    pub delay_between_runs_upper_bound: u32,
    pub enable_auto_quick_summon: bool,
    pub enable_bypass_reset_summon: bool,
    pub enable_refresh_during_combat: bool,
    pub static_window: bool,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api: ApiSettings::default(),
            game: GameSettings::default(),
            nightmare: NightmareSettings::default(),
            discord: DiscordSettings::default(),
            configuration: ConfigurationSettings::default(),
            extra: Map::new(),
        }
    }
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            combat_script_name: String::new(),
            combat_script: Vec::new(),
            farming_mode: String::new(),
            item: String::new(),
            mission: String::new(),
            map: String::new(),
            item_amount: 1,
            summons: Vec::new(),
            summon_elements: Vec::new(),
            group_number: 1,
            party_number: 1,
            debug_mode: false,
            extra: Map::new(),
        }
    }
}

impl Default for NightmareSettings {
    fn default() -> Self {
        Self {
            enable_nightmare: false,
            enable_custom_nightmare_settings: false,
            nightmare_combat_script_name: String::new(),
            nightmare_combat_script: Vec::new(),
            nightmare_summons: Vec::new(),
            nightmare_summon_elements: Vec::new(),
            nightmare_group_number: 1,
            nightmare_party_number: 1,
            extra: Map::new(),
        }
    }
}

impl Default for ConfigurationSettings {
    fn default() -> Self {
        Self {
            enable_delay_between_runs: false,
            delay_between_runs: 15,
            enable_randomized_delay_between_runs: false,
            delay_between_runs_lower_bound: 15,
            delay_between_runs_upper_bound: 60,
            enable_auto_quick_summon: false,
            enable_bypass_reset_summon: false,
            enable_refresh_during_combat: true,
            static_window: true,
            extra: Map::new(),
        }
    }
}

impl Settings {
    /// Recompute the derived element lists from the selected summons.
    pub fn refresh_summon_elements(&mut self, catalog: &SummonCatalog) {
        self.game.summon_elements = catalog.elements_for(&self.game.summons);
        self.nightmare.nightmare_summon_elements =
            catalog.elements_for(&self.nightmare.nightmare_summons);
    }

    /// The default settings rendered as a JSON document.
    ///
    /// Used as the template when back-filling a loaded document.
    pub fn default_document() -> Value {
        // Serializing plain structs of strings, numbers and lists cannot fail
        serde_json::to_value(Settings::default()).unwrap_or_else(|_| Value::Object(Map::new()))
    }
}

/// Insert every top-level key of `defaults` that is missing from `document`.
///
/// Existing keys are left alone, even when their contents differ from the
/// defaults, and keys unknown to `defaults` are never removed.
///
/// # Returns
/// The names of the keys that were filled in, in template order. An empty list
/// is returned when either value is not a JSON object.
pub fn backfill_missing_keys(document: &mut Value, defaults: &Value) -> Vec<String> {
    let (Some(target), Some(template)) = (document.as_object_mut(), defaults.as_object()) else {
        return Vec::new();
    };

    let mut filled = Vec::new();
    for (key, value) in template {
        if !target.contains_key(key) {
            target.insert(key.clone(), value.clone());
            filled.push(key.clone());
        }
    }

    filled
}

/// Reset every known section field whose value cannot be read as its type.
///
/// A `null` or mistyped field is replaced with its default so the rest of the
/// document still loads. A section that is not an object is replaced whole.
///
/// # Returns
/// The replaced paths, as `section` or `section.field`
pub fn reset_unreadable_fields(document: &mut Value, defaults: &Value) -> Vec<String> {
    let (Some(target), Some(template)) = (document.as_object_mut(), defaults.as_object()) else {
        return Vec::new();
    };

    let mut reset = Vec::new();
    for (section, section_defaults) in template {
        let Some(current) = target.get_mut(section) else {
            continue;
        };
        let Some(fields) = current.as_object_mut() else {
            *current = section_defaults.clone();
            reset.push(section.clone());
            continue;
        };
        let Some(field_defaults) = section_defaults.as_object() else {
            continue;
        };

        for (field, default_value) in field_defaults {
            let Some(value) = fields.get_mut(field) else {
                continue;
            };
            if !field_is_readable(defaults, section, field, value) {
                *value = default_value.clone();
                reset.push(format!("{}.{}", section, field));
            }
        }
    }

    reset
}

/// Whether `value` deserializes when placed at `section.field` of the defaults.
fn field_is_readable(defaults: &Value, section: &str, field: &str, value: &Value) -> bool {
    let mut candidate = defaults.clone();
    candidate[section][field] = value.clone();
    serde_json::from_value::<Settings>(candidate).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_document_has_all_sections() {
        let document = Settings::default_document();
        let object = document.as_object().unwrap();

        for key in ["api", "game", "nightmare", "discord", "configuration"] {
            assert!(object.contains_key(key), "missing section {key}");
        }
        assert_eq!(document["game"]["groupNumber"], json!(1));
        assert_eq!(document["discord"]["userID"], json!(""));
    }

    #[test]
    fn test_backfill_keeps_existing_values() {
        let mut document = json!({
            "game": { "farmingMode": "Quest", "item": "EXP" },
        });

        let filled = backfill_missing_keys(&mut document, &Settings::default_document());

        assert_eq!(filled, vec!["api", "nightmare", "discord", "configuration"]);
        assert_eq!(document["game"]["farmingMode"], json!("Quest"));
        assert_eq!(document["api"]["username"], json!(""));
    }

    #[test]
    fn test_backfill_never_prunes_unknown_keys() {
        let mut document = json!({ "android": { "enableAndroid": true } });

        backfill_missing_keys(&mut document, &Settings::default_document());

        assert_eq!(document["android"]["enableAndroid"], json!(true));
    }

    #[test]
    fn test_backfill_ignores_non_objects() {
        let mut document = json!(["not", "an", "object"]);
        assert!(backfill_missing_keys(&mut document, &Settings::default_document()).is_empty());
    }

    #[test]
    fn test_unknown_keys_round_trip_through_extra() {
        let document = json!({
            "game": { "farmingMode": "Raid" },
            "adb": { "deviceSerial": "emulator-5554" },
        });

        let settings: Settings = serde_json::from_value(document).unwrap();
        assert_eq!(settings.game.farming_mode, "Raid");
        assert!(settings.extra.contains_key("adb"));

        let written = serde_json::to_value(&settings).unwrap();
        assert_eq!(written["adb"]["deviceSerial"], json!("emulator-5554"));
    }

    #[test]
    fn test_unknown_section_keys_round_trip() {
        let document = json!({
            "game": { "farmingMode": "Quest", "enableAutoExitRaid": true },
            "configuration": { "timeAllowedUntilAutoExitRaid": 5 },
        });

        let settings: Settings = serde_json::from_value(document).unwrap();
        assert_eq!(settings.game.extra["enableAutoExitRaid"], json!(true));

        let written = serde_json::to_value(&settings).unwrap();
        assert_eq!(written["game"]["enableAutoExitRaid"], json!(true));
        assert_eq!(written["configuration"]["timeAllowedUntilAutoExitRaid"], json!(5));
        assert_eq!(written["configuration"]["delayBetweenRuns"], json!(15));
    }

    #[test]
    fn test_reset_unreadable_fields() {
        let mut document = json!({
            "game": { "item": "Gold", "groupNumber": null, "summons": "Agni", "custom": null },
            "nightmare": "broken",
            "configuration": { "delayBetweenRuns": 30 },
        });

        let reset = reset_unreadable_fields(&mut document, &Settings::default_document());

        assert_eq!(reset, vec!["game.summons", "game.groupNumber", "nightmare"]);
        assert_eq!(document["game"]["item"], json!("Gold"));
        assert_eq!(document["game"]["groupNumber"], json!(1));
        assert_eq!(document["game"]["custom"], Value::Null);
        assert_eq!(document["configuration"]["delayBetweenRuns"], json!(30));

        let settings: Settings = serde_json::from_value(document).unwrap();
        assert_eq!(settings.game.item, "Gold");
        assert_eq!(settings.nightmare, NightmareSettings::default());
    }

    #[test]
    fn test_reset_leaves_readable_document_alone() {
        let mut document = Settings::default_document();
        assert!(reset_unreadable_fields(&mut document, &Settings::default_document()).is_empty());
        assert_eq!(document, Settings::default_document());
    }

    #[test]
    fn test_refresh_summon_elements() {
        let mut settings = Settings::default();
        settings.game.summons = vec!["Agni".to_string(), "Unknown".to_string(), "Zeus".to_string()];
        settings.game.summon_elements = vec![Element::Dark];
        settings.nightmare.nightmare_summons = vec!["Titan".to_string()];

        settings.refresh_summon_elements(crate::models::summons::catalog());

        assert_eq!(settings.game.summon_elements, vec![Element::Fire, Element::Light]);
        assert_eq!(settings.nightmare.nightmare_summon_elements, vec![Element::Earth]);
    }

    #[test]
    fn test_missing_nested_fields_use_defaults() {
        let settings: Settings =
            serde_json::from_value(json!({ "game": { "item": "Gold Brick" } })).unwrap();

        assert_eq!(settings.game.item, "Gold Brick");
        assert_eq!(settings.game.party_number, 1);
        assert_eq!(settings.configuration.delay_between_runs, 15);
    }
}
