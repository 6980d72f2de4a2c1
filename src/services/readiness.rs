use crate::models::GameSettings;
use std::fmt;

/// Farming mode selected in the settings.
///
/// Only the modes that change what must be configured get their own variant;
/// every other mode name is carried in [`FarmingMode::Other`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FarmingMode {
    Unset,
    Coop,
    Arcarum,
    ArcarumSandbox,
    Generic,
    Other(String),
}

impl FarmingMode {
    pub fn parse(mode: &str) -> Self {
        match mode {
            "" => FarmingMode::Unset,
            "Coop" => FarmingMode::Coop,
            "Arcarum" => FarmingMode::Arcarum,
            "Arcarum Sandbox" => FarmingMode::ArcarumSandbox,
            "Generic" => FarmingMode::Generic,
            other => FarmingMode::Other(other.to_string()),
        }
    }

    /// Whether a support summon must be selected before starting
    pub fn requires_summon(&self) -> bool {
        matches!(self, FarmingMode::Generic | FarmingMode::Other(_))
    }

    /// Whether a mission must be selected before starting
    pub fn requires_mission(&self) -> bool {
        !matches!(self, FarmingMode::Unset | FarmingMode::Generic)
    }
}

impl fmt::Display for FarmingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FarmingMode::Unset => f.write_str(""),
            FarmingMode::Coop => f.write_str("Coop"),
            FarmingMode::Arcarum => f.write_str("Arcarum"),
            FarmingMode::ArcarumSandbox => f.write_str("Arcarum Sandbox"),
            FarmingMode::Generic => f.write_str("Generic"),
            FarmingMode::Other(mode) => f.write_str(mode),
        }
    }
}

/// Why the bot cannot start yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingRequirement {
    FarmingMode,
    Item,
    Mission,
    Summon,
}

impl fmt::Display for MissingRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            MissingRequirement::FarmingMode => "no farming mode selected",
            MissingRequirement::Item => "no item selected",
            MissingRequirement::Mission => "no mission selected",
            MissingRequirement::Summon => "no support summon selected",
        };
        f.write_str(text)
    }
}

/// List what is still missing before the bot can start with these settings.
pub fn missing_requirements(game: &GameSettings) -> Vec<MissingRequirement> {
    let mode = FarmingMode::parse(&game.farming_mode);
    if mode == FarmingMode::Unset {
        return vec![MissingRequirement::FarmingMode];
    }

    let mut missing = Vec::new();
    if game.item.is_empty() {
        missing.push(MissingRequirement::Item);
    }
    if mode.requires_mission() && game.mission.is_empty() {
        missing.push(MissingRequirement::Mission);
    }
    if mode.requires_summon() && game.summons.is_empty() {
        missing.push(MissingRequirement::Summon);
    }
    missing
}

/// Whether the bot is ready to start.
///
/// - Coop, Arcarum, Arcarum Sandbox: item and mission
/// - Generic: item and at least one summon
/// - any other named mode: item, mission and at least one summon
/// - no mode: never ready
pub fn is_ready(game: &GameSettings) -> bool {
    missing_requirements(game).is_empty()
}
