use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Element categories used to group support summons.
///
/// `Misc` is the catch-all bucket for summons without an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Element {
    Fire,
    Water,
    Earth,
    Wind,
    Light,
    Dark,
    Misc,
}

impl Element {
    /// Lookup order when a summon name appears in more than one bucket
    pub const ALL: [Element; 7] = [
        Element::Fire,
        Element::Water,
        Element::Earth,
        Element::Wind,
        Element::Light,
        Element::Dark,
        Element::Misc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Element::Fire => "Fire",
            Element::Water => "Water",
            Element::Earth => "Earth",
            Element::Wind => "Wind",
            Element::Light => "Light",
            Element::Dark => "Dark",
            Element::Misc => "Misc",
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ElementBucket {
    pub summons: Vec<String>,
}

/// Fixed mapping of summon names to their element.
#[derive(Debug, Clone, Default)]
pub struct SummonCatalog {
    buckets: IndexMap<Element, ElementBucket>,
}

const BUNDLED_SUMMONS: &str = include_str!("../../data/summons.json");

static CATALOG: LazyLock<SummonCatalog> = LazyLock::new(|| {
    SummonCatalog::from_json(BUNDLED_SUMMONS).unwrap_or_else(|e| {
        tracing::error!("Bundled summon data is invalid: {:#}", e);
        SummonCatalog::default()
    })
});

/// The catalog compiled into the binary from `data/summons.json`
pub fn catalog() -> &'static SummonCatalog {
    &CATALOG
}

impl SummonCatalog {
    /// Parse a catalog of the form `{"Fire": {"summons": [...]}, ...}`.
    pub fn from_json(json: &str) -> Result<Self> {
        let buckets: IndexMap<Element, ElementBucket> =
            serde_json::from_str(json).context("Failed to parse summon catalog")?;
        Ok(Self { buckets })
    }

    /// Find the element bucket containing `summon`.
    ///
    /// Buckets are checked in [`Element::ALL`] order; `None` when no bucket
    /// lists the name.
    pub fn element_of(&self, summon: &str) -> Option<Element> {
        Element::ALL.into_iter().find(|element| {
            self.buckets
                .get(element)
                .is_some_and(|bucket| bucket.summons.iter().any(|s| s == summon))
        })
    }

    /// Map each summon to its element, skipping names found in no bucket.
    pub fn elements_for(&self, summons: &[String]) -> Vec<Element> {
        summons.iter().filter_map(|s| self.element_of(s)).collect()
    }

    pub fn summons(&self, element: Element) -> &[String] {
        self.buckets
            .get(&element)
            .map(|bucket| bucket.summons.as_slice())
            .unwrap_or_default()
    }
}
