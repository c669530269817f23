//! Composition and aggregate statistics models.
//!
//! Rates (`win_rate`, `top4_rate`) are percentages in `[0, 100]`;
//! `play_rate` is a fraction in `[0, 1]`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ModelError;

/// Strip the set prefix from a game asset id (`TFT13_Jinx` -> `Jinx`).
pub fn display_name(asset_id: &str) -> String {
    let tail = match asset_id.split_once('_') {
        Some((prefix, rest)) if prefix.starts_with("TFT") && !rest.is_empty() => rest,
        _ => asset_id,
    };
    tail.strip_prefix("Item_").unwrap_or(tail).to_string()
}

/// An item carried by a unit on a composition board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRef {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl ItemRef {
    pub fn from_asset(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: display_name(id),
            icon: None,
        }
    }
}

/// A unit as it appears inside a composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitRef {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    pub items: Vec<ItemRef>,
}

impl UnitRef {
    pub fn from_asset(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: display_name(id),
            icon: None,
            items: Vec::new(),
        }
    }
}

/// An active trait inside a composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraitRef {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub tier: u8,
    #[serde(default)]
    pub num_units: u8,
}

impl TraitRef {
    pub fn from_asset(id: &str, tier: u8, num_units: u8) -> Self {
        Self {
            id: id.to_string(),
            name: display_name(id),
            icon: None,
            tier,
            num_units,
        }
    }
}

/// A distinct team-build signature tracked across matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Composition {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Matches observed. Absent counts weigh 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(default)]
    pub avg_placement: f64,
    #[serde(default)]
    pub win_rate: f64,
    #[serde(default)]
    pub top4_rate: f64,
    #[serde(default)]
    pub units: Vec<UnitRef>,
    #[serde(default)]
    pub traits: Vec<TraitRef>,
}

impl Composition {
    /// Create an empty composition, rejecting blank ids or names.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Result<Self, ModelError> {
        let comp = Self {
            id: id.into(),
            name: name.into(),
            icon: None,
            count: None,
            avg_placement: 0.0,
            win_rate: 0.0,
            top4_rate: 0.0,
            units: Vec::new(),
            traits: Vec::new(),
        };
        comp.validate()?;
        Ok(comp)
    }

    pub fn with_stats(mut self, count: u32, avg_placement: f64, win_rate: f64, top4_rate: f64) -> Self {
        self.count = Some(count);
        self.avg_placement = avg_placement;
        self.win_rate = win_rate;
        self.top4_rate = top4_rate;
        self
    }

    pub fn with_units(mut self, units: Vec<UnitRef>) -> Self {
        self.units = units;
        self
    }

    pub fn with_traits(mut self, traits: Vec<TraitRef>) -> Self {
        self.traits = traits;
        self
    }

    /// Check the fields every fold step relies on.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.id.trim().is_empty() {
            return Err(ModelError::MissingField("composition.id"));
        }
        if self.name.trim().is_empty() {
            return Err(ModelError::MissingField("composition.name"));
        }
        Ok(())
    }

    /// Weight used by every weighted average: `count`, defaulting to 1.
    pub fn weight(&self) -> f64 {
        f64::from(self.count.unwrap_or(1))
    }

    /// Summary copy with empty nested arrays, used for back-references.
    pub fn trimmed(&self) -> Composition {
        Composition {
            id: self.id.clone(),
            name: self.name.clone(),
            icon: self.icon.clone(),
            count: Some(self.count.unwrap_or(1)),
            avg_placement: self.avg_placement,
            win_rate: self.win_rate,
            top4_rate: self.top4_rate,
            units: Vec::new(),
            traits: Vec::new(),
        }
    }
}

/// Aggregate statistics for one unit across all compositions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitAggregate {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub count: u32,
    pub avg_placement: f64,
    pub win_rate: f64,
    pub top4_rate: f64,
    pub play_rate: f64,
    pub related_compositions: Vec<Composition>,
}

/// Aggregate statistics for one trait at one active tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraitAggregate {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub tier: u8,
    pub count: u32,
    pub avg_placement: f64,
    pub win_rate: f64,
    pub top4_rate: f64,
    pub play_rate: f64,
    pub related_compositions: Vec<Composition>,
}

/// How one unit performs while carrying a given item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemUnitStats {
    pub unit_id: String,
    pub unit_name: String,
    pub count: u32,
    pub avg_placement: f64,
    pub win_rate: f64,
    pub top4_rate: f64,
    pub related_compositions: Vec<Composition>,
}

/// Aggregate statistics for one item, with a per-carrier breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemAggregate {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub count: u32,
    pub avg_placement: f64,
    pub win_rate: f64,
    pub top4_rate: f64,
    pub play_rate: f64,
    pub related_compositions: Vec<Composition>,
    pub units: Vec<ItemUnitStats>,
}

/// Entity types with a persisted stats snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Compositions,
    Units,
    Traits,
    Items,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Compositions,
        EntityKind::Units,
        EntityKind::Traits,
        EntityKind::Items,
    ];

    /// Key of the entity array in the persisted payload.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Compositions => "compositions",
            EntityKind::Units => "units",
            EntityKind::Traits => "traits",
            EntityKind::Items => "items",
        }
    }

    /// Key of the top-entities list inside the payload summary.
    pub fn top_key(&self) -> &'static str {
        match self {
            EntityKind::Compositions => "topCompositions",
            EntityKind::Units => "topUnits",
            EntityKind::Traits => "topTraits",
            EntityKind::Items => "topItems",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compositions" | "comps" => Ok(EntityKind::Compositions),
            "units" => Ok(EntityKind::Units),
            "traits" => Ok(EntityKind::Traits),
            "items" => Ok(EntityKind::Items),
            _ => Err(ModelError::UnknownEntityKind(s.to_string())),
        }
    }
}
