//! Catalog seeding configuration from config.toml
//!
//! The missions and rewards defined in config.toml are used to seed the
//! database on first run or when entries are missing. Seeding never
//! overwrites existing rows, so point values edited in the database are not
//! clobbered on restart.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Missions to seed
    #[serde(default)]
    pub missions: Vec<MissionSeed>,
    /// Catalog rewards to seed
    #[serde(default)]
    pub rewards: Vec<RewardSeed>,
}

/// Seed definition for a single mission
#[derive(Debug, Deserialize, Clone)]
pub struct MissionSeed {
    /// Stable mission key (e.g. `"first_upload"`)
    pub key: String,
    /// Human-readable title
    pub title: String,
    /// Longer description
    pub description: String,
    /// Points awarded on completion
    pub points: i64,
    /// Display ordering
    pub sort_order: i32,
}

/// Seed definition for a single catalog reward
#[derive(Debug, Deserialize, Clone)]
pub struct RewardSeed {
    /// Human-readable title (also the seed identity key)
    pub title: String,
    /// Longer description
    pub description: String,
    /// Points deducted on redemption
    pub points_cost: i64,
    /// `"stripe_credit"`, `"free_months"`, or `"feature_unlock"`
    pub reward_type: String,
    /// Type-specific parameters, stored as JSON in the database
    pub reward_value: toml::Value,
    /// Minimum tier level required
    pub min_tier: i32,
    /// Display ordering
    pub sort_order: i32,
}

impl RewardSeed {
    /// Converts the TOML reward parameters into the JSON value stored on the
    /// rewards table.
    pub fn reward_value_json(&self) -> Result<serde_json::Value> {
        serde_json::to_value(&self.reward_value).map_err(|e| Error::Config {
            message: format!("Invalid reward_value for '{}': {e}", self.title),
        })
    }
}

/// Loads catalog configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - Required fields are missing
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads catalog configuration from the default location (./config.toml)
pub fn load_default_config() -> Result<Config> {
    load_config("config.toml")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_catalog_config() {
        let toml_str = r#"
            [[missions]]
            key = "first_upload"
            title = "First receipt"
            description = "Upload your first receipt"
            points = 100
            sort_order = 1

            [[rewards]]
            title = "$5 account credit"
            description = "Credit applied to your next invoice"
            points_cost = 1000
            reward_type = "stripe_credit"
            reward_value = { amount_cents = 500 }
            min_tier = 1
            sort_order = 1
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.missions.len(), 1);
        assert_eq!(config.missions[0].key, "first_upload");
        assert_eq!(config.missions[0].points, 100);

        assert_eq!(config.rewards.len(), 1);
        assert_eq!(config.rewards[0].reward_type, "stripe_credit");
        let value = config.rewards[0].reward_value_json().unwrap();
        assert_eq!(value["amount_cents"], 500);
    }

    #[test]
    fn test_missing_sections_default_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.missions.is_empty());
        assert!(config.rewards.is_empty());
    }
}
