//! JSON configuration parsing for headless mode
//!
//! A scenario lists the owners to spawn, the abilities each carries and a
//! timeline of input actions to feed them.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::abilities::AbilityDefinitions;
use crate::component::InputPhase;
use crate::labels::Label;

/// An entity carrying abilities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioOwner {
    /// Unique name, used by the input timeline and the report
    pub name: String,
    /// Ability labels, as defined in the ability config
    pub abilities: Vec<String>,
    /// Starting attributes (default: the config's owner attributes)
    #[serde(default)]
    pub attributes: Option<HashMap<String, f32>>,
}

/// One scripted input action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptedInput {
    /// Seconds since the scenario started
    pub time: f32,
    /// Name of the owner receiving the input
    pub owner: String,
    pub action: String,
    #[serde(default = "default_phase")]
    pub phase: InputPhase,
}

fn default_phase() -> InputPhase {
    InputPhase::Pressed
}

/// Headless scenario configuration loaded from JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadlessScenarioConfig {
    pub owners: Vec<ScenarioOwner>,
    #[serde(default)]
    pub inputs: Vec<ScriptedInput>,
    /// Scenario duration in seconds (default: 10)
    #[serde(default = "default_max_duration")]
    pub max_duration_secs: f32,
    /// Seed for the random input generator
    #[serde(default)]
    pub random_seed: Option<u64>,
    /// Average random presses per owner per second (0 = scripted input only)
    #[serde(default)]
    pub random_presses_per_second: f32,
    /// Custom output path for the JSON report (optional)
    #[serde(default)]
    pub output_path: Option<String>,
}

fn default_max_duration() -> f32 {
    10.0
}

impl HeadlessScenarioConfig {
    /// Load configuration from a JSON file
    pub fn load_from_file(path: &Path) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read scenario file: {}", e))?;
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, String> {
        let config: HeadlessScenarioConfig = serde_json::from_str(contents)
            .map_err(|e| format!("Failed to parse JSON: {}", e))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration on its own
    pub fn validate(&self) -> Result<(), String> {
        if self.owners.is_empty() {
            return Err("scenario must have at least one owner".to_string());
        }

        let mut names = HashSet::new();
        for owner in &self.owners {
            if !names.insert(owner.name.as_str()) {
                return Err(format!("duplicate owner name: '{}'", owner.name));
            }
        }

        for input in &self.inputs {
            if !names.contains(input.owner.as_str()) {
                return Err(format!(
                    "input at {:.2}s targets unknown owner '{}'",
                    input.time, input.owner
                ));
            }
            if input.time < 0.0 {
                return Err(format!("input time {} is negative", input.time));
            }
        }

        if self.max_duration_secs <= 0.0 {
            return Err("max_duration_secs must be positive".to_string());
        }
        if self.random_presses_per_second < 0.0 {
            return Err("random_presses_per_second must not be negative".to_string());
        }

        Ok(())
    }

    /// Check every ability the scenario names is defined
    pub fn validate_abilities(&self, definitions: &AbilityDefinitions) -> Result<(), String> {
        for owner in &self.owners {
            for ability in &owner.abilities {
                if definitions.get(Label::new(ability)).is_none() {
                    return Err(format!(
                        "owner '{}' uses undefined ability '{}'",
                        owner.name, ability
                    ));
                }
            }
        }
        Ok(())
    }

    /// Inputs ordered by time, ties kept in file order
    pub fn sorted_inputs(&self) -> Vec<ScriptedInput> {
        let mut inputs = self.inputs.clone();
        inputs.sort_by(|a, b| a.time.total_cmp(&b.time));
        inputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_scenario_uses_defaults() {
        let config = HeadlessScenarioConfig::from_json(
            r#"{ "owners": [ { "name": "Mage", "abilities": ["Ability.Fireball"] } ] }"#,
        )
        .unwrap();

        assert_eq!(config.max_duration_secs, 10.0);
        assert!(config.inputs.is_empty());
        assert!(config.random_seed.is_none());
    }

    #[test]
    fn test_input_phase_defaults_to_pressed() {
        let config = HeadlessScenarioConfig::from_json(
            r#"{
                "owners": [ { "name": "Mage", "abilities": [] } ],
                "inputs": [
                    { "time": 0.5, "owner": "Mage", "action": "Input.Primary" },
                    { "time": 0.2, "owner": "Mage", "action": "Input.Primary", "phase": "Released" }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.inputs[0].phase, InputPhase::Pressed);
        let sorted = config.sorted_inputs();
        assert_eq!(sorted[0].phase, InputPhase::Released);
    }

    #[test]
    fn test_unknown_owner_rejected() {
        let err = HeadlessScenarioConfig::from_json(
            r#"{
                "owners": [ { "name": "Mage", "abilities": [] } ],
                "inputs": [ { "time": 0.0, "owner": "Rogue", "action": "Input.Primary" } ]
            }"#,
        )
        .unwrap_err();
        assert!(err.contains("unknown owner 'Rogue'"));
    }

    #[test]
    fn test_duplicate_owner_rejected() {
        let err = HeadlessScenarioConfig::from_json(
            r#"{ "owners": [ { "name": "A", "abilities": [] }, { "name": "A", "abilities": [] } ] }"#,
        )
        .unwrap_err();
        assert!(err.contains("duplicate owner"));
    }
}
