//! Data-Driven Ability Configuration
//!
//! Ability definitions are loaded from `assets/config/abilities.ron` instead
//! of being assembled in code. Each entry names the ability's behavior, its
//! activation/cooldown/cost effects, the labels it grants while activating and
//! the input actions it listens to.
//!
//! ## Usage
//! ```ignore
//! fn spawn_caster(mut commands: Commands, definitions: Res<AbilityDefinitions>) {
//!     let fireball = definitions.instantiate(Label::new("Ability.Fireball")).unwrap();
//!     // ...
//! }
//! ```

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::behavior::BehaviorKind;
use super::instance::AbilityInstance;
use crate::attributes::{AttributeSet, AttributeTable};
use crate::effects::EffectDefinition;
use crate::error::ConfigError;
use crate::labels::Label;

pub const DEFAULT_ABILITIES_PATH: &str = "assets/config/abilities.ron";

/// One ability as written in config.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AbilityConfig {
    /// Display name, used in logs
    pub name: String,

    #[serde(default)]
    pub behavior: BehaviorKind,

    // === Effects ===
    #[serde(default)]
    pub activation_effect: Option<EffectDefinition>,
    #[serde(default)]
    pub cooldown_effect: Option<EffectDefinition>,
    /// Custom cost policy marker; the numeric cost is `ability_attribute_cost`
    #[serde(default)]
    pub attribute_cost: Option<EffectDefinition>,
    #[serde(default)]
    pub ability_attribute_cost: Option<EffectDefinition>,

    // === Labels & input ===
    #[serde(default)]
    pub activation_labels: Vec<Label>,
    #[serde(default)]
    pub input_actions: Vec<Label>,

    /// Ability-local attributes. Costs are checked against these when present.
    #[serde(default)]
    pub attributes: Option<AttributeTable>,
}

impl AbilityConfig {
    pub fn activation_time(&self) -> f32 {
        self.activation_effect
            .as_ref()
            .map(|effect| effect.duration)
            .unwrap_or(0.0)
    }

    pub fn cooldown(&self) -> f32 {
        self.cooldown_effect
            .as_ref()
            .map(|effect| effect.duration)
            .unwrap_or(0.0)
    }

    fn problems(&self, label: Label) -> Vec<String> {
        let mut problems = Vec::new();
        let effects = [
            ("activation_effect", &self.activation_effect),
            ("cooldown_effect", &self.cooldown_effect),
            ("attribute_cost", &self.attribute_cost),
            ("ability_attribute_cost", &self.ability_attribute_cost),
        ];
        for (slot, effect) in effects {
            if let Some(effect) = effect {
                if effect.duration < 0.0 || effect.period < 0.0 {
                    problems.push(format!("{label}: {slot} has a negative duration or period"));
                }
            }
        }
        if let Some(cost) = &self.ability_attribute_cost {
            if cost.modifiers.is_empty() {
                problems.push(format!("{label}: ability_attribute_cost has no modifiers"));
            }
        }
        if matches!(self.behavior, BehaviorKind::ChargeRelease)
            && self.activation_effect.as_ref().map_or(true, |e| !e.is_timed())
        {
            problems.push(format!("{label}: ChargeRelease needs a timed activation_effect"));
        }
        problems
    }
}

/// Root of the config file.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AbilitiesConfig {
    /// Starting attributes for owners spawned from config
    #[serde(default)]
    pub owner_attributes: AttributeTable,
    pub abilities: HashMap<Label, AbilityConfig>,
}

/// Resource containing every loaded ability definition.
#[derive(Resource, Debug, Default)]
pub struct AbilityDefinitions {
    definitions: HashMap<Label, AbilityConfig>,
    owner_attributes: AttributeTable,
}

impl AbilityDefinitions {
    pub fn new(config: AbilitiesConfig) -> Self {
        Self {
            definitions: config.abilities,
            owner_attributes: config.owner_attributes,
        }
    }

    pub fn get(&self, ability: Label) -> Option<&AbilityConfig> {
        self.definitions.get(&ability)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Ability labels sorted by name, for stable iteration.
    pub fn ability_tags(&self) -> Vec<Label> {
        let mut tags: Vec<Label> = self.definitions.keys().copied().collect();
        tags.sort_by_key(|tag| tag.name());
        tags
    }

    pub fn owner_attributes(&self) -> AttributeSet {
        AttributeSet::from_table(&self.owner_attributes)
    }

    /// Check every definition, collecting all problems.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut problems: Vec<String> = self
            .ability_tags()
            .into_iter()
            .flat_map(|tag| self.definitions[&tag].problems(tag))
            .collect();
        problems.sort();

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }

    /// Build a fresh, uninitialized instance of `ability`.
    pub fn instantiate(&self, ability: Label) -> Option<AbilityInstance> {
        let config = self.get(ability)?;

        let mut instance = AbilityInstance::new(ability, config.behavior.build()).with_name(&config.name);
        if let Some(effect) = &config.activation_effect {
            instance = instance.with_activation_effect(effect.clone());
        }
        if let Some(effect) = &config.cooldown_effect {
            instance = instance.with_cooldown_effect(effect.clone());
        }
        if let Some(effect) = &config.attribute_cost {
            instance = instance.with_attribute_cost(effect.clone());
        }
        if let Some(effect) = &config.ability_attribute_cost {
            instance = instance.with_ability_attribute_cost(effect.clone());
        }
        let labels: Vec<&str> = config.activation_labels.iter().map(|l| l.name()).collect();
        instance = instance.with_activation_labels(&labels);
        for action in &config.input_actions {
            instance = instance.with_input_action(action.name());
        }
        if let Some(table) = &config.attributes {
            instance = instance.with_attributes(table.clone());
        }
        Some(instance)
    }
}

pub fn parse_ability_definitions(contents: &str, path: &Path) -> Result<AbilityDefinitions, ConfigError> {
    let config: AbilitiesConfig = ron::from_str(contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let definitions = AbilityDefinitions::new(config);
    definitions.validate().map_err(ConfigError::Invalid)?;
    Ok(definitions)
}

pub fn load_ability_definitions_from(path: impl AsRef<Path>) -> Result<AbilityDefinitions, ConfigError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: PathBuf::from(path),
        source,
    })?;

    let definitions = parse_ability_definitions(&contents, path)?;
    info!(
        "Loaded {} ability definitions from {}",
        definitions.len(),
        path.display()
    );
    Ok(definitions)
}

pub fn load_ability_definitions() -> Result<AbilityDefinitions, ConfigError> {
    load_ability_definitions_from(DEFAULT_ABILITIES_PATH)
}

/// Loads definitions at startup. A missing or broken file leaves an empty
/// set and logs why.
pub struct AbilityConfigPlugin {
    pub path: PathBuf,
}

impl Default for AbilityConfigPlugin {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_ABILITIES_PATH),
        }
    }
}

impl Plugin for AbilityConfigPlugin {
    fn build(&self, app: &mut App) {
        match load_ability_definitions_from(&self.path) {
            Ok(definitions) => {
                app.insert_resource(definitions);
            }
            Err(e) => {
                error!("Failed to load ability definitions: {}", e);
                app.init_resource::<AbilityDefinitions>();
            }
        }
    }
}
