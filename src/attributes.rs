//! Attribute storage
//!
//! Named numeric values on an owner (health, mana, charges...). Each value has a
//! permanent `base` and a temporary `bonus` layer; the current value is the sum.
//! Instant and periodic effects write to the base, duration effects to the bonus
//! (and take it back when they end).

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::labels::Label;

/// A named attribute.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attribute(pub Label);

impl Attribute {
    pub fn new(name: &str) -> Self {
        Attribute(Label::new(name))
    }

    pub fn name(&self) -> &'static str {
        self.0.name()
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single attribute value split into its two layers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeValue {
    pub base: f32,
    #[serde(default)]
    pub bonus: f32,
}

impl AttributeValue {
    pub fn current(&self) -> f32 {
        self.base + self.bonus
    }
}

/// Default attribute values, loaded from config.
///
/// ```ron
/// { "Mana": 100.0, "Charges": 3.0 }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeTable(pub HashMap<Attribute, f32>);

impl AttributeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, attribute: &str, value: f32) -> Self {
        self.0.insert(Attribute::new(attribute), value);
        self
    }
}

/// Attribute values for one owner.
#[derive(Clone, Debug, Default)]
pub struct AttributeSet {
    owner: Option<Entity>,
    values: HashMap<Attribute, AttributeValue>,
}

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set straight from a table (already initialized from it).
    pub fn from_table(table: &AttributeTable) -> Self {
        let mut set = Self::new();
        set.initialize_from_table(table);
        set
    }

    /// Bind the set to the entity that owns it.
    pub fn initialize(&mut self, owner: Entity) {
        self.owner = Some(owner);
    }

    /// Reset every attribute listed in `table` to its default, dropping any bonus.
    pub fn initialize_from_table(&mut self, table: &AttributeTable) {
        for (attribute, value) in table.0.iter() {
            self.values.insert(
                *attribute,
                AttributeValue {
                    base: *value,
                    bonus: 0.0,
                },
            );
        }
    }

    pub fn owner(&self) -> Option<Entity> {
        self.owner
    }

    pub fn has_attribute(&self, attribute: Attribute) -> bool {
        self.values.contains_key(&attribute)
    }

    /// Current value (base + bonus). Unknown attributes read as 0.
    pub fn current_value(&self, attribute: Attribute) -> f32 {
        self.values
            .get(&attribute)
            .map(AttributeValue::current)
            .unwrap_or(0.0)
    }

    pub fn base_value(&self, attribute: Attribute) -> f32 {
        self.values.get(&attribute).map(|v| v.base).unwrap_or(0.0)
    }

    pub fn value(&self, attribute: Attribute) -> Option<AttributeValue> {
        self.values.get(&attribute).copied()
    }

    pub fn set_base(&mut self, attribute: Attribute, base: f32) {
        self.values.entry(attribute).or_default().base = base;
    }

    pub fn add_base(&mut self, attribute: Attribute, delta: f32) {
        self.values.entry(attribute).or_default().base += delta;
    }

    pub fn add_bonus(&mut self, attribute: Attribute, delta: f32) {
        self.values.entry(attribute).or_default().bonus += delta;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Attribute, AttributeValue)> + '_ {
        self.values.iter().map(|(k, v)| (*k, *v))
    }
}

/// Which attribute set an effect or cost check targets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AttributeScope {
    /// The owning entity's own attributes
    #[default]
    Owner,
    /// Attributes an ability registered with the component at init
    Ability(Label),
}

/// The owner's attribute set plus any ability-local sets.
#[derive(Clone, Debug, Default)]
pub struct AttributeSets {
    pub owner: AttributeSet,
    additional: HashMap<Label, AttributeSet>,
}

impl AttributeSets {
    pub fn new(owner: AttributeSet) -> Self {
        Self {
            owner,
            additional: HashMap::new(),
        }
    }

    /// Register an ability-local set. Replaces any set already registered under `label`.
    pub fn add_additional(&mut self, label: Label, set: AttributeSet) {
        self.additional.insert(label, set);
    }

    pub fn has_additional(&self, label: Label) -> bool {
        self.additional.contains_key(&label)
    }

    /// Resolve a scope; an unregistered ability scope falls back to the owner set.
    pub fn get(&self, scope: AttributeScope) -> &AttributeSet {
        match scope {
            AttributeScope::Owner => &self.owner,
            AttributeScope::Ability(label) => self.additional.get(&label).unwrap_or(&self.owner),
        }
    }

    pub fn get_mut(&mut self, scope: AttributeScope) -> &mut AttributeSet {
        match scope {
            AttributeScope::Owner => &mut self.owner,
            AttributeScope::Ability(label) => match self.additional.get_mut(&label) {
                Some(set) => set,
                None => &mut self.owner,
            },
        }
    }
}
