//! Declarative effect definitions
//!
//! Effect definitions are plain data loaded from `abilities.ron`. An ability
//! holds four of them (activation, cooldown, attribute cost policy, numeric
//! attribute cost), each wrapped in an [`EffectProperty`] that also tracks the
//! handle of the instance most recently applied from it.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::container::EffectHandle;
use crate::attributes::{Attribute, AttributeSet};
use crate::labels::Label;

/// How large a modifier is.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Magnitude {
    /// Fixed value
    Flat(f32),
    /// `(attribute + pre_add) * coefficient + post_add`
    AttributeBased {
        attribute: Attribute,
        coefficient: f32,
        #[serde(default)]
        pre_add: f32,
        #[serde(default)]
        post_add: f32,
    },
}

impl Magnitude {
    pub fn resolve(&self, attributes: &AttributeSet) -> f32 {
        match self {
            Magnitude::Flat(value) => *value,
            Magnitude::AttributeBased {
                attribute,
                coefficient,
                pre_add,
                post_add,
            } => (attributes.current_value(*attribute) + pre_add) * coefficient + post_add,
        }
    }
}

/// How a modifier combines with the attribute's current value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModifierOp {
    Add,
    Subtract,
    Multiply,
    Override,
}

impl ModifierOp {
    /// The change to apply to an attribute currently at `current`.
    pub fn delta(&self, current: f32, magnitude: f32) -> f32 {
        match self {
            ModifierOp::Add => magnitude,
            ModifierOp::Subtract => -magnitude,
            ModifierOp::Multiply => current * (magnitude - 1.0),
            ModifierOp::Override => magnitude - current,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttributeModifier {
    pub attribute: Attribute,
    pub op: ModifierOp,
    pub magnitude: Magnitude,
}

impl AttributeModifier {
    pub fn new(attribute: &str, op: ModifierOp, magnitude: Magnitude) -> Self {
        Self {
            attribute: Attribute::new(attribute),
            op,
            magnitude,
        }
    }
}

/// Effect configuration.
///
/// - `duration > 0`: lasts `duration` seconds
/// - `duration == 0`, `period > 0`: lasts until removed
/// - both zero: instant, never tracked as active
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EffectDefinition {
    pub name: String,
    /// Seconds (0.0 = no duration)
    #[serde(default)]
    pub duration: f32,
    /// Seconds between period ticks (0.0 = not periodic)
    #[serde(default)]
    pub period: f32,
    #[serde(default)]
    pub modifiers: Vec<AttributeModifier>,
    /// Labels added to the owner while the effect is active
    #[serde(default)]
    pub granted_labels: Vec<Label>,
}

impl EffectDefinition {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            duration: 0.0,
            period: 0.0,
            modifiers: Vec::new(),
            granted_labels: Vec::new(),
        }
    }

    pub fn with_duration(mut self, duration: f32) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_period(mut self, period: f32) -> Self {
        self.period = period;
        self
    }

    pub fn with_modifier(mut self, modifier: AttributeModifier) -> Self {
        self.modifiers.push(modifier);
        self
    }

    pub fn with_granted_label(mut self, label: &str) -> Self {
        self.granted_labels.push(Label::new(label));
        self
    }

    /// Whether applying this creates a tracked instance with a lifetime.
    pub fn is_timed(&self) -> bool {
        self.duration > 0.0 || self.period > 0.0
    }

    pub fn is_periodic(&self) -> bool {
        self.period > 0.0
    }

    /// Periodic with no duration: runs until removed.
    pub fn is_infinite(&self) -> bool {
        self.duration <= 0.0 && self.period > 0.0
    }
}

/// An effect slot on an ability: the shared spec plus the handle of the last
/// instance applied from it.
#[derive(Clone, Debug, Default)]
pub struct EffectProperty {
    spec: Option<Arc<EffectDefinition>>,
    handle: Option<EffectHandle>,
}

impl EffectProperty {
    pub fn new(definition: Option<EffectDefinition>) -> Self {
        Self {
            spec: definition.map(Arc::new),
            handle: None,
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn spec(&self) -> Option<&Arc<EffectDefinition>> {
        self.spec.as_ref()
    }

    pub fn is_configured(&self) -> bool {
        self.spec.is_some()
    }

    pub fn handle(&self) -> Option<EffectHandle> {
        self.handle
    }

    pub fn set_handle(&mut self, handle: EffectHandle) {
        self.handle = Some(handle);
    }

    pub fn reset_handle(&mut self) {
        self.handle = None;
    }
}
