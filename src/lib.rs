//! Arena Abilities - ability activation framework
//!
//! An ability owner carries an [`AbilityComponent`] (effects, labels,
//! attributes) and an [`Abilities`] component (the ability instances). Each
//! ability runs a small activation state machine gated by cooldown and cost,
//! timed by effects, and driven by input, effect callbacks and a per-frame
//! tick.
//!
//! This library exposes the core modules for testing and reuse.

pub mod abilities;
pub mod attributes;
pub mod cli;
pub mod component;
pub mod effects;
pub mod error;
pub mod headless;
pub mod labels;
pub mod observers;
pub mod simulation;

// Re-export commonly used types
pub use abilities::{AbilityDefinitions, AbilityInstance, AbilityState};
pub use component::{advance, Abilities, AbilityComponent};
pub use error::{AbilityError, ConfigError};
pub use headless::HeadlessScenarioConfig;
pub use labels::{Label, LabelSet};
pub use simulation::log::{AbilityLog, AbilityLogEventType};
pub use simulation::AbilitiesPlugin;
