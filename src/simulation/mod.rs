//! Ability simulation
//!
//! Wires ability owners into the Bevy schedule:
//! - Input events queued on their owners
//! - Per-frame effect and ability updates
//! - Notifications forwarded as events
//! - Ability logging

use bevy::prelude::*;

pub mod events;
pub mod log;
pub mod systems;

use events::*;
use systems::*;

/// Plugin for the ability simulation
pub struct AbilitiesPlugin;

impl Plugin for AbilitiesPlugin {
    fn build(&self, app: &mut App) {
        app
            // Ability events
            .add_event::<AbilityInputEvent>()
            .add_event::<AbilityEvent>()
            // Resources
            .init_resource::<log::AbilityLog>()
            .init_resource::<SimulationSpeed>()
            // Systems
            .add_systems(Update, (
                initialize_abilities,
                queue_ability_input,
                advance_abilities,
                forward_ability_notifications,
                record_ability_log,
            ).chain());
    }
}

/// Controls the speed of the simulation
#[derive(Resource)]
pub struct SimulationSpeed {
    /// Speed multiplier (0.0 = paused, 1.0 = normal, 2.0 = double)
    pub multiplier: f32,
}

impl Default for SimulationSpeed {
    fn default() -> Self {
        Self { multiplier: 1.0 }
    }
}

impl SimulationSpeed {
    pub fn pause(&mut self) {
        self.multiplier = 0.0;
    }

    pub fn normal_speed(&mut self) {
        self.multiplier = 1.0;
    }

    pub fn set(&mut self, multiplier: f32) {
        self.multiplier = multiplier.max(0.0);
    }

    pub fn is_paused(&self) -> bool {
        self.multiplier == 0.0
    }
}
