//! Ability events
//!
//! Input going into the simulation and notifications coming out of it.

use bevy::prelude::*;

use crate::component::{AbilityNotificationKind, InputPhase};
use crate::labels::Label;

/// An input action pressed or released on behalf of an owner
#[derive(Event, Debug, Clone, Copy)]
pub struct AbilityInputEvent {
    /// Entity carrying the ability components
    pub owner: Entity,
    pub action: Label,
    pub phase: InputPhase,
}

impl AbilityInputEvent {
    pub fn pressed(owner: Entity, action: &str) -> Self {
        Self {
            owner,
            action: Label::new(action),
            phase: InputPhase::Pressed,
        }
    }

    pub fn released(owner: Entity, action: &str) -> Self {
        Self {
            owner,
            action: Label::new(action),
            phase: InputPhase::Released,
        }
    }
}

/// Fired for every notification an ability pushed during the frame
#[derive(Event, Debug, Clone, Copy)]
pub struct AbilityEvent {
    pub owner: Entity,
    pub ability: Label,
    pub kind: AbilityNotificationKind,
    /// Owner's effect clock when it happened
    pub time: f32,
}
