//! Effect application context

use bevy::prelude::*;

use crate::labels::Label;

/// Where an ability connected with the world, if it did.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HitData {
    pub location: Vec3,
    pub normal: Vec3,
    pub entity: Option<Entity>,
}

/// Who is applying an effect, on whose behalf, and at what.
///
/// Built once when an ability initializes and reused for every effect it
/// applies unless an operation supplies its own.
#[derive(Clone, Debug, PartialEq)]
pub struct EffectContext {
    /// Ability the effect originates from
    pub ability: Option<Label>,
    /// Entity that owns the ability
    pub caster: Entity,
    /// Entity physically performing the ability (often the caster)
    pub avatar: Entity,
    /// Entity holding the ability component that applied the effect
    pub instigator: Entity,
    /// Default target
    pub target: Entity,
    pub hit: Option<HitData>,
}

impl EffectContext {
    pub fn new(ability: Option<Label>, caster: Entity, avatar: Entity, instigator: Entity) -> Self {
        Self {
            ability,
            caster,
            avatar,
            instigator,
            target: caster,
            hit: None,
        }
    }

    pub fn with_target(mut self, target: Entity) -> Self {
        self.target = target;
        self
    }

    pub fn with_hit(mut self, hit: HitData) -> Self {
        self.hit = Some(hit);
        self
    }
}
