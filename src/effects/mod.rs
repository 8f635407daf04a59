//! Effects
//!
//! Timed or instant modifications applied to an owner:
//! - Declarative definitions and magnitudes (`definition`)
//! - The context effects are applied with (`context`)
//! - The per-owner container that ticks instances and reports callbacks (`container`)

pub mod container;
pub mod context;
pub mod definition;

pub use container::{
    EffectBinding, EffectCallback, EffectContainer, EffectEvent, EffectHandle, EffectSubscription,
    EffectTarget,
};
pub use context::{EffectContext, HitData};
pub use definition::{AttributeModifier, EffectDefinition, EffectProperty, Magnitude, ModifierOp};
