//! Integration tests for the cost and cooldown gate
//!
//! These tests verify that:
//! - The numeric cost is checked against the current attribute value
//! - An unaffordable cost is never applied
//! - Cooldown polling notifies on every positive answer
//! - Overlapping cooldowns each report their end
//! - Timing queries delegate to the tracked handles

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arena_abilities::abilities::{
    AbilityBehavior, AbilityInstance, AbilityState, HookContext, ManualBehavior,
};
use arena_abilities::attributes::{Attribute, AttributeScope, AttributeSet, AttributeTable};
use arena_abilities::component::AbilityComponent;
use arena_abilities::effects::{AttributeModifier, EffectDefinition, Magnitude, ModifierOp};
use arena_abilities::error::AbilityError;
use arena_abilities::labels::Label;
use bevy::prelude::Entity;

const DT: f32 = 0.1;

fn host_with(attribute: &str, value: f32) -> AbilityComponent {
    let table = AttributeTable::new().with(attribute, value);
    AbilityComponent::new(Entity::from_raw(3), AttributeSet::from_table(&table))
}

fn cost(attribute: &str, amount: f32) -> EffectDefinition {
    EffectDefinition::new("Test.Cost").with_modifier(AttributeModifier::new(
        attribute,
        ModifierOp::Subtract,
        Magnitude::Flat(amount),
    ))
}

fn tick(host: &mut AbilityComponent, ability: &mut AbilityInstance, steps: usize) {
    for _ in 0..steps {
        let callbacks = host.tick_effects(DT);
        for callback in callbacks {
            if callback.subscriber == ability.label() {
                ability.handle_effect_callback(host, &callback);
            }
        }
    }
}

fn mana(host: &AbilityComponent) -> f32 {
    host.attributes().owner.current_value(Attribute::new("Attribute.Mana"))
}

// =============================================================================
// Attribute cost
// =============================================================================

#[test]
fn test_unaffordable_cost_is_not_applied() {
    let mut host = host_with("Attribute.Mana", 5.0);
    let mut ability = AbilityInstance::manual("Ability.Costly")
        .with_ability_attribute_cost(cost("Attribute.Mana", 10.0));
    ability.init_ability(&mut host).unwrap();

    assert!(!ability.check_ability_attribute_cost(&host));
    assert!(!ability.apply_ability_attribute_cost(&mut host));

    assert!(ability.ability_attribute_cost_handle().is_none());
    assert_eq!(mana(&host), 5.0);
}

#[test]
fn test_cost_equal_to_current_value_is_affordable() {
    let mut host = host_with("Attribute.Mana", 10.0);
    let mut ability = AbilityInstance::manual("Ability.Exact")
        .with_ability_attribute_cost(cost("Attribute.Mana", 10.0));
    ability.init_ability(&mut host).unwrap();

    assert!(ability.check_ability_attribute_cost(&host));
    assert!(ability.apply_ability_attribute_cost(&mut host));
    assert_eq!(mana(&host), 0.0);
    assert!(!ability.check_ability_attribute_cost(&host));
}

#[test]
fn test_no_cost_configured_is_always_affordable() {
    let mut host = host_with("Attribute.Mana", 0.0);
    let mut ability = AbilityInstance::manual("Ability.Free");
    ability.init_ability(&mut host).unwrap();

    assert!(ability.check_ability_attribute_cost(&host));
    assert!(!ability.apply_ability_attribute_cost(&mut host));
}

#[test]
fn test_attribute_based_cost_resolves_against_attributes() {
    let table = AttributeTable::new()
        .with("Attribute.Mana", 50.0)
        .with("Attribute.MaxMana", 200.0);
    let mut host = AbilityComponent::new(Entity::from_raw(3), AttributeSet::from_table(&table));
    let mut ability = AbilityInstance::manual("Ability.Scaled").with_ability_attribute_cost(
        EffectDefinition::new("Scaled.Cost").with_modifier(AttributeModifier::new(
            "Attribute.Mana",
            ModifierOp::Subtract,
            Magnitude::AttributeBased {
                attribute: Attribute::new("Attribute.MaxMana"),
                coefficient: 0.2,
                pre_add: 0.0,
                post_add: 0.0,
            },
        )),
    );
    ability.init_ability(&mut host).unwrap();

    assert!(ability.apply_ability_attribute_cost(&mut host));
    assert_eq!(mana(&host), 10.0);
    assert!(!ability.check_ability_attribute_cost(&host));
}

#[test]
fn test_ability_local_attributes_pay_the_cost() {
    let mut host = host_with("Attribute.Mana", 100.0);
    let mut ability = AbilityInstance::manual("Ability.Charges")
        .with_attributes(AttributeTable::new().with("Attribute.Charges", 1.0))
        .with_ability_attribute_cost(cost("Attribute.Charges", 1.0));
    ability.init_ability(&mut host).unwrap();

    let scope = AttributeScope::Ability(Label::new("Ability.Charges"));
    assert_eq!(ability.attribute_scope(), scope);

    assert!(ability.apply_ability_attribute_cost(&mut host));
    assert_eq!(
        host.attributes().get(scope).current_value(Attribute::new("Attribute.Charges")),
        0.0
    );
    assert_eq!(mana(&host), 100.0);
    assert!(!ability.check_ability_attribute_cost(&host));
}

#[test]
fn test_init_rejects_cost_on_missing_attribute() {
    let mut host = host_with("Attribute.Mana", 100.0);
    let mut ability = AbilityInstance::manual("Ability.Rage")
        .with_ability_attribute_cost(cost("Attribute.Rage", 10.0));

    assert_eq!(
        ability.init_ability(&mut host),
        Err(AbilityError::MissingAttribute {
            ability: Label::new("Ability.Rage"),
            attribute: Attribute::new("Attribute.Rage"),
        })
    );
    assert!(!ability.is_initialized());
}

#[test]
fn test_init_runs_once() {
    let mut host = host_with("Attribute.Mana", 100.0);
    let mut ability = AbilityInstance::manual("Ability.Once");

    assert!(ability.init_ability(&mut host).is_ok());
    assert_eq!(
        ability.init_ability(&mut host),
        Err(AbilityError::AlreadyInitialized(Label::new("Ability.Once")))
    );
}

/// Refuses every commit
struct Broke;

impl AbilityBehavior for Broke {
    fn apply_attribute_cost(&mut self, _cx: &mut HookContext<'_>) -> bool {
        false
    }
}

#[test]
fn test_commit_respects_custom_cost_policy() {
    let mut host = host_with("Attribute.Mana", 100.0);
    let mut ability = AbilityInstance::new(Label::new("Ability.Policy"), Box::new(Broke))
        .with_activation_effect(EffectDefinition::new("Policy.Cast").with_duration(1.0))
        .with_ability_attribute_cost(cost("Attribute.Mana", 10.0));
    ability.init_ability(&mut host).unwrap();

    assert!(!ability.apply_attribute_cost(&mut host));
    ability.commit_activation(&mut host, false);

    assert_eq!(ability.state(), AbilityState::Waiting);
    assert_eq!(mana(&host), 100.0);
}

#[test]
fn test_commit_pays_then_activates() {
    let mut host = host_with("Attribute.Mana", 15.0);
    let mut ability = AbilityInstance::new(Label::new("Ability.Commit"), Box::new(ManualBehavior))
        .with_activation_effect(EffectDefinition::new("Commit.Cast").with_duration(1.0))
        .with_ability_attribute_cost(cost("Attribute.Mana", 10.0));
    ability.init_ability(&mut host).unwrap();

    ability.commit_activation(&mut host, false);
    assert_eq!(ability.state(), AbilityState::Activating);
    assert_eq!(mana(&host), 5.0);

    ability.finish_ability(&mut host);
    ability.commit_activation(&mut host, false);
    assert_eq!(ability.state(), AbilityState::Waiting, "5 mana can't pay 10");
    assert_eq!(mana(&host), 5.0);
}

// =============================================================================
// Cooldown
// =============================================================================

#[test]
fn test_on_cooldown_notifies_every_positive_poll() {
    let mut host = host_with("Attribute.Mana", 100.0);
    let mut ability = AbilityInstance::manual("Ability.Poll")
        .with_cooldown_effect(EffectDefinition::new("Poll.Cooldown").with_duration(1.0));
    ability.init_ability(&mut host).unwrap();

    let notified = Arc::new(AtomicUsize::new(0));
    let counter = notified.clone();
    ability.delegates.on_notify_on_cooldown.subscribe(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert!(!ability.is_on_cooldown(&host));
    assert!(ability.apply_cooldown_effect(&mut host));
    for _ in 0..3 {
        assert!(ability.is_on_cooldown(&host));
    }
    assert!(!ability.can_use_ability(&host));
    assert_eq!(notified.load(Ordering::SeqCst), 4);

    tick(&mut host, &mut ability, 11);
    assert!(!ability.is_on_cooldown(&host));
    assert_eq!(notified.load(Ordering::SeqCst), 4);
}

#[test]
fn test_no_cooldown_configured() {
    let mut host = host_with("Attribute.Mana", 100.0);
    let mut ability = AbilityInstance::manual("Ability.Spam");
    ability.init_ability(&mut host).unwrap();

    assert!(!ability.apply_cooldown_effect(&mut host));
    assert!(!ability.is_on_cooldown(&host));
    assert_eq!(ability.cooldown_remaining_time(&host), 0.0);
}

#[derive(Clone)]
struct CooldownCounter(Arc<AtomicUsize>, Arc<AtomicUsize>);

impl AbilityBehavior for CooldownCounter {
    fn on_cooldown_start(&mut self, _cx: &mut HookContext<'_>) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    fn on_cooldown_end(&mut self, _cx: &mut HookContext<'_>) {
        self.1.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_overlapping_cooldowns_track_latest_and_both_end() {
    let starts = Arc::new(AtomicUsize::new(0));
    let ends = Arc::new(AtomicUsize::new(0));
    let mut host = host_with("Attribute.Mana", 100.0);
    let mut ability = AbilityInstance::new(
        Label::new("Ability.Overlap"),
        Box::new(CooldownCounter(starts.clone(), ends.clone())),
    )
    .with_cooldown_effect(EffectDefinition::new("Overlap.Cooldown").with_duration(2.0));
    ability.init_ability(&mut host).unwrap();

    ability.apply_cooldown_effect(&mut host);
    let first = ability.cooldown_handle().unwrap();
    tick(&mut host, &mut ability, 10);
    ability.apply_cooldown_effect(&mut host);
    let second = ability.cooldown_handle().unwrap();

    assert_ne!(first, second);
    assert!(host.is_effect_active(first), "the first cooldown is not replaced");
    assert_eq!(starts.load(Ordering::SeqCst), 2);

    tick(&mut host, &mut ability, 11);
    assert_eq!(ends.load(Ordering::SeqCst), 1);
    assert!(ability.is_on_cooldown(&host), "the latest cooldown is the one queried");

    tick(&mut host, &mut ability, 10);
    assert_eq!(ends.load(Ordering::SeqCst), 2);
    assert!(!ability.is_on_cooldown(&host));
}

// =============================================================================
// Timing queries
// =============================================================================

#[test]
fn test_timing_queries_follow_handles() {
    let mut host = host_with("Attribute.Mana", 100.0);
    let mut ability = AbilityInstance::manual("Ability.Timed")
        .with_activation_effect(EffectDefinition::new("Timed.Cast").with_duration(10.0))
        .with_cooldown_effect(EffectDefinition::new("Timed.Cooldown").with_duration(4.0));
    ability.init_ability(&mut host).unwrap();

    // Nothing applied yet
    assert_eq!(ability.activation_remaining_time(&host), 0.0);
    assert_eq!(ability.activation_end_time(&host), 0.0);
    assert_eq!(ability.cooldown_current_time_normalized(&host), 0.0);

    ability.start_activation(&mut host, false);
    tick(&mut host, &mut ability, 25);

    let close = |a: f32, b: f32| (a - b).abs() < 1e-3;
    assert!(close(ability.activation_remaining_time(&host), 7.5));
    assert!(close(ability.activation_current_time(&host), 2.5));
    assert!(close(ability.activation_remaining_time_normalized(&host), 0.75));
    assert!(close(ability.activation_current_time_normalized(&host), 0.25));
    assert!(close(ability.activation_end_time(&host), 10.0));

    ability.apply_cooldown_effect(&mut host);
    tick(&mut host, &mut ability, 10);
    assert!(close(ability.cooldown_remaining_time(&host), 3.0));
    assert!(close(ability.cooldown_current_time(&host), 1.0));
    assert!(close(ability.cooldown_remaining_time_normalized(&host), 0.75));
    assert!(close(ability.cooldown_current_time_normalized(&host), 0.25));
    assert!(close(ability.cooldown_end_time(&host), 6.5));

    // Expired handles read as zero
    tick(&mut host, &mut ability, 40);
    assert_eq!(ability.cooldown_remaining_time(&host), 0.0);
    assert_eq!(ability.cooldown_end_time(&host), 0.0);
}

#[test]
fn test_animation_play_rate() {
    let timed = AbilityInstance::manual("Ability.Slow")
        .with_activation_effect(EffectDefinition::new("Slow.Cast").with_duration(2.0));
    assert_eq!(timed.animation_play_rate(1.0), 0.5);

    let instant = AbilityInstance::manual("Ability.Fast")
        .with_activation_effect(EffectDefinition::new("Fast.Cast"));
    assert_eq!(instant.animation_play_rate(1.2), 1.0);
    assert_eq!(AbilityInstance::manual("Ability.None").animation_play_rate(0.0), 1.0);
}
