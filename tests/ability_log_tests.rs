//! Integration tests for the ability plugin and its log
//!
//! These tests verify that:
//! - Input events reach the owner's abilities through the plugin systems
//! - Ability notifications are forwarded and logged
//! - Log lines keep a stable, parseable format

use std::time::Duration;

use arena_abilities::abilities::{AbilityInstance, StandardBehavior};
use arena_abilities::attributes::{AttributeSet, AttributeTable};
use arena_abilities::component::{Abilities, AbilityComponent};
use arena_abilities::effects::{AttributeModifier, EffectDefinition, Magnitude, ModifierOp};
use arena_abilities::labels::Label;
use arena_abilities::simulation::events::AbilityInputEvent;
use arena_abilities::simulation::log::{AbilityLog, AbilityLogEventType};
use arena_abilities::simulation::{AbilitiesPlugin, SimulationSpeed};
use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;
use regex::Regex;

fn fireball() -> AbilityInstance {
    AbilityInstance::new(
        Label::new("Ability.Fireball"),
        Box::new(StandardBehavior::default()),
    )
    .with_input_action("Input.Primary")
    .with_activation_effect(EffectDefinition::new("Fireball.Cast").with_duration(0.5))
    .with_cooldown_effect(EffectDefinition::new("Fireball.Cooldown").with_duration(1.0))
    .with_ability_attribute_cost(EffectDefinition::new("Fireball.Cost").with_modifier(
        AttributeModifier::new("Attribute.Mana", ModifierOp::Subtract, Magnitude::Flat(25.0)),
    ))
}

fn create_app() -> (App, Entity) {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins)
        .insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_secs_f64(
            1.0 / 60.0,
        )))
        .add_plugins(AbilitiesPlugin);
    app.finish();
    app.cleanup();

    let owner = app.world_mut().spawn(Name::new("Mage")).id();
    let attributes = AttributeSet::from_table(&AttributeTable::new().with("Attribute.Mana", 100.0));
    let mut abilities = Abilities::new();
    abilities.add(fireball()).unwrap();
    app.world_mut()
        .entity_mut(owner)
        .insert((AbilityComponent::new(owner, attributes), abilities));

    (app, owner)
}

fn run_frames(app: &mut App, frames: usize) {
    for _ in 0..frames {
        app.update();
    }
}

#[test]
fn test_plugin_initializes_abilities() {
    let (mut app, owner) = create_app();
    app.update();

    let abilities = app.world().get::<Abilities>(owner).unwrap();
    assert!(abilities.iter().all(|a| a.is_initialized()));
}

#[test]
fn test_press_runs_full_cycle_and_logs_it() {
    let (mut app, owner) = create_app();
    app.update();

    app.world_mut()
        .send_event(AbilityInputEvent::pressed(owner, "Input.Primary"));
    run_frames(&mut app, 60);

    let log = app.world().resource::<AbilityLog>();
    assert_eq!(log.count_by_type(AbilityLogEventType::Input), 1);
    assert_eq!(log.count_by_type(AbilityLogEventType::Cost), 1);
    // started + finished activating
    assert_eq!(log.count_by_type(AbilityLogEventType::Activation), 2);
    assert_eq!(log.count_by_type(AbilityLogEventType::Finished), 1);
    assert_eq!(log.count_by_type(AbilityLogEventType::Cooldown), 1);

    run_frames(&mut app, 60);
    let log = app.world().resource::<AbilityLog>();
    assert_eq!(
        log.count_by_type(AbilityLogEventType::Cooldown),
        2,
        "cooldown start and end"
    );

    let host = app.world().get::<AbilityComponent>(owner).unwrap();
    assert!(host.executing_ability().is_none());
}

#[test]
fn test_log_line_format() {
    let (mut app, owner) = create_app();
    app.update();
    app.world_mut()
        .send_event(AbilityInputEvent::pressed(owner, "Input.Primary"));
    run_frames(&mut app, 60);

    let line = Regex::new(r"^\[\s*\d+\.\d{2}\] Mage('s Ability\.Fireball [a-z ]+| Pressed Input\.Primary)$")
        .unwrap();
    let log = app.world().resource::<AbilityLog>();
    assert!(!log.entries.is_empty());
    for entry in log.lines() {
        assert!(line.is_match(&entry), "unexpected log line: {entry}");
    }
}

#[test]
fn test_paused_simulation_does_not_advance() {
    let (mut app, owner) = create_app();
    app.update();
    app.world_mut().resource_mut::<SimulationSpeed>().pause();

    app.world_mut()
        .send_event(AbilityInputEvent::pressed(owner, "Input.Primary"));
    run_frames(&mut app, 30);

    let host = app.world().get::<AbilityComponent>(owner).unwrap();
    assert_eq!(host.world_time(), 0.0);
    assert!(host.has_pending_input(), "input waits for the simulation to resume");

    app.world_mut().resource_mut::<SimulationSpeed>().normal_speed();
    app.update();
    let host = app.world().get::<AbilityComponent>(owner).unwrap();
    assert!(!host.has_pending_input());
    assert_eq!(host.executing_ability(), Some(Label::new("Ability.Fireball")));
}

#[test]
fn test_input_for_unknown_owner_is_ignored() {
    let (mut app, _owner) = create_app();
    app.update();
    let stranger = app.world_mut().spawn_empty().id();

    app.world_mut()
        .send_event(AbilityInputEvent::pressed(stranger, "Input.Primary"));
    run_frames(&mut app, 5);

    let log = app.world().resource::<AbilityLog>();
    assert_eq!(log.count_by_type(AbilityLogEventType::Cost), 0);
}
