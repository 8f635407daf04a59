//! Ability systems
//!
//! ECS systems that drive every ability owner once per frame.

use bevy::prelude::*;

use super::events::{AbilityEvent, AbilityInputEvent};
use super::log::{AbilityLog, AbilityLogEventType};
use super::SimulationSpeed;
use crate::component::{advance, Abilities, AbilityComponent, AbilityNotificationKind, InputPhase};

/// Initialize abilities added since the last frame
pub fn initialize_abilities(mut owners: Query<(&mut AbilityComponent, &mut Abilities)>) {
    for (mut host, mut abilities) in owners.iter_mut() {
        if !abilities.has_uninitialized() {
            continue;
        }
        for error in abilities.init_all(&mut host) {
            warn!("Ability failed to initialize on {:?}: {}", host.owner(), error);
        }
    }
}

/// Queue external input on the owner it targets
pub fn queue_ability_input(
    mut input_events: EventReader<AbilityInputEvent>,
    mut hosts: Query<&mut AbilityComponent>,
) {
    for event in input_events.read() {
        let Ok(mut host) = hosts.get_mut(event.owner) else {
            warn!("Input {} sent to {:?}, which has no abilities", event.action, event.owner);
            continue;
        };
        match event.phase {
            InputPhase::Pressed => host.queue_input_pressed(event.action),
            InputPhase::Released => host.queue_input_released(event.action),
        }
    }
}

/// Advance effects, dispatch their callbacks and tick abilities
pub fn advance_abilities(
    time: Res<Time>,
    speed: Res<SimulationSpeed>,
    mut owners: Query<(&mut AbilityComponent, &mut Abilities)>,
) {
    if speed.is_paused() {
        return;
    }
    let delta = time.delta_secs() * speed.multiplier;
    for (mut host, mut abilities) in owners.iter_mut() {
        advance(&mut host, &mut abilities, delta);
    }
}

/// Turn notifications pushed during the frame into events
pub fn forward_ability_notifications(
    mut hosts: Query<&mut AbilityComponent>,
    mut ability_events: EventWriter<AbilityEvent>,
) {
    for mut host in hosts.iter_mut() {
        if host.notifications().is_empty() {
            continue;
        }
        let owner = host.owner();
        for notification in host.drain_notifications() {
            ability_events.send(AbilityEvent {
                owner,
                ability: notification.ability,
                kind: notification.kind,
                time: notification.time,
            });
        }
    }
}

/// Record events to the ability log
pub fn record_ability_log(
    mut ability_log: ResMut<AbilityLog>,
    time: Res<Time>,
    speed: Res<SimulationSpeed>,
    mut input_events: EventReader<AbilityInputEvent>,
    mut ability_events: EventReader<AbilityEvent>,
    names: Query<&Name>,
) {
    ability_log.match_time += time.delta_secs() * speed.multiplier;

    for event in input_events.read() {
        let owner_name = names
            .get(event.owner)
            .map(|n| n.as_str())
            .unwrap_or("Unknown");
        let message = format!("{} {:?} {}", owner_name, event.phase, event.action);
        ability_log.log(AbilityLogEventType::Input, message);
    }

    for event in ability_events.read() {
        let owner_name = names
            .get(event.owner)
            .map(|n| n.as_str())
            .unwrap_or("Unknown");
        let what = match event.kind {
            AbilityNotificationKind::ActivationStarted => "started activating",
            AbilityNotificationKind::ActivationPeriod => "ticked",
            AbilityNotificationKind::ActivationFinished => "finished activating",
            AbilityNotificationKind::ActivationCancelled => "was cancelled",
            AbilityNotificationKind::AbilityFinished => "finished",
            AbilityNotificationKind::AttributeCostApplied => "paid its cost",
            AbilityNotificationKind::CooldownStarted => "went on cooldown",
            AbilityNotificationKind::CooldownEnded => "came off cooldown",
        };
        let message = format!("{}'s {} {}", owner_name, event.ability, what);
        ability_log.log(event.kind.into(), message);
    }
}
