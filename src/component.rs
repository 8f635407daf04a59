//! Ability component
//!
//! Two components sit on every entity that owns abilities:
//! - [`AbilityComponent`]: the shared state the abilities act on (effect
//!   container, labels, attributes, executing slot, notification outbox)
//! - [`Abilities`]: the ability instances themselves
//!
//! Keeping them apart lets a system borrow an instance and its host mutably
//! at the same time.

use bevy::prelude::*;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::abilities::{AbilityInstance, AbilityState, TaskScheduler};
use crate::attributes::{AttributeScope, AttributeSet, AttributeSets};
use crate::effects::{
    EffectCallback, EffectContainer, EffectContext, EffectDefinition, EffectHandle, EffectTarget,
};
use crate::error::AbilityError;
use crate::labels::{Label, LabelSet};

/// The ability currently driving the owner, if any.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExecutingSlot(Option<Label>);

impl ExecutingSlot {
    pub fn get(&self) -> Option<Label> {
        self.0
    }

    pub fn set(&mut self, ability: Label) {
        self.0 = Some(ability);
    }

    pub fn clear(&mut self) {
        self.0 = None;
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum InputPhase {
    Pressed,
    Released,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputEvent {
    pub action: Label,
    pub phase: InputPhase,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub enum AbilityNotificationKind {
    ActivationStarted,
    ActivationPeriod,
    ActivationFinished,
    ActivationCancelled,
    AbilityFinished,
    AttributeCostApplied,
    CooldownStarted,
    CooldownEnded,
}

/// Something an ability did, stamped with the owner's effect clock.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AbilityNotification {
    pub ability: Label,
    pub kind: AbilityNotificationKind,
    pub time: f32,
}

#[derive(Component, Debug)]
pub struct AbilityComponent {
    owner: Entity,
    avatar: Entity,
    camera: Option<Entity>,
    player_controller: Option<Entity>,
    ai_controller: Option<Entity>,
    effects: EffectContainer,
    labels: LabelSet,
    attributes: AttributeSets,
    executing: ExecutingSlot,
    tasks: TaskScheduler,
    pending_input: VecDeque<InputEvent>,
    notifications: Vec<AbilityNotification>,
}

impl AbilityComponent {
    /// Component for an owner that is also its own avatar.
    pub fn new(owner: Entity, attributes: AttributeSet) -> Self {
        let mut attributes = attributes;
        attributes.initialize(owner);
        Self {
            owner,
            avatar: owner,
            camera: None,
            player_controller: None,
            ai_controller: None,
            effects: EffectContainer::new(),
            labels: LabelSet::default(),
            attributes: AttributeSets::new(attributes),
            executing: ExecutingSlot::default(),
            tasks: TaskScheduler::new(),
            pending_input: VecDeque::new(),
            notifications: Vec::new(),
        }
    }

    pub fn with_avatar(mut self, avatar: Entity) -> Self {
        self.avatar = avatar;
        self
    }

    pub fn with_camera(mut self, camera: Entity) -> Self {
        self.camera = Some(camera);
        self
    }

    pub fn with_player_controller(mut self, controller: Entity) -> Self {
        self.player_controller = Some(controller);
        self
    }

    pub fn with_ai_controller(mut self, controller: Entity) -> Self {
        self.ai_controller = Some(controller);
        self
    }

    pub fn owner(&self) -> Entity {
        self.owner
    }

    pub fn avatar(&self) -> Entity {
        self.avatar
    }

    pub fn camera(&self) -> Option<Entity> {
        self.camera
    }

    pub fn player_controller(&self) -> Option<Entity> {
        self.player_controller
    }

    pub fn ai_controller(&self) -> Option<Entity> {
        self.ai_controller
    }

    /// Owner's effect clock, in seconds.
    pub fn world_time(&self) -> f32 {
        self.effects.now()
    }

    /// Context for effects the owner applies to itself.
    pub fn default_context(&self) -> EffectContext {
        EffectContext::new(None, self.owner, self.avatar, self.owner)
    }

    // === Effects ===

    pub fn effects(&self) -> &EffectContainer {
        &self.effects
    }

    pub fn effects_mut(&mut self) -> &mut EffectContainer {
        &mut self.effects
    }

    pub fn apply_effect(
        &mut self,
        spec: &Arc<EffectDefinition>,
        context: &EffectContext,
        scope: AttributeScope,
    ) -> EffectHandle {
        let target = EffectTarget {
            attributes: &mut self.attributes,
            labels: &mut self.labels,
        };
        self.effects.apply(spec, context, scope, target)
    }

    /// Remove a live effect without firing its expiration.
    pub fn remove_effect(&mut self, handle: EffectHandle) -> bool {
        let target = EffectTarget {
            attributes: &mut self.attributes,
            labels: &mut self.labels,
        };
        self.effects.remove(handle, target)
    }

    /// Remove every live instance of `definition` applied from the same
    /// ability as `context`. Expirations do not fire.
    pub fn remove_matching_effects(&mut self, definition: &str, context: &EffectContext) -> usize {
        let target = EffectTarget {
            attributes: &mut self.attributes,
            labels: &mut self.labels,
        };
        self.effects.remove_matching(definition, context, target)
    }

    pub fn is_effect_active(&self, handle: EffectHandle) -> bool {
        self.effects.is_active(handle)
    }

    /// Advance the effect clock and collect the callbacks it produced.
    pub fn tick_effects(&mut self, delta_seconds: f32) -> Vec<EffectCallback> {
        let target = EffectTarget {
            attributes: &mut self.attributes,
            labels: &mut self.labels,
        };
        self.effects.tick(delta_seconds, target)
    }

    // === Labels ===

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn add_labels(&mut self, labels: &[Label]) {
        self.labels.add_labels(labels);
    }

    pub fn remove_labels(&mut self, labels: &[Label]) {
        self.labels.remove_labels(labels);
    }

    // === Attributes ===

    pub fn attributes(&self) -> &AttributeSets {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut AttributeSets {
        &mut self.attributes
    }

    pub fn add_additional_attributes(&mut self, ability: Label, set: AttributeSet) {
        self.attributes.add_additional(ability, set);
    }

    // === Executing slot ===

    pub fn executing_ability(&self) -> Option<Label> {
        self.executing.get()
    }

    pub fn set_executing_ability(&mut self, ability: Label) {
        self.executing.set(ability);
    }

    pub fn clear_executing_ability(&mut self) {
        self.executing.clear();
    }

    // === Tasks ===

    pub fn tasks(&self) -> &TaskScheduler {
        &self.tasks
    }

    pub fn tasks_mut(&mut self) -> &mut TaskScheduler {
        &mut self.tasks
    }

    // === Input ===

    pub fn queue_input_pressed(&mut self, action: Label) {
        self.pending_input.push_back(InputEvent {
            action,
            phase: InputPhase::Pressed,
        });
    }

    pub fn queue_input_released(&mut self, action: Label) {
        self.pending_input.push_back(InputEvent {
            action,
            phase: InputPhase::Released,
        });
    }

    pub fn take_pending_input(&mut self) -> Vec<InputEvent> {
        self.pending_input.drain(..).collect()
    }

    pub fn has_pending_input(&self) -> bool {
        !self.pending_input.is_empty()
    }

    // === Notifications ===

    pub fn notify(&mut self, ability: Label, kind: AbilityNotificationKind) {
        let time = self.world_time();
        self.notifications.push(AbilityNotification { ability, kind, time });
    }

    pub fn notifications(&self) -> &[AbilityNotification] {
        &self.notifications
    }

    pub fn drain_notifications(&mut self) -> Vec<AbilityNotification> {
        std::mem::take(&mut self.notifications)
    }
}

/// The ability instances an owner carries, in registration order.
#[derive(Component, Debug, Default)]
pub struct Abilities {
    instances: Vec<AbilityInstance>,
}

impl Abilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, instance: AbilityInstance) -> Result<(), AbilityError> {
        if self.get(instance.label()).is_some() {
            return Err(AbilityError::DuplicateAbility(instance.label()));
        }
        self.instances.push(instance);
        Ok(())
    }

    pub fn get(&self, ability: Label) -> Option<&AbilityInstance> {
        self.instances.iter().find(|a| a.label() == ability)
    }

    pub fn get_mut(&mut self, ability: Label) -> Option<&mut AbilityInstance> {
        self.instances.iter_mut().find(|a| a.label() == ability)
    }

    pub fn try_get_mut(&mut self, ability: Label) -> Result<&mut AbilityInstance, AbilityError> {
        self.get_mut(ability)
            .ok_or(AbilityError::UnknownAbility(ability))
    }

    pub fn iter(&self) -> impl Iterator<Item = &AbilityInstance> {
        self.instances.iter()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn has_uninitialized(&self) -> bool {
        self.instances.iter().any(|a| !a.is_initialized())
    }

    /// Initialize every instance that isn't yet. Instances that fail stay
    /// uninitialized; their errors are returned.
    pub fn init_all(&mut self, host: &mut AbilityComponent) -> Vec<AbilityError> {
        self.instances
            .iter_mut()
            .filter(|a| !a.is_initialized())
            .filter_map(|a| a.init_ability(host).err())
            .collect()
    }

    /// Route a press to every initialized ability bound to `action`. The
    /// first one the press moved into `Activating` claims the executing slot
    /// if it is free.
    pub fn input_pressed(&mut self, host: &mut AbilityComponent, action: Label) -> usize {
        let mut routed = 0;
        for ability in self.bound_to(action) {
            let was_waiting = ability.state() == AbilityState::Waiting;
            ability.on_native_input_pressed(host, action);
            if was_waiting
                && ability.state() == AbilityState::Activating
                && host.executing_ability().is_none()
            {
                host.set_executing_ability(ability.label());
            }
            routed += 1;
        }
        routed
    }

    pub fn input_released(&mut self, host: &mut AbilityComponent, action: Label) -> usize {
        let mut routed = 0;
        for ability in self.bound_to(action) {
            ability.on_native_input_released(host, action);
            routed += 1;
        }
        routed
    }

    /// Deliver input queued on the host since the last update.
    pub fn route_pending_input(&mut self, host: &mut AbilityComponent) {
        // Abilities may queue more input while handling these; it waits for the next pass
        for event in host.take_pending_input() {
            match event.phase {
                InputPhase::Pressed => self.input_pressed(host, event.action),
                InputPhase::Released => self.input_released(host, event.action),
            };
        }
    }

    /// Hand each callback to the ability that subscribed to it.
    pub fn dispatch_effect_callbacks(&mut self, host: &mut AbilityComponent, callbacks: &[EffectCallback]) {
        for callback in callbacks {
            match self.get_mut(callback.subscriber) {
                Some(ability) => ability.handle_effect_callback(host, callback),
                None => debug!(
                    "Dropping {:?} callback for unknown ability {}",
                    callback.event, callback.subscriber
                ),
            }
        }
    }

    /// Run every instance's per-frame tick.
    pub fn tick(&mut self, host: &mut AbilityComponent, delta_seconds: f32) {
        for ability in &mut self.instances {
            ability.tick_ability(host, delta_seconds);
        }
    }

    fn bound_to(&mut self, action: Label) -> impl Iterator<Item = &mut AbilityInstance> {
        self.instances
            .iter_mut()
            .filter(move |a| a.is_initialized() && a.is_bound_to(action))
    }
}

/// One frame for one owner: deliver queued input, advance effects and
/// dispatch their callbacks, then tick abilities.
pub fn advance(host: &mut AbilityComponent, abilities: &mut Abilities, delta_seconds: f32) {
    abilities.route_pending_input(host);
    let callbacks = host.tick_effects(delta_seconds);
    abilities.dispatch_effect_callbacks(host, &callbacks);
    abilities.tick(host, delta_seconds);
}
