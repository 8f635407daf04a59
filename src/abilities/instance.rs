//! Ability instance
//!
//! The activation state machine. An instance lives on its owner's
//! [`Abilities`] component and is driven through its owner's
//! [`AbilityComponent`], which provides the effect container, shared labels,
//! attributes and the executing-ability slot.
//!
//! ## Lifecycle
//! ```text
//!   Waiting --start_activation--> Activating --finish_ability--> Waiting
//!                                   |   ^
//!            activation effect expired / period / cancel (state unchanged)
//! ```
//!
//! Effect expiration only reports "activation finished"; going back to
//! `Waiting` is always an explicit `finish_ability`, so an ability can keep
//! working (wait on a task, a confirm...) after its activation effect ran out.
//!
//! [`Abilities`]: crate::component::Abilities

use bevy::prelude::*;
use std::sync::Arc;

use super::behavior::{AbilityBehavior, AbilityCommand, AbilityCommands, HookContext, ManualBehavior};
use super::replication::{AbilityReplication, ReplicatedField, ABILITY_REPLICATION_MANIFEST};
use super::tasks::{AbilityTask, TaskOwner, TaskSet};
use crate::attributes::{Attribute, AttributeScope, AttributeSet, AttributeTable};
use crate::component::{AbilityComponent, AbilityNotificationKind};
use crate::effects::{
    EffectBinding, EffectCallback, EffectContainer, EffectContext, EffectDefinition, EffectEvent,
    EffectHandle, EffectProperty, EffectSubscription,
};
use crate::error::AbilityError;
use crate::labels::Label;
use crate::observers::Observers;

/// Upper bound on hook-queued commands run per public call. Protects against
/// behaviors that re-activate an instant ability from its own finish hook.
const MAX_COMMANDS_PER_FLUSH: usize = 64;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AbilityState {
    #[default]
    Waiting,
    Activating,
}

/// Broadcast lists external code can subscribe to.
#[derive(Debug, Default)]
pub struct AbilityDelegates {
    pub on_activate_begin: Observers,
    pub on_activation_finished: Observers,
    /// Notified on every `is_on_cooldown` poll that finds the cooldown active
    pub on_notify_on_cooldown: Observers,
    /// Pending confirmation. Single-use: cleared on confirm, cancel and finish.
    pub on_confirm: Observers,
    pub on_input_pressed: Observers,
    pub on_input_released: Observers,
}

/// Per-frame tick registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct TickRegistration {
    registered: bool,
    enabled: bool,
}

pub struct AbilityInstance {
    label: Label,
    name: String,
    state: AbilityState,

    activation_effect: EffectProperty,
    cooldown_effect: EffectProperty,
    attribute_cost: EffectProperty,
    ability_attribute_cost: EffectProperty,
    activation_labels: Vec<Label>,
    /// Activation labels currently sitting on the owner's label set
    activation_labels_applied: bool,
    input_actions: Vec<Label>,
    attribute_table: Option<AttributeTable>,

    // Resolved by init_ability
    initialized: bool,
    attribute_scope: AttributeScope,
    default_context: EffectContext,
    owner: Option<Entity>,
    avatar: Option<Entity>,
    camera: Option<Entity>,
    player_controller: Option<Entity>,
    ai_controller: Option<Entity>,
    tick: TickRegistration,
    alive: bool,
    net_addressable: bool,

    pub delegates: AbilityDelegates,
    active_tasks: TaskSet,
    behavior: Box<dyn AbilityBehavior>,
    commands: AbilityCommands,
}

impl std::fmt::Debug for AbilityInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbilityInstance")
            .field("label", &self.label)
            .field("state", &self.state)
            .field("initialized", &self.initialized)
            .field("activation_handle", &self.activation_effect.handle())
            .field("cooldown_handle", &self.cooldown_effect.handle())
            .finish_non_exhaustive()
    }
}

impl AbilityInstance {
    pub fn new(label: Label, behavior: Box<dyn AbilityBehavior>) -> Self {
        Self {
            label,
            name: label.name().to_string(),
            state: AbilityState::Waiting,
            activation_effect: EffectProperty::none(),
            cooldown_effect: EffectProperty::none(),
            attribute_cost: EffectProperty::none(),
            ability_attribute_cost: EffectProperty::none(),
            activation_labels: Vec::new(),
            activation_labels_applied: false,
            input_actions: Vec::new(),
            attribute_table: None,
            initialized: false,
            attribute_scope: AttributeScope::Owner,
            default_context: EffectContext::new(
                Some(label),
                Entity::PLACEHOLDER,
                Entity::PLACEHOLDER,
                Entity::PLACEHOLDER,
            ),
            owner: None,
            avatar: None,
            camera: None,
            player_controller: None,
            ai_controller: None,
            tick: TickRegistration {
                registered: false,
                enabled: true,
            },
            alive: true,
            net_addressable: false,
            delegates: AbilityDelegates::default(),
            active_tasks: TaskSet::default(),
            behavior,
            commands: AbilityCommands::default(),
        }
    }

    /// An ability with no behavior, driven entirely from outside.
    pub fn manual(label: &str) -> Self {
        Self::new(Label::new(label), Box::new(ManualBehavior))
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_activation_effect(mut self, definition: EffectDefinition) -> Self {
        self.activation_effect = EffectProperty::new(Some(definition));
        self
    }

    pub fn with_cooldown_effect(mut self, definition: EffectDefinition) -> Self {
        self.cooldown_effect = EffectProperty::new(Some(definition));
        self
    }

    pub fn with_attribute_cost(mut self, definition: EffectDefinition) -> Self {
        self.attribute_cost = EffectProperty::new(Some(definition));
        self
    }

    pub fn with_ability_attribute_cost(mut self, definition: EffectDefinition) -> Self {
        self.ability_attribute_cost = EffectProperty::new(Some(definition));
        self
    }

    pub fn with_activation_labels(mut self, labels: &[&str]) -> Self {
        self.activation_labels = labels.iter().map(|l| Label::new(l)).collect();
        self
    }

    pub fn with_input_action(mut self, action: &str) -> Self {
        self.input_actions.push(Label::new(action));
        self
    }

    /// Give the ability its own attribute set, registered with the owner at init.
    pub fn with_attributes(mut self, table: AttributeTable) -> Self {
        self.attribute_table = Some(table);
        self
    }

    // ------------------------------------------------------------------
    // Initialization
    // ------------------------------------------------------------------

    /// Resolve the owner's collaborators and register the per-frame tick.
    ///
    /// Runs once. Validates that every attribute the cost references exists
    /// in the attribute set the ability will be checked against.
    pub fn init_ability(&mut self, host: &mut AbilityComponent) -> Result<(), AbilityError> {
        if self.initialized {
            return Err(AbilityError::AlreadyInitialized(self.label));
        }

        let local_attributes = self.attribute_table.as_ref().map(|table| {
            let mut set = AttributeSet::from_table(table);
            set.initialize(host.owner());
            set
        });

        if let Some(spec) = self.ability_attribute_cost.spec() {
            if spec.modifiers.is_empty() {
                return Err(AbilityError::EmptyAttributeCost(self.label));
            }
            let attributes = local_attributes
                .as_ref()
                .unwrap_or(&host.attributes().owner);
            if let Some(missing) = spec
                .modifiers
                .iter()
                .find(|m| !attributes.has_attribute(m.attribute))
            {
                return Err(AbilityError::MissingAttribute {
                    ability: self.label,
                    attribute: missing.attribute,
                });
            }
        }

        if let Some(set) = local_attributes {
            host.add_additional_attributes(self.label, set);
            self.attribute_scope = AttributeScope::Ability(self.label);
        }

        self.owner = Some(host.owner());
        self.avatar = Some(host.avatar());
        self.camera = host.camera();
        self.player_controller = host.player_controller();
        self.ai_controller = host.ai_controller();
        self.default_context =
            EffectContext::new(Some(self.label), host.owner(), host.avatar(), host.owner());

        self.tick.registered = true;
        self.tick.enabled = true;
        self.initialized = true;

        info!("Initialized ability {} for {:?}", self.name, host.owner());
        Ok(())
    }

    // ------------------------------------------------------------------
    // Activation state machine
    // ------------------------------------------------------------------

    /// Start activating, if the ability can be used. Silently does nothing
    /// otherwise.
    ///
    /// An ability whose activation effect is neither timed nor forced by
    /// `apply_activation_effect` reports "activation finished" before this
    /// returns.
    pub fn start_activation(&mut self, host: &mut AbilityComponent, apply_activation_effect: bool) {
        self.begin_activation(host, apply_activation_effect);
        self.flush_commands(host);
    }

    /// Check and pay both costs, then start the activation.
    ///
    /// Does nothing (and pays nothing) if the ability can't be used, the
    /// numeric cost is unaffordable or the custom cost policy refuses.
    pub fn commit_activation(&mut self, host: &mut AbilityComponent, apply_activation_effect: bool) {
        self.commit_activation_inner(host, apply_activation_effect);
        self.flush_commands(host);
    }

    /// Remove the activation effect without reporting "activation finished".
    /// The state stays `Activating` until `finish_ability`.
    pub fn cancel_activation(&mut self, host: &mut AbilityComponent) {
        self.cancel_activation_inner(host);
        self.flush_commands(host);
    }

    /// Return to `Waiting`, cleaning up everything the activation set up.
    pub fn finish_ability(&mut self, host: &mut AbilityComponent) {
        self.finish_ability_inner(host);
        self.flush_commands(host);
    }

    pub fn can_use_ability(&mut self, host: &AbilityComponent) -> bool {
        let on_cooldown = self.is_on_cooldown(host);
        let activating = self.is_activating(host);
        !on_cooldown && !activating
    }

    /// Gate for charge-and-release abilities: only the cooldown matters.
    pub fn can_release_ability(&mut self, host: &AbilityComponent) -> bool {
        if self.is_on_cooldown(host) {
            debug!("Can't release ability {}: on cooldown", self.name);
            return false;
        }
        true
    }

    pub fn is_waiting_for_confirm(&self) -> bool {
        self.delegates.on_confirm.is_bound()
    }

    /// Notify every pending confirm subscriber once and disarm.
    pub fn confirm_ability(&mut self) {
        if self.delegates.on_confirm.is_bound() {
            debug!("Confirming ability {}", self.name);
        }
        self.delegates.on_confirm.notify_and_clear();
    }

    /// Confirm and finish, if activating and releasable.
    pub fn release_ability(&mut self, host: &mut AbilityComponent) {
        self.release_ability_inner(host);
        self.flush_commands(host);
    }

    // ------------------------------------------------------------------
    // Cost & cooldown
    // ------------------------------------------------------------------

    /// Whether the owner can afford the numeric cost. Equality is affordable.
    pub fn check_ability_attribute_cost(&self, host: &AbilityComponent) -> bool {
        let Some(spec) = self.ability_attribute_cost.spec() else {
            return true;
        };
        let attributes = host.attributes().get(self.attribute_scope);
        spec.modifiers
            .iter()
            .all(|m| m.magnitude.resolve(attributes) <= attributes.current_value(m.attribute))
    }

    /// Deduct the numeric cost if it is affordable. Returns whether it was.
    pub fn apply_ability_attribute_cost(&mut self, host: &mut AbilityComponent) -> bool {
        self.apply_ability_attribute_cost_inner(host)
    }

    /// The custom cost policy hook. Defaults to `true`.
    pub fn apply_attribute_cost(&mut self, host: &mut AbilityComponent) -> bool {
        let paid = {
            let (behavior, mut cx) = self.hook_context(host);
            behavior.apply_attribute_cost(&mut cx)
        };
        self.flush_commands(host);
        paid
    }

    /// Start a new cooldown. Any cooldown already running keeps running
    /// untracked; only the new one is queried from then on.
    pub fn apply_cooldown_effect(&mut self, host: &mut AbilityComponent) -> bool {
        let applied = self.apply_cooldown_effect_inner(host);
        self.flush_commands(host);
        applied
    }

    /// Whether the tracked cooldown is running. Every call that answers
    /// `true` notifies `on_notify_on_cooldown`.
    pub fn is_on_cooldown(&mut self, host: &AbilityComponent) -> bool {
        let on_cooldown = self
            .cooldown_effect
            .handle()
            .is_some_and(|handle| host.effects().is_active(handle));
        if on_cooldown {
            self.delegates.on_notify_on_cooldown.notify();
        }
        on_cooldown
    }

    /// Activation effect alive, or state still `Activating`.
    pub fn is_activating(&self, host: &AbilityComponent) -> bool {
        let effect_active = self
            .activation_effect
            .handle()
            .is_some_and(|handle| host.effects().is_active(handle));
        effect_active || self.state == AbilityState::Activating
    }

    // ------------------------------------------------------------------
    // Effect callbacks, input, tick
    // ------------------------------------------------------------------

    /// Entry point for callbacks the owner's effect container produced for
    /// this ability.
    pub fn handle_effect_callback(&mut self, host: &mut AbilityComponent, callback: &EffectCallback) {
        let tracked = match callback.binding {
            EffectBinding::ActivationFinished | EffectBinding::ActivationPeriod => {
                self.activation_effect.handle()
            }
            EffectBinding::CooldownEnded => self.cooldown_effect.handle(),
        };
        if tracked != Some(callback.handle) {
            debug!(
                "Ability {} handling {:?} from untracked effect {:?} (tracking {:?})",
                self.name, callback.event, callback.handle, tracked
            );
        }
        match (callback.binding, callback.event) {
            (EffectBinding::ActivationFinished, EffectEvent::Expired) => {
                self.native_on_activation_finish(host, Some(callback.handle));
            }
            (EffectBinding::ActivationPeriod, EffectEvent::Period) => {
                self.on_activation_effect_period(host);
            }
            (EffectBinding::CooldownEnded, EffectEvent::Expired) => {
                self.on_cooldown_end(host);
            }
            (binding, event) => {
                warn!(
                    "Ability {} ignoring {:?} callback bound to {:?}",
                    self.name, event, binding
                );
            }
        }
        self.flush_commands(host);
    }

    pub fn on_native_input_pressed(&mut self, host: &mut AbilityComponent, action: Label) {
        info!("Input pressed ({}) in ability {}", action, self.name);
        let (behavior, mut cx) = self.hook_context(host);
        behavior.on_input_pressed(&mut cx, action);
        self.delegates.on_input_pressed.notify();
        self.flush_commands(host);
    }

    pub fn on_native_input_released(&mut self, host: &mut AbilityComponent, action: Label) {
        info!("Input released ({}) in ability {}", action, self.name);
        let (behavior, mut cx) = self.hook_context(host);
        behavior.on_input_released(&mut cx, action);
        self.delegates.on_input_released.notify();
        self.flush_commands(host);
    }

    /// Ask the owner to route a press of `action` to its abilities (this one
    /// included) on its next update.
    pub fn execute_input_pressed_from_label(&self, host: &mut AbilityComponent, action: Label) {
        host.queue_input_pressed(action);
    }

    pub fn execute_input_released_from_label(&self, host: &mut AbilityComponent, action: Label) {
        host.queue_input_released(action);
    }

    /// Per-frame update. Skipped unless the tick is registered and enabled
    /// and the ability is alive; never gated by activation state.
    ///
    /// Returns whether the tick hook ran.
    pub fn tick_ability(&mut self, host: &mut AbilityComponent, delta_seconds: f32) -> bool {
        if !self.alive || !self.tick.registered || !self.tick.enabled {
            return false;
        }
        let (behavior, mut cx) = self.hook_context(host);
        behavior.tick_ability(&mut cx, delta_seconds);
        self.flush_commands(host);
        true
    }

    pub fn set_tick_enabled(&mut self, enabled: bool) {
        self.tick.enabled = enabled;
    }

    pub fn is_tick_enabled(&self) -> bool {
        self.tick.registered && self.tick.enabled
    }

    /// Flag the instance for destruction; its tick stops running immediately.
    pub fn mark_pending_destroy(&mut self) {
        self.alive = false;
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    // ------------------------------------------------------------------
    // Timing queries (0.0 when there is no live instance)
    // ------------------------------------------------------------------

    pub fn activation_remaining_time(&self, host: &AbilityComponent) -> f32 {
        query_time(host, self.activation_effect.handle(), EffectContainer::remaining_time)
    }

    pub fn activation_remaining_time_normalized(&self, host: &AbilityComponent) -> f32 {
        query_time(
            host,
            self.activation_effect.handle(),
            EffectContainer::remaining_time_normalized,
        )
    }

    pub fn activation_current_time(&self, host: &AbilityComponent) -> f32 {
        query_time(host, self.activation_effect.handle(), EffectContainer::current_time)
    }

    pub fn activation_current_time_normalized(&self, host: &AbilityComponent) -> f32 {
        query_time(
            host,
            self.activation_effect.handle(),
            EffectContainer::current_time_normalized,
        )
    }

    pub fn activation_end_time(&self, host: &AbilityComponent) -> f32 {
        query_time(host, self.activation_effect.handle(), EffectContainer::end_time)
    }

    pub fn cooldown_remaining_time(&self, host: &AbilityComponent) -> f32 {
        query_time(host, self.cooldown_effect.handle(), EffectContainer::remaining_time)
    }

    pub fn cooldown_remaining_time_normalized(&self, host: &AbilityComponent) -> f32 {
        query_time(
            host,
            self.cooldown_effect.handle(),
            EffectContainer::remaining_time_normalized,
        )
    }

    pub fn cooldown_current_time(&self, host: &AbilityComponent) -> f32 {
        query_time(host, self.cooldown_effect.handle(), EffectContainer::current_time)
    }

    pub fn cooldown_current_time_normalized(&self, host: &AbilityComponent) -> f32 {
        query_time(
            host,
            self.cooldown_effect.handle(),
            EffectContainer::current_time_normalized,
        )
    }

    pub fn cooldown_end_time(&self, host: &AbilityComponent) -> f32 {
        query_time(host, self.cooldown_effect.handle(), EffectContainer::end_time)
    }

    /// Play rate that stretches an animation clip over the activation.
    pub fn animation_play_rate(&self, clip_length: f32) -> f32 {
        let activation_time = self
            .activation_effect
            .spec()
            .map(|spec| spec.duration)
            .filter(|duration| *duration > 0.0)
            .unwrap_or(clip_length);
        if clip_length <= 0.0 || activation_time <= 0.0 {
            return 1.0;
        }
        clip_length / activation_time
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn label(&self) -> Label {
        self.label
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> AbilityState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn input_actions(&self) -> &[Label] {
        &self.input_actions
    }

    pub fn is_bound_to(&self, action: Label) -> bool {
        self.input_actions.contains(&action)
    }

    pub fn activation_labels(&self) -> &[Label] {
        &self.activation_labels
    }

    pub fn activation_handle(&self) -> Option<EffectHandle> {
        self.activation_effect.handle()
    }

    pub fn cooldown_handle(&self) -> Option<EffectHandle> {
        self.cooldown_effect.handle()
    }

    pub fn ability_attribute_cost_handle(&self) -> Option<EffectHandle> {
        self.ability_attribute_cost.handle()
    }

    pub fn has_attribute_cost_policy(&self) -> bool {
        self.attribute_cost.is_configured()
    }

    /// Current value of `attribute` in the set this ability's costs resolve
    /// against (its own set if it registered one, else the owner's).
    pub fn attribute_value(&self, host: &AbilityComponent, attribute: &str) -> f32 {
        host.attributes()
            .get(self.attribute_scope)
            .current_value(Attribute::new(attribute))
    }

    pub fn attribute_scope(&self) -> AttributeScope {
        self.attribute_scope
    }

    pub fn default_context(&self) -> &EffectContext {
        &self.default_context
    }

    pub fn owner(&self) -> Option<Entity> {
        self.owner
    }

    pub fn avatar(&self) -> Option<Entity> {
        self.avatar
    }

    pub fn camera(&self) -> Option<Entity> {
        self.camera
    }

    pub fn active_tasks(&self) -> &TaskSet {
        &self.active_tasks
    }

    pub fn replicated_fields() -> &'static [ReplicatedField] {
        ABILITY_REPLICATION_MANIFEST
    }

    pub fn replication_snapshot(&self) -> AbilityReplication {
        AbilityReplication {
            owner: self.owner.map(Entity::to_bits),
            avatar: self.avatar.map(Entity::to_bits),
            player_controller: self.player_controller.map(Entity::to_bits),
            ai_controller: self.ai_controller.map(Entity::to_bits),
        }
    }

    pub fn set_net_addressable(&mut self) {
        self.net_addressable = true;
    }

    pub fn is_name_stable_for_networking(&self) -> bool {
        self.net_addressable
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn hook_context<'a>(
        &'a mut self,
        host: &'a AbilityComponent,
    ) -> (&'a mut dyn AbilityBehavior, HookContext<'a>) {
        (
            self.behavior.as_mut(),
            HookContext {
                ability: self.label,
                state: self.state,
                now: host.world_time(),
                scope: self.attribute_scope,
                host,
                commands: &mut self.commands,
            },
        )
    }

    fn begin_activation(&mut self, host: &mut AbilityComponent, apply_activation_effect: bool) {
        if !self.can_use_ability(host) {
            debug!("Ability {} can't be used right now", self.name);
            return;
        }

        self.state = AbilityState::Activating;
        info!("Begin executing ability: {}", self.name);

        // A confirmation left over from the previous cycle counts as consumed
        if self.delegates.on_confirm.is_bound() {
            self.delegates.on_confirm.notify_and_clear();
        }

        self.apply_activation_effect(host, apply_activation_effect);

        let (behavior, mut cx) = self.hook_context(host);
        behavior.on_activate(&mut cx);
        self.delegates.on_activate_begin.notify();

        host.add_labels(&self.activation_labels);
        self.activation_labels_applied = true;
        host.notify(self.label, AbilityNotificationKind::ActivationStarted);
    }

    fn commit_activation_inner(&mut self, host: &mut AbilityComponent, apply_activation_effect: bool) {
        if !self.can_use_ability(host) {
            debug!("Ability {} can't be used right now", self.name);
            return;
        }
        if !self.check_ability_attribute_cost(host) {
            debug!("Ability {} can't afford its cost", self.name);
            return;
        }
        let (behavior, mut cx) = self.hook_context(host);
        if !behavior.apply_attribute_cost(&mut cx) {
            debug!("Ability {} cost policy refused activation", self.name);
            return;
        }
        self.apply_ability_attribute_cost_inner(host);
        self.begin_activation(host, apply_activation_effect);
    }

    /// Returns whether a tracked activation effect was created.
    fn apply_activation_effect(&mut self, host: &mut AbilityComponent, apply_activation_effect: bool) -> bool {
        let Some(spec) = self.activation_effect.spec().cloned() else {
            // No activation effect: the caller finishes the ability by hand
            return false;
        };

        if !(apply_activation_effect || spec.is_timed()) {
            self.native_on_activation_finish(host, None);
            return false;
        }

        self.activation_effect.reset_handle();
        let handle = host.apply_effect(&spec, &self.default_context, self.attribute_scope);
        self.activation_effect.set_handle(handle);

        let tracked = host.effects_mut().subscribe_expired(
            handle,
            EffectSubscription {
                subscriber: self.label,
                binding: EffectBinding::ActivationFinished,
            },
        );
        if spec.is_periodic() {
            host.effects_mut().subscribe_period(
                handle,
                EffectSubscription {
                    subscriber: self.label,
                    binding: EffectBinding::ActivationPeriod,
                },
            );
        }
        if !tracked {
            debug!(
                "Activation effect '{}' of {} is instant; finish the ability manually",
                spec.name, self.name
            );
        }
        tracked
    }

    fn native_on_activation_finish(&mut self, host: &mut AbilityComponent, handle: Option<EffectHandle>) {
        info!("Activation finished in ability: {}", self.name);
        let (behavior, mut cx) = self.hook_context(host);
        behavior.on_activation_finished(&mut cx, handle);
        self.delegates.on_activation_finished.notify();
        host.notify(self.label, AbilityNotificationKind::ActivationFinished);
    }

    fn on_activation_effect_period(&mut self, host: &mut AbilityComponent) {
        debug!("Activation period in ability: {}", self.name);
        let (behavior, mut cx) = self.hook_context(host);
        behavior.on_period(&mut cx);
        host.notify(self.label, AbilityNotificationKind::ActivationPeriod);
    }

    fn cancel_activation_inner(&mut self, host: &mut AbilityComponent) {
        info!("Activation cancelled in ability: {}", self.name);
        if let Some(spec) = self.activation_effect.spec() {
            host.remove_matching_effects(&spec.name, &self.default_context);
        }
        self.delegates.on_confirm.clear();
        let (behavior, mut cx) = self.hook_context(host);
        behavior.on_activation_cancel(&mut cx);
        host.notify(self.label, AbilityNotificationKind::ActivationCancelled);
    }

    fn finish_ability_inner(&mut self, host: &mut AbilityComponent) {
        info!("Finish executing ability: {}", self.name);
        let (behavior, mut cx) = self.hook_context(host);
        behavior.on_ability_finished(&mut cx);

        host.clear_executing_ability();
        self.delegates.on_confirm.clear();
        if let Some(handle) = self.activation_effect.handle() {
            host.remove_effect(handle);
        }
        if self.activation_labels_applied {
            host.remove_labels(&self.activation_labels);
            self.activation_labels_applied = false;
        }
        self.state = AbilityState::Waiting;
        host.notify(self.label, AbilityNotificationKind::AbilityFinished);
    }

    fn release_ability_inner(&mut self, host: &mut AbilityComponent) {
        if self.state != AbilityState::Activating || !self.can_release_ability(host) {
            return;
        }
        self.confirm_ability();
        self.finish_ability_inner(host);
    }

    fn apply_ability_attribute_cost_inner(&mut self, host: &mut AbilityComponent) -> bool {
        if !self.check_ability_attribute_cost(host) {
            return false;
        }
        let Some(spec) = self.ability_attribute_cost.spec().cloned() else {
            return false;
        };
        let handle = host.apply_effect(&spec, &self.default_context, self.attribute_scope);
        self.ability_attribute_cost.set_handle(handle);
        host.notify(self.label, AbilityNotificationKind::AttributeCostApplied);
        true
    }

    fn apply_cooldown_effect_inner(&mut self, host: &mut AbilityComponent) -> bool {
        let Some(spec) = self.cooldown_effect.spec().cloned() else {
            return false;
        };
        let handle = host.apply_effect(&spec, &self.default_context, self.attribute_scope);
        self.cooldown_effect.set_handle(handle);

        let (behavior, mut cx) = self.hook_context(host);
        behavior.on_cooldown_start(&mut cx);
        host.notify(self.label, AbilityNotificationKind::CooldownStarted);

        host.effects_mut().subscribe_expired(
            handle,
            EffectSubscription {
                subscriber: self.label,
                binding: EffectBinding::CooldownEnded,
            },
        );
        true
    }

    fn on_cooldown_end(&mut self, host: &mut AbilityComponent) {
        debug!("Cooldown ended in ability: {}", self.name);
        let (behavior, mut cx) = self.hook_context(host);
        behavior.on_cooldown_end(&mut cx);
        host.notify(self.label, AbilityNotificationKind::CooldownEnded);
    }

    fn flush_commands(&mut self, host: &mut AbilityComponent) {
        let mut executed = 0;
        while let Some(command) = self.commands.pop() {
            if executed == MAX_COMMANDS_PER_FLUSH {
                warn!(
                    "Ability {} queued more than {} commands in one call; dropping the rest",
                    self.name, MAX_COMMANDS_PER_FLUSH
                );
                self.commands.clear();
                break;
            }
            executed += 1;
            self.execute(host, command);
        }
    }

    fn execute(&mut self, host: &mut AbilityComponent, command: AbilityCommand) {
        match command {
            AbilityCommand::StartActivation {
                apply_activation_effect,
            } => self.begin_activation(host, apply_activation_effect),
            AbilityCommand::CommitActivation {
                apply_activation_effect,
            } => self.commit_activation_inner(host, apply_activation_effect),
            AbilityCommand::FinishAbility => self.finish_ability_inner(host),
            AbilityCommand::CancelActivation => self.cancel_activation_inner(host),
            AbilityCommand::ApplyCooldown => {
                self.apply_cooldown_effect_inner(host);
            }
            AbilityCommand::ApplyAbilityAttributeCost => {
                self.apply_ability_attribute_cost_inner(host);
            }
            AbilityCommand::ConfirmAbility => self.confirm_ability(),
            AbilityCommand::ReleaseAbility => self.release_ability_inner(host),
            AbilityCommand::SetTickEnabled(enabled) => self.set_tick_enabled(enabled),
            AbilityCommand::StartTask(task) => self.start_task(host, task),
            AbilityCommand::EndTask(task) => self.end_task(host, task),
        }
    }

    fn start_task(&mut self, host: &mut AbilityComponent, name: Label) {
        let scheduler = host.tasks_mut();
        let task = scheduler.new_task(self, name.name());
        scheduler.activate(self, &task);
    }

    fn end_task(&mut self, host: &mut AbilityComponent, name: Label) {
        let scheduler = host.tasks_mut();
        for task in scheduler.tasks_for(self.label) {
            if task.name() == name.name() {
                scheduler.finish(self, &task);
            }
        }
    }
}

fn query_time(
    host: &AbilityComponent,
    handle: Option<EffectHandle>,
    query: fn(&EffectContainer, EffectHandle) -> f32,
) -> f32 {
    handle.map(|h| query(host.effects(), h)).unwrap_or(0.0)
}

impl TaskOwner for AbilityInstance {
    fn on_task_initialized(&mut self, task: &AbilityTask) {
        task.bind_ability(self.label);
    }

    fn on_task_activated(&mut self, task: &Arc<AbilityTask>) {
        info!("Task started: {} in ability: {}", task.name(), self.name);
        self.active_tasks.insert(task);
    }

    fn on_task_deactivated(&mut self, task: &Arc<AbilityTask>) {
        info!("Task removed: {} in ability: {}", task.name(), self.name);
        self.active_tasks.remove(task);
    }

    fn task_owner(&self) -> Option<Entity> {
        self.owner
    }

    fn task_avatar(&self) -> Option<Entity> {
        self.avatar
    }

    fn task_manager(&self) -> Option<Entity> {
        // The ability component lives on the owner
        self.owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abilities::tasks::TaskScheduler;
    use crate::attributes::AttributeTable;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn host() -> AbilityComponent {
        let table = AttributeTable::new().with("Attribute.Mana", 50.0);
        AbilityComponent::new(Entity::from_raw(2), AttributeSet::from_table(&table))
            .with_avatar(Entity::from_raw(3))
            .with_camera(Entity::from_raw(4))
            .with_player_controller(Entity::from_raw(5))
    }

    struct TickCounter(Arc<AtomicUsize>);

    impl AbilityBehavior for TickCounter {
        fn tick_ability(&mut self, _cx: &mut HookContext<'_>, _delta_seconds: f32) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_init_resolves_owner_references() {
        let mut host = host();
        let mut ability = AbilityInstance::manual("Ability.Refs");
        assert_eq!(ability.default_context().caster, Entity::PLACEHOLDER);

        ability.init_ability(&mut host).unwrap();

        assert_eq!(ability.owner(), Some(Entity::from_raw(2)));
        assert_eq!(ability.avatar(), Some(Entity::from_raw(3)));
        assert_eq!(ability.camera(), Some(Entity::from_raw(4)));
        assert_eq!(ability.default_context().caster, Entity::from_raw(2));
        assert_eq!(ability.default_context().avatar, Entity::from_raw(3));
        assert_eq!(ability.default_context().ability, Some(Label::new("Ability.Refs")));
        assert!(ability.is_tick_enabled());
    }

    #[test]
    fn test_tick_runs_regardless_of_state_until_destroyed() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let mut host = host();
        let mut ability =
            AbilityInstance::new(Label::new("Ability.Ticking"), Box::new(TickCounter(ticks.clone())));

        // Not registered before init
        assert!(!ability.tick_ability(&mut host, 0.1));
        ability.init_ability(&mut host).unwrap();

        assert!(ability.tick_ability(&mut host, 0.1));
        ability.start_activation(&mut host, false);
        assert!(ability.tick_ability(&mut host, 0.1));

        ability.set_tick_enabled(false);
        assert!(!ability.tick_ability(&mut host, 0.1));
        ability.set_tick_enabled(true);

        ability.mark_pending_destroy();
        assert!(!ability.is_alive());
        assert!(!ability.tick_ability(&mut host, 0.1));

        assert_eq!(ticks.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_tasks_tracked_through_notifications() {
        let mut host = host();
        let mut ability = AbilityInstance::manual("Ability.Tasks");
        ability.init_ability(&mut host).unwrap();
        let mut scheduler = TaskScheduler::new();

        let task = scheduler.new_task(&mut ability, "WaitForTarget");
        assert_eq!(task.ability(), Some(Label::new("Ability.Tasks")));
        assert!(ability.active_tasks().is_empty());

        scheduler.activate(&mut ability, &task);
        assert!(ability.active_tasks().contains(task.id()));

        scheduler.pause(&mut ability, &task);
        assert!(!ability.active_tasks().contains(task.id()));

        scheduler.resume(&mut ability, &task);
        scheduler.finish(&mut ability, &task);
        assert!(ability.active_tasks().is_empty());

        assert_eq!(ability.task_owner(), Some(Entity::from_raw(2)));
        assert_eq!(ability.task_avatar(), Some(Entity::from_raw(3)));
        assert_eq!(ability.task_manager(), Some(Entity::from_raw(2)));
    }

    #[test]
    fn test_replication_snapshot_carries_entity_bits() {
        let mut host = host();
        let mut ability = AbilityInstance::manual("Ability.Net");
        assert_eq!(ability.replication_snapshot(), AbilityReplication::default());

        ability.init_ability(&mut host).unwrap();
        let snapshot = ability.replication_snapshot();

        assert_eq!(snapshot.owner, Some(Entity::from_raw(2).to_bits()));
        assert_eq!(snapshot.player_controller, Some(Entity::from_raw(5).to_bits()));
        assert_eq!(snapshot.ai_controller, None);
        assert_eq!(AbilityInstance::replicated_fields().len(), 4);

        assert!(!ability.is_name_stable_for_networking());
        ability.set_net_addressable();
        assert!(ability.is_name_stable_for_networking());
    }

    #[test]
    fn test_execute_input_queues_on_host() {
        let mut host = host();
        let ability = AbilityInstance::manual("Ability.Relay");

        ability.execute_input_pressed_from_label(&mut host, Label::new("Input.Primary"));
        ability.execute_input_released_from_label(&mut host, Label::new("Input.Primary"));

        let queued = host.take_pending_input();
        assert_eq!(queued.len(), 2);
        assert_eq!(queued[0].phase, crate::component::InputPhase::Pressed);
        assert_eq!(queued[1].phase, crate::component::InputPhase::Released);
    }

    #[test]
    fn test_input_hooks_notify_observers() {
        let mut host = host();
        let mut ability = AbilityInstance::manual("Ability.Input");
        let presses = Arc::new(AtomicUsize::new(0));
        let counter = presses.clone();
        ability.delegates.on_input_pressed.subscribe(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        ability.on_native_input_pressed(&mut host, Label::new("Input.Primary"));
        ability.on_native_input_released(&mut host, Label::new("Input.Primary"));

        assert_eq!(presses.load(Ordering::SeqCst), 1);
    }

    /// Restarts itself every time its instant activation finishes
    struct Restarter(Arc<AtomicUsize>);

    impl AbilityBehavior for Restarter {
        fn on_activate(&mut self, _cx: &mut HookContext<'_>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }

        fn on_activation_finished(&mut self, cx: &mut HookContext<'_>, _handle: Option<EffectHandle>) {
            cx.commands.finish_ability();
            cx.commands.start_activation(false);
        }
    }

    #[test]
    fn test_runaway_command_chain_is_capped() {
        let activations = Arc::new(AtomicUsize::new(0));
        let mut host = host();
        let mut ability =
            AbilityInstance::new(Label::new("Ability.Loop"), Box::new(Restarter(activations.clone())))
                .with_activation_effect(EffectDefinition::new("Loop.Cast"));
        ability.init_ability(&mut host).unwrap();

        ability.start_activation(&mut host, false);

        let count = activations.load(Ordering::SeqCst);
        assert!(count > 1 && count <= MAX_COMMANDS_PER_FLUSH, "ran {count} activations");
    }

    /// Refuses while silenced or below a rage threshold
    struct RageGate;

    impl AbilityBehavior for RageGate {
        fn apply_attribute_cost(&mut self, cx: &mut HookContext<'_>) -> bool {
            !cx.has_label("State.Silenced") && cx.attribute_value("Attribute.Rage") >= 20.0
        }
    }

    #[test]
    fn test_cost_policy_reads_owner_state() {
        let table = AttributeTable::new().with("Attribute.Rage", 10.0);
        let mut host = AbilityComponent::new(Entity::from_raw(2), AttributeSet::from_table(&table));
        let mut ability = AbilityInstance::new(Label::new("Ability.Rampage"), Box::new(RageGate));
        ability.init_ability(&mut host).unwrap();
        assert_eq!(ability.attribute_value(&host, "Attribute.Rage"), 10.0);

        ability.commit_activation(&mut host, false);
        assert_eq!(ability.state(), AbilityState::Waiting);

        host.attributes_mut()
            .get_mut(AttributeScope::Owner)
            .add_base(Attribute::new("Attribute.Rage"), 15.0);
        host.add_labels(&[Label::new("State.Silenced")]);
        assert!(!ability.apply_attribute_cost(&mut host));

        host.remove_labels(&[Label::new("State.Silenced")]);
        ability.commit_activation(&mut host, false);
        assert_eq!(ability.state(), AbilityState::Activating);
    }

    #[test]
    fn test_cancel_removes_every_instance_of_the_activation_effect() {
        let mut host = host();
        let cast = EffectDefinition::new("Channel.Cast").with_duration(5.0);
        let mut ability = AbilityInstance::manual("Ability.Channel").with_activation_effect(cast.clone());
        ability.init_ability(&mut host).unwrap();

        ability.start_activation(&mut host, false);
        let tracked = ability.activation_handle().unwrap();
        let stray = host.apply_effect(&Arc::new(cast), ability.default_context(), AttributeScope::Owner);
        let owner_context = host.default_context();
        let unrelated = host.apply_effect(
            &Arc::new(EffectDefinition::new("Channel.Cast").with_duration(5.0)),
            &owner_context,
            AttributeScope::Owner,
        );

        ability.cancel_activation(&mut host);

        assert!(!host.is_effect_active(tracked));
        assert!(!host.is_effect_active(stray));
        assert!(host.is_effect_active(unrelated));
        assert_eq!(ability.state(), AbilityState::Activating);
    }
}
