//! Ability behaviors
//!
//! The overridable half of an ability. An [`AbilityInstance`] owns the state
//! machine and calls into its behavior at fixed points (activate, period,
//! activation finished, cancel, finish, cooldown start/end, input, tick).
//!
//! Hooks never touch the instance directly. They queue [`AbilityCommand`]s on
//! the [`HookContext`]; the instance runs them in order right after the hook
//! returns, before the public call that triggered the hook returns.
//!
//! [`AbilityInstance`]: super::instance::AbilityInstance

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::instance::AbilityState;
use crate::attributes::{Attribute, AttributeScope};
use crate::component::AbilityComponent;
use crate::effects::EffectHandle;
use crate::labels::Label;

/// Deferred operation requested by a hook.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbilityCommand {
    StartActivation { apply_activation_effect: bool },
    /// Check and pay costs, then start the activation
    CommitActivation { apply_activation_effect: bool },
    FinishAbility,
    CancelActivation,
    ApplyCooldown,
    ApplyAbilityAttributeCost,
    ConfirmAbility,
    /// Confirm and finish, if the ability is activating and releasable
    ReleaseAbility,
    SetTickEnabled(bool),
    /// Create a task named by the label and activate it
    StartTask(Label),
    /// Finish every live task of this ability with that name
    EndTask(Label),
}

/// FIFO of commands queued by hooks.
#[derive(Debug, Default)]
pub struct AbilityCommands {
    queue: VecDeque<AbilityCommand>,
}

impl AbilityCommands {
    pub fn push(&mut self, command: AbilityCommand) {
        self.queue.push_back(command);
    }

    pub fn pop(&mut self) -> Option<AbilityCommand> {
        self.queue.pop_front()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn start_activation(&mut self, apply_activation_effect: bool) {
        self.push(AbilityCommand::StartActivation {
            apply_activation_effect,
        });
    }

    pub fn commit_activation(&mut self, apply_activation_effect: bool) {
        self.push(AbilityCommand::CommitActivation {
            apply_activation_effect,
        });
    }

    pub fn finish_ability(&mut self) {
        self.push(AbilityCommand::FinishAbility);
    }

    pub fn cancel_activation(&mut self) {
        self.push(AbilityCommand::CancelActivation);
    }

    pub fn apply_cooldown(&mut self) {
        self.push(AbilityCommand::ApplyCooldown);
    }

    pub fn apply_ability_attribute_cost(&mut self) {
        self.push(AbilityCommand::ApplyAbilityAttributeCost);
    }

    pub fn confirm_ability(&mut self) {
        self.push(AbilityCommand::ConfirmAbility);
    }

    pub fn release_ability(&mut self) {
        self.push(AbilityCommand::ReleaseAbility);
    }

    pub fn set_tick_enabled(&mut self, enabled: bool) {
        self.push(AbilityCommand::SetTickEnabled(enabled));
    }

    pub fn start_task(&mut self, task: &str) {
        self.push(AbilityCommand::StartTask(Label::new(task)));
    }

    pub fn end_task(&mut self, task: &str) {
        self.push(AbilityCommand::EndTask(Label::new(task)));
    }
}

/// What a hook gets to see and do.
///
/// The owner is read-only here; changes go through `commands`.
pub struct HookContext<'a> {
    /// Label of the ability running the hook
    pub ability: Label,
    pub state: AbilityState,
    /// Owner's effect clock
    pub now: f32,
    /// Attribute set the ability's costs resolve against
    pub scope: AttributeScope,
    pub host: &'a AbilityComponent,
    pub commands: &'a mut AbilityCommands,
}

impl HookContext<'_> {
    /// Current value of `attribute` in the ability's attribute set.
    pub fn attribute_value(&self, attribute: &str) -> f32 {
        self.host
            .attributes()
            .get(self.scope)
            .current_value(Attribute::new(attribute))
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.host.labels().has_label(Label::new(label))
    }

    /// Seconds left on a live effect, 0.0 otherwise.
    pub fn effect_remaining_time(&self, handle: EffectHandle) -> f32 {
        self.host.effects().remaining_time(handle)
    }
}

/// Overridable ability hooks. Every hook defaults to doing nothing.
pub trait AbilityBehavior: Send + Sync + 'static {
    /// Activation started (after the activation effect was applied).
    fn on_activate(&mut self, _cx: &mut HookContext<'_>) {}

    /// The activation effect expired, or an instant activation completed.
    /// `handle` is `None` for instant activations.
    fn on_activation_finished(&mut self, _cx: &mut HookContext<'_>, _handle: Option<EffectHandle>) {}

    /// One period of the activation effect elapsed.
    fn on_period(&mut self, _cx: &mut HookContext<'_>) {}

    fn on_activation_cancel(&mut self, _cx: &mut HookContext<'_>) {}

    fn on_ability_finished(&mut self, _cx: &mut HookContext<'_>) {}

    fn on_cooldown_start(&mut self, _cx: &mut HookContext<'_>) {}

    fn on_cooldown_end(&mut self, _cx: &mut HookContext<'_>) {}

    fn on_input_pressed(&mut self, _cx: &mut HookContext<'_>, _action: Label) {}

    fn on_input_released(&mut self, _cx: &mut HookContext<'_>, _action: Label) {}

    /// Custom, non-numeric cost policy. Returning false blocks a commit.
    fn apply_attribute_cost(&mut self, _cx: &mut HookContext<'_>) -> bool {
        true
    }

    /// Runs every frame while the tick is registered, enabled and the
    /// ability is alive, whatever the activation state.
    fn tick_ability(&mut self, _cx: &mut HookContext<'_>, _delta_seconds: f32) {}
}

/// No behavior at all. Callers drive the ability through its public API.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManualBehavior;

impl AbilityBehavior for ManualBehavior {}

/// Press to commit and activate; when the activation finishes, start the
/// cooldown and finish.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardBehavior {
    pub apply_activation_effect: bool,
}

impl AbilityBehavior for StandardBehavior {
    fn on_input_pressed(&mut self, cx: &mut HookContext<'_>, _action: Label) {
        cx.commands.commit_activation(self.apply_activation_effect);
    }

    fn on_activation_finished(&mut self, cx: &mut HookContext<'_>, _handle: Option<EffectHandle>) {
        cx.commands.apply_cooldown();
        cx.commands.finish_ability();
    }
}

/// Task a charging ability keeps running until it fires.
pub const CHARGE_TASK: &str = "Task.Charge";

/// Hold to charge, release to fire.
///
/// Pressing commits a timed activation; releasing (or the activation effect
/// running out) confirms and finishes. The cooldown starts once finished.
/// While charging the ability runs a [`CHARGE_TASK`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ChargeReleaseBehavior;

impl AbilityBehavior for ChargeReleaseBehavior {
    fn on_input_pressed(&mut self, cx: &mut HookContext<'_>, _action: Label) {
        cx.commands.commit_activation(true);
    }

    fn on_activate(&mut self, cx: &mut HookContext<'_>) {
        cx.commands.start_task(CHARGE_TASK);
    }

    fn on_input_released(&mut self, cx: &mut HookContext<'_>, _action: Label) {
        cx.commands.release_ability();
    }

    fn on_activation_finished(&mut self, cx: &mut HookContext<'_>, _handle: Option<EffectHandle>) {
        // Fully charged
        cx.commands.release_ability();
    }

    fn on_ability_finished(&mut self, cx: &mut HookContext<'_>) {
        cx.commands.end_task(CHARGE_TASK);
        cx.commands.apply_cooldown();
    }
}

/// Built-in behavior selection, as written in ability config.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BehaviorKind {
    Manual,
    Standard {
        #[serde(default)]
        apply_activation_effect: bool,
    },
    ChargeRelease,
}

impl Default for BehaviorKind {
    fn default() -> Self {
        BehaviorKind::Standard {
            apply_activation_effect: false,
        }
    }
}

impl BehaviorKind {
    pub fn build(&self) -> Box<dyn AbilityBehavior> {
        match self {
            BehaviorKind::Manual => Box::new(ManualBehavior),
            BehaviorKind::Standard {
                apply_activation_effect,
            } => Box::new(StandardBehavior {
                apply_activation_effect: *apply_activation_effect,
            }),
            BehaviorKind::ChargeRelease => Box::new(ChargeReleaseBehavior),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::attributes::{AttributeSet, AttributeTable};
    use bevy::prelude::Entity;

    fn owner() -> AbilityComponent {
        let table = AttributeTable::new().with("Attribute.Mana", 40.0);
        AbilityComponent::new(Entity::from_raw(1), AttributeSet::from_table(&table))
    }

    fn context<'a>(host: &'a AbilityComponent, commands: &'a mut AbilityCommands) -> HookContext<'a> {
        HookContext {
            ability: Label::new("Ability.Test"),
            state: AbilityState::Waiting,
            now: 0.0,
            scope: AttributeScope::Owner,
            host,
            commands,
        }
    }

    #[test]
    fn test_standard_behavior_queues_cooldown_then_finish() {
        let host = owner();
        let mut commands = AbilityCommands::default();
        let mut behavior = StandardBehavior::default();

        behavior.on_activation_finished(&mut context(&host, &mut commands), None);

        assert_eq!(commands.pop(), Some(AbilityCommand::ApplyCooldown));
        assert_eq!(commands.pop(), Some(AbilityCommand::FinishAbility));
        assert!(commands.is_empty());
    }

    #[test]
    fn test_charge_release_press_commits_timed_activation() {
        let host = owner();
        let mut commands = AbilityCommands::default();
        let mut behavior = ChargeReleaseBehavior;

        behavior.on_input_pressed(&mut context(&host, &mut commands), Label::new("Input.Primary"));

        assert_eq!(
            commands.pop(),
            Some(AbilityCommand::CommitActivation {
                apply_activation_effect: true
            })
        );
    }

    #[test]
    fn test_manual_behavior_queues_nothing() {
        let host = owner();
        let mut commands = AbilityCommands::default();
        let mut behavior = BehaviorKind::Manual.build();

        behavior.on_input_pressed(&mut context(&host, &mut commands), Label::new("Input.Primary"));
        behavior.on_activation_finished(&mut context(&host, &mut commands), None);

        assert!(commands.is_empty());
        assert!(behavior.apply_attribute_cost(&mut context(&host, &mut commands)));
    }

    #[test]
    fn test_charge_release_runs_a_task_while_charging() {
        let host = owner();
        let mut commands = AbilityCommands::default();
        let mut behavior = ChargeReleaseBehavior;

        behavior.on_activate(&mut context(&host, &mut commands));
        behavior.on_ability_finished(&mut context(&host, &mut commands));

        assert_eq!(commands.pop(), Some(AbilityCommand::StartTask(Label::new(CHARGE_TASK))));
        assert_eq!(commands.pop(), Some(AbilityCommand::EndTask(Label::new(CHARGE_TASK))));
        assert_eq!(commands.pop(), Some(AbilityCommand::ApplyCooldown));
    }

    #[test]
    fn test_context_reads_owner_state() {
        let mut host = owner();
        host.add_labels(&[Label::new("State.Silenced")]);
        let mut commands = AbilityCommands::default();
        let cx = context(&host, &mut commands);

        assert_eq!(cx.attribute_value("Attribute.Mana"), 40.0);
        assert_eq!(cx.attribute_value("Attribute.Rage"), 0.0);
        assert!(cx.has_label("State.Silenced"));
        assert!(!cx.has_label("State.Stunned"));
    }

    #[test]
    fn test_behavior_kind_from_ron() {
        let kind: BehaviorKind = ron::from_str("Standard(apply_activation_effect: true)").unwrap();
        assert_eq!(
            kind,
            BehaviorKind::Standard {
                apply_activation_effect: true
            }
        );
        let kind: BehaviorKind = ron::from_str("ChargeRelease").unwrap();
        assert_eq!(kind, BehaviorKind::ChargeRelease);
    }
}
