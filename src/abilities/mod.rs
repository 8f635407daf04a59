//! Abilities
//!
//! - `instance`: the activation state machine and its queries
//! - `behavior`: overridable hooks and the commands they queue
//! - `config`: RON ability definitions
//! - `tasks`: cooperative tasks an ability spawns
//! - `replication`: fields sent to remote peers

pub mod behavior;
pub mod config;
pub mod instance;
pub mod replication;
pub mod tasks;

pub use behavior::{
    AbilityBehavior, AbilityCommand, AbilityCommands, BehaviorKind, ChargeReleaseBehavior,
    HookContext, CHARGE_TASK, ManualBehavior, StandardBehavior,
};
pub use config::{
    load_ability_definitions, load_ability_definitions_from, parse_ability_definitions,
    AbilitiesConfig, AbilityConfig, AbilityConfigPlugin, AbilityDefinitions,
    DEFAULT_ABILITIES_PATH,
};
pub use instance::{AbilityDelegates, AbilityInstance, AbilityState};
pub use replication::{AbilityReplication, ReplicatedField, ReplicationPolicy};
pub use tasks::{AbilityTask, TaskId, TaskOwner, TaskScheduler, TaskSet, TaskStatus};
