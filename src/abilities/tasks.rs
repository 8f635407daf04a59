//! Ability tasks
//!
//! Cooperative sub-tasks spawned by an ability (wait for a target, wait for
//! input, play a channel...). The scheduler owns the tasks; the ability only
//! keeps weak references to the ones currently active, updated through the
//! [`TaskOwner`] notifications.

use bevy::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};

use crate::labels::Label;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TaskId(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskStatus {
    AwaitingActivation,
    Active,
    Paused,
    Finished,
}

/// A unit of cooperative work owned by exactly one ability.
#[derive(Debug)]
pub struct AbilityTask {
    id: TaskId,
    name: String,
    status: Mutex<TaskStatus>,
    /// Set by the owning ability when the task is initialized
    ability: OnceLock<Label>,
}

impl AbilityTask {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> TaskStatus {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ability that initialized the task, if any did.
    pub fn ability(&self) -> Option<Label> {
        self.ability.get().copied()
    }

    /// Bind the task to its ability. Only the first call has any effect.
    pub fn bind_ability(&self, ability: Label) {
        let _ = self.ability.set(ability);
    }

    fn set_status(&self, status: TaskStatus) {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = status;
    }
}

/// Capability of owning ability tasks.
pub trait TaskOwner {
    /// The task was created on behalf of this owner.
    fn on_task_initialized(&mut self, _task: &AbilityTask) {}

    /// Called when a task starts and when it resumes.
    fn on_task_activated(&mut self, task: &Arc<AbilityTask>);

    /// Called when a task finishes and when it pauses.
    fn on_task_deactivated(&mut self, task: &Arc<AbilityTask>);

    /// Entity the task acts on behalf of
    fn task_owner(&self) -> Option<Entity>;

    /// Entity physically performing the task
    fn task_avatar(&self) -> Option<Entity>;

    /// Entity holding the ability component that manages the task
    fn task_manager(&self) -> Option<Entity>;
}

/// Weak references to an owner's currently active tasks.
#[derive(Debug, Default)]
pub struct TaskSet {
    tasks: HashMap<TaskId, Weak<AbilityTask>>,
}

impl TaskSet {
    pub fn insert(&mut self, task: &Arc<AbilityTask>) {
        self.tasks.insert(task.id(), Arc::downgrade(task));
    }

    pub fn remove(&mut self, task: &AbilityTask) -> bool {
        self.tasks.remove(&task.id()).is_some()
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.tasks.contains_key(&id)
    }

    /// Number of tracked tasks, including ones the scheduler already dropped.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tracked tasks that are still alive.
    pub fn live(&self) -> Vec<Arc<AbilityTask>> {
        let mut live: Vec<_> = self.tasks.values().filter_map(Weak::upgrade).collect();
        live.sort_by_key(|task| task.id());
        live
    }
}

/// Minimal scheduler: creates tasks and moves them through their lifecycle,
/// notifying the owner at each step.
#[derive(Debug, Default)]
pub struct TaskScheduler {
    next_id: u64,
    tasks: Vec<Arc<AbilityTask>>,
}

impl TaskScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_task(&mut self, owner: &mut dyn TaskOwner, name: &str) -> Arc<AbilityTask> {
        self.next_id += 1;
        let task = Arc::new(AbilityTask {
            id: TaskId(self.next_id),
            name: name.to_string(),
            status: Mutex::new(TaskStatus::AwaitingActivation),
            ability: OnceLock::new(),
        });
        owner.on_task_initialized(&task);
        self.tasks.push(task.clone());
        task
    }

    pub fn activate(&mut self, owner: &mut dyn TaskOwner, task: &Arc<AbilityTask>) {
        if task.status() == TaskStatus::Finished {
            return;
        }
        task.set_status(TaskStatus::Active);
        owner.on_task_activated(task);
    }

    pub fn pause(&mut self, owner: &mut dyn TaskOwner, task: &Arc<AbilityTask>) {
        if task.status() != TaskStatus::Active {
            return;
        }
        task.set_status(TaskStatus::Paused);
        owner.on_task_deactivated(task);
    }

    pub fn resume(&mut self, owner: &mut dyn TaskOwner, task: &Arc<AbilityTask>) {
        if task.status() != TaskStatus::Paused {
            return;
        }
        task.set_status(TaskStatus::Active);
        owner.on_task_activated(task);
    }

    /// Finish the task and drop the scheduler's strong reference to it.
    pub fn finish(&mut self, owner: &mut dyn TaskOwner, task: &Arc<AbilityTask>) {
        if task.status() == TaskStatus::Finished {
            return;
        }
        let was_active = task.status() == TaskStatus::Active;
        task.set_status(TaskStatus::Finished);
        if was_active {
            owner.on_task_deactivated(task);
        }
        self.tasks.retain(|t| t.id() != task.id());
    }

    pub fn tasks_for(&self, ability: Label) -> Vec<Arc<AbilityTask>> {
        self.tasks
            .iter()
            .filter(|t| t.ability() == Some(ability))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
