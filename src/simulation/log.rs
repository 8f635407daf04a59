//! Ability logging
//!
//! Records ability activity for display and post-run analysis.

use bevy::prelude::*;
use serde::Serialize;

use crate::component::AbilityNotificationKind;

/// A single entry in the ability log
#[derive(Debug, Clone, Serialize)]
pub struct AbilityLogEntry {
    /// Seconds since the simulation started
    pub timestamp: f32,
    pub event_type: AbilityLogEventType,
    /// Human-readable description of the event
    pub message: String,
}

impl AbilityLogEntry {
    /// `[   12.35] message`
    pub fn format_line(&self) -> String {
        format!("[{:>8.2}] {}", self.timestamp, self.message)
    }
}

/// Types of ability log events for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AbilityLogEventType {
    /// Input routed to an owner
    Input,
    /// Activation started, ticked a period or finished
    Activation,
    /// Activation cancelled
    Cancellation,
    /// Ability returned to waiting
    Finished,
    /// Attribute cost paid
    Cost,
    /// Cooldown started or ended
    Cooldown,
    /// Simulation event (start, end, etc.)
    Simulation,
}

impl From<AbilityNotificationKind> for AbilityLogEventType {
    fn from(kind: AbilityNotificationKind) -> Self {
        match kind {
            AbilityNotificationKind::ActivationStarted
            | AbilityNotificationKind::ActivationPeriod
            | AbilityNotificationKind::ActivationFinished => AbilityLogEventType::Activation,
            AbilityNotificationKind::ActivationCancelled => AbilityLogEventType::Cancellation,
            AbilityNotificationKind::AbilityFinished => AbilityLogEventType::Finished,
            AbilityNotificationKind::AttributeCostApplied => AbilityLogEventType::Cost,
            AbilityNotificationKind::CooldownStarted | AbilityNotificationKind::CooldownEnded => {
                AbilityLogEventType::Cooldown
            }
        }
    }
}

/// The ability log resource storing all events
#[derive(Resource, Default, Debug)]
pub struct AbilityLog {
    /// All log entries in chronological order
    pub entries: Vec<AbilityLogEntry>,
    /// Current simulation time
    pub match_time: f32,
}

impl AbilityLog {
    /// Clear the log for a new run
    pub fn clear(&mut self) {
        self.entries.clear();
        self.match_time = 0.0;
    }

    pub fn log(&mut self, event_type: AbilityLogEventType, message: String) {
        self.entries.push(AbilityLogEntry {
            timestamp: self.match_time,
            event_type,
            message,
        });
    }

    pub fn filter_by_type(&self, event_type: AbilityLogEventType) -> Vec<&AbilityLogEntry> {
        self.entries
            .iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }

    pub fn count_by_type(&self, event_type: AbilityLogEventType) -> usize {
        self.entries
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }

    /// Get the last N entries
    pub fn recent(&self, count: usize) -> Vec<&AbilityLogEntry> {
        self.entries.iter().rev().take(count).rev().collect()
    }

    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().map(AbilityLogEntry::format_line).collect()
    }
}
