//! Replication manifest
//!
//! The fields of an ability that are sent to remote peers, and under which
//! policy. Activation state is deliberately absent: peers infer it from the
//! effects and labels they receive.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicationPolicy {
    /// Sent to every peer on every change
    Always,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ReplicatedField {
    pub name: &'static str,
    pub policy: ReplicationPolicy,
}

pub const ABILITY_REPLICATION_MANIFEST: &[ReplicatedField] = &[
    ReplicatedField {
        name: "owner",
        policy: ReplicationPolicy::Always,
    },
    ReplicatedField {
        name: "avatar",
        policy: ReplicationPolicy::Always,
    },
    ReplicatedField {
        name: "player_controller",
        policy: ReplicationPolicy::Always,
    },
    ReplicatedField {
        name: "ai_controller",
        policy: ReplicationPolicy::Always,
    },
];

/// Wire snapshot of the replicated fields. Entities are sent as their bits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityReplication {
    pub owner: Option<u64>,
    pub avatar: Option<u64>,
    pub player_controller: Option<u64>,
    pub ai_controller: Option<u64>,
}
