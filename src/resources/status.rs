use std::fmt::Display;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Oldest conditions are dropped once the history grows past this length.
pub const MAX_CONDITION_HISTORY: usize = 16;

/// The observed state shared by every managed resource kind.
///
/// `at_provider` mirrors the last snapshot read from the remote system and is
/// only present while the resource is known to exist there.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManagedStatus<S> {
    /// History of conditions, oldest first. The latest entry of each type wins.
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Mirror of the remote object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_provider: Option<S>,

    /// Status of the latest `Ready` condition, kept for printer columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready: Option<ConditionStatus>,

    /// Status of the latest `Synced` condition, kept for printer columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced: Option<ConditionStatus>,
}

impl<S> Default for ManagedStatus<S> {
    fn default() -> Self {
        Self {
            conditions: Vec::new(),
            at_provider: None,
            ready: None,
            synced: None,
        }
    }
}

impl<S> ManagedStatus<S> {
    /// The most recent condition of the given type
    pub fn condition(&self, type_: ConditionType) -> Option<&Condition> {
        self.conditions.iter().rev().find(|c| c.type_ == type_)
    }

    /// Whether the latest `Ready` condition is `True`
    pub fn is_ready(&self) -> bool {
        self.condition(ConditionType::Ready)
            .is_some_and(|c| c.status == ConditionStatus::True)
    }

    /// Append a condition unless the latest one of the same type already says exactly the same thing.
    pub fn set_condition(&mut self, condition: Condition) {
        match condition.type_ {
            ConditionType::Ready => self.ready = Some(condition.status),
            ConditionType::Synced => self.synced = Some(condition.status),
        }

        if self
            .condition(condition.type_)
            .is_some_and(|c| {
                c.status == condition.status
                    && c.reason == condition.reason
                    && c.message == condition.message
            })
        {
            return;
        }

        self.conditions.push(condition);
        if self.conditions.len() > MAX_CONDITION_HISTORY {
            let excess = self.conditions.len() - MAX_CONDITION_HISTORY;
            self.conditions.drain(..excess);
        }
    }
}

/// A single observation about a resource
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: ConditionType,
    pub status: ConditionStatus,
    pub reason: Reason,
    pub last_transition_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq)]
pub enum ConditionType {
    /// Whether the remote object exists and matches the declaration.
    Ready,

    /// Whether the last reconciliation attempt succeeded.
    Synced,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, PartialEq, Eq)]
pub enum Reason {
    Creating,
    Available,
    Deleting,
    ReconcileSuccess,
    ReconcileError,
}

impl Condition {
    fn new(type_: ConditionType, status: ConditionStatus, reason: Reason) -> Self {
        Self {
            type_,
            status,
            reason,
            last_transition_time: Utc::now(),
            message: None,
        }
    }

    /// The remote object was just created or adopted and is not confirmed yet.
    pub fn creating() -> Self {
        Self::new(ConditionType::Ready, ConditionStatus::False, Reason::Creating)
    }

    /// The remote object exists and matches the declaration.
    pub fn available() -> Self {
        Self::new(ConditionType::Ready, ConditionStatus::True, Reason::Available)
    }

    /// The remote object is being removed.
    pub fn deleting() -> Self {
        Self::new(ConditionType::Ready, ConditionStatus::False, Reason::Deleting)
    }

    pub fn reconcile_success() -> Self {
        Self::new(
            ConditionType::Synced,
            ConditionStatus::True,
            Reason::ReconcileSuccess,
        )
    }

    pub fn reconcile_error(error: impl Display) -> Self {
        Self {
            message: Some(error.to_string()),
            ..Self::new(
                ConditionType::Synced,
                ConditionStatus::False,
                Reason::ReconcileError,
            )
        }
    }
}
