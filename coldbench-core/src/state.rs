// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Variant lifecycle state machine and benchmark task phases.
//!
//! Lifecycle: Pending → Deployed → Ready → Measuring → Deleted, with Failed
//! reachable from any pre-measurement state. Invalid transitions result in
//! StateTransitionError. Deleted is terminal and can be entered only once.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::StateTransitionError;
use crate::types::VariantName;

/// Remote lifecycle states of a function variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariantState {
    /// Described but not yet deployed.
    Pending,

    /// Deployment accepted by the provider.
    Deployed,

    /// Provider reports the function reachable.
    Ready,

    /// Invocations in flight.
    Measuring,

    /// Remote resources removed.
    Deleted,

    /// Deployment or readiness failed.
    Failed,
}

impl VariantState {
    /// Get the state name for error messages.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Deployed => "Deployed",
            Self::Ready => "Ready",
            Self::Measuring => "Measuring",
            Self::Deleted => "Deleted",
            Self::Failed => "Failed",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Deleted)
    }

    /// Check if transition to the target state is valid.
    pub fn can_transition_to(&self, target: VariantState) -> bool {
        matches!(
            (self, target),
            // From Pending
            (Self::Pending, Self::Deployed) |
            (Self::Pending, Self::Failed) |
            // From Deployed
            (Self::Deployed, Self::Ready) |
            (Self::Deployed, Self::Failed) |
            (Self::Deployed, Self::Deleted) |
            // From Ready
            (Self::Ready, Self::Measuring) |
            (Self::Ready, Self::Deleted) |
            // From Measuring
            (Self::Measuring, Self::Deleted) |
            // From Failed
            (Self::Failed, Self::Deleted)
        )
    }
}

impl std::fmt::Display for VariantState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// State machine for a variant's remote lifecycle.
/// Enforces valid transitions and remembers whether the variant was ever deployed.
#[derive(Debug)]
pub struct VariantLifecycle {
    variant: VariantName,
    current_state: VariantState,
    last_transition: Instant,
    transition_count: u64,
    was_deployed: bool,
}

impl VariantLifecycle {
    pub fn new(variant: VariantName) -> Self {
        Self {
            variant,
            current_state: VariantState::Pending,
            last_transition: Instant::now(),
            transition_count: 0,
            was_deployed: false,
        }
    }

    pub fn state(&self) -> VariantState {
        self.current_state
    }

    pub fn variant(&self) -> &VariantName {
        &self.variant
    }

    pub fn time_in_current_state(&self) -> std::time::Duration {
        self.last_transition.elapsed()
    }

    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    /// Whether the variant ever reached Deployed.
    pub fn was_deployed(&self) -> bool {
        self.was_deployed
    }

    /// Attempt to transition to a new state.
    pub fn transition_to(&mut self, target: VariantState) -> Result<(), StateTransitionError> {
        if self.current_state.is_terminal() {
            return Err(StateTransitionError::TerminalState {
                variant: self.variant.clone(),
                state: self.current_state.name(),
            });
        }

        if !self.current_state.can_transition_to(target) {
            return Err(StateTransitionError::InvalidTransition {
                variant: self.variant.clone(),
                from: self.current_state.name(),
                to: target.name(),
            });
        }

        tracing::debug!(
            variant = %self.variant,
            from = self.current_state.name(),
            to = target.name(),
            "Lifecycle transition"
        );

        if target == VariantState::Deployed {
            self.was_deployed = true;
        }
        self.current_state = target;
        self.last_transition = Instant::now();
        self.transition_count += 1;

        Ok(())
    }
}

/// Phases of a benchmark task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    /// Waiting for a worker slot.
    Queued,
    Deploying,
    WaitingCold,
    MeasuringCold,
    MeasuringWarm,
    CleaningUp,
    Done,
    Failed,
}

impl TaskPhase {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Deploying => "deploying",
            Self::WaitingCold => "waiting_cold",
            Self::MeasuringCold => "measuring_cold",
            Self::MeasuringWarm => "measuring_warm",
            Self::CleaningUp => "cleaning_up",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl std::fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
