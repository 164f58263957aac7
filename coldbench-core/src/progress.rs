// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Concurrent progress board for a benchmark run.
//!
//! Uses DashMap for lock-free concurrent access: every task updates only its
//! own entry. Completion counts are published on a watch channel so callers
//! can follow `completed / total` without polling the board.

use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::state::TaskPhase;
use crate::types::{DeploymentId, VariantName};
use crate::variant::FunctionVariant;

/// Snapshot of run progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Progress {
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
}

impl Progress {
    pub fn is_finished(&self) -> bool {
        self.completed == self.total
    }
}

impl std::fmt::Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} complete ({} failed)", self.completed, self.total, self.failed)
    }
}

#[derive(Debug, Clone)]
struct Entry {
    phase: TaskPhase,
    deployment: Option<DeploymentId>,
}

/// Tracks the phase and live deployment of every variant in a run.
#[derive(Debug)]
pub struct ProgressTracker {
    entries: DashMap<VariantName, Entry>,
    total: usize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    tx: watch::Sender<Progress>,
}

impl ProgressTracker {
    pub fn new(variants: &[FunctionVariant]) -> Self {
        let entries = DashMap::with_capacity(variants.len());
        for variant in variants {
            entries.insert(
                variant.name.clone(),
                Entry {
                    phase: TaskPhase::Queued,
                    deployment: None,
                },
            );
        }

        let total = variants.len();
        let (tx, _rx) = watch::channel(Progress {
            completed: 0,
            failed: 0,
            total,
        });

        Self {
            entries,
            total,
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            tx,
        }
    }

    /// Receive a new snapshot every time a task reaches a terminal phase.
    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> Progress {
        Progress {
            completed: self.completed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            total: self.total,
        }
    }

    pub fn phase_of(&self, name: &VariantName) -> Option<TaskPhase> {
        self.entries.get(name).map(|e| e.phase)
    }

    /// Move a variant to a non-terminal phase.
    pub fn set_phase(&self, name: &VariantName, phase: TaskPhase) {
        if let Some(mut entry) = self.entries.get_mut(name) {
            if !entry.phase.is_terminal() {
                entry.phase = phase;
            }
        }
    }

    /// Remember the identifier of a live deployment.
    pub fn record_deployment(&self, name: &VariantName, id: DeploymentId) {
        if let Some(mut entry) = self.entries.get_mut(name) {
            entry.deployment = Some(id);
        }
    }

    /// Forget the deployment once it has been deleted.
    pub fn clear_deployment(&self, name: &VariantName) {
        if let Some(mut entry) = self.entries.get_mut(name) {
            entry.deployment = None;
        }
    }

    /// Deployment still alive for a variant, if any.
    pub fn deployment_of(&self, name: &VariantName) -> Option<DeploymentId> {
        self.entries.get(name).and_then(|e| e.deployment.clone())
    }

    /// Deployments not yet cleaned up.
    pub fn live_deployments(&self) -> Vec<(VariantName, DeploymentId)> {
        self.entries
            .iter()
            .filter_map(|e| e.deployment.clone().map(|id| (e.key().clone(), id)))
            .collect()
    }

    /// Mark a variant terminal. Counted once; later calls are ignored.
    pub fn complete(&self, name: &VariantName, phase: TaskPhase) {
        let newly_terminal = match self.entries.get_mut(name) {
            Some(mut entry) if !entry.phase.is_terminal() => {
                entry.phase = phase;
                true
            }
            _ => false,
        };

        if !newly_terminal {
            return;
        }

        self.completed.fetch_add(1, Ordering::SeqCst);
        if phase == TaskPhase::Failed {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }

        let snapshot = self.snapshot();
        tracing::info!(variant = %name, phase = %phase, progress = %snapshot, "Task finished");
        self.tx.send_replace(snapshot);
    }
}
