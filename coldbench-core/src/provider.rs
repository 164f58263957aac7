// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! External collaborator interfaces.
//!
//! The engine never talks to a hosting platform directly. Deployment goes
//! through a [`DeploymentProvider`] and invocation through an
//! [`InvocationClient`]; the CLI supplies gcloud- and HTTP-backed
//! implementations, tests supply in-memory fakes.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{DeleteError, DeployError, InvocationError, ReadinessError};
use crate::types::DeploymentId;
use crate::variant::FunctionVariant;

/// A successfully deployed function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: DeploymentId,
    pub url: String,
}

/// Readiness as reported by the provider, without invoking the function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadyState {
    Ready,
    NotReadyYet,
    NotFound,
}

/// Response to a single invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationResponse {
    pub status: u16,
    pub elapsed: Duration,
    pub body: String,
    /// Explicit instance-reuse signal, when the function exposes one.
    pub instance_reused: Option<bool>,
}

impl InvocationResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Deploys, describes and deletes function variants.
#[async_trait]
pub trait DeploymentProvider: Send + Sync {
    async fn deploy(&self, variant: &FunctionVariant) -> Result<Deployment, DeployError>;

    /// Deleting an already-absent resource is not an error.
    async fn delete(&self, id: &DeploymentId) -> Result<(), DeleteError>;

    async fn describe(&self, id: &DeploymentId) -> Result<ReadyState, ReadinessError>;

    /// Identifier the variant is (or would be) deployed under. Used to clean
    /// up partial resources after a failed or interrupted deployment.
    fn identifier_for(&self, variant: &FunctionVariant) -> DeploymentId {
        DeploymentId::new(variant.name.as_str())
    }
}

/// Sends a payload to a deployed function.
#[async_trait]
pub trait InvocationClient: Send + Sync {
    async fn invoke(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> Result<InvocationResponse, InvocationError>;
}
