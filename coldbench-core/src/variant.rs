// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Function variant descriptors.
//!
//! A variant is one deployable copy of a sample function: its identity
//! (name, generation, runtime, agent flag) plus the deployment descriptor
//! handed to the provider.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Generation, RuntimeVersion, SourceBundle, VariantName};

/// Which side of the comparison a variant belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantRole {
    /// Runtime agent disabled.
    Control,
    /// Runtime agent enabled.
    Treatment,
}

impl fmt::Display for VariantRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Control => write!(f, "control"),
            Self::Treatment => write!(f, "treatment"),
        }
    }
}

/// A deployable function variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionVariant {
    pub name: VariantName,
    pub generation: Generation,
    pub runtime: RuntimeVersion,
    pub agent_enabled: bool,
    pub entry_point: String,
    pub source: SourceBundle,
    pub environment: BTreeMap<String, String>,
}

impl FunctionVariant {
    pub fn role(&self) -> VariantRole {
        if self.agent_enabled {
            VariantRole::Treatment
        } else {
            VariantRole::Control
        }
    }

    /// Environment rendered as `K=V,K=V` in key order.
    pub fn env_vars_arg(&self) -> String {
        self.environment
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",")
    }
}
