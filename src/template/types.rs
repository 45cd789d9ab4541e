// Core types for data-defined state machine templates

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single lifecycle state. Metadata is advisory: the engine never
/// enforces `final` or `initial`, they exist for authoring tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FsmState {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<StateMetadata>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StateMetadata {
    #[serde(default)]
    pub initial: bool,
    #[serde(default, rename = "final")]
    pub is_final: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One edge of the machine. `(from, on)` is not unique: several edges
/// may share the pair and compete on guards, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FsmTransition {
    pub id: String,
    pub from: String,
    pub to: String,
    pub on: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guard: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
}

impl FsmTransition {
    pub fn is_self_transition(&self) -> bool {
        self.from == self.to
    }
}

/// A fully merged machine definition. Transition order is declaration
/// order and is semantically meaningful (guard tie-breaking).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FsmDefinition {
    pub states: HashMap<String, FsmState>,
    pub transitions: Vec<FsmTransition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl FsmDefinition {
    /// The conventional initial state, if the author tagged one.
    pub fn initial_state(&self) -> Option<&str> {
        self.states
            .iter()
            .find(|(_, s)| s.metadata.as_ref().is_some_and(|m| m.initial))
            .map(|(key, _)| key.as_str())
    }

    /// Checks the structural invariant: every transition endpoint must
    /// be a declared state. Returns the first violating reference.
    pub fn dangling_endpoint(&self) -> Option<(&str, &str)> {
        for t in &self.transitions {
            if !self.states.contains_key(&t.from) {
                return Some((t.id.as_str(), t.from.as_str()));
            }
            if !self.states.contains_key(&t.to) {
                return Some((t.id.as_str(), t.to.as_str()));
            }
        }
        None
    }
}

/// A stored template record. Definitions may be partial: resolution
/// merges the parent chain into one complete `FsmDefinition`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FsmTemplate {
    pub id: String,
    pub type_key: String,
    pub scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub definition: FsmDefinition,
}
