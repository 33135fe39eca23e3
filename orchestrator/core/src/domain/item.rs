// Copyright (c) 2026 Northlake Labs
// SPDX-License-Identifier: Apache-2.0

//! Item Domain Model
//!
//! Logical deployable units inside a workspace: notebooks, data pipelines,
//! user data functions, connection definitions. Items are matched across
//! stages by `(name, type)` only; remote ids are stage-local and never
//! portable.
//!
//! Parameter placeholders use the form `{{param:NAME}}` inside payload
//! strings and are substituted from a stage-specific override map at import
//! time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ============================================================================
// Value Objects
// ============================================================================

/// Kind of a deployable item.
///
/// Unknown remote kinds round-trip through `Other` so new item types flow
/// through promotion without a code change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemType {
    Notebook,
    DataPipeline,
    UserDataFunction,
    Connection,
    #[serde(untagged)]
    Other(String),
}

impl ItemType {
    pub fn as_str(&self) -> &str {
        match self {
            ItemType::Notebook => "notebook",
            ItemType::DataPipeline => "dataPipeline",
            ItemType::UserDataFunction => "userDataFunction",
            ItemType::Connection => "connection",
            ItemType::Other(s) => s.as_str(),
        }
    }
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ItemType {
    fn from(s: &str) -> Self {
        match s {
            "notebook" => ItemType::Notebook,
            "dataPipeline" => ItemType::DataPipeline,
            "userDataFunction" => ItemType::UserDataFunction,
            "connection" => ItemType::Connection,
            other => ItemType::Other(other.to_string()),
        }
    }
}

/// Portable identity of an item: unique within a workspace per `(name, type)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    pub name: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
}

impl ItemKey {
    pub fn new(name: impl Into<String>, item_type: ItemType) -> Self {
        Self {
            name: name.into(),
            item_type,
        }
    }
}

impl std::fmt::Display for ItemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.item_type, self.name)
    }
}

/// Declaration of a logical parameter an item's payload references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterBinding {
    pub name: String,
    /// Source-embedded default. Loses to any stage override.
    pub default: Option<String>,
    #[serde(default)]
    pub required: bool,
}

// ============================================================================
// Entity: ItemDefinition
// ============================================================================

/// A fully materialized item definition, portable between stages once its
/// parameters are rebound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDefinition {
    pub key: ItemKey,
    /// Opaque structured content. The engine only rewrites placeholder
    /// strings inside it, never its structure.
    pub payload: serde_json::Value,
    #[serde(default)]
    pub parameters: Vec<ParameterBinding>,
}

impl ItemDefinition {
    pub fn new(key: ItemKey, payload: serde_json::Value) -> Self {
        Self {
            key,
            payload,
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, binding: ParameterBinding) -> Self {
        self.parameters.push(binding);
        self
    }

    /// Substitute every `{{param:NAME}}` placeholder in the payload using
    /// `overrides`, falling back to the parameter's embedded default.
    ///
    /// Fails with [`ItemFailure::MissingParameterBinding`] when a required
    /// parameter has neither an override nor a default. The failure is scoped
    /// to this item; callers continue with the next one.
    pub fn bind_parameters(
        &self,
        overrides: &BTreeMap<String, String>,
    ) -> Result<ItemDefinition, ItemFailure> {
        let mut values: BTreeMap<&str, &str> = BTreeMap::new();
        for param in &self.parameters {
            match overrides.get(&param.name).map(String::as_str) {
                Some(v) => {
                    values.insert(param.name.as_str(), v);
                }
                None => match param.default.as_deref() {
                    Some(d) => {
                        values.insert(param.name.as_str(), d);
                    }
                    None if param.required => {
                        return Err(ItemFailure::MissingParameterBinding {
                            parameter: param.name.clone(),
                        });
                    }
                    None => {}
                },
            }
        }

        let payload = substitute_value(&self.payload, &values);
        Ok(ItemDefinition {
            key: self.key.clone(),
            payload,
            parameters: self.parameters.clone(),
        })
    }
}

fn substitute_value(value: &serde_json::Value, values: &BTreeMap<&str, &str>) -> serde_json::Value {
    match value {
        serde_json::Value::String(s) => serde_json::Value::String(substitute_str(s, values)),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(|v| substitute_value(v, values)).collect())
        }
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute_value(v, values)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn substitute_str(input: &str, values: &BTreeMap<&str, &str>) -> String {
    let mut out = input.to_string();
    for (name, value) in values {
        let placeholder = format!("{{{{param:{name}}}}}");
        if out.contains(&placeholder) {
            out = out.replace(&placeholder, value);
        }
    }
    out
}

// ============================================================================
// Per-item failures
// ============================================================================

/// A fault scoped to a single item. Collected into run reports; never fatal
/// to the surrounding run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ItemFailure {
    #[error("required parameter '{parameter}' has no binding")]
    MissingParameterBinding { parameter: String },

    #[error("remote rejected the write (HTTP {status}): {message}")]
    RemoteRejected { status: u16, message: String },

    #[error("failed to read item definition: {reason}")]
    ReadFailed { reason: String },

    #[error("item not observed at target after import")]
    VerifyMismatch,
}
