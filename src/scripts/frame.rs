//! Positional argument frame and request-side script arguments.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::registry::ScriptDescriptor;
use crate::error::ScriptError;

// =============================================================================
// Script Arguments
// =============================================================================

/// Script arguments as supplied by the caller.
///
/// Either a list in the script's declared order, or an object keyed by
/// argument label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptArgs {
    Positional(Vec<Value>),
    Named(Map<String, Value>),
}

impl Default for ScriptArgs {
    fn default() -> Self {
        ScriptArgs::Positional(Vec::new())
    }
}

impl ScriptArgs {
    /// Number of supplied arguments.
    pub fn len(&self) -> usize {
        match self {
            ScriptArgs::Positional(values) => values.len(),
            ScriptArgs::Named(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values in the descriptor's declared order.
    pub(crate) fn ordered_for(
        &self,
        descriptor: &ScriptDescriptor,
    ) -> Result<Vec<Value>, ScriptError> {
        let expected = descriptor.slot_count();
        let arity_mismatch = || ScriptError::ArityMismatch {
            script: descriptor.name.clone(),
            expected,
            actual: self.len(),
        };

        match self {
            ScriptArgs::Positional(values) => {
                if values.len() != expected {
                    return Err(arity_mismatch());
                }
                Ok(values.clone())
            }
            ScriptArgs::Named(map) => {
                if let Some(label) = map.keys().find(|k| !descriptor.arg_labels.contains(*k)) {
                    return Err(ScriptError::UnknownArgument {
                        script: descriptor.name.clone(),
                        label: label.clone(),
                    });
                }
                if map.len() != expected {
                    return Err(arity_mismatch());
                }
                Ok(descriptor
                    .arg_labels
                    .iter()
                    .filter_map(|label| map.get(label).cloned())
                    .collect())
            }
        }
    }
}

// =============================================================================
// Argument Frame
// =============================================================================

/// The flat positional parameter list passed to the engine.
///
/// Slot 0 holds the selected script's registry index; the rest is laid out by
/// the [`ScriptRegistry`](super::ScriptRegistry) that built it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ArgumentFrame(Vec<Value>);

impl ArgumentFrame {
    pub(crate) fn from_slots(slots: Vec<Value>) -> Self {
        Self(slots)
    }

    /// Registry index in slot 0.
    pub fn selected_index(&self) -> usize {
        self.0
            .first()
            .and_then(Value::as_u64)
            .map(|i| i as usize)
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, slot: usize) -> Option<&Value> {
        self.0.get(slot)
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }

    /// The slots owned by `descriptor`.
    pub fn slots(&self, descriptor: &ScriptDescriptor) -> &[Value] {
        &self.0[descriptor.slots()]
    }

    pub fn into_vec(self) -> Vec<Value> {
        self.0
    }
}
