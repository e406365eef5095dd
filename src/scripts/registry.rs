//! Script registry.
//!
//! Scripts are engine plugins that each claim a contiguous slot range in the
//! shared positional argument frame. Ranges are assigned once at startup, in
//! registration order, starting right after the selector slot:
//!
//! ```text
//! slot:   0        1   2   3    4   5      6
//!       ┌────────┬───────────┬─────────┬───────┐
//!       │selector│ script #1 │script #2│  #3   │
//!       └────────┴───────────┴─────────┴───────┘
//! ```
//!
//! Index 0 is the "no script" sentinel; registered scripts are numbered from 1.

use std::ops::Range;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::frame::{ArgumentFrame, ScriptArgs};
use crate::error::ScriptError;

/// Registry index meaning "no script selected".
pub const NO_SCRIPT_INDEX: usize = 0;

/// Entry point a script registry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptKind {
    Txt2Img,
    Img2Img,
}

impl ScriptKind {
    pub fn name(&self) -> &'static str {
        match self {
            ScriptKind::Txt2Img => "txt2img",
            ScriptKind::Img2Img => "img2img",
        }
    }
}

/// A declared script argument with its default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptArgSpec {
    pub label: String,
    pub default: Value,
}

/// A script as reported by the engine, before slots are assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptSpec {
    pub name: String,
    #[serde(default)]
    pub args: Vec<ScriptArgSpec>,
}

impl ScriptSpec {
    pub fn new(name: impl Into<String>, args: Vec<ScriptArgSpec>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }
}

// =============================================================================
// Script Descriptor
// =============================================================================

/// A registered script and the frame slots it owns.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptDescriptor {
    pub name: String,
    pub registry_index: usize,
    pub arg_slot_start: usize,
    pub arg_slot_end: usize,
    pub default_args: Vec<Value>,
    pub arg_labels: Vec<String>,
}

impl ScriptDescriptor {
    /// Number of slots this script owns.
    pub fn slot_count(&self) -> usize {
        self.arg_slot_end - self.arg_slot_start
    }

    /// Half-open slot range inside the frame.
    pub fn slots(&self) -> Range<usize> {
        self.arg_slot_start..self.arg_slot_end
    }

    fn to_spec(&self) -> ScriptSpec {
        ScriptSpec {
            name: self.name.clone(),
            args: self
                .arg_labels
                .iter()
                .zip(&self.default_args)
                .map(|(label, default)| ScriptArgSpec {
                    label: label.clone(),
                    default: default.clone(),
                })
                .collect(),
        }
    }
}

/// Result of a registry lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScriptSelection<'a> {
    /// Registry index placed in frame slot 0
    pub index: usize,

    /// Selected descriptor, `None` for the sentinel
    pub descriptor: Option<&'a ScriptDescriptor>,
}

impl ScriptSelection<'_> {
    /// The "no script" selection.
    pub fn none() -> Self {
        Self {
            index: NO_SCRIPT_INDEX,
            descriptor: None,
        }
    }

    /// Whether a real script is selected.
    pub fn is_script(&self) -> bool {
        self.descriptor.is_some()
    }

    /// Selected script name, empty for the sentinel.
    pub fn name(&self) -> &str {
        self.descriptor.map(|d| d.name.as_str()).unwrap_or("")
    }
}

// =============================================================================
// Script Registry
// =============================================================================

/// Immutable slot layout for one entry point.
#[derive(Debug, Clone)]
pub struct ScriptRegistry {
    kind: ScriptKind,
    descriptors: Vec<ScriptDescriptor>,
    frame_len: usize,
}

impl ScriptRegistry {
    /// Assign slot ranges to `specs` in the order given.
    pub fn build(kind: ScriptKind, specs: impl IntoIterator<Item = ScriptSpec>) -> Self {
        let mut descriptors = Vec::new();
        let mut next_slot = 1;

        for (i, spec) in specs.into_iter().enumerate() {
            let start = next_slot;
            let end = start + spec.args.len();
            let (arg_labels, default_args): (Vec<String>, Vec<Value>) = spec
                .args
                .into_iter()
                .map(|arg| (arg.label, arg.default))
                .unzip();

            descriptors.push(ScriptDescriptor {
                name: spec.name,
                registry_index: i + 1,
                arg_slot_start: start,
                arg_slot_end: end,
                default_args,
                arg_labels,
            });
            next_slot = end;
        }

        Self {
            kind,
            descriptors,
            frame_len: next_slot,
        }
    }

    /// A registry with no scripts; frames hold only the selector slot.
    pub fn empty(kind: ScriptKind) -> Self {
        Self::build(kind, Vec::new())
    }

    pub fn kind(&self) -> ScriptKind {
        self.kind
    }

    pub fn descriptors(&self) -> &[ScriptDescriptor] {
        &self.descriptors
    }

    /// Total frame length, selector slot included.
    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Find a script by name. An empty name selects no script.
    pub fn lookup(&self, name: &str) -> Result<ScriptSelection<'_>, ScriptError> {
        if name.is_empty() {
            return Ok(ScriptSelection::none());
        }
        self.descriptors
            .iter()
            .find(|d| d.name == name)
            .map(|d| ScriptSelection {
                index: d.registry_index,
                descriptor: Some(d),
            })
            .ok_or_else(|| ScriptError::NotFound {
                name: name.to_string(),
            })
    }

    /// Build a fresh frame for `selection`.
    ///
    /// Every slot outside the selected range holds its owner's default. The
    /// selected range is filled from `args`, which must match the declared
    /// argument count (or labels, for named args). With no script selected,
    /// `args` is ignored.
    pub fn marshal(
        &self,
        selection: &ScriptSelection<'_>,
        args: &ScriptArgs,
    ) -> Result<ArgumentFrame, ScriptError> {
        let mut slots = Vec::with_capacity(self.frame_len);
        slots.push(Value::from(selection.index));
        for descriptor in &self.descriptors {
            slots.extend(descriptor.default_args.iter().cloned());
        }

        if let Some(descriptor) = selection.descriptor {
            let values = args.ordered_for(descriptor)?;
            for (slot, value) in descriptor.slots().zip(values) {
                slots[slot] = value;
            }
        }

        Ok(ArgumentFrame::from_slots(slots))
    }

    /// Script names and labelled defaults, in registration order.
    pub fn metadata(&self) -> Vec<ScriptSpec> {
        self.descriptors.iter().map(|d| d.to_spec()).collect()
    }
}

/// Independent registries for the two script-capable entry points.
#[derive(Debug, Clone)]
pub struct ScriptRegistries {
    pub txt2img: ScriptRegistry,
    pub img2img: ScriptRegistry,
}

impl ScriptRegistries {
    pub fn new(txt2img: ScriptRegistry, img2img: ScriptRegistry) -> Self {
        Self { txt2img, img2img }
    }

    pub fn empty() -> Self {
        Self::new(
            ScriptRegistry::empty(ScriptKind::Txt2Img),
            ScriptRegistry::empty(ScriptKind::Img2Img),
        )
    }

    pub fn get(&self, kind: ScriptKind) -> &ScriptRegistry {
        match kind {
            ScriptKind::Txt2Img => &self.txt2img,
            ScriptKind::Img2Img => &self.img2img,
        }
    }

    pub fn lookup(&self, name: &str, kind: ScriptKind) -> Result<ScriptSelection<'_>, ScriptError> {
        self.get(kind).lookup(name)
    }
}

// =============================================================================
// Tests
// =============================================================================
