//! Script registry and positional argument marshalling.
//!
//! The generation engine is addressed purely by position, and its scripts are
//! discovered at startup. This module is the one place that knows the slot
//! layout: a [`ScriptRegistry`] per entry point assigns each script a
//! contiguous range, and [`ScriptRegistry::marshal`] turns a request's
//! script selection and arguments into a complete [`ArgumentFrame`].
//!
//! # Example
//!
//! ```
//! use sd_bridge::scripts::{ScriptArgs, ScriptArgSpec, ScriptKind, ScriptRegistry, ScriptSpec};
//! use serde_json::json;
//!
//! let registry = ScriptRegistry::build(
//!     ScriptKind::Txt2Img,
//!     vec![ScriptSpec::new(
//!         "Loopback",
//!         vec![ScriptArgSpec { label: "loops".into(), default: json!(4) }],
//!     )],
//! );
//!
//! let selection = registry.lookup("Loopback").unwrap();
//! let frame = registry
//!     .marshal(&selection, &ScriptArgs::Positional(vec![json!(8)]))
//!     .unwrap();
//!
//! assert_eq!(frame.as_slice(), &[json!(1), json!(8)]);
//! ```

mod frame;
mod registry;

pub use frame::{ArgumentFrame, ScriptArgs};
pub use registry::{
    ScriptArgSpec, ScriptDescriptor, ScriptKind, ScriptRegistries, ScriptRegistry,
    ScriptSelection, ScriptSpec, NO_SCRIPT_INDEX,
};
