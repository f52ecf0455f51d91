//! Sluice Config
//!
//! This crate contains the serializable recipe types for sluice. A recipe is
//! the declarative pipeline document as it is stored and exchanged: a map of
//! components keyed by ID, plus the `variable`, `secret` and `output` sections
//! that describe the trigger-time request and response.
//!
//! These types are loaded as-is and carry no validation. The workflow crate
//! resolves them into a typed component model and builds the dependency graph.
//!
//! # Example
//!
//! ```json
//! {
//!   "version": "v1beta",
//!   "variable": { "prompt": { "type": "string", "required": true } },
//!   "component": {
//!     "upper": {
//!       "type": "text",
//!       "task": "TASK_UPPERCASE",
//!       "input": { "text": "${variable.prompt}" }
//!     }
//!   },
//!   "output": { "result": { "value": "${upper.output.text}" } }
//! }
//! ```

mod component;
mod recipe;
mod variable;

pub use component::{ComponentDef, ComponentMap, RangeDef};
pub use recipe::Recipe;
pub use variable::{OutputDef, VariableDef};
