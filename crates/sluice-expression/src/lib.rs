//! Sluice Expression
//!
//! The two small languages embedded in recipe components:
//!
//! - **Templates**: `${component.route}` references inside string leaves of a
//!   component's `input`, rendered against one batch item's memory.
//! - **Conditions**: boolean/arithmetic expressions over references, deciding
//!   whether a component runs for a given item.
//!
//! ```text
//!   "${a.x} > 3 && ${a.y} == \"ok\""
//!              │ sanitize
//!              ▼
//!   "var0.x > 3 && var0.y == \"ok\""   { var0 → a }
//!              │ parse
//!              ▼
//!   Binary(&&, Binary(>, Selector(var0, x), 3), Binary(==, ...))
//!              │ eval with { var0 → bindings[a] }
//!              ▼
//!            true
//! ```
//!
//! Both languages share the reference path grammar in [`Path`] and look up
//! component data through the [`Bindings`] trait.

mod bindings;
mod condition;
mod error;
mod path;
mod reference;
mod template;

pub use bindings::Bindings;
pub use condition::{
  BinaryOp, Expr, Literal, UnaryOp, eval_condition, evaluate_condition, parse_condition,
  sanitize_condition, truthy,
};
pub use error::ExpressionError;
pub use path::{Path, Segment};
pub use reference::{find_condition_references, find_reference_parents, find_value_references};
pub use template::{render_input, render_input_lenient};
