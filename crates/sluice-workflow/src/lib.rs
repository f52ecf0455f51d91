//! Sluice Workflow
//!
//! This crate turns a [`sluice_config::Recipe`] into something executable:
//!
//! ```text
//!   Recipe ──Resolver──▶ Pipeline (typed components)
//!                            │
//!                      generate_dag          references found in input,
//!                            │               condition and iterator bodies
//!                            ▼
//!                           Dag  (arena of components, union-find, ancestors)
//!                            │
//!                    topological_sort
//!                            │
//!                            ▼
//!                        Schedule  (groups of slots, run in order)
//! ```
//!
//! [`Plan`] bundles a DAG with its schedule and the nested plans of its
//! iterator components. All structural errors (unknown references, cycles,
//! disconnected graphs) surface here, before anything executes.

mod component;
mod dag;
mod error;
mod pipeline;
mod plan;
mod references;
mod resolve;
mod schedule;
mod union_find;

pub use component::{
  CapabilityKind, Component, ComponentKind, DEFAULT_INDEX, DefinitionLookup, END_ID,
  ITERATOR_TYPE, IteratorSpec, RESERVED_SCOPES, RangeSpec, SECRET_SCOPE, START_ID, StartSpec,
  TaskSpec,
};
pub use dag::{Dag, generate_dag, generate_nested_dag};
pub use error::WorkflowError;
pub use pipeline::Pipeline;
pub use plan::Plan;
pub use references::{Parents, component_parents};
pub use resolve::Resolver;
pub use schedule::{Schedule, topological_sort};
