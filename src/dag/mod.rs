//! DAG Composition
//!
//! Wires successive layers together and hands the result to a scheduler
//! backend.
//!
//! # Structure
//!
//! - [`edge`]: Edge types and their validation
//! - [`layer`]: Layers and the append-only layer chain
//! - [`submit`]: Submit description (job template) handling
//! - [`description`]: Serialized workflow description backend

pub mod description;
pub mod edge;
pub mod layer;
pub mod submit;

pub use description::{DescriptionBackend, LayerDescription, WorkflowDescription};
pub use edge::{resolve_edge, EdgeChoice, EdgeParams, EdgeSpec, SliceSpec};
pub use layer::{Appended, Layer, LayerChain, SchedulerBackend};
pub use submit::{JobTemplate, SubmitDescription};
