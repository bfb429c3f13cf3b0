//! Build Plans
//!
//! A build plan is a YAML file listing the layers of a workflow in order.
//! This module loads plans and assembles them into a [`LayerChain`](crate::dag::LayerChain).
//!
//! # Structure
//!
//! - [`model`]: Plan data structures
//! - [`parser`]: Plan loading, chain assembly and queue generation

pub mod model;
pub mod parser;

pub use model::{BuildPlan, LayerPlan, QueueSource, DEFAULT_PLAN_NAME};
pub use parser::{build_chain, generate_queue, load_plan, plan_base_dir, BuildOptions};
