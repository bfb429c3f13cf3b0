//! DagWeaver - Layered Cluster Workflow Builder
//!
//! Builds layered job workflows for a batch cluster scheduler. Each layer
//! runs one job template once per variable assignment, and successive
//! layers are linked by edges describing which parent jobs feed which
//! child jobs.
//!
//! # Architecture
//!
//! The library is organized into five main modules:
//!
//! - [`params`]: Value specs, combination of per-key values and queue files
//! - [`dag`]: Edges, layers, the layer chain and the scheduler handoff
//! - [`plan`]: YAML build plans and chain assembly
//! - [`workspace`]: Job directory scaffolding and DAG artifact cleanup
//! - [`error`]: Build errors and non-fatal warnings
//!
//! # Example
//!
//! ```rust,no_run
//! use dagweaver::dag::DescriptionBackend;
//! use dagweaver::plan::{build_chain, load_plan, plan_base_dir, BuildOptions};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Load a build plan from YAML
//!     let plan = load_plan("sweep.yaml")?;
//!
//!     // Assemble the layer chain
//!     let options = BuildOptions::new(plan_base_dir("sweep.yaml"));
//!     let chain = build_chain(&plan, &options)?;
//!
//!     // Hand it to the description backend and save
//!     let description = chain.finalize(&DescriptionBackend::new(&plan.name))?;
//!     description.save("sweep.dag.yaml")?;
//!     Ok(())
//! }
//! ```

pub mod dag;
pub mod error;
pub mod params;
pub mod plan;
pub mod workspace;

// Re-export commonly used types
pub use dag::{EdgeSpec, Layer, LayerChain, SchedulerBackend};
pub use error::{BuildError, Warning};
pub use params::{Value, ValueSpec, VariableAssignment, VariableSet};
pub use plan::load_plan;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "DagWeaver";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_version() {
        assert!(!VERSION.is_empty());
        assert!(VERSION.contains('.'));
    }

    #[test]
    fn test_app_name() {
        assert_eq!(APP_NAME, "DagWeaver");
    }

    #[test]
    fn test_module_exports_layer() {
        let layer = Layer::new("train", "train.sub");
        assert_eq!(layer.name, "train");
        assert_eq!(layer.job_count(), 1);
    }

    #[test]
    fn test_module_exports_chain() {
        let chain = LayerChain::new();
        assert!(chain.is_empty());
    }

    #[test]
    fn test_version_format() {
        let parts: Vec<&str> = VERSION.split('.').collect();
        assert!(parts.len() >= 2, "Version should have at least major.minor");
        for part in parts {
            assert!(part.parse::<u32>().is_ok(), "Version components should be numeric");
        }
    }
}
