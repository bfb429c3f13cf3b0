//! Working Directory Tools
//!
//! Helpers around a workflow's working directory that are not part of
//! building a chain.
//!
//! # Structure
//!
//! - [`clean`]: Removal of DAGMan run artifacts
//! - [`scaffold`]: Generation of new job directories

pub mod clean;
pub mod scaffold;

pub use clean::{clean_directory, is_dag_artifact};
pub use scaffold::{JobScaffold, DEFAULT_DOCKER_IMAGE};
