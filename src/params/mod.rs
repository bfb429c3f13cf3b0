//! Parameter Set Generation
//!
//! Turns per-key value declarations into the ordered list of variable
//! assignments a layer runs with, and persists those lists as queue files.
//!
//! # Structure
//!
//! - [`value`]: Values and value specifications (lists and ranges)
//! - [`assignment`]: Ordered key/value assignments
//! - [`combine`]: Product and grouped combination
//! - [`queue`]: Queue file encoding and decoding
//! - [`template`]: `$(key)` extraction from argument templates

pub mod assignment;
pub mod combine;
pub mod queue;
pub mod template;
pub mod value;

pub use assignment::{Key, VariableAssignment, VariableSet};
pub use combine::{build, CombineConfig, CombineMode, OrderPreference};
pub use queue::{decode, encode, read_queue_file, write_queue_file, Decoded, Delimiter};
pub use template::extract_keys;
pub use value::{resolve, Value, ValueSpec};
