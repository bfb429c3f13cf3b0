//! Build Plan Model
//!
//! A build plan is the explicit, up-front description of a layered
//! workflow: which submit file each layer runs, how its variables are
//! generated, and how it is linked to the layer before it.
//!
//! # Example YAML Format
//!
//! ```yaml
//! name: sweep
//! layers:
//!   - name: train
//!     submit: train/train.sub
//!     queue:
//!       values:
//!         lr: [0.1, 0.01]
//!         seed: { lower: 0, upper: 10, step: 3 }
//!       combine: grouped
//!       groups: [[lr, seed]]
//!       order: free_first
//!     pre: prep.sh
//!
//!   - submit: eval/eval.sub
//!     queue: { file: eval/eval.txt }
//!     edge: one2one
//!
//!   - submit: report/report.sub
//!     queue: { jobs: 2 }
//!     edge: group
//!     edge_params: { parent_chunk: 4, child_chunk: 1 }
//! ```

use std::collections::HashMap;

use serde::Deserialize;

use crate::dag::{EdgeChoice, EdgeParams};
use crate::params::{CombineConfig, CombineMode, Key, OrderPreference, ValueSpec};

/// Default workflow name when the plan does not give one.
pub const DEFAULT_PLAN_NAME: &str = "auto_dag";

fn default_plan_name() -> String {
    DEFAULT_PLAN_NAME.to_string()
}

/// Complete workflow build plan.
#[derive(Deserialize, Debug, Clone)]
pub struct BuildPlan {
    /// Workflow name (used for the description file name)
    #[serde(default = "default_plan_name")]
    pub name: String,

    /// Layers in chain order
    pub layers: Vec<LayerPlan>,
}

/// Plan for a single layer.
#[derive(Deserialize, Debug, Clone)]
pub struct LayerPlan {
    /// Layer name; defaults to the submit file stem
    #[serde(default)]
    pub name: Option<String>,

    /// Path to the layer's submit file
    pub submit: String,

    /// Where the layer's variables come from; absent means a single job
    #[serde(default)]
    pub queue: Option<QueueSource>,

    /// Edge to the previous layer; ManyToMany when absent
    #[serde(default)]
    pub edge: Option<EdgeChoice>,

    #[serde(default)]
    pub edge_params: EdgeParams,

    /// Optional pre script
    #[serde(default)]
    pub pre: Option<String>,

    /// Optional post script
    #[serde(default)]
    pub post: Option<String>,
}

/// Source of a layer's variable set.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum QueueSource {
    /// Generate from per-key value specs
    Manual {
        values: HashMap<Key, ValueSpec>,
        #[serde(default)]
        combine: CombineMode,
        #[serde(default)]
        groups: Vec<Vec<Key>>,
        #[serde(default)]
        order: OrderPreference,
    },
    /// Import an existing queue file
    File { file: String },
    /// A fixed number of jobs without variables
    Count { jobs: usize },
}

impl QueueSource {
    /// Combination settings for a manual source.
    pub fn combine_config(&self) -> Option<CombineConfig> {
        match self {
            Self::Manual {
                combine,
                groups,
                order,
                ..
            } => Some(CombineConfig {
                mode: *combine,
                groups: groups.clone(),
                order: *order,
            }),
            _ => None,
        }
    }
}
