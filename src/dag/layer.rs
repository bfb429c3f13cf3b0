//! Layers and the Layer Chain
//!
//! A layer is one stage of the DAG: a job template instantiated once per
//! variable assignment. Layers are appended to a [`LayerChain`] in order,
//! each linked to its predecessor by an [`EdgeSpec`].
//!
//! The chain is append-only. Once a layer is in the chain its edge cannot
//! change and it cannot be removed or moved.

use std::path::PathBuf;

use log::{debug, info, warn};

use super::edge::EdgeSpec;
use crate::error::{BuildError, Warning};
use crate::params::{Key, VariableSet};

/// One stage of a workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    /// Unique layer name
    pub name: String,
    /// Submit file this layer's jobs run
    pub template: PathBuf,
    /// Template keys, in argument order
    pub keys: Vec<Key>,
    /// One assignment per job instance
    pub vars: VariableSet,
    /// Script run before the layer's jobs (opaque to the chain)
    pub pre: Option<PathBuf>,
    /// Script run after the layer's jobs (opaque to the chain)
    pub post: Option<PathBuf>,
    /// Link to the previous layer; `None` for the root layer
    pub edge: Option<EdgeSpec>,
}

impl Layer {
    /// Creates a layer with a single job and no variables.
    ///
    /// # Example
    ///
    /// ```
    /// use dagweaver::dag::Layer;
    /// use dagweaver::params::VariableAssignment;
    ///
    /// let layer = Layer::new("train", "train.sub")
    ///     .with_keys(vec!["lr".to_string()])
    ///     .with_vars(vec![
    ///         VariableAssignment::new().with("lr", "0.1"),
    ///         VariableAssignment::new().with("lr", "0.01"),
    ///     ])
    ///     .with_post("collect.sh");
    /// assert_eq!(layer.job_count(), 2);
    /// ```
    pub fn new(name: impl Into<String>, template: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            template: template.into(),
            keys: Vec::new(),
            vars: vec![Default::default()],
            pre: None,
            post: None,
            edge: None,
        }
    }

    pub fn with_keys(mut self, keys: Vec<Key>) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_vars(mut self, vars: VariableSet) -> Self {
        self.vars = vars;
        self
    }

    pub fn with_pre(mut self, script: impl Into<PathBuf>) -> Self {
        self.pre = Some(script.into());
        self
    }

    pub fn with_post(mut self, script: impl Into<PathBuf>) -> Self {
        self.post = Some(script.into());
        self
    }

    /// Number of job instances in this layer.
    pub fn job_count(&self) -> usize {
        self.vars.len()
    }

    pub fn is_root(&self) -> bool {
        self.edge.is_none()
    }
}

/// Result of a successful append.
#[derive(Debug)]
pub struct Appended<'a> {
    pub layer: &'a Layer,
    /// Warnings raised by this append
    pub warnings: Vec<Warning>,
}

/// Turns a finished chain into a workflow description.
///
/// Implementations receive the layers in chain order, each carrying the
/// edge to its predecessor.
pub trait SchedulerBackend {
    type Output;

    fn materialize(&self, layers: &[Layer]) -> Result<Self::Output, BuildError>;
}

/// Ordered, append-only sequence of layers.
#[derive(Debug, Clone, Default)]
pub struct LayerChain {
    layers: Vec<Layer>,
    warnings: Vec<Warning>,
}

impl LayerChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a layer linked to the current last layer.
    ///
    /// - The first layer must not carry an edge.
    /// - Later layers without an edge are linked ManyToMany.
    /// - A OneToOne edge between layers with different job counts is
    ///   replaced by ManyToMany and a [`Warning::CardinalityDowngrade`] is
    ///   returned (and kept in [`warnings`](Self::warnings)).
    pub fn append(
        &mut self,
        mut layer: Layer,
        edge: Option<EdgeSpec>,
    ) -> Result<Appended<'_>, BuildError> {
        if self.layers.iter().any(|l| l.name == layer.name) {
            return Err(BuildError::DuplicateLayer(layer.name));
        }

        let mut warnings = Vec::new();

        match self.layers.last() {
            None => {
                if edge.is_some() {
                    return Err(BuildError::RootEdge(layer.name));
                }
                layer.edge = None;
                debug!("Layer '{}' is the root layer", layer.name);
            }
            Some(parent) => {
                let mut edge = edge.unwrap_or(EdgeSpec::ManyToMany);

                if edge == EdgeSpec::OneToOne && parent.job_count() != layer.job_count() {
                    let warning = Warning::CardinalityDowngrade {
                        layer: layer.name.clone(),
                        parent_len: parent.job_count(),
                        child_len: layer.job_count(),
                    };
                    warn!("{}", warning);
                    warnings.push(warning);
                    edge = EdgeSpec::ManyToMany;
                }

                debug!("Layer '{}' -> '{}' via {}", parent.name, layer.name, edge);
                layer.edge = Some(edge);
            }
        }

        info!(
            "Added layer '{}' with {} jobs (chain length {})",
            layer.name,
            layer.job_count(),
            self.layers.len() + 1
        );

        self.warnings.extend(warnings.iter().cloned());
        let index = self.layers.len();
        self.layers.push(layer);

        Ok(Appended {
            layer: &self.layers[index],
            warnings,
        })
    }

    /// Records a warning raised while preparing a layer for this chain.
    pub fn record_warning(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    /// Hands the ordered layers to a scheduler backend.
    pub fn finalize<B: SchedulerBackend>(self, backend: &B) -> Result<B::Output, BuildError> {
        info!(
            "Finalizing chain: {} layers, {} jobs, {} warnings",
            self.layers.len(),
            self.total_jobs(),
            self.warnings.len()
        );
        backend.materialize(&self.layers)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn last(&self) -> Option<&Layer> {
        self.layers.last()
    }

    pub fn get(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == name)
    }

    /// Every warning raised while building this chain.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn total_jobs(&self) -> usize {
        self.layers.iter().map(Layer::job_count).sum()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}
