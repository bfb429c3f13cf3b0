//! Workflow Description Output
//!
//! The bundled [`SchedulerBackend`]: it serializes the finished chain into
//! a description file that the cluster-side DAG writer consumes.
//!
//! # Example Output
//!
//! ```yaml
//! name: sweep
//! generated_at: 2024-05-01T12:00:00Z
//! total_jobs: 6
//! layers:
//!   - name: train
//!     template: train.sub
//!     keys: [lr]
//!     jobs: 2
//!     vars:
//!       - lr: '0.1'
//!       - lr: '0.01'
//!   - name: eval
//!     template: eval.sub
//!     keys: []
//!     jobs: 4
//!     edge:
//!       type: many_to_many
//! ```

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;

use super::edge::EdgeSpec;
use super::layer::{Layer, SchedulerBackend};
use crate::error::BuildError;
use crate::params::{Key, VariableSet};

/// One layer of a workflow description.
#[derive(Serialize, Debug, Clone)]
pub struct LayerDescription {
    pub name: String,
    pub template: String,
    pub keys: Vec<Key>,
    pub jobs: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge: Option<EdgeSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub vars: VariableSet,
}

impl From<&Layer> for LayerDescription {
    fn from(layer: &Layer) -> Self {
        let path_text = |p: &Path| p.display().to_string();
        // Layers whose only job has no variables carry no vars list.
        let vars = if layer.vars.iter().all(|v| v.is_empty()) {
            Vec::new()
        } else {
            layer.vars.clone()
        };

        Self {
            name: layer.name.clone(),
            template: path_text(&layer.template),
            keys: layer.keys.clone(),
            jobs: layer.job_count(),
            edge: layer.edge,
            pre: layer.pre.as_deref().map(path_text),
            post: layer.post.as_deref().map(path_text),
            vars,
        }
    }
}

/// Complete description of a layered workflow.
#[derive(Serialize, Debug, Clone)]
pub struct WorkflowDescription {
    pub name: String,
    pub generated_at: DateTime<Utc>,
    pub total_jobs: usize,
    pub layers: Vec<LayerDescription>,
}

impl WorkflowDescription {
    pub fn to_yaml(&self) -> Result<String, BuildError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn to_json(&self) -> Result<String, BuildError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Saves the description as JSON if the path ends in `.json`, YAML
    /// otherwise.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), BuildError> {
        let path = path.as_ref();
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        let content = if is_json { self.to_json()? } else { self.to_yaml()? };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| BuildError::write_file(parent, e))?;
        }
        fs::write(path, content).map_err(|e| BuildError::write_file(path, e))?;
        info!("Workflow description saved to: {}", path.display());
        Ok(())
    }
}

/// Backend producing a [`WorkflowDescription`].
#[derive(Debug, Clone)]
pub struct DescriptionBackend {
    name: String,
}

impl DescriptionBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl SchedulerBackend for DescriptionBackend {
    type Output = WorkflowDescription;

    fn materialize(&self, layers: &[Layer]) -> Result<Self::Output, BuildError> {
        if layers.is_empty() {
            return Err(BuildError::Backend(format!(
                "workflow '{}' has no layers",
                self.name
            )));
        }

        let layers: Vec<LayerDescription> = layers.iter().map(LayerDescription::from).collect();
        Ok(WorkflowDescription {
            name: self.name.clone(),
            generated_at: Utc::now(),
            total_jobs: layers.iter().map(|l| l.jobs).sum(),
            layers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::LayerChain;
    use crate::params::VariableAssignment;
    use tempfile::tempdir;

    fn sample_chain() -> LayerChain {
        let mut chain = LayerChain::new();
        chain
            .append(
                Layer::new("train", "train.sub")
                    .with_keys(vec!["lr".to_string()])
                    .with_vars(vec![
                        VariableAssignment::new().with("lr", "0.1"),
                        VariableAssignment::new().with("lr", "0.01"),
                    ])
                    .with_pre("prep.sh"),
                None,
            )
            .unwrap();
        chain
            .append(Layer::new("collect", "collect.sub"), Some(EdgeSpec::ManyToMany))
            .unwrap();
        chain
    }

    #[test]
    fn test_materialize_describes_layers() {
        let description = sample_chain()
            .finalize(&DescriptionBackend::new("sweep"))
            .unwrap();

        assert_eq!(description.name, "sweep");
        assert_eq!(description.total_jobs, 3);
        assert_eq!(description.layers.len(), 2);
        assert_eq!(description.layers[0].edge, None);
        assert_eq!(description.layers[0].pre.as_deref(), Some("prep.sh"));
        assert_eq!(description.layers[1].edge, Some(EdgeSpec::ManyToMany));
        assert!(description.layers[1].vars.is_empty());
    }

    #[test]
    fn test_materialize_empty_chain_fails() {
        let result = LayerChain::new().finalize(&DescriptionBackend::new("empty"));
        assert!(matches!(result, Err(BuildError::Backend(_))));
    }

    #[test]
    fn test_yaml_contains_vars_and_edge() {
        let description = sample_chain()
            .finalize(&DescriptionBackend::new("sweep"))
            .unwrap();
        let yaml = description.to_yaml().unwrap();

        assert!(yaml.contains("name: sweep"));
        assert!(yaml.contains("lr:"));
        assert!(yaml.contains("0.01"));
        assert!(yaml.contains("type: many_to_many"));
    }

    #[test]
    fn test_save_picks_format_from_extension() {
        let temp_dir = tempdir().unwrap();
        let description = sample_chain()
            .finalize(&DescriptionBackend::new("sweep"))
            .unwrap();

        let json_path = temp_dir.path().join("out").join("sweep.json");
        description.save(&json_path).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(json["layers"][0]["jobs"], 2);

        let yaml_path = temp_dir.path().join("sweep.yaml");
        description.save(&yaml_path).unwrap();
        let text = std::fs::read_to_string(&yaml_path).unwrap();
        assert!(text.starts_with("name: sweep"));
    }
}
