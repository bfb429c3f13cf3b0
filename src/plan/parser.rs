//! Build Plan Loading and Chain Assembly
//!
//! Loads a YAML build plan and turns it into a [`LayerChain`]:
//! 1. Load each layer's submit file and extract its keys
//! 2. Generate, import, or count the layer's variables
//! 3. Resolve the edge to the previous layer
//! 4. Append the layer to the chain
//!
//! Relative paths in a plan are resolved against the plan file's directory.
//!
//! # Staging
//!
//! With a stage directory, each layer becomes self-contained there:
//! - `<layer>.sub`: the prepared submit file, with section headers
//! - the executable and `transfer_input_files` of the submit file
//! - the queue file named by its queue statement
//! - the layer's pre/post scripts, referenced by file name

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use super::model::{BuildPlan, LayerPlan, QueueSource};
use crate::dag::{resolve_edge, EdgeSpec, JobTemplate, Layer, LayerChain};
use crate::error::{BuildError, Warning};
use crate::params::{
    build, read_queue_file, write_queue_file, Key, Value, VariableAssignment, VariableSet,
};

/// Where plan paths are resolved and where staged layers go.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Directory relative plan paths are resolved against
    pub base_dir: PathBuf,
    /// If set, every layer is staged into this directory
    pub stage_dir: Option<PathBuf>,
}

impl BuildOptions {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            stage_dir: None,
        }
    }

    pub fn with_stage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.stage_dir = Some(dir.into());
        self
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}

/// Loads a build plan from a YAML file.
///
/// # Example
///
/// ```rust,no_run
/// use dagweaver::plan::load_plan;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let plan = load_plan("sweep.yaml")?;
///     println!("Plan '{}' has {} layers", plan.name, plan.layers.len());
///     Ok(())
/// }
/// ```
pub fn load_plan(path: impl AsRef<Path>) -> Result<BuildPlan, BuildError> {
    let path = path.as_ref();
    info!("Loading build plan from: {}", path.display());

    let yaml_content = fs::read_to_string(path).map_err(|e| BuildError::read_file(path, e))?;
    debug!("YAML content loaded ({} bytes)", yaml_content.len());

    let plan: BuildPlan = serde_yaml::from_str(&yaml_content)?;
    info!("Parsed plan '{}' with {} layers", plan.name, plan.layers.len());
    Ok(plan)
}

/// Directory that relative paths in a plan file are resolved against.
pub fn plan_base_dir(plan_path: impl AsRef<Path>) -> PathBuf {
    plan_path
        .as_ref()
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Name given in the plan, if any.
fn explicit_name(layer_plan: &LayerPlan) -> Option<&str> {
    layer_plan
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
}

/// Name a layer will have in the chain.
fn layer_name(layer_plan: &LayerPlan, template: &JobTemplate) -> String {
    explicit_name(layer_plan)
        .unwrap_or(&template.name)
        .to_string()
}

/// Name used in errors raised before the submit file is loaded.
fn plan_label(layer_plan: &LayerPlan) -> String {
    explicit_name(layer_plan)
        .or_else(|| Path::new(&layer_plan.submit).file_stem().and_then(|s| s.to_str()))
        .unwrap_or(&layer_plan.submit)
        .to_string()
}

/// Builds the variable set for one layer.
fn layer_vars(
    source: Option<&QueueSource>,
    keys: &[Key],
    options: &BuildOptions,
) -> Result<(VariableSet, Vec<Warning>), BuildError> {
    let mut warnings = Vec::new();

    let vars = match source {
        None => vec![VariableAssignment::new()],
        Some(QueueSource::Count { jobs }) => vec![VariableAssignment::new(); (*jobs).max(1)],
        Some(QueueSource::File { file }) => {
            let path = options.resolve(file);
            if path.exists() {
                let decoded = read_queue_file(&path, keys)?;
                warnings.extend(decoded.warnings);
                decoded.vars
            } else {
                let warning = Warning::MissingQueueFile(path.display().to_string());
                warn!("{}", warning);
                warnings.push(warning);
                vec![VariableAssignment::new()]
            }
        }
        Some(source @ QueueSource::Manual { values, .. }) => {
            for extra in values.keys().filter(|k| !keys.contains(k)) {
                debug!("Ignoring values for '{}': not a template key", extra);
            }

            let mut values_by_key: HashMap<Key, Vec<Value>> = HashMap::new();
            for key in keys {
                let spec = values
                    .get(key)
                    .ok_or_else(|| BuildError::MissingValues(key.clone()))?;
                values_by_key.insert(key.clone(), spec.resolve()?);
            }

            let config = source.combine_config().unwrap_or_default();
            build(keys, &values_by_key, &config)?
        }
    };

    Ok((vars, warnings))
}

/// Resolves an optional pre/post script path.
fn script_path(
    script: Option<&str>,
    options: &BuildOptions,
    warnings: &mut Vec<Warning>,
) -> Option<PathBuf> {
    let path = options.resolve(script?);
    if path.exists() {
        Some(path)
    } else {
        let warning = Warning::MissingScript(path.display().to_string());
        warn!("{}", warning);
        warnings.push(warning);
        None
    }
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Copies one file into the stage directory, creating parent directories.
fn copy_into(src: &Path, dst: &Path) -> Result<(), BuildError> {
    if is_same_file(src, dst) {
        return Ok(());
    }
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(|e| BuildError::write_file(parent, e))?;
    }
    fs::copy(src, dst).map_err(|e| BuildError::write_file(dst, e))?;
    debug!("Staged {} -> {}", src.display(), dst.display());
    Ok(())
}

/// Writes the layer's prepared submit file and copies the files its job
/// needs into the stage directory.
///
/// Returns the staged submit file name, relative to the stage directory.
fn stage_template(
    template: &JobTemplate,
    name: &str,
    stage_dir: &Path,
    warnings: &mut Vec<Warning>,
) -> Result<PathBuf, BuildError> {
    fs::create_dir_all(stage_dir).map_err(|e| BuildError::write_file(stage_dir, e))?;

    let mut job_files = template.submit.input_files();
    match template.submit.queue_file() {
        Some(queue_file) => job_files.push(queue_file.to_string()),
        None => debug!("Submit file for '{}' names no queue file", name),
    }

    for file in job_files.iter().filter(|f| !Path::new(f).is_absolute()) {
        let src = template.dir().join(file);
        if src.exists() {
            copy_into(&src, &stage_dir.join(file))?;
        } else {
            let warning = Warning::MissingJobFile(src.display().to_string());
            warn!("{}", warning);
            warnings.push(warning);
        }
    }

    let mut submit = template.submit.clone();
    submit.prepare_for_layer(name);

    let file_name = PathBuf::from(format!("{}.sub", name));
    let staged = stage_dir.join(&file_name);
    fs::write(&staged, submit.to_sectioned_string())
        .map_err(|e| BuildError::write_file(&staged, e))?;
    debug!("Staged submit file {}", staged.display());

    Ok(file_name)
}

/// Copies a pre/post script into the stage directory and returns the
/// staged file name.
fn stage_script(script: &Path, stage_dir: &Path) -> Result<PathBuf, BuildError> {
    let file_name = script
        .file_name()
        .map(PathBuf::from)
        .ok_or_else(|| BuildError::InvalidSubmit(format!("'{}' is not a file", script.display())))?;
    copy_into(script, &stage_dir.join(&file_name))?;
    Ok(file_name)
}

/// Builds one layer and the edge requested for it.
fn build_layer(
    layer_plan: &LayerPlan,
    options: &BuildOptions,
) -> Result<(Layer, Option<EdgeSpec>, Vec<Warning>), BuildError> {
    let template = JobTemplate::load(options.resolve(&layer_plan.submit))
        .map_err(|e| e.in_layer(plan_label(layer_plan)))?;
    let name = layer_name(layer_plan, &template);

    let build_inner = || -> Result<(Layer, Option<EdgeSpec>, Vec<Warning>), BuildError> {
        let keys = template.keys();
        if keys.is_empty() {
            debug!("Submit file for '{}' references no $(key) arguments", name);
        }

        let (vars, mut warnings) = layer_vars(layer_plan.queue.as_ref(), &keys, options)?;

        let edge = layer_plan
            .edge
            .map(|choice| resolve_edge(choice, &layer_plan.edge_params))
            .transpose()?;

        let mut pre = script_path(layer_plan.pre.as_deref(), options, &mut warnings);
        let mut post = script_path(layer_plan.post.as_deref(), options, &mut warnings);

        let template_ref = match &options.stage_dir {
            Some(dir) => {
                let staged = stage_template(&template, &name, dir, &mut warnings)?;
                pre = pre.map(|p| stage_script(&p, dir)).transpose()?;
                post = post.map(|p| stage_script(&p, dir)).transpose()?;
                staged
            }
            None => template.path.clone(),
        };

        let mut layer = Layer::new(name.clone(), template_ref)
            .with_keys(keys)
            .with_vars(vars);
        layer.pre = pre;
        layer.post = post;

        Ok((layer, edge, warnings))
    };

    build_inner().map_err(|e| e.in_layer(name.clone()))
}

/// Assembles the layer chain described by a plan.
pub fn build_chain(plan: &BuildPlan, options: &BuildOptions) -> Result<LayerChain, BuildError> {
    info!("Building workflow '{}'", plan.name);
    let mut chain = LayerChain::new();

    for layer_plan in &plan.layers {
        let (layer, edge, warnings) = build_layer(layer_plan, options)?;
        for warning in warnings {
            chain.record_warning(warning);
        }

        let name = layer.name.clone();
        chain.append(layer, edge).map_err(|e| e.in_layer(name))?;
    }

    info!(
        "Workflow '{}' built: {} layers, {} jobs",
        plan.name,
        chain.len(),
        chain.total_jobs()
    );
    Ok(chain)
}

/// Generates the variable set of one plan layer and writes it as a queue
/// file.
///
/// Without an explicit output path the file goes next to the submit file,
/// named after its queue statement (or `<job>.txt`). Nothing is staged.
pub fn generate_queue(
    plan: &BuildPlan,
    layer: &str,
    output: Option<&Path>,
    options: &BuildOptions,
) -> Result<PathBuf, BuildError> {
    let layer_plan = plan
        .layers
        .iter()
        .find(|l| {
            l.name.as_deref() == Some(layer)
                || Path::new(&l.submit).file_stem().and_then(|s| s.to_str()) == Some(layer)
        })
        .ok_or_else(|| BuildError::Backend(format!("plan has no layer named '{}'", layer)))?;

    let options = BuildOptions {
        stage_dir: None,
        ..options.clone()
    };
    let (built, _, warnings) = build_layer(layer_plan, &options)?;
    for warning in &warnings {
        debug!("Queue generation warning: {}", warning);
    }

    let path = match output {
        Some(path) => path.to_path_buf(),
        None => {
            let template = JobTemplate::load(&built.template)?;
            let file_name = template
                .submit
                .queue_file()
                .map(str::to_string)
                .unwrap_or_else(|| format!("{}.txt", template.name));
            template.dir().join(file_name)
        }
    };

    write_queue_file(&path, &built.vars, &built.keys)?;
    Ok(path)
}
