//! Job Directory Scaffolding
//!
//! Generates a ready-to-edit job directory:
//!
//! ```text
//! train/
//! ├── train.sub   # submit file, arguments = $(lr) $(seed)
//! ├── train.sh    # exports the arguments, runs train.py
//! ├── train.py    # empty
//! └── train.txt   # empty queue file
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::dag::SubmitDescription;
use crate::error::BuildError;
use crate::params::Key;

/// Docker image used when none is given.
pub const DEFAULT_DOCKER_IMAGE: &str = "pytorch/pytorch:2.4.1-cuda12.1-cudnn9-devel";

/// Characters a job name may not contain.
const FORBIDDEN_NAME_CHARS: &[char] = &[' ', '.', '/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// `user/image:tag`
static DOCKER_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9]+/[a-zA-Z0-9-]+:[a-zA-Z0-9._-]+$").expect("docker image pattern is valid")
});

static ARGUMENT_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("argument pattern is valid"));

/// A job directory to generate.
#[derive(Debug, Clone, PartialEq)]
pub struct JobScaffold {
    pub name: String,
    pub image: String,
    pub arguments: Vec<Key>,
}

impl JobScaffold {
    /// Creates a scaffold for the given job name.
    ///
    /// # Example
    /// ```
    /// use dagweaver::workspace::JobScaffold;
    ///
    /// let job = JobScaffold::new("train").unwrap().with_arguments_text("lr, seed").unwrap();
    /// assert_eq!(job.arguments, vec!["lr", "seed"]);
    /// assert!(JobScaffold::new("bad name").is_err());
    /// ```
    pub fn new(name: impl Into<String>) -> Result<Self, BuildError> {
        let name = name.into();
        if name.is_empty() || name.contains(FORBIDDEN_NAME_CHARS) {
            return Err(BuildError::InvalidJobName(name));
        }
        Ok(Self {
            name,
            image: DEFAULT_DOCKER_IMAGE.to_string(),
            arguments: Vec::new(),
        })
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Result<Self, BuildError> {
        let image = image.into();
        if !DOCKER_IMAGE.is_match(&image) {
            return Err(BuildError::InvalidImage(image));
        }
        self.image = image;
        Ok(self)
    }

    pub fn with_arguments(mut self, arguments: Vec<Key>) -> Result<Self, BuildError> {
        if let Some(bad) = arguments.iter().find(|a| !ARGUMENT_NAME.is_match(a)) {
            return Err(BuildError::InvalidArgument(bad.clone()));
        }
        self.arguments = arguments;
        Ok(self)
    }

    /// Sets the arguments from comma- or whitespace-separated text.
    pub fn with_arguments_text(self, text: &str) -> Result<Self, BuildError> {
        let arguments = text
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect();
        self.with_arguments(arguments)
    }

    fn queue_file_name(&self) -> String {
        format!("{}.txt", self.name)
    }

    /// The job's submit description.
    pub fn submit(&self) -> SubmitDescription {
        let mut submit = SubmitDescription::default();
        let macros: Vec<String> = self.arguments.iter().map(|a| format!("$({})", a)).collect();

        let entries = [
            ("JobBatchName", format!("\"{}\"", capitalize(&self.name))),
            ("universe", "docker".to_string()),
            ("docker_image", self.image.clone()),
            ("arguments", macros.join(" ")),
            ("Requirements", "(Target.HasCHTCStaging == true)".to_string()),
            ("executable", format!("{}.sh", self.name)),
            ("transfer_input_files", format!("{}.py", self.name)),
            ("should_transfer_files", "YES".to_string()),
            ("when_to_transfer_output", "ON_EXIT".to_string()),
            ("+is_resumable", "true".to_string()),
            ("output", "condor_log/Cluster$(Cluster)/output.$(Process).out".to_string()),
            ("error", "condor_log/Cluster$(Cluster)/error.$(Process).err".to_string()),
            ("log", format!("{}.log", self.name)),
            ("request_cpus", "1".to_string()),
            ("request_memory", "40GB".to_string()),
            ("request_disk", "10GB".to_string()),
            ("request_gpus", "1".to_string()),
            ("require_gpus", "(DriverVersion >= 12.1) && (GlobalMemoryMb >= 40000)".to_string()),
            ("+WantGPULab", "True".to_string()),
            ("+WantFlocking", "False".to_string()),
            ("+WantGlidein", "False".to_string()),
            ("+GPUJobLength", "\"short\"".to_string()),
        ];
        for (key, value) in entries {
            submit.set(key, value);
        }

        if self.arguments.is_empty() {
            submit.set_queue("");
        } else {
            submit.set_queue(format!(
                "{} from {}",
                self.arguments.join(", "),
                self.queue_file_name()
            ));
        }
        submit
    }

    /// The job's shell wrapper, exporting positional arguments by name.
    pub fn script(&self, user: &str) -> String {
        let mut text = format!(
            "#!/bin/bash\n\n# Hugging Face\nexport HF_HOME=/staging/{user}/.cache/huggingface\nexport HF_TOKEN=YOUR_TOKEN\nexport STAGING_DIR=/staging/{user}\n# Export the arguments\n",
            user = user
        );
        for (i, arg) in self.arguments.iter().enumerate() {
            text.push_str(&format!("export {}=${}\n", arg, i + 1));
        }

        let flags: Vec<String> = self.arguments.iter().map(|a| format!("--{} ${}", a, a)).collect();
        text.push_str(&format!("\npython3 {}.py {}\n", self.name, flags.join(" ")));
        text
    }

    /// Writes the job directory under `parent` and returns its path.
    ///
    /// Fails if the job's submit file already exists.
    pub fn generate(&self, parent: impl AsRef<Path>) -> Result<PathBuf, BuildError> {
        let job_dir = parent.as_ref().join(&self.name);
        let submit_path = job_dir.join(format!("{}.sub", self.name));
        if submit_path.exists() {
            return Err(BuildError::AlreadyExists(submit_path));
        }

        fs::create_dir_all(&job_dir).map_err(|e| BuildError::write_file(&job_dir, e))?;

        let user = env::var("USER").unwrap_or_else(|_| "$USER".to_string());
        let files = [
            (submit_path.clone(), self.submit().to_sectioned_string()),
            (job_dir.join(format!("{}.sh", self.name)), self.script(&user)),
            (job_dir.join(format!("{}.py", self.name)), String::new()),
            (job_dir.join(self.queue_file_name()), String::new()),
        ];
        for (path, content) in &files {
            fs::write(path, content).map_err(|e| BuildError::write_file(path, e))?;
        }

        info!("Generated job directory: {}", job_dir.display());
        Ok(job_dir)
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::JobTemplate;
    use tempfile::tempdir;

    fn train() -> JobScaffold {
        JobScaffold::new("train")
            .unwrap()
            .with_arguments_text("lr seed")
            .unwrap()
    }

    #[test]
    fn test_job_name_validation() {
        for bad in ["", "my job", "a.b", "a/b", "what?"] {
            assert!(matches!(JobScaffold::new(bad), Err(BuildError::InvalidJobName(_))));
        }
        assert!(JobScaffold::new("train_v2").is_ok());
    }

    #[test]
    fn test_image_validation() {
        let job = JobScaffold::new("train").unwrap();
        assert_eq!(job.image, DEFAULT_DOCKER_IMAGE);
        assert!(job.clone().with_image("user/image:latest").is_ok());
        assert!(job.clone().with_image("pytorch/pytorch:2.4.1-cuda12.1").is_ok());
        assert!(matches!(job.with_image("image"), Err(BuildError::InvalidImage(_))));
    }

    #[test]
    fn test_argument_validation() {
        let job = JobScaffold::new("train").unwrap();
        assert!(matches!(
            job.with_arguments_text("lr, $(seed)"),
            Err(BuildError::InvalidArgument(a)) if a == "$(seed)"
        ));
    }

    #[test]
    fn test_submit_has_keys_and_queue() {
        let submit = train().submit();
        assert_eq!(submit.keys(), vec!["lr", "seed"]);
        assert_eq!(submit.queue_file(), Some("train.txt"));
        assert_eq!(submit.get("JobBatchName"), Some("\"Train\""));
        assert_eq!(submit.input_files(), vec!["train.sh", "train.py"]);

        let text = submit.to_sectioned_string();
        assert!(text.contains("\n# Artefact\nRequirements = "));
        assert!(text.contains("\n# GPU resources\nrequest_gpus = 1\n"));
        assert!(text.ends_with("\n# Queue\nqueue lr, seed from train.txt\n"));
    }

    #[test]
    fn test_submit_without_arguments() {
        let submit = JobScaffold::new("prep").unwrap().submit();
        assert!(submit.keys().is_empty());
        assert_eq!(submit.queue_statement(), Some(""));
    }

    #[test]
    fn test_script_exports_arguments() {
        let script = train().script("alice");
        assert!(script.starts_with("#!/bin/bash\n"));
        assert!(script.contains("export STAGING_DIR=/staging/alice\n"));
        assert!(script.contains("export lr=$1\nexport seed=$2\n"));
        assert!(script.contains("python3 train.py --lr $lr --seed $seed"));
    }

    #[test]
    fn test_generate_writes_loadable_job() {
        let temp_dir = tempdir().unwrap();
        let job_dir = train().generate(temp_dir.path()).unwrap();

        assert_eq!(job_dir, temp_dir.path().join("train"));
        for file in ["train.sub", "train.sh", "train.py", "train.txt"] {
            assert!(job_dir.join(file).exists(), "{} should exist", file);
        }

        let template = JobTemplate::load(job_dir.join("train.sub")).unwrap();
        assert_eq!(template.keys(), vec!["lr", "seed"]);
        assert_eq!(template.submit.queue_file(), Some("train.txt"));
    }

    #[test]
    fn test_generate_refuses_to_overwrite() {
        let temp_dir = tempdir().unwrap();
        train().generate(temp_dir.path()).unwrap();
        let result = train().generate(temp_dir.path());
        assert!(matches!(result, Err(BuildError::AlreadyExists(_))));
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("train"), "Train");
        assert_eq!(capitalize("eVAL"), "Eval");
    }
}
