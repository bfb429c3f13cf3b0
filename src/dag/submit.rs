//! Job Templates
//!
//! A job template is an HTCondor submit description. Only the parts the
//! layer builder needs are interpreted: the `arguments` entry (for key
//! extraction), the `queue` statement (to locate a queue file), and the
//! log entries (retargeted per layer).
//!
//! # Example Submit File
//!
//! ```text
//! JobBatchName = "Train"
//! executable   = train.sh
//! arguments    = $(lr) $(seed)
//! output       = condor_log/output.$(Process).out
//! log          = train.log
//!
//! queue lr, seed from train.txt
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::BuildError;
use crate::params::{extract_keys, Key};

/// Queue file extensions recognized in a queue statement.
const QUEUE_FILE_EXTENSIONS: &[&str] = &[".txt", ".csv"];

/// Section headers written before the first entry with a given key.
const SECTIONS: &[(&str, &str)] = &[
    ("universe", "Universe"),
    ("arguments", "Arguments"),
    ("requirements", "Artefact"),
    ("+is_resumable", "Checkpoint"),
    ("output", "Logging"),
    ("request_cpus", "Compute resources"),
    ("request_gpus", "GPU resources"),
];

/// Ordered `key = value` entries of a submit description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmitDescription {
    entries: Vec<(String, String)>,
    queue: Option<String>,
}

impl SubmitDescription {
    /// Parses submit description text.
    ///
    /// Blank lines and `#` comments are dropped. The `queue` statement is
    /// kept apart from the entries.
    pub fn parse(text: &str) -> Result<Self, BuildError> {
        let mut description = Self::default();

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if is_queue_statement(line) {
                description.queue = Some(line[5..].trim().to_string());
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| {
                BuildError::InvalidSubmit(format!(
                    "line {}: expected 'key = value', found '{}'",
                    index + 1,
                    line
                ))
            })?;
            description.set(key.trim(), value.trim());
        }

        Ok(description)
    }

    /// Reads and parses a submit file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BuildError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| BuildError::read_file(path, e))?;
        Self::parse(&text).map_err(|e| match e {
            BuildError::InvalidSubmit(msg) => {
                BuildError::InvalidSubmit(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Looks up an entry (submit keys are case-insensitive).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Sets an entry, replacing an existing one in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&key)) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self
            .entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(key))?;
        Some(self.entries.remove(index).1)
    }

    pub fn arguments(&self) -> Option<&str> {
        self.get("arguments")
    }

    /// Keys referenced by the `arguments` entry, in order.
    pub fn keys(&self) -> Vec<Key> {
        self.arguments().map(extract_keys).unwrap_or_default()
    }

    /// The queue statement without the leading `queue` keyword.
    pub fn queue_statement(&self) -> Option<&str> {
        self.queue.as_deref()
    }

    /// Sets the queue statement (without the leading `queue` keyword).
    pub fn set_queue(&mut self, statement: impl Into<String>) {
        self.queue = Some(statement.into().trim().to_string());
    }

    /// The queue file named in the queue statement, if any.
    pub fn queue_file(&self) -> Option<&str> {
        self.queue_statement()?
            .split(|c: char| c.is_whitespace() || c == ',')
            .find(|token| QUEUE_FILE_EXTENSIONS.iter().any(|ext| token.ends_with(ext)))
    }

    /// Files the job needs next to its submit file: the executable and
    /// every `transfer_input_files` entry.
    pub fn input_files(&self) -> Vec<String> {
        let mut files: Vec<String> = self.get("executable").map(str::to_string).into_iter().collect();
        if let Some(inputs) = self.get("transfer_input_files") {
            files.extend(
                inputs
                    .replace(' ', "")
                    .split(',')
                    .filter(|f| !f.is_empty())
                    .map(str::to_string),
            );
        }
        files
    }

    /// Renders the description with a `# Section` comment before each
    /// recognized group of entries (universe, arguments, logging, ...).
    pub fn to_sectioned_string(&self) -> String {
        let mut text = String::new();
        for (key, value) in &self.entries {
            let header = SECTIONS
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, header)| header);
            if let Some(header) = header {
                if !text.is_empty() {
                    text.push('\n');
                }
                text.push_str(&format!("# {}\n", header));
            }
            text.push_str(&format!("{} = {}\n", key, value));
        }
        if let Some(queue) = &self.queue {
            text.push_str("\n# Queue\n");
            if queue.is_empty() {
                text.push_str("queue\n");
            } else {
                text.push_str(&format!("queue {}\n", queue));
            }
        }
        text
    }

    /// Prepares the description for use as a layer's job.
    ///
    /// The layer supplies the variables, so the queue statement and batch
    /// name are dropped. Existing log entries are pointed at per-job paths.
    pub fn prepare_for_layer(&mut self, job_name: &str) {
        self.queue = None;
        self.remove("JobBatchName");

        if self.get("output").is_some() {
            self.set("output", format!("condor_log/{}/$(Cluster).out", job_name));
        }
        if self.get("error").is_some() {
            self.set("error", format!("condor_log/{}/$(Cluster).err", job_name));
        }
        if self.get("log").is_some() {
            self.set("log", format!("{}.log", job_name));
        }

        debug!("Prepared submit description for job '{}'", job_name);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn is_queue_statement(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    lower == "queue" || (lower.starts_with("queue") && lower[5..].starts_with(char::is_whitespace))
}

impl fmt::Display for SubmitDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.entries {
            writeln!(f, "{} = {}", key, value)?;
        }
        if let Some(queue) = &self.queue {
            if queue.is_empty() {
                writeln!(f, "queue")?;
            } else {
                writeln!(f, "queue {}", queue)?;
            }
        }
        Ok(())
    }
}

/// A submit file loaded from disk.
#[derive(Debug, Clone)]
pub struct JobTemplate {
    /// Job name (the submit file stem)
    pub name: String,
    /// Where the submit file was read from
    pub path: PathBuf,
    pub submit: SubmitDescription,
}

impl JobTemplate {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, BuildError> {
        let path = path.into();
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                BuildError::InvalidSubmit(format!("cannot derive a job name from '{}'", path.display()))
            })?
            .to_string();
        let submit = SubmitDescription::load(&path)?;
        Ok(Self { name, path, submit })
    }

    /// Directory holding the submit file.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    pub fn keys(&self) -> Vec<Key> {
        self.submit.keys()
    }
}
