//! Error and Warning Types
//!
//! Validation errors abort the current construction step. Warnings never
//! abort anything: the operation continues with a documented fallback and
//! the warning is handed back to the caller (and logged).

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building parameter sets or assembling a layer chain.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("invalid range: lower={lower}, upper={upper}, step={step} (need lower < upper and step > 0)")]
    InvalidRange { lower: i64, upper: i64, step: i64 },

    #[error("value list is empty")]
    EmptyValueList,

    #[error("group {group:?} has value lists of different lengths {lengths:?}")]
    GroupSizeMismatch { group: Vec<String>, lengths: Vec<usize> },

    #[error("group {0:?} must contain at least 2 keys")]
    EmptyGroup(Vec<String>),

    #[error("group key '{0}' is not a key of this layer")]
    UnknownGroupKey(String),

    #[error("key '{0}' already belongs to another group")]
    KeyAlreadyGrouped(String),

    #[error("no values given for key '{0}'")]
    MissingValues(String),

    #[error("invalid chunk sizes: parent={parent}, child={child} (both must be > 0)")]
    InvalidChunkSize { parent: i64, child: i64 },

    #[error("invalid slice: {0}")]
    InvalidSlice(String),

    #[error("the first layer '{0}' cannot have an edge")]
    RootEdge(String),

    #[error("layer '{0}' already exists")]
    DuplicateLayer(String),

    #[error("invalid submit description: {0}")]
    InvalidSubmit(String),

    #[error("scheduler backend failed: {0}")]
    Backend(String),

    #[error("invalid job name '{0}': use no spaces or any of . / \\ : * ? \" < > |")]
    InvalidJobName(String),

    #[error("invalid argument name '{0}': use letters, digits and underscores")]
    InvalidArgument(String),

    #[error("invalid docker image '{0}': expected user/image:tag")]
    InvalidImage(String),

    #[error("'{0}' already exists")]
    AlreadyExists(PathBuf),

    #[error("cannot read '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot write '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("layer '{layer}': {source}")]
    InLayer {
        layer: String,
        #[source]
        source: Box<BuildError>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BuildError {
    /// Attaches the name of the layer being built.
    pub fn in_layer(self, layer: impl Into<String>) -> Self {
        Self::InLayer {
            layer: layer.into(),
            source: Box::new(self),
        }
    }

    pub fn read_file(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::ReadFile {
            path: path.into(),
            source,
        }
    }

    pub fn write_file(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::WriteFile {
            path: path.into(),
            source,
        }
    }
}

/// Non-fatal conditions reported while building.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// A OneToOne edge was requested between layers of different sizes
    /// and was replaced by ManyToMany.
    CardinalityDowngrade {
        layer: String,
        parent_len: usize,
        child_len: usize,
    },
    /// A queue line did not have one field per key.
    FieldCountMismatch {
        line: usize,
        expected: usize,
        found: usize,
    },
    /// A queue file named by the plan does not exist.
    MissingQueueFile(String),
    /// A pre/post script named by the plan does not exist.
    MissingScript(String),
    /// A file a staged job needs was not found next to its submit file.
    MissingJobFile(String),
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CardinalityDowngrade {
                layer,
                parent_len,
                child_len,
            } => write!(
                f,
                "Layer '{}': OneToOne needs equal job counts but parent has {} and child has {}; using ManyToMany",
                layer, parent_len, child_len
            ),
            Self::FieldCountMismatch {
                line,
                expected,
                found,
            } => write!(
                f,
                "Queue line {}: expected {} values but found {}",
                line, expected, found
            ),
            Self::MissingQueueFile(path) => {
                write!(f, "Queue file '{}' not found, using a single empty job", path)
            }
            Self::MissingScript(path) => {
                write!(f, "Script '{}' not found, skipping it", path)
            }
            Self::MissingJobFile(path) => {
                write!(f, "Job file '{}' not found, not staged", path)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_layer_wraps_source() {
        let err = BuildError::EmptyValueList.in_layer("train");
        let text = err.to_string();
        assert!(text.contains("train"));
        assert!(text.contains("empty"));
        assert!(matches!(err, BuildError::InLayer { .. }));
    }

    #[test]
    fn test_downgrade_warning_names_both_lengths() {
        let warning = Warning::CardinalityDowngrade {
            layer: "eval".to_string(),
            parent_len: 3,
            child_len: 5,
        };
        let text = warning.to_string();
        assert!(text.contains('3'));
        assert!(text.contains('5'));
        assert!(text.contains("ManyToMany"));
    }

    #[test]
    fn test_read_file_names_path() {
        let source = io::Error::new(io::ErrorKind::NotFound, "No such file or directory");
        let err = BuildError::read_file("missing/train.sub", source).in_layer("train");
        let text = err.to_string();
        assert!(text.contains("missing/train.sub"));
        assert!(text.contains("train"));
    }

    #[test]
    fn test_invalid_range_display() {
        let err = BuildError::InvalidRange {
            lower: 5,
            upper: 1,
            step: 1,
        };
        assert!(err.to_string().contains("lower=5"));
    }
}
