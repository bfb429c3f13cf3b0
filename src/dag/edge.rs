//! Layer Edges
//!
//! An edge describes how the job instances of a layer depend on the job
//! instances of the layer before it.
//!
//! # Edge Types
//!
//! | Choice       | Behavior                                                    |
//! |--------------|-------------------------------------------------------------|
//! | `many2many`  | Every child waits for every parent (default)                |
//! | `one2one`    | Child `i` waits for parent `i`; layers must be equal length |
//! | `group`      | Parents and children are chunked, chunk `i` links to chunk `i` |
//! | `slice`      | Only the sliced parents link to the sliced children        |

use std::fmt;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::BuildError;

/// `start:stop:step` selection over job indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SliceDef")]
pub struct SliceSpec {
    pub start: Option<i64>,
    pub stop: Option<i64>,
    pub step: i64,
}

impl Default for SliceSpec {
    fn default() -> Self {
        Self {
            start: None,
            stop: None,
            step: 1,
        }
    }
}

impl SliceSpec {
    pub fn new(start: Option<i64>, stop: Option<i64>, step: i64) -> Self {
        Self { start, stop, step }
    }
}

/// Parses `start,end,step` text. Blank fields are open; a missing step is 1.
///
/// # Example
/// ```
/// use dagweaver::dag::SliceSpec;
///
/// let slice: SliceSpec = "0, 10, 2".parse().unwrap();
/// assert_eq!(slice, SliceSpec::new(Some(0), Some(10), 2));
///
/// let open: SliceSpec = ",,-1".parse().unwrap();
/// assert_eq!(open, SliceSpec::new(None, None, -1));
/// ```
impl FromStr for SliceSpec {
    type Err = BuildError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let compact = text.replace(' ', "");
        let fields: Vec<&str> = compact.split(',').collect();
        if fields.len() > 3 {
            return Err(BuildError::InvalidSlice(format!(
                "'{}' has more than 3 fields (expected start,end,step)",
                text
            )));
        }

        let field = |i: usize| -> Result<Option<i64>, BuildError> {
            match fields.get(i).copied() {
                None | Some("") => Ok(None),
                Some(f) => f.parse().map(Some).map_err(|_| {
                    BuildError::InvalidSlice(format!("'{}' is not an integer in '{}'", f, text))
                }),
            }
        };

        Ok(Self {
            start: field(0)?,
            stop: field(1)?,
            step: field(2)?.unwrap_or(1),
        })
    }
}

impl fmt::Display for SliceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = |b: Option<i64>| b.map(|n| n.to_string()).unwrap_or_default();
        write!(f, "[{}:{}:{}]", bound(self.start), bound(self.stop), self.step)
    }
}

/// Accepted YAML forms for a slice.
#[derive(Deserialize)]
#[serde(untagged)]
enum SliceDef {
    Text(String),
    Fields {
        #[serde(default)]
        start: Option<i64>,
        #[serde(default, alias = "end")]
        stop: Option<i64>,
        #[serde(default)]
        step: Option<i64>,
    },
}

impl TryFrom<SliceDef> for SliceSpec {
    type Error = BuildError;

    fn try_from(def: SliceDef) -> Result<Self, Self::Error> {
        match def {
            SliceDef::Text(text) => text.parse(),
            SliceDef::Fields { start, stop, step } => Ok(Self::new(start, stop, step.unwrap_or(1))),
        }
    }
}

/// Fully-resolved edge between two adjacent layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EdgeSpec {
    ManyToMany,
    OneToOne,
    Grouper {
        parent_chunk: usize,
        child_chunk: usize,
    },
    Slicer {
        parent_slice: SliceSpec,
        child_slice: SliceSpec,
    },
}

impl fmt::Display for EdgeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ManyToMany => write!(f, "ManyToMany"),
            Self::OneToOne => write!(f, "OneToOne"),
            Self::Grouper {
                parent_chunk,
                child_chunk,
            } => write!(f, "Grouper(parent={}, child={})", parent_chunk, child_chunk),
            Self::Slicer {
                parent_slice,
                child_slice,
            } => write!(f, "Slicer(parent={}, child={})", parent_slice, child_slice),
        }
    }
}

/// The edge type a user asked for, before its parameters are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum EdgeChoice {
    #[default]
    ManyToMany,
    OneToOne,
    Grouper,
    Slicer,
}

/// Unrecognized choices fall back to ManyToMany.
impl From<&str> for EdgeChoice {
    fn from(choice: &str) -> Self {
        let normalized: String = choice
            .trim()
            .to_ascii_lowercase()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect();

        match normalized.as_str() {
            "2" | "one2one" | "onetoone" => Self::OneToOne,
            "3" | "group" | "grouper" | "grouping" => Self::Grouper,
            "4" | "slice" | "slicer" | "slicing" => Self::Slicer,
            "1" | "many2many" | "manytomany" => Self::ManyToMany,
            other => {
                debug!("Unrecognized edge choice '{}', using ManyToMany", other);
                Self::ManyToMany
            }
        }
    }
}

impl From<String> for EdgeChoice {
    fn from(choice: String) -> Self {
        Self::from(choice.as_str())
    }
}

/// Optional edge parameters. Chunk sizes default to 1 and slices default
/// to the whole layer.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EdgeParams {
    #[serde(default)]
    pub parent_chunk: Option<i64>,
    #[serde(default)]
    pub child_chunk: Option<i64>,
    #[serde(default)]
    pub parent_slice: Option<SliceSpec>,
    #[serde(default)]
    pub child_slice: Option<SliceSpec>,
}

/// Resolves a choice and its parameters into a validated edge.
///
/// # Example
/// ```
/// use dagweaver::dag::{resolve_edge, EdgeChoice, EdgeParams, EdgeSpec};
///
/// let params = EdgeParams { parent_chunk: Some(2), child_chunk: Some(3), ..Default::default() };
/// let edge = resolve_edge(EdgeChoice::from("group"), &params).unwrap();
/// assert_eq!(edge, EdgeSpec::Grouper { parent_chunk: 2, child_chunk: 3 });
/// ```
pub fn resolve_edge(choice: EdgeChoice, params: &EdgeParams) -> Result<EdgeSpec, BuildError> {
    let edge = match choice {
        EdgeChoice::ManyToMany => EdgeSpec::ManyToMany,
        EdgeChoice::OneToOne => EdgeSpec::OneToOne,
        EdgeChoice::Grouper => {
            let parent = params.parent_chunk.unwrap_or(1);
            let child = params.child_chunk.unwrap_or(1);
            match (usize::try_from(parent), usize::try_from(child)) {
                (Ok(p), Ok(c)) if p > 0 && c > 0 => EdgeSpec::Grouper {
                    parent_chunk: p,
                    child_chunk: c,
                },
                _ => return Err(BuildError::InvalidChunkSize { parent, child }),
            }
        }
        EdgeChoice::Slicer => {
            let parent_slice = params.parent_slice.unwrap_or_default();
            let child_slice = params.child_slice.unwrap_or_default();
            for (side, slice) in [("parent", parent_slice), ("child", child_slice)] {
                if slice.step == 0 {
                    return Err(BuildError::InvalidSlice(format!(
                        "{} slice {} has a zero step",
                        side, slice
                    )));
                }
            }
            EdgeSpec::Slicer {
                parent_slice,
                child_slice,
            }
        }
    };

    debug!("Resolved edge: {}", edge);
    Ok(edge)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choice_parsing() {
        assert_eq!(EdgeChoice::from("2"), EdgeChoice::OneToOne);
        assert_eq!(EdgeChoice::from("One2One"), EdgeChoice::OneToOne);
        assert_eq!(EdgeChoice::from("one_to_one"), EdgeChoice::OneToOne);
        assert_eq!(EdgeChoice::from("group"), EdgeChoice::Grouper);
        assert_eq!(EdgeChoice::from("4"), EdgeChoice::Slicer);
        assert_eq!(EdgeChoice::from("many2many"), EdgeChoice::ManyToMany);
    }

    #[test]
    fn test_unknown_choice_defaults_to_many_to_many() {
        let choice = EdgeChoice::from("zigzag");
        assert_eq!(choice, EdgeChoice::ManyToMany);
        let edge = resolve_edge(choice, &EdgeParams::default()).unwrap();
        assert_eq!(edge, EdgeSpec::ManyToMany);
    }

    #[test]
    fn test_grouper_defaults_to_unit_chunks() {
        let edge = resolve_edge(EdgeChoice::Grouper, &EdgeParams::default()).unwrap();
        assert_eq!(
            edge,
            EdgeSpec::Grouper {
                parent_chunk: 1,
                child_chunk: 1
            }
        );
    }

    #[test]
    fn test_grouper_rejects_non_positive_chunks() {
        for (parent, child) in [(0, 1), (1, 0), (-2, 3)] {
            let params = EdgeParams {
                parent_chunk: Some(parent),
                child_chunk: Some(child),
                ..Default::default()
            };
            let result = resolve_edge(EdgeChoice::Grouper, &params);
            assert!(matches!(result, Err(BuildError::InvalidChunkSize { .. })));
        }
    }

    #[test]
    fn test_slicer_rejects_zero_step() {
        let params = EdgeParams {
            child_slice: Some(SliceSpec::new(Some(0), Some(4), 0)),
            ..Default::default()
        };
        let result = resolve_edge(EdgeChoice::Slicer, &params);
        match result {
            Err(BuildError::InvalidSlice(msg)) => assert!(msg.contains("child")),
            other => panic!("Expected InvalidSlice, got {:?}", other),
        }
    }

    #[test]
    fn test_slicer_defaults_to_full_slices() {
        let edge = resolve_edge(EdgeChoice::Slicer, &EdgeParams::default()).unwrap();
        assert_eq!(
            edge,
            EdgeSpec::Slicer {
                parent_slice: SliceSpec::default(),
                child_slice: SliceSpec::default()
            }
        );
        assert_eq!(edge.to_string(), "Slicer(parent=[::1], child=[::1])");
    }

    #[test]
    fn test_slice_parse_errors() {
        assert!("1,2,3,4".parse::<SliceSpec>().is_err());
        assert!("a,2".parse::<SliceSpec>().is_err());
        assert_eq!("5".parse::<SliceSpec>().unwrap(), SliceSpec::new(Some(5), None, 1));
    }

    #[test]
    fn test_edge_params_deserialize() {
        let yaml = r#"
parent_chunk: 2
parent_slice: "0,10,2"
child_slice: { start: 1, end: 5 }
"#;
        let params: EdgeParams = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(params.parent_chunk, Some(2));
        assert_eq!(params.child_chunk, None);
        assert_eq!(params.parent_slice, Some(SliceSpec::new(Some(0), Some(10), 2)));
        assert_eq!(params.child_slice, Some(SliceSpec::new(Some(1), Some(5), 1)));
    }

    #[test]
    fn test_edge_serializes_tagged() {
        let json = serde_json::to_string(&EdgeSpec::Grouper {
            parent_chunk: 2,
            child_chunk: 1,
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"grouper","parent_chunk":2,"child_chunk":1}"#);
    }
}
