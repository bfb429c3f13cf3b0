//! Queue Files
//!
//! A queue file stores one assignment per line, fields in template key
//! order, with no header and no trailing newline after the last line.
//!
//! ```text
//! 0.1 0 small
//! 0.1 3 small
//! 0.01 0 large
//! ```

use std::fs;
use std::path::Path;

use log::{debug, info, warn};

use super::assignment::{Key, VariableAssignment, VariableSet};
use super::value::Value;
use crate::error::{BuildError, Warning};

/// Field separator used when writing a queue file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Comma,
    Whitespace,
}

impl Delimiter {
    /// Picks the delimiter from a queue file's extension: `.csv` files are
    /// comma-delimited, everything else is space-delimited.
    pub fn for_path(path: impl AsRef<Path>) -> Self {
        match path.as_ref().extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Self::Comma,
            _ => Self::Whitespace,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Comma => ",",
            Self::Whitespace => " ",
        }
    }
}

/// Result of decoding queue text.
#[derive(Debug, Clone, Default)]
pub struct Decoded {
    pub vars: VariableSet,
    pub warnings: Vec<Warning>,
}

/// Encodes assignments as queue text.
///
/// Keys missing from an assignment are skipped.
///
/// # Example
/// ```
/// use dagweaver::params::{encode, Delimiter, VariableAssignment};
///
/// let vars = vec![
///     VariableAssignment::new().with("x", 1).with("y", "a"),
///     VariableAssignment::new().with("x", 2).with("y", "b"),
/// ];
/// let keys = vec!["x".to_string(), "y".to_string()];
/// assert_eq!(encode(&vars, &keys, Delimiter::Comma), "1,a\n2,b");
/// ```
pub fn encode(vars: &[VariableAssignment], keys: &[Key], delimiter: Delimiter) -> String {
    vars.iter()
        .map(|var| {
            keys.iter()
                .filter_map(|key| var.get(key))
                .map(|value| value.to_string())
                .collect::<Vec<_>>()
                .join(delimiter.as_str())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Splits one queue line. Empty comma-separated fields are kept so that
/// positions still line up with keys.
fn split_fields(line: &str) -> Vec<String> {
    if line.contains(',') {
        line.replace(' ', "")
            .split(',')
            .map(|f| f.trim().to_string())
            .collect()
    } else {
        line.split_whitespace().map(str::to_string).collect()
    }
}

/// Decodes queue text into assignments.
///
/// Lines containing a comma are split on commas (after removing spaces),
/// others on whitespace. Blank lines are skipped. A line whose field count
/// differs from the key count produces a [`Warning::FieldCountMismatch`]
/// and a partial assignment covering as many keys as there are fields.
pub fn decode(text: &str, keys: &[Key]) -> Decoded {
    let mut decoded = Decoded::default();

    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let fields = split_fields(line);

        if fields.len() != keys.len() {
            let warning = Warning::FieldCountMismatch {
                line: index + 1,
                expected: keys.len(),
                found: fields.len(),
            };
            warn!("{}", warning);
            decoded.warnings.push(warning);
        }

        let mut var = VariableAssignment::new();
        for (key, field) in keys.iter().zip(&fields) {
            var.insert(key.clone(), Value::classify(field));
        }
        decoded.vars.push(var);
    }

    debug!(
        "Decoded {} queue lines ({} warnings)",
        decoded.vars.len(),
        decoded.warnings.len()
    );
    decoded
}

/// Reads a queue file.
pub fn read_queue_file(path: impl AsRef<Path>, keys: &[Key]) -> Result<Decoded, BuildError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| BuildError::read_file(path, e))?;
    let decoded = decode(&text, keys);
    info!(
        "Read {} assignments from queue file {}",
        decoded.vars.len(),
        path.display()
    );
    Ok(decoded)
}

/// Writes a queue file, choosing the delimiter from its extension.
pub fn write_queue_file(
    path: impl AsRef<Path>,
    vars: &[VariableAssignment],
    keys: &[Key],
) -> Result<(), BuildError> {
    let path = path.as_ref();
    let text = encode(vars, keys, Delimiter::for_path(path));
    fs::write(path, text).map_err(|e| BuildError::write_file(path, e))?;
    info!("Wrote {} assignments to queue file {}", vars.len(), path.display());
    Ok(())
}
