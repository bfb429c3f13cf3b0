//! DAGMan Artifact Cleanup
//!
//! Removes the files DAGMan leaves behind after a workflow runs:
//! `<name>.dag` plus every `<name>.dag.<suffix>` file it derives from it
//! (`dagman.out`, `dagman.log`, `condor.sub`, `metrics`, `nodes.log`,
//! `lock`, `rescue001`, ...). Build descriptions such as `sweep.dag.yaml`
//! are kept. Hidden directories are not searched.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::error::BuildError;

/// Suffixes DAGMan appends to a `.dag` file name.
const ARTIFACT_SUFFIXES: &[&str] = &[
    "dagman.out",
    "dagman.log",
    "condor.sub",
    "metrics",
    "nodes.log",
    "lock",
];

/// Checks if a file name is a DAGMan artifact.
///
/// # Example
/// ```
/// use dagweaver::workspace::is_dag_artifact;
///
/// assert!(is_dag_artifact("sweep.dag"));
/// assert!(is_dag_artifact("sweep.dag.rescue002"));
/// assert!(!is_dag_artifact("sweep.dag.yaml"));
/// ```
pub fn is_dag_artifact(file_name: &str) -> bool {
    if file_name.ends_with(".dag") {
        return true;
    }
    match file_name.rsplit_once(".dag.") {
        Some((_, suffix)) => {
            suffix.starts_with("rescue") || ARTIFACT_SUFFIXES.contains(&suffix)
        }
        None => false,
    }
}

fn is_hidden_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry.file_name().to_string_lossy().starts_with('.')
}

/// Removes every DAGMan artifact under `dir` and returns the removed paths.
pub fn clean_directory(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, BuildError> {
    let dir = dir.as_ref();
    info!("Cleaning DAG artifacts in: {}", dir.display());

    let mut removed = Vec::new();
    for entry in WalkDir::new(dir)
        .into_iter()
        .filter_entry(|e| !is_hidden_dir(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let name = entry.file_name().to_string_lossy();
        if !is_dag_artifact(&name) {
            continue;
        }

        let path = entry.path();
        fs::remove_file(path).map_err(|e| BuildError::write_file(path, e))?;
        info!("Removed: {}", path.display());
        removed.push(path.to_path_buf());
    }

    debug!("Removed {} artifacts", removed.len());
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_artifact_names() {
        for name in [
            "auto_dag.dag",
            "auto_dag.dag.dagman.out",
            "auto_dag.dag.lock",
            "auto_dag.dag.rescue001",
            "auto_dag.dag.nodes.log",
        ] {
            assert!(is_dag_artifact(name), "{} is an artifact", name);
        }
        for name in ["auto_dag.dag.yaml", "train.sub", "Cargo.lock", "dagger.py", "train.log"] {
            assert!(!is_dag_artifact(name), "{} is not an artifact", name);
        }
    }

    #[test]
    fn test_clean_directory_removes_only_artifacts() {
        let temp_dir = tempdir().unwrap();
        let dir = temp_dir.path();
        let nested = dir.join("sweep");
        fs::create_dir_all(&nested).unwrap();
        fs::create_dir_all(dir.join(".git")).unwrap();

        for file in ["sweep/sweep.dag", "sweep/sweep.dag.dagman.out", "sweep/sweep.dag.lock"] {
            fs::write(dir.join(file), "").unwrap();
        }
        fs::write(nested.join("sweep.dag.yaml"), "name: sweep").unwrap();
        fs::write(nested.join("train.sub"), "executable = a.sh").unwrap();
        fs::write(dir.join(".git/old.dag"), "").unwrap();

        let mut removed = clean_directory(dir).unwrap();
        removed.sort();
        assert_eq!(removed.len(), 3);
        assert!(removed.iter().all(|p| p.starts_with(&nested)));

        assert!(nested.join("sweep.dag.yaml").exists());
        assert!(nested.join("train.sub").exists());
        assert!(dir.join(".git/old.dag").exists());
        assert!(!nested.join("sweep.dag").exists());
    }

    #[test]
    fn test_clean_empty_directory() {
        let temp_dir = tempdir().unwrap();
        assert!(clean_directory(temp_dir.path()).unwrap().is_empty());
    }
}
