//! Input discovery: resolve a file or directory argument into the ordered
//! list of source files the pipeline will process.

use std::path::{Path, PathBuf};

use corpus_core::domain::DataType;
use corpus_core::{CorpusError, Result};
use tracing::debug;
use walkdir::WalkDir;

/// Resolve `input` into supported source files. Directories are walked
/// (recursively when asked) and the result is sorted, so the same tree
/// always produces the same processing order.
pub fn resolve_inputs(input: &Path, recursive: bool, supported: &[DataType]) -> Result<Vec<PathBuf>> {
    if !input.exists() {
        return Err(CorpusError::config(format!(
            "input path does not exist: {}",
            input.display()
        )));
    }

    if input.is_file() {
        if data_type_of(input, supported).is_none() {
            return Err(CorpusError::config(format!(
                "unsupported input file format: {}",
                input.display()
            )));
        }
        return Ok(vec![input.to_path_buf()]);
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();
    for entry in WalkDir::new(input).max_depth(max_depth) {
        let entry = entry.map_err(|e| {
            CorpusError::config(format!("cannot walk {}: {}", input.display(), e))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if data_type_of(entry.path(), supported).is_some() {
            files.push(entry.into_path());
        } else {
            debug!("Ignoring unsupported file {}", entry.path().display());
        }
    }
    files.sort();

    if files.is_empty() {
        return Err(CorpusError::config(format!(
            "no supported files found under {}",
            input.display()
        )));
    }
    Ok(files)
}

fn data_type_of(path: &Path, supported: &[DataType]) -> Option<DataType> {
    let extension = path.extension()?.to_str()?;
    let data_type = DataType::from_extension(extension)?;
    supported.contains(&data_type).then_some(data_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn supported() -> Vec<DataType> {
        vec![DataType::Text, DataType::Markdown, DataType::Csv]
    }

    #[test]
    fn single_file_resolves_to_itself() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        fs::write(&file, "content").unwrap();
        let files = resolve_inputs(&file, false, &supported()).unwrap();
        assert_eq!(files, vec![file]);
    }

    #[test]
    fn directory_walk_is_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();
        fs::write(dir.path().join("a.md"), "a").unwrap();
        fs::write(dir.path().join("ignore.bin"), "x").unwrap();
        let files = resolve_inputs(dir.path(), false, &supported()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.md", "b.txt"]);
    }

    #[test]
    fn non_recursive_walk_skips_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("top.txt"), "top").unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("nested.txt"), "nested").unwrap();

        let flat = resolve_inputs(dir.path(), false, &supported()).unwrap();
        assert_eq!(flat.len(), 1);
        let deep = resolve_inputs(dir.path(), true, &supported()).unwrap();
        assert_eq!(deep.len(), 2);
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(resolve_inputs(dir.path(), true, &supported()).is_err());
    }

    #[test]
    fn unsupported_single_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("report.docx");
        fs::write(&file, "x").unwrap();
        assert!(resolve_inputs(&file, false, &supported()).is_err());
    }
}
