//! Local corpus loading for `rag index`.

use std::fs;
use std::path::{Path, PathBuf};

use rag_core::Document;

use crate::splitter::RecursiveSplitter;

/// Collect indexable files under `path`, sorted for stable source keys.
pub fn collect_files(path: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    if path.is_file() {
        if is_supported_file(path) {
            files.push(path.to_path_buf());
        }
    } else if path.is_dir() {
        for entry in fs::read_dir(path)? {
            let entry_path = entry?.path();

            if entry_path.is_dir() {
                files.extend(collect_files(&entry_path)?);
            } else if is_supported_file(&entry_path) {
                files.push(entry_path);
            }
        }
    }

    files.sort();
    Ok(files)
}

fn is_supported_file(path: &Path) -> bool {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    matches!(ext, "md" | "txt")
}

/// Turns files into passages keyed `{file name}-{i}`.
///
/// `i` runs across every file loaded, so two files sharing a name in
/// different directories still get distinct keys.
pub struct CorpusLoader {
    splitter: RecursiveSplitter,
    next_index: usize,
}

impl CorpusLoader {
    pub fn new(splitter: RecursiveSplitter) -> Self {
        Self {
            splitter,
            next_index: 0,
        }
    }

    pub fn load(&mut self, file: &Path) -> std::io::Result<Vec<Document>> {
        let text = fs::read_to_string(file)?;
        let source = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.display().to_string());

        let docs: Vec<Document> = self
            .splitter
            .split(&text)
            .into_iter()
            .enumerate()
            .map(|(i, passage)| Document::from_source(passage, &source, self.next_index + i))
            .collect();

        self.next_index += docs.len();
        Ok(docs)
    }
}
