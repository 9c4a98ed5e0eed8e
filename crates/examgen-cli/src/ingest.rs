//! Corpus ingestion: load plain-text documents and split them into
//! overlapping chunks for the retrieval index.

use std::path::Path;

use anyhow::{Context, Result};

/// Target chunk length in chars.
pub const CHUNK_SIZE: usize = 900;

/// Overlap carried between consecutive chunks so context spanning a
/// boundary is not lost.
pub const CHUNK_OVERLAP: usize = 150;

/// Read every `.txt`/`.md` file in `dir`, sorted by name. Returns
/// (file name, content) pairs.
pub fn load_directory(dir: &Path) -> Result<Vec<(String, String)>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("reading corpus directory {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_text = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| matches!(e.to_lowercase().as_str(), "txt" | "md"));
        if !is_text {
            continue;
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        files.push((name, content));
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

/// Split text into chunks of at most `chunk_size` chars, each sharing
/// `overlap` chars with its predecessor. Char-based so multi-byte
/// corpus text never splits mid-codepoint.
pub fn split_chunks(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let step = chunk_size.saturating_sub(overlap).max(1);

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        let chunk: String = chars[start..end].iter().collect();
        let trimmed = chunk.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = split_chunks("a short paragraph", CHUNK_SIZE, CHUNK_OVERLAP);
        assert_eq!(chunks, vec!["a short paragraph".to_string()]);
    }

    #[test]
    fn test_empty_text_no_chunks() {
        assert!(split_chunks("", CHUNK_SIZE, CHUNK_OVERLAP).is_empty());
        assert!(split_chunks("   \n  ", CHUNK_SIZE, CHUNK_OVERLAP).is_empty());
    }

    #[test]
    fn test_chunks_respect_size_bound() {
        let text = "word ".repeat(1000);
        let chunks = split_chunks(&text, CHUNK_SIZE, CHUNK_OVERLAP);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= CHUNK_SIZE));
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        // Distinct chars so overlap is observable.
        let text: String = (0..2000).map(|i| ((i % 26) as u8 + b'a') as char).collect();
        let chunks = split_chunks(&text, 900, 150);

        let tail: String = chunks[0].chars().skip(900 - 150).collect();
        assert!(chunks[1].starts_with(&tail));
    }

    #[test]
    fn test_multibyte_text_survives_splitting() {
        let text = "ção é à ".repeat(300);
        let chunks = split_chunks(&text, 900, 150);
        assert!(chunks.iter().all(|c| c.contains('ç')));
    }

    #[test]
    fn test_load_directory_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "bravo").unwrap();
        fs::write(dir.path().join("a.md"), "alpha").unwrap();
        fs::write(dir.path().join("skip.pdf"), "binary").unwrap();

        let files = load_directory(dir.path()).unwrap();
        let names: Vec<&str> = files.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a.md", "b.txt"]);
        assert_eq!(files[1].1, "bravo");
    }

    #[test]
    fn test_load_missing_directory_errors() {
        let result = load_directory(Path::new("/nonexistent/examgen-docs"));
        assert!(result.is_err());
    }
}
