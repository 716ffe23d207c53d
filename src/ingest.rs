//! Document ingestion: extracted manual text in, indexed chunks out.
//!
//! Re-ingesting a document replaces its chunks wholesale (delete then
//! insert), so the index never holds a mix of old and new chunk sets for
//! the same manual. Per-chunk embedding failures are isolated: the chunk
//! is skipped and counted, the rest of the document proceeds.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::chunk;
use crate::models::ChunkRecord;
use crate::page;
use crate::traits::{Embedder, VectorIndex};

/// Per-document ingestion counters.
#[derive(Debug, Default, Clone)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    pub indexed: usize,
    pub failed: usize,
}

impl IngestReport {
    fn absorb(&mut self, other: &IngestReport) {
        self.documents += other.documents;
        self.chunks += other.chunks;
        self.indexed += other.indexed;
        self.failed += other.failed;
    }
}

/// Ingest a file or a directory tree of extracted manual text.
///
/// Directories are walked recursively; `.md` and `.txt` files are
/// ingested, everything else is skipped. The document name is the file
/// stem.
pub async fn run_ingest(
    path: &Path,
    embedder: &dyn Embedder,
    index: &dyn VectorIndex,
    max_chars: usize,
) -> Result<IngestReport> {
    let files = collect_files(path)?;
    if files.is_empty() {
        bail!("No .md or .txt files found at {}", path.display());
    }

    let mut report = IngestReport::default();

    for file in &files {
        let name = document_name(file);
        let doc_report = ingest_document(file, &name, embedder, index, max_chars)
            .await
            .with_context(|| format!("Failed to ingest {}", file.display()))?;

        println!(
            "  {} — {} chunks, {} indexed, {} failed",
            name, doc_report.chunks, doc_report.indexed, doc_report.failed
        );
        report.absorb(&doc_report);
    }

    println!(
        "Ingested {} document(s): {} chunks, {} indexed, {} failed",
        report.documents, report.chunks, report.indexed, report.failed
    );

    Ok(report)
}

/// Ingest one document: chunk, attribute pages, replace the previous
/// chunk set, embed and index each chunk.
pub async fn ingest_document(
    file: &Path,
    name: &str,
    embedder: &dyn Embedder,
    index: &dyn VectorIndex,
    max_chars: usize,
) -> Result<IngestReport> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let chunks = chunk::chunk(&text, max_chars);
    let hints = page::page_hints(&text, &chunks);
    let pages = page::attribute_pages(&chunks, &hints);

    // Replace-on-reingest: the old chunk set goes first
    index.delete_document(name).await?;

    let mut report = IngestReport {
        documents: 1,
        chunks: chunks.len(),
        ..Default::default()
    };

    for (seq, (text, page)) in chunks.iter().zip(pages.iter()).enumerate() {
        let vector = match embedder.embed(text).await {
            Ok(v) if v.len() == embedder.dims() => v,
            Ok(v) => {
                warn!(
                    document = %name,
                    chunk_seq = seq,
                    got = v.len(),
                    expected = embedder.dims(),
                    "embedding has wrong dimensionality, skipping chunk"
                );
                report.failed += 1;
                continue;
            }
            Err(e) => {
                warn!(document = %name, chunk_seq = seq, error = %e, "embedding failed, skipping chunk");
                report.failed += 1;
                continue;
            }
        };

        let record = ChunkRecord {
            text: text.clone(),
            source_document: name.to_string(),
            page: *page,
            chunk_seq: seq as i64,
        };

        match index.index_chunk(&record, &vector).await {
            Ok(()) => report.indexed += 1,
            Err(e) => {
                warn!(document = %name, chunk_seq = seq, error = %e, "indexing failed, skipping chunk");
                report.failed += 1;
            }
        }
    }

    info!(
        document = %name,
        chunks = report.chunks,
        indexed = report.indexed,
        failed = report.failed,
        "document ingested"
    );

    Ok(report)
}

fn collect_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path).follow_links(true) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let ext = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if ext == "md" || ext == "txt" {
            files.push(entry.path().to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

fn document_name(file: &Path) -> String {
    file.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| file.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MemoryIndex;
    use async_trait::async_trait;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeEmbedder {
        calls: AtomicUsize,
        fail_on: Option<usize>,
        vector: Vec<f32>,
    }

    impl FakeEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_on: None,
                vector: vec![1.0, 0.0],
            }
        }

        fn failing_on(call: usize) -> Self {
            Self {
                fail_on: Some(call),
                ..Self::new()
            }
        }

        fn with_vector(vector: &[f32]) -> Self {
            Self {
                vector: vector.to_vec(),
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl Embedder for FakeEmbedder {
        fn dims(&self) -> usize {
            2
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on == Some(call) {
                bail!("embedding service unavailable");
            }
            Ok(self.vector.clone())
        }
    }

    fn write_manual(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[tokio::test]
    async fn test_ingest_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_manual(
            dir.path(),
            "bobcat-t590.md",
            "# Engine\n\noil specs [12]\n\n# Hydraulics\n\nfluid specs",
        );

        let embedder = FakeEmbedder::new();
        let index = MemoryIndex::new();
        let report = run_ingest(&file, &embedder, &index, 1000).await.unwrap();

        assert_eq!(report.documents, 1);
        assert_eq!(report.chunks, 2);
        assert_eq!(report.indexed, 2);
        assert_eq!(report.failed, 0);
        assert_eq!(index.list_documents().await.unwrap(), vec!["bobcat-t590"]);
    }

    #[tokio::test]
    async fn test_ingest_directory_skips_other_extensions() {
        let dir = tempfile::tempdir().unwrap();
        write_manual(dir.path(), "a.md", "# A\n\nalpha");
        write_manual(dir.path(), "b.txt", "# B\n\nbeta");
        write_manual(dir.path(), "c.pdf", "binary-ish");

        let embedder = FakeEmbedder::new();
        let index = MemoryIndex::new();
        let report = run_ingest(dir.path(), &embedder, &index, 1000)
            .await
            .unwrap();

        assert_eq!(report.documents, 2);
        assert_eq!(index.list_documents().await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_embed_failure_isolated_per_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_manual(
            dir.path(),
            "m.md",
            "# One\n\nalpha\n\n# Two\n\nbeta\n\n# Three\n\ngamma",
        );

        let embedder = FakeEmbedder::failing_on(1);
        let index = MemoryIndex::new();
        let report = run_ingest(&file, &embedder, &index, 1000).await.unwrap();

        assert_eq!(report.chunks, 3);
        assert_eq!(report.indexed, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(index.len(), 2);
    }

    #[tokio::test]
    async fn test_wrong_dimensionality_counted_as_failed() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_manual(dir.path(), "m.md", "# One\n\nalpha\n\n# Two\n\nbeta");

        // Three components against a declared dimensionality of two
        let embedder = FakeEmbedder::with_vector(&[1.0, 0.0, 0.5]);
        let index = MemoryIndex::new();
        let report = run_ingest(&file, &embedder, &index, 1000).await.unwrap();

        assert_eq!(report.chunks, 2);
        assert_eq!(report.indexed, 0);
        assert_eq!(report.failed, 2);
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_reingest_replaces_previous_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_manual(dir.path(), "m.md", "# One\n\na\n\n# Two\n\nb\n\n# Three\n\nc");

        let embedder = FakeEmbedder::new();
        let index = MemoryIndex::new();
        run_ingest(&file, &embedder, &index, 1000).await.unwrap();
        assert_eq!(index.len(), 3);

        let file = write_manual(dir.path(), "m.md", "# Only\n\nshorter now");
        run_ingest(&file, &embedder, &index, 1000).await.unwrap();
        assert_eq!(index.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = FakeEmbedder::new();
        let index = MemoryIndex::new();
        assert!(run_ingest(dir.path(), &embedder, &index, 1000)
            .await
            .is_err());
    }
}
