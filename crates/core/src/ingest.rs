use crate::chunking::{chunk_text_with_outline_metadata, hierarchy_from_font_headers};
use crate::config::IngestionOptions;
use crate::extractor::{PdfExtractor, RawDocument};
use crate::font_runs::{extract_font_runs, FontRun};
use crate::models::Chunk;
use crate::outline::resolve_outline;
use crate::IngestError;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::{debug, info};

/// Parses `path` and turns it into chunks. Writes the chunk artifact when
/// one is configured.
pub fn process_pdf(
    path: &Path,
    extractor: &dyn PdfExtractor,
    options: &IngestionOptions,
) -> Result<Vec<Chunk>, IngestError> {
    options.chunking.validate()?;
    if path.file_name().is_none() {
        return Err(IngestError::MissingFileName(path.display().to_string()));
    }

    info!(path = %path.display(), "processing pdf");
    let document = extractor.extract(path)?;
    let chunks = process_document(&document, path, options);

    if let Some(artifact) = &options.artifact_path {
        write_chunk_artifact(&chunks, artifact)?;
        info!(path = %artifact.display(), chunk_count = chunks.len(), "wrote chunk artifact");
    }

    Ok(chunks)
}

/// Font runs and outline first, then the chunker. When the outline yields
/// nothing and the fallback is enabled, header-sized lines stand in for it.
pub fn process_document(
    document: &RawDocument,
    source_path: &Path,
    options: &IngestionOptions,
) -> Vec<Chunk> {
    let font_runs = document
        .positions
        .iter()
        .map(|(page, positions)| (*page, extract_font_runs(positions)))
        .collect::<BTreeMap<u32, Vec<FontRun>>>();

    for (page, runs) in &font_runs {
        for run in runs.iter().filter(|run| run.is_header()) {
            debug!(page, header = %run, "header run");
        }
    }

    let mut hierarchy = resolve_outline(&document.outline, &document.destinations);
    if hierarchy.is_empty() && options.font_header_fallback {
        hierarchy = hierarchy_from_font_headers(&font_runs);
        debug!(entries = hierarchy.len(), "using font headers as hierarchy");
    }

    let chunks = chunk_text_with_outline_metadata(
        &document.pages,
        &hierarchy,
        source_path,
        options.chunking,
    );

    info!(
        pages = document.page_count,
        outline_pages = hierarchy.len(),
        chunk_count = chunks.len(),
        "chunked document"
    );
    chunks
}

/// Indented JSON array of every chunk. Overwrites `path`.
pub fn write_chunk_artifact(chunks: &[Chunk], path: &Path) -> Result<(), IngestError> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), chunks)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChunkingConfig;
    use crate::font_runs::TextPosition;
    use crate::models::PageText;
    use crate::outline::{Destination, DestinationIndex, OutlineEntry};
    use std::collections::HashMap;
    use std::fs;
    use tempfile::tempdir;

    struct FixedExtractor(RawDocument);

    impl PdfExtractor for FixedExtractor {
        fn extract(&self, _path: &Path) -> Result<RawDocument, IngestError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenExtractor;

    impl PdfExtractor for BrokenExtractor {
        fn extract(&self, path: &Path) -> Result<RawDocument, IngestError> {
            Err(IngestError::PdfParse(format!("{} is not a pdf", path.display())))
        }
    }

    fn raw_document(outline: Vec<OutlineEntry>) -> RawDocument {
        let pages = vec![
            PageText {
                number: 1,
                text: "Welcome to the Forge.".to_string(),
            },
            PageText {
                number: 2,
                text: "Swear an iron vow.".to_string(),
            },
        ];
        let mut positions = BTreeMap::new();
        positions.insert(1, vec![TextPosition::new("Welcome", 10.0)]);
        positions.insert(
            2,
            vec![
                TextPosition::new("MOVES MOVES", 26.0),
                TextPosition::new("\n", 26.0),
                TextPosition::new("Swear an iron vow.", 10.0),
            ],
        );

        RawDocument {
            page_count: 2,
            pages,
            positions,
            outline,
            destinations: DestinationIndex {
                page_count: 2,
                page_numbers: HashMap::from([((10, 0), 1), ((11, 0), 2)]),
                ..Default::default()
            },
        }
    }

    fn options(fallback: bool) -> IngestionOptions {
        IngestionOptions {
            chunking: ChunkingConfig::default(),
            font_header_fallback: fallback,
            artifact_path: None,
        }
    }

    #[test]
    fn outline_drives_chunk_hierarchy() {
        let outline = vec![OutlineEntry::new("Moves").with_destination(Destination::Page((11, 0)))];
        let chunks = process_document(&raw_document(outline), Path::new("forge.pdf"), &options(false));

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].metadata.chapter, None);
        assert_eq!(chunks[1].metadata.chapter.as_deref(), Some("Moves"));
        assert_eq!(chunks[1].metadata.chunk_index, 1);
    }

    #[test]
    fn font_headers_fill_in_for_missing_outline_when_enabled() {
        let document = raw_document(Vec::new());

        let without = process_document(&document, Path::new("forge.pdf"), &options(false));
        assert!(without.iter().all(|chunk| chunk.metadata.chapter.is_none()));

        let with = process_document(&document, Path::new("forge.pdf"), &options(true));
        assert_eq!(with[0].metadata.chapter, None);
        assert_eq!(with[1].metadata.chapter.as_deref(), Some("MOVES"));
    }

    #[test]
    fn process_pdf_writes_artifact() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let artifact = dir.path().join("chunked-output.json");
        let options = IngestionOptions {
            artifact_path: Some(artifact.clone()),
            ..options(false)
        };

        let chunks = process_pdf(
            Path::new("/books/forge.pdf"),
            &FixedExtractor(raw_document(Vec::new())),
            &options,
        )?;

        let written: Vec<Chunk> = serde_json::from_str(&fs::read_to_string(&artifact)?)?;
        assert_eq!(written, chunks);
        assert_eq!(written[0].metadata.source, "forge.pdf");
        assert!(fs::read_to_string(&artifact)?.starts_with("[\n"));
        Ok(())
    }

    #[test]
    fn parse_failure_propagates() {
        let result = process_pdf(Path::new("broken.pdf"), &BrokenExtractor, &options(false));
        assert!(matches!(result, Err(IngestError::PdfParse(_))));
    }

    #[test]
    fn zero_chunk_size_is_rejected_before_parsing() {
        let options = IngestionOptions {
            chunking: ChunkingConfig::new(0, 0),
            ..options(false)
        };
        let result = process_pdf(Path::new("forge.pdf"), &BrokenExtractor, &options);
        assert!(matches!(result, Err(IngestError::InvalidChunkConfig(_))));
    }

    #[test]
    fn path_without_file_name_is_rejected() {
        let result = process_pdf(Path::new("/"), &BrokenExtractor, &options(false));
        assert!(matches!(result, Err(IngestError::MissingFileName(_))));
    }
}
