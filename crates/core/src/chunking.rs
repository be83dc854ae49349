use crate::config::ChunkingConfig;
use crate::font_runs::FontRun;
use crate::models::{Chunk, HierarchyPath, PageHierarchyMap, PageText};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Splits `text` into overlapping windows of at most `chunk_size` characters.
///
/// A window that would end mid-text is pulled back to the last space at or
/// before its end, provided that space lies after the window start. Windows
/// are trimmed; windows that trim to nothing are dropped.
pub fn chunk_text(text: &str, config: ChunkingConfig) -> Vec<String> {
    let (chunk_size, overlap) = config.effective();
    let chars = text.chars().collect::<Vec<_>>();
    let mut chunks = Vec::new();

    let mut start = 0;
    while start < chars.len() {
        let mut end = (start + chunk_size).min(chars.len());

        if end < chars.len() {
            let space = chars[start..=end]
                .iter()
                .rposition(|ch| *ch == ' ')
                .map(|offset| start + offset);
            if let Some(space) = space.filter(|space| *space > start) {
                end = space;
            }
        }

        let piece = chars[start..end].iter().collect::<String>();
        let piece = piece.trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }

        if end == chars.len() {
            break;
        }
        start = (start + 1).max(end.saturating_sub(overlap));
    }

    chunks
}

/// Chunks every non-blank page in page order, carrying the outline hierarchy
/// forward until the next page that has its own entry.
pub fn chunk_text_with_outline_metadata(
    pages: &[PageText],
    outline: &PageHierarchyMap,
    source_path: &Path,
    config: ChunkingConfig,
) -> Vec<Chunk> {
    let source = source_path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| source_path.to_string_lossy().to_string());

    let ordered = pages
        .iter()
        .map(|page| (page.number, page.text.as_str()))
        .collect::<BTreeMap<_, _>>();

    let mut chunks = Vec::new();
    let mut chunk_index = 0u64;
    let mut current = HierarchyPath::default();

    for (page_number, text) in ordered {
        if text.trim().is_empty() {
            continue;
        }

        if let Some(hierarchy) = outline.get(&page_number) {
            current = hierarchy.clone();
            debug!(page = page_number, hierarchy = %current.display(), "outline hierarchy");
        }

        for content in chunk_text(text, config) {
            chunks.push(Chunk::new(
                content,
                &source,
                page_number,
                &current,
                chunk_index,
            ));
            chunk_index += 1;
        }
    }

    chunks
}

/// Builds a chapter-only hierarchy from the first header-sized line of each
/// page. Used for documents that carry no outline.
pub fn hierarchy_from_font_headers(font_runs: &BTreeMap<u32, Vec<FontRun>>) -> PageHierarchyMap {
    font_runs
        .iter()
        .filter_map(|(page, runs)| {
            let header = runs.iter().find(|run| run.is_header())?;
            let title = header.clean_text();
            if title.is_empty() {
                return None;
            }
            Some((
                *page,
                HierarchyPath {
                    chapter: Some(title),
                    heading: None,
                    subheading: None,
                },
            ))
        })
        .collect()
}
