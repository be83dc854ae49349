use crate::error::IngestError;
use crate::font_runs::TextPosition;
use crate::models::PageText;
use crate::outline::{Destination, DestinationIndex, OutlineEntry};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use tracing::{debug, warn};

/// `TJ` adjustments at or below this (thousandths of text space) read as a
/// word gap.
const KERNING_SPACE_THRESHOLD: f32 = -200.0;
const DEFAULT_FONT_SIZE_PT: f32 = 12.0;
/// Bound on chained indirect references.
const MAX_REFERENCE_DEPTH: usize = 32;

/// Everything the pipeline reads out of one PDF.
#[derive(Debug, Clone, Default)]
pub struct RawDocument {
    pub page_count: u32,
    pub pages: Vec<PageText>,
    pub positions: BTreeMap<u32, Vec<TextPosition>>,
    pub outline: Vec<OutlineEntry>,
    pub destinations: DestinationIndex,
}

pub trait PdfExtractor {
    fn extract(&self, path: &Path) -> Result<RawDocument, IngestError>;
}

#[derive(Debug, Default)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract(&self, path: &Path) -> Result<RawDocument, IngestError> {
        let document = Document::load(path).map_err(|error| {
            IngestError::PdfParse(format!("{}: {error}", path.display()))
        })?;

        let page_ids = document.get_pages();
        let mut pages = Vec::with_capacity(page_ids.len());
        let mut positions = BTreeMap::new();

        for (&page_no, &page_id) in &page_ids {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::PdfParse(format!("page {page_no}: {error}")))?;
            pages.push(PageText {
                number: page_no,
                text,
            });
            positions.insert(page_no, page_positions(&document, page_id));
        }

        let catalog = catalog(&document);
        let outline = catalog
            .map(|catalog| read_outline(&document, catalog))
            .unwrap_or_default();
        let destinations = DestinationIndex {
            page_count: page_ids.len() as u32,
            page_numbers: page_ids.iter().map(|(number, id)| (*id, *number)).collect(),
            catalog: catalog
                .map(|catalog| catalog_dests(&document, catalog))
                .unwrap_or_default(),
            names: catalog
                .map(|catalog| name_tree_dests(&document, catalog))
                .unwrap_or_default(),
        };

        debug!(
            path = %path.display(),
            pages = pages.len(),
            outline_roots = outline.len(),
            "parsed pdf"
        );

        Ok(RawDocument {
            page_count: page_ids.len() as u32,
            pages,
            positions,
            outline,
            destinations,
        })
    }
}

/// Text pieces of one page with the font size in effect when each was shown.
/// An undecodable content stream yields no positions rather than an error.
fn page_positions(document: &Document, page_id: ObjectId) -> Vec<TextPosition> {
    match document
        .get_page_content(page_id)
        .map_err(|error| error.to_string())
        .and_then(|bytes| Content::decode(&bytes).map_err(|error| error.to_string()))
    {
        Ok(content) => positions_from_operations(&content.operations),
        Err(error) => {
            warn!(page = ?page_id, %error, "could not decode page content");
            Vec::new()
        }
    }
}

/// Affine matrix `[a b c d e f]` in PDF row-vector order.
type Matrix = [f32; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

fn multiply(left: &Matrix, right: &Matrix) -> Matrix {
    let [a1, b1, c1, d1, e1, f1] = *left;
    let [a2, b2, c2, d2, e2, f2] = *right;
    [
        a1 * a2 + b1 * c2,
        a1 * b2 + b1 * d2,
        c1 * a2 + d1 * c2,
        c1 * b2 + d1 * d2,
        e1 * a2 + f1 * c2 + e2,
        e1 * b2 + f1 * d2 + f2,
    ]
}

fn matrix(operands: &[Object]) -> Option<Matrix> {
    let values = operands.iter().map(number).collect::<Option<Vec<_>>>()?;
    values.try_into().ok()
}

/// Graphics and text state needed to know the rendered size of each glyph
/// and where lines break.
struct TextState {
    ctm: Matrix,
    saved: Vec<Matrix>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    font_size: f32,
}

impl TextState {
    fn new() -> Self {
        Self {
            ctm: IDENTITY,
            saved: Vec::new(),
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            font_size: DEFAULT_FONT_SIZE_PT,
        }
    }

    /// `Tf` size scaled by the vertical scale of the text matrix and CTM.
    fn effective_size(&self) -> f32 {
        let [_, b, _, d, _, _] = multiply(&self.text_matrix, &self.ctm);
        let scale = (b * b + d * d).sqrt();
        self.font_size.abs() * scale
    }

    /// Moves to the next line by `(tx, ty)`. Returns whether the baseline
    /// changed.
    fn move_line(&mut self, tx: f32, ty: f32) -> bool {
        self.line_matrix = multiply(&[1.0, 0.0, 0.0, 1.0, tx, ty], &self.line_matrix);
        self.text_matrix = self.line_matrix;
        ty != 0.0
    }
}

fn positions_from_operations(operations: &[Operation]) -> Vec<TextPosition> {
    let mut positions = Vec::new();
    let mut state = TextState::new();

    for operation in operations {
        let operands = operation.operands.as_slice();
        match operation.operator.as_str() {
            "q" => state.saved.push(state.ctm),
            "Q" => {
                if let Some(ctm) = state.saved.pop() {
                    state.ctm = ctm;
                }
            }
            "cm" => {
                if let Some(m) = matrix(operands) {
                    state.ctm = multiply(&m, &state.ctm);
                }
            }
            "BT" => {
                state.text_matrix = IDENTITY;
                state.line_matrix = IDENTITY;
            }
            "Tf" => {
                if let Some(size) = operands.get(1).and_then(number) {
                    state.font_size = size;
                }
            }
            "Tm" => {
                if let Some(m) = matrix(operands) {
                    let baseline_moved = m[5] != state.line_matrix[5];
                    state.text_matrix = m;
                    state.line_matrix = m;
                    if baseline_moved {
                        positions.push(TextPosition::new("\n", state.effective_size()));
                    }
                }
            }
            "Td" | "TD" => {
                let tx = operands.first().and_then(number).unwrap_or(0.0);
                let ty = operands.get(1).and_then(number).unwrap_or(0.0);
                if state.move_line(tx, ty) {
                    positions.push(TextPosition::new("\n", state.effective_size()));
                } else if tx != 0.0 {
                    positions.push(TextPosition::new(" ", state.effective_size()));
                }
            }
            "T*" => {
                state.move_line(0.0, 0.0);
                positions.push(TextPosition::new("\n", state.effective_size()));
            }
            "Tj" => push_string(&mut positions, operands.first(), state.effective_size()),
            "'" => {
                state.move_line(0.0, 0.0);
                positions.push(TextPosition::new("\n", state.effective_size()));
                push_string(&mut positions, operands.first(), state.effective_size());
            }
            "\"" => {
                state.move_line(0.0, 0.0);
                positions.push(TextPosition::new("\n", state.effective_size()));
                push_string(&mut positions, operands.get(2), state.effective_size());
            }
            "TJ" => {
                let size = state.effective_size();
                if let Some(Object::Array(items)) = operands.first() {
                    for item in items {
                        match item {
                            Object::String(..) => push_string(&mut positions, Some(item), size),
                            other => {
                                if number(other).is_some_and(|gap| gap <= KERNING_SPACE_THRESHOLD) {
                                    positions.push(TextPosition::new(" ", size));
                                }
                            }
                        }
                    }
                }
            }
            "ET" => positions.push(TextPosition::new("\n", state.effective_size())),
            _ => {}
        }
    }

    positions
}

fn push_string(positions: &mut Vec<TextPosition>, operand: Option<&Object>, font_size: f32) {
    if let Some(Object::String(bytes, _)) = operand {
        let text = decode_text_string(bytes);
        if !text.is_empty() {
            positions.push(TextPosition::new(text, font_size));
        }
    }
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

/// Decodes a PDF text string: UTF-16BE or UTF-8 when marked with a byte
/// order mark, otherwise one character per byte.
pub fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect::<Vec<_>>();
        return String::from_utf16_lossy(&units);
    }
    if let Some(utf8) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(utf8).into_owned();
    }
    bytes.iter().map(|byte| char::from(*byte)).collect()
}

/// Follows indirect references until a direct object is reached.
fn resolve<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Object> {
    let mut current = object;
    for _ in 0..MAX_REFERENCE_DEPTH {
        match current {
            Object::Reference(id) => current = document.get_object(*id).ok()?,
            direct => return Some(direct),
        }
    }
    None
}

fn dict_entry<'a>(document: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    resolve(document, dict.get(key).ok()?)
}

fn as_dict<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    match resolve(document, object)? {
        Object::Dictionary(dict) => Some(dict),
        Object::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}

fn catalog(document: &Document) -> Option<&Dictionary> {
    as_dict(document, document.trailer.get(b"Root").ok()?)
}

fn read_outline(document: &Document, catalog: &Dictionary) -> Vec<OutlineEntry> {
    let Some(outlines) = dict_entry(document, catalog, b"Outlines").and_then(|o| as_dict(document, o))
    else {
        return Vec::new();
    };

    let mut visited = HashSet::new();
    read_siblings(document, outlines.get(b"First").ok(), &mut visited)
}

/// Reads a `/First` → `/Next` chain. An item already visited ends the chain,
/// so a cyclic outline still terminates.
fn read_siblings<'a>(
    document: &'a Document,
    first: Option<&'a Object>,
    visited: &mut HashSet<ObjectId>,
) -> Vec<OutlineEntry> {
    let mut entries = Vec::new();
    let mut next = first;

    while let Some(link) = next {
        if let Object::Reference(id) = link {
            if !visited.insert(*id) {
                debug!(object = ?id, "outline cycle detected");
                break;
            }
        }
        let Some(item) = as_dict(document, link) else {
            break;
        };

        let title = dict_entry(document, item, b"Title")
            .and_then(|title| match title {
                Object::String(bytes, _) => Some(decode_text_string(bytes)),
                _ => None,
            })
            .unwrap_or_default();

        let mut entry = OutlineEntry::new(title.trim());
        entry.destination = dict_entry(document, item, b"Dest").and_then(|dest| destination(document, dest));
        entry.go_to = dict_entry(document, item, b"A").and_then(|action| go_to(document, action));
        entry.children = read_siblings(document, item.get(b"First").ok(), visited);
        entries.push(entry);

        next = item.get(b"Next").ok();
    }

    entries
}

fn go_to(document: &Document, action: &Object) -> Option<Destination> {
    let action = as_dict(document, action)?;
    match dict_entry(document, action, b"S")? {
        Object::Name(kind) if kind.as_slice() == b"GoTo" => {
            destination(document, dict_entry(document, action, b"D")?)
        }
        _ => None,
    }
}

/// An explicit `[page /XYZ ...]` array or a destination name.
fn destination(document: &Document, object: &Object) -> Option<Destination> {
    match resolve(document, object)? {
        Object::Array(items) => match items.first()? {
            Object::Reference(page) => Some(Destination::Page(*page)),
            _ => None,
        },
        Object::Name(name) => Some(Destination::Named(String::from_utf8_lossy(name).into_owned())),
        Object::String(bytes, _) => Some(Destination::Named(decode_text_string(bytes))),
        // A destination dictionary wraps the array in /D.
        Object::Dictionary(dict) => destination(document, dict_entry(document, dict, b"D")?),
        _ => None,
    }
}

fn catalog_dests(document: &Document, catalog: &Dictionary) -> HashMap<String, Destination> {
    let Some(dests) = dict_entry(document, catalog, b"Dests").and_then(|d| as_dict(document, d)) else {
        return HashMap::new();
    };

    dests
        .iter()
        .filter_map(|(name, value)| {
            let destination = destination(document, value)?;
            Some((String::from_utf8_lossy(name).into_owned(), destination))
        })
        .collect()
}

fn name_tree_dests(document: &Document, catalog: &Dictionary) -> HashMap<String, Destination> {
    let mut flattened = HashMap::new();
    let root = dict_entry(document, catalog, b"Names")
        .and_then(|names| as_dict(document, names))
        .and_then(|names| names.get(b"Dests").ok());

    if let Some(root) = root {
        let mut visited = HashSet::new();
        flatten_name_tree(document, root, &mut visited, &mut flattened);
    }
    flattened
}

fn flatten_name_tree(
    document: &Document,
    node: &Object,
    visited: &mut HashSet<ObjectId>,
    flattened: &mut HashMap<String, Destination>,
) {
    if let Object::Reference(id) = node {
        if !visited.insert(*id) {
            return;
        }
    }
    let Some(node) = as_dict(document, node) else {
        return;
    };

    if let Some(Object::Array(pairs)) = dict_entry(document, node, b"Names") {
        for pair in pairs.chunks_exact(2) {
            let name = match resolve(document, &pair[0]) {
                Some(Object::String(bytes, _)) => decode_text_string(bytes),
                Some(Object::Name(bytes)) => String::from_utf8_lossy(bytes).into_owned(),
                _ => continue,
            };
            if let Some(destination) = destination(document, &pair[1]) {
                flattened.insert(name, destination);
            }
        }
    }

    if let Some(Object::Array(kids)) = dict_entry(document, node, b"Kids") {
        for kid in kids {
            flatten_name_tree(document, kid, visited, flattened);
        }
    }
}
