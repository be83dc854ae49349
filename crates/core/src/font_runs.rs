//! Groups positioned glyphs into font-homogeneous lines.
//!
//! A line ends at an explicit newline or carriage return, or when the font
//! size moves by more than [`FONT_SIZE_TOLERANCE_PT`]. Lines set at or above
//! [`HEADER_FONT_SIZE_PT`] are treated as headers.

use serde::{Deserialize, Serialize};

pub const HEADER_FONT_SIZE_PT: f32 = 22.0;
pub const FONT_SIZE_TOLERANCE_PT: f32 = 0.1;

/// One rendered glyph (or glyph cluster) in content-stream order.
#[derive(Debug, Clone, PartialEq)]
pub struct TextPosition {
    pub text: String,
    pub font_size_pt: f32,
}

impl TextPosition {
    pub fn new(text: impl Into<String>, font_size_pt: f32) -> Self {
        Self {
            text: text.into(),
            font_size_pt,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FontRun {
    pub text: String,
    pub font_size_pt: f32,
}

impl FontRun {
    pub fn is_header(&self) -> bool {
        self.font_size_pt >= HEADER_FONT_SIZE_PT && !self.text.trim().is_empty()
    }

    pub fn clean_text(&self) -> String {
        deduplicate_text(&self.text)
    }
}

impl std::fmt::Display for FontRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:.1}pt] {}", self.font_size_pt, self.text)
    }
}

#[derive(Debug, Default)]
pub struct FontRunExtractor {
    runs: Vec<FontRun>,
    line: String,
    font_size_pt: f32,
    at_line_start: bool,
}

impl FontRunExtractor {
    pub fn new() -> Self {
        Self {
            at_line_start: true,
            ..Self::default()
        }
    }

    pub fn push(&mut self, position: &TextPosition) {
        let size_changed = (position.font_size_pt - self.font_size_pt).abs() > FONT_SIZE_TOLERANCE_PT;
        if self.at_line_start || size_changed {
            self.flush();
            self.font_size_pt = position.font_size_pt;
            self.at_line_start = false;
        }

        self.line.push_str(&position.text);

        if position.text == "\n" || position.text == "\r" {
            self.at_line_start = true;
        }
    }

    /// Flushes the pending line and returns every run seen on the page.
    pub fn finish_page(mut self) -> Vec<FontRun> {
        self.flush();
        self.runs
    }

    /// Whitespace-only lines (bare line breaks between text objects) are
    /// dropped.
    fn flush(&mut self) {
        let text = self.line.trim();
        if !text.is_empty() {
            self.runs.push(FontRun {
                text: text.to_string(),
                font_size_pt: self.font_size_pt,
            });
        }
        self.line.clear();
    }
}

pub fn extract_font_runs(positions: &[TextPosition]) -> Vec<FontRun> {
    let mut extractor = FontRunExtractor::new();
    for position in positions {
        extractor.push(position);
    }
    extractor.finish_page()
}

/// Repairs two PDF rendering artifacts: a phrase emitted twice ("FORGE FORGE")
/// and doubled letters ("AABBCC"). The letter pass always runs on the output
/// of the phrase pass.
pub fn deduplicate_text(text: &str) -> String {
    if text.chars().count() <= 1 {
        return text.to_string();
    }

    let words = text.split_whitespace().collect::<Vec<_>>();
    let phrase = if words.len() > 1 && words.len() % 2 == 0 {
        let (first, second) = words.split_at(words.len() / 2);
        if first == second {
            first.join(" ")
        } else {
            text.trim().to_string()
        }
    } else {
        text.trim().to_string()
    };

    let mut cleaned = String::with_capacity(phrase.len());
    let mut previous = None;
    for ch in phrase.chars() {
        if Some(ch) == previous && ch.is_alphabetic() {
            continue;
        }
        cleaned.push(ch);
        previous = Some(ch);
    }
    cleaned
}
