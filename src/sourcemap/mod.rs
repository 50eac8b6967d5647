//! Source maps (v3) and their composition across transform stages.
//!
//! # Module Structure
//!
//! ```text
//! sourcemap/
//! ├── vlq      # Base64 VLQ codec for `mappings`
//! ├── chain    # Lazy chain of per-stage fragments (SourcemapChain)
//! └── mod.rs   # SourceMap, lookup, compose, MapBuilder (this file)
//! ```
//!
//! Every stage that rewrites a node's text contributes one fragment mapping
//! its output back to its input. Fragments are only composed into a single
//! map when someone asks for it (emit, error positions).
//!
//! Positions are 0-based; columns count UTF-16 code units as the format requires.

mod chain;
mod vlq;

pub use chain::{Link, SourcemapChain};

use serde::{Deserialize, Serialize};
use std::ops::Range;
use thiserror::Error;

// ============================================================================
// Types
// ============================================================================

/// A 0-based line/column position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// Position of byte `offset` in `text`.
    pub fn of_offset(text: &str, offset: usize) -> Self {
        let offset = floor_char_boundary(text, offset.min(text.len()));
        let before = &text[..offset];
        let line = before.matches('\n').count();
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        Self {
            line: line as u32,
            column: utf16_len(&text[line_start..offset]),
        }
    }
}

impl std::fmt::Display for Position {
    /// Human form is 1-based: `3:14`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.column + 1)
    }
}

/// Where a generated position came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OriginalLocation {
    pub source: u32,
    pub position: Position,
    pub name: Option<u32>,
}

/// One mapping on a generated line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub generated_column: u32,
    pub original: Option<OriginalLocation>,
}

#[derive(Debug, Error)]
pub enum SourceMapError {
    #[error("invalid source map JSON")]
    Json(#[from] serde_json::Error),

    #[error("unsupported source map version {0}")]
    Version(u8),

    #[error("malformed mappings on generated line {0}")]
    Mappings(usize),
}

/// A decoded v3 source map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceMap {
    pub file: Option<String>,
    pub sources: Vec<String>,
    pub sources_content: Vec<Option<String>>,
    pub names: Vec<String>,
    /// Segments per generated line, sorted by generated column.
    lines: Vec<Vec<Segment>>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSourceMap {
    version: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source_root: Option<String>,
    sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    sources_content: Vec<Option<String>>,
    #[serde(default)]
    names: Vec<String>,
    mappings: String,
}

// ============================================================================
// Parse / serialize
// ============================================================================

impl SourceMap {
    /// Parse a v3 source map.
    pub fn from_json(json: &str) -> Result<Self, SourceMapError> {
        let raw: RawSourceMap = serde_json::from_str(json)?;
        if raw.version != 3 {
            return Err(SourceMapError::Version(raw.version));
        }

        let sources = match raw.source_root.as_deref() {
            Some(root) if !root.is_empty() => {
                let root = root.trim_end_matches('/');
                raw.sources
                    .into_iter()
                    .map(|s| format!("{root}/{s}"))
                    .collect()
            }
            _ => raw.sources,
        };

        Ok(Self {
            file: raw.file,
            sources,
            sources_content: raw.sources_content,
            names: raw.names,
            lines: decode_mappings(&raw.mappings)?,
        })
    }

    /// Serialize as v3 JSON.
    pub fn to_json(&self) -> Result<String, SourceMapError> {
        let raw = RawSourceMap {
            version: 3,
            file: self.file.clone(),
            source_root: None,
            sources: self.sources.clone(),
            sources_content: self.sources_content.clone(),
            names: self.names.clone(),
            mappings: encode_mappings(&self.lines),
        };
        Ok(serde_json::to_string(&raw)?)
    }

    /// Segments of one generated line.
    pub fn line(&self, line: u32) -> &[Segment] {
        self.lines.get(line as usize).map_or(&[], Vec::as_slice)
    }

    /// Number of generated lines carrying mappings.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    // ------------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------------

    /// Original location of a generated position.
    ///
    /// Uses the closest segment at or before `position.column` on the same line.
    pub fn lookup(&self, position: Position) -> Option<OriginalLocation> {
        let segments = self.line(position.line);
        let idx = segments.partition_point(|s| s.generated_column <= position.column);
        segments.get(idx.checked_sub(1)?)?.original
    }

    /// Original position of a generated one, carrying the column offset
    /// from the closest segment over.
    pub fn locate(&self, position: Position) -> Option<Position> {
        let segments = self.line(position.line);
        let idx = segments.partition_point(|s| s.generated_column <= position.column);
        let segment = segments.get(idx.checked_sub(1)?)?;
        let original = segment.original?.position;
        Some(Position::new(
            original.line,
            original.column + (position.column - segment.generated_column),
        ))
    }

    /// Source name of an original location.
    pub fn source_name(&self, location: &OriginalLocation) -> Option<&str> {
        self.sources.get(location.source as usize).map(String::as_str)
    }

    // ------------------------------------------------------------------------
    // Composition
    // ------------------------------------------------------------------------

    /// Compose `self` (stage N+1 output → stage N output) with `earlier`
    /// (stage N output → original), producing stage N+1 output → original.
    ///
    /// `self` is expected to describe a single intermediate source.
    pub fn compose(&self, earlier: &SourceMap) -> SourceMap {
        let lines = self
            .lines
            .iter()
            .map(|segments| {
                segments
                    .iter()
                    .map(|segment| Segment {
                        generated_column: segment.generated_column,
                        original: segment
                            .original
                            .and_then(|loc| earlier.lookup(loc.position)),
                    })
                    .collect()
            })
            .collect();

        SourceMap {
            file: self.file.clone(),
            sources: earlier.sources.clone(),
            sources_content: earlier.sources_content.clone(),
            names: earlier.names.clone(),
            lines,
        }
    }
}

// ============================================================================
// Builder for text substitutions
// ============================================================================

/// Piece of a rewritten text.
#[derive(Debug, Clone)]
pub enum Chunk<'a> {
    /// Copied verbatim from the input range.
    Kept(Range<usize>),
    /// Replacement text standing in for the input starting at `origin`.
    Inserted { text: &'a str, origin: usize },
}

/// Builds the fragment describing a position-based substitution pass.
pub struct MapBuilder<'a> {
    input: &'a str,
    line_starts: Vec<usize>,
    lines: Vec<Vec<Segment>>,
    output_line: usize,
    output_column: u32,
}

impl<'a> MapBuilder<'a> {
    pub fn new(input: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(input.match_indices('\n').map(|(i, _)| i + 1));
        Self {
            input,
            line_starts,
            lines: vec![Vec::new()],
            output_line: 0,
            output_column: 0,
        }
    }

    /// Record the next chunk of output.
    pub fn push(&mut self, chunk: Chunk<'_>) {
        match chunk {
            Chunk::Kept(range) => {
                let text = &self.input[range.clone()];
                let mut offset = range.start;
                for (i, piece) in text.split('\n').enumerate() {
                    if i > 0 {
                        self.new_line();
                    }
                    if !piece.is_empty() {
                        self.mark(offset);
                    }
                    self.output_column += utf16_len(piece);
                    offset += piece.len() + 1;
                }
            }
            Chunk::Inserted { text, origin } => {
                self.mark(origin);
                for (i, piece) in text.split('\n').enumerate() {
                    if i > 0 {
                        self.new_line();
                    }
                    self.output_column += utf16_len(piece);
                }
            }
        }
    }

    /// Finish, naming the single source the fragment maps back to.
    pub fn finish(mut self, source: &str) -> SourceMap {
        while self.lines.last().is_some_and(Vec::is_empty) && self.lines.len() > 1 {
            self.lines.pop();
        }
        SourceMap {
            file: None,
            sources: vec![source.to_string()],
            sources_content: Vec::new(),
            names: Vec::new(),
            lines: self.lines,
        }
    }

    fn new_line(&mut self) {
        self.output_line += 1;
        self.output_column = 0;
        self.lines.push(Vec::new());
    }

    fn mark(&mut self, input_offset: usize) {
        let line = self
            .line_starts
            .partition_point(|&start| start <= input_offset)
            .saturating_sub(1);
        let start = self.line_starts[line];
        let end = floor_char_boundary(self.input, input_offset.min(self.input.len()));
        let column = utf16_len(&self.input[start..end.max(start)]);
        let segment = Segment {
            generated_column: self.output_column,
            original: Some(OriginalLocation {
                source: 0,
                position: Position::new(line as u32, column),
                name: None,
            }),
        };
        let current = &mut self.lines[self.output_line];
        // collapse duplicate marks at the same output column
        if current
            .last()
            .is_some_and(|s| s.generated_column == segment.generated_column)
        {
            current.pop();
        }
        current.push(segment);
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn utf16_len(text: &str) -> u32 {
    text.encode_utf16().count() as u32
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn decode_mappings(mappings: &str) -> Result<Vec<Vec<Segment>>, SourceMapError> {
    let mut lines = Vec::new();
    let (mut source, mut line, mut column, mut name) = (0i64, 0i64, 0i64, 0i64);

    for (index, text) in mappings.split(';').enumerate() {
        let mut segments = Vec::new();
        let mut generated_column = 0i64;
        for raw in text.split(',').filter(|s| !s.is_empty()) {
            let values = vlq::decode_segment(raw).ok_or(SourceMapError::Mappings(index))?;
            match values.as_slice() {
                [g] => {
                    generated_column += g;
                    segments.push(Segment {
                        generated_column: to_u32(generated_column, index)?,
                        original: None,
                    });
                }
                [g, s, l, c, rest @ ..] if rest.len() <= 1 => {
                    generated_column += g;
                    source += s;
                    line += l;
                    column += c;
                    let name_index = match rest.first() {
                        Some(n) => {
                            name += n;
                            Some(to_u32(name, index)?)
                        }
                        None => None,
                    };
                    segments.push(Segment {
                        generated_column: to_u32(generated_column, index)?,
                        original: Some(OriginalLocation {
                            source: to_u32(source, index)?,
                            position: Position::new(to_u32(line, index)?, to_u32(column, index)?),
                            name: name_index,
                        }),
                    });
                }
                _ => return Err(SourceMapError::Mappings(index)),
            }
        }
        segments.sort_by_key(|s| s.generated_column);
        lines.push(segments);
    }
    Ok(lines)
}

fn to_u32(value: i64, line: usize) -> Result<u32, SourceMapError> {
    u32::try_from(value).map_err(|_| SourceMapError::Mappings(line))
}

fn encode_mappings(lines: &[Vec<Segment>]) -> String {
    let mut out = String::new();
    let (mut source, mut line, mut column, mut name) = (0i64, 0i64, 0i64, 0i64);

    for (index, segments) in lines.iter().enumerate() {
        if index > 0 {
            out.push(';');
        }
        let mut generated_column = 0i64;
        for (i, segment) in segments.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            let g = i64::from(segment.generated_column);
            vlq::encode(g - generated_column, &mut out);
            generated_column = g;

            let Some(original) = segment.original else {
                continue;
            };
            let (s, l, c) = (
                i64::from(original.source),
                i64::from(original.position.line),
                i64::from(original.position.column),
            );
            vlq::encode(s - source, &mut out);
            vlq::encode(l - line, &mut out);
            vlq::encode(c - column, &mut out);
            (source, line, column) = (s, l, c);

            if let Some(n) = original.name {
                let n = i64::from(n);
                vlq::encode(n - name, &mut out);
                name = n;
            }
        }
    }
    out
}

// ============================================================================
// Tests
// ============================================================================
