//! Content template: transformed text plus reference slots.
//!
//! ```text
//! text:   import a from "./util.js"; import b from "./b.js";
//!                        └───┬───┘                 └──┬─┘
//! slots:                 slot(ref 0)             slot(ref 1)
//! ```
//!
//! Transform stages edit the text around the slots; rendering substitutes
//! every slot with its reference's generated specifier in one pass. The
//! versioner renders again later with versioned URLs.

use std::ops::Range;

use thiserror::Error;

use crate::sourcemap::{Chunk, MapBuilder, SourceMap};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("edit {edit:?} overlaps the reference at {slot:?}")]
    EditOverlapsSlot {
        edit: Range<usize>,
        slot: Range<usize>,
    },

    #[error("edits {first:?} and {second:?} overlap")]
    OverlappingEdits {
        first: Range<usize>,
        second: Range<usize>,
    },

    #[error("range {range:?} is out of bounds (length {len})")]
    OutOfBounds { range: Range<usize>, len: usize },

    #[error("range {0:?} does not fall on a character boundary")]
    NotCharBoundary(Range<usize>),

    #[error("reference at {mention:?} overlaps {other:?}")]
    MentionOverlap {
        mention: Range<usize>,
        other: Range<usize>,
    },
}

/// A position-based substitution requested by a transform stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub range: Range<usize>,
    pub text: String,
}

impl Edit {
    pub fn replace(range: Range<usize>, text: impl Into<String>) -> Self {
        Self {
            range,
            text: text.into(),
        }
    }

    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self::replace(at..at, text)
    }

    pub fn delete(range: Range<usize>) -> Self {
        Self::replace(range, "")
    }

    #[inline]
    fn delta(&self) -> isize {
        self.text.len() as isize - self.range.len() as isize
    }
}

/// Region of the template holding a reference's specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub range: Range<usize>,
    /// Index into the node's `references`.
    pub reference: usize,
}

/// Transformed text with reference slots, sorted by position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentTemplate {
    text: String,
    slots: Vec<Slot>,
}

impl ContentTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            slots: Vec::new(),
        }
    }

    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[inline]
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Slot holding `reference`, if it is still rewritable.
    pub fn slot_for(&self, reference: usize) -> Option<&Slot> {
        self.slots.iter().find(|slot| slot.reference == reference)
    }

    /// Register the specifier of `reference` at `range`.
    pub fn add_slot(&mut self, range: Range<usize>, reference: usize) -> Result<(), TemplateError> {
        check_range(&self.text, &range)?;
        let at = self.slots.partition_point(|s| s.range.start < range.start);
        for neighbour in [at.checked_sub(1), Some(at)].into_iter().flatten() {
            if let Some(other) = self.slots.get(neighbour)
                && overlaps(&range, &other.range)
            {
                return Err(TemplateError::MentionOverlap {
                    mention: range,
                    other: other.range.clone(),
                });
            }
        }
        self.slots.insert(at, Slot { range, reference });
        Ok(())
    }

    /// Apply position-based edits to the text.
    ///
    /// Existing slots shift with the text; `spans` (mentions reported
    /// against the pre-edit text) are shifted in place. Returns the fragment
    /// mapping the new text back to the old one, naming `source`.
    pub fn apply_edits(
        &mut self,
        mut edits: Vec<Edit>,
        spans: &mut [Range<usize>],
        source: &str,
    ) -> Result<SourceMap, TemplateError> {
        edits.sort_by_key(|edit| (edit.range.start, edit.range.end));

        for edit in &edits {
            check_range(&self.text, &edit.range)?;
            if let Some(slot) = self.slots.iter().find(|s| overlaps(&edit.range, &s.range)) {
                return Err(TemplateError::EditOverlapsSlot {
                    edit: edit.range.clone(),
                    slot: slot.range.clone(),
                });
            }
            if let Some(span) = spans.iter().find(|s| overlaps(&edit.range, s)) {
                return Err(TemplateError::MentionOverlap {
                    mention: span.clone(),
                    other: edit.range.clone(),
                });
            }
        }
        for pair in edits.windows(2) {
            if pair[0].range.end > pair[1].range.start {
                return Err(TemplateError::OverlappingEdits {
                    first: pair[0].range.clone(),
                    second: pair[1].range.clone(),
                });
            }
        }

        let mut output = String::with_capacity(self.text.len());
        let mut builder = MapBuilder::new(&self.text);
        let mut cursor = 0;
        for edit in &edits {
            if cursor < edit.range.start {
                builder.push(Chunk::Kept(cursor..edit.range.start));
                output.push_str(&self.text[cursor..edit.range.start]);
            }
            if !edit.text.is_empty() {
                builder.push(Chunk::Inserted {
                    text: &edit.text,
                    origin: edit.range.start,
                });
                output.push_str(&edit.text);
            }
            cursor = edit.range.end;
        }
        if cursor < self.text.len() {
            builder.push(Chunk::Kept(cursor..self.text.len()));
            output.push_str(&self.text[cursor..]);
        }
        let map = builder.finish(source);

        for slot in &mut self.slots {
            slot.range = shift(&edits, &slot.range);
        }
        for span in spans.iter_mut() {
            *span = shift(&edits, span);
        }
        self.text = output;
        Ok(map)
    }

    /// Replace the whole text. Returns how many slots were discarded.
    pub fn replace(&mut self, text: impl Into<String>) -> usize {
        self.text = text.into();
        std::mem::take(&mut self.slots).len()
    }

    /// Substitute every slot with `fill(slot)`, or keep its text on `None`.
    ///
    /// Returns the rendered text and the fragment mapping it back to the
    /// template text, naming `source`.
    pub fn render(
        &self,
        source: &str,
        mut fill: impl FnMut(&Slot) -> Option<String>,
    ) -> (String, SourceMap) {
        let mut output = String::with_capacity(self.text.len());
        let mut builder = MapBuilder::new(&self.text);
        let mut cursor = 0;

        for slot in &self.slots {
            if cursor < slot.range.start {
                builder.push(Chunk::Kept(cursor..slot.range.start));
                output.push_str(&self.text[cursor..slot.range.start]);
            }
            match fill(slot) {
                Some(replacement) => {
                    builder.push(Chunk::Inserted {
                        text: &replacement,
                        origin: slot.range.start,
                    });
                    output.push_str(&replacement);
                }
                None => {
                    builder.push(Chunk::Kept(slot.range.clone()));
                    output.push_str(&self.text[slot.range.clone()]);
                }
            }
            cursor = slot.range.end;
        }
        if cursor < self.text.len() {
            builder.push(Chunk::Kept(cursor..self.text.len()));
            output.push_str(&self.text[cursor..]);
        }

        (output, builder.finish(source))
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn check_range(text: &str, range: &Range<usize>) -> Result<(), TemplateError> {
    if range.start > range.end || range.end > text.len() {
        return Err(TemplateError::OutOfBounds {
            range: range.clone(),
            len: text.len(),
        });
    }
    if !text.is_char_boundary(range.start) || !text.is_char_boundary(range.end) {
        return Err(TemplateError::NotCharBoundary(range.clone()));
    }
    Ok(())
}

/// Strict overlap; an empty range overlaps only when strictly inside.
fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    if a.is_empty() {
        return b.start < a.start && a.start < b.end;
    }
    if b.is_empty() {
        return a.start < b.start && b.start < a.end;
    }
    a.start < b.end && b.start < a.end
}

/// Position of `range` after non-overlapping, sorted `edits`.
///
/// An insertion at a range's start lands before it; one at its end lands after.
fn shift(edits: &[Edit], range: &Range<usize>) -> Range<usize> {
    let before_start: isize = edits
        .iter()
        .filter(|e| e.range.end <= range.start)
        .map(Edit::delta)
        .sum();
    let before_end: isize = edits
        .iter()
        .filter(|e| e.range.start < range.end && e.range.end <= range.end)
        .map(Edit::delta)
        .sum();
    let start = (range.start as isize + before_start) as usize;
    let end = (range.end as isize + before_end) as usize;
    start..end.max(start)
}
