//! Mutation sinks: where accepted rewrites are sent

use crate::error::{Error, Result};
use crate::syntax::Span;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The edit intersects an edit that was already accepted
    Overlap { existing: Span },
    OutOfBounds,
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Overlap { existing } => {
                write!(f, "edit overlaps an earlier edit at {}..{}", existing.start, existing.end)
            }
            SinkError::OutOfBounds => f.write_str("edit lies outside the document"),
        }
    }
}

/// Receives `(target, replacement text)` pairs for accepted rewrites
pub trait MutationSink {
    fn replace_node(&mut self, target: Span, replacement: &str) -> std::result::Result<(), SinkError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextEdit {
    pub span: Span,
    pub replacement: String,
}

/// Collects span edits and applies them to the original text in one pass
#[derive(Debug, Default)]
pub struct TextEditSink {
    edits: Vec<TextEdit>,
    limit: Option<usize>,
}

impl TextEditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink for a document of `len` bytes; edits past the end are refused
    pub fn for_document(len: usize) -> Self {
        Self {
            edits: Vec::new(),
            limit: Some(len),
        }
    }

    pub fn edits(&self) -> &[TextEdit] {
        &self.edits
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Apply all edits back to front; text between edits is kept byte for byte
    pub fn apply(&self, document: &str, source: &str) -> Result<String> {
        let mut edits: Vec<&TextEdit> = self.edits.iter().collect();
        edits.sort_by(|a, b| b.span.start.cmp(&a.span.start));

        let mut result = source.to_string();
        let mut floor = usize::MAX;
        for edit in edits {
            if edit.span.end > floor {
                return Err(Error::Sink {
                    document: document.to_string(),
                    message: format!("overlapping edits at {}..{}", edit.span.start, edit.span.end),
                });
            }
            if edit.span.end > result.len()
                || !result.is_char_boundary(edit.span.start)
                || !result.is_char_boundary(edit.span.end)
            {
                return Err(Error::Sink {
                    document: document.to_string(),
                    message: format!("edit {}..{} lies outside the document", edit.span.start, edit.span.end),
                });
            }
            result.replace_range(edit.span.start..edit.span.end, &edit.replacement);
            floor = edit.span.start;
        }
        Ok(result)
    }
}

impl MutationSink for TextEditSink {
    fn replace_node(&mut self, target: Span, replacement: &str) -> std::result::Result<(), SinkError> {
        if self.limit.map_or(false, |len| target.end > len) {
            return Err(SinkError::OutOfBounds);
        }
        if let Some(existing) = self.edits.iter().find(|e| e.span.overlaps(&target)) {
            return Err(SinkError::Overlap { existing: existing.span });
        }
        self.edits.push(TextEdit {
            span: target,
            replacement: replacement.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_keeps_surrounding_text() {
        let source = "a = (F)6; // six\nb = 1;";
        let mut sink = TextEditSink::for_document(source.len());
        sink.replace_node(Span::new(4, 8), "F.B | F.C").unwrap();
        sink.replace_node(Span::new(21, 22), "F.A").unwrap();
        assert_eq!(sink.apply("t.cs", source).unwrap(), "a = F.B | F.C; // six\nb = F.A;");
    }

    #[test]
    fn test_overlapping_edit_is_refused() {
        let mut sink = TextEditSink::new();
        sink.replace_node(Span::new(0, 5), "x").unwrap();
        assert!(matches!(
            sink.replace_node(Span::new(3, 7), "y"),
            Err(SinkError::Overlap { .. })
        ));
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_out_of_bounds_edit_is_refused() {
        let mut sink = TextEditSink::for_document(3);
        assert_eq!(sink.replace_node(Span::new(2, 9), "z"), Err(SinkError::OutOfBounds));
    }
}
