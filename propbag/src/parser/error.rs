use std::fmt;
use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic, Label, Severity};

/// The kinds of failure a load can end with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Indentation,
    Structure,
    UnknownBase,
    Cycle,
    DuplicateClass,
}

impl ErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Indentation => "IndentationError",
            ErrorKind::Structure => "StructureError",
            ErrorKind::UnknownBase => "UnknownBaseError",
            ErrorKind::Cycle => "CycleError",
            ErrorKind::DuplicateClass => "DuplicateClassError",
        }
    }

    /// Parse the names used in test files: `cycle`, `CycleError`, `unknown-base`, ...
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        let normalized = normalized.strip_suffix("error").unwrap_or(&normalized);
        match normalized {
            "indentation" => Some(ErrorKind::Indentation),
            "structure" => Some(ErrorKind::Structure),
            "unknownbase" => Some(ErrorKind::UnknownBase),
            "cycle" => Some(ErrorKind::Cycle),
            "duplicateclass" => Some(ErrorKind::DuplicateClass),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parse errors with source location information.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub kind: ErrorKind,
    pub message: String,
    /// 1-based line number.
    pub line: usize,
    pub span: Range<usize>,
    pub file_id: usize,
    pub notes: Vec<String>,
}

impl ParseError {
    pub fn new(
        kind: ErrorKind,
        message: impl Into<String>,
        line: usize,
        span: Range<usize>,
        file_id: usize,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            line,
            span,
            file_id,
            notes: Vec::new(),
        }
    }

    pub fn indentation(
        message: impl Into<String>,
        line: usize,
        span: Range<usize>,
        file_id: usize,
    ) -> Self {
        Self::new(ErrorKind::Indentation, message, line, span, file_id)
    }

    pub fn structure(
        message: impl Into<String>,
        line: usize,
        span: Range<usize>,
        file_id: usize,
    ) -> Self {
        Self::new(ErrorKind::Structure, message, line, span, file_id)
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Convert to a codespan-reporting Diagnostic for display.
    pub fn to_diagnostic(&self) -> Diagnostic<usize> {
        Diagnostic::new(Severity::Error)
            .with_message(&self.message)
            .with_code(self.kind.name())
            .with_labels(vec![Label::primary(self.file_id, self.span.clone())])
            .with_notes(self.notes.clone())
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on line {}: {}", self.kind, self.line, self.message)
    }
}

impl std::error::Error for ParseError {}
