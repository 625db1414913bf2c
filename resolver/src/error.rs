use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic, Label};
use propbag::{ErrorKind, ParseError};
use thiserror::Error;

/// A failure while merging parsed classes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error("class `{class}` inherits from unknown class `{base}`")]
    UnknownBase {
        class: String,
        base: String,
        line: usize,
        span: Range<usize>,
    },

    /// `cycle` lists the classes in resolution order, ending with the first
    /// one again.
    #[error("inheritance cycle: {}", .cycle.join(" -> "))]
    Cycle {
        cycle: Vec<String>,
        line: usize,
        span: Range<usize>,
    },
}

impl ResolveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResolveError::UnknownBase { .. } => ErrorKind::UnknownBase,
            ResolveError::Cycle { .. } => ErrorKind::Cycle,
        }
    }

    pub fn line(&self) -> usize {
        match self {
            ResolveError::UnknownBase { line, .. } | ResolveError::Cycle { line, .. } => *line,
        }
    }

    pub fn span(&self) -> Range<usize> {
        match self {
            ResolveError::UnknownBase { span, .. } | ResolveError::Cycle { span, .. } => {
                span.clone()
            }
        }
    }

    /// Convert to a codespan-reporting Diagnostic for display.
    pub fn to_diagnostic(&self, file_id: usize) -> Diagnostic<usize> {
        let diagnostic = Diagnostic::error()
            .with_message(self.to_string())
            .with_code(self.kind().name())
            .with_labels(vec![Label::primary(file_id, self.span())]);
        match self {
            ResolveError::UnknownBase { base, .. } => diagnostic.with_notes(vec![format!(
                "no class named `{}` is declared in this scope or any enclosing one",
                base
            )]),
            ResolveError::Cycle { .. } => diagnostic,
        }
    }
}

/// Everything that can make [`crate::load`] fail.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{}", summarize(.0))]
    Parse(Vec<ParseError>),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl LoadError {
    /// Kind of the first error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoadError::Parse(errors) => errors
                .first()
                .map(|e| e.kind)
                .unwrap_or(ErrorKind::Structure),
            LoadError::Resolve(err) => err.kind(),
        }
    }

    /// 1-based line of the first error.
    pub fn line(&self) -> usize {
        match self {
            LoadError::Parse(errors) => errors.first().map(|e| e.line).unwrap_or(0),
            LoadError::Resolve(err) => err.line(),
        }
    }

    pub fn diagnostics(&self, file_id: usize) -> Vec<Diagnostic<usize>> {
        match self {
            LoadError::Parse(errors) => errors
                .iter()
                .map(|error| {
                    ParseError {
                        file_id,
                        ..error.clone()
                    }
                    .to_diagnostic()
                })
                .collect(),
            LoadError::Resolve(err) => vec![err.to_diagnostic(file_id)],
        }
    }
}

fn summarize(errors: &[ParseError]) -> String {
    match errors {
        [] => "parse failed".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{} (and {} more)", first, rest.len()),
    }
}
