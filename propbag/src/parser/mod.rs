pub mod error;
pub mod lines;
pub mod literal;
mod structural;

pub use error::{ErrorKind, ParseError};

use crate::Document;
use crate::options::ParserOptions;

/// Parser entry point.
pub struct Parser {
    source: String,
    file_id: usize,
    options: ParserOptions,
}

impl Parser {
    pub fn new(source: String, file_id: usize) -> Self {
        Parser {
            source,
            file_id,
            options: ParserOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ParserOptions) -> Self {
        self.options = options;
        self
    }

    /// Parse the source text into a complete Document.
    pub fn parse(&self) -> Result<Document, Vec<ParseError>> {
        tracing::debug!(file_id = self.file_id, bytes = self.source.len(), "parsing");
        let document = structural::parse_document(&self.source, &self.options, self.file_id)?;
        tracing::debug!(classes = document.classes.len(), "parsed");
        Ok(document)
    }
}
