use std::ops::Range;

use crate::Document;
use crate::class::{BaseRef, ClassId, ClassNode, PropertyNode, PropertyValue};
use crate::options::ParserOptions;
use crate::parser::error::{ErrorKind, ParseError};
use crate::parser::lines::{Line, LineReader};
use crate::parser::literal;
use crate::value::Value;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Parse property-bag source text into a class arena.
///
/// Indentation and structure errors stop parsing at once. Duplicate class
/// names are collected so that every one of them is reported.
pub fn parse_document(
    source: &str,
    options: &ParserOptions,
    file_id: usize,
) -> Result<Document, Vec<ParseError>> {
    let mut state = ParseState::new(options, file_id);

    for line in LineReader::new(source, options, file_id) {
        let result = line.and_then(|line| state.process_line(&line));
        if let Err(err) = result {
            state.errors.push(err);
            return Err(state.errors);
        }
    }

    state.finalize()
}

// ---------------------------------------------------------------------------
// Parse state
// ---------------------------------------------------------------------------

struct ParseState<'a> {
    options: &'a ParserOptions,
    file_id: usize,
    classes: Vec<ClassNode>,
    roots: Vec<ClassId>,
    /// Entries still accepting nested lines. Innermost = last.
    stack: Vec<OpenEntry>,
    errors: Vec<ParseError>,
}

struct OpenEntry {
    depth: usize,
    kind: OpenKind,
}

enum OpenKind {
    /// A class header; nested lines are its properties and groups.
    Class(ClassId),
    /// A property with an inline value; nothing may nest under it.
    Property { key: String },
    /// A `key =` line collecting continuation lines.
    Text {
        owner: ClassId,
        index: usize,
        text: String,
    },
}

/// The pieces of a class header line.
struct Header {
    name: String,
    bases: Vec<BaseRef>,
    is_abstract: bool,
}

impl<'a> ParseState<'a> {
    fn new(options: &'a ParserOptions, file_id: usize) -> Self {
        ParseState {
            options,
            file_id,
            classes: Vec::new(),
            roots: Vec::new(),
            stack: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn process_line(&mut self, line: &Line<'_>) -> Result<(), ParseError> {
        // Close entries at the same or deeper level
        let mut closed_depth = None;
        while let Some(top) = self.stack.last() {
            if top.depth < line.depth {
                break;
            }
            closed_depth = Some(top.depth);
            self.close_top();
        }

        if let Some(depth) = closed_depth {
            if depth != line.depth {
                return Err(ParseError::indentation(
                    "dedent does not match any enclosing indentation level",
                    line.number,
                    line.span.clone(),
                    self.file_id,
                )
                .with_note(format!(
                    "this line is indented by {}, the block it leaves was indented by {}",
                    line.depth, depth
                )));
            }
        }

        let parent = match self.stack.last_mut() {
            None => None,
            Some(OpenEntry {
                kind: OpenKind::Text { text, .. },
                ..
            }) => {
                if !text.is_empty() {
                    text.push(' ');
                }
                text.push_str(line.text);
                return Ok(());
            }
            Some(OpenEntry {
                kind: OpenKind::Property { key },
                ..
            }) => {
                let message = format!(
                    "property `{}` has an inline value and cannot contain nested lines",
                    key
                );
                return Err(self.error(ErrorKind::Structure, message, line));
            }
            Some(OpenEntry {
                kind: OpenKind::Class(id),
                ..
            }) => Some(*id),
        };

        if parent.is_none() && line.depth > 0 {
            return Err(self.error(ErrorKind::Indentation, "unexpected indentation", line)
                .with_note("top-level classes must start in the first column"));
        }

        if self.stack.len() >= self.options.max_depth {
            return Err(self.error(
                ErrorKind::Structure,
                format!("nesting is deeper than the limit of {} levels", self.options.max_depth),
                line,
            ));
        }

        if let Some((key, value)) = split_property(line.text) {
            self.add_property(parent, key, value, line)
        } else {
            let header = self.parse_header(line)?;
            self.add_class(parent, header, line);
            Ok(())
        }
    }

    fn add_property(
        &mut self,
        parent: Option<ClassId>,
        key: &str,
        value: &str,
        line: &Line<'_>,
    ) -> Result<(), ParseError> {
        let Some(owner) = parent else {
            return Err(self.error(
                ErrorKind::Structure,
                format!("property `{}` is outside of any class", key),
                line,
            ));
        };
        if key.is_empty() {
            return Err(self.error(ErrorKind::Structure, "property is missing a key", line));
        }

        let properties = &mut self.classes[owner.0].properties;
        let index = properties.len();
        let kind = if value.is_empty() {
            // Placeholder until the continuation lines are in
            properties.push(PropertyNode {
                key: key.to_string(),
                value: PropertyValue::Literal(Value::String(String::new())),
                line: line.number,
                span: line.span.clone(),
            });
            OpenKind::Text {
                owner,
                index,
                text: String::new(),
            }
        } else {
            let value = literal::evaluate(value);
            tracing::debug!(line = line.number, key, %value, "property");
            properties.push(PropertyNode {
                key: key.to_string(),
                value: PropertyValue::Literal(value),
                line: line.number,
                span: line.span.clone(),
            });
            OpenKind::Property {
                key: key.to_string(),
            }
        };

        self.stack.push(OpenEntry {
            depth: line.depth,
            kind,
        });
        Ok(())
    }

    fn add_class(&mut self, scope: Option<ClassId>, header: Header, line: &Line<'_>) {
        if !header.name.is_empty() {
            let duplicate = self
                .scope_members(scope)
                .iter()
                .map(|id| &self.classes[id.0])
                .find(|c| c.name == header.name)
                .map(|c| c.line);
            if let Some(first_line) = duplicate {
                let err = self
                    .error(
                        ErrorKind::DuplicateClass,
                        format!("class `{}` is already declared in this scope", header.name),
                        line,
                    )
                    .with_note(format!("first declared on line {}", first_line));
                self.errors.push(err);
            }
        }

        let id = ClassId(self.classes.len());
        tracing::debug!(
            line = line.number,
            name = %header.name,
            bases = ?header.bases.iter().map(|b| b.name.as_str()).collect::<Vec<_>>(),
            is_abstract = header.is_abstract,
            "class"
        );

        match scope {
            None => self.roots.push(id),
            Some(parent) => {
                let parent = &mut self.classes[parent.0];
                parent.children.push(id);
                if !header.is_abstract {
                    parent.properties.push(PropertyNode {
                        key: header.name.clone(),
                        value: PropertyValue::Group(id),
                        line: line.number,
                        span: line.span.clone(),
                    });
                }
            }
        }

        self.classes.push(ClassNode {
            name: header.name,
            bases: header.bases,
            is_abstract: header.is_abstract,
            properties: Vec::new(),
            children: Vec::new(),
            scope,
            line: line.number,
            span: line.span.clone(),
        });
        self.stack.push(OpenEntry {
            depth: line.depth,
            kind: OpenKind::Class(id),
        });
    }

    /// `["::"] name { "::" base, base, ... }`
    fn parse_header(&self, line: &Line<'_>) -> Result<Header, ParseError> {
        let (is_abstract, body, body_start) = match line.text.strip_prefix("::") {
            Some(rest) => (true, rest, line.span.start + 2),
            None => (false, line.text, line.span.start),
        };

        let mut segments = split_with_offsets(body, "::").into_iter();
        let name = segments
            .next()
            .map(|(_, name)| name.trim().to_string())
            .unwrap_or_default();

        let mut bases = Vec::new();
        for (seg_offset, segment) in segments {
            let seg_start = body_start + seg_offset;

            if segment.trim().is_empty() {
                // `name ::` inherits from a class of the same name further out
                if name.is_empty() {
                    return Err(self.error_at(
                        ErrorKind::Structure,
                        "an unnamed class cannot inherit from a class of its own name",
                        line,
                        seg_start.saturating_sub(2)..seg_start,
                    ));
                }
                bases.push(BaseRef {
                    name: name.clone(),
                    span: seg_start.saturating_sub(2)..seg_start,
                });
                continue;
            }

            for (entry_offset, entry) in split_with_offsets(segment, ",") {
                let base = entry.trim();
                let start = seg_start + entry_offset + (entry.len() - entry.trim_start().len());
                let span = start..start + base.len();

                if base.is_empty() {
                    return Err(self.error_at(
                        ErrorKind::Structure,
                        "malformed base list: empty base name",
                        line,
                        span,
                    ));
                }
                if base.contains('=') {
                    return Err(self.error_at(
                        ErrorKind::Structure,
                        format!("malformed base list: `{}` is not a class name", base),
                        line,
                        span,
                    ));
                }
                bases.push(BaseRef {
                    name: base.to_string(),
                    span,
                });
            }
        }

        Ok(Header {
            name,
            bases,
            is_abstract,
        })
    }

    fn scope_members(&self, scope: Option<ClassId>) -> &[ClassId] {
        match scope {
            Some(id) => &self.classes[id.0].children,
            None => &self.roots,
        }
    }

    fn close_top(&mut self) {
        let Some(entry) = self.stack.pop() else {
            return;
        };
        if let OpenKind::Text { owner, index, text } = entry.kind {
            let value = literal::evaluate(&text);
            let property = &mut self.classes[owner.0].properties[index];
            tracing::debug!(
                line = property.line,
                key = %property.key,
                %value,
                "multi-line property"
            );
            property.value = PropertyValue::Literal(value);
        }
    }

    fn error(&self, kind: ErrorKind, message: impl Into<String>, line: &Line<'_>) -> ParseError {
        self.error_at(kind, message, line, line.span.clone())
    }

    fn error_at(
        &self,
        kind: ErrorKind,
        message: impl Into<String>,
        line: &Line<'_>,
        span: Range<usize>,
    ) -> ParseError {
        ParseError::new(kind, message, line.number, span, self.file_id)
    }

    fn finalize(mut self) -> Result<Document, Vec<ParseError>> {
        while !self.stack.is_empty() {
            self.close_top();
        }

        if self.errors.is_empty() {
            Ok(Document {
                classes: self.classes,
                roots: self.roots,
                source_id: self.file_id,
            })
        } else {
            Err(self.errors)
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Split a property line at its first `=`, unless a `::` comes earlier.
fn split_property(text: &str) -> Option<(&str, &str)> {
    let eq = text.find('=')?;
    if text.find("::").is_some_and(|colons| colons < eq) {
        return None;
    }
    Some((text[..eq].trim(), text[eq + 1..].trim()))
}

/// Split `text` on `sep`, keeping each piece's byte offset within `text`.
fn split_with_offsets<'t>(text: &'t str, sep: &str) -> Vec<(usize, &'t str)> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for (pos, _) in text.match_indices(sep) {
        pieces.push((start, &text[start..pos]));
        start = pos + sep.len();
    }
    pieces.push((start, &text[start..]));
    pieces
}
