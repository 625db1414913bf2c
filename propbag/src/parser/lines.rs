use std::ops::Range;

use crate::options::ParserOptions;
use crate::parser::error::ParseError;

/// One logical source line with its comment stripped.
#[derive(Debug, Clone, PartialEq)]
pub struct Line<'a> {
    /// 1-based line number in the source.
    pub number: usize,
    /// Count of leading indentation characters.
    pub depth: usize,
    /// Content with indentation, comment and trailing whitespace removed.
    pub text: &'a str,
    /// Byte span of `text` in the source.
    pub span: Range<usize>,
}

/// Iterator over the non-blank lines of a source string.
///
/// Cloning the reader restarts iteration from the clone's position; the
/// sequence is a pure function of the source and the options.
#[derive(Debug, Clone)]
pub struct LineReader<'a> {
    rest: &'a str,
    offset: usize,
    number: usize,
    comment_marker: &'a str,
    /// Indentation character fixed by the first indented line.
    indent_char: Option<char>,
    file_id: usize,
    done: bool,
}

impl<'a> LineReader<'a> {
    pub fn new(source: &'a str, options: &'a ParserOptions, file_id: usize) -> Self {
        LineReader {
            rest: source,
            offset: 0,
            number: 0,
            comment_marker: &options.comment_marker,
            indent_char: None,
            file_id,
            done: false,
        }
    }

    fn fail(&mut self, error: ParseError) -> Option<Result<Line<'a>, ParseError>> {
        self.done = true;
        Some(Err(error))
    }
}

impl<'a> Iterator for LineReader<'a> {
    type Item = Result<Line<'a>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }

            let (raw, advance) = match self.rest.find('\n') {
                Some(pos) => (&self.rest[..pos], pos + 1),
                None => {
                    self.done = true;
                    (self.rest, self.rest.len())
                }
            };
            let line_start = self.offset;
            self.rest = &self.rest[advance..];
            self.offset += advance;
            self.number += 1;

            let raw = raw.strip_suffix('\r').unwrap_or(raw);
            let content = strip_comment(raw, self.comment_marker);
            if content.trim().is_empty() {
                continue;
            }

            let indent_len = content.len() - content.trim_start_matches([' ', '\t']).len();
            let indent = &content[..indent_len];

            if indent.contains(' ') && indent.contains('\t') {
                let span = line_start..line_start + indent_len;
                return self.fail(ParseError::indentation(
                    "indentation mixes tabs and spaces",
                    self.number,
                    span,
                    self.file_id,
                ));
            }

            if let Some(c) = indent.chars().next() {
                match self.indent_char {
                    None => self.indent_char = Some(c),
                    Some(unit) if unit != c => {
                        let span = line_start..line_start + indent_len;
                        return self.fail(
                            ParseError::indentation(
                                format!(
                                    "line is indented with {} but the document uses {}",
                                    indent_name(c),
                                    indent_name(unit)
                                ),
                                self.number,
                                span,
                                self.file_id,
                            )
                            .with_note("use a single indentation character throughout a document"),
                        );
                    }
                    Some(_) => {}
                }
            }

            let body = &content[indent_len..];
            let text = body.trim();
            let text_start = line_start + indent_len + (body.len() - body.trim_start().len());

            tracing::trace!(line = self.number, depth = indent_len, text, "read line");

            return Some(Ok(Line {
                number: self.number,
                depth: indent_len,
                text,
                span: text_start..text_start + text.len(),
            }));
        }
    }
}

/// Collect every line of `source`, stopping at the first indentation error.
pub fn read_lines<'a>(
    source: &'a str,
    options: &'a ParserOptions,
    file_id: usize,
) -> Result<Vec<Line<'a>>, ParseError> {
    LineReader::new(source, options, file_id).collect()
}

/// Cut `raw` at the first comment marker that is not inside double quotes.
///
/// A quote only opens a quoted run when it is closed later on the same line;
/// a stray `"` is plain text.
fn strip_comment<'a>(raw: &'a str, marker: &str) -> &'a str {
    if marker.is_empty() {
        return raw;
    }

    let mut in_quote = false;
    let mut escaped = false;
    let mut unbalanced = false;
    for (i, c) in raw.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quote => escaped = true,
            '"' if in_quote => in_quote = false,
            '"' if !unbalanced => {
                in_quote = has_closing_quote(&raw[i + 1..]);
                unbalanced = !in_quote;
            }
            _ if !in_quote && raw[i..].starts_with(marker) => return &raw[..i],
            _ => {}
        }
    }
    raw
}

/// Whether `rest` contains an unescaped `"`.
fn has_closing_quote(rest: &str) -> bool {
    let mut escaped = false;
    for c in rest.chars() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => return true,
            _ => {}
        }
    }
    false
}

fn indent_name(c: char) -> &'static str {
    if c == '\t' { "tabs" } else { "spaces" }
}
