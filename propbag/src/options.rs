use serde::Deserialize;

/// Knobs for the line reader and block parser.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParserOptions {
    /// Everything from this marker to the end of a line is a comment.
    #[serde(default = "default_comment_marker")]
    pub comment_marker: String,
    /// Maximum number of simultaneously open nesting levels.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            comment_marker: default_comment_marker(),
            max_depth: default_max_depth(),
        }
    }
}

fn default_comment_marker() -> String {
    "//".to_string()
}

fn default_max_depth() -> usize {
    256
}
