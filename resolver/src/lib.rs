pub mod bag;
pub mod error;
pub mod resolve;
pub mod scope;

pub use bag::ResolvedBag;
pub use error::{LoadError, ResolveError};
pub use propbag::{ErrorKind, ParserOptions, PropertyMap, Value};
pub use resolve::resolve;

use propbag::parser::Parser;

/// Parse and resolve a property-bag document with default options.
pub fn load(source: &str) -> Result<ResolvedBag, LoadError> {
    load_with_options(source, &ParserOptions::default())
}

/// Parse and resolve a property-bag document.
///
/// Pure: the result depends only on `source` and `options`, and nothing is
/// cached between calls.
pub fn load_with_options(source: &str, options: &ParserOptions) -> Result<ResolvedBag, LoadError> {
    let document = Parser::new(source.to_string(), 0)
        .with_options(options.clone())
        .parse()
        .map_err(LoadError::Parse)?;
    let bag = resolve(&document)?;
    tracing::debug!(classes = bag.len(), "loaded");
    Ok(bag)
}
