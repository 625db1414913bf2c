pub mod class;
pub mod options;
pub mod parser;
pub mod value;

pub use options::ParserOptions;
pub use parser::{ErrorKind, ParseError};
pub use value::{PropertyMap, Value};

use crate::class::{ClassId, ClassNode};

/// A parsed property-bag document.
#[derive(Debug, Clone)]
pub struct Document {
    /// Every class declaration, nested groups included, in source order.
    /// Indexed by [`ClassId`].
    pub classes: Vec<ClassNode>,
    /// Top-level classes in source order.
    pub roots: Vec<ClassId>,
    /// The source file ID (for error reporting with codespan-reporting).
    pub source_id: usize,
}

impl Document {
    pub fn class(&self, id: ClassId) -> &ClassNode {
        &self.classes[id.0]
    }

    pub fn ids(&self) -> impl Iterator<Item = ClassId> + '_ {
        (0..self.classes.len()).map(ClassId)
    }

    /// Classes declared directly in `scope` (`None` = top level).
    pub fn scope_members(&self, scope: Option<ClassId>) -> &[ClassId] {
        match scope {
            Some(id) => &self.class(id).children,
            None => &self.roots,
        }
    }

    /// Name of a class prefixed by its enclosing classes, e.g. `outer/inner`.
    pub fn qualified_name(&self, id: ClassId) -> String {
        let mut parts = vec![self.class(id).name.as_str()];
        let mut current = self.class(id).scope;
        while let Some(parent) = current {
            parts.push(self.class(parent).name.as_str());
            current = self.class(parent).scope;
        }
        parts.reverse();
        parts.join("/")
    }
}
