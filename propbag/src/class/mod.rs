use std::fmt;
use std::ops::Range;

use crate::value::Value;

/// Index of a class declaration in a [`crate::Document`]'s arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub usize);

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A class declaration: a header line plus everything nested under it.
/// Nested groups are classes too, with `scope` pointing at the enclosing one.
#[derive(Debug, Clone)]
pub struct ClassNode {
    /// Class name, trimmed. Empty only for a bare `::` header.
    pub name: String,
    /// Base classes in the order they were listed.
    pub bases: Vec<BaseRef>,
    pub is_abstract: bool,
    /// Direct property assignments and concrete nested groups, in source order.
    pub properties: Vec<PropertyNode>,
    /// Every class declared directly inside this one, abstract ones included.
    pub children: Vec<ClassId>,
    /// Enclosing class, or `None` at top level.
    pub scope: Option<ClassId>,
    /// 1-based line of the header.
    pub line: usize,
    /// Byte span of the header text.
    pub span: Range<usize>,
}

/// A base class named in a header.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseRef {
    pub name: String,
    pub span: Range<usize>,
}

/// A single `key = value` assignment, or a concrete nested group.
#[derive(Debug, Clone)]
pub struct PropertyNode {
    pub key: String,
    pub value: PropertyValue,
    pub line: usize,
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Literal(Value),
    /// A nested group, resolved like any other class.
    Group(ClassId),
}
