use indexmap::IndexMap;
use indexmap::map::Iter;
use propbag::PropertyMap;
use serde::Serialize;

/// The result of a load: concrete class name to its merged properties.
///
/// Abstract classes never appear here. A bag has no mutating API; it is
/// built once by the resolver.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResolvedBag {
    classes: IndexMap<String, PropertyMap>,
}

impl ResolvedBag {
    pub(crate) fn new(classes: IndexMap<String, PropertyMap>) -> Self {
        ResolvedBag { classes }
    }

    pub fn get(&self, class: &str) -> Option<&PropertyMap> {
        self.classes.get(class)
    }

    pub fn contains(&self, class: &str) -> bool {
        self.classes.contains_key(class)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Class names in declaration order.
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> Iter<'_, String, PropertyMap> {
        self.classes.iter()
    }
}

impl<'a> IntoIterator for &'a ResolvedBag {
    type Item = (&'a String, &'a PropertyMap);
    type IntoIter = Iter<'a, String, PropertyMap>;

    fn into_iter(self) -> Self::IntoIter {
        self.classes.iter()
    }
}
