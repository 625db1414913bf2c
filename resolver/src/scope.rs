use propbag::Document;
use propbag::class::ClassId;

/// Find the class that base name `name` of `class` refers to.
///
/// Names are lexically scoped: the classes declared alongside `class` are
/// searched first (skipping `class` itself), then each enclosing scope
/// outward, ending with the top-level classes. Forward references are fine.
pub fn lookup_base(document: &Document, class: ClassId, name: &str) -> Option<ClassId> {
    let mut scope = document.class(class).scope;
    loop {
        let found = document
            .scope_members(scope)
            .iter()
            .copied()
            .find(|&id| id != class && document.class(id).name == name);
        if found.is_some() {
            return found;
        }
        scope = document.class(scope?).scope;
    }
}
