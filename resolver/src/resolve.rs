use std::ops::Range;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use propbag::class::{ClassId, PropertyValue};
use propbag::{Document, PropertyMap, Value};

use crate::bag::ResolvedBag;
use crate::error::ResolveError;
use crate::scope::lookup_base;

/// Merge every class of `document` with its ancestors.
///
/// Precedence, lowest first: each base's resolved properties in the order the
/// bases are listed, then the class's own properties in declaration order.
/// Every assignment overwrites the same key (last write wins); nested groups
/// merge key-wise. This is not a C3 linearization.
pub fn resolve(document: &Document) -> Result<ResolvedBag, ResolveError> {
    let mut resolver = Resolver::new(document)?;
    resolver.resolve_all()?;
    Ok(resolver.into_bag())
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// An edge to a class that must be resolved first.
struct Dependency {
    target: ClassId,
    /// Where the edge is written, for cycle reports.
    line: usize,
    span: Range<usize>,
}

struct Resolver<'d> {
    document: &'d Document,
    /// Resolved base ids per class, in listed order.
    bases: Vec<Vec<ClassId>>,
    /// Bases followed by concrete nested groups, per class.
    dependencies: Vec<Vec<Dependency>>,
    /// Shared so that groups and bases reuse a resolved map without copying it.
    resolved: Vec<Option<Arc<PropertyMap>>>,
}

impl<'d> Resolver<'d> {
    fn new(document: &'d Document) -> Result<Self, ResolveError> {
        let mut bases = Vec::with_capacity(document.classes.len());
        let mut dependencies = Vec::with_capacity(document.classes.len());

        for id in document.ids() {
            let class = document.class(id);
            let mut class_bases = Vec::with_capacity(class.bases.len());
            let mut deps = Vec::new();

            for base in &class.bases {
                let target = lookup_base(document, id, &base.name).ok_or_else(|| {
                    ResolveError::UnknownBase {
                        class: document.qualified_name(id),
                        base: base.name.clone(),
                        line: class.line,
                        span: base.span.clone(),
                    }
                })?;
                class_bases.push(target);
                deps.push(Dependency {
                    target,
                    line: class.line,
                    span: base.span.clone(),
                });
            }

            for property in &class.properties {
                if let PropertyValue::Group(group) = property.value {
                    deps.push(Dependency {
                        target: group,
                        line: property.line,
                        span: property.span.clone(),
                    });
                }
            }

            bases.push(class_bases);
            dependencies.push(deps);
        }

        Ok(Resolver {
            document,
            bases,
            dependencies,
            resolved: vec![None; document.classes.len()],
        })
    }

    /// Depth-first over the dependency graph with an explicit work stack, so
    /// long inheritance chains cannot exhaust the call stack.
    fn resolve_all(&mut self) -> Result<(), ResolveError> {
        let mut marks = vec![Mark::Unvisited; self.document.classes.len()];

        for start in self.document.ids() {
            if marks[start.0] != Mark::Unvisited {
                continue;
            }

            let mut in_progress: IndexSet<ClassId> = IndexSet::new();
            let mut stack: Vec<(ClassId, usize)> = vec![(start, 0)];
            marks[start.0] = Mark::InProgress;
            in_progress.insert(start);

            while let Some(frame) = stack.last_mut() {
                let (id, next) = *frame;

                if let Some(dep) = self.dependencies[id.0].get(next) {
                    frame.1 += 1;
                    match marks[dep.target.0] {
                        Mark::Done => {}
                        Mark::InProgress => return Err(self.cycle_error(&in_progress, dep)),
                        Mark::Unvisited => {
                            marks[dep.target.0] = Mark::InProgress;
                            in_progress.insert(dep.target);
                            stack.push((dep.target, 0));
                        }
                    }
                } else {
                    let merged = self.merge(id);
                    tracing::debug!(
                        class = %self.document.qualified_name(id),
                        properties = merged.len(),
                        "resolved"
                    );
                    self.resolved[id.0] = Some(Arc::new(merged));
                    marks[id.0] = Mark::Done;
                    in_progress.pop();
                    stack.pop();
                }
            }
        }

        Ok(())
    }

    /// Bases first, left to right, then the class's own properties.
    fn merge(&self, id: ClassId) -> PropertyMap {
        let class = self.document.class(id);
        let mut map = PropertyMap::new();

        for base in &self.bases[id.0] {
            if let Some(inherited) = &self.resolved[base.0] {
                let base_name = &self.document.class(*base).name;
                tracing::trace!(class = %class.name, base = %base_name, "merging base");
                map.merge(PropertyMap::clone(inherited));
            }
        }

        for property in &class.properties {
            match &property.value {
                PropertyValue::Literal(value) => map.insert(property.key.clone(), value.clone()),
                PropertyValue::Group(group) => {
                    let group = self.resolved[group.0].clone().unwrap_or_default();
                    map.merge_value(property.key.clone(), Value::Group(group));
                }
            }
        }

        map
    }

    fn cycle_error(&self, in_progress: &IndexSet<ClassId>, closing: &Dependency) -> ResolveError {
        let start = in_progress.get_index_of(&closing.target).unwrap_or(0);
        let cycle = in_progress
            .iter()
            .skip(start)
            .chain(std::iter::once(&closing.target))
            .map(|id| self.document.qualified_name(*id))
            .collect();
        ResolveError::Cycle {
            cycle,
            line: closing.line,
            span: closing.span.clone(),
        }
    }

    /// Concrete top-level classes, in source order.
    fn into_bag(mut self) -> ResolvedBag {
        let mut classes = IndexMap::new();
        for id in &self.document.roots {
            let class = self.document.class(*id);
            if class.is_abstract {
                continue;
            }
            let properties = self.resolved[id.0].take().unwrap_or_default();
            classes.insert(class.name.clone(), Arc::unwrap_or_clone(properties));
        }
        ResolvedBag::new(classes)
    }
}
