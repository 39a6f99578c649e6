use std::sync::{atomic::Ordering, Arc};

use dashmap::mapref::entry::Entry;

use super::{Scope, WeakScope};
use crate::{
    errors::ConfigError,
    types::{ScopeAnnotation, ScopeName},
};

// Tree structure
impl Scope {
    /// The direct parent, `None` for root scopes
    pub fn parent(&self) -> Option<Scope> {
        self.0
            .ancestors
            .read()
            .first()
            .and_then(|parent| parent.upgrade().ok())
    }

    /// All ancestors which are still alive, closest first
    pub fn ancestors(&self) -> Vec<Scope> {
        self.ancestor_snapshot()
            .iter()
            .filter_map(|ancestor| ancestor.upgrade().ok())
            .collect()
    }

    pub(crate) fn ancestor_snapshot(&self) -> Arc<[WeakScope]> {
        self.0.ancestors.read().clone()
    }

    pub(crate) fn ancestor_names(&self) -> Vec<ScopeName> {
        self.ancestor_snapshot()
            .iter()
            .map(|ancestor| ancestor.name.clone())
            .collect()
    }

    /// The top most ancestor, or the scope itself if it has no parent
    pub fn root(&self) -> Scope {
        self.ancestors().pop().unwrap_or_else(|| self.clone())
    }

    pub fn is_root(&self) -> bool {
        self.0.ancestors.read().is_empty()
    }

    pub fn children(&self) -> Vec<Scope> {
        self.0
            .children
            .iter()
            .map(|child| child.value().clone())
            .collect()
    }

    pub fn child(&self, name: impl Into<ScopeName>) -> Option<Scope> {
        self.0
            .children
            .get(&name.into())
            .map(|child| child.value().clone())
    }

    /// Attaches `child` below this scope and returns the attached child
    ///
    /// Attaching a child twice is a no-op. If another scope with the same name was attached first,
    /// that scope is returned instead.
    pub fn attach_child(&self, child: &Scope) -> Result<Scope, ConfigError> {
        if let Some(parent) = child.parent() {
            if parent.ptr_eq(self) {
                return Ok(child.clone());
            }
            return Err(ConfigError::ParentConflict {
                child: child.name().clone(),
                parent: parent.name().clone(),
                requested: self.name().clone(),
            });
        }

        if child.ptr_eq(self) || self.ancestors().iter().any(|ancestor| ancestor.ptr_eq(child)) {
            return Err(ConfigError::AttachCycle {
                child: child.name().clone(),
                parent: self.name().clone(),
            });
        }

        match self.0.children.entry(child.name().clone()) {
            Entry::Occupied(existing) => Ok(existing.get().clone()),
            Entry::Vacant(slot) => {
                let own = self.ancestor_snapshot();
                let mut chain = Vec::with_capacity(own.len() + 1);
                chain.push(self.downgrade());
                chain.extend(own.iter().cloned());
                *child.0.ancestors.write() = Arc::from(chain);

                slot.insert(child.clone());
                tracing::trace!("Attached scope '{}' to '{}'", child.name(), self.name());
                Ok(child.clone())
            }
        }
    }

    /// Detaches `child`, which becomes a root scope
    pub fn detach_child(&self, child: &Scope) -> Result<(), ConfigError> {
        match child.parent() {
            Some(parent) if parent.ptr_eq(self) => {}
            _ => {
                return Err(ConfigError::NotAChild {
                    child: child.name().clone(),
                    parent: self.name().clone(),
                })
            }
        }

        self.0
            .children
            .remove_if(child.name(), |_, existing| existing.ptr_eq(child));
        *child.0.ancestors.write() = Arc::from(Vec::new());
        tracing::trace!("Detached scope '{}' from '{}'", child.name(), self.name());
        Ok(())
    }

    /// Root scopes support the [Singleton](crate::Singleton) marker implicitly
    pub fn supports_scope_annotation(&self, annotation: &ScopeAnnotation) -> bool {
        (annotation.is_singleton() && self.is_root()) || self.0.annotations.contains(annotation)
    }

    pub fn support_scope_annotation(&self, annotation: ScopeAnnotation) {
        self.0.annotations.insert(annotation);
    }

    /// The closest scope, starting with this one, which supports `annotation`
    pub fn nearest_ancestor_supporting(
        &self,
        annotation: &ScopeAnnotation,
    ) -> Result<Scope, ConfigError> {
        if annotation.is_singleton() {
            return Ok(self.root());
        }

        std::iter::once(self.clone())
            .chain(self.ancestors())
            .find(|scope| scope.supports_scope_annotation(annotation))
            .ok_or_else(|| ConfigError::NoScopeSupporting {
                annotation: *annotation,
                scope: self.name().clone(),
                ancestors: self.ancestor_names(),
            })
    }

    /// Marks this scope and all descendants as closed, the tree itself is left untouched
    pub(crate) fn mark_closed(&self) {
        self.0.open.store(false, Ordering::Release);
        for child in self.children() {
            child.mark_closed();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};

    use super::*;
    use crate::{errors::ConfigError, ScopeDirectory};

    struct Activity;

    #[test]
    fn attach_builds_the_ancestor_chain() {
        let directory = ScopeDirectory::builder().build();
        let leaf = directory.open_chain(["root", "middle", "leaf"]).unwrap();

        let names: Vec<_> = leaf.ancestors().iter().map(|s| s.name().clone()).collect();
        assert_eq!(names, vec![ScopeName::from("middle"), ScopeName::from("root")]);
        assert_eq!(leaf.root().name(), &ScopeName::from("root"));
        assert!(leaf.root().is_root());
        assert!(!leaf.is_root());
        assert!(leaf.parent().unwrap().child("leaf").unwrap().ptr_eq(&leaf));
    }

    #[test]
    fn attach_is_idempotent_and_rejects_other_parents() {
        let directory = ScopeDirectory::builder().build();
        let parent = directory.open("parent").unwrap();
        let other = directory.open("other").unwrap();
        let child = directory.open("child").unwrap();

        assert!(parent.attach_child(&child).unwrap().ptr_eq(&child));
        assert!(parent.attach_child(&child).unwrap().ptr_eq(&child));
        assert_eq!(parent.children().len(), 1);

        assert!(matches!(
            other.attach_child(&child),
            Err(ConfigError::ParentConflict { .. })
        ));
        assert!(matches!(
            child.attach_child(&parent),
            Err(ConfigError::AttachCycle { .. })
        ));
        assert!(matches!(
            parent.attach_child(&parent),
            Err(ConfigError::AttachCycle { .. })
        ));
    }

    #[test]
    fn detach_makes_a_new_root() {
        let directory = ScopeDirectory::builder().build();
        let child = directory.open_chain(["parent", "child"]).unwrap();
        let parent = child.parent().unwrap();
        let stranger = directory.open("stranger").unwrap();

        assert!(matches!(
            stranger.detach_child(&child),
            Err(ConfigError::NotAChild { .. })
        ));

        parent.detach_child(&child).unwrap();
        assert!(child.is_root());
        assert!(parent.children().is_empty());
        assert!(stranger.attach_child(&child).is_ok());
    }

    #[test]
    fn annotations_are_searched_from_self_upwards() {
        let directory = ScopeDirectory::builder().build();
        let leaf = directory.open_chain(["root", "activity", "fragment"]).unwrap();
        let activity = leaf.parent().unwrap();
        let annotation = ScopeAnnotation::of::<Activity>();

        assert!(matches!(
            leaf.nearest_ancestor_supporting(&annotation),
            Err(ConfigError::NoScopeSupporting { .. })
        ));

        activity.support_scope_annotation(annotation);
        assert!(leaf
            .nearest_ancestor_supporting(&annotation)
            .unwrap()
            .ptr_eq(&activity));
        assert!(activity
            .nearest_ancestor_supporting(&annotation)
            .unwrap()
            .ptr_eq(&activity));

        let singleton = ScopeAnnotation::singleton();
        assert!(!leaf.supports_scope_annotation(&singleton));
        assert_eq!(
            leaf.nearest_ancestor_supporting(&singleton).unwrap().name(),
            &ScopeName::from("root")
        );
    }

    #[test]
    fn concurrent_attach_yields_one_child() {
        const THREADS: usize = 8;
        let directory = ScopeDirectory::builder().build();
        let parent = directory.open("parent").unwrap();
        let barrier = Barrier::new(THREADS);

        let attached: Vec<Scope> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    s.spawn(|| {
                        // Each thread brings its own candidate with the same name
                        let candidate = Scope::new(ScopeName::from("child"), parent.0.shared.clone());
                        barrier.wait();
                        parent.attach_child(&candidate).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(parent.children().len(), 1);
        let winner = parent.child("child").unwrap();
        assert!(attached.iter().all(|scope| scope.ptr_eq(&winner)));
        assert!(Arc::ptr_eq(&winner.parent().unwrap().0, &parent.0));
    }

    #[test]
    fn closing_marks_descendants() {
        let directory = ScopeDirectory::builder().build();
        let leaf = directory.open_chain(["a", "b", "c"]).unwrap();
        leaf.root().mark_closed();
        assert!(!leaf.is_open());
        assert!(!leaf.parent().unwrap().is_open());
    }
}
