use std::cell::RefCell;

use crate::{errors::ResolveError, types::BindingKey};

thread_local! {
    /// Keys currently being resolved on this thread, outermost first
    static RESOLUTION_STACK: RefCell<Vec<BindingKey>> = const { RefCell::new(Vec::new()) };
}

/// Tracks a resolution on the current thread for as long as it is alive
///
/// Entering a key which is already being resolved on this thread is a cyclic dependency.
/// A cycle would otherwise deadlock on the provider lock.
#[derive(Debug)]
pub(crate) struct ResolutionGuard {
    _not_send: std::marker::PhantomData<*const ()>,
}

impl ResolutionGuard {
    pub(crate) fn enter(key: BindingKey) -> Result<Self, ResolveError> {
        RESOLUTION_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();

            if let Some(start) = stack.iter().position(|entry| entry == &key) {
                let mut path = stack[start..].to_vec();
                path.push(key.clone()); // Add current so the cycle is complete

                tracing::warn!("Cyclic dependency detected on {key}");
                return Err(ResolveError::CyclicDependency { key, path });
            }

            stack.push(key);
            Ok(ResolutionGuard {
                _not_send: std::marker::PhantomData,
            })
        })
    }
}

impl Drop for ResolutionGuard {
    fn drop(&mut self) {
        RESOLUTION_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

#[cfg(test)]
fn depth() -> usize {
    RESOLUTION_STACK.with(|stack| stack.borrow().len())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct A;
    struct B;

    #[test]
    fn reports_full_cycle() {
        let a = BindingKey::of::<A>(None);
        let b = BindingKey::of::<B>(None);

        let _a = ResolutionGuard::enter(a.clone()).unwrap();
        let _b = ResolutionGuard::enter(b.clone()).unwrap();

        match ResolutionGuard::enter(a.clone()) {
            Err(ResolveError::CyclicDependency { key, path }) => {
                assert_eq!(key, a);
                assert_eq!(path, vec![a.clone(), b.clone(), a.clone()]);
            }
            other => panic!("expected a cycle, got {other:?}"),
        }
        assert_eq!(depth(), 2);
    }

    #[test]
    fn names_distinguish_keys() {
        let plain = BindingKey::of::<A>(None);
        let named = BindingKey::of::<A>(Some("other"));

        let _plain = ResolutionGuard::enter(plain).unwrap();
        let _named = ResolutionGuard::enter(named).unwrap();
        assert_eq!(depth(), 2);
    }

    #[test]
    fn guard_pops_on_drop() {
        {
            let _a = ResolutionGuard::enter(BindingKey::of::<A>(None)).unwrap();
            assert_eq!(depth(), 1);
        }
        assert_eq!(depth(), 0);
        let _again = ResolutionGuard::enter(BindingKey::of::<A>(None)).unwrap();
    }
}
