//! Circular-reference protection.
//!
//! Each thread keeps the stack of classes and provider factories it is
//! currently building. Entering one that is already on the stack is a
//! cycle. Entries are compared by identity; the label only feeds the
//! chain reported to the user.

use std::cell::RefCell;

use tracing::warn;

use crate::error::{CircularDependencyError, DiError, Result};
use crate::key::TypeKey;

/// What is being built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Building {
    Class(TypeKey),
    Factory { provider: String, name: String },
}

thread_local! {
    static BUILDING: RefCell<Vec<(Building, String)>> = const { RefCell::new(Vec::new()) };
}

/// Marks an entry as being built until dropped.
#[must_use]
pub(crate) struct ResolutionGuard {
    _private: (),
}

impl ResolutionGuard {
    pub fn enter(building: Building, label: String) -> Result<Self> {
        BUILDING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(start) = stack.iter().position(|(entry, _)| *entry == building) {
                let mut chain: Vec<String> =
                    stack[start..].iter().map(|(_, label)| label.clone()).collect();
                chain.push(label);
                warn!(cycle = ?chain, "Circular dependency detected");
                return Err(DiError::CircularDependency(CircularDependencyError { chain }));
            }
            stack.push((building, label));
            Ok(Self { _private: () })
        })
    }

    #[cfg(test)]
    fn depth() -> usize {
        BUILDING.with(|stack| stack.borrow().len())
    }
}

impl Drop for ResolutionGuard {
    fn drop(&mut self) {
        BUILDING.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct A;
    struct B;

    mod other {
        pub struct A;
    }

    fn class<T: 'static>() -> (Building, String) {
        let key = TypeKey::of::<T>();
        (Building::Class(key), key.short_name())
    }

    fn enter<T: 'static>() -> Result<ResolutionGuard> {
        let (building, label) = class::<T>();
        ResolutionGuard::enter(building, label)
    }

    #[test]
    fn nested_distinct_entries() {
        let _a = enter::<A>().unwrap();
        let _b = enter::<B>().unwrap();
        assert_eq!(ResolutionGuard::depth(), 2);
    }

    #[test]
    fn reentry_is_a_cycle() {
        let _a = enter::<A>().unwrap();
        let _b = enter::<B>().unwrap();
        match enter::<A>() {
            Err(DiError::CircularDependency(e)) => assert_eq!(e.chain, ["A", "B", "A"]),
            Err(other) => panic!("Expected CircularDependency, got: {other:?}"),
            Ok(_) => panic!("Expected CircularDependency"),
        }
    }

    #[test]
    fn same_short_name_is_not_a_cycle() {
        let _a = enter::<A>().unwrap();
        let _other = enter::<other::A>().unwrap();
        assert_eq!(ResolutionGuard::depth(), 2);
    }

    #[test]
    fn factories_are_keyed_by_provider() {
        let factory = |provider: &str| Building::Factory {
            provider: provider.to_string(),
            name: "mailer".to_string(),
        };
        let _first = ResolutionGuard::enter(factory("Smtp"), "provide_mailer".into()).unwrap();
        let _second = ResolutionGuard::enter(factory("Relay"), "provide_mailer".into()).unwrap();
        assert!(ResolutionGuard::enter(factory("Smtp"), "provide_mailer".into()).is_err());
    }

    #[test]
    fn dropping_unwinds_the_stack() {
        {
            let _a = enter::<A>().unwrap();
        }
        let _again = enter::<A>().unwrap();
        assert_eq!(ResolutionGuard::depth(), 1);
    }
}
